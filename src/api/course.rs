use actix_web::{HttpResponse, web};
use serde::Deserialize;
use serde_json::json;
use sqlx::SqlitePool;
use std::str::FromStr;
use tracing::instrument;
use utoipa::ToSchema;

use crate::auth::auth::AuthUser;
use crate::error::ApiError;
use crate::model::course::SubmissionStatus;
use crate::service::course::{self as course_service, NewCourse};
use crate::service::user::get_user;
use crate::utils::validation::FieldErrors;

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateCourseReq {
    #[schema(example = "Workplace Health and Safety")]
    pub name: Option<String>,
    #[serde(rename = "type")]
    #[schema(example = "Mandatory")]
    pub course_type: Option<String>,
    pub description: Option<String>,
    /// Leave empty to assign the course to every department
    #[schema(example = "Engineering")]
    pub department: Option<String>,
    pub target_role: Option<String>,
    #[schema(example = "2026-03-31", format = "date")]
    pub deadline: Option<String>,
}

fn optional(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
}

impl CreateCourseReq {
    fn validate(&self) -> Result<NewCourse, ApiError> {
        let mut errors = FieldErrors::default();

        let name = errors.required("name", &self.name);
        let course_type = errors.required("type", &self.course_type);
        let deadline = optional(&self.deadline).and_then(|d| errors.date("deadline", &d));

        let (Some(name), Some(course_type)) = (name, course_type) else {
            return Err(errors.into());
        };
        errors.into_result()?;

        Ok(NewCourse {
            name: name.to_string(),
            course_type: course_type.to_string(),
            description: optional(&self.description),
            department: optional(&self.department),
            target_role: optional(&self.target_role),
            deadline,
        })
    }
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct SubmitCourseReq {
    #[schema(example = "Completed the online module, certificate attached")]
    pub completion_notes: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ReviewSubmissionReq {
    #[schema(example = "Approved")]
    pub status: Option<String>,
    pub reviewer_comment: Option<String>,
}

/// All courses, newest first
#[utoipa::path(
    get,
    path = "/api/courses",
    responses((status = 200, description = "Courses", body = [Course])),
    security(("bearer_auth" = [])),
    tag = "Courses"
)]
pub async fn list_courses(_user: AuthUser, pool: web::Data<SqlitePool>) -> Result<HttpResponse, ApiError> {
    let courses = course_service::list_courses(&pool).await?;
    Ok(HttpResponse::Ok().json(courses))
}

/// Create a course
#[utoipa::path(
    post,
    path = "/api/courses",
    request_body = CreateCourseReq,
    responses(
        (status = 201, description = "Course created", body = Object, example = json!({
            "message": "Course created successfully", "course_id": 4
        })),
        (status = 400, description = "Invalid fields", body = Object, example = json!({
            "errors": {"type": ["Missing data for required field."]}
        })),
        (status = 403, description = "Caller is not an admin")
    ),
    security(("bearer_auth" = [])),
    tag = "Courses"
)]
#[instrument(name = "create_course_handler", skip_all)]
pub async fn create_course(
    user: AuthUser,
    payload: web::Json<CreateCourseReq>,
    pool: web::Data<SqlitePool>,
) -> Result<HttpResponse, ApiError> {
    user.require_admin()?;
    let course = payload.validate()?;

    let course_id = course_service::create_course(&pool, course).await?;

    Ok(HttpResponse::Created().json(json!({
        "message": "Course created successfully",
        "course_id": course_id,
    })))
}

/// Courses for the caller's department
#[utoipa::path(
    get,
    path = "/api/courses/department",
    responses((status = 200, description = "Department and company-wide courses", body = [Course])),
    security(("bearer_auth" = [])),
    tag = "Courses"
)]
pub async fn department_courses(user: AuthUser, pool: web::Data<SqlitePool>) -> Result<HttpResponse, ApiError> {
    let me = get_user(&pool, &user.employee_id).await?;
    let courses = course_service::department_courses(&pool, me.department.as_deref()).await?;
    Ok(HttpResponse::Ok().json(courses))
}

/// Submit a course completion
#[utoipa::path(
    post,
    path = "/api/courses/{id}/submit",
    params(("id" = i64, Path, description = "Course id")),
    request_body = SubmitCourseReq,
    responses(
        (status = 201, description = "Submission sent", body = Object, example = json!({
            "message": "Submission sent", "submission_id": 9
        })),
        (status = 404, description = "Course not found"),
        (status = 409, description = "A pending or approved submission already exists")
    ),
    security(("bearer_auth" = [])),
    tag = "Courses"
)]
pub async fn submit(
    user: AuthUser,
    path: web::Path<i64>,
    payload: Option<web::Json<SubmitCourseReq>>,
    pool: web::Data<SqlitePool>,
) -> Result<HttpResponse, ApiError> {
    let notes = payload.and_then(|p| p.into_inner().completion_notes);

    let submission_id = course_service::submit(&pool, &user.employee_id, path.into_inner(), notes.as_deref()).await?;

    Ok(HttpResponse::Created().json(json!({
        "message": "Submission sent",
        "submission_id": submission_id,
    })))
}

/// The caller's submissions
#[utoipa::path(
    get,
    path = "/api/my-submissions",
    responses((status = 200, description = "Submissions with course names", body = [SubmissionDetail])),
    security(("bearer_auth" = [])),
    tag = "Courses"
)]
pub async fn my_submissions(user: AuthUser, pool: web::Data<SqlitePool>) -> Result<HttpResponse, ApiError> {
    let submissions = course_service::my_submissions(&pool, &user.employee_id).await?;
    Ok(HttpResponse::Ok().json(submissions))
}

/// Submissions waiting for review, oldest first
#[utoipa::path(
    get,
    path = "/api/submissions/pending",
    responses(
        (status = 200, description = "Pending submissions", body = [SubmissionDetail]),
        (status = 403, description = "Caller is not an admin")
    ),
    security(("bearer_auth" = [])),
    tag = "Courses"
)]
pub async fn pending_submissions(user: AuthUser, pool: web::Data<SqlitePool>) -> Result<HttpResponse, ApiError> {
    user.require_admin()?;
    let submissions = course_service::pending_submissions(&pool).await?;
    Ok(HttpResponse::Ok().json(submissions))
}

/// Approve or reject a submission
#[utoipa::path(
    put,
    path = "/api/submissions/{id}/status",
    params(("id" = i64, Path, description = "Submission id")),
    request_body = ReviewSubmissionReq,
    responses(
        (status = 200, description = "Reviewed", body = Object, example = json!({"message": "Submission approved"})),
        (status = 400, description = "Invalid status, or not pending"),
        (status = 403, description = "Not an admin, or own submission"),
        (status = 404, description = "Submission not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Courses"
)]
pub async fn review_submission(
    user: AuthUser,
    path: web::Path<i64>,
    payload: web::Json<ReviewSubmissionReq>,
    pool: web::Data<SqlitePool>,
) -> Result<HttpResponse, ApiError> {
    user.require_admin()?;

    // an unparseable status still has to pass the existence and ownership checks first
    let status = payload
        .status
        .as_deref()
        .and_then(|s| SubmissionStatus::from_str(s.trim()).ok())
        .unwrap_or(SubmissionStatus::Pending);
    let comment = optional(&payload.reviewer_comment);

    course_service::review_submission(&pool, path.into_inner(), &user.employee_id, status, comment.as_deref()).await?;

    Ok(HttpResponse::Ok().json(json!({
        "message": format!("Submission {}", status.as_ref().to_lowercase())
    })))
}
