use actix_web::{HttpResponse, web};
use serde::Deserialize;
use serde_json::json;
use sqlx::SqlitePool;
use utoipa::ToSchema;

use crate::auth::auth::AuthUser;
use crate::error::ApiError;
use crate::service::review as review_service;
use crate::utils::validation::{FieldErrors, MISSING};

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateReviewReq {
    #[schema(example = "EMP0002")]
    pub employee_id: Option<String>,
    #[schema(example = 4, minimum = 1, maximum = 5)]
    pub rating: Option<i64>,
    #[schema(example = "Consistently delivers on time.")]
    pub comments: Option<String>,
}

/// Record a performance review
#[utoipa::path(
    post,
    path = "/api/reviews",
    request_body = CreateReviewReq,
    responses(
        (status = 201, description = "Review recorded", body = Object, example = json!({
            "message": "Review submitted", "review_id": 3
        })),
        (status = 400, description = "Missing fields or rating outside 1..5"),
        (status = 403, description = "Not an admin or manager, or reviewing yourself"),
        (status = 404, description = "User not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Reviews"
)]
pub async fn create_review(
    user: AuthUser,
    payload: web::Json<CreateReviewReq>,
    pool: web::Data<SqlitePool>,
) -> Result<HttpResponse, ApiError> {
    user.require_admin_or_manager()?;

    let mut errors = FieldErrors::default();
    let employee_id = errors.required("employee_id", &payload.employee_id);
    let comments = errors.required("comments", &payload.comments);
    if payload.rating.is_none() {
        errors.add("rating", MISSING);
    }
    let (Some(employee_id), Some(comments), Some(rating)) = (employee_id, comments, payload.rating) else {
        return Err(errors.into());
    };

    let review_id = review_service::create_review(&pool, &user.employee_id, employee_id, rating, comments).await?;

    Ok(HttpResponse::Created().json(json!({
        "message": "Review submitted",
        "review_id": review_id,
    })))
}

/// Reviews of one employee, newest first
#[utoipa::path(
    get,
    path = "/api/reviews/{employee_id}",
    params(("employee_id" = String, Path, description = "Employee id")),
    responses(
        (status = 200, description = "Reviews", body = [PerformanceReview]),
        (status = 403, description = "Not your reviews and not an admin or manager")
    ),
    security(("bearer_auth" = [])),
    tag = "Reviews"
)]
pub async fn list_reviews(
    user: AuthUser,
    path: web::Path<String>,
    pool: web::Data<SqlitePool>,
) -> Result<HttpResponse, ApiError> {
    user.require_self_or_reviewer(&path)?;
    let reviews = review_service::reviews_for(&pool, &path).await?;
    Ok(HttpResponse::Ok().json(reviews))
}
