use actix_web::{HttpResponse, web};
use serde::Deserialize;
use serde_json::json;
use sqlx::SqlitePool;
use tracing::instrument;
use utoipa::{IntoParams, ToSchema};

use crate::auth::auth::AuthUser;
use crate::error::ApiError;
use crate::service::attendance::{self as attendance_service, ManualAttendance, RecordQuery, SortBy, SortOrder};
use crate::utils::pagination::{PageQuery, Pagination};
use crate::utils::validation::{FieldErrors, parse_date};

#[derive(Debug, Deserialize, ToSchema)]
pub struct ManualAttendanceReq {
    #[schema(example = "2026-01-05", format = "date")]
    pub date: Option<String>,
    #[schema(example = "09:00")]
    pub punch_in: Option<String>,
    #[schema(example = "17:30")]
    pub punch_out: Option<String>,
    #[schema(example = "Manual Edit")]
    pub status: Option<String>,
    #[schema(example = "Forgot to punch in")]
    pub reason: Option<String>,
}

impl ManualAttendanceReq {
    fn validate(&self) -> Result<ManualAttendance, ApiError> {
        let mut errors = FieldErrors::default();

        let date = errors.required("date", &self.date).and_then(|v| errors.date("date", v));
        let punch_in = errors.required("punch_in", &self.punch_in).and_then(|v| errors.time("punch_in", v));
        let punch_out = errors.required("punch_out", &self.punch_out).and_then(|v| errors.time("punch_out", v));

        match (date, punch_in, punch_out) {
            (Some(date), Some(punch_in), Some(punch_out)) => Ok(ManualAttendance {
                date,
                punch_in,
                punch_out,
                status: self.status.clone().filter(|s| !s.trim().is_empty()),
                reason: self.reason.clone(),
            }),
            _ => Err(errors.into()),
        }
    }
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct RejectReq {
    #[schema(example = "Badge logs show no entry that day")]
    pub rejection_reason: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct MyRecordsQuery {
    /// YYYY-MM-DD, inclusive
    pub start_date: Option<String>,
    /// YYYY-MM-DD, inclusive
    pub end_date: Option<String>,
    /// punch_in (default), punch_out or date
    pub sort_by: Option<String>,
    /// asc (default) or desc
    pub order: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct AttendanceSearchQuery {
    pub name: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

/// Optional date query params; a malformed one is a field error.
fn optional_date(errors: &mut FieldErrors, field: &str, value: &Option<String>) -> Option<chrono::NaiveDate> {
    let value = value.as_deref().map(str::trim).filter(|v| !v.is_empty())?;
    let parsed = parse_date(value);
    if parsed.is_none() {
        errors.date(field, value);
    }
    parsed
}

/// Punch in for today
#[utoipa::path(
    post,
    path = "/api/attendance/punch-in",
    responses(
        (status = 200, description = "Punched in", body = Object, example = json!({"message": "Punch in recorded"})),
        (status = 400, description = "Already punched in today", body = Object, example = json!({
            "error": "Already punched in today"
        })),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
#[instrument(name = "punch_in_handler", skip_all, fields(employee_id = %user.employee_id))]
pub async fn punch_in(user: AuthUser, pool: web::Data<SqlitePool>) -> Result<HttpResponse, ApiError> {
    attendance_service::punch_in(&pool, &user.employee_id).await?;
    Ok(HttpResponse::Ok().json(json!({ "message": "Punch in recorded" })))
}

/// Punch out of today's open record
#[utoipa::path(
    post,
    path = "/api/attendance/punch-out",
    responses(
        (status = 200, description = "Punched out", body = Object, example = json!({"message": "Punch out recorded"})),
        (status = 400, description = "No open punch-in", body = Object, example = json!({
            "error": "No active punch-in found for today"
        }))
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
#[instrument(name = "punch_out_handler", skip_all, fields(employee_id = %user.employee_id))]
pub async fn punch_out(user: AuthUser, pool: web::Data<SqlitePool>) -> Result<HttpResponse, ApiError> {
    attendance_service::punch_out(&pool, &user.employee_id).await?;
    Ok(HttpResponse::Ok().json(json!({ "message": "Punch out recorded" })))
}

/// Ask an admin to record attendance for a past day
#[utoipa::path(
    post,
    path = "/api/attendance/manual",
    request_body = ManualAttendanceReq,
    responses(
        (status = 201, description = "Request submitted", body = Object, example = json!({
            "message": "Manual attendance request submitted"
        })),
        (status = 400, description = "Invalid fields, or punch_out not after punch_in")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn request_manual(
    user: AuthUser,
    payload: web::Json<ManualAttendanceReq>,
    pool: web::Data<SqlitePool>,
) -> Result<HttpResponse, ApiError> {
    let request = payload.validate()?;
    attendance_service::request_manual(&pool, &user.employee_id, request).await?;
    Ok(HttpResponse::Created().json(json!({ "message": "Manual attendance request submitted" })))
}

/// The caller's own attendance records
#[utoipa::path(
    get,
    path = "/api/attendance/my-records",
    params(MyRecordsQuery),
    responses(
        (status = 200, description = "Records", body = [Attendance]),
        (status = 400, description = "Malformed date")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn my_records(
    user: AuthUser,
    query: web::Query<MyRecordsQuery>,
    pool: web::Data<SqlitePool>,
) -> Result<HttpResponse, ApiError> {
    let mut errors = FieldErrors::default();
    let record_query = RecordQuery {
        start_date: optional_date(&mut errors, "start_date", &query.start_date),
        end_date: optional_date(&mut errors, "end_date", &query.end_date),
        sort_by: SortBy::parse(query.sort_by.as_deref()),
        order: SortOrder::parse(query.order.as_deref()),
    };
    errors.into_result()?;

    let records = attendance_service::my_records(&pool, &user.employee_id, &record_query).await?;
    Ok(HttpResponse::Ok().json(records))
}

/// Pending manual requests
#[utoipa::path(
    get,
    path = "/api/attendance/requests",
    params(PageQuery),
    responses(
        (status = 200, description = "One page of pending requests", body = Object, example = json!({
            "items": [{"id": 7, "employee_id": "EMP0002", "name": "Jane Doe", "date": "2026-01-05",
                       "punch_in": "2026-01-05T09:00:00", "punch_out": "2026-01-05T17:30:00",
                       "status": "Manual Edit", "is_manual": true, "approval_status": "Pending",
                       "reason": "Forgot to punch in", "rejection_reason": null, "reviewed_by": null}],
            "total": 1, "page": 1, "per_page": 10, "total_pages": 1
        })),
        (status = 403, description = "Caller is not an admin")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn pending_requests(
    user: AuthUser,
    query: web::Query<PageQuery>,
    pool: web::Data<SqlitePool>,
) -> Result<HttpResponse, ApiError> {
    user.require_admin()?;
    let page = attendance_service::pending_requests(&pool, Pagination::from(&*query)).await?;
    Ok(HttpResponse::Ok().json(page))
}

/// Approve a manual request
#[utoipa::path(
    put,
    path = "/api/attendance/approve/{id}",
    params(("id" = i64, Path, description = "Attendance record id")),
    responses(
        (status = 200, description = "Approved", body = Object, example = json!({"message": "Attendance request approved"})),
        (status = 400, description = "Not a pending manual request"),
        (status = 403, description = "Not an admin, or own request"),
        (status = 404, description = "Attendance record not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn approve(
    user: AuthUser,
    path: web::Path<i64>,
    pool: web::Data<SqlitePool>,
) -> Result<HttpResponse, ApiError> {
    user.require_admin()?;
    attendance_service::approve(&pool, path.into_inner(), &user.employee_id).await?;
    Ok(HttpResponse::Ok().json(json!({ "message": "Attendance request approved" })))
}

/// Reject a manual request
#[utoipa::path(
    put,
    path = "/api/attendance/reject/{id}",
    params(("id" = i64, Path, description = "Attendance record id")),
    request_body = RejectReq,
    responses(
        (status = 200, description = "Rejected", body = Object, example = json!({"message": "Attendance request rejected"})),
        (status = 400, description = "Not a pending manual request"),
        (status = 403, description = "Not an admin, or own request"),
        (status = 404, description = "Attendance record not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn reject(
    user: AuthUser,
    path: web::Path<i64>,
    payload: Option<web::Json<RejectReq>>,
    pool: web::Data<SqlitePool>,
) -> Result<HttpResponse, ApiError> {
    user.require_admin()?;
    let reason = payload.and_then(|p| p.into_inner().rejection_reason);

    attendance_service::reject(&pool, path.into_inner(), &user.employee_id, reason.as_deref()).await?;
    Ok(HttpResponse::Ok().json(json!({ "message": "Attendance request rejected" })))
}

/// Search attendance by employee name and date range
#[utoipa::path(
    get,
    path = "/api/attendance/search",
    params(AttendanceSearchQuery),
    responses(
        (status = 200, description = "Matching records", body = [AttendanceWithName]),
        (status = 400, description = "Malformed date"),
        (status = 403, description = "Caller is not an admin")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn search(
    user: AuthUser,
    query: web::Query<AttendanceSearchQuery>,
    pool: web::Data<SqlitePool>,
) -> Result<HttpResponse, ApiError> {
    user.require_admin()?;

    let mut errors = FieldErrors::default();
    let start = optional_date(&mut errors, "start_date", &query.start_date);
    let end = optional_date(&mut errors, "end_date", &query.end_date);
    errors.into_result()?;

    let records = attendance_service::search(&pool, query.name.as_deref(), start, end).await?;
    Ok(HttpResponse::Ok().json(records))
}
