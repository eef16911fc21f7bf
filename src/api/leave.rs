use actix_web::{HttpResponse, web};
use serde::Deserialize;
use serde_json::json;
use sqlx::SqlitePool;
use std::str::FromStr;
use tracing::instrument;
use utoipa::{IntoParams, ToSchema};

use crate::auth::auth::AuthUser;
use crate::error::ApiError;
use crate::model::leave::{LeaveStatus, LeaveType};
use crate::service::leave::{self as leave_service, LeaveApplication};
use crate::utils::pagination::{PageQuery, Pagination};
use crate::utils::validation::FieldErrors;

const INVALID_STATUS: &str = "Invalid status. Must be Approved or Rejected";

#[derive(Debug, Deserialize, ToSchema)]
pub struct ApplyLeaveReq {
    /// annual, casual, sick or maternity
    #[schema(example = "annual")]
    pub leave_type: Option<String>,
    #[schema(example = "2026-02-02", format = "date")]
    pub start_date: Option<String>,
    #[schema(example = "2026-02-04", format = "date")]
    pub end_date: Option<String>,
    #[schema(example = "Family trip")]
    pub reason: Option<String>,
}

impl ApplyLeaveReq {
    fn validate(&self) -> Result<LeaveApplication, ApiError> {
        let mut errors = FieldErrors::default();

        let leave_type = errors.required("leave_type", &self.leave_type);
        let start_date = errors.required("start_date", &self.start_date).and_then(|v| errors.date("start_date", v));
        let end_date = errors.required("end_date", &self.end_date).and_then(|v| errors.date("end_date", v));
        let reason = errors.required("reason", &self.reason);

        let (Some(leave_type), Some(start_date), Some(end_date), Some(reason)) = (leave_type, start_date, end_date, reason)
        else {
            return Err(errors.into());
        };

        let leave_type = LeaveType::from_str(leave_type)
            .map_err(|_| ApiError::bad_request(format!("Unsupported leave type: {leave_type}")))?;

        Ok(LeaveApplication {
            leave_type,
            start_date,
            end_date,
            reason: reason.to_string(),
        })
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LeaveStatusReq {
    #[schema(example = "Approved")]
    pub status: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct LeaveSearchQuery {
    pub name: Option<String>,
    /// YYYY-MM-DD
    pub start_date: Option<String>,
    /// YYYY-MM-DD
    pub end_date: Option<String>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

/// Apply for leave
#[utoipa::path(
    post,
    path = "/api/leave/apply",
    request_body = ApplyLeaveReq,
    responses(
        (status = 201, description = "Leave recorded as pending", body = Object, example = json!({
            "message": "Leave applied successfully", "days": 3, "leave_id": 12
        })),
        (status = 400, description = "Invalid fields, unsupported type, bad range or insufficient balance", body = Object, example = json!({
            "error": "Insufficient annual balance"
        })),
        (status = 404, description = "Balance not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
#[instrument(name = "apply_leave_handler", skip_all, fields(employee_id = %user.employee_id))]
pub async fn apply(
    user: AuthUser,
    payload: web::Json<ApplyLeaveReq>,
    pool: web::Data<SqlitePool>,
) -> Result<HttpResponse, ApiError> {
    let application = payload.validate()?;

    let (leave_id, days) = leave_service::apply(&pool, &user.employee_id, application).await?;

    Ok(HttpResponse::Created().json(json!({
        "message": "Leave applied successfully",
        "days": days,
        "leave_id": leave_id,
    })))
}

/// The caller's remaining balances
#[utoipa::path(
    get,
    path = "/api/leave/balance",
    responses(
        (status = 200, description = "Balance", body = LeaveBalance),
        (status = 404, description = "Balance not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn balance(user: AuthUser, pool: web::Data<SqlitePool>) -> Result<HttpResponse, ApiError> {
    let balance = leave_service::balance(&pool, &user.employee_id).await?;
    Ok(HttpResponse::Ok().json(balance))
}

/// The caller's leave history
#[utoipa::path(
    get,
    path = "/api/leave/my-leaves",
    params(PageQuery),
    responses(
        (status = 200, description = "One page of leaves, newest first", body = Object, example = json!({
            "items": [{"id": 12, "employee_id": "EMP0002", "leave_type": "annual", "start_date": "2026-02-02",
                       "end_date": "2026-02-04", "days": 3, "reason": "Family trip", "status": "Pending",
                       "reviewed_by": null, "reviewed_at": null, "created_at": "2026-01-20T10:00:00"}],
            "total": 1, "page": 1, "per_page": 10, "total_pages": 1
        }))
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn my_leaves(
    user: AuthUser,
    query: web::Query<PageQuery>,
    pool: web::Data<SqlitePool>,
) -> Result<HttpResponse, ApiError> {
    let page = leave_service::my_leaves(&pool, &user.employee_id, Pagination::from(&*query)).await?;
    Ok(HttpResponse::Ok().json(page))
}

/// Approve or reject a leave request
#[utoipa::path(
    put,
    path = "/api/leave/{id}/status",
    params(("id" = i64, Path, description = "Leave id")),
    request_body = LeaveStatusReq,
    responses(
        (status = 200, description = "Reviewed", body = Object, example = json!({"message": "Leave approved successfully."})),
        (status = 400, description = "Invalid status, not pending, or insufficient balance"),
        (status = 403, description = "Not an admin, or own leave"),
        (status = 404, description = "Leave request not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn update_status(
    user: AuthUser,
    path: web::Path<i64>,
    payload: web::Json<LeaveStatusReq>,
    pool: web::Data<SqlitePool>,
) -> Result<HttpResponse, ApiError> {
    user.require_admin()?;

    let status = payload
        .status
        .as_deref()
        .and_then(|s| LeaveStatus::from_str(s.trim()).ok())
        .ok_or_else(|| ApiError::bad_request(INVALID_STATUS))?;

    leave_service::review(&pool, path.into_inner(), &user.employee_id, status).await?;

    Ok(HttpResponse::Ok().json(json!({
        "message": format!("Leave {} successfully.", status.as_ref().to_lowercase())
    })))
}

/// Pending leave requests, earliest start first
#[utoipa::path(
    get,
    path = "/api/leave/pending",
    params(PageQuery),
    responses(
        (status = 200, description = "One page of pending leaves with requester details", body = Object, example = json!({
            "items": [{"id": 12, "employee_id": "EMP0002", "leave_type": "annual", "start_date": "2026-02-02",
                       "end_date": "2026-02-04", "days": 3, "reason": "Family trip", "status": "Pending",
                       "reviewed_by": null, "reviewed_at": null, "created_at": "2026-01-20T10:00:00",
                       "name": "Jane Doe", "email": "jane@example.com", "role": "Employee"}],
            "total": 1, "page": 1, "per_page": 10, "total_pages": 1
        })),
        (status = 403, description = "Caller is not an admin")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn pending(
    user: AuthUser,
    query: web::Query<PageQuery>,
    pool: web::Data<SqlitePool>,
) -> Result<HttpResponse, ApiError> {
    user.require_admin()?;
    let page = leave_service::pending(&pool, Pagination::from(&*query)).await?;
    Ok(HttpResponse::Ok().json(page))
}

/// Leaves of matching employees within a date range
#[utoipa::path(
    get,
    path = "/api/leave/search",
    params(LeaveSearchQuery),
    responses(
        (status = 200, description = "One page of matching leaves"),
        (status = 400, description = "Missing or malformed parameters"),
        (status = 403, description = "Caller is not an admin")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn search(
    user: AuthUser,
    query: web::Query<LeaveSearchQuery>,
    pool: web::Data<SqlitePool>,
) -> Result<HttpResponse, ApiError> {
    user.require_admin()?;

    let mut errors = FieldErrors::default();
    let name = errors.required("name", &query.name);
    let start = errors.required("start_date", &query.start_date).and_then(|v| errors.date("start_date", v));
    let end = errors.required("end_date", &query.end_date).and_then(|v| errors.date("end_date", v));
    let (Some(name), Some(start), Some(end)) = (name, start, end) else {
        return Err(errors.into());
    };

    let page = leave_service::search(&pool, name, start, end, Pagination::new(query.page, query.per_page)).await?;
    Ok(HttpResponse::Ok().json(page))
}

/// One employee's leave history
#[utoipa::path(
    get,
    path = "/api/leave/employee/{employee_id}",
    params(
        ("employee_id" = String, Path, description = "Employee id"),
        PageQuery
    ),
    responses(
        (status = 200, description = "One page of leaves"),
        (status = 403, description = "Caller is not an admin"),
        (status = 404, description = "User not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn employee_leaves(
    user: AuthUser,
    path: web::Path<String>,
    query: web::Query<PageQuery>,
    pool: web::Data<SqlitePool>,
) -> Result<HttpResponse, ApiError> {
    user.require_admin()?;
    let page = leave_service::employee_leaves(&pool, &path, Pagination::from(&*query)).await?;
    Ok(HttpResponse::Ok().json(page))
}

/// Leave usage for the employee dashboard
#[utoipa::path(
    get,
    path = "/api/employee/dashboard/summary",
    responses(
        (status = 200, description = "Annual, sick and casual usage", body = [LeaveSummary])
    ),
    security(("bearer_auth" = [])),
    tag = "Dashboard"
)]
pub async fn dashboard_summary(user: AuthUser, pool: web::Data<SqlitePool>) -> Result<HttpResponse, ApiError> {
    let summary = leave_service::summary(&pool, &user.employee_id).await?;
    Ok(HttpResponse::Ok().json(summary))
}
