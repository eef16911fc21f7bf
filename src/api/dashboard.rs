use actix_web::{HttpResponse, web};
use serde::Deserialize;
use serde_json::json;
use sqlx::SqlitePool;
use utoipa::IntoParams;

use crate::auth::auth::AuthUser;
use crate::error::ApiError;
use crate::service::dashboard as dashboard_service;
use crate::utils::dates::today;

const DEFAULT_GROWTH_MONTHS: usize = 12;
const MAX_GROWTH_MONTHS: usize = 120;

#[derive(Debug, Deserialize, IntoParams)]
pub struct WeeklyChartQuery {
    /// Only count employees of this department
    pub department: Option<String>,
}

/// Raw `limit`, parsed by [`growth_limit`].
#[derive(Debug, Deserialize, IntoParams)]
pub struct GrowthQuery {
    /// Months to return (default 12)
    pub limit: Option<String>,
}

fn growth_limit(raw: Option<&str>) -> Result<usize, ApiError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(DEFAULT_GROWTH_MONTHS),
        Some(v) => v
            .parse::<usize>()
            .ok()
            .filter(|n| *n > 0)
            .map(|n| n.min(MAX_GROWTH_MONTHS))
            .ok_or_else(|| ApiError::bad_request("limit must be a positive integer")),
    }
}

/// Headline numbers for the admin dashboard
#[utoipa::path(
    get,
    path = "/api/dashboard/stats",
    responses(
        (status = 200, description = "Counts", body = DashboardStats),
        (status = 403, description = "Caller is not an admin")
    ),
    security(("bearer_auth" = [])),
    tag = "Dashboard"
)]
pub async fn stats(user: AuthUser, pool: web::Data<SqlitePool>) -> Result<HttpResponse, ApiError> {
    user.require_admin()?;
    let stats = dashboard_service::stats(&pool, today()).await?;
    Ok(HttpResponse::Ok().json(stats))
}

/// Present/absent counts for the last seven days, Monday first
#[utoipa::path(
    get,
    path = "/api/attendance/weekly-chart",
    params(WeeklyChartQuery),
    responses(
        (status = 200, description = "Seven entries, Mon..Sun", body = [WeeklyChartEntry]),
        (status = 403, description = "Caller is not an admin")
    ),
    security(("bearer_auth" = [])),
    tag = "Dashboard"
)]
pub async fn weekly_chart(
    user: AuthUser,
    query: web::Query<WeeklyChartQuery>,
    pool: web::Data<SqlitePool>,
) -> Result<HttpResponse, ApiError> {
    user.require_admin()?;
    let department = query.department.as_deref().map(str::trim).filter(|d| !d.is_empty());
    let chart = dashboard_service::weekly_chart(&pool, department, today()).await?;
    Ok(HttpResponse::Ok().json(chart))
}

/// Cumulative head count by month
#[utoipa::path(
    get,
    path = "/api/dashboard/employee-growth",
    params(GrowthQuery),
    responses(
        (status = 200, description = "Monthly growth", body = Object, example = json!({
            "success": true,
            "data": [{"month": "Dec", "employees": 3}, {"month": "Jan", "employees": 6}],
            "timeframe": "monthly"
        })),
        (status = 400, description = "Non-numeric limit"),
        (status = 403, description = "Caller is not an admin")
    ),
    security(("bearer_auth" = [])),
    tag = "Dashboard"
)]
pub async fn employee_growth(
    user: AuthUser,
    query: web::Query<GrowthQuery>,
    pool: web::Data<SqlitePool>,
) -> Result<HttpResponse, ApiError> {
    user.require_admin()?;
    let limit = growth_limit(query.limit.as_deref())?;

    let data = dashboard_service::employee_growth(&pool, limit).await?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "data": data,
        "timeframe": "monthly",
    })))
}

/// Active non-admin employees per department
#[utoipa::path(
    get,
    path = "/api/dashboard/department-counts",
    responses(
        (status = 200, description = "Counts keyed by department", body = Object, example = json!({
            "success": true,
            "data": {"Engineering": 12, "Sales": 4}
        })),
        (status = 403, description = "Caller is not an admin")
    ),
    security(("bearer_auth" = [])),
    tag = "Dashboard"
)]
pub async fn department_counts(user: AuthUser, pool: web::Data<SqlitePool>) -> Result<HttpResponse, ApiError> {
    user.require_admin()?;
    let data = dashboard_service::department_counts(&pool).await?;
    Ok(HttpResponse::Ok().json(json!({ "success": true, "data": data })))
}
