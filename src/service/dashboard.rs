use chrono::{Datelike, Duration, NaiveDate, Weekday};
use serde::Serialize;
use sqlx::{FromRow, SqlitePool};
use std::collections::BTreeMap;
use utoipa::ToSchema;

use crate::error::ApiError;
use crate::model::attendance::{ApprovalStatus, WeeklyChartEntry};
use crate::model::leave::LeaveStatus;
use crate::model::role::Role;
use crate::model::user::UserStatus;

const WEEK: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

pub const UNASSIGNED_DEPARTMENT: &str = "Unassigned";

#[derive(Debug, Serialize, ToSchema)]
pub struct DashboardStats {
    pub total_employees: i64,
    pub pending_requests: i64,
    pub approved_requests: i64,
    pub employees_on_leave: i64,
}

#[derive(Debug, Clone, FromRow)]
pub struct DailyAttendance {
    pub date: NaiveDate,
    pub present: i64,
    pub absent: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct GrowthPoint {
    #[schema(example = "Jan")]
    pub month: String,
    pub employees: i64,
}

pub async fn stats(pool: &SqlitePool, today: NaiveDate) -> Result<DashboardStats, ApiError> {
    let total_employees: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE status = ?")
        .bind(UserStatus::Active.as_ref())
        .fetch_one(pool)
        .await?;

    let manual_count = "SELECT COUNT(*) FROM attendance WHERE is_manual = 1 AND approval_status = ?";
    let pending_requests: i64 = sqlx::query_scalar(manual_count)
        .bind(ApprovalStatus::Pending.as_ref())
        .fetch_one(pool)
        .await?;
    let approved_requests: i64 = sqlx::query_scalar(manual_count)
        .bind(ApprovalStatus::Approved.as_ref())
        .fetch_one(pool)
        .await?;

    let employees_on_leave: i64 = sqlx::query_scalar(
        "SELECT COUNT(DISTINCT employee_id) FROM leaves WHERE status = ? AND start_date <= ? AND end_date >= ?",
    )
    .bind(LeaveStatus::Approved.as_ref())
    .bind(today)
    .bind(today)
    .fetch_one(pool)
    .await?;

    Ok(DashboardStats {
        total_employees,
        pending_requests,
        approved_requests,
        employees_on_leave,
    })
}

fn attendance_rate(present: i64, absent: i64) -> f64 {
    let counted = present + absent;
    if counted == 0 {
        return 0.0;
    }
    (present as f64 / counted as f64 * 10000.0).round() / 100.0
}

/// Lays daily totals out Mon..Sun. Days without data keep zeros and an empty date.
pub fn build_weekly_chart(days: &[DailyAttendance]) -> Vec<WeeklyChartEntry> {
    WEEK.iter()
        .map(|weekday| {
            let day = days.iter().find(|d| d.date.weekday() == *weekday);
            let (date, present, absent) = match day {
                Some(d) => (d.date.format("%Y-%m-%d").to_string(), d.present, d.absent),
                None => (String::new(), 0, 0),
            };
            WeeklyChartEntry {
                name: weekday.to_string(),
                date,
                present,
                absent,
                attendance_rate: attendance_rate(present, absent),
            }
        })
        .collect()
}

/// Present/absent totals of active users over the seven days ending `today`.
pub async fn weekly_chart(
    pool: &SqlitePool,
    department: Option<&str>,
    today: NaiveDate,
) -> Result<Vec<WeeklyChartEntry>, ApiError> {
    let department_filter = if department.is_some() { "AND u.department = ?" } else { "" };
    let sql = format!(
        r#"
        SELECT a.date AS date,
               SUM(CASE WHEN a.status = 'Present' THEN 1 ELSE 0 END) AS present,
               SUM(CASE WHEN a.status IN ('Absent', 'Leave') THEN 1 ELSE 0 END) AS absent
        FROM attendance a
        JOIN users u ON u.employee_id = a.employee_id
        WHERE a.date BETWEEN ? AND ? AND u.status = ? {department_filter}
        GROUP BY a.date
        ORDER BY a.date
        "#
    );

    let mut query = sqlx::query_as::<_, DailyAttendance>(&sql)
        .bind(today - Duration::days(6))
        .bind(today)
        .bind(UserStatus::Active.as_ref());
    if let Some(department) = department {
        query = query.bind(department);
    }

    let days = query.fetch_all(pool).await?;
    Ok(build_weekly_chart(&days))
}

/// Cumulative head count per `YYYY-MM` month, keeping the last `limit` months.
pub fn build_growth(monthly_hires: &[(String, i64)], limit: usize) -> Vec<GrowthPoint> {
    let mut running = 0;
    let cumulative: Vec<GrowthPoint> = monthly_hires
        .iter()
        .map(|(month, hires)| {
            running += hires;
            let label = NaiveDate::parse_from_str(&format!("{month}-01"), "%Y-%m-%d")
                .map(|d| d.format("%b").to_string())
                .unwrap_or_else(|_| month.clone());
            GrowthPoint {
                month: label,
                employees: running,
            }
        })
        .collect();

    let skip = cumulative.len().saturating_sub(limit);
    cumulative.into_iter().skip(skip).collect()
}

pub async fn employee_growth(pool: &SqlitePool, limit: usize) -> Result<Vec<GrowthPoint>, ApiError> {
    let monthly: Vec<(String, i64)> = sqlx::query_as(
        r#"
        SELECT strftime('%Y-%m', created_at) AS month, COUNT(*) AS hires
        FROM users
        WHERE status = ? AND role <> ?
        GROUP BY month
        ORDER BY month
        "#,
    )
    .bind(UserStatus::Active.as_ref())
    .bind(Role::Admin.as_ref())
    .fetch_all(pool)
    .await?;

    Ok(build_growth(&monthly, limit))
}

pub async fn department_counts(pool: &SqlitePool) -> Result<BTreeMap<String, i64>, ApiError> {
    let rows: Vec<(String, i64)> = sqlx::query_as(
        r#"
        SELECT COALESCE(NULLIF(TRIM(department), ''), ?) AS department, COUNT(*) AS total
        FROM users
        WHERE status = ? AND role <> ?
        GROUP BY 1
        "#,
    )
    .bind(UNASSIGNED_DEPARTMENT)
    .bind(UserStatus::Active.as_ref())
    .bind(Role::Admin.as_ref())
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().collect())
}
