use chrono::{NaiveDate, NaiveTime};
use sqlx::SqlitePool;
use strum_macros::{AsRefStr, EnumString};
use tracing::{info, instrument};

use crate::error::ApiError;
use crate::model::attendance::{
    ApprovalStatus, Attendance, AttendanceWithName, DEFAULT_MANUAL_STATUS, DEFAULT_REJECTION_REASON,
};
use crate::utils::dates::{now, today};
use crate::utils::db_utils::{Filters, SqlValue, bind_values};
use crate::utils::pagination::{Paginated, Pagination};

const ATTENDANCE_COLUMNS: &str = "a.id, a.employee_id, a.date, a.punch_in, a.punch_out, a.status, a.is_manual, \
                                  a.approval_status, a.reason, a.rejection_reason, a.reviewed_by";

/// Whitelisted sort columns for `my-records`; anything else falls back to `punch_in`.
#[derive(Debug, Default, Clone, Copy, PartialEq, EnumString, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum SortBy {
    #[default]
    PunchIn,
    PunchOut,
    Date,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, EnumString, AsRefStr)]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortBy {
    pub fn parse(value: Option<&str>) -> Self {
        value.and_then(|v| v.parse().ok()).unwrap_or_default()
    }
}

impl SortOrder {
    pub fn parse(value: Option<&str>) -> Self {
        value.and_then(|v| v.parse().ok()).unwrap_or_default()
    }
}

#[derive(Debug, Default)]
pub struct RecordQuery {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub sort_by: SortBy,
    pub order: SortOrder,
}

#[derive(Debug)]
pub struct ManualAttendance {
    pub date: NaiveDate,
    pub punch_in: NaiveTime,
    pub punch_out: NaiveTime,
    pub status: Option<String>,
    pub reason: Option<String>,
}

#[instrument(skip(pool))]
pub async fn punch_in(pool: &SqlitePool, employee_id: &str) -> Result<(), ApiError> {
    let already_in = || ApiError::bad_request("Already punched in today");
    let date = today();

    let existing: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM attendance WHERE employee_id = ? AND date = ? AND is_manual = 0",
    )
    .bind(employee_id)
    .bind(date)
    .fetch_one(pool)
    .await?;
    if existing > 0 {
        return Err(already_in());
    }

    let result = sqlx::query("INSERT INTO attendance (employee_id, date, punch_in, status) VALUES (?, ?, ?, 'Present')")
        .bind(employee_id)
        .bind(date)
        .bind(now())
        .execute(pool)
        .await;

    match result {
        Ok(_) => {
            info!("Punch in recorded");
            Ok(())
        }
        // lost a race against a concurrent punch-in
        Err(sqlx::Error::Database(db)) if db.is_unique_violation() => Err(already_in()),
        Err(e) => Err(e.into()),
    }
}

#[instrument(skip(pool))]
pub async fn punch_out(pool: &SqlitePool, employee_id: &str) -> Result<(), ApiError> {
    let result = sqlx::query(
        r#"
        UPDATE attendance
        SET punch_out = ?, updated_at = ?
        WHERE employee_id = ? AND date = ? AND is_manual = 0 AND punch_out IS NULL
        "#,
    )
    .bind(now())
    .bind(now())
    .bind(employee_id)
    .bind(today())
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::bad_request("No active punch-in found for today"));
    }

    info!("Punch out recorded");
    Ok(())
}

#[instrument(skip(pool, request))]
pub async fn request_manual(pool: &SqlitePool, employee_id: &str, request: ManualAttendance) -> Result<i64, ApiError> {
    if request.punch_out <= request.punch_in {
        return Err(ApiError::bad_request("punch_out must be after punch_in"));
    }

    let id = sqlx::query(
        r#"
        INSERT INTO attendance (employee_id, date, punch_in, punch_out, status, is_manual, approval_status, reason)
        VALUES (?, ?, ?, ?, ?, 1, ?, ?)
        "#,
    )
    .bind(employee_id)
    .bind(request.date)
    .bind(request.date.and_time(request.punch_in))
    .bind(request.date.and_time(request.punch_out))
    .bind(request.status.as_deref().unwrap_or(DEFAULT_MANUAL_STATUS))
    .bind(ApprovalStatus::Pending.as_ref())
    .bind(&request.reason)
    .execute(pool)
    .await?
    .last_insert_rowid();

    info!(record_id = id, "Manual attendance requested");
    Ok(id)
}

pub async fn my_records(pool: &SqlitePool, employee_id: &str, query: &RecordQuery) -> Result<Vec<Attendance>, ApiError> {
    let mut filters = Filters::default();
    filters.eq("a.employee_id", employee_id);
    if let Some(start) = query.start_date {
        filters.push("a.date >= ?", [SqlValue::from(start)]);
    }
    if let Some(end) = query.end_date {
        filters.push("a.date <= ?", [SqlValue::from(end)]);
    }

    let sql = format!(
        "SELECT {ATTENDANCE_COLUMNS} FROM attendance a{} ORDER BY a.{} {}",
        filters.where_sql(),
        query.sort_by.as_ref(),
        query.order.as_ref(),
    );

    Ok(bind_values!(sqlx::query_as::<_, Attendance>(&sql), filters.values())
        .fetch_all(pool)
        .await?)
}

pub async fn pending_requests(pool: &SqlitePool, p: Pagination) -> Result<Paginated<AttendanceWithName>, ApiError> {
    let total: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM attendance WHERE is_manual = 1 AND approval_status = ?",
    )
    .bind(ApprovalStatus::Pending.as_ref())
    .fetch_one(pool)
    .await?;

    let sql = format!(
        r#"
        SELECT {ATTENDANCE_COLUMNS}, u.name
        FROM attendance a
        JOIN users u ON u.employee_id = a.employee_id
        WHERE a.is_manual = 1 AND a.approval_status = ?
        ORDER BY a.date, a.id
        LIMIT ? OFFSET ?
        "#
    );
    let items = sqlx::query_as::<_, AttendanceWithName>(&sql)
        .bind(ApprovalStatus::Pending.as_ref())
        .bind(p.limit())
        .bind(p.offset())
        .fetch_all(pool)
        .await?;

    Ok(Paginated::new(items, total, p))
}

/// Loads a manual request that `reviewer` is allowed to decide on.
async fn reviewable(pool: &SqlitePool, id: i64, reviewer: &str, self_review_msg: &str) -> Result<Attendance, ApiError> {
    let sql = format!("SELECT {ATTENDANCE_COLUMNS} FROM attendance a WHERE a.id = ?");
    let record = sqlx::query_as::<_, Attendance>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| ApiError::not_found("Attendance record not found"))?;

    if record.employee_id == reviewer {
        return Err(ApiError::forbidden(self_review_msg));
    }

    let pending = record.is_manual && record.approval_status.as_deref() == Some(ApprovalStatus::Pending.as_ref());
    if !pending {
        return Err(ApiError::bad_request("Attendance request is not pending"));
    }

    Ok(record)
}

async fn decide(
    pool: &SqlitePool,
    id: i64,
    reviewer: &str,
    status: ApprovalStatus,
    rejection_reason: Option<&str>,
) -> Result<(), ApiError> {
    let result = sqlx::query(
        r#"
        UPDATE attendance
        SET approval_status = ?, rejection_reason = COALESCE(?, rejection_reason),
            reviewed_by = ?, updated_at = ?
        WHERE id = ? AND approval_status = ?
        "#,
    )
    .bind(status.as_ref())
    .bind(rejection_reason)
    .bind(reviewer)
    .bind(now())
    .bind(id)
    .bind(ApprovalStatus::Pending.as_ref())
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::bad_request("Attendance request is not pending"));
    }

    info!(record_id = id, reviewer, status = %status, "Attendance request reviewed");
    Ok(())
}

pub async fn approve(pool: &SqlitePool, id: i64, reviewer: &str) -> Result<(), ApiError> {
    reviewable(pool, id, reviewer, "Approver cannot be the same as the employee").await?;
    decide(pool, id, reviewer, ApprovalStatus::Approved, None).await
}

pub async fn reject(pool: &SqlitePool, id: i64, reviewer: &str, reason: Option<&str>) -> Result<(), ApiError> {
    reviewable(pool, id, reviewer, "Rejector cannot be the same as the employee").await?;
    let reason = reason.map(str::trim).filter(|r| !r.is_empty()).unwrap_or(DEFAULT_REJECTION_REASON);
    decide(pool, id, reviewer, ApprovalStatus::Rejected, Some(reason)).await
}

pub async fn search(
    pool: &SqlitePool,
    name: Option<&str>,
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
) -> Result<Vec<AttendanceWithName>, ApiError> {
    let mut filters = Filters::default();
    if let Some(name) = name.map(str::trim).filter(|n| !n.is_empty()) {
        filters.contains("u.name", name);
    }
    if let Some(start) = start_date {
        filters.push("a.date >= ?", [SqlValue::from(start)]);
    }
    if let Some(end) = end_date {
        filters.push("a.date <= ?", [SqlValue::from(end)]);
    }

    let sql = format!(
        r#"
        SELECT {ATTENDANCE_COLUMNS}, u.name
        FROM attendance a
        JOIN users u ON u.employee_id = a.employee_id
        {}
        ORDER BY a.date DESC, u.name
        "#,
        filters.where_sql()
    );

    Ok(bind_values!(sqlx::query_as::<_, AttendanceWithName>(&sql), filters.values())
        .fetch_all(pool)
        .await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_db;

    async fn pool_with_users() -> SqlitePool {
        let pool = init_db("sqlite::memory:").await.unwrap();
        for (eid, name) in [("EMP0001", "Admin"), ("EMP0002", "Jane Doe")] {
            sqlx::query("INSERT INTO users (employee_id, name, email, role, password_hash) VALUES (?, ?, ?, 'Employee', 'x')")
                .bind(eid)
                .bind(name)
                .bind(format!("{eid}@example.com"))
                .execute(&pool)
                .await
                .unwrap();
        }
        pool
    }

    fn manual() -> ManualAttendance {
        ManualAttendance {
            date: NaiveDate::from_ymd_opt(2026, 1, 5).unwrap(),
            punch_in: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            punch_out: NaiveTime::from_hms_opt(17, 0, 0).unwrap(),
            status: None,
            reason: Some("Forgot to punch in".into()),
        }
    }

    #[test]
    fn sort_params_fall_back_to_defaults() {
        assert_eq!(SortBy::parse(Some("punch_out")), SortBy::PunchOut);
        assert_eq!(SortBy::parse(Some("date")), SortBy::Date);
        assert_eq!(SortBy::parse(Some("name; DROP TABLE users")), SortBy::PunchIn);
        assert_eq!(SortBy::parse(None), SortBy::PunchIn);
        assert_eq!(SortOrder::parse(Some("desc")).as_ref(), "DESC");
        assert_eq!(SortOrder::parse(Some("sideways")), SortOrder::Asc);
    }

    #[actix_web::test]
    async fn punch_in_once_per_day() {
        let pool = pool_with_users().await;

        assert!(matches!(punch_out(&pool, "EMP0002").await, Err(ApiError::BadRequest(_))));
        punch_in(&pool, "EMP0002").await.unwrap();
        assert!(matches!(punch_in(&pool, "EMP0002").await, Err(ApiError::BadRequest(_))));

        punch_out(&pool, "EMP0002").await.unwrap();
        // the open record is closed now
        assert!(punch_out(&pool, "EMP0002").await.is_err());

        let records = my_records(&pool, "EMP0002", &RecordQuery::default()).await.unwrap();
        assert_eq!(records.len(), 1);
        assert!(records[0].punch_out.is_some());
    }

    #[actix_web::test]
    async fn manual_requests_need_another_reviewer() {
        let pool = pool_with_users().await;
        let id = request_manual(&pool, "EMP0002", manual()).await.unwrap();

        assert!(matches!(approve(&pool, id, "EMP0002").await, Err(ApiError::Forbidden(_))));
        assert!(matches!(approve(&pool, 999, "EMP0001").await, Err(ApiError::NotFound(_))));

        let pending = pending_requests(&pool, Pagination::new(None, None)).await.unwrap();
        assert_eq!(pending.total, 1);
        assert_eq!(pending.items[0].name, "Jane Doe");
        assert_eq!(pending.items[0].record.status, DEFAULT_MANUAL_STATUS);

        approve(&pool, id, "EMP0001").await.unwrap();
        assert!(matches!(reject(&pool, id, "EMP0001", None).await, Err(ApiError::BadRequest(_))));
    }

    #[actix_web::test]
    async fn rejection_reason_defaults() {
        let pool = pool_with_users().await;
        let id = request_manual(&pool, "EMP0002", manual()).await.unwrap();
        reject(&pool, id, "EMP0001", Some("  ")).await.unwrap();

        let found = search(&pool, Some("jane"), None, None).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].record.approval_status.as_deref(), Some("Rejected"));
        assert_eq!(found[0].record.rejection_reason.as_deref(), Some(DEFAULT_REJECTION_REASON));
    }

    #[actix_web::test]
    async fn manual_times_must_be_ordered() {
        let pool = pool_with_users().await;
        let mut request = manual();
        request.punch_out = request.punch_in;
        assert!(matches!(request_manual(&pool, "EMP0002", request).await, Err(ApiError::BadRequest(_))));
    }
}
