use chrono::NaiveDate;
use sqlx::{SqliteConnection, SqlitePool};
use std::collections::HashMap;
use std::str::FromStr;
use tracing::{info, instrument, warn};

use crate::error::ApiError;
use crate::model::leave::{Leave, LeaveBalance, LeaveStatus, LeaveSummary, LeaveType, LeaveWithUser};
use crate::service::user::get_user;
use crate::utils::dates::{inclusive_days, now};
use crate::utils::db_utils::{Filters, SqlValue, bind_values};
use crate::utils::pagination::{Paginated, Pagination};

const LEAVE_COLUMNS: &str = "l.id, l.employee_id, l.leave_type, l.start_date, l.end_date, l.days, l.reason, \
                             l.status, l.reviewed_by, l.reviewed_at, l.created_at";

#[derive(Debug)]
pub struct LeaveApplication {
    pub leave_type: LeaveType,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub reason: String,
}

fn balance_not_found() -> ApiError {
    ApiError::not_found("Balance not found")
}

async fn fetch_balance(conn: &mut SqliteConnection, employee_id: &str) -> Result<Option<LeaveBalance>, sqlx::Error> {
    sqlx::query_as::<_, LeaveBalance>(
        "SELECT employee_id, annual, casual, sick, maternity FROM leave_balances WHERE employee_id = ?",
    )
    .bind(employee_id)
    .fetch_optional(conn)
    .await
}

pub async fn balance(pool: &SqlitePool, employee_id: &str) -> Result<LeaveBalance, ApiError> {
    let mut conn = pool.acquire().await?;
    fetch_balance(&mut conn, employee_id).await?.ok_or_else(balance_not_found)
}

/// Records a pending leave. The balance is only checked here, deducted on approval.
#[instrument(skip(pool, application), fields(leave_type = %application.leave_type))]
pub async fn apply(pool: &SqlitePool, employee_id: &str, application: LeaveApplication) -> Result<(i64, i64), ApiError> {
    if application.start_date > application.end_date {
        return Err(ApiError::bad_request("start_date cannot be after end_date"));
    }

    let days = inclusive_days(application.start_date, application.end_date);
    let remaining = balance(pool, employee_id).await?.remaining(application.leave_type);
    if days > remaining {
        info!(days, remaining, "Leave refused: insufficient balance");
        return Err(ApiError::bad_request(format!(
            "Insufficient {} balance",
            application.leave_type
        )));
    }

    let id = sqlx::query(
        r#"
        INSERT INTO leaves (employee_id, leave_type, start_date, end_date, days, reason, status)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(employee_id)
    .bind(application.leave_type.as_ref())
    .bind(application.start_date)
    .bind(application.end_date)
    .bind(days)
    .bind(&application.reason)
    .bind(LeaveStatus::Pending.as_ref())
    .execute(pool)
    .await?
    .last_insert_rowid();

    info!(leave_id = id, days, "Leave applied");
    Ok((id, days))
}

pub async fn get_leave(pool: &SqlitePool, id: i64) -> Result<Leave, ApiError> {
    let sql = format!("SELECT {LEAVE_COLUMNS} FROM leaves l WHERE l.id = ?");
    sqlx::query_as::<_, Leave>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| ApiError::not_found("Leave request not found"))
}

/// Approves or rejects a pending leave. Approval deducts the balance in the same
/// transaction; the guarded UPDATE keeps balances from going negative.
#[instrument(skip(pool))]
pub async fn review(pool: &SqlitePool, id: i64, reviewer: &str, status: LeaveStatus) -> Result<(), ApiError> {
    if status == LeaveStatus::Pending {
        return Err(ApiError::bad_request("Invalid status. Must be Approved or Rejected"));
    }

    let leave = get_leave(pool, id).await?;
    if leave.employee_id == reviewer {
        return Err(ApiError::forbidden("Admins cannot approve their own leave requests"));
    }
    if leave.status != LeaveStatus::Pending.as_ref() {
        return Err(ApiError::bad_request("Leave request is not pending"));
    }

    let mut tx = pool.begin().await?;

    if status == LeaveStatus::Approved {
        let leave_type = LeaveType::from_str(&leave.leave_type)
            .map_err(|_| ApiError::internal(format!("leave {id} has unknown type {:?}", leave.leave_type)))?;

        let remaining = fetch_balance(&mut tx, &leave.employee_id)
            .await?
            .ok_or_else(balance_not_found)?
            .remaining(leave_type);

        let insufficient = || {
            ApiError::bad_request(format!(
                "Insufficient {leave_type} balance ({remaining} remaining, {} requested)",
                leave.days
            ))
        };
        if remaining < leave.days {
            return Err(insufficient());
        }

        let column = leave_type.column();
        let deducted = sqlx::query(&format!(
            "UPDATE leave_balances SET {column} = {column} - ? WHERE employee_id = ? AND {column} >= ?"
        ))
        .bind(leave.days)
        .bind(&leave.employee_id)
        .bind(leave.days)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if deducted == 0 {
            warn!(leave_id = id, "Balance changed under approval");
            return Err(insufficient());
        }
    }

    let updated = sqlx::query(
        "UPDATE leaves SET status = ?, reviewed_by = ?, reviewed_at = ?, updated_at = ? WHERE id = ? AND status = ?",
    )
    .bind(status.as_ref())
    .bind(reviewer)
    .bind(now())
    .bind(now())
    .bind(id)
    .bind(LeaveStatus::Pending.as_ref())
    .execute(&mut *tx)
    .await?
    .rows_affected();

    if updated == 0 {
        return Err(ApiError::bad_request("Leave request is not pending"));
    }

    tx.commit().await?;

    info!(leave_id = id, reviewer, status = %status, "Leave reviewed");
    Ok(())
}

async fn paged_leaves(pool: &SqlitePool, filters: &Filters, order_by: &str, p: Pagination) -> Result<Paginated<Leave>, ApiError> {
    let count_sql = format!("SELECT COUNT(*) FROM leaves l{}", filters.where_sql());
    let total: i64 = bind_values!(sqlx::query_scalar::<_, i64>(&count_sql), filters.values())
        .fetch_one(pool)
        .await?;

    let sql = format!(
        "SELECT {LEAVE_COLUMNS} FROM leaves l{} ORDER BY {order_by} LIMIT ? OFFSET ?",
        filters.where_sql()
    );
    let items = bind_values!(sqlx::query_as::<_, Leave>(&sql), filters.values())
        .bind(p.limit())
        .bind(p.offset())
        .fetch_all(pool)
        .await?;

    Ok(Paginated::new(items, total, p))
}

async fn paged_with_user(pool: &SqlitePool, filters: &Filters, order_by: &str, p: Pagination) -> Result<Paginated<LeaveWithUser>, ApiError> {
    let from = "FROM leaves l JOIN users u ON u.employee_id = l.employee_id";

    let count_sql = format!("SELECT COUNT(*) {from}{}", filters.where_sql());
    let total: i64 = bind_values!(sqlx::query_scalar::<_, i64>(&count_sql), filters.values())
        .fetch_one(pool)
        .await?;

    let sql = format!(
        "SELECT {LEAVE_COLUMNS}, u.name, u.email, u.role {from}{} ORDER BY {order_by} LIMIT ? OFFSET ?",
        filters.where_sql()
    );
    let items = bind_values!(sqlx::query_as::<_, LeaveWithUser>(&sql), filters.values())
        .bind(p.limit())
        .bind(p.offset())
        .fetch_all(pool)
        .await?;

    Ok(Paginated::new(items, total, p))
}

pub async fn my_leaves(pool: &SqlitePool, employee_id: &str, p: Pagination) -> Result<Paginated<Leave>, ApiError> {
    let mut filters = Filters::default();
    filters.eq("l.employee_id", employee_id);
    paged_leaves(pool, &filters, "l.created_at DESC, l.id DESC", p).await
}

/// Leave history of one employee, for admins.
pub async fn employee_leaves(pool: &SqlitePool, employee_id: &str, p: Pagination) -> Result<Paginated<Leave>, ApiError> {
    get_user(pool, employee_id).await?;
    my_leaves(pool, employee_id, p).await
}

pub async fn pending(pool: &SqlitePool, p: Pagination) -> Result<Paginated<LeaveWithUser>, ApiError> {
    let mut filters = Filters::default();
    filters.eq("l.status", LeaveStatus::Pending.as_ref());
    paged_with_user(pool, &filters, "l.start_date, l.id", p).await
}

/// Leaves of users matching `name` that lie entirely within the date range.
pub async fn search(
    pool: &SqlitePool,
    name: &str,
    start_date: NaiveDate,
    end_date: NaiveDate,
    p: Pagination,
) -> Result<Paginated<LeaveWithUser>, ApiError> {
    let mut filters = Filters::default();
    filters
        .contains("u.name", name.trim())
        .push("l.start_date >= ?", [SqlValue::from(start_date)])
        .push("l.end_date <= ?", [SqlValue::from(end_date)]);
    paged_with_user(pool, &filters, "l.start_date, l.id", p).await
}

/// Dashboard rows: remaining + approved usage per type.
pub fn summarize(balance: &LeaveBalance, used: &HashMap<LeaveType, i64>) -> Vec<LeaveSummary> {
    [LeaveType::Annual, LeaveType::Sick, LeaveType::Casual]
        .into_iter()
        .map(|t| {
            let used = used.get(&t).copied().unwrap_or(0);
            LeaveSummary {
                leave_type: t.title().to_string(),
                total: balance.remaining(t) + used,
                used,
            }
        })
        .collect()
}

pub async fn summary(pool: &SqlitePool, employee_id: &str) -> Result<Vec<LeaveSummary>, ApiError> {
    let mut conn = pool.acquire().await?;
    let Some(balance) = fetch_balance(&mut conn, employee_id).await? else {
        return Ok(Vec::new());
    };

    let rows: Vec<(String, i64)> = sqlx::query_as(
        "SELECT leave_type, SUM(days) FROM leaves WHERE employee_id = ? AND status = ? GROUP BY leave_type",
    )
    .bind(employee_id)
    .bind(LeaveStatus::Approved.as_ref())
    .fetch_all(&mut *conn)
    .await?;

    let used = rows
        .into_iter()
        .filter_map(|(t, days)| LeaveType::from_str(&t).ok().map(|t| (t, days)))
        .collect();

    Ok(summarize(&balance, &used))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_db;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    async fn setup() -> SqlitePool {
        let pool = init_db("sqlite::memory:").await.unwrap();
        for (eid, name) in [("EMP0001", "Admin"), ("EMP0002", "Jane Doe")] {
            sqlx::query("INSERT INTO users (employee_id, name, email, role, password_hash) VALUES (?, ?, ?, 'Employee', 'x')")
                .bind(eid)
                .bind(name)
                .bind(format!("{eid}@example.com"))
                .execute(&pool)
                .await
                .unwrap();
            sqlx::query("INSERT INTO leave_balances (employee_id, annual, casual, sick, maternity) VALUES (?, 21, 10, 8, 90)")
                .bind(eid)
                .execute(&pool)
                .await
                .unwrap();
        }
        pool
    }

    fn application(leave_type: LeaveType, start: &str, end: &str) -> LeaveApplication {
        LeaveApplication {
            leave_type,
            start_date: d(start),
            end_date: d(end),
            reason: "Family trip".into(),
        }
    }

    #[actix_web::test]
    async fn apply_checks_dates_and_balance() {
        let pool = setup().await;

        let (_, days) = apply(&pool, "EMP0002", application(LeaveType::Annual, "2026-03-02", "2026-03-06"))
            .await
            .unwrap();
        assert_eq!(days, 5);

        assert!(matches!(
            apply(&pool, "EMP0002", application(LeaveType::Annual, "2026-03-06", "2026-03-02")).await,
            Err(ApiError::BadRequest(_))
        ));
        assert!(matches!(
            apply(&pool, "EMP0002", application(LeaveType::Sick, "2026-03-01", "2026-03-09")).await,
            Err(ApiError::BadRequest(msg)) if msg == "Insufficient sick balance"
        ));
        assert!(matches!(
            apply(&pool, "EMP0404", application(LeaveType::Sick, "2026-03-01", "2026-03-01")).await,
            Err(ApiError::NotFound(_))
        ));

        // nothing is deducted until approval
        assert_eq!(balance(&pool, "EMP0002").await.unwrap().annual, 21);
    }

    #[actix_web::test]
    async fn approval_deducts_once() {
        let pool = setup().await;
        let (id, _) = apply(&pool, "EMP0002", application(LeaveType::Casual, "2026-04-01", "2026-04-03"))
            .await
            .unwrap();

        assert!(matches!(
            review(&pool, id, "EMP0002", LeaveStatus::Approved).await,
            Err(ApiError::Forbidden(_))
        ));

        review(&pool, id, "EMP0001", LeaveStatus::Approved).await.unwrap();
        assert_eq!(balance(&pool, "EMP0002").await.unwrap().casual, 7);

        assert!(matches!(
            review(&pool, id, "EMP0001", LeaveStatus::Rejected).await,
            Err(ApiError::BadRequest(_))
        ));
        assert_eq!(balance(&pool, "EMP0002").await.unwrap().casual, 7);

        let leave = get_leave(&pool, id).await.unwrap();
        assert_eq!(leave.status, "Approved");
        assert_eq!(leave.reviewed_by.as_deref(), Some("EMP0001"));
    }

    #[actix_web::test]
    async fn approval_rechecks_balance() {
        let pool = setup().await;
        let (first, _) = apply(&pool, "EMP0002", application(LeaveType::Sick, "2026-05-04", "2026-05-08"))
            .await
            .unwrap();
        let (second, _) = apply(&pool, "EMP0002", application(LeaveType::Sick, "2026-06-01", "2026-06-05"))
            .await
            .unwrap();

        review(&pool, first, "EMP0001", LeaveStatus::Approved).await.unwrap();
        let err = review(&pool, second, "EMP0001", LeaveStatus::Approved).await.unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(msg) if msg.contains("3 remaining, 5 requested")));

        assert_eq!(balance(&pool, "EMP0002").await.unwrap().sick, 3);
        assert_eq!(get_leave(&pool, second).await.unwrap().status, "Pending");
    }

    #[actix_web::test]
    async fn rejection_keeps_balance_and_listings_filter() {
        let pool = setup().await;
        let (id, _) = apply(&pool, "EMP0002", application(LeaveType::Annual, "2026-07-01", "2026-07-02"))
            .await
            .unwrap();

        let pending_before = pending(&pool, Pagination::new(None, None)).await.unwrap();
        assert_eq!(pending_before.total, 1);
        assert_eq!(pending_before.items[0].name, "Jane Doe");

        review(&pool, id, "EMP0001", LeaveStatus::Rejected).await.unwrap();
        assert_eq!(balance(&pool, "EMP0002").await.unwrap().annual, 21);
        assert_eq!(pending(&pool, Pagination::new(None, None)).await.unwrap().total, 0);

        let found = search(&pool, "jane", d("2026-06-01"), d("2026-07-31"), Pagination::new(None, None))
            .await
            .unwrap();
        assert_eq!(found.total, 1);
        let outside = search(&pool, "jane", d("2026-07-02"), d("2026-07-31"), Pagination::new(None, None))
            .await
            .unwrap();
        assert_eq!(outside.total, 0);
    }

    #[test]
    fn summary_adds_usage_back() {
        let balance = LeaveBalance {
            employee_id: "EMP0002".into(),
            annual: 16,
            casual: 10,
            sick: 6,
            maternity: 90,
        };
        let used = HashMap::from([(LeaveType::Annual, 5), (LeaveType::Sick, 2)]);

        let rows = summarize(&balance, &used);
        assert_eq!(
            rows,
            vec![
                LeaveSummary { leave_type: "Annual".into(), total: 21, used: 5 },
                LeaveSummary { leave_type: "Sick".into(), total: 8, used: 2 },
                LeaveSummary { leave_type: "Casual".into(), total: 10, used: 0 },
            ]
        );
    }
}
