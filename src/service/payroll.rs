use chrono::NaiveDate;
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::{info, instrument};
use utoipa::ToSchema;

use crate::error::ApiError;
use crate::model::payroll::{PayrollRecord, PayrollWithName};
use crate::service::user::find_by_employee_id;
use crate::utils::dates::last_day_of_month;
use crate::utils::db_utils::{Filters, bind_values};
use crate::utils::pagination::{Paginated, Pagination};

const PAYROLL_COLUMNS: &str = "r.id, r.employee_id, r.salary_month, r.basic_salary, r.bonus, r.deductions, \
                               r.net_salary, r.currency, r.pay_frequency, r.direct_deposit_amount, r.generated_at";

#[derive(Debug, Clone)]
pub struct NewPayroll {
    pub employee_id: String,
    pub salary_month: String,
    pub basic_salary: f64,
    pub bonus: f64,
    pub deductions: f64,
    pub currency: String,
    pub pay_frequency: String,
    pub direct_deposit_amount: Option<f64>,
}

impl NewPayroll {
    pub fn net_salary(&self) -> f64 {
        self.basic_salary + self.bonus - self.deductions
    }
}

/// Next payday derived from the latest salary record.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct SalaryCountdown {
    #[schema(example = "2026-01")]
    pub salary_month: String,
    #[schema(value_type = String, format = "date", example = "2026-01-31")]
    pub next_payday: NaiveDate,
    pub days_remaining: i64,
    pub expected_amount: f64,
    pub currency: String,
    pub pay_frequency: String,
}

impl SalaryCountdown {
    /// Payday is the last day of the record's month; past paydays count as 0 days away.
    pub fn from_record(record: &PayrollRecord, today: NaiveDate) -> Option<Self> {
        let next_payday = last_day_of_month(&record.salary_month)?;
        Some(Self {
            salary_month: record.salary_month.clone(),
            next_payday,
            days_remaining: (next_payday - today).num_days().max(0),
            expected_amount: record.direct_deposit_amount,
            currency: record.currency.clone(),
            pay_frequency: record.pay_frequency.clone(),
        })
    }
}

#[instrument(skip(pool, payroll), fields(employee_id = %payroll.employee_id, month = %payroll.salary_month))]
pub async fn add_record(pool: &SqlitePool, payroll: NewPayroll) -> Result<i64, ApiError> {
    if find_by_employee_id(pool, &payroll.employee_id).await?.is_none() {
        return Err(ApiError::not_found("Employee not found"));
    }

    let net = payroll.net_salary();
    let result = sqlx::query(
        r#"
        INSERT INTO payroll_records
            (employee_id, salary_month, basic_salary, bonus, deductions, net_salary,
             currency, pay_frequency, direct_deposit_amount)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&payroll.employee_id)
    .bind(&payroll.salary_month)
    .bind(payroll.basic_salary)
    .bind(payroll.bonus)
    .bind(payroll.deductions)
    .bind(net)
    .bind(&payroll.currency)
    .bind(&payroll.pay_frequency)
    .bind(payroll.direct_deposit_amount.unwrap_or(net))
    .execute(pool)
    .await;

    match result {
        Ok(done) => {
            info!(net, "Salary record added");
            Ok(done.last_insert_rowid())
        }
        Err(sqlx::Error::Database(db)) if db.is_unique_violation() => Err(ApiError::conflict(
            "Salary record for this month already exists",
        )),
        Err(e) => Err(e.into()),
    }
}

async fn paged(pool: &SqlitePool, filters: &Filters, order_by: &str, p: Pagination) -> Result<Paginated<PayrollWithName>, ApiError> {
    let from = "FROM payroll_records r JOIN users u ON u.employee_id = r.employee_id";

    let count_sql = format!("SELECT COUNT(*) {from}{}", filters.where_sql());
    let total: i64 = bind_values!(sqlx::query_scalar::<_, i64>(&count_sql), filters.values())
        .fetch_one(pool)
        .await?;

    let sql = format!(
        "SELECT {PAYROLL_COLUMNS}, u.name {from}{} ORDER BY {order_by} LIMIT ? OFFSET ?",
        filters.where_sql()
    );
    let items = bind_values!(sqlx::query_as::<_, PayrollWithName>(&sql), filters.values())
        .bind(p.limit())
        .bind(p.offset())
        .fetch_all(pool)
        .await?;

    Ok(Paginated::new(items, total, p))
}

/// One employee's records, optionally narrowed to a month, newest month first.
pub async fn employee_records(
    pool: &SqlitePool,
    employee_id: &str,
    month: Option<&str>,
    p: Pagination,
) -> Result<Paginated<PayrollWithName>, ApiError> {
    let mut filters = Filters::default();
    filters.eq("r.employee_id", employee_id);
    if let Some(month) = month {
        filters.eq("r.salary_month", month);
    }
    paged(pool, &filters, "r.salary_month DESC, r.id DESC", p).await
}

pub async fn all_records(pool: &SqlitePool, p: Pagination) -> Result<Paginated<PayrollWithName>, ApiError> {
    paged(pool, &Filters::default(), "r.generated_at DESC, r.id DESC", p).await
}

pub async fn payslip(pool: &SqlitePool, employee_id: &str, month: &str) -> Result<PayrollWithName, ApiError> {
    let sql = format!(
        r#"
        SELECT {PAYROLL_COLUMNS}, u.name
        FROM payroll_records r
        JOIN users u ON u.employee_id = r.employee_id
        WHERE r.employee_id = ? AND r.salary_month = ?
        "#
    );
    sqlx::query_as::<_, PayrollWithName>(&sql)
        .bind(employee_id)
        .bind(month)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| ApiError::not_found("Salary record not found"))
}

/// Rows for the PDF report; an empty result is a 404.
pub async fn export_rows(
    pool: &SqlitePool,
    employee_id: Option<&str>,
    month: Option<&str>,
) -> Result<Vec<PayrollWithName>, ApiError> {
    let mut filters = Filters::default();
    if let Some(employee_id) = employee_id {
        filters.eq("r.employee_id", employee_id);
    }
    if let Some(month) = month {
        filters.eq("r.salary_month", month);
    }

    let sql = format!(
        r#"
        SELECT {PAYROLL_COLUMNS}, u.name
        FROM payroll_records r
        JOIN users u ON u.employee_id = r.employee_id
        {}
        ORDER BY r.salary_month DESC, r.employee_id
        "#,
        filters.where_sql()
    );
    let rows = bind_values!(sqlx::query_as::<_, PayrollWithName>(&sql), filters.values())
        .fetch_all(pool)
        .await?;

    if rows.is_empty() {
        return Err(ApiError::not_found("No salary records found"));
    }
    Ok(rows)
}

pub async fn countdown(pool: &SqlitePool, employee_id: &str, today: NaiveDate) -> Result<SalaryCountdown, ApiError> {
    let sql = format!(
        "SELECT {PAYROLL_COLUMNS} FROM payroll_records r WHERE r.employee_id = ? ORDER BY r.salary_month DESC LIMIT 1"
    );
    let latest = sqlx::query_as::<_, PayrollRecord>(&sql)
        .bind(employee_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| ApiError::not_found("No salary records found"))?;

    SalaryCountdown::from_record(&latest, today)
        .ok_or_else(|| ApiError::internal(format!("malformed salary_month {:?}", latest.salary_month)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_db;
    use chrono::NaiveDateTime;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn payroll(month: &str) -> NewPayroll {
        NewPayroll {
            employee_id: "EMP0002".into(),
            salary_month: month.into(),
            basic_salary: 5000.0,
            bonus: 500.0,
            deductions: 250.0,
            currency: "NZD".into(),
            pay_frequency: "Monthly".into(),
            direct_deposit_amount: None,
        }
    }

    async fn setup() -> SqlitePool {
        let pool = init_db("sqlite::memory:").await.unwrap();
        sqlx::query("INSERT INTO users (employee_id, name, email, role, password_hash) VALUES ('EMP0002', 'Jane Doe', 'jane@example.com', 'Employee', 'x')")
            .execute(&pool)
            .await
            .unwrap();
        pool
    }

    #[test]
    fn countdown_clamps_at_zero() {
        let record = PayrollRecord {
            id: 1,
            employee_id: "EMP0002".into(),
            salary_month: "2026-02".into(),
            basic_salary: 1.0,
            bonus: 0.0,
            deductions: 0.0,
            net_salary: 1.0,
            currency: "NZD".into(),
            pay_frequency: "Monthly".into(),
            direct_deposit_amount: 1.0,
            generated_at: NaiveDateTime::default(),
        };

        let before = SalaryCountdown::from_record(&record, d("2026-02-20")).unwrap();
        assert_eq!(before.next_payday, d("2026-02-28"));
        assert_eq!(before.days_remaining, 8);

        let after = SalaryCountdown::from_record(&record, d("2026-03-05")).unwrap();
        assert_eq!(after.days_remaining, 0);
    }

    #[actix_web::test]
    async fn net_and_direct_deposit_defaults() {
        let pool = setup().await;
        add_record(&pool, payroll("2026-01")).await.unwrap();

        let slip = payslip(&pool, "EMP0002", "2026-01").await.unwrap();
        assert_eq!(slip.net_salary, 5250.0);
        assert_eq!(slip.direct_deposit_amount, 5250.0);
        assert_eq!(slip.name, "Jane Doe");
    }

    #[actix_web::test]
    async fn one_record_per_month() {
        let pool = setup().await;
        add_record(&pool, payroll("2026-01")).await.unwrap();
        assert!(matches!(add_record(&pool, payroll("2026-01")).await, Err(ApiError::Conflict(_))));

        let mut stranger = payroll("2026-01");
        stranger.employee_id = "EMP0404".into();
        assert!(matches!(add_record(&pool, stranger).await, Err(ApiError::NotFound(_))));
    }

    #[actix_web::test]
    async fn listings_and_countdown_use_latest_month() {
        let pool = setup().await;
        for month in ["2026-01", "2026-03", "2026-02"] {
            add_record(&pool, payroll(month)).await.unwrap();
        }

        let page = employee_records(&pool, "EMP0002", None, Pagination::new(None, None)).await.unwrap();
        let months: Vec<&str> = page.items.iter().map(|r| r.salary_month.as_str()).collect();
        assert_eq!(months, ["2026-03", "2026-02", "2026-01"]);

        let only = employee_records(&pool, "EMP0002", Some("2026-02"), Pagination::new(None, None)).await.unwrap();
        assert_eq!(only.total, 1);

        let countdown = countdown(&pool, "EMP0002", d("2026-03-10")).await.unwrap();
        assert_eq!(countdown.next_payday, d("2026-03-31"));
        assert_eq!(countdown.days_remaining, 21);

        assert!(matches!(export_rows(&pool, Some("EMP0404"), None).await, Err(ApiError::NotFound(_))));
        assert_eq!(export_rows(&pool, None, None).await.unwrap().len(), 3);
    }
}
