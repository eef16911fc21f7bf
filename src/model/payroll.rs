use chrono::NaiveDateTime;
use serde::Serialize;
use sqlx::FromRow;
use utoipa::ToSchema;

pub const DEFAULT_CURRENCY: &str = "NZD";
pub const DEFAULT_PAY_FREQUENCY: &str = "Monthly";

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct PayrollRecord {
    pub id: i64,
    #[schema(example = "EMP0002")]
    pub employee_id: String,
    #[schema(example = "2026-01")]
    pub salary_month: String,
    #[schema(example = 5000.0)]
    pub basic_salary: f64,
    pub bonus: f64,
    pub deductions: f64,
    pub net_salary: f64,
    #[schema(example = "NZD")]
    pub currency: String,
    #[schema(example = "Monthly")]
    pub pay_frequency: String,
    pub direct_deposit_amount: f64,
    #[schema(value_type = String, format = "date-time")]
    pub generated_at: NaiveDateTime,
}

#[derive(Debug, Serialize, FromRow, ToSchema)]
pub struct PayrollWithName {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub record: PayrollRecord,
    pub name: String,
}

impl std::ops::Deref for PayrollWithName {
    type Target = PayrollRecord;

    fn deref(&self) -> &PayrollRecord {
        &self.record
    }
}
