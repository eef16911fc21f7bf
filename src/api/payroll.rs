use actix_web::http::header::{ContentDisposition, DispositionParam, DispositionType};
use actix_web::{HttpResponse, web};
use serde::Deserialize;
use serde_json::json;
use sqlx::SqlitePool;
use tracing::{info, instrument};
use utoipa::{IntoParams, ToSchema};

use crate::auth::auth::AuthUser;
use crate::error::ApiError;
use crate::model::payroll::{DEFAULT_CURRENCY, DEFAULT_PAY_FREQUENCY};
use crate::service::payroll::{self as payroll_service, NewPayroll};
use crate::utils::dates::today;
use crate::utils::pagination::{PageQuery, Pagination};
use crate::utils::pdf::{render_payslip, render_salary_report};
use crate::utils::validation::{FieldErrors, MISSING};

const NEGATIVE_AMOUNT: &str = "Must be greater than or equal to 0.";

#[derive(Debug, Deserialize, ToSchema)]
pub struct AddSalaryReq {
    #[schema(example = "EMP0002")]
    pub employee_id: Option<String>,
    #[schema(example = "2026-01")]
    pub salary_month: Option<String>,
    #[schema(example = 5000.0)]
    pub basic_salary: Option<f64>,
    #[schema(example = 500.0)]
    pub bonus: Option<f64>,
    #[schema(example = 250.0)]
    pub deductions: Option<f64>,
    #[schema(example = "NZD")]
    pub currency: Option<String>,
    #[schema(example = "Monthly")]
    pub pay_frequency: Option<String>,
    /// Defaults to the net salary
    pub direct_deposit_amount: Option<f64>,
}

fn non_negative(errors: &mut FieldErrors, field: &str, value: Option<f64>) -> Option<f64> {
    match value {
        Some(v) if v < 0.0 || !v.is_finite() => {
            errors.add(field, NEGATIVE_AMOUNT);
            None
        }
        other => other,
    }
}

fn text_or(value: &Option<String>, default: &str) -> String {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or(default)
        .to_string()
}

impl AddSalaryReq {
    fn validate(&self) -> Result<NewPayroll, ApiError> {
        let mut errors = FieldErrors::default();

        let employee_id = errors.required("employee_id", &self.employee_id);
        let salary_month = errors
            .required("salary_month", &self.salary_month)
            .and_then(|m| errors.month("salary_month", m));
        if self.basic_salary.is_none() {
            errors.add("basic_salary", MISSING);
        }
        let basic_salary = non_negative(&mut errors, "basic_salary", self.basic_salary);
        let bonus = non_negative(&mut errors, "bonus", self.bonus);
        let deductions = non_negative(&mut errors, "deductions", self.deductions);
        let direct_deposit_amount = non_negative(&mut errors, "direct_deposit_amount", self.direct_deposit_amount);

        let (Some(employee_id), Some(salary_month), Some(basic_salary)) = (employee_id, salary_month, basic_salary)
        else {
            return Err(errors.into());
        };
        errors.into_result()?;

        Ok(NewPayroll {
            employee_id: employee_id.to_string(),
            salary_month,
            basic_salary,
            bonus: bonus.unwrap_or(0.0),
            deductions: deductions.unwrap_or(0.0),
            currency: text_or(&self.currency, DEFAULT_CURRENCY),
            pay_frequency: text_or(&self.pay_frequency, DEFAULT_PAY_FREQUENCY),
            direct_deposit_amount,
        })
    }
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct SalaryRecordsQuery {
    /// YYYY-MM
    pub month: Option<String>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct PayslipQuery {
    /// YYYY-MM
    pub month: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct ExportQuery {
    pub employee_id: Option<String>,
    /// YYYY-MM
    pub month: Option<String>,
}

fn month_filter(errors: &mut FieldErrors, value: &Option<String>) -> Option<String> {
    let value = value.as_deref().map(str::trim).filter(|v| !v.is_empty())?;
    errors.month("month", value)
}

fn pdf_response(filename: String, bytes: Vec<u8>) -> HttpResponse {
    HttpResponse::Ok()
        .content_type("application/pdf")
        .insert_header(ContentDisposition {
            disposition: DispositionType::Attachment,
            parameters: vec![DispositionParam::Filename(filename)],
        })
        .body(bytes)
}

async fn records_page(
    pool: &SqlitePool,
    employee_id: &str,
    query: &SalaryRecordsQuery,
) -> Result<HttpResponse, ApiError> {
    let mut errors = FieldErrors::default();
    let month = month_filter(&mut errors, &query.month);
    errors.into_result()?;

    let page = payroll_service::employee_records(
        pool,
        employee_id,
        month.as_deref(),
        Pagination::new(query.page, query.per_page),
    )
    .await?;
    Ok(HttpResponse::Ok().json(page))
}

/// Add a monthly salary record
#[utoipa::path(
    post,
    path = "/api/salary/add",
    request_body = AddSalaryReq,
    responses(
        (status = 201, description = "Record added", body = Object, example = json!({
            "message": "Salary record added successfully"
        })),
        (status = 400, description = "Invalid fields", body = Object, example = json!({
            "errors": {"salary_month": ["String does not match expected pattern YYYY-MM."]}
        })),
        (status = 403, description = "Caller is not an admin"),
        (status = 404, description = "Employee not found"),
        (status = 409, description = "A record for that month already exists")
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
#[instrument(name = "add_salary_handler", skip_all)]
pub async fn add_salary(
    user: AuthUser,
    payload: web::Json<AddSalaryReq>,
    pool: web::Data<SqlitePool>,
) -> Result<HttpResponse, ApiError> {
    user.require_admin()?;
    let payroll = payload.validate()?;

    payroll_service::add_record(&pool, payroll).await?;

    Ok(HttpResponse::Created().json(json!({ "message": "Salary record added successfully" })))
}

/// The caller's salary records
#[utoipa::path(
    get,
    path = "/api/salary/my-records",
    params(SalaryRecordsQuery),
    responses(
        (status = 200, description = "One page of records, newest month first", body = Object, example = json!({
            "items": [{"id": 3, "employee_id": "EMP0002", "name": "Jane Doe", "salary_month": "2026-01",
                       "basic_salary": 5000.0, "bonus": 500.0, "deductions": 250.0, "net_salary": 5250.0,
                       "currency": "NZD", "pay_frequency": "Monthly", "direct_deposit_amount": 5250.0,
                       "generated_at": "2026-01-31T09:00:00"}],
            "total": 1, "page": 1, "per_page": 10, "total_pages": 1
        })),
        (status = 400, description = "Malformed month")
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn my_records(
    user: AuthUser,
    query: web::Query<SalaryRecordsQuery>,
    pool: web::Data<SqlitePool>,
) -> Result<HttpResponse, ApiError> {
    records_page(&pool, &user.employee_id, &query).await
}

/// Download the caller's payslip for a month
#[utoipa::path(
    get,
    path = "/api/salary/my-records/payslip",
    params(PayslipQuery),
    responses(
        (status = 200, description = "PDF payslip (application/pdf attachment)"),
        (status = 400, description = "Missing or malformed month"),
        (status = 404, description = "Salary record not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn payslip(
    user: AuthUser,
    query: web::Query<PayslipQuery>,
    pool: web::Data<SqlitePool>,
) -> Result<HttpResponse, ApiError> {
    let mut errors = FieldErrors::default();
    let Some(month) = errors.required("month", &query.month).and_then(|m| errors.month("month", m)) else {
        return Err(errors.into());
    };

    let record = payroll_service::payslip(&pool, &user.employee_id, &month).await?;
    let bytes = render_payslip(&record.name, &record)?;

    info!(month = %month, "Payslip rendered");
    Ok(pdf_response(format!("Payslip_{}_{}.pdf", user.employee_id, month), bytes))
}

/// One employee's salary records
#[utoipa::path(
    get,
    path = "/api/salary/employee/{employee_id}",
    params(
        ("employee_id" = String, Path, description = "Employee id"),
        SalaryRecordsQuery
    ),
    responses(
        (status = 200, description = "One page of records"),
        (status = 403, description = "Caller is not an admin")
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn employee_records(
    user: AuthUser,
    path: web::Path<String>,
    query: web::Query<SalaryRecordsQuery>,
    pool: web::Data<SqlitePool>,
) -> Result<HttpResponse, ApiError> {
    user.require_admin()?;
    records_page(&pool, &path, &query).await
}

/// All salary records, most recently generated first
#[utoipa::path(
    get,
    path = "/api/salary/employee",
    params(PageQuery),
    responses(
        (status = 200, description = "One page of records"),
        (status = 403, description = "Caller is not an admin")
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn all_records(
    user: AuthUser,
    query: web::Query<PageQuery>,
    pool: web::Data<SqlitePool>,
) -> Result<HttpResponse, ApiError> {
    user.require_admin()?;
    let page = payroll_service::all_records(&pool, Pagination::from(&*query)).await?;
    Ok(HttpResponse::Ok().json(page))
}

/// Salary report as a PDF table
#[utoipa::path(
    get,
    path = "/api/salary/export-pdf",
    params(ExportQuery),
    responses(
        (status = 200, description = "PDF report (application/pdf attachment)"),
        (status = 403, description = "Caller is not an admin"),
        (status = 404, description = "No salary records found")
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn export_pdf(
    user: AuthUser,
    query: web::Query<ExportQuery>,
    pool: web::Data<SqlitePool>,
) -> Result<HttpResponse, ApiError> {
    user.require_admin()?;

    let mut errors = FieldErrors::default();
    let month = month_filter(&mut errors, &query.month);
    errors.into_result()?;
    let employee_id = query.employee_id.as_deref().map(str::trim).filter(|e| !e.is_empty());

    let rows = payroll_service::export_rows(&pool, employee_id, month.as_deref()).await?;
    let bytes = render_salary_report(&rows)?;

    info!(rows = rows.len(), "Salary report rendered");
    Ok(pdf_response("Salary_Report.pdf".to_string(), bytes))
}

/// Days until the next payday
#[utoipa::path(
    get,
    path = "/api/salary/countdown",
    responses(
        (status = 200, description = "Countdown", body = SalaryCountdown),
        (status = 404, description = "No salary records found")
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn countdown(user: AuthUser, pool: web::Data<SqlitePool>) -> Result<HttpResponse, ApiError> {
    let countdown = payroll_service::countdown(&pool, &user.employee_id, today()).await?;
    Ok(HttpResponse::Ok().json(countdown))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn req() -> AddSalaryReq {
        AddSalaryReq {
            employee_id: Some("EMP0002".into()),
            salary_month: Some("2026-01".into()),
            basic_salary: Some(5000.0),
            bonus: None,
            deductions: None,
            currency: None,
            pay_frequency: Some(" ".into()),
            direct_deposit_amount: None,
        }
    }

    #[test]
    fn defaults_fill_optional_fields() {
        let payroll = req().validate().unwrap();
        assert_eq!(payroll.bonus, 0.0);
        assert_eq!(payroll.currency, "NZD");
        assert_eq!(payroll.pay_frequency, "Monthly");
        assert_eq!(payroll.net_salary(), 5000.0);
    }

    #[test]
    fn amounts_and_month_are_checked() {
        let mut bad = req();
        bad.salary_month = Some("2026-1".into());
        bad.deductions = Some(-1.0);

        let Err(ApiError::Validation(errors)) = bad.validate() else {
            panic!("expected validation errors");
        };
        assert!(errors.contains("salary_month"));
        assert!(errors.contains("deductions"));

        let mut missing = req();
        missing.basic_salary = None;
        assert!(matches!(missing.validate(), Err(ApiError::Validation(_))));
    }
}
