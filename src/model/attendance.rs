use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;
use sqlx::FromRow;
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Display, EnumString, AsRefStr)]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
}

pub const DEFAULT_MANUAL_STATUS: &str = "Manual Edit";
pub const DEFAULT_REJECTION_REASON: &str = "No reason provided";

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct Attendance {
    pub id: i64,
    #[schema(example = "EMP0002")]
    pub employee_id: String,
    #[schema(value_type = String, format = "date", example = "2026-01-05")]
    pub date: NaiveDate,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub punch_in: Option<NaiveDateTime>,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub punch_out: Option<NaiveDateTime>,
    #[schema(example = "Present")]
    pub status: String,
    pub is_manual: bool,
    #[schema(example = "Pending")]
    pub approval_status: Option<String>,
    pub reason: Option<String>,
    pub rejection_reason: Option<String>,
    pub reviewed_by: Option<String>,
}

#[derive(Debug, Serialize, FromRow, ToSchema)]
pub struct AttendanceWithName {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub record: Attendance,
    pub name: String,
}

/// One bar of the weekly attendance chart.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct WeeklyChartEntry {
    #[schema(example = "Mon")]
    pub name: String,
    #[schema(example = "2026-01-05")]
    pub date: String,
    pub present: i64,
    pub absent: i64,
    #[schema(example = 87.5)]
    pub attendance_rate: f64,
}
