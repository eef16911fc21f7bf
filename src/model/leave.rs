use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;
use sqlx::FromRow;
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};
use utoipa::ToSchema;

/// Leave categories; the lowercase name doubles as the balance column.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Display, EnumString, AsRefStr, EnumIter)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum LeaveType {
    Annual,
    Casual,
    Sick,
    Maternity,
}

impl LeaveType {
    /// Yearly allowance a new employee starts with.
    pub fn default_balance(self) -> i64 {
        match self {
            LeaveType::Annual => 21,
            LeaveType::Casual => 10,
            LeaveType::Sick => 8,
            LeaveType::Maternity => 90,
        }
    }

    pub fn column(self) -> &'static str {
        match self {
            LeaveType::Annual => "annual",
            LeaveType::Casual => "casual",
            LeaveType::Sick => "sick",
            LeaveType::Maternity => "maternity",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            LeaveType::Annual => "Annual",
            LeaveType::Casual => "Casual",
            LeaveType::Sick => "Sick",
            LeaveType::Maternity => "Maternity",
        }
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Display, EnumString, AsRefStr)]
pub enum LeaveStatus {
    Pending,
    Approved,
    Rejected,
}

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct Leave {
    pub id: i64,
    #[schema(example = "EMP0002")]
    pub employee_id: String,
    #[schema(example = "annual")]
    pub leave_type: String,
    #[schema(value_type = String, format = "date", example = "2026-03-02")]
    pub start_date: NaiveDate,
    #[schema(value_type = String, format = "date", example = "2026-03-04")]
    pub end_date: NaiveDate,
    #[schema(example = 3)]
    pub days: i64,
    pub reason: String,
    #[schema(example = "Pending")]
    pub status: String,
    pub reviewed_by: Option<String>,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub reviewed_at: Option<NaiveDateTime>,
    #[schema(value_type = String, format = "date-time")]
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Serialize, FromRow, ToSchema)]
pub struct LeaveWithUser {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub leave: Leave,
    pub name: String,
    pub email: String,
    pub role: String,
}

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct LeaveBalance {
    pub employee_id: String,
    pub annual: i64,
    pub casual: i64,
    pub sick: i64,
    pub maternity: i64,
}

impl LeaveBalance {
    pub fn remaining(&self, leave_type: LeaveType) -> i64 {
        match leave_type {
            LeaveType::Annual => self.annual,
            LeaveType::Casual => self.casual,
            LeaveType::Sick => self.sick,
            LeaveType::Maternity => self.maternity,
        }
    }
}

/// Per-type usage on the employee dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct LeaveSummary {
    #[serde(rename = "type")]
    #[schema(example = "Annual")]
    pub leave_type: String,
    pub total: i64,
    pub used: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use strum::IntoEnumIterator;

    #[test]
    fn parses_and_prints_lowercase() {
        assert_eq!(LeaveType::from_str("Annual").unwrap(), LeaveType::Annual);
        assert_eq!(LeaveType::from_str("sick").unwrap(), LeaveType::Sick);
        assert!(LeaveType::from_str("unpaid").is_err());
        assert_eq!(LeaveType::Maternity.to_string(), "maternity");
    }

    #[test]
    fn columns_follow_names() {
        for t in LeaveType::iter() {
            assert_eq!(t.column(), t.to_string());
        }
    }
}
