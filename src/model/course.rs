use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;
use sqlx::FromRow;
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Display, EnumString, AsRefStr)]
pub enum SubmissionStatus {
    Pending,
    Approved,
    Rejected,
}

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct Course {
    pub id: i64,
    #[schema(example = "Workplace Health and Safety")]
    pub name: String,
    pub description: Option<String>,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    #[schema(example = "Mandatory")]
    pub course_type: String,
    pub department: Option<String>,
    pub target_role: Option<String>,
    #[schema(value_type = Option<String>, format = "date")]
    pub deadline: Option<NaiveDate>,
    #[schema(value_type = String, format = "date-time")]
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct CourseSubmission {
    pub id: i64,
    pub employee_id: String,
    pub course_id: i64,
    pub completion_notes: Option<String>,
    #[schema(example = "Pending")]
    pub status: String,
    pub reviewer_comment: Option<String>,
    pub reviewed_by: Option<String>,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub reviewed_at: Option<NaiveDateTime>,
    #[schema(value_type = String, format = "date-time")]
    pub submitted_at: NaiveDateTime,
}

/// Submission joined with course (and, for reviewers, employee) names.
#[derive(Debug, Serialize, FromRow, ToSchema)]
pub struct SubmissionDetail {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub submission: CourseSubmission,
    pub course_name: String,
    #[sqlx(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub employee_name: Option<String>,
}
