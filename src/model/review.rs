use chrono::NaiveDateTime;
use serde::Serialize;
use sqlx::FromRow;
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct PerformanceReview {
    pub id: i64,
    #[schema(example = "EMP0002")]
    pub employee_id: String,
    #[schema(example = 4, minimum = 1, maximum = 5)]
    pub rating: i64,
    pub comments: String,
    #[schema(example = "EMP0001")]
    pub reviewer_id: String,
    #[schema(value_type = String, format = "date-time")]
    pub created_at: NaiveDateTime,
}
