use chrono::NaiveDateTime;
use serde::Serialize;
use sqlx::FromRow;
use std::str::FromStr;
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

use super::role::Role;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Display, EnumString, AsRefStr)]
pub enum UserStatus {
    Active,
    Inactive,
}

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct User {
    /// Internal row id; clients address users by `employee_id`.
    #[serde(skip_serializing)]
    pub id: i64,
    #[schema(example = "EMP0001")]
    pub employee_id: String,
    #[schema(example = "Jane Doe")]
    pub name: String,
    #[schema(example = "jane@example.com")]
    pub email: String,
    pub phone: Option<String>,
    #[schema(example = "Engineering")]
    pub department: Option<String>,
    #[schema(example = "Employee")]
    pub role: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    #[schema(example = "Active")]
    pub status: String,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub last_login_at: Option<NaiveDateTime>,
    #[schema(value_type = String, format = "date-time")]
    pub created_at: NaiveDateTime,
    #[schema(value_type = String, format = "date-time")]
    pub updated_at: NaiveDateTime,
}

impl User {
    pub fn role(&self) -> Option<Role> {
        Role::from_str(&self.role).ok()
    }

    pub fn is_active(&self) -> bool {
        self.status == UserStatus::Active.as_ref()
    }
}
