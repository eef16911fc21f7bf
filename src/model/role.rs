use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};
use utoipa::ToSchema;

/// Stored as text; parsed case-insensitively.
#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Display, EnumString, AsRefStr, EnumIter, Serialize, Deserialize, ToSchema,
)]
#[strum(ascii_case_insensitive)]
pub enum Role {
    Admin,
    Manager,
    Employee,
}

impl Role {
    pub fn is_admin(self) -> bool {
        self == Role::Admin
    }

    pub fn can_review(self) -> bool {
        matches!(self, Role::Admin | Role::Manager)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use strum::IntoEnumIterator;

    #[test]
    fn parses_any_case() {
        assert_eq!(Role::from_str("admin").unwrap(), Role::Admin);
        assert_eq!(Role::from_str("MANAGER").unwrap(), Role::Manager);
        assert!(Role::from_str("Hr").is_err());
    }

    #[test]
    fn display_matches_stored_text() {
        let names: Vec<String> = Role::iter().map(|r| r.to_string()).collect();
        assert_eq!(names, ["Admin", "Manager", "Employee"]);
    }
}
