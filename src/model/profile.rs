use chrono::NaiveDateTime;
use serde::Serialize;
use serde_json::Value;
use sqlx::{FromRow, types::Json};
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionShape {
    Object,
    List,
}

/// Profile sections in column order with the JSON shape each must hold.
pub const PROFILE_SECTIONS: [(&str, SectionShape); 8] = [
    ("personal_details", SectionShape::Object),
    ("contact_details", SectionShape::Object),
    ("emergency_contacts", SectionShape::List),
    ("dependents", SectionShape::List),
    ("job_details", SectionShape::Object),
    ("salary_details", SectionShape::Object),
    ("report_to", SectionShape::Object),
    ("qualifications", SectionShape::List),
];

impl SectionShape {
    pub fn accepts(self, value: &Value) -> bool {
        match self {
            SectionShape::Object => value.is_object(),
            SectionShape::List => value.is_array(),
        }
    }

    pub fn expected(self) -> &'static str {
        match self {
            SectionShape::Object => "Not a valid mapping type.",
            SectionShape::List => "Not a valid list.",
        }
    }
}

#[derive(Debug, Serialize, FromRow, ToSchema)]
pub struct EmployeeProfile {
    #[schema(example = "EMP0002")]
    pub employee_id: String,
    #[schema(value_type = Object)]
    pub personal_details: Json<Value>,
    #[schema(value_type = Object)]
    pub contact_details: Json<Value>,
    #[schema(value_type = Vec<Object>)]
    pub emergency_contacts: Json<Value>,
    #[schema(value_type = Vec<Object>)]
    pub dependents: Json<Value>,
    #[schema(value_type = Object)]
    pub job_details: Json<Value>,
    #[schema(value_type = Object)]
    pub salary_details: Json<Value>,
    #[schema(value_type = Object)]
    pub report_to: Json<Value>,
    #[schema(value_type = Vec<Object>)]
    pub qualifications: Json<Value>,
    #[schema(value_type = String, format = "date-time")]
    pub updated_at: NaiveDateTime,
}

/// Profile row joined with the owning user, for the admin listing.
#[derive(Debug, Serialize, FromRow, ToSchema)]
pub struct ProfileSummary {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub profile: EmployeeProfile,
    pub name: String,
    pub email: String,
    pub department: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn shapes() {
        assert!(SectionShape::Object.accepts(&json!({"dob": "1990-01-01"})));
        assert!(!SectionShape::Object.accepts(&json!([])));
        assert!(SectionShape::List.accepts(&json!([{"name": "Sam"}])));
        assert!(!SectionShape::List.accepts(&json!("Sam")));
    }
}
