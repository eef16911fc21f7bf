use chrono::{NaiveDate, NaiveTime};
use serde::Serialize;
use std::collections::BTreeMap;

pub const MISSING: &str = "Missing data for required field.";
pub const INVALID_EMAIL: &str = "Not a valid email address.";
pub const INVALID_DATE: &str = "Not a valid date. Expected YYYY-MM-DD.";
pub const INVALID_TIME: &str = "Not a valid time. Expected HH:MM.";
pub const INVALID_MONTH: &str = "String does not match expected pattern YYYY-MM.";

/// Per-field error messages, serialized as `{"field": ["msg", ...]}`.
#[derive(Debug, Default, Serialize, PartialEq)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn add(&mut self, field: &str, msg: impl Into<String>) {
        self.0.entry(field.to_string()).or_default().push(msg.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn into_result(self) -> Result<(), FieldErrors> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }

    /// Trimmed value of a required string field; records an error if absent or blank.
    pub fn required<'a>(&mut self, field: &str, value: &'a Option<String>) -> Option<&'a str> {
        match value.as_deref().map(str::trim) {
            Some(v) if !v.is_empty() => Some(v),
            _ => {
                self.add(field, MISSING);
                None
            }
        }
    }

    pub fn email(&mut self, field: &str, value: &str) -> Option<String> {
        if is_valid_email(value) {
            Some(value.trim().to_lowercase())
        } else {
            self.add(field, INVALID_EMAIL);
            None
        }
    }

    pub fn date(&mut self, field: &str, value: &str) -> Option<NaiveDate> {
        match parse_date(value) {
            Some(d) => Some(d),
            None => {
                self.add(field, INVALID_DATE);
                None
            }
        }
    }

    pub fn time(&mut self, field: &str, value: &str) -> Option<NaiveTime> {
        match parse_time(value) {
            Some(t) => Some(t),
            None => {
                self.add(field, INVALID_TIME);
                None
            }
        }
    }

    pub fn month(&mut self, field: &str, value: &str) -> Option<String> {
        if is_valid_month(value) {
            Some(value.to_string())
        } else {
            self.add(field, INVALID_MONTH);
            None
        }
    }
}

/// Loose structural check: one `@`, non-empty local part, dotted domain, no spaces.
pub fn is_valid_email(value: &str) -> bool {
    let value = value.trim();
    if value.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    let labels: Vec<&str> = domain.split('.').collect();
    labels.len() >= 2 && labels.iter().all(|l| !l.is_empty())
}

pub fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").ok()
}

/// Accepts `HH:MM` and `HH:MM:SS`.
pub fn parse_time(value: &str) -> Option<NaiveTime> {
    let value = value.trim();
    NaiveTime::parse_from_str(value, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M:%S"))
        .ok()
}

/// `YYYY-MM` with a real month number.
pub fn is_valid_month(value: &str) -> bool {
    let bytes = value.as_bytes();
    bytes.len() == 7
        && bytes[4] == b'-'
        && bytes[..4].iter().all(u8::is_ascii_digit)
        && bytes[5..].iter().all(u8::is_ascii_digit)
        && matches!(value[5..].parse::<u32>(), Ok(1..=12))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_shapes() {
        assert!(is_valid_email("jane.doe@example.com"));
        assert!(is_valid_email("  ops@hr.example.co.nz "));
        assert!(!is_valid_email("not-an-email"));
        assert!(!is_valid_email("a@b"));
        assert!(!is_valid_email("@example.com"));
        assert!(!is_valid_email("a@@example.com"));
        assert!(!is_valid_email("a b@example.com"));
        assert!(!is_valid_email("a@example..com"));
    }

    #[test]
    fn month_pattern() {
        assert!(is_valid_month("2025-01"));
        assert!(is_valid_month("2025-12"));
        assert!(!is_valid_month("2025-13"));
        assert!(!is_valid_month("2025-00"));
        assert!(!is_valid_month("2025-1"));
        assert!(!is_valid_month("25-01-01"));
        assert!(!is_valid_month("2025-+1"));
    }

    #[test]
    fn times_with_or_without_seconds() {
        assert_eq!(parse_time("09:00"), NaiveTime::from_hms_opt(9, 0, 0));
        assert_eq!(parse_time("17:30:15"), NaiveTime::from_hms_opt(17, 30, 15));
        assert_eq!(parse_time("25:00"), None);
    }

    #[test]
    fn required_reports_missing_and_blank() {
        let mut errors = FieldErrors::default();
        let name = Some("  Jane ".to_string());
        let blank = Some("   ".to_string());

        assert_eq!(errors.required("name", &name), Some("Jane"));
        assert_eq!(errors.required("email", &None), None);
        assert_eq!(errors.required("role", &blank), None);

        assert!(errors.contains("email"));
        assert!(errors.contains("role"));
        assert!(!errors.contains("name"));
        assert!(errors.into_result().is_err());
    }
}
