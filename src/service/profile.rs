use serde_json::{Map, Value};
use sqlx::SqlitePool;
use tracing::info;

use crate::error::ApiError;
use crate::model::profile::{EmployeeProfile, PROFILE_SECTIONS, ProfileSummary};
use crate::service::user::get_user;
use crate::utils::dates::now;
use crate::utils::db_utils::SqlUpdate;
use crate::utils::validation::FieldErrors;

const PROFILE_COLUMNS: &str = "p.employee_id, p.personal_details, p.contact_details, p.emergency_contacts, \
                               p.dependents, p.job_details, p.salary_details, p.report_to, p.qualifications, \
                               p.updated_at";

/// Sections supplied in an update, already shape-checked.
#[derive(Debug, Default)]
pub struct ProfileSections(Vec<(&'static str, Value)>);

impl ProfileSections {
    /// Picks the known sections out of a JSON body; unknown keys are ignored.
    pub fn from_json(body: &Map<String, Value>) -> Result<Self, FieldErrors> {
        let mut errors = FieldErrors::default();
        let mut sections = Vec::new();

        for (name, shape) in PROFILE_SECTIONS {
            match body.get(name) {
                Some(value) if shape.accepts(value) => sections.push((name, value.clone())),
                Some(_) => errors.add(name, shape.expected()),
                None => {}
            }
        }

        errors.into_result()?;
        Ok(Self(sections))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

pub async fn get_profile(pool: &SqlitePool, employee_id: &str) -> Result<EmployeeProfile, ApiError> {
    let sql = format!("SELECT {PROFILE_COLUMNS} FROM employee_profiles p WHERE p.employee_id = ?");
    sqlx::query_as::<_, EmployeeProfile>(&sql)
        .bind(employee_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| ApiError::not_found("Profile not found"))
}

/// Writes the supplied sections. Returns `true` when the profile had to be created.
pub async fn upsert_profile(pool: &SqlitePool, employee_id: &str, sections: ProfileSections) -> Result<bool, ApiError> {
    let user = get_user(pool, employee_id).await?;

    let mut tx = pool.begin().await?;

    let created = sqlx::query("INSERT OR IGNORE INTO employee_profiles (employee_id) VALUES (?)")
        .bind(&user.employee_id)
        .execute(&mut *tx)
        .await?
        .rows_affected()
        == 1;

    let mut update = SqlUpdate::new("employee_profiles", "employee_id");
    for (column, value) in sections.0 {
        update.set(column, value.to_string());
    }
    update.set("updated_at", now());
    update.execute(&mut *tx, user.employee_id.as_str()).await?;

    tx.commit().await?;

    info!(employee_id, created, "Profile saved");
    Ok(created)
}

pub async fn list_profiles(pool: &SqlitePool, limit: i64, offset: i64, key: &str) -> Result<Vec<ProfileSummary>, ApiError> {
    let key = key.trim();
    let filter = if key.is_empty() {
        ""
    } else {
        "WHERE u.name LIKE ?1 OR u.email LIKE ?1 OR u.employee_id LIKE ?1"
    };

    let sql = format!(
        r#"
        SELECT {PROFILE_COLUMNS}, u.name, u.email, u.department
        FROM employee_profiles p
        JOIN users u ON u.employee_id = p.employee_id
        {filter}
        ORDER BY u.employee_id
        LIMIT ?2 OFFSET ?3
        "#
    );

    Ok(sqlx::query_as::<_, ProfileSummary>(&sql)
        .bind(format!("%{key}%"))
        .bind(limit.clamp(1, 500))
        .bind(offset.max(0))
        .fetch_all(pool)
        .await?)
}
