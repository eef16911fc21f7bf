use actix_web::{HttpResponse, web};
use serde::Deserialize;
use serde_json::{Map, Value, json};
use sqlx::SqlitePool;
use tracing::instrument;
use utoipa::IntoParams;

use crate::auth::auth::AuthUser;
use crate::error::ApiError;
use crate::service::profile::{self as profile_service, ProfileSections};

#[derive(Debug, Deserialize, IntoParams)]
pub struct ProfileListQuery {
    /// Max rows (default 50)
    pub limit: Option<i64>,
    /// Rows to skip (default 0)
    pub offset: Option<i64>,
    /// Substring of name, email or employee id
    pub key: Option<String>,
}

/// Get an employee profile
#[utoipa::path(
    get,
    path = "/api/profile/{employee_id}",
    params(("employee_id" = String, Path, description = "Employee id")),
    responses(
        (status = 200, description = "Profile", body = EmployeeProfile),
        (status = 403, description = "Not your profile and not an admin or manager"),
        (status = 404, description = "Profile not found", body = Object, example = json!({"error": "Profile not found"}))
    ),
    security(("bearer_auth" = [])),
    tag = "Profiles"
)]
pub async fn get_profile(
    user: AuthUser,
    path: web::Path<String>,
    pool: web::Data<SqlitePool>,
) -> Result<HttpResponse, ApiError> {
    user.require_self_or_reviewer(&path)?;
    let profile = profile_service::get_profile(&pool, &path).await?;
    Ok(HttpResponse::Ok().json(profile))
}

/// Create or update profile sections
///
/// Only the sections present in the body are written.
#[utoipa::path(
    put,
    path = "/api/profile/{employee_id}",
    params(("employee_id" = String, Path, description = "Employee id")),
    request_body(content = Object, example = json!({
        "personal_details": {"first_name": "Jane", "last_name": "Doe", "dob": "1992-05-10"},
        "emergency_contacts": [{"name": "Sam Doe", "phone": "0211234567"}]
    })),
    responses(
        (status = 200, description = "Profile updated", body = Object, example = json!({"message": "Profile updated successfully"})),
        (status = 201, description = "Profile created", body = Object, example = json!({"message": "Profile created successfully"})),
        (status = 400, description = "A section has the wrong shape", body = Object, example = json!({
            "errors": {"dependents": ["Not a valid list."]}
        })),
        (status = 403, description = "Not your profile and not an admin"),
        (status = 404, description = "User not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Profiles"
)]
#[instrument(name = "upsert_profile_handler", skip(user, payload, pool))]
pub async fn upsert_profile(
    user: AuthUser,
    path: web::Path<String>,
    payload: web::Json<Map<String, Value>>,
    pool: web::Data<SqlitePool>,
) -> Result<HttpResponse, ApiError> {
    user.require_self_or_admin(&path)?;
    let sections = ProfileSections::from_json(&payload)?;

    let created = profile_service::upsert_profile(&pool, &path, sections).await?;

    Ok(if created {
        HttpResponse::Created().json(json!({ "message": "Profile created successfully" }))
    } else {
        HttpResponse::Ok().json(json!({ "message": "Profile updated successfully" }))
    })
}

/// List profiles with user details
#[utoipa::path(
    get,
    path = "/api/profiles",
    params(ProfileListQuery),
    responses(
        (status = 200, description = "Profiles", body = [ProfileSummary]),
        (status = 403, description = "Caller is not an admin")
    ),
    security(("bearer_auth" = [])),
    tag = "Profiles"
)]
pub async fn list_profiles(
    user: AuthUser,
    query: web::Query<ProfileListQuery>,
    pool: web::Data<SqlitePool>,
) -> Result<HttpResponse, ApiError> {
    user.require_admin()?;

    let profiles = profile_service::list_profiles(
        &pool,
        query.limit.unwrap_or(50),
        query.offset.unwrap_or(0),
        query.key.as_deref().unwrap_or_default(),
    )
    .await?;

    Ok(HttpResponse::Ok().json(profiles))
}
