use actix_web::{HttpResponse, web};
use serde::Deserialize;
use serde_json::json;
use sqlx::SqlitePool;
use std::str::FromStr;
use tracing::{debug, instrument};
use utoipa::{IntoParams, ToSchema};

use crate::auth::auth::AuthUser;
use crate::error::ApiError;
use crate::model::role::Role;
use crate::service::user::{self as user_service, NewUser, UserChanges};
use crate::utils::email_index::EmailIndex;
use crate::utils::pagination::{PageQuery, Pagination};
use crate::utils::validation::FieldErrors;

const INVALID_ROLE: &str = "Must be one of: Admin, Manager, Employee.";

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateUserReq {
    #[schema(example = "Jane Doe")]
    pub name: Option<String>,
    #[schema(example = "jane@example.com", format = "email")]
    pub email: Option<String>,
    #[schema(example = "0211234567")]
    pub phone: Option<String>,
    #[schema(example = "Engineering")]
    pub department: Option<String>,
    #[schema(example = "Employee")]
    pub role: Option<String>,
    #[schema(example = "password123")]
    pub password: Option<String>,
}

/// Every field is optional; only supplied fields change. A blank phone or
/// department clears the stored value.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdateUserReq {
    pub name: Option<String>,
    #[schema(format = "email")]
    pub email: Option<String>,
    pub phone: Option<String>,
    pub department: Option<String>,
    #[schema(example = "Manager")]
    pub role: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct UserSearchQuery {
    /// Substring of the user's name
    pub name: Option<String>,
}

fn optional(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
}

/// Sent and blank becomes `Some(None)`, which clears the column.
fn clearable(value: &Option<String>) -> Option<Option<String>> {
    value.as_ref().map(|_| optional(value))
}

fn parse_role(errors: &mut FieldErrors, value: &str) -> Option<Role> {
    match Role::from_str(value.trim()) {
        Ok(role) => Some(role),
        Err(_) => {
            errors.add("role", INVALID_ROLE);
            None
        }
    }
}

impl CreateUserReq {
    fn validate(&self) -> Result<NewUser, ApiError> {
        let mut errors = FieldErrors::default();

        let name = errors.required("name", &self.name);
        let email = errors.required("email", &self.email).and_then(|e| errors.email("email", e));
        let role = errors.required("role", &self.role).and_then(|r| parse_role(&mut errors, r));
        let password = errors.required("password", &self.password);

        match (name, email, role, password) {
            (Some(name), Some(email), Some(role), Some(password)) if errors.is_empty() => Ok(NewUser {
                name: name.to_string(),
                email,
                phone: optional(&self.phone),
                department: optional(&self.department),
                role,
                password: password.to_string(),
            }),
            _ => Err(errors.into()),
        }
    }
}

impl UpdateUserReq {
    fn validate(&self) -> Result<UserChanges, ApiError> {
        let mut errors = FieldErrors::default();

        let name = match &self.name {
            Some(_) => errors.required("name", &self.name).map(String::from),
            None => None,
        };
        let email = self.email.as_deref().and_then(|e| errors.email("email", e));
        let role = self.role.as_deref().and_then(|r| parse_role(&mut errors, r));

        errors.into_result()?;

        Ok(UserChanges {
            name,
            email,
            phone: clearable(&self.phone),
            department: clearable(&self.department),
            role,
        })
    }
}

/// Create a user
#[utoipa::path(
    post,
    path = "/api/users",
    request_body = CreateUserReq,
    responses(
        (status = 201, description = "User created", body = Object, example = json!({
            "message": "User created", "id": "EMP0002"
        })),
        (status = 400, description = "Invalid fields or duplicate email", body = Object, example = json!({
            "errors": {"email": ["Not a valid email address."]}
        })),
        (status = 403, description = "Caller is not an admin")
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
#[instrument(name = "create_user_handler", skip_all)]
pub async fn create_user(
    user: AuthUser,
    payload: web::Json<CreateUserReq>,
    pool: web::Data<SqlitePool>,
    index: web::Data<EmailIndex>,
) -> Result<HttpResponse, ApiError> {
    user.require_admin()?;
    let new_user = payload.validate()?;

    let created = user_service::create_user(&pool, &index, new_user).await?;

    Ok(HttpResponse::Created().json(json!({
        "message": "User created",
        "id": created.employee_id,
    })))
}

/// List users, newest first
#[utoipa::path(
    get,
    path = "/api/users",
    params(PageQuery),
    responses(
        (status = 200, description = "One page of users", body = Object, example = json!({
            "items": [{"employee_id": "EMP0002", "name": "Jane Doe", "email": "jane@example.com",
                       "phone": null, "department": "Engineering", "role": "Employee", "status": "Active",
                       "last_login_at": null, "created_at": "2026-01-05T09:00:00", "updated_at": "2026-01-05T09:00:00"}],
            "total": 1, "page": 1, "per_page": 10, "total_pages": 1
        })),
        (status = 403, description = "Caller is not an admin")
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn list_users(
    user: AuthUser,
    query: web::Query<PageQuery>,
    pool: web::Data<SqlitePool>,
) -> Result<HttpResponse, ApiError> {
    user.require_admin()?;
    let page = user_service::list_users(&pool, Pagination::from(&*query)).await?;
    Ok(HttpResponse::Ok().json(page))
}

/// Search users by name
#[utoipa::path(
    get,
    path = "/api/users/search",
    params(UserSearchQuery),
    responses(
        (status = 200, description = "Matching users", body = [User]),
        (status = 400, description = "Missing name"),
        (status = 403, description = "Caller is not an admin")
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn search_users(
    user: AuthUser,
    query: web::Query<UserSearchQuery>,
    pool: web::Data<SqlitePool>,
) -> Result<HttpResponse, ApiError> {
    user.require_admin()?;

    let mut errors = FieldErrors::default();
    let Some(name) = errors.required("name", &query.name) else {
        return Err(errors.into());
    };

    let users = user_service::search_users(&pool, name).await?;
    debug!(name, found = users.len(), "User search");
    Ok(HttpResponse::Ok().json(users))
}

/// The caller's own account
#[utoipa::path(
    get,
    path = "/api/users/me",
    responses(
        (status = 200, description = "Current user", body = User),
        (status = 401, description = "Missing or invalid token")
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn me(user: AuthUser, pool: web::Data<SqlitePool>) -> Result<HttpResponse, ApiError> {
    let me = user_service::get_user(&pool, &user.employee_id).await?;
    Ok(HttpResponse::Ok().json(me))
}

/// Get one user
#[utoipa::path(
    get,
    path = "/api/users/{employee_id}",
    params(("employee_id" = String, Path, description = "Employee id, e.g. EMP0002")),
    responses(
        (status = 200, description = "User", body = User),
        (status = 403, description = "Caller is not an admin"),
        (status = 404, description = "User not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn get_user(
    user: AuthUser,
    path: web::Path<String>,
    pool: web::Data<SqlitePool>,
) -> Result<HttpResponse, ApiError> {
    user.require_admin()?;
    let found = user_service::get_user(&pool, &path).await?;
    Ok(HttpResponse::Ok().json(found))
}

/// Update a user
#[utoipa::path(
    put,
    path = "/api/users/{employee_id}",
    params(("employee_id" = String, Path, description = "Employee id")),
    request_body = UpdateUserReq,
    responses(
        (status = 200, description = "Updated", body = Object, example = json!({"message": "User updated"})),
        (status = 400, description = "Invalid fields or duplicate email"),
        (status = 403, description = "Caller is not an admin"),
        (status = 404, description = "User not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn update_user(
    user: AuthUser,
    path: web::Path<String>,
    payload: web::Json<UpdateUserReq>,
    pool: web::Data<SqlitePool>,
    index: web::Data<EmailIndex>,
) -> Result<HttpResponse, ApiError> {
    user.require_admin()?;
    let changes = payload.validate()?;

    user_service::update_user(&pool, &index, &path, changes).await?;

    Ok(HttpResponse::Ok().json(json!({ "message": "User updated" })))
}

/// Deactivate a user (soft delete)
#[utoipa::path(
    put,
    path = "/api/users/{employee_id}/status",
    params(("employee_id" = String, Path, description = "Employee id")),
    responses(
        (status = 200, description = "Deactivated", body = Object, example = json!({"message": "User deactivated"})),
        (status = 403, description = "Caller is not an admin"),
        (status = 404, description = "User not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn deactivate_user(
    user: AuthUser,
    path: web::Path<String>,
    pool: web::Data<SqlitePool>,
) -> Result<HttpResponse, ApiError> {
    user.require_admin()?;
    user_service::deactivate_user(&pool, &path).await?;
    Ok(HttpResponse::Ok().json(json!({ "message": "User deactivated" })))
}

/// Delete a user and everything that belongs to them
#[utoipa::path(
    delete,
    path = "/api/users/{employee_id}",
    params(("employee_id" = String, Path, description = "Employee id")),
    responses(
        (status = 200, description = "Deleted", body = Object, example = json!({"message": "User deleted"})),
        (status = 403, description = "Caller is not an admin"),
        (status = 404, description = "User not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn delete_user(
    user: AuthUser,
    path: web::Path<String>,
    pool: web::Data<SqlitePool>,
    index: web::Data<EmailIndex>,
) -> Result<HttpResponse, ApiError> {
    user.require_admin()?;
    user_service::delete_user(&pool, &index, &path).await?;
    Ok(HttpResponse::Ok().json(json!({ "message": "User deleted" })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_collects_every_field_error() {
        let req = CreateUserReq {
            name: None,
            email: Some("not-an-email".into()),
            phone: None,
            department: None,
            role: Some("Overlord".into()),
            password: Some("   ".into()),
        };

        let Err(ApiError::Validation(errors)) = req.validate() else {
            panic!("expected validation errors");
        };
        for field in ["name", "email", "role", "password"] {
            assert!(errors.contains(field), "missing error for {field}");
        }
    }

    #[test]
    fn create_normalizes_input() {
        let req = CreateUserReq {
            name: Some(" Jane Doe ".into()),
            email: Some("Jane@Example.com".into()),
            phone: Some("".into()),
            department: Some("Engineering".into()),
            role: Some("manager".into()),
            password: Some("password123".into()),
        };

        let user = req.validate().unwrap();
        assert_eq!(user.name, "Jane Doe");
        assert_eq!(user.email, "jane@example.com");
        assert_eq!(user.phone, None);
        assert_eq!(user.role, Role::Manager);
    }

    #[test]
    fn update_rejects_blank_name_only_when_given() {
        assert!(UpdateUserReq::default().validate().is_ok());

        let blank = UpdateUserReq {
            name: Some(" ".into()),
            ..Default::default()
        };
        assert!(matches!(blank.validate(), Err(ApiError::Validation(_))));
    }

    #[test]
    fn update_blank_phone_or_department_clears_it() {
        let req = UpdateUserReq {
            phone: Some("  ".into()),
            department: Some(" Finance ".into()),
            ..Default::default()
        };

        let changes = req.validate().unwrap();
        assert_eq!(changes.phone, Some(None));
        assert_eq!(changes.department, Some(Some("Finance".into())));

        let untouched = UpdateUserReq::default().validate().unwrap();
        assert_eq!(untouched.phone, None);
        assert_eq!(untouched.department, None);
    }
}
