use actix_web::{FromRequest, HttpMessage, HttpRequest, dev::Payload};
use futures::future::{Ready, ready};
use std::str::FromStr;

use crate::error::ApiError;
use crate::model::{role::Role, user::User};
use crate::models::Claims;

pub const UNAUTHORIZED_ACCESS: &str = "Unauthorized access";

/// Caller identity, placed in request extensions by the auth middleware.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthUser {
    pub user_id: i64,
    pub email: String,
    pub role: Role,
    pub employee_id: String,
    pub name: String,
}

impl From<Claims> for AuthUser {
    fn from(claims: Claims) -> Self {
        AuthUser {
            user_id: claims.user_id,
            email: claims.sub,
            role: claims.role,
            employee_id: claims.employee_id,
            name: claims.name,
        }
    }
}

impl TryFrom<&User> for AuthUser {
    type Error = ApiError;

    fn try_from(user: &User) -> Result<Self, ApiError> {
        let role = Role::from_str(&user.role)
            .map_err(|_| ApiError::internal(format!("user {} has unknown role {:?}", user.employee_id, user.role)))?;

        Ok(AuthUser {
            user_id: user.id,
            email: user.email.clone(),
            role,
            employee_id: user.employee_id.clone(),
            name: user.name.clone(),
        })
    }
}

impl FromRequest for AuthUser {
    type Error = ApiError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(
            req.extensions()
                .get::<AuthUser>()
                .cloned()
                .ok_or_else(|| ApiError::Unauthorized("Missing token".into())),
        )
    }
}

impl AuthUser {
    pub fn require_admin(&self) -> Result<(), ApiError> {
        if self.role.is_admin() {
            Ok(())
        } else {
            Err(ApiError::forbidden(UNAUTHORIZED_ACCESS))
        }
    }

    pub fn require_admin_or_manager(&self) -> Result<(), ApiError> {
        if self.role.can_review() {
            Ok(())
        } else {
            Err(ApiError::forbidden(UNAUTHORIZED_ACCESS))
        }
    }

    /// Own records, or any record for an admin.
    pub fn require_self_or_admin(&self, employee_id: &str) -> Result<(), ApiError> {
        if self.employee_id == employee_id {
            Ok(())
        } else {
            self.require_admin()
        }
    }

    /// Own records, or any record for an admin or manager.
    pub fn require_self_or_reviewer(&self, employee_id: &str) -> Result<(), ApiError> {
        if self.employee_id == employee_id {
            Ok(())
        } else {
            self.require_admin_or_manager()
        }
    }
}
