use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::model::{role::Role, user::User};

#[derive(Deserialize, ToSchema)]
pub struct LoginReqDto {
    #[schema(example = "admin@example.com")]
    pub email: Option<String>,
    #[schema(example = "admin")]
    pub password: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct LoginResponse {
    #[schema(example = "Login successful")]
    pub message: String,
    pub access_token: String,
    pub refresh_token: String,
    pub user: User,
}

#[derive(Serialize, ToSchema)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Deserialize, ToSchema)]
pub struct ForgotPasswordReq {
    #[schema(example = "jane@example.com")]
    pub email: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct ResetPasswordReq {
    pub token: Option<String>,
    #[schema(example = "n3w-passw0rd")]
    pub new_password: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: i64,
    /// Email at the time of issue
    pub sub: String,
    pub role: Role,
    pub employee_id: String,
    pub name: String,
    pub exp: usize,
    pub jti: String,

    pub token_type: TokenType,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub enum TokenType {
    Access,
    Refresh,
}
