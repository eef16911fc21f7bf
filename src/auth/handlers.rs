use actix_web::{HttpRequest, HttpResponse, web};
use serde_json::json;
use sqlx::SqlitePool;
use tracing::{info, instrument};

use crate::config::Config;
use crate::error::ApiError;
use crate::models::{ForgotPasswordReq, LoginReqDto, LoginResponse, ResetPasswordReq};
use crate::service::auth::{self as auth_service, MIN_PASSWORD_LEN};
use crate::utils::email_index::EmailIndex;
use crate::utils::validation::FieldErrors;

fn bearer(req: &HttpRequest) -> Option<&str> {
    req.headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
}

/// Login endpoint
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginReqDto,
    responses(
        (status = 200, description = "Tokens issued", body = LoginResponse),
        (status = 400, description = "Missing fields", body = Object, example = json!({
            "errors": {"password": ["Missing data for required field."]}
        })),
        (status = 401, description = "Invalid credentials", body = Object, example = json!({
            "error": "Invalid credentials"
        })),
        (status = 403, description = "Account is inactive")
    ),
    tag = "Auth"
)]
#[instrument(name = "login_handler", skip_all)]
pub async fn login(
    payload: web::Json<LoginReqDto>,
    pool: web::Data<SqlitePool>,
    config: web::Data<Config>,
    index: web::Data<EmailIndex>,
) -> Result<HttpResponse, ApiError> {
    info!("Login request received");

    let mut errors = FieldErrors::default();
    let email = errors.required("email", &payload.email);
    let password = errors.required("password", &payload.password);
    let (Some(email), Some(password)) = (email, password) else {
        return Err(errors.into());
    };

    let (tokens, user) = auth_service::login(&pool, &config, email, password).await?;

    index.register(&user.email).await;

    Ok(HttpResponse::Ok().json(LoginResponse {
        message: "Login successful".into(),
        access_token: tokens.access_token,
        refresh_token: tokens.refresh_token,
        user,
    }))
}

/// Exchange a refresh token for a new token pair
#[utoipa::path(
    post,
    path = "/auth/refresh",
    responses(
        (status = 200, description = "New token pair", body = TokenPair),
        (status = 401, description = "Missing, invalid or revoked refresh token")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Auth"
)]
pub async fn refresh_token(
    req: HttpRequest,
    pool: web::Data<SqlitePool>,
    config: web::Data<Config>,
) -> Result<HttpResponse, ApiError> {
    let token = bearer(&req).ok_or_else(|| ApiError::Unauthorized("Missing refresh token".into()))?;

    let tokens = auth_service::refresh(&pool, &config, token).await?;
    Ok(HttpResponse::Ok().json(tokens))
}

/// Revoke a refresh token
#[utoipa::path(
    post,
    path = "/auth/logout",
    responses(
        (status = 204, description = "Logged out (also when the token was unknown)")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Auth"
)]
pub async fn logout(
    req: HttpRequest,
    pool: web::Data<SqlitePool>,
    config: web::Data<Config>,
) -> HttpResponse {
    if let Some(token) = bearer(&req) {
        auth_service::logout(&pool, &config, token).await;
    }
    HttpResponse::NoContent().finish()
}

/// Request a password reset token
#[utoipa::path(
    post,
    path = "/auth/forgot-password",
    request_body = ForgotPasswordReq,
    responses(
        (status = 200, description = "Generic acknowledgement", body = Object, example = json!({
            "message": "If the email is registered, a reset link has been sent."
        })),
        (status = 400, description = "Missing email")
    ),
    tag = "Auth"
)]
pub async fn forgot_password(
    payload: web::Json<ForgotPasswordReq>,
    pool: web::Data<SqlitePool>,
    config: web::Data<Config>,
) -> Result<HttpResponse, ApiError> {
    let mut errors = FieldErrors::default();
    let Some(email) = errors.required("email", &payload.email) else {
        return Err(errors.into());
    };

    auth_service::forgot_password(&pool, &config, email).await?;

    Ok(HttpResponse::Ok().json(json!({
        "message": "If the email is registered, a reset link has been sent."
    })))
}

/// Set a new password with a reset token
#[utoipa::path(
    post,
    path = "/auth/reset-password",
    request_body = ResetPasswordReq,
    responses(
        (status = 200, description = "Password changed", body = Object, example = json!({
            "message": "Password has been reset successfully."
        })),
        (status = 400, description = "Invalid input, or unknown, used or expired token")
    ),
    tag = "Auth"
)]
pub async fn reset_password(
    payload: web::Json<ResetPasswordReq>,
    pool: web::Data<SqlitePool>,
) -> Result<HttpResponse, ApiError> {
    let mut errors = FieldErrors::default();
    let token = errors.required("token", &payload.token);
    let password = errors.required("new_password", &payload.new_password);
    if let Some(p) = password {
        if p.chars().count() < MIN_PASSWORD_LEN {
            errors.add("new_password", format!("Shorter than minimum length {MIN_PASSWORD_LEN}."));
        }
    }
    errors.into_result()?;

    let (Some(token), Some(password)) = (token, password) else {
        return Err(ApiError::bad_request("Invalid input"));
    };

    auth_service::reset_password(&pool, token, password).await?;

    Ok(HttpResponse::Ok().json(json!({
        "message": "Password has been reset successfully."
    })))
}
