use chrono::{Duration, NaiveDateTime};
use sqlx::{FromRow, SqliteConnection, SqlitePool};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::auth::auth::AuthUser;
use crate::auth::jwt::{generate_access_token, generate_refresh_token, verify_token};
use crate::auth::password::{hash_password, verify_password};
use crate::config::Config;
use crate::model::user::User;
use crate::error::ApiError;
use crate::models::{TokenPair, TokenType};
use crate::service::user::{find_by_email, find_by_id};
use crate::utils::dates::now;

pub const MIN_PASSWORD_LEN: usize = 8;

fn invalid_credentials() -> ApiError {
    ApiError::Unauthorized("Invalid credentials".into())
}

fn token_error(e: jsonwebtoken::errors::Error) -> ApiError {
    ApiError::internal(format!("jwt: {e}"))
}

/// Signs a fresh access/refresh pair and records the refresh `jti`.
async fn issue_pair(conn: &mut SqliteConnection, config: &Config, user: &AuthUser) -> Result<TokenPair, ApiError> {
    let access_token = generate_access_token(user, &config.jwt_secret, config.access_token_ttl).map_err(token_error)?;
    let (refresh_token, refresh_claims) =
        generate_refresh_token(user, &config.jwt_secret, config.refresh_token_ttl).map_err(token_error)?;

    debug!(user_id = user.user_id, jti = %refresh_claims.jti, "Storing refresh token");

    sqlx::query("INSERT INTO refresh_tokens (user_id, jti, expires_at) VALUES (?, ?, ?)")
        .bind(user.user_id)
        .bind(&refresh_claims.jti)
        .bind(refresh_claims.exp as i64)
        .execute(&mut *conn)
        .await?;

    Ok(TokenPair {
        access_token,
        refresh_token,
    })
}

#[instrument(name = "auth_login", skip(pool, config, password))]
pub async fn login(pool: &SqlitePool, config: &Config, email: &str, password: &str) -> Result<(TokenPair, User), ApiError> {
    let Some(user) = find_by_email(pool, email).await? else {
        info!("Invalid credentials: user not found");
        return Err(invalid_credentials());
    };

    if let Err(e) = verify_password(password, &user.password_hash) {
        info!(error = %e, "Invalid credentials: password mismatch");
        return Err(invalid_credentials());
    }

    if !user.is_active() {
        info!(employee_id = %user.employee_id, "Login refused for inactive account");
        return Err(ApiError::forbidden("Account is inactive"));
    }

    let identity = AuthUser::try_from(&user)?;
    let mut conn = pool.acquire().await?;
    let tokens = issue_pair(&mut conn, config, &identity).await?;

    if let Err(e) = sqlx::query("UPDATE users SET last_login_at = ? WHERE id = ?")
        .bind(now())
        .bind(user.id)
        .execute(&mut *conn)
        .await
    {
        // the login itself already succeeded
        error!(error = %e, "Failed to update last_login_at");
    }

    info!(employee_id = %user.employee_id, "Login successful");
    Ok((tokens, user))
}

#[derive(FromRow)]
struct StoredRefresh {
    id: i64,
    user_id: i64,
    revoked: bool,
}

/// Rotates a refresh token: the presented one is revoked, a new pair is issued.
#[instrument(skip_all)]
pub async fn refresh(pool: &SqlitePool, config: &Config, token: &str) -> Result<TokenPair, ApiError> {
    let unauthorized = || ApiError::Unauthorized("Invalid refresh token".into());

    let claims = verify_token(token, &config.jwt_secret).map_err(|_| unauthorized())?;
    if claims.token_type != TokenType::Refresh {
        return Err(unauthorized());
    }

    let stored = sqlx::query_as::<_, StoredRefresh>("SELECT id, user_id, revoked FROM refresh_tokens WHERE jti = ?")
        .bind(&claims.jti)
        .fetch_optional(pool)
        .await?;

    let stored = match stored {
        Some(r) if !r.revoked && r.user_id == claims.user_id => r,
        _ => {
            warn!(jti = %claims.jti, "Unknown or revoked refresh token presented");
            return Err(unauthorized());
        }
    };

    // role, name or status may have changed since the token was issued
    let user = find_by_id(pool, stored.user_id).await?.ok_or_else(unauthorized)?;
    if !user.is_active() {
        return Err(unauthorized());
    }
    let identity = AuthUser::try_from(&user)?;

    let mut tx = pool.begin().await?;
    sqlx::query("UPDATE refresh_tokens SET revoked = 1 WHERE id = ?")
        .bind(stored.id)
        .execute(&mut *tx)
        .await?;
    let tokens = issue_pair(&mut tx, config, &identity).await?;
    tx.commit().await?;

    Ok(tokens)
}

/// Revokes a refresh token. Anything unrecognised is ignored.
pub async fn logout(pool: &SqlitePool, config: &Config, token: &str) {
    let Ok(claims) = verify_token(token, &config.jwt_secret) else {
        return;
    };
    if claims.token_type != TokenType::Refresh {
        return;
    }

    if let Err(e) = sqlx::query("UPDATE refresh_tokens SET revoked = 1 WHERE jti = ?")
        .bind(&claims.jti)
        .execute(pool)
        .await
    {
        error!(error = %e, "Failed to revoke refresh token");
    }
}

/// Creates a single-use reset token for an active account.
///
/// Returns the token so callers can deliver it; unknown emails yield `None`
/// so the HTTP response does not reveal which addresses exist.
#[instrument(skip(pool, config))]
pub async fn forgot_password(pool: &SqlitePool, config: &Config, email: &str) -> Result<Option<String>, ApiError> {
    let Some(user) = find_by_email(pool, email).await? else {
        return Ok(None);
    };
    if !user.is_active() {
        return Ok(None);
    }

    let token = Uuid::new_v4().to_string();
    let expires_at = now() + Duration::seconds(config.reset_token_ttl);

    sqlx::query("INSERT INTO reset_tokens (user_id, token, expires_at) VALUES (?, ?, ?)")
        .bind(user.id)
        .bind(&token)
        .bind(expires_at)
        .execute(pool)
        .await?;

    // no mail transport; operators relay the token
    info!(employee_id = %user.employee_id, reset_token = %token, "Password reset token issued");
    Ok(Some(token))
}

#[derive(FromRow)]
struct StoredReset {
    id: i64,
    user_id: i64,
    expires_at: NaiveDateTime,
    used: bool,
}

#[instrument(skip_all)]
pub async fn reset_password(pool: &SqlitePool, token: &str, new_password: &str) -> Result<(), ApiError> {
    let stored = sqlx::query_as::<_, StoredReset>(
        "SELECT id, user_id, expires_at, used FROM reset_tokens WHERE token = ?",
    )
    .bind(token.trim())
    .fetch_optional(pool)
    .await?;

    let stored = match stored {
        Some(r) if !r.used && r.expires_at > now() => r,
        _ => return Err(ApiError::bad_request("Invalid or expired reset token")),
    };

    let password_hash = hash_password(new_password).map_err(|e| ApiError::internal(format!("hash: {e}")))?;

    let mut tx = pool.begin().await?;
    sqlx::query("UPDATE users SET password_hash = ?, updated_at = ? WHERE id = ?")
        .bind(&password_hash)
        .bind(now())
        .bind(stored.user_id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("UPDATE reset_tokens SET used = 1 WHERE id = ?")
        .bind(stored.id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("UPDATE refresh_tokens SET revoked = 1 WHERE user_id = ?")
        .bind(stored.user_id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    info!(user_id = stored.user_id, "Password reset");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_db;
    use crate::model::role::Role;
    use crate::service::user::{NewUser, create_user, deactivate_user};
    use crate::utils::email_index::EmailIndex;

    async fn setup() -> (SqlitePool, Config, User) {
        let pool = init_db("sqlite::memory:").await.unwrap();
        let user = create_user(
            &pool,
            &EmailIndex::default(),
            NewUser {
                name: "Ari".into(),
                email: "ari@example.com".into(),
                phone: None,
                department: None,
                role: Role::Employee,
                password: "password123".into(),
            },
        )
        .await
        .unwrap();
        (pool, Config::for_testing(), user)
    }

    #[actix_web::test]
    async fn login_checks_password() {
        let (pool, config, _) = setup().await;

        assert!(login(&pool, &config, "ARI@example.com", "password123").await.is_ok());
        assert!(matches!(
            login(&pool, &config, "ari@example.com", "wrong").await,
            Err(ApiError::Unauthorized(_))
        ));
        assert!(matches!(
            login(&pool, &config, "nobody@example.com", "password123").await,
            Err(ApiError::Unauthorized(_))
        ));
    }

    #[actix_web::test]
    async fn inactive_accounts_cannot_log_in() {
        let (pool, config, user) = setup().await;
        deactivate_user(&pool, &user.employee_id).await.unwrap();

        assert!(matches!(
            login(&pool, &config, "ari@example.com", "password123").await,
            Err(ApiError::Forbidden(_))
        ));
    }

    #[actix_web::test]
    async fn refresh_rotates_and_revokes() {
        let (pool, config, _) = setup().await;
        let (tokens, _) = login(&pool, &config, "ari@example.com", "password123").await.unwrap();

        let rotated = refresh(&pool, &config, &tokens.refresh_token).await.unwrap();
        assert_ne!(rotated.refresh_token, tokens.refresh_token);

        // the old token is spent
        assert!(refresh(&pool, &config, &tokens.refresh_token).await.is_err());
        // an access token is not a refresh token
        assert!(refresh(&pool, &config, &rotated.access_token).await.is_err());

        logout(&pool, &config, &rotated.refresh_token).await;
        assert!(refresh(&pool, &config, &rotated.refresh_token).await.is_err());
    }

    #[actix_web::test]
    async fn reset_token_is_single_use() {
        let (pool, config, _) = setup().await;
        let token = forgot_password(&pool, &config, "ari@example.com").await.unwrap().unwrap();
        assert!(forgot_password(&pool, &config, "ghost@example.com").await.unwrap().is_none());

        reset_password(&pool, &token, "brand-new-pass").await.unwrap();
        assert!(login(&pool, &config, "ari@example.com", "brand-new-pass").await.is_ok());
        assert!(matches!(
            reset_password(&pool, &token, "another-pass").await,
            Err(ApiError::BadRequest(_))
        ));
    }
}
