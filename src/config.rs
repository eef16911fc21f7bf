use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::{env, str::FromStr};

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub server_addr: String,
    pub access_token_ttl: usize,
    pub refresh_token_ttl: usize,
    pub reset_token_ttl: i64,

    // Rate limiting
    pub rate_limit_enabled: bool,
    pub rate_login_per_min: u32,
    pub rate_refresh_per_min: u32,
    pub rate_protected_per_min: u32,

    pub api_prefix: String,

    pub log_dir: String,
    pub log_level: String,

    // First-run seed
    pub admin_email: String,
    pub admin_password: String,

    pub cors_allowed_origin: String,
}

/// Reads `key`, falling back to `default` when unset.
fn var_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{key} has an invalid value: {raw:?}")),
        Err(_) => Ok(default),
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        Ok(Self {
            server_addr: var_or("SERVER_ADDR", "127.0.0.1:8080".to_string())?,
            database_url: var_or("DATABASE_URL", "sqlite://employees.db".to_string())?,
            jwt_secret: env::var("JWT_SECRET").context("JWT_SECRET must be set")?,
            access_token_ttl: var_or("ACCESS_TOKEN_TTL", 900)?, // 15 min
            refresh_token_ttl: var_or("REFRESH_TOKEN_TTL", 604_800)?, // 7 days
            reset_token_ttl: var_or("RESET_TOKEN_TTL", 3600)?,

            rate_limit_enabled: var_or("RATE_LIMIT_ENABLED", true)?,
            rate_login_per_min: var_or("RATE_LOGIN_PER_MIN", 60)?,
            rate_refresh_per_min: var_or("RATE_REFRESH_PER_MIN", 30)?,
            rate_protected_per_min: var_or("RATE_PROTECTED_PER_MIN", 1000)?,

            api_prefix: var_or("API_PREFIX", "/api".to_string())?,

            log_dir: var_or("LOG_DIR", "logs".to_string())?,
            log_level: var_or("LOG_LEVEL", "info".to_string())?,

            admin_email: var_or("ADMIN_EMAIL", "admin@example.com".to_string())?,
            admin_password: var_or("ADMIN_PASSWORD", "admin".to_string())?,

            cors_allowed_origin: var_or("CORS_ALLOWED_ORIGIN", "*".to_string())?,
        })
    }

    /// Settings for tests and local tooling: in-memory database, no limits.
    pub fn for_testing() -> Self {
        Self {
            database_url: "sqlite::memory:".into(),
            jwt_secret: "test-secret-key".into(),
            server_addr: "127.0.0.1:0".into(),
            access_token_ttl: 900,
            refresh_token_ttl: 3600,
            reset_token_ttl: 3600,
            rate_limit_enabled: false,
            rate_login_per_min: 60,
            rate_refresh_per_min: 30,
            rate_protected_per_min: 1000,
            api_prefix: "/api".into(),
            log_dir: "logs".into(),
            log_level: "debug".into(),
            admin_email: "admin@example.com".into(),
            admin_password: "admin".into(),
            cors_allowed_origin: "*".into(),
        }
    }

    pub fn tracing_level(&self) -> tracing::Level {
        tracing::Level::from_str(&self.log_level).unwrap_or(tracing::Level::INFO)
    }
}
