#![allow(unused_macros)]

use actix_web::web::Data;
use hrms::config::Config;
use hrms::db::init_db;
use hrms::routes::RateLimiters;
use hrms::utils::email_index::EmailIndex;
use hrms::utils::seed::seed_database;
use sqlx::SqlitePool;

pub const ADMIN_EMAIL: &str = "admin@example.com";
pub const ADMIN_PASSWORD: &str = "admin";

pub struct TestState {
    pub pool: SqlitePool,
    pub index: Data<EmailIndex>,
    pub config: Config,
    pub limiters: RateLimiters,
}

/// Fresh in-memory database with the default admin and courses seeded.
pub async fn state() -> TestState {
    let config = Config::for_testing();
    let pool = init_db(&config.database_url).await.unwrap();
    let index = Data::new(EmailIndex::default());
    seed_database(&pool, &index, &config).await.unwrap();
    let limiters = RateLimiters::from_config(&config).unwrap();

    TestState {
        pool,
        index,
        config,
        limiters,
    }
}

macro_rules! test_app {
    ($state:expr) => {{
        let state = &$state;
        actix_web::test::init_service(
            actix_web::App::new()
                .app_data(actix_web::web::Data::new(state.pool.clone()))
                .app_data(actix_web::web::Data::new(state.config.clone()))
                .app_data(state.index.clone())
                .configure(|cfg| hrms::routes::configure(cfg, &state.config, &state.limiters)),
        )
        .await
    }};
}

/// Logs in and yields the access token.
macro_rules! login {
    ($app:expr, $email:expr, $password:expr) => {{
        let req = actix_web::test::TestRequest::post()
            .uri("/auth/login")
            .set_json(serde_json::json!({ "email": $email, "password": $password }))
            .to_request();
        let body: serde_json::Value = actix_web::test::call_and_read_body_json(&$app, req).await;
        body["access_token"]
            .as_str()
            .expect("login should return an access token")
            .to_string()
    }};
}

/// Creates an account as `$admin_token` and yields its employee id.
macro_rules! create_user {
    ($app:expr, $admin_token:expr, $name:expr, $email:expr, $role:expr) => {{
        let req = actix_web::test::TestRequest::post()
            .uri("/api/users")
            .insert_header(("Authorization", format!("Bearer {}", $admin_token)))
            .set_json(serde_json::json!({
                "name": $name,
                "email": $email,
                "role": $role,
                "department": "Engineering",
                "password": "password123",
            }))
            .to_request();
        let resp = actix_web::test::call_service(&$app, req).await;
        assert_eq!(resp.status(), actix_web::http::StatusCode::CREATED);
        let body: serde_json::Value = actix_web::test::read_body_json(resp).await;
        body["id"].as_str().unwrap().to_string()
    }};
}

pub fn bearer(token: &str) -> (&'static str, String) {
    ("Authorization", format!("Bearer {token}"))
}
