use crate::{
    api::{attendance, course, dashboard, leave, payroll, profile, review, users},
    auth::{handlers, middleware::auth_middleware},
    config::Config,
    error::ApiError,
};
use actix_governor::{
    Governor, GovernorConfigBuilder, PeerIpKeyExtractor, governor::middleware::NoOpMiddleware,
};
use actix_web::{HttpResponse, Responder, get, middleware::Condition, middleware::from_fn, web};
use anyhow::{Context, Result};
use serde_json::json;
use std::sync::Arc;

type Limiter = Arc<Governor<PeerIpKeyExtractor, NoOpMiddleware>>;

/// Per-route limiters, keyed by peer IP. Built once and shared by every worker.
#[derive(Clone)]
pub struct RateLimiters {
    enabled: bool,
    login: Limiter,
    refresh: Limiter,
    protected: Limiter,
}

fn build_limiter(requests_per_min: u32) -> Result<Limiter> {
    let requests_per_min = requests_per_min.clamp(1, 60_000);
    let cfg = GovernorConfigBuilder::default()
        .per_millisecond(60_000 / requests_per_min as u64)
        .burst_size(requests_per_min)
        .key_extractor(PeerIpKeyExtractor)
        .finish()
        .with_context(|| format!("invalid rate limit of {requests_per_min}/min"))?;
    Ok(Arc::new(Governor::new(&cfg)))
}

impl RateLimiters {
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            enabled: config.rate_limit_enabled,
            login: build_limiter(config.rate_login_per_min)?,
            refresh: build_limiter(config.rate_refresh_per_min)?,
            protected: build_limiter(config.rate_protected_per_min)?,
        })
    }

    fn guard(&self, limiter: &Limiter) -> Condition<Limiter> {
        Condition::new(self.enabled, limiter.clone())
    }
}

#[get("/health")]
async fn health() -> impl Responder {
    HttpResponse::Ok().json(json!({ "status": "ok" }))
}

/// Extractor failures render like every other error.
fn extractor_errors(cfg: &mut web::ServiceConfig) {
    cfg.app_data(
        web::JsonConfig::default().error_handler(|err, _| ApiError::bad_request(err.to_string()).into()),
    )
    .app_data(
        web::QueryConfig::default().error_handler(|err, _| ApiError::bad_request(err.to_string()).into()),
    )
    .app_data(
        web::PathConfig::default().error_handler(|err, _| ApiError::bad_request(err.to_string()).into()),
    );
}

pub fn configure(cfg: &mut web::ServiceConfig, config: &Config, limiters: &RateLimiters) {
    extractor_errors(cfg);

    cfg.service(health);

    // Public routes
    cfg.service(
        web::scope("/auth")
            .service(
                web::resource("/login")
                    .wrap(limiters.guard(&limiters.login))
                    .route(web::post().to(handlers::login)),
            )
            .service(
                web::resource("/refresh")
                    .wrap(limiters.guard(&limiters.refresh))
                    .route(web::post().to(handlers::refresh_token)),
            )
            .service(
                web::resource("/logout")
                    .wrap(limiters.guard(&limiters.login))
                    .route(web::post().to(handlers::logout)),
            )
            .service(
                web::resource("/forgot-password")
                    .wrap(limiters.guard(&limiters.login))
                    .route(web::post().to(handlers::forgot_password)),
            )
            .service(
                web::resource("/reset-password")
                    .wrap(limiters.guard(&limiters.login))
                    .route(web::post().to(handlers::reset_password)),
            ),
    );

    // Protected routes
    cfg.service(
        web::scope(&config.api_prefix)
            .wrap(from_fn(auth_middleware))
            .wrap(limiters.guard(&limiters.protected))
            .service(
                web::scope("/users")
                    .service(
                        web::resource("")
                            .route(web::post().to(users::create_user))
                            .route(web::get().to(users::list_users)),
                    )
                    // fixed segments before /{employee_id}
                    .service(web::resource("/search").route(web::get().to(users::search_users)))
                    .service(web::resource("/me").route(web::get().to(users::me)))
                    .service(
                        web::resource("/{employee_id}")
                            .route(web::get().to(users::get_user))
                            .route(web::put().to(users::update_user))
                            .route(web::delete().to(users::delete_user)),
                    )
                    .service(
                        web::resource("/{employee_id}/status").route(web::put().to(users::deactivate_user)),
                    ),
            )
            .service(
                web::resource("/profile/{employee_id}")
                    .route(web::get().to(profile::get_profile))
                    .route(web::put().to(profile::upsert_profile)),
            )
            .service(web::resource("/profiles").route(web::get().to(profile::list_profiles)))
            .service(
                web::scope("/attendance")
                    .service(web::resource("/punch-in").route(web::post().to(attendance::punch_in)))
                    .service(web::resource("/punch-out").route(web::post().to(attendance::punch_out)))
                    .service(web::resource("/manual").route(web::post().to(attendance::request_manual)))
                    .service(web::resource("/my-records").route(web::get().to(attendance::my_records)))
                    .service(web::resource("/requests").route(web::get().to(attendance::pending_requests)))
                    .service(web::resource("/approve/{id}").route(web::put().to(attendance::approve)))
                    .service(web::resource("/reject/{id}").route(web::put().to(attendance::reject)))
                    .service(web::resource("/search").route(web::get().to(attendance::search)))
                    .service(web::resource("/weekly-chart").route(web::get().to(dashboard::weekly_chart))),
            )
            .service(
                web::scope("/leave")
                    .service(web::resource("/apply").route(web::post().to(leave::apply)))
                    .service(web::resource("/balance").route(web::get().to(leave::balance)))
                    .service(web::resource("/my-leaves").route(web::get().to(leave::my_leaves)))
                    .service(web::resource("/pending").route(web::get().to(leave::pending)))
                    .service(web::resource("/search").route(web::get().to(leave::search)))
                    .service(
                        web::resource("/employee/{employee_id}").route(web::get().to(leave::employee_leaves)),
                    )
                    .service(web::resource("/{id}/status").route(web::put().to(leave::update_status))),
            )
            .service(
                web::scope("/salary")
                    .service(web::resource("/add").route(web::post().to(payroll::add_salary)))
                    .service(web::resource("/my-records").route(web::get().to(payroll::my_records)))
                    .service(web::resource("/my-records/payslip").route(web::get().to(payroll::payslip)))
                    .service(web::resource("/employee").route(web::get().to(payroll::all_records)))
                    .service(
                        web::resource("/employee/{employee_id}").route(web::get().to(payroll::employee_records)),
                    )
                    .service(web::resource("/export-pdf").route(web::get().to(payroll::export_pdf)))
                    .service(web::resource("/countdown").route(web::get().to(payroll::countdown))),
            )
            .service(
                web::scope("/courses")
                    .service(
                        web::resource("")
                            .route(web::get().to(course::list_courses))
                            .route(web::post().to(course::create_course)),
                    )
                    .service(web::resource("/department").route(web::get().to(course::department_courses)))
                    .service(web::resource("/{id}/submit").route(web::post().to(course::submit))),
            )
            .service(web::resource("/my-submissions").route(web::get().to(course::my_submissions)))
            .service(
                web::scope("/submissions")
                    .service(web::resource("/pending").route(web::get().to(course::pending_submissions)))
                    .service(web::resource("/{id}/status").route(web::put().to(course::review_submission))),
            )
            .service(
                web::scope("/reviews")
                    .service(web::resource("").route(web::post().to(review::create_review)))
                    .service(web::resource("/{employee_id}").route(web::get().to(review::list_reviews))),
            )
            .service(
                web::scope("/dashboard")
                    .service(web::resource("/stats").route(web::get().to(dashboard::stats)))
                    .service(web::resource("/employee-growth").route(web::get().to(dashboard::employee_growth)))
                    .service(
                        web::resource("/department-counts").route(web::get().to(dashboard::department_counts)),
                    ),
            )
            .service(
                web::resource("/employee/dashboard/summary").route(web::get().to(leave::dashboard_summary)),
            ),
    );
}

// LOGIN
//  ├─ access_token (ACCESS_TOKEN_TTL, 15 min default)
//  └─ refresh_token (REFRESH_TOKEN_TTL, 7 days default; jti stored server-side)

// API REQUEST
//  └─ Authorization: Bearer access_token

// ACCESS EXPIRED
//  └─ POST /auth/refresh with refresh_token
//       └─ old jti revoked, new pair returned
