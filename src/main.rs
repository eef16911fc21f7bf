use actix_cors::Cors;
use actix_web::middleware::{Logger, NormalizePath};
use actix_web::web::Data;
use actix_web::{App, HttpServer};
use anyhow::Context;

use hrms::config::Config;
use hrms::db::init_db;
use hrms::docs::ApiDoc;
use hrms::routes::{self, RateLimiters};
use hrms::utils::email_index::EmailIndex;
use hrms::utils::seed::seed_database;

use tracing::{error, info};
use tracing_appender::rolling;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

fn cors(origin: &str) -> Cors {
    let cors = Cors::default()
        .allow_any_method()
        .allow_any_header()
        .supports_credentials()
        .max_age(3600);

    if origin == "*" {
        cors.allow_any_origin()
    } else {
        cors.allowed_origin(origin)
    }
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    // Rolling daily log
    let file_appender = rolling::daily(&config.log_dir, "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_max_level(config.tracing_level())
        .with_ansi(false)
        .with_target(false)
        .with_level(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .init();

    info!("Server starting...");

    let pool = init_db(&config.database_url).await?;
    let email_index = Data::new(EmailIndex::default());

    seed_database(&pool, &email_index, &config)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to seed database: {e}"))?;

    let limiters = RateLimiters::from_config(&config)?;

    let pool_for_filter_warmup = pool.clone();
    let index_for_filter_warmup = email_index.clone();
    actix_web::rt::spawn(async move {
        if let Err(e) = index_for_filter_warmup
            .warmup_filter(&pool_for_filter_warmup, 100)
            .await
        {
            error!("Failed to warmup email filter: {:?}", e);
        }
    });

    let pool_for_cache_warmup = pool.clone();
    let index_for_cache_warmup = email_index.clone();
    actix_web::rt::spawn(async move {
        // recent logins only, last 30 days
        if let Err(e) = index_for_cache_warmup
            .warmup_cache(&pool_for_cache_warmup, 30, 250)
            .await
        {
            error!("Failed to warmup email cache: {:?}", e);
        }
    });

    let server_addr = config.server_addr.clone();
    info!(addr = %server_addr, "Listening");

    HttpServer::new(move || {
        App::new()
            .wrap(NormalizePath::trim())
            .wrap(Logger::default())
            .wrap(cors(&config.cors_allowed_origin))
            .service(
                // wildcard {_:.*} so the JS/CSS assets match too
                SwaggerUi::new("/swagger-ui/{_:.*}").url("/api-doc/openapi.json", ApiDoc::openapi()),
            )
            .app_data(Data::new(pool.clone()))
            .app_data(Data::new(config.clone()))
            .app_data(email_index.clone())
            .configure(|cfg| routes::configure(cfg, &config, &limiters))
    })
    .bind(&server_addr)
    .with_context(|| format!("Failed to bind {server_addr}"))?
    .run()
    .await?;

    Ok(())
}
