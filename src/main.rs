use actix_web::middleware::NormalizePath;
use actix_web::web::Data;
use actix_web::{App, HttpServer};
use dotenvy::dotenv;
use std::time::Duration;

mod api;
mod auth;
mod config;
mod db;
mod docs;
mod error;
mod holiday;
mod leave;
mod model;
mod models;
mod routes;
mod utils;

use config::Config;
use db::init_db;

use crate::api::holiday::{HolidaySource, MAX_YEAR_SPAN};
use crate::docs::ApiDoc;
use crate::holiday::statutory::{CachedHolidaySource, NagerDateClient};
use crate::leave::feed::{LeaveFeed, warmup_leave_feed};
use crate::utils::mailer::Mailer;
use tracing::{error, info, warn};
use tracing_appender::rolling;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok();

    let config = Config::from_env();

    // Rolling daily log
    let file_appender = rolling::daily("logs", "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_max_level(tracing::Level::DEBUG)
        .with_ansi(false)
        .with_target(false) // removes module path
        .with_level(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .pretty()
        .init();

    info!("Server starting...");

    let missing = config.missing_required();
    if !missing.is_empty() {
        warn!(?missing, "Configuration incomplete; /health will report degraded");
    }

    if config.holiday_year_span > MAX_YEAR_SPAN {
        warn!(
            span = config.holiday_year_span,
            max = MAX_YEAR_SPAN,
            "HOLIDAY_YEAR_SPAN too wide for one request; default window is clamped"
        );
    }

    let pool = init_db(&config.database_url).await.map_err(|e| {
        error!(error = %e, "Failed to connect to database");
        std::io::Error::other(e)
    })?;

    let feed = Data::new(LeaveFeed::new());
    let feed_for_warmup = feed.clone();
    let pool_for_warmup = pool.clone();
    actix_web::rt::spawn(async move {
        if let Err(e) = warmup_leave_feed(&feed_for_warmup, &pool_for_warmup).await {
            warn!(error = %e, "Failed to warm up leave snapshot");
        }
    });

    let client = NagerDateClient::new(
        &config.holiday_api_base,
        Duration::from_secs(config.holiday_fetch_timeout_secs),
    )
    .map_err(|e| {
        error!(error = %e, "Failed to build holiday client");
        std::io::Error::other(e)
    })?;
    let holidays: Data<HolidaySource> = Data::new(CachedHolidaySource::new(
        client,
        Duration::from_secs(config.holiday_cache_ttl_secs),
    ));

    let mailer = match Mailer::from_config(&config) {
        Ok(m) => Some(m),
        Err(e) => {
            warn!(error = %e, "Mail relay disabled; password reset links cannot be sent");
            None
        }
    };
    let mailer = Data::new(mailer);

    // Clone values for the closure (avoid move issues)
    let server_addr = config.server_addr.clone();
    let config_data = config.clone();

    HttpServer::new(move || {
        App::new()
            .wrap(actix_web::middleware::Logger::default())
            .wrap(NormalizePath::trim())
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}") // wildcard {_:.*} to match JS/CSS files
                    .url("/api-doc/openapi.json", ApiDoc::openapi()),
            )
            .app_data(Data::new(pool.clone()))
            .app_data(Data::new(config.clone()))
            .app_data(feed.clone())
            .app_data(holidays.clone())
            .app_data(mailer.clone())
            // Configure auth + protected routes with rate limiting
            .configure(|cfg| routes::configure(cfg, config_data.clone()))
    })
    .bind(server_addr)?
    .run()
    .await
}
