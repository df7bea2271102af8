use std::sync::Arc;

use actix_web::middleware::NormalizePath;
use actix_web::web::Data;
use actix_web::{App, HttpResponse, HttpServer, Responder, get};
use anyhow::Context;

mod api;
mod auth;
mod config;
mod db;
mod docs;
mod error;
mod model;
mod models;
mod routes;
mod service;
mod storage;
mod store;

use config::Config;
use db::init_db;

use crate::docs::ApiDoc;
use crate::routes::Limiters;
use crate::service::{Services, holiday::HttpHolidaySource};
use crate::storage::FsPhotoStore;
use crate::store::mysql::MySqlStore;
use tracing::info;
use tracing_appender::rolling;
use utoipa::OpenApi; // ← needed for ApiDoc::openapi()
use utoipa_swagger_ui::SwaggerUi;

#[get("/health")]
async fn health() -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({ "status": "ok" }))
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    // Rolling daily log
    let file_appender = rolling::daily(&config.log_dir, "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_max_level(config.log_level)
        .with_ansi(false)
        .with_target(false) // removes module path
        .with_level(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .pretty()
        .init();

    info!("Server starting...");

    let pool = init_db(&config.database_url).await?;

    let holidays = HttpHolidaySource::new(&config.holiday_api_url, config.holiday_fetch_timeout)?;
    let services = Services::new(
        &config,
        Arc::new(MySqlStore::new(pool.clone())),
        Arc::new(holidays),
        Arc::new(FsPhotoStore::new(config.upload_dir.clone())),
    );

    let mut scheduler = services.scheduler();
    if config.scheduler_enabled {
        scheduler.start();
    } else {
        info!("Scheduler disabled");
    }

    let limiters = Limiters::from_config(&config)?;
    let server_addr = config.server_addr.clone();
    let config_data = config.clone();

    info!(addr = %server_addr, sites = config.sites.len(), "Listening");

    HttpServer::new(move || {
        App::new()
            .wrap(actix_web::middleware::Logger::default())
            .wrap(NormalizePath::trim())
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}") // ← important: wildcard {_:.*} to match JS/CSS files
                    .url("/api-doc/openapi.json", ApiDoc::openapi()),
            )
            .app_data(Data::new(pool.clone()))
            .app_data(Data::new(config_data.clone()))
            .app_data(Data::new(services.clone()))
            .service(health)
            // Configure auth + protected routes with rate limiting
            .configure(|cfg| routes::configure(cfg, &config_data, &limiters))
    })
    .bind(&server_addr)
    .with_context(|| format!("failed to bind {server_addr}"))?
    .run()
    .await?;

    scheduler.stop().await;
    info!("Server stopped");
    Ok(())
}
