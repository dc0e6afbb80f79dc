use actix_web::{App, HttpServer, web};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod api;
mod app;
mod db;
mod model;
mod service;

use app::AppState;
use model::Config;

#[tokio::main]
async fn main() -> std::io::Result<()> {
    // Load .env file if present (ignore if missing)
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    let bind_addr = config.bind_addr();

    let state = AppState::new(config)
        .await
        .map_err(|e| std::io::Error::other(e.to_string()))?;

    let health = web::Data::new(state.health);
    let pipeline = web::Data::new(state.pipeline);
    let virustotal = web::Data::new(state.virustotal);

    tracing::info!("Starting OpenSOC analysis server on {}", bind_addr);

    HttpServer::new(move || {
        App::new()
            .app_data(health.clone())
            .app_data(pipeline.clone())
            .app_data(virustotal.clone())
            .configure(api::health::configure)
            .configure(api::openapi::configure)
            .configure(api::analysis::configure)
            .configure(api::ioc::configure)
            .configure(api::progress::configure)
    })
    .bind(&bind_addr)?
    .run()
    .await
}
