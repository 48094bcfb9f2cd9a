mod api;
mod app_state;
mod config;
mod core;
mod domain;
mod errors;
mod routes;

use std::sync::Arc;

use anyhow::Result;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::app_state::build_app_state;
use crate::config::Config;
use crate::core::datastream::memory::MemoryBackend;
use crate::routes::app_router;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let (writer, _guard) = tracing_appender::non_blocking(std::io::stdout());
    tracing_subscriber::fmt()
        .with_writer(writer)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env()?;

    let backend = Arc::new(MemoryBackend::new());
    if config.demo_streams > 0 {
        backend.seed_demo(config.demo_streams, config.demo_points);
        info!(
            streams = config.demo_streams,
            points = config.demo_points,
            "seeded demo datastream backend"
        );
    }

    let state = build_app_state(backend, config.api.clone());
    let app = app_router().with_state(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!("listening on {}", config.bind_addr);
    axum::serve(listener, app).await?;

    Ok(())
}
