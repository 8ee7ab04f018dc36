//! Weather API Server
//!
//! Point weather queries answered from the fast cache, durable store, or
//! Open-Meteo, plus a background historical backfill for the known cities.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use weather_api::config::{Args, ServiceConfig};
use weather_api::{build_router, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Initialize tracing
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_level(true)
        .json()
        .init();

    let config = ServiceConfig::from_args(&args)?;

    // Initialize Prometheus metrics exporter
    let prometheus_handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus recorder");

    info!("Prometheus metrics exporter initialized");
    info!("Starting weather API server");

    let state = Arc::new(
        AppState::connect(&config)
            .await?
            .with_prometheus(prometheus_handle),
    );

    let app = build_router(state.clone())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    info!(addr = %config.listen_addr, "Weather API listening");

    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.listen_addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            info!("Received shutdown signal");
        })
        .await
        .context("Server failed")?;

    state.shutdown().await;
    info!("Shutdown complete");

    Ok(())
}
