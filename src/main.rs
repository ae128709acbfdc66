//! Tumor Classification Service
//!
//! Serves malignant/benign predictions for breast tumor measurements
//! over a small REST API (Axum).

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::FmtSubscriber;

use tumor_classifier::api::{create_rest_router, AppState};
use tumor_classifier::config::Config;
use tumor_classifier::engine::Artifacts;
use tumor_classifier::service::PredictionService;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config_path = Config::default_path();
    let (mut config, config_note) = match Config::load(&config_path) {
        Ok(config) => (config, format!("Configuration loaded from {}", config_path.display())),
        Err(e) if !config_path.exists() => (Config::default(), format!("Using default config ({:#})", e)),
        Err(e) => return Err(e),
    };
    config.apply_env_overrides();

    // Initialize logging
    let level = config.logging.level()?;
    FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .init();

    info!("Starting Tumor Classification Service v{}", env!("CARGO_PKG_VERSION"));
    info!("{}", config_note);
    info!("  Model: {}", config.artifacts.model.display());
    info!("  Scaler: {}", config.artifacts.scaler.display());
    info!("  Allowed origins: {:?}", config.cors.allowed_origins);

    // Load artifacts; no artifacts, no service
    let artifacts = Artifacts::load(&config.artifacts).map_err(|e| {
        error!("Failed to load artifacts: {:#}", e);
        e
    })?;

    let service = Arc::new(PredictionService::new(artifacts));
    let app_state = Arc::new(AppState::new(service, &config));
    let rest_router = create_rest_router(app_state, &config)?;

    let addr = config.bind_addr();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("REST API listening on http://{}", addr);
    info!("Tumor Classification Service is ready!");

    axum::serve(listener, rest_router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Goodbye!");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received, draining connections...");
}
