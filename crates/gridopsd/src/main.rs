//! GridOps Daemon - natural-language questions over grid usage data
//!
//! Serves the chat and health endpoints on top of the orchestration pipeline.

use anyhow::Result;
use gridops_shared::BackendTarget;
use gridopsd::server::{self, AppState};
use gridopsd::{ArtifactPredictor, Config, HttpBackend, Pipeline, PlotlyRenderer, SqliteStorage};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("GridOps Daemon v{} starting", gridops_shared::VERSION);

    let config = Config::load();
    info!(
        "Backends: local {} ({}), remote {} ({})",
        config.backend.local_model,
        config.backend.timeout_for(BackendTarget::Local).as_secs(),
        config.backend.remote_model,
        config.backend.timeout_for(BackendTarget::Remote).as_secs()
    );
    if !config.backend.has_remote_credential() {
        warn!("No remote API key configured; remote requests will be rejected by the provider");
    }

    let storage = SqliteStorage::from_config(&config.storage);
    storage.ensure_schema()?;

    let predictor = ArtifactPredictor::from_config(&config.forecast);
    if !config.forecast.model_path.exists() {
        warn!(
            "Model artifact {} not found; forecasts will report MODEL_NOT_TRAINED",
            config.forecast.model_path.display()
        );
    }

    let pipeline = Pipeline::new(
        Arc::new(HttpBackend::new(config.backend.clone())?),
        Arc::new(storage),
        Arc::new(predictor),
        Arc::new(PlotlyRenderer),
        &config,
    );

    info!("GridOps Daemon ready");
    server::run(
        AppState::new(pipeline),
        &config.server.bind,
        config.server.request_timeout(),
    )
    .await
}
