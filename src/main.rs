//! Crypto digest service, binary entrypoint.
//! Boots the Axum HTTP server, wires the refresh pipelines and starts the
//! scheduler in the background.

use std::sync::Arc;

use anyhow::Context;
use shuttle_axum::ShuttleAxum;
use tracing::{error, info, warn};

use crypto_digest::config::AppConfig;
use crypto_digest::metrics::Metrics;
use crypto_digest::{http_client, init_tracing, router, Components};

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = AppConfig::load_default().context("loading app config")?;
    if cfg.cmc_api_key.is_none() {
        warn!("COINMARKETCAP_API_KEY not set; market refreshes will fail until it is");
    }
    info!(data_dir = %cfg.data_dir.display(), sources = cfg.alert_sources.len(), "config loaded");

    let metrics = Metrics::init(cfg.stale_after_hours).unwrap_or_else(|e| {
        warn!(error = ?e, "metrics recorder unavailable, /metrics will be empty");
        Metrics::detached()
    });

    let client = http_client(&cfg)?;
    let state = Components::from_config(&cfg, client).into_state(&cfg)?;

    // Priming runs both jobs once; keep it off the startup path.
    let scheduler = Arc::clone(&state.scheduler);
    tokio::spawn(async move {
        if let Err(e) = scheduler.start().await {
            error!(error = %e, "scheduler failed to start");
        }
    });

    let app = router(state).merge(metrics.router());
    Ok(app.into())
}
