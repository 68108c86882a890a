// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod alerts;
pub mod api;
pub mod cache;
pub mod clock;
pub mod config;
pub mod error;
pub mod market;
pub mod metrics;
pub mod scheduler;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::Duration as ChronoDuration;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::alerts::{AlertBatch, AlertPipeline, AlertSource};
use crate::cache::{keys, DocumentStore, FileStore, StalenessGate};
use crate::clock::{SharedClock, SystemClock};
use crate::config::AppConfig;
use crate::market::{CoinMarketCapProvider, ListingsProvider, MarketPipeline, MarketSnapshot};
use crate::scheduler::Scheduler;

// Convenient access to the router: `crate_root::api::router` or `crate_root::router`
pub use crate::api::{router, AppState};
pub use crate::error::{PipelineError, Result};

/// Compact logs by default, JSON lines with `LOG_FORMAT=json`.
/// Uses `try_init` so an already-installed subscriber (deployment runtime,
/// another test) is left alone.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("crypto_digest=info,warn"));
    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    let _ = if json {
        registry.with(fmt::layer().json()).try_init()
    } else {
        registry.with(fmt::layer().compact()).try_init()
    };
}

/// Shared outbound client with a fixed user agent.
pub fn http_client(cfg: &AppConfig) -> anyhow::Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(cfg.user_agent.as_str())
        .connect_timeout(Duration::from_secs(10))
        .build()
        .context("building http client")
}

/// Everything the service is assembled from. Production values come from
/// [`Components::from_config`]; tests swap in fixtures and a manual clock.
pub struct Components {
    pub listings: Arc<dyn ListingsProvider>,
    pub alert_sources: Vec<Arc<dyn AlertSource>>,
    pub store: Arc<dyn DocumentStore>,
    pub clock: SharedClock,
    pub poll: Duration,
}

impl Components {
    pub fn from_config(cfg: &AppConfig, client: reqwest::Client) -> Self {
        Self {
            listings: Arc::new(CoinMarketCapProvider::new(client.clone(), cfg)),
            alert_sources: alerts::providers::from_config(cfg, &client),
            store: Arc::new(FileStore::new(&cfg.data_dir)),
            clock: Arc::new(SystemClock),
            poll: scheduler::DEFAULT_POLL,
        }
    }

    /// Wire pipelines, staleness gates and the (not yet started) scheduler.
    pub fn into_state(self, cfg: &AppConfig) -> anyhow::Result<AppState> {
        let market = Arc::new(MarketPipeline::new(
            self.listings,
            Arc::clone(&self.store),
            Arc::clone(&self.clock),
        ));
        let alerts = Arc::new(
            AlertPipeline::new(self.alert_sources, Arc::clone(&self.store), Arc::clone(&self.clock))
                .with_timeout(Duration::from_secs(cfg.alert_timeout_secs))
                .with_label(&cfg.alert_label, &cfg.channel_url),
        );

        let max_age = ChronoDuration::hours(cfg.stale_after_hours);
        let market_gate = Arc::new(StalenessGate::<MarketSnapshot>::new(
            Arc::clone(&self.store),
            keys::MARKET_LATEST,
            max_age,
            Arc::clone(&self.clock),
            market.clone(),
        ));
        let alert_gate = Arc::new(StalenessGate::<AlertBatch>::new(
            Arc::clone(&self.store),
            keys::ALERTS_LATEST,
            max_age,
            Arc::clone(&self.clock),
            alerts.clone(),
        ));

        let mut scheduler = Scheduler::new(Arc::clone(&self.clock)).with_poll_interval(self.poll);
        scheduler
            .add_job(&cfg.market_cron, market)
            .context("market_cron")?;
        scheduler
            .add_job(&cfg.alerts_cron, alerts)
            .context("alerts_cron")?;

        Ok(AppState {
            store: self.store,
            market_gate,
            alert_gate,
            scheduler: Arc::new(scheduler),
            clock: self.clock,
        })
    }
}
