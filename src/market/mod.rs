// src/market/mod.rs
pub mod aggregate;
pub mod format;
pub mod provider;
pub mod report;
pub mod types;

use std::sync::Arc;

use async_trait::async_trait;
use metrics::{counter, gauge};
use tracing::info;

use crate::cache::{flight_lock, keys, write_doc, DocumentStore, FlightLock, Refresh};
use crate::clock::SharedClock;
use crate::error::Result;

pub use aggregate::{build_snapshot, MarketStats};
pub use provider::{CoinMarketCapProvider, ListingsProvider};
pub use types::{Asset, MarketSnapshot, Quote};

/// Result of one successful market refresh.
#[derive(Debug, Clone)]
pub struct MarketRun {
    pub snapshot: MarketSnapshot,
    pub stats: MarketStats,
    pub history_key: String,
}

/// Fetch → aggregate → persist (latest, then dated history).
pub struct MarketPipeline {
    provider: Arc<dyn ListingsProvider>,
    store: Arc<dyn DocumentStore>,
    clock: SharedClock,
    flight: FlightLock,
}

impl MarketPipeline {
    pub fn new(
        provider: Arc<dyn ListingsProvider>,
        store: Arc<dyn DocumentStore>,
        clock: SharedClock,
    ) -> Self {
        Self {
            provider,
            store,
            clock,
            flight: flight_lock(),
        }
    }

    /// One full refresh. A fetch, aggregation or `latest` write failure
    /// leaves the cache untouched; history is only written once `latest` is.
    ///
    /// Does not take the flight lock; the scheduler and the staleness gate
    /// hold it around this call.
    pub async fn run(&self) -> Result<MarketRun> {
        let assets = self.provider.fetch_top().await?;
        let now = self.clock.now();
        let (snapshot, stats) = build_snapshot(&assets, now)?;

        let history_key = keys::market_history(now.date_naive());
        write_doc(self.store.as_ref(), keys::MARKET_LATEST, &snapshot).await?;
        write_doc(self.store.as_ref(), &history_key, &snapshot).await?;

        counter!("market_snapshots_total").increment(1);
        gauge!("market_last_run_ts").set(now.timestamp() as f64);
        gauge!("market_total_cap_usd").set(stats.total_market_cap);
        info!(
            target: "market",
            provider = self.provider.name(),
            assets = stats.asset_count,
            total_market_cap = stats.total_market_cap,
            sentiment = stats.sentiment.label(),
            history_key = %history_key,
            "market snapshot saved"
        );

        Ok(MarketRun {
            snapshot,
            stats,
            history_key,
        })
    }
}

#[async_trait]
impl Refresh<MarketSnapshot> for MarketPipeline {
    fn flight(&self) -> FlightLock {
        self.flight.clone()
    }

    async fn refresh(&self) -> Result<MarketSnapshot> {
        self.run().await.map(|r| r.snapshot)
    }
}
