// src/scheduler/jobs.rs
//! Scheduler adapters for the two refresh pipelines. Scheduled firings always
//! aggregate fresh; they never go through the staleness gate, but share its
//! flight lock so the two never produce the same document concurrently.

use async_trait::async_trait;

use crate::alerts::{AlertBatch, AlertPipeline};
use crate::cache::{FlightLock, Refresh};
use crate::market::{MarketPipeline, MarketSnapshot};
use crate::scheduler::{Job, JobTrigger};

pub const MARKET_JOB: &str = "market-analysis";
pub const ALERTS_JOB: &str = "scam-alerts";

#[async_trait]
impl Job for MarketPipeline {
    fn name(&self) -> &str {
        MARKET_JOB
    }

    fn shared_flight(&self) -> Option<FlightLock> {
        Some(Refresh::<MarketSnapshot>::flight(self))
    }

    async fn run(&self, _trigger: &JobTrigger) -> anyhow::Result<String> {
        let run = MarketPipeline::run(self).await?;
        Ok(format!(
            "{} assets, sentiment {}, saved {}",
            run.stats.asset_count,
            run.stats.sentiment.label(),
            run.history_key
        ))
    }
}

#[async_trait]
impl Job for AlertPipeline {
    fn name(&self) -> &str {
        ALERTS_JOB
    }

    fn shared_flight(&self) -> Option<FlightLock> {
        Some(Refresh::<AlertBatch>::flight(self))
    }

    async fn run(&self, _trigger: &JobTrigger) -> anyhow::Result<String> {
        let batch = AlertPipeline::run(self).await?;
        Ok(format!(
            "{} alerts ({} high) from {:?} data",
            batch.alert_count,
            batch.high_severity_count(),
            batch.data_source
        ))
    }
}
