// src/alerts/mod.rs
pub mod classify;
pub mod normalize;
pub mod providers;
pub mod sample;
pub mod types;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use metrics::{counter, gauge};
use tracing::{info, warn};

use crate::cache::{flight_lock, keys, write_doc, DocumentStore, FlightLock, Refresh};
use crate::clock::SharedClock;
use crate::error::{PipelineError, Result};

pub use classify::{classify, Classification};
pub use types::{AlertBatch, AlertDraft, AlertRecord, AlertSource, DataSource, Severity};

/// Alerts kept in a stored batch.
pub const BATCH_CAP: usize = 10;

/// Per-source result of one attempt.
#[derive(Debug)]
pub enum SourceOutcome {
    Records(Vec<AlertDraft>),
    Empty,
    Failed(PipelineError),
}

pub struct AlertPipeline {
    sources: Vec<Arc<dyn AlertSource>>,
    store: Arc<dyn DocumentStore>,
    clock: SharedClock,
    attempt_timeout: Duration,
    label: String,
    channel_url: String,
    flight: FlightLock,
}

impl AlertPipeline {
    pub fn new(
        sources: Vec<Arc<dyn AlertSource>>,
        store: Arc<dyn DocumentStore>,
        clock: SharedClock,
    ) -> Self {
        Self {
            sources,
            store,
            clock,
            attempt_timeout: Duration::from_secs(5),
            label: "ZachXBT Telegram (@investigations)".to_string(),
            channel_url: "https://t.me/investigations".to_string(),
            flight: flight_lock(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = timeout;
        self
    }

    pub fn with_label(mut self, label: impl Into<String>, channel_url: impl Into<String>) -> Self {
        self.label = label.into();
        self.channel_url = channel_url.into();
        self
    }

    /// One isolated attempt: errors and timeouts become `Failed`, never panics upward.
    pub async fn attempt(&self, source: &dyn AlertSource) -> SourceOutcome {
        match tokio::time::timeout(self.attempt_timeout, source.fetch()).await {
            Ok(Ok(drafts)) if drafts.is_empty() => SourceOutcome::Empty,
            Ok(Ok(drafts)) => SourceOutcome::Records(drafts),
            Ok(Err(e)) => SourceOutcome::Failed(match e.downcast::<PipelineError>() {
                Ok(pe) => pe,
                Err(other) => PipelineError::upstream(source.name(), format!("{other:#}")),
            }),
            Err(_) => SourceOutcome::Failed(PipelineError::upstream(
                source.name(),
                format!("timed out after {}ms", self.attempt_timeout.as_millis()),
            )),
        }
    }

    /// Walk the sources in order; the first one with records wins.
    /// Returns the winning source's name with its drafts.
    pub async fn first_success(&self) -> Option<(String, Vec<AlertDraft>)> {
        for source in &self.sources {
            info!(target: "alerts", source = source.name(), "trying alert source");
            match self.attempt(source.as_ref()).await {
                SourceOutcome::Records(drafts) => {
                    return Some((source.name().to_string(), drafts));
                }
                SourceOutcome::Empty => {
                    info!(target: "alerts", source = source.name(), "source returned no alerts");
                }
                SourceOutcome::Failed(e) => {
                    warn!(target: "alerts", source = source.name(), error = %e, "alert source failed");
                    counter!("alert_source_errors_total").increment(1);
                }
            }
        }
        None
    }

    /// Build a batch without persisting it. Never fails: exhausting every
    /// source yields the sample set.
    pub async fn collect(&self) -> AlertBatch {
        let (drafts, data_source, source) = match self.first_success().await {
            Some((name, drafts)) => (
                drafts,
                DataSource::Live,
                format!("{} via {}", self.label, name),
            ),
            None => {
                info!(target: "alerts", "using sample data (real sources unavailable)");
                counter!("alert_sample_fallback_total").increment(1);
                let now = self.clock.now();
                (
                    sample::sample_drafts(now, &self.channel_url),
                    DataSource::Sample,
                    format!("{} (built-in sample)", self.label),
                )
            }
        };
        finish_batch(drafts, data_source, source, self.clock.now())
    }

    /// Collect and overwrite the single latest alert document.
    pub async fn run(&self) -> Result<AlertBatch> {
        let batch = self.collect().await;
        write_doc(self.store.as_ref(), keys::ALERTS_LATEST, &batch).await?;

        gauge!("alerts_last_run_ts").set(batch.timestamp.timestamp() as f64);
        info!(
            target: "alerts",
            alerts = batch.alert_count,
            high = batch.high_severity_count(),
            data_source = ?batch.data_source,
            "alert batch saved"
        );
        Ok(batch)
    }
}

/// Classify, order newest first, cap, wrap.
pub fn finish_batch(
    drafts: Vec<AlertDraft>,
    data_source: DataSource,
    source: String,
    now: chrono::DateTime<chrono::Utc>,
) -> AlertBatch {
    let mut alerts: Vec<AlertRecord> = normalize::dedup_by_id(drafts)
        .into_iter()
        .map(AlertRecord::from)
        .collect();
    alerts.sort_by(|a, b| b.date.cmp(&a.date));
    alerts.truncate(BATCH_CAP);

    AlertBatch {
        timestamp: now,
        source,
        alert_count: alerts.len(),
        alerts,
        last_checked: now,
        data_source,
    }
}

#[async_trait]
impl Refresh<AlertBatch> for AlertPipeline {
    fn flight(&self) -> FlightLock {
        self.flight.clone()
    }

    async fn refresh(&self) -> Result<AlertBatch> {
        self.run().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration as ChronoDuration, TimeZone, Utc};

    fn draft(id: &str, hours_ago: i64, content: &str) -> AlertDraft {
        let base = Utc.with_ymd_and_hms(2025, 7, 1, 9, 0, 0).unwrap();
        AlertDraft {
            id: id.into(),
            date: base - ChronoDuration::hours(hours_ago),
            content: content.into(),
            link: "https://t.me/investigations".into(),
        }
    }

    #[test]
    fn finish_sorts_caps_and_counts_stored_alerts() {
        let drafts: Vec<AlertDraft> = (0..14)
            .map(|i| draft(&format!("a{i}"), (i * 5) % 14, "fake giveaway"))
            .collect();
        let batch = finish_batch(drafts, DataSource::Live, "x".into(), Utc::now());
        assert_eq!(batch.alerts.len(), BATCH_CAP);
        assert_eq!(batch.alert_count, BATCH_CAP);
        assert!(batch.alerts.windows(2).all(|w| w[0].date >= w[1].date));
        assert!(batch.alerts.iter().all(|a| a.severity == Severity::Medium));
    }

    #[test]
    fn batch_serializes_with_camel_case_fields() {
        let batch = finish_batch(
            vec![draft("a", 1, "wallet drained")],
            DataSource::Sample,
            "s".into(),
            Utc.with_ymd_and_hms(2025, 7, 1, 9, 0, 0).unwrap(),
        );
        let v = serde_json::to_value(&batch).unwrap();
        assert_eq!(v["alertCount"], 1);
        assert_eq!(v["dataSource"], "sample");
        assert_eq!(v["alerts"][0]["severity"], "high");
        assert_eq!(v["alerts"][0]["keywords"][0], "drained");
        assert_eq!(v["timestamp"], "2025-07-01T09:00:00Z");
    }
}
