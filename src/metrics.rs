use anyhow::Context;
use axum::{routing::get, Router};
use metrics::{describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

pub struct Metrics {
    pub handle: PrometheusHandle,
}

fn describe_all() {
    describe_counter!("job_runs_total", "Job firings that started, by job");
    describe_counter!("job_failures_total", "Job firings that ended in an error, by job");
    describe_counter!("job_skipped_total", "Firings skipped because the job was still running");
    describe_counter!("alert_source_errors_total", "Failed or timed-out alert source attempts");
    describe_counter!("alert_sample_fallback_total", "Alert refreshes that fell back to sample data");
    describe_counter!("cache_refresh_total", "On-demand refreshes triggered by the read path");
    describe_counter!("market_snapshots_total", "Market snapshots persisted");
    describe_gauge!("market_last_run_ts", "Unix time of the last saved market snapshot");
    describe_gauge!("market_total_cap_usd", "Total market cap of the last snapshot");
    describe_gauge!("alerts_last_run_ts", "Unix time of the last saved alert batch");
    describe_gauge!("cache_stale_after_hours", "Freshness threshold of the read path");
}

impl Metrics {
    /// Install the global Prometheus recorder. Fails if one is already installed.
    pub fn init(stale_after_hours: i64) -> anyhow::Result<Self> {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .context("prometheus: install recorder")?;

        describe_all();
        gauge!("cache_stale_after_hours").set(stale_after_hours as f64);

        Ok(Self { handle })
    }

    /// Recorder that is not installed globally; renders an empty exposition.
    pub fn detached() -> Self {
        let recorder = PrometheusBuilder::new().build_recorder();
        Self {
            handle: recorder.handle(),
        }
    }

    /// Returns a router exposing `/metrics` with the Prometheus exposition format.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}
