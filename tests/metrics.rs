// tests/metrics.rs
//
// One test per binary: the Prometheus recorder is process-global.

mod common;

use std::sync::Arc;

use axum::body::{self, Body};
use axum::http::{Request, StatusCode};
use tower::ServiceExt;

use crypto_digest::alerts::AlertSource;
use crypto_digest::metrics::Metrics;
use crypto_digest::router;

use common::{harness, utc, FailingSource};

#[tokio::test]
async fn metrics_endpoint_contains_expected_series() {
    let metrics = Metrics::init(12).expect("install recorder");

    let sources: Vec<Arc<dyn AlertSource>> = vec![Arc::new(FailingSource("down"))];
    let h = harness(utc(2025, 3, 1, 12, 0), sources);
    h.state.scheduler.start().await.expect("start");

    let app = router(h.state.clone()).merge(metrics.router());
    let _ = app
        .clone()
        .oneshot(Request::get("/market-analysis/current").body(Body::empty()).unwrap())
        .await
        .unwrap();

    let resp = app
        .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    // axum::body::to_bytes requires an explicit limit
    let body = body::to_bytes(resp.into_body(), 1_048_576).await.unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();

    for needle in [
        "job_runs_total",
        "alert_source_errors_total",
        "alert_sample_fallback_total",
        "market_last_run_ts",
        "alerts_last_run_ts",
        "cache_stale_after_hours",
    ] {
        assert!(text.contains(needle), "missing {needle} in:\n{text}");
    }

    h.state.scheduler.stop().await.expect("stop");
}
