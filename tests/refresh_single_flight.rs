// tests/refresh_single_flight.rs
//
// On-demand refreshes and scheduler firings share one flight lock per
// document: readers wait for an in-flight run instead of starting another.

mod common;

use std::sync::Arc;
use std::time::Duration;

use crypto_digest::cache::ServedFrom;
use crypto_digest::config::AppConfig;
use crypto_digest::scheduler::{JobOutcome, MARKET_JOB};

use common::{harness_with, utc, StaticListings};

#[tokio::test]
async fn readers_wait_for_startup_priming_instead_of_fetching() {
    let listings = Arc::new(StaticListings::from_fixture().with_delay(Duration::from_millis(300)));
    let h = harness_with(utc(2025, 3, 1, 12, 0), listings, &AppConfig::default());

    let starter = {
        let scheduler = h.state.scheduler.clone();
        tokio::spawn(async move { scheduler.start().await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    let (a, b) = tokio::join!(h.state.market_gate.get(), h.state.market_gate.get());
    let (a, b) = (a.expect("first reader"), b.expect("second reader"));
    starter.await.expect("join").expect("start");

    assert_eq!(h.listings.calls(), 1);
    assert_eq!(h.listings.peak(), 1);
    assert_eq!(a.from, ServedFrom::Cache);
    assert_eq!(b.from, ServedFrom::Cache);
    assert_eq!(a.doc, b.doc);

    h.state.scheduler.stop().await.expect("stop");
}

#[tokio::test]
async fn manual_firing_is_skipped_while_a_reader_refreshes() {
    let cfg = AppConfig {
        stale_after_hours: 1,
        ..AppConfig::default()
    };
    let listings = Arc::new(StaticListings::from_fixture().with_delay(Duration::from_millis(200)));
    let h = harness_with(utc(2025, 3, 1, 12, 0), listings, &cfg);
    h.state.scheduler.start().await.expect("start");
    assert_eq!(h.listings.calls(), 1);

    // Two hours later the primed snapshot is stale; no market firing is due
    // before 20:00.
    h.clock.set(utc(2025, 3, 1, 14, 0));
    let reader = {
        let gate = h.state.market_gate.clone();
        tokio::spawn(async move { gate.get().await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    let manual = h.state.scheduler.trigger(MARKET_JOB).await.expect("trigger");
    assert_eq!(manual, JobOutcome::Skipped);

    let served = reader.await.expect("join").expect("refresh");
    assert_eq!(served.from, ServedFrom::Refreshed);
    assert_eq!(served.doc.timestamp, utc(2025, 3, 1, 14, 0));
    assert_eq!(h.listings.calls(), 2);
    assert_eq!(h.listings.peak(), 1);

    h.state.scheduler.stop().await.expect("stop");
}
