// tests/common/mod.rs
//
// Shared test doubles: static listings, failing/slow alert sources, a fixed
// clock and an in-memory wiring of the whole service.
#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};

use crypto_digest::alerts::{AlertDraft, AlertSource};
use crypto_digest::cache::{DocumentStore, MemoryStore};
use crypto_digest::clock::ManualClock;
use crypto_digest::config::AppConfig;
use crypto_digest::error::{PipelineError, Result};
use crypto_digest::market::provider::normalize_listings;
use crypto_digest::market::{Asset, ListingsProvider, Quote};
use crypto_digest::{AppState, Components};

pub const LISTINGS_JSON: &str = include_str!("../fixtures/cmc_listings.json");
pub const ALERTS_RSS: &str = include_str!("../fixtures/alerts_rss.xml");

pub fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
}

pub fn asset(symbol: &str, rank: u32, market_cap: f64, change_24h: f64) -> Asset {
    Asset {
        symbol: symbol.to_string(),
        name: format!("{symbol} coin"),
        rank,
        quote: Quote {
            price: 1.5,
            volume_24h: market_cap / 20.0,
            percent_change_24h: change_24h,
            market_cap,
            ..Quote::default()
        },
    }
}

/// Listings provider that returns a fixed list, optionally after a delay,
/// and counts calls and peak concurrency.
pub struct StaticListings {
    assets: Vec<Asset>,
    delay: Duration,
    pub calls: AtomicUsize,
    active: AtomicUsize,
    peak: AtomicUsize,
}

impl StaticListings {
    pub fn new(assets: Vec<Asset>) -> Self {
        Self {
            assets,
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
            active: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    pub fn from_fixture() -> Self {
        Self::new(normalize_listings(LISTINGS_JSON, "USD").expect("fixture listings"))
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Most fetches ever in progress at once.
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ListingsProvider for StaticListings {
    async fn fetch_top(&self) -> Result<Vec<Asset>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(active, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.active.fetch_sub(1, Ordering::SeqCst);
        Ok(self.assets.clone())
    }

    fn name(&self) -> &'static str {
        "static"
    }
}

/// Listings provider that always fails the way a bad upstream would.
pub struct DownListings;

#[async_trait]
impl ListingsProvider for DownListings {
    async fn fetch_top(&self) -> Result<Vec<Asset>> {
        Err(PipelineError::upstream("coinmarketcap", "HTTP 503 Service Unavailable"))
    }

    fn name(&self) -> &'static str {
        "down"
    }
}

pub struct FailingSource(pub &'static str);

#[async_trait]
impl AlertSource for FailingSource {
    async fn fetch(&self) -> anyhow::Result<Vec<AlertDraft>> {
        Err(PipelineError::upstream(self.0, "HTTP 502 Bad Gateway").into())
    }

    fn name(&self) -> &str {
        self.0
    }
}

/// Never answers within any sane timeout.
pub struct SlowSource;

#[async_trait]
impl AlertSource for SlowSource {
    async fn fetch(&self) -> anyhow::Result<Vec<AlertDraft>> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(Vec::new())
    }

    fn name(&self) -> &str {
        "slow"
    }
}

pub struct StaticSource {
    pub name: &'static str,
    pub drafts: Vec<AlertDraft>,
}

#[async_trait]
impl AlertSource for StaticSource {
    async fn fetch(&self) -> anyhow::Result<Vec<AlertDraft>> {
        Ok(self.drafts.clone())
    }

    fn name(&self) -> &str {
        self.name
    }
}

pub fn draft(id: &str, date: DateTime<Utc>, content: &str) -> AlertDraft {
    AlertDraft {
        id: id.to_string(),
        date,
        content: content.to_string(),
        link: format!("https://t.me/investigations/{id}"),
    }
}

pub struct Harness {
    pub state: AppState,
    pub store: Arc<MemoryStore>,
    pub clock: Arc<ManualClock>,
    pub listings: Arc<StaticListings>,
}

/// Whole service over an in-memory store, fixture listings and the given
/// alert sources, with the clock fixed at `now`.
pub fn harness(now: DateTime<Utc>, alert_sources: Vec<Arc<dyn AlertSource>>) -> Harness {
    let store = Arc::new(MemoryStore::new());
    let clock = Arc::new(ManualClock::new(now));
    let listings = Arc::new(StaticListings::from_fixture());
    let cfg = AppConfig::default();

    let state = Components {
        listings: listings.clone(),
        alert_sources,
        store: store.clone() as Arc<dyn DocumentStore>,
        clock: clock.clone(),
        poll: Duration::from_millis(5),
    }
    .into_state(&cfg)
    .expect("wire state");

    Harness {
        state,
        store,
        clock,
        listings,
    }
}

/// Like [`harness`], with a caller-supplied listings provider and config.
pub fn harness_with(
    now: DateTime<Utc>,
    listings: Arc<StaticListings>,
    cfg: &AppConfig,
) -> Harness {
    let store = Arc::new(MemoryStore::new());
    let clock = Arc::new(ManualClock::new(now));

    let state = Components {
        listings: listings.clone(),
        alert_sources: Vec::new(),
        store: store.clone() as Arc<dyn DocumentStore>,
        clock: clock.clone(),
        poll: Duration::from_millis(5),
    }
    .into_state(cfg)
    .expect("wire state");

    Harness {
        state,
        store,
        clock,
        listings,
    }
}
