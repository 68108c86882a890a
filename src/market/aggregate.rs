// src/market/aggregate.rs
//! Pure snapshot construction: no I/O, deterministic for a given input + instant.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::{PipelineError, Result};
use crate::market::format::Sentiment;
use crate::market::report;
use crate::market::types::{Asset, LargeCapEntry, MarketData, MarketSnapshot, TrendingEntry};

pub const BTC: &str = "BTC";
pub const ETH: &str = "ETH";
/// Cap for `largeCaps`, `trending` and `topCoins`.
pub const LIST_CAP: usize = 10;
/// Number of top-ranked assets feeding the sentiment mean.
pub const SENTIMENT_WINDOW: usize = 20;

/// Figures computed along the way; reported to the caller, not persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarketStats {
    pub asset_count: usize,
    pub total_market_cap: f64,
    pub total_volume_24h: f64,
    pub mean_change_top20: f64,
    pub sentiment: Sentiment,
}

pub fn is_distinguished(symbol: &str) -> bool {
    symbol == BTC || symbol == ETH
}

/// Assets other than BTC/ETH, in source (market-cap) order, capped at 10.
pub fn large_caps(assets: &[Asset]) -> Vec<&Asset> {
    assets
        .iter()
        .filter(|a| !is_distinguished(&a.symbol))
        .take(LIST_CAP)
        .collect()
}

/// All assets sorted by descending 24h change. Stable for equal changes.
pub fn top_gainers(assets: &[Asset]) -> Vec<&Asset> {
    let mut v: Vec<&Asset> = assets.iter().collect();
    v.sort_by(|a, b| {
        b.quote
            .percent_change_24h
            .total_cmp(&a.quote.percent_change_24h)
    });
    v
}

/// Mean 24h change over the first `SENTIMENT_WINDOW` assets (fewer if the list is short).
pub fn mean_change_top(assets: &[Asset]) -> f64 {
    let window = &assets[..assets.len().min(SENTIMENT_WINDOW)];
    if window.is_empty() {
        return 0.0;
    }
    window.iter().map(|a| a.quote.percent_change_24h).sum::<f64>() / window.len() as f64
}

pub fn compute_stats(assets: &[Asset]) -> MarketStats {
    let total_market_cap = assets.iter().map(|a| a.quote.market_cap).sum();
    let total_volume_24h = assets.iter().map(|a| a.quote.volume_24h).sum();
    let mean = mean_change_top(assets);
    MarketStats {
        asset_count: assets.len(),
        total_market_cap,
        total_volume_24h,
        mean_change_top20: mean,
        sentiment: Sentiment::from_mean_change(mean),
    }
}

/// Label shown in `topCoins`, e.g. `SOL (+12.3%)`.
pub fn coin_label(a: &Asset) -> String {
    format!("{} ({:+.1}%)", a.symbol, a.quote.percent_change_24h)
}

/// Build the snapshot for one refresh. Fails when BTC or ETH is absent.
pub fn build_snapshot(
    assets: &[Asset],
    now: DateTime<Utc>,
) -> Result<(MarketSnapshot, MarketStats)> {
    let find = |sym: &str| {
        assets.iter().find(|a| a.symbol == sym).ok_or_else(|| {
            PipelineError::DataIntegrity(format!("{sym} missing from listings response"))
        })
    };
    let btc = find(BTC)?;
    let eth = find(ETH)?;

    let caps = large_caps(assets);
    let gainers = top_gainers(assets);
    let trending: Vec<&Asset> = gainers.iter().take(LIST_CAP).copied().collect();
    let stats = compute_stats(assets);

    let summary = report::compose_summary(btc, eth, &stats);
    let analysis = report::compose_analysis(now, btc, eth, &caps, &gainers, &stats);

    let snapshot = MarketSnapshot {
        timestamp: now,
        summary,
        analysis,
        top_coins: trending.iter().map(|a| coin_label(a)).collect(),
        market_data: MarketData {
            btc: btc.quote.clone(),
            eth: eth.quote.clone(),
            large_caps: caps.iter().map(|a| LargeCapEntry::from(*a)).collect(),
            trending: trending.iter().map(|a| TrendingEntry::from(*a)).collect(),
        },
    };
    Ok((snapshot, stats))
}
