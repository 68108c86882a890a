// src/market/types.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cache::Timestamped;

/// Per-asset quote in the conversion currency.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    pub price: f64,
    pub volume_24h: f64,
    pub volume_change_24h: f64,
    pub percent_change_1h: f64,
    pub percent_change_24h: f64,
    pub percent_change_7d: f64,
    pub market_cap: f64,
    pub market_cap_dominance: f64,
}

/// Canonical asset record, independent of the provider's response shape.
#[derive(Debug, Clone, PartialEq)]
pub struct Asset {
    pub symbol: String,
    pub name: String,
    pub rank: u32,
    pub quote: Quote,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LargeCapEntry {
    pub symbol: String,
    pub name: String,
    pub price: f64,
    pub percent_change_24h: f64,
    pub market_cap: f64,
}

impl From<&Asset> for LargeCapEntry {
    fn from(a: &Asset) -> Self {
        Self {
            symbol: a.symbol.clone(),
            name: a.name.clone(),
            price: a.quote.price,
            percent_change_24h: a.quote.percent_change_24h,
            market_cap: a.quote.market_cap,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendingEntry {
    pub symbol: String,
    pub name: String,
    pub price: f64,
    pub percent_change_24h: f64,
    pub volume_24h: f64,
}

impl From<&Asset> for TrendingEntry {
    fn from(a: &Asset) -> Self {
        Self {
            symbol: a.symbol.clone(),
            name: a.name.clone(),
            price: a.quote.price,
            percent_change_24h: a.quote.percent_change_24h,
            volume_24h: a.quote.volume_24h,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketData {
    pub btc: Quote,
    pub eth: Quote,
    pub large_caps: Vec<LargeCapEntry>,
    pub trending: Vec<TrendingEntry>,
}

/// One completed market refresh. Never mutated after it is written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketSnapshot {
    pub timestamp: DateTime<Utc>,
    pub summary: String,
    pub analysis: String,
    pub top_coins: Vec<String>,
    pub market_data: MarketData,
}

impl Timestamped for MarketSnapshot {
    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}
