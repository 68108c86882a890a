// src/market/provider.rs
//! Market listings adapters. CoinMarketCap is the production source; its
//! response shape is normalized into [`Asset`] here so nothing downstream
//! knows about provider field names.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::AppConfig;
use crate::error::{PipelineError, Result};
use crate::market::types::{Asset, Quote};

const PROVIDER: &str = "coinmarketcap";
const LISTINGS_PATH: &str = "/v1/cryptocurrency/listings/latest";

#[async_trait]
pub trait ListingsProvider: Send + Sync {
    /// Top assets by market capitalization, in the provider's rank order.
    async fn fetch_top(&self) -> Result<Vec<Asset>>;
    fn name(&self) -> &'static str;
}

// ------------------------------------------------------------
// Provider-shaped payload
// ------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ListingsResponse {
    data: Option<Vec<RawListing>>,
    status: Option<RawStatus>,
}

#[derive(Debug, Deserialize)]
struct RawStatus {
    error_code: Option<i64>,
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawListing {
    name: String,
    symbol: String,
    cmc_rank: Option<u32>,
    #[serde(default)]
    quote: HashMap<String, RawQuote>,
}

// CMC sends `null` for unknown figures.
#[derive(Debug, Deserialize)]
struct RawQuote {
    price: Option<f64>,
    volume_24h: Option<f64>,
    volume_change_24h: Option<f64>,
    percent_change_1h: Option<f64>,
    percent_change_24h: Option<f64>,
    percent_change_7d: Option<f64>,
    market_cap: Option<f64>,
    market_cap_dominance: Option<f64>,
}

impl From<&RawQuote> for Quote {
    fn from(q: &RawQuote) -> Self {
        Self {
            price: q.price.unwrap_or_default(),
            volume_24h: q.volume_24h.unwrap_or_default(),
            volume_change_24h: q.volume_change_24h.unwrap_or_default(),
            percent_change_1h: q.percent_change_1h.unwrap_or_default(),
            percent_change_24h: q.percent_change_24h.unwrap_or_default(),
            percent_change_7d: q.percent_change_7d.unwrap_or_default(),
            market_cap: q.market_cap.unwrap_or_default(),
            market_cap_dominance: q.market_cap_dominance.unwrap_or_default(),
        }
    }
}

/// Parse a listings body into canonical assets quoted in `convert`.
///
/// Listings without a quote in the conversion currency are dropped; a body
/// without a `data` array is an upstream error.
pub fn normalize_listings(body: &str, convert: &str) -> Result<Vec<Asset>> {
    let resp: ListingsResponse = serde_json::from_str(body)
        .map_err(|e| PipelineError::upstream(PROVIDER, format!("malformed payload: {e}")))?;

    let Some(data) = resp.data else {
        let msg = resp
            .status
            .and_then(|s| {
                s.error_message
                    .map(|m| format!("{} (code {})", m, s.error_code.unwrap_or_default()))
            })
            .unwrap_or_else(|| "payload has no data array".to_string());
        return Err(PipelineError::upstream(PROVIDER, msg));
    };

    let mut out = Vec::with_capacity(data.len());
    let mut dropped = 0usize;
    for (i, raw) in data.iter().enumerate() {
        let Some(q) = raw.quote.get(convert) else {
            dropped += 1;
            continue;
        };
        out.push(Asset {
            symbol: raw.symbol.trim().to_ascii_uppercase(),
            name: raw.name.trim().to_string(),
            rank: raw.cmc_rank.unwrap_or((i + 1) as u32),
            quote: Quote::from(q),
        });
    }
    if dropped > 0 {
        warn!(provider = PROVIDER, dropped, convert, "listings without quote dropped");
    }
    Ok(out)
}

// ------------------------------------------------------------
// CoinMarketCap
// ------------------------------------------------------------

pub struct CoinMarketCapProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    limit: u32,
    convert: String,
    timeout: Duration,
}

impl CoinMarketCapProvider {
    pub fn new(client: reqwest::Client, cfg: &AppConfig) -> Self {
        Self {
            client,
            base_url: cfg.cmc_base_url.trim_end_matches('/').to_string(),
            api_key: cfg.cmc_api_key.clone(),
            limit: cfg.listing_limit,
            convert: cfg.convert.clone(),
            timeout: Duration::from_secs(cfg.cmc_timeout_secs),
        }
    }
}

#[async_trait]
impl ListingsProvider for CoinMarketCapProvider {
    async fn fetch_top(&self) -> Result<Vec<Asset>> {
        let Some(key) = self.api_key.as_deref() else {
            return Err(PipelineError::Configuration(
                "COINMARKETCAP_API_KEY not found in environment".to_string(),
            ));
        };

        let url = format!("{}{}", self.base_url, LISTINGS_PATH);
        let limit = self.limit.to_string();
        debug!(provider = PROVIDER, %url, "fetching listings");

        let resp = self
            .client
            .get(&url)
            .timeout(self.timeout)
            .header("X-CMC_PRO_API_KEY", key)
            .header(reqwest::header::ACCEPT, "application/json")
            .query(&[
                ("start", "1"),
                ("limit", limit.as_str()),
                ("convert", self.convert.as_str()),
                ("sort", "market_cap"),
                ("sort_dir", "desc"),
            ])
            .send()
            .await
            .map_err(|e| PipelineError::upstream(PROVIDER, e))?;

        let status = resp.status();
        if !status.is_success() {
            if status == reqwest::StatusCode::UNAUTHORIZED {
                warn!(provider = PROVIDER, "invalid API key, check COINMARKETCAP_API_KEY");
            }
            return Err(PipelineError::upstream(PROVIDER, format!("HTTP {status}")));
        }

        let body = resp
            .text()
            .await
            .map_err(|e| PipelineError::upstream(PROVIDER, e))?;
        normalize_listings(&body, &self.convert)
    }

    fn name(&self) -> &'static str {
        PROVIDER
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BODY: &str = r#"{
        "status": {"error_code": 0, "error_message": null},
        "data": [
            {"id": 1, "name": "Bitcoin", "symbol": "BTC", "cmc_rank": 1,
             "quote": {"USD": {"price": 64000.5, "volume_24h": 3.1e10, "volume_change_24h": 1.2,
                               "percent_change_1h": 0.1, "percent_change_24h": 2.5, "percent_change_7d": 4.0,
                               "market_cap": 1.26e12, "market_cap_dominance": 52.3}}},
            {"id": 1027, "name": "Ethereum", "symbol": "eth", "cmc_rank": 2,
             "quote": {"USD": {"price": 3100.0, "volume_24h": 1.5e10, "volume_change_24h": null,
                               "percent_change_1h": null, "percent_change_24h": -1.0, "percent_change_7d": 0.5,
                               "market_cap": 3.7e11, "market_cap_dominance": 16.1}}},
            {"id": 9, "name": "NoUsd", "symbol": "NUS", "cmc_rank": 3, "quote": {"EUR": {"price": 1.0}}}
        ]
    }"#;

    #[test]
    fn normalizes_quotes_and_drops_foreign_currency() {
        let assets = normalize_listings(BODY, "USD").unwrap();
        assert_eq!(assets.len(), 2);
        assert_eq!(assets[0].symbol, "BTC");
        assert_eq!(assets[0].quote.market_cap, 1.26e12);
        assert_eq!(assets[1].symbol, "ETH");
        // nulls become zero
        assert_eq!(assets[1].quote.volume_change_24h, 0.0);
    }

    #[test]
    fn error_status_is_upstream_error() {
        let body = r#"{"status": {"error_code": 1002, "error_message": "API key missing."}}"#;
        let err = normalize_listings(body, "USD").unwrap_err();
        assert!(matches!(err, PipelineError::Upstream { .. }));
        assert!(err.to_string().contains("API key missing."));
    }

    #[test]
    fn garbage_is_upstream_error() {
        let err = normalize_listings("<html>", "USD").unwrap_err();
        assert_eq!(err.kind(), "upstream");
    }

    #[tokio::test]
    async fn missing_key_is_configuration_error() {
        let cfg = AppConfig::default();
        let p = CoinMarketCapProvider::new(reqwest::Client::new(), &cfg);
        let err = p.fetch_top().await.unwrap_err();
        assert!(matches!(err, PipelineError::Configuration(_)));
    }
}
