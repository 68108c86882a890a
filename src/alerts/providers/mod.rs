// src/alerts/providers/mod.rs
pub mod fixture;
pub mod http_feed;

use std::sync::Arc;

use crate::alerts::types::AlertSource;
use crate::config::AppConfig;

pub use fixture::FixtureSource;
pub use http_feed::HttpFeedSource;

/// Sources in configured priority order.
pub fn from_config(cfg: &AppConfig, client: &reqwest::Client) -> Vec<Arc<dyn AlertSource>> {
    cfg.alert_sources
        .iter()
        .map(|s| {
            Arc::new(
                HttpFeedSource::new(&s.name, &s.url, &cfg.channel_url, client.clone())
                    .with_timeout(cfg.alert_timeout_secs),
            ) as Arc<dyn AlertSource>
        })
        .collect()
}
