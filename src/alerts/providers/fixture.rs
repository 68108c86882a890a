// src/alerts/providers/fixture.rs
use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;

use crate::alerts::normalize::{drafts_from_json, drafts_from_rss};
use crate::alerts::types::{AlertDraft, AlertSource};

enum Body {
    Rss(String),
    Json(String),
}

/// Alert source backed by an in-memory response body (local runs, tests).
pub struct FixtureSource {
    name: String,
    channel_url: String,
    body: Body,
}

impl FixtureSource {
    pub fn rss(name: impl Into<String>, xml: &str) -> Self {
        Self {
            name: name.into(),
            channel_url: "https://t.me/investigations".to_string(),
            body: Body::Rss(xml.to_string()),
        }
    }

    pub fn json(name: impl Into<String>, json: &str) -> Self {
        Self {
            name: name.into(),
            channel_url: "https://t.me/investigations".to_string(),
            body: Body::Json(json.to_string()),
        }
    }
}

#[async_trait]
impl AlertSource for FixtureSource {
    async fn fetch(&self) -> Result<Vec<AlertDraft>> {
        let now = Utc::now();
        match &self.body {
            Body::Rss(xml) => drafts_from_rss(xml, &self.channel_url, now),
            Body::Json(s) => {
                let v: serde_json::Value = serde_json::from_str(s)?;
                drafts_from_json(&v, &self.channel_url, now)
            }
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}
