// src/alerts/providers/http_feed.rs
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::time::Duration;

use crate::alerts::normalize::{drafts_from_json, drafts_from_rss};
use crate::alerts::types::{AlertDraft, AlertSource};
use crate::error::PipelineError;

const ACCEPT: &str = "application/rss+xml, application/xml, text/xml, application/json";

/// One mirror of the alert channel, reachable over HTTP. The body is read as
/// JSON when the server says so (or it plainly is JSON), otherwise as RSS.
pub struct HttpFeedSource {
    name: String,
    url: String,
    channel_url: String,
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpFeedSource {
    pub fn new(
        name: impl Into<String>,
        url: impl Into<String>,
        channel_url: impl Into<String>,
        client: reqwest::Client,
    ) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            channel_url: channel_url.into(),
            client,
            timeout: Duration::from_secs(5),
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }
}

fn looks_like_json(content_type: &str, body: &str) -> bool {
    content_type.contains("json") || body.trim_start().starts_with('{')
}

#[async_trait]
impl AlertSource for HttpFeedSource {
    async fn fetch(&self) -> Result<Vec<AlertDraft>> {
        let resp = self
            .client
            .get(&self.url)
            .timeout(self.timeout)
            .header(reqwest::header::ACCEPT, ACCEPT)
            .send()
            .await
            .map_err(|e| PipelineError::upstream(&self.name, e))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(PipelineError::upstream(&self.name, format!("HTTP {status}")).into());
        }
        let content_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_ascii_lowercase();
        let body = resp
            .text()
            .await
            .map_err(|e| PipelineError::upstream(&self.name, e))?;

        let now = Utc::now();
        if looks_like_json(&content_type, &body) {
            let payload: serde_json::Value = serde_json::from_str(&body)
                .with_context(|| format!("{}: invalid json body", self.name))?;
            drafts_from_json(&payload, &self.channel_url, now)
        } else {
            drafts_from_rss(&body, &self.channel_url, now)
                .with_context(|| format!("{}: invalid feed body", self.name))
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_detection_uses_header_or_body() {
        assert!(looks_like_json("application/json; charset=utf-8", ""));
        assert!(looks_like_json("text/plain", "  {\"items\":[]}"));
        assert!(!looks_like_json("application/rss+xml", "<rss/>"));
    }
}
