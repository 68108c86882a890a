// src/alerts/types.rs
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cache::Timestamped;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataSource {
    Live,
    Sample,
}

/// Normalized alert before classification. Adapters produce these; only the
/// classifier turns them into [`AlertRecord`]s.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertDraft {
    pub id: String,
    pub date: DateTime<Utc>,
    pub content: String,
    pub link: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertRecord {
    pub id: String,
    pub date: DateTime<Utc>,
    pub content: String,
    pub link: String,
    pub severity: Severity,
    pub keywords: Vec<String>,
}

/// One completed alert refresh; stored as a single document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertBatch {
    pub timestamp: DateTime<Utc>,
    pub source: String,
    pub alert_count: usize,
    pub alerts: Vec<AlertRecord>,
    pub last_checked: DateTime<Utc>,
    pub data_source: DataSource,
}

impl AlertBatch {
    pub fn high_severity_count(&self) -> usize {
        self.alerts
            .iter()
            .filter(|a| a.severity == Severity::High)
            .count()
    }
}

impl Timestamped for AlertBatch {
    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// One external alert source. Returns normalized drafts or fails.
#[async_trait::async_trait]
pub trait AlertSource: Send + Sync {
    async fn fetch(&self) -> Result<Vec<AlertDraft>>;
    fn name(&self) -> &str;
}
