// src/alerts/classify.rs
//! Keyword severity tiers. High-priority terms win over medium ones.

use crate::alerts::types::{AlertDraft, AlertRecord, Severity};

pub const HIGH_PRIORITY: [&str; 7] = [
    "rug",
    "exit scam",
    "hack",
    "exploit",
    "stolen",
    "drained",
    "phishing",
];

pub const MEDIUM_PRIORITY: [&str; 5] = ["suspicious", "warning", "fake", "scam", "fraudulent"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub severity: Severity,
    pub keywords: Vec<String>,
}

fn matches(haystack: &str, set: &[&str]) -> Vec<String> {
    set.iter()
        .filter(|k| haystack.contains(*k))
        .map(|k| k.to_string())
        .collect()
}

/// Case-insensitive substring scan of `content` against both keyword sets.
pub fn classify(content: &str) -> Classification {
    let lower = content.to_lowercase();

    let high = matches(&lower, &HIGH_PRIORITY);
    if !high.is_empty() {
        return Classification {
            severity: Severity::High,
            keywords: high,
        };
    }
    let medium = matches(&lower, &MEDIUM_PRIORITY);
    if !medium.is_empty() {
        return Classification {
            severity: Severity::Medium,
            keywords: medium,
        };
    }
    Classification {
        severity: Severity::Low,
        keywords: Vec::new(),
    }
}

impl From<AlertDraft> for AlertRecord {
    fn from(d: AlertDraft) -> Self {
        let c = classify(&d.content);
        Self {
            id: d.id,
            date: d.date,
            content: d.content,
            link: d.link,
            severity: c.severity,
            keywords: c.keywords,
        }
    }
}
