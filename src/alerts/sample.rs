// src/alerts/sample.rs
//! Built-in alerts served when every live source is unavailable. Always
//! stored with `dataSource = "sample"`.

use chrono::{DateTime, Duration, Utc};

use crate::alerts::types::AlertDraft;

pub const SAMPLE_SIZE: usize = 3;

const SAMPLES: [(&str, &str); SAMPLE_SIZE] = [
    (
        "sample-defi-yield-exit",
        "Investigation update: the \"DeFi Yield Protocol\" has executed an exit scam, draining $4.2M from liquidity pools. Team wallets are moving funds through Tornado Cash. Multiple victims confirmed.",
    ),
    (
        "sample-opensea-phishing",
        "SCAM ALERT: a phishing site impersonating OpenSea is ranking high on search ads. 73 wallets drained totaling $890K. Never click ads for crypto sites; bookmark official URLs only.",
    ),
    (
        "sample-bridge-exploit",
        "Research thread: tracking the recent bridge exploit. $2.3M stolen through a reentrancy attack; the attacker wallet is splitting funds across multiple chains.",
    ),
];

/// The fixed sample set, dated one, two and three hours before `now`.
pub fn sample_drafts(now: DateTime<Utc>, channel_url: &str) -> Vec<AlertDraft> {
    SAMPLES
        .iter()
        .enumerate()
        .map(|(i, (id, content))| AlertDraft {
            id: (*id).to_string(),
            date: now - Duration::hours(i as i64 + 1),
            content: (*content).to_string(),
            link: channel_url.to_string(),
        })
        .collect()
}
