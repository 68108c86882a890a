// src/market/format.rs
//! Number rendering and the sentiment bands.

use serde::Serialize;

/// Scale-dependent precision: >=1000 → 0, >=1 → 2, >=0.01 → 4, else 6 decimals.
pub fn format_price(price: f64) -> String {
    let abs = price.abs();
    if abs >= 1000.0 {
        format!("{price:.0}")
    } else if abs >= 1.0 {
        format!("{price:.2}")
    } else if abs >= 0.01 {
        format!("{price:.4}")
    } else {
        format!("{price:.6}")
    }
}

/// `$1.23T` / `$4.56B` / `$7.89M`, else the raw dollar amount.
pub fn format_large_number(n: f64) -> String {
    if n >= 1e12 {
        format!("${:.2}T", n / 1e12)
    } else if n >= 1e9 {
        format!("${:.2}B", n / 1e9)
    } else if n >= 1e6 {
        format!("${:.2}M", n / 1e6)
    } else {
        format!("${n:.0}")
    }
}

/// Signed percentage with two decimals, e.g. `+3.10%` / `-0.42%`.
pub fn format_change(pct: f64) -> String {
    format!("{pct:+.2}%")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Sentiment {
    StrongBullish,
    Bullish,
    Neutral,
    Bearish,
    StrongBearish,
}

impl Sentiment {
    /// Bands over the mean 24h % change; each lower bound is exclusive.
    pub fn from_mean_change(mean: f64) -> Self {
        if mean > 5.0 {
            Self::StrongBullish
        } else if mean > 2.0 {
            Self::Bullish
        } else if mean > -2.0 {
            Self::Neutral
        } else if mean > -5.0 {
            Self::Bearish
        } else {
            Self::StrongBearish
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::StrongBullish => "strong bullish",
            Self::Bullish => "bullish",
            Self::Neutral => "neutral",
            Self::Bearish => "bearish",
            Self::StrongBearish => "strong bearish",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::StrongBullish => "Strong Bullish - Market showing significant upward momentum",
            Self::Bullish => "Bullish - Positive sentiment across major assets",
            Self::Neutral => "Neutral - Mixed signals with sideways movement",
            Self::Bearish => "Bearish - Negative pressure on most assets",
            Self::StrongBearish => "Strong Bearish - Significant selling pressure detected",
        }
    }
}
