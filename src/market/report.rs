// src/market/report.rs
//! Text rendering of a market refresh (`summary` and `analysis`).

use std::fmt::Write as _;

use chrono::{DateTime, Utc};

use crate::market::aggregate::MarketStats;
use crate::market::format::{format_change, format_large_number, format_price};
use crate::market::types::Asset;

const ANALYSIS_LARGE_CAPS: usize = 5;
const ANALYSIS_GAINERS: usize = 5;

/// Single line: BTC, ETH, total cap, 24h volume.
pub fn compose_summary(btc: &Asset, eth: &Asset, stats: &MarketStats) -> String {
    format!(
        "BTC: ${} ({}) | ETH: ${} ({}) | Total Market Cap: {} | 24h Volume: {}",
        format_price(btc.quote.price),
        format_change(btc.quote.percent_change_24h),
        format_price(eth.quote.price),
        format_change(eth.quote.percent_change_24h),
        format_large_number(stats.total_market_cap),
        format_large_number(stats.total_volume_24h),
    )
}

fn major_section(out: &mut String, title: &str, a: &Asset) {
    let q = &a.quote;
    let _ = writeln!(out, "**{title} ({})**: ${}", a.symbol, format_price(q.price));
    let _ = writeln!(out, "  - 24h Change: {}", format_change(q.percent_change_24h));
    let _ = writeln!(out, "  - 7d Change: {}", format_change(q.percent_change_7d));
    let _ = writeln!(out, "  - Market Dominance: {:.2}%", q.market_cap_dominance);
    let _ = writeln!(out, "  - 24h Volume: {}", format_large_number(q.volume_24h));
    out.push('\n');
}

/// Multi-section report: overview, majors, large caps, sentiment, gainers.
pub fn compose_analysis(
    now: DateTime<Utc>,
    btc: &Asset,
    eth: &Asset,
    large_caps: &[&Asset],
    gainers: &[&Asset],
    stats: &MarketStats,
) -> String {
    let mut out = String::with_capacity(2048);

    let _ = writeln!(out, "**Market Overview - {}**\n", now.format("%Y-%m-%d"));
    let _ = writeln!(
        out,
        "The cryptocurrency market shows a total capitalization of {} with {} in 24-hour trading volume.\n",
        format_large_number(stats.total_market_cap),
        format_large_number(stats.total_volume_24h),
    );

    out.push_str("**Major Cryptocurrencies:**\n\n");
    major_section(&mut out, "Bitcoin", btc);
    major_section(&mut out, "Ethereum", eth);

    out.push_str("**Top Large Cap Altcoins:**\n");
    for a in large_caps.iter().take(ANALYSIS_LARGE_CAPS) {
        let _ = writeln!(
            out,
            "- **{} ({})**: ${} ({})",
            a.name,
            a.symbol,
            format_price(a.quote.price),
            format_change(a.quote.percent_change_24h)
        );
    }

    let _ = writeln!(
        out,
        "\n**Market Sentiment:**\n{} (top-{} average 24h change {})\n",
        stats.sentiment.description(),
        stats.asset_count.min(crate::market::aggregate::SENTIMENT_WINDOW),
        format_change(stats.mean_change_top20),
    );

    out.push_str("**Top 5 Trending (24h Gainers):**\n");
    for (i, a) in gainers.iter().take(ANALYSIS_GAINERS).enumerate() {
        let _ = writeln!(
            out,
            "{}. **{} ({})**: {} - Price: ${}",
            i + 1,
            a.name,
            a.symbol,
            format_change(a.quote.percent_change_24h),
            format_price(a.quote.price)
        );
    }

    let _ = write!(
        out,
        "\n*Data sourced from CoinMarketCap - Updated: {} UTC*",
        now.format("%H:%M")
    );
    out
}
