// tests/market_properties.rs
//
// Aggregation properties over randomized 100-asset listings.

mod common;

use rand::seq::SliceRandom;
use rand::Rng;

use crypto_digest::market::aggregate::{build_snapshot, SENTIMENT_WINDOW};
use crypto_digest::market::format::Sentiment;
use crypto_digest::market::Asset;

use common::{asset, utc};

fn random_listing(rng: &mut impl Rng) -> Vec<Asset> {
    let mut symbols: Vec<String> = (0..98).map(|i| format!("C{i:03}")).collect();
    symbols.push("BTC".into());
    symbols.push("ETH".into());
    symbols.shuffle(rng);

    let mut caps: Vec<f64> = (0..100).map(|_| rng.random_range(1.0e6..2.0e12)).collect();
    caps.sort_by(|a, b| b.total_cmp(a));

    symbols
        .into_iter()
        .zip(caps)
        .enumerate()
        .map(|(i, (s, cap))| asset(&s, i as u32 + 1, cap, rng.random_range(-30.0..30.0)))
        .collect()
}

#[test]
fn totals_lists_and_ordering_hold_for_random_inputs() {
    let mut rng = rand::rng();
    let now = utc(2025, 3, 1, 8, 0);

    for _ in 0..50 {
        let assets = random_listing(&mut rng);
        let (snap, stats) = build_snapshot(&assets, now).expect("snapshot");

        let expected: f64 = assets.iter().map(|a| a.quote.market_cap).sum();
        assert!(
            (stats.total_market_cap - expected).abs() <= expected * 1e-9,
            "total cap {} vs {}",
            stats.total_market_cap,
            expected
        );
        assert_eq!(stats.asset_count, 100);

        let lc = &snap.market_data.large_caps;
        assert!(lc.len() <= 10);
        assert!(lc.iter().all(|e| e.symbol != "BTC" && e.symbol != "ETH"));

        let tr = &snap.market_data.trending;
        assert_eq!(tr.len(), 10);
        assert!(tr
            .windows(2)
            .all(|w| w[0].percent_change_24h >= w[1].percent_change_24h));
        assert!(snap.top_coins.len() <= 10);

        let window = assets.len().min(SENTIMENT_WINDOW);
        let mean: f64 = assets[..window]
            .iter()
            .map(|a| a.quote.percent_change_24h)
            .sum::<f64>()
            / window as f64;
        assert_eq!(stats.sentiment, Sentiment::from_mean_change(mean));
    }
}

#[test]
fn sentiment_band_boundaries_are_exclusive() {
    assert_eq!(Sentiment::from_mean_change(5.01), Sentiment::StrongBullish);
    assert_eq!(Sentiment::from_mean_change(5.0), Sentiment::Bullish);
    assert_eq!(Sentiment::from_mean_change(2.0), Sentiment::Neutral);
    assert_eq!(Sentiment::from_mean_change(-2.0), Sentiment::Bearish);
    assert_eq!(Sentiment::from_mean_change(-5.0), Sentiment::StrongBearish);
    assert_eq!(Sentiment::from_mean_change(-4.99), Sentiment::Bearish);
}

#[test]
fn missing_distinguished_asset_is_an_integrity_error() {
    let assets: Vec<Asset> = (0..20)
        .map(|i| asset(if i == 0 { "BTC" } else { "ALT" }, i + 1, 1.0e9, 1.0))
        .collect();
    let err = build_snapshot(&assets, utc(2025, 3, 1, 8, 0)).unwrap_err();
    assert_eq!(err.kind(), "data_integrity");
}
