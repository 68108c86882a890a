// src/cache/mod.rs
pub mod staleness;
pub mod store;

/// Document keys, relative to the data directory.
pub mod keys {
    use chrono::NaiveDate;

    pub const MARKET_LATEST: &str = "market-reports/latest";
    pub const MARKET_DIR: &str = "market-reports";
    pub const ALERTS_LATEST: &str = "scam-alerts/zachxbt-posts";

    pub fn market_history(date: NaiveDate) -> String {
        format!("{MARKET_DIR}/market-analysis-{}", date.format("%Y-%m-%d"))
    }
}

pub use staleness::{flight_lock, FlightLock, Refresh, Served, ServedFrom, StalenessGate, Timestamped};
pub use store::{read_doc, write_doc, DocumentStore, FileStore, MemoryStore, ReadOutcome};
