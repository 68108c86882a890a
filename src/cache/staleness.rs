// src/cache/staleness.rs
//! Read path with a freshness threshold.
//!
//! Absent/unparsable/stale documents trigger a synchronous refresh through the
//! owning pipeline; fresh documents are served as stored, with their age.
//! Refreshes hold the pipeline's flight lock, the same one the scheduler
//! takes, so one document has at most one producer at a time.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use metrics::counter;
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::cache::store::{read_doc, DocumentStore, ReadOutcome};
use crate::clock::SharedClock;
use crate::error::Result;

/// Held by whoever is producing a document: scheduler firings and on-demand
/// refreshes alike.
pub type FlightLock = Arc<Mutex<()>>;

pub fn flight_lock() -> FlightLock {
    Arc::new(Mutex::new(()))
}

/// Documents that carry their own creation instant.
pub trait Timestamped {
    fn timestamp(&self) -> DateTime<Utc>;
}

/// Aggregate + persist a fresh document. Implemented by the pipelines.
#[async_trait]
pub trait Refresh<T>: Send + Sync {
    /// Lock shared by every producer of the document.
    fn flight(&self) -> FlightLock;
    /// Called with the flight lock held.
    async fn refresh(&self) -> Result<T>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServedFrom {
    /// Cached document within the freshness threshold.
    Cache,
    /// Freshly aggregated because the cache was absent, unparsable or stale.
    Refreshed,
    /// Stale document served because the refresh failed.
    StaleFallback,
}

#[derive(Debug, Clone)]
pub struct Served<T> {
    pub doc: T,
    pub age: Duration,
    pub from: ServedFrom,
}

impl<T> Served<T> {
    pub fn age_hours(&self) -> f64 {
        self.age.num_seconds().max(0) as f64 / 3600.0
    }

    pub fn refreshed(&self) -> bool {
        self.from == ServedFrom::Refreshed
    }
}

pub struct StalenessGate<T> {
    store: Arc<dyn DocumentStore>,
    key: String,
    max_age: Duration,
    clock: SharedClock,
    refresher: Arc<dyn Refresh<T>>,
}

impl<T> StalenessGate<T>
where
    T: DeserializeOwned + Timestamped + Send,
{
    pub fn new(
        store: Arc<dyn DocumentStore>,
        key: impl Into<String>,
        max_age: Duration,
        clock: SharedClock,
        refresher: Arc<dyn Refresh<T>>,
    ) -> Self {
        Self {
            store,
            key: key.into(),
            max_age,
            clock,
            refresher,
        }
    }

    async fn load(&self) -> Option<T> {
        match read_doc::<T>(self.store.as_ref(), &self.key).await {
            Ok(ReadOutcome::Found(doc)) => Some(doc),
            Ok(ReadOutcome::Missing) => None,
            Ok(ReadOutcome::Unparsable(reason)) => {
                warn!(key = %self.key, %reason, "cached document unparsable");
                None
            }
            Err(e) => {
                warn!(key = %self.key, error = %e, "cache read failed");
                None
            }
        }
    }

    /// `Ok` when `doc` is within the threshold, otherwise hands it back with its age.
    fn within_threshold(
        &self,
        doc: T,
        now: DateTime<Utc>,
    ) -> std::result::Result<Served<T>, (T, Duration)> {
        let age = now - doc.timestamp();
        if age <= self.max_age {
            Ok(Served {
                doc,
                age,
                from: ServedFrom::Cache,
            })
        } else {
            Err((doc, age))
        }
    }

    /// Serve the current document, refreshing first when it is absent or stale.
    ///
    /// Callers that find a refresh already in flight wait for it and then
    /// serve what it wrote.
    pub async fn get(&self) -> Result<Served<T>> {
        match self.load().await {
            Some(doc) => match self.within_threshold(doc, self.clock.now()) {
                Ok(served) => return Ok(served),
                Err((_, age)) => info!(
                    key = %self.key,
                    age_hours = age.num_hours(),
                    "cached document is stale, aggregating"
                ),
            },
            None => info!(key = %self.key, "no usable cached document, aggregating"),
        }

        let flight = self.refresher.flight();
        let _guard = flight.lock().await;

        // Another producer may have written while this caller waited.
        let now = self.clock.now();
        let stale = match self.load().await {
            Some(doc) => match self.within_threshold(doc, now) {
                Ok(served) => {
                    info!(key = %self.key, "document written by a concurrent run");
                    return Ok(served);
                }
                Err(stale) => Some(stale),
            },
            None => None,
        };

        match self.refresh_now(now).await {
            Ok(fresh) => Ok(fresh),
            Err(e) => match stale {
                Some((doc, age)) => {
                    warn!(key = %self.key, error = %e, "refresh failed, serving stale document");
                    Ok(Served {
                        doc,
                        age,
                        from: ServedFrom::StaleFallback,
                    })
                }
                None => Err(e),
            },
        }
    }

    async fn refresh_now(&self, now: DateTime<Utc>) -> Result<Served<T>> {
        counter!("cache_refresh_total").increment(1);
        let doc = self.refresher.refresh().await?;
        let age = (now - doc.timestamp()).max(Duration::zero());
        Ok(Served {
            doc,
            age,
            from: ServedFrom::Refreshed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::store::{write_doc, MemoryStore};
    use crate::clock::ManualClock;
    use crate::error::PipelineError;
    use chrono::TimeZone;
    use serde::{Deserialize, Serialize};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
    struct Doc {
        timestamp: DateTime<Utc>,
        value: f64,
    }

    impl Timestamped for Doc {
        fn timestamp(&self) -> DateTime<Utc> {
            self.timestamp
        }
    }

    struct CountingRefresher {
        calls: AtomicUsize,
        at: DateTime<Utc>,
        fail: bool,
        flight: FlightLock,
        store: Arc<dyn DocumentStore>,
        delay: std::time::Duration,
    }

    #[async_trait]
    impl Refresh<Doc> for CountingRefresher {
        fn flight(&self) -> FlightLock {
            self.flight.clone()
        }

        async fn refresh(&self) -> Result<Doc> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            if self.fail {
                return Err(PipelineError::upstream("test", "down"));
            }
            let doc = Doc {
                timestamp: self.at,
                value: 2.0,
            };
            write_doc(self.store.as_ref(), "k/latest", &doc).await?;
            Ok(doc)
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    async fn gate_with(doc_age_h: Option<i64>, fail: bool) -> (StalenessGate<Doc>, Arc<CountingRefresher>) {
        slow_gate_with(doc_age_h, fail, std::time::Duration::ZERO).await
    }

    async fn slow_gate_with(
        doc_age_h: Option<i64>,
        fail: bool,
        delay: std::time::Duration,
    ) -> (StalenessGate<Doc>, Arc<CountingRefresher>) {
        let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());
        if let Some(h) = doc_age_h {
            let doc = Doc {
                timestamp: now() - Duration::hours(h),
                value: 1.0,
            };
            write_doc(store.as_ref(), "k/latest", &doc).await.unwrap();
        }
        let refresher = Arc::new(CountingRefresher {
            calls: AtomicUsize::new(0),
            at: now(),
            fail,
            flight: flight_lock(),
            store: store.clone(),
            delay,
        });
        let gate = StalenessGate::new(
            store,
            "k/latest",
            Duration::hours(12),
            Arc::new(ManualClock::new(now())),
            refresher.clone(),
        );
        (gate, refresher)
    }

    #[tokio::test]
    async fn eleven_hours_old_is_served_from_cache() {
        let (gate, r) = gate_with(Some(11), false).await;
        let out = gate.get().await.unwrap();
        assert_eq!(out.from, ServedFrom::Cache);
        assert_eq!(out.doc.value, 1.0);
        assert_eq!(out.age, Duration::hours(11));
        assert_eq!(r.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn thirteen_hours_old_triggers_refresh() {
        let (gate, r) = gate_with(Some(13), false).await;
        let out = gate.get().await.unwrap();
        assert_eq!(out.from, ServedFrom::Refreshed);
        assert_eq!(out.doc.value, 2.0);
        assert_eq!(r.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn missing_document_triggers_refresh() {
        let (gate, r) = gate_with(None, false).await;
        assert!(gate.get().await.unwrap().refreshed());
        assert_eq!(r.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn stale_document_survives_failed_refresh() {
        let (gate, r) = gate_with(Some(30), true).await;
        let out = gate.get().await.unwrap();
        assert_eq!(out.from, ServedFrom::StaleFallback);
        assert_eq!(out.doc.value, 1.0);
        assert_eq!(r.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn missing_document_with_failed_refresh_is_an_error() {
        let (gate, _r) = gate_with(None, true).await;
        assert!(gate.get().await.is_err());
    }

    #[tokio::test]
    async fn concurrent_readers_share_one_refresh() {
        let (gate, r) = slow_gate_with(None, false, std::time::Duration::from_millis(100)).await;
        let (a, b) = tokio::join!(gate.get(), gate.get());
        let (a, b) = (a.unwrap(), b.unwrap());

        assert_eq!(r.calls.load(Ordering::SeqCst), 1);
        let mut from = [a.from, b.from];
        from.sort_by_key(|f| *f == ServedFrom::Cache);
        assert_eq!(from, [ServedFrom::Refreshed, ServedFrom::Cache]);
        assert_eq!(a.doc, b.doc);
    }

    #[tokio::test]
    async fn reader_waits_for_a_run_holding_the_flight_lock() {
        let (gate, r) = gate_with(Some(30), false).await;
        let gate = Arc::new(gate);

        // Stand-in for a scheduler firing that is mid-run.
        let guard = r.flight.clone().lock_owned().await;
        let reader = {
            let gate = gate.clone();
            tokio::spawn(async move { gate.get().await })
        };
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert!(!reader.is_finished());

        let fresh = Doc {
            timestamp: now(),
            value: 3.0,
        };
        write_doc(r.store.as_ref(), "k/latest", &fresh).await.unwrap();
        drop(guard);

        let out = reader.await.unwrap().unwrap();
        assert_eq!(out.from, ServedFrom::Cache);
        assert_eq!(out.doc.value, 3.0);
        assert_eq!(r.calls.load(Ordering::SeqCst), 0);
    }
}
