// src/scheduler/mod.rs
//! Recurring refresh jobs.
//!
//! `start()` primes every registered job once (sequentially), then spawns one
//! ticker task per job. Tickers read time from the injected `Clock` and
//! sleep in bounded steps, so a settable clock drives them in tests. A job
//! never overlaps itself or an on-demand refresh of the same document: a
//! firing that finds the flight lock taken is skipped.

pub mod cron;
pub mod jobs;

use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use metrics::counter;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::cache::{flight_lock, FlightLock};
use crate::clock::SharedClock;

pub use cron::CronSpec;
pub use jobs::{ALERTS_JOB, MARKET_JOB};

/// Upper bound on a single ticker sleep.
pub const DEFAULT_POLL: Duration = Duration::from_secs(60);
/// How long `stop()` waits for an in-flight firing before aborting it.
pub const STOP_GRACE: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("scheduler is already running")]
    AlreadyStarted,
    #[error("scheduler is not running")]
    NotStarted,
    #[error("unknown job '{0}'")]
    UnknownJob(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerOrigin {
    Startup,
    Scheduled,
    Manual,
}

/// Context handed to a job body in place of an end-user request.
#[derive(Debug, Clone)]
pub struct JobTrigger {
    pub id: String,
    pub origin: TriggerOrigin,
    pub fired_at: DateTime<Utc>,
    pub note: String,
}

impl JobTrigger {
    fn new(job: &str, origin: TriggerOrigin, fired_at: DateTime<Utc>) -> Self {
        let origin_label = match origin {
            TriggerOrigin::Startup => "startup",
            TriggerOrigin::Scheduled => "scheduled",
            TriggerOrigin::Manual => "manual",
        };
        Self {
            id: format!("{job}-{origin_label}-{}", fired_at.timestamp()),
            origin,
            fired_at,
            note: format!("{origin_label} {job} refresh"),
        }
    }
}

#[async_trait]
pub trait Job: Send + Sync {
    fn name(&self) -> &str;
    /// Lock shared with other producers of the job's output. Jobs without
    /// one get a private lock.
    fn shared_flight(&self) -> Option<FlightLock> {
        None
    }
    /// Run once; the returned line is kept as the job's last outcome.
    async fn run(&self, trigger: &JobTrigger) -> anyhow::Result<String>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "lowercase")]
pub enum JobOutcome {
    Succeeded(String),
    Failed(String),
    Skipped,
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct RunCounts {
    pub startup: u64,
    pub scheduled: u64,
    pub manual: u64,
    pub failed: u64,
    pub skipped: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatus {
    pub name: String,
    pub cron: String,
    pub timezone: &'static str,
    pub next_run: Option<DateTime<Utc>>,
    pub last_run: Option<DateTime<Utc>>,
    pub last_outcome: Option<JobOutcome>,
    pub runs: RunCounts,
}

#[derive(Default)]
struct JobState {
    next_run: Option<DateTime<Utc>>,
    last_run: Option<DateTime<Utc>>,
    last_outcome: Option<JobOutcome>,
    runs: RunCounts,
}

struct JobEntry {
    cron: CronSpec,
    job: Arc<dyn Job>,
    in_flight: FlightLock,
    state: StdMutex<JobState>,
}

impl JobEntry {
    fn name(&self) -> &str {
        self.job.name()
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut JobState) -> R) -> R {
        let mut g = self.state.lock().unwrap_or_else(|p| p.into_inner());
        f(&mut g)
    }

    /// Single-flight firing. Errors are logged and recorded, never propagated.
    async fn fire(&self, origin: TriggerOrigin, at: DateTime<Utc>) -> JobOutcome {
        let job = self.name().to_string();
        let Ok(_guard) = self.in_flight.try_lock() else {
            warn!(target: "scheduler", job = %job, ?origin, "previous run still in flight, skipping");
            counter!("job_skipped_total", "job" => job).increment(1);
            self.with_state(|s| s.runs.skipped += 1);
            return JobOutcome::Skipped;
        };

        let trigger = JobTrigger::new(&job, origin, at);
        info!(target: "scheduler", job = %job, trigger = %trigger.id, "job started");
        counter!("job_runs_total", "job" => job.clone()).increment(1);

        let outcome = match self.job.run(&trigger).await {
            Ok(summary) => {
                info!(target: "scheduler", job = %job, %summary, "job finished");
                JobOutcome::Succeeded(summary)
            }
            Err(e) => {
                error!(target: "scheduler", job = %job, error = ?e, "job failed");
                counter!("job_failures_total", "job" => job.clone()).increment(1);
                JobOutcome::Failed(format!("{e:#}"))
            }
        };

        self.with_state(|s| {
            match origin {
                TriggerOrigin::Startup => s.runs.startup += 1,
                TriggerOrigin::Scheduled => s.runs.scheduled += 1,
                TriggerOrigin::Manual => s.runs.manual += 1,
            }
            if matches!(outcome, JobOutcome::Failed(_)) {
                s.runs.failed += 1;
            }
            s.last_run = Some(at);
            s.last_outcome = Some(outcome.clone());
        });
        outcome
    }

    fn status(&self) -> JobStatus {
        self.with_state(|s| JobStatus {
            name: self.name().to_string(),
            cron: self.cron.to_string(),
            timezone: "UTC",
            next_run: s.next_run,
            last_run: s.last_run,
            last_outcome: s.last_outcome.clone(),
            runs: s.runs,
        })
    }
}

async fn tick_loop(
    entry: Arc<JobEntry>,
    clock: SharedClock,
    poll: Duration,
    mut next: DateTime<Utc>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        if *shutdown.borrow() {
            break;
        }
        let now = clock.now();
        if now >= next {
            entry.fire(TriggerOrigin::Scheduled, now).await;
            // Missed occurrences collapse into this one firing.
            next = entry.cron.next_after(clock.now().max(next));
            entry.with_state(|s| s.next_run = Some(next));
            continue;
        }

        let wait = (next - now).to_std().unwrap_or(Duration::ZERO).min(poll);
        tokio::select! {
            _ = tokio::time::sleep(wait) => {}
            changed = shutdown.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
    }
    info!(target: "scheduler", job = entry.name(), "ticker stopped");
}

struct Running {
    entries: Vec<Arc<JobEntry>>,
    shutdown: watch::Sender<bool>,
    handles: Vec<JoinHandle<()>>,
}

pub struct Scheduler {
    clock: SharedClock,
    poll: Duration,
    definitions: Vec<(CronSpec, Arc<dyn Job>)>,
    running: Mutex<Option<Running>>,
}

impl Scheduler {
    pub fn new(clock: SharedClock) -> Self {
        Self {
            clock,
            poll: DEFAULT_POLL,
            definitions: Vec::new(),
            running: Mutex::new(None),
        }
    }

    pub fn with_poll_interval(mut self, poll: Duration) -> Self {
        self.poll = poll.max(Duration::from_millis(1));
        self
    }

    /// Add a job definition; it is registered on the next `start()`.
    pub fn add_job(&mut self, cron: &str, job: Arc<dyn Job>) -> crate::error::Result<()> {
        let spec = CronSpec::parse(cron)?;
        self.definitions.push((spec, job));
        Ok(())
    }

    /// Register the jobs, prime each once in order, then spawn the tickers.
    ///
    /// The scheduler counts as running from the moment priming begins, so
    /// status, triggers and `stop()` stay available while it runs.
    pub async fn start(&self) -> Result<(), SchedulerError> {
        let entries: Vec<Arc<JobEntry>> = self
            .definitions
            .iter()
            .map(|(cron, job)| {
                Arc::new(JobEntry {
                    cron: cron.clone(),
                    job: Arc::clone(job),
                    in_flight: job.shared_flight().unwrap_or_else(flight_lock),
                    state: StdMutex::new(JobState::default()),
                })
            })
            .collect();
        let (tx, rx) = watch::channel(false);

        {
            let mut running = self.running.lock().await;
            if running.is_some() {
                return Err(SchedulerError::AlreadyStarted);
            }
            *running = Some(Running {
                entries: entries.clone(),
                shutdown: tx,
                handles: Vec::new(),
            });
        }

        info!(target: "scheduler", jobs = entries.len(), "priming jobs");
        for entry in &entries {
            if *rx.borrow() {
                break;
            }
            entry.fire(TriggerOrigin::Startup, self.clock.now()).await;
        }

        let mut running = self.running.lock().await;
        // `stop()` always signals before clearing, so an unsignalled receiver
        // means the slot still holds this run.
        let Some(current) = running.as_mut().filter(|_| !*rx.borrow()) else {
            info!(target: "scheduler", "stopped during priming, tickers not spawned");
            return Ok(());
        };
        for e in &entries {
            // An occurrence at exactly "now" still fires.
            let next = e.cron.next_at_or_after(self.clock.now());
            e.with_state(|s| s.next_run = Some(next));
            info!(target: "scheduler", job = e.name(), cron = %e.cron, next = %next, "job registered");
            current.handles.push(tokio::spawn(tick_loop(
                Arc::clone(e),
                Arc::clone(&self.clock),
                self.poll,
                next,
                rx.clone(),
            )));
        }
        Ok(())
    }

    /// Cancel all tickers and clear job state. In-flight firings get a
    /// bounded grace period, then are aborted.
    pub async fn stop(&self) -> Result<(), SchedulerError> {
        let Some(running) = self.running.lock().await.take() else {
            return Err(SchedulerError::NotStarted);
        };
        let _ = running.shutdown.send(true);
        for mut handle in running.handles {
            if tokio::time::timeout(STOP_GRACE, &mut handle).await.is_err() {
                warn!(target: "scheduler", "ticker did not stop in time, aborting");
                handle.abort();
            }
        }
        info!(target: "scheduler", "scheduler stopped");
        Ok(())
    }

    pub async fn is_running(&self) -> bool {
        self.running.lock().await.is_some()
    }

    /// Run one job out of band, under the same single-flight rule.
    pub async fn trigger(&self, name: &str) -> Result<JobOutcome, SchedulerError> {
        let entry = {
            let running = self.running.lock().await;
            let running = running.as_ref().ok_or(SchedulerError::NotStarted)?;
            running
                .entries
                .iter()
                .find(|e| e.name() == name)
                .cloned()
                .ok_or_else(|| SchedulerError::UnknownJob(name.to_string()))?
        };
        Ok(entry.fire(TriggerOrigin::Manual, self.clock.now()).await)
    }

    /// Registered jobs; empty when not running.
    pub async fn status(&self) -> Vec<JobStatus> {
        match self.running.lock().await.as_ref() {
            Some(r) => r.entries.iter().map(|e| e.status()).collect(),
            None => Vec::new(),
        }
    }
}
