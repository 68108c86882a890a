// src/api.rs
//! Read endpoints over the document cache, plus scheduler admin.
//!
//! Every payload uses the `{ "success": bool, "data": ... }` envelope. Plain
//! reads never fail: a missing or unreadable document is replaced by a
//! "pending first update" placeholder.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;
use tracing::{error, warn};

use crate::alerts::AlertBatch;
use crate::cache::{keys, read_doc, DocumentStore, ReadOutcome, Served, ServedFrom, StalenessGate};
use crate::clock::SharedClock;
use crate::market::MarketSnapshot;
use crate::scheduler::{JobOutcome, Scheduler, SchedulerError};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn DocumentStore>,
    pub market_gate: Arc<StalenessGate<MarketSnapshot>>,
    pub alert_gate: Arc<StalenessGate<AlertBatch>>,
    pub scheduler: Arc<Scheduler>,
    pub clock: SharedClock,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/market-analysis", get(market_analysis))
        .route("/market-analysis/current", get(market_current))
        .route("/market-analysis/history", get(market_history_index))
        .route("/market-analysis/history/{date}", get(market_history))
        .route("/scam-alerts", get(scam_alerts))
        .route("/scam-alerts/current", get(alerts_current))
        .route("/dashboard", get(dashboard))
        .route("/scheduler/status", get(scheduler_status))
        .route("/admin/run/{job}", post(admin_run))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

fn ok(data: impl Serialize) -> Response {
    match serde_json::to_value(data) {
        Ok(v) => Json(json!({ "success": true, "data": v })).into_response(),
        Err(e) => fail(StatusCode::INTERNAL_SERVER_ERROR, format!("encoding response: {e}")),
    }
}

fn fail(status: StatusCode, msg: impl Into<String>) -> Response {
    (status, Json(json!({ "success": false, "error": msg.into() }))).into_response()
}

// ---- placeholders ----

fn market_placeholder(now: DateTime<Utc>) -> Value {
    json!({
        "timestamp": now,
        "summary": "Market analysis will be available after the next scheduled update",
        "analysis": "Market analysis runs twice daily at 8 AM and 8 PM UTC. Check back soon!",
        "topCoins": [],
    })
}

fn alerts_placeholder(now: DateTime<Utc>) -> Value {
    json!({
        "timestamp": now,
        "source": "ZachXBT Telegram",
        "alertCount": 0,
        "alerts": [],
    })
}

/// Latest stored document as JSON, or `None` when absent/unusable.
async fn latest<T>(store: &dyn DocumentStore, key: &str) -> Option<T>
where
    T: serde::de::DeserializeOwned,
{
    match read_doc::<T>(store, key).await {
        Ok(ReadOutcome::Found(doc)) => Some(doc),
        Ok(ReadOutcome::Missing) => None,
        Ok(ReadOutcome::Unparsable(reason)) => {
            warn!(target: "api", key, %reason, "stored document unparsable");
            None
        }
        Err(e) => {
            warn!(target: "api", key, error = %e, "stored document unreadable");
            None
        }
    }
}

// ---- handlers ----

async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "success": true,
        "status": "healthy",
        "timestamp": state.clock.now(),
    }))
}

async fn market_analysis(State(state): State<AppState>) -> Response {
    match latest::<MarketSnapshot>(state.store.as_ref(), keys::MARKET_LATEST).await {
        Some(doc) => ok(doc),
        None => ok(market_placeholder(state.clock.now())),
    }
}

async fn scam_alerts(State(state): State<AppState>) -> Response {
    match latest::<AlertBatch>(state.store.as_ref(), keys::ALERTS_LATEST).await {
        Some(doc) => ok(doc),
        None => ok(alerts_placeholder(state.clock.now())),
    }
}

async fn dashboard(State(state): State<AppState>) -> Response {
    let now = state.clock.now();
    let (market, alerts) = tokio::join!(
        latest::<MarketSnapshot>(state.store.as_ref(), keys::MARKET_LATEST),
        latest::<AlertBatch>(state.store.as_ref(), keys::ALERTS_LATEST),
    );

    let combined = (|| -> serde_json::Result<Value> {
        let market = match market {
            Some(m) => serde_json::to_value(m)?,
            None => json!({
                "timestamp": now,
                "summary": "Market analysis pending...",
                "analysis": "Next update at 8 AM/PM UTC",
                "topCoins": [],
            }),
        };
        let alerts = match alerts {
            Some(a) => serde_json::to_value(a)?,
            None => json!({ "timestamp": now, "alertCount": 0, "alerts": [] }),
        };
        Ok(json!({ "market": market, "alerts": alerts, "lastUpdate": now }))
    })();

    match combined {
        Ok(data) => ok(data),
        Err(e) => {
            error!(target: "api", error = %e, "dashboard assembly failed");
            fail(StatusCode::INTERNAL_SERVER_ERROR, "Failed to fetch dashboard data")
        }
    }
}

fn served_from_label(from: ServedFrom) -> &'static str {
    match from {
        ServedFrom::Cache => "cache",
        ServedFrom::Refreshed => "refreshed",
        ServedFrom::StaleFallback => "stale",
    }
}

fn served<T: Serialize>(s: Served<T>) -> Response {
    let age_hours = (s.age_hours() * 100.0).round() / 100.0;
    match serde_json::to_value(&s.doc) {
        Ok(doc) => Json(json!({
            "success": true,
            "data": doc,
            "ageHours": age_hours,
            "refreshed": s.refreshed(),
            "servedFrom": served_from_label(s.from),
        }))
        .into_response(),
        Err(e) => fail(StatusCode::INTERNAL_SERVER_ERROR, format!("encoding response: {e}")),
    }
}

fn pending(placeholder: Value) -> Response {
    Json(json!({
        "success": true,
        "data": placeholder,
        "ageHours": null,
        "refreshed": false,
        "servedFrom": "placeholder",
    }))
    .into_response()
}

async fn market_current(State(state): State<AppState>) -> Response {
    match state.market_gate.get().await {
        Ok(s) => served(s),
        Err(e) => {
            warn!(target: "api", error = %e, "market refresh failed with nothing cached");
            pending(market_placeholder(state.clock.now()))
        }
    }
}

async fn alerts_current(State(state): State<AppState>) -> Response {
    match state.alert_gate.get().await {
        Ok(s) => served(s),
        Err(e) => {
            warn!(target: "api", error = %e, "alert refresh failed with nothing cached");
            pending(alerts_placeholder(state.clock.now()))
        }
    }
}

async fn market_history(State(state): State<AppState>, Path(date): Path<String>) -> Response {
    let Ok(day) = NaiveDate::parse_from_str(&date, "%Y-%m-%d") else {
        return fail(StatusCode::BAD_REQUEST, format!("invalid date '{date}', expected YYYY-MM-DD"));
    };
    match latest::<MarketSnapshot>(state.store.as_ref(), &keys::market_history(day)).await {
        Some(doc) => ok(doc),
        None => fail(StatusCode::NOT_FOUND, format!("no market analysis stored for {day}")),
    }
}

/// Dates with a stored snapshot, newest first.
async fn market_history_index(State(state): State<AppState>) -> Response {
    match state.store.list(keys::MARKET_DIR).await {
        Ok(found) => {
            let mut dates: Vec<String> = found
                .iter()
                .filter_map(|k| k.rsplit('/').next()?.strip_prefix("market-analysis-"))
                .filter(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").is_ok())
                .map(str::to_string)
                .collect();
            dates.sort_unstable_by(|a, b| b.cmp(a));
            ok(dates)
        }
        Err(e) => {
            error!(target: "api", error = %e, "listing market history failed");
            fail(StatusCode::INTERNAL_SERVER_ERROR, "Failed to list market history")
        }
    }
}

async fn scheduler_status(State(state): State<AppState>) -> Response {
    let running = state.scheduler.is_running().await;
    let jobs = state.scheduler.status().await;
    ok(json!({ "running": running, "jobs": jobs }))
}

async fn admin_run(State(state): State<AppState>, Path(job): Path<String>) -> Response {
    match state.scheduler.trigger(&job).await {
        Ok(outcome @ JobOutcome::Succeeded(_)) => ok(outcome),
        Ok(outcome @ JobOutcome::Failed(_)) => (
            StatusCode::BAD_GATEWAY,
            Json(json!({ "success": false, "data": outcome })),
        )
            .into_response(),
        Ok(JobOutcome::Skipped) => fail(StatusCode::CONFLICT, format!("job '{job}' is already running")),
        Err(e @ SchedulerError::UnknownJob(_)) => fail(StatusCode::NOT_FOUND, e.to_string()),
        Err(e) => fail(StatusCode::SERVICE_UNAVAILABLE, e.to_string()),
    }
}
