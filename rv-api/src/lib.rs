//! rv-api library - RadarVarsler report service
//!
//! Owns the report aggregator and warning ledger behind one mutex each and
//! exposes them over a small axum API. Mutations under the lock are pure
//! in-memory computation; persistence happens after the guard is dropped.

use std::sync::{Arc, Mutex, MutexGuard};

use axum::Router;
use sqlx::SqlitePool;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use rv_common::{Error, Policy, Result};

pub mod aggregator;
pub mod api;
pub mod db;
pub mod warning;

use aggregator::ReportAggregator;
use warning::WarningLedger;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool (write-behind persistence)
    pub db: SqlitePool,
    /// Aggregation and warning policy
    pub policy: Policy,
    aggregator: Arc<Mutex<ReportAggregator>>,
    ledger: Arc<Mutex<WarningLedger>>,
}

impl AppState {
    /// Create new application state with an empty aggregator
    pub fn new(db: SqlitePool, policy: Policy) -> Self {
        Self {
            db,
            policy,
            aggregator: Arc::new(Mutex::new(ReportAggregator::new(policy))),
            ledger: Arc::new(Mutex::new(WarningLedger::new())),
        }
    }

    /// Exclusive access to the aggregator; held only for in-memory work
    pub fn aggregator(&self) -> Result<MutexGuard<'_, ReportAggregator>> {
        self.aggregator
            .lock()
            .map_err(|_| Error::Internal("Aggregator lock poisoned".to_string()))
    }

    /// Exclusive access to the warning ledger
    pub fn ledger(&self) -> Result<MutexGuard<'_, WarningLedger>> {
        self.ledger
            .lock()
            .map_err(|_| Error::Internal("Warning ledger lock poisoned".to_string()))
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::{get, post};

    Router::new()
        .route(
            "/api/reports",
            post(api::reports::submit_report).get(api::reports::list_reports),
        )
        .route(
            "/api/reports/:id/warning-check",
            post(api::reports::warning_check),
        )
        .route(
            "/api/reports/:id/warnings",
            post(api::reports::record_warning),
        )
        .merge(api::health::health_routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
