//! Report submission, listing, and warning endpoints

use std::collections::HashSet;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use rv_common::geo::GeoPoint;
use rv_common::{time, Report};

use crate::aggregator::Candidate;
use crate::api::ApiError;
use crate::db;
use crate::warning::{should_warn, WarnMode, WarningRecord};
use crate::AppState;

/// POST /api/reports body
#[derive(Debug, Deserialize)]
pub struct SubmitRequest {
    pub latitude: f64,
    pub longitude: f64,
    pub label: Option<String>,
    pub reporter_id: Option<Uuid>,
}

/// POST /api/reports
///
/// Submit a report. Returns 201 with the new entity, or 200 with the
/// refreshed one when the submission merged into an existing report.
pub async fn submit_report(
    State(state): State<AppState>,
    Json(req): Json<SubmitRequest>,
) -> Result<(StatusCode, Json<Report>), ApiError> {
    let now = time::now();
    let outcome = {
        let mut agg = state.aggregator()?;
        agg.submit(Candidate {
            position: GeoPoint::new(req.latitude, req.longitude),
            reporter_id: req.reporter_id,
            label: req.label,
            submitted_at: now,
        })?
    };

    // Persist after the lock is released; the in-memory decision is already
    // atomic, so ordering of these writes does not affect correctness.
    if !outcome.expired.is_empty() {
        db::mark_expired(&state.db, &outcome.expired).await?;
    }
    if outcome.created {
        db::insert_report(&state.db, &outcome.report).await?;
    } else {
        db::update_report(&state.db, &outcome.report).await?;
    }
    for peer in &outcome.corroborated {
        db::update_report(&state.db, peer).await?;
    }

    let status = if outcome.created {
        info!(
            report_id = %outcome.report.id,
            verified = outcome.report.verified,
            corroborated = outcome.corroborated.len(),
            "report created"
        );
        StatusCode::CREATED
    } else {
        info!(
            report_id = %outcome.report.id,
            verified_count = outcome.report.verified_count,
            "report refreshed"
        );
        StatusCode::OK
    };
    Ok((status, Json(outcome.report)))
}

/// GET /api/reports query parameters
#[derive(Debug, Deserialize)]
pub struct ListQuery {
    /// Accepted for client compatibility; only the active set is served
    #[allow(dead_code)]
    pub active: Option<bool>,
}

/// GET /api/reports?active=true
///
/// Expiry sweep, then the active snapshot ordered most recent first. The
/// audit trail of expired reports is not exposed over HTTP.
pub async fn list_reports(
    State(state): State<AppState>,
    Query(_query): Query<ListQuery>,
) -> Result<Json<Vec<Report>>, ApiError> {
    let now = time::now();
    let (active, expired) = {
        let mut agg = state.aggregator()?;
        agg.list_active(now)
    };
    if !expired.is_empty() {
        db::mark_expired(&state.db, &expired).await?;
    }
    Ok(Json(active))
}

/// POST /api/reports/{id}/warning-check body
#[derive(Debug, Deserialize)]
pub struct WarningCheckRequest {
    pub observer_latitude: f64,
    pub observer_longitude: f64,
    /// When absent the observer is anonymous and no suppression applies
    pub observer_id: Option<Uuid>,
    pub mode: WarnMode,
    pub route_polyline: Option<Vec<GeoPoint>>,
}

/// POST /api/reports/{id}/warning-check response
#[derive(Debug, Serialize)]
pub struct WarningCheckResponse {
    pub warn: bool,
    pub distance_km: f64,
}

/// POST /api/reports/{id}/warning-check
///
/// Pure decision: should this observer be warned about this report now.
/// Nothing is recorded; the client reports delivery via the warnings
/// endpoint after acting on a `true` result.
pub async fn warning_check(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<WarningCheckRequest>,
) -> Result<Json<WarningCheckResponse>, ApiError> {
    let now = time::now();
    let observer = GeoPoint::new(req.observer_latitude, req.observer_longitude);

    let (decision, expired) = {
        let mut agg = state.aggregator()?;
        let expired = agg.sweep(now);
        let report = agg
            .get(id)
            .cloned()
            .ok_or_else(|| rv_common::Error::NotFound(format!("Report {id}")))?;
        let warned_today = match req.observer_id {
            Some(observer_id) => state.ledger()?.warned_today(observer_id, now),
            None => HashSet::new(),
        };
        let decision = should_warn(
            observer,
            &report,
            &warned_today,
            &state.policy,
            req.mode,
            req.route_polyline.as_deref(),
        )?;
        (decision, expired)
    };

    if !expired.is_empty() {
        db::mark_expired(&state.db, &expired).await?;
    }
    Ok(Json(WarningCheckResponse {
        warn: decision.warn,
        distance_km: decision.distance_km,
    }))
}

/// POST /api/reports/{id}/warnings body
#[derive(Debug, Deserialize)]
pub struct RecordWarningRequest {
    pub observer_id: Uuid,
    pub algorithm: WarnMode,
    pub distance_km: f64,
}

/// POST /api/reports/{id}/warnings
///
/// Record a delivered warning. 204 on success, 409 when this observer was
/// already warned about this report today.
pub async fn record_warning(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<RecordWarningRequest>,
) -> Result<Response, ApiError> {
    let record = WarningRecord {
        observer_id: req.observer_id,
        report_id: id,
        algorithm: req.algorithm,
        distance_km: req.distance_km,
        sent_at: time::now(),
    };

    let inserted = {
        let agg = state.aggregator()?;
        if agg.get(id).is_none() {
            return Err(rv_common::Error::NotFound(format!("Report {id}")).into());
        }
        state.ledger()?.record(record.clone())
    };

    if !inserted {
        return Ok((
            StatusCode::CONFLICT,
            Json(json!({ "error": "Already warned today" })),
        )
            .into_response());
    }

    db::insert_warning(&state.db, &record).await?;
    info!(report_id = %id, observer_id = %req.observer_id, algorithm = req.algorithm.as_str(), "warning recorded");
    Ok(StatusCode::NO_CONTENT.into_response())
}
