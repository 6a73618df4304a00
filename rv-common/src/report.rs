//! The Report model shared between the aggregator, storage, and API layers

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::geo::GeoPoint;

/// A crowd-sourced radar/speed-control report
///
/// Lifecycle: created on first observation at a location, refreshed by every
/// later observation inside the merge radius, deactivated once by the expiry
/// sweep. `verified_count` only ever grows; `active` flips true → false
/// exactly once and never back.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub id: Uuid,
    /// Submitting observer; None for anonymous reports
    pub reporter_id: Option<Uuid>,
    pub latitude: f64,
    pub longitude: f64,
    /// Optional free-text location description
    pub label: Option<String>,
    /// Timestamp of the most recent confirmation (creation or merge)
    pub reported_at: DateTime<Utc>,
    pub active: bool,
    pub verified: bool,
    /// Number of independent confirmations merged into this report, >= 1
    pub verified_count: u32,
}

impl Report {
    pub fn position(&self) -> GeoPoint {
        GeoPoint::new(self.latitude, self.longitude)
    }

    /// Age of the report relative to `now`
    pub fn age(&self, now: DateTime<Utc>) -> chrono::Duration {
        now - self.reported_at
    }
}
