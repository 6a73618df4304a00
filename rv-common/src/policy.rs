//! Aggregation and warning policy parameters
//!
//! One `Policy` per aggregator instance, injected at construction. The
//! defaults are the canonical values; deployments may override them via the
//! `[policy]` table in the config file.

use chrono::Duration;
use serde::Deserialize;

/// Policy knobs for report merging, corroboration, expiry, and warnings
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Policy {
    /// Reports closer than this are the same physical control and merge, meters
    pub merge_radius_m: f64,
    /// Reports within (merge_radius_m, corroboration_radius_m] cross-validate
    /// without merging, meters
    pub corroboration_radius_m: f64,
    /// Maximum age of an existing report for it to corroborate a new one, minutes
    pub corroboration_window_min: i64,
    /// Age after which a report is deactivated, minutes
    pub expiry_window_min: i64,
    /// Radius-mode warning threshold, kilometers (inclusive)
    pub warn_radius_km: f64,
    /// Route-mode corridor half-width, kilometers
    pub route_corridor_km: f64,
    /// Route-mode lookahead along the route, kilometers
    pub route_lookahead_km: f64,
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            merge_radius_m: 50.0,
            corroboration_radius_m: 300.0,
            corroboration_window_min: 60,
            expiry_window_min: 180,
            warn_radius_km: 3.0,
            route_corridor_km: 0.5,
            route_lookahead_km: 2.0,
        }
    }
}

impl Policy {
    pub fn corroboration_window(&self) -> Duration {
        Duration::minutes(self.corroboration_window_min)
    }

    pub fn expiry_window(&self) -> Duration {
        Duration::minutes(self.expiry_window_min)
    }
}
