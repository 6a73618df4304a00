//! Proximity-warning decision and the delivered-warning ledger
//!
//! `should_warn` is a pure decision over the observer position, the report,
//! and the set of reports this observer was already warned about today. It
//! never mutates the ledger; recording happens in a separate call after the
//! caller has acted on a `true` decision, so a retried delivery cannot
//! double-count.
//!
//! "Today" is the UTC calendar day throughout.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use rv_common::geo::{haversine_km, project_onto_polyline, GeoPoint};
use rv_common::time::same_utc_day;
use rv_common::{Error, Policy, Report, Result};

/// Warning search algorithm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WarnMode {
    /// Fixed radius around the observer
    Radius,
    /// Corridor along a navigation route, looking ahead only
    Route,
}

impl WarnMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            WarnMode::Radius => "radius",
            WarnMode::Route => "route",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "radius" => Ok(WarnMode::Radius),
            "route" => Ok(WarnMode::Route),
            other => Err(Error::InvalidInput(format!("Unknown warn mode: {other}"))),
        }
    }
}

/// Outcome of a warning check
#[derive(Debug, Clone, Copy, Serialize)]
pub struct WarnDecision {
    pub warn: bool,
    /// Great-circle distance from observer to report, km
    pub distance_km: f64,
}

/// Decide whether an observer should be warned about a report right now.
///
/// Fails closed: an expired report or one already warned about today never
/// warns. The radius threshold is inclusive (a report at exactly the
/// threshold distance warns).
pub fn should_warn(
    observer: GeoPoint,
    report: &Report,
    warned_today: &HashSet<Uuid>,
    policy: &Policy,
    mode: WarnMode,
    route_polyline: Option<&[GeoPoint]>,
) -> Result<WarnDecision> {
    observer.validate()?;
    let distance_km = haversine_km(observer, report.position());

    if !report.active || warned_today.contains(&report.id) {
        return Ok(WarnDecision {
            warn: false,
            distance_km,
        });
    }

    let warn = match mode {
        WarnMode::Radius => distance_km <= policy.warn_radius_km,
        WarnMode::Route => {
            let polyline = route_polyline.ok_or_else(|| {
                Error::InvalidInput("Route mode requires a route polyline".to_string())
            })?;
            let report_proj = project_onto_polyline(report.position(), polyline);
            let observer_proj = project_onto_polyline(observer, polyline);
            match (report_proj, observer_proj) {
                (Some(rp), Some(op)) => {
                    let ahead_km = rp.along_km - op.along_km;
                    rp.offset_km <= policy.route_corridor_km
                        && ahead_km >= 0.0
                        && ahead_km <= policy.route_lookahead_km
                }
                _ => {
                    return Err(Error::InvalidInput(
                        "Route polyline needs at least two points".to_string(),
                    ))
                }
            }
        }
    };

    Ok(WarnDecision { warn, distance_km })
}

/// One delivered warning, as persisted in `warnings_sent`
#[derive(Debug, Clone)]
pub struct WarningRecord {
    pub observer_id: Uuid,
    pub report_id: Uuid,
    pub algorithm: WarnMode,
    pub distance_km: f64,
    pub sent_at: DateTime<Utc>,
}

/// In-memory view of delivered warnings, one entry per delivery
#[derive(Debug, Default)]
pub struct WarningLedger {
    records: Vec<WarningRecord>,
}

impl WarningLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Re-insert a record loaded from storage at startup
    pub fn restore(&mut self, record: WarningRecord) {
        self.records.push(record);
    }

    /// Record a delivered warning.
    ///
    /// Returns false (and records nothing) when this observer was already
    /// warned about this report on the same UTC day.
    pub fn record(&mut self, record: WarningRecord) -> bool {
        let duplicate = self.records.iter().any(|r| {
            r.observer_id == record.observer_id
                && r.report_id == record.report_id
                && same_utc_day(r.sent_at, record.sent_at)
        });
        if duplicate {
            return false;
        }
        self.records.push(record);
        true
    }

    /// Reports this observer was warned about on the UTC day of `now`
    pub fn warned_today(&self, observer_id: Uuid, now: DateTime<Utc>) -> HashSet<Uuid> {
        self.records
            .iter()
            .filter(|r| r.observer_id == observer_id && same_utc_day(r.sent_at, now))
            .map(|r| r.report_id)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const ANCHOR: GeoPoint = GeoPoint {
        latitude: 58.1293,
        longitude: 7.9831,
    };

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    fn report_at(position: GeoPoint) -> Report {
        Report {
            id: Uuid::new_v4(),
            reporter_id: None,
            latitude: position.latitude,
            longitude: position.longitude,
            label: None,
            reported_at: t0(),
            active: true,
            verified: true,
            verified_count: 2,
        }
    }

    fn policy() -> Policy {
        Policy::default()
    }

    #[test]
    fn test_radius_warns_inside_threshold() {
        let report = report_at(GeoPoint::new(58.1400, 7.9831)); // ~1.2km north
        let d = should_warn(ANCHOR, &report, &HashSet::new(), &policy(), WarnMode::Radius, None)
            .unwrap();
        assert!(d.warn);
        assert!(d.distance_km > 1.0 && d.distance_km < 1.3);
    }

    #[test]
    fn test_radius_silent_outside_threshold() {
        let report = report_at(GeoPoint::new(58.1700, 7.9831)); // ~4.5km north
        let d = should_warn(ANCHOR, &report, &HashSet::new(), &policy(), WarnMode::Radius, None)
            .unwrap();
        assert!(!d.warn);
    }

    #[test]
    fn test_radius_boundary_is_inclusive() {
        // Pin the threshold to the exact computed distance: equality warns
        let report = report_at(GeoPoint::new(58.1563, 7.9831));
        let exact = haversine_km(ANCHOR, report.position());
        let mut p = policy();
        p.warn_radius_km = exact;
        let d = should_warn(ANCHOR, &report, &HashSet::new(), &p, WarnMode::Radius, None).unwrap();
        assert!(d.warn, "distance equal to the threshold must warn");
    }

    #[test]
    fn test_already_warned_today_suppresses() {
        // Zero distance, but already on today's list: fails closed
        let report = report_at(ANCHOR);
        let warned: HashSet<Uuid> = [report.id].into_iter().collect();
        let d = should_warn(ANCHOR, &report, &warned, &policy(), WarnMode::Radius, None).unwrap();
        assert!(!d.warn);
        assert_eq!(d.distance_km, 0.0);
    }

    #[test]
    fn test_expired_report_never_warns() {
        let mut report = report_at(ANCHOR);
        report.active = false;
        let d = should_warn(ANCHOR, &report, &HashSet::new(), &policy(), WarnMode::Radius, None)
            .unwrap();
        assert!(!d.warn);
    }

    #[test]
    fn test_invalid_observer_rejected() {
        let report = report_at(ANCHOR);
        let bad = GeoPoint::new(120.0, 0.0);
        assert!(
            should_warn(bad, &report, &HashSet::new(), &policy(), WarnMode::Radius, None).is_err()
        );
    }

    // Straight northbound route used by the route-mode tests
    fn northbound_route() -> Vec<GeoPoint> {
        vec![
            GeoPoint::new(58.1200, 7.9831),
            GeoPoint::new(58.1700, 7.9831),
        ]
    }

    #[test]
    fn test_route_warns_ahead_within_corridor() {
        // Report ~1km ahead of the observer, directly on the route
        let report = report_at(GeoPoint::new(58.1383, 7.9831));
        let route = northbound_route();
        let d = should_warn(
            ANCHOR,
            &report,
            &HashSet::new(),
            &policy(),
            WarnMode::Route,
            Some(&route),
        )
        .unwrap();
        assert!(d.warn);
    }

    #[test]
    fn test_route_silent_behind_observer() {
        // Report ~1km behind the observer along the route
        let report = report_at(GeoPoint::new(58.1203, 7.9831));
        let route = northbound_route();
        let d = should_warn(
            ANCHOR,
            &report,
            &HashSet::new(),
            &policy(),
            WarnMode::Route,
            Some(&route),
        )
        .unwrap();
        assert!(!d.warn);
    }

    #[test]
    fn test_route_silent_beyond_lookahead() {
        // Report ~3.1km ahead, past the 2km lookahead
        let report = report_at(GeoPoint::new(58.1573, 7.9831));
        let route = northbound_route();
        let d = should_warn(
            ANCHOR,
            &report,
            &HashSet::new(),
            &policy(),
            WarnMode::Route,
            Some(&route),
        )
        .unwrap();
        assert!(!d.warn);
    }

    #[test]
    fn test_route_silent_outside_corridor() {
        // Report 1km ahead along the route but ~1km east of it
        let report = report_at(GeoPoint::new(58.1383, 8.0002));
        let route = northbound_route();
        let d = should_warn(
            ANCHOR,
            &report,
            &HashSet::new(),
            &policy(),
            WarnMode::Route,
            Some(&route),
        )
        .unwrap();
        assert!(!d.warn);
    }

    #[test]
    fn test_route_mode_requires_polyline() {
        let report = report_at(ANCHOR);
        assert!(should_warn(
            ANCHOR,
            &report,
            &HashSet::new(),
            &policy(),
            WarnMode::Route,
            None
        )
        .is_err());
        let single = [ANCHOR];
        assert!(should_warn(
            ANCHOR,
            &report,
            &HashSet::new(),
            &policy(),
            WarnMode::Route,
            Some(&single)
        )
        .is_err());
    }

    #[test]
    fn test_ledger_rejects_same_day_duplicate() {
        let mut ledger = WarningLedger::new();
        let observer = Uuid::new_v4();
        let report = Uuid::new_v4();
        let record = WarningRecord {
            observer_id: observer,
            report_id: report,
            algorithm: WarnMode::Radius,
            distance_km: 1.2,
            sent_at: t0(),
        };
        assert!(ledger.record(record.clone()));
        assert!(!ledger.record(WarningRecord {
            sent_at: t0() + chrono::Duration::hours(2),
            ..record
        }));
        assert_eq!(ledger.warned_today(observer, t0()).len(), 1);
    }

    #[test]
    fn test_ledger_resets_at_utc_midnight() {
        let mut ledger = WarningLedger::new();
        let observer = Uuid::new_v4();
        let report = Uuid::new_v4();
        let record = WarningRecord {
            observer_id: observer,
            report_id: report,
            algorithm: WarnMode::Radius,
            distance_km: 1.2,
            sent_at: t0(),
        };
        assert!(ledger.record(record.clone()));
        let next_day = Utc.with_ymd_and_hms(2025, 6, 2, 0, 0, 1).unwrap();
        assert!(ledger.warned_today(observer, next_day).is_empty());
        assert!(ledger.record(WarningRecord {
            sent_at: next_day,
            ..record
        }));
    }

    #[test]
    fn test_ledger_is_per_observer() {
        let mut ledger = WarningLedger::new();
        let report = Uuid::new_v4();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        ledger.record(WarningRecord {
            observer_id: a,
            report_id: report,
            algorithm: WarnMode::Route,
            distance_km: 0.8,
            sent_at: t0(),
        });
        assert!(ledger.warned_today(b, t0()).is_empty());
    }
}
