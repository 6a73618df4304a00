//! Report aggregation core
//!
//! Owns the full set of reports (active and expired) and applies the
//! merge/corroboration/expiry policy. All methods are synchronous, pure
//! in-memory computation; the caller serializes access (one mutex around the
//! aggregator) and persists the returned outcomes at the storage boundary.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tracing::debug;
use uuid::Uuid;

use rv_common::geo::{haversine_m, GeoPoint};
use rv_common::{Policy, Report, Result};

/// An incoming report before it has been matched against existing state
#[derive(Debug, Clone)]
pub struct Candidate {
    pub position: GeoPoint,
    pub reporter_id: Option<Uuid>,
    pub label: Option<String>,
    pub submitted_at: DateTime<Utc>,
}

/// Result of a submission, carrying everything the storage layer must persist
#[derive(Debug, Clone)]
pub struct SubmitOutcome {
    /// The authoritative report (newly created or refreshed)
    pub report: Report,
    /// True when a new entity was created, false on a merge refresh
    pub created: bool,
    /// Existing reports flipped to verified by corroboration
    pub corroborated: Vec<Report>,
    /// Reports deactivated by the sweep that ran before matching
    pub expired: Vec<Uuid>,
}

/// Owns all reports and applies merge, corroboration, and expiry policy
pub struct ReportAggregator {
    policy: Policy,
    reports: HashMap<Uuid, Report>,
}

impl ReportAggregator {
    pub fn new(policy: Policy) -> Self {
        Self {
            policy,
            reports: HashMap::new(),
        }
    }

    /// Re-insert a report loaded from storage at startup
    pub fn restore(&mut self, report: Report) {
        self.reports.insert(report.id, report);
    }

    /// Look up a report by id (active or expired)
    pub fn get(&self, id: Uuid) -> Option<&Report> {
        self.reports.get(&id)
    }

    /// Ingest a report: merge, corroborate, or create.
    ///
    /// Runs the expiry sweep first so only live reports participate in
    /// matching. Matching order:
    /// 1. An active report within the merge radius is refreshed in place
    ///    (most recent `reported_at` wins, lowest id on a tie).
    /// 2. Otherwise active reports in (merge radius, corroboration radius]
    ///    no older than the corroboration window cross-validate the new
    ///    report: a distinct entity is created and all parties are verified.
    /// 3. Otherwise a fresh unverified report is created.
    pub fn submit(&mut self, candidate: Candidate) -> Result<SubmitOutcome> {
        candidate.position.validate()?;

        let now = candidate.submitted_at;
        let expired = self.sweep(now);

        // Merge: same physical control, refresh in place
        let merge_target = self
            .reports
            .values()
            .filter(|r| r.active)
            .filter(|r| haversine_m(candidate.position, r.position()) <= self.policy.merge_radius_m)
            .max_by(|a, b| {
                a.reported_at
                    .cmp(&b.reported_at)
                    .then_with(|| b.id.cmp(&a.id))
            })
            .map(|r| r.id);

        if let Some(id) = merge_target {
            let report = self
                .reports
                .get_mut(&id)
                .expect("merge target vanished under exclusive access");
            report.reported_at = now;
            report.verified_count += 1;
            report.verified = true;
            debug!(report_id = %id, verified_count = report.verified_count, "merged report");
            return Ok(SubmitOutcome {
                report: report.clone(),
                created: false,
                corroborated: Vec::new(),
                expired,
            });
        }

        // Corroboration: nearby but distinct controls cross-validate
        let corroborator_ids: Vec<Uuid> = self
            .reports
            .values()
            .filter(|r| r.active)
            .filter(|r| {
                let d = haversine_m(candidate.position, r.position());
                d > self.policy.merge_radius_m && d <= self.policy.corroboration_radius_m
            })
            .filter(|r| r.age(now) <= self.policy.corroboration_window())
            .map(|r| r.id)
            .collect();

        let mut corroborated = Vec::with_capacity(corroborator_ids.len());
        for id in corroborator_ids {
            let peer = self
                .reports
                .get_mut(&id)
                .expect("corroborator vanished under exclusive access");
            if !peer.verified {
                peer.verified = true;
            }
            corroborated.push(peer.clone());
        }

        let report = Report {
            id: Uuid::new_v4(),
            reporter_id: candidate.reporter_id,
            latitude: candidate.position.latitude,
            longitude: candidate.position.longitude,
            label: candidate.label,
            reported_at: now,
            active: true,
            verified: !corroborated.is_empty(),
            verified_count: 1,
        };
        debug!(report_id = %report.id, verified = report.verified, "created report");
        self.reports.insert(report.id, report.clone());

        Ok(SubmitOutcome {
            report,
            created: true,
            corroborated,
            expired,
        })
    }

    /// Sweep then snapshot the active set, most recent first.
    ///
    /// Returns the snapshot and the ids deactivated by this sweep so the
    /// caller can persist the flips.
    pub fn list_active(&mut self, now: DateTime<Utc>) -> (Vec<Report>, Vec<Uuid>) {
        let expired = self.sweep(now);
        let mut active: Vec<Report> = self
            .reports
            .values()
            .filter(|r| r.active)
            .cloned()
            .collect();
        active.sort_by(|a, b| b.reported_at.cmp(&a.reported_at).then_with(|| a.id.cmp(&b.id)));
        (active, expired)
    }

    /// Deactivate reports older than the expiry window. Irreversible.
    pub fn sweep(&mut self, now: DateTime<Utc>) -> Vec<Uuid> {
        let window = self.policy.expiry_window();
        let mut expired = Vec::new();
        for report in self.reports.values_mut() {
            if report.active && report.age(now) > window {
                report.active = false;
                expired.push(report.id);
            }
        }
        if !expired.is_empty() {
            debug!(count = expired.len(), "expired reports");
        }
        expired
    }
}
