//! SQLite persistence boundary
//!
//! The aggregator stays authoritative in memory; this layer is write-behind.
//! Expired rows are retained for audit and excluded from the warm-start load.

use std::path::Path;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool};
use sqlx::Row;
use uuid::Uuid;

use rv_common::{Error, Report, Result};

use crate::warning::{WarnMode, WarningRecord};

/// Open (creating if missing) the database file
pub async fn connect(db_path: &Path) -> Result<SqlitePool> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let options = SqliteConnectOptions::from_str(&format!("sqlite://{}", db_path.display()))
        .map_err(Error::Database)?
        .create_if_missing(true);
    let pool = SqlitePool::connect_with(options).await?;
    init_schema(&pool).await?;
    Ok(pool)
}

/// In-memory database, used by the integration tests.
///
/// Pinned to a single pooled connection: every new `:memory:` connection
/// would otherwise see its own empty database.
pub async fn connect_in_memory() -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:").map_err(Error::Database)?;
    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await?;
    init_schema(&pool).await?;
    Ok(pool)
}

/// Create tables on first connect
async fn init_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS reports (
            id TEXT PRIMARY KEY,
            reporter_id TEXT,
            latitude REAL NOT NULL,
            longitude REAL NOT NULL,
            label TEXT,
            reported_at TEXT NOT NULL,
            active INTEGER NOT NULL DEFAULT 1,
            verified INTEGER NOT NULL DEFAULT 0,
            verified_count INTEGER NOT NULL DEFAULT 1
        )",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS warnings_sent (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            observer_id TEXT NOT NULL,
            report_id TEXT NOT NULL,
            algorithm TEXT NOT NULL,
            distance_km REAL NOT NULL,
            sent_at TEXT NOT NULL
        )",
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_reports_active ON reports(active)")
        .execute(pool)
        .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_warnings_observer_day ON warnings_sent(observer_id, sent_at)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn insert_report(pool: &SqlitePool, report: &Report) -> Result<()> {
    sqlx::query(
        "INSERT INTO reports
            (id, reporter_id, latitude, longitude, label, reported_at, active, verified, verified_count)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(report.id.to_string())
    .bind(report.reporter_id.map(|id| id.to_string()))
    .bind(report.latitude)
    .bind(report.longitude)
    .bind(&report.label)
    .bind(report.reported_at)
    .bind(report.active)
    .bind(report.verified)
    .bind(report.verified_count as i64)
    .execute(pool)
    .await?;
    Ok(())
}

/// Persist the mutable fields after a merge, corroboration, or expiry
pub async fn update_report(pool: &SqlitePool, report: &Report) -> Result<()> {
    sqlx::query(
        "UPDATE reports
         SET reported_at = ?, active = ?, verified = ?, verified_count = ?
         WHERE id = ?",
    )
    .bind(report.reported_at)
    .bind(report.active)
    .bind(report.verified)
    .bind(report.verified_count as i64)
    .bind(report.id.to_string())
    .execute(pool)
    .await?;
    Ok(())
}

/// Flip swept reports to inactive
pub async fn mark_expired(pool: &SqlitePool, ids: &[Uuid]) -> Result<()> {
    for id in ids {
        sqlx::query("UPDATE reports SET active = 0 WHERE id = ?")
            .bind(id.to_string())
            .execute(pool)
            .await?;
    }
    Ok(())
}

/// Load still-active reports for the warm start
pub async fn load_active_reports(pool: &SqlitePool) -> Result<Vec<Report>> {
    let rows = sqlx::query(
        "SELECT id, reporter_id, latitude, longitude, label, reported_at, active, verified, verified_count
         FROM reports WHERE active = 1",
    )
    .fetch_all(pool)
    .await?;

    rows.iter().map(report_from_row).collect()
}

fn report_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Report> {
    let id: String = row.try_get("id")?;
    let reporter_id: Option<String> = row.try_get("reporter_id")?;
    let reported_at: DateTime<Utc> = row.try_get("reported_at")?;
    let verified_count: i64 = row.try_get("verified_count")?;
    Ok(Report {
        id: parse_uuid(&id)?,
        reporter_id: reporter_id.as_deref().map(parse_uuid).transpose()?,
        latitude: row.try_get("latitude")?,
        longitude: row.try_get("longitude")?,
        label: row.try_get("label")?,
        reported_at,
        active: row.try_get("active")?,
        verified: row.try_get("verified")?,
        verified_count: verified_count as u32,
    })
}

pub async fn insert_warning(pool: &SqlitePool, record: &WarningRecord) -> Result<()> {
    sqlx::query(
        "INSERT INTO warnings_sent (observer_id, report_id, algorithm, distance_km, sent_at)
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(record.observer_id.to_string())
    .bind(record.report_id.to_string())
    .bind(record.algorithm.as_str())
    .bind(record.distance_km)
    .bind(record.sent_at)
    .execute(pool)
    .await?;
    Ok(())
}

/// Load the warnings delivered on one UTC day, for the warm start
pub async fn load_warnings_on_day(pool: &SqlitePool, day: NaiveDate) -> Result<Vec<WarningRecord>> {
    let start = day
        .and_hms_opt(0, 0, 0)
        .expect("midnight is always a valid time")
        .and_utc();
    let end = start + chrono::Duration::days(1);

    let rows = sqlx::query(
        "SELECT observer_id, report_id, algorithm, distance_km, sent_at
         FROM warnings_sent WHERE sent_at >= ? AND sent_at < ?",
    )
    .bind(start)
    .bind(end)
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| {
            let observer_id: String = row.try_get("observer_id")?;
            let report_id: String = row.try_get("report_id")?;
            let algorithm: String = row.try_get("algorithm")?;
            Ok(WarningRecord {
                observer_id: parse_uuid(&observer_id)?,
                report_id: parse_uuid(&report_id)?,
                algorithm: WarnMode::parse(&algorithm)?,
                distance_km: row.try_get("distance_km")?,
                sent_at: row.try_get("sent_at")?,
            })
        })
        .collect()
}

fn parse_uuid(s: &str) -> Result<Uuid> {
    Uuid::parse_str(s).map_err(|e| Error::Internal(format!("Corrupt UUID in database: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_report() -> Report {
        Report {
            id: Uuid::new_v4(),
            reporter_id: Some(Uuid::new_v4()),
            latitude: 58.1293,
            longitude: 7.9831,
            label: Some("E18 vestgående".to_string()),
            reported_at: Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap(),
            active: true,
            verified: false,
            verified_count: 1,
        }
    }

    #[tokio::test]
    async fn test_report_roundtrip() {
        let pool = connect_in_memory().await.unwrap();
        let report = sample_report();
        insert_report(&pool, &report).await.unwrap();

        let loaded = load_active_reports(&pool).await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].id, report.id);
        assert_eq!(loaded[0].reporter_id, report.reporter_id);
        assert_eq!(loaded[0].label, report.label);
        assert_eq!(loaded[0].reported_at, report.reported_at);
        assert_eq!(loaded[0].verified_count, 1);
    }

    #[tokio::test]
    async fn test_expired_reports_excluded_from_warm_start() {
        let pool = connect_in_memory().await.unwrap();
        let report = sample_report();
        insert_report(&pool, &report).await.unwrap();
        mark_expired(&pool, &[report.id]).await.unwrap();

        let loaded = load_active_reports(&pool).await.unwrap();
        assert!(loaded.is_empty());
    }

    #[tokio::test]
    async fn test_update_persists_merge_fields() {
        let pool = connect_in_memory().await.unwrap();
        let mut report = sample_report();
        insert_report(&pool, &report).await.unwrap();

        report.verified = true;
        report.verified_count = 3;
        report.reported_at = report.reported_at + chrono::Duration::minutes(10);
        update_report(&pool, &report).await.unwrap();

        let loaded = load_active_reports(&pool).await.unwrap();
        assert_eq!(loaded[0].verified_count, 3);
        assert!(loaded[0].verified);
        assert_eq!(loaded[0].reported_at, report.reported_at);
    }

    #[tokio::test]
    async fn test_warning_ledger_day_filter() {
        let pool = connect_in_memory().await.unwrap();
        let day1 = Utc.with_ymd_and_hms(2025, 6, 1, 23, 0, 0).unwrap();
        let day2 = Utc.with_ymd_and_hms(2025, 6, 2, 1, 0, 0).unwrap();

        let record = WarningRecord {
            observer_id: Uuid::new_v4(),
            report_id: Uuid::new_v4(),
            algorithm: WarnMode::Radius,
            distance_km: 2.4,
            sent_at: day1,
        };
        insert_warning(&pool, &record).await.unwrap();
        insert_warning(
            &pool,
            &WarningRecord {
                sent_at: day2,
                algorithm: WarnMode::Route,
                ..record
            },
        )
        .await
        .unwrap();

        let loaded = load_warnings_on_day(&pool, day2.date_naive()).await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].algorithm, WarnMode::Route);
        assert_eq!(loaded[0].sent_at, day2);
    }
}
