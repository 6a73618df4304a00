//! Timestamp utilities

use chrono::{DateTime, NaiveDate, Utc};

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// UTC calendar day of a timestamp.
///
/// "Already warned today" is defined on UTC day boundaries, matching the
/// server-side ledger semantics.
pub fn utc_day(at: DateTime<Utc>) -> NaiveDate {
    at.date_naive()
}

/// True when both timestamps fall on the same UTC calendar day
pub fn same_utc_day(a: DateTime<Utc>, b: DateTime<Utc>) -> bool {
    utc_day(a) == utc_day(b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_now_returns_valid_timestamp() {
        let timestamp = now();
        // Should be a reasonable timestamp (after year 2000)
        assert!(timestamp.timestamp() > 946_684_800);
    }

    #[test]
    fn test_same_utc_day_within_day() {
        let a = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 1).unwrap();
        let b = Utc.with_ymd_and_hms(2025, 6, 1, 23, 59, 59).unwrap();
        assert!(same_utc_day(a, b));
    }

    #[test]
    fn test_same_utc_day_across_midnight() {
        let a = Utc.with_ymd_and_hms(2025, 6, 1, 23, 59, 59).unwrap();
        let b = Utc.with_ymd_and_hms(2025, 6, 2, 0, 0, 0).unwrap();
        assert!(!same_utc_day(a, b));
    }
}
