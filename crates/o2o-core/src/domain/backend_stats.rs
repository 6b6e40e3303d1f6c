//! Per-backend, per-day success/failure accounting, retained 30 days.
//!
//! Distinct from [`super::credential::Credential`]'s own `totalRequests`/
//! `failedRequests` counters (which are lifetime totals used for
//! auto-quarantine) — this is the day-bucketed history an operator can use
//! to see e.g. "backend X has been failing a lot *today*" rather than only
//! a running total since the key was added.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// One day's outcome counters for one backend (or channel) id.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default)]
pub struct DailyOutcome {
    pub success: u64,
    pub fail: u64,
}

/// `date(YYYY-MM-DD) -> id -> DailyOutcome`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct BackendStats {
    pub by_date: BTreeMap<String, BTreeMap<String, DailyOutcome>>,
}

impl BackendStats {
    pub fn record_success(&mut self, id: &str, now: DateTime<Utc>) {
        self.entry(id, now).success += 1;
    }

    pub fn record_failure(&mut self, id: &str, now: DateTime<Utc>) {
        self.entry(id, now).fail += 1;
    }

    fn entry(&mut self, id: &str, now: DateTime<Utc>) -> &mut DailyOutcome {
        let date = now.date_naive().to_string();
        self.by_date.entry(date).or_default().entry(id.to_string()).or_default()
    }

    /// Drop whole days older than `retain_days`, for all ids.
    pub fn trim_older_than(&mut self, retain_days: u32, now: DateTime<Utc>) {
        let cutoff = now.date_naive() - chrono::Duration::days(i64::from(retain_days));
        self.by_date.retain(|date, _| {
            NaiveDate::parse_from_str(date, "%Y-%m-%d").map(|d| d >= cutoff).unwrap_or(true)
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn records_success_and_failure_under_the_current_date() {
        let mut stats = BackendStats::default();
        let now = Utc.with_ymd_and_hms(2026, 7, 30, 9, 0, 0).unwrap();
        stats.record_success("cred-1", now);
        stats.record_success("cred-1", now);
        stats.record_failure("cred-1", now);
        let today = stats.by_date.get("2026-07-30").unwrap().get("cred-1").unwrap();
        assert_eq!(today.success, 2);
        assert_eq!(today.fail, 1);
    }

    #[test]
    fn trim_drops_days_older_than_retention() {
        let mut stats = BackendStats::default();
        let now = Utc.with_ymd_and_hms(2026, 7, 30, 9, 0, 0).unwrap();
        stats.record_success("cred-1", now - chrono::Duration::days(40));
        stats.record_success("cred-1", now);
        stats.trim_older_than(30, now);
        assert_eq!(stats.by_date.len(), 1);
        assert!(stats.by_date.contains_key("2026-07-30"));
    }
}
