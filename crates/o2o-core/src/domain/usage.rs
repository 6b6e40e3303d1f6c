//! Per-token, per-day usage accounting.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// One day's aggregate counters for one token.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default)]
pub struct DailyUsage {
    pub requests: u64,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

/// `tokenId -> date(YYYY-MM-DD) -> DailyUsage`. Append-only within a day.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UsageRecord {
    pub by_token: BTreeMap<String, BTreeMap<String, DailyUsage>>,
}

impl UsageRecord {
    /// Record usage for `token_id` on the UTC calendar date of `now`.
    pub fn record(&mut self, token_id: &str, prompt: u64, completion: u64, now: DateTime<Utc>) {
        let date = now.date_naive().to_string();
        let entry = self
            .by_token
            .entry(token_id.to_string())
            .or_default()
            .entry(date)
            .or_default();
        entry.requests += 1;
        entry.prompt_tokens += prompt;
        entry.completion_tokens += completion;
    }

    /// Sum across all tokens for the last `days` calendar days (inclusive of today).
    #[must_use]
    pub fn aggregate(&self, days: u32, now: DateTime<Utc>) -> DailyUsage {
        let today = now.date_naive();
        let cutoff = today - chrono::Duration::days(i64::from(days).saturating_sub(1).max(0));
        let mut total = DailyUsage::default();
        for per_date in self.by_token.values() {
            for (date, usage) in per_date {
                if let Ok(parsed) = NaiveDate::parse_from_str(date, "%Y-%m-%d") {
                    if parsed >= cutoff && parsed <= today {
                        total.requests += usage.requests;
                        total.prompt_tokens += usage.prompt_tokens;
                        total.completion_tokens += usage.completion_tokens;
                    }
                }
            }
        }
        total
    }

    /// Trim entries older than `retain_days` days, for all tokens.
    pub fn trim_older_than(&mut self, retain_days: u32, now: DateTime<Utc>) {
        let cutoff = now.date_naive() - chrono::Duration::days(i64::from(retain_days));
        for per_date in self.by_token.values_mut() {
            per_date.retain(|date, _| {
                NaiveDate::parse_from_str(date, "%Y-%m-%d")
                    .map(|d| d >= cutoff)
                    .unwrap_or(true)
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn aggregate_sums_recent_days_only() {
        let mut rec = UsageRecord::default();
        let now = Utc.with_ymd_and_hms(2026, 7, 28, 12, 0, 0).unwrap();
        rec.record("t1", 10, 5, now);
        rec.record("t1", 1, 1, now - chrono::Duration::days(40));
        let agg = rec.aggregate(30, now);
        assert_eq!(agg.requests, 1);
        assert_eq!(agg.prompt_tokens, 10);
    }
}
