//! Backend credential domain type.
//!
//! A `Credential` represents one upstream authority: an API key (possibly
//! empty for an unauthenticated self-hosted backend), a base URL, and the
//! mutable counters the registry maintains as requests flow through it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Default weight assigned to a freshly parsed credential.
pub const DEFAULT_WEIGHT: u32 = 10;

/// One `(apiKey, baseUrl)` pair targeting one upstream Ollama-family backend.
///
/// `id` is unique within the process. `(key, base_url)` is the
/// duplicate-detection composite used by the registry's `addKey`/`batchImport`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credential {
    pub id: String,
    pub key: String,
    pub base_url: String,
    pub name: String,
    pub enabled: bool,
    pub healthy: bool,
    pub weight: u32,
    pub priority: i32,
    pub total_requests: u64,
    pub failed_requests: u64,
    pub last_check: Option<DateTime<Utc>>,
    pub last_used: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub added_at: DateTime<Utc>,
}

impl Credential {
    /// Create a newly parsed credential with default counters.
    #[must_use]
    pub fn new(id: String, key: String, base_url: String, name: String, now: DateTime<Utc>) -> Self {
        Self {
            id,
            key,
            base_url,
            name,
            enabled: true,
            healthy: true,
            weight: DEFAULT_WEIGHT,
            priority: 0,
            total_requests: 0,
            failed_requests: 0,
            last_check: None,
            last_used: None,
            last_error: None,
            added_at: now,
        }
    }

    /// Whether this credential's `(key, base_url)` pair matches another's.
    #[must_use]
    pub fn is_duplicate_of(&self, key: &str, base_url: &str) -> bool {
        self.key == key && self.base_url == base_url
    }

    /// Auto-quarantine rule: `failedRequests > 5 AND failedRequests/totalRequests > 0.8`.
    #[must_use]
    pub fn should_quarantine(&self) -> bool {
        self.failed_requests > 5
            && (self.failed_requests as f64) / (self.total_requests.max(1) as f64) > 0.8
    }

    /// Record a successful proxied request: restores health and clears the last error.
    pub fn record_success(&mut self, now: DateTime<Utc>) {
        self.total_requests += 1;
        self.last_used = Some(now);
        self.healthy = true;
        self.last_error = None;
    }

    /// Record a failed proxied request; auto-quarantines when the failure
    /// ratio crosses the threshold.
    pub fn record_failure(&mut self, err: impl Into<String>, now: DateTime<Utc>) {
        self.total_requests += 1;
        self.failed_requests += 1;
        self.last_used = Some(now);
        self.last_error = Some(err.into());
        if self.should_quarantine() {
            self.healthy = false;
        }
    }

    /// Mask the key for display: first 6 + "***" + last 4, or first 2 + "***" if shorter.
    #[must_use]
    pub fn masked_key(&self) -> String {
        mask_key(&self.key)
    }
}

/// Mask a secret the way the registry's `getAllKeys` projection does.
#[must_use]
pub fn mask_key(key: &str) -> String {
    let len = key.chars().count();
    if len == 0 {
        return String::new();
    }
    if len > 10 {
        let first: String = key.chars().take(6).collect();
        let last: String = key.chars().skip(len - 4).collect();
        format!("{first}***{last}")
    } else {
        let first: String = key.chars().take(2).collect();
        format!("{first}***")
    }
}

/// Aggregate counts returned by the registry's `getSummary()`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default)]
pub struct CredentialSummary {
    pub total: usize,
    pub enabled: usize,
    pub healthy: usize,
    pub disabled: usize,
    pub unhealthy: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn masks_long_keys() {
        assert_eq!(mask_key("sk-abcdefghijklmnop"), "sk-abc***mnop");
    }

    #[test]
    fn masks_short_keys() {
        assert_eq!(mask_key("short"), "sh***");
    }

    #[test]
    fn quarantine_requires_both_conditions() {
        let mut c = Credential::new(
            "a".into(),
            "k".into(),
            "https://x".into(),
            "n".into(),
            Utc::now(),
        );
        for _ in 0..5 {
            c.record_failure("boom", Utc::now());
        }
        // 5 failures out of 5 requests: ratio 1.0 but failed_requests is not > 5 yet.
        assert!(c.healthy);
        c.record_failure("boom", Utc::now());
        // Now 6 failures out of 6 requests: > 5 and ratio 1.0 > 0.8.
        assert!(!c.healthy);
    }
}
