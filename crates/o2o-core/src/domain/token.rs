//! Auth token domain type: a gateway-issued bearer credential, distinct
//! from backend credentials.

use chrono::{DateTime, Datelike, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::channel::glob_match;

/// Prefix every plain-text token string carries.
pub const TOKEN_PREFIX: &str = "sk-o2o-";

/// Per-token rate-limit override, applied instead of the global token window.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RateLimitOverride {
    pub window_ms: u64,
    pub max_requests: u32,
}

/// A bearer string issued by the gateway to a client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthToken {
    pub id: String,
    /// Plain-text token value, looked up directly on every request.
    pub token: String,
    /// SHA-256 hex digest of `token`, stored for a future hash-only migration.
    pub token_hash: String,
    pub name: String,
    pub enabled: bool,
    pub expires_at: Option<DateTime<Utc>>,
    pub monthly_quota: Option<u64>,
    pub quota_used: u64,
    pub quota_reset_at: Option<DateTime<Utc>>,
    pub allowed_models: Vec<String>,
    pub allowed_ips: Vec<String>,
    pub rate_limit_override: Option<RateLimitOverride>,
    pub total_requests: u64,
    pub total_tokens: u64,
    pub created_at: DateTime<Utc>,
    pub last_used: Option<DateTime<Utc>>,
}

/// Reason a token failed validation, surfaced as a short human string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenValidation {
    Valid,
    NotFound,
    Disabled,
    Expired,
    OverQuota,
}

impl TokenValidation {
    #[must_use]
    pub fn message(&self) -> &'static str {
        match self {
            Self::Valid => "ok",
            Self::NotFound => "invalid token",
            Self::Disabled => "token disabled",
            Self::Expired => "token expired",
            Self::OverQuota => "monthly quota exceeded",
        }
    }
}

impl AuthToken {
    /// SHA-256 hex digest of a plain token string.
    #[must_use]
    pub fn hash_token(plain: &str) -> String {
        let digest = Sha256::digest(plain.as_bytes());
        hex::encode(digest)
    }

    /// First-of-next-month UTC instant, used for quota resets.
    #[must_use]
    pub fn next_month_boundary(now: DateTime<Utc>) -> DateTime<Utc> {
        let (year, month) = if now.month() == 12 {
            (now.year() + 1, 1)
        } else {
            (now.year(), now.month() + 1)
        };
        Utc.with_ymd_and_hms(year, month, 1, 0, 0, 0)
            .single()
            .unwrap_or(now)
    }

    /// Idempotently reset the monthly quota if `quotaResetAt <= now`.
    /// Returns whether a reset occurred.
    pub fn maybe_reset_quota(&mut self, now: DateTime<Utc>) -> bool {
        let due = match self.quota_reset_at {
            Some(reset_at) => reset_at <= now,
            None => self.monthly_quota.is_some(),
        };
        if due {
            self.quota_used = 0;
            self.quota_reset_at = Some(Self::next_month_boundary(now));
        }
        due
    }

    /// Validate in the order: existence is assumed true by caller, then
    /// enabled, not expired, not over quota. First failure wins.
    #[must_use]
    pub fn validate(&self, now: DateTime<Utc>) -> TokenValidation {
        if !self.enabled {
            return TokenValidation::Disabled;
        }
        if let Some(expiry) = self.expires_at {
            if expiry <= now {
                return TokenValidation::Expired;
            }
        }
        if let Some(quota) = self.monthly_quota {
            if self.quota_used >= quota {
                return TokenValidation::OverQuota;
            }
        }
        TokenValidation::Valid
    }

    /// Empty list permits all; otherwise glob-matched against `allowed_models`.
    #[must_use]
    pub fn allows_model(&self, model: &str) -> bool {
        self.allowed_models.is_empty()
            || self.allowed_models.iter().any(|p| glob_match(p, model))
    }

    /// Empty list permits all; otherwise exact membership.
    #[must_use]
    pub fn allows_ip(&self, ip: &str) -> bool {
        self.allowed_ips.is_empty() || self.allowed_ips.iter().any(|allowed| allowed == ip)
    }

    /// Atomic usage increment: totals, quota, and last-used timestamp.
    pub fn record_usage(&mut self, prompt: u64, completion: u64, now: DateTime<Utc>) {
        self.total_requests += 1;
        self.total_tokens += prompt + completion;
        self.quota_used += prompt + completion;
        self.last_used = Some(now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_month_wraps_december() {
        let dec = Utc.with_ymd_and_hms(2026, 12, 15, 0, 0, 0).unwrap();
        let next = AuthToken::next_month_boundary(dec);
        assert_eq!((next.year(), next.month()), (2027, 1));
    }

    #[test]
    fn validate_checks_in_order() {
        let now = Utc::now();
        let mut t = make_token(now);
        t.enabled = false;
        assert_eq!(t.validate(now), TokenValidation::Disabled);
        t.enabled = true;
        t.expires_at = Some(now - chrono::Duration::seconds(1));
        assert_eq!(t.validate(now), TokenValidation::Expired);
        t.expires_at = None;
        t.monthly_quota = Some(10);
        t.quota_used = 10;
        assert_eq!(t.validate(now), TokenValidation::OverQuota);
    }

    fn make_token(now: DateTime<Utc>) -> AuthToken {
        AuthToken {
            id: "t1".into(),
            token: format!("{TOKEN_PREFIX}abc"),
            token_hash: AuthToken::hash_token("abc"),
            name: "test".into(),
            enabled: true,
            expires_at: None,
            monthly_quota: None,
            quota_used: 0,
            quota_reset_at: None,
            allowed_models: vec![],
            allowed_ips: vec![],
            rate_limit_override: None,
            total_requests: 0,
            total_tokens: 0,
            created_at: now,
            last_used: None,
        }
    }
}
