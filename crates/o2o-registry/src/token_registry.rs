//! Auth token registry: multi-user bearer tokens, O(1) lookup by
//! plaintext, model/IP scoping, usage recording, monthly quota reset.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use o2o_core::domain::token::RateLimitOverride;
use o2o_core::domain::usage::DailyUsage;
use o2o_core::{AuthToken, TokenValidation, UsageRecord};
use o2o_persist::DebouncedJsonStore;
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::json;

const PERSIST_DEBOUNCE: Duration = Duration::from_millis(500);
const HEX_ALPHABET: &[u8] = b"0123456789abcdef";
/// Retention window for per-day usage history, mirroring backend stats'
/// 30-day retention.
const USAGE_RETAIN_DAYS: u32 = 30;

/// Inputs to `create_token`; everything but `name` is optional.
#[derive(Debug, Clone, Default)]
pub struct CreateTokenOptions {
    pub name: String,
    pub expires_at: Option<DateTime<Utc>>,
    pub monthly_quota: Option<u64>,
    pub allowed_models: Vec<String>,
    pub allowed_ips: Vec<String>,
    pub rate_limit_override: Option<RateLimitOverride>,
}

/// Outcome of `validate_token`.
#[derive(Debug, Clone)]
pub enum TokenOutcome {
    Valid(AuthToken),
    Invalid { error: &'static str },
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct PersistedTokens {
    #[serde(default)]
    tokens: Vec<AuthToken>,
    #[serde(default)]
    usage_stats: UsageRecord,
}

struct State {
    by_id: HashMap<String, AuthToken>,
    by_plain: HashMap<String, String>,
    usage: UsageRecord,
}

impl State {
    fn from_persisted(persisted: PersistedTokens, now: DateTime<Utc>) -> Self {
        let mut by_id = HashMap::new();
        let mut by_plain = HashMap::new();
        for mut token in persisted.tokens {
            token.maybe_reset_quota(now);
            by_plain.insert(token.token.clone(), token.id.clone());
            by_id.insert(token.id.clone(), token);
        }
        Self { by_id, by_plain, usage: persisted.usage_stats }
    }
}

fn snapshot_json(state: &Arc<RwLock<State>>) -> serde_json::Value {
    let state = state.read().expect("lock poisoned");
    let tokens: Vec<AuthToken> = state.by_id.values().cloned().collect();
    json!(PersistedTokens { tokens, usage_stats: state.usage.clone() })
}

pub struct TokenRegistry {
    state: Arc<RwLock<State>>,
    store: Option<DebouncedJsonStore>,
}

impl TokenRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(State::from_persisted(PersistedTokens::default(), Utc::now()))),
            store: None,
        }
    }

    pub async fn with_persistence(path: std::path::PathBuf) -> Result<Self, o2o_persist::PersistError> {
        let persisted: PersistedTokens = o2o_persist::read_json(&path).await?;
        let state = Arc::new(RwLock::new(State::from_persisted(persisted, Utc::now())));
        let store_state = state.clone();
        let store = DebouncedJsonStore::new(path, PERSIST_DEBOUNCE, move || snapshot_json(&store_state));
        Ok(Self { state, store: Some(store) })
    }

    pub async fn flush(&self) {
        if let Some(store) = &self.store {
            if let Err(err) = store.flush().await {
                tracing::warn!(%err, "failed to flush token registry state");
            }
        }
    }

    fn bump(&self) {
        if let Some(store) = &self.store {
            store.mark_dirty();
        }
    }

    /// Generate `"sk-o2o-" + 48 lowercase hex` and persist both the plain
    /// string and its SHA-256 digest.
    pub fn create_token(&self, opts: CreateTokenOptions) -> AuthToken {
        let mut rng = rand::thread_rng();
        let suffix: String = (0..48).map(|_| HEX_ALPHABET[rng.gen_range(0..16)] as char).collect();
        let plain = format!("{}{}", o2o_core::domain::token::TOKEN_PREFIX, suffix);
        let now = Utc::now();

        let token = AuthToken {
            id: crate::ids::registry_id(),
            token_hash: AuthToken::hash_token(&plain),
            token: plain,
            name: opts.name,
            enabled: true,
            expires_at: opts.expires_at,
            monthly_quota: opts.monthly_quota,
            quota_used: 0,
            quota_reset_at: opts.monthly_quota.map(|_| AuthToken::next_month_boundary(now)),
            allowed_models: opts.allowed_models,
            allowed_ips: opts.allowed_ips,
            rate_limit_override: opts.rate_limit_override,
            total_requests: 0,
            total_tokens: 0,
            created_at: now,
            last_used: None,
        };

        let mut state = self.state.write().expect("lock poisoned");
        state.by_plain.insert(token.token.clone(), token.id.clone());
        state.by_id.insert(token.id.clone(), token.clone());
        drop(state);
        self.bump();
        token
    }

    /// Order of checks: existence, enabled, not expired, not over quota.
    /// Quota reset is applied lazily here if it's due.
    pub fn validate_token(&self, plain: &str) -> TokenOutcome {
        let now = Utc::now();
        let mut state = self.state.write().expect("lock poisoned");
        let Some(id) = state.by_plain.get(plain).cloned() else {
            return TokenOutcome::Invalid { error: TokenValidation::NotFound.message() };
        };
        let token = state.by_id.get_mut(&id).expect("by_plain/by_id out of sync");
        token.maybe_reset_quota(now);
        match token.validate(now) {
            TokenValidation::Valid => TokenOutcome::Valid(token.clone()),
            other => TokenOutcome::Invalid { error: other.message() },
        }
    }

    pub fn remove(&self, id: &str) -> bool {
        let mut state = self.state.write().expect("lock poisoned");
        let Some(token) = state.by_id.remove(id) else { return false };
        state.by_plain.remove(&token.token);
        drop(state);
        self.bump();
        true
    }

    pub fn toggle(&self, id: &str) -> Option<AuthToken> {
        let mut state = self.state.write().expect("lock poisoned");
        let token = state.by_id.get_mut(id)?;
        token.enabled = !token.enabled;
        let out = token.clone();
        drop(state);
        self.bump();
        Some(out)
    }

    pub fn all(&self) -> Vec<AuthToken> {
        self.state.read().expect("lock poisoned").by_id.values().cloned().collect()
    }

    /// Atomic usage increment plus per-day usage-record append.
    pub fn record_usage(&self, id: &str, prompt: u64, completion: u64) {
        let now = Utc::now();
        let mut state = self.state.write().expect("lock poisoned");
        if let Some(token) = state.by_id.get_mut(id) {
            token.record_usage(prompt, completion, now);
        }
        state.usage.record(id, prompt, completion, now);
        state.usage.trim_older_than(USAGE_RETAIN_DAYS, now);
        drop(state);
        self.bump();
    }

    #[must_use]
    pub fn get_aggregate_usage(&self, days: u32) -> DailyUsage {
        self.state.read().expect("lock poisoned").usage.aggregate(days, Utc::now())
    }
}

impl Default for TokenRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn created_token_round_trips_through_validate() {
        let reg = TokenRegistry::new();
        let token = reg.create_token(CreateTokenOptions { name: "t".to_string(), ..Default::default() });
        assert!(token.token.starts_with("sk-o2o-"));
        match reg.validate_token(&token.token) {
            TokenOutcome::Valid(t) => assert_eq!(t.id, token.id),
            TokenOutcome::Invalid { .. } => panic!("expected valid"),
        }
    }

    #[test]
    fn unknown_token_is_invalid() {
        let reg = TokenRegistry::new();
        match reg.validate_token("sk-o2o-doesnotexist") {
            TokenOutcome::Invalid { error } => assert_eq!(error, "invalid token"),
            TokenOutcome::Valid(_) => panic!("expected invalid"),
        }
    }

    #[test]
    fn disabled_token_rejected() {
        let reg = TokenRegistry::new();
        let token = reg.create_token(CreateTokenOptions::default());
        reg.toggle(&token.id);
        match reg.validate_token(&token.token) {
            TokenOutcome::Invalid { error } => assert_eq!(error, "token disabled"),
            TokenOutcome::Valid(_) => panic!("expected invalid"),
        }
    }

    #[test]
    fn usage_recording_increments_quota_and_totals() {
        let reg = TokenRegistry::new();
        let token = reg.create_token(CreateTokenOptions {
            monthly_quota: Some(100),
            ..Default::default()
        });
        reg.record_usage(&token.id, 10, 5);
        let all = reg.all();
        let updated = all.iter().find(|t| t.id == token.id).unwrap();
        assert_eq!(updated.quota_used, 15);
        assert_eq!(updated.total_tokens, 15);
        assert_eq!(updated.total_requests, 1);
    }

    #[test]
    fn aggregate_usage_sums_recorded_days() {
        let reg = TokenRegistry::new();
        let token = reg.create_token(CreateTokenOptions::default());
        reg.record_usage(&token.id, 3, 2);
        let agg = reg.get_aggregate_usage(30);
        assert_eq!(agg.requests, 1);
        assert_eq!(agg.prompt_tokens, 3);
    }
}
