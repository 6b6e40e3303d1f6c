//! Backend credential registry: owns the flat pool of `Credential`s,
//! their mutable counters, health probing and persistence — a single
//! `RwLock`-guarded state struct, with async probes delegated to a small
//! free function (`probe_health`) kept apart from the lock.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use chrono::Utc;
use o2o_core::domain::credential::{mask_key, CredentialSummary};
use o2o_core::Credential;
use o2o_persist::DebouncedJsonStore;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::RegistryError;
use crate::url::{build_target_url, parse_key_string};

const HEALTH_CHECK_TIMEOUT: Duration = Duration::from_secs(10);
const PERSIST_DEBOUNCE: Duration = Duration::from_millis(500);

/// Projection of a `Credential` with its key masked, returned by
/// `get_all_keys`. Never round-trips back into storage.
#[derive(Debug, Clone, Serialize)]
pub struct CredentialView {
    pub id: String,
    pub masked_key: String,
    pub base_url: String,
    pub name: String,
    pub enabled: bool,
    pub healthy: bool,
    pub weight: u32,
    pub priority: i32,
    pub total_requests: u64,
    pub failed_requests: u64,
    pub last_check: Option<chrono::DateTime<Utc>>,
    pub last_used: Option<chrono::DateTime<Utc>>,
    pub last_error: Option<String>,
}

impl From<&Credential> for CredentialView {
    fn from(c: &Credential) -> Self {
        Self {
            id: c.id.clone(),
            masked_key: mask_key(&c.key),
            base_url: c.base_url.clone(),
            name: c.name.clone(),
            enabled: c.enabled,
            healthy: c.healthy,
            weight: c.weight,
            priority: c.priority,
            total_requests: c.total_requests,
            failed_requests: c.failed_requests,
            last_check: c.last_check,
            last_used: c.last_used,
            last_error: c.last_error.clone(),
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct PersistedKeys {
    #[serde(default)]
    keys: Vec<Credential>,
    #[serde(default)]
    current_index: usize,
}

#[derive(Default)]
struct State {
    credentials: Vec<Credential>,
    cursor: usize,
}

/// Result of `add_key`.
pub struct AddKeyOutcome {
    pub credential: Credential,
    pub duplicate: bool,
}

/// Result of `batch_import`.
#[derive(Debug, Default, Serialize)]
pub struct BatchImportOutcome {
    pub added: Vec<Credential>,
    pub duplicates: Vec<String>,
    pub errors: Vec<String>,
}

fn snapshot_json(state: &Arc<RwLock<State>>) -> serde_json::Value {
    let state = state.read().expect("lock poisoned");
    json!(PersistedKeys {
        keys: state.credentials.clone(),
        current_index: state.cursor,
    })
}

pub struct CredentialRegistry {
    state: Arc<RwLock<State>>,
    http: Client,
    store: Option<DebouncedJsonStore>,
    /// Bumped on every mutation; `get_all_keys`/`get_summary` memoize on it.
    version: AtomicU64,
    cache: RwLock<Option<(u64, Arc<Vec<CredentialView>>)>>,
    summary_cache: RwLock<Option<(u64, CredentialSummary)>>,
}

impl CredentialRegistry {
    #[must_use]
    pub fn new(http: Client) -> Self {
        Self {
            state: Arc::new(RwLock::new(State::default())),
            http,
            store: None,
            version: AtomicU64::new(0),
            cache: RwLock::new(None),
            summary_cache: RwLock::new(None),
        }
    }

    /// Load persisted credentials from `path` and wire up debounced
    /// write-behind for subsequent mutations.
    pub async fn with_persistence(http: Client, path: std::path::PathBuf) -> Result<Self, RegistryError> {
        let persisted: PersistedKeys = o2o_persist::read_json(&path).await?;
        let state = Arc::new(RwLock::new(State {
            credentials: persisted.keys,
            cursor: persisted.current_index,
        }));
        let store_state = state.clone();
        let store = DebouncedJsonStore::new(path, PERSIST_DEBOUNCE, move || snapshot_json(&store_state));
        Ok(Self {
            state,
            http,
            store: Some(store),
            version: AtomicU64::new(0),
            cache: RwLock::new(None),
            summary_cache: RwLock::new(None),
        })
    }

    /// Force the current state to disk immediately, bypassing the debounce.
    /// Called on graceful shutdown.
    pub async fn flush(&self) {
        if let Some(store) = &self.store {
            if let Err(err) = store.flush().await {
                tracing::warn!(%err, "failed to flush credential registry state");
            }
        }
    }

    fn bump(&self) {
        self.version.fetch_add(1, Ordering::SeqCst);
        if let Some(store) = &self.store {
            store.mark_dirty();
        }
    }

    /// Parse one key-string line, producing a fresh `Credential`.
    pub fn parse_key_string(raw: &str, default_base_url: &str) -> Result<Credential, RegistryError> {
        let parsed = parse_key_string(raw, default_base_url)?;
        let id = crate::ids::registry_id();
        Ok(Credential::new(id, parsed.key, parsed.base_url, String::new(), Utc::now()))
    }

    /// Add one credential, persisting on success. Returns `duplicate: true`
    /// without mutating state when `(key, base_url)` already exists.
    pub fn add_key(&self, raw: &str, default_base_url: &str) -> Result<AddKeyOutcome, RegistryError> {
        let candidate = Self::parse_key_string(raw, default_base_url)?;
        let mut state = self.state.write().expect("lock poisoned");
        if let Some(existing) = state
            .credentials
            .iter()
            .find(|c| c.is_duplicate_of(&candidate.key, &candidate.base_url))
        {
            return Ok(AddKeyOutcome { credential: existing.clone(), duplicate: true });
        }
        state.credentials.push(candidate.clone());
        drop(state);
        self.bump();
        Ok(AddKeyOutcome { credential: candidate, duplicate: false })
    }

    /// Split `text` on any of `\n , ;`, ignore blank/`#`-prefixed lines,
    /// dedupe against existing *and* newly-added entries, and persist once.
    pub fn batch_import(&self, text: &str, default_base_url: &str) -> BatchImportOutcome {
        let mut outcome = BatchImportOutcome::default();
        let mut seen: HashSet<(String, String)> = HashSet::new();
        {
            let state = self.state.read().expect("lock poisoned");
            for c in &state.credentials {
                seen.insert((c.key.clone(), c.base_url.clone()));
            }
        }

        let mut new_credentials = Vec::new();
        for raw_line in text.split(['\n', ',', ';']) {
            let line = raw_line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            match Self::parse_key_string(line, default_base_url) {
                Ok(candidate) => {
                    let dedupe_key = (candidate.key.clone(), candidate.base_url.clone());
                    if seen.contains(&dedupe_key) {
                        outcome.duplicates.push(line.to_string());
                        continue;
                    }
                    seen.insert(dedupe_key);
                    outcome.added.push(candidate.clone());
                    new_credentials.push(candidate);
                }
                Err(err) => outcome.errors.push(format!("{line}: {err}")),
            }
        }

        if !new_credentials.is_empty() {
            let mut state = self.state.write().expect("lock poisoned");
            state.credentials.extend(new_credentials);
            drop(state);
            self.bump();
        }
        outcome
    }

    pub fn remove_key(&self, id: &str) -> bool {
        let mut state = self.state.write().expect("lock poisoned");
        let before = state.credentials.len();
        state.credentials.retain(|c| c.id != id);
        let removed = state.credentials.len() != before;
        if removed && state.cursor > state.credentials.len() {
            state.cursor = 0;
        }
        drop(state);
        if removed {
            self.bump();
        }
        removed
    }

    pub fn toggle_key(&self, id: &str) -> Option<Credential> {
        let mut state = self.state.write().expect("lock poisoned");
        let cred = state.credentials.iter_mut().find(|c| c.id == id)?;
        cred.enabled = !cred.enabled;
        let out = cred.clone();
        drop(state);
        self.bump();
        Some(out)
    }

    pub fn clear_all(&self) {
        let mut state = self.state.write().expect("lock poisoned");
        state.credentials.clear();
        state.cursor = 0;
        drop(state);
        self.bump();
    }

    pub fn reset_health(&self) {
        let mut state = self.state.write().expect("lock poisoned");
        for c in &mut state.credentials {
            c.healthy = true;
            c.last_error = None;
        }
        drop(state);
        self.bump();
    }

    /// Flat round-robin regime: pool is enabled+healthy credentials,
    /// falling back to enabled-only if that pool is empty.
    /// Single cursor mutation per call; clamped if the pool shrinks.
    pub fn get_next_key(&self) -> Option<Credential> {
        let mut state = self.state.write().expect("lock poisoned");
        let mut pool: Vec<usize> = state
            .credentials
            .iter()
            .enumerate()
            .filter(|(_, c)| c.enabled && c.healthy)
            .map(|(i, _)| i)
            .collect();
        if pool.is_empty() {
            pool = state
                .credentials
                .iter()
                .enumerate()
                .filter(|(_, c)| c.enabled)
                .map(|(i, _)| i)
                .collect();
        }
        if pool.is_empty() {
            return None;
        }
        if state.cursor >= pool.len() {
            state.cursor = 0;
        }
        let idx = pool[state.cursor];
        state.cursor = (state.cursor + 1) % pool.len();
        Some(state.credentials[idx].clone())
    }

    pub fn record_success(&self, id: &str) {
        let mut state = self.state.write().expect("lock poisoned");
        if let Some(c) = state.credentials.iter_mut().find(|c| c.id == id) {
            c.record_success(Utc::now());
        }
        drop(state);
        self.bump();
    }

    pub fn record_failure(&self, id: &str, err: &str) {
        let mut state = self.state.write().expect("lock poisoned");
        if let Some(c) = state.credentials.iter_mut().find(|c| c.id == id) {
            c.record_failure(err, Utc::now());
        }
        drop(state);
        self.bump();
    }

    fn get(&self, id: &str) -> Option<Credential> {
        self.state
            .read()
            .expect("lock poisoned")
            .credentials
            .iter()
            .find(|c| c.id == id)
            .cloned()
    }

    /// Active probe: GET `<baseUrl>/tags` (with `/api` inserted per
    /// `build_target_url` when absent) with a 10-second abort.
    pub async fn check_key_health(&self, id: &str) {
        let Some(credential) = self.get(id) else { return };
        let url = build_target_url(&credential.base_url, "/tags");

        let mut req = self.http.get(&url).timeout(HEALTH_CHECK_TIMEOUT);
        if !credential.key.is_empty() {
            req = req.bearer_auth(&credential.key);
        }

        let (healthy, last_error) = match req.send().await {
            Ok(resp) if resp.status().is_success() => (true, None),
            Ok(resp) => (false, Some(format!("HTTP {}", resp.status().as_u16()))),
            Err(err) if err.is_timeout() => (false, Some("Health check timeout (10s)".to_string())),
            Err(err) => (false, Some(err.to_string())),
        };

        let mut state = self.state.write().expect("lock poisoned");
        if let Some(c) = state.credentials.iter_mut().find(|c| c.id == id) {
            c.healthy = healthy;
            c.last_error = last_error;
            c.last_check = Some(Utc::now());
        }
        drop(state);
        self.bump();
    }

    /// Probe every credential in parallel, awaiting all of them.
    pub async fn check_all_health(&self) {
        let ids: Vec<String> = self
            .state
            .read()
            .expect("lock poisoned")
            .credentials
            .iter()
            .map(|c| c.id.clone())
            .collect();
        let checks = ids.iter().map(|id| self.check_key_health(id));
        futures_util::future::join_all(checks).await;
    }

    /// Masked-key projection of every credential, memoized until the next mutation.
    pub fn get_all_keys(&self) -> Arc<Vec<CredentialView>> {
        let version = self.version.load(Ordering::SeqCst);
        if let Some((cached_version, cached)) = self.cache.read().expect("lock poisoned").as_ref() {
            if *cached_version == version {
                return cached.clone();
            }
        }
        let views: Vec<CredentialView> = self
            .state
            .read()
            .expect("lock poisoned")
            .credentials
            .iter()
            .map(CredentialView::from)
            .collect();
        let views = Arc::new(views);
        *self.cache.write().expect("lock poisoned") = Some((version, views.clone()));
        views
    }

    /// `{total, enabled, healthy, disabled, unhealthy}`, single-pass and memoized.
    pub fn get_summary(&self) -> CredentialSummary {
        let version = self.version.load(Ordering::SeqCst);
        if let Some((cached_version, cached)) = *self.summary_cache.read().expect("lock poisoned") {
            if cached_version == version {
                return cached;
            }
        }
        let state = self.state.read().expect("lock poisoned");
        let mut summary = CredentialSummary::default();
        summary.total = state.credentials.len();
        for c in &state.credentials {
            if c.enabled {
                summary.enabled += 1;
                if c.healthy {
                    summary.healthy += 1;
                } else {
                    summary.unhealthy += 1;
                }
            } else {
                summary.disabled += 1;
            }
        }
        drop(state);
        *self.summary_cache.write().expect("lock poisoned") = Some((version, summary));
        summary
    }

    pub fn all(&self) -> Vec<Credential> {
        self.state.read().expect("lock poisoned").credentials.clone()
    }

    pub fn len(&self) -> usize {
        self.state.read().expect("lock poisoned").credentials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
