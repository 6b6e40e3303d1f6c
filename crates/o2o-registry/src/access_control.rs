//! Access control registry: wraps `o2o_core::AccessPolicy` with
//! persistence and admin mutation, seeded from `GatewayConfig` at
//! startup and editable afterwards (whitelist/blacklist entry add/remove,
//! mode switch) without a restart.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use o2o_core::{AccessMode, AccessPolicy};
use o2o_persist::DebouncedJsonStore;
use serde_json::json;

const PERSIST_DEBOUNCE: Duration = Duration::from_millis(500);

fn snapshot_json(policy: &Arc<RwLock<AccessPolicy>>) -> serde_json::Value {
    let policy = policy.read().expect("lock poisoned").clone();
    json!(policy)
}

pub struct AccessControlRegistry {
    policy: Arc<RwLock<AccessPolicy>>,
    store: Option<DebouncedJsonStore>,
}

impl AccessControlRegistry {
    #[must_use]
    pub fn new(seed: AccessPolicy) -> Self {
        Self { policy: Arc::new(RwLock::new(seed)), store: None }
    }

    /// Load persisted overrides if present; otherwise fall back to `seed`
    /// (the env-derived policy from `GatewayConfig`).
    pub async fn with_persistence(
        seed: AccessPolicy,
        path: std::path::PathBuf,
    ) -> Result<Self, o2o_persist::PersistError> {
        let persisted: Option<AccessPolicy> = match o2o_persist::read_json::<PersistedOrEmpty>(&path).await? {
            PersistedOrEmpty::Policy(p) => Some(p),
            PersistedOrEmpty::Empty {} => None,
        };
        let policy = Arc::new(RwLock::new(persisted.unwrap_or(seed)));
        let store_policy = policy.clone();
        let store = DebouncedJsonStore::new(path, PERSIST_DEBOUNCE, move || snapshot_json(&store_policy));
        Ok(Self { policy, store: Some(store) })
    }

    pub async fn flush(&self) {
        if let Some(store) = &self.store {
            if let Err(err) = store.flush().await {
                tracing::warn!(%err, "failed to flush access control state");
            }
        }
    }

    fn bump(&self) {
        if let Some(store) = &self.store {
            store.mark_dirty();
        }
    }

    #[must_use]
    pub fn is_allowed(&self, raw_ip: &str) -> bool {
        self.policy.read().expect("lock poisoned").is_allowed(raw_ip)
    }

    #[must_use]
    pub fn snapshot(&self) -> AccessPolicy {
        self.policy.read().expect("lock poisoned").clone()
    }

    pub fn set_mode(&self, mode: AccessMode) {
        self.policy.write().expect("lock poisoned").mode = mode;
        self.bump();
    }

    pub fn add_whitelist_entry(&self, entry: String) {
        let mut policy = self.policy.write().expect("lock poisoned");
        if !policy.whitelist.contains(&entry) {
            policy.whitelist.push(entry);
        }
        drop(policy);
        self.bump();
    }

    pub fn remove_whitelist_entry(&self, entry: &str) {
        self.policy.write().expect("lock poisoned").whitelist.retain(|e| e != entry);
        self.bump();
    }

    pub fn add_blacklist_entry(&self, entry: String) {
        let mut policy = self.policy.write().expect("lock poisoned");
        if !policy.blacklist.contains(&entry) {
            policy.blacklist.push(entry);
        }
        drop(policy);
        self.bump();
    }

    pub fn remove_blacklist_entry(&self, entry: &str) {
        self.policy.write().expect("lock poisoned").blacklist.retain(|e| e != entry);
        self.bump();
    }
}

/// `read_json` needs a `Default`-able type; a bare `AccessPolicy` already
/// derives `Default`, but we distinguish "file absent" from "file holds an
/// explicit disabled policy" so a first-run seed from env isn't clobbered.
#[derive(Debug, serde::Deserialize)]
#[serde(untagged)]
enum PersistedOrEmpty {
    Policy(AccessPolicy),
    Empty {},
}

impl Default for PersistedOrEmpty {
    fn default() -> Self {
        Self::Empty {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seed_policy_governs_until_mutated() {
        let seed = AccessPolicy { mode: AccessMode::Whitelist, whitelist: vec!["1.2.3.4".into()], blacklist: vec![] };
        let reg = AccessControlRegistry::new(seed);
        assert!(reg.is_allowed("1.2.3.4"));
        assert!(!reg.is_allowed("9.9.9.9"));
    }

    #[test]
    fn add_and_remove_whitelist_entry() {
        let reg = AccessControlRegistry::new(AccessPolicy { mode: AccessMode::Whitelist, ..Default::default() });
        reg.add_whitelist_entry("5.6.7.8".to_string());
        assert!(reg.is_allowed("5.6.7.8"));
        reg.remove_whitelist_entry("5.6.7.8");
        assert!(!reg.is_allowed("5.6.7.8"));
    }

    #[test]
    fn mode_switch_takes_effect_immediately() {
        let reg = AccessControlRegistry::new(AccessPolicy::default());
        reg.add_blacklist_entry("9.9.9.9".to_string());
        assert!(reg.is_allowed("9.9.9.9"));
        reg.set_mode(AccessMode::Blacklist);
        assert!(!reg.is_allowed("9.9.9.9"));
    }
}
