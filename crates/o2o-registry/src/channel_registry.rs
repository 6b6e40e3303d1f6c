//! Channel registry: optional named groupings of credentials sharing a
//! base URL, model allow-list and remap table.
//!
//! When the registry holds zero channels the Selector falls back to the
//! flat credential regime (`CredentialRegistry::get_next_key`) — this
//! registry only needs to answer "do any channels exist" and otherwise
//! behave like a small CRUD store plus concurrency-slot bookkeeping.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use o2o_core::Channel;
use o2o_persist::DebouncedJsonStore;
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::json;

const PERSIST_DEBOUNCE: Duration = Duration::from_millis(500);

#[derive(Debug, Default, Serialize, Deserialize)]
struct PersistedChannels {
    #[serde(default)]
    channels: Vec<Channel>,
}

fn snapshot_json(channels: &Arc<RwLock<Vec<Channel>>>) -> serde_json::Value {
    let channels = channels.read().expect("lock poisoned").clone();
    json!(PersistedChannels { channels })
}

pub struct ChannelRegistry {
    channels: Arc<RwLock<Vec<Channel>>>,
    store: Option<DebouncedJsonStore>,
    version: AtomicU64,
}

impl ChannelRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self {
            channels: Arc::new(RwLock::new(Vec::new())),
            store: None,
            version: AtomicU64::new(0),
        }
    }

    pub async fn with_persistence(path: std::path::PathBuf) -> Result<Self, o2o_persist::PersistError> {
        let persisted: PersistedChannels = o2o_persist::read_json(&path).await?;
        let channels = Arc::new(RwLock::new(persisted.channels));
        let store_channels = channels.clone();
        let store = DebouncedJsonStore::new(path, PERSIST_DEBOUNCE, move || snapshot_json(&store_channels));
        Ok(Self { channels, store: Some(store), version: AtomicU64::new(0) })
    }

    pub async fn flush(&self) {
        if let Some(store) = &self.store {
            if let Err(err) = store.flush().await {
                tracing::warn!(%err, "failed to flush channel registry state");
            }
        }
    }

    fn bump(&self) {
        self.version.fetch_add(1, Ordering::SeqCst);
        if let Some(store) = &self.store {
            store.mark_dirty();
        }
    }

    #[must_use]
    pub fn has_channels(&self) -> bool {
        !self.channels.read().expect("lock poisoned").is_empty()
    }

    pub fn add(&self, channel: Channel) {
        self.channels.write().expect("lock poisoned").push(channel);
        self.bump();
    }

    pub fn remove(&self, id: &str) -> bool {
        let mut channels = self.channels.write().expect("lock poisoned");
        let before = channels.len();
        channels.retain(|c| c.id != id);
        let removed = channels.len() != before;
        drop(channels);
        if removed {
            self.bump();
        }
        removed
    }

    pub fn all(&self) -> Vec<Channel> {
        self.channels.read().expect("lock poisoned").clone()
    }

    /// Eligible channels for `model`: enabled, healthy, under its
    /// concurrency cap, and model-permitted.
    pub fn eligible_for(&self, model: &str) -> Vec<Channel> {
        self.channels
            .read()
            .expect("lock poisoned")
            .iter()
            .filter(|c| c.enabled && c.healthy && c.has_capacity() && c.permits_model(model))
            .cloned()
            .collect()
    }

    /// Pick an eligible channel for `model` (highest priority, weighted
    /// pick among ties) and its next round-robin credential id, acquiring
    /// the channel's concurrency slot, all under one write-lock hold —
    /// the same check-and-increment-atomically shape as
    /// `CredentialRegistry::get_next_key`, so two concurrent selections
    /// can't both pass the capacity check before either increments it.
    pub fn select_and_acquire(&self, model: &str) -> Option<(Channel, String)> {
        let mut channels = self.channels.write().expect("lock poisoned");

        let eligible: Vec<(usize, Channel)> = channels
            .iter()
            .enumerate()
            .filter(|(_, c)| c.enabled && c.healthy && c.has_capacity() && c.permits_model(model))
            .map(|(i, c)| (i, c.clone()))
            .collect();
        if eligible.is_empty() {
            return None;
        }

        let top_priority = eligible.iter().map(|(_, c)| c.priority).max()?;
        let candidates: Vec<(usize, Channel)> =
            eligible.into_iter().filter(|(_, c)| c.priority == top_priority).collect();

        let (chosen_idx, _) = if candidates.len() == 1 {
            candidates.into_iter().next().unwrap()
        } else {
            weighted_pick(&candidates)
        };

        let chosen = &mut channels[chosen_idx];
        if chosen.credential_ids.is_empty() {
            return None;
        }
        if chosen.cursor >= chosen.credential_ids.len() {
            chosen.cursor = 0;
        }
        let credential_id = chosen.credential_ids[chosen.cursor].clone();
        chosen.cursor = (chosen.cursor + 1) % chosen.credential_ids.len();
        chosen.current_concurrent += 1;
        let result = chosen.clone();

        drop(channels);
        self.bump();
        Some((result, credential_id))
    }

    /// Apply a mutation to one channel by id, persisting the result.
    fn mutate<R>(&self, id: &str, f: impl FnOnce(&mut Channel) -> R) -> Option<R> {
        let mut channels = self.channels.write().expect("lock poisoned");
        let out = channels.iter_mut().find(|c| c.id == id).map(f);
        drop(channels);
        if out.is_some() {
            self.bump();
        }
        out
    }

    /// Advance the per-channel round-robin cursor and return the picked
    /// credential id, if the channel has any.
    pub fn next_credential_id(&self, channel_id: &str) -> Option<String> {
        self.mutate(channel_id, |c| {
            if c.credential_ids.is_empty() {
                return None;
            }
            if c.cursor >= c.credential_ids.len() {
                c.cursor = 0;
            }
            let id = c.credential_ids[c.cursor].clone();
            c.cursor = (c.cursor + 1) % c.credential_ids.len();
            Some(id)
        })
        .flatten()
    }

    /// `currentConcurrent += 1` at selection time.
    pub fn acquire_slot(&self, channel_id: &str) {
        self.mutate(channel_id, |c| c.current_concurrent += 1);
    }

    /// `currentConcurrent -= 1`, exactly once, at relay finish/failure.
    pub fn release_slot(&self, channel_id: &str) {
        self.mutate(channel_id, |c| {
            c.current_concurrent = c.current_concurrent.saturating_sub(1);
        });
    }

    pub fn record_success(&self, channel_id: &str) {
        self.mutate(channel_id, |c| {
            c.total_requests += 1;
            c.healthy = true;
        });
    }

    pub fn record_failure(&self, channel_id: &str) {
        self.mutate(channel_id, |c| {
            c.total_requests += 1;
            c.failed_requests += 1;
            if c.should_quarantine() {
                c.healthy = false;
            }
        });
    }
}

impl Default for ChannelRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Uniform `r in [0, sum_weight)`, scan and select where the running sum
/// first passes `r`.
fn weighted_pick(candidates: &[(usize, Channel)]) -> (usize, Channel) {
    let total_weight: u64 = candidates.iter().map(|(_, c)| u64::from(c.weight.max(1))).sum();
    let mut r = rand::thread_rng().gen_range(0..total_weight.max(1));
    for (idx, c) in candidates {
        let w = u64::from(c.weight.max(1));
        if r < w {
            return (*idx, c.clone());
        }
        r -= w;
    }
    candidates.last().expect("candidates non-empty").clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn channel(id: &str, priority: i32, weight: u32) -> Channel {
        Channel {
            id: id.to_string(),
            name: id.to_string(),
            base_url: "https://x".to_string(),
            enabled: true,
            healthy: true,
            credential_ids: vec!["c1".to_string(), "c2".to_string()],
            models: vec![],
            model_mapping: HashMap::new(),
            priority,
            weight,
            max_concurrent: 0,
            current_concurrent: 0,
            total_requests: 0,
            failed_requests: 0,
            cursor: 0,
        }
    }

    #[test]
    fn round_robin_within_channel() {
        let reg = ChannelRegistry::new();
        reg.add(channel("ch1", 0, 10));
        let first = reg.next_credential_id("ch1").unwrap();
        let second = reg.next_credential_id("ch1").unwrap();
        let third = reg.next_credential_id("ch1").unwrap();
        assert_ne!(first, second);
        assert_eq!(first, third);
    }

    #[test]
    fn concurrency_slot_bookkeeping() {
        let reg = ChannelRegistry::new();
        reg.add(channel("ch1", 0, 10));
        reg.acquire_slot("ch1");
        reg.acquire_slot("ch1");
        reg.release_slot("ch1");
        let ch = reg.all().into_iter().find(|c| c.id == "ch1").unwrap();
        assert_eq!(ch.current_concurrent, 1);
    }

    #[test]
    fn auto_quarantine_matches_credential_rule() {
        let reg = ChannelRegistry::new();
        reg.add(channel("ch1", 0, 10));
        for _ in 0..6 {
            reg.record_failure("ch1");
        }
        let ch = reg.all().into_iter().find(|c| c.id == "ch1").unwrap();
        assert!(!ch.healthy);
    }
}
