//! Daily per-backend success/failure history, persisted to `stats.json`
//! and trimmed to a 30-day retention window on every mutation.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use chrono::Utc;
use o2o_core::BackendStats;
use o2o_persist::DebouncedJsonStore;
use serde_json::json;

const PERSIST_DEBOUNCE: Duration = Duration::from_millis(500);
const RETAIN_DAYS: u32 = 30;

fn snapshot_json(stats: &Arc<RwLock<BackendStats>>) -> serde_json::Value {
    let stats = stats.read().expect("lock poisoned").clone();
    json!(stats)
}

pub struct StatsRegistry {
    stats: Arc<RwLock<BackendStats>>,
    store: Option<DebouncedJsonStore>,
}

impl StatsRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self { stats: Arc::new(RwLock::new(BackendStats::default())), store: None }
    }

    pub async fn with_persistence(path: std::path::PathBuf) -> Result<Self, o2o_persist::PersistError> {
        let stats: BackendStats = o2o_persist::read_json(&path).await?;
        let stats = Arc::new(RwLock::new(stats));
        let store_stats = stats.clone();
        let store = DebouncedJsonStore::new(path, PERSIST_DEBOUNCE, move || snapshot_json(&store_stats));
        Ok(Self { stats, store: Some(store) })
    }

    pub async fn flush(&self) {
        if let Some(store) = &self.store {
            if let Err(err) = store.flush().await {
                tracing::warn!(%err, "failed to flush backend stats");
            }
        }
    }

    fn bump(&self) {
        if let Some(store) = &self.store {
            store.mark_dirty();
        }
    }

    pub fn record_success(&self, id: &str) {
        let now = Utc::now();
        let mut stats = self.stats.write().expect("lock poisoned");
        stats.record_success(id, now);
        stats.trim_older_than(RETAIN_DAYS, now);
        drop(stats);
        self.bump();
    }

    pub fn record_failure(&self, id: &str) {
        let now = Utc::now();
        let mut stats = self.stats.write().expect("lock poisoned");
        stats.record_failure(id, now);
        stats.trim_older_than(RETAIN_DAYS, now);
        drop(stats);
        self.bump();
    }

    #[must_use]
    pub fn snapshot(&self) -> BackendStats {
        self.stats.read().expect("lock poisoned").clone()
    }
}

impl Default for StatsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_accumulate_under_todays_date() {
        let reg = StatsRegistry::new();
        reg.record_success("cred-1");
        reg.record_success("cred-1");
        reg.record_failure("cred-1");
        let snap = reg.snapshot();
        let today = Utc::now().date_naive().to_string();
        let outcome = snap.by_date.get(&today).unwrap().get("cred-1").unwrap();
        assert_eq!(outcome.success, 2);
        assert_eq!(outcome.fail, 1);
    }
}
