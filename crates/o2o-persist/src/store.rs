//! A single whole-file JSON store with debounced write-behind. Every
//! mutation to the in-memory state the store watches should call
//! `mark_dirty`; the background task coalesces bursts of mutations into
//! one rewrite every `debounce` interval. `shutdown` forces a final
//! synchronous flush.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

use crate::error::PersistError;

/// Read a JSON file into `T`, or `T::default()` if the file doesn't exist yet.
pub async fn read_json<T: DeserializeOwned + Default>(path: &Path) -> Result<T, PersistError> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(T::default()),
        Err(err) => Err(err.into()),
    }
}

async fn write_json(path: &Path, value: &serde_json::Value) -> Result<(), PersistError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let pretty = serde_json::to_string_pretty(value)?;
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, pretty.as_bytes()).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

/// Debounced write-behind JSON file. Construct one per persisted file
/// (`keys.json`, `channels.json`, ...); the `snapshot` closure produces the
/// current value to serialize, typically by reading a shared `RwLock` the
/// owning registry also mutates.
pub struct DebouncedJsonStore {
    path: PathBuf,
    notify: Arc<Notify>,
    snapshot: Arc<dyn Fn() -> serde_json::Value + Send + Sync>,
    handle: JoinHandle<()>,
}

impl DebouncedJsonStore {
    pub fn new<F>(path: PathBuf, debounce: Duration, snapshot: F) -> Self
    where
        F: Fn() -> serde_json::Value + Send + Sync + 'static,
    {
        let snapshot: Arc<dyn Fn() -> serde_json::Value + Send + Sync> = Arc::new(snapshot);
        let notify = Arc::new(Notify::new());
        let handle = {
            let notify = notify.clone();
            let snapshot = snapshot.clone();
            let path = path.clone();
            tokio::spawn(async move {
                loop {
                    notify.notified().await;
                    tokio::time::sleep(debounce).await;
                    let value = snapshot();
                    if let Err(err) = write_json(&path, &value).await {
                        tracing::warn!(%err, path = %path.display(), "debounced persistence write failed");
                    }
                }
            })
        };
        Self { path, notify, snapshot, handle }
    }

    /// Schedule a coalesced write. Cheap; safe to call on every mutation.
    pub fn mark_dirty(&self) {
        self.notify.notify_one();
    }

    /// Write the current snapshot immediately, bypassing the debounce.
    pub async fn flush(&self) -> Result<(), PersistError> {
        write_json(&self.path, &(self.snapshot)()).await
    }

    /// Stop the background task and force a final flush.
    pub async fn shutdown(self) {
        self.handle.abort();
        if let Err(err) = self.flush().await {
            tracing::warn!(%err, path = %self.path.display(), "final persistence flush failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn flush_writes_current_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keys.json");
        let store = DebouncedJsonStore::new(path.clone(), Duration::from_millis(500), || {
            json!({"keys": []})
        });
        store.flush().await.unwrap();
        let contents = tokio::fs::read_to_string(&path).await.unwrap();
        assert!(contents.contains("\"keys\""));
        store.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn dirty_write_is_debounced() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("channels.json");
        let counter = Arc::new(AtomicU32::new(0));
        let counter_for_snapshot = counter.clone();
        let store = DebouncedJsonStore::new(path.clone(), Duration::from_millis(500), move || {
            json!({"n": counter_for_snapshot.load(Ordering::SeqCst)})
        });

        counter.store(1, Ordering::SeqCst);
        store.mark_dirty();
        counter.store(2, Ordering::SeqCst);
        store.mark_dirty();

        assert!(!path.exists());
        tokio::time::advance(Duration::from_millis(600)).await;
        tokio::task::yield_now().await;

        let contents = tokio::fs::read_to_string(&path).await.unwrap();
        assert!(contents.contains("\"n\": 2"));
        store.shutdown().await;
    }

    #[tokio::test]
    async fn read_json_missing_file_returns_default() {
        #[derive(Default, serde::Deserialize)]
        struct Empty {
            #[allow(dead_code)]
            #[serde(default)]
            value: u32,
        }
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.json");
        let out: Empty = read_json(&path).await.unwrap();
        assert_eq!(out.value, 0);
    }
}
