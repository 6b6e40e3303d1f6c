//! Response cache port. Construction is out of scope for this crate —
//! only the trait boundary and a no-op default live here.

use async_trait::async_trait;
use serde_json::Value;

/// A keyed cache of OpenAI-shaped response bodies, keyed by a SHA-256 hex
/// digest of `model + normalized input`. Only consulted for non-streaming
/// embeddings and (optionally) non-streaming chat.
#[async_trait]
pub trait ResponseCache: Send + Sync {
    async fn get(&self, key: &str) -> Option<Value>;
    async fn set(&self, key: &str, value: Value);
}

/// Default cache: never hits, never stores. Used when no real cache is
/// configured at the composition root.
#[derive(Debug, Clone, Default)]
pub struct NoopResponseCache;

#[async_trait]
impl ResponseCache for NoopResponseCache {
    async fn get(&self, _key: &str) -> Option<Value> {
        None
    }

    async fn set(&self, _key: &str, _value: Value) {}
}
