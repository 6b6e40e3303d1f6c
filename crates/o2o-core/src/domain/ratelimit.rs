//! Rate-limit bucket domain type: a bounded list of recent request timestamps.

use serde::{Deserialize, Serialize};

/// Per-key sliding-window state. `timestamps` holds monotonic millisecond
/// instants, always `> now - window_ms` as an invariant maintained by the
/// owning rate limiter.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RateLimitBucket {
    pub timestamps_ms: Vec<i64>,
}

impl RateLimitBucket {
    /// Drop entries at or before `now_ms - window_ms`.
    pub fn evict(&mut self, now_ms: i64, window_ms: i64) {
        let threshold = now_ms - window_ms;
        self.timestamps_ms.retain(|&ts| ts > threshold);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.timestamps_ms.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.timestamps_ms.is_empty()
    }

    /// Oldest remaining timestamp, used to compute `retryAfter`.
    #[must_use]
    pub fn oldest(&self) -> Option<i64> {
        self.timestamps_ms.first().copied()
    }

    pub fn push(&mut self, now_ms: i64) {
        self.timestamps_ms.push(now_ms);
    }
}
