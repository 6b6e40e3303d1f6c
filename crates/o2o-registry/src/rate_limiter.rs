//! Sliding-window rate limiting: three independent windows checked in
//! order `global -> ip -> token`, the first denial wins.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use o2o_core::config::RateLimitConfig;
use o2o_core::domain::token::RateLimitOverride;
use o2o_core::RateLimitBucket;
use tokio_util::sync::CancellationToken;

const SWEEP_INTERVAL: Duration = Duration::from_secs(5 * 60);
/// A single key is always allowed, since a global limiter has only one.
const GLOBAL_KEY: &str = "global";

/// Which of the three windows denied a request, surfaced in the
/// `X-RateLimit-Limit` response header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitType {
    Global,
    Ip,
    Token,
}

impl LimitType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Global => "global",
            Self::Ip => "ip",
            Self::Token => "token",
        }
    }
}

/// Outcome of checking all three windows for one request.
#[derive(Debug, Clone, Copy)]
pub enum Decision {
    Allowed,
    Denied { limit_type: LimitType, retry_after_secs: u64 },
}

/// One independent sliding window, keyed by an arbitrary string (an IP, a
/// token id, or a constant for the global window).
struct Window {
    config: RateLimitConfig,
    buckets: RwLock<HashMap<String, (RateLimitBucket, i64)>>,
}

impl Window {
    fn new(config: RateLimitConfig) -> Self {
        Self { config, buckets: RwLock::new(HashMap::new()) }
    }

    /// `consume`: evict expired timestamps, deny if at capacity, else
    /// record `now` and permit.
    fn consume(&self, key: &str, now_ms: i64) -> Decision {
        if !self.config.enabled {
            return Decision::Allowed;
        }
        let window_ms = self.config.window_ms as i64;
        let mut buckets = self.buckets.write().expect("lock poisoned");
        let (bucket, last_seen) = buckets.entry(key.to_string()).or_insert_with(|| (RateLimitBucket::default(), now_ms));
        bucket.evict(now_ms, window_ms);
        if bucket.len() as u32 >= self.config.max_requests {
            let oldest = bucket.oldest().unwrap_or(now_ms);
            let retry_after_ms = (oldest + window_ms - now_ms).max(0);
            let retry_after_secs = (retry_after_ms as f64 / 1000.0).ceil() as u64;
            return Decision::Denied { limit_type: LimitType::Global, retry_after_secs };
        }
        bucket.push(now_ms);
        *last_seen = now_ms;
        Decision::Allowed
    }

    /// Drop per-key entries whose last activity predates `2 * window_ms`.
    fn sweep(&self, now_ms: i64) {
        let window_ms = self.config.window_ms as i64;
        let mut buckets = self.buckets.write().expect("lock poisoned");
        buckets.retain(|_, (_, last_seen)| now_ms - *last_seen <= 2 * window_ms);
    }
}

pub struct RateLimiter {
    global: Window,
    ip: Window,
    token: Window,
    /// Per-token override windows, created lazily the first time a token
    /// carrying a `rate_limit_override` is seen — each token's override may
    /// specify a different cap/window than every other token's, so these
    /// can't share one `Window`'s fixed config the way global/ip/token do.
    token_overrides: RwLock<HashMap<String, Window>>,
    sweep_cancel: CancellationToken,
}

impl RateLimiter {
    #[must_use]
    pub fn new(global: RateLimitConfig, ip: RateLimitConfig, token: RateLimitConfig) -> Arc<Self> {
        let limiter = Arc::new(Self {
            global: Window::new(global),
            ip: Window::new(ip),
            token: Window::new(token),
            token_overrides: RwLock::new(HashMap::new()),
            sweep_cancel: CancellationToken::new(),
        });
        limiter.clone().spawn_sweep();
        limiter
    }

    fn spawn_sweep(self: Arc<Self>) {
        let cancel = self.sweep_cancel.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(SWEEP_INTERVAL);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = interval.tick() => {
                        let now_ms = chrono::Utc::now().timestamp_millis();
                        self.global.sweep(now_ms);
                        self.ip.sweep(now_ms);
                        self.token.sweep(now_ms);
                    }
                }
            }
        });
    }

    pub fn shutdown(&self) {
        self.sweep_cancel.cancel();
    }

    /// Check `global -> ip -> token` in order; the first denial wins.
    /// `token_id` is `None` in legacy shared-secret auth mode, where there
    /// is no per-token identity to key on.
    pub fn consume(&self, ip: &str, token_id: Option<&str>) -> Decision {
        let now_ms = chrono::Utc::now().timestamp_millis();

        if let Decision::Denied { retry_after_secs, .. } = self.global.consume(GLOBAL_KEY, now_ms) {
            return Decision::Denied { limit_type: LimitType::Global, retry_after_secs };
        }
        if let Decision::Denied { retry_after_secs, .. } = self.ip.consume(ip, now_ms) {
            return Decision::Denied { limit_type: LimitType::Ip, retry_after_secs };
        }
        if let Some(token_id) = token_id {
            if let Decision::Denied { retry_after_secs, .. } = self.token.consume(token_id, now_ms) {
                return Decision::Denied { limit_type: LimitType::Token, retry_after_secs };
            }
        }
        Decision::Allowed
    }

    /// A resolved token's own rate-limit override, checked once auth has
    /// identified the token — independent of (and in addition to) the
    /// generic token window `consume` already applied against the raw
    /// bearer string before auth ran.
    pub fn consume_token_override(&self, token_id: &str, override_cfg: RateLimitOverride) -> Decision {
        let now_ms = chrono::Utc::now().timestamp_millis();
        {
            let overrides = self.token_overrides.read().expect("lock poisoned");
            if let Some(window) = overrides.get(token_id) {
                if let Decision::Denied { retry_after_secs, .. } = window.consume(token_id, now_ms) {
                    return Decision::Denied { limit_type: LimitType::Token, retry_after_secs };
                }
                return Decision::Allowed;
            }
        }
        let mut overrides = self.token_overrides.write().expect("lock poisoned");
        let window = overrides.entry(token_id.to_string()).or_insert_with(|| {
            Window::new(RateLimitConfig {
                enabled: true,
                max_requests: override_cfg.max_requests,
                window_ms: override_cfg.window_ms,
            })
        });
        match window.consume(token_id, now_ms) {
            Decision::Denied { retry_after_secs, .. } => {
                Decision::Denied { limit_type: LimitType::Token, retry_after_secs }
            }
            Decision::Allowed => Decision::Allowed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg(max: u32, window_ms: u64) -> RateLimitConfig {
        RateLimitConfig { enabled: true, max_requests: max, window_ms }
    }

    #[tokio::test]
    async fn permits_up_to_max_then_denies() {
        let limiter = RateLimiter::new(cfg(1000, 60_000), cfg(2, 60_000), cfg(1000, 60_000));
        assert!(matches!(limiter.consume("1.2.3.4", None), Decision::Allowed));
        assert!(matches!(limiter.consume("1.2.3.4", None), Decision::Allowed));
        match limiter.consume("1.2.3.4", None) {
            Decision::Denied { limit_type, .. } => assert_eq!(limit_type, LimitType::Ip),
            Decision::Allowed => panic!("expected denial"),
        }
        limiter.shutdown();
    }

    #[tokio::test]
    async fn disabled_window_always_allows() {
        let mut ip_cfg = cfg(1, 60_000);
        ip_cfg.enabled = false;
        let limiter = RateLimiter::new(cfg(1000, 60_000), ip_cfg, cfg(1000, 60_000));
        for _ in 0..5 {
            assert!(matches!(limiter.consume("1.2.3.4", None), Decision::Allowed));
        }
        limiter.shutdown();
    }

    #[tokio::test]
    async fn distinct_keys_tracked_independently() {
        let limiter = RateLimiter::new(cfg(1000, 60_000), cfg(1, 60_000), cfg(1000, 60_000));
        assert!(matches!(limiter.consume("1.1.1.1", None), Decision::Allowed));
        assert!(matches!(limiter.consume("2.2.2.2", None), Decision::Allowed));
        limiter.shutdown();
    }

    #[tokio::test]
    async fn token_window_only_checked_when_token_present() {
        let limiter = RateLimiter::new(cfg(1000, 60_000), cfg(1000, 60_000), cfg(1, 60_000));
        assert!(matches!(limiter.consume("1.1.1.1", Some("tok-a")), Decision::Allowed));
        assert!(matches!(limiter.consume("1.1.1.1", None), Decision::Allowed));
        match limiter.consume("1.1.1.1", Some("tok-a")) {
            Decision::Denied { limit_type, .. } => assert_eq!(limit_type, LimitType::Token),
            Decision::Allowed => panic!("expected denial"),
        }
        limiter.shutdown();
    }

    #[tokio::test]
    async fn token_override_window_is_independent_per_token() {
        let limiter = RateLimiter::new(cfg(1000, 60_000), cfg(1000, 60_000), cfg(1000, 60_000));
        let tight = RateLimitOverride { window_ms: 60_000, max_requests: 1 };
        assert!(matches!(
            limiter.consume_token_override("tok-a", tight),
            Decision::Allowed
        ));
        match limiter.consume_token_override("tok-a", tight) {
            Decision::Denied { limit_type, .. } => assert_eq!(limit_type, LimitType::Token),
            Decision::Allowed => panic!("expected denial"),
        }
        // A different token's override window is unaffected.
        assert!(matches!(
            limiter.consume_token_override("tok-b", tight),
            Decision::Allowed
        ));
        limiter.shutdown();
    }
}
