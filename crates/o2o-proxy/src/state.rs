//! Shared application state, injected into every handler via axum's
//! `State` extractor.

use std::sync::Arc;

use o2o_core::config::GatewayConfig;
use o2o_core::ports::{GatewayLogger, MetricsSink, ResponseCache};
use o2o_registry::{
    AccessControlRegistry, ChannelRegistry, CredentialRegistry, RateLimiter, StatsRegistry, TokenRegistry,
};
use reqwest::Client;

/// Everything a request handler needs: the stateful registries, the
/// outbound HTTP client, the resolved configuration and the three
/// injected ports. Cheap to clone — every field is an `Arc` (or the
/// registries themselves are internally lock-guarded and held behind one).
#[derive(Clone)]
pub struct AppState(Arc<Inner>);

pub struct Inner {
    pub config: GatewayConfig,
    pub http: Client,
    pub credentials: CredentialRegistry,
    pub channels: ChannelRegistry,
    pub tokens: TokenRegistry,
    pub rate_limiter: Arc<RateLimiter>,
    pub access: AccessControlRegistry,
    pub stats: StatsRegistry,
    pub cache: Arc<dyn ResponseCache>,
    pub metrics: Arc<dyn MetricsSink>,
    pub logger: Arc<dyn GatewayLogger>,
}

impl std::ops::Deref for AppState {
    type Target = Inner;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AppState {
    #[must_use]
    pub fn new(
        config: GatewayConfig,
        http: Client,
        credentials: CredentialRegistry,
        channels: ChannelRegistry,
        tokens: TokenRegistry,
        rate_limiter: Arc<RateLimiter>,
        access: AccessControlRegistry,
        stats: StatsRegistry,
        cache: Arc<dyn ResponseCache>,
        metrics: Arc<dyn MetricsSink>,
        logger: Arc<dyn GatewayLogger>,
    ) -> Self {
        Self(Arc::new(Inner {
            config,
            http,
            credentials,
            channels,
            tokens,
            rate_limiter,
            access,
            stats,
            cache,
            metrics,
            logger,
        }))
    }

    /// Flush every registry's pending debounced write. Called on graceful
    /// shutdown so no mutation is lost.
    pub async fn flush_all(&self) {
        self.credentials.flush().await;
        self.channels.flush().await;
        self.tokens.flush().await;
        self.access.flush().await;
        self.stats.flush().await;
    }
}
