//! Composition root: the only place credential/channel/token/access
//! registries, the rate limiter, the outbound HTTP client and the
//! injected ports are instantiated and wired into an [`o2o_proxy::AppState`].

use std::sync::Arc;

use anyhow::{Context, Result};
use o2o_core::config::GatewayConfig;
use o2o_core::domain::access::AccessPolicy;
use o2o_core::ports::{GatewayLogger, MetricsSink, NoopMetrics, NoopResponseCache, ResponseCache, TracingLogger};
use o2o_core::paths;
use o2o_registry::{
    AccessControlRegistry, ChannelRegistry, CredentialRegistry, RateLimiter, StatsRegistry, TokenRegistry,
};
use o2o_proxy::AppState;
use reqwest::Client;

const KEYS_FILE: &str = "keys.json";
const CHANNELS_FILE: &str = "channels.json";
const TOKENS_FILE: &str = "tokens.json";
const ACCESS_FILE: &str = "access.json";
const STATS_FILE: &str = "stats.json";

/// Everything a command handler needs: the shared [`AppState`] plus the
/// resolved configuration, handed out separately because most handlers
/// only touch one or two registries and reach them through `state`.
pub struct CliContext {
    pub config: GatewayConfig,
    pub state: AppState,
}

/// Build the data directory (if missing) and wire every registry to its
/// file in it, falling back to in-memory state when the directory can't
/// be resolved or created (e.g. a read-only `$HOME` in a sandboxed run).
pub async fn bootstrap(config: GatewayConfig) -> Result<CliContext> {
    let http = Client::builder()
        .pool_max_idle_per_host(10)
        .build()
        .context("failed to build HTTP client")?;

    let dir = paths::data_dir().context("failed to resolve data directory")?;
    std::fs::create_dir_all(&dir).with_context(|| format!("failed to create {}", dir.display()))?;

    let credentials = CredentialRegistry::with_persistence(http.clone(), dir.join(KEYS_FILE))
        .await
        .context("failed to load credential registry")?;
    let channels = ChannelRegistry::with_persistence(dir.join(CHANNELS_FILE))
        .await
        .context("failed to load channel registry")?;
    let tokens = TokenRegistry::with_persistence(dir.join(TOKENS_FILE))
        .await
        .context("failed to load token registry")?;
    let access_seed = AccessPolicy {
        mode: config.ip_access_mode,
        whitelist: config.ip_whitelist.clone(),
        blacklist: config.ip_blacklist.clone(),
    };
    let access = AccessControlRegistry::with_persistence(access_seed, dir.join(ACCESS_FILE))
        .await
        .context("failed to load access control registry")?;
    let stats = StatsRegistry::with_persistence(dir.join(STATS_FILE))
        .await
        .context("failed to load backend stats registry")?;

    let rate_limiter = RateLimiter::new(config.rate_limit_global, config.rate_limit_ip, config.rate_limit_token);

    let cache: Arc<dyn ResponseCache> = Arc::new(NoopResponseCache);
    let metrics: Arc<dyn MetricsSink> = Arc::new(NoopMetrics);
    let logger: Arc<dyn GatewayLogger> = Arc::new(TracingLogger);

    let state = AppState::new(
        config.clone(), http, credentials, channels, tokens, rate_limiter, access, stats, cache, metrics, logger,
    );

    Ok(CliContext { config, state })
}
