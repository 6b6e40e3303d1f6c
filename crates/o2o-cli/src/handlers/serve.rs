//! Serve command handler: binds the configured port and runs the gateway
//! until Ctrl-C. The daemon lifecycle itself is delegated to the crate
//! that owns it (`o2o_proxy::serve`) rather than reimplemented here.

use anyhow::Result;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::bootstrap::CliContext;

/// An explicit `--port` override takes precedence over the configured default.
fn resolve_port(ctx: &CliContext, port: Option<u16>) -> u16 {
    port.unwrap_or(ctx.config.port)
}

pub async fn execute(ctx: &CliContext, port: Option<u16>) -> Result<()> {
    let port = resolve_port(ctx, port);
    let listener = TcpListener::bind(("0.0.0.0", port)).await?;

    println!("o2o gateway listening on http://0.0.0.0:{port}");
    println!("Press Ctrl+C to stop");

    let cancel = CancellationToken::new();
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        shutdown.cancel();
    });

    o2o_proxy::serve(listener, ctx.state.clone(), cancel).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use o2o_core::config::{GatewayConfig, RateLimitConfig};
    use o2o_core::domain::access::{AccessMode, AccessPolicy};
    use o2o_core::ports::{NoopLogger, NoopMetrics, NoopResponseCache};
    use o2o_proxy::AppState;
    use o2o_registry::{AccessControlRegistry, ChannelRegistry, CredentialRegistry, RateLimiter, StatsRegistry, TokenRegistry};

    use super::*;

    fn disabled_rate_limit() -> RateLimitConfig {
        RateLimitConfig { enabled: false, max_requests: 0, window_ms: 0 }
    }

    fn test_ctx(configured_port: u16) -> CliContext {
        let config = GatewayConfig {
            port: configured_port,
            api_token: None,
            admin_password: None,
            ollama_base_url: "http://127.0.0.1:0".to_string(),
            connect_timeout: Duration::from_secs(1),
            request_timeout: Duration::from_secs(1),
            max_retries: 0,
            health_check_interval: None,
            rate_limit_global: disabled_rate_limit(),
            rate_limit_ip: disabled_rate_limit(),
            rate_limit_token: disabled_rate_limit(),
            ip_access_mode: AccessMode::Disabled,
            ip_whitelist: Vec::new(),
            ip_blacklist: Vec::new(),
            log_level: "info".to_string(),
            trust_proxy: false,
        };
        let state = AppState::new(
            config.clone(),
            reqwest::Client::new(),
            CredentialRegistry::new(reqwest::Client::new()),
            ChannelRegistry::new(),
            TokenRegistry::new(),
            RateLimiter::new(config.rate_limit_global, config.rate_limit_ip, config.rate_limit_token),
            AccessControlRegistry::new(AccessPolicy { mode: config.ip_access_mode, whitelist: Vec::new(), blacklist: Vec::new() }),
            StatsRegistry::new(),
            Arc::new(NoopResponseCache),
            Arc::new(NoopMetrics),
            Arc::new(NoopLogger),
        );
        CliContext { config, state }
    }

    #[test]
    fn resolve_port_prefers_explicit_override_over_configured_default() {
        let ctx = test_ctx(8080);
        assert_eq!(resolve_port(&ctx, Some(9090)), 9090);
    }

    #[test]
    fn resolve_port_falls_back_to_configured_default() {
        let ctx = test_ctx(8080);
        assert_eq!(resolve_port(&ctx, None), 8080);
    }

    #[tokio::test]
    async fn execute_binds_an_ephemeral_port_and_reports_the_actual_address() {
        let ctx = test_ctx(0);
        let listener = TcpListener::bind(("0.0.0.0", resolve_port(&ctx, None))).await.unwrap();
        assert_ne!(listener.local_addr().unwrap().port(), 0);
    }
}
