//! Exercises the router's HTTP boundary directly, driving requests
//! through `tower::ServiceExt::oneshot` rather than binding a real socket.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use o2o_core::config::{GatewayConfig, RateLimitConfig};
use o2o_core::domain::access::{AccessMode, AccessPolicy};
use o2o_core::ports::{NoopLogger, NoopMetrics, NoopResponseCache};
use o2o_proxy::AppState;
use o2o_registry::{
    AccessControlRegistry, ChannelRegistry, CredentialRegistry, RateLimiter, StatsRegistry, TokenRegistry,
};
use tower::ServiceExt;

fn disabled_rate_limit() -> RateLimitConfig {
    RateLimitConfig { enabled: false, max_requests: 0, window_ms: 0 }
}

fn test_config(api_token: Option<&str>) -> GatewayConfig {
    GatewayConfig {
        port: 0,
        api_token: api_token.map(str::to_string),
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
    }
}

fn test_state(api_token: Option<&str>) -> AppState {
    let config = test_config(api_token);
    AppState::new(
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
    )
}

fn with_peer(mut req: Request<Body>) -> Request<Body> {
    let addr: SocketAddr = "127.0.0.1:9000".parse().unwrap();
    req.extensions_mut().insert(ConnectInfo(addr));
    req
}

#[tokio::test]
async fn health_check_bypasses_admission_entirely() {
    let app = o2o_proxy::routes::build(test_state(Some("secret")));

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn chat_completions_without_bearer_is_rejected_when_a_secret_is_configured() {
    let app = o2o_proxy::routes::build(test_state(Some("secret")));

    let request = with_peer(
        Request::builder()
            .method("POST")
            .uri("/v1/chat/completions")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"model":"llama3","messages":[]}"#))
            .unwrap(),
    );

    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(response.headers().get("x-request-id").is_some());
}

#[tokio::test]
async fn chat_completions_with_no_backends_configured_is_service_unavailable() {
    let app = o2o_proxy::routes::build(test_state(None));

    let request = with_peer(
        Request::builder()
            .method("POST")
            .uri("/v1/chat/completions")
            .header("content-type", "application/json")
            .header("authorization", "Bearer anything")
            .body(Body::from(r#"{"model":"llama3","messages":[{"role":"user","content":"hi"}]}"#))
            .unwrap(),
    );

    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["error"]["type"], "no_backends");
}
