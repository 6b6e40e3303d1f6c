//! Admission middleware chain: request id, access control, rate
//! limiting, auth, active-connection bookkeeping, applied to `/v1/*`
//! (and its bare aliases) in that order.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicI64, Ordering};

use axum::extract::{ConnectInfo, Request, State};
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use o2o_core::{AccessPolicy, AuthToken, GatewayError, GatewayErrorKind};
use o2o_registry::Decision;

use crate::error::{rate_limited, ApiError};
use crate::state::AppState;

/// Attached to request extensions by [`admission`] so handlers can read
/// the request id and the resolved auth token without re-deriving them.
#[derive(Clone)]
pub struct RequestContext {
    pub request_id: String,
    pub token: Option<AuthToken>,
}

/// Process-wide count of in-flight `/v1/*` requests, reported through the
/// metrics port as a gauge on every change.
pub static ACTIVE_CONNECTIONS: AtomicI64 = AtomicI64::new(0);

fn extract_bearer(headers: &axum::http::HeaderMap) -> Option<String> {
    let raw = headers.get(axum::http::header::AUTHORIZATION)?.to_str().ok()?;
    let trimmed = raw.trim();
    let has_bearer_prefix = trimmed.get(..7).is_some_and(|prefix| prefix.eq_ignore_ascii_case("bearer "));
    if has_bearer_prefix {
        Some(trimmed[7..].trim().to_string())
    } else {
        Some(trimmed.to_string())
    }
}

fn client_ip(state: &AppState, addr: SocketAddr, headers: &axum::http::HeaderMap) -> String {
    if state.config.trust_proxy {
        if let Some(forwarded) = headers.get("x-forwarded-for").and_then(|v| v.to_str().ok()) {
            if let Some(first) = forwarded.split(',').next() {
                return AccessPolicy::normalize_ip(first.trim());
            }
        }
    }
    AccessPolicy::normalize_ip(&addr.ip().to_string())
}

pub async fn admission(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    mut req: Request,
    next: Next,
) -> Response {
    let request_id = o2o_registry::ids::registry_id();
    let ip = client_ip(&state, addr, req.headers());

    if !state.access.is_allowed(&ip) {
        return respond(
            request_id,
            ApiError::from(GatewayError::new(GatewayErrorKind::AccessDenied, "ip denied by access policy"))
                .into_response(),
        );
    }

    let bearer = extract_bearer(req.headers());

    // Rate-limiting runs before the auth gate, keyed by the raw
    // (unvalidated) bearer string when present — a flood of invalid
    // tokens is throttled per-string rather than bypassing the limiter
    // entirely by failing auth first.
    match state.rate_limiter.consume(&ip, bearer.as_deref()) {
        Decision::Allowed => {}
        Decision::Denied { limit_type, retry_after_secs } => {
            return respond(request_id, rate_limited(limit_type.as_str(), retry_after_secs));
        }
    }

    let token = if state.tokens.all().is_empty() {
        match (&state.config.api_token, &bearer) {
            (Some(secret), Some(provided)) if secret == provided => None,
            (Some(_), _) => {
                return respond(
                    request_id,
                    ApiError::from(GatewayError::new(GatewayErrorKind::AuthError, "invalid bearer token"))
                        .into_response(),
                );
            }
            (None, _) => None,
        }
    } else {
        let Some(provided) = &bearer else {
            return respond(
                request_id,
                ApiError::from(GatewayError::new(GatewayErrorKind::AuthError, "missing bearer token"))
                    .into_response(),
            );
        };
        match state.tokens.validate_token(provided) {
            o2o_registry::TokenOutcome::Valid(token) => {
                if !token.allows_ip(&ip) {
                    return respond(
                        request_id,
                        ApiError::from(GatewayError::new(
                            GatewayErrorKind::AccessDenied,
                            "token not permitted from this ip",
                        ))
                        .into_response(),
                    );
                }
                // A token carrying its own rate-limit override is checked
                // against that window in addition to the generic
                // bearer-keyed window already consumed above.
                if let Some(override_cfg) = token.rate_limit_override {
                    match state.rate_limiter.consume_token_override(&token.id, override_cfg) {
                        Decision::Allowed => {}
                        Decision::Denied { limit_type, retry_after_secs } => {
                            return respond(request_id, rate_limited(limit_type.as_str(), retry_after_secs));
                        }
                    }
                }
                Some(token)
            }
            o2o_registry::TokenOutcome::Invalid { error } => {
                return respond(
                    request_id,
                    ApiError::from(GatewayError::new(GatewayErrorKind::AuthError, error)).into_response(),
                );
            }
        }
    };

    req.extensions_mut().insert(RequestContext { request_id: request_id.clone(), token });

    ACTIVE_CONNECTIONS.fetch_add(1, Ordering::SeqCst);
    state.metrics.set_gauge(
        "o2o_active_connections",
        &[],
        ACTIVE_CONNECTIONS.load(Ordering::SeqCst) as f64,
    );

    let response = next.run(req).await;

    ACTIVE_CONNECTIONS.fetch_sub(1, Ordering::SeqCst);
    state.metrics.set_gauge(
        "o2o_active_connections",
        &[],
        ACTIVE_CONNECTIONS.load(Ordering::SeqCst) as f64,
    );

    respond(request_id, response)
}

fn respond(request_id: String, mut response: Response) -> Response {
    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert("x-request-id", value);
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderMap;

    fn headers_with_auth(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(axum::http::header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn extract_bearer_strips_prefix_case_insensitively() {
        assert_eq!(extract_bearer(&headers_with_auth("Bearer sk-o2o-abc")), Some("sk-o2o-abc".to_string()));
        assert_eq!(extract_bearer(&headers_with_auth("bearer sk-o2o-abc")), Some("sk-o2o-abc".to_string()));
        assert_eq!(extract_bearer(&headers_with_auth("BEARER sk-o2o-abc")), Some("sk-o2o-abc".to_string()));
        assert_eq!(extract_bearer(&headers_with_auth("BeArEr sk-o2o-abc")), Some("sk-o2o-abc".to_string()));
    }

    #[test]
    fn extract_bearer_falls_back_to_raw_value() {
        assert_eq!(extract_bearer(&headers_with_auth("sk-o2o-abc")), Some("sk-o2o-abc".to_string()));
    }

    #[test]
    fn extract_bearer_missing_header_is_none() {
        assert_eq!(extract_bearer(&HeaderMap::new()), None);
    }
}
