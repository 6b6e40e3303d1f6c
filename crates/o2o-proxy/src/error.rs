//! HTTP-layer error mapping: every `GatewayError` becomes an
//! OpenAI-shaped `{error:{message,type}}` body with the right status
//! code, centralized in one place.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use o2o_core::{GatewayError, GatewayErrorKind};
use o2o_translator::openai::ErrorEnvelope;

/// Thin wrapper so `?` works in handlers while keeping the HTTP mapping
/// out of `o2o-core` (which has no axum dependency).
#[derive(Debug)]
pub struct ApiError(pub GatewayError);

impl From<GatewayError> for ApiError {
    fn from(err: GatewayError) -> Self {
        Self(err)
    }
}

impl From<o2o_registry::RegistryError> for ApiError {
    fn from(err: o2o_registry::RegistryError) -> Self {
        Self(err.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.0.status();
        let body = ErrorEnvelope::new(self.0.message, self.0.kind.wire_type());
        let mut response = (
            StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            Json(body),
        )
            .into_response();

        if self.0.kind == GatewayErrorKind::RateLimitError {
            if let Ok(value) = "60".parse() {
                response.headers_mut().insert("retry-after", value);
            }
        }

        response
    }
}

/// Build a `retry-after: <secs>` response for a rate-limit denial, where
/// the wait is known precisely (unlike the generic fallback above).
#[must_use]
pub fn rate_limited(limit_type: &str, retry_after_secs: u64) -> Response {
    let err = GatewayError::new(
        GatewayErrorKind::RateLimitError,
        format!("rate limit exceeded ({limit_type})"),
    );
    let body = ErrorEnvelope::new(err.message.clone(), err.kind.wire_type());
    let mut response = (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
    if let Ok(value) = retry_after_secs.to_string().parse() {
        response.headers_mut().insert("retry-after", value);
    }
    if let Ok(value) = limit_type.parse() {
        response.headers_mut().insert("x-ratelimit-limit", value);
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_maps_to_404() {
        let err = GatewayError::new(GatewayErrorKind::NotFound, "model not found");
        let response = ApiError::from(err).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn rate_limit_error_carries_retry_after() {
        let err = GatewayError::new(GatewayErrorKind::RateLimitError, "too many requests");
        let response = ApiError::from(err).into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert!(response.headers().get("retry-after").is_some());
    }

    #[test]
    fn rate_limited_sets_precise_retry_after_and_limit_type() {
        let response = rate_limited("ip", 42);
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers().get("retry-after").unwrap(), "42");
        assert_eq!(response.headers().get("x-ratelimit-limit").unwrap(), "ip");
    }
}
