//! Gateway-wide error taxonomy, kept as kinds rather than
//! implementation-specific classes so every crate can map them to its own
//! surface (HTTP status, log field, ...).

use serde::Serialize;
use thiserror::Error;

/// The ten error kinds a request can surface, independent of transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GatewayErrorKind {
    InvalidRequest,
    AuthError,
    AccessDenied,
    PermissionError,
    NotFound,
    RateLimitError,
    UpstreamError,
    StreamError,
    ServerError,
    NoBackends,
}

impl GatewayErrorKind {
    /// OpenAI-style `error.type` string for this kind.
    #[must_use]
    pub fn wire_type(self) -> &'static str {
        match self {
            Self::InvalidRequest => "invalid_request_error",
            Self::AuthError => "auth_error",
            Self::AccessDenied => "access_denied",
            Self::PermissionError => "permission_error",
            Self::NotFound => "not_found",
            Self::RateLimitError => "rate_limit_error",
            Self::UpstreamError => "upstream_error",
            Self::StreamError => "stream_error",
            Self::ServerError => "server_error",
            Self::NoBackends => "no_backends",
        }
    }

    /// Default HTTP status for this kind (upstream_error overrides this
    /// with the propagated status when one is known).
    #[must_use]
    pub fn default_status(self) -> u16 {
        match self {
            Self::InvalidRequest => 400,
            Self::AuthError => 401,
            Self::AccessDenied | Self::PermissionError => 403,
            Self::NotFound => 404,
            Self::RateLimitError => 429,
            Self::UpstreamError => 502,
            Self::StreamError => 200,
            Self::ServerError => 500,
            Self::NoBackends => 503,
        }
    }
}

/// A gateway error carrying its kind and a human message.
#[derive(Debug, Error)]
#[error("{kind:?}: {message}")]
pub struct GatewayError {
    pub kind: GatewayErrorKind,
    pub message: String,
    /// Status propagated from upstream, when the kind is `UpstreamError`.
    pub upstream_status: Option<u16>,
}

impl GatewayError {
    #[must_use]
    pub fn new(kind: GatewayErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            upstream_status: None,
        }
    }

    #[must_use]
    pub fn upstream(status: u16, message: impl Into<String>) -> Self {
        Self {
            kind: GatewayErrorKind::UpstreamError,
            message: message.into(),
            upstream_status: Some(status),
        }
    }

    #[must_use]
    pub fn status(&self) -> u16 {
        self.upstream_status.unwrap_or_else(|| self.kind.default_status())
    }
}
