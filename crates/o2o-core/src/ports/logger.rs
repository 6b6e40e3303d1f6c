//! Structured logging port. The pipeline passes structured fields;
//! formatting semantics belong to the injected implementation.

use serde_json::Value;

/// One completed request, handed to `GatewayLogger::log_request`.
#[derive(Debug, Clone)]
pub struct RequestLogRecord {
    pub request_id: String,
    pub method: String,
    pub path: String,
    pub status: u16,
    pub duration_ms: u64,
    pub model: Option<String>,
    pub backend_id: Option<String>,
}

/// Structured request logging plus an audit trail for operator actions.
pub trait GatewayLogger: Send + Sync {
    fn log_request(&self, record: &RequestLogRecord);
    fn audit(&self, action: &str, actor: &str, details: &Value);
}

/// Default logger: discards everything. Useful in unit tests that don't
/// care about log output.
#[derive(Debug, Clone, Default)]
pub struct NoopLogger;

impl GatewayLogger for NoopLogger {
    fn log_request(&self, _record: &RequestLogRecord) {}
    fn audit(&self, _action: &str, _actor: &str, _details: &Value) {}
}

/// Logger backed by `tracing`, the gateway's default in production.
#[derive(Debug, Clone, Default)]
pub struct TracingLogger;

impl GatewayLogger for TracingLogger {
    fn log_request(&self, record: &RequestLogRecord) {
        tracing::info!(
            request_id = %record.request_id,
            method = %record.method,
            path = %record.path,
            status = record.status,
            duration_ms = record.duration_ms,
            model = record.model.as_deref().unwrap_or(""),
            backend_id = record.backend_id.as_deref().unwrap_or(""),
            "request completed"
        );
    }

    fn audit(&self, action: &str, actor: &str, details: &Value) {
        tracing::info!(action, actor, %details, "audit");
    }
}
