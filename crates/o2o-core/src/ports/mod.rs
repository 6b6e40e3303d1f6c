//! Port traits: the seams adapters elsewhere in the workspace implement.
//! One trait per capability, object-safe, injected via `Arc<dyn Trait>`
//! at the composition root.

pub mod cache;
pub mod logger;
pub mod metrics;

pub use cache::{NoopResponseCache, ResponseCache};
pub use logger::{GatewayLogger, NoopLogger, RequestLogRecord, TracingLogger};
pub use metrics::{MetricsSink, NoopMetrics};
