//! Metrics sink port. Prometheus formatting is an injected collaborator —
//! only the call-site shape is defined here.

/// Counter/gauge/histogram sink the pipeline reports through.
pub trait MetricsSink: Send + Sync {
    fn incr_counter(&self, name: &str, labels: &[(&str, &str)], n: u64);
    fn set_gauge(&self, name: &str, labels: &[(&str, &str)], value: f64);
    fn observe_histogram(&self, name: &str, labels: &[(&str, &str)], seconds: f64);
}

/// Default sink: discards every observation.
#[derive(Debug, Clone, Default)]
pub struct NoopMetrics;

impl MetricsSink for NoopMetrics {
    fn incr_counter(&self, _name: &str, _labels: &[(&str, &str)], _n: u64) {}
    fn set_gauge(&self, _name: &str, _labels: &[(&str, &str)], _value: f64) {}
    fn observe_histogram(&self, _name: &str, _labels: &[(&str, &str)], _seconds: f64) {}
}
