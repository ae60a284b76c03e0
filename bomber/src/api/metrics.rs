//! Prometheus metrics collector.

use core::time::Duration;
use std::sync::atomic::AtomicU64;

use prometheus_client::{
    encoding::{text::encode, EncodeLabelSet},
    metrics::{counter::Counter, family::Family, gauge::Gauge},
    registry::Registry,
};

use crate::stat::RecordStat;

/// Labels of the per-request duration metric.
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct RequestLabels {
    /// Request name from the catalog (or its positional fallback).
    pub name: String,
    /// HTTP status code of the response.
    pub code: String,
}

/// Prometheus-backed observation sink.
///
/// Exports the latest observed duration per `(name, code)` pair plus
/// totals for executed requests, failed jobs and completed runs.
pub struct Metrics {
    registry: Registry,
    request_duration: Family<RequestLabels, Gauge<f64, AtomicU64>>,
    requests: Counter,
    failures: Counter,
    runs: Counter,
}

impl Metrics {
    /// Creates a new collector and registers all metrics.
    pub fn new() -> Self {
        let mut registry = Registry::with_prefix("fhir_bomber");

        let request_duration = Family::<RequestLabels, Gauge<f64, AtomicU64>>::default();
        registry.register(
            "request_duration_seconds",
            "Request duration in seconds",
            request_duration.clone(),
        );

        let requests = Counter::default();
        registry.register("requests", "Total number of requests executed", requests.clone());

        let failures = Counter::default();
        registry.register(
            "request_failures",
            "Total number of jobs that failed without receiving a response",
            failures.clone(),
        );

        let runs = Counter::default();
        registry.register("runs", "Total number of completed catalog passes", runs.clone());

        Self {
            registry,
            request_duration,
            requests,
            failures,
            runs,
        }
    }

    /// Encodes all metrics to Prometheus text format.
    pub fn encode(&self) -> String {
        let mut buffer = String::new();
        encode(&mut buffer, &self.registry).expect("encoding should not fail");

        buffer
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordStat for Metrics {
    fn on_probe(&self, name: &str, code: u16, elapsed: Duration) {
        self.requests.inc();
        self.request_duration
            .get_or_create(&RequestLabels {
                name: name.to_string(),
                code: code.to_string(),
            })
            .set(elapsed.as_secs_f64());
    }

    fn on_failure(&self, _name: &str) {
        self.failures.inc();
    }

    fn on_run_done(&self, _run: u64) {
        self.runs.inc();
    }
}
