//! Observability infrastructure for the exporter itself
//!
//! Provides:
//! - Prometheus self-metrics (scrape latency, failures by kind, devices reported)
//! - Structured JSON logging of lifecycle events with tracing

use crate::models::CollectReport;
use prometheus::{
    register_histogram, register_int_counter_vec, register_int_gauge, Histogram, IntCounterVec,
    IntGauge,
};
use std::sync::OnceLock;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Histogram buckets for scrape latency (in seconds)
const SCRAPE_BUCKETS: &[f64] = &[0.001, 0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<ExporterMetricsInner> = OnceLock::new();

struct ExporterMetricsInner {
    scrape_duration_seconds: Histogram,
    scrape_failures: IntCounterVec,
    devices_reported: IntGauge,
}

impl ExporterMetricsInner {
    fn new() -> Self {
        Self {
            scrape_duration_seconds: register_histogram!(
                "gpu_monitor_scrape_duration_seconds",
                "Time spent joining inventory and telemetry for one scrape",
                SCRAPE_BUCKETS.to_vec()
            )
            .expect("Failed to register scrape_duration_seconds"),

            scrape_failures: register_int_counter_vec!(
                "gpu_monitor_scrape_failures_total",
                "Failures recorded during scrapes, by kind",
                &["kind"]
            )
            .expect("Failed to register scrape_failures_total"),

            devices_reported: register_int_gauge!(
                "gpu_monitor_devices_reported",
                "Devices that produced samples in the last scrape"
            )
            .expect("Failed to register devices_reported"),
        }
    }
}

/// Handle to the exporter's self-metrics
///
/// Clones share the same underlying metrics in the default registry.
#[derive(Clone)]
pub struct ExporterMetrics {
    _private: (),
}

impl Default for ExporterMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl ExporterMetrics {
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(ExporterMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &ExporterMetricsInner {
        GLOBAL_METRICS.get_or_init(ExporterMetricsInner::new)
    }

    /// Record the outcome of one scrape
    pub fn record_scrape(&self, report: &CollectReport, elapsed: Duration) {
        let inner = self.inner();
        inner.scrape_duration_seconds.observe(elapsed.as_secs_f64());
        inner.devices_reported.set(report.devices_reported() as i64);
        for failure in &report.failures {
            inner
                .scrape_failures
                .with_label_values(&[failure.kind.as_str()])
                .inc();
        }
    }
}

/// Structured logger for exporter lifecycle events
#[derive(Clone)]
pub struct StructuredLogger {
    node_name: String,
}

impl StructuredLogger {
    pub fn new(node_name: impl Into<String>) -> Self {
        Self {
            node_name: node_name.into(),
        }
    }

    pub fn log_startup(&self, version: &str, socket: &str, port: u16) {
        info!(
            event = "exporter_started",
            node = %self.node_name,
            version = %version,
            socket = %socket,
            port = port,
            "GPU monitor started"
        );
    }

    pub fn log_telemetry_backend(&self, available: bool, devices: usize) {
        if available {
            info!(
                event = "telemetry_backend_state",
                node = %self.node_name,
                available = true,
                devices = devices,
                "GPU telemetry backend ready"
            );
        } else {
            warn!(
                event = "telemetry_backend_state",
                node = %self.node_name,
                available = false,
                "GPU telemetry backend unavailable, GPU metrics will be empty"
            );
        }
    }

    pub fn log_scrape(&self, report: &CollectReport, elapsed: Duration) {
        debug!(
            event = "scrape_completed",
            node = %self.node_name,
            samples = report.samples.len(),
            devices = report.devices_reported(),
            failures = report.failures.len(),
            inventory_failed = report.inventory_failed(),
            elapsed_ms = elapsed.as_millis() as u64,
            "Scrape completed"
        );
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "exporter_shutdown",
            node = %self.node_name,
            reason = %reason,
            "GPU monitor shutting down"
        );
    }
}
