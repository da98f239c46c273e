//! Core data models for the GPU monitor

use serde::{Deserialize, Serialize};
use std::fmt;

/// One device claimed by one container, as reported by the inventory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceAssignment {
    pub pod_name: String,
    pub pod_namespace: String,
    pub container_name: String,
    pub resource_name: String,
    pub device_id: String,
}

/// Telemetry for one device at query time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceStats {
    pub model: String,
    pub id: String,
    pub memory_total_bytes: u64,
    pub memory_used_bytes: u64,
    /// Average over the trailing 10 second window
    pub duty_cycle_percent: u64,
}

/// The three gauges emitted per resolved device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    MemoryUsedBytes,
    MemoryTotalBytes,
    DutyCycle,
}

impl MetricKind {
    pub const ALL: [MetricKind; 3] = [
        MetricKind::MemoryUsedBytes,
        MetricKind::MemoryTotalBytes,
        MetricKind::DutyCycle,
    ];
}

/// Label set shared by the three samples of a device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleLabels {
    pub model: String,
    pub id: String,
    pub container_name: String,
    pub pod_name: String,
    pub pod_namespace: String,
}

impl SampleLabels {
    pub const NAMES: [&'static str; 5] =
        ["model", "id", "container_name", "pod_name", "pod_namespace"];

    pub fn new(stats: &DeviceStats, assignment: &DeviceAssignment) -> Self {
        Self {
            model: stats.model.clone(),
            id: stats.id.clone(),
            container_name: assignment.container_name.clone(),
            pod_name: assignment.pod_name.clone(),
            pod_namespace: assignment.pod_namespace.clone(),
        }
    }

    /// Label values in the order of [`SampleLabels::NAMES`]
    pub fn values(&self) -> [&str; 5] {
        [
            &self.model,
            &self.id,
            &self.container_name,
            &self.pod_name,
            &self.pod_namespace,
        ]
    }
}

/// A single gauge observation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSample {
    pub kind: MetricKind,
    pub value: f64,
    pub labels: SampleLabels,
}

/// Classification of scrape failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    InventoryUnavailable,
    DeviceIdentifierInvalid,
    DeviceNotFound,
    TelemetryQueryFailed,
    BackendUnavailable,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::InventoryUnavailable => "inventory_unavailable",
            FailureKind::DeviceIdentifierInvalid => "device_identifier_invalid",
            FailureKind::DeviceNotFound => "device_not_found",
            FailureKind::TelemetryQueryFailed => "telemetry_query_failed",
            FailureKind::BackendUnavailable => "backend_unavailable",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failure recorded during one scrape
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapeFailure {
    /// `None` when the whole inventory call failed
    pub device_id: Option<String>,
    pub pod_name: Option<String>,
    pub pod_namespace: Option<String>,
    pub container_name: Option<String>,
    pub kind: FailureKind,
    pub message: String,
}

impl ScrapeFailure {
    pub fn inventory(message: impl Into<String>) -> Self {
        Self {
            device_id: None,
            pod_name: None,
            pod_namespace: None,
            container_name: None,
            kind: FailureKind::InventoryUnavailable,
            message: message.into(),
        }
    }

    pub fn device(
        assignment: &DeviceAssignment,
        kind: FailureKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            device_id: Some(assignment.device_id.clone()),
            pod_name: Some(assignment.pod_name.clone()),
            pod_namespace: Some(assignment.pod_namespace.clone()),
            container_name: Some(assignment.container_name.clone()),
            kind,
            message: message.into(),
        }
    }
}

/// Outcome of one scrape
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CollectReport {
    pub samples: Vec<MetricSample>,
    pub failures: Vec<ScrapeFailure>,
}

impl CollectReport {
    /// True when the inventory call itself failed
    pub fn inventory_failed(&self) -> bool {
        self.failures
            .iter()
            .any(|f| f.kind == FailureKind::InventoryUnavailable)
    }

    /// Number of devices that contributed samples
    pub fn devices_reported(&self) -> usize {
        self.samples.len() / MetricKind::ALL.len()
    }
}
