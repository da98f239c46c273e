//! Per-scrape join of device inventory and GPU telemetry
//!
//! Every call to [`GpuCollector::collect`] takes a fresh inventory snapshot,
//! queries telemetry for each accelerator assignment in delivered order and
//! returns the resulting samples together with any per-device failures.
//! Nothing is cached between scrapes.

#[cfg(test)]
mod tests;

use crate::error::{InventoryError, TelemetryError};
use crate::inventory::{InventorySource, DEFAULT_TIMEOUT};
use crate::models::{
    CollectReport, DeviceAssignment, DeviceStats, MetricKind, MetricSample, SampleLabels,
    ScrapeFailure,
};
use crate::telemetry::TelemetrySource;
use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Extended resource name the kubelet uses for NVIDIA GPUs
pub const NVIDIA_RESOURCE_NAME: &str = "nvidia.com/gpu";

/// Configuration for the collector
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    /// Only assignments with this resource name are queried
    pub resource_name: String,
    /// Upper bound for the inventory call (default: 10 seconds)
    pub inventory_timeout: Duration,
    /// Upper bound for each telemetry call (default: 10 seconds)
    pub telemetry_timeout: Duration,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            resource_name: NVIDIA_RESOURCE_NAME.to_string(),
            inventory_timeout: DEFAULT_TIMEOUT,
            telemetry_timeout: Duration::from_secs(10),
        }
    }
}

/// Joins inventory assignments with device telemetry
pub struct GpuCollector {
    inventory: Arc<dyn InventorySource>,
    telemetry: Arc<dyn TelemetrySource>,
    config: CollectorConfig,
}

impl GpuCollector {
    pub fn new(
        inventory: Arc<dyn InventorySource>,
        telemetry: Arc<dyn TelemetrySource>,
        config: CollectorConfig,
    ) -> Self {
        Self {
            inventory,
            telemetry,
            config,
        }
    }

    /// Run one scrape
    pub async fn collect(&self) -> CollectReport {
        let mut report = CollectReport::default();

        let assignments = match self.list_assignments().await {
            Ok(assignments) => assignments,
            Err(failure) => {
                warn!(error = %failure.message, "Error getting devices from the kubelet");
                report.failures.push(failure);
                return report;
            }
        };

        for assignment in assignments
            .iter()
            .filter(|a| a.resource_name == self.config.resource_name)
        {
            match self.device_stats(assignment).await {
                Ok(stats) => push_samples(&mut report.samples, &stats, assignment),
                Err(failure) => {
                    warn!(
                        device_id = %assignment.device_id,
                        pod_name = %assignment.pod_name,
                        pod_namespace = %assignment.pod_namespace,
                        container_name = %assignment.container_name,
                        kind = %failure.kind,
                        error = %failure.message,
                        "Error getting stats for device"
                    );
                    report.failures.push(failure);
                }
            }
        }

        debug!(
            assignments = assignments.len(),
            samples = report.samples.len(),
            failures = report.failures.len(),
            "Scrape collected"
        );

        report
    }

    async fn list_assignments(&self) -> Result<Vec<DeviceAssignment>, ScrapeFailure> {
        let timeout = self.config.inventory_timeout;
        match tokio::time::timeout(timeout, self.inventory.list_assignments()).await {
            Ok(Ok(assignments)) => Ok(assignments),
            Ok(Err(e)) => Err(ScrapeFailure::inventory(e.to_string())),
            Err(_) => Err(ScrapeFailure::inventory(
                InventoryError::Timeout(timeout).to_string(),
            )),
        }
    }

    async fn device_stats(&self, assignment: &DeviceAssignment) -> Result<DeviceStats, ScrapeFailure> {
        let timeout = self.config.telemetry_timeout;
        let result = tokio::time::timeout(timeout, self.telemetry.get_stats(&assignment.device_id))
            .await
            .unwrap_or_else(|_| Err(TelemetryError::Timeout(timeout)));

        result.map_err(|e| ScrapeFailure::device(assignment, e.kind(), e.to_string()))
    }
}

/// Push the three samples of one device, back to back
fn push_samples(samples: &mut Vec<MetricSample>, stats: &DeviceStats, assignment: &DeviceAssignment) {
    let labels = SampleLabels::new(stats, assignment);

    for kind in MetricKind::ALL {
        let value = match kind {
            MetricKind::MemoryUsedBytes => stats.memory_used_bytes,
            MetricKind::MemoryTotalBytes => stats.memory_total_bytes,
            MetricKind::DutyCycle => stats.duty_cycle_percent,
        };
        samples.push(MetricSample {
            kind,
            value: value as f64,
            labels: labels.clone(),
        });
    }
}

/// Builder for [`GpuCollector`]
pub struct GpuCollectorBuilder {
    inventory: Option<Arc<dyn InventorySource>>,
    telemetry: Option<Arc<dyn TelemetrySource>>,
    config: CollectorConfig,
}

impl GpuCollectorBuilder {
    /// Create a new builder with default configuration
    pub fn new() -> Self {
        Self {
            inventory: None,
            telemetry: None,
            config: CollectorConfig::default(),
        }
    }

    pub fn inventory(mut self, inventory: Arc<dyn InventorySource>) -> Self {
        self.inventory = Some(inventory);
        self
    }

    pub fn telemetry(mut self, telemetry: Arc<dyn TelemetrySource>) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    /// Set the accelerator resource name to filter on
    pub fn resource_name(mut self, name: impl Into<String>) -> Self {
        self.config.resource_name = name.into();
        self
    }

    pub fn inventory_timeout(mut self, timeout: Duration) -> Self {
        self.config.inventory_timeout = timeout;
        self
    }

    pub fn telemetry_timeout(mut self, timeout: Duration) -> Self {
        self.config.telemetry_timeout = timeout;
        self
    }

    pub fn build(self) -> Result<GpuCollector> {
        let inventory = self
            .inventory
            .ok_or_else(|| anyhow::anyhow!("Inventory source is required"))?;
        let telemetry = self
            .telemetry
            .ok_or_else(|| anyhow::anyhow!("Telemetry source is required"))?;

        Ok(GpuCollector::new(inventory, telemetry, self.config))
    }
}

impl Default for GpuCollectorBuilder {
    fn default() -> Self {
        Self::new()
    }
}
