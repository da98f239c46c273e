//! Library for per-container GPU metrics on Kubernetes nodes
//!
//! This crate provides:
//! - Device inventory from the kubelet pod-resources API
//! - GPU telemetry through NVML
//! - The per-scrape join of the two into labeled samples
//! - Prometheus exposition, health checks and self-observability

pub mod collector;
pub mod error;
pub mod exposition;
pub mod health;
pub mod inventory;
pub mod models;
pub mod observability;
pub mod proto;
pub mod telemetry;

pub use collector::{CollectorConfig, GpuCollector, GpuCollectorBuilder, NVIDIA_RESOURCE_NAME};
pub use error::{InventoryError, StatsQuery, TelemetryError};
pub use exposition::MetricSchema;
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use inventory::{InventorySource, KubeletInventory};
pub use models::*;
pub use observability::{ExporterMetrics, StructuredLogger};
pub use telemetry::{DeviceId, NvmlTelemetry, TelemetrySource};
