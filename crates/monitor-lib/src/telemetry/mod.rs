//! GPU telemetry sources
//!
//! A telemetry source answers "what are the counters of device X right now".
//! The NVML-backed implementation lives in [`nvml`]; tests substitute their own.

mod device_id;
mod nvml;

pub use device_id::DeviceId;
pub use nvml::NvmlTelemetry;

use crate::error::TelemetryError;
use crate::models::DeviceStats;

use async_trait::async_trait;

/// Per-device telemetry lookup
#[async_trait]
pub trait TelemetrySource: Send + Sync {
    /// Current stats for a device id of the form `nvidia<N>`
    async fn get_stats(&self, device_id: &str) -> Result<DeviceStats, TelemetryError>;

    /// Release backend resources. Safe to call more than once.
    fn stop(&self);
}
