//! NVML-backed telemetry source
//!
//! The handle table (device minor number -> NVML index) is built once when the
//! source is constructed and never mutated afterwards. If NVML cannot be
//! initialized the source stays usable but every query fails with
//! `BackendUnavailable`.

use super::{DeviceId, TelemetrySource};
use crate::error::{StatsQuery, TelemetryError};
use crate::models::DeviceStats;
use async_trait::async_trait;
use nvml_wrapper::enum_wrappers::device::Sampling;
use nvml_wrapper::enums::device::SampleValue;
use nvml_wrapper::error::NvmlError;
use nvml_wrapper::Nvml;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, TryLockError};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};

/// Trailing window the duty cycle is averaged over
pub const UTILIZATION_WINDOW: Duration = Duration::from_secs(10);

enum BackendState {
    /// NVML failed to initialize; permanent for the life of the source
    Uninitialized,
    Ready(ReadyBackend),
    Stopped,
}

struct ReadyBackend {
    nvml: Nvml,
    /// Device minor number -> NVML device index
    handles: HashMap<u32, u32>,
}

impl ReadyBackend {
    fn new(nvml: Nvml) -> Self {
        let handles = build_handle_table(&nvml);
        Self { nvml, handles }
    }

    fn query_stats(&self, id: DeviceId, window: Duration) -> Result<DeviceStats, TelemetryError> {
        let index = *self
            .handles
            .get(&id.minor())
            .ok_or(TelemetryError::DeviceNotFound(id.minor()))?;

        let device = self.nvml.device_by_index(index).map_err(|e| {
            debug!(device_id = %id, index, error = %e, "NVML handle lookup failed");
            TelemetryError::DeviceNotFound(id.minor())
        })?;

        let model = device
            .name()
            .map_err(|e| TelemetryError::query_failed(StatsQuery::Name, e))?;
        let uuid = device
            .uuid()
            .map_err(|e| TelemetryError::query_failed(StatsQuery::Uuid, e))?;
        let memory = device
            .memory_info()
            .map_err(|e| TelemetryError::query_failed(StatsQuery::MemoryInfo, e))?;

        let duty_cycle_percent = match device.samples(Sampling::GpuUtilization, window_start(window)) {
            Ok(samples) => mean_percent(samples.iter().map(|s| sample_as_f64(&s.value))),
            // No samples recorded inside the window
            Err(NvmlError::NotFound) => 0,
            Err(e) => return Err(TelemetryError::query_failed(StatsQuery::Utilization, e)),
        };

        Ok(DeviceStats {
            model,
            id: uuid,
            memory_total_bytes: memory.total,
            memory_used_bytes: memory.used,
            duty_cycle_percent,
        })
    }
}

fn build_handle_table(nvml: &Nvml) -> HashMap<u32, u32> {
    let mut handles = HashMap::new();

    let count = match nvml.device_count() {
        Ok(count) => count,
        Err(e) => {
            warn!(
                error = %e,
                "GPU metrics will not be available, failed to get the number of nvidia devices"
            );
            return handles;
        }
    };
    info!(devices = count, "NVML initialized");

    for index in 0..count {
        let device = match nvml.device_by_index(index) {
            Ok(device) => device,
            Err(e) => {
                warn!(index, error = %e, "Failed to get nvidia device handle");
                continue;
            }
        };
        match device.minor_number() {
            Ok(minor) => {
                handles.insert(minor, index);
            }
            Err(e) => warn!(index, error = %e, "Failed to get nvidia device minor number"),
        }
    }

    handles
}

/// NVML timestamps are microseconds since the epoch
fn window_start(window: Duration) -> u64 {
    SystemTime::now()
        .checked_sub(window)
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_micros() as u64)
        .unwrap_or(0)
}

fn sample_as_f64(value: &SampleValue) -> f64 {
    match *value {
        SampleValue::F64(v) => v,
        SampleValue::U32(v) => v as f64,
        SampleValue::U64(v) => v as f64,
        SampleValue::I64(v) => v as f64,
    }
}

fn mean_percent(values: impl IntoIterator<Item = f64>) -> u64 {
    let (sum, count) = values
        .into_iter()
        .fold((0.0, 0u32), |(sum, count), v| (sum + v, count + 1));
    if count == 0 {
        return 0;
    }
    (sum / count as f64).round().max(0.0) as u64
}

/// Telemetry source reading counters through NVML
pub struct NvmlTelemetry {
    state: Arc<RwLock<BackendState>>,
    window: Duration,
}

impl NvmlTelemetry {
    /// Initialize NVML and build the device handle table
    pub fn new() -> Self {
        match Nvml::init() {
            Ok(nvml) => Self::with_state(BackendState::Ready(ReadyBackend::new(nvml))),
            Err(e) => {
                // Missing drivers are expected on CPU-only nodes
                debug!(error = %e, "Could not initialize NVML");
                Self::uninitialized()
            }
        }
    }

    /// A source whose backend never came up
    pub fn uninitialized() -> Self {
        Self::with_state(BackendState::Uninitialized)
    }

    fn with_state(state: BackendState) -> Self {
        Self {
            state: Arc::new(RwLock::new(state)),
            window: UTILIZATION_WINDOW,
        }
    }

    /// Whether queries can currently reach NVML
    pub fn is_available(&self) -> bool {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        matches!(*state, BackendState::Ready(_))
    }

    /// Number of devices in the handle table
    pub fn device_count(&self) -> usize {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        match &*state {
            BackendState::Ready(backend) => backend.handles.len(),
            _ => 0,
        }
    }
}

impl Default for NvmlTelemetry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TelemetrySource for NvmlTelemetry {
    async fn get_stats(&self, device_id: &str) -> Result<DeviceStats, TelemetryError> {
        if !self.is_available() {
            return Err(TelemetryError::BackendUnavailable);
        }
        let id = DeviceId::parse(device_id)?;

        let state = Arc::clone(&self.state);
        let window = self.window;

        // NVML calls block in the driver
        tokio::task::spawn_blocking(move || {
            let state = state.read().unwrap_or_else(PoisonError::into_inner);
            match &*state {
                BackendState::Ready(backend) => backend.query_stats(id, window),
                _ => Err(TelemetryError::BackendUnavailable),
            }
        })
        .await?
    }

    fn stop(&self) {
        // A query stuck in the driver keeps its read guard; never wait on it
        let mut state = match self.state.try_write() {
            Ok(state) => state,
            Err(TryLockError::Poisoned(e)) => e.into_inner(),
            Err(TryLockError::WouldBlock) => {
                warn!("NVML query still in flight, skipping shutdown");
                return;
            }
        };
        match std::mem::replace(&mut *state, BackendState::Stopped) {
            BackendState::Ready(backend) => match backend.nvml.shutdown() {
                Ok(()) => info!("NVML shut down"),
                Err(e) => warn!(error = %e, "Failed to shut down NVML"),
            },
            BackendState::Uninitialized => *state = BackendState::Uninitialized,
            BackendState::Stopped => {}
        }
    }
}
