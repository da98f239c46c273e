//! Error types for the inventory and telemetry sources

use crate::models::FailureKind;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Failure of a whole inventory call
#[derive(Debug, Error)]
pub enum InventoryError {
    #[error("invalid inventory endpoint {endpoint}: {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    #[error("inventory transport error: {0}")]
    Transport(#[from] tonic::transport::Error),

    #[error("inventory request failed: {0}")]
    Rpc(#[from] tonic::Status),

    #[error("inventory request timed out after {0:?}")]
    Timeout(Duration),
}

impl InventoryError {
    pub fn kind(&self) -> FailureKind {
        FailureKind::InventoryUnavailable
    }
}

/// Which per-device query failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatsQuery {
    Name,
    Uuid,
    MemoryInfo,
    Utilization,
}

impl fmt::Display for StatsQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StatsQuery::Name => "name",
            StatsQuery::Uuid => "uuid",
            StatsQuery::MemoryInfo => "memory info",
            StatsQuery::Utilization => "utilization",
        };
        f.write_str(name)
    }
}

/// Failure of a single `get_stats` call
#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("{0} does not match nvidia[0-9]+")]
    InvalidDeviceId(String),

    #[error("device with minor number {0} was not found")]
    DeviceNotFound(u32),

    #[error("error while getting gpu {query}: {source}")]
    QueryFailed {
        query: StatsQuery,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    },

    #[error("telemetry request timed out after {0:?}")]
    Timeout(Duration),

    #[error("telemetry worker failed: {0}")]
    Worker(#[from] tokio::task::JoinError),

    #[error("gpu telemetry backend is not available")]
    BackendUnavailable,
}

impl TelemetryError {
    pub fn query_failed(
        query: StatsQuery,
        source: impl Into<Box<dyn std::error::Error + Send + Sync + 'static>>,
    ) -> Self {
        TelemetryError::QueryFailed {
            query,
            source: source.into(),
        }
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            TelemetryError::InvalidDeviceId(_) => FailureKind::DeviceIdentifierInvalid,
            TelemetryError::DeviceNotFound(_) => FailureKind::DeviceNotFound,
            TelemetryError::QueryFailed { .. }
            | TelemetryError::Timeout(_)
            | TelemetryError::Worker(_) => FailureKind::TelemetryQueryFailed,
            TelemetryError::BackendUnavailable => FailureKind::BackendUnavailable,
        }
    }
}
