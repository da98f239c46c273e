//! Parsing of inventory device ids

use crate::error::TelemetryError;
use std::fmt;
use std::str::FromStr;

const DEVICE_PREFIX: &str = "nvidia";

/// A device id of the form `nvidia<minor>`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceId {
    minor: u32,
}

impl DeviceId {
    pub fn new(minor: u32) -> Self {
        Self { minor }
    }

    /// Parse `nvidia<N>` where `<N>` is a decimal minor number
    pub fn parse(raw: &str) -> Result<Self, TelemetryError> {
        let invalid = || TelemetryError::InvalidDeviceId(raw.to_string());

        let digits = raw.strip_prefix(DEVICE_PREFIX).ok_or_else(invalid)?;
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }

        // Overflowing minor numbers are treated like any other malformed id
        let minor = digits.parse().map_err(|_| invalid())?;
        Ok(Self { minor })
    }

    pub fn minor(&self) -> u32 {
        self.minor
    }
}

impl FromStr for DeviceId {
    type Err = TelemetryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", DEVICE_PREFIX, self.minor)
    }
}
