//! Defines shared data structures for the Bluetooth module.

use std::fmt;

use crate::core::bluetooth::device::AdvertisedDevice;

/// Errors raised by the BLE transport.
#[derive(Debug, thiserror::Error)]
pub enum BleError {
    #[error("no Bluetooth adapter found")]
    AdapterUnavailable,

    #[error("device {0} not found")]
    DeviceNotFound(String),

    #[error("characteristic {0} not found")]
    CharacteristicNotFound(uuid::Uuid),

    #[error("advertisement stream ended before the scan window closed")]
    ScanEnded,

    #[error(transparent)]
    Backend(#[from] bluest::Error),

    #[error("{0}")]
    Other(String),
}

/// Snapshot of one scan window.
#[derive(Debug, Clone, Default)]
pub struct ScanReport {
    /// Devices whose name matched, in discovery order, one per address
    pub matches: Vec<AdvertisedDevice>,
    /// Everything else that was heard, one per address
    pub others: Vec<AdvertisedDevice>,
}

impl ScanReport {
    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }
}

/// Result of a best-effort key count read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CountRead {
    Known(u16),
    Degraded(String),
}

impl CountRead {
    pub fn known(&self) -> Option<u16> {
        match self {
            Self::Known(count) => Some(*count),
            Self::Degraded(_) => None,
        }
    }
}

impl fmt::Display for CountRead {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Known(count) => write!(f, "{}", count),
            Self::Degraded(_) => write!(f, "unknown"),
        }
    }
}

/// What happened during one provisioning session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisioningOutcome {
    /// Keys in the batch handed to the session
    pub attempted: usize,
    /// Writes acknowledged by the device
    pub written: usize,
    /// Writes that returned an error
    pub failed: usize,
    /// Keys skipped for having the wrong length
    pub skipped: usize,
    pub initial_count: CountRead,
    pub final_count: CountRead,
}

impl ProvisioningOutcome {
    /// A run succeeds once at least one key has been written.
    pub fn is_success(&self) -> bool {
        self.written > 0
    }
}
