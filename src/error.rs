//! Error types for key loading, discovery and provisioning

use std::path::PathBuf;
use std::time::Duration;

use uuid::Uuid;

use crate::core::bluetooth::BleError;

/// Errors that end a provisioning run.
#[derive(Debug, thiserror::Error)]
pub enum ProvisionError {
    #[error("key file not found: {}", .0.display())]
    KeyFileNotFound(PathBuf),

    #[error("no valid keys found in {}", .0.display())]
    NoValidKeys(PathBuf),

    #[error("failed to read key file: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid key length {actual} (expected {expected})")]
    InvalidKeyLength { expected: usize, actual: usize },

    #[error("advertisement key not found in .keys file")]
    AdvertisementKeyMissing,

    #[error("advertisement key is not valid base64")]
    InvalidBase64,

    #[error(
        "no '{name}' devices found. Make sure the device is powered on \
         and in configuration mode (first 30 seconds after boot)"
    )]
    DeviceNotFound { name: String },

    #[error("invalid selection: {0:?}")]
    InvalidSelection(String),

    #[error("BLE scan failed: {0}")]
    Scan(#[source] BleError),

    #[error("connection to {address} timed out after {}s", .timeout.as_secs_f32())]
    ConnectTimeout { address: String, timeout: Duration },

    #[error("failed to connect to {address}: {source}")]
    Connect {
        address: String,
        #[source]
        source: BleError,
    },

    #[error("configuration service {service} not found (available: {})", format_uuids(.available))]
    ServiceNotFound { service: Uuid, available: Vec<Uuid> },

    #[error("service discovery failed: {0}")]
    Discovery(#[source] BleError),
}

fn format_uuids(uuids: &[Uuid]) -> String {
    if uuids.is_empty() {
        return "none".to_string();
    }
    uuids
        .iter()
        .map(Uuid::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
