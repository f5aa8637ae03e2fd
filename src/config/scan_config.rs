use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::bluetooth::{DEFAULT_SCAN_DURATION_SECS, SCAN_CHANNEL_CAPACITY};

/// Scan settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// How long to listen for advertisements, in seconds
    pub timeout_secs: u64,
    /// Advertisements buffered between the radio and the scanner
    pub channel_capacity: usize,
}

impl Default for ScanConfig {
    fn default() -> Self {
        ScanConfig {
            timeout_secs: DEFAULT_SCAN_DURATION_SECS,
            channel_capacity: SCAN_CHANNEL_CAPACITY,
        }
    }
}

impl ScanConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}
