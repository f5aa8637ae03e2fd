use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::bluetooth::DEFAULT_CONNECT_TIMEOUT_SECS;

/// Connection settings for the provisioning session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Upper bound on establishing the GATT connection, in seconds.
    /// Keep it well inside the device's configuration window.
    pub connect_timeout_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
        }
    }
}

impl SessionConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}
