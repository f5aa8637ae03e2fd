use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::bluetooth::{
    CONFIG_DEVICE_NAME, UUID_CONFIG_SERVICE, UUID_KEY_COUNT_CHAR, UUID_KEY_WRITE_CHAR,
};

/// How a tracker in configuration mode identifies itself
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Substring of the advertised name that marks a device in configuration mode
    pub name_filter: String,
    /// Configuration service
    pub service_uuid: Uuid,
    /// Characteristic accepting one 28-byte key per write
    pub key_write_uuid: Uuid,
    /// Characteristic holding the stored key count (u16, little-endian)
    pub key_count_uuid: Uuid,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        DeviceConfig {
            name_filter: CONFIG_DEVICE_NAME.to_string(),
            service_uuid: UUID_CONFIG_SERVICE,
            key_write_uuid: UUID_KEY_WRITE_CHAR,
            key_count_uuid: UUID_KEY_COUNT_CHAR,
        }
    }
}
