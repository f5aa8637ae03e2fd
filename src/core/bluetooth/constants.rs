//! Constants used throughout the application
//! This module contains the GATT identifiers of the HeyStack configuration
//! service, the advertised name and the default timeouts.

use uuid::Uuid;

/// The name a HeyStack tracker advertises while its configuration window is open
pub const CONFIG_DEVICE_NAME: &str = "HeyStack-Config";

/// Standard Bluetooth Service UUIDs
pub const UUID_GENERIC_ACCESS_SERVICE: Uuid = Uuid::from_u128(0x00001800_0000_1000_8000_00805f9b34fb);
pub const UUID_GENERIC_ATTRIBUTE_SERVICE: Uuid = Uuid::from_u128(0x00001801_0000_1000_8000_00805f9b34fb);

/// The UUID of the configuration service (0xFF00 on the Bluetooth SIG base)
pub const UUID_CONFIG_SERVICE: Uuid = Uuid::from_u128(0x0000ff00_0000_1000_8000_00805f9b34fb);

/// The UUID of the key write characteristic, one 28-byte key per write
pub const UUID_KEY_WRITE_CHAR: Uuid = Uuid::from_u128(0x0000ff01_0000_1000_8000_00805f9b34fb);

/// The UUID of the key count characteristic, little-endian u16
pub const UUID_KEY_COUNT_CHAR: Uuid = Uuid::from_u128(0x0000ff02_0000_1000_8000_00805f9b34fb);

/// Scan duration in seconds
pub const DEFAULT_SCAN_DURATION_SECS: u64 = 10;

/// Connection timeout in seconds
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 20;

/// Capacity of the channel carrying advertisements from the radio to the scanner
pub const SCAN_CHANNEL_CAPACITY: usize = 64;
