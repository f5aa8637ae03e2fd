//! Bluetooth device representation and related functionality

/// An advertisement observed during a scan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdvertisedDevice {
    /// The address of the device (MAC address on most platforms, a platform UUID on macOS)
    pub address: String,
    /// The advertised local name, if any
    pub name: Option<String>,
    /// The signal strength (RSSI) of the advertisement
    pub rssi: Option<i16>,
    /// Manufacturer specific data, company identifier first (little-endian)
    pub payload: Vec<u8>,
}

impl AdvertisedDevice {
    /// Creates a new AdvertisedDevice instance
    pub fn new(address: impl Into<String>, name: Option<String>, rssi: Option<i16>, payload: Vec<u8>) -> Self {
        Self {
            address: address.into(),
            name,
            rssi,
            payload,
        }
    }

    /// Returns true if the advertised name contains `pattern`
    pub fn name_contains(&self, pattern: &str) -> bool {
        self.name
            .as_ref()
            .map(|name| name.contains(pattern))
            .unwrap_or(false)
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("Unknown")
    }
}
