//! Bluetooth functionality for HeyStack provisioning
//! This module handles scanning for trackers in configuration mode, choosing
//! one, and writing keys to it over GATT.

mod bluest_backend;
mod constants;
mod device;
mod scanner;
mod selector;
mod session;
mod transport;
mod types;

#[cfg(test)]
pub(crate) mod testing;

// Re-export types that should be publicly accessible
pub use bluest_backend::{BluestCentral, BluestLink, device_address};
pub use constants::*; // Re-export all constants
pub use device::AdvertisedDevice;
pub use scanner::DeviceScanner;
pub use selector::{DeviceSelector, PromptResolver, SelectionResolver};
pub use session::ProvisioningSession;
pub use transport::{BleCentral, GattLink};
pub use types::{BleError, CountRead, ProvisioningOutcome, ScanReport};
