//! Transport traits
//! The scanner and the provisioning session talk to the radio through these
//! traits so that the protocol logic does not depend on a particular BLE stack.

use tokio::sync::mpsc;
use uuid::Uuid;

use crate::core::bluetooth::device::AdvertisedDevice;
use crate::core::bluetooth::types::BleError;

/// The host side of the radio: scanning and opening connections.
#[async_trait::async_trait]
pub trait BleCentral: Clone + Send + Sync + 'static {
    type Link: GattLink;

    /// Start an active scan. Every advertisement heard is sent to `events`
    /// until [`BleCentral::stop_scan`] is called.
    async fn start_scan(&self, events: mpsc::Sender<AdvertisedDevice>) -> Result<(), BleError>;

    /// Stop a running scan. Stopping an idle scanner is not an error.
    async fn stop_scan(&self) -> Result<(), BleError>;

    /// Open a GATT connection to the device at `address`.
    async fn connect(&self, address: &str) -> Result<Self::Link, BleError>;
}

/// One open GATT connection.
#[async_trait::async_trait]
pub trait GattLink: Send + Sync {
    /// UUIDs of the primary services the device exposes
    async fn services(&self) -> Result<Vec<Uuid>, BleError>;

    async fn read(&self, service: Uuid, characteristic: Uuid) -> Result<Vec<u8>, BleError>;

    /// Write `value` and wait for the device to acknowledge it
    async fn write_with_response(
        &self,
        service: Uuid,
        characteristic: Uuid,
        value: &[u8],
    ) -> Result<(), BleError>;

    async fn disconnect(&self) -> Result<(), BleError>;
}
