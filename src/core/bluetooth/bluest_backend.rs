//! `bluest` implementation of the transport traits

use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

use bluest::{Adapter, AdvertisingDevice, Characteristic, Device};
use futures_util::StreamExt;
use log::{debug, error, info};
use regex::Regex;
use tokio::sync::{Mutex, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::core::bluetooth::device::AdvertisedDevice;
use crate::core::bluetooth::transport::{BleCentral, GattLink};
use crate::core::bluetooth::types::BleError;

static MAC_ADDRESS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([0-9A-Fa-f]{2}[:-]){5}([0-9A-Fa-f]{2})").expect("valid MAC address pattern")
});

struct ScanTask {
    cancel_token: CancellationToken,
    handle: JoinHandle<()>,
}

/// Host adapter driven through `bluest`
#[derive(Clone)]
pub struct BluestCentral {
    adapter: Adapter,
    /// Devices heard during the last scan, keyed by address
    devices: Arc<Mutex<HashMap<String, Device>>>,
    scan_task: Arc<Mutex<Option<ScanTask>>>,
}

impl BluestCentral {
    /// Opens the default adapter and waits for it to power on
    pub async fn new() -> Result<Self, BleError> {
        let adapter = Adapter::default()
            .await
            .ok_or(BleError::AdapterUnavailable)?;
        adapter.wait_available().await?;
        info!("Bluetooth adapter is available.");

        Ok(Self {
            adapter,
            devices: Arc::new(Mutex::new(HashMap::new())),
            scan_task: Arc::new(Mutex::new(None)),
        })
    }

    /// Forwards advertisements from the adapter until cancelled or the
    /// receiving side goes away. Whether the adapter accepted the scan is
    /// reported once through `started`.
    async fn internal_scan_task(
        adapter: Adapter,
        devices: Arc<Mutex<HashMap<String, Device>>>,
        events: mpsc::Sender<AdvertisedDevice>,
        cancel_token: CancellationToken,
        started: oneshot::Sender<Result<(), BleError>>,
    ) {
        info!("Starting bluetooth scan");
        let mut scan_stream = match adapter.scan(&[]).await {
            Ok(stream) => {
                let _ = started.send(Ok(()));
                stream
            }
            Err(e) => {
                let _ = started.send(Err(e.into()));
                return;
            }
        };

        loop {
            tokio::select! {
                result = scan_stream.next() => {
                    match result {
                        Some(discovered) => {
                            let advertised = Self::to_advertised(&discovered);
                            debug!("Found device - {:?}", advertised);
                            devices
                                .lock()
                                .await
                                .insert(advertised.address.clone(), discovered.device);

                            tokio::select! {
                                sent = events.send(advertised) => {
                                    if sent.is_err() {
                                        debug!("Scan receiver dropped, ending scan task.");
                                        break;
                                    }
                                }
                                _ = cancel_token.cancelled() => break,
                            }
                        }
                        None => {
                            info!("Bluetooth scan stream has ended.");
                            break;
                        }
                    }
                }
                _ = cancel_token.cancelled() => {
                    break;
                }
            }
        }
    }

    fn to_advertised(discovered: &AdvertisingDevice) -> AdvertisedDevice {
        let device = &discovered.device;
        let address = device_address(&device.id().to_string());
        let name = discovered
            .adv_data
            .local_name
            .clone()
            .or_else(|| device.name().ok());
        let payload = discovered
            .adv_data
            .manufacturer_data
            .as_ref()
            .map(|data| {
                let mut payload = data.company_id.to_le_bytes().to_vec();
                payload.extend_from_slice(&data.data);
                payload
            })
            .unwrap_or_default();

        AdvertisedDevice::new(address, name, discovered.rssi, payload)
    }

    /// Finds a device that was not heard in a previous scan
    async fn find_device(&self, address: &str) -> Result<Device, BleError> {
        info!("Looking up device {}...", address);
        let mut stream = self.adapter.discover_devices(&[]).await?;
        while let Some(device) = stream.next().await {
            let device = device?;
            if device_address(&device.id().to_string()).eq_ignore_ascii_case(address) {
                return Ok(device);
            }
        }
        Err(BleError::DeviceNotFound(address.to_string()))
    }
}

#[async_trait::async_trait]
impl BleCentral for BluestCentral {
    type Link = BluestLink;

    async fn start_scan(&self, events: mpsc::Sender<AdvertisedDevice>) -> Result<(), BleError> {
        if self.scan_task.lock().await.is_some() {
            self.stop_scan().await?;
        }
        self.devices.lock().await.clear();

        let cancel_token = CancellationToken::new();
        let (started_tx, started_rx) = oneshot::channel();
        let handle = tokio::spawn(Self::internal_scan_task(
            self.adapter.clone(),
            self.devices.clone(),
            events,
            cancel_token.clone(),
            started_tx,
        ));

        match started_rx.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                error!("Failed to start scan: {}", e);
                let _ = handle.await;
                return Err(e);
            }
            Err(_) => {
                error!("Scan task exited before reporting its start.");
                return Err(BleError::ScanEnded);
            }
        }

        *self.scan_task.lock().await = Some(ScanTask {
            cancel_token,
            handle,
        });
        info!("Device scan task started.");
        Ok(())
    }

    async fn stop_scan(&self) -> Result<(), BleError> {
        let task = self.scan_task.lock().await.take();
        let Some(task) = task else {
            info!("No active scan task handle found to wait for.");
            return Ok(());
        };

        info!("Stopping Bluetooth scan.");
        task.cancel_token.cancel();
        match task.handle.await {
            Ok(()) => info!("Scan task finished."),
            Err(e) if e.is_cancelled() => info!("Scan task was cancelled."),
            Err(e) => error!("Scan task finished with an unexpected join error: {:?}", e),
        }
        Ok(())
    }

    async fn connect(&self, address: &str) -> Result<BluestLink, BleError> {
        let known = self
            .devices
            .lock()
            .await
            .get(&address.to_uppercase())
            .cloned();
        let device = match known {
            Some(device) => device,
            None => self.find_device(address).await?,
        };

        if !device.is_connected().await {
            info!("Initiating connection to {}...", address);
            self.adapter.connect_device(&device).await?;
        }
        info!("Connected to {}", address);

        Ok(BluestLink {
            adapter: self.adapter.clone(),
            device,
            characteristics: Mutex::new(HashMap::new()),
        })
    }
}

/// A connected `bluest` device
pub struct BluestLink {
    adapter: Adapter,
    device: Device,
    characteristics: Mutex<HashMap<(Uuid, Uuid), Characteristic>>,
}

impl BluestLink {
    async fn characteristic(&self, service: Uuid, uuid: Uuid) -> Result<Characteristic, BleError> {
        if let Some(found) = self.characteristics.lock().await.get(&(service, uuid)) {
            return Ok(found.clone());
        }

        let services = self.device.services().await?;
        let gatt_service = services
            .iter()
            .find(|s| s.uuid() == service)
            .ok_or_else(|| BleError::Other(format!("service {} not found", service)))?;

        let found = gatt_service
            .characteristics()
            .await?
            .into_iter()
            .find(|c| c.uuid() == uuid)
            .ok_or(BleError::CharacteristicNotFound(uuid))?;

        self.characteristics
            .lock()
            .await
            .insert((service, uuid), found.clone());
        Ok(found)
    }
}

#[async_trait::async_trait]
impl GattLink for BluestLink {
    async fn services(&self) -> Result<Vec<Uuid>, BleError> {
        let services = self.device.discover_services().await?;
        Ok(services.iter().map(|s| s.uuid()).collect())
    }

    async fn read(&self, service: Uuid, characteristic: Uuid) -> Result<Vec<u8>, BleError> {
        let characteristic = self.characteristic(service, characteristic).await?;
        Ok(characteristic.read().await?)
    }

    async fn write_with_response(
        &self,
        service: Uuid,
        characteristic: Uuid,
        value: &[u8],
    ) -> Result<(), BleError> {
        // bluest's plain write waits for the acknowledgement
        let characteristic = self.characteristic(service, characteristic).await?;
        characteristic.write(value).await?;
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), BleError> {
        if self.device.is_connected().await {
            info!("Disconnecting from device {}", self.device.id());
            self.adapter.disconnect_device(&self.device).await?;
            info!("Successfully disconnected");
        } else {
            info!("Device {} not connected", self.device.id());
        }
        Ok(())
    }
}

/// Upper-case MAC address found in a platform device id, or the id itself
/// where the platform hides addresses.
pub fn device_address(device_id: &str) -> String {
    MAC_ADDRESS
        .find_iter(device_id)
        .last()
        .map(|m| m.as_str().to_uppercase())
        .unwrap_or_else(|| device_id.to_string())
}
