//! Provisioning session
//! Connects to one tracker, checks its configuration service and writes the
//! key batch to it one acknowledged write at a time.

use std::time::Duration;

use log::{error, info, warn};

use crate::ProvisionError;
use crate::config::DeviceConfig;
use crate::core::bluetooth::transport::{BleCentral, GattLink};
use crate::core::bluetooth::types::{CountRead, ProvisioningOutcome};
use crate::keys::KEY_LENGTH;

pub struct ProvisioningSession<C: BleCentral> {
    central: C,
    device: DeviceConfig,
    connect_timeout: Duration,
}

impl<C: BleCentral> ProvisioningSession<C> {
    pub fn new(central: C, device: DeviceConfig, connect_timeout: Duration) -> Self {
        Self {
            central,
            device,
            connect_timeout,
        }
    }

    /// Writes `keys` to the device at `address`.
    ///
    /// Connection and missing-service failures end the session with an
    /// error. Key count reads and individual key writes never do: they are
    /// logged and reflected in the returned outcome.
    pub async fn provision<K: AsRef<[u8]>>(
        &self,
        address: &str,
        keys: &[K],
    ) -> Result<ProvisioningOutcome, ProvisionError> {
        info!("Connecting to {}...", address);
        let link = match tokio::time::timeout(self.connect_timeout, self.central.connect(address)).await {
            Ok(Ok(link)) => link,
            Ok(Err(source)) => {
                return Err(ProvisionError::Connect {
                    address: address.to_string(),
                    source,
                });
            }
            Err(_) => {
                return Err(ProvisionError::ConnectTimeout {
                    address: address.to_string(),
                    timeout: self.connect_timeout,
                });
            }
        };
        info!("Connected!");

        let result = self.run(&link, keys).await;

        if let Err(e) = link.disconnect().await {
            warn!("Failed to disconnect from {}: {}", address, e);
        }
        result
    }

    async fn run<K: AsRef<[u8]>>(
        &self,
        link: &C::Link,
        keys: &[K],
    ) -> Result<ProvisioningOutcome, ProvisionError> {
        self.check_topology(link).await?;

        let initial_count = self.read_key_count(link).await;
        match &initial_count {
            CountRead::Known(count) => info!("Current key count: {}", count),
            CountRead::Degraded(reason) => warn!("Could not read key count: {}", reason),
        }

        let mut outcome = ProvisioningOutcome {
            attempted: keys.len(),
            written: 0,
            failed: 0,
            skipped: 0,
            initial_count,
            final_count: CountRead::Degraded("not read".to_string()),
        };

        for (i, key) in keys.iter().enumerate() {
            let key = key.as_ref();
            if key.len() != KEY_LENGTH {
                warn!("Key {} has invalid length {}, skipping", i, key.len());
                outcome.skipped += 1;
                continue;
            }

            match link
                .write_with_response(self.device.service_uuid, self.device.key_write_uuid, key)
                .await
            {
                Ok(()) => {
                    outcome.written += 1;
                    info!("Wrote key {}/{}", i + 1, keys.len());
                }
                Err(e) => {
                    outcome.failed += 1;
                    error!("Error writing key {}: {}", i, e);
                }
            }
        }

        outcome.final_count = self.read_key_count(link).await;
        match &outcome.final_count {
            CountRead::Known(count) => info!("Final key count: {}", count),
            CountRead::Degraded(reason) => warn!("Could not read final key count: {}", reason),
        }

        info!("Successfully wrote {}/{} keys", outcome.written, keys.len());
        Ok(outcome)
    }

    async fn check_topology(&self, link: &C::Link) -> Result<(), ProvisionError> {
        let services = link.services().await.map_err(ProvisionError::Discovery)?;
        if !services.contains(&self.device.service_uuid) {
            for service in &services {
                info!("Available service: {}", service);
            }
            return Err(ProvisionError::ServiceNotFound {
                service: self.device.service_uuid,
                available: services,
            });
        }
        info!("Found configuration service: {}", self.device.service_uuid);
        Ok(())
    }

    async fn read_key_count(&self, link: &C::Link) -> CountRead {
        match link
            .read(self.device.service_uuid, self.device.key_count_uuid)
            .await
        {
            Ok(data) => match data.get(..2) {
                Some(&[lo, hi]) => CountRead::Known(u16::from_le_bytes([lo, hi])),
                _ => CountRead::Degraded(format!("expected 2 bytes, got {}", data.len())),
            },
            Err(e) => CountRead::Degraded(e.to_string()),
        }
    }
}
