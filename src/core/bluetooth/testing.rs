//! In-memory transport used by the unit tests

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::core::bluetooth::constants::{
    UUID_CONFIG_SERVICE, UUID_GENERIC_ACCESS_SERVICE, UUID_GENERIC_ATTRIBUTE_SERVICE,
    UUID_KEY_COUNT_CHAR, UUID_KEY_WRITE_CHAR,
};
use crate::core::bluetooth::device::AdvertisedDevice;
use crate::core::bluetooth::transport::{BleCentral, GattLink};
use crate::core::bluetooth::types::BleError;

pub fn advert(address: &str, name: Option<&str>, rssi: Option<i16>) -> AdvertisedDevice {
    AdvertisedDevice::new(address, name.map(str::to_string), rssi, vec![0x4c, 0x00])
}

struct FakeConfig {
    adverts: Vec<AdvertisedDevice>,
    repeat_adverts: bool,
    fail_scan: bool,
    end_scan_early: bool,
    fail_connect: bool,
    connect_delay: Option<Duration>,
    services: Vec<Uuid>,
    failing_writes: HashSet<usize>,
    fail_reads: bool,
    short_count_payload: bool,
    initial_key_count: u16,
}

#[derive(Default)]
struct FakeState {
    stop_scan_calls: AtomicUsize,
    connect_calls: AtomicUsize,
    disconnect_calls: AtomicUsize,
    write_attempts: AtomicUsize,
    written: Mutex<Vec<Vec<u8>>>,
    scan_cancel: Mutex<Option<CancellationToken>>,
}

/// Scriptable [`BleCentral`] that records what the code under test did
#[derive(Clone)]
pub struct FakeCentral {
    config: Arc<FakeConfig>,
    state: Arc<FakeState>,
}

impl FakeCentral {
    pub fn new() -> Self {
        Self {
            config: Arc::new(FakeConfig {
                adverts: Vec::new(),
                repeat_adverts: false,
                fail_scan: false,
                end_scan_early: false,
                fail_connect: false,
                connect_delay: None,
                services: vec![
                    UUID_GENERIC_ACCESS_SERVICE,
                    UUID_GENERIC_ATTRIBUTE_SERVICE,
                    UUID_CONFIG_SERVICE,
                ],
                failing_writes: HashSet::new(),
                fail_reads: false,
                short_count_payload: false,
                initial_key_count: 0,
            }),
            state: Arc::new(FakeState::default()),
        }
    }

    fn configure(mut self, f: impl FnOnce(&mut FakeConfig)) -> Self {
        f(Arc::get_mut(&mut self.config).expect("configure the fake before cloning it"));
        self
    }

    pub fn with_adverts(self, adverts: Vec<AdvertisedDevice>) -> Self {
        self.configure(|c| c.adverts = adverts)
    }

    /// Keep replaying the adverts until the scan is stopped
    pub fn repeat_adverts(self) -> Self {
        self.configure(|c| c.repeat_adverts = true)
    }

    pub fn failing_scan(self) -> Self {
        self.configure(|c| c.fail_scan = true)
    }

    /// The producer drops its sender once the adverts are sent, like a
    /// radio that fails after the scan started
    pub fn ending_scan(self) -> Self {
        self.configure(|c| c.end_scan_early = true)
    }

    pub fn failing_connect(self) -> Self {
        self.configure(|c| c.fail_connect = true)
    }

    pub fn with_connect_delay(self, delay: Duration) -> Self {
        self.configure(|c| c.connect_delay = Some(delay))
    }

    pub fn with_services(self, services: Vec<Uuid>) -> Self {
        self.configure(|c| c.services = services)
    }

    /// Fail the given writes, counted from 1
    pub fn failing_writes(self, writes: impl IntoIterator<Item = usize>) -> Self {
        self.configure(|c| c.failing_writes = writes.into_iter().collect())
    }

    pub fn failing_reads(self) -> Self {
        self.configure(|c| c.fail_reads = true)
    }

    pub fn short_count_payload(self) -> Self {
        self.configure(|c| c.short_count_payload = true)
    }

    pub fn with_key_count(self, count: u16) -> Self {
        self.configure(|c| c.initial_key_count = count)
    }

    pub fn stop_scan_calls(&self) -> usize {
        self.state.stop_scan_calls.load(Ordering::SeqCst)
    }

    pub fn connect_calls(&self) -> usize {
        self.state.connect_calls.load(Ordering::SeqCst)
    }

    pub fn disconnect_calls(&self) -> usize {
        self.state.disconnect_calls.load(Ordering::SeqCst)
    }

    pub fn write_attempts(&self) -> usize {
        self.state.write_attempts.load(Ordering::SeqCst)
    }

    pub fn written_keys(&self) -> Vec<Vec<u8>> {
        self.state.written.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl BleCentral for FakeCentral {
    type Link = FakeLink;

    async fn start_scan(&self, events: mpsc::Sender<AdvertisedDevice>) -> Result<(), BleError> {
        if self.config.fail_scan {
            return Err(BleError::Other("adapter refused to scan".to_string()));
        }

        let cancel = CancellationToken::new();
        *self.state.scan_cancel.lock().unwrap() = Some(cancel.clone());

        let config = self.config.clone();
        tokio::spawn(async move {
            loop {
                for advert in &config.adverts {
                    tokio::select! {
                        sent = events.send(advert.clone()) => {
                            if sent.is_err() {
                                return;
                            }
                        }
                        _ = cancel.cancelled() => return,
                    }
                    tokio::time::sleep(Duration::from_millis(1)).await;
                }
                if config.end_scan_early {
                    return;
                }
                if !config.repeat_adverts {
                    // Keep the channel open like a radio that has gone quiet
                    cancel.cancelled().await;
                    return;
                }
            }
        });
        Ok(())
    }

    async fn stop_scan(&self) -> Result<(), BleError> {
        self.state.stop_scan_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(cancel) = self.state.scan_cancel.lock().unwrap().take() {
            cancel.cancel();
        }
        Ok(())
    }

    async fn connect(&self, address: &str) -> Result<FakeLink, BleError> {
        self.state.connect_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.config.connect_delay {
            tokio::time::sleep(delay).await;
        }
        if self.config.fail_connect {
            return Err(BleError::DeviceNotFound(address.to_string()));
        }
        Ok(FakeLink {
            config: self.config.clone(),
            state: self.state.clone(),
        })
    }
}

pub struct FakeLink {
    config: Arc<FakeConfig>,
    state: Arc<FakeState>,
}

#[async_trait::async_trait]
impl GattLink for FakeLink {
    async fn services(&self) -> Result<Vec<Uuid>, BleError> {
        Ok(self.config.services.clone())
    }

    async fn read(&self, service: Uuid, characteristic: Uuid) -> Result<Vec<u8>, BleError> {
        if self.config.fail_reads {
            return Err(BleError::Other("read not permitted".to_string()));
        }
        if service != UUID_CONFIG_SERVICE || characteristic != UUID_KEY_COUNT_CHAR {
            return Err(BleError::CharacteristicNotFound(characteristic));
        }
        let written = self.state.written.lock().unwrap().len() as u16;
        let count = self.config.initial_key_count + written;
        if self.config.short_count_payload {
            return Ok(vec![count as u8]);
        }
        Ok(count.to_le_bytes().to_vec())
    }

    async fn write_with_response(
        &self,
        service: Uuid,
        characteristic: Uuid,
        value: &[u8],
    ) -> Result<(), BleError> {
        let attempt = self.state.write_attempts.fetch_add(1, Ordering::SeqCst) + 1;
        if service != UUID_CONFIG_SERVICE || characteristic != UUID_KEY_WRITE_CHAR {
            return Err(BleError::CharacteristicNotFound(characteristic));
        }
        if self.config.failing_writes.contains(&attempt) {
            return Err(BleError::Other(format!("write {} rejected", attempt)));
        }
        self.state.written.lock().unwrap().push(value.to_vec());
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), BleError> {
        self.state.disconnect_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
