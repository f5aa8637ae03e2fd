use std::collections::HashSet;
use std::time::Duration;

use log::{debug, info, warn};
use tokio::sync::mpsc;

use crate::ProvisionError;
use crate::core::bluetooth::device::AdvertisedDevice;
use crate::core::bluetooth::transport::BleCentral;
use crate::core::bluetooth::types::{BleError, ScanReport};

/// Collects advertisements from a [`BleCentral`] for a bounded window and
/// keeps the devices whose name matches.
pub struct DeviceScanner<C: BleCentral> {
    central: C,
    name_filter: String,
    channel_capacity: usize,
}

impl<C: BleCentral> DeviceScanner<C> {
    pub fn new(central: C, name_filter: impl Into<String>, channel_capacity: usize) -> Self {
        Self {
            central,
            name_filter: name_filter.into(),
            channel_capacity: channel_capacity.max(1),
        }
    }

    /// Scans for `timeout` and returns what was heard.
    ///
    /// Finding nothing is not an error, but the radio going quiet by closing
    /// the advertisement channel before the window ends is. The radio scan is
    /// stopped before returning, and also when this future is dropped early.
    pub async fn scan(&self, timeout: Duration) -> Result<ScanReport, ProvisionError> {
        info!(
            "Scanning for '{}' devices ({}s)...",
            self.name_filter,
            timeout.as_secs_f32()
        );

        let (events_tx, events_rx) = mpsc::channel(self.channel_capacity);
        self.central
            .start_scan(events_tx)
            .await
            .map_err(ProvisionError::Scan)?;
        let guard = ScanGuard::new(self.central.clone());

        let report = self.collect(events_rx, timeout).await;

        guard.release().await;
        let report = report.map_err(ProvisionError::Scan)?;
        info!(
            "Scan complete: {} matching, {} other devices",
            report.matches.len(),
            report.others.len()
        );
        Ok(report)
    }

    async fn collect(
        &self,
        mut events: mpsc::Receiver<AdvertisedDevice>,
        window: Duration,
    ) -> Result<ScanReport, BleError> {
        let mut report = ScanReport::default();
        let mut seen_matches = HashSet::new();
        let mut seen_others = HashSet::new();

        // `sleep` saturates durations that overflow the clock
        let window = tokio::time::sleep(window);
        tokio::pin!(window);

        loop {
            tokio::select! {
                _ = &mut window => break,
                event = events.recv() => {
                    let Some(device) = event else {
                        warn!("Advertisement channel closed before the scan window ended.");
                        return Err(BleError::ScanEnded);
                    };

                    if device.name_contains(&self.name_filter) {
                        if seen_matches.insert(device.address.clone()) {
                            info!(
                                "Found {} ({}) RSSI: {:?}",
                                device.display_name(),
                                device.address,
                                device.rssi
                            );
                            report.matches.push(device);
                        }
                    } else if seen_others.insert(device.address.clone()) {
                        debug!("Ignoring {} ({})", device.display_name(), device.address);
                        report.others.push(device);
                    }
                }
            }
        }
        Ok(report)
    }
}

/// Stops the scan on every exit path. [`ScanGuard::release`] stops it in
/// line; dropping an unreleased guard hands the stop to the runtime.
struct ScanGuard<C: BleCentral> {
    central: Option<C>,
}

impl<C: BleCentral> ScanGuard<C> {
    fn new(central: C) -> Self {
        Self {
            central: Some(central),
        }
    }

    async fn release(mut self) {
        if let Some(central) = self.central.take() {
            if let Err(e) = central.stop_scan().await {
                warn!("Failed to stop scan: {}", e);
            }
        }
    }
}

impl<C: BleCentral> Drop for ScanGuard<C> {
    fn drop(&mut self) {
        let Some(central) = self.central.take() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                debug!("Scan interrupted, stopping it in the background.");
                handle.spawn(async move {
                    if let Err(e) = central.stop_scan().await {
                        warn!("Failed to stop interrupted scan: {}", e);
                    }
                });
            }
            Err(_) => warn!("Scan interrupted outside a runtime, it could not be stopped."),
        }
    }
}
