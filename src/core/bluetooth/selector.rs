//! Target selection
//! Picks the one device to provision from an explicit address or from the
//! devices found by a scan.

use std::io;

use dialoguer::Select;
use log::info;

use crate::ProvisionError;
use crate::core::bluetooth::device::AdvertisedDevice;

/// Asks someone to pick one of several candidates.
pub trait SelectionResolver {
    /// Returns the raw answer, expected to be an index into `candidates`.
    fn choose(&mut self, candidates: &[AdvertisedDevice]) -> io::Result<String>;
}

/// Interactive list on the terminal. Blocks until an entry is picked, so
/// call it off the async runtime.
pub struct PromptResolver;

impl SelectionResolver for PromptResolver {
    fn choose(&mut self, candidates: &[AdvertisedDevice]) -> io::Result<String> {
        let items: Vec<String> = candidates
            .iter()
            .map(|device| format!("{}: {}", device.display_name(), device.address))
            .collect();

        let picked = Select::new()
            .with_prompt(format!("Found {} devices, select one", candidates.len()))
            .items(&items)
            .default(0)
            .interact_opt()
            .map_err(io::Error::other)?;

        match picked {
            Some(index) => Ok(index.to_string()),
            None => Err(io::Error::new(
                io::ErrorKind::Interrupted,
                "selection cancelled",
            )),
        }
    }
}

pub struct DeviceSelector<R: SelectionResolver> {
    resolver: R,
    device_name: String,
}

impl<R: SelectionResolver> DeviceSelector<R> {
    pub fn new(resolver: R, device_name: impl Into<String>) -> Self {
        Self {
            resolver,
            device_name: device_name.into(),
        }
    }

    /// Resolves the address to provision.
    ///
    /// An explicit address is trusted as-is. Otherwise a single candidate is
    /// taken directly and several are handed to the resolver.
    pub fn select(
        &mut self,
        explicit: Option<&str>,
        candidates: &[AdvertisedDevice],
    ) -> Result<String, ProvisionError> {
        if let Some(address) = explicit {
            info!("Using address {} given on the command line", address);
            return Ok(address.to_string());
        }

        match candidates {
            [] => Err(ProvisionError::DeviceNotFound {
                name: self.device_name.clone(),
            }),
            [only] => {
                info!("Found device: {} ({})", only.display_name(), only.address);
                Ok(only.address.clone())
            }
            _ => {
                let answer = self
                    .resolver
                    .choose(candidates)
                    .map_err(|e| ProvisionError::InvalidSelection(e.to_string()))?;
                let answer = answer.trim();

                let device = answer
                    .parse::<usize>()
                    .ok()
                    .and_then(|index| candidates.get(index))
                    .ok_or_else(|| ProvisionError::InvalidSelection(answer.to_string()))?;
                info!("Selected device: {} ({})", device.display_name(), device.address);
                Ok(device.address.clone())
            }
        }
    }
}
