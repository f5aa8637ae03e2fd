//! Core functionality for HeyStack provisioning
//! This module contains the BLE discovery and provisioning protocol

pub mod bluetooth;

// Re-export commonly used types
pub use bluetooth::{DeviceScanner, DeviceSelector, ProvisioningOutcome, ProvisioningSession};
