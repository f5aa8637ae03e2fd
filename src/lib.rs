//! HeyStack provisioning library
//! Loads public key batches and writes them to HeyStack trackers over BLE.

// Module declarations
pub mod commands;
pub mod config;
pub mod core;
mod error;
pub mod keys;
pub mod logging;
pub mod utils;

pub use error::ProvisionError;
