//! Advertisement key decoding
//!
//! A tracker broadcasting a 28-byte advertisement key uses the first six
//! bytes as its random static BLE address and carries the remaining 22 bytes
//! in its manufacturer data. This module computes both so the expected
//! broadcast can be checked against what a scanner sees.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use base64ct::{Base64, Encoding};
use regex::Regex;

use super::KEY_LENGTH;
use crate::ProvisionError;

/// Length of the derived BLE address.
pub const ADDRESS_LENGTH: usize = 6;

/// Length of the manufacturer data payload carried in the advertisement.
pub const PAYLOAD_LENGTH: usize = KEY_LENGTH - ADDRESS_LENGTH;

/// Both top bits set marks a random static address.
const RANDOM_STATIC_MASK: u8 = 0b1100_0000;

/// Apple company identifier, little-endian.
const APPLE_COMPANY_ID: [u8; 2] = [0x4c, 0x00];

/// Offline finding type and its payload length.
const OFFLINE_FINDING_TYPE: [u8; 2] = [0x12, 0x19];

static ADVERTISEMENT_KEY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Advertisement key:\s*([A-Za-z0-9+/=]+)").expect("valid advertisement key regex")
});

/// The identity a tracker takes on when advertising a given key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivedIdentity {
    /// Address bytes in key order, top bits of byte 0 forced
    pub address: [u8; ADDRESS_LENGTH],
    /// Key bytes 6..28
    pub manufacturer_data: [u8; PAYLOAD_LENGTH],
    /// The two bits of key byte 0 that the address overwrites
    pub key_top_bits: u8,
}

impl DerivedIdentity {
    /// The address as `XX:XX:XX:XX:XX:XX`, most significant byte first.
    pub fn mac_string(&self) -> String {
        self.address
            .iter()
            .rev()
            .map(|b| format!("{:02X}", b))
            .collect::<Vec<_>>()
            .join(":")
    }

    /// Space separated upper-case hex of the manufacturer data.
    pub fn manufacturer_data_string(&self) -> String {
        self.manufacturer_data
            .iter()
            .map(|b| format!("{:02X}", b))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// The 31-byte offline finding advertisement structure the tracker
    /// broadcasts for this key.
    pub fn offline_finding_frame(&self, status: u8) -> [u8; 31] {
        let mut frame = [0u8; 31];
        frame[0] = 0x1e;
        frame[1] = 0xff;
        frame[2..4].copy_from_slice(&APPLE_COMPANY_ID);
        frame[4..6].copy_from_slice(&OFFLINE_FINDING_TYPE);
        frame[6] = status;
        frame[7..29].copy_from_slice(&self.manufacturer_data);
        frame[29] = self.key_top_bits;
        frame[30] = 0x00; // hint
        frame
    }
}

/// Derives the BLE address and manufacturer data for an advertisement key.
pub fn decode_advertisement_key(key: &[u8]) -> Result<DerivedIdentity, ProvisionError> {
    if key.len() != KEY_LENGTH {
        return Err(ProvisionError::InvalidKeyLength {
            expected: KEY_LENGTH,
            actual: key.len(),
        });
    }

    let mut address = [0u8; ADDRESS_LENGTH];
    address.copy_from_slice(&key[..ADDRESS_LENGTH]);
    address[0] |= RANDOM_STATIC_MASK;

    let mut manufacturer_data = [0u8; PAYLOAD_LENGTH];
    manufacturer_data.copy_from_slice(&key[ADDRESS_LENGTH..]);

    Ok(DerivedIdentity {
        address,
        manufacturer_data,
        key_top_bits: key[0] >> 6,
    })
}

/// Extracts the base64 `Advertisement key:` entry from a `.keys` file.
pub fn advertisement_key_from_keys_file(text: &str) -> Result<Vec<u8>, ProvisionError> {
    let encoded = ADVERTISEMENT_KEY_RE
        .captures(text)
        .and_then(|caps| caps.get(1))
        .ok_or(ProvisionError::AdvertisementKeyMissing)?;
    decode_base64_key(encoded.as_str())
}

pub fn decode_base64_key(encoded: &str) -> Result<Vec<u8>, ProvisionError> {
    Base64::decode_vec(encoded.trim()).map_err(|_| ProvisionError::InvalidBase64)
}

/// Returns the first `*.keys` file in `dir`, in path order.
pub fn find_keys_file(dir: &Path) -> Option<PathBuf> {
    let pattern = dir.join("*.keys");
    let mut matches: Vec<PathBuf> = glob::glob(&pattern.to_string_lossy())
        .ok()?
        .filter_map(Result::ok)
        .collect();
    matches.sort();
    matches.into_iter().next()
}
