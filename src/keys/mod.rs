//! Key material handling
//! Loading public key batches from disk and deriving the BLE identity of an
//! advertisement key.

pub mod advertisement;
pub mod loader;

pub use advertisement::{
    DerivedIdentity, advertisement_key_from_keys_file, decode_advertisement_key, find_keys_file,
};
pub use loader::{KeyBatch, KeyBatchLoader, KeyFormat};

/// Length in bytes of one public key record.
pub const KEY_LENGTH: usize = 28;

/// Placeholder record left in firmware images and key files.
pub const PLACEHOLDER_KEY: &[u8; KEY_LENGTH] = b"OFFLINEFINDINGPUBLICKEYHERE!";

/// Terminator record marking the end of a key list.
pub const END_OF_KEYS: &[u8; KEY_LENGTH] = b"ENDOFKEYSENDOFKEYSENDOFKEYS!";

/// One 28-byte public key as written to the device.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyRecord([u8; KEY_LENGTH]);

impl KeyRecord {
    /// Returns true for the reserved placeholder and end-of-keys records.
    pub fn is_sentinel(&self) -> bool {
        &self.0 == PLACEHOLDER_KEY || &self.0 == END_OF_KEYS
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LENGTH] {
        &self.0
    }
}

impl TryFrom<&[u8]> for KeyRecord {
    type Error = crate::ProvisionError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        let array: [u8; KEY_LENGTH] =
            bytes
                .try_into()
                .map_err(|_| crate::ProvisionError::InvalidKeyLength {
                    expected: KEY_LENGTH,
                    actual: bytes.len(),
                })?;
        Ok(Self(array))
    }
}

impl AsRef<[u8]> for KeyRecord {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl std::fmt::Debug for KeyRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "KeyRecord({})", hex::encode(self.0))
    }
}
