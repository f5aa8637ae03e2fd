//! Key file loading
//! Binary files hold back-to-back 28-byte records, text files hold one
//! hex-encoded key per line.

use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use tokio::fs;

use super::{KEY_LENGTH, KeyRecord};
use crate::ProvisionError;

/// On-disk layout of a key file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum KeyFormat {
    /// Concatenated 28-byte records
    #[value(name = "bin")]
    Binary,
    /// One hex-encoded key per line, `#` comments allowed
    #[value(name = "hex")]
    HexText,
}

impl KeyFormat {
    /// Picks the format from the file extension: `.txt` is hex text,
    /// everything else binary.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("txt") => Self::HexText,
            _ => Self::Binary,
        }
    }
}

/// An ordered batch of keys ready to be written, in file order.
#[derive(Debug, Clone, Default)]
pub struct KeyBatch {
    keys: Vec<KeyRecord>,
    /// Placeholder or end-of-keys records that were dropped
    pub sentinels_skipped: usize,
    /// Text lines that were not valid 28-byte hex keys
    pub malformed_skipped: usize,
    /// Bytes left over after the last complete binary record
    pub trailing_bytes: usize,
}

impl KeyBatch {
    pub fn keys(&self) -> &[KeyRecord] {
        &self.keys
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    fn push(&mut self, key: KeyRecord) {
        if key.is_sentinel() {
            debug!("Skipping sentinel record");
            self.sentinels_skipped += 1;
        } else {
            self.keys.push(key);
        }
    }
}

/// Reads key files into a [`KeyBatch`].
pub struct KeyBatchLoader;

impl KeyBatchLoader {
    /// Loads the key file at `path`.
    ///
    /// A missing file is the only fatal condition. Partial records and bad
    /// lines are skipped with a warning; an empty batch is returned as-is.
    pub async fn load(path: &Path, format: KeyFormat) -> Result<KeyBatch, ProvisionError> {
        if !path.exists() {
            return Err(ProvisionError::KeyFileNotFound(PathBuf::from(path)));
        }

        let batch = match format {
            KeyFormat::Binary => {
                let data = fs::read(path).await?;
                Self::parse_binary(&data)
            }
            KeyFormat::HexText => {
                let text = fs::read_to_string(path).await?;
                Self::parse_hex_text(&text)
            }
        };

        info!(
            "Loaded {} keys from {} ({} sentinel, {} malformed skipped)",
            batch.len(),
            path.display(),
            batch.sentinels_skipped,
            batch.malformed_skipped
        );
        Ok(batch)
    }

    pub fn parse_binary(data: &[u8]) -> KeyBatch {
        let mut batch = KeyBatch::default();

        let chunks = data.chunks_exact(KEY_LENGTH);
        let remainder = chunks.remainder().len();
        if remainder != 0 {
            warn!(
                "File size ({}) is not a multiple of {}, dropping {} trailing bytes",
                data.len(),
                KEY_LENGTH,
                remainder
            );
            batch.trailing_bytes = remainder;
        }

        for chunk in chunks {
            if let Ok(key) = KeyRecord::try_from(chunk) {
                batch.push(key);
            }
        }
        batch
    }

    pub fn parse_hex_text(text: &str) -> KeyBatch {
        let mut batch = KeyBatch::default();

        for (index, line) in text.lines().enumerate() {
            let line_num = index + 1;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let compact: String = line.chars().filter(|c| !c.is_ascii_whitespace()).collect();
            let bytes = match hex::decode(&compact) {
                Ok(bytes) => bytes,
                Err(e) => {
                    warn!("Line {} is not valid hex: {}", line_num, e);
                    batch.malformed_skipped += 1;
                    continue;
                }
            };

            match KeyRecord::try_from(bytes.as_slice()) {
                Ok(key) => batch.push(key),
                Err(_) => {
                    warn!(
                        "Line {} has invalid length {}, skipping",
                        line_num,
                        bytes.len()
                    );
                    batch.malformed_skipped += 1;
                }
            }
        }
        batch
    }
}
