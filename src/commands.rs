//! CLI commands
//! This module implements the modes of the command line tool on top of the
//! key loader, scanner, selector and provisioning session.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use base64ct::{Base64, Encoding};
use log::{debug, info};

use crate::ProvisionError;
use crate::config::AppConfig;
use crate::core::bluetooth::{
    BleCentral, DeviceScanner, DeviceSelector, ProvisioningOutcome, ProvisioningSession,
    ScanReport, SelectionResolver,
};
use crate::keys::{
    DerivedIdentity, KeyBatch, KeyBatchLoader, KeyFormat, advertisement_key_from_keys_file,
    decode_advertisement_key, find_keys_file,
};
use crate::keys::advertisement::decode_base64_key;
use crate::utils::format_rssi;

/// Parameters of the `configure` mode
#[derive(Debug, Clone)]
pub struct ConfigureArgs {
    pub key_file: PathBuf,
    /// Overrides the format guessed from the file extension
    pub format: Option<KeyFormat>,
    /// Skip scanning and connect to this address
    pub address: Option<String>,
    pub scan_timeout: Duration,
}

/// Where `check-key` takes its advertisement key from
#[derive(Debug, Clone)]
pub enum KeySource {
    /// A `.keys` file, or a directory holding one
    Path(PathBuf),
    /// A base64 advertisement key given directly
    Base64(String),
}

/// Scans for trackers in configuration mode and prints them.
pub async fn scan<C: BleCentral>(
    central: C,
    config: &AppConfig,
    timeout: Duration,
) -> Result<ScanReport, ProvisionError> {
    let scanner = DeviceScanner::new(
        central,
        config.device.name_filter.clone(),
        config.scan.channel_capacity,
    );
    let report = scanner.scan(timeout).await?;

    for other in &report.others {
        debug!(
            "Other device: {} ({}) RSSI: {}",
            other.display_name(),
            other.address,
            format_rssi(other.rssi)
        );
    }

    if report.is_empty() {
        println!(
            "No {} devices found in configuration mode",
            config.device.name_filter
        );
    } else {
        println!("\nFound {} device(s):", report.matches.len());
        for device in &report.matches {
            println!("  {}: {}", device.display_name(), device.address);
            println!("    RSSI: {}", format_rssi(device.rssi));
        }
    }
    Ok(report)
}

/// Loads the key file for `configure`. Runs before any radio work so that
/// input problems are reported without touching the adapter.
pub async fn load_keys(args: &ConfigureArgs) -> Result<KeyBatch, ProvisionError> {
    let format = args
        .format
        .unwrap_or_else(|| KeyFormat::from_path(&args.key_file));
    let batch = KeyBatchLoader::load(&args.key_file, format).await?;

    if batch.is_empty() {
        return Err(ProvisionError::NoValidKeys(args.key_file.clone()));
    }
    println!("Loaded {} keys from {}", batch.len(), args.key_file.display());
    Ok(batch)
}

/// Finds the target device and writes `batch` to it.
pub async fn configure<C, R>(
    central: C,
    config: &AppConfig,
    args: &ConfigureArgs,
    batch: &KeyBatch,
    resolver: R,
) -> Result<ProvisioningOutcome, ProvisionError>
where
    C: BleCentral,
    R: SelectionResolver + Send + 'static,
{
    let mut selector = DeviceSelector::new(resolver, config.device.name_filter.clone());

    let address = match args.address.as_deref() {
        Some(address) => selector.select(Some(address), &[])?,
        None => {
            let scanner = DeviceScanner::new(
                central.clone(),
                config.device.name_filter.clone(),
                config.scan.channel_capacity,
            );
            let report = scanner.scan(args.scan_timeout).await?;
            tokio::task::spawn_blocking(move || selector.select(None, &report.matches))
                .await
                .map_err(|e| ProvisionError::InvalidSelection(e.to_string()))??
        }
    };

    let session = ProvisioningSession::new(
        central,
        config.device.clone(),
        config.session.connect_timeout(),
    );
    let outcome = session.provision(&address, batch.keys()).await?;

    println!(
        "Successfully wrote {}/{} keys (device count: {} -> {})",
        outcome.written, outcome.attempted, outcome.initial_count, outcome.final_count
    );
    Ok(outcome)
}

/// Prints the MAC address and manufacturer data a tracker advertising the
/// given key is expected to use.
pub async fn check_key(source: &KeySource) -> Result<DerivedIdentity> {
    let (key, encoded) = match source {
        KeySource::Base64(encoded) => (decode_base64_key(encoded)?, encoded.trim().to_string()),
        KeySource::Path(path) => {
            let keys_file = resolve_keys_file(path)?;
            println!("Using keys file: {}", keys_file.display());

            let text = tokio::fs::read_to_string(&keys_file)
                .await
                .with_context(|| format!("failed to read {}", keys_file.display()))?;
            let key = advertisement_key_from_keys_file(&text)?;
            let encoded = Base64::encode_string(&key);
            (key, encoded)
        }
    };

    let identity = decode_advertisement_key(&key)?;
    info!("Decoded {}-byte advertisement key", key.len());

    println!("Advertisement key (Base64): {}", encoded);
    println!("Expected MAC address: {}", identity.mac_string());
    println!(
        "Expected Manufacturer Data (22 bytes): {}",
        identity.manufacturer_data_string()
    );
    println!(
        "Expected advertisement: {}",
        hex::encode_upper(identity.offline_finding_frame(0))
    );
    Ok(identity)
}

fn resolve_keys_file(path: &Path) -> Result<PathBuf> {
    if path.is_dir() {
        return find_keys_file(path)
            .ok_or_else(|| anyhow!("No .keys file found in {}", path.display()));
    }
    if !path.exists() {
        return Err(ProvisionError::KeyFileNotFound(path.to_path_buf()).into());
    }
    Ok(path.to_path_buf())
}

/// Writes the default configuration to `path`.
pub async fn config_init(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        return Err(anyhow!(
            "Config file already exists at {} (use --force to overwrite)",
            path.display()
        ));
    }
    AppConfig::default().save_config(path).await?;
    println!("Wrote default configuration to {}", path.display());
    Ok(())
}

pub fn config_show(config: &AppConfig) -> Result<()> {
    let json = serde_json::to_string_pretty(config).context("failed to serialize config")?;
    println!("{}", json);
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::{self, Write};

    use super::*;
    use crate::core::bluetooth::AdvertisedDevice;
    use crate::core::bluetooth::testing::{FakeCentral, advert};
    use crate::keys::{KEY_LENGTH, PLACEHOLDER_KEY};

    struct Never;

    impl SelectionResolver for Never {
        fn choose(&mut self, _candidates: &[AdvertisedDevice]) -> io::Result<String> {
            panic!("selection should not be needed");
        }
    }

    struct Pick(&'static str);

    impl SelectionResolver for Pick {
        fn choose(&mut self, _candidates: &[AdvertisedDevice]) -> io::Result<String> {
            Ok(self.0.to_string())
        }
    }

    fn args(key_file: &Path, address: Option<&str>) -> ConfigureArgs {
        ConfigureArgs {
            key_file: key_file.to_path_buf(),
            format: None,
            address: address.map(str::to_string),
            scan_timeout: Duration::from_millis(50),
        }
    }

    fn key_file(records: &[&[u8]]) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".bin").tempfile().unwrap();
        for record in records {
            file.write_all(record).unwrap();
        }
        file
    }

    #[tokio::test]
    async fn provisions_a_discovered_device_end_to_end() {
        let k1 = [0x11u8; KEY_LENGTH];
        let k2 = [0x22u8; KEY_LENGTH];
        let file = key_file(&[&k1, PLACEHOLDER_KEY, &k2]);
        let central = FakeCentral::new().with_adverts(vec![
            advert("AA:00:00:00:00:09", Some("Speaker"), Some(-80)),
            advert("C0:01:02:03:04:05", Some("HeyStack-Config"), Some(-50)),
        ]);
        let config = AppConfig::default();
        let args = args(file.path(), None);

        let batch = load_keys(&args).await.unwrap();
        assert_eq!(batch.len(), 2);

        let outcome = configure(central.clone(), &config, &args, &batch, Never)
            .await
            .unwrap();

        assert!(outcome.is_success());
        assert_eq!(outcome.written, 2);
        assert_eq!(central.written_keys(), vec![k1.to_vec(), k2.to_vec()]);
        assert_eq!(central.stop_scan_calls(), 1);
        assert_eq!(central.disconnect_calls(), 1);
    }

    #[tokio::test]
    async fn explicit_address_skips_the_scan() {
        let file = key_file(&[&[0x33u8; KEY_LENGTH]]);
        let central = FakeCentral::new();
        let args = args(file.path(), Some("C0:01:02:03:04:05"));

        let batch = load_keys(&args).await.unwrap();
        let outcome = configure(central.clone(), &AppConfig::default(), &args, &batch, Never)
            .await
            .unwrap();

        assert_eq!(outcome.written, 1);
        assert_eq!(central.stop_scan_calls(), 0);
        assert_eq!(central.connect_calls(), 1);
    }

    #[tokio::test]
    async fn several_devices_go_through_the_resolver() {
        let file = key_file(&[&[0x44u8; KEY_LENGTH]]);
        let central = FakeCentral::new().with_adverts(vec![
            advert("C0:00:00:00:00:01", Some("HeyStack-Config"), None),
            advert("C0:00:00:00:00:02", Some("HeyStack-Config"), None),
        ]);
        let args = args(file.path(), None);
        let batch = load_keys(&args).await.unwrap();

        let err = configure(central.clone(), &AppConfig::default(), &args, &batch, Pick("9"))
            .await
            .unwrap_err();
        assert!(matches!(err, ProvisionError::InvalidSelection(_)));
        assert_eq!(central.connect_calls(), 0);
    }

    #[tokio::test]
    async fn no_device_found_ends_the_run() {
        let file = key_file(&[&[0x55u8; KEY_LENGTH]]);
        let central = FakeCentral::new()
            .with_adverts(vec![advert("AA:00:00:00:00:01", Some("Watch"), None)]);
        let args = args(file.path(), None);
        let batch = load_keys(&args).await.unwrap();

        let err = configure(central.clone(), &AppConfig::default(), &args, &batch, Never)
            .await
            .unwrap_err();
        assert!(matches!(err, ProvisionError::DeviceNotFound { .. }));
        assert_eq!(central.connect_calls(), 0);
    }

    #[tokio::test]
    async fn failing_radio_is_not_reported_as_missing_device() {
        let file = key_file(&[&[0x66u8; KEY_LENGTH]]);
        let central = FakeCentral::new().ending_scan();
        let args = ConfigureArgs {
            scan_timeout: Duration::from_secs(5),
            ..args(file.path(), None)
        };
        let batch = load_keys(&args).await.unwrap();

        let err = configure(central.clone(), &AppConfig::default(), &args, &batch, Never)
            .await
            .unwrap_err();
        assert!(matches!(err, ProvisionError::Scan(_)));
        assert_eq!(central.connect_calls(), 0);
    }

    #[tokio::test]
    async fn sentinel_only_file_has_no_valid_keys() {
        let file = key_file(&[PLACEHOLDER_KEY]);
        let err = load_keys(&args(file.path(), None)).await.unwrap_err();
        assert!(matches!(err, ProvisionError::NoValidKeys(_)));
    }

    #[tokio::test]
    async fn hex_key_file_is_detected_by_extension() {
        let mut file = tempfile::Builder::new().suffix(".txt").tempfile().unwrap();
        writeln!(file, "# keys").unwrap();
        writeln!(file, "{}", "ab".repeat(KEY_LENGTH)).unwrap();

        let batch = load_keys(&args(file.path(), None)).await.unwrap();
        assert_eq!(batch.keys()[0].as_bytes(), &[0xAB; KEY_LENGTH]);
    }

    #[tokio::test]
    async fn check_key_reads_keys_directory() {
        let dir = tempfile::tempdir().unwrap();
        let key: Vec<u8> = (0..KEY_LENGTH as u8).collect();
        std::fs::write(
            dir.path().join("tracker.keys"),
            format!("Advertisement key: {}\n", Base64::encode_string(&key)),
        )
        .unwrap();

        let identity = check_key(&KeySource::Path(dir.path().to_path_buf()))
            .await
            .unwrap();
        assert_eq!(identity.mac_string(), "05:04:03:02:01:C0");

        let direct = check_key(&KeySource::Base64(Base64::encode_string(&key)))
            .await
            .unwrap();
        assert_eq!(direct, identity);
    }

    #[tokio::test]
    async fn check_key_rejects_short_keys() {
        let short = Base64::encode_string(&[0u8; 16]);
        assert!(check_key(&KeySource::Base64(short)).await.is_err());
    }

    #[tokio::test]
    async fn config_init_refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        config_init(&path, false).await.unwrap();
        assert!(config_init(&path, false).await.is_err());
        config_init(&path, true).await.unwrap();
    }
}
