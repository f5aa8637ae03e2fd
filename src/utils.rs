use std::path::Path;

use anyhow::{Context, Result};
use log::info;
use tokio::fs;

/// Creates `path` and its parents if missing. Calling it again is a no-op.
pub async fn ensure_directory_exists<P: AsRef<Path>>(path: P) -> Result<()> {
    let path = path.as_ref();
    if path.exists() {
        return Ok(());
    }
    fs::create_dir_all(path)
        .await
        .with_context(|| format!("failed to create directory {}", path.display()))?;
    info!("Created directory at: {:?}", path);
    Ok(())
}

/// `-60 dBm`, or `N/A` when the radio did not report a signal strength.
pub fn format_rssi(rssi: Option<i16>) -> String {
    rssi.map(|r| format!("{} dBm", r))
        .unwrap_or_else(|| "N/A".to_string())
}
