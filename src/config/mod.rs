pub mod device_config;
pub mod scan_config;
pub mod session_config;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::utils::ensure_directory_exists;

pub use device_config::DeviceConfig;
pub use scan_config::ScanConfig;
pub use session_config::SessionConfig;

const CONFIG_DIR_NAME: &str = "heystack-provision";
const CONFIG_FILE_NAME: &str = "config.json";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub device: DeviceConfig,
    pub scan: ScanConfig,
    pub session: SessionConfig,
}

impl AppConfig {
    /// `<config dir>/heystack-provision/config.json` for the current user.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Loads the config from a configuration file.
    pub async fn load_config(file_path: &Path) -> Result<Self> {
        if !file_path.exists() {
            warn!(
                "Config file not found at {:?}, using default.",
                file_path.display()
            );
            return Ok(Self::default());
        }

        let config_json = fs::read_to_string(file_path)
            .await
            .with_context(|| format!("failed to read {}", file_path.display()))?;
        let config: Self = serde_json::from_str(&config_json)
            .with_context(|| format!("invalid config file {}", file_path.display()))?;

        info!("Config loaded from {:?}", file_path.display());
        Ok(config)
    }

    /// Saves the current config to a configuration file.
    pub async fn save_config(&self, file_path: &Path) -> Result<()> {
        if let Some(config_dir) = file_path.parent() {
            ensure_directory_exists(config_dir).await?;
        }

        let config_json = match serde_json::to_string_pretty(&self) {
            Ok(json) => json,
            Err(e) => {
                error!("Failed to serialize config to JSON: {}", e);
                return Err(e.into());
            }
        };

        fs::write(file_path, config_json).await?;
        info!("Config saved to {:?}", file_path.display());
        Ok(())
    }
}
