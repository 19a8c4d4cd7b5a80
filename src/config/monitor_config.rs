use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;
use log::{LevelFilter, error, info, warn};
use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::core::bluetooth::{
    BLUETOOTH_OPERATION_TIMEOUT_SECS, CONNECT_RETRY_DELAY_MS, DEFAULT_SCAN_DURATION_SECS, MAX_CONNECT_RETRIES,
};
use crate::utils::ensure_directory_exists;

const CONFIG_DIR_NAME: &str = "heartrate-le";
const CONFIG_FILE_NAME: &str = "config.json";

/// Heart rate monitor settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Upper bound for each Bluetooth operation, in seconds. 0 waits indefinitely.
    pub operation_timeout_secs: u64,
    /// How long a device lookup may scan before giving up.
    pub scan_timeout_secs: u64,
    /// Connection attempts made by the CLI before reporting failure.
    pub connect_retries: u32,
    pub retry_delay_ms: u64,
    /// Reconnect after the device drops the connection.
    pub reconnect_on_loss: bool,
    /// One of off, error, warn, info, debug, trace.
    pub log_level: String,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        MonitorConfig {
            operation_timeout_secs: BLUETOOTH_OPERATION_TIMEOUT_SECS,
            scan_timeout_secs: DEFAULT_SCAN_DURATION_SECS,
            connect_retries: MAX_CONNECT_RETRIES,
            retry_delay_ms: CONNECT_RETRY_DELAY_MS,
            reconnect_on_loss: false,
            log_level: "info".to_string(),
        }
    }
}

impl MonitorConfig {
    /// Default config file location, `<config dir>/heartrate-le/config.json`.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(CONFIG_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Loads the config from `path`, falling back to defaults when the file does not exist.
    pub async fn load_config(path: &Path) -> Result<Self> {
        if !path.exists() {
            warn!("Config file not found at {:?}, using default.", path);
            return Ok(Self::default());
        }

        let config_json = fs::read_to_string(path).await?;
        let config: Self = serde_json::from_str(&config_json)?;

        info!("Config loaded from {:?}", path);
        Ok(config)
    }

    /// Saves the config to `path`, creating its directory if needed.
    pub async fn save_config(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            ensure_directory_exists(parent).await?;
        }

        let config_json = match serde_json::to_string_pretty(&self) {
            Ok(json) => json,
            Err(e) => {
                error!("Failed to serialize config to JSON: {}", e);
                return Err(e.into());
            }
        };

        fs::write(path, config_json).await?;
        info!("Config saved to {:?}", path);
        Ok(())
    }

    pub fn operation_timeout(&self) -> Option<Duration> {
        (self.operation_timeout_secs > 0).then(|| Duration::from_secs(self.operation_timeout_secs))
    }

    pub fn scan_timeout(&self) -> Duration {
        Duration::from_secs(self.scan_timeout_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    /// Parsed `log_level`. Unrecognized values fall back to `Info`.
    pub fn log_level(&self) -> LevelFilter {
        self.log_level.parse().unwrap_or(LevelFilter::Info)
    }
}
