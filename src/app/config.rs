use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::app::error::AppError;

pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_MAX_OUTPUT_BYTES: usize = 4 * 1024 * 1024;
pub const DEFAULT_UI_DUMP_ATTEMPTS: u32 = 10;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AdbSettings {
    /// Explicit adb executable. Empty means resolve from `ANDROID_HOME`, then `PATH`.
    pub command_path: String,
    pub timeout_secs: u64,
    pub max_output_bytes: usize,
}

impl Default for AdbSettings {
    fn default() -> Self {
        Self {
            command_path: String::new(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
        }
    }
}

impl AdbSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct UiDumpSettings {
    pub max_attempts: u32,
}

impl Default for UiDumpSettings {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_UI_DUMP_ATTEMPTS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OrientationSettings {
    pub nudge_delay_ms: u64,
    pub settle_delay_ms: u64,
}

impl Default for OrientationSettings {
    fn default() -> Self {
        Self {
            nudge_delay_ms: 100,
            settle_delay_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct BridgeConfig {
    #[serde(default)]
    pub adb: AdbSettings,
    #[serde(default)]
    pub ui_dump: UiDumpSettings,
    #[serde(default)]
    pub orientation: OrientationSettings,
}

pub fn config_path() -> PathBuf {
    if let Ok(path) = std::env::var("ADB_BRIDGE_CONFIG_PATH") {
        return PathBuf::from(path);
    }
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    PathBuf::from(home).join(".adb_bridge_config.json")
}

pub fn load_config() -> Result<BridgeConfig, AppError> {
    load_config_from_path(&config_path())
}

pub fn load_config_from_path(path: &Path) -> Result<BridgeConfig, AppError> {
    if !path.exists() {
        return Ok(BridgeConfig::default());
    }
    let raw = fs::read_to_string(path)
        .map_err(|err| AppError::system(format!("Failed to read config: {err}"), ""))?;
    let config: BridgeConfig = serde_json::from_str(&raw)
        .map_err(|err| AppError::system(format!("Failed to parse config: {err}"), ""))?;
    Ok(validate_config(config))
}

pub fn save_config_to_path(config: &BridgeConfig, path: &Path) -> Result<(), AppError> {
    if let Some(parent) = path.parent() {
        let _ = fs::create_dir_all(parent);
    }
    let payload = serde_json::to_string_pretty(config)
        .map_err(|err| AppError::system(format!("Failed to serialize config: {err}"), ""))?;
    fs::write(path, payload)
        .map_err(|err| AppError::system(format!("Failed to write config: {err}"), ""))?;
    Ok(())
}

pub fn validate_config(mut config: BridgeConfig) -> BridgeConfig {
    if config.adb.timeout_secs == 0 {
        config.adb.timeout_secs = DEFAULT_TIMEOUT_SECS;
    }
    if config.adb.max_output_bytes == 0 {
        config.adb.max_output_bytes = DEFAULT_MAX_OUTPUT_BYTES;
    }
    if config.ui_dump.max_attempts == 0 {
        config.ui_dump.max_attempts = DEFAULT_UI_DUMP_ATTEMPTS;
    }
    config
}
