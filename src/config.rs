//! Configuration management for virt-keys
//!
//! The keymap and device settings are read from a TOML file in the platform
//! config directory, or from an explicit path.
//!
//! ## Config File Locations
//!
//! | Platform | Path |
//! |----------|------|
//! | Linux | `~/.config/virt-keys/config.toml` |
//! | macOS | `~/Library/Application Support/virt-keys/config.toml` |
//! | Windows | `%APPDATA%\virt-keys\config.toml` |
//!
//! ## Example
//!
//! ```toml
//! hold_ms = 1000
//!
//! [device]
//! name = "virt_keys"
//! phys = "virtkey/input0"
//!
//! [[keys]]
//! code = 116
//! label = "Power"
//!
//! [[keys]]
//! code = 115
//! ```

use crate::keyboard::KeyCode;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Error type for configuration operations
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to determine config directory
    #[error("Could not determine config directory")]
    NoConfigDir,
    /// IO error reading or writing config file
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    /// Failed to parse config file
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),
    /// Failed to serialize config
    #[error("Serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
    /// No keys configured
    #[error("keymap is missing")]
    EmptyKeymap,
    /// A key entry without a code
    #[error("key entry {index} has no code")]
    MissingCode { index: usize },
    /// Two entries share a code
    #[error("duplicate key code {0}")]
    DuplicateCode(KeyCode),
    /// Hold duration of zero
    #[error("hold_ms must be greater than zero")]
    ZeroHold,
}

/// Returns the path to the config file.
///
/// - Linux: `~/.config/virt-keys/config.toml`
/// - macOS: `~/Library/Application Support/virt-keys/config.toml`
/// - Windows: `%APPDATA%\virt-keys\config.toml`
pub fn config_path() -> Result<PathBuf, ConfigError> {
    let config_dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
    Ok(config_dir.join("virt-keys").join("config.toml"))
}

fn default_hold_ms() -> u64 {
    1000
}

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// How long each virtual press is held, in milliseconds
    #[serde(default = "default_hold_ms")]
    pub hold_ms: u64,
    /// Virtual device settings
    #[serde(default)]
    pub device: DeviceConfig,
    /// UI settings
    #[serde(default)]
    pub ui: UiConfig,
    /// Keys that may be triggered, in listing order
    #[serde(default)]
    pub keys: Vec<KeyEntry>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            hold_ms: default_hold_ms(),
            device: DeviceConfig::default(),
            ui: UiConfig::default(),
            keys: Vec::new(),
        }
    }
}

/// One configured key
///
/// `code` is optional here so that a missing code is reported by keymap
/// validation with the entry's position.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct KeyEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<u32>,
    /// Display label
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl KeyEntry {
    pub fn new(code: u32) -> Self {
        Self {
            code: Some(code),
            label: None,
        }
    }

    pub fn labeled(code: u32, label: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            label: Some(label.into()),
        }
    }
}

/// Virtual input device configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Name the device is registered under
    pub name: String,
    /// Physical path reported for the device
    pub phys: String,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            name: "virt_keys".to_string(),
            phys: "virtkey/input0".to_string(),
        }
    }
}

/// UI configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    /// Color theme (dark/light)
    pub theme: Theme,
    /// Refresh rate for UI updates (in Hz)
    pub refresh_rate_hz: u32,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            theme: Theme::Dark,
            refresh_rate_hz: 30,
        }
    }
}

/// Color theme options
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Theme {
    Dark,
    Light,
}

impl Config {
    /// A ready-to-edit configuration with a few media keys
    pub fn sample() -> Self {
        Self {
            keys: vec![
                KeyEntry::labeled(116, "Power"),
                KeyEntry::labeled(115, "Volume Up"),
                KeyEntry::labeled(114, "Volume Down"),
                KeyEntry::labeled(164, "Play/Pause"),
            ],
            ..Self::default()
        }
    }

    /// Load configuration from the default config file.
    ///
    /// Returns the default configuration (with an empty keymap) if the file
    /// doesn't exist.
    pub fn load() -> Result<Self, ConfigError> {
        let path = config_path()?;

        if !path.exists() {
            return Ok(Self::default());
        }

        Self::load_from(&path)
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to the default config file.
    pub fn save(&self) -> Result<PathBuf, ConfigError> {
        let path = config_path()?;
        self.save_to(&path)?;
        Ok(path)
    }

    /// Save configuration to a specific path, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }
        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }

    /// Check settings that don't depend on the keymap
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.hold_ms == 0 {
            return Err(ConfigError::ZeroHold);
        }
        Ok(())
    }

    /// Hold duration shared by all keys
    pub fn hold_duration(&self) -> Duration {
        Duration::from_millis(self.hold_ms)
    }

    /// Get UI refresh interval as Duration
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_micros(1_000_000 / self.ui.refresh_rate_hz.max(1) as u64)
    }
}
