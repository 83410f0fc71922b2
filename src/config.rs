//! Configuration file handling for shutter-bridge.
//!
//! Loads configuration from `<config dir>/shutter-bridge/config.toml` or a custom path.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::bridge::{BridgeSettings, DEFAULT_ACTIVITY_CAPACITY};
use crate::camera::{CaptureOptions, Dimensions, PhotoFormat, QualityPrioritization};
use crate::output::OutputCapabilities;

/// Configuration file structure for shutter-bridge.
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub bridge: BridgeConfig,
    /// Options used when the command line doesn't override them
    #[serde(default)]
    pub capture: CaptureOptions,
    #[serde(default)]
    pub device: DeviceConfig,
}

#[derive(Debug, Deserialize)]
pub struct BridgeConfig {
    #[serde(default = "default_activity_capacity")]
    pub activity_capacity: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            activity_capacity: default_activity_capacity(),
        }
    }
}

impl BridgeConfig {
    pub fn settings(&self) -> BridgeSettings {
        BridgeSettings {
            activity_capacity: self.activity_capacity,
        }
    }
}

/// Capabilities of the simulated camera.
#[derive(Debug, Deserialize)]
pub struct DeviceConfig {
    #[serde(default = "default_formats")]
    pub formats: Vec<PhotoFormat>,
    #[serde(default)]
    pub max_dimensions: Dimensions,
    #[serde(default = "default_max_quality")]
    pub max_quality: QualityPrioritization,
    #[serde(default = "default_true")]
    pub flash: bool,
    /// Simulated time between enqueue and the first callback
    #[serde(default = "default_latency_ms")]
    pub latency_ms: u64,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            formats: default_formats(),
            max_dimensions: Dimensions::default(),
            max_quality: default_max_quality(),
            flash: true,
            latency_ms: default_latency_ms(),
        }
    }
}

impl DeviceConfig {
    pub fn capabilities(&self) -> OutputCapabilities {
        OutputCapabilities {
            supported_formats: self.formats.clone(),
            max_dimensions: self.max_dimensions,
            max_quality: self.max_quality,
            has_flash: self.flash,
        }
    }

    pub fn latency(&self) -> Duration {
        Duration::from_millis(self.latency_ms)
    }
}

fn default_true() -> bool {
    true
}

fn default_activity_capacity() -> usize {
    DEFAULT_ACTIVITY_CAPACITY
}

fn default_formats() -> Vec<PhotoFormat> {
    vec![PhotoFormat::Jpeg, PhotoFormat::Heif]
}

fn default_max_quality() -> QualityPrioritization {
    QualityPrioritization::Quality
}

fn default_latency_ms() -> u64 {
    50
}

impl Config {
    /// Load configuration from a file path.
    /// Returns default config if the file doesn't exist.
    /// Returns an error if the file exists but cannot be parsed.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = path.map(PathBuf::from).unwrap_or_else(default_path);

        if path.exists() {
            log::debug!("Loading config from {}", path.display());
            let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::IoError {
                path: path.clone(),
                source: e,
            })?;
            Self::parse(&content).map_err(|e| ConfigError::ParseError {
                path: path.clone(),
                source: e,
            })
        } else {
            log::debug!("No config at {}, using defaults", path.display());
            Ok(Config::default())
        }
    }

    /// Parse configuration from TOML text.
    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{}': {source}", .path.display())]
    IoError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse config file '{}': {source}", .path.display())]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// Get the default config file path.
pub fn default_path() -> PathBuf {
    dirs::config_dir()
        .map(|d| d.join("shutter-bridge").join("config.toml"))
        .unwrap_or_else(|| {
            let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
            PathBuf::from(home).join(".config/shutter-bridge/config.toml")
        })
}
