//! Integration tests for loading configuration files from disk.

use std::fs;
use std::path::PathBuf;

use shutter_bridge::camera::{Dimensions, PhotoFormat};
use shutter_bridge::cli::DEFAULT_CONFIG;
use shutter_bridge::config::{Config, ConfigError};
use tempfile::TempDir;

#[test]
fn test_missing_file_yields_defaults() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("absent.toml");
    let config = Config::load(Some(&path)).unwrap();
    assert_eq!(config.capture.format, PhotoFormat::Jpeg);
    assert_eq!(config.device.max_dimensions, Dimensions::TWELVE_MP);
}

#[test]
fn test_loads_file_from_disk() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(
        &path,
        "[capture]\nformat = \"heif\"\n\n[device]\nlatency_ms = 5\n",
    )
    .unwrap();

    let config = Config::load(Some(&path)).unwrap();
    assert_eq!(config.capture.format, PhotoFormat::Heif);
    assert_eq!(config.device.latency_ms, 5);
}

#[test]
fn test_template_loads_from_disk() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, DEFAULT_CONFIG).unwrap();

    let config = Config::load(Some(&path)).unwrap();
    assert_eq!(config.bridge.activity_capacity, 16);
    assert!(config.device.flash);
}

#[test]
fn test_parse_error_names_the_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("broken.toml");
    fs::write(&path, "[capture\nformat = ").unwrap();

    let err = Config::load(Some(&path)).unwrap_err();
    assert!(matches!(err, ConfigError::ParseError { .. }));
    assert!(err.to_string().contains("broken.toml"));
}

#[test]
fn test_directory_path_is_io_error() {
    let dir = TempDir::new().unwrap();
    let path: PathBuf = dir.path().to_path_buf();

    let err = Config::load(Some(&path)).unwrap_err();
    assert!(matches!(err, ConfigError::IoError { .. }));
}
