//! Tests for TOML config loading, creation, and path resolution.

use super::template::default_config_toml;
use super::*;
use crate::schema::{LogLevel, WalkieConfig};
use std::path::Path;

#[test]
fn load_from_nonexistent_returns_file_not_found() {
    let result = load_from_path(Path::new("/tmp/nonexistent_walkie_config.toml"));
    let err = result.unwrap_err();
    assert!(matches!(err, walkie_common::ConfigError::FileNotFound(_)));
}

#[test]
fn load_valid_partial_toml() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        r#"
[signaling]
url = "wss://relay.example.com/ws"
reconnection_attempts = 3

[channel]
default_channel = "room1"
"#,
    )
    .unwrap();

    let config = load_from_path(&path).unwrap();
    assert_eq!(config.signaling.url, "wss://relay.example.com/ws");
    assert_eq!(config.signaling.reconnection_attempts, 3);
    assert_eq!(config.channel.default_channel(), Some("room1"));
    // Defaults preserved
    assert_eq!(config.signaling.reconnection_delay_ms, 1000);
    assert_eq!(config.resilience.grace_period_ms, 2000);
    assert!(config.audio.acquire_on_start);
}

#[test]
fn load_invalid_toml_returns_parse_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "this is not valid toml {{{").unwrap();

    let err = load_from_path(&path).unwrap_err();
    assert!(matches!(err, walkie_common::ConfigError::ParseError(_)));
}

#[test]
fn load_config_with_invalid_values_keeps_parsed_values() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        r#"
[resilience]
grace_period_ms = 5
"#,
    )
    .unwrap();

    let config = load_from_path(&path).unwrap();
    assert_eq!(config.resilience.grace_period_ms, 5);
}

#[test]
fn default_template_parses_to_defaults() {
    let config: WalkieConfig = toml::from_str(&default_config_toml()).unwrap();
    assert_eq!(config.signaling.url, "ws://localhost:3000/ws");
    assert_eq!(config.logging.level, LogLevel::Info);
    assert_eq!(config.channel.default_channel(), None);
}

#[test]
fn create_default_config_writes_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("config.toml");
    create_default_config(&path).unwrap();
    assert!(path.exists());

    let config = load_from_path(&path).unwrap();
    assert_eq!(config.resilience.retry_interval_ms, 2000);
}

#[test]
fn default_config_path_ends_with_walkie() {
    if let Ok(path) = default_config_path() {
        assert!(path.ends_with("walkie/config.toml"));
    }
}
