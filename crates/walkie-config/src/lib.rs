//! walkie configuration system.
//!
//! TOML-based configuration with validation. All sections use defaults,
//! so partial configs work out of the box.

pub mod schema;
pub mod toml_loader;
pub mod validation;

pub use schema::{WalkieConfig, CONFIG_SCHEMA_VERSION};

use std::path::Path;
use walkie_common::ConfigError;

/// Load config from the platform default path, creating it if missing.
pub fn load_config() -> Result<WalkieConfig, ConfigError> {
    toml_loader::load_default()
}

/// Load config from an explicit path override.
pub fn load_config_from(path: &Path) -> Result<WalkieConfig, ConfigError> {
    toml_loader::load_from_path(path)
}

/// Serialize a config to a pretty-printed JSON string.
pub fn config_to_json(config: &WalkieConfig) -> String {
    serde_json::to_string_pretty(config)
        .unwrap_or_else(|e| format!("{{\"error\": \"failed to serialize config: {e}\"}}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_to_json_contains_all_sections() {
        let json = config_to_json(&WalkieConfig::default());
        assert!(json.contains("\"signaling\""));
        assert!(json.contains("\"resilience\""));
        assert!(json.contains("\"audio\""));
        assert!(json.contains("\"channel\""));
        assert!(json.contains("\"logging\""));
    }

    #[test]
    fn config_schema_version_is_1() {
        assert_eq!(CONFIG_SCHEMA_VERSION, 1);
    }

    #[test]
    fn log_level_serializes_uppercase() {
        let json = config_to_json(&WalkieConfig::default());
        assert!(json.contains("\"INFO\""));
    }
}
