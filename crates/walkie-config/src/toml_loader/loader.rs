//! Reading `config.toml` into a `WalkieConfig`.

use std::io::ErrorKind;
use std::path::Path;

use tracing::{info, warn};
use walkie_common::ConfigError;

use super::paths::{create_default_config, default_config_path};
use crate::schema::WalkieConfig;
use crate::validation;

/// Parse the file at `path`. Absent keys fall back to their defaults;
/// out-of-range values are reported in the log but kept.
pub fn load_from_path(path: &Path) -> Result<WalkieConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => ConfigError::FileNotFound(path.to_path_buf()),
        _ => ConfigError::ParseError(format!("failed to read {}: {e}", path.display())),
    })?;

    let config = parse(&content)?;
    if let Err(e) = validation::validate(&config) {
        warn!(path = %path.display(), error = %e, "Config has out-of-range values");
    }
    info!(path = %path.display(), relay = %config.signaling.url, "Config loaded");
    Ok(config)
}

/// Load `walkie/config.toml` from the platform config dir, writing the
/// commented template there on first run.
pub fn load_default() -> Result<WalkieConfig, ConfigError> {
    let path = default_config_path()?;
    match load_from_path(&path) {
        Err(ConfigError::FileNotFound(_)) => {
            create_default_config(&path)?;
            Ok(WalkieConfig::default())
        }
        loaded => loaded,
    }
}

fn parse(content: &str) -> Result<WalkieConfig, ConfigError> {
    toml::from_str(content).map_err(|e| ConfigError::ParseError(format!("invalid TOML: {e}")))
}
