//! Where the config file lives and how the first-run copy is written.

use std::path::{Path, PathBuf};

use tracing::info;
use walkie_common::ConfigError;

use super::template::default_config_toml;

const APP_DIR: &str = "walkie";
const FILE_NAME: &str = "config.toml";

/// `<config dir>/walkie/config.toml`, e.g. `~/.config/walkie/config.toml`.
pub fn default_config_path() -> Result<PathBuf, ConfigError> {
    dirs::config_dir()
        .map(|dir| dir.join(APP_DIR).join(FILE_NAME))
        .ok_or_else(|| ConfigError::ParseError("no platform config directory".into()))
}

pub fn create_default_config(path: &Path) -> Result<(), ConfigError> {
    let io_error = |what: &str, at: &Path, e: std::io::Error| {
        ConfigError::ParseError(format!("failed to {what} {}: {e}", at.display()))
    };

    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|e| io_error("create", dir, e))?;
    }
    std::fs::write(path, default_config_toml()).map_err(|e| io_error("write", path, e))?;

    info!(path = %path.display(), "Wrote default config");
    Ok(())
}
