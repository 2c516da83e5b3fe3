//! Audio capture settings.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    pub input_device: String,
    /// Request the capture device as soon as the session starts.
    pub acquire_on_start: bool,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            input_device: "default".into(),
            acquire_on_start: true,
        }
    }
}
