use serde::{Deserialize, Serialize};

/// Channel to join automatically once the signaling link is up.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    /// Empty means "wait for an explicit join".
    pub default_channel: String,
}

impl ChannelConfig {
    pub fn default_channel(&self) -> Option<&str> {
        let name = self.default_channel.trim();
        (!name.is_empty()).then_some(name)
    }
}
