//! Configuration schema types for walkie.
//!
//! All structs use `serde(default)` so partial configs work correctly.

mod audio;
mod channel;
mod logging;
mod resilience;
mod signaling;

pub use audio::*;
pub use channel::*;
pub use logging::*;
pub use resilience::*;
pub use signaling::*;

use serde::{Deserialize, Serialize};

/// Current config schema version.
pub const CONFIG_SCHEMA_VERSION: u32 = 1;

/// Root configuration.
///
/// Only override what you want to change.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WalkieConfig {
    pub signaling: SignalingConfig,
    pub resilience: ResilienceConfig,
    pub audio: AudioConfig,
    pub channel: ChannelConfig,
    pub logging: LoggingConfig,
}
