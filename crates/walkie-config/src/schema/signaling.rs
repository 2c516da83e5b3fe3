//! Signaling relay connection settings.

use serde::{Deserialize, Serialize};

/// How to reach the rendezvous relay, and the transport's own bounded retry policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalingConfig {
    /// WebSocket URL of the relay.
    pub url: String,
    /// Automatic reconnection attempts before the transport gives up.
    pub reconnection_attempts: u32,
    /// Base backoff between attempts, in milliseconds.
    pub reconnection_delay_ms: u64,
    /// Backoff ceiling, in milliseconds.
    pub max_reconnection_delay_ms: u64,
    pub connect_timeout_secs: u64,
}

impl Default for SignalingConfig {
    fn default() -> Self {
        Self {
            url: "ws://localhost:3000/ws".into(),
            reconnection_attempts: 5,
            reconnection_delay_ms: 1000,
            max_reconnection_delay_ms: 5000,
            connect_timeout_secs: 15,
        }
    }
}
