//! Configuration, wire envelope, and command enum for the WebSocket link.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct WebSocketLinkConfig {
    /// Relay endpoint, `ws://` or `wss://`.
    pub url: String,
    /// Automatic retries after a failed or dropped connection before the
    /// link gives up and reports `ReconnectFailed`.
    pub reconnection_attempts: u32,
    pub reconnection_delay: Duration,
    pub max_reconnection_delay: Duration,
    pub connect_timeout: Duration,
}

impl Default for WebSocketLinkConfig {
    fn default() -> Self {
        Self {
            url: "ws://localhost:3000/ws".to_string(),
            reconnection_attempts: 5,
            reconnection_delay: Duration::from_millis(1000),
            max_reconnection_delay: Duration::from_millis(5000),
            connect_timeout: Duration::from_secs(15),
        }
    }
}

// ---------------------------------------------------------------------------
// Wire format
// ---------------------------------------------------------------------------

/// One frame on the relay socket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub event: String,
    #[serde(default)]
    pub data: Value,
}

pub(crate) const WELCOME_EVENT: &str = "welcome";

#[derive(Debug, Deserialize)]
pub(crate) struct Welcome {
    pub(crate) id: String,
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

/// Commands from `WebSocketLink` to its background connection task.
#[derive(Debug)]
pub(crate) enum LinkCommand {
    Send(Envelope),
    Connect,
    Disconnect,
    /// Restart a connection that never became ready.
    Reconnect,
    Close,
}
