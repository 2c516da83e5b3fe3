//! Signaling link seam: the session's only path to the rendezvous relay.
//!
//! The link delivers everything it observes (lifecycle changes and inbound
//! relay messages) as `LinkEvent`s on a receiver owned by the session loop.
//! A WebSocket implementation lives in [`websocket`].

pub mod websocket;

use walkie_common::{LinkError, ParticipantId};

use crate::protocol::OutboundMessage;

/// Control surface of a signaling link. All methods return immediately;
/// outcomes of `connect`/`disconnect` arrive later as `LinkEvent`s.
pub trait SignalingLink: Send + Sync {
    /// Whether the link is up and has been assigned a local identity.
    fn is_connected(&self) -> bool;

    fn send(&self, message: OutboundMessage) -> Result<(), LinkError>;

    fn connect(&self);

    fn disconnect(&self);

    /// Drop the current transport and start a fresh connection attempt.
    fn reconnect(&self) {
        self.disconnect();
        self.connect();
    }

    /// Permanently shut the link down.
    fn close(&self);
}

/// Lifecycle notifications and inbound traffic from a signaling link.
#[derive(Debug, Clone, PartialEq)]
pub enum LinkEvent {
    /// First successful connection; the relay assigned this identity.
    Connected { local_id: ParticipantId },
    Disconnected { reason: String },
    /// The transport's own automatic retry is about to try again.
    ReconnectAttempt { attempt: u32 },
    /// The link came back; identities are never reused, so this one is new.
    Reconnected { local_id: ParticipantId },
    /// The transport exhausted its automatic retry budget.
    ReconnectFailed,
    ConnectError { message: String },
    /// A relay message, not yet decoded.
    Message {
        event: String,
        payload: serde_json::Value,
    },
}
