//! Public handle for the WebSocket signaling link.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use walkie_common::LinkError;

use super::connection::connection_loop;
use super::types::{Envelope, LinkCommand, WebSocketLinkConfig};
use crate::protocol::OutboundMessage;
use crate::signaling::{LinkEvent, SignalingLink};

/// Handle to the relay connection. All methods are non-blocking and hand
/// commands to the background connection task.
pub struct WebSocketLink {
    command_tx: mpsc::UnboundedSender<LinkCommand>,
    connected: Arc<AtomicBool>,
}

impl WebSocketLink {
    /// Create the link and start connecting in the background.
    /// Returns `(link, event_receiver)`.
    pub fn connect(config: WebSocketLinkConfig) -> (Self, mpsc::Receiver<LinkEvent>) {
        let (event_tx, event_rx) = mpsc::channel(256);
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let connected = Arc::new(AtomicBool::new(false));

        tokio::spawn(connection_loop(
            config,
            Arc::clone(&connected),
            event_tx,
            command_rx,
        ));

        (
            Self {
                command_tx,
                connected,
            },
            event_rx,
        )
    }
}

impl SignalingLink for WebSocketLink {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn send(&self, message: OutboundMessage) -> Result<(), LinkError> {
        if !self.is_connected() {
            return Err(LinkError::NotConnected);
        }
        let envelope = Envelope {
            event: message.event().to_string(),
            data: message.payload()?,
        };
        self.command_tx
            .send(LinkCommand::Send(envelope))
            .map_err(|_| LinkError::Closed)
    }

    fn connect(&self) {
        let _ = self.command_tx.send(LinkCommand::Connect);
    }

    fn disconnect(&self) {
        let _ = self.command_tx.send(LinkCommand::Disconnect);
    }

    fn reconnect(&self) {
        let _ = self.command_tx.send(LinkCommand::Reconnect);
    }

    fn close(&self) {
        self.connected.store(false, Ordering::SeqCst);
        let _ = self.command_tx.send(LinkCommand::Close);
    }
}
