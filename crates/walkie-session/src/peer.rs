//! Peer link capability seam.
//!
//! The session never sees a concrete connection implementation. A factory
//! builds one `PeerLink` per remote participant and hands it a
//! `PeerEventSender`; everything the link produces (setup blobs, the remote
//! stream, faults, closure) comes back to the session as a `PeerLinkEvent`.

use serde_json::Value;
use tokio::sync::mpsc;
use walkie_common::{ParticipantId, PeerError};

use crate::media::{LocalStream, RemoteStream};

/// Which side starts the negotiation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerRole {
    /// We learned about the peer from a `user-joined` delta and send the offer.
    Initiator,
    /// The peer was already in the channel when we joined; it sends the offer.
    Responder,
}

impl PeerRole {
    pub fn is_initiator(self) -> bool {
        matches!(self, PeerRole::Initiator)
    }
}

/// Everything a factory needs to build a link.
#[derive(Debug, Clone)]
pub struct PeerLinkRequest {
    pub participant: ParticipantId,
    pub role: PeerRole,
    pub stream: LocalStream,
}

/// The local endpoint of one peer connection.
pub trait PeerLink: Send {
    /// Feed a setup blob received from the remote side.
    fn signal(&mut self, payload: Value);

    /// Swap the outgoing audio for a newly acquired stream.
    fn replace_stream(&mut self, stream: &LocalStream);

    /// Tear down the underlying connection.
    fn destroy(&mut self) -> Result<(), PeerError>;
}

pub trait PeerLinkFactory: Send {
    fn create(
        &self,
        request: PeerLinkRequest,
        events: PeerEventSender,
    ) -> Result<Box<dyn PeerLink>, PeerError>;
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum PeerEventKind {
    /// Outgoing setup blob to relay to the remote side.
    Setup(Value),
    RemoteStream(RemoteStream),
    Error(String),
    Closed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PeerLinkEvent {
    pub participant: ParticipantId,
    /// Generation of the handle that produced the event.
    pub generation: u64,
    pub kind: PeerEventKind,
}

/// Sending half handed to a single peer link. Tags every event with the
/// participant and handle generation it belongs to.
#[derive(Debug, Clone)]
pub struct PeerEventSender {
    participant: ParticipantId,
    generation: u64,
    tx: mpsc::UnboundedSender<PeerLinkEvent>,
}

impl PeerEventSender {
    pub(crate) fn new(
        participant: ParticipantId,
        generation: u64,
        tx: mpsc::UnboundedSender<PeerLinkEvent>,
    ) -> Self {
        Self {
            participant,
            generation,
            tx,
        }
    }

    pub fn participant(&self) -> &ParticipantId {
        &self.participant
    }

    pub fn setup(&self, blob: Value) {
        self.emit(PeerEventKind::Setup(blob));
    }

    pub fn remote_stream(&self, stream: RemoteStream) {
        self.emit(PeerEventKind::RemoteStream(stream));
    }

    pub fn error(&self, message: impl Into<String>) {
        self.emit(PeerEventKind::Error(message.into()));
    }

    pub fn closed(&self) {
        self.emit(PeerEventKind::Closed);
    }

    fn emit(&self, kind: PeerEventKind) {
        // The session is gone once the receiver drops; nothing left to tell.
        let _ = self.tx.send(PeerLinkEvent {
            participant: self.participant.clone(),
            generation: self.generation,
            kind,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn sender_tags_events_with_participant_and_generation() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let sender = PeerEventSender::new("u2".into(), 7, tx);

        sender.setup(json!({"sdp": "x"}));
        sender.closed();

        let first = rx.try_recv().unwrap();
        assert_eq!(first.participant.as_str(), "u2");
        assert_eq!(first.generation, 7);
        assert_eq!(first.kind, PeerEventKind::Setup(json!({"sdp": "x"})));
        assert_eq!(rx.try_recv().unwrap().kind, PeerEventKind::Closed);
    }

    #[test]
    fn sender_tolerates_dropped_receiver() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        let sender = PeerEventSender::new("u2".into(), 1, tx);
        sender.error("ice failed");
    }

    #[test]
    fn role_initiator_flag() {
        assert!(PeerRole::Initiator.is_initiator());
        assert!(!PeerRole::Responder.is_initiator());
    }
}
