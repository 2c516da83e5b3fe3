pub mod media;
pub mod peer;
pub mod protocol;
pub mod resilience;
pub mod roster;
pub mod session;
pub mod signaling;

#[cfg(test)]
mod testing;

pub use media::{AudioCapture, AudioTrack, LocalStream, RemoteStream, StreamId};
pub use peer::{
    PeerEventKind, PeerEventSender, PeerLink, PeerLinkEvent, PeerLinkFactory, PeerLinkRequest,
    PeerRole,
};
pub use protocol::{InboundMessage, OutboundMessage, SignalEnvelope, TalkAnnouncement};
pub use resilience::{ResilienceManager, ResilienceSettings, ResilienceSignal};
pub use roster::{reconcile, PeerHandle, Roster, RosterDiff};
pub use session::{
    ChannelSession, SessionChannels, SessionConfig, SessionEvent, SessionHandle, SessionSnapshot,
    SessionState,
};
pub use signaling::websocket::{WebSocketLink, WebSocketLinkConfig};
pub use signaling::{LinkEvent, SignalingLink};
