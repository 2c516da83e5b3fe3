//! State, configuration, snapshots, and events for a channel session.

use std::fmt;

use walkie_common::{ChannelId, ParticipantId};

use crate::media::RemoteStream;
use crate::resilience::ResilienceSettings;

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SessionState {
    #[default]
    Idle,
    /// Join sent, waiting for the membership snapshot.
    Joining,
    Joined,
    SignalingLost,
    Retrying,
    Error,
}

impl SessionState {
    /// States in which a channel membership is held or being requested.
    pub fn is_in_channel(self) -> bool {
        matches!(self, SessionState::Joining | SessionState::Joined)
    }

    pub fn is_link_down(self) -> bool {
        matches!(self, SessionState::SignalingLost | SessionState::Retrying)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Idle => "idle",
            SessionState::Joining => "joining",
            SessionState::Joined => "joined",
            SessionState::SignalingLost => "signaling-lost",
            SessionState::Retrying => "retrying",
            SessionState::Error => "error",
        };
        f.write_str(name)
    }
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub resilience: ResilienceSettings,
    /// Capacity of the outgoing `SessionEvent` channel.
    pub event_buffer: usize,
    /// Request the capture device as soon as the session loop starts.
    pub acquire_on_start: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            resilience: ResilienceSettings::default(),
            event_buffer: 256,
            acquire_on_start: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// Read-only view of a session for presentation layers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub state: SessionState,
    pub channel: Option<ChannelId>,
    pub local_id: Option<ParticipantId>,
    /// Participants with a live peer link, sorted.
    pub roster: Vec<ParticipantId>,
    /// Participants currently transmitting, sorted.
    pub talking: Vec<ParticipantId>,
    pub is_talking: bool,
    pub join_error: bool,
    pub capture_blocked: bool,
    /// Human-readable connection status, e.g. while retrying.
    pub status: Option<String>,
    pub last_error: Option<String>,
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// Notable changes emitted by the session for the UI.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    StateChanged {
        from: SessionState,
        to: SessionState,
    },
    ParticipantJoined {
        participant: ParticipantId,
    },
    ParticipantLeft {
        participant: ParticipantId,
    },
    TalkingChanged {
        participant: ParticipantId,
        talking: bool,
    },
    LocalTalkingChanged {
        talking: bool,
    },
    /// Audio from a peer is ready for playback.
    RemoteStream {
        from: ParticipantId,
        stream: RemoteStream,
    },
    Error(String),
}
