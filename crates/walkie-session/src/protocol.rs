//! Signaling message contract between a participant and the relay.
//!
//! The relay only forwards these messages; peer setup blobs travel inside
//! `signal` messages untouched.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use walkie_common::{ChannelId, LinkError, ParticipantId, ProtocolError};

// ---------------------------------------------------------------------------
// Event names
// ---------------------------------------------------------------------------

pub mod events {
    pub const JOIN_CHANNEL: &str = "join-channel";
    pub const SIGNAL: &str = "signal";
    pub const TALKING: &str = "talking";
    pub const STOPPED_TALKING: &str = "stopped-talking";
    pub const CHANNEL_USERS: &str = "channel-users";
    pub const USER_JOINED: &str = "user-joined";
    pub const USER_LEFT: &str = "user-left";
}

// ---------------------------------------------------------------------------
// Payloads
// ---------------------------------------------------------------------------

/// Outbound setup blob addressed to one participant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalEnvelope {
    pub to: ParticipantId,
    pub signal: Value,
}

/// Talk-state announcement sent when the local user presses or releases.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TalkAnnouncement {
    pub channel_id: Option<ChannelId>,
    pub user_id: ParticipantId,
}

#[derive(Debug, Deserialize)]
struct InboundSignal {
    from: Option<String>,
    signal: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TalkNotice {
    user_id: Option<String>,
}

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

/// Messages this client sends through the signaling link.
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundMessage {
    JoinChannel(ChannelId),
    Signal(SignalEnvelope),
    Talking(TalkAnnouncement),
    StoppedTalking(TalkAnnouncement),
}

impl OutboundMessage {
    pub fn event(&self) -> &'static str {
        match self {
            OutboundMessage::JoinChannel(_) => events::JOIN_CHANNEL,
            OutboundMessage::Signal(_) => events::SIGNAL,
            OutboundMessage::Talking(_) => events::TALKING,
            OutboundMessage::StoppedTalking(_) => events::STOPPED_TALKING,
        }
    }

    pub fn payload(&self) -> Result<Value, LinkError> {
        let value = match self {
            OutboundMessage::JoinChannel(channel) => serde_json::to_value(channel),
            OutboundMessage::Signal(envelope) => serde_json::to_value(envelope),
            OutboundMessage::Talking(announcement)
            | OutboundMessage::StoppedTalking(announcement) => serde_json::to_value(announcement),
        };
        value.map_err(|e| LinkError::Encode(e.to_string()))
    }
}

/// Messages the relay delivers to this client.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundMessage {
    /// Full membership snapshot for the channel just joined.
    ChannelUsers(Vec<ParticipantId>),
    UserJoined(ParticipantId),
    UserLeft(ParticipantId),
    Signal { from: ParticipantId, signal: Value },
    Talking(ParticipantId),
    StoppedTalking(ParticipantId),
}

impl InboundMessage {
    /// Decode a raw `(event, payload)` pair from the relay.
    pub fn parse(event: &str, payload: &Value) -> Result<Self, ProtocolError> {
        match event {
            events::CHANNEL_USERS => {
                let ids = payload.as_array().ok_or_else(|| ProtocolError::Malformed {
                    event: event.to_string(),
                    reason: "expected an array of participant ids".into(),
                })?;
                let mut users = Vec::with_capacity(ids.len());
                for id in ids {
                    match id.as_str() {
                        Some(id) if !id.is_empty() => users.push(ParticipantId::new(id)),
                        _ => {
                            return Err(ProtocolError::Malformed {
                                event: event.to_string(),
                                reason: format!("invalid participant id {id}"),
                            })
                        }
                    }
                }
                Ok(InboundMessage::ChannelUsers(users))
            }
            events::USER_JOINED => Ok(InboundMessage::UserJoined(bare_id(event, payload)?)),
            events::USER_LEFT => Ok(InboundMessage::UserLeft(bare_id(event, payload)?)),
            events::SIGNAL => {
                let inbound: InboundSignal = decode(event, payload)?;
                let from = non_empty(inbound.from).ok_or(ProtocolError::MissingField {
                    event: event.to_string(),
                    field: "from",
                })?;
                let signal = inbound.signal.ok_or(ProtocolError::MissingField {
                    event: event.to_string(),
                    field: "signal",
                })?;
                Ok(InboundMessage::Signal {
                    from: ParticipantId::new(from),
                    signal,
                })
            }
            events::TALKING => Ok(InboundMessage::Talking(talk_user(event, payload)?)),
            events::STOPPED_TALKING => {
                Ok(InboundMessage::StoppedTalking(talk_user(event, payload)?))
            }
            other => Err(ProtocolError::UnknownEvent(other.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn decode<T: serde::de::DeserializeOwned>(event: &str, payload: &Value) -> Result<T, ProtocolError> {
    serde_json::from_value(payload.clone()).map_err(|e| ProtocolError::Malformed {
        event: event.to_string(),
        reason: e.to_string(),
    })
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.is_empty())
}

/// `user-joined` / `user-left` carry the id as a bare string.
fn bare_id(event: &str, payload: &Value) -> Result<ParticipantId, ProtocolError> {
    payload
        .as_str()
        .filter(|s| !s.is_empty())
        .map(ParticipantId::new)
        .ok_or(ProtocolError::MissingField {
            event: event.to_string(),
            field: "userId",
        })
}

fn talk_user(event: &str, payload: &Value) -> Result<ParticipantId, ProtocolError> {
    let notice: TalkNotice = decode(event, payload)?;
    non_empty(notice.user_id)
        .map(ParticipantId::new)
        .ok_or(ProtocolError::MissingField {
            event: event.to_string(),
            field: "userId",
        })
}
