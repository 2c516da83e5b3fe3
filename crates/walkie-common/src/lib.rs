pub mod errors;
pub mod id;

pub use errors::{
    CaptureError, ConfigError, LinkError, PeerError, ProtocolError, SessionError, WalkieError,
};
pub use id::{new_id, ChannelId, ParticipantId};

pub type Result<T> = std::result::Result<T, WalkieError>;
