use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("config parse error: {0}")]
    ParseError(String),

    #[error("config validation error: {0}")]
    ValidationError(String),
}

/// Failures sending through the signaling link.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LinkError {
    #[error("signaling link is not connected")]
    NotConnected,

    #[error("signaling link is closed")]
    Closed,

    #[error("failed to encode message: {0}")]
    Encode(String),
}

/// Faults raised by a single peer link. Never fatal to the session.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PeerError {
    #[error("failed to create peer link: {0}")]
    Create(String),

    #[error("failed to tear down peer link: {0}")]
    Destroy(String),

    #[error("peer links are not supported: {0}")]
    Unsupported(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CaptureError {
    #[error("microphone access denied: {0}")]
    Denied(String),

    #[error("no capture device available: {0}")]
    Unavailable(String),
}

/// An inbound signaling event that could not be understood.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    #[error("unknown event '{0}'")]
    UnknownEvent(String),

    #[error("event '{event}' is missing field '{field}'")]
    MissingField { event: String, field: &'static str },

    #[error("event '{event}' is malformed: {reason}")]
    Malformed { event: String, reason: String },
}

/// Preconditions a session operation refused to run without.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("signaling link is not ready")]
    LinkNotReady,

    #[error("no local identity assigned yet")]
    NoLocalIdentity,

    #[error("no local audio stream")]
    NoLocalStream,

    #[error("audio capture is blocked: {0}")]
    CaptureBlocked(String),

    #[error("channel id is empty")]
    EmptyChannel,

    #[error("session has been destroyed")]
    Destroyed,

    #[error(transparent)]
    Link(#[from] LinkError),
}

#[derive(Debug, thiserror::Error)]
pub enum WalkieError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_display() {
        let err = ConfigError::FileNotFound(PathBuf::from("/tmp/missing.toml"));
        assert_eq!(err.to_string(), "config file not found: /tmp/missing.toml");

        let err = ConfigError::ParseError("unexpected token".into());
        assert_eq!(err.to_string(), "config parse error: unexpected token");

        let err = ConfigError::ValidationError("signaling.url".into());
        assert_eq!(err.to_string(), "config validation error: signaling.url");
    }

    #[test]
    fn protocol_error_display() {
        let err = ProtocolError::MissingField {
            event: "talking".into(),
            field: "userId",
        };
        assert_eq!(err.to_string(), "event 'talking' is missing field 'userId'");

        let err = ProtocolError::UnknownEvent("bogus".into());
        assert_eq!(err.to_string(), "unknown event 'bogus'");
    }

    #[test]
    fn session_error_wraps_link_error() {
        let err: SessionError = LinkError::NotConnected.into();
        assert!(matches!(err, SessionError::Link(LinkError::NotConnected)));
        assert_eq!(err.to_string(), "signaling link is not connected");
    }

    #[test]
    fn walkie_error_from_session() {
        let err: WalkieError = SessionError::NoLocalStream.into();
        assert!(matches!(err, WalkieError::Session(_)));
        assert!(err.to_string().contains("no local audio stream"));
    }

    #[test]
    fn walkie_error_from_config() {
        let err: WalkieError = ConfigError::ParseError("bad toml".into()).into();
        assert!(matches!(err, WalkieError::Config(_)));
        assert_eq!(err.to_string(), "config parse error: bad toml");
    }

    #[test]
    fn walkie_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file missing");
        let err: WalkieError = io_err.into();
        assert!(matches!(err, WalkieError::Io(_)));
        assert!(err.to_string().contains("file missing"));
    }
}
