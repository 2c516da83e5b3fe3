//! Maps the loaded config onto session and link settings, and provides the
//! devices this binary ships with.

use std::time::Duration;

use async_trait::async_trait;
use walkie_common::{CaptureError, PeerError};
use walkie_config::WalkieConfig;
use walkie_session::{
    AudioCapture, LocalStream, PeerEventSender, PeerLink, PeerLinkFactory, PeerLinkRequest,
    ResilienceSettings, SessionConfig, WebSocketLinkConfig,
};

pub fn link_config(config: &WalkieConfig, server: Option<&str>) -> WebSocketLinkConfig {
    let signaling = &config.signaling;
    WebSocketLinkConfig {
        url: server.unwrap_or(signaling.url.as_str()).to_string(),
        reconnection_attempts: signaling.reconnection_attempts,
        reconnection_delay: Duration::from_millis(signaling.reconnection_delay_ms),
        max_reconnection_delay: Duration::from_millis(signaling.max_reconnection_delay_ms),
        connect_timeout: Duration::from_secs(signaling.connect_timeout_secs),
    }
}

pub fn session_config(config: &WalkieConfig) -> SessionConfig {
    SessionConfig {
        resilience: ResilienceSettings {
            grace_period: Duration::from_millis(config.resilience.grace_period_ms),
            retry_interval: Duration::from_millis(config.resilience.retry_interval_ms),
        },
        acquire_on_start: config.audio.acquire_on_start,
        ..SessionConfig::default()
    }
}

/// The terminal build has no media engine. Paired with `NoCapture` no peer
/// link is ever requested, so the binary only tracks membership and talk
/// state; this factory refuses if one is.
pub struct NoPeerEngine;

impl PeerLinkFactory for NoPeerEngine {
    fn create(
        &self,
        request: PeerLinkRequest,
        _events: PeerEventSender,
    ) -> Result<Box<dyn PeerLink>, PeerError> {
        Err(PeerError::Unsupported(format!(
            "no media engine available for peer {}",
            request.participant
        )))
    }
}

/// Capture device placeholder for builds without an audio backend.
pub struct NoCapture {
    device: String,
}

impl NoCapture {
    pub fn new(device: impl Into<String>) -> Self {
        Self {
            device: device.into(),
        }
    }
}

#[async_trait]
impl AudioCapture for NoCapture {
    async fn acquire(&self) -> Result<LocalStream, CaptureError> {
        Err(CaptureError::Unavailable(format!(
            "no audio backend for input device '{}'",
            self.device
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_override_wins() {
        let config = WalkieConfig::default();
        assert_eq!(link_config(&config, None).url, config.signaling.url);
        assert_eq!(
            link_config(&config, Some("wss://relay.example/ws")).url,
            "wss://relay.example/ws"
        );
    }

    #[test]
    fn timings_are_converted() {
        let mut config = WalkieConfig::default();
        config.signaling.reconnection_delay_ms = 250;
        config.resilience.grace_period_ms = 3000;

        let link = link_config(&config, None);
        assert_eq!(link.reconnection_delay, Duration::from_millis(250));
        assert_eq!(link.reconnection_attempts, 5);
        assert_eq!(link.connect_timeout, Duration::from_secs(15));

        let session = session_config(&config);
        assert_eq!(session.resilience.grace_period, Duration::from_secs(3));
        assert_eq!(session.resilience.retry_interval, Duration::from_secs(2));
        assert!(session.acquire_on_start);
    }

    #[tokio::test]
    async fn placeholder_capture_reports_device() {
        let err = NoCapture::new("usb-mic").acquire().await.unwrap_err();
        assert!(err.to_string().contains("usb-mic"));
    }
}
