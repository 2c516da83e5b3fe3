//! Local capture stream, remote stream handles, and the capture-device seam.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use walkie_common::{new_id, CaptureError};

static STREAM_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Identifies one acquisition of the capture device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StreamId(u64);

impl StreamId {
    fn next() -> Self {
        Self(STREAM_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "stream-{}", self.0)
    }
}

/// A captured audio track. Clones share the enabled/stopped flags, so a
/// peer link holding a clone observes the push-to-talk state directly.
#[derive(Debug, Clone)]
pub struct AudioTrack {
    id: String,
    enabled: Arc<AtomicBool>,
    stopped: Arc<AtomicBool>,
}

impl AudioTrack {
    /// New tracks start disabled: nothing is transmitted until talk starts.
    pub fn new() -> Self {
        Self {
            id: new_id(),
            enabled: Arc::new(AtomicBool::new(false)),
            stopped: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    fn stop(&self) {
        self.enabled.store(false, Ordering::SeqCst);
        self.stopped.store(true, Ordering::SeqCst);
    }
}

impl Default for AudioTrack {
    fn default() -> Self {
        Self::new()
    }
}

/// The single owned capture stream of a session.
#[derive(Debug, Clone)]
pub struct LocalStream {
    id: StreamId,
    tracks: Vec<AudioTrack>,
}

impl LocalStream {
    pub fn new(tracks: Vec<AudioTrack>) -> Self {
        Self {
            id: StreamId::next(),
            tracks,
        }
    }

    /// A stream with one fresh audio track.
    pub fn single_track() -> Self {
        Self::new(vec![AudioTrack::new()])
    }

    pub fn id(&self) -> StreamId {
        self.id
    }

    pub fn audio_tracks(&self) -> &[AudioTrack] {
        &self.tracks
    }

    pub fn set_enabled(&self, enabled: bool) {
        for track in &self.tracks {
            track.set_enabled(enabled);
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.tracks.iter().any(AudioTrack::is_enabled)
    }

    /// Release the capture device.
    pub fn stop(&self) {
        for track in &self.tracks {
            track.stop();
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.tracks.iter().all(AudioTrack::is_stopped)
    }
}

/// Audio arriving from a remote participant, handed to playback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteStream {
    pub id: String,
}

impl RemoteStream {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

/// Access to the microphone. Acquisition may suspend (permission prompts,
/// device start-up) and therefore runs off the session event loop.
#[async_trait]
pub trait AudioCapture: Send + Sync {
    async fn acquire(&self) -> Result<LocalStream, CaptureError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracks_start_disabled() {
        let stream = LocalStream::single_track();
        assert!(!stream.is_enabled());
        assert!(!stream.is_stopped());
    }

    #[test]
    fn clones_share_enabled_flag() {
        let stream = LocalStream::single_track();
        let held_by_peer = stream.clone();
        stream.set_enabled(true);
        assert!(held_by_peer.is_enabled());
        assert_eq!(stream.id(), held_by_peer.id());
    }

    #[test]
    fn stop_disables_and_releases() {
        let stream = LocalStream::new(vec![AudioTrack::new(), AudioTrack::new()]);
        stream.set_enabled(true);
        stream.stop();
        assert!(stream.is_stopped());
        assert!(!stream.is_enabled());
    }

    #[test]
    fn each_acquisition_has_a_new_id() {
        let a = LocalStream::single_track();
        let b = LocalStream::single_track();
        assert_ne!(a.id(), b.id());
        assert_ne!(a.audio_tracks()[0].id(), b.audio_tracks()[0].id());
    }
}
