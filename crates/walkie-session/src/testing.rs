//! Scripted stand-ins for the signaling link, peer links and capture device.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;
use walkie_common::{CaptureError, LinkError, ParticipantId, PeerError};

use crate::media::{AudioCapture, LocalStream, StreamId};
use crate::peer::{PeerEventSender, PeerLink, PeerLinkFactory, PeerLinkRequest, PeerRole};
use crate::protocol::OutboundMessage;
use crate::signaling::SignalingLink;

// ---------------------------------------------------------------------------
// Signaling link
// ---------------------------------------------------------------------------

pub(crate) struct FakeLink {
    connected: AtomicBool,
    closed: AtomicBool,
    sent: Mutex<Vec<OutboundMessage>>,
    connects: AtomicUsize,
    disconnects: AtomicUsize,
}

impl FakeLink {
    pub(crate) fn connected() -> Self {
        let link = Self::disconnected();
        link.set_connected(true);
        link
    }

    pub(crate) fn disconnected() -> Self {
        Self {
            connected: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            sent: Mutex::new(Vec::new()),
            connects: AtomicUsize::new(0),
            disconnects: AtomicUsize::new(0),
        }
    }

    pub(crate) fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    pub(crate) fn sent(&self) -> Vec<OutboundMessage> {
        self.sent.lock().unwrap().clone()
    }

    pub(crate) fn take_sent(&self) -> Vec<OutboundMessage> {
        std::mem::take(&mut *self.sent.lock().unwrap())
    }

    pub(crate) fn sent_events(&self) -> Vec<&'static str> {
        self.sent().iter().map(OutboundMessage::event).collect()
    }

    pub(crate) fn connect_calls(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub(crate) fn disconnect_calls(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl SignalingLink for FakeLink {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn send(&self, message: OutboundMessage) -> Result<(), LinkError> {
        if self.is_closed() {
            return Err(LinkError::Closed);
        }
        if !self.is_connected() {
            return Err(LinkError::NotConnected);
        }
        self.sent.lock().unwrap().push(message);
        Ok(())
    }

    fn connect(&self) {
        self.connects.fetch_add(1, Ordering::SeqCst);
    }

    fn disconnect(&self) {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.connected.store(false, Ordering::SeqCst);
    }
}

// ---------------------------------------------------------------------------
// Peer links
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub(crate) struct FakePeerState {
    pub(crate) signals: Vec<Value>,
    pub(crate) streams: Vec<StreamId>,
    pub(crate) destroyed: bool,
}

/// One link the factory handed out, plus the sender a test uses to script
/// the link's events.
#[derive(Clone)]
pub(crate) struct PeerRecord {
    pub(crate) participant: ParticipantId,
    pub(crate) role: PeerRole,
    pub(crate) events: PeerEventSender,
    pub(crate) state: Arc<Mutex<FakePeerState>>,
}

impl PeerRecord {
    pub(crate) fn destroyed(&self) -> bool {
        self.state.lock().unwrap().destroyed
    }

    pub(crate) fn signals(&self) -> Vec<Value> {
        self.state.lock().unwrap().signals.clone()
    }

    pub(crate) fn current_stream(&self) -> Option<StreamId> {
        self.state.lock().unwrap().streams.last().copied()
    }
}

struct FakePeer {
    state: Arc<Mutex<FakePeerState>>,
    fail_destroy: bool,
}

impl PeerLink for FakePeer {
    fn signal(&mut self, payload: Value) {
        self.state.lock().unwrap().signals.push(payload);
    }

    fn replace_stream(&mut self, stream: &LocalStream) {
        self.state.lock().unwrap().streams.push(stream.id());
    }

    fn destroy(&mut self) -> Result<(), PeerError> {
        self.state.lock().unwrap().destroyed = true;
        if self.fail_destroy {
            return Err(PeerError::Destroy("scripted failure".into()));
        }
        Ok(())
    }
}

#[derive(Clone, Default)]
pub(crate) struct FakeFactory {
    records: Arc<Mutex<Vec<PeerRecord>>>,
    fail_destroy_for: Arc<Mutex<Option<ParticipantId>>>,
}

impl FakeFactory {
    pub(crate) fn fail_destroy_for(&self, id: &str) {
        *self.fail_destroy_for.lock().unwrap() = Some(id.into());
    }

    pub(crate) fn records(&self) -> Vec<PeerRecord> {
        self.records.lock().unwrap().clone()
    }

    pub(crate) fn created_count(&self) -> usize {
        self.records.lock().unwrap().len()
    }

    /// Most recent link created for `id`.
    pub(crate) fn record(&self, id: &str) -> PeerRecord {
        let records = self.records.lock().unwrap();
        records
            .iter()
            .rev()
            .find(|r| r.participant.as_str() == id)
            .cloned()
            .unwrap_or_else(|| panic!("no peer link created for {id}"))
    }
}

impl PeerLinkFactory for FakeFactory {
    fn create(
        &self,
        request: PeerLinkRequest,
        events: PeerEventSender,
    ) -> Result<Box<dyn PeerLink>, PeerError> {
        let state = Arc::new(Mutex::new(FakePeerState {
            streams: vec![request.stream.id()],
            ..FakePeerState::default()
        }));
        let fail_destroy =
            self.fail_destroy_for.lock().unwrap().as_ref() == Some(&request.participant);

        self.records.lock().unwrap().push(PeerRecord {
            participant: request.participant,
            role: request.role,
            events,
            state: Arc::clone(&state),
        });
        Ok(Box::new(FakePeer {
            state,
            fail_destroy,
        }))
    }
}

// ---------------------------------------------------------------------------
// Capture
// ---------------------------------------------------------------------------

pub(crate) struct FakeCapture {
    deny: bool,
    calls: AtomicUsize,
}

impl FakeCapture {
    pub(crate) fn granting() -> Self {
        Self {
            deny: false,
            calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn denying() -> Self {
        Self {
            deny: true,
            calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AudioCapture for FakeCapture {
    async fn acquire(&self) -> Result<LocalStream, CaptureError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.deny {
            return Err(CaptureError::Denied("user dismissed the prompt".into()));
        }
        Ok(LocalStream::single_track())
    }
}
