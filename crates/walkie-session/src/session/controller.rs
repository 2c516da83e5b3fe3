//! Channel session controller: join lifecycle, roster reconciliation,
//! signal relay, and talk-state aggregation.
//!
//! Every handler runs to completion on the session loop and tolerates
//! replays and out-of-order delivery of the same logical event; there is no
//! sequence numbering to lean on.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use walkie_common::{CaptureError, ChannelId, ParticipantId, SessionError};

use crate::media::LocalStream;
use crate::peer::{PeerEventKind, PeerEventSender, PeerLinkEvent, PeerLinkFactory, PeerLinkRequest, PeerRole};
use crate::protocol::{InboundMessage, OutboundMessage, SignalEnvelope, TalkAnnouncement};
use crate::resilience::{ResilienceManager, ResilienceSignal};
use crate::roster::{reconcile, PeerHandle, Roster};
use crate::signaling::{LinkEvent, SignalingLink};

use super::types::{SessionConfig, SessionEvent, SessionSnapshot, SessionState};

/// Receivers the session loop drains on behalf of a `ChannelSession`.
pub struct SessionChannels {
    pub events: mpsc::Receiver<SessionEvent>,
    pub peer_events: mpsc::UnboundedReceiver<PeerLinkEvent>,
    pub resilience: mpsc::UnboundedReceiver<ResilienceSignal>,
}

// ---------------------------------------------------------------------------
// Controller
// ---------------------------------------------------------------------------

/// Owns the roster and the session state exclusively.
pub struct ChannelSession {
    link: Arc<dyn SignalingLink>,
    factory: Box<dyn PeerLinkFactory>,
    resilience: ResilienceManager,
    peer_tx: mpsc::UnboundedSender<PeerLinkEvent>,
    event_tx: mpsc::Sender<SessionEvent>,

    state: SessionState,
    /// Where to go back to once a blocking capture error clears.
    resume_state: SessionState,
    channel: Option<ChannelId>,
    local_id: Option<ParticipantId>,
    /// Channel membership as last announced by the relay (snapshot plus
    /// deltas), with the role each peer link should be created in.
    membership: BTreeMap<ParticipantId, PeerRole>,
    roster: Roster,
    talking: BTreeSet<ParticipantId>,
    holding: bool,
    stream: Option<LocalStream>,
    capture_error: Option<String>,
    join_error: bool,
    status: Option<String>,
    last_error: Option<String>,
    next_generation: u64,
    destroyed: bool,
}

impl ChannelSession {
    pub fn new(
        config: &SessionConfig,
        link: Arc<dyn SignalingLink>,
        factory: Box<dyn PeerLinkFactory>,
    ) -> (Self, SessionChannels) {
        let (event_tx, events) = mpsc::channel(config.event_buffer.max(1));
        let (peer_tx, peer_events) = mpsc::unbounded_channel();
        let (resilience_tx, resilience) = mpsc::unbounded_channel();

        let session = Self {
            resilience: ResilienceManager::new(
                config.resilience.clone(),
                Arc::clone(&link),
                resilience_tx,
            ),
            link,
            factory,
            peer_tx,
            event_tx,
            state: SessionState::Idle,
            resume_state: SessionState::Idle,
            channel: None,
            local_id: None,
            membership: BTreeMap::new(),
            roster: Roster::new(),
            talking: BTreeSet::new(),
            holding: false,
            stream: None,
            capture_error: None,
            join_error: false,
            status: None,
            last_error: None,
            next_generation: 0,
            destroyed: false,
        };
        let channels = SessionChannels {
            events,
            peer_events,
            resilience,
        };
        (session, channels)
    }

    // -----------------------------------------------------------------------
    // User operations
    // -----------------------------------------------------------------------

    /// Request membership in `channel`, starting from a clean slate.
    pub fn join(&mut self, channel: ChannelId) -> Result<(), SessionError> {
        if self.destroyed {
            return Err(SessionError::Destroyed);
        }
        if channel.is_empty() {
            return self.fail_join(SessionError::EmptyChannel);
        }
        if !self.link.is_connected() {
            return self.fail_join(SessionError::LinkNotReady);
        }
        if self.local_id.is_none() {
            return self.fail_join(SessionError::NoLocalIdentity);
        }

        self.reset_channel_state();
        self.channel = Some(channel.clone());

        if let Err(e) = self.link.send(OutboundMessage::JoinChannel(channel.clone())) {
            return self.fail_join(e.into());
        }
        self.join_error = false;
        self.transition(SessionState::Joining);
        info!(channel = %channel, "Join requested");
        Ok(())
    }

    /// Switch to another channel. While the link is down the new channel is
    /// only recorded and joined once the link is back.
    pub fn change_channel(&mut self, channel: ChannelId) -> Result<(), SessionError> {
        if self.destroyed {
            return Err(SessionError::Destroyed);
        }
        if channel.is_empty() {
            return self.fail_join(SessionError::EmptyChannel);
        }
        let state = self.effective_state();
        if self.channel.as_ref() == Some(&channel) && state.is_in_channel() {
            debug!(channel = %channel, "Already in channel");
            return Ok(());
        }
        if state.is_link_down() {
            info!(channel = %channel, "Channel recorded, joining once signaling is back");
            self.channel = Some(channel);
            return Ok(());
        }
        self.join(channel)
    }

    pub fn start_talking(&mut self) -> Result<(), SessionError> {
        if self.destroyed {
            return Err(SessionError::Destroyed);
        }
        if self.holding {
            debug!("Already talking");
            return Ok(());
        }
        let user_id = self.check_talk_ready()?;

        self.holding = true;
        if let Some(stream) = &self.stream {
            stream.set_enabled(true);
        }
        let announcement = TalkAnnouncement {
            channel_id: self.channel.clone(),
            user_id,
        };
        if let Err(e) = self.link.send(OutboundMessage::Talking(announcement)) {
            warn!(error = %e, "Failed to announce talking");
        }
        self.emit(SessionEvent::LocalTalkingChanged { talking: true });
        Ok(())
    }

    pub fn stop_talking(&mut self) -> Result<(), SessionError> {
        if self.destroyed {
            return Err(SessionError::Destroyed);
        }
        if !self.holding {
            debug!("Not talking");
            return Ok(());
        }
        let user_id = self.check_talk_ready()?;

        self.holding = false;
        if let Some(stream) = &self.stream {
            stream.set_enabled(false);
        }
        let announcement = TalkAnnouncement {
            channel_id: self.channel.clone(),
            user_id,
        };
        if let Err(e) = self.link.send(OutboundMessage::StoppedTalking(announcement)) {
            warn!(error = %e, "Failed to announce stop talking");
        }
        self.emit(SessionEvent::LocalTalkingChanged { talking: false });
        Ok(())
    }

    /// Tear everything down: retry loop, peer links, capture device, and
    /// finally the signaling link. Each step runs regardless of the others.
    pub fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.destroyed = true;
        info!("Destroying channel session");

        self.resilience.stop();
        self.destroy_all_links();
        if let Some(stream) = self.stream.take() {
            stream.stop();
        }
        self.link.close();

        self.membership.clear();
        self.talking.clear();
        self.holding = false;
        self.set_state(SessionState::Idle);
    }

    // -----------------------------------------------------------------------
    // Inbound membership and talk state
    // -----------------------------------------------------------------------

    /// Full reconciliation against the relay's membership list. Applying the
    /// same snapshot twice changes nothing the second time.
    pub fn handle_membership_snapshot(&mut self, participants: Vec<ParticipantId>) {
        if self.channel.is_none() {
            debug!("Membership snapshot without a requested channel; ignoring");
            return;
        }

        let local_id = self.local_id.clone();
        let desired: BTreeMap<ParticipantId, PeerRole> = participants
            .into_iter()
            .filter(|id| Some(id) != local_id.as_ref())
            .map(|id| {
                let role = self
                    .membership
                    .get(&id)
                    .copied()
                    .unwrap_or(PeerRole::Responder);
                (id, role)
            })
            .collect();

        let diff = reconcile(self.membership.keys(), desired.keys());
        self.membership = desired;

        for id in diff.remove {
            if self.talking.remove(&id) {
                self.emit(SessionEvent::TalkingChanged {
                    participant: id.clone(),
                    talking: false,
                });
            }
            self.emit(SessionEvent::ParticipantLeft { participant: id });
        }
        for id in diff.add {
            self.emit(SessionEvent::ParticipantJoined { participant: id });
        }

        self.sync_links();

        if self.effective_state() == SessionState::Joining {
            info!(
                channel = ?self.channel.as_ref().map(ChannelId::as_str),
                peers = self.membership.len(),
                "Joined channel"
            );
            self.transition(SessionState::Joined);
        }
    }

    pub fn handle_participant_joined(&mut self, id: ParticipantId) {
        if self.channel.is_none() || Some(&id) == self.local_id.as_ref() {
            return;
        }
        if self.membership.contains_key(&id) {
            debug!(participant = %id, "Duplicate join notification");
            return;
        }

        info!(participant = %id, "Participant joined");
        self.membership.insert(id.clone(), PeerRole::Initiator);
        if !self.roster.contains(&id) {
            self.create_peer_link(&id, PeerRole::Initiator);
        }
        self.emit(SessionEvent::ParticipantJoined { participant: id });
    }

    pub fn handle_participant_left(&mut self, id: &ParticipantId) {
        let was_member = self.membership.remove(id).is_some();
        let was_talking = self.talking.remove(id);
        let had_link = self.teardown_link(id);

        if was_talking {
            self.emit(SessionEvent::TalkingChanged {
                participant: id.clone(),
                talking: false,
            });
        }
        if was_member || had_link {
            info!(participant = %id, "Participant left");
            self.emit(SessionEvent::ParticipantLeft {
                participant: id.clone(),
            });
        }
    }

    /// Forward a setup blob to the addressed peer link, if it still exists.
    pub fn handle_signal(&mut self, from: &ParticipantId, payload: Value) {
        match self.roster.get_mut(from) {
            Some(handle) => handle.signal(payload),
            None => debug!(participant = %from, "Dropping signal for unknown peer"),
        }
    }

    pub fn handle_talking(&mut self, id: ParticipantId) {
        if self.talking.insert(id.clone()) {
            self.emit(SessionEvent::TalkingChanged {
                participant: id,
                talking: true,
            });
        }
    }

    pub fn handle_stopped_talking(&mut self, id: &ParticipantId) {
        if self.talking.remove(id) {
            self.emit(SessionEvent::TalkingChanged {
                participant: id.clone(),
                talking: false,
            });
        }
    }

    // -----------------------------------------------------------------------
    // Peer links
    // -----------------------------------------------------------------------

    /// Create a link for `id`. Without a local stream nothing is created;
    /// reconciliation retries once a stream arrives.
    pub fn create_peer_link(&mut self, id: &ParticipantId, role: PeerRole) -> bool {
        let Some(stream) = self.stream.as_ref() else {
            debug!(participant = %id, "No local stream yet; deferring peer link");
            return false;
        };
        if Some(id) == self.local_id.as_ref() {
            return false;
        }

        self.next_generation += 1;
        let generation = self.next_generation;
        let request = PeerLinkRequest {
            participant: id.clone(),
            role,
            stream: stream.clone(),
        };
        let stream_id = stream.id();
        let events = PeerEventSender::new(id.clone(), generation, self.peer_tx.clone());

        match self.factory.create(request, events) {
            Ok(link) => {
                let handle = PeerHandle::new(link, generation, role, stream_id);
                if let Some(replaced) = self.roster.insert(id.clone(), handle) {
                    if let Err(e) = replaced.destroy() {
                        warn!(participant = %id, error = %e, "Failed to tear down replaced peer link");
                    }
                }
                debug!(participant = %id, initiator = role.is_initiator(), generation, "Peer link created");
                true
            }
            Err(e) => {
                warn!(participant = %id, error = %e, "Failed to create peer link");
                false
            }
        }
    }

    pub fn handle_peer_event(&mut self, event: PeerLinkEvent) {
        if self.destroyed {
            return;
        }
        let PeerLinkEvent {
            participant,
            generation,
            kind,
        } = event;
        if self.roster.generation_of(&participant) != Some(generation) {
            debug!(participant = %participant, generation, "Dropping event from stale peer link");
            return;
        }

        match kind {
            PeerEventKind::Setup(blob) => {
                let message = OutboundMessage::Signal(SignalEnvelope {
                    to: participant.clone(),
                    signal: blob,
                });
                if let Err(e) = self.link.send(message) {
                    warn!(participant = %participant, error = %e, "Failed to relay setup signal");
                }
            }
            PeerEventKind::RemoteStream(stream) => {
                info!(participant = %participant, stream = %stream.id, "Remote audio stream ready");
                self.emit(SessionEvent::RemoteStream {
                    from: participant,
                    stream,
                });
            }
            PeerEventKind::Error(message) => {
                warn!(participant = %participant, error = %message, "Peer link failed");
                if let Some(handle) = self.roster.remove_generation(&participant, generation) {
                    if let Err(e) = handle.destroy() {
                        debug!(participant = %participant, error = %e, "Teardown after fault failed");
                    }
                }
                self.emit(SessionEvent::Error(format!(
                    "peer link to {participant} failed: {message}"
                )));
            }
            PeerEventKind::Closed => {
                debug!(participant = %participant, "Peer link closed");
                self.roster.remove_generation(&participant, generation);
            }
        }
    }

    // -----------------------------------------------------------------------
    // Signaling link
    // -----------------------------------------------------------------------

    pub fn handle_link_event(&mut self, event: LinkEvent) {
        if self.destroyed {
            return;
        }
        match event {
            LinkEvent::Connected { local_id } => self.on_link_ready(local_id, false),
            LinkEvent::Reconnected { local_id } => self.on_link_ready(local_id, true),
            LinkEvent::Disconnected { reason } => {
                warn!(reason = %reason, "Signaling link lost");
                self.local_id = None;
                if self.effective_state().is_in_channel() {
                    self.transition(SessionState::SignalingLost);
                }
                self.status = Some("Signaling connection lost".into());
                self.resilience.on_link_lost();
            }
            LinkEvent::ReconnectAttempt { attempt } => {
                debug!(attempt, "Signaling transport retrying");
                self.status = Some(format!("Reconnecting (attempt {attempt})"));
            }
            LinkEvent::ReconnectFailed => {
                warn!("Signaling transport gave up reconnecting");
                self.status = Some("Automatic reconnection failed, still retrying".into());
                self.resilience.on_link_lost();
            }
            LinkEvent::ConnectError { message } => {
                warn!(error = %message, "Signaling connect error");
                self.last_error = Some(message);
                if !self.link.is_connected() {
                    self.resilience.on_link_lost();
                }
            }
            LinkEvent::Message { event, payload } => match InboundMessage::parse(&event, &payload) {
                Ok(message) => self.dispatch(message),
                Err(e) => warn!(error = %e, "Dropping malformed signaling event"),
            },
        }
    }

    pub fn handle_resilience_signal(&mut self, signal: ResilienceSignal) {
        if self.destroyed {
            return;
        }
        match signal {
            ResilienceSignal::GraceElapsed => {
                if self.effective_state() == SessionState::SignalingLost {
                    self.transition(SessionState::Retrying);
                }
                self.status = Some("Connection lost, retrying".into());
            }
            ResilienceSignal::Attempt { attempt } => {
                self.status = Some(format!("Retrying connection (attempt {attempt})"));
            }
        }
    }

    // -----------------------------------------------------------------------
    // Capture
    // -----------------------------------------------------------------------

    /// Outcome of a (re-)acquisition of the capture device.
    pub fn handle_stream_acquired(&mut self, result: Result<LocalStream, CaptureError>) {
        if self.destroyed {
            if let Ok(stream) = result {
                stream.stop();
            }
            return;
        }

        match result {
            Ok(stream) => {
                info!(stream = %stream.id(), "Local audio stream acquired");
                stream.set_enabled(self.holding);
                for handle in self.roster.handles_mut() {
                    handle.replace_stream(&stream);
                }
                let new_id = stream.id();
                if let Some(previous) = self.stream.replace(stream) {
                    if previous.id() != new_id {
                        previous.stop();
                    }
                }

                self.capture_error = None;
                if self.state == SessionState::Error {
                    let resume = self.resume_state;
                    self.set_state(resume);
                }
                self.sync_links();
            }
            Err(e) => {
                warn!(error = %e, "Audio capture failed");
                self.capture_error = Some(e.to_string());
                self.last_error = Some(e.to_string());
                self.emit(SessionEvent::Error(e.to_string()));
            }
        }
    }

    // -----------------------------------------------------------------------
    // Observation
    // -----------------------------------------------------------------------

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            state: self.state,
            channel: self.channel.clone(),
            local_id: self.local_id.clone(),
            roster: self.roster.ids(),
            talking: self.talking.iter().cloned().collect(),
            is_talking: self.holding,
            join_error: self.join_error,
            capture_blocked: self.capture_error.is_some(),
            status: self.status.clone(),
            last_error: self.last_error.clone(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn roster_ids(&self) -> Vec<ParticipantId> {
        self.roster.ids()
    }

    pub fn talking(&self) -> Vec<ParticipantId> {
        self.talking.iter().cloned().collect()
    }

    pub fn is_talking(&self) -> bool {
        self.holding
    }

    pub fn local_stream(&self) -> Option<&LocalStream> {
        self.stream.as_ref()
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn dispatch(&mut self, message: InboundMessage) {
        match message {
            InboundMessage::ChannelUsers(users) => self.handle_membership_snapshot(users),
            InboundMessage::UserJoined(id) => self.handle_participant_joined(id),
            InboundMessage::UserLeft(id) => self.handle_participant_left(&id),
            InboundMessage::Signal { from, signal } => self.handle_signal(&from, signal),
            InboundMessage::Talking(id) => self.handle_talking(id),
            InboundMessage::StoppedTalking(id) => self.handle_stopped_talking(&id),
        }
    }

    fn on_link_ready(&mut self, local_id: ParticipantId, reconnected: bool) {
        info!(local_id = %local_id, reconnected, "Signaling link ready");
        self.local_id = Some(local_id);
        self.resilience.on_link_ready();
        self.status = None;

        let state = self.effective_state();
        match self.channel.clone() {
            // The relay keeps no membership across reconnects.
            Some(channel) if state.is_link_down() || state.is_in_channel() => {
                info!(channel = %channel, "Re-joining channel");
                if let Err(e) = self.join(channel) {
                    warn!(error = %e, "Automatic re-join failed");
                }
            }
            _ if state.is_link_down() => self.transition(SessionState::Idle),
            _ => {}
        }
    }

    /// Bring the roster in line with membership: drop links for departed
    /// participants, create missing ones.
    fn sync_links(&mut self) {
        let diff = reconcile(self.roster.keys(), self.membership.keys());
        for id in &diff.remove {
            self.teardown_link(id);
        }
        for id in &diff.add {
            let role = self
                .membership
                .get(id)
                .copied()
                .unwrap_or(PeerRole::Responder);
            self.create_peer_link(id, role);
        }
    }

    fn teardown_link(&mut self, id: &ParticipantId) -> bool {
        match self.roster.remove(id) {
            Some(handle) => {
                if let Err(e) = handle.destroy() {
                    warn!(participant = %id, error = %e, "Failed to tear down peer link");
                }
                true
            }
            None => false,
        }
    }

    fn destroy_all_links(&mut self) {
        for (id, handle) in self.roster.drain() {
            if let Err(e) = handle.destroy() {
                warn!(participant = %id, error = %e, "Failed to tear down peer link");
            }
        }
    }

    /// Clean slate before every (re-)join.
    fn reset_channel_state(&mut self) {
        self.destroy_all_links();
        for participant in std::mem::take(&mut self.talking) {
            self.emit(SessionEvent::TalkingChanged {
                participant,
                talking: false,
            });
        }
        for participant in std::mem::take(&mut self.membership).into_keys() {
            self.emit(SessionEvent::ParticipantLeft { participant });
        }
        if self.holding {
            self.holding = false;
            self.emit(SessionEvent::LocalTalkingChanged { talking: false });
        }
        if let Some(stream) = &self.stream {
            stream.set_enabled(false);
        }
    }

    fn check_talk_ready(&mut self) -> Result<ParticipantId, SessionError> {
        let result = if self.stream.is_none() {
            match &self.capture_error {
                Some(reason) => Err(SessionError::CaptureBlocked(reason.clone())),
                None => Err(SessionError::NoLocalStream),
            }
        } else if !self.link.is_connected() {
            Err(SessionError::LinkNotReady)
        } else {
            self.local_id.clone().ok_or(SessionError::NoLocalIdentity)
        };

        if let Err(e) = &result {
            warn!(error = %e, "Talk request refused");
            self.last_error = Some(e.to_string());
            if matches!(e, SessionError::CaptureBlocked(_)) {
                self.set_state(SessionState::Error);
                self.emit(SessionEvent::Error(e.to_string()));
            }
        }
        result
    }

    fn fail_join(&mut self, error: SessionError) -> Result<(), SessionError> {
        warn!(error = %error, "Join rejected");
        self.join_error = true;
        self.last_error = Some(error.to_string());
        Err(error)
    }

    /// The state the session would be in if no capture error were blocking it.
    fn effective_state(&self) -> SessionState {
        if self.state == SessionState::Error {
            self.resume_state
        } else {
            self.state
        }
    }

    /// Apply a lifecycle transition; while blocked in `Error` it only moves
    /// the state to resume into.
    fn transition(&mut self, to: SessionState) {
        if self.state == SessionState::Error {
            self.resume_state = to;
        } else {
            self.set_state(to);
        }
    }

    fn set_state(&mut self, to: SessionState) {
        if self.state == to {
            return;
        }
        if to == SessionState::Error {
            self.resume_state = self.state;
        }
        let from = self.state;
        self.state = to;
        info!(from = %from, to = %to, "Session state changed");
        self.emit(SessionEvent::StateChanged { from, to });
    }

    fn emit(&self, event: SessionEvent) {
        if let Err(mpsc::error::TrySendError::Full(event)) = self.event_tx.try_send(event) {
            warn!(?event, "Session event channel full; dropping event");
        }
    }
}
