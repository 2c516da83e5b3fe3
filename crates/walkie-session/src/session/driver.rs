//! Async front end for a `ChannelSession`.
//!
//! A single task owns the controller and serializes everything that touches
//! it: user commands, link events, peer link events, retry-loop signals, and
//! capture results. Observers read snapshots through a `watch` channel.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info};
use walkie_common::{CaptureError, ChannelId, SessionError};

use crate::media::{AudioCapture, LocalStream};
use crate::peer::{PeerLinkEvent, PeerLinkFactory};
use crate::resilience::ResilienceSignal;
use crate::signaling::{LinkEvent, SignalingLink};

use super::controller::{ChannelSession, SessionChannels};
use super::types::{SessionConfig, SessionEvent, SessionSnapshot};

type Reply = oneshot::Sender<Result<(), SessionError>>;

enum SessionCommand {
    Join(ChannelId, Reply),
    ChangeChannel(ChannelId, Reply),
    StartTalking(Reply),
    StopTalking(Reply),
    ReacquireStream,
    Destroy(oneshot::Sender<()>),
}

/// Cloneable handle to a running session. The session is destroyed when
/// `destroy` is called or the last handle is dropped.
#[derive(Clone)]
pub struct SessionHandle {
    command_tx: mpsc::Sender<SessionCommand>,
    snapshot_rx: watch::Receiver<SessionSnapshot>,
}

impl SessionHandle {
    /// Start the session loop on the current runtime.
    pub fn spawn(
        config: SessionConfig,
        link: Arc<dyn SignalingLink>,
        link_events: mpsc::Receiver<LinkEvent>,
        factory: Box<dyn PeerLinkFactory>,
        capture: Arc<dyn AudioCapture>,
    ) -> (Self, mpsc::Receiver<SessionEvent>) {
        let (session, channels) = ChannelSession::new(&config, link, factory);
        let SessionChannels {
            events,
            peer_events,
            resilience,
        } = channels;

        let (command_tx, command_rx) = mpsc::channel(64);
        let (snapshot_tx, snapshot_rx) = watch::channel(session.snapshot());

        let session_loop = SessionLoop {
            session,
            commands: command_rx,
            link_events,
            peer_events,
            resilience,
            capture,
            snapshot_tx,
        };
        tokio::spawn(session_loop.run(config.acquire_on_start));

        (
            Self {
                command_tx,
                snapshot_rx,
            },
            events,
        )
    }

    pub async fn join(&self, channel: impl Into<ChannelId>) -> Result<(), SessionError> {
        let channel = channel.into();
        self.request(|reply| SessionCommand::Join(channel, reply)).await
    }

    pub async fn change_channel(&self, channel: impl Into<ChannelId>) -> Result<(), SessionError> {
        let channel = channel.into();
        self.request(|reply| SessionCommand::ChangeChannel(channel, reply))
            .await
    }

    pub async fn start_talking(&self) -> Result<(), SessionError> {
        self.request(SessionCommand::StartTalking).await
    }

    pub async fn stop_talking(&self) -> Result<(), SessionError> {
        self.request(SessionCommand::StopTalking).await
    }

    /// Ask the capture device for a fresh stream, e.g. after the user
    /// granted a previously denied permission.
    pub async fn reacquire_stream(&self) -> Result<(), SessionError> {
        self.command_tx
            .send(SessionCommand::ReacquireStream)
            .await
            .map_err(|_| SessionError::Destroyed)
    }

    /// Tear the session down and wait until it is gone.
    pub async fn destroy(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        if self
            .command_tx
            .send(SessionCommand::Destroy(done_tx))
            .await
            .is_ok()
        {
            let _ = done_rx.await;
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshot_rx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshot_rx.clone()
    }

    async fn request(
        &self,
        command: impl FnOnce(Reply) -> SessionCommand,
    ) -> Result<(), SessionError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.command_tx
            .send(command(reply_tx))
            .await
            .map_err(|_| SessionError::Destroyed)?;
        reply_rx.await.map_err(|_| SessionError::Destroyed)?
    }
}

struct SessionLoop {
    session: ChannelSession,
    commands: mpsc::Receiver<SessionCommand>,
    link_events: mpsc::Receiver<LinkEvent>,
    peer_events: mpsc::UnboundedReceiver<PeerLinkEvent>,
    resilience: mpsc::UnboundedReceiver<ResilienceSignal>,
    capture: Arc<dyn AudioCapture>,
    snapshot_tx: watch::Sender<SessionSnapshot>,
}

impl SessionLoop {
    async fn run(mut self, acquire_on_start: bool) {
        let (capture_tx, mut capture_rx) = mpsc::unbounded_channel();
        if acquire_on_start {
            self.acquire(&capture_tx);
        }

        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(command) => {
                        if !self.handle_command(command, &capture_tx) {
                            break;
                        }
                    }
                    None => {
                        debug!("All session handles dropped");
                        self.session.destroy();
                        self.publish();
                        break;
                    }
                },
                Some(event) = self.link_events.recv() => self.session.handle_link_event(event),
                Some(event) = self.peer_events.recv() => self.session.handle_peer_event(event),
                Some(signal) = self.resilience.recv() => self.session.handle_resilience_signal(signal),
                Some(result) = capture_rx.recv() => self.session.handle_stream_acquired(result),
            }
            self.publish();
        }
        info!("Session loop exited");
    }

    /// Returns `false` once the session has been destroyed.
    fn handle_command(
        &mut self,
        command: SessionCommand,
        capture_tx: &mpsc::UnboundedSender<Result<LocalStream, CaptureError>>,
    ) -> bool {
        match command {
            SessionCommand::Join(channel, reply) => {
                let _ = reply.send(self.session.join(channel));
            }
            SessionCommand::ChangeChannel(channel, reply) => {
                let _ = reply.send(self.session.change_channel(channel));
            }
            SessionCommand::StartTalking(reply) => {
                let _ = reply.send(self.session.start_talking());
            }
            SessionCommand::StopTalking(reply) => {
                let _ = reply.send(self.session.stop_talking());
            }
            SessionCommand::ReacquireStream => self.acquire(capture_tx),
            SessionCommand::Destroy(done) => {
                self.session.destroy();
                self.publish();
                let _ = done.send(());
                return false;
            }
        }
        true
    }

    /// Run an acquisition off the loop; the result comes back on `capture_tx`.
    fn acquire(&self, capture_tx: &mpsc::UnboundedSender<Result<LocalStream, CaptureError>>) {
        let capture = Arc::clone(&self.capture);
        let capture_tx = capture_tx.clone();
        tokio::spawn(async move {
            let result = capture.acquire().await;
            // The loop is gone; release the device ourselves.
            if let Err(mpsc::error::SendError(Ok(stream))) = capture_tx.send(result) {
                stream.stop();
            }
        });
    }

    fn publish(&self) {
        let snapshot = self.session.snapshot();
        self.snapshot_tx.send_if_modified(|current| {
            if *current == snapshot {
                false
            } else {
                *current = snapshot;
                true
            }
        });
    }
}
