//! Session-level reconnect loop.
//!
//! The transport retries on its own, but only a bounded number of times.
//! Once a disconnection outlasts the grace window this manager takes over
//! and cycles the link at a fixed interval until it reports ready again.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::signaling::SignalingLink;

/// Timing for the reconnect loop.
#[derive(Debug, Clone)]
pub struct ResilienceSettings {
    pub grace_period: Duration,
    pub retry_interval: Duration,
}

impl Default for ResilienceSettings {
    fn default() -> Self {
        Self {
            grace_period: Duration::from_secs(2),
            retry_interval: Duration::from_secs(2),
        }
    }
}

/// What the reconnect loop reports back to the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResilienceSignal {
    /// The grace window elapsed without the link coming back.
    GraceElapsed,
    /// A forced disconnect/reconnect cycle was just issued.
    Attempt { attempt: u32 },
}

struct RetryLoop {
    ready: CancellationToken,
    task: JoinHandle<()>,
}

/// Owns the retry timer. Never touches the roster; it only cycles the link
/// and reports through `ResilienceSignal`s.
pub struct ResilienceManager {
    settings: ResilienceSettings,
    link: Arc<dyn SignalingLink>,
    signal_tx: mpsc::UnboundedSender<ResilienceSignal>,
    active: Option<RetryLoop>,
}

impl ResilienceManager {
    pub fn new(
        settings: ResilienceSettings,
        link: Arc<dyn SignalingLink>,
        signal_tx: mpsc::UnboundedSender<ResilienceSignal>,
    ) -> Self {
        Self {
            settings,
            link,
            signal_tx,
            active: None,
        }
    }

    /// Start the grace countdown, unless a loop is already running for this
    /// disconnection.
    pub fn on_link_lost(&mut self) {
        if self.is_active() {
            debug!("Reconnect loop already scheduled");
            return;
        }

        let ready = CancellationToken::new();
        let task = tokio::spawn(retry_loop(
            self.settings.clone(),
            Arc::clone(&self.link),
            self.signal_tx.clone(),
            ready.clone(),
        ));
        self.active = Some(RetryLoop { ready, task });
        debug!(
            grace_ms = self.settings.grace_period.as_millis() as u64,
            "Reconnect grace window started"
        );
    }

    /// The link is ready again; the loop exits.
    pub fn on_link_ready(&mut self) {
        if let Some(active) = self.active.take() {
            active.ready.cancel();
            active.task.abort();
            info!("Signaling link restored, reconnect loop stopped");
        }
    }

    /// Tear down any pending timer. Safe to call repeatedly.
    pub fn stop(&mut self) {
        if let Some(active) = self.active.take() {
            active.ready.cancel();
            active.task.abort();
            debug!("Reconnect loop torn down");
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
            .as_ref()
            .is_some_and(|active| !active.task.is_finished())
    }
}

impl Drop for ResilienceManager {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn retry_loop(
    settings: ResilienceSettings,
    link: Arc<dyn SignalingLink>,
    signal_tx: mpsc::UnboundedSender<ResilienceSignal>,
    ready: CancellationToken,
) {
    tokio::select! {
        _ = ready.cancelled() => return,
        _ = tokio::time::sleep(settings.grace_period) => {}
    }
    if link.is_connected() {
        return;
    }

    info!("Signaling link still down after grace window, retrying");
    let _ = signal_tx.send(ResilienceSignal::GraceElapsed);

    let mut attempt: u32 = 0;
    while !ready.is_cancelled() {
        attempt = attempt.saturating_add(1);
        debug!(attempt, "Forcing signaling reconnect");
        link.reconnect();
        let _ = signal_tx.send(ResilienceSignal::Attempt { attempt });

        tokio::select! {
            _ = ready.cancelled() => break,
            _ = tokio::time::sleep(settings.retry_interval) => {}
        }
        if link.is_connected() {
            break;
        }
    }
}
