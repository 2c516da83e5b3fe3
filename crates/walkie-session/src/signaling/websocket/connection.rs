//! Background WebSocket connection loop with bounded auto-reconnect.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};
use walkie_common::ParticipantId;

use super::types::{Envelope, LinkCommand, WebSocketLinkConfig, Welcome, WELCOME_EVENT};
use crate::signaling::LinkEvent;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Outcome of trying to (re)establish the socket.
enum Establish {
    Connected(WsStream),
    /// Retry budget spent.
    GaveUp,
    /// `disconnect` was requested while retrying.
    Cancelled,
    Closed,
}

/// Why a live connection ended.
enum Ended {
    Dropped(String),
    Disconnected,
    Closed,
}

// ---------------------------------------------------------------------------
// Connection Loop
// ---------------------------------------------------------------------------

pub(crate) async fn connection_loop(
    config: WebSocketLinkConfig,
    connected: Arc<AtomicBool>,
    event_tx: mpsc::Sender<LinkEvent>,
    mut command_rx: mpsc::UnboundedReceiver<LinkCommand>,
) {
    // Whether a welcome was ever received; later ones are reconnects.
    let mut has_connected = false;
    let mut wanted = true;

    loop {
        if !wanted {
            match command_rx.recv().await {
                Some(LinkCommand::Connect | LinkCommand::Reconnect) => wanted = true,
                Some(LinkCommand::Send(envelope)) => {
                    debug!(event = %envelope.event, "Dropping message while disconnected");
                    continue;
                }
                Some(LinkCommand::Disconnect) => continue,
                Some(LinkCommand::Close) | None => break,
            }
        }

        let ws = match establish(&config, &event_tx, &mut command_rx).await {
            Establish::Connected(ws) => ws,
            Establish::GaveUp | Establish::Cancelled => {
                wanted = false;
                continue;
            }
            Establish::Closed => break,
        };

        let ended = run_connection(
            ws,
            &config,
            &connected,
            &event_tx,
            &mut command_rx,
            &mut has_connected,
        )
        .await;
        let was_ready = connected.swap(false, Ordering::SeqCst);

        let reason = match ended {
            Ended::Dropped(reason) => reason,
            Ended::Disconnected => {
                wanted = false;
                if !was_ready {
                    continue;
                }
                "client disconnect".to_string()
            }
            Ended::Closed => break,
        };
        let event = if was_ready {
            LinkEvent::Disconnected { reason }
        } else {
            LinkEvent::ConnectError { message: reason }
        };
        let _ = event_tx.send(event).await;
    }

    connected.store(false, Ordering::SeqCst);
    info!("Signaling link closed");
}

/// Connect, retrying with exponential backoff up to the configured budget.
/// Commands are read throughout, so repeated connect requests fold into the
/// attempt already in flight instead of queueing up.
async fn establish(
    config: &WebSocketLinkConfig,
    event_tx: &mpsc::Sender<LinkEvent>,
    command_rx: &mut mpsc::UnboundedReceiver<LinkCommand>,
) -> Establish {
    let mut attempt: u32 = 0;
    let mut delay = config.reconnection_delay;

    loop {
        info!(url = %config.url, attempt, "Connecting to signaling relay");
        let connecting = tokio::time::timeout(
            config.connect_timeout,
            tokio_tungstenite::connect_async(config.url.as_str()),
        );
        tokio::pin!(connecting);
        let outcome = loop {
            tokio::select! {
                outcome = &mut connecting => break outcome,
                command = command_rx.recv() => match command {
                    Some(LinkCommand::Connect | LinkCommand::Reconnect) => {
                        debug!("Connection attempt already in flight");
                    }
                    Some(LinkCommand::Disconnect) => return Establish::Cancelled,
                    Some(LinkCommand::Send(envelope)) => {
                        debug!(event = %envelope.event, "Dropping message while connecting");
                    }
                    Some(LinkCommand::Close) | None => return Establish::Closed,
                },
            }
        };
        let message = match outcome {
            Ok(Ok((ws, _))) => return Establish::Connected(ws),
            Ok(Err(e)) => {
                error!(error = %e, "Failed to connect to signaling relay");
                format!("Connection failed: {e}")
            }
            Err(_elapsed) => {
                error!(
                    timeout_secs = config.connect_timeout.as_secs(),
                    "Signaling connection timed out"
                );
                "Connection timed out".to_string()
            }
        };
        let _ = event_tx.send(LinkEvent::ConnectError { message }).await;

        if attempt >= config.reconnection_attempts {
            warn!(attempts = attempt, "Giving up on signaling relay");
            let _ = event_tx.send(LinkEvent::ReconnectFailed).await;
            return Establish::GaveUp;
        }
        attempt += 1;
        let _ = event_tx.send(LinkEvent::ReconnectAttempt { attempt }).await;

        info!(delay_ms = delay.as_millis() as u64, "Reconnecting after backoff");
        let backoff = tokio::time::sleep(delay);
        tokio::pin!(backoff);
        loop {
            tokio::select! {
                _ = &mut backoff => break,
                command = command_rx.recv() => match command {
                    Some(LinkCommand::Connect | LinkCommand::Reconnect) => break,
                    Some(LinkCommand::Disconnect) => return Establish::Cancelled,
                    Some(LinkCommand::Send(envelope)) => {
                        debug!(event = %envelope.event, "Dropping message while reconnecting");
                    }
                    Some(LinkCommand::Close) | None => return Establish::Closed,
                },
            }
        }
        delay = (delay * 2).min(config.max_reconnection_delay);
    }
}

/// Pump one live connection until it drops or is told to stop.
async fn run_connection(
    ws: WsStream,
    config: &WebSocketLinkConfig,
    connected: &AtomicBool,
    event_tx: &mpsc::Sender<LinkEvent>,
    command_rx: &mut mpsc::UnboundedReceiver<LinkCommand>,
    has_connected: &mut bool,
) -> Ended {
    let (mut ws_write, mut ws_read) = ws.split();
    let opened = Instant::now();

    loop {
        tokio::select! {
            frame = ws_read.next() => match frame {
                Some(Ok(WsMessage::Text(text))) => {
                    handle_frame(&text, connected, event_tx, has_connected).await;
                }
                Some(Ok(WsMessage::Close(_))) => {
                    info!("Signaling relay closed connection");
                    return Ended::Dropped("relay closed connection".to_string());
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!(error = %e, "WebSocket error");
                    return Ended::Dropped(format!("transport error: {e}"));
                }
                None => return Ended::Dropped("connection ended".to_string()),
            },
            command = command_rx.recv() => match command {
                Some(LinkCommand::Send(envelope)) => match serde_json::to_string(&envelope) {
                    Ok(json) => {
                        if let Err(e) = ws_write.send(WsMessage::Text(json.into())).await {
                            warn!(error = %e, "Failed to write to signaling relay");
                            return Ended::Dropped(format!("write failed: {e}"));
                        }
                    }
                    Err(e) => warn!(event = %envelope.event, error = %e, "Failed to encode frame"),
                },
                Some(LinkCommand::Connect) => {}
                // Only a socket still waiting for its welcome past the
                // connect timeout is restarted.
                Some(LinkCommand::Reconnect) => {
                    if connected.load(Ordering::SeqCst) || opened.elapsed() < config.connect_timeout {
                        debug!("Ignoring reconnect request, connection is live");
                    } else {
                        warn!("No welcome from signaling relay, restarting connection");
                        let _ = ws_write.send(WsMessage::Close(None)).await;
                        return Ended::Dropped("welcome timed out".to_string());
                    }
                }
                Some(LinkCommand::Disconnect) => {
                    let _ = ws_write.send(WsMessage::Close(None)).await;
                    return Ended::Disconnected;
                }
                Some(LinkCommand::Close) | None => {
                    let _ = ws_write.send(WsMessage::Close(None)).await;
                    return Ended::Closed;
                }
            },
        }
    }
}

async fn handle_frame(
    text: &str,
    connected: &AtomicBool,
    event_tx: &mpsc::Sender<LinkEvent>,
    has_connected: &mut bool,
) {
    let envelope: Envelope = match serde_json::from_str(text) {
        Ok(envelope) => envelope,
        Err(_) => {
            debug!(text = %text, "Unrecognized frame from signaling relay");
            return;
        }
    };

    if envelope.event != WELCOME_EVENT {
        let _ = event_tx
            .send(LinkEvent::Message {
                event: envelope.event,
                payload: envelope.data,
            })
            .await;
        return;
    }

    match serde_json::from_value::<Welcome>(envelope.data) {
        Ok(welcome) if !welcome.id.is_empty() => {
            connected.store(true, Ordering::SeqCst);
            let local_id = ParticipantId::new(welcome.id);
            info!(local_id = %local_id, "Signaling relay assigned identity");
            let event = if *has_connected {
                LinkEvent::Reconnected { local_id }
            } else {
                LinkEvent::Connected { local_id }
            };
            *has_connected = true;
            let _ = event_tx.send(event).await;
        }
        _ => warn!("Welcome frame without an identity"),
    }
}
