use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use walkie_common::{ChannelId, LinkError, ParticipantId};

use super::*;
use crate::protocol::OutboundMessage;
use crate::signaling::{LinkEvent, SignalingLink};

fn text(frame: Value) -> WsMessage {
    WsMessage::Text(frame.to_string().into())
}

fn config(url: String) -> WebSocketLinkConfig {
    WebSocketLinkConfig {
        url,
        reconnection_attempts: 0,
        reconnection_delay: Duration::from_millis(50),
        max_reconnection_delay: Duration::from_millis(100),
        connect_timeout: Duration::from_secs(1),
    }
}

async fn next_event(events: &mut mpsc::Receiver<LinkEvent>) -> LinkEvent {
    tokio::time::timeout(Duration::from_secs(5), events.recv())
        .await
        .expect("timed out waiting for link event")
        .expect("link event channel closed")
}

#[test]
fn envelope_uses_event_and_data_fields() {
    let envelope: Envelope =
        serde_json::from_value(json!({ "event": "user-left", "data": "u2" })).unwrap();
    assert_eq!(envelope.event, "user-left");
    assert_eq!(envelope.data, json!("u2"));

    let bare: Envelope = serde_json::from_value(json!({ "event": "ping" })).unwrap();
    assert_eq!(bare.data, Value::Null);
}

#[tokio::test]
async fn relays_frames_after_welcome() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let relay = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        ws.send(text(json!({ "event": "welcome", "data": { "id": "u1" } })))
            .await
            .unwrap();

        while let Some(Ok(frame)) = ws.next().await {
            if let WsMessage::Text(body) = frame {
                let envelope: Value = serde_json::from_str(&body).unwrap();
                if envelope["event"] == "join-channel" {
                    assert_eq!(envelope["data"], "room1");
                    ws.send(text(json!({ "event": "channel-users", "data": ["u2", "u3"] })))
                        .await
                        .unwrap();
                    break;
                }
            }
        }
        let _ = ws.close(None).await;
    });

    let (link, mut events) = WebSocketLink::connect(config(format!("ws://{addr}")));
    assert_eq!(
        link.send(OutboundMessage::JoinChannel(ChannelId::new("room1"))),
        Err(LinkError::NotConnected)
    );

    assert_eq!(
        next_event(&mut events).await,
        LinkEvent::Connected {
            local_id: ParticipantId::new("u1")
        }
    );
    assert!(link.is_connected());

    link.send(OutboundMessage::JoinChannel(ChannelId::new("room1")))
        .unwrap();
    assert_eq!(
        next_event(&mut events).await,
        LinkEvent::Message {
            event: "channel-users".into(),
            payload: json!(["u2", "u3"]),
        }
    );

    assert!(matches!(
        next_event(&mut events).await,
        LinkEvent::Disconnected { .. }
    ));
    assert!(!link.is_connected());

    // One retry budget of zero: the first failed reconnect gives up.
    loop {
        if next_event(&mut events).await == LinkEvent::ReconnectFailed {
            break;
        }
    }
    relay.await.unwrap();
    link.close();
}

#[tokio::test]
async fn unreachable_relay_exhausts_retry_budget() {
    // Bind then drop to get a port nothing listens on.
    let addr = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap()
    };
    let mut cfg = config(format!("ws://{addr}"));
    cfg.reconnection_attempts = 2;

    let (link, mut events) = WebSocketLink::connect(cfg);

    let mut seen = Vec::new();
    loop {
        let event = next_event(&mut events).await;
        let done = event == LinkEvent::ReconnectFailed;
        seen.push(event);
        if done {
            break;
        }
    }

    let attempts: Vec<u32> = seen
        .iter()
        .filter_map(|e| match e {
            LinkEvent::ReconnectAttempt { attempt } => Some(*attempt),
            _ => None,
        })
        .collect();
    assert_eq!(attempts, vec![1, 2]);
    let errors = seen
        .iter()
        .filter(|e| matches!(e, LinkEvent::ConnectError { .. }))
        .count();
    assert_eq!(errors, 3);
    assert!(!link.is_connected());
    link.close();
}

#[tokio::test]
async fn reconnect_requests_during_a_stalled_handshake_settle_on_one_session() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let answer_from = Instant::now() + Duration::from_millis(1200);
    let sessions = Arc::new(AtomicUsize::new(0));

    let relay_sessions = Arc::clone(&sessions);
    let relay = tokio::spawn(async move {
        let mut stalled = Vec::new();
        loop {
            let (stream, _) = listener.accept().await.unwrap();
            if Instant::now() < answer_from {
                // Accept TCP but never answer the upgrade.
                stalled.push(stream);
                continue;
            }
            let Ok(mut ws) = tokio_tungstenite::accept_async(stream).await else {
                continue;
            };
            let n = relay_sessions.fetch_add(1, Ordering::SeqCst) + 1;
            tokio::spawn(async move {
                let welcome = json!({ "event": "welcome", "data": { "id": format!("u{n}") } });
                let _ = ws.send(text(welcome)).await;
                while let Some(Ok(_)) = ws.next().await {}
            });
        }
    });

    let mut cfg = config(format!("ws://{addr}"));
    cfg.reconnection_attempts = 20;
    cfg.connect_timeout = Duration::from_millis(300);
    let (link, mut events) = WebSocketLink::connect(cfg);
    let link = Arc::new(link);

    // Cycle the link the way the session retry loop does until it is up.
    let cycling = Arc::clone(&link);
    let cycler = tokio::spawn(async move {
        while !cycling.is_connected() {
            cycling.reconnect();
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    });

    loop {
        match next_event(&mut events).await {
            LinkEvent::Connected { local_id } => {
                assert_eq!(local_id, ParticipantId::new("u1"));
                break;
            }
            LinkEvent::ConnectError { .. } | LinkEvent::ReconnectAttempt { .. } => {}
            other => panic!("unexpected link event {other:?}"),
        }
    }
    cycler.await.unwrap();

    let quiet = tokio::time::timeout(Duration::from_secs(1), events.recv()).await;
    assert!(quiet.is_err(), "link churned after recovery: {quiet:?}");
    assert!(link.is_connected());
    assert_eq!(sessions.load(Ordering::SeqCst), 1);

    link.close();
    relay.abort();
}
