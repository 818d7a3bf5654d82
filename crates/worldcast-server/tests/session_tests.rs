//! Integration tests for subscriber sessions.
//!
//! Sessions are driven over in-memory `futures` channels standing in for
//! the two halves of a `WebSocket`, so every lifecycle path can be hit
//! deterministically without a network.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::Message;
use futures::StreamExt;
use futures::channel::mpsc;
use serde_json::{Value, json};
use tokio::task::JoinHandle;
use worldcast_core::{Attributes, SubscriberSettings};
use worldcast_server::AppState;
use worldcast_server::session::{ReaderExit, SessionEnd, WriterExit, run_session};

const WAIT: Duration = Duration::from_secs(5);

type Inbound = mpsc::UnboundedSender<Result<Message, axum::Error>>;
type Outbound = mpsc::UnboundedReceiver<Message>;

/// The peer's view of one session.
struct Peer {
    inbound: Inbound,
    outbound: Outbound,
    session: JoinHandle<SessionEnd>,
}

fn attrs(value: Value) -> Attributes {
    match value {
        Value::Object(map) => map,
        _ => Attributes::new(),
    }
}

/// Start a session and wait until its subscriber is registered.
async fn connect(state: &Arc<AppState>) -> Peer {
    let before = state.registry.len();
    let (sink, outbound) = mpsc::unbounded::<Message>();
    let (inbound, stream) = mpsc::unbounded::<Result<Message, axum::Error>>();
    let session = tokio::spawn(run_session(sink, stream, Arc::clone(state)));
    wait_until(|| state.registry.len() > before).await;
    Peer {
        inbound,
        outbound,
        session,
    }
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(WAIT, async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();
}

/// Receive the next text frame written to the peer.
async fn next_text(outbound: &mut Outbound) -> String {
    let frame = tokio::time::timeout(WAIT, outbound.next()).await.unwrap().unwrap();
    assert!(matches!(frame, Message::Text(_)), "expected text frame, got {frame:?}");
    frame.into_text().unwrap().as_str().to_owned()
}

fn push(peer: &Peer, text: &str) {
    peer.inbound
        .unbounded_send(Ok(Message::Text(text.into())))
        .unwrap();
}

async fn finish(session: JoinHandle<SessionEnd>) -> SessionEnd {
    tokio::time::timeout(WAIT, session).await.unwrap().unwrap()
}

// =========================================================================
// Fan-out
// =========================================================================

#[tokio::test]
async fn test_inbound_message_is_echoed_to_every_subscriber() {
    let state = Arc::new(AppState::new());
    let mut sender = connect(&state).await;
    let mut watcher = connect(&state).await;

    push(&sender, r#"{"a": {"x": 1}}"#);

    assert_eq!(next_text(&mut sender.outbound).await, r#"{"a":{"x":1}}"#);
    assert_eq!(next_text(&mut watcher.outbound).await, r#"{"a":{"x":1}}"#);
    assert_eq!(state.store.get("a"), attrs(json!({"x": 1})));
}

#[tokio::test]
async fn test_rest_mutation_reaches_connected_session() {
    let state = Arc::new(AppState::new());
    let mut peer = connect(&state).await;

    state.store.update("a", "hp", json!(7));

    assert_eq!(next_text(&mut peer.outbound).await, r#"{"a":{"hp":7}}"#);
}

#[tokio::test]
async fn test_multi_entity_message_sets_each_entity() {
    let state = Arc::new(AppState::new());
    let mut peer = connect(&state).await;

    push(&peer, r#"{"a": {"x": 1}, "b": {"y": 2}}"#);

    assert_eq!(next_text(&mut peer.outbound).await, r#"{"a":{"x":1}}"#);
    assert_eq!(next_text(&mut peer.outbound).await, r#"{"b":{"y":2}}"#);
}

#[tokio::test]
async fn test_binary_frame_is_applied_like_text() {
    let state = Arc::new(AppState::new());
    let mut peer = connect(&state).await;

    peer.inbound
        .unbounded_send(Ok(Message::Binary(r#"{"a": {"x": 1}}"#.as_bytes().to_vec().into())))
        .unwrap();

    assert_eq!(next_text(&mut peer.outbound).await, r#"{"a":{"x":1}}"#);
}

#[tokio::test]
async fn test_malformed_message_is_dropped_and_session_continues() {
    let state = Arc::new(AppState::new());
    let mut peer = connect(&state).await;

    push(&peer, "not json");
    push(&peer, "[1, 2, 3]");
    push(&peer, r#"{"a": {"x": 1}}"#);

    assert_eq!(next_text(&mut peer.outbound).await, r#"{"a":{"x":1}}"#);
    assert_eq!(state.store.len(), 1);
    assert_eq!(state.registry.len(), 1);
}

#[tokio::test]
async fn test_snapshot_arrives_before_changes() {
    let state = Arc::new(AppState::with_subscribers(&SubscriberSettings {
        mailbox_limit: 0,
        send_snapshot_on_connect: true,
    }));
    state.store.set("a", attrs(json!({"x": 1})));
    let mut peer = connect(&state).await;

    state.store.set("b", attrs(json!({"y": 2})));

    assert_eq!(next_text(&mut peer.outbound).await, r#"{"a":{"x":1}}"#);
    assert_eq!(next_text(&mut peer.outbound).await, r#"{"b":{"y":2}}"#);
}

// =========================================================================
// Lifecycle
// =========================================================================

#[tokio::test]
async fn test_close_frame_ends_session_and_deregisters() {
    let state = Arc::new(AppState::new());
    let mut peer = connect(&state).await;

    peer.inbound.unbounded_send(Ok(Message::Close(None))).unwrap();

    assert_eq!(finish(peer.session).await, SessionEnd::Reader(ReaderExit::PeerClosed));
    assert!(state.registry.is_empty());
    // The writer closed the outbound half.
    assert!(tokio::time::timeout(WAIT, peer.outbound.next()).await.unwrap().is_none());
}

#[tokio::test]
async fn test_stream_end_counts_as_peer_close() {
    let state = Arc::new(AppState::new());
    let peer = connect(&state).await;

    drop(peer.inbound);

    assert_eq!(finish(peer.session).await, SessionEnd::Reader(ReaderExit::PeerClosed));
    assert!(state.registry.is_empty());
}

#[tokio::test]
async fn test_transport_error_ends_session() {
    let state = Arc::new(AppState::new());
    let peer = connect(&state).await;

    peer.inbound
        .unbounded_send(Err(axum::Error::new("connection reset")))
        .unwrap();

    assert_eq!(finish(peer.session).await, SessionEnd::Reader(ReaderExit::TransportError));
    assert!(state.registry.is_empty());
}

#[tokio::test]
async fn test_failed_write_ends_session() {
    let state = Arc::new(AppState::new());
    let peer = connect(&state).await;
    drop(peer.outbound);

    state.store.set("a", attrs(json!({"x": 1})));

    assert_eq!(finish(peer.session).await, SessionEnd::Writer(WriterExit::SendFailed));
    assert!(state.registry.is_empty());
}

#[tokio::test]
async fn test_departed_session_does_not_affect_others() {
    let state = Arc::new(AppState::new());
    let leaver = connect(&state).await;
    let mut stayer = connect(&state).await;

    drop(leaver.inbound);
    finish(leaver.session).await;

    state.store.set("a", attrs(json!({"x": 1})));

    assert_eq!(next_text(&mut stayer.outbound).await, r#"{"a":{"x":1}}"#);
    assert_eq!(state.registry.len(), 1);
}

#[tokio::test]
async fn test_overflowing_subscriber_is_disconnected() {
    let state = Arc::new(AppState::with_subscribers(&SubscriberSettings {
        mailbox_limit: 1,
        send_snapshot_on_connect: false,
    }));
    let peer = connect(&state).await;

    // No await between mutations: the writer gets no chance to drain.
    for i in 0..5 {
        state.store.update("a", "n", json!(i));
    }

    assert!(state.registry.is_empty());
    assert_eq!(finish(peer.session).await, SessionEnd::Writer(WriterExit::Overflowed));
}
