//! `WebSocket` upgrade for the `/subscribe` endpoint.
//!
//! Every connection becomes a subscriber: it receives each store change
//! as a `{ id: attributes }` text frame and may push `{ id: attributes }`
//! frames of its own, which are applied to the store and echoed back to
//! every subscriber, the sender included. See [`crate::session`] for the
//! connection lifecycle.

use std::sync::Arc;

use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures::StreamExt;

use crate::session::run_session;
use crate::state::AppState;

/// Upgrade an HTTP request to a `WebSocket` subscriber session.
///
/// # Route
///
/// `GET /subscribe`
pub async fn subscribe(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| async move {
        let (sink, stream) = socket.split();
        run_session(sink, stream, state).await;
    })
}
