//! The lifetime of one `/subscribe` connection.
//!
//! A session registers a subscriber, then runs two duties as separate
//! tasks:
//!
//! - **reader** -- receives frames from the peer and applies each one to
//!   the store with [`apply_message`]. A malformed frame is logged and
//!   dropped; the reader keeps going. It stops when the peer closes or the
//!   transport fails.
//! - **writer** -- drains the subscriber's [`Mailbox`] in FIFO order and
//!   writes each message as a text frame. It stops when a write fails,
//!   when the mailbox is closed or overflowed, or when asked to close.
//!
//! Whichever duty finishes first triggers teardown, which runs exactly
//! once: deregister the subscriber, stop the sibling duty, close the
//! connection. The teardown guard also runs if the session future is
//! dropped mid-flight, so a subscriber can never outlive its connection.
//!
//! ```text
//!            ┌──────── reader ────────┐
//!   peer ───►│ frame → apply_message  │──► Store::set ──► broadcast
//!            └────────────────────────┘                      │
//!            ┌──────── writer ────────┐                      ▼
//!   peer ◄───│ sink.send ← dequeue    │◄──────────────── Mailbox
//!            └────────────────────────┘
//! ```
//!
//! The session is generic over its sink and stream halves so it can be
//! driven by a split axum [`WebSocket`](axum::extract::ws::WebSocket) or by
//! in-memory channels in tests.

use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, Utf8Bytes};
use futures::{Sink, SinkExt, Stream, StreamExt};
use tokio::sync::oneshot;
use tokio::task::AbortHandle;
use tracing::{debug, trace, warn};
use worldcast_core::{InboundError, Mailbox, Registry, Store, SubscriberId, apply_message};

use crate::state::AppState;

/// How long the writer gets to flush and send a close frame after the
/// reader has ended.
pub const CLOSE_GRACE: Duration = Duration::from_secs(5);

/// Lifecycle phase of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Both duties may be running; the subscriber is registered.
    Open,
    /// Teardown has started; the subscriber is deregistered.
    Closing,
    /// Both duties are stopped and the connection is released.
    Closed,
}

/// Why the reader duty stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderExit {
    /// The peer sent a close frame or the stream ended.
    PeerClosed,
    /// Receiving from the transport failed.
    TransportError,
}

/// Why the writer duty stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriterExit {
    /// Teardown asked the writer to close the connection.
    CloseRequested,
    /// The subscriber was removed from the registry and its queue drained.
    MailboxClosed,
    /// The subscriber exceeded its mailbox limit.
    Overflowed,
    /// Writing to the transport failed.
    SendFailed,
}

/// Which duty ended the session, and why.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The reader finished first.
    Reader(ReaderExit),
    /// The writer finished first.
    Writer(WriterExit),
    /// A duty panicked or was cancelled.
    Failed,
}

/// Guaranteed cleanup for one session.
///
/// [`begin`](Self::begin) and [`finish`](Self::finish) are idempotent, and
/// `Drop` runs whatever has not run yet.
struct Teardown {
    registry: Arc<Registry>,
    subscriber: SubscriberId,
    reader: AbortHandle,
    writer: AbortHandle,
    phase: SessionPhase,
}

impl Teardown {
    const fn new(
        registry: Arc<Registry>,
        subscriber: SubscriberId,
        reader: AbortHandle,
        writer: AbortHandle,
    ) -> Self {
        Self {
            registry,
            subscriber,
            reader,
            writer,
            phase: SessionPhase::Open,
        }
    }

    /// Deregister the subscriber.
    fn begin(&mut self) {
        if self.phase == SessionPhase::Open {
            self.phase = SessionPhase::Closing;
            self.registry.remove(self.subscriber);
        }
    }

    /// Stop whatever duty is still running.
    fn finish(&mut self) {
        self.begin();
        if self.phase == SessionPhase::Closing {
            self.reader.abort();
            self.writer.abort();
            self.phase = SessionPhase::Closed;
        }
    }
}

impl Drop for Teardown {
    fn drop(&mut self) {
        self.finish();
    }
}

/// Run one subscriber session until either duty ends.
///
/// Returns which duty ended the session. On return the subscriber is no
/// longer registered and the connection has been closed or dropped.
pub async fn run_session<W, R, E>(sink: W, stream: R, state: Arc<AppState>) -> SessionEnd
where
    W: Sink<Message> + Send + Unpin + 'static,
    W::Error: Display + Send,
    R: Stream<Item = Result<Message, E>> + Send + Unpin + 'static,
    E: Display + Send + 'static,
{
    let mailbox = state.open_mailbox();
    let subscriber = mailbox.id();
    debug!(%subscriber, "subscriber connected");

    let (close_tx, close_rx) = oneshot::channel();
    let mut writer = tokio::spawn(write_duty(sink, mailbox, close_rx));
    let mut reader = tokio::spawn(read_duty(stream, Arc::clone(&state.store), subscriber));
    let mut teardown = Teardown::new(
        Arc::clone(&state.registry),
        subscriber,
        reader.abort_handle(),
        writer.abort_handle(),
    );

    let end = tokio::select! {
        exit = &mut reader => exit.map_or(SessionEnd::Failed, SessionEnd::Reader),
        exit = &mut writer => exit.map_or(SessionEnd::Failed, SessionEnd::Writer),
    };

    teardown.begin();
    match end {
        SessionEnd::Reader(_) => {
            // The writer may already be gone if the registry removal closed
            // its mailbox first; a failed send is fine.
            let _ = close_tx.send(());
            if tokio::time::timeout(CLOSE_GRACE, &mut writer).await.is_err() {
                debug!(%subscriber, "writer did not close in time, aborting");
            }
        }
        SessionEnd::Writer(_) | SessionEnd::Failed => {}
    }
    teardown.finish();

    debug!(%subscriber, ?end, "subscriber disconnected");
    end
}

/// Drain the mailbox into the sink until something stops the writer, then
/// close the sink.
async fn write_duty<W>(mut sink: W, mut mailbox: Mailbox, mut close: oneshot::Receiver<()>) -> WriterExit
where
    W: Sink<Message> + Unpin,
    W::Error: Display,
{
    let subscriber = mailbox.id();
    let exit = loop {
        tokio::select! {
            biased;
            _ = &mut close => break WriterExit::CloseRequested,
            next = mailbox.dequeue() => {
                let Some(text) = next else {
                    break if mailbox.is_overflowed() {
                        WriterExit::Overflowed
                    } else {
                        WriterExit::MailboxClosed
                    };
                };
                let frame = Message::Text(Utf8Bytes::from(text.to_string()));
                if let Err(e) = sink.send(frame).await {
                    debug!(%subscriber, error = %e, "send failed, peer gone");
                    return WriterExit::SendFailed;
                }
            }
        }
    };

    if exit == WriterExit::Overflowed {
        warn!(%subscriber, "closing connection of subscriber that fell behind");
    }
    if let Err(e) = sink.close().await {
        trace!(%subscriber, error = %e, "close failed");
    }
    exit
}

/// Apply inbound frames to the store until the peer goes away.
async fn read_duty<R, E>(mut stream: R, store: Arc<Store>, subscriber: SubscriberId) -> ReaderExit
where
    R: Stream<Item = Result<Message, E>> + Unpin,
    E: Display,
{
    while let Some(frame) = stream.next().await {
        match frame {
            Ok(Message::Text(text)) => apply_frame(&store, subscriber, text.as_str()),
            Ok(Message::Binary(bytes)) => match std::str::from_utf8(&bytes) {
                Ok(text) => apply_frame(&store, subscriber, text),
                Err(e) => {
                    let e = InboundError::from(e);
                    warn!(%subscriber, error = %e, "dropping inbound message");
                }
            },
            Ok(Message::Close(_)) => return ReaderExit::PeerClosed,
            // Pong replies are sent by the transport.
            Ok(Message::Ping(_) | Message::Pong(_)) => {}
            Err(e) => {
                debug!(%subscriber, error = %e, "receive failed");
                return ReaderExit::TransportError;
            }
        }
    }
    ReaderExit::PeerClosed
}

fn apply_frame(store: &Store, subscriber: SubscriberId, text: &str) {
    match apply_message(store, text) {
        Ok(report) => trace!(
            %subscriber,
            applied = report.applied.len(),
            skipped = report.skipped.len(),
            "inbound message applied"
        ),
        Err(e) => warn!(%subscriber, error = %e, "dropping inbound message"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn teardown_deregisters_once_and_stops_duties() {
        let registry = Arc::new(Registry::new());
        let mailbox = registry.subscribe();
        let id = mailbox.id();

        let reader = tokio::spawn(std::future::pending::<()>());
        let writer = tokio::spawn(std::future::pending::<()>());
        let mut teardown = Teardown::new(
            Arc::clone(&registry),
            id,
            reader.abort_handle(),
            writer.abort_handle(),
        );

        teardown.begin();
        assert_eq!(teardown.phase, SessionPhase::Closing);
        assert!(!registry.contains(id));

        teardown.finish();
        teardown.finish();
        assert_eq!(teardown.phase, SessionPhase::Closed);
        assert!(reader.await.is_err_and(|e| e.is_cancelled()));
        assert!(writer.await.is_err_and(|e| e.is_cancelled()));
    }

    #[tokio::test]
    async fn dropping_teardown_cleans_up() {
        let registry = Arc::new(Registry::new());
        let mailbox = registry.subscribe();
        let id = mailbox.id();
        let reader = tokio::spawn(std::future::pending::<()>());
        let writer = tokio::spawn(std::future::pending::<()>());

        drop(Teardown::new(
            Arc::clone(&registry),
            id,
            reader.abort_handle(),
            writer.abort_handle(),
        ));

        assert!(registry.is_empty());
        assert!(reader.await.is_err_and(|e| e.is_cancelled()));
        assert!(writer.await.is_err_and(|e| e.is_cancelled()));
    }
}
