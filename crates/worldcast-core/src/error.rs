//! Error types for store listeners, subscriber mailboxes, and inbound
//! subscriber messages.
//!
//! None of these errors ever propagate into a store mutation: listener
//! failures are logged by the [`Store`](crate::Store), enqueue failures
//! are handled by the [`Registry`](crate::Registry), and inbound errors
//! are logged by the connection session that received the message.

/// A change listener failed while handling a notification.
#[derive(Debug, thiserror::Error)]
pub enum ListenerError {
    /// The change could not be serialized into a wire message.
    #[error("failed to serialize change: {source}")]
    Serialization {
        /// The underlying JSON error.
        #[from]
        source: serde_json::Error,
    },

    /// The listener rejected the change for another reason.
    #[error("listener failed: {0}")]
    Other(String),
}

/// A message could not be placed in a subscriber's mailbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum EnqueueError {
    /// The mailbox's receiving half has been dropped (connection gone).
    #[error("mailbox closed")]
    Closed,

    /// The mailbox already holds its configured maximum of pending messages.
    #[error("mailbox overflowed its limit of {limit} pending messages")]
    Overflowed {
        /// The configured per-subscriber limit.
        limit: usize,
    },
}

/// A message pushed in by a subscriber could not be applied.
#[derive(Debug, thiserror::Error)]
pub enum InboundError {
    /// The frame was not valid JSON.
    #[error("malformed message: {source}")]
    Malformed {
        /// The underlying JSON error.
        #[from]
        source: serde_json::Error,
    },

    /// The frame was JSON but its top level was not an object.
    #[error("expected a JSON object of entity updates, got {found}")]
    NotAnObject {
        /// The JSON type that was found instead.
        found: &'static str,
    },

    /// A binary frame did not hold UTF-8 text.
    #[error("binary frame is not valid UTF-8: {source}")]
    NotUtf8 {
        /// The underlying decoding error.
        #[from]
        source: std::str::Utf8Error,
    },
}
