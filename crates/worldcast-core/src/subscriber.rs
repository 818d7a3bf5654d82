//! Per-connection outbound mailboxes.
//!
//! A subscriber is split in two halves by [`Subscriber::new`]:
//!
//! - [`Subscriber`] -- the sending half, held by the
//!   [`Registry`](crate::Registry) while the connection is registered.
//!   [`enqueue`](Subscriber::enqueue) never blocks.
//! - [`Mailbox`] -- the receiving half, owned by the connection's writer
//!   duty. [`dequeue`](Mailbox::dequeue) suspends until a message arrives,
//!   and returns `None` once the subscriber has been dropped from the
//!   registry or has overflowed its limit.
//!
//! Mailboxes are unbounded by default. With a limit configured, an
//! enqueue that would exceed it marks the subscriber as overflowed; the
//! registry then drops it and its connection is torn down.

use std::fmt;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use tokio::sync::mpsc;

use crate::error::EnqueueError;

/// A serialized outbound message, shared between all mailboxes it is
/// fanned out to.
pub type WireMessage = Arc<str>;

/// Identity of one subscriber within its registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriberId(u64);

impl SubscriberId {
    /// Wrap a raw identifier.
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw identifier.
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Counters shared by both halves.
#[derive(Debug, Default)]
struct Shared {
    pending: AtomicUsize,
    overflowed: AtomicBool,
}

/// Sending half of a subscriber.
#[derive(Debug, Clone)]
pub struct Subscriber {
    id: SubscriberId,
    tx: mpsc::UnboundedSender<WireMessage>,
    shared: Arc<Shared>,
    limit: Option<NonZeroUsize>,
}

impl Subscriber {
    /// Create a subscriber and its mailbox.
    ///
    /// `limit` bounds the number of pending messages; `None` is unbounded.
    pub fn new(id: SubscriberId, limit: Option<NonZeroUsize>) -> (Self, Mailbox) {
        let (tx, rx) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared::default());
        let subscriber = Self {
            id,
            tx,
            shared: Arc::clone(&shared),
            limit,
        };
        let mailbox = Mailbox { id, rx, shared };
        (subscriber, mailbox)
    }

    /// This subscriber's identity.
    pub const fn id(&self) -> SubscriberId {
        self.id
    }

    /// Append `message` to the mailbox without blocking.
    ///
    /// Fails if the mailbox has been dropped or if a configured limit
    /// would be exceeded. After an overflow every further enqueue fails
    /// and the mailbox reports itself closed.
    pub fn enqueue(&self, message: WireMessage) -> Result<(), EnqueueError> {
        if let Some(limit) = self.limit {
            if self.shared.overflowed.load(Ordering::Acquire) {
                return Err(EnqueueError::Overflowed { limit: limit.get() });
            }
            let before = self.shared.pending.fetch_add(1, Ordering::AcqRel);
            if before >= limit.get() {
                self.shared.pending.fetch_sub(1, Ordering::AcqRel);
                self.shared.overflowed.store(true, Ordering::Release);
                return Err(EnqueueError::Overflowed { limit: limit.get() });
            }
        } else {
            self.shared.pending.fetch_add(1, Ordering::AcqRel);
        }

        self.tx.send(message).map_err(|_closed| {
            self.shared.pending.fetch_sub(1, Ordering::AcqRel);
            EnqueueError::Closed
        })
    }

    /// Number of messages enqueued but not yet dequeued.
    pub fn pending(&self) -> usize {
        self.shared.pending.load(Ordering::Acquire)
    }

    /// Whether the receiving half has been dropped.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Receiving half of a subscriber, drained by the connection writer.
#[derive(Debug)]
pub struct Mailbox {
    id: SubscriberId,
    rx: mpsc::UnboundedReceiver<WireMessage>,
    shared: Arc<Shared>,
}

impl Mailbox {
    /// The identity of the subscriber this mailbox belongs to.
    pub const fn id(&self) -> SubscriberId {
        self.id
    }

    /// Wait for the next message in FIFO order.
    ///
    /// Returns `None` once the sending half is gone and the queue is
    /// drained, or immediately after an overflow.
    pub async fn dequeue(&mut self) -> Option<WireMessage> {
        if self.is_overflowed() {
            return None;
        }
        let message = self.rx.recv().await?;
        self.shared.pending.fetch_sub(1, Ordering::AcqRel);
        Some(message)
    }

    /// Take the next message if one is already queued.
    pub fn try_dequeue(&mut self) -> Option<WireMessage> {
        if self.is_overflowed() {
            return None;
        }
        let message = self.rx.try_recv().ok()?;
        self.shared.pending.fetch_sub(1, Ordering::AcqRel);
        Some(message)
    }

    /// Whether this mailbox was cut off for exceeding its limit.
    pub fn is_overflowed(&self) -> bool {
        self.shared.overflowed.load(Ordering::Acquire)
    }

    /// Number of messages waiting.
    pub fn pending(&self) -> usize {
        self.shared.pending.load(Ordering::Acquire)
    }
}
