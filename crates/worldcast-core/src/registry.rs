//! The set of live subscribers.
//!
//! [`Registry`] holds the sending half of every registered
//! [`Subscriber`]. Membership is guarded by its own lock, separate from
//! the store's, so connections can come and go while a broadcast is in
//! flight. A subscriber removed concurrently with a broadcast may or may
//! not receive it.
//!
//! Subscribers are iterated in registration order. A subscriber whose
//! mailbox is closed or overflowed is dropped from the registry during
//! the broadcast that discovers it, which in turn ends its mailbox.

use std::collections::BTreeMap;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::error::EnqueueError;
use crate::subscriber::{Mailbox, Subscriber, SubscriberId, WireMessage};

/// Registry of active subscribers with registry-wide broadcast.
#[derive(Debug, Default)]
pub struct Registry {
    subscribers: Mutex<BTreeMap<SubscriberId, Subscriber>>,
    next_id: AtomicU64,
    mailbox_limit: Option<NonZeroUsize>,
}

impl Registry {
    /// Create a registry whose subscribers have unbounded mailboxes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry whose subscribers hold at most `limit` pending
    /// messages. A limit of `0` means unbounded.
    pub fn with_mailbox_limit(limit: usize) -> Self {
        Self {
            mailbox_limit: NonZeroUsize::new(limit),
            ..Self::default()
        }
    }

    /// The per-subscriber pending message limit, if any.
    pub const fn mailbox_limit(&self) -> Option<NonZeroUsize> {
        self.mailbox_limit
    }

    /// Allocate a fresh subscriber and mailbox without registering it.
    pub fn new_subscriber(&self) -> (Subscriber, Mailbox) {
        let id = SubscriberId::new(self.next_id.fetch_add(1, Ordering::Relaxed));
        Subscriber::new(id, self.mailbox_limit)
    }

    /// Allocate a subscriber, register it, and return its mailbox.
    pub fn subscribe(&self) -> Mailbox {
        let (subscriber, mailbox) = self.new_subscriber();
        self.add(subscriber);
        mailbox
    }

    /// Register `subscriber`. Returns `false` if it was already present.
    pub fn add(&self, subscriber: Subscriber) -> bool {
        let id = subscriber.id();
        let mut subscribers = self.subscribers.lock();
        if subscribers.contains_key(&id) {
            return false;
        }
        subscribers.insert(id, subscriber);
        debug!(subscriber = %id, total = subscribers.len(), "subscriber registered");
        true
    }

    /// Deregister a subscriber. Returns `false` if it was not present.
    ///
    /// Dropping the registry's handle closes the subscriber's mailbox once
    /// its queued messages are drained.
    pub fn remove(&self, id: SubscriberId) -> bool {
        let mut subscribers = self.subscribers.lock();
        let removed = subscribers.remove(&id).is_some();
        if removed {
            debug!(subscriber = %id, total = subscribers.len(), "subscriber removed");
        }
        removed
    }

    /// Whether `id` is currently registered.
    pub fn contains(&self, id: SubscriberId) -> bool {
        self.subscribers.lock().contains_key(&id)
    }

    /// Number of registered subscribers.
    pub fn len(&self) -> usize {
        self.subscribers.lock().len()
    }

    /// Whether no subscribers are registered.
    pub fn is_empty(&self) -> bool {
        self.subscribers.lock().is_empty()
    }

    /// Enqueue `message` on every registered subscriber.
    ///
    /// Never blocks. Returns the number of subscribers the message was
    /// delivered to. Subscribers whose mailbox is closed or overflowed are
    /// removed.
    pub fn broadcast(&self, message: &WireMessage) -> usize {
        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|id, subscriber| match subscriber.enqueue(WireMessage::clone(message)) {
            Ok(()) => true,
            Err(EnqueueError::Closed) => {
                debug!(subscriber = %id, "dropping subscriber with closed mailbox");
                false
            }
            Err(e @ EnqueueError::Overflowed { .. }) => {
                warn!(subscriber = %id, error = %e, "disconnecting slow subscriber");
                false
            }
        });
        subscribers.len()
    }

    /// Enqueue `message` on one subscriber only.
    ///
    /// Returns `false` if the subscriber is unknown or could not accept the
    /// message (in which case it is removed, as in [`broadcast`](Self::broadcast)).
    pub fn send_to(&self, id: SubscriberId, message: WireMessage) -> bool {
        let mut subscribers = self.subscribers.lock();
        let Some(subscriber) = subscribers.get(&id) else {
            return false;
        };
        match subscriber.enqueue(message) {
            Ok(()) => true,
            Err(e) => {
                debug!(subscriber = %id, error = %e, "direct send failed, removing subscriber");
                subscribers.remove(&id);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    fn msg(text: &str) -> WireMessage {
        Arc::from(text)
    }

    #[test]
    fn broadcast_reaches_every_registered_subscriber() {
        let registry = Registry::new();
        let mut first = registry.subscribe();
        let mut second = registry.subscribe();

        assert_eq!(registry.broadcast(&msg("hello")), 2);
        assert_eq!(first.try_dequeue().as_deref(), Some("hello"));
        assert_eq!(second.try_dequeue().as_deref(), Some("hello"));
    }

    #[test]
    fn late_subscriber_misses_earlier_broadcast() {
        let registry = Registry::new();
        let mut early = registry.subscribe();
        registry.broadcast(&msg("first"));
        let mut late = registry.subscribe();
        registry.broadcast(&msg("second"));

        assert_eq!(early.try_dequeue().as_deref(), Some("first"));
        assert_eq!(early.try_dequeue().as_deref(), Some("second"));
        assert_eq!(late.try_dequeue().as_deref(), Some("second"));
        assert!(late.try_dequeue().is_none());
    }

    #[test]
    fn removed_subscriber_misses_later_broadcast() {
        let registry = Registry::new();
        let mut gone = registry.subscribe();
        let mut stays = registry.subscribe();

        assert!(registry.remove(gone.id()));
        assert!(!registry.remove(gone.id()));
        assert_eq!(registry.broadcast(&msg("after")), 1);

        assert!(gone.try_dequeue().is_none());
        assert_eq!(stays.try_dequeue().as_deref(), Some("after"));
    }

    #[test]
    fn subscriber_is_registered_at_most_once() {
        let registry = Registry::new();
        let (subscriber, _mailbox) = registry.new_subscriber();
        assert!(registry.add(subscriber.clone()));
        assert!(!registry.add(subscriber));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn closed_mailbox_is_pruned_on_broadcast() {
        let registry = Registry::new();
        let dropped = registry.subscribe();
        let id = dropped.id();
        drop(dropped);
        let _kept = registry.subscribe();

        assert_eq!(registry.broadcast(&msg("x")), 1);
        assert!(!registry.contains(id));
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn overflowing_subscriber_is_disconnected_alone() {
        let registry = Registry::with_mailbox_limit(1);
        let mut slow = registry.subscribe();
        let mut fast = registry.subscribe();

        assert_eq!(registry.broadcast(&msg("one")), 2);
        assert_eq!(fast.try_dequeue().as_deref(), Some("one"));
        assert_eq!(registry.broadcast(&msg("two")), 1);

        assert!(!registry.contains(slow.id()));
        assert!(registry.contains(fast.id()));
        assert!(slow.dequeue().await.is_none());
        assert_eq!(fast.try_dequeue().as_deref(), Some("two"));
    }

    #[test]
    fn send_to_targets_one_subscriber() {
        let registry = Registry::new();
        let mut target = registry.subscribe();
        let mut other = registry.subscribe();

        assert!(registry.send_to(target.id(), msg("just you")));
        assert!(!registry.send_to(SubscriberId::new(999), msg("nobody")));
        assert_eq!(target.try_dequeue().as_deref(), Some("just you"));
        assert!(other.try_dequeue().is_none());
    }

    #[test]
    fn ids_are_unique_and_increasing() {
        let registry = Registry::new();
        let a = registry.subscribe();
        let b = registry.subscribe();
        assert!(a.id() < b.id());
    }
}
