//! Bridge from store changes to registry-wide pushes.
//!
//! The [`Broadcaster`] is installed as a store listener under the fixed
//! name [`BROADCASTER_LISTENER`]. On every change it serializes
//! `{ id: attributes }` and hands the text to [`Registry::broadcast`].
//! Serialization failures are returned to the store, which logs them;
//! they never reach the caller that mutated the store.

use std::sync::Arc;

use tracing::trace;

use crate::error::ListenerError;
use crate::registry::Registry;
use crate::store::Store;
use crate::subscriber::WireMessage;
use crate::types::{Attributes, ChangeEvent, EntityId};

/// Listener name the broadcaster registers under.
pub const BROADCASTER_LISTENER: &str = "broadcaster";

/// Store listener that fans every change out to all subscribers.
#[derive(Debug, Clone)]
pub struct Broadcaster {
    registry: Arc<Registry>,
}

impl Broadcaster {
    /// Create a broadcaster publishing into `registry`.
    pub const fn new(registry: Arc<Registry>) -> Self {
        Self { registry }
    }

    /// Serialize one change and enqueue it on every subscriber.
    ///
    /// Returns the number of subscribers the change was delivered to.
    pub fn publish(&self, id: &EntityId, attributes: &Attributes) -> Result<usize, ListenerError> {
        let text = ChangeEvent::new(id, attributes).to_message()?;
        let message: WireMessage = Arc::from(text);
        let delivered = self.registry.broadcast(&message);
        trace!(entity = %id, delivered, "change broadcast");
        Ok(delivered)
    }

    /// Register this broadcaster on `store`.
    ///
    /// Safe to call more than once: only the first installation on a given
    /// store takes effect. Returns whether this call installed it.
    pub fn install(self, store: &Store) -> bool {
        store.register_listener(BROADCASTER_LISTENER, move |id, attributes| {
            self.publish(id, attributes).map(|_delivered| ())
        })
    }
}
