//! The shared in-memory entity store.
//!
//! [`Store`] maps each [`EntityId`] to its [`Attributes`] and fires every
//! registered change listener synchronously, inside the mutating call,
//! after the mutation has been committed. A single [`Mutex`] guards the
//! entities and the listener list together, so a mutation and its
//! notifications form one critical section: no other mutation can
//! interleave between a write and the broadcast that announces it.
//!
//! Listeners run while that lock is held and must never call back into
//! the store.

use parking_lot::Mutex;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::ListenerError;
use crate::types::{Attributes, EntityId, World};

/// Boxed change-notification callback.
///
/// Invoked as `listener(id, attributes)` with the entity's full attribute
/// mapping after every `set` or `update`.
pub type Listener = Box<dyn Fn(&EntityId, &Attributes) -> Result<(), ListenerError> + Send + Sync>;

struct NamedListener {
    name: String,
    callback: Listener,
}

#[derive(Default)]
struct StoreInner {
    entities: World,
    listeners: Vec<NamedListener>,
}

impl StoreInner {
    /// Replace an entity wholesale and notify listeners.
    fn set(&mut self, id: EntityId, attributes: Attributes) {
        self.entities.insert(id.clone(), attributes);
        self.notify(&id);
    }

    /// Merge one attribute into an entity and notify listeners once.
    fn update(&mut self, id: EntityId, key: String, value: Value) {
        let mut attributes = self.entities.get(&id).cloned().unwrap_or_default();
        attributes.insert(key, value);
        self.set(id, attributes);
    }

    /// Fire every listener, in registration order, for `id`'s current state.
    ///
    /// A failing listener is logged and skipped; the mutation that
    /// triggered the notification has already been committed.
    fn notify(&self, id: &EntityId) {
        let empty = Attributes::new();
        let attributes = self.entities.get(id).unwrap_or(&empty);
        for listener in &self.listeners {
            if let Err(e) = (listener.callback)(id, attributes) {
                warn!(
                    listener = listener.name,
                    entity = %id,
                    error = %e,
                    "change listener failed"
                );
            }
        }
    }
}

/// In-memory entity store with synchronous change notification.
///
/// Construct one per process (or one per test) and share it behind an
/// [`Arc`](std::sync::Arc). Reads never fail: an unknown entity reads as an
/// empty attribute mapping.
#[derive(Default)]
pub struct Store {
    inner: Mutex<StoreInner>,
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("Store")
            .field("entities", &inner.entities.len())
            .field("listeners", &inner.listeners.len())
            .finish()
    }
}

impl Store {
    /// Create an empty store with no listeners.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a change listener under `name`.
    ///
    /// Listeners fire in registration order after every `set` and
    /// `update`. Registering a second listener under a name that is
    /// already taken is a no-op; returns whether the listener was added.
    pub fn register_listener<F>(&self, name: impl Into<String>, listener: F) -> bool
    where
        F: Fn(&EntityId, &Attributes) -> Result<(), ListenerError> + Send + Sync + 'static,
    {
        let name = name.into();
        let mut inner = self.inner.lock();
        if inner.listeners.iter().any(|l| l.name == name) {
            debug!(listener = name, "listener already registered, ignoring");
            return false;
        }
        inner.listeners.push(NamedListener {
            name,
            callback: Box::new(listener),
        });
        true
    }

    /// Number of registered listeners.
    pub fn listener_count(&self) -> usize {
        self.inner.lock().listeners.len()
    }

    /// Return the attributes of `id`, or an empty mapping if it is unknown.
    pub fn get(&self, id: &str) -> Attributes {
        self.inner.lock().entities.get(id).cloned().unwrap_or_default()
    }

    /// Replace the whole attribute mapping of `id` and notify listeners.
    pub fn set(&self, id: impl Into<EntityId>, attributes: Attributes) {
        self.inner.lock().set(id.into(), attributes);
    }

    /// Set a single attribute of `id`, keeping its other attributes.
    ///
    /// An unknown entity starts from an empty mapping. Fires exactly one
    /// notification.
    pub fn update(&self, id: impl Into<EntityId>, key: impl Into<String>, value: Value) {
        self.inner.lock().update(id.into(), key.into(), value);
    }

    /// Apply an entity update the way the HTTP endpoint does.
    ///
    /// If `id` currently has no attributes it is replaced wholesale with a
    /// single notification; otherwise each field is merged with
    /// [`update`](Self::update) semantics, one notification per field.
    /// Runs as one critical section and returns the resulting attributes.
    pub fn merge(&self, id: impl Into<EntityId>, attributes: Attributes) -> Attributes {
        let id = id.into();
        let mut inner = self.inner.lock();
        let is_empty = inner.entities.get(&id).is_none_or(Attributes::is_empty);
        if is_empty {
            inner.set(id.clone(), attributes);
        } else {
            for (key, value) in attributes {
                inner.update(id.clone(), key, value);
            }
        }
        inner.entities.get(&id).cloned().unwrap_or_default()
    }

    /// Discard every entity.
    ///
    /// Fires no notification: subscribers are not told about a reset.
    pub fn clear(&self) {
        self.inner.lock().entities.clear();
    }

    /// Replace the whole world: clear, then `set` each incoming entity.
    ///
    /// Runs as one critical section, firing one notification per incoming
    /// entity, and returns the resulting contents.
    pub fn replace(&self, world: World) -> World {
        let mut inner = self.inner.lock();
        inner.entities.clear();
        for (id, attributes) in world {
            inner.set(id, attributes);
        }
        inner.entities.clone()
    }

    /// Return a copy of the full store contents.
    pub fn world(&self) -> World {
        self.inner.lock().entities.clone()
    }

    /// Run `f` against the current contents while holding the store lock.
    ///
    /// No mutation, and so no change notification, can happen while `f`
    /// runs. `f` must not call back into the store.
    pub fn with_world<R>(&self, f: impl FnOnce(&World) -> R) -> R {
        f(&self.inner.lock().entities)
    }

    /// Number of entities currently held.
    pub fn len(&self) -> usize {
        self.inner.lock().entities.len()
    }

    /// Whether the store holds no entities.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().entities.is_empty()
    }
}
