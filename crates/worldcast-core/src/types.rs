//! Entity and attribute types shared by the store, the broadcaster, and
//! the HTTP layer.
//!
//! Entities carry no schema: an [`Attributes`] map holds arbitrary JSON
//! values keyed by attribute name, and the [`World`] maps each
//! [`EntityId`] to its attributes.

use std::borrow::Borrow;
use std::collections::BTreeMap;
use std::fmt;

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};

/// Open attribute mapping of one entity (attribute name to JSON value).
pub type Attributes = Map<String, Value>;

/// The full store contents: every entity and its attributes.
pub type World = BTreeMap<EntityId, Attributes>;

/// Identifier of an entity, unique within a [`Store`](crate::Store).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    /// Create an identifier from any string-like value.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for EntityId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for EntityId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

impl Borrow<str> for EntityId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for EntityId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A single entity change as pushed to subscribers.
///
/// Serializes to a one-key object `{ id: attributes }`, which is the
/// outbound wire shape of every change notification.
#[derive(Debug, Clone, Copy)]
pub struct ChangeEvent<'a> {
    /// The entity that changed.
    pub id: &'a EntityId,
    /// The entity's full attribute mapping after the change.
    pub attributes: &'a Attributes,
}

impl<'a> ChangeEvent<'a> {
    /// Build a change event borrowing the entity's id and attributes.
    pub const fn new(id: &'a EntityId, attributes: &'a Attributes) -> Self {
        Self { id, attributes }
    }

    /// Serialize the event into its JSON text frame.
    pub fn to_message(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

impl Serialize for ChangeEvent<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(self.id, self.attributes)?;
        map.end()
    }
}

/// Serialize a full world into one `{ id: attributes, ... }` text frame.
///
/// Used for the optional snapshot a subscriber receives on connect; it has
/// the same shape as a batch of change events.
pub fn world_message(world: &World) -> Result<String, serde_json::Error> {
    serde_json::to_string(world)
}
