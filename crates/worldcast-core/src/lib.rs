//! Shared world state and subscriber fan-out for Worldcast.
//!
//! This crate holds everything that does not speak HTTP: the entity
//! store, the per-connection subscriber mailboxes, the registry of live
//! subscribers, and the broadcaster that bridges one to the other.
//!
//! # Modules
//!
//! - [`types`] -- Entity identifiers, attribute maps, and the change event
//!   wire shape.
//! - [`store`] -- The in-memory [`Store`] with synchronous change listeners.
//! - [`subscriber`] -- One connection's outbound [`Mailbox`] and the
//!   [`Subscriber`] handle used to fill it.
//! - [`registry`] -- The set of live subscribers and registry-wide broadcast.
//! - [`broadcaster`] -- The store listener that turns changes into pushes.
//! - [`inbound`] -- Applying a subscriber's pushed message to the store.
//! - [`config`] -- Typed YAML configuration with environment overrides.
//! - [`error`] -- Error types shared across the crate.
//!
//! # Data flow
//!
//! ```text
//! Store::set / update ──► listeners ──► Broadcaster ──► Registry::broadcast
//!                                                        │
//!                                         Subscriber::enqueue (per client)
//!                                                        │
//!                                              Mailbox::dequeue ──► socket
//! ```

pub mod broadcaster;
pub mod config;
pub mod error;
pub mod inbound;
pub mod registry;
pub mod store;
pub mod subscriber;
pub mod types;

// Re-export primary types at crate root.
pub use broadcaster::{BROADCASTER_LISTENER, Broadcaster};
pub use config::{
    ConfigError, LoadedConfig, LoggingConfig, RejectedOverride, ServerSettings, SubscriberSettings,
    WorldcastConfig,
};
pub use error::{EnqueueError, InboundError, ListenerError};
pub use inbound::{InboundReport, apply_message};
pub use registry::Registry;
pub use store::Store;
pub use subscriber::{Mailbox, Subscriber, SubscriberId, WireMessage};
pub use types::{Attributes, ChangeEvent, EntityId, World, world_message};
