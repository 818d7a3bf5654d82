//! Shared application state for the Worldcast server.
//!
//! [`AppState`] owns the entity [`Store`] and the subscriber [`Registry`]
//! and wires the [`Broadcaster`] between them at construction. Each test
//! can build its own isolated instance; nothing is global.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::warn;
use worldcast_core::{
    Broadcaster, Mailbox, Registry, Store, SubscriberSettings, WorldcastConfig, world_message,
};

/// Shared state for the Axum application.
///
/// Wrapped in [`Arc`] and injected via Axum's `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// The shared entity store.
    pub store: Arc<Store>,
    /// Currently connected subscribers.
    pub registry: Arc<Registry>,
    /// Whether new subscribers receive the whole world first.
    pub send_snapshot_on_connect: bool,
    /// Directory served under `/static`.
    pub static_dir: PathBuf,
}

impl AppState {
    /// Create state with an empty store, unbounded mailboxes, and no
    /// connect snapshot.
    pub fn new() -> Self {
        Self::with_subscribers(&SubscriberSettings::default())
    }

    /// Create state with the given subscriber behaviour.
    pub fn with_subscribers(settings: &SubscriberSettings) -> Self {
        let store = Arc::new(Store::new());
        let registry = Arc::new(Registry::with_mailbox_limit(settings.mailbox_limit));
        Broadcaster::new(Arc::clone(&registry)).install(&store);
        Self {
            store,
            registry,
            send_snapshot_on_connect: settings.send_snapshot_on_connect,
            static_dir: PathBuf::from("static"),
        }
    }

    /// Create state from a loaded configuration.
    pub fn from_config(config: &WorldcastConfig) -> Self {
        let mut state = Self::with_subscribers(&config.subscribers);
        state.static_dir.clone_from(&config.server.static_dir);
        state
    }

    /// Register a new subscriber and return its mailbox.
    ///
    /// When connect snapshots are enabled, registration and the snapshot
    /// happen under the store lock: the snapshot is the first message in
    /// the mailbox and every later change event describes a newer state.
    pub fn open_mailbox(&self) -> Mailbox {
        if !self.send_snapshot_on_connect {
            return self.registry.subscribe();
        }
        self.store.with_world(|world| {
            let mailbox = self.registry.subscribe();
            match world_message(world) {
                Ok(text) => {
                    self.registry.send_to(mailbox.id(), Arc::from(text));
                }
                Err(e) => warn!(subscriber = %mailbox.id(), error = %e, "failed to serialize snapshot"),
            }
            mailbox
        })
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    use serde_json::{Value, json};
    use worldcast_core::Attributes;

    use super::*;

    fn attrs(value: Value) -> Attributes {
        match value {
            Value::Object(map) => map,
            _ => Attributes::new(),
        }
    }

    #[test]
    fn store_mutations_reach_open_mailboxes() {
        let state = AppState::new();
        let mut mailbox = state.open_mailbox();
        state.store.set("a", attrs(json!({"x": 1})));

        let got = mailbox.try_dequeue();
        assert_eq!(got.as_deref(), Some(r#"{"a":{"x":1}}"#));
    }

    #[test]
    fn snapshot_is_queued_first_when_enabled() {
        let state = AppState::with_subscribers(&SubscriberSettings {
            mailbox_limit: 0,
            send_snapshot_on_connect: true,
        });
        state.store.set("p", attrs(json!({"z": 1})));

        let mut mailbox = state.open_mailbox();
        assert_eq!(mailbox.try_dequeue().as_deref(), Some(r#"{"p":{"z":1}}"#));
        assert!(mailbox.try_dequeue().is_none());
    }

    #[test]
    fn snapshot_is_never_older_than_changes_queued_after_it() {
        let state = Arc::new(AppState::with_subscribers(&SubscriberSettings {
            mailbox_limit: 0,
            send_snapshot_on_connect: true,
        }));
        // A large world keeps the snapshot busy long enough to overlap
        // with concurrent updates.
        for i in 0..3000 {
            state.store.set(format!("pad-{i}"), attrs(json!({"i": i})));
        }

        let stop = Arc::new(AtomicBool::new(false));
        let writer = {
            let state = Arc::clone(&state);
            let stop = Arc::clone(&stop);
            std::thread::spawn(move || {
                let mut n: u64 = 0;
                while !stop.load(Ordering::Relaxed) {
                    n = n.saturating_add(1);
                    state.store.update("e", "n", json!(n));
                }
            })
        };

        for _ in 0..20 {
            let mut mailbox = state.open_mailbox();
            std::thread::sleep(Duration::from_millis(2));

            let snapshot: Value = mailbox
                .try_dequeue()
                .and_then(|text| serde_json::from_str(&text).ok())
                .unwrap_or_default();
            assert!(snapshot.get("pad-0").is_some(), "first message must be the snapshot");

            let mut last = snapshot.pointer("/e/n").and_then(Value::as_u64).unwrap_or(0);
            for _ in 0..10_000 {
                let Some(text) = mailbox.try_dequeue() else {
                    break;
                };
                let change: Value = serde_json::from_str(&text).unwrap_or_default();
                let n = change.pointer("/e/n").and_then(Value::as_u64);
                assert!(n.is_some_and(|n| n > last), "change {n:?} not newer than {last}");
                last = n.unwrap_or(last);
            }
            state.registry.remove(mailbox.id());
        }

        stop.store(true, Ordering::Relaxed);
        assert!(writer.join().is_ok());
    }

    #[test]
    fn no_snapshot_by_default() {
        let state = AppState::new();
        state.store.set("p", attrs(json!({"z": 1})));
        let mut mailbox = state.open_mailbox();
        assert!(mailbox.try_dequeue().is_none());
    }

    #[test]
    fn from_config_applies_limit_and_static_dir() {
        let mut config = WorldcastConfig::default();
        config.subscribers.mailbox_limit = 3;
        config.server.static_dir = PathBuf::from("public");

        let state = AppState::from_config(&config);
        assert_eq!(state.registry.mailbox_limit().map(std::num::NonZeroUsize::get), Some(3));
        assert_eq!(state.static_dir, PathBuf::from("public"));
    }
}
