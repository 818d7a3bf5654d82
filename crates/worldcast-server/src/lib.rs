//! HTTP and `WebSocket` front end for Worldcast.
//!
//! This crate provides an Axum server that exposes:
//!
//! - **Mutation endpoints** (`/entity/{id}`, `/world`, `/clear`) that read
//!   and change the shared [`Store`](worldcast_core::Store). Every
//!   mutation is pushed to subscribers by the store's broadcaster.
//! - **`WebSocket` endpoint** (`/subscribe`) where each connection receives
//!   every change as `{ id: attributes }` and may push its own
//!   `{ id: attributes, ... }` updates, which are applied and echoed to
//!   all subscribers, itself included.
//! - **Static assets** under `/static`, with `GET /` redirecting to the
//!   index page.
//!
//! # Architecture
//!
//! [`AppState`] owns one store and one subscriber registry, wired
//! together at construction. Each `WebSocket` connection runs a
//! [`session`] with two duties: a reader applying inbound messages and a
//! writer draining the connection's mailbox. Either duty ending tears the
//! session down exactly once.

pub mod body;
pub mod error;
pub mod handlers;
pub mod router;
pub mod server;
pub mod session;
pub mod startup;
pub mod state;
pub mod ws;

// Re-export primary types for convenience.
pub use error::ApiError;
pub use router::build_router;
pub use server::{ServerError, serve, shutdown_signal, start_server};
pub use startup::{RunningServer, StartupError, spawn_server};
pub use state::AppState;
