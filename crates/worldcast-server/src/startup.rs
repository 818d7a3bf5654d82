//! Background server startup.
//!
//! Provides [`spawn_server`], which binds eagerly (so a bad address is
//! reported to the caller rather than logged from a task) and then runs
//! the server on a background Tokio task until told to stop.
//!
//! # Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use worldcast_core::ServerSettings;
//! use worldcast_server::{AppState, spawn_server};
//!
//! let settings = ServerSettings { port: 0, ..ServerSettings::default() };
//! let mut server = spawn_server(&settings, Arc::new(AppState::new())).await?;
//! println!("listening on {}", server.addr());
//! server.shutdown();
//! server.join().await?;
//! ```

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::oneshot;
use tokio::task::{JoinError, JoinHandle};
use tracing::{error, info};
use worldcast_core::ServerSettings;

use crate::server::{ServerError, bind, serve};
use crate::state::AppState;

/// Errors that can occur when spawning the server.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    /// The server failed to bind or start.
    #[error("server start error: {0}")]
    Server(#[from] ServerError),
}

/// Handle to a server running on a background task.
#[derive(Debug)]
pub struct RunningServer {
    addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    handle: JoinHandle<()>,
}

impl RunningServer {
    /// The address the server is listening on.
    pub const fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Ask the server to stop accepting connections. Idempotent.
    pub fn shutdown(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            // The server task may already have exited.
            let _ = tx.send(());
        }
    }

    /// Wait for the server task to finish.
    ///
    /// # Errors
    ///
    /// Returns the task's [`JoinError`] if it panicked or was aborted.
    pub async fn join(self) -> Result<(), JoinError> {
        self.handle.await
    }

    /// Stop the server task immediately without a graceful drain.
    pub fn abort(&self) {
        self.handle.abort();
    }
}

/// Bind and spawn the server on a background Tokio task.
///
/// # Errors
///
/// Returns [`StartupError::Server`] if the listener cannot be bound.
pub async fn spawn_server(
    settings: &ServerSettings,
    state: Arc<AppState>,
) -> Result<RunningServer, StartupError> {
    let listener = bind(settings).await?;
    let addr = listener
        .local_addr()
        .map_err(|e| ServerError::Bind(format!("no local address: {e}")))?;

    let (tx, rx) = oneshot::channel::<()>();
    let shutdown = async move {
        // A dropped handle counts as a shutdown request.
        let _ = rx.await;
    };

    let handle = tokio::spawn(async move {
        if let Err(e) = serve(listener, state, shutdown).await {
            error!(error = %e, "Worldcast server exited with error");
        }
    });

    info!(%addr, "Worldcast server spawned on background task");

    Ok(RunningServer {
        addr,
        shutdown: Some(tx),
        handle,
    })
}
