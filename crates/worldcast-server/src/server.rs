//! Worldcast HTTP server lifecycle management.
//!
//! Provides [`start_server`], which binds to the configured address and
//! serves until `Ctrl-C`, and the lower-level [`bind`] and [`serve`] used
//! by tests and by [`spawn_server`](crate::spawn_server).

use std::future::Future;
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::{error, info};
use worldcast_core::ServerSettings;

use crate::router::build_router;
use crate::state::AppState;

/// Bind a TCP listener for `settings`.
///
/// The host may be a name or an address; port `0` picks a free port.
///
/// # Errors
///
/// Returns [`ServerError::Bind`] if the address cannot be resolved or bound.
pub async fn bind(settings: &ServerSettings) -> Result<TcpListener, ServerError> {
    TcpListener::bind((settings.host.as_str(), settings.port))
        .await
        .map_err(|e| {
            ServerError::Bind(format!(
                "bind failed on {}:{}: {e}",
                settings.host, settings.port
            ))
        })
}

/// Start the Worldcast HTTP server.
///
/// Binds to the configured address, builds the router, and serves
/// requests until `Ctrl-C`. Returns `Ok(())` on clean shutdown.
///
/// # Errors
///
/// Returns an error if the TCP listener cannot bind or the server
/// encounters a fatal I/O error.
pub async fn start_server(settings: &ServerSettings, state: Arc<AppState>) -> Result<(), ServerError> {
    let listener = bind(settings).await?;
    let addr = listener
        .local_addr()
        .map_err(|e| ServerError::Bind(format!("no local address: {e}")))?;

    info!(%addr, static_dir = %state.static_dir.display(), "Worldcast server listening");

    serve(listener, state, shutdown_signal()).await?;

    info!("Worldcast server stopped");
    Ok(())
}

/// Serve the router on an already-bound listener until `shutdown`
/// resolves.
///
/// In-flight requests are allowed to finish after `shutdown` resolves.
///
/// # Errors
///
/// Returns [`ServerError::Serve`] if the server hits a fatal I/O error.
pub async fn serve<F>(listener: TcpListener, state: Arc<AppState>, shutdown: F) -> Result<(), ServerError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let router = build_router(state);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| ServerError::Serve(format!("serve error: {e}")))
}

/// Resolve when the process receives `Ctrl-C`.
///
/// If the signal handler cannot be installed this never resolves, so the
/// server keeps running rather than stopping immediately.
pub async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("shutdown signal received"),
        Err(e) => {
            error!(error = %e, "failed to listen for shutdown signal");
            std::future::pending::<()>().await;
        }
    }
}

/// Errors that can occur when starting or running the server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Failed to bind to the network address.
    #[error("bind error: {0}")]
    Bind(String),

    /// The server encountered a fatal error while serving.
    #[error("serve error: {0}")]
    Serve(String),
}
