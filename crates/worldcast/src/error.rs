//! Error types for the Worldcast binary.
//!
//! [`AppError`] is the top-level error that `main` propagates with `?`.
//! Only startup failures end up here; errors on individual requests or
//! connections never reach the process level.

/// Top-level error for the Worldcast binary.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: worldcast_core::ConfigError,
    },

    /// The HTTP server failed to bind or serve.
    #[error("server error: {source}")]
    Server {
        /// The underlying server error.
        #[from]
        source: worldcast_server::ServerError,
    },
}
