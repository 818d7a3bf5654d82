//! Error types for the HTTP endpoints.
//!
//! [`ApiError`] unifies request failures into a single enum that converts
//! into an Axum response via its [`IntoResponse`] implementation. Errors
//! here are local to one request and never touch the store.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Errors that can occur while handling one HTTP request.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The request body was missing, unreadable, or not the expected JSON.
    #[error("malformed request body: {0}")]
    MalformedBody(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::MalformedBody(_) => StatusCode::BAD_REQUEST,
        };

        let body = serde_json::json!({
            "error": self.to_string(),
            "status": status.as_u16(),
        });

        (status, axum::Json(body)).into_response()
    }
}
