//! Lenient JSON request bodies.
//!
//! Browser clients post JSON with whatever `Content-Type` their toolkit
//! picks, so [`JsonBody`] ignores the header and parses the raw bytes.
//! Anything that is not valid JSON of the expected shape is rejected with
//! [`ApiError::MalformedBody`].

use axum::body::Bytes;
use axum::extract::{FromRequest, Request};
use serde::de::DeserializeOwned;

use crate::error::ApiError;

/// Extractor deserializing the request body as JSON regardless of its
/// declared content type.
#[derive(Debug, Clone)]
pub struct JsonBody<T>(pub T);

impl<S, T> FromRequest<S> for JsonBody<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(|e| ApiError::MalformedBody(e.body_text()))?;
        parse(&bytes).map(Self)
    }
}

/// Deserialize `bytes` as JSON into `T`.
pub fn parse<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, ApiError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Err(ApiError::MalformedBody(String::from("empty body")));
    }
    serde_json::from_slice(bytes).map_err(|e| ApiError::MalformedBody(e.to_string()))
}
