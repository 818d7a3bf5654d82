//! REST endpoint handlers for the Worldcast server.
//!
//! All handlers go through the shared [`Store`](worldcast_core::Store)
//! on [`AppState`]; every mutation they make is broadcast to subscribers
//! by the store itself.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET` | `/` | Redirect to the static index page |
//! | `GET` | `/health` | Liveness plus subscriber and entity counts |
//! | `POST`/`PUT` | `/entity/{id}` | Merge or set the body into an entity |
//! | `GET` | `/entity/{id}` | Read an entity (`{}` if unknown) |
//! | `GET` | `/world` | Read the whole store |
//! | `POST`/`PUT` | `/world` | Replace the whole store |
//! | `GET`/`POST` | `/clear` | Reset the store |

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::{StatusCode, header};
use axum::response::IntoResponse;
use tracing::{debug, info};
use worldcast_core::{Attributes, EntityId, World};

use crate::body::JsonBody;
use crate::state::AppState;

/// Path of the static index page that `GET /` redirects to.
pub const INDEX_PAGE: &str = "/static/index.html";

// ---------------------------------------------------------------------------
// GET / -- redirect to the static client
// ---------------------------------------------------------------------------

/// Redirect the browser to the static index page.
pub async fn index() -> impl IntoResponse {
    (StatusCode::FOUND, [(header::LOCATION, INDEX_PAGE)])
}

// ---------------------------------------------------------------------------
// GET /health
// ---------------------------------------------------------------------------

/// Report liveness with the number of connected subscribers and stored
/// entities.
pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "subscribers": state.registry.len(),
        "entities": state.store.len(),
    }))
}

// ---------------------------------------------------------------------------
// /entity/{id}
// ---------------------------------------------------------------------------

/// Merge the request body into entity `id`.
///
/// An entity with no attributes is replaced wholesale; otherwise each
/// field is updated in turn. Responds with the resulting attributes.
pub async fn update_entity(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    JsonBody(attributes): JsonBody<Attributes>,
) -> Json<Attributes> {
    debug!(entity = %id, fields = attributes.len(), "entity update");
    Json(state.store.merge(EntityId::from(id), attributes))
}

/// Return the attributes of entity `id`, or `{}` if it is unknown.
pub async fn get_entity(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Json<Attributes> {
    Json(state.store.get(&id))
}

// ---------------------------------------------------------------------------
// /world
// ---------------------------------------------------------------------------

/// Return every entity and its attributes.
pub async fn get_world(State(state): State<Arc<AppState>>) -> Json<World> {
    Json(state.store.world())
}

/// Replace the whole store with the request body and return the result.
pub async fn replace_world(
    State(state): State<Arc<AppState>>,
    JsonBody(world): JsonBody<World>,
) -> Json<World> {
    info!(entities = world.len(), "world replaced");
    Json(state.store.replace(world))
}

// ---------------------------------------------------------------------------
// /clear
// ---------------------------------------------------------------------------

/// Reset the store and return its (now empty) contents.
///
/// Subscribers are not notified of the reset.
pub async fn clear_world(State(state): State<Arc<AppState>>) -> Json<World> {
    state.store.clear();
    info!("world cleared");
    Json(state.store.world())
}
