//! Axum router construction for the Worldcast server.
//!
//! Assembles all routes (REST + `WebSocket` + static assets) into a single
//! [`Router`] with CORS and request tracing enabled.

use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;
use crate::ws;

/// Build the complete Axum router for the Worldcast server.
///
/// The router includes:
/// - `GET /` -- redirect to `/static/index.html`
/// - `GET /health` -- liveness and counts
/// - `GET|POST|PUT /entity/{id}` -- read or merge one entity
/// - `GET|POST|PUT /world` -- read or replace the whole store
/// - `GET|POST /clear` -- reset the store
/// - `GET /subscribe` -- `WebSocket` subscriber session
/// - `GET /static/*` -- files from the configured static directory
///
/// CORS allows any origin so a client page served elsewhere can talk to
/// the API.
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let static_files = ServeDir::new(&state.static_dir);

    Router::new()
        // Static client
        .route("/", get(handlers::index))
        .nest_service("/static", static_files)
        // Health
        .route("/health", get(handlers::health))
        // REST API
        .route(
            "/entity/{id}",
            get(handlers::get_entity)
                .post(handlers::update_entity)
                .put(handlers::update_entity),
        )
        .route(
            "/world",
            get(handlers::get_world)
                .post(handlers::replace_world)
                .put(handlers::replace_world),
        )
        .route(
            "/clear",
            get(handlers::clear_world).post(handlers::clear_world),
        )
        // WebSocket
        .route("/subscribe", get(ws::subscribe))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
