//! Axum router construction for the grid API.
//!
//! Assembles all routes (REST + `WebSocket`) into a single [`Router`]
//! with CORS middleware enabled so the grid client can be served from a
//! different origin.

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;
use crate::ws;

/// Build the complete Axum router for the grid server.
///
/// The router includes:
/// - `GET /` -- minimal HTML status page
/// - `GET /health` -- liveness probe
/// - `GET /ws/grid` -- `WebSocket` grid stream
/// - `POST /api/place-pixel` -- claim a cell
/// - `GET /api/grid` -- current grid view
/// - `GET /api/participants/{id}` -- placement status of one identity
/// - `POST /api/presence/heartbeat` -- mark a viewer online
/// - `POST /api/presence/leave` -- mark a viewer offline
/// - `GET /api/presence` -- online viewer count
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Status page
        .route("/", get(handlers::index))
        .route("/health", get(handlers::health))
        // WebSocket
        .route("/ws/grid", get(ws::ws_grid))
        // Placement
        .route("/api/place-pixel", post(handlers::place_pixel))
        .route("/api/grid", get(handlers::get_grid))
        .route("/api/participants/{id}", get(handlers::get_participant))
        // Presence
        .route("/api/presence", get(handlers::get_presence))
        .route("/api/presence/heartbeat", post(handlers::presence_heartbeat))
        .route("/api/presence/leave", post(handlers::presence_leave))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
