//! REST API endpoint handlers for the grid server.
//!
//! Reads are served from the live feed's latest snapshot; the only write
//! goes through the [`PlacementArbiter`](mosaic_core::PlacementArbiter).
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET` | `/` | Minimal HTML status page |
//! | `POST` | `/api/place-pixel` | Claim one cell |
//! | `GET` | `/api/grid` | Current grid view |
//! | `GET` | `/api/participants/:id` | Whether an identity has placed |
//! | `POST` | `/api/presence/heartbeat` | Mark a viewer online |
//! | `POST` | `/api/presence/leave` | Mark a viewer offline |
//! | `GET` | `/api/presence` | Online viewer count |
//! | `GET` | `/health` | Liveness probe |

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::response::{Html, IntoResponse};
use mosaic_core::{PlacementRequest, reveal};
use mosaic_types::{Identity, ParticipantRecord};
use serde::Deserialize;

use crate::error::ApiError;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request bodies
// ---------------------------------------------------------------------------

/// Body of `POST /api/place-pixel`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlacePixelBody {
    /// Target column.
    pub x: i64,
    /// Target row.
    pub y: i64,
    /// Chosen color token.
    #[serde(default)]
    pub color: String,
    /// Requesting participant.
    #[serde(default)]
    pub user_id: String,
}

/// Body of the presence endpoints.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceBody {
    /// The viewer's identity.
    pub user_id: String,
}

fn decode<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    body.map(|Json(value)| value)
        .map_err(|rejection| ApiError::InvalidBody(rejection.body_text()))
}

// ---------------------------------------------------------------------------
// GET / -- minimal HTML status page
// ---------------------------------------------------------------------------

/// Serve a minimal HTML page showing grid progress and API links.
pub async fn index(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let view = state.grid_view();
    let placed = view.total_placed;
    let threshold = view.reveal_threshold;
    let revealed = if view.revealed { "REVEALED" } else { "HIDDEN" };
    let size = format!("{}x{}", view.width, view.height);
    let filled = format!(
        "{:.1}%",
        reveal::fill_ratio(&state.store().feed().current()) * 100.0
    );
    let subscribers = state.store().feed().subscriber_count();
    let audience = state.presence.online().await;
    let backend = state.store().backend_name();

    Html(format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="utf-8">
    <title>Mosaic</title>
    <style>
        body {{
            background: #0d1117;
            color: #c9d1d9;
            font-family: 'Cascadia Code', 'Fira Code', 'Consolas', monospace;
            padding: 2rem;
            max-width: 800px;
            margin: 0 auto;
        }}
        h1 {{ color: #58a6ff; margin-bottom: 0.25rem; }}
        .subtitle {{ color: #8b949e; margin-top: 0; }}
        .metric {{
            display: inline-block;
            background: #161b22;
            border: 1px solid #30363d;
            border-radius: 6px;
            padding: 1rem 1.5rem;
            margin: 0.5rem 0.5rem 0.5rem 0;
            min-width: 120px;
        }}
        .metric .label {{ color: #8b949e; font-size: 0.85rem; }}
        .metric .value {{ color: #58a6ff; font-size: 1.5rem; font-weight: bold; }}
        ul {{ list-style: none; padding: 0; }}
        li {{ padding: 0.3rem 0; }}
        .status {{ color: #3fb950; font-weight: bold; }}
    </style>
</head>
<body>
    <h1>Mosaic</h1>
    <p class="subtitle">One cell per person -- {backend} store</p>

    <p>Image: <span class="status">{revealed}</span></p>

    <div>
        <div class="metric">
            <div class="label">Grid</div>
            <div class="value">{size}</div>
        </div>
        <div class="metric">
            <div class="label">Placed</div>
            <div class="value">{placed}</div>
        </div>
        <div class="metric">
            <div class="label">Filled</div>
            <div class="value">{filled}</div>
        </div>
        <div class="metric">
            <div class="label">Reveal at</div>
            <div class="value">{threshold}</div>
        </div>
        <div class="metric">
            <div class="label">Live feeds</div>
            <div class="value">{subscribers}</div>
        </div>
        <div class="metric">
            <div class="label">Audience</div>
            <div class="value">{audience}</div>
        </div>
    </div>

    <h2>API</h2>
    <ul>
        <li>POST /api/place-pixel -- Claim a cell</li>
        <li>GET <a href="/api/grid">/api/grid</a> -- Current grid</li>
        <li>GET /api/participants/:id -- Placement status</li>
        <li>GET <a href="/api/presence">/api/presence</a> -- Audience count</li>
        <li>GET ws://host:port/ws/grid -- Live grid stream</li>
    </ul>
</body>
</html>"#
    ))
}

// ---------------------------------------------------------------------------
// POST /api/place-pixel
// ---------------------------------------------------------------------------

/// Claim one cell for one participant.
pub async fn place_pixel(
    State(state): State<Arc<AppState>>,
    body: Result<Json<PlacePixelBody>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let body = decode(body)?;
    let request = PlacementRequest::new(body.user_id, body.x, body.y, body.color);
    let committed = state.arbiter.place_cell(request).await?;

    Ok(Json(serde_json::json!({
        "success": true,
        "cell": committed.cell,
    })))
}

// ---------------------------------------------------------------------------
// GET /api/grid
// ---------------------------------------------------------------------------

/// Return every claimed cell plus the reveal state.
pub async fn get_grid(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.grid_view())
}

// ---------------------------------------------------------------------------
// GET /api/participants/:id
// ---------------------------------------------------------------------------

/// Return whether an identity has placed its cell.
///
/// Unknown identities report `hasPlaced: false`.
pub async fn get_participant(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let identity = Identity::new(id);
    let record = state
        .store()
        .participant(&identity)
        .await?
        .unwrap_or_else(|| ParticipantRecord::fresh(identity));
    Ok(Json(record))
}

// ---------------------------------------------------------------------------
// Presence
// ---------------------------------------------------------------------------

/// Record a viewer heartbeat and return the online count.
pub async fn presence_heartbeat(
    State(state): State<Arc<AppState>>,
    body: Result<Json<PresenceBody>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let body = decode(body)?;
    if body.user_id.is_empty() {
        return Err(ApiError::InvalidBody("userId is empty".to_owned()));
    }
    state.presence.heartbeat(Identity::new(body.user_id)).await;
    Ok(Json(serde_json::json!({ "online": state.presence.online().await })))
}

/// Mark a viewer offline and return the online count.
pub async fn presence_leave(
    State(state): State<Arc<AppState>>,
    body: Result<Json<PresenceBody>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let body = decode(body)?;
    if body.user_id.is_empty() {
        return Err(ApiError::InvalidBody("userId is empty".to_owned()));
    }
    state.presence.leave(&Identity::new(body.user_id)).await;
    Ok(Json(serde_json::json!({ "online": state.presence.online().await })))
}

/// Return the number of viewers online.
pub async fn get_presence(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(serde_json::json!({ "online": state.presence.online().await }))
}

// ---------------------------------------------------------------------------
// GET /health
// ---------------------------------------------------------------------------

/// Liveness probe.
pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "backend": state.store().backend_name(),
    }))
}
