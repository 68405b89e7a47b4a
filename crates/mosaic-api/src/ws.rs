//! `WebSocket` handler for real-time grid streaming.
//!
//! Clients connect to `GET /ws/grid` and receive a JSON-encoded
//! [`GridView`](mosaic_types::GridView) frame with the full current state,
//! then another frame each time new cells are committed. Each connection
//! holds its own feed subscription, so a slow client only ever falls
//! behind to the latest snapshot and never holds up anyone else.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use mosaic_core::reveal;
use mosaic_types::GridSnapshot;
use tracing::{debug, warn};

use crate::state::AppState;

/// Upgrade an HTTP request to a `WebSocket` connection and begin
/// streaming grid views.
///
/// # Route
///
/// `GET /ws/grid`
pub async fn ws_grid(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_ws(socket, state))
}

/// Encode a snapshot as one text frame.
pub fn grid_frame(snapshot: &GridSnapshot, reveal_threshold: u64) -> Option<String> {
    match serde_json::to_string(&reveal::project(snapshot, reveal_threshold)) {
        Ok(json) => Some(json),
        Err(e) => {
            warn!("Failed to serialize grid view: {e}");
            None
        }
    }
}

/// Handle the `WebSocket` lifecycle: subscribe to the feed and forward
/// each snapshot as a text frame.
async fn handle_ws(mut socket: WebSocket, state: Arc<AppState>) {
    let mut subscription = state.store().feed().subscribe();
    debug!(subscription = %subscription.id(), "WebSocket client connected");

    loop {
        tokio::select! {
            // Next snapshot from the feed.
            snapshot = subscription.next() => {
                let Some(snapshot) = snapshot else {
                    debug!("Grid feed closed, shutting down WebSocket");
                    break;
                };
                let Some(json) = grid_frame(&snapshot, state.reveal_threshold) else {
                    continue;
                };
                if socket.send(Message::Text(json.into())).await.is_err() {
                    debug!("WebSocket client disconnected (send failed)");
                    break;
                }
            }
            // Check if the client sent a close frame or disconnected.
            msg = socket.recv() => {
                match msg {
                    Some(Ok(Message::Close(_))) | None => {
                        debug!("WebSocket client disconnected");
                        break;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if socket.send(Message::Pong(data)).await.is_err() {
                            debug!("WebSocket client disconnected (pong failed)");
                            break;
                        }
                    }
                    Some(Err(e)) => {
                        debug!("WebSocket error: {e}");
                        break;
                    }
                    _ => {}
                }
            }
        }
    }

    subscription.unsubscribe();
}
