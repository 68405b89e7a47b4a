//! Grid API server for Mosaic.
//!
//! This crate provides an Axum HTTP server that exposes:
//!
//! - **Placement endpoint** (`POST /api/place-pixel`) routed through the
//!   [`PlacementArbiter`](mosaic_core::PlacementArbiter)
//! - **`WebSocket` endpoint** (`/ws/grid`) streaming grid views from the
//!   store's live feed
//! - **REST endpoints** for the current grid, participant status and
//!   audience presence
//! - **Minimal HTML status page** (`GET /`) showing placement progress
//!
//! # Architecture
//!
//! Reads never touch a transaction: `/api/grid` and `/ws/grid` project the
//! live feed's latest snapshot. Presence lives entirely in this crate in a
//! [`PresenceRegistry`] with TTL expiry.

pub mod error;
pub mod handlers;
pub mod presence;
pub mod router;
pub mod server;
pub mod state;
pub mod ws;

// Re-export primary types for convenience.
pub use error::ApiError;
pub use presence::PresenceRegistry;
pub use router::build_router;
pub use server::{ServerConfig, ServerError, start_server};
pub use state::AppState;
