//! Shared application state for the grid API server.
//!
//! [`AppState`] bundles the placement arbiter (and through it the grid
//! store and its live feed), the presence registry, and the reveal
//! threshold the views are projected against.

use std::sync::Arc;

use mosaic_core::reveal;
use mosaic_core::{MosaicConfig, PlacementArbiter};
use mosaic_store::GridStore;
use mosaic_types::GridView;

use crate::presence::PresenceRegistry;

/// Shared state for the Axum application.
///
/// Wrapped in [`Arc`] and injected via Axum's `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// The single write path into the grid.
    pub arbiter: PlacementArbiter,
    /// Audience tracking.
    pub presence: Arc<PresenceRegistry>,
    /// Placement count at which the image is revealed.
    pub reveal_threshold: u64,
}

impl AppState {
    /// Create application state from its parts.
    pub const fn new(
        arbiter: PlacementArbiter,
        presence: Arc<PresenceRegistry>,
        reveal_threshold: u64,
    ) -> Self {
        Self {
            arbiter,
            presence,
            reveal_threshold,
        }
    }

    /// Build state for `store` with every limit taken from `config`.
    pub fn from_config(store: Arc<dyn GridStore>, config: &MosaicConfig) -> Self {
        let arbiter = PlacementArbiter::new(store, config.into());
        let presence = Arc::new(PresenceRegistry::new(
            std::time::Duration::from_secs(config.presence.ttl_secs),
            config.presence.max_reported,
        ));
        Self::new(arbiter, presence, config.grid.reveal_threshold)
    }

    /// The authoritative grid store.
    pub fn store(&self) -> &Arc<dyn GridStore> {
        self.arbiter.store()
    }

    /// The current grid as clients see it.
    pub fn grid_view(&self) -> GridView {
        reveal::project(&self.store().feed().current(), self.reveal_threshold)
    }
}
