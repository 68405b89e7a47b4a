//! Reveal projection.
//!
//! Derives the client-facing [`GridView`] from a feed snapshot. The reveal
//! state is a pure function of the snapshot and the configured threshold,
//! so every observer holding the same snapshot agrees on it.

use mosaic_types::{GridSnapshot, GridView};

/// Project a snapshot into the view pushed to clients.
pub fn project(snapshot: &GridSnapshot, reveal_threshold: u64) -> GridView {
    let total_placed = u64::try_from(snapshot.total_placed()).unwrap_or(u64::MAX);
    GridView {
        width: snapshot.width(),
        height: snapshot.height(),
        version: snapshot.version(),
        total_placed,
        reveal_threshold,
        revealed: total_placed >= reveal_threshold,
        remaining: reveal_threshold.saturating_sub(total_placed),
        cells: snapshot.cells().cloned().collect(),
    }
}

/// Filled fraction of the grid in `[0.0, 1.0]`, for progress displays.
pub fn fill_ratio(snapshot: &GridSnapshot) -> f64 {
    let capacity = snapshot.capacity();
    if capacity == 0 {
        return 0.0;
    }
    let placed = u32::try_from(snapshot.total_placed()).unwrap_or(u32::MAX);
    let capacity = u32::try_from(capacity).unwrap_or(u32::MAX);
    (f64::from(placed) / f64::from(capacity)).min(1.0)
}
