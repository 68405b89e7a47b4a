//! Core entity structs for the Mosaic grid service.
//!
//! Covers the placement key ([`Coordinate`]), the opaque participant and
//! color tokens, the immutable [`Cell`], per-identity [`ParticipantRecord`]s
//! and the two read-side views of the grid: [`GridSnapshot`] (what the live
//! feed carries) and [`GridView`] (what clients receive).

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::ids::CellId;

// ---------------------------------------------------------------------------
// Coordinate
// ---------------------------------------------------------------------------

/// A position on the grid. `x` is the column, `y` the row.
///
/// Bounds are a property of the configured grid, not of the coordinate, so
/// a `Coordinate` on its own is not guaranteed to be in range.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS,
)]
#[ts(export, export_to = "bindings/")]
pub struct Coordinate {
    /// Column, `0 <= x < width`.
    pub x: u32,
    /// Row, `0 <= y < height`.
    pub y: u32,
}

impl Coordinate {
    /// Create a coordinate.
    pub const fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }

    /// Whether the coordinate lies inside a `width` x `height` grid.
    pub const fn within(self, width: u32, height: u32) -> bool {
        self.x < width && self.y < height
    }
}

impl core::fmt::Display for Coordinate {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}-{}", self.x, self.y)
    }
}

// ---------------------------------------------------------------------------
// Opaque tokens
// ---------------------------------------------------------------------------

/// Opaque per-participant handle issued by the anonymous sign-in provider.
///
/// The service never interprets the contents; it only compares handles
/// for equality.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(transparent)]
#[ts(export, export_to = "bindings/")]
pub struct Identity(String);

impl Identity {
    /// Wrap a raw handle. No validation is performed here.
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Borrow the raw handle.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the handle is the empty string.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl core::fmt::Display for Identity {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque color token chosen by the participant (`"#ff0000"`, `"red"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(transparent)]
#[ts(export, export_to = "bindings/")]
pub struct Color(String);

impl Color {
    /// Wrap a raw color token. No validation is performed here.
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Borrow the raw token.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the token is the empty string.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl core::fmt::Display for Color {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Cell
// ---------------------------------------------------------------------------

/// One claimed grid coordinate.
///
/// A `Cell` exists only after a successful placement commit and is never
/// updated or removed afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct Cell {
    /// Unique placement identifier.
    pub id: CellId,
    /// Where the cell sits on the grid.
    pub coordinate: Coordinate,
    /// Color chosen by the owner.
    pub color: Color,
    /// Identity that placed the cell.
    pub owner: Identity,
    /// When the placement committed.
    pub placed_at: DateTime<Utc>,
}

impl Cell {
    /// Build a fresh cell stamped with a new ID and the current time.
    pub fn claim(coordinate: Coordinate, color: Color, owner: Identity) -> Self {
        Self {
            id: CellId::new(),
            coordinate,
            color,
            owner,
            placed_at: Utc::now(),
        }
    }
}

// ---------------------------------------------------------------------------
// ParticipantRecord
// ---------------------------------------------------------------------------

/// Placement status of one identity.
///
/// Created implicitly the first time an identity is referenced. Once
/// `has_placed` becomes `true` it never flips back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct ParticipantRecord {
    /// The participant handle.
    pub identity: Identity,
    /// Whether the participant has already placed their cell.
    pub has_placed: bool,
}

impl ParticipantRecord {
    /// A record for an identity that has not placed yet.
    pub const fn fresh(identity: Identity) -> Self {
        Self {
            identity,
            has_placed: false,
        }
    }
}

// ---------------------------------------------------------------------------
// GridSnapshot
// ---------------------------------------------------------------------------

/// Point-in-time view of every claimed cell.
///
/// Snapshots only ever grow: [`GridSnapshot::merge`] inserts cells at
/// coordinates that are still empty and leaves existing cells untouched,
/// which is what keeps successive feed deliveries monotone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GridSnapshot {
    width: u32,
    height: u32,
    version: u64,
    cells: BTreeMap<Coordinate, Cell>,
}

impl GridSnapshot {
    /// An empty snapshot for a `width` x `height` grid.
    pub const fn empty(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            version: 0,
            cells: BTreeMap::new(),
        }
    }

    /// Grid width in cells.
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Grid height in cells.
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Number of changes merged into this snapshot so far.
    pub const fn version(&self) -> u64 {
        self.version
    }

    /// Number of claimed cells (`totalPlaced`).
    pub fn total_placed(&self) -> usize {
        self.cells.len()
    }

    /// Total number of coordinates on the grid.
    pub fn capacity(&self) -> u64 {
        u64::from(self.width).saturating_mul(u64::from(self.height))
    }

    /// The cell at `coordinate`, if claimed.
    pub fn get(&self, coordinate: Coordinate) -> Option<&Cell> {
        self.cells.get(&coordinate)
    }

    /// Iterate claimed cells in coordinate order.
    pub fn cells(&self) -> impl Iterator<Item = &Cell> {
        self.cells.values()
    }

    /// Merge newly observed cells into the snapshot.
    ///
    /// Cells at coordinates that are already present are ignored. Returns
    /// the number of cells added; the version is bumped once if any were.
    pub fn merge<I>(&mut self, cells: I) -> usize
    where
        I: IntoIterator<Item = Cell>,
    {
        let mut added: usize = 0;
        for cell in cells {
            if let std::collections::btree_map::Entry::Vacant(slot) =
                self.cells.entry(cell.coordinate)
            {
                slot.insert(cell);
                added = added.saturating_add(1);
            }
        }
        if added > 0 {
            self.version = self.version.saturating_add(1);
        }
        added
    }
}

// ---------------------------------------------------------------------------
// GridView
// ---------------------------------------------------------------------------

/// JSON-serializable grid state pushed to clients.
///
/// Built from a [`GridSnapshot`] plus the configured reveal threshold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct GridView {
    /// Grid width in cells.
    pub width: u32,
    /// Grid height in cells.
    pub height: u32,
    /// Feed version the view was projected from.
    pub version: u64,
    /// Number of claimed cells.
    pub total_placed: u64,
    /// Placement count at which the hidden image is revealed.
    pub reveal_threshold: u64,
    /// Whether `total_placed >= reveal_threshold`.
    pub revealed: bool,
    /// Placements still needed before the reveal (0 once revealed).
    pub remaining: u64,
    /// Every claimed cell in coordinate order.
    pub cells: Vec<Cell>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cell(x: u32, y: u32, owner: &str) -> Cell {
        Cell::claim(Coordinate::new(x, y), Color::new("#ff0000"), Identity::new(owner))
    }

    #[test]
    fn coordinate_bounds() {
        assert!(Coordinate::new(0, 0).within(24, 24));
        assert!(Coordinate::new(23, 23).within(24, 24));
        assert!(!Coordinate::new(24, 0).within(24, 24));
        assert!(!Coordinate::new(0, 24).within(24, 24));
    }

    #[test]
    fn coordinate_display_uses_dash() {
        assert_eq!(Coordinate::new(3, 4).to_string(), "3-4");
    }

    #[test]
    fn merge_keeps_first_cell_at_coordinate() {
        let mut snap = GridSnapshot::empty(4, 4);
        assert_eq!(snap.merge(vec![cell(1, 1, "u1")]), 1);
        assert_eq!(snap.merge(vec![cell(1, 1, "u2")]), 0);
        let kept = snap.get(Coordinate::new(1, 1)).map(|c| c.owner.as_str().to_owned());
        assert_eq!(kept.as_deref(), Some("u1"));
        assert_eq!(snap.total_placed(), 1);
    }

    #[test]
    fn version_bumps_only_on_change() {
        let mut snap = GridSnapshot::empty(4, 4);
        snap.merge(vec![cell(0, 0, "a"), cell(0, 1, "b")]);
        assert_eq!(snap.version(), 1);
        snap.merge(Vec::new());
        assert_eq!(snap.version(), 1);
        snap.merge(vec![cell(0, 0, "c")]);
        assert_eq!(snap.version(), 1);
        snap.merge(vec![cell(2, 2, "d")]);
        assert_eq!(snap.version(), 2);
        assert_eq!(snap.total_placed(), 3);
    }

    #[test]
    fn identity_serializes_transparently() {
        let json = serde_json::to_string(&Identity::new("anon-1")).unwrap_or_default();
        assert_eq!(json, "\"anon-1\"");
    }

    #[test]
    fn capacity_is_width_times_height() {
        assert_eq!(GridSnapshot::empty(24, 24).capacity(), 576);
    }
}
