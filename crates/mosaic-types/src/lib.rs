//! Shared type definitions for the Mosaic grid service.
//!
//! This crate is the single source of truth for all types used across the
//! Mosaic workspace. Types defined here flow downstream to `TypeScript`
//! via `ts-rs` for the grid client.
//!
//! # Modules
//!
//! - [`ids`] -- Type-safe UUID wrappers for cell and subscription identifiers
//! - [`enums`] -- Placement rejection reasons
//! - [`structs`] -- Coordinates, cells, participant records and grid views

pub mod enums;
pub mod ids;
pub mod structs;

// Re-export all public types at crate root for convenience.
pub use enums::RejectionReason;
pub use ids::{CellId, SubscriptionId};
pub use structs::{
    Cell, Color, Coordinate, GridSnapshot, GridView, Identity, ParticipantRecord,
};
