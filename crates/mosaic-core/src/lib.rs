//! Placement arbitration and grid configuration for Mosaic.
//!
//! This crate decides whether a participant may claim a cell. It sits
//! between the HTTP boundary and the [`mosaic_store`] backends, and owns
//! the service configuration every other crate reads.
//!
//! # Modules
//!
//! - [`arbiter`] -- The single write path: validate, check, stage, commit, retry
//! - [`config`] -- `mosaic-config.yaml` loading with environment overrides
//! - [`reveal`] -- Pure projection of a snapshot into the client view

pub mod arbiter;
pub mod config;
pub mod reveal;

pub use arbiter::{ArbiterConfig, Committed, PlacementArbiter, PlacementError, PlacementRequest};
pub use config::{ConfigError, MosaicConfig, StoreBackend};
