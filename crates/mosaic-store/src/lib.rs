//! Authoritative grid storage and live snapshot feed for Mosaic.
//!
//! The store is the only component allowed to mutate the set of claimed
//! cells and the set of participants that have placed. It exposes that
//! state exclusively through atomic compare-and-commit transactions, and
//! it publishes every commit to the [`LiveFeed`] in the same step.
//!
//! # Architecture
//!
//! ```text
//! PlacementArbiter
//!     |
//!     +-- begin / read / stage / commit --> dyn GridStore
//!                                            |-- MemoryStore   (single process, OCC)
//!                                            +-- PostgresStore (shared, SERIALIZABLE)
//!                                                  |
//!                           commit publishes ----> LiveFeed --> Subscription (per observer)
//! ```
//!
//! # Modules
//!
//! - [`store`] -- The [`GridStore`] / [`GridTransaction`] contract
//! - [`memory`] -- In-process optimistic store
//! - [`postgres`] -- `PostgreSQL` store with `LISTEN`/`NOTIFY` feed sync
//! - [`feed`] -- Coalescing snapshot feed
//! - [`error`] -- Shared error types

pub mod error;
pub mod feed;
pub mod memory;
pub mod postgres;
pub mod store;

// Re-export primary types for convenience.
pub use error::StoreError;
pub use feed::{LiveFeed, Subscription};
pub use memory::{MemoryStore, MemoryStoreConfig};
pub use postgres::{PostgresConfig, PostgresStore};
pub use store::{CommitReceipt, GridStore, GridTransaction, StagedWrites};
