//! The storage contract shared by every backend.
//!
//! A [`GridStore`] exposes the Cell and `ParticipantRecord` sets only
//! through [`GridTransaction`]s: reads record what they observed, writes
//! are staged in memory, and [`GridTransaction::commit`] applies the staged
//! writes atomically if and only if every observed value is still current.
//! Dropping a transaction without committing discards it.

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use mosaic_types::{Cell, Coordinate, Identity, ParticipantRecord};

use crate::error::StoreError;
use crate::feed::LiveFeed;

/// Authoritative storage for claimed cells and participant records.
#[async_trait]
pub trait GridStore: Send + Sync {
    /// Open a transaction.
    ///
    /// Waits at most the backend's acquisition bound before failing with
    /// [`StoreError::Unavailable`].
    async fn begin(&self) -> Result<Box<dyn GridTransaction>, StoreError>;

    /// Every committed cell, outside of any transaction.
    async fn load_cells(&self) -> Result<Vec<Cell>, StoreError>;

    /// The committed record for `identity`, outside of any transaction.
    async fn participant(
        &self,
        identity: &Identity,
    ) -> Result<Option<ParticipantRecord>, StoreError>;

    /// The feed this store publishes commits into.
    fn feed(&self) -> &LiveFeed;

    /// Short backend name for logs and the status page.
    fn backend_name(&self) -> &'static str;
}

/// One atomic read-then-write unit of work against a [`GridStore`].
#[async_trait]
pub trait GridTransaction: Send {
    /// Read the participant record for `identity` and record the read.
    async fn read_participant(
        &mut self,
        identity: &Identity,
    ) -> Result<Option<ParticipantRecord>, StoreError>;

    /// Read the cell at `coordinate` and record the read.
    async fn read_cell(&mut self, coordinate: Coordinate) -> Result<Option<Cell>, StoreError>;

    /// Stage the creation of `cell`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DuplicateWrite`] if a write for the same
    /// coordinate is already staged in this transaction.
    fn write_cell(&mut self, cell: Cell) -> Result<(), StoreError>;

    /// Stage `has_placed = true` for `identity`, leaving any other fields
    /// of the record untouched.
    fn mark_placed(&mut self, identity: &Identity);

    /// Validate every read and apply every staged write atomically.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Conflict`] if a concurrently committed
    /// transaction changed anything this one read (or claimed a cell this
    /// one is creating). Nothing is applied in that case.
    async fn commit(self: Box<Self>) -> Result<CommitReceipt, StoreError>;

    /// Discard the transaction and its staged writes.
    async fn rollback(self: Box<Self>) -> Result<(), StoreError>;
}

/// What a successful commit applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitReceipt {
    /// Cells created by the transaction.
    pub cells: Vec<Cell>,
    /// Identities whose `has_placed` flag was set.
    pub marked: Vec<Identity>,
}

/// Writes buffered by a transaction until commit.
#[derive(Debug, Default, Clone)]
pub struct StagedWrites {
    cells: BTreeMap<Coordinate, Cell>,
    placed: BTreeSet<Identity>,
}

impl StagedWrites {
    /// Stage a cell creation, rejecting a second write to one coordinate.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DuplicateWrite`] if the coordinate is taken.
    pub fn stage_cell(&mut self, cell: Cell) -> Result<(), StoreError> {
        match self.cells.entry(cell.coordinate) {
            std::collections::btree_map::Entry::Occupied(_) => {
                Err(StoreError::DuplicateWrite(cell.coordinate))
            }
            std::collections::btree_map::Entry::Vacant(slot) => {
                slot.insert(cell);
                Ok(())
            }
        }
    }

    /// Stage `has_placed = true` for an identity.
    pub fn stage_placed(&mut self, identity: &Identity) {
        self.placed.insert(identity.clone());
    }

    /// Staged cells in coordinate order.
    pub fn cells(&self) -> impl Iterator<Item = &Cell> {
        self.cells.values()
    }

    /// Identities staged as placed.
    pub fn placed(&self) -> impl Iterator<Item = &Identity> {
        self.placed.iter()
    }

    /// Whether nothing has been staged.
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty() && self.placed.is_empty()
    }

    /// Consume the staged writes into a commit receipt.
    pub fn into_receipt(self) -> CommitReceipt {
        CommitReceipt {
            cells: self.cells.into_values().collect(),
            marked: self.placed.into_iter().collect(),
        }
    }
}
