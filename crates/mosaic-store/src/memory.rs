//! In-process grid store with optimistic concurrency control.
//!
//! Every key (a cell coordinate or a participant identity) carries a
//! version number; an absent key has version 0. Transactions read without
//! locking and remember the version they observed. At commit time the
//! store takes its write lock and validates the whole read set
//! (first-committer-wins):
//!
//! ```text
//! 1. acquire write lock
//! 2. for each (key, observed) in read set: current version == observed?
//! 3. for each staged cell: coordinate still empty?
//! 4. IF any check fails: release lock, return Conflict (nothing applied)
//! 5. apply cell creations and participant marks, bump versions
//! 6. publish new cells to the live feed
//! 7. release lock
//! ```
//!
//! Publishing inside the lock means the feed observes commits in exactly
//! the order they were applied. Transactions on disjoint keys never
//! conflict; they only share the brief validate-and-apply section.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use mosaic_types::{Cell, Coordinate, Identity, ParticipantRecord};
use tokio::sync::{OwnedSemaphorePermit, RwLock, Semaphore};
use tracing::{debug, info};

use crate::error::StoreError;
use crate::feed::LiveFeed;
use crate::store::{CommitReceipt, GridStore, GridTransaction, StagedWrites};

/// Default bound on waiting for a transaction slot.
const DEFAULT_ACQUIRE_TIMEOUT_MS: u64 = 2_000;

/// Default number of transactions that may be open at once.
const DEFAULT_MAX_OPEN_TRANSACTIONS: usize = 1_024;

/// Configuration for [`MemoryStore`].
#[derive(Debug, Clone)]
pub struct MemoryStoreConfig {
    /// How long [`GridStore::begin`] waits for a free transaction slot.
    pub acquire_timeout: Duration,
    /// Maximum number of concurrently open transactions.
    pub max_open_transactions: usize,
}

impl Default for MemoryStoreConfig {
    fn default() -> Self {
        Self {
            acquire_timeout: Duration::from_millis(DEFAULT_ACQUIRE_TIMEOUT_MS),
            max_open_transactions: DEFAULT_MAX_OPEN_TRANSACTIONS,
        }
    }
}

/// A value together with the version it was last written at.
#[derive(Debug, Clone)]
struct Versioned<T> {
    value: T,
    version: u64,
}

/// Key recorded in a transaction's read set.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum ReadKey {
    Cell(Coordinate),
    Participant(Identity),
}

impl core::fmt::Display for ReadKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Cell(at) => write!(f, "cell {at}"),
            Self::Participant(identity) => write!(f, "participant {identity}"),
        }
    }
}

#[derive(Debug, Default)]
struct Tables {
    cells: HashMap<Coordinate, Versioned<Cell>>,
    participants: HashMap<Identity, Versioned<ParticipantRecord>>,
}

impl Tables {
    fn version_of(&self, key: &ReadKey) -> u64 {
        match key {
            ReadKey::Cell(at) => self.cells.get(at).map_or(0, |v| v.version),
            ReadKey::Participant(identity) => {
                self.participants.get(identity).map_or(0, |v| v.version)
            }
        }
    }

    fn apply(&mut self, staged: &StagedWrites) {
        for cell in staged.cells() {
            self.cells.insert(
                cell.coordinate,
                Versioned {
                    value: cell.clone(),
                    version: 1,
                },
            );
        }
        for identity in staged.placed() {
            self.participants
                .entry(identity.clone())
                .and_modify(|record| {
                    if !record.value.has_placed {
                        record.value.has_placed = true;
                        record.version = record.version.saturating_add(1);
                    }
                })
                .or_insert_with(|| Versioned {
                    value: ParticipantRecord {
                        identity: identity.clone(),
                        has_placed: true,
                    },
                    version: 1,
                });
        }
    }
}

#[derive(Debug)]
struct Shared {
    tables: RwLock<Tables>,
    permits: Arc<Semaphore>,
    acquire_timeout: Duration,
    feed: LiveFeed,
}

/// In-memory [`GridStore`].
///
/// Cheap to clone; clones share the same tables and feed.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    shared: Arc<Shared>,
}

impl MemoryStore {
    /// Create an empty store for a `width` x `height` grid.
    pub fn new(width: u32, height: u32, config: &MemoryStoreConfig) -> Self {
        info!(
            width,
            height,
            max_open_transactions = config.max_open_transactions,
            acquire_timeout_ms = config.acquire_timeout.as_millis(),
            "In-memory grid store created"
        );
        Self {
            shared: Arc::new(Shared {
                tables: RwLock::new(Tables::default()),
                permits: Arc::new(Semaphore::new(config.max_open_transactions)),
                acquire_timeout: config.acquire_timeout,
                feed: LiveFeed::new(width, height),
            }),
        }
    }

    /// Refuse all further transactions.
    ///
    /// Transactions already open may still commit.
    pub fn close(&self) {
        self.shared.permits.close();
        info!("In-memory grid store closed");
    }
}

#[async_trait]
impl GridStore for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn GridTransaction>, StoreError> {
        let timeout = self.shared.acquire_timeout;
        let permit = tokio::time::timeout(timeout, Arc::clone(&self.shared.permits).acquire_owned())
            .await
            .map_err(|elapsed| {
                StoreError::Unavailable(format!(
                    "no transaction slot within {}ms ({elapsed})",
                    timeout.as_millis()
                ))
            })?
            .map_err(|e| StoreError::Unavailable(format!("store closed: {e}")))?;

        Ok(Box::new(MemoryTransaction {
            shared: Arc::clone(&self.shared),
            reads: HashMap::new(),
            staged: StagedWrites::default(),
            _permit: permit,
        }))
    }

    async fn load_cells(&self) -> Result<Vec<Cell>, StoreError> {
        let tables = self.shared.tables.read().await;
        let mut cells: Vec<Cell> = tables.cells.values().map(|v| v.value.clone()).collect();
        cells.sort_by_key(|cell| cell.coordinate);
        Ok(cells)
    }

    async fn participant(
        &self,
        identity: &Identity,
    ) -> Result<Option<ParticipantRecord>, StoreError> {
        let tables = self.shared.tables.read().await;
        Ok(tables.participants.get(identity).map(|v| v.value.clone()))
    }

    fn feed(&self) -> &LiveFeed {
        &self.shared.feed
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

/// Transaction handle for [`MemoryStore`].
///
/// Holds a slot permit for its whole lifetime; the slot is returned when
/// the transaction commits, rolls back, or is dropped.
#[derive(Debug)]
pub struct MemoryTransaction {
    shared: Arc<Shared>,
    reads: HashMap<ReadKey, u64>,
    staged: StagedWrites,
    _permit: OwnedSemaphorePermit,
}

impl MemoryTransaction {
    /// Remember the first version observed for `key`.
    fn record_read(&mut self, key: ReadKey, version: u64) {
        self.reads.entry(key).or_insert(version);
    }
}

#[async_trait]
impl GridTransaction for MemoryTransaction {
    async fn read_participant(
        &mut self,
        identity: &Identity,
    ) -> Result<Option<ParticipantRecord>, StoreError> {
        let (record, version) = {
            let tables = self.shared.tables.read().await;
            tables
                .participants
                .get(identity)
                .map_or((None, 0), |v| (Some(v.value.clone()), v.version))
        };
        self.record_read(ReadKey::Participant(identity.clone()), version);
        Ok(record)
    }

    async fn read_cell(&mut self, coordinate: Coordinate) -> Result<Option<Cell>, StoreError> {
        let (cell, version) = {
            let tables = self.shared.tables.read().await;
            tables
                .cells
                .get(&coordinate)
                .map_or((None, 0), |v| (Some(v.value.clone()), v.version))
        };
        self.record_read(ReadKey::Cell(coordinate), version);
        Ok(cell)
    }

    fn write_cell(&mut self, cell: Cell) -> Result<(), StoreError> {
        self.staged.stage_cell(cell)
    }

    fn mark_placed(&mut self, identity: &Identity) {
        self.staged.stage_placed(identity);
    }

    async fn commit(self: Box<Self>) -> Result<CommitReceipt, StoreError> {
        let Self {
            shared,
            reads,
            staged,
            _permit,
        } = *self;

        let mut tables = shared.tables.write().await;

        for (key, observed) in &reads {
            let current = tables.version_of(key);
            if current != *observed {
                debug!(%key, observed, current, "Read precondition failed at commit");
                return Err(StoreError::conflict(key));
            }
        }
        for cell in staged.cells() {
            if tables.cells.contains_key(&cell.coordinate) {
                debug!(coordinate = %cell.coordinate, "Staged cell already claimed at commit");
                return Err(StoreError::conflict(ReadKey::Cell(cell.coordinate)));
            }
        }

        tables.apply(&staged);
        let receipt = staged.into_receipt();
        shared.feed.publish(receipt.cells.iter().cloned());
        drop(tables);

        Ok(receipt)
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        Ok(())
    }
}
