//! Placement arbitration.
//!
//! [`PlacementArbiter::place_cell`] is the only write path into the grid.
//! Each attempt opens one store transaction, checks the participant record
//! before the target cell, stages the new cell together with the
//! participant's `has_placed` flag and commits both atomically. A commit
//! that loses a race is retried from a fresh transaction; every other
//! outcome is final.

use std::sync::Arc;
use std::time::Duration;

use mosaic_store::{GridStore, GridTransaction, StoreError};
use mosaic_types::{Cell, Color, Coordinate, Identity, RejectionReason};
use tracing::{debug, info, warn};

use crate::config::MosaicConfig;

/// Limits the arbiter enforces on every request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArbiterConfig {
    /// Grid width in cells.
    pub width: u32,
    /// Grid height in cells.
    pub height: u32,
    /// Attempts per placement before giving up with `Busy`.
    pub max_attempts: u32,
    /// Pause between conflicting attempts.
    pub retry_backoff: Duration,
    /// Longest accepted identity handle, in bytes.
    pub max_identity_len: usize,
    /// Longest accepted color token, in bytes.
    pub max_color_len: usize,
}

impl Default for ArbiterConfig {
    fn default() -> Self {
        Self::from(&MosaicConfig::default())
    }
}

impl From<&MosaicConfig> for ArbiterConfig {
    fn from(config: &MosaicConfig) -> Self {
        Self {
            width: config.grid.width,
            height: config.grid.height,
            max_attempts: config.placement.max_attempts.max(1),
            retry_backoff: config.placement.retry_backoff(),
            max_identity_len: config.placement.max_identity_len,
            max_color_len: config.placement.max_color_len,
        }
    }
}

/// A placement request exactly as the client sent it.
///
/// Coordinates are signed so that negative input reaches validation and is
/// rejected there instead of failing to deserialize.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlacementRequest {
    /// Requesting participant.
    pub identity: String,
    /// Target column.
    pub x: i64,
    /// Target row.
    pub y: i64,
    /// Chosen color token.
    pub color: String,
}

impl PlacementRequest {
    /// Build a request.
    pub fn new(identity: impl Into<String>, x: i64, y: i64, color: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            x,
            y,
            color: color.into(),
        }
    }
}

/// A request that passed validation.
#[derive(Debug, Clone)]
struct ValidPlacement {
    identity: Identity,
    coordinate: Coordinate,
    color: Color,
}

/// A successful placement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Committed {
    /// The cell that was created.
    pub cell: Cell,
    /// Attempts it took, including the successful one.
    pub attempts: u32,
}

/// Why `place_cell` did not commit.
#[derive(Debug, thiserror::Error)]
pub enum PlacementError {
    /// The request was refused; `reason` is the stable code for clients.
    #[error("placement rejected ({reason}): {detail}")]
    Rejected {
        /// Stable rejection code.
        reason: RejectionReason,
        /// Diagnostic detail for logs.
        detail: String,
    },

    /// The store failed in a way that retrying will not fix.
    #[error(transparent)]
    Store(StoreError),
}

impl PlacementError {
    fn rejected(reason: RejectionReason, detail: impl Into<String>) -> Self {
        Self::Rejected {
            reason,
            detail: detail.into(),
        }
    }

    /// The stable reason code reported to clients.
    ///
    /// Non-retryable store failures report `StoreUnavailable`.
    pub const fn reason(&self) -> RejectionReason {
        match self {
            Self::Rejected { reason, .. } => *reason,
            Self::Store(_) => RejectionReason::StoreUnavailable,
        }
    }
}

impl From<StoreError> for PlacementError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unavailable(detail) => {
                Self::rejected(RejectionReason::StoreUnavailable, detail)
            }
            other => Self::Store(other),
        }
    }
}

/// Serializes concurrent placement requests against a [`GridStore`].
#[derive(Clone)]
pub struct PlacementArbiter {
    store: Arc<dyn GridStore>,
    config: ArbiterConfig,
}

impl core::fmt::Debug for PlacementArbiter {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PlacementArbiter")
            .field("backend", &self.store.backend_name())
            .field("config", &self.config)
            .finish()
    }
}

impl PlacementArbiter {
    /// Create an arbiter over `store`.
    pub fn new(store: Arc<dyn GridStore>, config: ArbiterConfig) -> Self {
        Self { store, config }
    }

    /// The store placements are committed to.
    pub fn store(&self) -> &Arc<dyn GridStore> {
        &self.store
    }

    /// The limits in force.
    pub const fn config(&self) -> &ArbiterConfig {
        &self.config
    }

    /// Attempt to claim one cell for one identity.
    ///
    /// # Errors
    ///
    /// Returns [`PlacementError::Rejected`] with
    /// - `InvalidRequest` if the coordinate is out of bounds or the
    ///   identity or color is empty or too long (no transaction is opened)
    /// - `AlreadyPlaced` if the identity has placed before, whatever the
    ///   target coordinate
    /// - `CellTaken` if another identity holds the coordinate
    /// - `Busy` if every attempt lost a commit race
    /// - `StoreUnavailable` if the store could not be reached
    ///
    /// and [`PlacementError::Store`] for any other store failure.
    pub async fn place_cell(&self, request: PlacementRequest) -> Result<Committed, PlacementError> {
        let placement = self.validate(request)?;
        let max_attempts = self.config.max_attempts.max(1);

        let mut attempt: u32 = 0;
        loop {
            attempt = attempt.saturating_add(1);
            match self.try_place(&placement).await {
                Ok(cell) => {
                    info!(
                        identity = %cell.owner,
                        coordinate = %cell.coordinate,
                        color = %cell.color,
                        attempts = attempt,
                        "Cell placed"
                    );
                    return Ok(Committed {
                        cell,
                        attempts: attempt,
                    });
                }
                Err(PlacementError::Store(err)) if err.is_conflict() => {
                    if attempt >= max_attempts {
                        warn!(
                            identity = %placement.identity,
                            coordinate = %placement.coordinate,
                            attempts = attempt,
                            error = %err,
                            "Placement retries exhausted"
                        );
                        return Err(PlacementError::rejected(
                            RejectionReason::Busy,
                            format!("{attempt} attempts lost a commit race"),
                        ));
                    }
                    debug!(
                        identity = %placement.identity,
                        coordinate = %placement.coordinate,
                        attempt,
                        error = %err,
                        "Commit conflict, retrying"
                    );
                    if !self.config.retry_backoff.is_zero() {
                        tokio::time::sleep(self.config.retry_backoff).await;
                    }
                }
                Err(err) => {
                    debug!(
                        identity = %placement.identity,
                        coordinate = %placement.coordinate,
                        reason = %err.reason(),
                        error = %err,
                        "Placement refused"
                    );
                    return Err(err);
                }
            }
        }
    }

    fn validate(&self, request: PlacementRequest) -> Result<ValidPlacement, PlacementError> {
        let invalid = |detail: String| PlacementError::rejected(RejectionReason::InvalidRequest, detail);

        if request.identity.is_empty() {
            return Err(invalid("identity is empty".to_owned()));
        }
        if request.identity.len() > self.config.max_identity_len {
            return Err(invalid(format!(
                "identity is longer than {} bytes",
                self.config.max_identity_len
            )));
        }
        if request.color.is_empty() {
            return Err(invalid("color is empty".to_owned()));
        }
        if request.color.len() > self.config.max_color_len {
            return Err(invalid(format!(
                "color is longer than {} bytes",
                self.config.max_color_len
            )));
        }

        let (width, height) = (self.config.width, self.config.height);
        let coordinate = match (u32::try_from(request.x), u32::try_from(request.y)) {
            (Ok(x), Ok(y)) if Coordinate::new(x, y).within(width, height) => Coordinate::new(x, y),
            _ => {
                return Err(invalid(format!(
                    "({}, {}) is outside the {width}x{height} grid",
                    request.x, request.y
                )));
            }
        };

        Ok(ValidPlacement {
            identity: Identity::new(request.identity),
            coordinate,
            color: Color::new(request.color),
        })
    }

    /// One transactional attempt.
    async fn try_place(&self, placement: &ValidPlacement) -> Result<Cell, PlacementError> {
        let mut tx = self.store.begin().await?;

        let participant = tx.read_participant(&placement.identity).await?;
        if participant.is_some_and(|record| record.has_placed) {
            abandon(tx).await;
            return Err(PlacementError::rejected(
                RejectionReason::AlreadyPlaced,
                format!("{} has already placed", placement.identity),
            ));
        }

        if let Some(existing) = tx.read_cell(placement.coordinate).await? {
            abandon(tx).await;
            return Err(PlacementError::rejected(
                RejectionReason::CellTaken,
                format!("{} is held by {}", placement.coordinate, existing.owner),
            ));
        }

        let cell = Cell::claim(
            placement.coordinate,
            placement.color.clone(),
            placement.identity.clone(),
        );
        tx.write_cell(cell.clone())?;
        tx.mark_placed(&placement.identity);
        let receipt = tx.commit().await?;
        debug!(
            cells = receipt.cells.len(),
            marked = receipt.marked.len(),
            "Placement transaction committed"
        );

        Ok(cell)
    }
}

/// Roll back a transaction that will not commit.
async fn abandon(tx: Box<dyn GridTransaction>) {
    if let Err(e) = tx.rollback().await {
        warn!(error = %e, "Rollback failed");
    }
}
