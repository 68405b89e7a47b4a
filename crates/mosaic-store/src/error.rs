//! Error types for the storage layer.
//!
//! All store operations report failures through [`StoreError`]. The
//! variants follow the placement contract: a [`StoreError::Conflict`] is a
//! transient race the caller is expected to retry, while
//! [`StoreError::Unavailable`] means the backing medium could not be
//! reached at all.

use mosaic_types::Coordinate;

/// SQLSTATE codes that indicate a concurrent transaction won the race.
const CONFLICT_SQLSTATES: [&str; 3] = [
    // serialization_failure
    "40001",
    // deadlock_detected
    "40P01",
    // unique_violation
    "23505",
];

/// Errors that can occur in the storage layer.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A value read by the transaction was changed by a concurrently
    /// committed transaction. Nothing was applied.
    #[error("transaction conflict on {key}")]
    Conflict {
        /// The key whose read precondition no longer holds.
        key: String,
    },

    /// The backing medium could not be reached, or a transaction could
    /// not be acquired within the configured bound.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// A second cell write was staged for the same coordinate in one
    /// transaction.
    #[error("duplicate staged write for cell {0}")]
    DuplicateWrite(Coordinate),

    /// A `PostgreSQL` migration failed.
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Any other backend failure (bad row data, unexpected SQL errors).
    #[error("backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// Shorthand for a conflict on the given key.
    pub fn conflict(key: impl core::fmt::Display) -> Self {
        Self::Conflict {
            key: key.to_string(),
        }
    }

    /// Whether this error is a transient conflict worth retrying.
    pub const fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db) => {
                let code = db.code();
                match code.as_deref() {
                    Some(state) if CONFLICT_SQLSTATES.contains(&state) => Self::Conflict {
                        key: format!("sqlstate {state}"),
                    },
                    _ => Self::Backend(err.to_string()),
                }
            }
            sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::Io(_)
            | sqlx::Error::Tls(_) => Self::Unavailable(err.to_string()),
            _ => Self::Backend(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_timeout_is_unavailable() {
        let err = StoreError::from(sqlx::Error::PoolTimedOut);
        assert!(matches!(err, StoreError::Unavailable(_)));
    }

    #[test]
    fn row_not_found_is_backend_error() {
        let err = StoreError::from(sqlx::Error::RowNotFound);
        assert!(matches!(err, StoreError::Backend(_)));
        assert!(!err.is_conflict());
    }

    #[test]
    fn conflict_names_key() {
        let err = StoreError::conflict(Coordinate::new(2, 3));
        assert!(err.is_conflict());
        assert_eq!(err.to_string(), "transaction conflict on 2-3");
    }
}
