//! Enumeration types for the Mosaic grid service.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Why a placement request did not commit.
///
/// Each variant maps to a stable reason string (see [`Self::as_str`]) so
/// the presentation layer can pick a message without parsing free text.
/// Transient storage conflicts never appear here: they are retried by the
/// arbiter and surface only as [`Self::Busy`] once retries run out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub enum RejectionReason {
    /// The identity has already placed its one cell.
    AlreadyPlaced,
    /// Another participant already claimed the coordinate.
    CellTaken,
    /// The request was structurally malformed (bounds, empty fields).
    InvalidRequest,
    /// Retries were exhausted under sustained contention.
    Busy,
    /// The backing store could not be reached.
    StoreUnavailable,
}

impl RejectionReason {
    /// Stable machine-readable reason string.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AlreadyPlaced => "AlreadyPlaced",
            Self::CellTaken => "CellTaken",
            Self::InvalidRequest => "InvalidRequest",
            Self::Busy => "Busy",
            Self::StoreUnavailable => "StoreUnavailable",
        }
    }

    /// Human-readable message suitable for showing to a participant.
    pub const fn message(self) -> &'static str {
        match self {
            Self::AlreadyPlaced => "You have already placed a pixel.",
            Self::CellTaken => "This pixel is already placed.",
            Self::InvalidRequest => "Invalid input data.",
            Self::Busy => "The grid is busy right now. Please try again.",
            Self::StoreUnavailable => "The grid is temporarily unavailable.",
        }
    }

    /// Whether the caller may reasonably retry the same request later.
    pub const fn is_transient(self) -> bool {
        matches!(self, Self::Busy | Self::StoreUnavailable)
    }
}

impl core::fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}
