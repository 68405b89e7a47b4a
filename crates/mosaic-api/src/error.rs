//! Error types for the grid API server.
//!
//! [`ApiError`] unifies all failure modes into a single enum that can be
//! converted into an Axum HTTP response via its
//! [`IntoResponse`](axum::response::IntoResponse) implementation. Every
//! error body carries the user-facing message, the stable reason code and
//! the HTTP status.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use mosaic_core::PlacementError;
use mosaic_store::StoreError;
use mosaic_types::RejectionReason;
use tracing::warn;

/// Errors that can occur in the API layer.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// A placement did not commit.
    #[error(transparent)]
    Placement(#[from] PlacementError),

    /// The request body could not be decoded.
    #[error("invalid request body: {0}")]
    InvalidBody(String),

    /// A read against the store failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl ApiError {
    /// The stable reason code for this error.
    pub const fn reason(&self) -> RejectionReason {
        match self {
            Self::Placement(e) => e.reason(),
            Self::InvalidBody(_) => RejectionReason::InvalidRequest,
            Self::Store(_) => RejectionReason::StoreUnavailable,
        }
    }

    /// HTTP status for this error.
    ///
    /// Rule violations and exhausted retries answer 500 like any other
    /// failed write; only malformed input is a client error.
    pub const fn status(&self) -> StatusCode {
        match self.reason() {
            RejectionReason::InvalidRequest => StatusCode::BAD_REQUEST,
            RejectionReason::StoreUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            RejectionReason::AlreadyPlaced
            | RejectionReason::CellTaken
            | RejectionReason::Busy => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let reason = self.reason();

        if status.is_server_error() && reason.is_transient() {
            warn!(error = %self, %reason, "Request failed");
        }

        let body = serde_json::json!({
            "error": reason.message(),
            "reason": reason.as_str(),
            "status": status.as_u16(),
        });

        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_follows_reason() {
        let invalid = ApiError::InvalidBody("missing field".to_owned());
        assert_eq!(invalid.status(), StatusCode::BAD_REQUEST);

        let down = ApiError::Store(StoreError::Unavailable("pool closed".to_owned()));
        assert_eq!(down.status(), StatusCode::SERVICE_UNAVAILABLE);

        let taken = ApiError::Placement(PlacementError::Rejected {
            reason: RejectionReason::CellTaken,
            detail: String::new(),
        });
        assert_eq!(taken.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(taken.reason().as_str(), "CellTaken");
    }
}
