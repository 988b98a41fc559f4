//! Error types for the table cache
//!
//! Provides unified error handling using thiserror.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::store::StoreError;
use crate::table::SchemaViolation;

// == Cache Error Enum ==
/// Unified error type for cache operations.
///
/// Misses are never errors: `get` reports them as `Ok(None)` and `remove`
/// of an absent key succeeds.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CacheError {
    /// Caller supplied an invalid key, value or expiration
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Configuration could not be loaded or is inconsistent
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Backing table is missing and creation is disallowed
    #[error("Table not found: {0}")]
    TableNotFound(String),

    /// Backing table exists but its key schema is unusable
    #[error("Table '{table}' does not match the expected schema: {reason}")]
    SchemaMismatch {
        table: String,
        reason: SchemaViolation,
    },

    /// Table never reported active within the polling bound
    #[error("Table '{table}' did not become active after {attempts} polls")]
    TableNotActive { table: String, attempts: u32 },

    /// Store call failed; retryable at the caller's discretion
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// The caller's cancellation token fired before the store call completed
    #[error("Operation cancelled")]
    Cancelled,
}

impl CacheError {
    // == Is Fatal ==
    /// Returns true for resolution verdicts that retrying cannot change.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            CacheError::TableNotFound(_) | CacheError::SchemaMismatch { .. }
        )
    }
}

// == IntoResponse Implementation ==
impl IntoResponse for CacheError {
    fn into_response(self) -> Response {
        let status = match &self {
            CacheError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            CacheError::InvalidConfig(_) => StatusCode::INTERNAL_SERVER_ERROR,
            CacheError::TableNotFound(_)
            | CacheError::SchemaMismatch { .. }
            | CacheError::TableNotActive { .. } => StatusCode::SERVICE_UNAVAILABLE,
            CacheError::Store(StoreError::Throttled(_)) => StatusCode::SERVICE_UNAVAILABLE,
            CacheError::Store(_) => StatusCode::BAD_GATEWAY,
            CacheError::Cancelled => StatusCode::REQUEST_TIMEOUT,
        };

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the table cache.
pub type Result<T> = std::result::Result<T, CacheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(CacheError::TableNotFound("t".to_string()).is_fatal());
        assert!(CacheError::SchemaMismatch {
            table: "t".to_string(),
            reason: SchemaViolation::InvalidKeySchema { elements: 2 },
        }
        .is_fatal());
        assert!(!CacheError::Cancelled.is_fatal());
        assert!(!CacheError::Store(StoreError::Unavailable("down".to_string())).is_fatal());
    }

    #[test]
    fn test_error_status_codes() {
        let test_cases = vec![
            (
                CacheError::InvalidRequest("bad".to_string()),
                StatusCode::BAD_REQUEST,
            ),
            (
                CacheError::TableNotFound("t".to_string()),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                CacheError::Store(StoreError::Throttled("slow down".to_string())),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                CacheError::Store(StoreError::Unavailable("down".to_string())),
                StatusCode::BAD_GATEWAY,
            ),
            (CacheError::Cancelled, StatusCode::REQUEST_TIMEOUT),
        ];

        for (error, expected_status) in test_cases {
            let response = error.into_response();
            assert_eq!(response.status(), expected_status);
        }
    }

    #[test]
    fn test_store_error_converts() {
        let err: CacheError = StoreError::ConditionFailed.into();
        assert!(matches!(err, CacheError::Store(StoreError::ConditionFailed)));
    }
}
