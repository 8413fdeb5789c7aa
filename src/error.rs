//! Error types for the SWR cache
//!
//! Provides unified error handling using thiserror.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use crate::models::ErrorResponse;
use thiserror::Error;

// == Storage Error Enum ==
/// Errors raised by a storage adapter.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Backend-specific failure
    #[error("Storage backend error: {0}")]
    Backend(String),

    /// Filesystem failure in a disk-backed adapter
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Stored document could not be encoded or decoded
    #[error("Storage encoding error: {0}")]
    Json(#[from] serde_json::Error),

    /// The adapter has no `remove_item` capability
    #[error("Storage adapter does not support remove_item")]
    RemoveUnsupported,
}

// == Cache Error Enum ==
/// Unified error type for the cache engine and server.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Configuration rejected by the parser
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    /// Storage adapter failure that reached the caller
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// `remove` called on an adapter without `remove_item`
    #[error("Storage adapter does not support remove_item")]
    RemoveUnsupported,

    /// Value could not be converted to or from its stored form
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Producing function failed after exhausting retries
    #[error("Revalidation failed: {0:#}")]
    Producer(anyhow::Error),

    /// Key not found in cache
    #[error("Key not found: {0}")]
    NotFound(String),

    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        CacheError::Serialization(err.to_string())
    }
}

// == IntoResponse Implementation ==
impl IntoResponse for CacheError {
    fn into_response(self) -> Response {
        let status = match &self {
            CacheError::NotFound(_) => StatusCode::NOT_FOUND,
            CacheError::InvalidRequest(_) | CacheError::InvalidConfig(_) => {
                StatusCode::BAD_REQUEST
            }
            CacheError::RemoveUnsupported => StatusCode::METHOD_NOT_ALLOWED,
            CacheError::Producer(_) => StatusCode::BAD_GATEWAY,
            CacheError::Storage(_) | CacheError::Serialization(_) | CacheError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = Json(ErrorResponse::new(self.to_string()));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the cache.
pub type Result<T> = std::result::Result<T, CacheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_error_converts_transparently() {
        let err: CacheError = StorageError::Backend("disk full".to_string()).into();
        assert_eq!(err.to_string(), "Storage backend error: disk full");
    }

    #[test]
    fn test_producer_error_keeps_context_chain() {
        let inner = anyhow::anyhow!("connection refused").context("fetching quote");
        let err = CacheError::Producer(inner);
        let msg = err.to_string();
        assert!(msg.contains("fetching quote"));
        assert!(msg.contains("connection refused"));
    }

    #[test]
    fn test_error_status_codes() {
        let cases = vec![
            (CacheError::NotFound("k".into()), StatusCode::NOT_FOUND),
            (CacheError::InvalidConfig("c".into()), StatusCode::BAD_REQUEST),
            (CacheError::RemoveUnsupported, StatusCode::METHOD_NOT_ALLOWED),
            (
                CacheError::Producer(anyhow::anyhow!("down")),
                StatusCode::BAD_GATEWAY,
            ),
            (
                CacheError::Internal("x".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (error, expected) in cases {
            assert_eq!(error.into_response().status(), expected);
        }
    }
}
