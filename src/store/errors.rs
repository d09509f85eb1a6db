//! Store errors

use thiserror::Error;

use super::cas::Cas;

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors returned by [`DocumentStore`](super::DocumentStore) operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("Key not found: {key}")]
    NotFound { key: String },

    #[error("Key already exists: {key}")]
    DuplicateKey { key: String },

    #[error("CAS mismatch on {key}: expected {expected}, current {current}")]
    Conflict {
        key: String,
        expected: Cas,
        current: Cas,
    },

    #[error("{op} on {key} timed out after {elapsed_ms}ms (limit {limit_ms}ms)")]
    Timeout {
        op: &'static str,
        key: String,
        elapsed_ms: u64,
        limit_ms: u64,
    },

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Store corruption: {0}")]
    Corruption(String),

    #[error("Store I/O error: {0}")]
    Io(String),
}

impl StoreError {
    /// Environment failures that the core propagates unchanged
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            StoreError::Unavailable(_) | StoreError::Corruption(_) | StoreError::Io(_)
        )
    }

    /// The key the failed operation targeted, if any
    pub fn key(&self) -> Option<&str> {
        match self {
            StoreError::NotFound { key }
            | StoreError::DuplicateKey { key }
            | StoreError::Conflict { key, .. }
            | StoreError::Timeout { key, .. } => Some(key),
            _ => None,
        }
    }
}
