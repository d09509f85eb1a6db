//! Index errors

use thiserror::Error;

use crate::document::DocumentError;
use crate::store::StoreError;

/// Result type for index operations
pub type IndexResult<T> = Result<T, IndexError>;

/// Errors raised by the index engine
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IndexError {
    #[error("Kind {kind} has no index named '{index}'")]
    UnknownIndex { kind: String, index: String },

    #[error("Index '{index}' takes {expected} values, got {got}")]
    Arity {
        index: String,
        expected: usize,
        got: usize,
    },

    #[error("Pointer {key} still contended after {attempts} attempts")]
    Contention { key: String, attempts: u32 },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Document(#[from] DocumentError),
}
