//! Document errors

use thiserror::Error;

/// Result type for document operations
pub type DocumentResult<T> = Result<T, DocumentError>;

/// Errors raised by attribute access and loading
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DocumentError {
    #[error("Document {id} is destroyed and frozen")]
    Frozen { id: String },

    #[error("Unknown attribute '{name}' for kind {kind}")]
    UnknownAttribute { kind: String, name: String },

    #[error("Attribute '{name}' is reserved")]
    ReservedAttribute { name: String },

    #[error("Invalid value for '{name}': {reason}")]
    InvalidValue { name: String, reason: String },

    #[error("Id of {id} cannot change once persisted")]
    IdImmutable { id: String },

    #[error("Stored document {key} has type {found:?}, expected {expected}")]
    KindMismatch {
        key: String,
        expected: String,
        found: Option<String>,
    },

    #[error("Stored value for {key} is not a JSON object")]
    NotAnObject { key: String },
}
