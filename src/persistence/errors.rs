//! Persistence errors
//!
//! Error codes:
//! - AERO_DOC_RECORD_INVALID (REJECT)
//! - AERO_DOC_DESTROYED (REJECT)
//! - AERO_DOC_NOT_PERSISTED (REJECT)
//! - AERO_DOC_KIND_MISMATCH (REJECT)
//! - AERO_DOC_ATTRIBUTE_INVALID (REJECT)
//! - AERO_DOC_UNKNOWN_INDEX (REJECT)
//! - AERO_DOC_CONFLICT (ERROR)
//! - AERO_DOC_DUPLICATE_KEY (ERROR)
//! - AERO_DOC_NOT_FOUND (ERROR)
//! - AERO_DOC_TIMEOUT (ERROR)
//! - AERO_DOC_STORE_UNAVAILABLE (FATAL)
//! - AERO_DOC_STORE_CORRUPTION (FATAL)

use std::fmt;

use crate::document::DocumentError;
use crate::index::IndexError;
use crate::schema::ValidationErrors;
use crate::store::StoreError;

/// Severity levels for persistence errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Caller error, nothing changed
    Reject,
    /// Operation failed, process continues
    Error,
    /// Store environment is broken
    Fatal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Reject => write!(f, "REJECT"),
            Severity::Error => write!(f, "ERROR"),
            Severity::Fatal => write!(f, "FATAL"),
        }
    }
}

/// Persistence error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistenceErrorCode {
    RecordInvalid,
    Conflict,
    DuplicateKey,
    NotFound,
    Destroyed,
    NotPersisted,
    Timeout,
    KindMismatch,
    AttributeInvalid,
    UnknownIndex,
    StoreUnavailable,
    StoreCorruption,
}

impl PersistenceErrorCode {
    /// Returns the string code
    pub fn code(&self) -> &'static str {
        match self {
            PersistenceErrorCode::RecordInvalid => "AERO_DOC_RECORD_INVALID",
            PersistenceErrorCode::Conflict => "AERO_DOC_CONFLICT",
            PersistenceErrorCode::DuplicateKey => "AERO_DOC_DUPLICATE_KEY",
            PersistenceErrorCode::NotFound => "AERO_DOC_NOT_FOUND",
            PersistenceErrorCode::Destroyed => "AERO_DOC_DESTROYED",
            PersistenceErrorCode::NotPersisted => "AERO_DOC_NOT_PERSISTED",
            PersistenceErrorCode::Timeout => "AERO_DOC_TIMEOUT",
            PersistenceErrorCode::KindMismatch => "AERO_DOC_KIND_MISMATCH",
            PersistenceErrorCode::AttributeInvalid => "AERO_DOC_ATTRIBUTE_INVALID",
            PersistenceErrorCode::UnknownIndex => "AERO_DOC_UNKNOWN_INDEX",
            PersistenceErrorCode::StoreUnavailable => "AERO_DOC_STORE_UNAVAILABLE",
            PersistenceErrorCode::StoreCorruption => "AERO_DOC_STORE_CORRUPTION",
        }
    }

    /// Returns the severity level for this error
    pub fn severity(&self) -> Severity {
        match self {
            PersistenceErrorCode::RecordInvalid
            | PersistenceErrorCode::Destroyed
            | PersistenceErrorCode::NotPersisted
            | PersistenceErrorCode::KindMismatch
            | PersistenceErrorCode::AttributeInvalid
            | PersistenceErrorCode::UnknownIndex => Severity::Reject,
            PersistenceErrorCode::Conflict
            | PersistenceErrorCode::DuplicateKey
            | PersistenceErrorCode::NotFound
            | PersistenceErrorCode::Timeout => Severity::Error,
            PersistenceErrorCode::StoreUnavailable | PersistenceErrorCode::StoreCorruption => {
                Severity::Fatal
            }
        }
    }
}

impl fmt::Display for PersistenceErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Persistence error with the affected key and, for invalid records, the
/// validation failures
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistenceError {
    code: PersistenceErrorCode,
    message: String,
    key: Option<String>,
    violations: Option<ValidationErrors>,
}

impl PersistenceError {
    fn new(code: PersistenceErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            key: None,
            violations: None,
        }
    }

    fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Save refused by validation (strict saves only)
    pub fn record_invalid(kind: &str, violations: ValidationErrors) -> Self {
        let mut err = Self::new(
            PersistenceErrorCode::RecordInvalid,
            format!("{} is invalid: {}", kind, violations),
        );
        err.violations = Some(violations);
        err
    }

    pub fn destroyed(key: Option<&str>) -> Self {
        let err = Self::new(PersistenceErrorCode::Destroyed, "Document has been destroyed");
        match key {
            Some(key) => err.with_key(key),
            None => err,
        }
    }

    pub fn not_persisted(kind: &str) -> Self {
        Self::new(
            PersistenceErrorCode::NotPersisted,
            format!("{} document has never been saved", kind),
        )
    }

    pub fn not_found(key: &str) -> Self {
        Self::new(PersistenceErrorCode::NotFound, format!("No document at {}", key)).with_key(key)
    }

    /// Returns the error code
    pub fn code(&self) -> PersistenceErrorCode {
        self.code
    }

    /// Returns the severity level
    pub fn severity(&self) -> Severity {
        self.code.severity()
    }

    /// Returns the error message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the storage key involved, if any
    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    /// Returns the validation failures of a RecordInvalid error
    pub fn violations(&self) -> Option<&ValidationErrors> {
        self.violations.as_ref()
    }

    /// Returns whether this is a fatal error
    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }
}

impl fmt::Display for PersistenceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.code.severity(), self.code.code(), self.message)
    }
}

impl std::error::Error for PersistenceError {}

impl From<StoreError> for PersistenceError {
    fn from(err: StoreError) -> Self {
        let code = match &err {
            StoreError::NotFound { .. } => PersistenceErrorCode::NotFound,
            StoreError::DuplicateKey { .. } => PersistenceErrorCode::DuplicateKey,
            StoreError::Conflict { .. } => PersistenceErrorCode::Conflict,
            StoreError::Timeout { .. } => PersistenceErrorCode::Timeout,
            StoreError::Unavailable(_) | StoreError::Io(_) => PersistenceErrorCode::StoreUnavailable,
            StoreError::Corruption(_) => PersistenceErrorCode::StoreCorruption,
        };
        let key = err.key().map(str::to_string);
        let mut mapped = Self::new(code, err.to_string());
        mapped.key = key;
        mapped
    }
}

impl From<DocumentError> for PersistenceError {
    fn from(err: DocumentError) -> Self {
        let code = match &err {
            DocumentError::Frozen { .. } => PersistenceErrorCode::Destroyed,
            DocumentError::KindMismatch { .. } | DocumentError::NotAnObject { .. } => {
                PersistenceErrorCode::KindMismatch
            }
            DocumentError::UnknownAttribute { .. }
            | DocumentError::ReservedAttribute { .. }
            | DocumentError::InvalidValue { .. }
            | DocumentError::IdImmutable { .. } => PersistenceErrorCode::AttributeInvalid,
        };
        Self::new(code, err.to_string())
    }
}

impl From<IndexError> for PersistenceError {
    fn from(err: IndexError) -> Self {
        match err {
            IndexError::Store(e) => e.into(),
            IndexError::Document(e) => e.into(),
            IndexError::UnknownIndex { .. } => {
                Self::new(PersistenceErrorCode::UnknownIndex, err.to_string())
            }
            IndexError::Arity { .. } => {
                Self::new(PersistenceErrorCode::AttributeInvalid, err.to_string())
            }
            IndexError::Contention { ref key, .. } => {
                let key = key.clone();
                Self::new(PersistenceErrorCode::Conflict, err.to_string()).with_key(key)
            }
        }
    }
}

/// Result type for persistence operations
pub type PersistenceResult<T> = Result<T, PersistenceError>;
