//! Schema definition errors
//!
//! Error codes:
//! - AERO_SCHEMA_INVALID_NAME
//! - AERO_SCHEMA_RESERVED_ATTRIBUTE
//! - AERO_SCHEMA_DUPLICATE_ATTRIBUTE
//! - AERO_SCHEMA_UNKNOWN_ATTRIBUTE
//! - AERO_SCHEMA_DUPLICATE_INDEX
//! - AERO_SCHEMA_INVALID_ENUM
//!
//! All of them are raised while building a `KindSchema`, never at runtime.

use std::fmt;

/// Schema error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaErrorCode {
    /// Kind or index name outside `[A-Za-z0-9_]`, or an empty attribute name
    InvalidName,
    /// Attribute named `type` or `id`
    ReservedAttribute,
    /// Same attribute declared twice
    DuplicateAttribute,
    /// Index over an undeclared attribute
    UnknownAttribute,
    /// Same index name declared twice
    DuplicateIndex,
    /// Empty enumeration or unknown default variant
    InvalidEnum,
}

impl SchemaErrorCode {
    /// Returns the string code
    pub fn code(&self) -> &'static str {
        match self {
            SchemaErrorCode::InvalidName => "AERO_SCHEMA_INVALID_NAME",
            SchemaErrorCode::ReservedAttribute => "AERO_SCHEMA_RESERVED_ATTRIBUTE",
            SchemaErrorCode::DuplicateAttribute => "AERO_SCHEMA_DUPLICATE_ATTRIBUTE",
            SchemaErrorCode::UnknownAttribute => "AERO_SCHEMA_UNKNOWN_ATTRIBUTE",
            SchemaErrorCode::DuplicateIndex => "AERO_SCHEMA_DUPLICATE_INDEX",
            SchemaErrorCode::InvalidEnum => "AERO_SCHEMA_INVALID_ENUM",
        }
    }
}

impl fmt::Display for SchemaErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Schema error with the offending kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaError {
    code: SchemaErrorCode,
    kind: String,
    message: String,
}

impl SchemaError {
    fn new(code: SchemaErrorCode, kind: &str, message: String) -> Self {
        Self {
            code,
            kind: kind.to_string(),
            message,
        }
    }

    pub fn invalid_name(kind: &str, what: &str, name: &str) -> Self {
        Self::new(
            SchemaErrorCode::InvalidName,
            kind,
            format!("Invalid {} name '{}'", what, name),
        )
    }

    pub fn reserved_attribute(kind: &str, name: &str) -> Self {
        Self::new(
            SchemaErrorCode::ReservedAttribute,
            kind,
            format!("Attribute '{}' is reserved", name),
        )
    }

    pub fn duplicate_attribute(kind: &str, name: &str) -> Self {
        Self::new(
            SchemaErrorCode::DuplicateAttribute,
            kind,
            format!("Attribute '{}' declared twice", name),
        )
    }

    pub fn unknown_attribute(kind: &str, index: &str, attribute: &str) -> Self {
        Self::new(
            SchemaErrorCode::UnknownAttribute,
            kind,
            format!("Index '{}' covers undeclared attribute '{}'", index, attribute),
        )
    }

    pub fn duplicate_index(kind: &str, name: &str) -> Self {
        Self::new(
            SchemaErrorCode::DuplicateIndex,
            kind,
            format!("Index '{}' declared twice", name),
        )
    }

    pub fn invalid_enum(kind: &str, name: &str, reason: impl Into<String>) -> Self {
        Self::new(
            SchemaErrorCode::InvalidEnum,
            kind,
            format!("Enumeration '{}': {}", name, reason.into()),
        )
    }

    /// Returns the error code
    pub fn code(&self) -> SchemaErrorCode {
        self.code
    }

    /// Returns the kind being defined
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Returns the error message
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for SchemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [kind {}]: {}", self.code.code(), self.kind, self.message)
    }
}

impl std::error::Error for SchemaError {}

/// Result type for schema operations
pub type SchemaResult<T> = Result<T, SchemaError>;
