//! Attribute validation
//!
//! Validation never mutates the document and is deterministic for the
//! same attribute map. Uniqueness is checked by the index engine and
//! reported through the same `ValidationErrors`.

use std::fmt;

use serde_json::{Map, Value};

use super::kind::KindSchema;

/// Message recorded for a missing required attribute
pub const BLANK_MESSAGE: &str = "can't be blank";

/// Message recorded for a unique index violation
pub const TAKEN_MESSAGE: &str = "has already been taken";

/// One violation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Attribute or index name the violation is reported on
    pub attribute: String,
    pub message: String,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.attribute, self.message)
    }
}

/// Ordered list of violations. Empty means valid.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    errors: Vec<ValidationError>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, attribute: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ValidationError {
            attribute: attribute.into(),
            message: message.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ValidationError> {
        self.errors.iter()
    }

    /// Messages recorded against `attribute`
    pub fn on(&self, attribute: &str) -> Vec<&str> {
        self.errors
            .iter()
            .filter(|e| e.attribute == attribute)
            .map(|e| e.message.as_str())
            .collect()
    }

    pub fn merge(&mut self, other: ValidationErrors) {
        self.errors.extend(other.errors);
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, error) in self.errors.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{}", error)?;
        }
        Ok(())
    }
}

/// Checks declared constraints of `schema` against `attributes`.
pub fn validate_attributes(schema: &KindSchema, attributes: &Map<String, Value>) -> ValidationErrors {
    let mut errors = ValidationErrors::new();
    for def in schema.attributes().iter().filter(|a| a.required) {
        if is_blank(attributes.get(&def.name)) {
            errors.add(def.name.clone(), BLANK_MESSAGE);
        }
    }
    errors
}

/// Absent, null, whitespace-only strings and empty containers are blank.
pub fn is_blank(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        Some(Value::Array(a)) => a.is_empty(),
        Some(Value::Object(o)) => o.is_empty(),
        Some(_) => false,
    }
}
