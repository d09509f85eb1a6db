//! Save outcomes and per-call options

use crate::schema::ValidationErrors;

/// Successful result of a save, or its validation refusal
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    /// New document added to the store
    Created,
    /// Existing document replaced
    Updated,
    /// Nothing was dirty; the store was not touched
    Unchanged,
    /// Validation failed; the store was not touched
    Rejected(ValidationErrors),
}

impl SaveOutcome {
    /// True for every outcome except `Rejected`
    pub fn is_saved(&self) -> bool {
        !self.is_rejected()
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, SaveOutcome::Rejected(_))
    }

    pub fn violations(&self) -> Option<&ValidationErrors> {
        match self {
            SaveOutcome::Rejected(errors) => Some(errors),
            _ => None,
        }
    }
}

/// Options for one save
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaveOptions {
    /// Run attribute and uniqueness validation
    pub validate: bool,
}

impl Default for SaveOptions {
    fn default() -> Self {
        Self { validate: true }
    }
}

impl SaveOptions {
    pub fn without_validation() -> Self {
        Self { validate: false }
    }
}

/// Options for loading documents
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadOptions {
    /// Accept a stored `type` different from the kind's discriminator
    pub ignore_kind: bool,
}

impl LoadOptions {
    pub fn ignore_kind() -> Self {
        Self { ignore_kind: true }
    }
}

/// Options for one destroy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DestroyOptions {
    /// Delete only if the stored CAS still equals the held one
    pub with_cas: bool,
}

impl DestroyOptions {
    pub fn with_cas() -> Self {
        Self { with_cas: true }
    }
}
