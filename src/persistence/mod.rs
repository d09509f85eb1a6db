//! Document persistence
//!
//! [`PersistenceController`] runs the create/update/destroy/load protocol
//! over a [`DocumentStore`](crate::store::DocumentStore) and keeps the
//! kind's secondary indexes in step through the index engine.
//!
//! # Error taxonomy
//!
//! - validation failure: `Ok(SaveOutcome::Rejected)`, not an error
//! - Conflict, DuplicateKey, NotFound, Timeout: operation failed
//! - Destroyed, NotPersisted, KindMismatch, AttributeInvalid, UnknownIndex:
//!   caller error
//! - StoreUnavailable, StoreCorruption: fatal
//!
//! Stale index pointers are healed silently and never surface.

mod controller;
mod errors;
mod outcome;

pub use controller::PersistenceController;
pub use errors::{PersistenceError, PersistenceErrorCode, PersistenceResult, Severity};
pub use outcome::{DestroyOptions, LoadOptions, SaveOptions, SaveOutcome};
