//! Secondary indexes over a key-value store
//!
//! The store has no secondary indexes, so each index value is materialized
//! as a pointer record keyed by the kind, the index name and the indexed
//! values, holding the owning document id.
//!
//! # Invariants
//!
//! - At most one live pointer per value combination (advisory)
//! - Pointers are written after the document, released before it
//! - A pointer naming a missing document is deleted when read
//! - Pointer failures never fail the document operation

mod engine;
mod errors;
mod key;

pub use engine::{IndexEngine, PreviousKeys};
pub use errors::{IndexError, IndexResult};
pub use key::{index_def, pointer_key_for};
