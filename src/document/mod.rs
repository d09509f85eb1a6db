//! In-memory documents
//!
//! A `Document` carries its kind schema, identity, attribute map, the
//! previous value of every attribute changed since the last load or save,
//! and the storage metadata of the last successful round-trip.
//!
//! State is derived from metadata:
//!
//! | state     | key     | cas     |
//! |-----------|---------|---------|
//! | new       | absent  | absent  |
//! | persisted | present | present |
//! | destroyed | absent  | present |

mod entity;
mod errors;

pub use entity::{Document, Metadata};
pub use errors::{DocumentError, DocumentResult};
