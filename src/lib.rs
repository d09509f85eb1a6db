//! aerodoc - documents, secondary indexes and unique ids over a key-value store
//!
//! The backing store offers single-key get/add/replace/delete with a CAS
//! token and nothing else. On top of it:
//!
//! - `persistence`: optimistic-concurrency document lifecycle
//! - `index`: pointer records for equality lookup and uniqueness
//! - `id`: roughly time-ordered, collision-resistant ids

pub mod config;
pub mod document;
pub mod id;
pub mod index;
pub mod observability;
pub mod persistence;
pub mod schema;
pub mod store;
