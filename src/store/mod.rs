//! Document store boundary
//!
//! The key-value backend supports exactly four single-key operations:
//!
//! - `get(key)`: value + CAS, or absent when `quiet`
//! - `add(key, value)`: create-if-absent, DuplicateKey otherwise
//! - `replace(key, value, cas)`: Conflict when the CAS is stale
//! - `delete(key, [cas])`: NotFound when absent
//!
//! Every successful mutation returns a fresh CAS. There are no multi-key
//! operations; documents and index pointers are written with independent
//! round-trips.
//!
//! # Implementations
//!
//! - [`MemoryStore`]: shared in-process map, with latency and outage
//!   injection for exercising timeouts and fatal paths
//! - [`FileStore`]: append-only checksummed log replayed on open

mod cas;
mod errors;
mod file;
mod memory;
mod options;

pub use cas::Cas;
pub use errors::{StoreError, StoreResult};
pub use file::FileStore;
pub use memory::MemoryStore;
pub use options::{Deadline, StoreOptions};

use serde_json::Value;

/// A value read from the store together with its current CAS.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredEntry {
    /// Storage key
    pub key: String,
    /// Stored JSON value (document object or pointer string)
    pub value: Value,
    /// CAS of the stored value
    pub cas: Cas,
}

/// The key-value backend.
///
/// Implementations must be safe to share between threads; each call is
/// atomic for its single key only.
pub trait DocumentStore: Send + Sync {
    /// Reads `key`. Absent keys are `Err(NotFound)` unless `opts.quiet`,
    /// in which case they are `Ok(None)`.
    fn get(&self, key: &str, opts: &StoreOptions) -> StoreResult<Option<StoredEntry>>;

    /// Creates `key`. Fails with DuplicateKey if the key exists.
    fn add(&self, key: &str, value: &Value, opts: &StoreOptions) -> StoreResult<Cas>;

    /// Overwrites `key` if its current CAS equals `cas`.
    fn replace(&self, key: &str, value: &Value, cas: Cas, opts: &StoreOptions)
        -> StoreResult<Cas>;

    /// Removes `key`, optionally only if its current CAS equals `cas`.
    fn delete(&self, key: &str, cas: Option<Cas>, opts: &StoreOptions) -> StoreResult<()>;
}

/// Resolves a missing key according to `opts.quiet`.
pub(crate) fn absent(key: &str, opts: &StoreOptions) -> StoreResult<Option<StoredEntry>> {
    if opts.quiet {
        Ok(None)
    } else {
        Err(StoreError::NotFound {
            key: key.to_string(),
        })
    }
}
