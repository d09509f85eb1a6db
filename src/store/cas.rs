//! CAS tokens

use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque compare-and-swap token.
///
/// Stores hand out strictly increasing tokens, but callers must only ever
/// compare them for equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Cas(u64);

impl Cas {
    /// Wraps a raw token value.
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw token value.
    pub const fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for Cas {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}
