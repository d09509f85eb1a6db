//! Document id generation
//!
//! Ids are short, roughly time-ordered and collision resistant. The
//! generator never checks for collisions; `add` in the store is the only
//! backstop.

mod generator;
pub mod radix;

pub use generator::{IdNumeral, TimeRandomIdGenerator, EPOCH_OFFSET_SECS};
pub use radix::{decode_base65, encode_base65};

/// Source of fresh document ids. Must never block.
pub trait IdGenerator: Send + Sync {
    /// Returns `"<kind>-<suffix>"`.
    fn next(&self, kind: &str) -> String;
}
