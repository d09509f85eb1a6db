//! Time plus random document ids
//!
//! `<kind>-<base65(timestamp ‖ tail)>` where the timestamp is microseconds
//! since 2016-01-01T12:00:00Z and the tail a random 4-digit number.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use rand::Rng;

use super::radix::{decode_base65, encode_base65};
use super::IdGenerator;

/// Seconds between the Unix epoch and the id epoch
pub const EPOCH_OFFSET_SECS: u64 = 1_451_649_600;

/// Tail range, inclusive
const TAIL_MIN: u64 = 1;
const TAIL_MAX: u64 = 9_999;
const TAIL_SPAN: u128 = 10_000;

/// Last timestamp handed out anywhere in the process
static LAST_MICROS: AtomicU64 = AtomicU64::new(0);

fn wall_micros() -> u64 {
    let since_epoch = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_micros() as u64)
        .unwrap_or(0);
    since_epoch.saturating_sub(EPOCH_OFFSET_SECS * 1_000_000)
}

/// Strictly increasing microsecond clock shared by every generator.
fn next_micros() -> u64 {
    let now = wall_micros();
    let mut last = LAST_MICROS.load(Ordering::Relaxed);
    loop {
        let candidate = if now > last { now } else { last + 1 };
        match LAST_MICROS.compare_exchange_weak(last, candidate, Ordering::AcqRel, Ordering::Relaxed) {
            Ok(_) => return candidate,
            Err(observed) => last = observed,
        }
    }
}

/// Decoded components of a generated id
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdNumeral {
    /// Microseconds since the id epoch
    pub timestamp_micros: u64,
    pub tail: u16,
}

/// Default generator. Stateless; all instances share the process clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct TimeRandomIdGenerator;

impl TimeRandomIdGenerator {
    pub fn new() -> Self {
        Self
    }

    /// Builds the numeral for one id.
    fn numeral(&self) -> u128 {
        let timestamp = next_micros() as u128;
        let tail = rand::thread_rng().gen_range(TAIL_MIN..=TAIL_MAX) as u128;
        timestamp * TAIL_SPAN + tail
    }

    /// Splits an id produced by this generator into timestamp and tail.
    ///
    /// Returns `None` if the id has no `-` separator or the suffix is not
    /// a base-65 numeral.
    pub fn decode_numeral(id: &str) -> Option<IdNumeral> {
        // Kind names never contain '-', the encoded suffix may
        let (_, encoded) = id.split_once('-')?;
        let numeral = decode_base65(encoded)?;
        let timestamp = u64::try_from(numeral / TAIL_SPAN).ok()?;
        Some(IdNumeral {
            timestamp_micros: timestamp,
            tail: (numeral % TAIL_SPAN) as u16,
        })
    }
}

impl IdGenerator for TimeRandomIdGenerator {
    fn next(&self, kind: &str) -> String {
        format!("{}-{}", kind, encode_base65(self.numeral()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_id_shape() {
        let id = TimeRandomIdGenerator::new().next("User");
        let (kind, encoded) = id.split_once('-').unwrap();
        assert_eq!(kind, "User");
        assert!(!encoded.is_empty());
        assert!(encoded
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_' || b == b'~'));
    }

    #[test]
    fn test_decode_numeral() {
        let before = wall_micros();
        let id = TimeRandomIdGenerator::new().next("Post");
        let parts = TimeRandomIdGenerator::decode_numeral(&id).unwrap();

        assert!(parts.timestamp_micros >= before);
        assert!((1..=9_999).contains(&parts.tail));
    }

    #[test]
    fn test_clock_strictly_increases() {
        let mut previous = next_micros();
        for _ in 0..10_000 {
            let next = next_micros();
            assert!(next > previous);
            previous = next;
        }
    }

    #[test]
    fn test_sequential_ids_distinct() {
        let generator = TimeRandomIdGenerator::new();
        let ids: HashSet<String> = (0..5_000).map(|_| generator.next("Doc")).collect();
        assert_eq!(ids.len(), 5_000);
    }

    #[test]
    fn test_decode_rejects_foreign_ids() {
        assert!(TimeRandomIdGenerator::decode_numeral("nodash").is_none());
        assert!(TimeRandomIdGenerator::decode_numeral("User-a b").is_none());
    }
}
