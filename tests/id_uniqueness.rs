//! Id Generator Tests
//!
//! Tests for generated document ids:
//! - Ids from many threads never collide
//! - Ids are `<kind>-<base65>` and decode back to timestamp and tail
//! - Ids from one thread are time ordered

use std::collections::HashSet;
use std::sync::Arc;
use std::thread;

use aerodoc::id::{decode_base65, IdGenerator, TimeRandomIdGenerator};

const THREADS: usize = 4;
const IDS_PER_THREAD: usize = 10_000;

// =============================================================================
// Uniqueness
// =============================================================================

/// 4 threads x 10,000 ids: all distinct.
#[test]
fn test_concurrent_ids_distinct() {
    let generator: Arc<dyn IdGenerator> = Arc::new(TimeRandomIdGenerator::new());

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let generator = Arc::clone(&generator);
            thread::spawn(move || {
                (0..IDS_PER_THREAD)
                    .map(|_| generator.next("User"))
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let mut all = HashSet::new();
    for handle in handles {
        for id in handle.join().unwrap() {
            assert!(all.insert(id.clone()), "duplicate id {}", id);
        }
    }
    assert_eq!(all.len(), THREADS * IDS_PER_THREAD);
}

/// Separate generator instances share the clock.
#[test]
fn test_independent_generators_distinct() {
    let a = TimeRandomIdGenerator::new();
    let b = TimeRandomIdGenerator::new();
    let ids: HashSet<String> = (0..2_000)
        .flat_map(|_| [a.next("Doc"), b.next("Doc")])
        .collect();
    assert_eq!(ids.len(), 4_000);
}

// =============================================================================
// Format
// =============================================================================

/// Prefix, alphabet and decoding.
#[test]
fn test_id_format() {
    let id = TimeRandomIdGenerator::new().next("Invoice");
    let suffix = id.strip_prefix("Invoice-").unwrap();

    assert!(suffix
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '~'));
    assert!(decode_base65(suffix).is_some());

    let parts = TimeRandomIdGenerator::decode_numeral(&id).unwrap();
    assert!((1..=9_999).contains(&parts.tail));
    // Years of microseconds since the id epoch
    assert!(parts.timestamp_micros > 1_000_000_000_000);
}

/// Timestamps decoded from one thread's ids strictly increase.
#[test]
fn test_ids_time_ordered_within_thread() {
    let generator = TimeRandomIdGenerator::new();
    let stamps: Vec<u64> = (0..1_000)
        .map(|_| {
            let id = generator.next("Log");
            TimeRandomIdGenerator::decode_numeral(&id)
                .unwrap()
                .timestamp_micros
        })
        .collect();
    assert!(stamps.windows(2).all(|w| w[0] < w[1]));
}
