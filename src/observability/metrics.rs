//! Metrics registry
//!
//! - Counters only
//! - Monotonic increase, reset only on construction
//! - Thread-safe, Relaxed ordering

use std::sync::atomic::{AtomicU64, Ordering};

/// Operational counters for the persistence and index protocol.
///
/// One registry is shared (via `Arc`) by a controller and its index engine.
#[derive(Debug, Default)]
pub struct MetricsRegistry {
    creates: AtomicU64,
    updates: AtomicU64,
    unchanged_saves: AtomicU64,
    rejected_saves: AtomicU64,
    destroys: AtomicU64,
    conflicts: AtomicU64,
    duplicate_keys: AtomicU64,
    id_retries: AtomicU64,
    timeouts: AtomicU64,
    pointer_writes: AtomicU64,
    pointer_releases: AtomicU64,
    pointers_healed: AtomicU64,
    pointer_failures: AtomicU64,
}

macro_rules! counter {
    ($inc:ident, $field:ident, $doc:literal) => {
        #[doc = $doc]
        pub fn $inc(&self) {
            self.$field.fetch_add(1, Ordering::Relaxed);
        }
    };
}

impl MetricsRegistry {
    /// Create a new metrics registry with all counters at zero
    pub fn new() -> Self {
        Self::default()
    }

    counter!(increment_creates, creates, "Increment successful creates");
    counter!(increment_updates, updates, "Increment successful updates");
    counter!(increment_unchanged, unchanged_saves, "Increment saves skipped because nothing was dirty");
    counter!(increment_rejected, rejected_saves, "Increment saves refused by validation");
    counter!(increment_destroys, destroys, "Increment destroyed/deleted documents");
    counter!(increment_conflicts, conflicts, "Increment CAS conflicts");
    counter!(increment_duplicate_keys, duplicate_keys, "Increment duplicate keys on add");
    counter!(increment_id_retries, id_retries, "Increment generated-id retries");
    counter!(increment_timeouts, timeouts, "Increment store timeouts");
    counter!(increment_pointer_writes, pointer_writes, "Increment pointer records written");
    counter!(increment_pointer_releases, pointer_releases, "Increment pointer records removed");
    counter!(increment_pointers_healed, pointers_healed, "Increment stale pointers healed on read");
    counter!(increment_pointer_failures, pointer_failures, "Increment pointer maintenance failures");

    /// Get current snapshot of all metrics as JSON
    pub fn to_json(&self) -> String {
        let s = self.snapshot();
        format!(
            r#"{{"creates":{},"updates":{},"unchanged_saves":{},"rejected_saves":{},"destroys":{},"conflicts":{},"duplicate_keys":{},"id_retries":{},"timeouts":{},"pointer_writes":{},"pointer_releases":{},"pointers_healed":{},"pointer_failures":{}}}"#,
            s.creates,
            s.updates,
            s.unchanged_saves,
            s.rejected_saves,
            s.destroys,
            s.conflicts,
            s.duplicate_keys,
            s.id_retries,
            s.timeouts,
            s.pointer_writes,
            s.pointer_releases,
            s.pointers_healed,
            s.pointer_failures,
        )
    }

    /// Get all metrics as a snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            creates: self.creates.load(Ordering::Relaxed),
            updates: self.updates.load(Ordering::Relaxed),
            unchanged_saves: self.unchanged_saves.load(Ordering::Relaxed),
            rejected_saves: self.rejected_saves.load(Ordering::Relaxed),
            destroys: self.destroys.load(Ordering::Relaxed),
            conflicts: self.conflicts.load(Ordering::Relaxed),
            duplicate_keys: self.duplicate_keys.load(Ordering::Relaxed),
            id_retries: self.id_retries.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
            pointer_writes: self.pointer_writes.load(Ordering::Relaxed),
            pointer_releases: self.pointer_releases.load(Ordering::Relaxed),
            pointers_healed: self.pointers_healed.load(Ordering::Relaxed),
            pointer_failures: self.pointer_failures.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time snapshot of all metrics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub creates: u64,
    pub updates: u64,
    pub unchanged_saves: u64,
    pub rejected_saves: u64,
    pub destroys: u64,
    pub conflicts: u64,
    pub duplicate_keys: u64,
    pub id_retries: u64,
    pub timeouts: u64,
    pub pointer_writes: u64,
    pub pointer_releases: u64,
    pub pointers_healed: u64,
    pub pointer_failures: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_registry_is_zero() {
        assert_eq!(MetricsRegistry::new().snapshot(), MetricsSnapshot::default());
    }

    #[test]
    fn test_increment_counters() {
        let registry = MetricsRegistry::new();
        registry.increment_creates();
        registry.increment_creates();
        registry.increment_conflicts();
        registry.increment_pointers_healed();

        let snapshot = registry.snapshot();
        assert_eq!(snapshot.creates, 2);
        assert_eq!(snapshot.conflicts, 1);
        assert_eq!(snapshot.pointers_healed, 1);
        assert_eq!(snapshot.updates, 0);
    }

    #[test]
    fn test_to_json() {
        let registry = MetricsRegistry::new();
        registry.increment_duplicate_keys();

        let parsed: serde_json::Value = serde_json::from_str(&registry.to_json()).unwrap();
        assert_eq!(parsed["duplicate_keys"], 1);
        assert_eq!(parsed["creates"], 0);
    }

    #[test]
    fn test_thread_safety() {
        use std::sync::Arc;
        use std::thread;

        let registry = Arc::new(MetricsRegistry::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let reg = Arc::clone(&registry);
                thread::spawn(move || {
                    for _ in 0..100 {
                        reg.increment_pointer_writes();
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(registry.snapshot().pointer_writes, 800);
    }
}
