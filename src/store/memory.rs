//! In-process document store
//!
//! A `Mutex<HashMap>` with a shared CAS counter. Latency and outage can be
//! injected to exercise the timeout and fatal paths of callers.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use serde_json::Value;

use super::cas::Cas;
use super::errors::{StoreError, StoreResult};
use super::options::{Deadline, StoreOptions};
use super::{absent, DocumentStore, StoredEntry};

#[derive(Debug, Clone)]
struct Slot {
    value: Value,
    cas: Cas,
}

/// Shared in-memory store.
#[derive(Debug)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Slot>>,
    next_cas: AtomicU64,
    latency_micros: AtomicU64,
    available: AtomicBool,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            next_cas: AtomicU64::new(1),
            latency_micros: AtomicU64::new(0),
            available: AtomicBool::new(true),
        }
    }

    /// Delays every round-trip by `latency` before it is applied.
    pub fn set_latency(&self, latency: Duration) {
        self.latency_micros
            .store(latency.as_micros() as u64, Ordering::Relaxed);
    }

    /// Makes every round-trip fail with Unavailable while `false`.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::Relaxed);
    }

    /// Number of keys currently stored (documents and pointers).
    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    /// Returns true if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sorted list of stored keys.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .entries
            .lock()
            .map(|e| e.keys().cloned().collect())
            .unwrap_or_default();
        keys.sort();
        keys
    }

    fn begin(&self, op: &'static str, key: &str, opts: &StoreOptions) -> StoreResult<MutexGuard<'_, HashMap<String, Slot>>> {
        let deadline = Deadline::start(opts);

        if !self.available.load(Ordering::Relaxed) {
            return Err(StoreError::Unavailable(format!("{} {}: memory store offline", op, key)));
        }

        let latency = self.latency_micros.load(Ordering::Relaxed);
        if latency > 0 {
            thread::sleep(Duration::from_micros(latency));
        }

        let guard = self
            .entries
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".into()))?;

        deadline.check(op, key)?;
        Ok(guard)
    }

    fn fresh_cas(&self) -> Cas {
        Cas::new(self.next_cas.fetch_add(1, Ordering::Relaxed))
    }
}

impl DocumentStore for MemoryStore {
    fn get(&self, key: &str, opts: &StoreOptions) -> StoreResult<Option<StoredEntry>> {
        let entries = self.begin("get", key, opts)?;
        match entries.get(key) {
            Some(slot) => Ok(Some(StoredEntry {
                key: key.to_string(),
                value: slot.value.clone(),
                cas: slot.cas,
            })),
            None => absent(key, opts),
        }
    }

    fn add(&self, key: &str, value: &Value, opts: &StoreOptions) -> StoreResult<Cas> {
        let mut entries = self.begin("add", key, opts)?;
        if entries.contains_key(key) {
            return Err(StoreError::DuplicateKey {
                key: key.to_string(),
            });
        }
        let cas = self.fresh_cas();
        entries.insert(
            key.to_string(),
            Slot {
                value: value.clone(),
                cas,
            },
        );
        Ok(cas)
    }

    fn replace(&self, key: &str, value: &Value, cas: Cas, opts: &StoreOptions) -> StoreResult<Cas> {
        let mut entries = self.begin("replace", key, opts)?;
        let current = entries.get(key).map(|slot| slot.cas).ok_or_else(|| StoreError::NotFound {
            key: key.to_string(),
        })?;
        if current != cas {
            return Err(StoreError::Conflict {
                key: key.to_string(),
                expected: cas,
                current,
            });
        }
        let fresh = self.fresh_cas();
        entries.insert(
            key.to_string(),
            Slot {
                value: value.clone(),
                cas: fresh,
            },
        );
        Ok(fresh)
    }

    fn delete(&self, key: &str, cas: Option<Cas>, opts: &StoreOptions) -> StoreResult<()> {
        let mut entries = self.begin("delete", key, opts)?;
        let current = entries.get(key).map(|slot| slot.cas).ok_or_else(|| StoreError::NotFound {
            key: key.to_string(),
        })?;
        if let Some(expected) = cas {
            if expected != current {
                return Err(StoreError::Conflict {
                    key: key.to_string(),
                    expected,
                    current,
                });
            }
        }
        entries.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;

    fn opts() -> StoreOptions {
        StoreOptions::new()
    }

    #[test]
    fn test_add_then_get() {
        let store = MemoryStore::new();
        let cas = store.add("User-1", &json!({"name": "joe"}), &opts()).unwrap();

        let entry = store.get("User-1", &opts()).unwrap().unwrap();
        assert_eq!(entry.cas, cas);
        assert_eq!(entry.value["name"], "joe");
    }

    #[test]
    fn test_add_existing_is_duplicate() {
        let store = MemoryStore::new();
        store.add("k", &json!(1), &opts()).unwrap();

        let err = store.add("k", &json!(2), &opts()).unwrap_err();
        assert!(matches!(err, StoreError::DuplicateKey { .. }));
        assert_eq!(store.get("k", &opts()).unwrap().unwrap().value, json!(1));
    }

    #[test]
    fn test_get_missing_loud_and_quiet() {
        let store = MemoryStore::new();
        assert!(matches!(
            store.get("nope", &opts()),
            Err(StoreError::NotFound { .. })
        ));
        assert!(store.get("nope", &opts().quiet()).unwrap().is_none());
    }

    #[test]
    fn test_replace_requires_current_cas() {
        let store = MemoryStore::new();
        let first = store.add("k", &json!("a"), &opts()).unwrap();
        let second = store.replace("k", &json!("b"), first, &opts()).unwrap();
        assert_ne!(first, second);

        let err = store.replace("k", &json!("c"), first, &opts()).unwrap_err();
        assert!(matches!(err, StoreError::Conflict { .. }));
        assert_eq!(store.get("k", &opts()).unwrap().unwrap().value, json!("b"));
    }

    #[test]
    fn test_replace_missing_is_not_found() {
        let store = MemoryStore::new();
        let err = store.replace("k", &json!(1), Cas::new(1), &opts()).unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[test]
    fn test_delete_with_and_without_cas() {
        let store = MemoryStore::new();
        let cas = store.add("a", &json!(1), &opts()).unwrap();
        store.add("b", &json!(2), &opts()).unwrap();

        let err = store.delete("a", Some(Cas::new(cas.get() + 100)), &opts()).unwrap_err();
        assert!(matches!(err, StoreError::Conflict { .. }));

        store.delete("a", Some(cas), &opts()).unwrap();
        store.delete("b", None, &opts()).unwrap();
        assert!(store.is_empty());

        assert!(matches!(
            store.delete("a", None, &opts()),
            Err(StoreError::NotFound { .. })
        ));
    }

    #[test]
    fn test_latency_beyond_timeout_does_not_mutate() {
        let store = MemoryStore::new();
        store.set_latency(Duration::from_millis(20));

        let bounded = opts().with_timeout(Some(Duration::from_millis(1)));
        let err = store.add("slow", &json!(1), &bounded).unwrap_err();
        assert!(matches!(err, StoreError::Timeout { op: "add", .. }));

        store.set_latency(Duration::ZERO);
        assert!(store.get("slow", &opts().quiet()).unwrap().is_none());
    }

    #[test]
    fn test_offline_store_is_fatal() {
        let store = MemoryStore::new();
        store.set_available(false);
        let err = store.get("k", &opts()).unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_concurrent_adds_single_winner() {
        let store = Arc::new(MemoryStore::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || store.add("contended", &json!(i), &StoreOptions::new()).is_ok())
            })
            .collect();

        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(winners, 1);
    }
}
