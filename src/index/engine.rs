//! Index engine
//!
//! Maintains pointer records (`pointer key -> document id`) with the same
//! single-key primitives used for documents. The document record is the
//! source of truth:
//!
//! - pointers are written after the owning document is saved
//! - a pointer naming a missing document is deleted on read
//! - pointer failures after a document write are logged and counted only
//!
//! Uniqueness is a read-then-write check. Two concurrent creates with the
//! same values can both pass it; the later pointer write wins.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use super::errors::{IndexError, IndexResult};
use super::key::{current_values, encode, index_def, persisted_values, pointer_key_for};
use crate::config::PersistenceConfig;
use crate::document::Document;
use crate::observability::{log_event_with_fields, Event, MetricsRegistry, Severity};
use crate::schema::{KindSchema, ValidationErrors, TAKEN_MESSAGE};
use crate::store::{DocumentStore, StoreError, StoreOptions, StoredEntry};

/// Index name -> pointer key built from the previous values
pub type PreviousKeys = HashMap<String, String>;

/// Outcome of writing one pointer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PointerWrite {
    Written,
    AlreadyCurrent,
}

/// Secondary index maintenance over a `DocumentStore`.
pub struct IndexEngine {
    store: Arc<dyn DocumentStore>,
    metrics: Arc<MetricsRegistry>,
    opts: StoreOptions,
    pointer_write_attempts: u32,
}

impl IndexEngine {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        metrics: Arc<MetricsRegistry>,
        config: &PersistenceConfig,
    ) -> Self {
        Self {
            store,
            metrics,
            opts: StoreOptions::new().with_timeout(config.op_timeout()),
            pointer_write_attempts: config.pointer_write_attempts.max(1),
        }
    }

    /// Id of the live document holding `values` on `index_name`.
    ///
    /// A pointer whose document is gone is deleted and `None` returned.
    pub fn lookup(&self, schema: &KindSchema, index_name: &str, values: &[Value]) -> IndexResult<Option<String>> {
        Ok(self
            .resolve(schema, index_name, values)?
            .map(|entry| entry.key))
    }

    /// Loads the live document holding `values` on `index_name`.
    pub fn find_by(
        &self,
        schema: &Arc<KindSchema>,
        index_name: &str,
        values: &[Value],
    ) -> IndexResult<Option<Document>> {
        match self.resolve(schema, index_name, values)? {
            Some(entry) => {
                let doc = Document::from_stored(schema, &entry.key, entry.value, entry.cas, false)?;
                Ok(Some(doc))
            }
            None => Ok(None),
        }
    }

    /// Follows the pointer for `values` and returns the document entry.
    fn resolve(&self, schema: &KindSchema, index_name: &str, values: &[Value]) -> IndexResult<Option<StoredEntry>> {
        let key = pointer_key_for(schema, index_name, values)?;
        let quiet = self.opts.quiet();

        let Some(pointer) = self.store.get(&key, &quiet)? else {
            return Ok(None);
        };

        if let Some(id) = pointer.value.as_str() {
            if let Some(entry) = self.store.get(id, &quiet)? {
                return Ok(Some(entry));
            }
        }

        self.heal(&pointer);
        Ok(None)
    }

    /// Deletes a pointer that names no live document.
    fn heal(&self, pointer: &StoredEntry) {
        // CAS-guarded: a pointer rewritten since the read is left alone
        match self.store.delete(&pointer.key, Some(pointer.cas), &self.opts) {
            Ok(()) => {
                self.metrics.increment_pointers_healed();
                log_event_with_fields(
                    Severity::Info,
                    Event::IndexPointerHealed,
                    &[("key", &pointer.key), ("target", &pointer.value.to_string())],
                );
            }
            Err(StoreError::NotFound { .. }) | Err(StoreError::Conflict { .. }) => {}
            Err(e) => self.pointer_failed(&pointer.key, &e.to_string()),
        }
    }

    /// True if no other live document holds the current values of `doc`
    /// on `index_name`. All-null values are always unique.
    pub fn is_unique(&self, doc: &Document, index_name: &str) -> IndexResult<bool> {
        let index = index_def(doc.schema(), index_name)?;
        let values = current_values(doc, index);
        if values.iter().all(Value::is_null) {
            return Ok(true);
        }

        match self.lookup(doc.schema(), index_name, &values)? {
            None => Ok(true),
            Some(owner) => Ok(doc.id() == Some(owner.as_str())),
        }
    }

    /// Checks every unique index of the document's kind.
    ///
    /// Violations are reported on the index name.
    pub fn check_uniqueness(&self, doc: &Document) -> IndexResult<ValidationErrors> {
        let mut errors = ValidationErrors::new();
        for index in doc.schema().unique_indexes() {
            if !self.is_unique(doc, &index.name)? {
                log_event_with_fields(
                    Severity::Info,
                    Event::IndexUniqueViolation,
                    &[("kind", doc.kind()), ("index", &index.name)],
                );
                errors.add(index.name.clone(), TAKEN_MESSAGE);
            }
        }
        Ok(errors)
    }

    /// Pointer keys of a persisted document's changed indexes, built from
    /// the values before the change. Must run before the document write.
    pub fn capture_previous(&self, doc: &Document) -> PreviousKeys {
        let mut previous = PreviousKeys::new();
        if !doc.is_persisted() {
            return previous;
        }

        let schema = doc.schema();
        for index in schema.indexes() {
            if index.attributes.iter().any(|a| doc.attribute_changed(a)) {
                let key = encode(schema, index, &persisted_values(doc, index));
                previous.insert(index.name.clone(), key);
            }
        }
        previous
    }

    /// Writes the current pointers of a just-saved document and drops the
    /// previous ones that moved.
    ///
    /// Returns the number of pointers that could not be maintained.
    pub fn commit(&self, doc: &Document, previous: &PreviousKeys) -> usize {
        let Some(id) = doc.id() else {
            return 0;
        };

        let schema = doc.schema();
        let mut failures = 0;
        for index in schema.indexes() {
            let key = encode(schema, index, &current_values(doc, index));

            match self.upsert(&key, id) {
                Ok(PointerWrite::Written) => {
                    self.metrics.increment_pointer_writes();
                    log_event_with_fields(
                        Severity::Trace,
                        Event::IndexPointerWritten,
                        &[("key", &key), ("id", id)],
                    );
                }
                Ok(PointerWrite::AlreadyCurrent) => {}
                Err(e) => {
                    failures += 1;
                    self.pointer_failed(&key, &e.to_string());
                }
            }

            if let Some(old_key) = previous.get(&index.name) {
                if *old_key != key && !self.remove_owned(old_key, id) {
                    failures += 1;
                }
            }
        }
        failures
    }

    /// Deletes the pointers of a document about to be destroyed, built from
    /// its persisted values.
    ///
    /// Returns the number of pointers that could not be removed.
    pub fn release(&self, doc: &Document) -> usize {
        let Some(id) = doc.id() else {
            return 0;
        };

        let schema = doc.schema();
        schema
            .indexes()
            .iter()
            .map(|index| encode(schema, index, &persisted_values(doc, index)))
            .filter(|key| !self.remove_owned(key, id))
            .count()
    }

    /// `add`, falling back to `get` + `replace` when the key exists.
    fn upsert(&self, key: &str, id: &str) -> IndexResult<PointerWrite> {
        let target = Value::String(id.to_string());
        let quiet = self.opts.quiet();

        for _ in 0..self.pointer_write_attempts {
            match self.store.add(key, &target, &self.opts) {
                Ok(_) => return Ok(PointerWrite::Written),
                Err(StoreError::DuplicateKey { .. }) => {}
                Err(e) => return Err(e.into()),
            }

            let Some(existing) = self.store.get(key, &quiet)? else {
                continue;
            };
            if existing.value == target {
                return Ok(PointerWrite::AlreadyCurrent);
            }

            match self.store.replace(key, &target, existing.cas, &self.opts) {
                Ok(_) => return Ok(PointerWrite::Written),
                Err(StoreError::Conflict { .. }) | Err(StoreError::NotFound { .. }) => {}
                Err(e) => return Err(e.into()),
            }
        }

        Err(IndexError::Contention {
            key: key.to_string(),
            attempts: self.pointer_write_attempts,
        })
    }

    /// Deletes `key` if it still names `id`. Returns false on a store
    /// failure, true otherwise.
    fn remove_owned(&self, key: &str, id: &str) -> bool {
        let pointer = match self.store.get(key, &self.opts.quiet()) {
            Ok(Some(pointer)) => pointer,
            Ok(None) => return true,
            Err(e) => {
                self.pointer_failed(key, &e.to_string());
                return false;
            }
        };
        if pointer.value.as_str() != Some(id) {
            return true;
        }

        match self.store.delete(key, Some(pointer.cas), &self.opts) {
            Ok(()) => {
                self.metrics.increment_pointer_releases();
                log_event_with_fields(
                    Severity::Trace,
                    Event::IndexPointerReleased,
                    &[("key", key), ("id", id)],
                );
                true
            }
            Err(StoreError::NotFound { .. }) | Err(StoreError::Conflict { .. }) => true,
            Err(e) => {
                self.pointer_failed(key, &e.to_string());
                false
            }
        }
    }

    fn pointer_failed(&self, key: &str, reason: &str) {
        self.metrics.increment_pointer_failures();
        log_event_with_fields(
            Severity::Warn,
            Event::IndexPointerFailed,
            &[("key", key), ("reason", reason)],
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{AttrType, IndexDef};
    use crate::store::MemoryStore;
    use serde_json::json;

    struct Fixture {
        store: Arc<MemoryStore>,
        metrics: Arc<MetricsRegistry>,
        engine: IndexEngine,
        schema: Arc<KindSchema>,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let metrics = Arc::new(MetricsRegistry::new());
        let engine = IndexEngine::new(store.clone(), metrics.clone(), &PersistenceConfig::default());
        let schema = KindSchema::builder("User")
            .field("email", AttrType::String)
            .field("name", AttrType::String)
            .ensure_unique(&["email"])
            .index(IndexDef::new(&["name"]))
            .build()
            .unwrap();
        Fixture {
            store,
            metrics,
            engine,
            schema,
        }
    }

    /// Stores a document directly and returns it loaded.
    fn stored(f: &Fixture, id: &str, email: &str) -> Document {
        let value = json!({"type": "User", "email": email, "name": null});
        let cas = f.store.add(id, &value, &StoreOptions::new()).unwrap();
        Document::from_stored(&f.schema, id, value, cas, false).unwrap()
    }

    fn pointer(f: &Fixture, key: &str) -> Option<Value> {
        f.store
            .get(key, &StoreOptions::new().quiet())
            .unwrap()
            .map(|e| e.value)
    }

    #[test]
    fn test_commit_then_lookup() {
        let f = fixture();
        let doc = stored(&f, "User-1", "a@x.io");
        assert_eq!(f.engine.commit(&doc, &PreviousKeys::new()), 0);

        let found = f.engine.lookup(&f.schema, "email", &[json!("a@x.io")]).unwrap();
        assert_eq!(found.as_deref(), Some("User-1"));

        let loaded = f
            .engine
            .find_by(&f.schema, "email", &[json!("a@x.io")])
            .unwrap()
            .unwrap();
        assert_eq!(loaded.id(), Some("User-1"));
        assert_eq!(f.metrics.snapshot().pointer_writes, 2);
    }

    #[test]
    fn test_recommit_is_idempotent() {
        let f = fixture();
        let doc = stored(&f, "User-1", "a@x.io");
        f.engine.commit(&doc, &PreviousKeys::new());
        let keys_before = f.store.len();

        assert_eq!(f.engine.commit(&doc, &PreviousKeys::new()), 0);
        assert_eq!(f.store.len(), keys_before);
        assert_eq!(f.metrics.snapshot().pointer_writes, 2);
    }

    #[test]
    fn test_stale_pointer_is_healed() {
        let f = fixture();
        let doc = stored(&f, "User-1", "a@x.io");
        f.engine.commit(&doc, &PreviousKeys::new());
        f.store.delete("User-1", None, &StoreOptions::new()).unwrap();

        let key = pointer_key_for(&f.schema, "email", &[json!("a@x.io")]).unwrap();
        assert!(pointer(&f, &key).is_some());

        assert_eq!(f.engine.lookup(&f.schema, "email", &[json!("a@x.io")]).unwrap(), None);
        assert!(pointer(&f, &key).is_none());
        assert_eq!(f.metrics.snapshot().pointers_healed, 1);
    }

    #[test]
    fn test_uniqueness() {
        let f = fixture();
        let owner = stored(&f, "User-1", "a@x.io");
        f.engine.commit(&owner, &PreviousKeys::new());

        // The owner itself is unique
        assert!(f.engine.is_unique(&owner, "email").unwrap());

        let mut other = Document::new(&f.schema);
        other.write_attribute("email", json!("a@x.io")).unwrap();
        let keys_before = f.store.keys();

        assert!(!f.engine.is_unique(&other, "email").unwrap());
        let errors = f.engine.check_uniqueness(&other).unwrap();
        assert_eq!(errors.on("email"), vec![TAKEN_MESSAGE]);

        other.write_attribute("email", json!("b@x.io")).unwrap();
        assert!(f.engine.check_uniqueness(&other).unwrap().is_empty());

        // Checks never write
        assert_eq!(f.store.keys(), keys_before);
    }

    #[test]
    fn test_null_bucket_is_always_unique() {
        let f = fixture();
        let mut first = stored(&f, "User-1", "x");
        first.write_attribute("email", Value::Null).unwrap();
        f.engine.commit(&first, &PreviousKeys::new());

        let second = Document::new(&f.schema);
        assert!(f.engine.is_unique(&second, "email").unwrap());
    }

    #[test]
    fn test_changed_index_moves_pointer() {
        let f = fixture();
        let mut doc = stored(&f, "User-1", "old@x.io");
        f.engine.commit(&doc, &PreviousKeys::new());

        doc.write_attribute("email", json!("new@x.io")).unwrap();
        let previous = f.engine.capture_previous(&doc);
        let old_key = pointer_key_for(&f.schema, "email", &[json!("old@x.io")]).unwrap();
        assert_eq!(previous.get("email"), Some(&old_key));
        assert!(!previous.contains_key("name"));

        assert_eq!(f.engine.commit(&doc, &previous), 0);
        let new_key = pointer_key_for(&f.schema, "email", &[json!("new@x.io")]).unwrap();
        assert!(pointer(&f, &old_key).is_none());
        assert_eq!(pointer(&f, &new_key), Some(json!("User-1")));
    }

    #[test]
    fn test_capture_previous_skips_new_documents() {
        let f = fixture();
        let mut doc = Document::new(&f.schema);
        doc.write_attribute("email", json!("a@x.io")).unwrap();
        assert!(f.engine.capture_previous(&doc).is_empty());
    }

    #[test]
    fn test_release_uses_persisted_values() {
        let f = fixture();
        let mut doc = stored(&f, "User-1", "a@x.io");
        f.engine.commit(&doc, &PreviousKeys::new());

        // Unsaved change must not redirect the release
        doc.write_attribute("email", json!("unsaved@x.io")).unwrap();
        assert_eq!(f.engine.release(&doc), 0);

        let key = pointer_key_for(&f.schema, "email", &[json!("a@x.io")]).unwrap();
        assert!(pointer(&f, &key).is_none());
        assert_eq!(f.metrics.snapshot().pointer_releases, 2);
    }

    #[test]
    fn test_release_leaves_foreign_pointer() {
        let f = fixture();
        let doc = stored(&f, "User-1", "a@x.io");
        let key = pointer_key_for(&f.schema, "email", &[json!("a@x.io")]).unwrap();
        f.store.add(&key, &json!("User-2"), &StoreOptions::new()).unwrap();

        assert_eq!(f.engine.release(&doc), 0);
        assert_eq!(pointer(&f, &key), Some(json!("User-2")));
    }

    #[test]
    fn test_commit_overwrites_foreign_pointer() {
        let f = fixture();
        let doc = stored(&f, "User-1", "a@x.io");
        let key = pointer_key_for(&f.schema, "email", &[json!("a@x.io")]).unwrap();
        f.store.add(&key, &json!("User-0"), &StoreOptions::new()).unwrap();

        assert_eq!(f.engine.commit(&doc, &PreviousKeys::new()), 0);
        assert_eq!(pointer(&f, &key), Some(json!("User-1")));
    }

    #[test]
    fn test_failures_are_counted_not_raised() {
        let f = fixture();
        let doc = stored(&f, "User-1", "a@x.io");
        f.store.set_available(false);

        assert_eq!(f.engine.commit(&doc, &PreviousKeys::new()), 2);
        assert_eq!(f.metrics.snapshot().pointer_failures, 2);
        f.store.set_available(true);
    }

    #[test]
    fn test_unknown_index() {
        let f = fixture();
        let doc = Document::new(&f.schema);
        assert!(matches!(
            f.engine.is_unique(&doc, "nope"),
            Err(IndexError::UnknownIndex { .. })
        ));
    }
}
