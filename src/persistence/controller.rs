//! Persistence controller
//!
//! Drives the document lifecycle with the store's single-key primitives:
//!
//! ```text
//! new --save(add)--> persisted --save(replace, cas)--> persisted
//!                        |
//!                        +--destroy(delete)--> destroyed (frozen)
//! ```
//!
//! CAS is the only concurrency control. A stale CAS surfaces as Conflict
//! and is never retried here; a generated id that collides is retried once
//! with a fresh id when configured.

use std::sync::Arc;

use serde_json::Value;

use super::errors::{PersistenceError, PersistenceResult};
use super::outcome::{DestroyOptions, LoadOptions, SaveOptions, SaveOutcome};
use crate::config::PersistenceConfig;
use crate::document::Document;
use crate::id::{IdGenerator, TimeRandomIdGenerator};
use crate::index::{IndexEngine, PreviousKeys};
use crate::observability::{log_event_with_fields, Event, MetricsRegistry, Severity};
use crate::schema::{validate_attributes, KindSchema};
use crate::store::{Cas, DocumentStore, StoreError, StoreOptions};

/// Create, update, destroy and load documents of any kind.
///
/// Shareable between threads; holds no per-document state.
pub struct PersistenceController {
    store: Arc<dyn DocumentStore>,
    ids: Arc<dyn IdGenerator>,
    index: IndexEngine,
    metrics: Arc<MetricsRegistry>,
    config: PersistenceConfig,
    opts: StoreOptions,
}

impl PersistenceController {
    /// Controller over `store` with the default id generator.
    pub fn new(store: Arc<dyn DocumentStore>, config: PersistenceConfig) -> Self {
        let metrics = Arc::new(MetricsRegistry::new());
        let index = IndexEngine::new(Arc::clone(&store), Arc::clone(&metrics), &config);
        Self {
            store,
            ids: Arc::new(TimeRandomIdGenerator::new()),
            index,
            metrics,
            opts: StoreOptions::new().with_timeout(config.op_timeout()),
            config,
        }
    }

    /// Replaces the id generator.
    pub fn with_id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    pub fn config(&self) -> &PersistenceConfig {
        &self.config
    }

    pub fn metrics(&self) -> &Arc<MetricsRegistry> {
        &self.metrics
    }

    pub fn index(&self) -> &IndexEngine {
        &self.index
    }

    // =========================================================================
    // Saving
    // =========================================================================

    /// Validates and writes `doc`: `add` when new, CAS `replace` otherwise.
    ///
    /// Validation failures are `Ok(SaveOutcome::Rejected)`.
    pub fn save(&self, doc: &mut Document) -> PersistenceResult<SaveOutcome> {
        self.save_with(doc, SaveOptions::default())
    }

    /// Like [`save`](Self::save) but a validation failure is RecordInvalid.
    pub fn save_strict(&self, doc: &mut Document) -> PersistenceResult<SaveOutcome> {
        match self.save(doc)? {
            SaveOutcome::Rejected(violations) => {
                Err(PersistenceError::record_invalid(doc.kind(), violations))
            }
            outcome => Ok(outcome),
        }
    }

    pub fn save_with(&self, doc: &mut Document, opts: SaveOptions) -> PersistenceResult<SaveOutcome> {
        if doc.is_destroyed() {
            return Err(PersistenceError::destroyed(doc.id()));
        }

        if doc.is_persisted() && !doc.changed() {
            self.metrics.increment_unchanged();
            log_event_with_fields(
                Severity::Trace,
                Event::DocUnchanged,
                &[("key", doc.id().unwrap_or_default())],
            );
            return Ok(SaveOutcome::Unchanged);
        }

        if opts.validate {
            let mut violations = validate_attributes(doc.schema(), doc.attributes());
            if violations.is_empty() {
                violations.merge(self.index.check_uniqueness(doc)?);
            }
            if !violations.is_empty() {
                self.metrics.increment_rejected();
                log_event_with_fields(
                    Severity::Info,
                    Event::DocRejected,
                    &[("kind", doc.kind()), ("violations", &violations.to_string())],
                );
                return Ok(SaveOutcome::Rejected(violations));
            }
        }

        if doc.is_new() {
            self.create_document(doc)
        } else {
            self.update_document(doc)
        }
    }

    fn create_document(&self, doc: &mut Document) -> PersistenceResult<SaveOutcome> {
        let explicit = doc.id().is_some();
        let payload = doc.clamped_payload();
        let mut retries_left = u32::from(!explicit && self.config.retry_generated_id_on_collision);

        let (key, cas) = loop {
            let key = match doc.id() {
                Some(id) => id.to_string(),
                None => {
                    let id = self.ids.next(doc.kind());
                    doc.set_id(id.clone())?;
                    id
                }
            };

            match self.store.add(&key, &payload, &self.opts) {
                Ok(cas) => break (key, cas),
                Err(StoreError::DuplicateKey { .. }) if retries_left > 0 => {
                    retries_left -= 1;
                    self.metrics.increment_id_retries();
                    log_event_with_fields(Severity::Warn, Event::IdRetry, &[("key", &key)]);
                    doc.clear_id();
                }
                Err(e) => {
                    if !explicit {
                        doc.clear_id();
                    }
                    return Err(self.store_failure(e));
                }
            }
        };

        doc.apply_clamped(&payload);
        doc.mark_persisted(key, cas);
        self.commit_pointers(doc, &PreviousKeys::new());

        self.metrics.increment_creates();
        log_event_with_fields(
            Severity::Info,
            Event::DocCreated,
            &[("key", doc.id().unwrap_or_default()), ("cas", &cas.to_string())],
        );
        Ok(SaveOutcome::Created)
    }

    fn update_document(&self, doc: &mut Document) -> PersistenceResult<SaveOutcome> {
        let (Some(key), Some(cas)) = (doc.metadata().key.clone(), doc.cas()) else {
            return Err(PersistenceError::not_persisted(doc.kind()));
        };

        let previous = self.index.capture_previous(doc);
        let payload = doc.clamped_payload();
        let new_cas = self
            .store
            .replace(&key, &payload, cas, &self.opts)
            .map_err(|e| self.store_failure(e))?;

        doc.apply_clamped(&payload);
        doc.mark_persisted(key.clone(), new_cas);
        self.commit_pointers(doc, &previous);

        self.metrics.increment_updates();
        log_event_with_fields(
            Severity::Info,
            Event::DocUpdated,
            &[("key", &key), ("cas", &new_cas.to_string())],
        );
        Ok(SaveOutcome::Updated)
    }

    fn commit_pointers(&self, doc: &Document, previous: &PreviousKeys) {
        let failures = self.index.commit(doc, previous);
        if failures > 0 {
            log_event_with_fields(
                Severity::Warn,
                Event::IndexPointerFailed,
                &[
                    ("key", doc.id().unwrap_or_default()),
                    ("failures", &failures.to_string()),
                ],
            );
        }
    }

    /// Builds a `schema` document from `attributes` and saves it strictly.
    pub fn create(&self, schema: &Arc<KindSchema>, attributes: Value) -> PersistenceResult<Document> {
        let mut doc = Document::new(schema);
        doc.assign(attributes)?;
        self.save_strict(&mut doc)?;
        Ok(doc)
    }

    /// Assigns `attributes` and saves.
    pub fn update_attributes(&self, doc: &mut Document, attributes: Value) -> PersistenceResult<SaveOutcome> {
        if doc.is_destroyed() {
            return Err(PersistenceError::destroyed(doc.id()));
        }
        doc.assign(attributes)?;
        self.save(doc)
    }

    /// Assigns one attribute and saves without validation.
    pub fn update_attribute(&self, doc: &mut Document, name: &str, value: Value) -> PersistenceResult<SaveOutcome> {
        if doc.is_destroyed() {
            return Err(PersistenceError::destroyed(doc.id()));
        }
        doc.write_attribute(name, value)?;
        self.save_with(doc, SaveOptions::without_validation())
    }

    // =========================================================================
    // Removal
    // =========================================================================

    /// Releases the document's pointers, then deletes it.
    pub fn destroy(&self, doc: &mut Document) -> PersistenceResult<()> {
        self.destroy_with(doc, DestroyOptions::default())
    }

    pub fn destroy_with(&self, doc: &mut Document, opts: DestroyOptions) -> PersistenceResult<()> {
        let (key, cas) = self.removable(doc)?;

        let failures = self.index.release(doc);
        if failures > 0 {
            log_event_with_fields(
                Severity::Warn,
                Event::IndexPointerFailed,
                &[("key", &key), ("failures", &failures.to_string())],
            );
        }

        let expected = (opts.with_cas || self.config.destroy_with_cas).then_some(cas);
        self.remove(doc, &key, expected, Event::DocDestroyed)
    }

    /// Deletes the document without touching its pointers.
    ///
    /// Any pointer left behind is healed by the next lookup.
    pub fn delete(&self, doc: &mut Document) -> PersistenceResult<()> {
        let (key, _) = self.removable(doc)?;
        self.remove(doc, &key, None, Event::DocDeleted)
    }

    fn removable(&self, doc: &Document) -> PersistenceResult<(String, Cas)> {
        if doc.is_destroyed() {
            return Err(PersistenceError::destroyed(doc.id()));
        }
        match (doc.metadata().key.clone(), doc.cas()) {
            (Some(key), Some(cas)) => Ok((key, cas)),
            _ => Err(PersistenceError::not_persisted(doc.kind())),
        }
    }

    fn remove(
        &self,
        doc: &mut Document,
        key: &str,
        expected: Option<Cas>,
        event: Event,
    ) -> PersistenceResult<()> {
        self.store
            .delete(key, expected, &self.opts)
            .map_err(|e| self.store_failure(e))?;

        doc.mark_destroyed();
        self.metrics.increment_destroys();
        log_event_with_fields(Severity::Info, event, &[("key", key)]);
        Ok(())
    }

    // =========================================================================
    // Loading
    // =========================================================================

    /// Loads `id`, failing with NotFound when absent.
    pub fn find(&self, schema: &Arc<KindSchema>, id: &str) -> PersistenceResult<Document> {
        self.find_with(schema, id, LoadOptions::default())
    }

    pub fn find_with(&self, schema: &Arc<KindSchema>, id: &str, opts: LoadOptions) -> PersistenceResult<Document> {
        self.find_by_id_with(schema, id, opts)?
            .ok_or_else(|| PersistenceError::not_found(id))
    }

    /// Loads `id`, `None` when absent.
    pub fn find_by_id(&self, schema: &Arc<KindSchema>, id: &str) -> PersistenceResult<Option<Document>> {
        self.find_by_id_with(schema, id, LoadOptions::default())
    }

    pub fn find_by_id_with(
        &self,
        schema: &Arc<KindSchema>,
        id: &str,
        opts: LoadOptions,
    ) -> PersistenceResult<Option<Document>> {
        let entry = self
            .store
            .get(id, &self.opts.quiet())
            .map_err(|e| self.store_failure(e))?;
        match entry {
            Some(entry) => Ok(Some(Document::from_stored(
                schema,
                &entry.key,
                entry.value,
                entry.cas,
                opts.ignore_kind,
            )?)),
            None => Ok(None),
        }
    }

    /// Loads every present id in order, skipping missing ones.
    pub fn find_all(&self, schema: &Arc<KindSchema>, ids: &[&str]) -> PersistenceResult<Vec<Document>> {
        let mut docs = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(doc) = self.find_by_id(schema, id)? {
                docs.push(doc);
            }
        }
        Ok(docs)
    }

    /// Loads the document holding `values` on `index_name`.
    pub fn find_by(
        &self,
        schema: &Arc<KindSchema>,
        index_name: &str,
        values: &[Value],
    ) -> PersistenceResult<Option<Document>> {
        Ok(self.index.find_by(schema, index_name, values)?)
    }

    /// Replaces attributes and metadata of `doc` with the stored state,
    /// discarding unsaved changes.
    pub fn reload(&self, doc: &mut Document) -> PersistenceResult<()> {
        let Some(key) = doc.metadata().key.clone() else {
            return Err(PersistenceError::not_persisted(doc.kind()));
        };
        let entry = self
            .store
            .get(&key, &self.opts)
            .map_err(|e| self.store_failure(e))?
            .ok_or_else(|| PersistenceError::not_found(&key))?;
        doc.load(&key, entry.value, entry.cas, false)?;
        Ok(())
    }

    /// Counts and logs a failed store round-trip.
    fn store_failure(&self, err: StoreError) -> PersistenceError {
        match &err {
            StoreError::Conflict { key, .. } => {
                self.metrics.increment_conflicts();
                log_event_with_fields(Severity::Info, Event::DocConflict, &[("key", key)]);
            }
            StoreError::DuplicateKey { key } => {
                self.metrics.increment_duplicate_keys();
                log_event_with_fields(Severity::Info, Event::DocDuplicateKey, &[("key", key)]);
            }
            StoreError::Timeout { op, key, .. } => {
                self.metrics.increment_timeouts();
                log_event_with_fields(Severity::Warn, Event::StoreTimeout, &[("op", op), ("key", key)]);
            }
            _ => {}
        }
        err.into()
    }
}
