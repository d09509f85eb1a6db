//! Durable document store backed by an append-only log
//!
//! - Append-only (no in-place updates)
//! - Checksum verified on replay, corruption halts the open
//! - Latest record wins for the same key
//! - CAS tokens are record sequence numbers, increasing across reopen
//!
//! The full key space is held in memory; the log is only read on open.

mod checksum;
mod reader;
mod record;

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use serde_json::Value;

use self::reader::LogReader;
use self::record::{LogOp, LogRecord};
use super::cas::Cas;
use super::errors::{StoreError, StoreResult};
use super::options::{Deadline, StoreOptions};
use super::{absent, DocumentStore, StoredEntry};
use crate::config::FileStoreConfig;
use crate::observability::{log_event_with_fields, Event, Severity};

struct Inner {
    file: File,
    entries: HashMap<String, (Value, Cas)>,
    last_cas: u64,
    offset: u64,
    /// Set when a torn tail could not be cut back
    poisoned: bool,
}

/// File-backed store. One instance per log file per process.
pub struct FileStore {
    log_path: PathBuf,
    sync_writes: bool,
    inner: Mutex<Inner>,
}

impl FileStore {
    /// Opens (or creates) the log described by `config` and replays it.
    ///
    /// # Errors
    ///
    /// - `Io` if the directory or file cannot be created or opened
    /// - `Corruption` if any record fails its checksum or is truncated
    pub fn open(config: &FileStoreConfig) -> StoreResult<Self> {
        config
            .validate()
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        if !config.data_dir.exists() {
            fs::create_dir_all(&config.data_dir).map_err(|e| {
                StoreError::Io(format!(
                    "Failed to create data directory {}: {}",
                    config.data_dir.display(),
                    e
                ))
            })?;
        }

        let log_path = config.log_path();
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&log_path)
            .map_err(|e| {
                StoreError::Io(format!("Failed to open store log {}: {}", log_path.display(), e))
            })?;

        log_event_with_fields(
            Severity::Info,
            Event::StoreOpen,
            &[("path", &log_path.display().to_string())],
        );

        let (entries, last_cas, offset) = Self::replay(&log_path)?;

        log_event_with_fields(
            Severity::Info,
            Event::StoreReplayComplete,
            &[
                ("keys", &entries.len().to_string()),
                ("last_cas", &last_cas.to_string()),
            ],
        );

        Ok(Self {
            log_path,
            sync_writes: config.sync_writes,
            inner: Mutex::new(Inner {
                file,
                entries,
                last_cas,
                offset,
                poisoned: false,
            }),
        })
    }

    /// Path of the underlying log file.
    pub fn path(&self) -> &Path {
        &self.log_path
    }

    /// Bytes appended to the log so far, including replayed records.
    pub fn log_size(&self) -> u64 {
        self.inner.lock().map(|i| i.offset).unwrap_or(0)
    }

    /// Number of live keys.
    pub fn len(&self) -> usize {
        self.inner.lock().map(|i| i.entries.len()).unwrap_or(0)
    }

    /// Returns true if no key is live.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn replay(log_path: &Path) -> StoreResult<(HashMap<String, (Value, Cas)>, u64, u64)> {
        let mut entries = HashMap::new();
        let mut last_cas = 0;

        let mut reader = LogReader::open(log_path)?;
        loop {
            let record = match reader.read_next() {
                Ok(Some(record)) => record,
                Ok(None) => break,
                Err(e) => {
                    log_event_with_fields(
                        Severity::Fatal,
                        Event::StoreCorruption,
                        &[("path", &log_path.display().to_string()), ("reason", &e.to_string())],
                    );
                    return Err(e);
                }
            };

            last_cas = last_cas.max(record.cas);
            match record.op {
                LogOp::Put => {
                    let value: Value = serde_json::from_slice(&record.value).map_err(|e| {
                        StoreError::Corruption(format!(
                            "Unreadable value for {} at cas {}: {}",
                            record.key, record.cas, e
                        ))
                    })?;
                    entries.insert(record.key, (value, Cas::new(record.cas)));
                }
                LogOp::Delete => {
                    entries.remove(&record.key);
                }
            }
        }

        Ok((entries, last_cas, reader.current_offset()))
    }

    fn begin(&self, op: &'static str, key: &str, opts: &StoreOptions) -> StoreResult<MutexGuard<'_, Inner>> {
        let deadline = Deadline::start(opts);
        let guard = self
            .inner
            .lock()
            .map_err(|_| StoreError::Unavailable("file store lock poisoned".into()))?;
        if guard.poisoned {
            return Err(StoreError::Unavailable(format!(
                "store log {} has an unrepaired torn tail",
                self.log_path.display()
            )));
        }
        deadline.check(op, key)?;
        Ok(guard)
    }

    /// Appends `record` and fsyncs.
    ///
    /// On failure the log is cut back to the last complete record and
    /// in-memory state is untouched.
    fn append(&self, inner: &mut Inner, record: &LogRecord) -> StoreResult<()> {
        let bytes = record.serialize();
        let sync_writes = self.sync_writes;
        let written = inner
            .file
            .write_all(&bytes)
            .and_then(|()| if sync_writes { inner.file.sync_all() } else { Ok(()) });
        if let Err(e) = written {
            self.discard_torn_tail(inner);
            return Err(StoreError::Io(format!(
                "Failed to append record for {}: {}",
                record.key, e
            )));
        }
        inner.offset += bytes.len() as u64;
        inner.last_cas = record.cas;
        Ok(())
    }

    /// Truncates the log to `inner.offset`. A store whose log cannot be
    /// truncated refuses every later call.
    fn discard_torn_tail(&self, inner: &mut Inner) {
        let path = self.log_path.display().to_string();
        let offset = inner.offset.to_string();
        match inner.file.set_len(inner.offset).and_then(|()| inner.file.sync_all()) {
            Ok(()) => log_event_with_fields(
                Severity::Error,
                Event::StoreAppendFailed,
                &[("path", &path), ("offset", &offset)],
            ),
            Err(e) => {
                inner.poisoned = true;
                log_event_with_fields(
                    Severity::Fatal,
                    Event::StoreAppendFailed,
                    &[("path", &path), ("offset", &offset), ("reason", &e.to_string())],
                );
            }
        }
    }

    fn put(&self, inner: &mut Inner, key: &str, value: &Value) -> StoreResult<Cas> {
        let body = serde_json::to_vec(value)
            .map_err(|e| StoreError::Io(format!("Failed to encode value for {}: {}", key, e)))?;
        let cas = inner.last_cas + 1;
        self.append(inner, &LogRecord::put(key, cas, body))?;
        inner
            .entries
            .insert(key.to_string(), (value.clone(), Cas::new(cas)));
        Ok(Cas::new(cas))
    }
}

impl DocumentStore for FileStore {
    fn get(&self, key: &str, opts: &StoreOptions) -> StoreResult<Option<StoredEntry>> {
        let inner = self.begin("get", key, opts)?;
        match inner.entries.get(key) {
            Some((value, cas)) => Ok(Some(StoredEntry {
                key: key.to_string(),
                value: value.clone(),
                cas: *cas,
            })),
            None => absent(key, opts),
        }
    }

    fn add(&self, key: &str, value: &Value, opts: &StoreOptions) -> StoreResult<Cas> {
        let mut inner = self.begin("add", key, opts)?;
        if inner.entries.contains_key(key) {
            return Err(StoreError::DuplicateKey {
                key: key.to_string(),
            });
        }
        self.put(&mut inner, key, value)
    }

    fn replace(&self, key: &str, value: &Value, cas: Cas, opts: &StoreOptions) -> StoreResult<Cas> {
        let mut inner = self.begin("replace", key, opts)?;
        let current = inner
            .entries
            .get(key)
            .map(|(_, current)| *current)
            .ok_or_else(|| StoreError::NotFound {
                key: key.to_string(),
            })?;
        if current != cas {
            return Err(StoreError::Conflict {
                key: key.to_string(),
                expected: cas,
                current,
            });
        }
        self.put(&mut inner, key, value)
    }

    fn delete(&self, key: &str, cas: Option<Cas>, opts: &StoreOptions) -> StoreResult<()> {
        let mut inner = self.begin("delete", key, opts)?;
        let current = inner
            .entries
            .get(key)
            .map(|(_, current)| *current)
            .ok_or_else(|| StoreError::NotFound {
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
        let next = inner.last_cas + 1;
        self.append(&mut inner, &LogRecord::delete(key, next))?;
        inner.entries.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn open(dir: &TempDir) -> FileStore {
        FileStore::open(&FileStoreConfig::new(dir.path())).unwrap()
    }

    #[test]
    fn test_open_creates_log() {
        let dir = TempDir::new().unwrap();
        let store = open(&dir);
        assert!(store.path().exists());
        assert!(store.is_empty());
    }

    #[test]
    fn test_state_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let (kept_cas, last_cas) = {
            let store = open(&dir);
            let a = store.add("a", &json!({"n": 1}), &StoreOptions::new()).unwrap();
            let b = store.add("b", &json!("pointer"), &StoreOptions::new()).unwrap();
            let b2 = store.replace("b", &json!("moved"), b, &StoreOptions::new()).unwrap();
            store.add("c", &json!(3), &StoreOptions::new()).unwrap();
            store.delete("c", None, &StoreOptions::new()).unwrap();
            (a, b2)
        };

        let store = open(&dir);
        assert_eq!(store.len(), 2);
        let a = store.get("a", &StoreOptions::new()).unwrap().unwrap();
        assert_eq!(a.cas, kept_cas);
        assert_eq!(a.value, json!({"n": 1}));
        assert_eq!(store.get("b", &StoreOptions::new()).unwrap().unwrap().value, json!("moved"));
        assert!(store.get("c", &StoreOptions::new().quiet()).unwrap().is_none());

        // New tokens continue past everything replayed
        let fresh = store.add("d", &json!(4), &StoreOptions::new()).unwrap();
        assert!(fresh.get() > last_cas.get());
    }

    #[test]
    fn test_failed_cas_appends_nothing() {
        let dir = TempDir::new().unwrap();
        let store = open(&dir);
        let cas = store.add("k", &json!(1), &StoreOptions::new()).unwrap();
        let size_before = store.log_size();

        let stale = Cas::new(cas.get() + 7);
        assert!(matches!(
            store.replace("k", &json!(2), stale, &StoreOptions::new()),
            Err(StoreError::Conflict { .. })
        ));
        assert!(matches!(
            store.add("k", &json!(2), &StoreOptions::new()),
            Err(StoreError::DuplicateKey { .. })
        ));

        assert_eq!(store.log_size(), size_before);
        assert_eq!(fs::metadata(store.path()).unwrap().len(), size_before);
    }

    #[test]
    fn test_torn_tail_is_cut_back() {
        let dir = TempDir::new().unwrap();
        let store = open(&dir);
        store.add("k", &json!(1), &StoreOptions::new()).unwrap();
        let good_size = store.log_size();

        // Partial record left behind by a short write
        let mut raw = OpenOptions::new().append(true).open(store.path()).unwrap();
        raw.write_all(&[0x2A, 0x00, 0x00]).unwrap();
        drop(raw);

        {
            let mut inner = store.inner.lock().unwrap();
            store.discard_torn_tail(&mut inner);
            assert!(!inner.poisoned);
        }
        assert_eq!(fs::metadata(store.path()).unwrap().len(), good_size);

        store.add("l", &json!(2), &StoreOptions::new()).unwrap();
        drop(store);

        let reopened = open(&dir);
        assert_eq!(reopened.len(), 2);
        assert_eq!(reopened.get("l", &StoreOptions::new()).unwrap().unwrap().value, json!(2));
    }

    #[test]
    fn test_poisoned_store_refuses_calls() {
        let dir = TempDir::new().unwrap();
        let store = open(&dir);
        store.inner.lock().unwrap().poisoned = true;

        let err = store.get("k", &StoreOptions::new().quiet()).unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_corruption_halts_open() {
        let dir = TempDir::new().unwrap();
        let path = {
            let store = open(&dir);
            store.add("k", &json!({"name": "joe"}), &StoreOptions::new()).unwrap();
            store.path().to_path_buf()
        };

        let mut bytes = fs::read(&path).unwrap();
        let mid = bytes.len() / 2;
        bytes[mid] ^= 0xFF;
        fs::write(&path, bytes).unwrap();

        match FileStore::open(&FileStoreConfig::new(dir.path())) {
            Err(err) => {
                assert!(matches!(err, StoreError::Corruption(_)));
                assert!(err.is_fatal());
            }
            Ok(_) => panic!("corrupt log must not open"),
        }
    }

    #[test]
    fn test_truncated_tail_halts_open() {
        let dir = TempDir::new().unwrap();
        let path = {
            let store = open(&dir);
            store.add("k", &json!(1), &StoreOptions::new()).unwrap();
            store.add("l", &json!(2), &StoreOptions::new()).unwrap();
            store.path().to_path_buf()
        };

        let bytes = fs::read(&path).unwrap();
        fs::write(&path, &bytes[..bytes.len() - 5]).unwrap();

        assert!(matches!(
            FileStore::open(&FileStoreConfig::new(dir.path())),
            Err(StoreError::Corruption(_))
        ));
    }
}
