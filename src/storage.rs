//! Registry persistence
//!
//! The registry lives in a single JSON file (default `tasks.json`):
//!
//! ```text
//! {
//!   "hw_1__20250303": {
//!     "id": "hw_1__20250303",
//!     "title": "HW 1",
//!     "course": "PL-203794",
//!     "due": "2025-03-03T23:59:00-06:00",
//!     "source": "PrairieLearn",
//!     "url": "https://...",
//!     "completed": false
//!   }
//! }
//! ```
//!
//! The file is read fully, mutated in memory and written back in full.
//! Read-modify-write goes through [`RegistryStore::update`], which holds an
//! exclusive lock on `tasks.json.lock` for the whole cycle. Entries that are
//! not valid task records are carried through that cycle byte-for-byte in
//! value, so a hand edit gone wrong is never silently deleted.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::Result;
use crate::lock::{self, lock_path_for, FileLock, DEFAULT_LOCK_TIMEOUT_MS};
use crate::task::{Registry, TaskRecord};

/// Default registry file name
pub const REGISTRY_FILE: &str = "tasks.json";

/// Result of reading the registry file.
#[derive(Debug, Clone, Default)]
pub struct Loaded {
    pub registry: Registry,
    /// The file existed but could not be used at all; started empty.
    pub degraded: bool,
    /// Entries that were not valid task records, kept raw and written back
    /// unchanged on save unless a record with the same key replaces them.
    pub quarantined: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct LoadIssues {
    pub degraded: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub quarantined: Vec<String>,
}

impl Loaded {
    pub fn issues(&self) -> LoadIssues {
        LoadIssues {
            degraded: self.degraded,
            quarantined: self.quarantined.keys().cloned().collect(),
        }
    }
}

/// Registry file manager
#[derive(Debug, Clone)]
pub struct RegistryStore {
    path: PathBuf,
    lock_timeout_ms: u64,
}

impl RegistryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock_timeout_ms: DEFAULT_LOCK_TIMEOUT_MS,
        }
    }

    pub fn with_lock_timeout(mut self, timeout_ms: u64) -> Self {
        self.lock_timeout_ms = timeout_ms;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn lock_path(&self) -> PathBuf {
        lock_path_for(&self.path)
    }

    /// Read the registry without taking the lock.
    ///
    /// A missing file is an empty registry. A file that is unreadable or not
    /// a JSON object is treated as empty and flagged `degraded`; completion
    /// flags it held are lost. Entries that are not task records are
    /// set aside individually in [`Loaded::quarantined`].
    pub fn load(&self) -> Result<Loaded> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "registry missing; starting empty");
            return Ok(Loaded::default());
        }

        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "registry unreadable; starting empty");
                return Ok(degraded());
            }
        };

        if content.trim().is_empty() {
            return Ok(Loaded::default());
        }

        let entries: serde_json::Map<String, serde_json::Value> =
            match serde_json::from_str(&content) {
                Ok(entries) => entries,
                Err(err) => {
                    warn!(path = %self.path.display(), error = %err, "registry corrupt; starting empty");
                    return Ok(degraded());
                }
            };

        let mut loaded = Loaded::default();
        for (key, value) in entries {
            match serde_json::from_value::<TaskRecord>(value.clone()) {
                Ok(mut record) => {
                    if record.id != key {
                        debug!(key = %key, id = %record.id, "record id differs from key; using key");
                        record.id = key;
                    }
                    loaded.registry.insert(record);
                }
                Err(err) => {
                    warn!(key = %key, error = %err, "keeping malformed registry entry aside");
                    loaded.quarantined.insert(key, value);
                }
            }
        }

        Ok(loaded)
    }

    /// Write the registry in full, atomically, without taking the lock.
    pub fn save(&self, registry: &Registry) -> Result<()> {
        self.write(registry, &BTreeMap::new())
    }

    fn write(&self, registry: &Registry, quarantined: &BTreeMap<String, Value>) -> Result<()> {
        let mut entries = match serde_json::to_value(registry)? {
            Value::Object(entries) => entries,
            _ => serde_json::Map::new(),
        };
        for (key, value) in quarantined {
            if !entries.contains_key(key) {
                entries.insert(key.clone(), value.clone());
            }
        }

        let mut json = serde_json::to_string_pretty(&entries)?;
        json.push('\n');
        lock::write_atomic(&self.path, json.as_bytes())?;
        debug!(
            path = %self.path.display(),
            tasks = registry.len(),
            kept_aside = quarantined.len(),
            "registry saved"
        );
        Ok(())
    }

    /// Locked read-modify-write.
    ///
    /// `f` receives the loaded state; whatever registry it leaves behind is
    /// saved. If `f` fails nothing is written.
    pub fn update<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Loaded) -> Result<T>,
    {
        let _lock = FileLock::acquire(self.lock_path(), self.lock_timeout_ms)?;

        let mut loaded = self.load()?;
        let result = f(&mut loaded)?;
        self.write(&loaded.registry, &loaded.quarantined)?;

        Ok(result)
    }
}

fn degraded() -> Loaded {
    Loaded {
        degraded: true,
        ..Loaded::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use tempfile::TempDir;

    fn record(id: &str, completed: bool) -> TaskRecord {
        TaskRecord {
            id: id.to_string(),
            title: "HW".to_string(),
            course: "PL-1".to_string(),
            due: "2025-03-03T23:59:00-06:00".to_string(),
            source: "PrairieLearn".to_string(),
            url: Some("https://example.test".to_string()),
            completed,
        }
    }

    #[test]
    fn missing_file_loads_empty() {
        let temp = TempDir::new().unwrap();
        let store = RegistryStore::new(temp.path().join(REGISTRY_FILE));

        let loaded = store.load().unwrap();
        assert!(loaded.registry.is_empty());
        assert!(!loaded.degraded);
    }

    #[test]
    fn save_then_load_preserves_records() {
        let temp = TempDir::new().unwrap();
        let store = RegistryStore::new(temp.path().join(REGISTRY_FILE));
        let registry: Registry = vec![record("a", true), record("b", false)]
            .into_iter()
            .collect();

        store.save(&registry).unwrap();
        let loaded = store.load().unwrap();
        assert_eq!(loaded.registry, registry);
    }

    #[test]
    fn corrupt_file_is_degraded_empty() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(REGISTRY_FILE);
        fs::write(&path, "{ not json").unwrap();

        let loaded = RegistryStore::new(&path).load().unwrap();
        assert!(loaded.degraded);
        assert!(loaded.registry.is_empty());

        fs::write(&path, "[1, 2, 3]").unwrap();
        assert!(RegistryStore::new(&path).load().unwrap().degraded);
    }

    #[test]
    fn malformed_entries_are_quarantined() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(REGISTRY_FILE);
        let content = r#"{
  "good": {"id": "good", "title": "HW", "course": "PL-1",
           "due": "2025-03-03T23:59:00-06:00", "source": "PL", "url": null,
           "completed": true},
  "bad": {"title": 7},
  "renamed": {"id": "other", "title": "Lab", "course": "PL-1",
              "due": "not a date", "source": "PL"}
}"#;
        fs::write(&path, content).unwrap();

        let loaded = RegistryStore::new(&path).load().unwrap();
        assert!(!loaded.degraded);
        assert_eq!(loaded.issues().quarantined, vec!["bad".to_string()]);
        assert_eq!(loaded.quarantined["bad"], serde_json::json!({"title": 7}));
        assert!(loaded.registry.get("good").unwrap().completed);

        let renamed = loaded.registry.get("renamed").unwrap();
        assert_eq!(renamed.id, "renamed");
        assert_eq!(renamed.due, "not a date");
        assert!(!renamed.completed);
    }

    #[test]
    fn quarantined_entries_survive_an_update() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(REGISTRY_FILE);
        let content = r#"{
  "a": {"id": "a", "title": "HW", "course": "PL-1",
        "due": "2025-03-03T23:59:00-06:00", "source": "PL", "completed": false},
  "typo": {"title": "Lab", "completed": "yes"}
}"#;
        fs::write(&path, content).unwrap();
        let store = RegistryStore::new(&path);

        store
            .update(|loaded| loaded.registry.set_completed("a", true).map(|_| ()))
            .unwrap();

        let raw: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["typo"], serde_json::json!({"title": "Lab", "completed": "yes"}));
        assert_eq!(raw["a"]["completed"], true);

        let reloaded = store.load().unwrap();
        assert_eq!(reloaded.issues().quarantined, vec!["typo".to_string()]);
    }

    #[test]
    fn a_valid_record_replaces_a_quarantined_entry() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(REGISTRY_FILE);
        fs::write(&path, r#"{"a": {"title": 7}}"#).unwrap();
        let store = RegistryStore::new(&path);

        store
            .update(|loaded| {
                loaded.registry.insert(record("a", false));
                Ok(())
            })
            .unwrap();

        let reloaded = store.load().unwrap();
        assert!(reloaded.quarantined.is_empty());
        assert_eq!(reloaded.registry.get("a").unwrap().title, "HW");
    }

    #[test]
    fn update_saves_changes_and_releases_lock() {
        let temp = TempDir::new().unwrap();
        let store = RegistryStore::new(temp.path().join(REGISTRY_FILE));
        store
            .save(&std::iter::once(record("a", false)).collect())
            .unwrap();

        store
            .update(|loaded| {
                loaded.registry.set_completed("a", true)?;
                Ok(())
            })
            .unwrap();

        assert!(store.load().unwrap().registry.get("a").unwrap().completed);
        assert!(FileLock::try_acquire(store.lock_path()).unwrap().is_some());
    }

    #[test]
    fn failed_update_writes_nothing() {
        let temp = TempDir::new().unwrap();
        let store = RegistryStore::new(temp.path().join(REGISTRY_FILE));

        let err = store
            .update(|loaded| loaded.registry.set_completed("missing", true).map(|_| ()))
            .unwrap_err();
        assert!(matches!(err, Error::TaskNotFound(_)));
        assert!(!store.path().exists());
    }

    #[test]
    fn update_times_out_while_locked() {
        let temp = TempDir::new().unwrap();
        let store = RegistryStore::new(temp.path().join(REGISTRY_FILE)).with_lock_timeout(50);
        let _held = FileLock::acquire(store.lock_path(), 1000).unwrap();

        let err = store.update(|_| Ok(())).unwrap_err();
        assert!(matches!(err, Error::LockFailed(_)));
    }
}
