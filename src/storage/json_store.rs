//! JSON-file key-value storage.
//!
//! Durable records live as one pretty-printed JSON file per key, split into
//! two areas mirroring the platform storage the relay was designed against:
//! `local` (background-scoped) and `sync` (UI-scoped, synchronized).
//!
//! Reads never fail the caller out of a usable state: a missing or malformed
//! record surfaces as `Ok(None)` (with a warn for the malformed case) so the
//! persona layer can fall back to its first built-in entry. Writes surface
//! real errors as `Error::StorageFailure`.

use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::warn;

use crate::error::{Error, Result};

/// Default storage root under the user's home directory
const DEFAULT_STORAGE_DIR: &str = ".webai-relay/storage";

// ─────────────────────────────────────────────────────────────────
// Storage Areas
// ─────────────────────────────────────────────────────────────────

/// The two record scopes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageArea {
    /// Background-scoped records (the relay's view)
    Local,
    /// UI-scoped, synchronized records (the consumer's view)
    Sync,
}

impl StorageArea {
    /// Subdirectory name for this area
    pub fn dir_name(&self) -> &'static str {
        match self {
            StorageArea::Local => "local",
            StorageArea::Sync => "sync",
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// JSON Store
// ─────────────────────────────────────────────────────────────────

/// File-backed key-value store with per-area subdirectories
#[derive(Debug, Clone)]
pub struct JsonStore {
    root: PathBuf,
}

impl JsonStore {
    /// Create a store rooted at the given directory
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Create a store rooted at the default location (~/.webai-relay/storage)
    pub fn with_defaults() -> Result<Self> {
        let home = dirs::home_dir()
            .ok_or_else(|| Error::Config("Could not determine home directory".to_string()))?;
        Ok(Self::new(home.join(DEFAULT_STORAGE_DIR)))
    }

    /// The storage root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the area subdirectories if they do not exist
    pub fn ensure_dirs(&self) -> Result<()> {
        for area in [StorageArea::Local, StorageArea::Sync] {
            let dir = self.root.join(area.dir_name());
            fs::create_dir_all(&dir).map_err(|e| Error::IoWrite {
                path: dir.clone(),
                source: e,
            })?;
        }
        Ok(())
    }

    fn record_path(&self, area: StorageArea, key: &str) -> PathBuf {
        self.root.join(area.dir_name()).join(format!("{}.json", key))
    }

    /// Read a record, treating missing and malformed records as absent
    pub fn read<T: DeserializeOwned>(&self, area: StorageArea, key: &str) -> Result<Option<T>> {
        let path = self.record_path(area, key);

        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Error::storage_failure(key, e)),
        };

        match serde_json::from_str(&raw) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                warn!(
                    key,
                    area = area.dir_name(),
                    error = %Error::storage_malformed(key, e.to_string()).format_for_log(),
                    "Ignoring malformed storage record"
                );
                Ok(None)
            }
        }
    }

    /// Write a record, creating the area directory on demand
    pub fn write<T: Serialize>(&self, area: StorageArea, key: &str, value: &T) -> Result<()> {
        let path = self.record_path(area, key);

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| Error::storage_failure(key, e))?;
        }

        let json = serde_json::to_string_pretty(value)?;
        fs::write(&path, json).map_err(|e| Error::storage_failure(key, e))?;
        Ok(())
    }

    /// Remove a record if present
    pub fn remove(&self, area: StorageArea, key: &str) -> Result<()> {
        let path = self.record_path(area, key);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::storage_failure(key, e)),
        }
    }

    /// Check whether a record exists on disk
    pub fn exists(&self, area: StorageArea, key: &str) -> bool {
        self.record_path(area, key).exists()
    }
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use tempfile::TempDir;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Record {
        name: String,
        count: u32,
    }

    fn test_store() -> (TempDir, JsonStore) {
        let dir = TempDir::new().unwrap();
        let store = JsonStore::new(dir.path());
        (dir, store)
    }

    #[test]
    fn test_write_then_read() {
        let (_dir, store) = test_store();
        let record = Record {
            name: "alpha".to_string(),
            count: 3,
        };

        store
            .write(StorageArea::Local, "current_level", &record)
            .unwrap();
        let loaded: Option<Record> = store.read(StorageArea::Local, "current_level").unwrap();

        assert_eq!(loaded, Some(record));
    }

    #[test]
    fn test_missing_record_is_none() {
        let (_dir, store) = test_store();
        let loaded: Option<Record> = store.read(StorageArea::Sync, "selected_level").unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn test_malformed_record_is_none() {
        let (dir, store) = test_store();
        let path = dir.path().join("local");
        fs::create_dir_all(&path).unwrap();
        fs::write(path.join("current_level.json"), "{not json at all").unwrap();

        let loaded: Option<Record> = store.read(StorageArea::Local, "current_level").unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn test_areas_are_separate() {
        let (_dir, store) = test_store();
        let local = Record {
            name: "local".to_string(),
            count: 1,
        };
        let sync = Record {
            name: "sync".to_string(),
            count: 2,
        };

        store.write(StorageArea::Local, "level", &local).unwrap();
        store.write(StorageArea::Sync, "level", &sync).unwrap();

        let from_local: Option<Record> = store.read(StorageArea::Local, "level").unwrap();
        let from_sync: Option<Record> = store.read(StorageArea::Sync, "level").unwrap();

        assert_eq!(from_local.unwrap().name, "local");
        assert_eq!(from_sync.unwrap().name, "sync");
    }

    #[test]
    fn test_remove() {
        let (_dir, store) = test_store();
        let record = Record {
            name: "gone".to_string(),
            count: 0,
        };

        store.write(StorageArea::Local, "level", &record).unwrap();
        assert!(store.exists(StorageArea::Local, "level"));

        store.remove(StorageArea::Local, "level").unwrap();
        assert!(!store.exists(StorageArea::Local, "level"));

        // Removing an absent record is not an error
        store.remove(StorageArea::Local, "level").unwrap();
    }

    #[test]
    fn test_ensure_dirs() {
        let (dir, store) = test_store();
        store.ensure_dirs().unwrap();

        assert!(dir.path().join("local").is_dir());
        assert!(dir.path().join("sync").is_dir());
    }

    #[test]
    fn test_overwrite_replaces_record() {
        let (_dir, store) = test_store();
        let first = Record {
            name: "one".to_string(),
            count: 1,
        };
        let second = Record {
            name: "two".to_string(),
            count: 2,
        };

        store.write(StorageArea::Sync, "selected_level", &first).unwrap();
        store.write(StorageArea::Sync, "selected_level", &second).unwrap();

        let loaded: Option<Record> = store.read(StorageArea::Sync, "selected_level").unwrap();
        assert_eq!(loaded, Some(second));
    }
}
