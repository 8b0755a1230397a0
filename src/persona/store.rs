//! Persona store: static table plus storage-backed selection records.
//!
//! The store owns no mutable current value. The relay calls `load_current`
//! at session start and threads the owned level through the session; the UI
//! keeps its own `selected_level` record in the sync area.

use tracing::{debug, warn};

use crate::error::Result;
use crate::storage::{JsonStore, StorageArea};

use super::types::{builtin_levels, level_or_first, PersonaLevel};

// ─────────────────────────────────────────────────────────────────
// Constants
// ─────────────────────────────────────────────────────────────────

/// Background-scoped selection record
pub const CURRENT_LEVEL_KEY: &str = "current_level";
/// UI-scoped selection record
pub const SELECTED_LEVEL_KEY: &str = "selected_level";

// ─────────────────────────────────────────────────────────────────
// Persona Store
// ─────────────────────────────────────────────────────────────────

/// Static persona table with durable selection records.
#[derive(Debug, Clone)]
pub struct PersonaStore {
    levels: Vec<PersonaLevel>,
    storage: JsonStore,
}

impl PersonaStore {
    /// Create a store over the built-in table.
    pub fn new(storage: JsonStore) -> Self {
        Self {
            levels: builtin_levels(),
            storage,
        }
    }

    /// Create a store over an explicit table (used by tests).
    pub fn with_levels(storage: JsonStore, levels: Vec<PersonaLevel>) -> Self {
        assert!(!levels.is_empty(), "persona table must not be empty");
        Self { levels, storage }
    }

    /// The ordered persona table.
    pub fn list(&self) -> &[PersonaLevel] {
        &self.levels
    }

    /// Look up a level by ordinal, falling back to the first entry.
    pub fn get(&self, ordinal: u32) -> PersonaLevel {
        level_or_first(&self.levels, ordinal).clone()
    }

    // ─────────────────────────────────────────────────────────────
    // Selection Records
    // ─────────────────────────────────────────────────────────────

    /// Load the background-scoped current level.
    ///
    /// Never fails the caller: storage trouble is logged and the first table
    /// entry is returned, and a stored ordinal is resolved against the
    /// compiled-in table so a stale record cannot smuggle in foreign text.
    pub fn load_current(&self) -> PersonaLevel {
        self.load_record(StorageArea::Local, CURRENT_LEVEL_KEY)
    }

    /// Persist the background-scoped current level.
    pub fn save_current(&self, level: &PersonaLevel) -> Result<()> {
        debug!(level = level.level, name = %level.name, "Persisting current level");
        self.storage
            .write(StorageArea::Local, CURRENT_LEVEL_KEY, level)
    }

    /// Load the UI-scoped selected level.
    pub fn load_selected(&self) -> PersonaLevel {
        self.load_record(StorageArea::Sync, SELECTED_LEVEL_KEY)
    }

    /// Persist the UI-scoped selected level.
    pub fn save_selected(&self, level: &PersonaLevel) -> Result<()> {
        debug!(level = level.level, name = %level.name, "Persisting selected level");
        self.storage
            .write(StorageArea::Sync, SELECTED_LEVEL_KEY, level)
    }

    fn load_record(&self, area: StorageArea, key: &str) -> PersonaLevel {
        match self.storage.read::<PersonaLevel>(area, key) {
            Ok(Some(stored)) => self.get(stored.level),
            Ok(None) => self.levels[0].clone(),
            Err(e) => {
                warn!(key, error = %e.format_for_log(), "Storage read failed; using first level");
                self.levels[0].clone()
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────
