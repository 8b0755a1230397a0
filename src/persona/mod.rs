//! Persona level system: the static register table and its selection state.
//!
//! Each streaming session runs under one persona level. The table is compiled
//! in; the current and UI-selected ordinals persist in durable storage and
//! fall back to the first entry whenever a record is missing or unreadable.

pub mod store;
pub mod types;

pub use store::{PersonaStore, CURRENT_LEVEL_KEY, SELECTED_LEVEL_KEY};
pub use types::{builtin_levels, level_or_first, PersonaLevel};
