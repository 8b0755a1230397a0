//! Durable key-value storage
//!
//! Backs the persona selection records (`current_level`, `selected_level`)
//! with JSON files split into background-local and UI-sync areas.

mod json_store;

pub use json_store::*;
