//! Prompt stream chunk normalization.
//!
//! Some prompt providers stream cumulatively: each chunk carries the whole
//! response so far rather than just the new text. `CumulativeDelta` turns
//! either shape into plain deltas so downstream consumers can always append.

/// Tracks the previously seen chunk and extracts the new suffix.
#[derive(Debug, Default)]
pub struct CumulativeDelta {
    seen: String,
}

impl CumulativeDelta {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed the next raw chunk and get back only the new text.
    ///
    /// If the chunk extends the previous one it is cumulative and the new
    /// suffix is returned. Otherwise the provider is already emitting
    /// deltas and the chunk passes through whole. Either way the chunk
    /// becomes the new comparison point.
    pub fn delta(&mut self, chunk: &str) -> String {
        let delta = match chunk.strip_prefix(self.seen.as_str()) {
            Some(suffix) => suffix.to_string(),
            None => chunk.to_string(),
        };
        self.seen = chunk.to_string();
        delta
    }

    /// Forget the previous chunk, e.g. between prompt turns.
    pub fn reset(&mut self) {
        self.seen.clear();
    }
}
