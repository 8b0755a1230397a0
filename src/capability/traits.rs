//! Capability and session traits.
//!
//! All four capability variants are reached through one pair of traits:
//! `Capability` answers availability and opens sessions, `CapabilitySession`
//! runs invocations. Variants that lack an operation inherit a default
//! method returning `Error::NotSupported` rather than carrying their own
//! trait shape.

use std::sync::Arc;

use async_trait::async_trait;

use crate::capability::kinds::{
    Availability, CapabilityKind, DownloadProgress, InvokeOutput, OpenOptions,
};
use crate::error::{Error, Result};

// ─────────────────────────────────────────────────────────────────
// Streaming Types
// ─────────────────────────────────────────────────────────────────

/// One chunk of a streamed response.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamChunk {
    /// Text fragment to append to what came before.
    pub text: String,
    /// Set on the last chunk of the stream.
    pub is_final: bool,
}

impl StreamChunk {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_final: false,
        }
    }

    pub fn final_chunk(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_final: true,
        }
    }
}

/// Callback invoked for each streamed chunk.
///
/// Return `false` to stop the stream early; the session must observe the
/// signal and stop producing promptly.
pub type ChunkCallback = Box<dyn Fn(StreamChunk) -> bool + Send + Sync>;

/// Callback invoked with model download progress while a capability readies.
pub type ProgressCallback = Box<dyn Fn(DownloadProgress) + Send + Sync>;

/// Statistics from a completed (or stopped) stream invocation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreamStats {
    /// Chunks delivered to the callback.
    pub chunks_emitted: usize,
    /// Characters delivered across all chunks.
    pub chars_emitted: usize,
    /// Wall-clock duration of the invocation.
    pub duration_ms: u64,
    /// Whether the callback stopped the stream before completion.
    pub stopped_early: bool,
}

impl StreamStats {
    /// Characters per second, or 0.0 for an instant stream.
    pub fn chars_per_second(&self) -> f64 {
        if self.duration_ms == 0 {
            return 0.0;
        }
        (self.chars_emitted as f64) / (self.duration_ms as f64 / 1000.0)
    }
}

// ─────────────────────────────────────────────────────────────────
// Capability Trait
// ─────────────────────────────────────────────────────────────────

/// A platform capability: a factory for sessions of one `CapabilityKind`.
///
/// Implementations must be cheap to query; the expensive work (model
/// download, context allocation) happens in `open`.
#[async_trait]
pub trait Capability: Send + Sync {
    /// Which variant this capability provides.
    fn kind(&self) -> CapabilityKind;

    /// Provider name (e.g. "mock").
    fn provider(&self) -> &str;

    /// Whether sessions can be opened here, possibly after a download.
    ///
    /// For the translator the options carry the language pair, and
    /// availability is answered per pair.
    async fn availability(&self, options: &OpenOptions) -> Result<Availability>;

    /// Open a session with the given options.
    ///
    /// If a model download is required, `progress` is invoked with loaded
    /// and total byte counts until the download completes. Returns
    /// `Error::CreationFailure` when a usable capability fails to open.
    async fn open(
        &self,
        options: OpenOptions,
        progress: Option<ProgressCallback>,
    ) -> Result<Box<dyn CapabilitySession>>;
}

// ─────────────────────────────────────────────────────────────────
// Session Trait
// ─────────────────────────────────────────────────────────────────

/// An open capability session, ready for invocations.
///
/// Translator and language detector sessions implement `invoke`;
/// summarizer and prompt sessions implement `stream_invoke`. The unneeded
/// operation keeps its default `NotSupported` body.
#[async_trait]
pub trait CapabilitySession: Send + Sync {
    /// The variant this session belongs to.
    fn kind(&self) -> CapabilityKind;

    /// Run a single-shot invocation and return the full result.
    async fn invoke(&self, _input: &str) -> Result<InvokeOutput> {
        Err(Error::NotSupported(format!(
            "{} does not support single-shot invocation",
            self.kind()
        )))
    }

    /// Run a streaming invocation, delivering chunks through `callback`.
    ///
    /// Chunks are deltas: each carries only new text. The final chunk has
    /// `is_final` set. When the callback returns `false` the stream stops
    /// and the stats report `stopped_early`.
    async fn stream_invoke(&self, _input: &str, _callback: ChunkCallback) -> Result<StreamStats> {
        Err(Error::NotSupported(format!(
            "{} does not support streaming invocation",
            self.kind()
        )))
    }

    /// Release session resources. Idempotent.
    async fn destroy(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Shared handle to a capability.
pub type SharedCapability = Arc<dyn Capability>;

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────
