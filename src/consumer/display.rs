//! Display accumulator for relayed stream messages.
//!
//! Owns the buffer the UI shows. A single `apply` dispatches on message
//! kind: first marker resets, chunk appends, complete stops the loading
//! indicator, error replaces the buffer verbatim. Messages from superseded
//! sessions are discarded by identifier.

use std::fmt;

use tracing::{debug, trace};

use crate::capability::DownloadProgress;
use crate::protocol::{Message, MessageEnvelope};

use super::render::render_markup;

// ─────────────────────────────────────────────────────────────────
// Display Phase
// ─────────────────────────────────────────────────────────────────

/// State of the display surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayPhase {
    /// Nothing shown.
    Empty,
    /// A session was adopted; no content yet.
    Loading,
    /// Content (or an error) is on screen.
    Displaying,
}

impl Default for DisplayPhase {
    fn default() -> Self {
        DisplayPhase::Empty
    }
}

impl fmt::Display for DisplayPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DisplayPhase::Empty => "empty",
            DisplayPhase::Loading => "loading",
            DisplayPhase::Displaying => "displaying",
        };
        write!(f, "{}", s)
    }
}

// ─────────────────────────────────────────────────────────────────
// Display State
// ─────────────────────────────────────────────────────────────────

/// The UI consumer's accumulating display state.
#[derive(Debug, Default)]
pub struct DisplayState {
    buffer: String,
    phase: DisplayPhase,
    loading: bool,
    failed: bool,
    /// Highest session identifier adopted so far. Messages carrying a
    /// different identifier are stale and discarded.
    session: Option<u64>,
    /// Persona ordinal of the adopted session.
    level: Option<u32>,
    /// Model download progress, while the capability readies.
    download: Option<DownloadProgress>,
    chunks_applied: usize,
}

impl DisplayState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one relayed envelope. Returns whether the visible state
    /// changed (i.e. the surface should re-render).
    pub fn apply(&mut self, envelope: &MessageEnvelope) -> bool {
        match &envelope.payload {
            Message::StreamResponse { text, is_first } => {
                if *is_first {
                    if !self.adopt(envelope) {
                        return false;
                    }
                    self.buffer.clear();
                    self.phase = DisplayPhase::Loading;
                    self.loading = true;
                    self.failed = false;
                    self.download = None;
                    self.chunks_applied = 0;
                    true
                } else {
                    if self.is_stale(envelope) {
                        return false;
                    }
                    self.buffer.push_str(text);
                    self.phase = DisplayPhase::Displaying;
                    self.chunks_applied += 1;
                    true
                }
            }
            Message::StreamComplete => {
                if self.is_stale(envelope) {
                    return false;
                }
                self.loading = false;
                if self.phase == DisplayPhase::Loading {
                    self.phase = DisplayPhase::Displaying;
                }
                true
            }
            Message::Error { message, .. } => {
                if self.is_stale(envelope) {
                    return false;
                }
                // Error text replaces the buffer verbatim.
                self.buffer = message.clone();
                self.phase = DisplayPhase::Displaying;
                self.loading = false;
                self.failed = true;
                self.download = None;
                true
            }
            Message::AiInitiate { loaded, total } => {
                if !self.adopt(envelope) {
                    return false;
                }
                self.loading = true;
                if self.phase == DisplayPhase::Empty {
                    self.phase = DisplayPhase::Loading;
                }
                self.download = Some(DownloadProgress {
                    loaded: *loaded,
                    total: *total,
                });
                true
            }
            Message::AiReady => {
                if self.is_stale(envelope) {
                    return false;
                }
                self.download = None;
                true
            }
            Message::SetLevel { .. } => {
                debug!("SET_LEVEL is relay-bound; display ignores it");
                false
            }
        }
    }

    /// Reset the display to empty. Does not cancel the relay; a live
    /// session keeps streaming and its chunks will reappear.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.phase = DisplayPhase::Empty;
        self.loading = false;
        self.failed = false;
        self.download = None;
        self.chunks_applied = 0;
    }

    /// Adopt a session-opening message if its identifier is not older
    /// than the adopted one.
    fn adopt(&mut self, envelope: &MessageEnvelope) -> bool {
        let Some(incoming) = envelope.session else {
            trace!("Session-opening message without identifier; applying as-is");
            return true;
        };
        match self.session {
            Some(current) if incoming < current => {
                debug!(
                    session = incoming,
                    current, "Discarding session-opening message from older session"
                );
                false
            }
            _ => {
                self.session = Some(incoming);
                self.level = Some(envelope.level);
                true
            }
        }
    }

    /// Whether an in-session message belongs to a session other than the
    /// adopted one.
    fn is_stale(&self, envelope: &MessageEnvelope) -> bool {
        match (envelope.session, self.session) {
            (Some(incoming), Some(current)) if incoming != current => {
                debug!(
                    session = incoming,
                    current, "Discarding stale message"
                );
                true
            }
            (Some(_), None) => {
                // Nothing adopted yet; without a first marker there is no
                // session to attach to.
                debug!("Discarding in-session message before any adoption");
                true
            }
            _ => false,
        }
    }

    // ─── Accessors ──────────────────────────────────────────────

    pub fn phase(&self) -> DisplayPhase {
        self.phase
    }

    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn failed(&self) -> bool {
        self.failed
    }

    pub fn session(&self) -> Option<u64> {
        self.session
    }

    pub fn level(&self) -> Option<u32> {
        self.level
    }

    pub fn download(&self) -> Option<DownloadProgress> {
        self.download
    }

    pub fn chunks_applied(&self) -> usize {
        self.chunks_applied
    }

    /// The buffer rendered as sanitized rich text. Pure function of the
    /// buffer; safe to call on every update.
    pub fn rendered(&self) -> String {
        render_markup(&self.buffer)
    }
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn first(session: u64, level: u32) -> MessageEnvelope {
        MessageEnvelope::for_session(session, level, Message::first_marker())
    }

    fn chunk(session: u64, level: u32, text: &str) -> MessageEnvelope {
        MessageEnvelope::for_session(session, level, Message::chunk(text))
    }

    fn complete(session: u64, level: u32) -> MessageEnvelope {
        MessageEnvelope::for_session(session, level, Message::StreamComplete)
    }

    #[test]
    fn test_accumulates_in_order() {
        let mut display = DisplayState::new();
        assert_eq!(display.phase(), DisplayPhase::Empty);

        assert!(display.apply(&first(1, 2)));
        assert_eq!(display.phase(), DisplayPhase::Loading);
        assert!(display.is_loading());

        assert!(display.apply(&chunk(1, 2, "Hello, ")));
        assert!(display.apply(&chunk(1, 2, "world")));
        assert_eq!(display.phase(), DisplayPhase::Displaying);
        assert_eq!(display.buffer(), "Hello, world");
        assert_eq!(display.chunks_applied(), 2);

        assert!(display.apply(&complete(1, 2)));
        assert!(!display.is_loading());
        assert_eq!(display.buffer(), "Hello, world");
        assert_eq!(display.level(), Some(2));
    }

    #[test]
    fn test_first_marker_resets_buffer() {
        let mut display = DisplayState::new();
        display.apply(&first(1, 1));
        display.apply(&chunk(1, 1, "old content"));
        display.apply(&complete(1, 1));

        display.apply(&first(2, 1));
        assert_eq!(display.buffer(), "");
        assert_eq!(display.phase(), DisplayPhase::Loading);
        assert_eq!(display.session(), Some(2));
    }

    #[test]
    fn test_error_replaces_buffer_verbatim() {
        let mut display = DisplayState::new();
        display.apply(&first(1, 1));
        display.apply(&chunk(1, 1, "partial "));

        let error = MessageEnvelope::for_session(
            1,
            1,
            Message::Error {
                code: "E400".to_string(),
                message: "Stream failed: backend exploded".to_string(),
            },
        );
        assert!(display.apply(&error));
        assert_eq!(display.buffer(), "Stream failed: backend exploded");
        assert!(display.failed());
        assert!(!display.is_loading());
    }

    #[test]
    fn test_stale_session_discarded() {
        let mut display = DisplayState::new();
        display.apply(&first(1, 1));
        display.apply(&chunk(1, 1, "from one"));

        // A newer session adopts the display.
        display.apply(&first(2, 3));
        display.apply(&chunk(2, 3, "from two"));

        // Late messages from session 1 must not touch the buffer.
        assert!(!display.apply(&chunk(1, 1, " stale")));
        assert!(!display.apply(&complete(1, 1)));
        assert_eq!(display.buffer(), "from two");
        assert_eq!(display.session(), Some(2));
        assert_eq!(display.level(), Some(3));

        // An old first marker cannot re-adopt either.
        assert!(!display.apply(&first(1, 1)));
        assert_eq!(display.session(), Some(2));
    }

    #[test]
    fn test_clear_resets_immediately() {
        let mut display = DisplayState::new();
        display.apply(&first(1, 1));
        display.apply(&chunk(1, 1, "streaming content"));

        display.clear();
        assert_eq!(display.phase(), DisplayPhase::Empty);
        assert_eq!(display.buffer(), "");
        assert!(!display.is_loading());

        // The live session keeps streaming; its chunks reappear.
        assert!(display.apply(&chunk(1, 1, "more")));
        assert_eq!(display.buffer(), "more");
    }

    #[test]
    fn test_download_progress_tracking() {
        let mut display = DisplayState::new();

        let initiate = MessageEnvelope::for_session(
            1,
            1,
            Message::AiInitiate {
                loaded: 250,
                total: 1000,
            },
        );
        assert!(display.apply(&initiate));
        assert_eq!(display.phase(), DisplayPhase::Loading);
        assert_eq!(display.download().unwrap().percent(), 25);
        assert_eq!(display.session(), Some(1));

        let ready = MessageEnvelope::for_session(1, 1, Message::AiReady);
        assert!(display.apply(&ready));
        assert!(display.download().is_none());
        assert!(display.is_loading());
    }

    #[test]
    fn test_chunk_before_adoption_discarded() {
        let mut display = DisplayState::new();
        assert!(!display.apply(&chunk(1, 1, "orphan")));
        assert_eq!(display.buffer(), "");
        assert_eq!(display.phase(), DisplayPhase::Empty);
    }

    #[test]
    fn test_set_level_ignored() {
        let mut display = DisplayState::new();
        let level = crate::persona::builtin_levels().remove(0);
        let envelope = MessageEnvelope::new(level.level, Message::SetLevel { level });
        assert!(!display.apply(&envelope));
        assert_eq!(display.phase(), DisplayPhase::Empty);
    }

    #[test]
    fn test_complete_without_chunks() {
        let mut display = DisplayState::new();
        display.apply(&first(1, 1));
        assert!(display.apply(&complete(1, 1)));
        assert_eq!(display.phase(), DisplayPhase::Displaying);
        assert_eq!(display.buffer(), "");
        assert!(!display.is_loading());
    }
}
