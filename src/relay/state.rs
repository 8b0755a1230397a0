//! Streaming session state tracking.
//!
//! Allocates monotonically increasing session identifiers, tracks each
//! session's lifecycle, and carries the shared cancellation flag a
//! superseding trigger flips.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::capability::CapabilityKind;

// ─────────────────────────────────────────────────────────────────
// Relay Phase
// ─────────────────────────────────────────────────────────────────

/// Where the relay currently is in its state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelayPhase {
    /// No active session.
    Idle,
    /// Querying capability availability for a fresh trigger.
    AvailabilityCheck,
    /// Capability is downloading its model.
    AwaitingDownload,
    /// Capability open, about to stream.
    Ready,
    /// Chunks are flowing.
    Streaming,
}

impl Default for RelayPhase {
    fn default() -> Self {
        RelayPhase::Idle
    }
}

// ─────────────────────────────────────────────────────────────────
// Session State
// ─────────────────────────────────────────────────────────────────

/// Lifecycle state of one streaming session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Session allocated, availability check or open in progress.
    Starting,
    /// Chunks are being forwarded.
    Streaming,
    /// Chunk sequence exhausted normally.
    Completed,
    /// Ended with an error.
    Failed,
    /// Superseded by a newer trigger (or shut down).
    Cancelled,
}

impl SessionState {
    /// Whether the session can still produce messages.
    pub fn is_active(&self) -> bool {
        matches!(self, SessionState::Starting | SessionState::Streaming)
    }
}

/// One tracked streaming session.
#[derive(Debug)]
pub struct ActiveSession {
    /// Monotonic session identifier.
    pub id: u64,

    /// Capability variant driving this session.
    pub kind: CapabilityKind,

    /// Persona ordinal the session was started under.
    pub level: u32,

    /// Current lifecycle state.
    pub state: SessionState,

    /// When the session was allocated.
    pub started_at: Instant,

    /// When the session reached a terminal state.
    pub ended_at: Option<Instant>,

    /// Cooperative cancellation flag shared with the producer callback.
    pub cancel: Arc<AtomicBool>,

    /// Chunks forwarded so far.
    pub chunks_relayed: usize,

    /// Error message if the session failed.
    pub error: Option<String>,
}

impl ActiveSession {
    fn new(id: u64, kind: CapabilityKind, level: u32) -> Self {
        Self {
            id,
            kind,
            level,
            state: SessionState::Starting,
            started_at: Instant::now(),
            ended_at: None,
            cancel: Arc::new(AtomicBool::new(false)),
            chunks_relayed: 0,
            error: None,
        }
    }

    fn mark_streaming(&mut self) {
        self.state = SessionState::Streaming;
    }

    fn mark_completed(&mut self) {
        self.state = SessionState::Completed;
        self.ended_at = Some(Instant::now());
    }

    fn mark_failed(&mut self, error: String) {
        self.state = SessionState::Failed;
        self.ended_at = Some(Instant::now());
        self.error = Some(error);
    }

    fn mark_cancelled(&mut self) {
        self.cancel.store(true, Ordering::Relaxed);
        self.state = SessionState::Cancelled;
        self.ended_at = Some(Instant::now());
    }

    /// Wall-clock duration of the session so far.
    pub fn duration_ms(&self) -> u64 {
        self.ended_at
            .map(|end| (end - self.started_at).as_millis() as u64)
            .unwrap_or_else(|| self.started_at.elapsed().as_millis() as u64)
    }
}

// ─────────────────────────────────────────────────────────────────
// Status Snapshot
// ─────────────────────────────────────────────────────────────────

/// Point-in-time snapshot of relay state, for status queries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayStatus {
    pub phase: RelayPhase,
    pub current_session: Option<u64>,
    pub active_sessions: usize,
    pub completed: u64,
    pub failed: u64,
    pub cancelled: u64,
}

// ─────────────────────────────────────────────────────────────────
// Session Tracker
// ─────────────────────────────────────────────────────────────────

/// Tracks active and recently ended streaming sessions.
///
/// `begin` allocates the next identifier and supersedes the previous
/// current session in the same critical section, so no two sessions can
/// both believe they are current.
pub struct SessionTracker {
    next_id: AtomicU64,
    sessions: RwLock<HashMap<u64, ActiveSession>>,
    current: RwLock<Option<u64>>,
    phase: RwLock<RelayPhase>,
    cancel_superseded: bool,
    completed_count: RwLock<u64>,
    failed_count: RwLock<u64>,
    cancelled_count: RwLock<u64>,
}

impl SessionTracker {
    /// Create a tracker. `cancel_superseded` controls whether a new
    /// trigger flips the previous session's cancellation flag.
    pub fn new(cancel_superseded: bool) -> Self {
        Self {
            next_id: AtomicU64::new(1),
            sessions: RwLock::new(HashMap::new()),
            current: RwLock::new(None),
            phase: RwLock::new(RelayPhase::Idle),
            cancel_superseded,
            completed_count: RwLock::new(0),
            failed_count: RwLock::new(0),
            cancelled_count: RwLock::new(0),
        }
    }

    /// Begin a new session, superseding any current one.
    ///
    /// Returns the new identifier and its cancellation flag.
    pub fn begin(&self, kind: CapabilityKind, level: u32) -> (u64, Arc<AtomicBool>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);

        let mut sessions = self.sessions.write();
        let mut current = self.current.write();

        if let Some(prev_id) = current.take() {
            if let Some(prev) = sessions.get_mut(&prev_id) {
                if prev.state.is_active() {
                    if self.cancel_superseded {
                        prev.mark_cancelled();
                        *self.cancelled_count.write() += 1;
                        tracing::debug!(
                            session = prev_id,
                            superseded_by = id,
                            "Superseded session cancelled"
                        );
                    } else {
                        tracing::debug!(
                            session = prev_id,
                            superseded_by = id,
                            "Session superseded; producer left running"
                        );
                    }
                }
            }
        }

        let session = ActiveSession::new(id, kind, level);
        let cancel = Arc::clone(&session.cancel);
        sessions.insert(id, session);
        *current = Some(id);

        (id, cancel)
    }

    /// Whether `id` is still the most recently started session.
    pub fn is_current(&self, id: u64) -> bool {
        *self.current.read() == Some(id)
    }

    /// Identifier of the current session, if any.
    pub fn current_id(&self) -> Option<u64> {
        *self.current.read()
    }

    /// Current relay phase.
    pub fn phase(&self) -> RelayPhase {
        *self.phase.read()
    }

    /// Set the relay phase, but only on behalf of the current session.
    /// A superseded session's late transitions are ignored.
    pub fn set_phase(&self, id: u64, phase: RelayPhase) {
        if self.is_current(id) {
            *self.phase.write() = phase;
        }
    }

    /// Mark the current session's transition into streaming.
    pub fn mark_streaming(&self, id: u64) {
        let mut sessions = self.sessions.write();
        if let Some(session) = sessions.get_mut(&id) {
            if session.state.is_active() {
                session.mark_streaming();
            }
        }
    }

    /// Record one forwarded chunk.
    pub fn record_chunk(&self, id: u64) {
        let mut sessions = self.sessions.write();
        if let Some(session) = sessions.get_mut(&id) {
            session.chunks_relayed += 1;
        }
    }

    /// Mark a session completed. No-op if it already ended.
    pub fn mark_completed(&self, id: u64) {
        let mut sessions = self.sessions.write();
        if let Some(session) = sessions.get_mut(&id) {
            if session.state.is_active() {
                session.mark_completed();
                *self.completed_count.write() += 1;
            }
        }
    }

    /// Mark a session failed. No-op if it already ended.
    pub fn mark_failed(&self, id: u64, error: String) {
        let mut sessions = self.sessions.write();
        if let Some(session) = sessions.get_mut(&id) {
            if session.state.is_active() {
                session.mark_failed(error);
                *self.failed_count.write() += 1;
            }
        }
    }

    /// Cancel the current session, if one is active. Returns whether a
    /// session was cancelled.
    pub fn cancel_current(&self) -> bool {
        let mut sessions = self.sessions.write();
        let current = self.current.read();
        if let Some(id) = *current {
            if let Some(session) = sessions.get_mut(&id) {
                if session.state.is_active() {
                    session.mark_cancelled();
                    *self.cancelled_count.write() += 1;
                    return true;
                }
            }
        }
        false
    }

    /// Whether a session's cancellation flag has been flipped.
    pub fn is_cancelled(&self, id: u64) -> bool {
        self.sessions
            .read()
            .get(&id)
            .map(|s| s.cancel.load(Ordering::Relaxed))
            .unwrap_or(true)
    }

    /// Chunks forwarded by a session so far.
    pub fn chunks_relayed(&self, id: u64) -> usize {
        self.sessions
            .read()
            .get(&id)
            .map(|s| s.chunks_relayed)
            .unwrap_or(0)
    }

    /// Wall-clock duration of a session in milliseconds.
    pub fn session_duration_ms(&self, id: u64) -> u64 {
        self.sessions
            .read()
            .get(&id)
            .map(|s| s.duration_ms())
            .unwrap_or(0)
    }

    /// Count of sessions still able to produce messages.
    pub fn active_count(&self) -> usize {
        self.sessions
            .read()
            .values()
            .filter(|s| s.state.is_active())
            .count()
    }

    /// Total sessions completed since startup.
    pub fn total_completed(&self) -> u64 {
        *self.completed_count.read()
    }

    /// Total sessions failed since startup.
    pub fn total_failed(&self) -> u64 {
        *self.failed_count.read()
    }

    /// Total sessions cancelled since startup.
    pub fn total_cancelled(&self) -> u64 {
        *self.cancelled_count.read()
    }

    /// Snapshot for status queries.
    pub fn status(&self) -> RelayStatus {
        RelayStatus {
            phase: self.phase(),
            current_session: self.current_id(),
            active_sessions: self.active_count(),
            completed: self.total_completed(),
            failed: self.total_failed(),
            cancelled: self.total_cancelled(),
        }
    }

    /// Drop ended sessions, keeping the most recent `keep_count`.
    pub fn cleanup_old_sessions(&self, keep_count: usize) {
        let mut sessions = self.sessions.write();

        let mut ended: Vec<_> = sessions
            .iter()
            .filter(|(_, s)| !s.state.is_active())
            .map(|(id, s)| (*id, s.ended_at))
            .collect();

        ended.sort_by(|a, b| a.1.cmp(&b.1));

        let to_remove = ended.len().saturating_sub(keep_count);
        for (id, _) in ended.into_iter().take(to_remove) {
            sessions.remove(&id);
        }
    }
}

impl Default for SessionTracker {
    fn default() -> Self {
        Self::new(true)
    }
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_ids_are_monotonic() {
        let tracker = SessionTracker::new(true);
        let (a, _) = tracker.begin(CapabilityKind::Summarizer, 1);
        let (b, _) = tracker.begin(CapabilityKind::Summarizer, 1);
        let (c, _) = tracker.begin(CapabilityKind::PromptSession, 2);
        assert!(a < b && b < c);
        assert_eq!(tracker.current_id(), Some(c));
    }

    #[test]
    fn test_supersede_cancels_previous() {
        let tracker = SessionTracker::new(true);
        let (first, cancel_first) = tracker.begin(CapabilityKind::Summarizer, 1);
        assert!(!cancel_first.load(Ordering::Relaxed));

        let (second, _) = tracker.begin(CapabilityKind::Summarizer, 1);
        assert!(cancel_first.load(Ordering::Relaxed));
        assert!(!tracker.is_current(first));
        assert!(tracker.is_current(second));
        assert_eq!(tracker.total_cancelled(), 1);
    }

    #[test]
    fn test_supersede_without_cancellation() {
        let tracker = SessionTracker::new(false);
        let (first, cancel_first) = tracker.begin(CapabilityKind::Summarizer, 1);
        tracker.begin(CapabilityKind::Summarizer, 1);

        // Old producer keeps running; only currency changes.
        assert!(!cancel_first.load(Ordering::Relaxed));
        assert!(!tracker.is_current(first));
        assert_eq!(tracker.total_cancelled(), 0);
    }

    #[test]
    fn test_session_lifecycle_counters() {
        let tracker = SessionTracker::new(true);

        let (id, _) = tracker.begin(CapabilityKind::Summarizer, 1);
        tracker.mark_streaming(id);
        tracker.record_chunk(id);
        tracker.record_chunk(id);
        tracker.mark_completed(id);

        assert_eq!(tracker.chunks_relayed(id), 2);
        assert_eq!(tracker.total_completed(), 1);
        assert_eq!(tracker.active_count(), 0);
    }

    #[test]
    fn test_mark_after_cancel_is_noop() {
        let tracker = SessionTracker::new(true);
        let (first, _) = tracker.begin(CapabilityKind::Summarizer, 1);
        tracker.begin(CapabilityKind::Summarizer, 1);

        // The superseded session finishing late must not re-count.
        tracker.mark_completed(first);
        tracker.mark_failed(first, "late failure".to_string());
        assert_eq!(tracker.total_completed(), 0);
        assert_eq!(tracker.total_failed(), 0);
        assert_eq!(tracker.total_cancelled(), 1);
    }

    #[test]
    fn test_stale_session_cannot_move_phase() {
        let tracker = SessionTracker::new(true);
        let (first, _) = tracker.begin(CapabilityKind::Summarizer, 1);
        let (second, _) = tracker.begin(CapabilityKind::Summarizer, 1);

        tracker.set_phase(second, RelayPhase::Streaming);
        tracker.set_phase(first, RelayPhase::Idle);
        assert_eq!(tracker.phase(), RelayPhase::Streaming);
    }

    #[test]
    fn test_cancel_current() {
        let tracker = SessionTracker::new(true);
        assert!(!tracker.cancel_current());

        let (id, cancel) = tracker.begin(CapabilityKind::PromptSession, 3);
        assert!(tracker.cancel_current());
        assert!(cancel.load(Ordering::Relaxed));
        assert!(tracker.is_cancelled(id));
        assert!(!tracker.cancel_current());
    }

    #[test]
    fn test_status_snapshot() {
        let tracker = SessionTracker::new(true);
        let (id, _) = tracker.begin(CapabilityKind::Summarizer, 2);
        tracker.set_phase(id, RelayPhase::AvailabilityCheck);

        let status = tracker.status();
        assert_eq!(status.phase, RelayPhase::AvailabilityCheck);
        assert_eq!(status.current_session, Some(id));
        assert_eq!(status.active_sessions, 1);
        assert_eq!(status.completed, 0);
    }

    #[test]
    fn test_cleanup_keeps_recent() {
        let tracker = SessionTracker::new(true);
        for _ in 0..5 {
            let (id, _) = tracker.begin(CapabilityKind::Summarizer, 1);
            tracker.mark_completed(id);
        }
        tracker.cleanup_old_sessions(2);
        assert_eq!(tracker.sessions.read().len(), 2);
    }
}
