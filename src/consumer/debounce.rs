//! Trigger debouncing.
//!
//! The original debounces selection events so rapid-fire triggers collapse
//! into one. This is the leading-edge rendition: the first event fires,
//! repeats inside the interval are swallowed.

use std::time::{Duration, Instant};

#[derive(Debug)]
pub struct Debouncer {
    interval: Duration,
    last_fire: Option<Instant>,
}

impl Debouncer {
    pub fn new(interval_ms: u64) -> Self {
        Self {
            interval: Duration::from_millis(interval_ms),
            last_fire: None,
        }
    }

    /// Whether an event arriving now should fire. A firing event starts a
    /// new interval; swallowed events do not extend it.
    pub fn allow(&mut self) -> bool {
        let now = Instant::now();
        match self.last_fire {
            Some(last) if now.duration_since(last) < self.interval => false,
            _ => {
                self.last_fire = Some(now);
                true
            }
        }
    }

    /// Forget the last firing, so the next event fires immediately.
    pub fn reset(&mut self) {
        self.last_fire = None;
    }
}
