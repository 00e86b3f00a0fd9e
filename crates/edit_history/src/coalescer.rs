use std::time::{Duration, Instant};

use text_buffer::TextChange;
use tracing::trace;

/// Debounces undo recording: changes recorded within `window` of each other
/// are compressed into one pending unit, flushed once the window passes
/// without a new edit.
#[derive(Debug, Clone)]
pub struct UndoCoalescer {
    window: Duration,
    pending: Vec<TextChange>,
    deadline: Option<Instant>,
}

impl UndoCoalescer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            pending: Vec::new(),
            deadline: None,
        }
    }

    /// Folds `changes` into the pending unit and restarts the window.
    pub fn record(&mut self, changes: &[TextChange], now: Instant) {
        self.pending = TextChange::compress_consecutive(&self.pending, changes);
        self.deadline = Some(now + self.window);
        trace!(pending = self.pending.len(), "coalesced edit");
    }

    /// Flushes the pending unit if its window has expired.
    pub fn poll(&mut self, now: Instant) -> Option<Vec<TextChange>> {
        match self.deadline {
            Some(deadline) if now >= deadline => self.flush(),
            _ => None,
        }
    }

    /// Flushes the pending unit right away. An edit that cancelled itself
    /// out flushes nothing.
    pub fn flush(&mut self) -> Option<Vec<TextChange>> {
        self.deadline = None;
        if self.pending.is_empty() {
            return None;
        }
        Some(std::mem::take(&mut self.pending))
    }

    /// Drops the pending unit.
    pub fn cancel(&mut self) {
        self.pending.clear();
        self.deadline = None;
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn pending(&self) -> &[TextChange] {
        &self.pending
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }
}
