use std::collections::VecDeque;
use std::fmt;

use serde::{Deserialize, Serialize};
use text_buffer::TextChange;
use tracing::debug;

fn default_max_depth() -> usize {
    1000
}

/// Undo and redo stacks of change lists. The front of each deque is the top.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditorStack {
    undo_stack: VecDeque<Vec<TextChange>>,
    redo_stack: VecDeque<Vec<TextChange>>,
    #[serde(default = "default_max_depth")]
    max_depth: usize,
}

impl Default for EditorStack {
    fn default() -> Self {
        Self::new(default_max_depth())
    }
}

impl EditorStack {
    pub fn new(max_depth: usize) -> Self {
        Self {
            undo_stack: VecDeque::new(),
            redo_stack: VecDeque::new(),
            max_depth: max_depth.max(1),
        }
    }

    fn push_bounded(stack: &mut VecDeque<Vec<TextChange>>, changes: Vec<TextChange>, max_depth: usize) {
        stack.push_front(changes);
        while stack.len() > max_depth {
            stack.pop_back();
            debug!(max_depth, "dropped oldest history entry");
        }
    }

    pub fn push(&mut self, changes: Vec<TextChange>) {
        debug!(changes = changes.len(), depth = self.undo_stack.len() + 1, "push undo unit");
        Self::push_bounded(&mut self.undo_stack, changes, self.max_depth);
    }

    pub fn peek_undo(&self) -> Option<&[TextChange]> {
        self.undo_stack.front().map(Vec::as_slice)
    }

    pub fn peek_redo(&self) -> Option<&[TextChange]> {
        self.redo_stack.front().map(Vec::as_slice)
    }

    /// Moves the top undo unit to the redo stack and returns it.
    pub fn undo(&mut self) -> Option<Vec<TextChange>> {
        let changes = self.undo_stack.pop_front()?;
        Self::push_bounded(&mut self.redo_stack, changes.clone(), self.max_depth);
        Some(changes)
    }

    /// Moves the top redo unit back to the undo stack and returns it.
    pub fn redo(&mut self) -> Option<Vec<TextChange>> {
        let changes = self.redo_stack.pop_front()?;
        Self::push_bounded(&mut self.undo_stack, changes.clone(), self.max_depth);
        Some(changes)
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn clear_undo(&mut self) {
        self.undo_stack.clear();
    }

    pub fn clear_redo(&mut self) {
        self.redo_stack.clear();
    }

    pub fn clear(&mut self) {
        self.clear_undo();
        self.clear_redo();
    }

    pub fn undo_stack(&self) -> &VecDeque<Vec<TextChange>> {
        &self.undo_stack
    }

    pub fn redo_stack(&self) -> &VecDeque<Vec<TextChange>> {
        &self.redo_stack
    }

    pub fn set_undo_stack(&mut self, undo_stack: VecDeque<Vec<TextChange>>) {
        self.undo_stack = undo_stack;
        self.undo_stack.truncate(self.max_depth);
    }

    pub fn set_redo_stack(&mut self, redo_stack: VecDeque<Vec<TextChange>>) {
        self.redo_stack = redo_stack;
        self.redo_stack.truncate(self.max_depth);
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }
}

impl fmt::Display for EditorStack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let list = |stack: &VecDeque<Vec<TextChange>>| {
            stack
                .iter()
                .map(|unit| {
                    let parts: Vec<String> = unit.iter().map(ToString::to_string).collect();
                    format!("[{}]", parts.join(", "))
                })
                .collect::<Vec<_>>()
                .join(" ")
        };
        write!(
            f,
            "undo_stack: {} -> redo_stack: {}",
            list(&self.undo_stack),
            list(&self.redo_stack)
        )
    }
}
