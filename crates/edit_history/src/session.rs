use std::fmt;

use piece_tree::{Position, Range, count_eol};
use text_buffer::{ContentChange, PieceTreeTextBuffer, SingleEditOperation, TextChange};
use tracing::debug;

use crate::clock::{Clock, SystemClock};
use crate::coalescer::UndoCoalescer;
use crate::config::HistoryConfig;
use crate::error::HistoryResult;
use crate::stack::EditorStack;
use crate::state::{SavedState, ViewState};

/// Called once per applied change, in application order.
pub type EditListener = Box<dyn FnMut(&ContentChange)>;

/// Where the cursor lands after `change`: at the end of the inserted text,
/// or at the start of the range for a pure delete.
pub fn cursor_after(change: &ContentChange) -> Position {
    let range = change.range;
    if change.text.is_empty() {
        return range.start();
    }
    let counter = count_eol(&change.text);
    if counter.eol_count == 0 {
        Position::new(range.start_line, range.start_column + counter.last_line_length)
    } else {
        Position::new(range.start_line + counter.eol_count, counter.last_line_length + 1)
    }
}

/// A buffer together with its undo history and cursor.
pub struct EditSession {
    buffer: PieceTreeTextBuffer,
    stack: EditorStack,
    coalescer: UndoCoalescer,
    clock: Box<dyn Clock>,
    cursor: Position,
    selection: Range,
    listener: Option<EditListener>,
}

impl fmt::Debug for EditSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EditSession")
            .field("cursor", &self.cursor)
            .field("selection", &self.selection)
            .field("stack", &self.stack)
            .field("coalescer", &self.coalescer)
            .finish_non_exhaustive()
    }
}

fn undo_operations(
    buffer: &PieceTreeTextBuffer,
    changes: &[TextChange],
) -> HistoryResult<Vec<SingleEditOperation>> {
    changes
        .iter()
        .map(|change| -> HistoryResult<SingleEditOperation> {
            let start = buffer.get_position_at(change.new_position)?;
            let end = buffer.get_position_at(change.new_end())?;
            Ok(SingleEditOperation::new(Range::from_positions(start, end), change.old_text.clone())
                .keeping_eol())
        })
        .collect()
}

fn redo_operations(
    buffer: &PieceTreeTextBuffer,
    changes: &[TextChange],
) -> HistoryResult<Vec<SingleEditOperation>> {
    changes
        .iter()
        .map(|change| -> HistoryResult<SingleEditOperation> {
            let start = buffer.get_position_at(change.old_position)?;
            let end = buffer.get_position_at(change.old_end())?;
            Ok(SingleEditOperation::new(Range::from_positions(start, end), change.new_text.clone())
                .keeping_eol())
        })
        .collect()
}

impl EditSession {
    pub fn new(buffer: PieceTreeTextBuffer, config: &HistoryConfig) -> Self {
        Self::with_clock(buffer, config, SystemClock)
    }

    pub fn with_clock(
        buffer: PieceTreeTextBuffer,
        config: &HistoryConfig,
        clock: impl Clock + 'static,
    ) -> Self {
        let start = Position::new(1, 1);
        Self {
            buffer,
            stack: EditorStack::new(config.max_undo_depth),
            coalescer: UndoCoalescer::new(config.coalesce_window()),
            clock: Box::new(clock),
            cursor: start,
            selection: Range::collapsed(start),
            listener: None,
        }
    }

    pub fn buffer(&self) -> &PieceTreeTextBuffer {
        &self.buffer
    }

    pub fn into_buffer(self) -> PieceTreeTextBuffer {
        self.buffer
    }

    pub fn stack(&self) -> &EditorStack {
        &self.stack
    }

    pub fn cursor(&self) -> Position {
        self.cursor
    }

    pub fn set_cursor(&mut self, cursor: Position) {
        self.cursor = cursor;
    }

    pub fn selection(&self) -> Range {
        self.selection
    }

    pub fn set_selection(&mut self, selection: Range) {
        self.selection = selection;
    }

    pub fn set_listener(&mut self, listener: impl FnMut(&ContentChange) + 'static) {
        self.listener = Some(Box::new(listener));
    }

    pub fn clear_listener(&mut self) {
        self.listener = None;
    }

    /// Applies a batch and records it for undo. Returns the new cursor.
    pub fn apply_edits(&mut self, operations: Vec<SingleEditOperation>) -> HistoryResult<Position> {
        self.tick();
        self.apply(operations, true)
    }

    fn apply(
        &mut self,
        operations: Vec<SingleEditOperation>,
        compute_undo_edits: bool,
    ) -> HistoryResult<Position> {
        let result = self.buffer.apply_edits(operations, false, compute_undo_edits)?;

        // the last change applied is the topmost one
        if let Some(last) = result.changes.last() {
            self.cursor = cursor_after(last);
            self.selection = Range::collapsed(self.cursor);
        }

        if let Some(listener) = self.listener.as_mut() {
            for change in &result.changes {
                listener(change);
            }
        }

        if let Some(reverse_edits) = result.reverse_edits {
            let mut changes: Vec<TextChange> =
                reverse_edits.into_iter().map(|op| op.text_change).collect();
            changes.sort_by_key(|change| change.old_position);
            self.stack.clear_redo();
            self.coalescer.record(&changes, self.clock.now());
        }

        Ok(self.cursor)
    }

    /// Pushes the pending unit if its window has passed.
    pub fn tick(&mut self) -> bool {
        match self.coalescer.poll(self.clock.now()) {
            Some(changes) => {
                self.stack.push(changes);
                true
            }
            None => false,
        }
    }

    /// Pushes the pending unit now, whatever the time.
    pub fn flush_pending(&mut self) -> bool {
        match self.coalescer.flush() {
            Some(changes) => {
                self.stack.push(changes);
                true
            }
            None => false,
        }
    }

    pub fn can_undo(&self) -> bool {
        self.stack.can_undo() || !self.coalescer.pending().is_empty()
    }

    pub fn can_redo(&self) -> bool {
        self.stack.can_redo()
    }

    /// Reverts the latest undo unit. `None` when there is nothing to undo.
    pub fn undo(&mut self) -> HistoryResult<Option<Position>> {
        self.flush_pending();
        let Some(changes) = self.stack.peek_undo() else {
            return Ok(None);
        };
        let operations = undo_operations(&self.buffer, changes)?;
        let cursor = self.apply(operations, false)?;
        self.stack.undo();
        debug!(%cursor, "undo");
        Ok(Some(cursor))
    }

    /// Re-applies the latest undone unit. `None` when there is nothing to redo.
    pub fn redo(&mut self) -> HistoryResult<Option<Position>> {
        self.flush_pending();
        let Some(changes) = self.stack.peek_redo() else {
            return Ok(None);
        };
        let operations = redo_operations(&self.buffer, changes)?;
        let cursor = self.apply(operations, false)?;
        self.stack.redo();
        debug!(%cursor, "redo");
        Ok(Some(cursor))
    }

    /// Captures the history and cursor. A pending unit is pushed first so it
    /// survives the round trip.
    pub fn preserve_state(
        &mut self,
        uri: impl Into<String>,
        hash: impl Into<String>,
        modified: bool,
        view: ViewState,
    ) -> SavedState {
        self.flush_pending();
        SavedState {
            uri: uri.into(),
            hash: hash.into(),
            modified,
            position: self.cursor,
            selection: self.selection,
            view,
            undo_stack: self.stack.undo_stack().clone(),
            redo_stack: self.stack.redo_stack().clone(),
        }
    }

    /// Swaps in `buffer` and the saved history. Returns the view data for
    /// the caller to apply.
    pub fn restore_state(&mut self, state: SavedState, buffer: PieceTreeTextBuffer) -> ViewState {
        self.coalescer.cancel();
        self.buffer = buffer;
        self.stack.set_undo_stack(state.undo_stack);
        self.stack.set_redo_stack(state.redo_stack);
        self.cursor = state.position;
        self.selection = state.selection;
        debug!(uri = %state.uri, "restored session state");
        state.view
    }
}
