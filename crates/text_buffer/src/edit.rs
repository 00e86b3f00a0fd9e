use piece_tree::Range;
use serde::{Deserialize, Serialize};

use crate::text_change::TextChange;

/// Tags an edit so callers can recognise it in the results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Identifier {
    pub major: u32,
    pub minor: u32,
}

/// A single replacement requested by a caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SingleEditOperation {
    /// The range to replace. Empty for a pure insert.
    pub range: Range,
    /// Replacement text. Empty for a pure delete.
    pub text: String,
    pub identifier: Option<Identifier>,
    /// Insert semantics: markers at a collapsed `range` move with the text.
    pub force_move_markers: bool,
    /// Whitespace the editor inserted on its own and may trim on the next edit.
    pub is_auto_whitespace_edit: bool,
    /// Insert `text` as given instead of rewriting its line breaks to the
    /// buffer EOL. Used when replaying captured history.
    pub keep_eol: bool,
}

impl SingleEditOperation {
    pub fn new(range: Range, text: impl Into<String>) -> Self {
        Self {
            range,
            text: text.into(),
            identifier: None,
            force_move_markers: false,
            is_auto_whitespace_edit: false,
            keep_eol: false,
        }
    }

    pub fn insert(line: usize, column: usize, text: impl Into<String>) -> Self {
        Self::new(Range::new(line, column, line, column), text)
    }

    pub fn delete(range: Range) -> Self {
        Self::new(range, String::new())
    }

    pub fn with_identifier(mut self, identifier: Identifier) -> Self {
        self.identifier = Some(identifier);
        self
    }

    pub fn auto_whitespace(mut self) -> Self {
        self.is_auto_whitespace_edit = true;
        self
    }

    pub fn keeping_eol(mut self) -> Self {
        self.keep_eol = true;
        self
    }
}

/// An operation checked against the buffer, with its offsets resolved and
/// its replacement text measured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedEditOperation {
    /// Position in the caller's input, used to keep equal ranges stable.
    pub sort_index: usize,
    pub identifier: Option<Identifier>,
    pub range: Range,
    /// Byte offset of `range.start()` before the batch is applied.
    pub range_offset: usize,
    /// Byte length of `range` before the batch is applied.
    pub range_length: usize,
    pub text: String,
    pub eol_count: usize,
    pub first_line_length: usize,
    pub last_line_length: usize,
    pub force_move_markers: bool,
    pub is_auto_whitespace_edit: bool,
}

/// The edit that restores what a forward edit replaced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReverseEditOperation {
    pub sort_index: usize,
    pub identifier: Option<Identifier>,
    /// Range the forward edit's text occupies after the batch.
    pub range: Range,
    /// Text the forward edit replaced.
    pub text: String,
    pub text_change: TextChange,
}

impl ReverseEditOperation {
    /// The operation that puts the replaced text back byte for byte.
    pub fn to_edit(&self) -> SingleEditOperation {
        SingleEditOperation {
            identifier: self.identifier,
            ..SingleEditOperation::new(self.range, self.text.clone()).keeping_eol()
        }
    }
}

/// One applied replacement, reported in application order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentChange {
    /// Replaced range, in coordinates from before this change.
    pub range: Range,
    pub range_offset: usize,
    pub range_length: usize,
    pub text: String,
    pub force_move_markers: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyEditsResult {
    /// Applied changes, bottom of the document first.
    pub changes: Vec<ContentChange>,
    /// Present when undo edits were requested.
    pub reverse_edits: Option<Vec<ReverseEditOperation>>,
    /// Lines left holding only auto-inserted whitespace, descending.
    pub trimmed_whitespace_lines: Option<Vec<usize>>,
}
