use serde::{Deserialize, Serialize};

use crate::line_starts::create_line_starts_fast;

/// A (line, column) cursor inside a single [`StringBuffer`], both 0-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BufferCursor {
    pub line: usize,
    pub column: usize,
}

impl BufferCursor {
    pub const fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

/// A span `[start, end)` of one backing buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Piece {
    pub buffer_idx: usize,
    pub start: BufferCursor,
    pub end: BufferCursor,
    pub line_feed_cnt: usize,
    pub length: usize,
}

impl Piece {
    pub fn new(
        buffer_idx: usize,
        start: BufferCursor,
        end: BufferCursor,
        line_feed_cnt: usize,
        length: usize,
    ) -> Self {
        Self {
            buffer_idx,
            start,
            end,
            line_feed_cnt,
            length,
        }
    }

    /// The piece covering all of `buffer`, stored at `buffer_idx`.
    pub(crate) fn whole(buffer_idx: usize, buffer: &StringBuffer) -> Self {
        let last = buffer.line_starts.len() - 1;
        Piece::new(
            buffer_idx,
            BufferCursor::new(0, 0),
            BufferCursor::new(last, buffer.buffer.len() - buffer.line_starts[last]),
            last,
            buffer.buffer.len(),
        )
    }
}

/// Backing text chunk plus the offsets where each of its lines begins.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StringBuffer {
    pub(crate) buffer: String,
    pub(crate) line_starts: Vec<usize>,
}

impl StringBuffer {
    pub fn new(buffer: String) -> Self {
        let line_starts = create_line_starts_fast(&buffer);
        Self {
            buffer,
            line_starts,
        }
    }

    /// Build from precomputed line starts, e.g. the ones returned by
    /// [`crate::create_line_starts`] during chunk ingestion.
    pub fn with_line_starts(buffer: String, line_starts: Vec<usize>) -> Self {
        if line_starts.is_empty() {
            return Self::new(buffer);
        }
        Self {
            buffer,
            line_starts,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.buffer
    }

    pub fn line_starts(&self) -> &[usize] {
        &self.line_starts
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub(crate) fn offset_of(&self, cursor: BufferCursor) -> usize {
        self.line_starts[cursor.line] + cursor.column
    }
}
