use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A 1-based (line, column) position. Column 1 precedes the first byte of a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl Position {
    pub const fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }

    pub fn with(self, line: Option<usize>, column: Option<usize>) -> Self {
        Self {
            line: line.unwrap_or(self.line),
            column: column.unwrap_or(self.column),
        }
    }

    pub fn delta(self, delta_line: isize, delta_column: isize) -> Self {
        Self {
            line: self.line.saturating_add_signed(delta_line),
            column: self.column.saturating_add_signed(delta_column),
        }
    }

    pub fn is_before(&self, other: &Position) -> bool {
        self < other
    }

    pub fn is_before_or_equal(&self, other: &Position) -> bool {
        self <= other
    }
}

impl Default for Position {
    fn default() -> Self {
        Self::new(1, 1)
    }
}

impl Ord for Position {
    fn cmp(&self, other: &Self) -> Ordering {
        self.line
            .cmp(&other.line)
            .then(self.column.cmp(&other.column))
    }
}

impl PartialOrd for Position {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.line, self.column)
    }
}

/// A range in the document. `(start_line, start_column) <= (end_line, end_column)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Range {
    pub start_line: usize,
    pub start_column: usize,
    pub end_line: usize,
    pub end_column: usize,
}

impl Range {
    pub const fn new(start_line: usize, start_column: usize, end_line: usize, end_column: usize) -> Self {
        Self {
            start_line,
            start_column,
            end_line,
            end_column,
        }
    }

    pub fn from_positions(start: Position, end: Position) -> Self {
        Self::new(start.line, start.column, end.line, end.column)
    }

    pub fn collapsed(pos: Position) -> Self {
        Self::from_positions(pos, pos)
    }

    pub fn is_empty(&self) -> bool {
        self.start_line == self.end_line && self.start_column == self.end_column
    }

    pub fn start(&self) -> Position {
        Position::new(self.start_line, self.start_column)
    }

    pub fn end(&self) -> Position {
        Position::new(self.end_line, self.end_column)
    }

    pub fn spans_multiple_lines(&self) -> bool {
        self.end_line > self.start_line
    }

    pub fn collapse_to_start(&self) -> Self {
        Self::collapsed(self.start())
    }

    pub fn set_start(&self, line: usize, column: usize) -> Self {
        Self::new(line, column, self.end_line, self.end_column)
    }

    pub fn set_end(&self, line: usize, column: usize) -> Self {
        Self::new(self.start_line, self.start_column, line, column)
    }

    /// True when `pos` lies inside the range, edges included.
    pub fn contains_position(&self, pos: Position) -> bool {
        if pos.line < self.start_line || pos.line > self.end_line {
            return false;
        }
        if pos.line == self.start_line && pos.column < self.start_column {
            return false;
        }
        if pos.line == self.end_line && pos.column > self.end_column {
            return false;
        }
        true
    }

    /// True when `other` lies inside the range. Equal ranges contain each other.
    pub fn contains_range(&self, other: &Range) -> bool {
        if other.start_line < self.start_line || other.end_line < self.start_line {
            return false;
        }
        if other.start_line > self.end_line || other.end_line > self.end_line {
            return false;
        }
        if other.start_line == self.start_line && other.start_column < self.start_column {
            return false;
        }
        if other.end_line == self.end_line && other.end_column > self.end_column {
            return false;
        }
        true
    }

    /// Like [`Range::contains_range`] but `other` must start after and end before `self`.
    pub fn strict_contains_range(&self, other: &Range) -> bool {
        if other.start_line < self.start_line || other.end_line < self.start_line {
            return false;
        }
        if other.start_line > self.end_line || other.end_line > self.end_line {
            return false;
        }
        if other.start_line == self.start_line && other.start_column <= self.start_column {
            return false;
        }
        if other.end_line == self.end_line && other.end_column >= self.end_column {
            return false;
        }
        true
    }

    /// Smallest range covering both.
    pub fn plus(&self, other: &Range) -> Range {
        let start = self.start().min(other.start());
        let end = self.end().max(other.end());
        Range::from_positions(start, end)
    }

    pub fn intersect(&self, other: &Range) -> Option<Range> {
        let start = self.start().max(other.start());
        let end = self.end().min(other.end());
        if start > end {
            return None;
        }
        Some(Range::from_positions(start, end))
    }

    /// Touching ranges count as intersecting.
    pub fn intersects_or_touches(&self, other: &Range) -> bool {
        !(self.end() < other.start() || other.end() < self.start())
    }

    /// Touching ranges do not count.
    pub fn intersects(&self, other: &Range) -> bool {
        !(self.end() <= other.start() || other.end() <= self.start())
    }

    /// Orders by start, then by end.
    pub fn compare_using_starts(a: &Range, b: &Range) -> Ordering {
        a.start().cmp(&b.start()).then(a.end().cmp(&b.end()))
    }

    /// Orders by end, then by start.
    pub fn compare_using_ends(a: &Range, b: &Range) -> Ordering {
        a.end().cmp(&b.end()).then(a.start().cmp(&b.start()))
    }
}

impl Default for Range {
    fn default() -> Self {
        Self::new(1, 1, 1, 1)
    }
}

impl Ord for Range {
    fn cmp(&self, other: &Self) -> Ordering {
        Range::compare_using_starts(self, other)
    }
}

impl PartialOrd for Range {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{},{} -> {},{}]",
            self.start_line, self.start_column, self.end_line, self.end_column
        )
    }
}
