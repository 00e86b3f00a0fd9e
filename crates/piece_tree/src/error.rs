use thiserror::Error;

pub type PieceTreeResult<T> = Result<T, PieceTreeError>;

/// Contract violations reported by the piece tree. Nothing is clamped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PieceTreeError {
    #[error("offset {offset} is out of bounds (document length {len})")]
    OffsetOutOfBounds { offset: usize, len: usize },

    #[error("line {line} is out of bounds (line count {line_count})")]
    LineOutOfBounds { line: usize, line_count: usize },

    #[error("column {column} is out of bounds on line {line} (max column {max_column})")]
    ColumnOutOfBounds {
        line: usize,
        column: usize,
        max_column: usize,
    },

    #[error("offset {offset} does not fall on a UTF-8 character boundary")]
    NotCharBoundary { offset: usize },
}
