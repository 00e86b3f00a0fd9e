use piece_tree::{PieceTreeError, Range};
use thiserror::Error;

pub type BufferResult<T> = Result<T, BufferError>;

/// Errors reported by the text buffer and its builder.
#[derive(Debug, Error)]
pub enum BufferError {
    #[error(transparent)]
    Bounds(#[from] PieceTreeError),

    #[error("edit ranges {first:?} and {second:?} overlap")]
    OverlappingRanges { first: Range, second: Range },

    #[error("range {0:?} ends before it starts")]
    InvalidRange(Range),

    /// Reserved; an empty batch is a no-op in practice.
    #[error("edit batch is empty")]
    EmptyBatch,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),
}
