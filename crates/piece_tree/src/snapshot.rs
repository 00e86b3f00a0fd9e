use std::sync::Arc;

use crate::piece::{Piece, StringBuffer};
use crate::PieceTree;

/// A frozen view of a [`PieceTree`].
///
/// Holds the piece list and shared handles to the backing buffers, so later
/// edits to the tree never show through. The snapshot is `Send + Sync` and
/// can be read on another thread while the tree keeps changing.
#[derive(Debug, Clone)]
pub struct PieceTreeSnapshot {
    pieces: Vec<Piece>,
    buffers: Vec<Arc<StringBuffer>>,
    bom: String,
    index: usize,
}

impl PieceTreeSnapshot {
    pub(crate) fn new(tree: &PieceTree, bom: &str) -> Self {
        Self {
            pieces: tree.pieces(),
            buffers: tree.buffers.clone(),
            bom: bom.to_string(),
            index: 0,
        }
    }

    fn piece_content(&self, piece: &Piece) -> &str {
        let buffer = &self.buffers[piece.buffer_idx];
        let start = buffer.offset_of(piece.start);
        &buffer.buffer[start..start + piece.length]
    }

    /// Next chunk of the document, `None` once exhausted. The BOM is
    /// prepended to the first chunk; an empty document yields the BOM alone.
    pub fn read(&mut self) -> Option<String> {
        if self.pieces.is_empty() {
            if self.index == 0 {
                self.index += 1;
                return Some(self.bom.clone());
            }
            return None;
        }

        let piece = self.pieces.get(self.index)?;
        let content = self.piece_content(piece);
        let chunk = if self.index == 0 {
            format!("{}{}", self.bom, content)
        } else {
            content.to_string()
        };
        self.index += 1;
        Some(chunk)
    }

    /// Total length in bytes, BOM included.
    pub fn len(&self) -> usize {
        self.bom.len() + self.pieces.iter().map(|p| p.length).sum::<usize>()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Concatenates every remaining chunk.
    pub fn read_to_string(mut self) -> String {
        let mut out = String::with_capacity(self.len());
        while let Some(chunk) = self.read() {
            out.push_str(&chunk);
        }
        out
    }
}

impl Iterator for PieceTreeSnapshot {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        self.read()
    }
}
