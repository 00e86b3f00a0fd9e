use std::cell::RefCell;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

mod error;
mod line_starts;
mod piece;
mod position;
mod rb_tree;
mod search;
mod search_cache;
mod snapshot;
pub mod strings;

pub use error::{PieceTreeError, PieceTreeResult};
pub use line_starts::{
    EndOfLine, LineEnding, LineStarts, TextCounter, count_eol, create_line_starts,
    create_line_starts_fast, normalize_eol,
};
pub use piece::{BufferCursor, Piece, StringBuffer};
pub use position::{Position, Range};
pub use search::{LineFeedCounter, SearchQuery};
pub use snapshot::PieceTreeSnapshot;

use rb_tree::{NodeId, RbTree, SENTINEL};
use search_cache::{CacheEntry, SearchCache};

/// Inserted text longer than this gets its own buffers.
pub const AVERAGE_BUFFER_SIZE: usize = 65535;

#[derive(Debug, Clone, Copy)]
struct NodePosition {
    node: NodeId,
    /// Offset inside the node's piece.
    remainder: usize,
    /// Offset of the node's first byte in the document.
    node_start_offset: usize,
}

fn starts_with_lf(text: &str) -> bool {
    text.as_bytes().first() == Some(&b'\n')
}

fn ends_with_cr(text: &str) -> bool {
    text.as_bytes().last() == Some(&b'\r')
}

fn strip_line_breaks(text: &str) -> String {
    text.replace(['\r', '\n'], "")
}

/// A document stored as a red-black tree of pieces over append-only buffers.
///
/// Buffer 0 is the add buffer that receives inserted text; the others hold
/// the original chunks and any large inserts. Offsets are byte offsets and
/// columns are 1-based byte columns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PieceTree {
    tree: RbTree,
    buffers: Vec<Arc<StringBuffer>>,
    length: usize,
    line_count: usize,
    eol: LineEnding,
    eol_normalized: bool,
    last_change_buffer_pos: BufferCursor,
    #[serde(skip)]
    search_cache: RefCell<SearchCache>,
    #[serde(skip)]
    last_visited_line: RefCell<Option<(usize, String)>>,
}

impl Default for PieceTree {
    fn default() -> Self {
        Self::new(Vec::new(), LineEnding::LF, true)
    }
}

impl PieceTree {
    pub fn new(chunks: Vec<StringBuffer>, eol: LineEnding, eol_normalized: bool) -> Self {
        let mut tree = Self {
            tree: RbTree::new(),
            buffers: Vec::new(),
            length: 0,
            line_count: 1,
            eol,
            eol_normalized,
            last_change_buffer_pos: BufferCursor::default(),
            search_cache: RefCell::default(),
            last_visited_line: RefCell::default(),
        };
        tree.create(chunks, eol, eol_normalized);
        tree
    }

    fn create(&mut self, chunks: Vec<StringBuffer>, eol: LineEnding, eol_normalized: bool) {
        self.tree = RbTree::new();
        self.buffers = vec![Arc::new(StringBuffer::new(String::new()))];
        self.line_count = 1;
        self.length = 0;
        self.eol = eol;
        self.eol_normalized = eol_normalized;
        self.last_change_buffer_pos = BufferCursor::default();
        self.search_cache.get_mut().clear();
        self.last_visited_line.get_mut().take();

        let mut last_node = SENTINEL;
        for chunk in chunks.into_iter().filter(|c| !c.is_empty()) {
            let piece = Piece::whole(self.buffers.len(), &chunk);
            self.buffers.push(Arc::new(chunk));
            last_node = self.tree.insert_right(last_node, piece);
        }

        self.compute_buffer_metadata();
    }

    /// Rebuilds the tree from chunks of roughly 2/3 to 4/3 of
    /// [`AVERAGE_BUFFER_SIZE`] with every line break rewritten to `eol`.
    fn normalize_eol(&mut self, eol: LineEnding) {
        let min = AVERAGE_BUFFER_SIZE - AVERAGE_BUFFER_SIZE / 3;
        let max = min * 2;

        let mut temp_chunk = String::new();
        let mut chunks = Vec::new();

        self.tree.for_each_inorder(|node| {
            let text = self.node_content(node);
            if temp_chunk.len() <= min || temp_chunk.len() + text.len() < max {
                temp_chunk.push_str(text);
                return true;
            }

            // flush anyways
            chunks.push(StringBuffer::new(normalize_eol(&temp_chunk, eol)));
            temp_chunk.clear();
            temp_chunk.push_str(text);
            true
        });

        if !temp_chunk.is_empty() {
            chunks.push(StringBuffer::new(normalize_eol(&temp_chunk, eol)));
        }

        debug!(chunks = chunks.len(), ?eol, "normalized line endings");
        self.create(chunks, eol, true);
    }

    // ---------- Buffer API ----------

    pub fn len(&self) -> usize {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    pub fn line_count(&self) -> usize {
        self.line_count
    }

    pub fn eol(&self) -> LineEnding {
        self.eol
    }

    /// True while every line break in the document is known to equal [`PieceTree::eol`].
    pub fn is_eol_normalized(&self) -> bool {
        self.eol_normalized
    }

    pub fn set_eol(&mut self, eol: LineEnding) {
        self.eol = eol;
        self.normalize_eol(eol);
    }

    pub fn create_snapshot(&self, bom: &str) -> PieceTreeSnapshot {
        PieceTreeSnapshot::new(self, bom)
    }

    /// Content equality, independent of how either tree splits its pieces.
    pub fn equal(&self, other: &PieceTree) -> bool {
        if self.len() != other.len() || self.line_count() != other.line_count() {
            return false;
        }

        let mut offset = 0;
        self.tree.for_each_inorder(|node| {
            let text = self.node_content(node);
            let (Some(start), Some(end)) =
                (other.node_at(offset), other.node_at(offset + text.len()))
            else {
                return false;
            };
            offset += text.len();
            text == other.get_value_in_range2(start, end)
        })
    }

    /// Byte offset of a 1-based (line, column). Expects a valid position.
    pub fn get_offset_at(&self, line_number: usize, column: usize) -> usize {
        let mut left_len = 0;
        let mut line = line_number;
        let mut x = self.tree.root;

        while x != SENTINEL {
            let node = self.tree.node(x);
            if node.left != SENTINEL && node.lf_left + 1 >= line {
                x = node.left;
            } else if node.lf_left + node.piece.line_feed_cnt + 1 >= line {
                left_len += node.size_left;
                // line_number >= 2
                let accumulated =
                    self.get_accumulated_value(x, line as isize - node.lf_left as isize - 2);
                return left_len + accumulated + column - 1;
            } else {
                line -= node.lf_left + node.piece.line_feed_cnt;
                left_len += node.size_left + node.piece.length;
                x = node.right;
            }
        }

        left_len
    }

    /// Position of a byte offset. Expects `offset <= len()`.
    pub fn get_position_at(&self, offset: usize) -> Position {
        let original_offset = offset;
        let mut offset = offset;
        let mut x = self.tree.root;
        let mut lf_cnt = 0;

        while x != SENTINEL {
            let node = self.tree.node(x);
            if node.size_left != 0 && node.size_left >= offset {
                x = node.left;
            } else if node.size_left + node.piece.length >= offset {
                let (index, remainder) = self.get_index_of(x, offset - node.size_left);
                lf_cnt += node.lf_left + index;

                if index == 0 {
                    let line_start_offset = self.get_offset_at(lf_cnt + 1, 1);
                    let column = original_offset - line_start_offset;
                    return Position::new(lf_cnt + 1, column + 1);
                }

                return Position::new(lf_cnt + 1, remainder + 1);
            } else {
                offset -= node.size_left + node.piece.length;
                lf_cnt += node.lf_left + node.piece.line_feed_cnt;

                if node.right == SENTINEL {
                    // last node
                    let line_start_offset = self.get_offset_at(lf_cnt + 1, 1);
                    let column = original_offset - offset - line_start_offset;
                    return Position::new(lf_cnt + 1, column + 1);
                }
                x = node.right;
            }
        }

        Position::new(1, 1)
    }

    /// Text inside `range`, with line breaks rewritten to `eol` when given.
    pub fn get_value_in_range(&self, range: Range, eol: Option<LineEnding>) -> String {
        if range.is_empty() {
            return String::new();
        }

        let (Some(start), Some(end)) = (
            self.node_at2(range.start_line, range.start_column),
            self.node_at2(range.end_line, range.end_column),
        ) else {
            return String::new();
        };

        let value = self.get_value_in_range2(start, end);
        match eol {
            Some(eol) if eol != self.eol || !self.eol_normalized => normalize_eol(&value, eol),
            _ => value,
        }
    }

    fn get_value_in_range2(&self, start: NodePosition, end: NodePosition) -> String {
        if start.node == end.node {
            let piece = self.tree.piece(start.node);
            let buffer = &self.buffers[piece.buffer_idx];
            let start_offset = buffer.offset_of(piece.start);
            return buffer.buffer[start_offset + start.remainder..start_offset + end.remainder]
                .to_string();
        }

        let mut x = start.node;
        let piece = self.tree.piece(x);
        let buffer = &self.buffers[piece.buffer_idx];
        let start_offset = buffer.offset_of(piece.start);
        let mut ret =
            buffer.buffer[start_offset + start.remainder..start_offset + piece.length].to_string();

        x = self.tree.next(x);
        while x != SENTINEL {
            let piece = self.tree.piece(x);
            let buffer = &self.buffers[piece.buffer_idx];
            let start_offset = buffer.offset_of(piece.start);

            if x == end.node {
                ret.push_str(&buffer.buffer[start_offset..start_offset + end.remainder]);
                break;
            }
            ret.push_str(&buffer.buffer[start_offset..start_offset + piece.length]);
            x = self.tree.next(x);
        }

        ret
    }

    /// Every line without its terminator.
    pub fn get_lines_content(&self) -> Vec<String> {
        let mut lines: Vec<String> = Vec::new();
        let mut current_line = String::new();
        let mut dangling_cr = false;
        let eol_len = self.eol.len();

        self.tree.for_each_inorder(|node| {
            let piece = self.tree.piece(node);
            let mut piece_length = piece.length;
            if piece_length == 0 {
                return true;
            }

            let buffer = &self.buffers[piece.buffer_idx].buffer;
            let bytes = buffer.as_bytes();
            let line_starts = &self.buffers[piece.buffer_idx].line_starts;

            let piece_start_line = piece.start.line;
            let piece_end_line = piece.end.line;
            let mut piece_start_offset = line_starts[piece_start_line] + piece.start.column;

            // Handle dangling CR across piece boundary
            if dangling_cr {
                if bytes[piece_start_offset] == b'\n' {
                    // pretend the \n was in the previous piece
                    piece_start_offset += 1;
                    piece_length -= 1;
                }
                lines.push(std::mem::take(&mut current_line));
                dangling_cr = false;
                if piece_length == 0 {
                    return true;
                }
            }

            if piece_start_line == piece_end_line {
                // No newlines fully inside this piece segment
                let end = piece_start_offset + piece_length;
                if !self.eol_normalized && bytes[end - 1] == b'\r' {
                    dangling_cr = true;
                    current_line.push_str(&buffer[piece_start_offset..end - 1]);
                } else {
                    current_line.push_str(&buffer[piece_start_offset..end]);
                }
                return true;
            }

            // Add the text before the first line start in this piece
            let first_line_next_start = line_starts[piece_start_line + 1];
            if self.eol_normalized {
                let end = piece_start_offset.max(first_line_next_start.saturating_sub(eol_len));
                current_line.push_str(&buffer[piece_start_offset..end]);
            } else {
                current_line.push_str(&strip_line_breaks(
                    &buffer[piece_start_offset..first_line_next_start],
                ));
            }
            lines.push(std::mem::take(&mut current_line));

            // Emit intermediate full lines inside the piece
            for line in (piece_start_line + 1)..piece_end_line {
                let start = line_starts[line];
                let end = line_starts[line + 1];
                if self.eol_normalized {
                    lines.push(buffer[start..end - eol_len].to_string());
                } else {
                    lines.push(strip_line_breaks(&buffer[start..end]));
                }
            }

            // Handle the last (partial) line segment of the piece
            let end_line_start = line_starts[piece_end_line];
            let end_abs = end_line_start + piece.end.column;
            if !self.eol_normalized && end_abs > 0 && bytes[end_abs - 1] == b'\r' {
                dangling_cr = true;
                if piece.end.column == 0 {
                    // The last line ended with a \r, the next piece pushes it
                    current_line = lines.pop().unwrap_or_default();
                } else {
                    current_line.push_str(&buffer[end_line_start..end_abs - 1]);
                }
            } else {
                current_line.push_str(&buffer[end_line_start..end_abs]);
            }

            true
        });

        if dangling_cr {
            lines.push(std::mem::take(&mut current_line));
        }

        lines.push(current_line);
        lines
    }

    /// Content of line `line_number` without its terminator.
    pub fn get_line_content(&self, line_number: usize) -> String {
        if line_number == 0 || line_number > self.line_count {
            return String::new();
        }
        if let Some((line, value)) = self.last_visited_line.borrow().as_ref() {
            if *line == line_number {
                return value.clone();
            }
        }

        let value = if line_number == self.line_count {
            self.line_raw_content(line_number, 0)
        } else if self.eol_normalized {
            self.line_raw_content(line_number, self.eol.len())
        } else {
            strip_line_breaks(&self.line_raw_content(line_number, 0))
        };

        *self.last_visited_line.borrow_mut() = Some((line_number, value.clone()));
        value
    }

    pub fn get_line_content_with_eol(&self, line_number: usize) -> String {
        let mut line = self.get_line_content(line_number);
        line.push_str(self.eol.as_str());
        line
    }

    /// Content of line `line_number` including its terminator.
    pub fn get_line_raw_content(&self, line_number: usize) -> String {
        if line_number == 0 || line_number > self.line_count {
            return String::new();
        }
        self.line_raw_content(line_number, 0)
    }

    fn char_code(&self, pos: NodePosition) -> Option<u8> {
        let piece = self.tree.piece(pos.node);
        if pos.remainder == piece.length {
            // the byte we want is at the head of the next node
            let next = self.tree.next(pos.node);
            if next == SENTINEL {
                return None;
            }
            let piece = self.tree.piece(next);
            let buffer = &self.buffers[piece.buffer_idx];
            return buffer.buffer.as_bytes().get(buffer.offset_of(piece.start)).copied();
        }

        let buffer = &self.buffers[piece.buffer_idx];
        let target = buffer.offset_of(piece.start) + pos.remainder;
        buffer.buffer.as_bytes().get(target).copied()
    }

    /// Byte at 0-based `index` of a line.
    pub fn get_line_char_code(&self, line_number: usize, index: usize) -> Option<u8> {
        self.node_at2(line_number, index + 1)
            .and_then(|pos| self.char_code(pos))
    }

    /// Length of a line in bytes, terminator excluded.
    pub fn get_line_length(&self, line_number: usize) -> usize {
        if line_number == 0 || line_number > self.line_count {
            return 0;
        }
        if !self.eol_normalized {
            // terminators may differ from line to line
            return self.get_line_content(line_number).len();
        }
        if line_number == self.line_count {
            let start_offset = self.get_offset_at(line_number, 1);
            return self.length - start_offset;
        }
        self.get_offset_at(line_number + 1, 1)
            - self.get_offset_at(line_number, 1)
            - self.eol.len()
    }

    /// Byte at `offset`, `None` at the end of the document.
    pub fn get_char_code(&self, offset: usize) -> Option<u8> {
        self.node_at(offset).and_then(|pos| self.char_code(pos))
    }

    /// The rest of the piece containing `offset`. Empty at the end of the document.
    pub fn get_nearest_chunk(&self, offset: usize) -> &str {
        let Some(pos) = self.node_at(offset) else {
            return "";
        };
        let piece = self.tree.piece(pos.node);
        if pos.remainder == piece.length {
            // the offset is at the head of the next node
            let next = self.tree.next(pos.node);
            if next == SENTINEL {
                return "";
            }
            return self.piece_content(self.tree.piece(next));
        }

        let buffer = &self.buffers[piece.buffer_idx];
        let start_offset = buffer.offset_of(piece.start);
        &buffer.buffer[start_offset + pos.remainder..start_offset + piece.length]
    }

    /// True when `offset` sits between two UTF-8 characters.
    pub fn is_char_boundary(&self, offset: usize) -> bool {
        if offset == 0 || offset >= self.length {
            return offset <= self.length;
        }
        match self.get_char_code(offset) {
            // not a continuation byte
            Some(b) => (b as i8) >= -0x40,
            None => true,
        }
    }

    fn check_offset(&self, offset: usize) -> PieceTreeResult<()> {
        if offset > self.length {
            return Err(PieceTreeError::OffsetOutOfBounds {
                offset,
                len: self.length,
            });
        }
        if !self.is_char_boundary(offset) {
            return Err(PieceTreeError::NotCharBoundary { offset });
        }
        Ok(())
    }

    // ---------- Piece table ----------

    /// Inserts `text` at byte `offset`. `eol_normalized` states whether the
    /// caller already rewrote the text's line breaks to [`PieceTree::eol`].
    pub fn insert(&mut self, offset: usize, text: &str, eol_normalized: bool) -> PieceTreeResult<()> {
        self.check_offset(offset)?;
        if text.is_empty() {
            return Ok(());
        }
        trace!(offset, len = text.len(), "insert");

        self.eol_normalized &= eol_normalized;
        self.last_visited_line.get_mut().take();
        let mut value = text.to_string();

        if self.tree.root != SENTINEL {
            let Some(NodePosition {
                node,
                remainder,
                node_start_offset,
            }) = self.node_at(offset)
            else {
                return Err(PieceTreeError::OffsetOutOfBounds {
                    offset,
                    len: self.length,
                });
            };
            let piece = *self.tree.piece(node);
            let buffer_idx = piece.buffer_idx;
            let insert_pos_in_buffer = self.position_in_buffer(node, remainder);

            if buffer_idx == 0
                && piece.end == self.last_change_buffer_pos
                && node_start_offset + piece.length == offset
                && value.len() < AVERAGE_BUFFER_SIZE
            {
                // continue typing at the tail of the add buffer
                self.append_to_node(node, value);
                self.finish_edit(offset);
                return Ok(());
            }

            if node_start_offset == offset {
                self.insert_content_to_node_left(value, node);
                self.search_cache.get_mut().validate(offset);
            } else if node_start_offset + piece.length > offset {
                // we are inserting into the middle of a node
                let mut nodes_to_del = Vec::new();
                let mut new_right_piece = Piece::new(
                    buffer_idx,
                    insert_pos_in_buffer,
                    piece.end,
                    self.line_feed_cnt(buffer_idx, insert_pos_in_buffer, piece.end),
                    self.offset_in_buffer(buffer_idx, piece.end)
                        - self.offset_in_buffer(buffer_idx, insert_pos_in_buffer),
                );

                if self.should_check_crlf() && ends_with_cr(&value) {
                    let head_of_right = self.node_char_code_at(node, remainder);
                    if head_of_right == Some(b'\n') {
                        let new_start = BufferCursor::new(new_right_piece.start.line + 1, 0);
                        new_right_piece = Piece::new(
                            buffer_idx,
                            new_start,
                            new_right_piece.end,
                            self.line_feed_cnt(buffer_idx, new_start, new_right_piece.end),
                            new_right_piece.length - 1,
                        );
                        value.push('\n');
                    }
                }

                // reuse node for content before insertion point
                if self.should_check_crlf() && starts_with_lf(&value) {
                    let tail_of_left = self.node_char_code_at(node, remainder - 1);
                    if tail_of_left == Some(b'\r') {
                        let previous_pos = self.position_in_buffer(node, remainder - 1);
                        self.delete_node_tail(node, previous_pos);
                        value.insert(0, '\r');

                        if self.tree.piece(node).length == 0 {
                            nodes_to_del.push(node);
                        }
                    } else {
                        self.delete_node_tail(node, insert_pos_in_buffer);
                    }
                } else {
                    self.delete_node_tail(node, insert_pos_in_buffer);
                }

                let new_pieces = self.create_new_pieces(&value);
                if new_right_piece.length > 0 {
                    self.tree.insert_right(node, new_right_piece);
                }

                let mut tmp_node = node;
                for piece in new_pieces {
                    tmp_node = self.tree.insert_right(tmp_node, piece);
                }
                self.delete_nodes(&nodes_to_del);
            } else {
                self.insert_content_to_node_right(value, node);
            }
        } else {
            // insert new node
            let pieces = self.create_new_pieces(&value);
            let mut node = SENTINEL;
            for (k, piece) in pieces.into_iter().enumerate() {
                node = if k == 0 {
                    self.tree.insert_left(SENTINEL, piece)
                } else {
                    self.tree.insert_right(node, piece)
                };
            }
        }

        self.finish_edit(offset);
        Ok(())
    }

    /// Removes `cnt` bytes starting at `offset`.
    pub fn delete(&mut self, offset: usize, cnt: usize) -> PieceTreeResult<()> {
        self.check_offset(offset)?;
        self.check_offset(offset.saturating_add(cnt))?;
        self.last_visited_line.get_mut().take();

        if cnt == 0 || self.tree.root == SENTINEL {
            return Ok(());
        }
        trace!(offset, cnt, "delete");

        let (Some(start_position), Some(end_position)) =
            (self.node_at(offset), self.node_at(offset + cnt))
        else {
            return Err(PieceTreeError::OffsetOutOfBounds {
                offset: offset + cnt,
                len: self.length,
            });
        };
        let start_node = start_position.node;
        let end_node = end_position.node;

        if start_node == end_node {
            let start_split = self.position_in_buffer(start_node, start_position.remainder);
            let end_split = self.position_in_buffer(start_node, end_position.remainder);

            if start_position.node_start_offset == offset {
                if cnt == self.tree.piece(start_node).length {
                    // delete node
                    let next = self.tree.next(start_node);
                    self.rb_delete(start_node);
                    self.validate_crlf_with_prev_node(next);
                    self.finish_edit(offset);
                    return Ok(());
                }
                self.delete_node_head(start_node, end_split);
                self.search_cache.get_mut().validate(offset);
                self.validate_crlf_with_prev_node(start_node);
                self.finish_edit(offset);
                return Ok(());
            }

            if start_position.node_start_offset + self.tree.piece(start_node).length == offset + cnt {
                self.delete_node_tail(start_node, start_split);
                self.validate_crlf_with_next_node(start_node);
                self.finish_edit(offset);
                return Ok(());
            }

            // delete content in the middle, this node will be split in two
            self.shrink_node(start_node, start_split, end_split);
            self.finish_edit(offset);
            return Ok(());
        }

        let mut nodes_to_del = Vec::new();

        let start_split = self.position_in_buffer(start_node, start_position.remainder);
        self.delete_node_tail(start_node, start_split);
        self.search_cache.get_mut().validate(offset);
        if self.tree.piece(start_node).length == 0 {
            nodes_to_del.push(start_node);
        }

        // update last touched node
        let end_split = self.position_in_buffer(end_node, end_position.remainder);
        self.delete_node_head(end_node, end_split);
        if self.tree.piece(end_node).length == 0 {
            nodes_to_del.push(end_node);
        }

        // delete nodes in between
        let mut node = self.tree.next(start_node);
        while node != SENTINEL && node != end_node {
            nodes_to_del.push(node);
            node = self.tree.next(node);
        }

        let prev = if self.tree.piece(start_node).length == 0 {
            self.tree.prev(start_node)
        } else {
            start_node
        };
        self.delete_nodes(&nodes_to_del);
        self.validate_crlf_with_next_node(prev);
        self.finish_edit(offset);
        Ok(())
    }

    fn insert_content_to_node_left(&mut self, mut value: String, node: NodeId) {
        // we are inserting content to the beginning of node
        let mut nodes_to_del = Vec::new();
        if self.should_check_crlf() && ends_with_cr(&value) && self.node_starts_with_lf(node) {
            // move `\n` to the new node
            let piece = *self.tree.piece(node);
            let new_start = BufferCursor::new(piece.start.line + 1, 0);
            let n_piece = Piece::new(
                piece.buffer_idx,
                new_start,
                piece.end,
                self.line_feed_cnt(piece.buffer_idx, new_start, piece.end),
                piece.length - 1,
            );
            self.tree.node_mut(node).piece = n_piece;

            value.push('\n');
            self.tree.update_tree_metadata(node, -1, -1);

            if n_piece.length == 0 {
                nodes_to_del.push(node);
            }
        }

        let new_pieces = self.create_new_pieces(&value);
        let mut new_node = node;
        for piece in new_pieces.into_iter().rev() {
            new_node = self.tree.insert_left(new_node, piece);
        }
        self.validate_crlf_with_prev_node(new_node);
        self.delete_nodes(&nodes_to_del);
    }

    fn insert_content_to_node_right(&mut self, mut value: String, node: NodeId) {
        // we are inserting to the right of this node
        if self.adjust_carriage_return_from_next(&value, node) {
            // move \n to the new node
            value.push('\n');
        }

        let new_pieces = self.create_new_pieces(&value);
        let mut new_node = SENTINEL;
        let mut tmp_node = node;
        for (k, piece) in new_pieces.into_iter().enumerate() {
            tmp_node = self.tree.insert_right(tmp_node, piece);
            if k == 0 {
                new_node = tmp_node;
            }
        }

        self.validate_crlf_with_prev_node(new_node);
    }

    /// Buffer cursor `remainder` bytes into `node`'s piece.
    fn position_in_buffer(&self, node: NodeId, remainder: usize) -> BufferCursor {
        let piece = self.tree.piece(node);
        let line_starts = &self.buffers[piece.buffer_idx].line_starts;

        let start_offset = line_starts[piece.start.line] + piece.start.column;
        let offset = start_offset + remainder;

        // binary search offset between start and end line
        let mut low = piece.start.line as isize;
        let mut high = piece.end.line as isize;
        let mut mid = 0usize;
        let mut mid_start = 0usize;

        while low <= high {
            mid = ((low + high) / 2) as usize;
            mid_start = line_starts[mid];

            if mid as isize == high {
                break;
            }

            let mid_stop = line_starts[mid + 1];
            if offset < mid_start {
                high = mid as isize - 1;
            } else if offset >= mid_stop {
                low = mid as isize + 1;
            } else {
                break;
            }
        }

        BufferCursor::new(mid, offset - mid_start)
    }

    fn line_feed_cnt(&self, buffer_idx: usize, start: BufferCursor, end: BufferCursor) -> usize {
        // Only `end` matters: if it sits between \r and \n the pair still
        // counts as a line break inside [start, end).
        if end.column == 0 {
            return end.line - start.line;
        }

        let buffer = &self.buffers[buffer_idx];
        let line_starts = &buffer.line_starts;
        if end.line == line_starts.len() - 1 {
            // no line break after end
            return end.line - start.line;
        }

        let next_line_start_offset = line_starts[end.line + 1];
        let end_offset = line_starts[end.line] + end.column;
        if next_line_start_offset > end_offset + 1 {
            // more than one byte after end, so it can't be \n
            return end.line - start.line;
        }

        // the byte at end_offset is \n; check the one before it
        if buffer.buffer.as_bytes()[end_offset - 1] == b'\r' {
            end.line - start.line + 1
        } else {
            end.line - start.line
        }
    }

    fn offset_in_buffer(&self, buffer_idx: usize, cursor: BufferCursor) -> usize {
        self.buffers[buffer_idx].offset_of(cursor)
    }

    fn rb_delete(&mut self, node: NodeId) {
        self.tree.delete(node);
        self.search_cache.get_mut().evict(node);
    }

    fn delete_nodes(&mut self, nodes: &[NodeId]) {
        for &node in nodes {
            self.rb_delete(node);
        }
    }

    fn push_buffer(&mut self, text: &str) -> Piece {
        let buffer = StringBuffer::new(text.to_string());
        let piece = Piece::whole(self.buffers.len(), &buffer);
        self.buffers.push(Arc::new(buffer));
        piece
    }

    fn create_new_pieces(&mut self, text: &str) -> Vec<Piece> {
        if text.len() > AVERAGE_BUFFER_SIZE {
            // Large content gets dedicated buffers. Never split after a \r
            // or inside a character.
            let mut new_pieces = Vec::new();
            let mut rest = text;
            while rest.len() > AVERAGE_BUFFER_SIZE {
                let mut split = AVERAGE_BUFFER_SIZE;
                while !rest.is_char_boundary(split) {
                    split -= 1;
                }
                if rest.as_bytes()[split - 1] == b'\r' {
                    split -= 1;
                }
                let (head, tail) = rest.split_at(split);
                new_pieces.push(self.push_buffer(head));
                rest = tail;
            }
            new_pieces.push(self.push_buffer(rest));
            debug!(pieces = new_pieces.len(), "split large insert into new buffers");
            return new_pieces;
        }

        let mut start_offset = self.buffers[0].len();
        let mut line_starts = create_line_starts_fast(text);
        let mut start = self.last_change_buffer_pos;

        let add_ends_at_line_start = self.buffers[0].line_starts.last() == Some(&start_offset);
        if add_ends_at_line_start
            && start_offset != 0
            && starts_with_lf(text)
            && ends_with_cr(&self.buffers[0].buffer)
        {
            // A placeholder keeps the new \n from pairing with the \r that
            // already ends the add buffer.
            self.last_change_buffer_pos = BufferCursor::new(
                self.last_change_buffer_pos.line,
                self.last_change_buffer_pos.column + 1,
            );
            start = self.last_change_buffer_pos;

            for ls in line_starts.iter_mut() {
                *ls += start_offset + 1;
            }

            let add = Arc::make_mut(&mut self.buffers[0]);
            add.line_starts.extend_from_slice(&line_starts[1..]);
            add.buffer.push('_');
            add.buffer.push_str(text);
            start_offset += 1;
        } else {
            if start_offset != 0 {
                for ls in line_starts.iter_mut() {
                    *ls += start_offset;
                }
            }
            let add = Arc::make_mut(&mut self.buffers[0]);
            add.line_starts.extend_from_slice(&line_starts[1..]);
            add.buffer.push_str(text);
        }

        let add = &self.buffers[0];
        let end_offset = add.len();
        let end_index = add.line_starts.len() - 1;
        let end_column = end_offset - add.line_starts[end_index];
        let end_pos = BufferCursor::new(end_index, end_column);
        let new_piece = Piece::new(
            0,
            start,
            end_pos,
            self.line_feed_cnt(0, start, end_pos),
            end_offset - start_offset,
        );
        self.last_change_buffer_pos = end_pos;
        vec![new_piece]
    }

    /// Whole document as one string.
    pub fn get_lines_raw_content(&self) -> String {
        let mut ret = String::with_capacity(self.length);
        self.tree.for_each_inorder(|node| {
            ret.push_str(self.node_content(node));
            true
        });
        ret
    }

    /// Raw content of a line, minus `end_offset` trailing bytes when the line
    /// is not the last one.
    fn line_raw_content(&self, line: usize, end_offset: usize) -> String {
        let mut x = self.tree.root;
        let mut line_number = line;
        let mut ret = String::new();

        let cached = self.search_cache.borrow().get2(&self.tree, line_number);
        if let Some(cache) = cached {
            x = cache.node;
            let piece = self.tree.piece(x);
            let prev_accumulated = self.get_accumulated_value(
                x,
                line_number as isize - cache.node_start_line_number as isize - 1,
            );
            let buffer = &self.buffers[piece.buffer_idx];
            let start_offset = buffer.offset_of(piece.start);
            if cache.node_start_line_number + piece.line_feed_cnt == line_number {
                ret.push_str(
                    &buffer.buffer[start_offset + prev_accumulated..start_offset + piece.length],
                );
            } else {
                let accumulated = self.get_accumulated_value(
                    x,
                    line_number as isize - cache.node_start_line_number as isize,
                );
                return buffer.buffer
                    [start_offset + prev_accumulated..start_offset + accumulated - end_offset]
                    .to_string();
            }
        } else {
            let mut node_start_offset = 0;
            let original_line_number = line_number;
            while x != SENTINEL {
                let node = self.tree.node(x);
                if node.left != SENTINEL && node.lf_left >= line_number - 1 {
                    x = node.left;
                } else if node.lf_left + node.piece.line_feed_cnt > line_number - 1 {
                    let prev_accumulated = self
                        .get_accumulated_value(x, line_number as isize - node.lf_left as isize - 2);
                    let accumulated = self
                        .get_accumulated_value(x, line_number as isize - node.lf_left as isize - 1);
                    let buffer = &self.buffers[node.piece.buffer_idx];
                    let start_offset = buffer.offset_of(node.piece.start);
                    node_start_offset += node.size_left;
                    self.search_cache.borrow_mut().set(CacheEntry {
                        node: x,
                        node_start_offset,
                        node_start_line_number: original_line_number
                            - (line_number - 1 - node.lf_left),
                    });

                    return buffer.buffer
                        [start_offset + prev_accumulated..start_offset + accumulated - end_offset]
                        .to_string();
                } else if node.lf_left + node.piece.line_feed_cnt == line_number - 1 {
                    let prev_accumulated = self
                        .get_accumulated_value(x, line_number as isize - node.lf_left as isize - 2);
                    let buffer = &self.buffers[node.piece.buffer_idx];
                    let start_offset = buffer.offset_of(node.piece.start);
                    if node.piece.length > prev_accumulated {
                        ret.push_str(
                            &buffer.buffer
                                [start_offset + prev_accumulated..start_offset + node.piece.length],
                        );
                    }
                    break;
                } else {
                    line_number -= node.lf_left + node.piece.line_feed_cnt;
                    node_start_offset += node.size_left + node.piece.length;
                    x = node.right;
                }
            }
        }

        // search in order, to find the node containing the end of the line
        x = self.tree.next(x);
        while x != SENTINEL {
            let piece = self.tree.piece(x);
            let buffer = &self.buffers[piece.buffer_idx];
            let start_offset = buffer.offset_of(piece.start);

            if piece.line_feed_cnt > 0 {
                let accumulated = self.get_accumulated_value(x, 0);
                ret.push_str(&buffer.buffer[start_offset..start_offset + accumulated - end_offset]);
                return ret;
            }
            ret.push_str(&buffer.buffer[start_offset..start_offset + piece.length]);
            x = self.tree.next(x);
        }

        ret
    }

    /// Drops cache entries the edit at `offset` may have shifted, then
    /// refreshes the document totals.
    fn finish_edit(&mut self, offset: usize) {
        self.search_cache.get_mut().validate(offset);
        self.compute_buffer_metadata();
    }

    fn compute_buffer_metadata(&mut self) {
        let mut x = self.tree.root;
        let mut lf_cnt = 1;
        let mut len = 0;

        while x != SENTINEL {
            let node = self.tree.node(x);
            lf_cnt += node.lf_left + node.piece.line_feed_cnt;
            len += node.size_left + node.piece.length;
            x = node.right;
        }

        self.line_count = lf_cnt;
        self.length = len;
        self.search_cache.get_mut().validate(len);
    }

    // ---------- Node operations ----------

    /// Line index and column inside `node` for a byte offset into its piece.
    fn get_index_of(&self, node: NodeId, accumulated_value: usize) -> (usize, usize) {
        let piece = self.tree.piece(node);
        let pos = self.position_in_buffer(node, accumulated_value);
        let line_cnt = pos.line - piece.start.line;

        if self.offset_in_buffer(piece.buffer_idx, piece.end)
            - self.offset_in_buffer(piece.buffer_idx, piece.start)
            == accumulated_value
        {
            // we are at the end of this node, a CRLF check is necessary
            let real_line_cnt = self.line_feed_cnt(piece.buffer_idx, piece.start, pos);
            if real_line_cnt != line_cnt {
                return (real_line_cnt, 0);
            }
        }

        (line_cnt, pos.column)
    }

    /// Bytes from the start of `node`'s piece to the start of its line
    /// `index + 1`, or to the piece end. Negative indexes yield 0.
    fn get_accumulated_value(&self, node: NodeId, index: isize) -> usize {
        if index < 0 {
            return 0;
        }
        let piece = self.tree.piece(node);
        let line_starts = &self.buffers[piece.buffer_idx].line_starts;
        let expected_line_start_index = piece.start.line + index as usize + 1;
        if expected_line_start_index > piece.end.line {
            line_starts[piece.end.line] + piece.end.column
                - line_starts[piece.start.line]
                - piece.start.column
        } else {
            line_starts[expected_line_start_index]
                - line_starts[piece.start.line]
                - piece.start.column
        }
    }

    fn delete_node_tail(&mut self, node: NodeId, pos: BufferCursor) {
        let piece = *self.tree.piece(node);
        let original_end_offset = self.offset_in_buffer(piece.buffer_idx, piece.end);

        let new_end_offset = self.offset_in_buffer(piece.buffer_idx, pos);
        let new_line_feed_cnt = self.line_feed_cnt(piece.buffer_idx, piece.start, pos);

        let lf_delta = new_line_feed_cnt as isize - piece.line_feed_cnt as isize;
        let size_delta = new_end_offset as isize - original_end_offset as isize;
        let new_length = piece.length.saturating_add_signed(size_delta);

        self.tree.node_mut(node).piece = Piece::new(
            piece.buffer_idx,
            piece.start,
            pos,
            new_line_feed_cnt,
            new_length,
        );
        self.tree.update_tree_metadata(node, size_delta, lf_delta);
    }

    fn delete_node_head(&mut self, node: NodeId, pos: BufferCursor) {
        let piece = *self.tree.piece(node);
        let original_start_offset = self.offset_in_buffer(piece.buffer_idx, piece.start);

        let new_line_feed_cnt = self.line_feed_cnt(piece.buffer_idx, pos, piece.end);
        let new_start_offset = self.offset_in_buffer(piece.buffer_idx, pos);
        let lf_delta = new_line_feed_cnt as isize - piece.line_feed_cnt as isize;
        let size_delta = original_start_offset as isize - new_start_offset as isize;
        let new_length = piece.length.saturating_add_signed(size_delta);

        self.tree.node_mut(node).piece = Piece::new(
            piece.buffer_idx,
            pos,
            piece.end,
            new_line_feed_cnt,
            new_length,
        );
        self.tree.update_tree_metadata(node, size_delta, lf_delta);
    }

    fn shrink_node(&mut self, node: NodeId, start: BufferCursor, end: BufferCursor) {
        let piece = *self.tree.piece(node);

        // old piece keeps [piece.start, start)
        let new_line_feed_cnt = self.line_feed_cnt(piece.buffer_idx, piece.start, start);
        let new_length = self.offset_in_buffer(piece.buffer_idx, start)
            - self.offset_in_buffer(piece.buffer_idx, piece.start);

        self.tree.node_mut(node).piece = Piece::new(
            piece.buffer_idx,
            piece.start,
            start,
            new_line_feed_cnt,
            new_length,
        );
        self.tree.update_tree_metadata(
            node,
            new_length as isize - piece.length as isize,
            new_line_feed_cnt as isize - piece.line_feed_cnt as isize,
        );

        // new right piece, [end, piece.end)
        let new_piece = Piece::new(
            piece.buffer_idx,
            end,
            piece.end,
            self.line_feed_cnt(piece.buffer_idx, end, piece.end),
            self.offset_in_buffer(piece.buffer_idx, piece.end)
                - self.offset_in_buffer(piece.buffer_idx, end),
        );

        let new_node = self.tree.insert_right(node, new_piece);
        self.validate_crlf_with_prev_node(new_node);
    }

    fn append_to_node(&mut self, node: NodeId, mut value: String) {
        if self.adjust_carriage_return_from_next(&value, node) {
            value.push('\n');
        }

        let hit_crlf =
            self.should_check_crlf() && starts_with_lf(&value) && self.node_ends_with_cr(node);
        let start_offset = self.buffers[0].len();
        let mut line_starts = create_line_starts_fast(&value);
        for ls in line_starts.iter_mut() {
            *ls += start_offset;
        }

        let add = Arc::make_mut(&mut self.buffers[0]);
        add.buffer.push_str(&value);
        if hit_crlf {
            // the \r that ended the node now pairs with the new \n
            add.line_starts.pop();
        }
        add.line_starts.extend_from_slice(&line_starts[1..]);

        let end_index = add.line_starts.len() - 1;
        let end_column = add.buffer.len() - add.line_starts[end_index];
        let new_end = BufferCursor::new(end_index, end_column);

        let piece = *self.tree.piece(node);
        let new_length = piece.length + value.len();
        let new_line_feed_cnt = self.line_feed_cnt(0, piece.start, new_end);
        let lf_delta = new_line_feed_cnt as isize - piece.line_feed_cnt as isize;

        self.tree.node_mut(node).piece = Piece::new(
            piece.buffer_idx,
            piece.start,
            new_end,
            new_line_feed_cnt,
            new_length,
        );

        self.last_change_buffer_pos = new_end;
        self.tree
            .update_tree_metadata(node, value.len() as isize, lf_delta);
    }

    fn node_at(&self, offset: usize) -> Option<NodePosition> {
        let cached = self.search_cache.borrow().get(&self.tree, offset);
        if let Some(cache) = cached {
            return Some(NodePosition {
                node: cache.node,
                remainder: offset - cache.node_start_offset,
                node_start_offset: cache.node_start_offset,
            });
        }

        let mut x = self.tree.root;
        let mut offset = offset;
        let mut node_start_offset = 0;

        while x != SENTINEL {
            let node = self.tree.node(x);
            if node.size_left > offset {
                x = node.left;
            } else if node.size_left + node.piece.length >= offset {
                node_start_offset += node.size_left;
                self.search_cache.borrow_mut().set(CacheEntry {
                    node: x,
                    node_start_offset,
                    node_start_line_number: 0,
                });
                return Some(NodePosition {
                    node: x,
                    remainder: offset - node.size_left,
                    node_start_offset,
                });
            } else {
                offset -= node.size_left + node.piece.length;
                node_start_offset += node.size_left + node.piece.length;
                x = node.right;
            }
        }

        None
    }

    fn node_at2(&self, line_number: usize, column: usize) -> Option<NodePosition> {
        let mut x = self.tree.root;
        let mut node_start_offset = 0;
        let mut line_number = line_number;
        let mut column = column;

        while x != SENTINEL {
            let node = self.tree.node(x);
            if node.left != SENTINEL && node.lf_left + 1 >= line_number {
                x = node.left;
            } else if node.lf_left + node.piece.line_feed_cnt + 1 > line_number {
                let prev_accumulated = self
                    .get_accumulated_value(x, line_number as isize - node.lf_left as isize - 2);
                let accumulated = self
                    .get_accumulated_value(x, line_number as isize - node.lf_left as isize - 1);
                node_start_offset += node.size_left;

                return Some(NodePosition {
                    node: x,
                    remainder: (prev_accumulated + column - 1).min(accumulated),
                    node_start_offset,
                });
            } else if node.lf_left + node.piece.line_feed_cnt + 1 == line_number {
                let prev_accumulated = self
                    .get_accumulated_value(x, line_number as isize - node.lf_left as isize - 2);
                if prev_accumulated + column - 1 <= node.piece.length {
                    return Some(NodePosition {
                        node: x,
                        remainder: prev_accumulated + column - 1,
                        node_start_offset: node_start_offset + node.size_left,
                    });
                }
                column -= node.piece.length - prev_accumulated;
                break;
            } else {
                line_number -= node.lf_left + node.piece.line_feed_cnt;
                node_start_offset += node.size_left + node.piece.length;
                x = node.right;
            }
        }

        // search in order, to find the node containing the column
        x = self.tree.next(x);
        while x != SENTINEL {
            let piece = self.tree.piece(x);
            if piece.line_feed_cnt > 0 {
                let accumulated = self.get_accumulated_value(x, 0);
                return Some(NodePosition {
                    node: x,
                    remainder: (column - 1).min(accumulated),
                    node_start_offset: self.tree.offset_of_node(x),
                });
            }
            if piece.length >= column - 1 {
                return Some(NodePosition {
                    node: x,
                    remainder: column - 1,
                    node_start_offset: self.tree.offset_of_node(x),
                });
            }
            column -= piece.length;
            x = self.tree.next(x);
        }

        None
    }

    fn node_char_code_at(&self, node: NodeId, offset: usize) -> Option<u8> {
        let piece = self.tree.piece(node);
        if piece.line_feed_cnt < 1 {
            return None;
        }
        let buffer = &self.buffers[piece.buffer_idx];
        let target = buffer.offset_of(piece.start) + offset;
        buffer.buffer.as_bytes().get(target).copied()
    }

    // ---------- CRLF ----------

    fn should_check_crlf(&self) -> bool {
        !(self.eol_normalized && self.eol == LineEnding::LF)
    }

    fn node_starts_with_lf(&self, node: NodeId) -> bool {
        if node == SENTINEL || self.tree.piece(node).line_feed_cnt == 0 {
            return false;
        }

        let piece = self.tree.piece(node);
        let buffer = &self.buffers[piece.buffer_idx];
        let line = piece.start.line;
        let start_offset = buffer.line_starts[line] + piece.start.column;
        if line == buffer.line_starts.len() - 1 {
            // last line, so there is no line feed at the end of this line
            return false;
        }
        let next_line_offset = buffer.line_starts[line + 1];
        if next_line_offset > start_offset + 1 {
            return false;
        }
        buffer.buffer.as_bytes()[start_offset] == b'\n'
    }

    fn node_ends_with_cr(&self, node: NodeId) -> bool {
        if node == SENTINEL || self.tree.piece(node).line_feed_cnt == 0 {
            return false;
        }
        let length = self.tree.piece(node).length;
        self.node_char_code_at(node, length - 1) == Some(b'\r')
    }

    fn validate_crlf_with_prev_node(&mut self, next_node: NodeId) {
        if self.should_check_crlf() && self.node_starts_with_lf(next_node) {
            let node = self.tree.prev(next_node);
            if self.node_ends_with_cr(node) {
                self.fix_crlf(node, next_node);
            }
        }
    }

    fn validate_crlf_with_next_node(&mut self, node: NodeId) {
        if self.should_check_crlf() && self.node_ends_with_cr(node) {
            let next_node = self.tree.next(node);
            if self.node_starts_with_lf(next_node) {
                self.fix_crlf(node, next_node);
            }
        }
    }

    /// Moves a \r ending `prev` and the \n starting `next` into one new piece.
    fn fix_crlf(&mut self, prev: NodeId, next: NodeId) {
        let mut nodes_to_del = Vec::new();

        // update node
        let prev_piece = *self.tree.piece(prev);
        let line_starts = &self.buffers[prev_piece.buffer_idx].line_starts;
        let new_end = if prev_piece.end.column == 0 {
            // the last line ends with \r, not \r\n
            BufferCursor::new(
                prev_piece.end.line - 1,
                line_starts[prev_piece.end.line] - line_starts[prev_piece.end.line - 1] - 1,
            )
        } else {
            // \r\n
            BufferCursor::new(prev_piece.end.line, prev_piece.end.column - 1)
        };

        self.tree.node_mut(prev).piece = Piece::new(
            prev_piece.buffer_idx,
            prev_piece.start,
            new_end,
            prev_piece.line_feed_cnt - 1,
            prev_piece.length - 1,
        );
        self.tree.update_tree_metadata(prev, -1, -1);
        if prev_piece.length == 1 {
            nodes_to_del.push(prev);
        }

        // update next node
        let next_piece = *self.tree.piece(next);
        let new_start = BufferCursor::new(next_piece.start.line + 1, 0);
        let new_line_feed_cnt = self.line_feed_cnt(next_piece.buffer_idx, new_start, next_piece.end);
        self.tree.node_mut(next).piece = Piece::new(
            next_piece.buffer_idx,
            new_start,
            next_piece.end,
            new_line_feed_cnt,
            next_piece.length - 1,
        );
        self.tree.update_tree_metadata(next, -1, -1);
        if next_piece.length == 1 {
            nodes_to_del.push(next);
        }

        // create new piece which contains \r\n
        let pieces = self.create_new_pieces("\r\n");
        self.tree.insert_right(prev, pieces[0]);

        // delete empty nodes
        self.delete_nodes(&nodes_to_del);
    }

    /// If `value` ends with \r and the node after `node` starts with \n, takes
    /// that \n away from the next node. The caller appends it to `value`.
    fn adjust_carriage_return_from_next(&mut self, value: &str, node: NodeId) -> bool {
        if self.should_check_crlf() && ends_with_cr(value) {
            let next_node = self.tree.next(node);
            if self.node_starts_with_lf(next_node) {
                // move `\n` forward
                let piece = *self.tree.piece(next_node);
                if piece.length == 1 {
                    self.rb_delete(next_node);
                } else {
                    let new_start = BufferCursor::new(piece.start.line + 1, 0);
                    let new_line_feed_cnt = self.line_feed_cnt(piece.buffer_idx, new_start, piece.end);
                    self.tree.node_mut(next_node).piece = Piece::new(
                        piece.buffer_idx,
                        new_start,
                        piece.end,
                        new_line_feed_cnt,
                        piece.length - 1,
                    );
                    self.tree.update_tree_metadata(next_node, -1, -1);
                }
                return true;
            }
        }
        false
    }

    // ---------- Tree operations ----------

    fn node_content(&self, node: NodeId) -> &str {
        if node == SENTINEL {
            return "";
        }
        self.piece_content(self.tree.piece(node))
    }

    pub(crate) fn piece_content(&self, piece: &Piece) -> &str {
        let buffer = &self.buffers[piece.buffer_idx];
        let start_offset = buffer.offset_of(piece.start);
        let end_offset = buffer.offset_of(piece.end);
        &buffer.buffer[start_offset..end_offset]
    }

    /// Pieces in document order.
    pub fn pieces(&self) -> Vec<Piece> {
        let mut pieces = Vec::with_capacity(self.tree.node_count());
        self.tree.for_each_inorder(|node| {
            pieces.push(*self.tree.piece(node));
            true
        });
        pieces
    }

    /// Panics if the red-black invariants, the cached subtree totals or the
    /// document totals are broken.
    pub fn assert_invariants(&self) {
        if let Err(msg) = self.tree.check_invariants() {
            panic!("piece tree invariant violated: {msg}");
        }
        let size = self.tree.calculate_size(self.tree.root);
        assert_eq!(size, self.length, "tree size disagrees with cached length");
        let lf = self.tree.calculate_lf(self.tree.root);
        assert_eq!(lf + 1, self.line_count, "tree line feeds disagree with line count");

        for piece in self.pieces() {
            let buffer = &self.buffers[piece.buffer_idx];
            let start = buffer.offset_of(piece.start);
            let end = buffer.offset_of(piece.end);
            assert_eq!(end - start, piece.length, "piece length disagrees with its cursors");
            assert_eq!(
                piece.line_feed_cnt,
                self.line_feed_cnt(piece.buffer_idx, piece.start, piece.end),
                "piece line feed count disagrees with its cursors"
            );
        }
    }
}

#[cfg(test)]
mod tests;
