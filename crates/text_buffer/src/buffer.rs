use std::cmp::Ordering;
use std::convert::Infallible;
use std::str::FromStr;

use piece_tree::{
    EndOfLine, LineEnding, PieceTree, PieceTreeError, PieceTreeSnapshot, Position, Range,
    SearchQuery, StringBuffer, count_eol, create_line_starts, normalize_eol, strings,
};
use tracing::{debug, trace};

use crate::edit::{
    ApplyEditsResult, ContentChange, ReverseEditOperation, SingleEditOperation,
    ValidatedEditOperation,
};
use crate::error::{BufferError, BufferResult};
use crate::text_change::TextChange;
use crate::PieceTreeTextBufferBuilder;

/// Batches at least this large are collapsed into a single edit first.
pub const REDUCE_OPERATIONS_THRESHOLD: usize = 1000;

/// A document backed by a [`PieceTree`], plus the bookkeeping an editor needs
/// on top of it: BOM, content flags and batched edits with undo data.
///
/// Offsets are byte offsets, columns are 1-based byte columns. Positions and
/// ranges handed to this type are validated and rejected, never clamped.
#[derive(Debug, Clone)]
pub struct PieceTreeTextBuffer {
    tree: PieceTree,
    bom: String,
    might_contain_rtl: bool,
    might_contain_unusual_line_terminators: bool,
    might_contain_non_basic_ascii: bool,
}

impl PieceTreeTextBuffer {
    pub(crate) fn new(
        chunks: Vec<StringBuffer>,
        eol: LineEnding,
        eol_normalized: bool,
        bom: String,
        might_contain_rtl: bool,
        might_contain_unusual_line_terminators: bool,
        might_contain_non_basic_ascii: bool,
    ) -> Self {
        Self {
            tree: PieceTree::new(chunks, eol, eol_normalized),
            bom,
            might_contain_rtl,
            might_contain_unusual_line_terminators,
            might_contain_non_basic_ascii,
        }
    }

    /// Same BOM, same EOL and same content.
    pub fn equal(&self, other: &PieceTreeTextBuffer) -> bool {
        self.bom == other.bom && self.eol() == other.eol() && self.tree.equal(&other.tree)
    }

    pub fn piece_tree(&self) -> &PieceTree {
        &self.tree
    }

    pub fn might_contain_rtl(&self) -> bool {
        self.might_contain_rtl
    }

    pub fn might_contain_unusual_line_terminators(&self) -> bool {
        self.might_contain_unusual_line_terminators
    }

    pub fn reset_might_contain_unusual_line_terminators(&mut self) {
        self.might_contain_unusual_line_terminators = false;
    }

    pub fn might_contain_non_basic_ascii(&self) -> bool {
        self.might_contain_non_basic_ascii
    }

    pub fn bom(&self) -> &str {
        &self.bom
    }

    pub fn create_snapshot(&self, preserve_bom: bool) -> PieceTreeSnapshot {
        let bom = if preserve_bom { self.bom.as_str() } else { "" };
        self.tree.create_snapshot(bom)
    }

    /// Whole document, BOM excluded.
    pub fn get_text(&self) -> String {
        self.tree.get_lines_raw_content()
    }

    pub fn len(&self) -> usize {
        self.tree.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    // ---------- validation ----------

    /// Checks that `offset` is inside the document and on a character boundary.
    pub fn validate_offset(&self, offset: usize) -> BufferResult<()> {
        if offset > self.tree.len() {
            return Err(PieceTreeError::OffsetOutOfBounds {
                offset,
                len: self.tree.len(),
            }
            .into());
        }
        if !self.tree.is_char_boundary(offset) {
            return Err(PieceTreeError::NotCharBoundary { offset }.into());
        }
        Ok(())
    }

    /// Checks `position` and returns its offset.
    pub fn validate_position(&self, position: Position) -> BufferResult<usize> {
        let line_count = self.tree.line_count();
        if position.line == 0 || position.line > line_count {
            return Err(PieceTreeError::LineOutOfBounds {
                line: position.line,
                line_count,
            }
            .into());
        }

        let max_column = self.get_line_max_column(position.line);
        if position.column == 0 || position.column > max_column {
            return Err(PieceTreeError::ColumnOutOfBounds {
                line: position.line,
                column: position.column,
                max_column,
            }
            .into());
        }

        let offset = self.tree.get_offset_at(position.line, position.column);
        if !self.tree.is_char_boundary(offset) {
            return Err(PieceTreeError::NotCharBoundary { offset }.into());
        }
        Ok(offset)
    }

    /// Checks both ends of `range` and returns their offsets.
    pub fn validate_range(&self, range: Range) -> BufferResult<(usize, usize)> {
        if range.end() < range.start() {
            return Err(BufferError::InvalidRange(range));
        }
        let start = self.validate_position(range.start())?;
        let end = self.validate_position(range.end())?;
        Ok((start, end))
    }

    // ---------- addressing ----------

    pub fn get_offset_at(&self, line_number: usize, column: usize) -> BufferResult<usize> {
        self.validate_position(Position::new(line_number, column))
    }

    pub fn get_position_at(&self, offset: usize) -> BufferResult<Position> {
        self.validate_offset(offset)?;
        Ok(self.tree.get_position_at(offset))
    }

    pub fn get_range_at(&self, start: usize, length: usize) -> BufferResult<Range> {
        let start_position = self.get_position_at(start)?;
        let end_position = self.get_position_at(start.saturating_add(length))?;
        Ok(Range::from_positions(start_position, end_position))
    }

    fn line_ending_for(&self, eol: EndOfLine) -> Option<LineEnding> {
        match eol {
            EndOfLine::TextDefined => None,
            EndOfLine::LF => Some(LineEnding::LF),
            EndOfLine::CRLF => Some(LineEnding::CRLF),
        }
    }

    /// Text inside `range`. `TextDefined` returns the stored line breaks as-is.
    pub fn get_value_in_range(&self, range: Range, eol: EndOfLine) -> BufferResult<String> {
        self.validate_range(range)?;
        Ok(self.tree.get_value_in_range(range, self.line_ending_for(eol)))
    }

    pub fn get_value_length_in_range(&self, range: Range, eol: EndOfLine) -> BufferResult<usize> {
        let (start, end) = self.validate_range(range)?;
        match self.line_ending_for(eol) {
            Some(wanted) if wanted != self.eol() || !self.tree.is_eol_normalized() => {
                Ok(self.tree.get_value_in_range(range, Some(wanted)).len())
            }
            _ => Ok(end - start),
        }
    }

    /// Number of characters (Unicode scalar values) in `range`.
    pub fn get_character_count_in_range(&self, range: Range, eol: EndOfLine) -> BufferResult<usize> {
        if !self.might_contain_non_basic_ascii {
            return self.get_value_length_in_range(range, eol);
        }
        self.validate_range(range)?;

        let mut result = 0;
        for line_number in range.start_line..=range.end_line {
            let content = self.tree.get_line_content(line_number);
            let from = if line_number == range.start_line {
                range.start_column - 1
            } else {
                0
            };
            let to = if line_number == range.end_line {
                range.end_column - 1
            } else {
                content.len()
            };
            result += content.get(from..to).map_or(0, |s| s.chars().count());
        }

        let eol_len = self
            .line_ending_for(eol)
            .unwrap_or_else(|| self.eol())
            .len();
        result += eol_len * (range.end_line - range.start_line);
        Ok(result)
    }

    // ---------- lines ----------

    pub fn get_line_count(&self) -> usize {
        self.tree.line_count()
    }

    pub fn get_lines_content(&self) -> Vec<String> {
        self.tree.get_lines_content()
    }

    /// Content of a line (1-based). Out of range gives an empty string.
    pub fn get_line_content(&self, line_number: usize) -> String {
        self.tree.get_line_content(line_number)
    }

    pub fn get_line_content_with_eol(&self, line_number: usize) -> String {
        self.tree.get_line_content_with_eol(line_number)
    }

    pub fn get_line_char_code(&self, line_number: usize, index: usize) -> Option<u8> {
        self.tree.get_line_char_code(line_number, index)
    }

    pub fn get_char_code(&self, offset: usize) -> Option<u8> {
        self.tree.get_char_code(offset)
    }

    /// Byte length of a line without its terminator.
    pub fn get_line_length(&self, line_number: usize) -> usize {
        self.tree.get_line_length(line_number)
    }

    pub fn get_line_min_column(&self, _line_number: usize) -> usize {
        1
    }

    pub fn get_line_max_column(&self, line_number: usize) -> usize {
        self.get_line_length(line_number) + 1
    }

    /// 0 when the line is blank.
    pub fn get_line_first_non_whitespace_column(&self, line_number: usize) -> usize {
        strings::first_non_whitespace_index(&self.get_line_content(line_number))
            .map_or(0, |i| i + 1)
    }

    /// Column just past the last non-blank byte, 0 when the line is blank.
    pub fn get_line_last_non_whitespace_column(&self, line_number: usize) -> usize {
        strings::last_non_whitespace_index(&self.get_line_content(line_number))
            .map_or(0, |i| i + 2)
    }

    pub fn get_nearest_chunk(&self, offset: usize) -> &str {
        self.tree.get_nearest_chunk(offset)
    }

    pub fn eol(&self) -> LineEnding {
        self.tree.eol()
    }

    /// Rewrites every line break to `eol`.
    pub fn set_eol(&mut self, eol: LineEnding) {
        self.tree.set_eol(eol);
    }

    // ---------- search ----------

    /// Matches of `query` inside `range`, in document order, at most `limit`.
    pub fn find(
        &self,
        query: &SearchQuery,
        range: Range,
        limit: usize,
        is_cancelled: impl Fn() -> bool,
    ) -> BufferResult<Vec<Range>> {
        self.validate_range(range)?;
        Ok(self.tree.find_matches(query, range, limit, is_cancelled))
    }

    // ---------- edits ----------

    /// True when `text` holds a line break other than the buffer's EOL.
    fn has_foreign_eol(&self, text: &str) -> bool {
        let starts = create_line_starts(text);
        match self.eol() {
            LineEnding::CRLF => starts.cr > 0 || starts.lf > 0,
            _ => starts.cr > 0 || starts.crlf > 0,
        }
    }

    /// Rewrites `text`'s line breaks to the buffer's EOL when any differ.
    fn normalize_text_eol(&self, text: String) -> String {
        if self.has_foreign_eol(&text) {
            normalize_eol(&text, self.eol())
        } else {
            text
        }
    }

    /// Applies a batch of non-overlapping replacements.
    ///
    /// Operations are applied bottom-up so earlier ones keep their offsets;
    /// the returned changes follow that order. With `compute_undo_edits` the
    /// result also carries the edits that restore the previous content.
    pub fn apply_edits(
        &mut self,
        raw_operations: Vec<SingleEditOperation>,
        record_trim_auto_whitespace: bool,
        compute_undo_edits: bool,
    ) -> BufferResult<ApplyEditsResult> {
        let mut might_contain_rtl = self.might_contain_rtl;
        let mut might_contain_unusual_line_terminators = self.might_contain_unusual_line_terminators;
        let mut might_contain_non_basic_ascii = self.might_contain_non_basic_ascii;

        let mut operations = Vec::with_capacity(raw_operations.len());
        for (sort_index, op) in raw_operations.into_iter().enumerate() {
            let (range_offset, range_end) = self.validate_range(op.range)?;

            if !op.text.is_empty() {
                let mut text_might_contain_non_basic_ascii = true;
                if !might_contain_non_basic_ascii {
                    text_might_contain_non_basic_ascii = !strings::is_basic_ascii(&op.text);
                    might_contain_non_basic_ascii = text_might_contain_non_basic_ascii;
                }
                if !might_contain_rtl && text_might_contain_non_basic_ascii {
                    might_contain_rtl = strings::contains_rtl(&op.text);
                }
                if !might_contain_unusual_line_terminators && text_might_contain_non_basic_ascii {
                    might_contain_unusual_line_terminators =
                        strings::contains_unusual_line_terminators(&op.text);
                }
            }

            let text = if op.keep_eol {
                op.text
            } else {
                self.normalize_text_eol(op.text)
            };
            let counter = count_eol(&text);
            operations.push(ValidatedEditOperation {
                sort_index,
                identifier: op.identifier,
                range: op.range,
                range_offset,
                range_length: range_end - range_offset,
                text,
                eol_count: counter.eol_count,
                first_line_length: counter.first_line_length,
                last_line_length: counter.last_line_length,
                force_move_markers: op.force_move_markers,
                is_auto_whitespace_edit: op.is_auto_whitespace_edit,
            });
        }

        operations.sort_by(Self::sort_ops_ascending);

        let mut has_touching_ranges = false;
        for pair in operations.windows(2) {
            let range_end = pair[0].range.end();
            let next_range_start = pair[1].range.start();
            if next_range_start <= range_end {
                if next_range_start < range_end {
                    return Err(BufferError::OverlappingRanges {
                        first: pair[0].range,
                        second: pair[1].range,
                    });
                }
                has_touching_ranges = true;
            }
        }

        if operations.len() >= REDUCE_OPERATIONS_THRESHOLD {
            debug!(count = operations.len(), "reducing edit batch to a single operation");
            operations = vec![self.to_single_edit_operation(&operations)?];
        }

        let reverse_ranges = if compute_undo_edits || record_trim_auto_whitespace {
            Self::get_inverse_edit_ranges(&operations)
        } else {
            Vec::new()
        };

        let mut trim_candidates: Vec<(usize, String)> = Vec::new();
        if record_trim_auto_whitespace {
            for (op, reverse_range) in operations.iter().zip(&reverse_ranges) {
                if !(op.is_auto_whitespace_edit && op.range.is_empty()) {
                    continue;
                }
                // these line numbers are where the whitespace will live after the edit
                for line_number in reverse_range.start_line..=reverse_range.end_line {
                    let mut current_line_content = String::new();
                    if line_number == reverse_range.start_line {
                        current_line_content = self.get_line_content(op.range.start_line);
                        if strings::first_non_whitespace_index(&current_line_content).is_some() {
                            continue;
                        }
                    }
                    trim_candidates.push((line_number, current_line_content));
                }
            }
        }

        let reverse_edits = if compute_undo_edits {
            let mut reverse_range_delta_offset = 0isize;
            let mut reverse_operations = Vec::with_capacity(operations.len());
            for (op, reverse_range) in operations.iter().zip(&reverse_ranges) {
                let buffer_text = self.tree.get_value_in_range(op.range, None);
                let reverse_range_offset =
                    op.range_offset.saturating_add_signed(reverse_range_delta_offset);
                reverse_range_delta_offset += op.text.len() as isize - buffer_text.len() as isize;

                reverse_operations.push(ReverseEditOperation {
                    sort_index: op.sort_index,
                    identifier: op.identifier,
                    range: *reverse_range,
                    text_change: TextChange::new(
                        op.range_offset,
                        buffer_text.clone(),
                        reverse_range_offset,
                        op.text.clone(),
                    ),
                    text: buffer_text,
                });
            }

            // touching ranges must stay in position order
            if !has_touching_ranges {
                reverse_operations.sort_by_key(|op| op.sort_index);
            }
            Some(reverse_operations)
        } else {
            None
        };

        self.might_contain_rtl = might_contain_rtl;
        self.might_contain_unusual_line_terminators = might_contain_unusual_line_terminators;
        self.might_contain_non_basic_ascii = might_contain_non_basic_ascii;

        let changes = self.do_apply_edits(operations)?;

        let trimmed_whitespace_lines = if record_trim_auto_whitespace && !trim_candidates.is_empty() {
            trim_candidates.sort_by(|a, b| b.0.cmp(&a.0));

            let mut lines = Vec::new();
            for (i, (line_number, old_content)) in trim_candidates.iter().enumerate() {
                if i > 0 && trim_candidates[i - 1].0 == *line_number {
                    continue;
                }
                let line_content = self.get_line_content(*line_number);
                if line_content.is_empty()
                    || line_content == *old_content
                    || strings::first_non_whitespace_index(&line_content).is_some()
                {
                    continue;
                }
                lines.push(*line_number);
            }
            Some(lines)
        } else {
            None
        };

        Ok(ApplyEditsResult {
            changes,
            reverse_edits,
            trimmed_whitespace_lines,
        })
    }

    fn do_apply_edits(
        &mut self,
        mut operations: Vec<ValidatedEditOperation>,
    ) -> BufferResult<Vec<ContentChange>> {
        operations.sort_by(Self::sort_ops_descending);

        let mut changes = Vec::with_capacity(operations.len());
        // bottom of the document first
        for op in operations {
            trace!(
                offset = op.range_offset,
                deleted = op.range_length,
                inserted = op.text.len(),
                "apply edit"
            );
            self.tree.delete(op.range_offset, op.range_length)?;
            if !op.text.is_empty() {
                let eol_normalized = !self.has_foreign_eol(&op.text);
                self.tree.insert(op.range_offset, &op.text, eol_normalized)?;
            }

            changes.push(ContentChange {
                range: op.range,
                range_offset: op.range_offset,
                range_length: op.range_length,
                text: op.text,
                force_move_markers: op.force_move_markers,
            });
        }
        Ok(changes)
    }

    /// Collapses ascending, already validated operations into one edit that
    /// spans all of them. Untouched text between the edits is copied into
    /// the replacement.
    pub fn to_single_edit_operation(
        &self,
        operations: &[ValidatedEditOperation],
    ) -> BufferResult<ValidatedEditOperation> {
        let (Some(first), Some(last)) = (operations.first(), operations.last()) else {
            return Err(BufferError::EmptyBatch);
        };

        let entire_edit_range = Range::new(
            first.range.start_line,
            first.range.start_column,
            last.range.end_line,
            last.range.end_column,
        );
        let mut last_end_line = first.range.start_line;
        let mut last_end_column = first.range.start_column;
        let mut force_move_markers = false;
        let mut result = String::new();

        for op in operations {
            let range = op.range;
            force_move_markers |= op.force_move_markers;

            // old text up to this edit
            result.push_str(&self.tree.get_value_in_range(
                Range::new(last_end_line, last_end_column, range.start_line, range.start_column),
                None,
            ));
            // then its replacement
            result.push_str(&op.text);

            last_end_line = range.end_line;
            last_end_column = range.end_column;
        }

        let counter = count_eol(&result);
        let (range_offset, range_end) = self.validate_range(entire_edit_range)?;
        Ok(ValidatedEditOperation {
            sort_index: 0,
            identifier: first.identifier,
            range: entire_edit_range,
            range_offset,
            range_length: range_end - range_offset,
            text: result,
            eol_count: counter.eol_count,
            first_line_length: counter.first_line_length,
            last_line_length: counter.last_line_length,
            force_move_markers,
            is_auto_whitespace_edit: false,
        })
    }

    /// Range that `text` occupies once it replaces `range`.
    pub fn get_inverse_edit_range(range: Range, text: &str) -> Range {
        let start_line = range.start_line;
        let start_column = range.start_column;
        if text.is_empty() {
            return Range::new(start_line, start_column, start_line, start_column);
        }

        let counter = count_eol(text);
        if counter.eol_count == 0 {
            Range::new(
                start_line,
                start_column,
                start_line,
                start_column + counter.first_line_length,
            )
        } else {
            Range::new(
                start_line,
                start_column,
                start_line + counter.eol_count,
                counter.last_line_length + 1,
            )
        }
    }

    /// Inverse ranges for ascending operations, each shifted by the edits
    /// applied before it.
    pub fn get_inverse_edit_ranges(operations: &[ValidatedEditOperation]) -> Vec<Range> {
        let mut result = Vec::with_capacity(operations.len());

        let mut prev_op_end_line = 0;
        let mut prev_op_end_column = 0;
        let mut prev_op: Option<&ValidatedEditOperation> = None;

        for op in operations {
            let (start_line, start_column) = match prev_op {
                Some(prev) if prev.range.end_line == op.range.start_line => (
                    prev_op_end_line,
                    prev_op_end_column + (op.range.start_column - prev.range.end_column),
                ),
                Some(prev) => (
                    prev_op_end_line + (op.range.start_line - prev.range.end_line),
                    op.range.start_column,
                ),
                None => (op.range.start_line, op.range.start_column),
            };

            let result_range = if op.text.is_empty() {
                Range::new(start_line, start_column, start_line, start_column)
            } else if op.eol_count == 0 {
                Range::new(
                    start_line,
                    start_column,
                    start_line,
                    start_column + op.first_line_length,
                )
            } else {
                Range::new(
                    start_line,
                    start_column,
                    start_line + op.eol_count,
                    op.last_line_length + 1,
                )
            };

            prev_op_end_line = result_range.end_line;
            prev_op_end_column = result_range.end_column;
            result.push(result_range);
            prev_op = Some(op);
        }

        result
    }

    pub fn sort_ops_ascending(a: &ValidatedEditOperation, b: &ValidatedEditOperation) -> Ordering {
        Range::compare_using_ends(&a.range, &b.range).then(a.sort_index.cmp(&b.sort_index))
    }

    pub fn sort_ops_descending(a: &ValidatedEditOperation, b: &ValidatedEditOperation) -> Ordering {
        Range::compare_using_ends(&b.range, &a.range).then(b.sort_index.cmp(&a.sort_index))
    }
}

impl FromStr for PieceTreeTextBuffer {
    type Err = Infallible;

    /// Build from a single string with the default build options.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut builder = PieceTreeTextBufferBuilder::new();
        builder.accept_chunk(s);
        Ok(builder.finish(&Default::default()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }

    fn buffer(text: &str) -> PieceTreeTextBuffer {
        text.parse().unwrap()
    }

    fn edit_op(
        range: (usize, usize, usize, usize),
        offsets: (usize, usize),
        lines: Option<&[&str]>,
    ) -> ValidatedEditOperation {
        let (text, eol_count, first_line_length, last_line_length) = match lines {
            Some(lines) => (
                lines.join("\n"),
                lines.len() - 1,
                lines[0].len(),
                lines[lines.len() - 1].len(),
            ),
            None => (String::new(), 0, 0, 0),
        };
        ValidatedEditOperation {
            sort_index: 0,
            identifier: None,
            range: Range::new(range.0, range.1, range.2, range.3),
            range_offset: offsets.0,
            range_length: offsets.1,
            text,
            eol_count,
            first_line_length,
            last_line_length,
            force_move_markers: false,
            is_auto_whitespace_edit: false,
        }
    }

    fn op(
        range: (usize, usize, usize, usize),
        lines: Option<&[&str]>,
    ) -> ValidatedEditOperation {
        edit_op(range, (0, 0), lines)
    }

    fn assert_inverse_edits(ops: &[ValidatedEditOperation], expected: &[(usize, usize, usize, usize)]) {
        let expected: Vec<Range> = expected
            .iter()
            .map(|&(a, b, c, d)| Range::new(a, b, c, d))
            .collect();
        assert_eq!(PieceTreeTextBuffer::get_inverse_edit_ranges(ops), expected);
    }

    // ---------- inverse edit ranges ----------

    #[test]
    fn inverse_single_insert() {
        assert_inverse_edits(&[op((1, 1, 1, 1), Some(&["hello"]))], &[(1, 1, 1, 6)]);
    }

    #[test]
    fn inverse_deletes_on_separate_lines() {
        assert_inverse_edits(
            &[op((2, 1, 2, 2), Some(&[""])), op((3, 1, 4, 2), Some(&[""]))],
            &[(2, 1, 2, 1), (3, 1, 3, 1)],
        );
    }

    #[test]
    fn inverse_single_line_inserts() {
        assert_inverse_edits(
            &[op((1, 1, 1, 1), Some(&["hello"])), op((2, 1, 2, 1), Some(&["world"]))],
            &[(1, 1, 1, 6), (2, 1, 2, 6)],
        );
        assert_inverse_edits(
            &[op((1, 1, 1, 1), Some(&["hello"])), op((1, 2, 1, 2), Some(&["world"]))],
            &[(1, 1, 1, 6), (1, 7, 1, 12)],
        );
        assert_inverse_edits(
            &[op((1, 1, 1, 1), Some(&["hello"])), op((1, 4, 1, 4), Some(&["world"]))],
            &[(1, 1, 1, 6), (1, 9, 1, 14)],
        );
    }

    #[test]
    fn inverse_multiline_inserts() {
        assert_inverse_edits(&[op((1, 1, 1, 1), Some(&["hello", "world"]))], &[(1, 1, 2, 6)]);
        assert_inverse_edits(
            &[
                op((1, 1, 1, 1), Some(&["hello", "world"])),
                op((2, 1, 2, 1), Some(&["how", "are", "you?"])),
            ],
            &[(1, 1, 2, 6), (3, 1, 5, 5)],
        );
        assert_inverse_edits(
            &[
                op((1, 1, 1, 1), Some(&["hello", "world"])),
                op((1, 2, 1, 2), Some(&["how", "are", "you?"])),
            ],
            &[(1, 1, 2, 6), (2, 7, 4, 5)],
        );
    }

    #[test]
    fn inverse_deletes() {
        assert_inverse_edits(&[op((1, 1, 1, 6), None)], &[(1, 1, 1, 1)]);
        assert_inverse_edits(
            &[op((1, 1, 1, 6), None), op((2, 1, 2, 6), None)],
            &[(1, 1, 1, 1), (2, 1, 2, 1)],
        );
        assert_inverse_edits(
            &[op((1, 1, 1, 6), None), op((1, 7, 1, 12), None)],
            &[(1, 1, 1, 1), (1, 2, 1, 2)],
        );
        assert_inverse_edits(
            &[op((1, 1, 1, 6), None), op((1, 9, 1, 14), None)],
            &[(1, 1, 1, 1), (1, 4, 1, 4)],
        );
    }

    #[test]
    fn inverse_multiline_deletes() {
        assert_inverse_edits(&[op((1, 1, 2, 6), None)], &[(1, 1, 1, 1)]);
        assert_inverse_edits(
            &[op((1, 1, 2, 6), None), op((3, 1, 5, 5), None)],
            &[(1, 1, 1, 1), (2, 1, 2, 1)],
        );
        assert_inverse_edits(
            &[op((1, 1, 2, 6), None), op((2, 7, 4, 5), None)],
            &[(1, 1, 1, 1), (1, 2, 1, 2)],
        );
    }

    #[test]
    fn inverse_replaces() {
        assert_inverse_edits(&[op((1, 1, 1, 6), Some(&["Hello world"]))], &[(1, 1, 1, 12)]);
        assert_inverse_edits(
            &[
                op((1, 1, 1, 6), Some(&["Hello world"])),
                op((1, 7, 1, 8), Some(&["How are you?"])),
            ],
            &[(1, 1, 1, 12), (1, 13, 1, 25)],
        );
    }

    #[test]
    fn inverse_many_edits() {
        assert_inverse_edits(
            &[
                op((1, 2, 1, 2), Some(&["", "  "])),
                op((1, 5, 1, 6), Some(&[""])),
                op((1, 9, 1, 9), Some(&["", ""])),
            ],
            &[(1, 2, 2, 3), (2, 6, 2, 6), (2, 9, 3, 1)],
        );
    }

    #[test]
    fn inverse_edit_range_of_text() {
        let at = Range::new(3, 4, 3, 9);
        assert_eq!(PieceTreeTextBuffer::get_inverse_edit_range(at, ""), Range::new(3, 4, 3, 4));
        assert_eq!(PieceTreeTextBuffer::get_inverse_edit_range(at, "ab"), Range::new(3, 4, 3, 6));
        assert_eq!(
            PieceTreeTextBuffer::get_inverse_edit_range(at, "ab\r\ncde"),
            Range::new(3, 4, 4, 4)
        );
    }

    // ---------- to_single_edit_operation ----------

    fn assert_single_edit(
        original: &[&str],
        edits: &[ValidatedEditOperation],
        expected: ValidatedEditOperation,
    ) {
        let buffer = buffer(&original.join("\n"));
        assert_eq!(buffer.to_single_edit_operation(edits).unwrap(), expected);
    }

    const DOC: &[&str] = &["My First Line", "\t\tMy Second Line", "    Third Line", "", "1"];

    #[test]
    fn single_edit_one_op_is_unchanged() {
        assert_single_edit(
            DOC,
            &[edit_op((1, 3, 1, 3), (2, 0), Some(&[" new line", "No longer"]))],
            edit_op((1, 3, 1, 3), (2, 0), Some(&[" new line", "No longer"])),
        );
    }

    #[test]
    fn single_edit_two_edits_on_one_line() {
        assert_single_edit(
            DOC,
            &[
                edit_op((1, 1, 1, 3), (0, 2), Some(&["Your"])),
                edit_op((1, 4, 1, 4), (3, 0), Some(&["Interesting "])),
                edit_op((2, 3, 2, 6), (16, 3), None),
            ],
            edit_op((1, 1, 2, 6), (0, 19), Some(&["Your Interesting First Line", "\t\t"])),
        );
    }

    #[test]
    fn single_edit_insert_multiple_newlines() {
        assert_single_edit(
            DOC,
            &[
                edit_op((1, 3, 1, 3), (2, 0), Some(&["", "", "", "", ""])),
                edit_op((3, 15, 3, 15), (45, 0), Some(&["a", "b"])),
            ],
            edit_op(
                (1, 3, 3, 15),
                (2, 43),
                Some(&["", "", "", "", " First Line", "\t\tMy Second Line", "    Third Linea", "b"]),
            ),
        );
    }

    #[test]
    fn single_edit_delete_empty_text() {
        assert_single_edit(
            DOC,
            &[edit_op((1, 1, 1, 1), (0, 0), Some(&[""]))],
            edit_op((1, 1, 1, 1), (0, 0), Some(&[""])),
        );
    }

    #[test]
    fn single_edit_two_unrelated_edits() {
        assert_single_edit(
            &["My First Line", "\t\tMy Second Line", "    Third Line", "", "123"],
            &[
                edit_op((2, 1, 2, 3), (14, 2), Some(&["\t"])),
                edit_op((3, 1, 3, 5), (31, 4), Some(&[""])),
            ],
            edit_op((2, 1, 3, 5), (14, 21), Some(&["\tMy Second Line", ""])),
        );
    }

    #[test]
    fn single_edit_many_edits() {
        assert_single_edit(
            &["{\"x\" : 1}"],
            &[
                edit_op((1, 2, 1, 2), (1, 0), Some(&["\n  "])),
                edit_op((1, 5, 1, 6), (4, 1), Some(&[""])),
                edit_op((1, 9, 1, 9), (8, 0), Some(&["\n"])),
            ],
            edit_op((1, 2, 1, 9), (1, 7), Some(&["", "  \"x\": 1", ""])),
        );
    }

    #[test]
    fn single_edit_many_edits_reversed() {
        assert_single_edit(
            &["{", "  \"x\": 1", "}"],
            &[
                edit_op((1, 2, 2, 3), (1, 3), Some(&[""])),
                edit_op((2, 6, 2, 6), (7, 0), Some(&[" "])),
                edit_op((2, 9, 3, 1), (10, 1), Some(&[""])),
            ],
            edit_op((1, 2, 3, 1), (1, 10), Some(&["\"x\" : 1"])),
        );
    }

    #[test]
    fn single_edit_replacing_newlines() {
        assert_single_edit(
            &["{", "\"a\": true,", "", "\"b\": true", "}"],
            &[
                edit_op((1, 2, 2, 1), (1, 1), Some(&["", "\t"])),
                edit_op((2, 11, 4, 1), (12, 2), Some(&["", "\t"])),
            ],
            edit_op((1, 2, 4, 1), (1, 13), Some(&["", "\t\"a\": true,", "\t"])),
        );

        assert_single_edit(
            &[
                "some text",
                "some more text",
                "now comes an empty line",
                "",
                "after empty line",
                "and the last line",
            ],
            &[
                edit_op((1, 5, 3, 1), (4, 21), Some(&[" text", "some more text", "some more text"])),
                edit_op((3, 2, 4, 1), (26, 23), Some(&["o more lines", "asd", "asd", "asd"])),
                edit_op((5, 1, 5, 6), (50, 5), Some(&["zzzzzzzz"])),
                edit_op((5, 11, 6, 16), (60, 22), Some(&["1", "2", "3", "4"])),
            ],
            edit_op(
                (1, 5, 6, 16),
                (4, 78),
                Some(&[
                    " text",
                    "some more text",
                    "some more textno more lines",
                    "asd",
                    "asd",
                    "asd",
                    "zzzzzzzz empt1",
                    "2",
                    "3",
                    "4",
                ]),
            ),
        );
    }

    #[test]
    fn single_edit_advanced() {
        assert_single_edit(
            &[
                " {       \"d\": [",
                "             null",
                "        ] /*comment*/",
                "        ,\"e\": /*comment*/ [null] }",
            ],
            &[
                edit_op((1, 1, 1, 2), (0, 1), Some(&[""])),
                edit_op((1, 3, 1, 10), (2, 7), Some(&["", "  "])),
                edit_op((1, 16, 2, 14), (15, 14), Some(&["", "    "])),
                edit_op((2, 18, 3, 9), (33, 9), Some(&["", "  "])),
                edit_op((3, 22, 4, 9), (55, 9), Some(&[""])),
                edit_op((4, 10, 4, 10), (65, 0), Some(&["", "  "])),
                edit_op((4, 28, 4, 28), (83, 0), Some(&["", "    "])),
                edit_op((4, 32, 4, 32), (87, 0), Some(&["", "  "])),
                edit_op((4, 33, 4, 34), (88, 1), Some(&["", ""])),
            ],
            edit_op(
                (1, 1, 4, 34),
                (0, 89),
                Some(&[
                    "{",
                    "  \"d\": [",
                    "    null",
                    "  ] /*comment*/,",
                    "  \"e\": /*comment*/ [",
                    "    null",
                    "  ]",
                    "",
                ]),
            ),
        );

        assert_single_edit(
            &["   abc", " ,def"],
            &[
                edit_op((1, 1, 1, 4), (0, 3), Some(&[""])),
                edit_op((1, 7, 2, 2), (6, 2), Some(&[""])),
                edit_op((2, 3, 2, 3), (9, 0), Some(&["", ""])),
            ],
            edit_op((1, 1, 2, 3), (0, 9), Some(&["abc,", ""])),
        );
    }

    #[test]
    fn single_edit_of_nothing_is_an_error() {
        let buffer = buffer("abc");
        assert!(matches!(
            buffer.to_single_edit_operation(&[]),
            Err(BufferError::EmptyBatch)
        ));
    }

    // ---------- apply_edits ----------

    fn apply(buffer: &mut PieceTreeTextBuffer, ops: Vec<SingleEditOperation>) -> ApplyEditsResult {
        buffer.apply_edits(ops, false, true).unwrap()
    }

    /// Undoes a batch through its reverse edits, the way an editor would.
    fn undo(buffer: &mut PieceTreeTextBuffer, result: &ApplyEditsResult) {
        let ops = result
            .reverse_edits
            .as_ref()
            .unwrap()
            .iter()
            .map(ReverseEditOperation::to_edit)
            .collect();
        buffer.apply_edits(ops, false, false).unwrap();
    }

    #[test]
    fn apply_single_insert() {
        let mut buffer = buffer("");
        let result = apply(&mut buffer, vec![SingleEditOperation::insert(1, 1, "hello")]);
        assert_eq!(buffer.get_text(), "hello");
        assert_eq!(
            result.changes,
            vec![ContentChange {
                range: Range::new(1, 1, 1, 1),
                range_offset: 0,
                range_length: 0,
                text: "hello".into(),
                force_move_markers: false,
            }]
        );
        let reverse = result.reverse_edits.unwrap();
        assert_eq!(reverse[0].range, Range::new(1, 1, 1, 6));
        assert_eq!(reverse[0].text_change, TextChange::new(0, "", 0, "hello"));
    }

    #[test]
    fn apply_changes_come_bottom_up() {
        let mut buffer = buffer("aaa\nbbb\nccc");
        let result = apply(
            &mut buffer,
            vec![
                SingleEditOperation::insert(1, 1, "1"),
                SingleEditOperation::insert(3, 1, "3"),
                SingleEditOperation::insert(2, 1, "2"),
            ],
        );
        assert_eq!(buffer.get_text(), "1aaa\n2bbb\n3ccc");
        let lines: Vec<usize> = result.changes.iter().map(|c| c.range.start_line).collect();
        assert_eq!(lines, vec![3, 2, 1]);

        // reverse edits follow input order and are rebased
        let reverse = result.reverse_edits.unwrap();
        let ranges: Vec<Range> = reverse.iter().map(|r| r.range).collect();
        assert_eq!(
            ranges,
            vec![Range::new(1, 1, 1, 2), Range::new(3, 1, 3, 2), Range::new(2, 1, 2, 2)]
        );
        let positions: Vec<usize> = reverse.iter().map(|r| r.text_change.new_position).collect();
        assert_eq!(positions, vec![0, 10, 5]);
    }

    #[test]
    fn apply_then_undo_restores_content() {
        init_tracing();
        let original = "hi hello\nworld\nthis is multi line delete test\n😄";
        let mut buffer = buffer(original);
        let result = apply(
            &mut buffer,
            vec![
                SingleEditOperation::delete(Range::new(1, 4, 4, 1)),
                SingleEditOperation::insert(4, 5, "!"),
            ],
        );
        assert_eq!(buffer.get_text(), "hi 😄!");
        undo(&mut buffer, &result);
        assert_eq!(buffer.get_text(), original);
    }

    #[test]
    fn overlapping_ranges_are_rejected() {
        let mut buffer = buffer("0123456789");
        let err = buffer
            .apply_edits(
                vec![
                    SingleEditOperation::delete(Range::new(1, 1, 1, 5)),
                    SingleEditOperation::delete(Range::new(1, 3, 1, 8)),
                ],
                false,
                true,
            )
            .unwrap_err();
        assert!(matches!(err, BufferError::OverlappingRanges { .. }));
        assert_eq!(buffer.get_text(), "0123456789");
    }

    #[test]
    fn touching_ranges_keep_position_order() {
        let mut buffer = buffer("abcdef");
        let result = apply(
            &mut buffer,
            vec![
                SingleEditOperation::new(Range::new(1, 4, 1, 7), "X"),
                SingleEditOperation::new(Range::new(1, 1, 1, 4), "Y"),
            ],
        );
        assert_eq!(buffer.get_text(), "YX");
        let reverse = result.reverse_edits.clone().unwrap();
        assert_eq!(reverse[0].text, "abc");
        assert_eq!(reverse[1].text, "def");
        undo(&mut buffer, &result);
        assert_eq!(buffer.get_text(), "abcdef");
    }

    fn mixed_eol_buffer(text: &str) -> PieceTreeTextBuffer {
        let mut builder = PieceTreeTextBufferBuilder::new();
        builder.accept_chunk(text);
        builder.finish(&crate::BuildOptions {
            normalize_eol: false,
            ..Default::default()
        })
    }

    #[test]
    fn reverse_edits_keep_mixed_line_breaks() {
        let original = "a\r\nb\r\nc\nd";
        let mut buffer = mixed_eol_buffer(original);
        assert_eq!(buffer.eol(), LineEnding::CRLF);

        let result = apply(&mut buffer, vec![SingleEditOperation::delete(Range::new(3, 1, 4, 2))]);
        assert_eq!(buffer.get_text(), "a\r\nb\r\n");
        assert_eq!(result.reverse_edits.as_ref().unwrap()[0].text, "c\nd");

        undo(&mut buffer, &result);
        assert_eq!(buffer.get_text(), original);
        assert_eq!(buffer.get_line_count(), 4);
        buffer.piece_tree().assert_invariants();
    }

    #[test]
    fn kept_line_breaks_are_inserted_as_given() {
        let mut buffer = buffer("x\r\ny");
        buffer
            .apply_edits(vec![SingleEditOperation::insert(2, 2, "\nz\r\n")], false, false)
            .unwrap();
        assert_eq!(buffer.get_text(), "x\r\ny\r\nz\r\n");

        buffer
            .apply_edits(
                vec![SingleEditOperation::insert(1, 1, "w\n").keeping_eol()],
                false,
                false,
            )
            .unwrap();
        assert_eq!(buffer.get_text(), "w\nx\r\ny\r\nz\r\n");
        assert_eq!(buffer.get_line_content(2), "x");
        assert_eq!(buffer.get_line_count(), 5);
        buffer.piece_tree().assert_invariants();
    }

    #[test]
    fn invalid_positions_are_rejected() {
        let mut buffer = buffer("héllo\nworld");
        let bad = [
            Range::new(3, 1, 3, 1),
            Range::new(1, 8, 1, 8),
            Range::new(1, 3, 1, 3),
            Range::new(2, 3, 1, 1),
            Range::new(0, 1, 1, 1),
        ];
        for range in bad {
            assert!(
                buffer
                    .apply_edits(vec![SingleEditOperation::new(range, "x")], false, false)
                    .is_err(),
                "{range:?}"
            );
        }
        assert!(matches!(
            buffer.get_position_at(13),
            Err(BufferError::Bounds(PieceTreeError::OffsetOutOfBounds { offset: 13, len: 12 }))
        ));
        assert!(matches!(
            buffer.get_position_at(2),
            Err(BufferError::Bounds(PieceTreeError::NotCharBoundary { offset: 2 }))
        ));
        assert!(matches!(
            buffer.get_offset_at(1, 3),
            Err(BufferError::Bounds(PieceTreeError::NotCharBoundary { offset: 2 }))
        ));
        assert!(matches!(
            buffer.validate_range(Range::new(2, 3, 1, 1)),
            Err(BufferError::InvalidRange(_))
        ));
        assert_eq!(buffer.get_text(), "héllo\nworld");
    }

    #[test]
    fn inserted_text_follows_buffer_eol() {
        let mut buffer = buffer("a\r\nb");
        assert_eq!(buffer.eol(), LineEnding::CRLF);
        apply(&mut buffer, vec![SingleEditOperation::insert(2, 2, "\nc\rd")]);
        assert_eq!(buffer.get_text(), "a\r\nb\r\nc\r\nd");
        assert_eq!(buffer.get_line_count(), 4);
    }

    #[test]
    fn flags_track_inserted_text() {
        let mut buffer = buffer("plain");
        assert!(!buffer.might_contain_non_basic_ascii());
        assert!(!buffer.might_contain_rtl());

        apply(&mut buffer, vec![SingleEditOperation::insert(1, 6, " שלום")]);
        assert!(buffer.might_contain_non_basic_ascii());
        assert!(buffer.might_contain_rtl());

        apply(&mut buffer, vec![SingleEditOperation::insert(1, 1, "\u{2028}")]);
        assert!(buffer.might_contain_unusual_line_terminators());
        buffer.reset_might_contain_unusual_line_terminators();
        assert!(!buffer.might_contain_unusual_line_terminators());
    }

    #[test]
    fn auto_whitespace_lines_are_reported() {
        let mut buffer = buffer("fn main() {\n}");
        let result = buffer
            .apply_edits(
                vec![SingleEditOperation::insert(1, 12, "\n    ").auto_whitespace()],
                true,
                false,
            )
            .unwrap();
        assert_eq!(buffer.get_text(), "fn main() {\n    \n}");
        assert_eq!(result.trimmed_whitespace_lines, Some(vec![2]));

        // a regular edit reports nothing
        let result = buffer
            .apply_edits(vec![SingleEditOperation::insert(2, 5, "x")], true, false)
            .unwrap();
        assert_eq!(result.trimmed_whitespace_lines, None);
    }

    #[test]
    fn large_batches_are_reduced() {
        init_tracing();
        let text = "x".repeat(REDUCE_OPERATIONS_THRESHOLD);
        let mut buffer = buffer(&text);
        let ops = (0..REDUCE_OPERATIONS_THRESHOLD)
            .map(|i| SingleEditOperation::new(Range::new(1, i + 1, 1, i + 2), "yz"))
            .collect();
        let result = apply(&mut buffer, ops);

        assert_eq!(result.changes.len(), 1);
        assert_eq!(buffer.get_text(), "yz".repeat(REDUCE_OPERATIONS_THRESHOLD));
        undo(&mut buffer, &result);
        assert_eq!(buffer.get_text(), text);
    }

    // ---------- reads ----------

    #[test]
    fn value_helpers() {
        let buffer = buffer("  héllo  \nworld\n\t\n");
        assert_eq!(buffer.get_line_first_non_whitespace_column(1), 3);
        assert_eq!(buffer.get_line_last_non_whitespace_column(1), 9);
        assert_eq!(buffer.get_line_first_non_whitespace_column(3), 0);
        assert_eq!(buffer.get_line_last_non_whitespace_column(3), 0);
        assert_eq!(buffer.get_line_min_column(2), 1);
        assert_eq!(buffer.get_line_max_column(1), 11);
        assert_eq!(buffer.get_line_content_with_eol(2), "world\n");

        let range = Range::new(1, 3, 2, 3);
        assert_eq!(buffer.get_value_in_range(range, EndOfLine::TextDefined).unwrap(), "héllo  \nwo");
        assert_eq!(buffer.get_value_in_range(range, EndOfLine::CRLF).unwrap(), "héllo  \r\nwo");
        assert_eq!(buffer.get_value_length_in_range(range, EndOfLine::TextDefined).unwrap(), 11);
        assert_eq!(buffer.get_value_length_in_range(range, EndOfLine::CRLF).unwrap(), 12);
        assert_eq!(buffer.get_character_count_in_range(range, EndOfLine::TextDefined).unwrap(), 10);
        assert_eq!(buffer.get_character_count_in_range(range, EndOfLine::CRLF).unwrap(), 11);

        assert_eq!(buffer.get_range_at(2, 10).unwrap(), Range::new(1, 3, 2, 2));
    }

    #[test]
    fn find_respects_range_and_limit() {
        let buffer = buffer("hello world hello\nworld hello world\nhellohello");
        let query = SearchQuery::regex("hello").unwrap();
        let all = buffer.find(&query, Range::new(1, 1, 3, 11), 1000, || false).unwrap();
        assert_eq!(all.len(), 5);
        assert_eq!(all[0], Range::new(1, 1, 1, 6));

        let limited = buffer.find(&query, Range::new(1, 1, 3, 11), 2, || false).unwrap();
        assert_eq!(limited, all[..2].to_vec());

        let literal = SearchQuery::literal("world");
        let second_line = buffer.find(&literal, Range::new(2, 1, 2, 18), 10, || false).unwrap();
        assert_eq!(second_line, vec![Range::new(2, 1, 2, 6), Range::new(2, 13, 2, 18)]);
    }

    #[test]
    fn snapshot_and_equality() {
        let mut a = PieceTreeTextBufferBuilder::new();
        a.accept_chunk("\u{FEFF}abc");
        let a = a.finish(&Default::default());
        let b = buffer("abc");

        assert_eq!(a.bom(), "\u{FEFF}");
        assert!(!a.equal(&b));
        assert_eq!(a.create_snapshot(true).read_to_string(), "\u{FEFF}abc");
        assert_eq!(a.create_snapshot(false).read_to_string(), "abc");
        assert!(b.equal(&buffer("abc")));
    }

    #[test]
    fn set_eol_keeps_line_content() {
        let mut buffer = buffer("a\nb\nc");
        let before = buffer.get_lines_content();
        buffer.set_eol(LineEnding::CRLF);
        assert_eq!(buffer.get_text(), "a\r\nb\r\nc");
        assert_eq!(buffer.get_lines_content(), before);
    }

    // ---------- properties ----------

    fn random_ops(base: &PieceTreeTextBuffer, cuts: Vec<(usize, usize, String)>) -> Vec<SingleEditOperation> {
        let len = base.len();
        let mut offset = 0;
        let mut ops = Vec::new();
        for (gap, deleted, text) in cuts {
            let start = (offset + gap).min(len);
            let end = (start + deleted).min(len);
            let range = Range::from_positions(
                base.get_position_at(start).unwrap(),
                base.get_position_at(end).unwrap(),
            );
            ops.push(SingleEditOperation::new(range, text));
            offset = end;
        }
        ops
    }

    fn validated(base: &PieceTreeTextBuffer, ops: &[SingleEditOperation]) -> Vec<ValidatedEditOperation> {
        ops.iter()
            .enumerate()
            .map(|(sort_index, op)| {
                let (start, end) = base.validate_range(op.range).unwrap();
                let counter = count_eol(&op.text);
                ValidatedEditOperation {
                    sort_index,
                    identifier: None,
                    range: op.range,
                    range_offset: start,
                    range_length: end - start,
                    text: op.text.clone(),
                    eol_count: counter.eol_count,
                    first_line_length: counter.first_line_length,
                    last_line_length: counter.last_line_length,
                    force_move_markers: false,
                    is_auto_whitespace_edit: false,
                }
            })
            .collect()
    }

    proptest! {
        #[test]
        fn prop_single_operation_matches_batch(
            doc in "[ab\n]{0,40}",
            cuts in prop::collection::vec((0usize..8, 0usize..4, "[xy\n]{0,3}"), 1..6),
        ) {
            let base = buffer(&doc);
            let ops = random_ops(&base, cuts);

            let mut model = doc.clone();
            for op in validated(&base, &ops).iter().rev() {
                model.replace_range(op.range_offset..op.range_offset + op.range_length, &op.text);
            }

            let mut batch = base.clone();
            batch.apply_edits(ops.clone(), false, false).unwrap();
            prop_assert_eq!(batch.get_text(), model.clone());

            let single = base.to_single_edit_operation(&validated(&base, &ops)).unwrap();
            let mut collapsed = base.clone();
            collapsed
                .apply_edits(vec![SingleEditOperation::new(single.range, single.text)], false, false)
                .unwrap();
            prop_assert_eq!(collapsed.get_text(), model);
        }

        #[test]
        fn prop_reverse_edits_restore_the_document(
            doc in "[ab\n]{0,40}",
            cuts in prop::collection::vec((0usize..8, 0usize..4, "[xy\n]{0,3}"), 1..6),
        ) {
            let mut buffer = buffer(&doc);
            let ops = random_ops(&buffer, cuts);
            let result = buffer.apply_edits(ops, false, true).unwrap();
            undo(&mut buffer, &result);
            prop_assert_eq!(buffer.get_text(), doc);
            buffer.piece_tree().assert_invariants();
        }
    }
}
