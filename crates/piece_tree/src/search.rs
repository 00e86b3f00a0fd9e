use regex::Regex;

use crate::line_starts::{LineEnding, count_eol, normalize_eol};
use crate::piece::{BufferCursor, StringBuffer};
use crate::position::{Position, Range};
use crate::rb_tree::{NodeId, SENTINEL};
use crate::PieceTree;

/// What to look for and how.
#[derive(Debug, Clone)]
pub enum SearchQuery {
    /// A regular expression. `multiline` patterns run over the range joined
    /// with `\n`; the others run one line at a time.
    Regex { regex: Regex, multiline: bool },
    /// Plain text, may contain line breaks.
    Literal(String),
}

impl SearchQuery {
    /// Compiles `pattern`, switching to multiline mode when the pattern can
    /// match a line break.
    pub fn regex(pattern: &str) -> Result<Self, regex::Error> {
        Ok(SearchQuery::Regex {
            regex: Regex::new(pattern)?,
            multiline: is_multiline_regex_source(pattern),
        })
    }

    pub fn literal(text: impl Into<String>) -> Self {
        SearchQuery::Literal(text.into())
    }
}

/// True if the pattern contains a line feed or one of `\n`, `\r`, `\W`.
fn is_multiline_regex_source(pattern: &str) -> bool {
    let bytes = pattern.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\n' => return true,
            b'\\' => {
                i += 1;
                if matches!(bytes.get(i), Some(b'n' | b'r' | b'W')) {
                    return true;
                }
            }
            _ => {}
        }
        i += 1;
    }
    false
}

/// Maps offsets in `\n`-joined text back to the original text by counting
/// the `\r\n` pairs that were collapsed before an offset.
#[derive(Debug, Clone, Default)]
pub struct LineFeedCounter {
    /// Offsets, in the joined text, of every `\n` that replaced a `\r\n`.
    collapsed: Vec<usize>,
}

impl LineFeedCounter {
    pub fn new(raw: &str) -> Self {
        let bytes = raw.as_bytes();
        let mut collapsed = Vec::new();
        let mut removed = 0;
        let mut i = 0;
        while i < bytes.len() {
            if bytes[i] == b'\r' && bytes.get(i + 1) == Some(&b'\n') {
                collapsed.push(i - removed);
                removed += 1;
                i += 2;
                continue;
            }
            i += 1;
        }
        Self { collapsed }
    }

    /// Collapsed pairs strictly before `offset` in the joined text.
    pub fn find_line_feed_count_before_offset(&self, offset: usize) -> usize {
        self.collapsed.partition_point(|&o| o < offset)
    }
}

fn next_search_start(haystack: &str, end: usize) -> usize {
    end + haystack[end..].chars().next().map_or(1, char::len_utf8)
}

/// End of the line content holding `offset` (before its line break, never
/// past `end`) and the start of the following line.
fn line_bounds(buffer: &StringBuffer, offset: usize, end: usize) -> (usize, usize) {
    let index = buffer.line_starts.partition_point(|&start| start <= offset);
    let next_line = buffer.line_starts.get(index).copied().unwrap_or(buffer.buffer.len());
    let bytes = buffer.buffer.as_bytes();
    let mut line_end = next_line.min(end);
    while line_end > offset && matches!(bytes[line_end - 1], b'\n' | b'\r') {
        line_end -= 1;
    }
    (line_end, next_line)
}

impl PieceTree {
    /// Matches of `query` inside `range` in document order, at most `limit`.
    pub fn find_matches(
        &self,
        query: &SearchQuery,
        range: Range,
        limit: usize,
        is_cancelled: impl Fn() -> bool,
    ) -> Vec<Range> {
        if limit == 0 {
            return Vec::new();
        }
        match query {
            SearchQuery::Regex {
                regex,
                multiline: true,
            } => self.find_matches_by_multiline(regex, range, limit, &is_cancelled),
            SearchQuery::Regex { regex, .. } => {
                self.find_matches_line_by_line(regex, range, limit, &is_cancelled)
            }
            SearchQuery::Literal(text) => {
                self.find_matches_by_word(text, range, limit, &is_cancelled)
            }
        }
    }

    /// Runs `regex` over the range joined with `\n`, so `\n` in the pattern
    /// matches every kind of line break.
    pub fn find_matches_by_multiline(
        &self,
        regex: &Regex,
        range: Range,
        limit: usize,
        is_cancelled: &dyn Fn() -> bool,
    ) -> Vec<Range> {
        let delta_offset = self.get_offset_at(range.start_line, range.start_column);
        let raw = self.get_value_in_range(range, None);

        let (text, lf_counter) = if self.eol_normalized && self.eol == LineEnding::LF {
            (raw, None)
        } else {
            let counter = LineFeedCounter::new(&raw);
            (normalize_eol(&raw, LineEnding::LF), Some(counter))
        };

        let mut result = Vec::new();
        for m in regex.find_iter(&text) {
            if result.len() >= limit || is_cancelled() {
                break;
            }
            result.push(self.multiline_match_range(
                delta_offset,
                lf_counter.as_ref(),
                m.start(),
                m.len(),
            ));
        }
        result
    }

    fn multiline_match_range(
        &self,
        delta_offset: usize,
        lf_counter: Option<&LineFeedCounter>,
        match_index: usize,
        match_len: usize,
    ) -> Range {
        let (start_offset, end_offset) = match lf_counter {
            Some(counter) => {
                // add back one \r per collapsed \r\n
                let before_match = counter.find_line_feed_count_before_offset(match_index);
                let start = delta_offset + match_index + before_match;
                let before_end =
                    counter.find_line_feed_count_before_offset(match_index + match_len);
                (start, start + match_len + before_end - before_match)
            }
            None => {
                let start = delta_offset + match_index;
                (start, start + match_len)
            }
        };

        Range::from_positions(
            self.get_position_at(start_offset),
            self.get_position_at(end_offset),
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn find_matches_in_node(
        &self,
        node: NodeId,
        regex: &Regex,
        start_line_number: usize,
        start_column: usize,
        start_cursor: BufferCursor,
        end_cursor: BufferCursor,
        limit: usize,
        result: &mut Vec<Range>,
        is_cancelled: &dyn Fn() -> bool,
    ) {
        let piece = self.tree.piece(node);
        let buffer = &self.buffers[piece.buffer_idx];
        let start_offset_in_buffer = buffer.offset_of(piece.start);
        let start = buffer.offset_of(start_cursor);
        let end = buffer.offset_of(end_cursor);

        let mut search_from = start;
        while search_from <= end && !is_cancelled() {
            // a match never runs past the line break ending its line
            let (line_end, next_line) = line_bounds(buffer, search_from, end);
            let haystack = &buffer.buffer[..line_end];
            let Some(m) = regex.find_at(haystack, search_from) else {
                if next_line >= end {
                    return;
                }
                search_from = next_line;
                continue;
            };

            let ret = self.position_in_buffer(node, m.start() - start_offset_in_buffer);
            let line_feed_cnt = self.line_feed_cnt(piece.buffer_idx, start_cursor, ret);
            let ret_start_column = if ret.line == start_cursor.line {
                ret.column - start_cursor.column + start_column
            } else {
                ret.column + 1
            };
            let line = start_line_number + line_feed_cnt;
            result.push(Range::new(line, ret_start_column, line, ret_start_column + m.len()));

            if m.end() >= end || result.len() >= limit {
                return;
            }
            search_from = if m.is_empty() {
                next_search_start(haystack, m.end())
            } else {
                m.end()
            };
            if search_from > line_end {
                if next_line >= end {
                    return;
                }
                search_from = next_line;
            }
        }
    }

    fn find_matches_in_line(
        text: &str,
        regex: &Regex,
        line_number: usize,
        delta_offset: usize,
        limit: usize,
        result: &mut Vec<Range>,
    ) {
        for m in regex.find_iter(text) {
            if result.len() >= limit {
                return;
            }
            result.push(Range::new(
                line_number,
                m.start() + 1 + delta_offset,
                line_number,
                m.end() + 1 + delta_offset,
            ));
        }
    }

    /// Runs `regex` piece by piece without joining the range into one string.
    /// Matches never include a line break.
    pub fn find_matches_line_by_line(
        &self,
        regex: &Regex,
        range: Range,
        limit: usize,
        is_cancelled: &dyn Fn() -> bool,
    ) -> Vec<Range> {
        let mut result = Vec::new();

        let (Some(mut start_position), Some(end_position)) = (
            self.node_at2(range.start_line, range.start_column),
            self.node_at2(range.end_line, range.end_column),
        ) else {
            return result;
        };
        let mut start = self.position_in_buffer(start_position.node, start_position.remainder);
        let end = self.position_in_buffer(end_position.node, end_position.remainder);

        if start_position.node == end_position.node {
            self.find_matches_in_node(
                start_position.node,
                regex,
                range.start_line,
                range.start_column,
                start,
                end,
                limit,
                &mut result,
                is_cancelled,
            );
            return result;
        }

        let mut start_line_number = range.start_line;
        let mut current_node = start_position.node;

        while current_node != end_position.node && current_node != SENTINEL {
            if is_cancelled() {
                return result;
            }
            let piece = *self.tree.piece(current_node);
            let line_break_cnt = self.line_feed_cnt(piece.buffer_idx, start, piece.end);

            if line_break_cnt >= 1 {
                // search the lines ending inside this piece
                let buffer = &self.buffers[piece.buffer_idx];
                let start_offset_in_buffer = buffer.offset_of(piece.start);
                let next_line_start_offset = buffer.line_starts[start.line + line_break_cnt];
                let start_column = if start_line_number == range.start_line {
                    range.start_column
                } else {
                    1
                };
                let next_line_start = self
                    .position_in_buffer(current_node, next_line_start_offset - start_offset_in_buffer);
                self.find_matches_in_node(
                    current_node,
                    regex,
                    start_line_number,
                    start_column,
                    start,
                    next_line_start,
                    limit,
                    &mut result,
                    is_cancelled,
                );

                if result.len() >= limit {
                    return result;
                }

                start_line_number += line_break_cnt;
            }

            let start_column = if start_line_number == range.start_line {
                range.start_column - 1
            } else {
                0
            };
            // search the remaining content of the line
            let line = self.get_line_content(start_line_number);
            if start_line_number == range.end_line {
                let search_text = line.get(start_column..range.end_column - 1).unwrap_or_default();
                Self::find_matches_in_line(
                    search_text,
                    regex,
                    range.end_line,
                    start_column,
                    limit,
                    &mut result,
                );
                return result;
            }

            let search_text = line.get(start_column..).unwrap_or_default();
            Self::find_matches_in_line(
                search_text,
                regex,
                start_line_number,
                start_column,
                limit,
                &mut result,
            );

            if result.len() >= limit {
                return result;
            }

            start_line_number += 1;
            let Some(next_position) = self.node_at2(start_line_number, 1) else {
                return result;
            };
            start_position = next_position;
            current_node = start_position.node;
            start = self.position_in_buffer(start_position.node, start_position.remainder);
        }

        if start_line_number == range.end_line {
            let start_column = if start_line_number == range.start_line {
                range.start_column - 1
            } else {
                0
            };
            let line = self.get_line_content(start_line_number);
            let search_text = line.get(start_column..range.end_column - 1).unwrap_or_default();
            Self::find_matches_in_line(
                search_text,
                regex,
                range.end_line,
                start_column,
                limit,
                &mut result,
            );
            return result;
        }

        let start_column = if start_line_number == range.start_line {
            range.start_column
        } else {
            1
        };
        self.find_matches_in_node(
            end_position.node,
            regex,
            start_line_number,
            start_column,
            start,
            end,
            limit,
            &mut result,
            is_cancelled,
        );
        result
    }

    /// Finds a literal, which may span several lines. Line breaks in both the
    /// document and `search` compare as `\n`. Matches do not overlap.
    pub fn find_matches_by_word(
        &self,
        search: &str,
        range: Range,
        limit: usize,
        is_cancelled: &dyn Fn() -> bool,
    ) -> Vec<Range> {
        let mut result = Vec::new();
        if search.is_empty() {
            return result;
        }

        let search = normalize_eol(search, LineEnding::LF);
        let counter = count_eol(&search);
        let lines = counter.eol_count;
        let last_line_length = counter.last_line_length;

        let mut line_number = range.start_line;
        let mut last_match_end: Option<Position> = None;
        while line_number + lines <= range.end_line {
            if is_cancelled() || result.len() >= limit {
                break;
            }

            let window = Range::new(
                line_number,
                1,
                line_number + lines,
                self.get_line_length(line_number + lines) + 1,
            );
            let text = self.get_value_in_range(window, Some(LineEnding::LF));

            // a multi-line match spans the whole window, so its last line
            // may still start the next one
            let mut found_any = false;
            let mut found = text.find(search.as_str());
            while let Some(index) = found {
                if result.len() >= limit || is_cancelled() {
                    break;
                }
                found_any = true;
                let match_start = Position::new(line_number, index + 1);
                let end_column = if lines > 0 {
                    last_line_length + 1
                } else {
                    index + last_line_length + 1
                };
                let match_range =
                    Range::from_positions(match_start, Position::new(line_number + lines, end_column));
                let clear_of_last = last_match_end.is_none_or(|end| end.is_before_or_equal(&match_start));
                if clear_of_last && range.contains_range(&match_range) {
                    last_match_end = Some(match_range.end());
                    result.push(match_range);
                }

                let from = index + search.len().max(1);
                found = text
                    .get(from..)
                    .and_then(|rest| rest.find(search.as_str()))
                    .map(|i| i + from);
            }

            line_number += if found_any && lines > 0 { lines } else { 1 };
        }
        result
    }
}
