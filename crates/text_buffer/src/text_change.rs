use std::fmt;

use serde::{Deserialize, Serialize};

/// The atomic undo/redo unit: `old_text` at `old_position` became `new_text`
/// at `new_position`. Offsets are absolute byte offsets valid when the change
/// was captured.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TextChange {
    pub old_position: usize,
    pub old_text: String,
    pub new_position: usize,
    pub new_text: String,
}

impl TextChange {
    pub fn new(
        old_position: usize,
        old_text: impl Into<String>,
        new_position: usize,
        new_text: impl Into<String>,
    ) -> Self {
        Self {
            old_position,
            old_text: old_text.into(),
            new_position,
            new_text: new_text.into(),
        }
    }

    pub fn old_length(&self) -> usize {
        self.old_text.len()
    }

    pub fn old_end(&self) -> usize {
        self.old_position + self.old_text.len()
    }

    pub fn new_length(&self) -> usize {
        self.new_text.len()
    }

    pub fn new_end(&self) -> usize {
        self.new_position + self.new_text.len()
    }

    /// Folds `curr`, which applies on top of `prev`, into one list with the
    /// same net effect.
    pub fn compress_consecutive(prev: &[TextChange], curr: &[TextChange]) -> Vec<TextChange> {
        if prev.is_empty() {
            return curr.to_vec();
        }
        TextChangeCompressor::new(prev, curr).compress()
    }
}

fn escape_new_line(text: &str) -> String {
    text.replace('\n', "\\n").replace('\r', "\\r")
}

impl fmt::Display for TextChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.old_text.is_empty() {
            return write!(
                f,
                "(insert@{} \"{}\")",
                self.old_position,
                escape_new_line(&self.new_text)
            );
        }
        if self.new_text.is_empty() {
            return write!(
                f,
                "(delete@{} \"{}\")",
                self.old_position,
                escape_new_line(&self.old_text)
            );
        }
        write!(
            f,
            "(replace@{} \"{}\" with \"{}\")",
            self.old_position,
            escape_new_line(&self.old_text),
            escape_new_line(&self.new_text)
        )
    }
}

/// Walks two consecutive change lists in position order, splitting spans
/// where they partially overlap and pairing the pieces that line up.
struct TextChangeCompressor<'a> {
    prev_edits: &'a [TextChange],
    curr_edits: &'a [TextChange],
    result: Vec<TextChange>,
    prev_delta_offset: isize,
    curr_delta_offset: isize,
}

fn delta(change: &TextChange) -> isize {
    change.new_length() as isize - change.old_length() as isize
}

fn shift(offset: usize, by: isize) -> usize {
    offset.saturating_add_signed(by)
}

impl<'a> TextChangeCompressor<'a> {
    fn new(prev_edits: &'a [TextChange], curr_edits: &'a [TextChange]) -> Self {
        Self {
            prev_edits,
            curr_edits,
            result: Vec::with_capacity(prev_edits.len() + curr_edits.len()),
            prev_delta_offset: 0,
            curr_delta_offset: 0,
        }
    }

    fn compress(mut self) -> Vec<TextChange> {
        let mut prev_index = 0;
        let mut curr_index = 0;

        let mut prev_edit = self.prev_edits.first().cloned();
        let mut curr_edit = self.curr_edits.first().cloned();

        loop {
            let (prev, curr) = match (prev_edit.take(), curr_edit.take()) {
                (None, None) => break,
                (None, Some(curr)) => {
                    self.accept_curr(&curr);
                    curr_index += 1;
                    curr_edit = self.curr_edits.get(curr_index).cloned();
                    continue;
                }
                (Some(prev), None) => {
                    self.accept_prev(&prev);
                    prev_index += 1;
                    prev_edit = self.prev_edits.get(prev_index).cloned();
                    continue;
                }
                (Some(prev), Some(curr)) => (prev, curr),
            };

            if curr.old_end() <= prev.new_position {
                self.accept_curr(&curr);
                curr_index += 1;
                curr_edit = self.curr_edits.get(curr_index).cloned();
                prev_edit = Some(prev);
                continue;
            }

            if prev.new_end() <= curr.old_position {
                self.accept_prev(&prev);
                prev_index += 1;
                prev_edit = self.prev_edits.get(prev_index).cloned();
                curr_edit = Some(curr);
                continue;
            }

            if curr.old_position < prev.new_position {
                let (head, tail) = split_curr(&curr, prev.new_position - curr.old_position);
                self.accept_curr(&head);
                curr_edit = Some(tail);
                prev_edit = Some(prev);
                continue;
            }

            if prev.new_position < curr.old_position {
                let (head, tail) = split_prev(&prev, curr.old_position - prev.new_position);
                self.accept_prev(&head);
                prev_edit = Some(tail);
                curr_edit = Some(curr);
                continue;
            }

            // curr.old_position == prev.new_position
            let (merge_prev, merge_curr) = if curr.old_end() == prev.new_end() {
                prev_index += 1;
                curr_index += 1;
                prev_edit = self.prev_edits.get(prev_index).cloned();
                curr_edit = self.curr_edits.get(curr_index).cloned();
                (prev, curr)
            } else if curr.old_end() < prev.new_end() {
                let (head, tail) = split_prev(&prev, curr.old_length());
                prev_edit = Some(tail);
                curr_index += 1;
                curr_edit = self.curr_edits.get(curr_index).cloned();
                (head, curr)
            } else {
                let (head, tail) = split_curr(&curr, prev.new_length());
                prev_index += 1;
                prev_edit = self.prev_edits.get(prev_index).cloned();
                curr_edit = Some(tail);
                (prev, head)
            };

            self.prev_delta_offset += delta(&merge_prev);
            self.curr_delta_offset += delta(&merge_curr);
            self.result.push(TextChange::new(
                merge_prev.old_position,
                merge_prev.old_text,
                merge_curr.new_position,
                merge_curr.new_text,
            ));
        }

        remove_no_ops(merge(self.result))
    }

    fn accept_curr(&mut self, curr: &TextChange) {
        self.result.push(TextChange::new(
            shift(curr.old_position, -self.prev_delta_offset),
            curr.old_text.clone(),
            curr.new_position,
            curr.new_text.clone(),
        ));
        self.curr_delta_offset += delta(curr);
    }

    fn accept_prev(&mut self, prev: &TextChange) {
        self.result.push(TextChange::new(
            prev.old_position,
            prev.old_text.clone(),
            shift(prev.new_position, self.curr_delta_offset),
            prev.new_text.clone(),
        ));
        self.prev_delta_offset += delta(prev);
    }
}

fn split_prev(edit: &TextChange, offset: usize) -> (TextChange, TextChange) {
    let (pre, post) = edit.new_text.split_at(offset);
    (
        TextChange::new(edit.old_position, edit.old_text.clone(), edit.new_position, pre),
        TextChange::new(edit.old_end(), "", edit.new_position + offset, post),
    )
}

fn split_curr(edit: &TextChange, offset: usize) -> (TextChange, TextChange) {
    let (pre, post) = edit.old_text.split_at(offset);
    (
        TextChange::new(edit.old_position, pre, edit.new_position, edit.new_text.clone()),
        TextChange::new(edit.old_position + offset, post, edit.new_end(), ""),
    )
}

/// Joins changes whose old spans touch.
fn merge(edits: Vec<TextChange>) -> Vec<TextChange> {
    let mut result: Vec<TextChange> = Vec::with_capacity(edits.len());
    for curr in edits {
        match result.last_mut() {
            Some(prev) if prev.old_end() == curr.old_position => {
                prev.old_text.push_str(&curr.old_text);
                prev.new_text.push_str(&curr.new_text);
            }
            _ => result.push(curr),
        }
    }
    result
}

fn remove_no_ops(edits: Vec<TextChange>) -> Vec<TextChange> {
    edits
        .into_iter()
        .filter(|edit| edit.old_text != edit.new_text)
        .collect()
}
