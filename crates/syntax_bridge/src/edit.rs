use piece_tree::count_eol;
use text_buffer::ContentChange;
use tree_sitter::{InputEdit, Point};

/// Describes `change` to tree-sitter. Rows and columns are 0-based, columns
/// count bytes.
pub fn input_edit(change: &ContentChange) -> InputEdit {
    let range = change.range;
    let start_position = Point::new(range.start_line - 1, range.start_column - 1);
    let old_end_position = Point::new(range.end_line - 1, range.end_column - 1);

    let counter = count_eol(&change.text);
    let new_end_position = if counter.eol_count == 0 {
        Point::new(
            start_position.row,
            start_position.column + counter.last_line_length,
        )
    } else {
        Point::new(
            start_position.row + counter.eol_count,
            counter.last_line_length,
        )
    };

    InputEdit {
        start_byte: change.range_offset,
        old_end_byte: change.range_offset + change.range_length,
        new_end_byte: change.range_offset + change.text.len(),
        start_position,
        old_end_position,
        new_end_position,
    }
}
