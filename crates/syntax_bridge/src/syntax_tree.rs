use text_buffer::{ContentChange, PieceTreeTextBuffer};
use tracing::{debug, trace, warn};
use tree_sitter::{Language, Parser, Tree};

use crate::config::ParseConfig;
use crate::edit::input_edit;
use crate::error::{SyntaxError, SyntaxResult};

/// A parser plus the last tree it produced for one document.
///
/// Content changes are forwarded with [`SyntaxTree::edit`] as they are
/// applied, and the next [`SyntaxTree::parse`] reuses the edited tree. If a
/// change cannot be forwarded the tree is out of step with the buffer, so
/// the next parse starts from scratch.
pub struct SyntaxTree {
    parser: Option<Parser>,
    tree: Option<Tree>,
    config: ParseConfig,
    needs_full_reparse: bool,
}

impl std::fmt::Debug for SyntaxTree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyntaxTree")
            .field("initialized", &self.parser.is_some())
            .field("has_tree", &self.tree.is_some())
            .field("config", &self.config)
            .field("needs_full_reparse", &self.needs_full_reparse)
            .finish()
    }
}

impl SyntaxTree {
    pub fn new(language: &Language, config: ParseConfig) -> SyntaxResult<Self> {
        let mut tree = Self::uninitialized(config);
        tree.set_language(language)?;
        Ok(tree)
    }

    /// A tree with no language yet. Edits are skipped until one is set.
    pub fn uninitialized(config: ParseConfig) -> Self {
        Self {
            parser: None,
            tree: None,
            config,
            needs_full_reparse: false,
        }
    }

    /// Loads `language`, dropping any tree built with the previous one.
    pub fn set_language(&mut self, language: &Language) -> SyntaxResult<()> {
        let mut parser = Parser::new();
        parser.set_language(language)?;
        self.parser = Some(parser);
        self.tree = None;
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.parser.is_some()
    }

    pub fn tree(&self) -> Option<&Tree> {
        self.tree.as_ref()
    }

    pub fn config(&self) -> &ParseConfig {
        &self.config
    }

    pub fn needs_full_reparse(&self) -> bool {
        self.needs_full_reparse
    }

    /// Parses `buffer`, incrementally when a tree in step with it exists.
    ///
    /// Small documents are handed over as one string; larger ones are read
    /// through the piece tree chunk by chunk.
    pub fn parse(&mut self, buffer: &PieceTreeTextBuffer) -> SyntaxResult<&Tree> {
        let Some(parser) = self.parser.as_mut() else {
            return Err(SyntaxError::NotInitialized);
        };
        let old_tree = if self.needs_full_reparse {
            None
        } else {
            self.tree.as_ref()
        };

        let len = buffer.len();
        let parsed = if len <= self.config.full_parse_limit {
            debug!(len, incremental = old_tree.is_some(), "parsing document");
            parser.parse(buffer.get_text(), old_tree)
        } else {
            let chunk_size = self.config.chunk_size.max(1);
            debug!(len, chunk_size, incremental = old_tree.is_some(), "parsing document in chunks");
            parser.parse_with(
                &mut |offset, _| read_chunk(buffer, offset, chunk_size),
                old_tree,
            )
        };

        let tree = parsed.ok_or(SyntaxError::ParseFailed)?;
        self.needs_full_reparse = false;
        Ok(&*self.tree.insert(tree))
    }

    /// Forwards one applied change to the current tree.
    pub fn edit(&mut self, change: &ContentChange) {
        match self.tree.as_mut() {
            Some(tree) if self.parser.is_some() => {
                let edit = input_edit(change);
                trace!(
                    start = edit.start_byte,
                    old_end = edit.old_end_byte,
                    new_end = edit.new_end_byte,
                    "syntax tree edit"
                );
                tree.edit(&edit);
            }
            _ => {
                warn!(
                    offset = change.range_offset,
                    "no syntax tree to edit, next parse starts over"
                );
                self.needs_full_reparse = true;
            }
        }
    }

    /// Forwards the changes of one batch, in the order they were applied.
    pub fn on_changes(&mut self, changes: &[ContentChange]) {
        for change in changes {
            self.edit(change);
        }
    }
}

/// At most `chunk_size` bytes of the piece holding `offset`, cut at a
/// character boundary. Empty past the end of the document.
fn read_chunk(buffer: &PieceTreeTextBuffer, offset: usize, chunk_size: usize) -> &[u8] {
    if offset >= buffer.len() {
        return &[];
    }
    let chunk = buffer.get_nearest_chunk(offset);
    if chunk.len() <= chunk_size {
        return chunk.as_bytes();
    }

    let mut end = chunk_size;
    while end > 0 && !chunk.is_char_boundary(end) {
        end -= 1;
    }
    if end == 0 {
        // chunk_size is smaller than the first character
        end = chunk
            .char_indices()
            .nth(1)
            .map_or(chunk.len(), |(index, _)| index);
    }
    &chunk.as_bytes()[..end]
}
