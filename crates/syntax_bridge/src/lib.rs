//! Keeps a tree-sitter syntax tree in step with a [`text_buffer::PieceTreeTextBuffer`].

mod config;
mod edit;
mod error;
mod syntax_tree;

pub use crate::config::ParseConfig;
pub use crate::edit::input_edit;
pub use crate::error::{SyntaxError, SyntaxResult};
pub use crate::syntax_tree::SyntaxTree;
