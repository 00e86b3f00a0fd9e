use std::collections::VecDeque;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use piece_tree::{Position, Range};
use serde::{Deserialize, Serialize};
use text_buffer::TextChange;

use crate::error::HistoryResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FontStyle {
    #[default]
    Normal,
    Bold,
    Italic,
    BoldItalic,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FontDescriptor {
    #[serde(default)]
    pub family: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub style: FontStyle,
}

/// View data kept alongside a document. The session stores it but never
/// interprets it.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ViewState {
    pub layout_width: u32,
    pub layout_height: u32,
    pub text_size: f32,
    #[serde(default)]
    pub font: FontDescriptor,
    /// Line-break cache of the layout.
    #[serde(default)]
    pub break_results: Vec<usize>,
    /// Ranges of the last search.
    #[serde(default)]
    pub match_results: Vec<Range>,
}

/// Everything needed to reopen a document where it was left.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedState {
    pub uri: String,
    pub hash: String,
    pub modified: bool,
    pub position: Position,
    pub selection: Range,
    #[serde(flatten)]
    pub view: ViewState,
    pub undo_stack: VecDeque<Vec<TextChange>>,
    pub redo_stack: VecDeque<Vec<TextChange>>,
}

impl SavedState {
    pub fn to_json(&self) -> HistoryResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> HistoryResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> HistoryResult<()> {
        let mut writer = BufWriter::new(File::create(path.as_ref())?);
        serde_json::to_writer_pretty(&mut writer, self)?;
        writer.flush()?;
        Ok(())
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> HistoryResult<Self> {
        let reader = BufReader::new(File::open(path.as_ref())?);
        Ok(serde_json::from_reader(reader)?)
    }
}
