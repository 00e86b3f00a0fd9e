use std::fmt;
use std::path::Path;

use anyhow::{Context, Result};
use edit_history::{EditSession, HistoryConfig, ViewState};
use piece_tree::{EndOfLine, LineEnding, Range, SearchQuery};
use serde::Serialize;
use text_buffer::{BuildOptions, PieceTreeTextBuffer, SingleEditOperation};
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Stats {
    pub lines: usize,
    pub bytes: usize,
    pub characters: usize,
    pub eol: &'static str,
    pub bom: bool,
    pub non_basic_ascii: bool,
    pub rtl: bool,
    pub unusual_line_terminators: bool,
    pub sha256: String,
}

impl fmt::Display for Stats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "lines:      {}", self.lines)?;
        writeln!(f, "bytes:      {}", self.bytes)?;
        writeln!(f, "characters: {}", self.characters)?;
        writeln!(f, "eol:        {}", self.eol)?;
        writeln!(f, "bom:        {}", self.bom)?;
        writeln!(f, "non-ascii:  {}", self.non_basic_ascii)?;
        writeln!(f, "rtl:        {}", self.rtl)?;
        writeln!(f, "unusual:    {}", self.unusual_line_terminators)?;
        write!(f, "sha256:     {}", self.sha256)
    }
}

fn eol_name(eol: LineEnding) -> &'static str {
    match eol {
        LineEnding::LF => "LF",
        LineEnding::CRLF => "CRLF",
        LineEnding::CR => "CR",
    }
}

pub fn load(path: &Path, options: &BuildOptions) -> Result<PieceTreeTextBuffer> {
    text_buffer::load_from_path(path, options)
        .with_context(|| format!("loading {}", path.display()))
}

pub fn query(pattern: &str, literal: bool) -> Result<SearchQuery> {
    if literal {
        return Ok(SearchQuery::literal(pattern));
    }
    SearchQuery::regex(pattern).with_context(|| format!("invalid pattern {pattern:?}"))
}

fn full_range(buffer: &PieceTreeTextBuffer) -> Range {
    let last_line = buffer.get_line_count();
    Range::new(1, 1, last_line, buffer.get_line_max_column(last_line))
}

pub fn stats(buffer: &PieceTreeTextBuffer) -> Result<Stats> {
    let characters = buffer.get_character_count_in_range(full_range(buffer), EndOfLine::TextDefined)?;
    let sha256 = text_buffer::save_to_writer(buffer, std::io::sink())?;
    Ok(Stats {
        lines: buffer.get_line_count(),
        bytes: buffer.len(),
        characters,
        eol: eol_name(buffer.eol()),
        bom: !buffer.bom().is_empty(),
        non_basic_ascii: buffer.might_contain_non_basic_ascii(),
        rtl: buffer.might_contain_rtl(),
        unusual_line_terminators: buffer.might_contain_unusual_line_terminators(),
        sha256,
    })
}

pub fn find_all(buffer: &PieceTreeTextBuffer, query: &SearchQuery, limit: usize) -> Result<Vec<Range>> {
    Ok(buffer.find(query, full_range(buffer), limit, || false)?)
}

pub struct ReplaceRequest<'a> {
    pub input: &'a Path,
    pub output: &'a Path,
    pub state: Option<&'a Path>,
    pub query: &'a SearchQuery,
    pub replacement: &'a str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplaceReport {
    pub replaced: usize,
    pub hash: String,
}

/// Replaces every match in one batch, saves the document and, when asked,
/// the resulting session state.
pub fn replace_all(
    request: &ReplaceRequest<'_>,
    options: &BuildOptions,
    history: &HistoryConfig,
) -> Result<ReplaceReport> {
    history.validate()?;
    let buffer = load(request.input, options)?;
    let matches = find_all(&buffer, request.query, usize::MAX)?;

    let mut session = EditSession::new(buffer, history);
    if !matches.is_empty() {
        let operations = matches
            .iter()
            .map(|range| SingleEditOperation::new(*range, request.replacement))
            .collect();
        session.apply_edits(operations)?;
    }

    let hash = text_buffer::save_to_path(session.buffer(), request.output)
        .with_context(|| format!("saving {}", request.output.display()))?;
    info!(replaced = matches.len(), output = %request.output.display(), "replace-all done");

    if let Some(state_path) = request.state {
        let view = ViewState {
            match_results: matches.clone(),
            ..Default::default()
        };
        let state = session.preserve_state(request.output.display().to_string(), hash.clone(), false, view);
        state
            .save_to_file(state_path)
            .with_context(|| format!("writing state to {}", state_path.display()))?;
    }

    Ok(ReplaceReport {
        replaced: matches.len(),
        hash,
    })
}
