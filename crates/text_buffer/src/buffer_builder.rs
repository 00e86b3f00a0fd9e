use piece_tree::{EndOfLine, LineEnding, StringBuffer, create_line_starts, normalize_eol, strings};
use tracing::debug;

use crate::buffer::PieceTreeTextBuffer;
use crate::config::BuildOptions;

/// Collects text chunks and turns them into a [`PieceTreeTextBuffer`].
///
/// Chunks may split a line anywhere, including between `\r` and `\n`: a
/// trailing `\r` is held back until the next chunk arrives. While chunks
/// come in, the builder counts line breaks to pick the document EOL and
/// records whether the text holds RTL, unusual terminators or non-ASCII.
#[derive(Debug)]
pub struct PieceTreeTextBufferBuilder {
    chunks: Vec<StringBuffer>,
    bom: String,
    started: bool,
    pending_cr: bool,

    cr: usize,
    lf: usize,
    crlf: usize,
    contains_rtl: bool,
    contains_unusual_line_terminators: bool,
    is_basic_ascii: bool,
}

impl Default for PieceTreeTextBufferBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PieceTreeTextBufferBuilder {
    pub fn new() -> Self {
        Self {
            chunks: Vec::new(),
            bom: String::new(),
            started: false,
            pending_cr: false,
            cr: 0,
            lf: 0,
            crlf: 0,
            contains_rtl: false,
            contains_unusual_line_terminators: false,
            is_basic_ascii: true,
        }
    }

    /// Accept a chunk of text (may include multiple lines).
    pub fn accept_chunk(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }

        let mut chunk = text;
        if !self.started {
            self.started = true;
            if strings::starts_with_utf8_bom(chunk) {
                self.bom = strings::UTF8_BOM.to_string();
                chunk = strings::strip_utf8_bom(chunk);
            }
        }

        let (body, trailing_cr) = match chunk.strip_suffix('\r') {
            Some(body) => (body, true),
            None => (chunk, false),
        };
        self.accept_body(body);
        self.pending_cr = trailing_cr;
    }

    fn accept_body(&mut self, body: &str) {
        if self.pending_cr {
            self.pending_cr = false;
            self.push_chunk(format!("\r{body}"));
        } else if !body.is_empty() {
            self.push_chunk(body.to_string());
        }
    }

    fn push_chunk(&mut self, chunk: String) {
        let line_starts = create_line_starts(&chunk);
        self.cr += line_starts.cr;
        self.lf += line_starts.lf;
        self.crlf += line_starts.crlf;

        if !line_starts.is_basic_ascii {
            self.is_basic_ascii = false;
            if !self.contains_rtl {
                self.contains_rtl = strings::contains_rtl(&chunk);
            }
            if !self.contains_unusual_line_terminators {
                self.contains_unusual_line_terminators =
                    strings::contains_unusual_line_terminators(&chunk);
            }
        }

        self.chunks
            .push(StringBuffer::with_line_starts(chunk, line_starts.line_starts));
    }

    /// EOL the document ends up with: the default when the text has no line
    /// break, CRLF when more than half of the breaks hold a `\r`, else LF.
    fn detect_eol(&self, default_eol: EndOfLine) -> LineEnding {
        let total_eol_count = self.cr + self.lf + self.crlf;
        let total_cr_count = self.cr + self.crlf;
        if total_eol_count == 0 {
            return match default_eol {
                EndOfLine::CRLF => LineEnding::CRLF,
                _ => LineEnding::LF,
            };
        }
        if total_cr_count > total_eol_count / 2 {
            LineEnding::CRLF
        } else {
            LineEnding::LF
        }
    }

    /// Finish building and return the buffer.
    pub fn finish(mut self, options: &BuildOptions) -> PieceTreeTextBuffer {
        if self.pending_cr {
            self.accept_body("");
        }

        let eol = self.detect_eol(options.default_eol);
        let mixed = match eol {
            LineEnding::CRLF => self.cr > 0 || self.lf > 0,
            _ => self.cr > 0 || self.crlf > 0,
        };
        let normalize = options.normalize_eol && mixed;
        if normalize {
            for chunk in &mut self.chunks {
                *chunk = StringBuffer::new(normalize_eol(chunk.as_str(), eol));
            }
        }

        debug!(
            chunks = self.chunks.len(),
            ?eol,
            normalized = normalize,
            bom = !self.bom.is_empty(),
            "built text buffer"
        );

        PieceTreeTextBuffer::new(
            self.chunks,
            eol,
            options.normalize_eol,
            self.bom,
            self.contains_rtl,
            self.contains_unusual_line_terminators,
            !self.is_basic_ascii,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_one(text: &str) -> PieceTreeTextBuffer {
        let mut builder = PieceTreeTextBufferBuilder::new();
        builder.accept_chunk(text);
        builder.finish(&BuildOptions::default())
    }

    fn assert_factory(text: &str, eol: LineEnding, non_basic_ascii: bool, rtl: bool) {
        let buffer = build_one(text);
        assert_eq!(buffer.might_contain_non_basic_ascii(), non_basic_ascii, "{text:?}");
        assert_eq!(buffer.might_contain_rtl(), rtl, "{text:?}");
        assert_eq!(buffer.eol(), eol, "{text:?}");
    }

    #[test]
    fn plain_documents() {
        assert_factory("", LineEnding::LF, false, false);
        assert_factory("Hello world", LineEnding::LF, false, false);
        assert_factory("Hello world\nHow are you?", LineEnding::LF, false, false);
        assert_factory(
            "Hello world\nHow are you?\nIs everything good today?\nDo you enjoy the weather?",
            LineEnding::LF,
            false,
            false,
        );
    }

    #[test]
    fn carriage_return_detection() {
        assert_factory(
            "Hello world\r\nHow are you?\nIs everything good today?\nDo you enjoy the weather?",
            LineEnding::LF,
            false,
            false,
        );
        assert_factory(
            "Hello world\r\nHow are you?\r\nIs everything good today?\nDo you enjoy the weather?",
            LineEnding::CRLF,
            false,
            false,
        );
        assert_factory(
            "Hello world\r\nHow are you?\r\nIs everything good today?\r\nDo you enjoy the weather?",
            LineEnding::CRLF,
            false,
            false,
        );
    }

    #[test]
    fn bom_handling() {
        assert_factory("\u{FEFF}Hello world!", LineEnding::LF, false, false);
        assert_factory("\u{FEFF}Hello 😍 world!", LineEnding::LF, true, false);

        let buffer = build_one("\u{FEFF}Hello world!");
        assert_eq!(buffer.bom(), "\u{FEFF}");
        assert_eq!(buffer.get_text(), "Hello world!");
    }

    #[test]
    fn bom_is_only_stripped_from_the_first_chunk() {
        let mut builder = PieceTreeTextBufferBuilder::new();
        builder.accept_chunk("a");
        builder.accept_chunk("\u{FEFF}b");
        let buffer = builder.finish(&BuildOptions::default());
        assert_eq!(buffer.bom(), "");
        assert_eq!(buffer.get_text(), "a\u{FEFF}b");
    }

    #[test]
    fn rtl_handling() {
        assert_factory("Hello world!זוהי עובדה מבוססת שדעתו", LineEnding::LF, true, true);
        assert_factory("Hello world!זוהי \nעובדה מבוססת שדעתו", LineEnding::LF, true, true);
    }

    #[test]
    fn ascii_handling() {
        assert_factory("Hello world!!\nHow do you do?", LineEnding::LF, false, false);
        assert_factory("Hello world!!\nHow do you do?Züricha📚📚b", LineEnding::LF, true, false);
    }

    #[test]
    fn default_eol_applies_without_line_breaks() {
        let mut builder = PieceTreeTextBufferBuilder::new();
        builder.accept_chunk("single line");
        let buffer = builder.finish(&BuildOptions {
            default_eol: EndOfLine::CRLF,
            ..Default::default()
        });
        assert_eq!(buffer.eol(), LineEnding::CRLF);
    }

    #[test]
    fn crlf_split_across_chunks_is_one_break() {
        let mut builder = PieceTreeTextBufferBuilder::new();
        for chunk in ["line one\r", "\nline two\r", "\r", "\nend\r"] {
            builder.accept_chunk(chunk);
        }
        let buffer = builder.finish(&BuildOptions {
            normalize_eol: false,
            ..Default::default()
        });
        assert_eq!(buffer.get_text(), "line one\r\nline two\r\r\nend\r");
        assert_eq!(buffer.get_line_count(), 5);
        assert_eq!(buffer.get_line_content(3), "");
        assert_eq!(buffer.get_line_content(4), "end");
    }

    #[test]
    fn mixed_line_breaks_are_normalized() {
        let buffer = build_one("a\r\nb\r\nc\nd\re\r\n");
        assert_eq!(buffer.eol(), LineEnding::CRLF);
        assert_eq!(buffer.get_text(), "a\r\nb\r\nc\r\nd\r\ne\r\n");

        let mut builder = PieceTreeTextBufferBuilder::new();
        builder.accept_chunk("a\r\nb\nc\n");
        let raw = builder.finish(&BuildOptions {
            normalize_eol: false,
            ..Default::default()
        });
        assert_eq!(raw.eol(), LineEnding::LF);
        assert_eq!(raw.get_text(), "a\r\nb\nc\n");
        assert_eq!(raw.get_lines_content(), vec!["a", "b", "c", ""]);
    }

    #[test]
    fn lone_carriage_return_document() {
        let buffer = build_one("\r");
        assert_eq!(buffer.get_line_count(), 2);
        assert_eq!(buffer.eol(), LineEnding::CRLF);
        assert_eq!(buffer.get_text(), "\r\n");
    }
}
