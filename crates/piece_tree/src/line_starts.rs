use serde::{Deserialize, Serialize};

/// A concrete line terminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum LineEnding {
    /// `\n`
    #[default]
    LF,
    /// `\r\n`
    CRLF,
    /// A lone `\r`. Recognised when scanning but never used as a buffer's EOL.
    CR,
}

impl LineEnding {
    pub fn as_str(self) -> &'static str {
        match self {
            LineEnding::LF => "\n",
            LineEnding::CRLF => "\r\n",
            LineEnding::CR => "\r",
        }
    }

    pub fn len(self) -> usize {
        self.as_str().len()
    }

    pub fn from_str_eol(eol: &str) -> Option<Self> {
        match eol {
            "\n" => Some(LineEnding::LF),
            "\r\n" => Some(LineEnding::CRLF),
            "\r" => Some(LineEnding::CR),
            _ => None,
        }
    }
}

/// Caller preference for line endings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EndOfLine {
    /// Whatever the buffer itself uses.
    #[default]
    TextDefined,
    LF,
    CRLF,
}

/// Line starts of a chunk plus its terminator statistics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineStarts {
    pub line_starts: Vec<usize>,
    pub cr: usize,
    pub lf: usize,
    pub crlf: usize,
    pub is_basic_ascii: bool,
}

/// Line-break summary of a piece of inserted text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextCounter {
    pub eol_count: usize,
    pub first_line_length: usize,
    pub last_line_length: usize,
    /// The last terminator seen, `None` when the text has no line break.
    pub eol: Option<LineEnding>,
}

/// Byte offsets where each line of `text` begins. Always starts with `0`;
/// `\r\n` yields a single entry.
pub fn create_line_starts_fast(text: &str) -> Vec<usize> {
    let mut r = vec![0];
    let bytes = text.as_bytes();
    let len = bytes.len();
    let mut i = 0;

    while i < len {
        match bytes[i] {
            b'\r' => {
                if i + 1 < len && bytes[i + 1] == b'\n' {
                    r.push(i + 2);
                    i += 1;
                } else {
                    r.push(i + 1);
                }
            }
            b'\n' => r.push(i + 1),
            _ => {}
        }
        i += 1;
    }

    r
}

/// Same as [`create_line_starts_fast`] but also counts terminators and checks
/// whether the chunk is plain printable ASCII.
pub fn create_line_starts(text: &str) -> LineStarts {
    let mut r = vec![0];
    let (mut cr, mut lf, mut crlf) = (0, 0, 0);
    let mut is_basic_ascii = true;

    let bytes = text.as_bytes();
    let len = bytes.len();
    let mut i = 0;

    while i < len {
        let chr = bytes[i];
        if chr == b'\r' {
            if i + 1 < len && bytes[i + 1] == b'\n' {
                crlf += 1;
                r.push(i + 2);
                i += 1;
            } else {
                cr += 1;
                r.push(i + 1);
            }
        } else if chr == b'\n' {
            lf += 1;
            r.push(i + 1);
        } else if is_basic_ascii && chr != b'\t' && !(32..=126).contains(&chr) {
            is_basic_ascii = false;
        }
        i += 1;
    }

    LineStarts {
        line_starts: r,
        cr,
        lf,
        crlf,
        is_basic_ascii,
    }
}

/// Counts line breaks in `text` and measures its first and last line in bytes.
pub fn count_eol(text: &str) -> TextCounter {
    let bytes = text.as_bytes();
    let len = bytes.len();

    let mut eol_count = 0;
    let mut first_line_length = 0;
    let mut last_line_start = 0;
    let mut eol = None;

    let mut i = 0;
    while i < len {
        let chr = bytes[i];
        if chr == b'\r' {
            if eol_count == 0 {
                first_line_length = i;
            }
            eol_count += 1;
            if i + 1 < len && bytes[i + 1] == b'\n' {
                eol = Some(LineEnding::CRLF);
                i += 1;
            } else {
                eol = Some(LineEnding::CR);
            }
            last_line_start = i + 1;
        } else if chr == b'\n' {
            eol = Some(LineEnding::LF);
            if eol_count == 0 {
                first_line_length = i;
            }
            eol_count += 1;
            last_line_start = i + 1;
        }
        i += 1;
    }

    if eol_count == 0 {
        first_line_length = len;
    }

    TextCounter {
        eol_count,
        first_line_length,
        last_line_length: len - last_line_start,
        eol,
    }
}

/// Rewrites every `\r\n`, `\r` and `\n` in `text` to `eol`.
pub fn normalize_eol(text: &str, eol: LineEnding) -> String {
    let target = eol.as_str();
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(idx) = rest.find(['\r', '\n']) {
        out.push_str(&rest[..idx]);
        out.push_str(target);
        let skip = if rest[idx..].starts_with("\r\n") { 2 } else { 1 };
        rest = &rest[idx + skip..];
    }
    out.push_str(rest);
    out
}
