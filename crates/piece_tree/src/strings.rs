//! Character classification used to maintain the buffer's content flags.

/// The UTF-8 byte order mark.
pub const UTF8_BOM: &str = "\u{FEFF}";

/// Code point ranges (inclusive) of characters with bidi class R or AL.
const RTL_RANGES: &[(u32, u32)] = &[
    (0x05BE, 0x05BE),
    (0x05C0, 0x05C0),
    (0x05C3, 0x05C3),
    (0x05C6, 0x05C6),
    (0x05D0, 0x05F4),
    (0x0608, 0x0608),
    (0x060B, 0x060B),
    (0x060D, 0x060D),
    (0x061B, 0x064A),
    (0x066D, 0x066F),
    (0x0671, 0x06D5),
    (0x06E5, 0x06E6),
    (0x06EE, 0x06EF),
    (0x06FA, 0x0710),
    (0x0712, 0x072F),
    (0x074D, 0x07A5),
    (0x07B1, 0x07EA),
    (0x07F4, 0x07F5),
    (0x07FA, 0x0815),
    (0x081A, 0x081A),
    (0x0824, 0x0824),
    (0x0828, 0x0828),
    (0x0830, 0x0858),
    (0x085E, 0x08BD),
    (0x200F, 0x200F),
    (0xFB1D, 0xFB1D),
    (0xFB1F, 0xFB28),
    (0xFB2A, 0xFD3D),
    (0xFD50, 0xFDFC),
    (0xFE70, 0xFEFC),
    (0x10800, 0x1091B),
    (0x10920, 0x10A00),
    (0x10A10, 0x10A33),
    (0x10A40, 0x10AE4),
    (0x10AEB, 0x10B35),
    (0x10B40, 0x10BFF),
    (0x10C00, 0x10CFF),
    (0x1E800, 0x1E8CF),
    (0x1E900, 0x1E943),
    (0x1E950, 0x1EBFF),
    (0x1EC00, 0x1EEBB),
];

fn is_rtl(c: char) -> bool {
    let cp = c as u32;
    RTL_RANGES
        .binary_search_by(|&(lo, hi)| {
            if hi < cp {
                std::cmp::Ordering::Less
            } else if lo > cp {
                std::cmp::Ordering::Greater
            } else {
                std::cmp::Ordering::Equal
            }
        })
        .is_ok()
}

/// True if `text` contains any right-to-left character.
pub fn contains_rtl(text: &str) -> bool {
    text.chars().any(is_rtl)
}

/// True if `text` contains LINE SEPARATOR or PARAGRAPH SEPARATOR.
pub fn contains_unusual_line_terminators(text: &str) -> bool {
    text.contains(['\u{2028}', '\u{2029}'])
}

/// True if every byte is printable ASCII or one of `\t`, `\n`, `\r`.
pub fn is_basic_ascii(text: &str) -> bool {
    text.bytes()
        .all(|b| matches!(b, b'\t' | b'\n' | b'\r' | 0x20..=0x7E))
}

pub fn starts_with_utf8_bom(text: &str) -> bool {
    text.starts_with(UTF8_BOM)
}

pub fn strip_utf8_bom(text: &str) -> &str {
    text.strip_prefix(UTF8_BOM).unwrap_or(text)
}

/// Byte index of the first character that is neither space nor tab.
pub fn first_non_whitespace_index(text: &str) -> Option<usize> {
    text.bytes().position(|b| b != b' ' && b != b'\t')
}

/// Byte index of the last character that is neither space nor tab.
pub fn last_non_whitespace_index(text: &str) -> Option<usize> {
    text.bytes().rposition(|b| b != b' ' && b != b'\t')
}
