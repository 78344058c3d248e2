use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

/// Terminal columns occupied by `s`. CJK and other wide glyphs count as two.
pub fn display_width(s: &str) -> usize {
    UnicodeWidthStr::width(s)
}

/// Terminal columns occupied by a single character. Control characters count as one.
pub fn char_width(ch: char) -> usize {
    UnicodeWidthChar::width(ch).unwrap_or(1).max(1)
}

/// Column offset that centres `text` inside a span of `outer` columns.
pub fn center_offset(outer: usize, text: &str) -> usize {
    outer.saturating_sub(display_width(text)) / 2
}
