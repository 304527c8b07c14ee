//! Display width helpers used by the text formatters.
//!
//! Widths are measured in terminal cells after stripping ANSI escapes, so a
//! block that shells out to a colourising command still pads correctly.

use unicode_width::UnicodeWidthChar;

/// Compute the display width of a string after stripping ANSI escapes.
pub fn display_width(text: &str) -> usize {
    let clean = strip_ansi_escapes::strip(text);
    let clean_str = String::from_utf8_lossy(&clean);
    unicode_width::UnicodeWidthStr::width(&*clean_str)
}

/// Cut `text` so its display width does not exceed `max`.
pub fn truncate_to_width(text: &str, max: usize) -> String {
    let mut out = String::new();
    let mut used = 0;
    for ch in text.chars() {
        let w = ch.width().unwrap_or(0);
        if used + w > max {
            break;
        }
        used += w;
        out.push(ch);
    }
    out
}

/// Right-pad `text` with spaces until it is at least `min` cells wide.
pub fn pad_to_width(text: &str, min: usize) -> String {
    let width = display_width(text);
    let mut out = text.to_string();
    for _ in width..min {
        out.push(' ');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn width_ignores_ansi_sequences() {
        assert_eq!(display_width("\u{1b}[31mred\u{1b}[0m"), 3);
    }

    #[test]
    fn truncate_respects_wide_glyphs() {
        assert_eq!(truncate_to_width("日本語", 5), "日本");
        assert_eq!(truncate_to_width("abc", 10), "abc");
    }

    #[test]
    fn pad_only_grows() {
        assert_eq!(pad_to_width("ab", 4), "ab  ");
        assert_eq!(pad_to_width("abcdef", 4), "abcdef");
    }
}
