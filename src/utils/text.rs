// file: src/utils/text.rs
// description: char-boundary-safe snippet and window helpers shared by extraction and enrichment
// reference: safe UTF-8 slicing for emoji and multi-byte characters

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref WHITESPACE_RUN: Regex = Regex::new(r"\s+").expect("WHITESPACE_RUN regex is valid");
}

/// Largest position `<= pos` that falls on a char boundary.
pub fn floor_char_boundary(text: &str, pos: usize) -> usize {
    let mut pos = pos.min(text.len());
    while pos > 0 && !text.is_char_boundary(pos) {
        pos -= 1;
    }
    pos
}

/// Smallest position `>= pos` that falls on a char boundary.
pub fn ceil_char_boundary(text: &str, pos: usize) -> usize {
    let mut pos = pos.min(text.len());
    while pos < text.len() && !text.is_char_boundary(pos) {
        pos += 1;
    }
    pos
}

/// Aggressively cleans free text before regex matching: straightens curly
/// quotes and collapses every whitespace run to a single space. Extraction
/// and proximity association must both use this so match spans line up.
pub fn normalize_for_matching(text: &str) -> String {
    let text = text
        .replace(['\u{201c}', '\u{201d}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");
    WHITESPACE_RUN.replace_all(&text, " ").trim().to_string()
}

/// Context window of `window` bytes on each side of `[start, end)`, clamped
/// to char boundaries, with newlines collapsed and ellipses attached.
pub fn context_snippet(text: &str, start: usize, end: usize, window: usize) -> String {
    let from = floor_char_boundary(text, start.saturating_sub(window));
    let to = ceil_char_boundary(text, (end + window).min(text.len()));
    format!("...{}...", text[from..to].replace('\n', " "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_collapses_whitespace() {
        assert_eq!(
            normalize_for_matching("a  b\t\tc\n\nd"),
            "a b c d".to_string()
        );
    }

    #[test]
    fn test_normalize_straightens_quotes() {
        assert_eq!(normalize_for_matching("\u{201c}hi\u{201d}"), "\"hi\"");
        assert_eq!(normalize_for_matching("it\u{2019}s"), "it's");
    }

    #[test]
    fn test_snippet_clamps_to_text() {
        let text = "short";
        assert_eq!(context_snippet(text, 0, 5, 100), "...short...");
    }

    #[test]
    fn test_snippet_survives_multibyte_neighbours() {
        let text = "🚨🚨 evil.com 🚨🚨";
        let start = text.find("evil.com").unwrap();
        // Window boundary lands inside an emoji; must not panic.
        let snippet = context_snippet(text, start, start + 8, 3);
        assert!(snippet.contains("evil.com"));
    }

    #[test]
    fn test_boundary_helpers() {
        let text = "aé"; // 'é' occupies bytes 1..3
        assert_eq!(floor_char_boundary(text, 2), 1);
        assert_eq!(ceil_char_boundary(text, 2), 3);
        assert_eq!(floor_char_boundary(text, 10), 3);
    }
}
