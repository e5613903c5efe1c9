// src/utils/text.rs

//! Text cleanup helpers for scraped and API-sourced content.

use std::sync::OnceLock;

use regex::Regex;

fn whitespace_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\s+").expect("static regex"))
}

/// Collapse all whitespace runs into single spaces and trim the ends.
pub fn collapse_whitespace(text: &str) -> String {
    whitespace_pattern().replace_all(text.trim(), " ").into_owned()
}

/// Remove a leading UTF-8 byte order mark.
///
/// Some upstream endpoints serve JSON as `application/javascript` files
/// that start with a BOM, which breaks strict JSON parsing.
pub fn strip_bom(text: &str) -> &str {
    text.trim_start_matches('\u{feff}')
}

/// Shorten body text to at most `max_chars` characters, appending an
/// ellipsis when something was cut.
pub fn summarize(text: &str, max_chars: usize) -> String {
    let cleaned = collapse_whitespace(text);
    if cleaned.chars().count() <= max_chars {
        return cleaned;
    }
    let mut shortened: String = cleaned.chars().take(max_chars).collect();
    shortened.push_str("...");
    shortened
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collapse_whitespace() {
        assert_eq!(collapse_whitespace("  a \n\t b  c "), "a b c");
        assert_eq!(collapse_whitespace(""), "");
    }

    #[test]
    fn test_strip_bom() {
        assert_eq!(strip_bom("\u{feff}{\"a\":1}"), "{\"a\":1}");
        assert_eq!(strip_bom("plain"), "plain");
    }

    #[test]
    fn test_summarize_truncates_with_ellipsis() {
        assert_eq!(summarize("short text", 200), "short text");
        let long = "가나다라".repeat(100);
        let summary = summarize(&long, 10);
        assert_eq!(summary.chars().count(), 13);
        assert!(summary.ends_with("..."));
    }
}
