//! Cleanup and length bounding for text extracted from PDFs.
//!
//! PDF extraction leaves line-wrap hyphenation, soft line breaks, and stray
//! control bytes in the text. [`clean_text`] repairs those artifacts before
//! chunking; [`truncate_middle`] bounds a text's length while keeping both
//! the document head (titles, policy statements) and tail (conclusions,
//! signatures), joined by a fixed marker.

use regex::Regex;
use std::sync::LazyLock;

/// Marker inserted between the retained head and tail of a bounded text.
pub const TRUNCATION_MARKER: &str = "\n\n[... CONTENIDO RECORTADO ...]\n\n";

static HYPHEN_BREAK: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"-\s*\n\s*").unwrap());
static SOFT_BREAK: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[ \t]*\n[ \t]*").unwrap());
static EXCESS_NEWLINES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n{3,}").unwrap());
static EXCESS_SPACES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[ \t]{2,}").unwrap());
static UNPRINTABLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\x09\x0A\x20-\x7E\x{00A0}-\x{FFFF}]").unwrap());

/// Cleans raw extracted text:
/// - rejoins words broken across lines with a trailing hyphen
/// - converts soft line breaks to a single newline
/// - collapses runs of 3+ newlines to 2 and runs of horizontal whitespace to 1
/// - strips bytes outside printable ASCII plus the BMP Unicode range
///
/// Empty input yields empty output.
pub fn clean_text(raw: &str) -> String {
    if raw.is_empty() {
        return String::new();
    }

    let t = HYPHEN_BREAK.replace_all(raw, "");
    let t = SOFT_BREAK.replace_all(&t, "\n");
    let t = EXCESS_NEWLINES.replace_all(&t, "\n\n");
    let t = EXCESS_SPACES.replace_all(&t, " ");
    let t = UNPRINTABLE.replace_all(&t, "");
    t.trim().to_string()
}

/// Bounds `text` to roughly `max_chars` characters, keeping the first
/// `head_chars` and as much of the tail as fits in the remaining budget.
///
/// Counts characters, not bytes, so multi-byte input is never split.
/// The result is at most `max_chars + TRUNCATION_MARKER` characters long;
/// texts within the budget are returned unchanged.
pub fn truncate_middle(text: &str, max_chars: usize, head_chars: usize) -> String {
    let total = text.chars().count();
    if total <= max_chars {
        return text.to_string();
    }

    let marker_len = TRUNCATION_MARKER.chars().count();
    let tail = max_chars.saturating_sub(head_chars + marker_len);

    let head: String = text.chars().take(head_chars).collect();
    let tail_str: String = if tail > 0 {
        let skip = total - tail;
        text.chars().skip(skip).collect()
    } else {
        String::new()
    };

    format!("{}{}{}", head, TRUNCATION_MARKER, tail_str)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_empty_output() {
        assert_eq!(clean_text(""), "");
    }

    #[test]
    fn rejoins_hyphen_broken_words() {
        assert_eq!(clean_text("recono-\ncimiento de ingresos"), "reconocimiento de ingresos");
        assert_eq!(clean_text("efec-  \n  tivo"), "efectivo");
    }

    #[test]
    fn normalizes_soft_breaks_and_blank_runs() {
        let cleaned = clean_text("línea uno   \n   línea dos\n\n\n\nlínea tres");
        assert_eq!(cleaned, "línea uno\nlínea dos\n\nlínea tres");
    }

    #[test]
    fn collapses_horizontal_whitespace() {
        assert_eq!(clean_text("activos    corrientes\t\tnetos"), "activos corrientes netos");
    }

    #[test]
    fn strips_control_characters() {
        assert_eq!(clean_text("caja\u{0000} y bancos\u{0007}"), "caja y bancos");
    }

    #[test]
    fn keeps_accented_spanish() {
        assert_eq!(clean_text("estados financieros según política"), "estados financieros según política");
    }

    #[test]
    fn short_text_passes_through() {
        assert_eq!(truncate_middle("corto", 100, 60), "corto");
    }

    #[test]
    fn bounds_length_and_keeps_head_and_tail() {
        let text: String = (0..500).map(|i| char::from(b'a' + (i % 26) as u8)).collect();
        let out = truncate_middle(&text, 100, 60);

        let marker_len = TRUNCATION_MARKER.chars().count();
        assert!(out.chars().count() <= 100 + marker_len);
        assert!(out.starts_with(&text[..60]));
        assert!(out.contains(TRUNCATION_MARKER));
        // Ends with characters drawn from the original's tail.
        let suffix: String = out.chars().rev().take(5).collect::<String>().chars().rev().collect();
        assert!(text.ends_with(&suffix));
    }

    #[test]
    fn zero_tail_budget_keeps_only_head() {
        let text = "x".repeat(300);
        let out = truncate_middle(&text, 50, 50);
        assert!(out.starts_with(&"x".repeat(50)));
        assert!(out.ends_with(TRUNCATION_MARKER));
    }

    #[test]
    fn char_counting_is_utf8_safe() {
        let text = "á".repeat(400);
        let out = truncate_middle(&text, 100, 60);
        assert!(out.chars().count() <= 100 + TRUNCATION_MARKER.chars().count());
        assert!(out.starts_with(&"á".repeat(60)));
    }
}
