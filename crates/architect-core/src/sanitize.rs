//! Normalization of language-model output into Mermaid markup.
//!
//! Models wrap diagrams in markdown fences, sprinkle non-breaking and
//! zero-width spaces through node labels, and occasionally drop the line
//! break after a node label (`A[Start]B-->C`). The Mermaid CLI rejects all of
//! these, so every piece of text headed for the compiler goes through
//! [`sanitize`] first.
//!
//! `sanitize` is pure, never fails and is idempotent: running it on its own
//! output returns the same text. Sources read back from disk are therefore
//! safe to clean again.

use std::sync::OnceLock;

use regex::Regex;

const NO_BREAK_SPACE: char = '\u{00A0}';
const ZERO_WIDTH_SPACE: char = '\u{200B}';
const BYTE_ORDER_MARK: char = '\u{FEFF}';

fn fence_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // Opening fences carry an optional language tag; closing fences don't.
    RE.get_or_init(|| Regex::new(r"(?i)```[a-z0-9_+\-]*").expect("fence pattern is valid"))
}

fn horizontal_ws_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[ \t\r\x0B\x0C]+").expect("whitespace pattern is valid"))
}

fn joined_bracket_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\]([A-Za-z0-9])").expect("bracket pattern is valid"))
}

/// Clean raw model output (or a hand-edited file) into diagram markup.
///
/// Steps, in order:
/// 1. strip fence markers anywhere in the text
/// 2. NBSP becomes a space; zero-width spaces and BOMs disappear
/// 3. collapse horizontal whitespace runs to a single space
/// 4. trim every line and drop the empty ones
/// 5. break `]X` into `]` / `X` when a label closer swallowed a newline
/// 6. trim the whole result
pub fn sanitize(text: &str) -> String {
    let text = strip_fences(text);
    let text = strip_invisible(&text);
    // Dropping a zero-width space between backticks can splice a new fence.
    let text = strip_fences(&text);
    let text = collapse_horizontal_whitespace(&text);
    let text = drop_blank_lines(&text);
    let text = split_joined_brackets(&text);
    text.trim().to_string()
}

/// Remove opening (with language tag) and closing fence markers.
pub fn strip_fences(text: &str) -> String {
    fence_re().replace_all(text, "").into_owned()
}

fn strip_invisible(text: &str) -> String {
    text.chars()
        .filter(|c| *c != ZERO_WIDTH_SPACE && *c != BYTE_ORDER_MARK)
        .map(|c| if c == NO_BREAK_SPACE { ' ' } else { c })
        .collect()
}

fn collapse_horizontal_whitespace(text: &str) -> String {
    horizontal_ws_re().replace_all(text, " ").into_owned()
}

fn drop_blank_lines(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn split_joined_brackets(text: &str) -> String {
    joined_bracket_re().replace_all(text, "]\n$1").into_owned()
}
