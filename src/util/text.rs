//! Text helpers shared by the checkpoint listing and review output.

/// Truncate `text` to at most `max_chars` characters, appending `...` when
/// anything was cut. Never splits a UTF-8 code point.
pub fn truncate_with_ellipsis(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => format!("{}...", &text[..byte_idx]),
        None => text.to_string(),
    }
}

/// Collapse newlines and runs of whitespace into single spaces.
pub fn single_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
