//! Input sanitation shared by the chat loop.

/// Sanitize typed or pasted text before it reaches an input buffer:
/// tabs become four spaces, carriage returns become newlines, and all
/// other control characters are dropped.
pub fn sanitize_text_input(text: &str) -> String {
    let mut sanitized = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\t' => sanitized.push_str("    "),
            '\r' => sanitized.push('\n'),
            '\n' => sanitized.push(c),
            _ if !c.is_control() => sanitized.push(c),
            _ => {}
        }
    }
    sanitized
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_passes_through() {
        assert_eq!(sanitize_text_input("hello world"), "hello world");
    }

    #[test]
    fn tabs_and_carriage_returns_are_rewritten() {
        assert_eq!(sanitize_text_input("a\tb\rc"), "a    b\nc");
    }

    #[test]
    fn control_characters_are_dropped_but_newlines_survive() {
        assert_eq!(sanitize_text_input("a\x07b\nc\x01"), "ab\nc");
    }
}
