//! Syntax highlighting for fenced code blocks, backed by syntect.
//!
//! The syntax and theme sets are loaded once per process; highlighting is
//! deterministic for a given (language, code) pair, which keeps the message
//! renderer idempotent.

use std::sync::OnceLock;

use ratatui::style::{Color, Style};
use ratatui::text::{Line, Span};
use syntect::easy::HighlightLines;
use syntect::highlighting::ThemeSet;
use syntect::parsing::SyntaxSet;

static SYNTAX_SET: OnceLock<SyntaxSet> = OnceLock::new();
static THEME_SET: OnceLock<ThemeSet> = OnceLock::new();

fn syntax_set() -> &'static SyntaxSet {
    SYNTAX_SET.get_or_init(SyntaxSet::load_defaults_newlines)
}

fn theme_set() -> &'static ThemeSet {
    THEME_SET.get_or_init(ThemeSet::load_defaults)
}

/// Map common fence aliases onto syntect tokens.
pub fn normalize_lang_hint(hint: &str) -> String {
    let t = hint.trim().to_ascii_lowercase();
    match t.as_str() {
        "py" | "python3" => "python".into(),
        "rs" => "rust".into(),
        "js" | "node" => "javascript".into(),
        "ts" => "typescript".into(),
        "shell" | "sh" | "zsh" => "bash".into(),
        "yml" => "yaml".into(),
        "md" => "markdown".into(),
        other => other.into(),
    }
}

/// Highlight a fenced code block into styled lines. Returns `None` when the
/// language is unknown so the caller can fall back to plain code styling.
pub fn highlight_code_block(
    lang_hint: &str,
    code: &str,
    dark_background: bool,
) -> Option<Vec<Line<'static>>> {
    let hint = normalize_lang_hint(lang_hint);
    if hint.is_empty() {
        return None;
    }
    let ss = syntax_set();
    let syntax = ss
        .find_syntax_by_token(&hint)
        .or_else(|| ss.find_syntax_by_extension(&hint))?;

    let theme_name = if dark_background {
        "base16-ocean.dark"
    } else {
        "base16-ocean.light"
    };
    let theme = theme_set().themes.get(theme_name)?;
    let mut highlighter = HighlightLines::new(syntax, theme);

    let mut lines = Vec::new();
    for raw in code.lines() {
        let regions = highlighter.highlight_line(raw, ss).ok()?;
        let spans: Vec<Span<'static>> = regions
            .into_iter()
            .map(|(style, text)| {
                let fg = style.foreground;
                Span::styled(
                    text.to_string(),
                    Style::default().fg(Color::Rgb(fg.r, fg.g, fg.b)),
                )
            })
            .collect();
        lines.push(Line::from(spans));
    }
    Some(lines)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aliases_normalize_to_syntect_tokens() {
        assert_eq!(normalize_lang_hint("RS"), "rust");
        assert_eq!(normalize_lang_hint("  py "), "python");
        assert_eq!(normalize_lang_hint("toml"), "toml");
    }

    #[test]
    fn known_languages_highlight_line_for_line() {
        let code = "fn main() {\n    println!(\"hi\");\n}";
        let lines = highlight_code_block("rust", code, true).expect("rust is a known syntax");
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn unknown_languages_fall_back() {
        assert!(highlight_code_block("definitely-not-a-language", "x", true).is_none());
        assert!(highlight_code_block("", "x", true).is_none());
    }

    #[test]
    fn highlighting_is_deterministic() {
        let code = "let x = 1;";
        let a = highlight_code_block("rust", code, true).unwrap();
        let b = highlight_code_block("rust", code, true).unwrap();
        assert_eq!(a, b);
    }
}
