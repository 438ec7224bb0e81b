//! Markdown rendering for text message parts.
//!
//! Turns a markdown string into styled terminal lines: headings, lists,
//! emphasis, inline code, and fenced code blocks with declared-language
//! highlighting (plain code styling when no language matches).

use pulldown_cmark::{CodeBlockKind, Event, Options, Parser, Tag, TagEnd};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};

use crate::ui::theme::Theme;
use crate::utils::syntax::highlight_code_block;

#[derive(Debug, Clone, Copy)]
enum ListKind {
    Bullet,
    Ordered(u64),
}

struct MarkdownWriter<'t> {
    theme: &'t Theme,
    syntax_enabled: bool,
    base_style: Style,

    lines: Vec<Line<'static>>,
    current: Vec<Span<'static>>,
    bold_depth: usize,
    italic_depth: usize,
    heading_depth: usize,
    list_stack: Vec<ListKind>,
    code_block_lang: Option<String>,
    code_buffer: String,
    in_code_block: bool,
}

impl<'t> MarkdownWriter<'t> {
    fn new(theme: &'t Theme, base_style: Style, syntax_enabled: bool) -> Self {
        Self {
            theme,
            syntax_enabled,
            base_style,
            lines: Vec::new(),
            current: Vec::new(),
            bold_depth: 0,
            italic_depth: 0,
            heading_depth: 0,
            list_stack: Vec::new(),
            code_block_lang: None,
            code_buffer: String::new(),
            in_code_block: false,
        }
    }

    fn inline_style(&self) -> Style {
        if self.heading_depth > 0 {
            return self.theme.heading_style;
        }
        let mut style = self.base_style;
        if self.bold_depth > 0 {
            style = style.add_modifier(Modifier::BOLD);
        }
        if self.italic_depth > 0 {
            style = style.add_modifier(Modifier::ITALIC);
        }
        style
    }

    fn flush_line(&mut self) {
        if !self.current.is_empty() {
            let spans = std::mem::take(&mut self.current);
            self.lines.push(Line::from(spans));
        }
    }

    fn blank_line(&mut self) {
        self.flush_line();
        if self.lines.is_empty() {
            return;
        }
        if !matches!(self.lines.last(), Some(line) if line.spans.is_empty()) {
            self.lines.push(Line::default());
        }
    }

    fn push_text(&mut self, text: &str, style: Style) {
        for (i, piece) in text.split('\n').enumerate() {
            if i > 0 {
                self.flush_line();
            }
            if !piece.is_empty() {
                self.current.push(Span::styled(piece.to_string(), style));
            }
        }
    }

    fn list_indent(&self) -> String {
        "  ".repeat(self.list_stack.len().saturating_sub(1))
    }

    fn finish_code_block(&mut self) {
        let lang = self.code_block_lang.take().unwrap_or_default();
        let code = std::mem::take(&mut self.code_buffer);
        let code = code.strip_suffix('\n').unwrap_or(&code).to_string();

        let highlighted = if self.syntax_enabled {
            highlight_code_block(&lang, &code, self.theme.dark_background)
        } else {
            None
        };
        match highlighted {
            Some(lines) => self.lines.extend(lines),
            None => {
                for raw in code.lines() {
                    self.lines.push(Line::from(Span::styled(
                        raw.to_string(),
                        self.theme.code_block_style,
                    )));
                }
            }
        }
        self.lines.push(Line::default());
        self.in_code_block = false;
    }

    fn into_lines(mut self) -> Vec<Line<'static>> {
        self.flush_line();
        while matches!(self.lines.last(), Some(line) if line.spans.is_empty()) {
            self.lines.pop();
        }
        self.lines
    }
}

pub fn render_markdown(
    text: &str,
    theme: &Theme,
    base_style: Style,
    syntax_enabled: bool,
) -> Vec<Line<'static>> {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_STRIKETHROUGH);
    let parser = Parser::new_ext(text, options);
    let mut w = MarkdownWriter::new(theme, base_style, syntax_enabled);

    for event in parser {
        match event {
            Event::Start(tag) => match tag {
                Tag::Paragraph => w.flush_line(),
                Tag::Heading { .. } => {
                    w.flush_line();
                    w.heading_depth += 1;
                }
                Tag::CodeBlock(kind) => {
                    w.blank_line();
                    w.in_code_block = true;
                    w.code_block_lang = match kind {
                        CodeBlockKind::Fenced(info) => info
                            .split_ascii_whitespace()
                            .next()
                            .map(str::to_string),
                        CodeBlockKind::Indented => None,
                    };
                }
                Tag::List(start) => {
                    w.flush_line();
                    w.list_stack.push(match start {
                        Some(n) => ListKind::Ordered(n),
                        None => ListKind::Bullet,
                    });
                }
                Tag::Item => {
                    w.flush_line();
                    let indent = w.list_indent();
                    let marker = match w.list_stack.last_mut() {
                        Some(ListKind::Ordered(n)) => {
                            let marker = format!("{indent}{n}. ");
                            *n += 1;
                            marker
                        }
                        _ => format!("{indent}- "),
                    };
                    w.current.push(Span::styled(marker, w.theme.bullet_style));
                }
                Tag::Emphasis => w.italic_depth += 1,
                Tag::Strong => w.bold_depth += 1,
                Tag::BlockQuote(_) => {
                    w.flush_line();
                    w.italic_depth += 1;
                    w.current
                        .push(Span::styled("> ".to_string(), w.theme.bullet_style));
                }
                Tag::Link { .. } => {}
                _ => {}
            },
            Event::End(tag_end) => match tag_end {
                TagEnd::Paragraph => w.blank_line(),
                TagEnd::Heading(_) => {
                    w.heading_depth = w.heading_depth.saturating_sub(1);
                    w.blank_line();
                }
                TagEnd::CodeBlock => w.finish_code_block(),
                TagEnd::List(_) => {
                    w.flush_line();
                    w.list_stack.pop();
                    if w.list_stack.is_empty() {
                        w.blank_line();
                    }
                }
                TagEnd::Item => w.flush_line(),
                TagEnd::Emphasis => w.italic_depth = w.italic_depth.saturating_sub(1),
                TagEnd::Strong => w.bold_depth = w.bold_depth.saturating_sub(1),
                TagEnd::BlockQuote(_) => {
                    w.italic_depth = w.italic_depth.saturating_sub(1);
                    w.blank_line();
                }
                TagEnd::Link => {}
                _ => {}
            },
            Event::Text(text) => {
                if w.in_code_block {
                    w.code_buffer.push_str(&text);
                } else {
                    let style = w.inline_style();
                    w.push_text(&text, style);
                }
            }
            Event::Code(code) => {
                w.current
                    .push(Span::styled(code.to_string(), w.theme.inline_code_style));
            }
            Event::SoftBreak => w.push_text(" ", w.inline_style()),
            Event::HardBreak => w.flush_line(),
            Event::Rule => {
                w.blank_line();
                w.lines
                    .push(Line::from(Span::styled("────────", w.theme.divider_style)));
                w.blank_line();
            }
            _ => {}
        }
    }

    w.into_lines()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(text: &str) -> Vec<Line<'static>> {
        let theme = Theme::dark_default();
        render_markdown(text, &theme, theme.assistant_text_style, false)
    }

    fn flat(lines: &[Line<'static>]) -> Vec<String> {
        lines
            .iter()
            .map(|l| l.spans.iter().map(|s| s.content.as_ref()).collect())
            .collect()
    }

    #[test]
    fn paragraphs_are_separated_by_blank_lines() {
        let lines = flat(&render("one\n\ntwo"));
        assert_eq!(lines, vec!["one", "", "two"]);
    }

    #[test]
    fn lists_get_markers_and_ordered_numbering() {
        let lines = flat(&render("- a\n- b\n\n1. x\n2. y"));
        assert_eq!(lines, vec!["- a", "- b", "", "1. x", "2. y"]);
    }

    #[test]
    fn inline_code_is_styled_distinctly() {
        let theme = Theme::dark_default();
        let lines = render_markdown("use `foo()` here", &theme, theme.assistant_text_style, false);
        let code_span = lines[0]
            .spans
            .iter()
            .find(|s| s.content.as_ref() == "foo()")
            .expect("inline code span");
        assert_eq!(code_span.style, theme.inline_code_style);
    }

    #[test]
    fn fenced_code_without_language_renders_plain() {
        let theme = Theme::dark_default();
        let lines = render_markdown("```\nraw text\n```", &theme, theme.assistant_text_style, true);
        let code_line = lines
            .iter()
            .find(|l| l.spans.iter().any(|s| s.content.as_ref() == "raw text"))
            .expect("code line");
        assert_eq!(code_line.spans[0].style, theme.code_block_style);
    }

    #[test]
    fn fenced_code_with_language_is_highlighted() {
        let theme = Theme::dark_default();
        let lines = render_markdown(
            "```rust\nfn main() {}\n```",
            &theme,
            theme.assistant_text_style,
            true,
        );
        // Highlighted output uses RGB colors from the syntect theme rather
        // than the plain code style.
        let has_rgb = lines.iter().any(|l| {
            l.spans.iter().any(|s| {
                matches!(s.style.fg, Some(ratatui::style::Color::Rgb(_, _, _)))
            })
        });
        assert!(has_rgb);
    }

    #[test]
    fn headings_use_the_heading_style() {
        let theme = Theme::dark_default();
        let lines = render_markdown("# Title\n\nbody", &theme, theme.assistant_text_style, false);
        assert_eq!(lines[0].spans[0].style, theme.heading_style);
        assert_eq!(lines[0].spans[0].content.as_ref(), "Title");
    }

    #[test]
    fn strong_emphasis_sets_the_bold_modifier() {
        let lines = render("this is **important**");
        let bold = lines[0]
            .spans
            .iter()
            .find(|s| s.content.as_ref() == "important")
            .expect("bold span");
        assert!(bold.style.add_modifier.contains(Modifier::BOLD));
    }

    #[test]
    fn rendering_is_idempotent() {
        let text = "# Title\n\n- item `code`\n\n```rust\nlet x = 1;\n```";
        assert_eq!(render(text), render(text));
    }
}
