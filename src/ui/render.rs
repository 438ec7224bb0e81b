//! The message renderer: a pure mapping from a message's content parts to
//! styled terminal lines.
//!
//! Rendering depends only on the message, the theme, and the render config,
//! so calling it twice on an unchanged message yields identical output.

use ratatui::text::{Line, Span};

use crate::core::message::{thinking_duration_secs, Message, MessagePart, ToolCallState};
use crate::ui::markdown::render_markdown;
use crate::ui::theme::Theme;

#[derive(Debug, Clone, Copy)]
pub struct RenderConfig {
    pub markdown: bool,
    pub syntax: bool,
    /// Reasoning traces are collapsed behind their disclosure by default.
    pub expand_reasoning: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            markdown: true,
            syntax: true,
            expand_reasoning: false,
        }
    }
}

const DIVIDER: &str = "────────";

fn plain_lines(text: &str, style: ratatui::style::Style) -> Vec<Line<'static>> {
    text.lines()
        .map(|l| Line::from(Span::styled(l.to_string(), style)))
        .collect()
}

fn text_part_lines(text: &str, theme: &Theme, cfg: &RenderConfig, user: bool) -> Vec<Line<'static>> {
    let base = if user {
        theme.user_text_style
    } else {
        theme.assistant_text_style
    };
    if cfg.markdown {
        render_markdown(text, theme, base, cfg.syntax)
    } else {
        plain_lines(text, base)
    }
}

fn tool_invocation_lines(
    invocation: &crate::core::message::ToolInvocation,
    theme: &Theme,
) -> Vec<Line<'static>> {
    let mut lines = vec![Line::from(Span::styled(
        format!(
            "Tool call: {} ({})",
            invocation.tool_name,
            invocation.state.as_str()
        ),
        theme.tool_style,
    ))];

    // Only the state's own payload renders: args in `call`, result in
    // `result`, the message in `error`. A partial call shows no body.
    let body = match invocation.state {
        ToolCallState::Call => invocation
            .args
            .as_ref()
            .and_then(|v| serde_json::to_string_pretty(v).ok()),
        ToolCallState::Result => invocation
            .result
            .as_ref()
            .and_then(|v| serde_json::to_string_pretty(v).ok()),
        ToolCallState::Error => invocation.error_message.clone(),
        ToolCallState::PartialCall => None,
    };
    if let Some(body) = body {
        lines.extend(plain_lines(&body, theme.code_block_style));
    }
    lines
}

fn reasoning_block(msg: &Message, theme: &Theme, cfg: &RenderConfig) -> Vec<Line<'static>> {
    let duration = thinking_duration_secs(msg.reasoning_char_count());
    let marker = if cfg.expand_reasoning { "▾" } else { "▸" };
    let mut lines = vec![Line::from(Span::styled(
        format!("{marker} Thought for {duration}s"),
        theme.disclosure_style,
    ))];
    if cfg.expand_reasoning {
        for part in &msg.parts {
            if let MessagePart::Reasoning { text } = part {
                lines.extend(plain_lines(text, theme.reasoning_style));
            }
        }
    }
    lines
}

/// Render one message to terminal lines, followed by a spacing line.
pub fn render_message(msg: &Message, theme: &Theme, cfg: &RenderConfig) -> Vec<Line<'static>> {
    let mut lines: Vec<Line<'static>> = Vec::new();
    let has_reasoning = msg.has_reasoning();

    if msg.is_user() {
        let mut first = vec![Span::styled("You: ".to_string(), theme.user_prefix_style)];
        let body = text_part_lines(&msg.plain_text(), theme, cfg, true);
        let mut body_iter = body.into_iter();
        if let Some(line) = body_iter.next() {
            first.extend(line.spans);
        }
        lines.push(Line::from(first));
        lines.extend(body_iter);
        lines.push(Line::from(""));
        return lines;
    }

    // All reasoning parts of a message group under a single disclosure,
    // shown ahead of the visible response.
    if has_reasoning {
        lines.extend(reasoning_block(msg, theme, cfg));
    }

    for part in &msg.parts {
        match part {
            MessagePart::Text { text } => {
                lines.extend(text_part_lines(text, theme, cfg, false));
            }
            // Rendered as a group above.
            MessagePart::Reasoning { .. } => {}
            MessagePart::ToolInvocation { invocation } => {
                lines.extend(tool_invocation_lines(invocation, theme));
            }
            MessagePart::Source { url, title, .. } => {
                let label = title.clone().unwrap_or_else(|| url.clone());
                lines.push(Line::from(vec![
                    Span::styled("Source: ".to_string(), theme.disclosure_style),
                    Span::styled(format!("{label} ({url})"), theme.link_style),
                ]));
            }
            MessagePart::File {
                media_type,
                filename,
                url,
            } => {
                let label = filename.clone().unwrap_or_else(|| url.clone());
                let line = if media_type.starts_with("image/") {
                    Line::from(Span::styled(
                        format!("[image] {label}"),
                        theme.link_style,
                    ))
                } else {
                    Line::from(Span::styled(
                        format!("[file] {label} ({media_type}): {url}"),
                        theme.link_style,
                    ))
                };
                lines.push(line);
            }
            MessagePart::StepStart => {
                // A phase divider only means something when the message has
                // a reasoning phase to divide from.
                if has_reasoning {
                    lines.push(Line::from(Span::styled(
                        DIVIDER.to_string(),
                        theme.divider_style,
                    )));
                }
            }
        }
    }

    if let Some(reason) = msg.failure() {
        lines.push(Line::from(Span::styled(
            format!("✗ response failed: {reason}"),
            theme.error_style,
        )));
    }

    lines.push(Line::from(""));
    lines
}

/// Render a whole transcript in order.
pub fn render_transcript(
    transcript: &[Message],
    theme: &Theme,
    cfg: &RenderConfig,
) -> Vec<Line<'static>> {
    transcript
        .iter()
        .flat_map(|msg| render_message(msg, theme, cfg))
        .collect()
}
