//! The interactive multi-panel chat loop.
//!
//! One cooperative event loop drives every panel: key events mutate the
//! workspace, dispatched submissions stream back over a single channel, and
//! each incoming event is folded into its panel's transcript atomically.

use std::collections::HashMap;
use std::error::Error;
use std::io;
use std::time::Duration;

use ratatui::crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use ratatui::crossterm::execute;
use ratatui::crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};
use ratatui::{Frame, Terminal};
use unicode_width::UnicodeWidthStr;

use crate::api::events::StreamEvent;
use crate::api::{ChatRequestBody, HistoryEntry};
use crate::core::catalog;
use crate::core::chat_stream::{ChatStreamService, StreamParams};
use crate::core::panel::{PanelSession, PanelStatus};
use crate::core::workspace::{DispatchRequest, Workspace};
use crate::ui::render::{render_transcript, RenderConfig};
use crate::ui::theme::Theme;
use crate::utils::input::sanitize_text_input;
use crate::utils::logging::TranscriptLog;

pub struct ChatLoopOptions {
    pub endpoint: String,
    pub theme: Theme,
    pub render: RenderConfig,
    pub log: TranscriptLog,
}

#[derive(Clone, Copy)]
struct PanelView {
    scroll_offset: u16,
    auto_scroll: bool,
}

impl Default for PanelView {
    fn default() -> Self {
        Self {
            scroll_offset: 0,
            auto_scroll: true,
        }
    }
}

struct ChatApp {
    workspace: Workspace,
    focus: usize,
    views: HashMap<String, PanelView>,
    theme: Theme,
    render: RenderConfig,
    endpoint: String,
    client: reqwest::Client,
    log: TranscriptLog,
}

fn next_focus(current: usize, len: usize, forward: bool) -> usize {
    if len == 0 {
        return 0;
    }
    if forward {
        (current + 1) % len
    } else {
        (current + len - 1) % len
    }
}

fn status_suffix(status: PanelStatus) -> &'static str {
    match status {
        PanelStatus::Idle => "",
        PanelStatus::Submitted => " …",
        PanelStatus::Streaming => " ⟳",
    }
}

fn panel_title(panel: &PanelSession) -> Vec<Span<'static>> {
    let (name, provider, accent) = match catalog::find_model(&panel.model_id) {
        Some(model) => (model.name, model.provider, model.accent),
        None => (panel.model_id.as_str(), "", ""),
    };
    let mut spans = vec![
        Span::styled("● ".to_string(), Style::default().fg(Theme::accent_color(accent))),
        Span::raw(format!("{name} ")),
    ];
    if !provider.is_empty() {
        spans.push(Span::raw(format!("[{provider}] ")));
    }
    spans.push(Span::raw(format!(
        "({} responses){}",
        panel.response_count(),
        status_suffix(panel.status())
    )));
    spans
}

impl ChatApp {
    fn new(workspace: Workspace, options: ChatLoopOptions) -> Self {
        Self {
            workspace,
            focus: 0,
            views: HashMap::new(),
            theme: options.theme,
            render: options.render,
            endpoint: options.endpoint,
            client: reqwest::Client::new(),
            log: options.log,
        }
    }

    fn focused_panel_id(&self) -> Option<String> {
        self.workspace
            .panels()
            .get(self.focus)
            .map(|p| p.model_id.clone())
    }

    fn clamp_focus(&mut self) {
        let len = self.workspace.panels().len();
        if len > 0 && self.focus >= len {
            self.focus = len - 1;
        }
    }

    fn edit_input(&mut self, edit: impl FnOnce(&mut String)) {
        if let Some(panel_id) = self.focused_panel_id() {
            let mut value = self.workspace.input.value_for(&panel_id).to_string();
            edit(&mut value);
            self.workspace.input.set_value(&panel_id, value);
        }
    }

    fn dispatch(&self, service: &ChatStreamService, request: DispatchRequest) {
        if let Some(user_turn) = request.history.iter().rfind(|m| m.is_user()) {
            if let Err(e) = self.log.record("You", &user_turn.plain_text()) {
                tracing::debug!("transcript log write failed: {e}");
            }
        }

        let settings = &request.settings;
        let body = ChatRequestBody {
            id: format!("{}#{}", request.panel_id, request.stream_id),
            messages: request.history.iter().map(HistoryEntry::from).collect(),
            model: request.model_id.clone(),
            system: Some(settings.system_prompt.clone()).filter(|s| !s.trim().is_empty()),
            temperature: settings.temperature,
            top_p: settings.top_p,
            top_k: settings.top_k,
            max_output_tokens: settings.max_output_tokens,
        };

        service.spawn_stream(StreamParams {
            client: self.client.clone(),
            endpoint_base: self.endpoint.clone(),
            panel_id: request.panel_id,
            stream_id: request.stream_id,
            body,
        });
    }

    fn record_response(&self, panel_id: &str) {
        let Some(panel) = self.workspace.panel(panel_id) else {
            return;
        };
        let Some(last) = panel.transcript().last() else {
            return;
        };
        if last.is_assistant() && last.failure().is_none() {
            if let Err(e) = self.log.record(panel_id, &last.plain_text()) {
                tracing::debug!("transcript log write failed: {e}");
            }
        }
    }

    /// Total transcript lines a panel currently renders, indicator included.
    fn transcript_line_count(&self, panel_id: &str) -> u16 {
        let Some(panel) = self.workspace.panel(panel_id) else {
            return 0;
        };
        let mut count = render_transcript(panel.transcript(), &self.theme, &self.render).len();
        if panel.status() == PanelStatus::Submitted {
            count += 1;
        }
        count as u16
    }

    fn scroll_up(&mut self, viewport_height: u16) {
        let Some(panel_id) = self.focused_panel_id() else {
            return;
        };
        let max_offset = self
            .transcript_line_count(&panel_id)
            .saturating_sub(viewport_height);
        let view = self.views.entry(panel_id).or_default();
        let current = if view.auto_scroll {
            max_offset
        } else {
            view.scroll_offset.min(max_offset)
        };
        view.scroll_offset = current.saturating_sub(1);
        view.auto_scroll = false;
    }

    fn scroll_down(&mut self, viewport_height: u16) {
        let Some(panel_id) = self.focused_panel_id() else {
            return;
        };
        let max_offset = self
            .transcript_line_count(&panel_id)
            .saturating_sub(viewport_height);
        let view = self.views.entry(panel_id).or_default();
        if view.auto_scroll {
            return;
        }
        view.scroll_offset = view.scroll_offset.saturating_add(1);
        // Reaching the bottom re-engages follow mode.
        if view.scroll_offset >= max_offset {
            view.scroll_offset = max_offset;
            view.auto_scroll = true;
        }
    }

    fn add_next_catalog_model(&mut self) {
        let next = catalog::all_models()
            .iter()
            .find(|m| self.workspace.panel(m.id).is_none())
            .map(|m| m.id);
        if let Some(id) = next {
            let _ = self.workspace.add_panel(id);
        }
    }
}

fn draw_panel(f: &mut Frame, app: &ChatApp, panel: &PanelSession, area: Rect, focused: bool) {
    let border_style = if focused {
        Style::default().fg(Color::Cyan)
    } else {
        app.theme.input_border_style
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style)
        .title(Line::from(panel_title(panel)));

    let mut lines = render_transcript(panel.transcript(), &app.theme, &app.render);
    if panel.status() == PanelStatus::Submitted {
        lines.push(Line::from(Span::styled(
            "· · ·".to_string(),
            app.theme.streaming_indicator_style,
        )));
    }

    let available_height = area.height.saturating_sub(2);
    let total_lines = lines.len() as u16;
    let max_offset = total_lines.saturating_sub(available_height);
    let view = app.views.get(&panel.model_id).copied().unwrap_or_default();
    let offset = if view.auto_scroll {
        max_offset
    } else {
        view.scroll_offset.min(max_offset)
    };

    let paragraph = Paragraph::new(lines)
        .block(block)
        .wrap(Wrap { trim: false })
        .scroll((offset, 0));
    f.render_widget(paragraph, area);
}

fn draw(f: &mut Frame, app: &ChatApp) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(3)])
        .split(f.area());

    let panels = app.workspace.panels();
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints(vec![
            Constraint::Ratio(1, panels.len().max(1) as u32);
            panels.len().max(1)
        ])
        .split(chunks[0]);

    for (i, panel) in panels.iter().enumerate() {
        draw_panel(f, app, panel, columns[i], i == app.focus);
    }

    let temperature = app.workspace.settings.current().temperature;
    let input_title = if app.workspace.input.linked() {
        format!("Message all models (Ctrl+B: send to all, Ctrl+L: unlink) [temp {temperature:.1}]")
    } else {
        let name = app
            .focused_panel_id()
            .and_then(|id| catalog::find_model(&id).map(|m| m.name.to_string()))
            .unwrap_or_else(|| "panel".to_string());
        format!("Message {name} (Ctrl+L: link inputs) [temp {temperature:.1}]")
    };

    let input_value = app
        .focused_panel_id()
        .map(|id| app.workspace.input.value_for(&id).to_string())
        .unwrap_or_default();

    let cursor_x = chunks[1].x + 1 + input_value.width() as u16;
    let input = Paragraph::new(input_value)
        .style(app.theme.input_text_style)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(app.theme.input_border_style)
                .title(input_title),
        )
        .wrap(Wrap { trim: false });
    f.render_widget(input, chunks[1]);
    f.set_cursor_position((
        cursor_x.min(chunks[1].x + chunks[1].width.saturating_sub(2)),
        chunks[1].y + 1,
    ));
}

pub async fn run_chat(workspace: Workspace, options: ChatLoopOptions) -> Result<(), Box<dyn Error>> {
    let mut app = ChatApp::new(workspace, options);
    let (service, mut rx) = ChatStreamService::new();

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = loop {
        if let Err(e) = terminal.draw(|f| draw(f, &app)) {
            break Err(e.into());
        }

        // Panel interior height: frame minus input area and panel borders.
        let viewport_height = terminal
            .size()
            .map(|s| s.height.saturating_sub(3).saturating_sub(2))
            .unwrap_or(0);

        match handle_events(&mut app, &service, viewport_height) {
            Ok(true) => break Ok(()),
            Ok(false) => {}
            Err(e) => break Err(e),
        }

        // Drain whatever the in-flight streams produced; each event is
        // folded into exactly one panel before the next is read.
        while let Ok(update) = rx.try_recv() {
            let finished = matches!(update.event, StreamEvent::Finish);
            app.workspace
                .apply_stream_event(&update.panel_id, update.stream_id, update.event);
            if finished {
                app.record_response(&update.panel_id);
            }
        }
    };

    service.shutdown();
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

/// Returns `Ok(true)` when the user asked to quit.
fn handle_events(
    app: &mut ChatApp,
    service: &ChatStreamService,
    viewport_height: u16,
) -> Result<bool, Box<dyn Error>> {
    if !event::poll(Duration::from_millis(50))? {
        return Ok(false);
    }
    let Event::Key(key) = event::read()? else {
        return Ok(false);
    };
    if key.kind != KeyEventKind::Press {
        return Ok(false);
    }

    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    match key.code {
        KeyCode::Char('c') if ctrl => return Ok(true),
        KeyCode::Enter => {
            if let Some(panel_id) = app.focused_panel_id() {
                if let Some(request) = app.workspace.submit_panel(&panel_id) {
                    app.dispatch(service, request);
                }
            }
        }
        KeyCode::Char('b') if ctrl => {
            // "Send to all" is a linked-mode action.
            if app.workspace.input.linked() {
                for request in app.workspace.submit_all() {
                    app.dispatch(service, request);
                }
            }
        }
        KeyCode::Char('l') if ctrl => {
            if let Some(panel_id) = app.focused_panel_id() {
                let linked = app.workspace.input.linked();
                app.workspace.input.set_linked(!linked, &panel_id);
            }
        }
        KeyCode::Char('r') if ctrl => {
            app.render.expand_reasoning = !app.render.expand_reasoning;
        }
        KeyCode::Char('n') if ctrl => app.add_next_catalog_model(),
        KeyCode::Char('x') if ctrl => {
            if let Some(panel_id) = app.focused_panel_id() {
                // Removing the last panel is rejected by the workspace.
                if app.workspace.remove_panel(&panel_id).is_ok() {
                    app.views.remove(&panel_id);
                    app.clamp_focus();
                }
            }
        }
        KeyCode::Tab => {
            app.focus = next_focus(app.focus, app.workspace.panels().len(), true);
        }
        KeyCode::BackTab => {
            app.focus = next_focus(app.focus, app.workspace.panels().len(), false);
        }
        // Settings edits only affect dispatches made after the change;
        // in-flight requests keep their snapshot.
        KeyCode::Up if ctrl => {
            let t = app.workspace.settings.current().temperature;
            app.workspace.settings.set_temperature(t + 0.1);
        }
        KeyCode::Down if ctrl => {
            let t = app.workspace.settings.current().temperature;
            app.workspace.settings.set_temperature(t - 0.1);
        }
        KeyCode::Up => app.scroll_up(viewport_height),
        KeyCode::Down => app.scroll_down(viewport_height),
        KeyCode::Backspace => app.edit_input(|value| {
            value.pop();
        }),
        KeyCode::Char(c) if !ctrl => app.edit_input(|value| {
            value.push_str(&sanitize_text_input(&c.to_string()));
        }),
        _ => {}
    }
    Ok(false)
}
