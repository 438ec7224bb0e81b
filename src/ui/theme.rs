use ratatui::style::{Color, Modifier, Style};

#[derive(Debug, Clone)]
pub struct Theme {
    pub background_color: Color,
    pub dark_background: bool,

    // Chat message styles
    pub user_prefix_style: Style,
    pub user_text_style: Style,
    pub assistant_text_style: Style,
    pub reasoning_style: Style,
    pub disclosure_style: Style,
    pub error_style: Style,
    pub divider_style: Style,
    pub link_style: Style,
    pub tool_style: Style,

    // Markdown accents
    pub heading_style: Style,
    pub inline_code_style: Style,
    pub code_block_style: Style,
    pub bullet_style: Style,

    // Chrome
    pub title_style: Style,
    pub streaming_indicator_style: Style,
    pub input_border_style: Style,
    pub input_text_style: Style,
}

impl Theme {
    pub fn dark_default() -> Self {
        Theme {
            background_color: Color::Black,
            dark_background: true,

            user_prefix_style: Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
            user_text_style: Style::default().fg(Color::Cyan),
            assistant_text_style: Style::default().fg(Color::White),
            reasoning_style: Style::default()
                .fg(Color::DarkGray)
                .add_modifier(Modifier::ITALIC),
            disclosure_style: Style::default().fg(Color::DarkGray),
            error_style: Style::default().fg(Color::Red),
            divider_style: Style::default().fg(Color::DarkGray),
            link_style: Style::default()
                .fg(Color::Blue)
                .add_modifier(Modifier::UNDERLINED),
            tool_style: Style::default().fg(Color::Yellow),

            heading_style: Style::default()
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
            inline_code_style: Style::default().fg(Color::LightYellow),
            code_block_style: Style::default().fg(Color::Gray),
            bullet_style: Style::default().fg(Color::Gray),

            title_style: Style::default().fg(Color::Gray),
            streaming_indicator_style: Style::default().fg(Color::White),
            input_border_style: Style::default().fg(Color::Gray),
            input_text_style: Style::default().fg(Color::White),
        }
    }

    pub fn light() -> Self {
        Theme {
            background_color: Color::White,
            dark_background: false,

            user_prefix_style: Style::default()
                .fg(Color::Blue)
                .add_modifier(Modifier::BOLD),
            user_text_style: Style::default().fg(Color::Blue),
            assistant_text_style: Style::default().fg(Color::Black),
            reasoning_style: Style::default()
                .fg(Color::Gray)
                .add_modifier(Modifier::ITALIC),
            disclosure_style: Style::default().fg(Color::Gray),
            error_style: Style::default().fg(Color::Red),
            divider_style: Style::default().fg(Color::Gray),
            link_style: Style::default()
                .fg(Color::Blue)
                .add_modifier(Modifier::UNDERLINED),
            tool_style: Style::default().fg(Color::Magenta),

            heading_style: Style::default()
                .fg(Color::Black)
                .add_modifier(Modifier::BOLD),
            inline_code_style: Style::default().fg(Color::Magenta),
            code_block_style: Style::default().fg(Color::DarkGray),
            bullet_style: Style::default().fg(Color::DarkGray),

            title_style: Style::default().fg(Color::DarkGray),
            streaming_indicator_style: Style::default().fg(Color::Black),
            input_border_style: Style::default().fg(Color::Black),
            input_text_style: Style::default().fg(Color::Black),
        }
    }

    pub fn named(name: &str) -> Self {
        match name {
            "light" => Self::light(),
            _ => Self::dark_default(),
        }
    }

    /// Map a catalog accent keyword to a terminal color for the panel dot.
    pub fn accent_color(accent: &str) -> Color {
        match accent {
            "green" => Color::Green,
            "purple" => Color::Magenta,
            "blue" => Color::Blue,
            _ => Color::Gray,
        }
    }
}
