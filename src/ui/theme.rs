use ratatui::style::{Color, Modifier, Style};

#[derive(Debug, Clone)]
pub struct Theme {
    // Transcript
    pub user_prefix_style: Style,
    pub user_text_style: Style,
    pub assistant_text_style: Style,
    pub error_prefix_style: Style,
    pub error_text_style: Style,
    pub info_text_style: Style,
    pub interrupted_marker_style: Style,

    // Markdown
    pub heading_style: Style,
    pub inline_code_style: Style,
    pub code_block_style: Style,
    pub quote_style: Style,
    pub link_style: Style,
    pub list_marker_style: Style,
    pub rule_style: Style,

    // Chrome
    pub title_style: Style,
    pub status_style: Style,
    pub streaming_indicator_style: Style,
    pub input_border_style: Style,
    pub input_disabled_border_style: Style,
    pub selection_style: Style,
    pub muted_style: Style,
    pub active_tab_style: Style,
}

impl Theme {
    pub fn dark_default() -> Self {
        Theme {
            user_prefix_style: Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
            user_text_style: Style::default().fg(Color::Cyan),
            assistant_text_style: Style::default().fg(Color::White),
            error_prefix_style: Style::default()
                .fg(Color::Red)
                .add_modifier(Modifier::BOLD),
            error_text_style: Style::default().fg(Color::LightRed),
            info_text_style: Style::default().fg(Color::DarkGray),
            interrupted_marker_style: Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::ITALIC),

            heading_style: Style::default()
                .fg(Color::LightBlue)
                .add_modifier(Modifier::BOLD),
            inline_code_style: Style::default().fg(Color::LightYellow),
            code_block_style: Style::default().fg(Color::Gray),
            quote_style: Style::default()
                .fg(Color::Gray)
                .add_modifier(Modifier::ITALIC),
            link_style: Style::default()
                .fg(Color::LightCyan)
                .add_modifier(Modifier::UNDERLINED),
            list_marker_style: Style::default().fg(Color::Yellow),
            rule_style: Style::default().fg(Color::DarkGray),

            title_style: Style::default().fg(Color::Gray),
            status_style: Style::default().fg(Color::DarkGray),
            streaming_indicator_style: Style::default().fg(Color::White),
            input_border_style: Style::default().fg(Color::Gray),
            input_disabled_border_style: Style::default().fg(Color::DarkGray),
            selection_style: Style::default()
                .fg(Color::Black)
                .bg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
            muted_style: Style::default().fg(Color::DarkGray),
            active_tab_style: Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD | Modifier::UNDERLINED),
        }
    }
}
