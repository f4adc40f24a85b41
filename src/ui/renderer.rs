use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Tabs},
    Frame,
};

use crate::core::config::data::path_display;
use crate::core::config::SettingsTab;
use crate::core::message::TranscriptKind;
use crate::core::session::ChatSession;
use crate::ui::chat_loop::{App, Loadable, View};
use crate::ui::markdown::{render_markdown, wrap_lines};
use crate::ui::picker::PickerState;
use crate::ui::theme::Theme;

const INPUT_HEIGHT: u16 = 3;
/// Title row, status row, and the input box with its borders.
const CHAT_CHROME: u16 = 1 + 1 + INPUT_HEIGHT + 2;
const INTERRUPTED_MARKER: &str = "[response interrupted]";

pub fn transcript_height(term_height: u16) -> u16 {
    term_height.saturating_sub(CHAT_CHROME)
}

fn plain_lines(prefix: Option<(&str, Style)>, content: &str, style: Style) -> Vec<Line<'static>> {
    let mut lines = Vec::new();
    for (idx, text) in content.split('\n').enumerate() {
        let mut spans = Vec::new();
        if idx == 0 {
            if let Some((prefix, prefix_style)) = prefix {
                spans.push(Span::styled(prefix.to_string(), prefix_style));
            }
        }
        spans.push(Span::styled(text.to_string(), style));
        lines.push(Line::from(spans));
    }
    lines
}

fn streaming_glyph(elapsed_ms: u128) -> &'static str {
    match (elapsed_ms / 250) % 4 {
        0 => "○",
        1 | 3 => "◐",
        _ => "●",
    }
}

/// Every transcript line, wrapped to `width`. The live reply is rendered
/// from its full buffer each time.
pub fn build_transcript_lines(
    session: &ChatSession,
    theme: &Theme,
    width: u16,
) -> Vec<Line<'static>> {
    let mut lines: Vec<Line<'static>> = Vec::new();

    for entry in session.transcript() {
        match entry.kind {
            TranscriptKind::User => lines.extend(plain_lines(
                Some(("You: ", theme.user_prefix_style)),
                &entry.content,
                theme.user_text_style,
            )),
            TranscriptKind::Assistant => lines.extend(render_markdown(
                &entry.content,
                theme,
                theme.assistant_text_style,
            )),
            TranscriptKind::PartialAssistant => {
                lines.extend(render_markdown(
                    &entry.content,
                    theme,
                    theme.assistant_text_style,
                ));
                lines.push(Line::from(Span::styled(
                    INTERRUPTED_MARKER,
                    theme.interrupted_marker_style,
                )));
            }
            TranscriptKind::Error => lines.extend(plain_lines(
                Some(("Error: ", theme.error_prefix_style)),
                &entry.content,
                theme.error_text_style,
            )),
            TranscriptKind::Info => {
                lines.extend(plain_lines(None, &entry.content, theme.info_text_style))
            }
        }
        lines.push(Line::default());
    }

    if let Some(live) = session.live_reply() {
        if live.is_empty() {
            lines.push(Line::from(Span::styled(
                "…",
                theme.streaming_indicator_style,
            )));
        } else {
            lines.extend(render_markdown(live, theme, theme.assistant_text_style));
        }
    }

    while lines
        .last()
        .is_some_and(|line| line.spans.iter().all(|s| s.content.is_empty()))
    {
        lines.pop();
    }

    wrap_lines(lines, usize::from(width))
}

/// How far the transcript can scroll up at the last known terminal size.
pub fn max_scroll(app: &App) -> u16 {
    let size = app.last_term_size;
    let total = build_transcript_lines(&app.session, &app.theme, size.width).len();
    let total = u16::try_from(total).unwrap_or(u16::MAX);
    total.saturating_sub(transcript_height(size.height))
}

pub fn status_line(app: &App) -> String {
    let metrics = app.session.metrics();
    let usage = if metrics.is_empty() {
        "no usage yet".to_string()
    } else {
        metrics.summary()
    };
    let mut parts = vec![
        app.session.model().to_string(),
        format!("prompt: {}", app.prompt_label),
        usage,
    ];
    if let Some(status) = &app.status {
        parts.push(status.clone());
    }
    parts.join(" · ")
}

pub fn ui(f: &mut Frame, app: &App) {
    match app.view {
        View::Chat => draw_chat(f, app),
        View::Settings => draw_settings(f, app),
    }
}

fn draw_chat(f: &mut Frame, app: &App) {
    let theme = &app.theme;
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(0),
            Constraint::Length(1),
            Constraint::Length(INPUT_HEIGHT + 2),
        ])
        .split(f.area());

    let title = format!(
        "chatstream v{} · {}",
        env!("CARGO_PKG_VERSION"),
        app.server_url
    );
    f.render_widget(Paragraph::new(title).style(theme.title_style), chunks[0]);

    let lines = build_transcript_lines(&app.session, theme, chunks[1].width);
    let total = u16::try_from(lines.len()).unwrap_or(u16::MAX);
    let max_offset = total.saturating_sub(chunks[1].height);
    let offset = max_offset.saturating_sub(app.scroll_from_bottom.min(max_offset));
    f.render_widget(Paragraph::new(lines).scroll((offset, 0)), chunks[1]);

    let mut status = vec![Span::styled(status_line(app), theme.status_style)];
    if app.session.in_flight() {
        let glyph = streaming_glyph(app.stream_started.elapsed().as_millis());
        status.insert(
            0,
            Span::styled(format!("{glyph} "), theme.streaming_indicator_style),
        );
    }
    f.render_widget(Paragraph::new(Line::from(status)), chunks[2]);

    let (border_style, input_title) = if app.session.in_flight() {
        (theme.input_disabled_border_style, "Waiting for reply (Ctrl+C to quit)")
    } else {
        (
            theme.input_border_style,
            "Message (Enter send, Alt+Enter newline, F2 settings, Ctrl+L clear, Ctrl+C quit)",
        )
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style)
        .title(input_title);
    let inner = block.inner(chunks[3]);
    f.render_widget(block, chunks[3]);
    f.render_widget(&app.input, inner);
}

fn picker_list<'a>(picker: &'a PickerState, theme: &Theme) -> List<'a> {
    let items: Vec<ListItem> = picker
        .items
        .iter()
        .map(|item| {
            let mut spans = vec![Span::raw(item.label.as_str())];
            if !item.detail.is_empty() {
                spans.push(Span::styled(
                    format!("  {}", item.detail),
                    theme.muted_style,
                ));
            }
            ListItem::new(Line::from(spans))
        })
        .collect();
    List::new(items)
        .highlight_style(theme.selection_style)
        .highlight_symbol("> ")
}

fn draw_loadable_picker<T>(
    f: &mut Frame,
    area: Rect,
    state: &Loadable<T>,
    picker: &PickerState,
    empty_message: &str,
    theme: &Theme,
) {
    let message = match state {
        Loadable::Loading => Some("Loading…".to_string()),
        Loadable::Failed(err) => Some(format!("Could not load: {err} (press r to retry)")),
        Loadable::Ready(_) if picker.is_empty() => Some(empty_message.to_string()),
        Loadable::Ready(_) => None,
    };
    match message {
        Some(message) if picker.is_empty() => {
            f.render_widget(Paragraph::new(message).style(theme.muted_style), area);
        }
        _ => {
            let mut list_state = ListState::default().with_selected(Some(picker.selected));
            f.render_stateful_widget(picker_list(picker, theme), area, &mut list_state);
        }
    }
}

fn draw_settings(f: &mut Frame, app: &App) {
    let theme = &app.theme;
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(0),
            Constraint::Length(1),
        ])
        .split(f.area());

    let tabs = Tabs::new(vec!["Models", "Prompts", "RAG"])
        .select(app.active_tab().index())
        .style(theme.title_style)
        .highlight_style(theme.active_tab_style);
    f.render_widget(tabs, chunks[0]);

    let body = Block::default().borders(Borders::TOP);
    let inner = body.inner(chunks[1]);
    f.render_widget(body, chunks[1]);

    match app.active_tab() {
        SettingsTab::Models => {
            let empty = if app.config.free_only {
                "No free models available"
            } else {
                "No models available"
            };
            draw_loadable_picker(f, inner, &app.models, &app.model_picker, empty, theme);
        }
        SettingsTab::Prompts => {
            draw_loadable_picker(f, inner, &app.prompts, &app.prompt_picker, "", theme);
        }
        SettingsTab::Rag => {
            let parts = Layout::default()
                .direction(Direction::Vertical)
                .constraints([Constraint::Length(3), Constraint::Min(0)])
                .split(inner);
            let mut list_state =
                ListState::default().with_selected(Some(app.rag_picker.selected));
            f.render_stateful_widget(
                picker_list(&app.rag_picker, theme),
                parts[0],
                &mut list_state,
            );
            f.render_widget(Paragraph::new(rag_details(app)), parts[1]);
        }
    }

    let footer = match &app.status {
        Some(status) => Paragraph::new(status.as_str()).style(theme.error_text_style),
        None => Paragraph::new(settings_help(app)).style(theme.status_style),
    };
    f.render_widget(footer, chunks[2]);
}

fn settings_help(app: &App) -> String {
    match app.active_tab() {
        SettingsTab::Rag => "Tab switch · ↑/↓ move · Enter use mode · Esc back".to_string(),
        _ => {
            let free = if app.config.free_only { "on" } else { "off" };
            format!(
                "Tab switch · ↑/↓ move · Enter select · f free only [{free}] · r reload · Esc back"
            )
        }
    }
}

/// Current retrieval store fields under the mode list.
pub fn rag_details(app: &App) -> Vec<Line<'static>> {
    let theme = &app.theme;
    let rag = &app.config.rag;
    let path = match (&rag.local_path, app.rag_path_status) {
        (Some(path), Some(status)) => {
            format!("{} ({})", path_display(path), status.message())
        }
        _ => "(unset)".to_string(),
    };
    let or_unset = |value: &Option<String>| value.clone().unwrap_or_else(|| "(unset)".to_string());
    let field = |name: &str, value: String| {
        Line::from(vec![
            Span::styled(format!("{name:<12}"), theme.muted_style),
            Span::raw(value),
        ])
    };
    vec![
        Line::default(),
        field("Local path", path),
        field("Server", format!("{}:{}", rag.server_host, rag.server_port)),
        field("Tenant", or_unset(&rag.cloud_tenant)),
        field("Database", or_unset(&rag.cloud_database)),
        field("API key", app.api_key.to_string()),
        Line::default(),
        Line::from(Span::styled(
            "Change fields with `chatstream set rag-<field> <value>`",
            theme.muted_style,
        )),
    ]
}
