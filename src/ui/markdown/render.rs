use std::mem;

use pulldown_cmark::{CodeBlockKind, Event, Options, Parser, Tag, TagEnd};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};

use crate::ui::theme::Theme;

const RULE_WIDTH: usize = 24;
const CODE_INDENT: &str = "  ";
const LIST_INDENT: &str = "  ";

fn detab(text: &str) -> String {
    text.replace('\t', "    ")
}

fn is_blank(line: &Line<'_>) -> bool {
    line.spans.iter().all(|span| span.content.trim().is_empty())
}

pub(super) struct MarkdownRenderer<'a> {
    content: &'a str,
    theme: &'a Theme,
    lines: Vec<Line<'static>>,
    current: Vec<Span<'static>>,
    style_stack: Vec<Style>,
    /// One entry per open list: the next ordinal for ordered lists.
    list_stack: Vec<Option<u64>>,
    pending_marker: Option<String>,
    quote_depth: usize,
    code_block: Option<String>,
    /// Open links/images: destination and the text shown so far.
    link_stack: Vec<(String, String)>,
    /// Cells already emitted on the current table row.
    table_cell: usize,
}

impl<'a> MarkdownRenderer<'a> {
    pub(super) fn new(content: &'a str, theme: &'a Theme, base_style: Style) -> Self {
        Self {
            content,
            theme,
            lines: Vec::new(),
            current: Vec::new(),
            style_stack: vec![base_style],
            list_stack: Vec::new(),
            pending_marker: None,
            quote_depth: 0,
            code_block: None,
            link_stack: Vec::new(),
            table_cell: 0,
        }
    }

    fn style(&self) -> Style {
        self.style_stack.last().copied().unwrap_or_default()
    }

    fn push_style(&mut self, patch: Style) {
        let style = self.style().patch(patch);
        self.style_stack.push(style);
    }

    fn pop_style(&mut self) {
        if self.style_stack.len() > 1 {
            self.style_stack.pop();
        }
    }

    /// Quote bars and list indentation that open every rendered line.
    fn push_line_prefix(&mut self) {
        if self.quote_depth > 0 {
            self.current.push(Span::styled(
                "│ ".repeat(self.quote_depth),
                self.theme.quote_style,
            ));
        }
        if self.list_stack.is_empty() {
            return;
        }
        let depth = self.list_stack.len();
        match self.pending_marker.take() {
            Some(marker) => {
                if depth > 1 {
                    self.current.push(Span::raw(LIST_INDENT.repeat(depth - 1)));
                }
                self.current
                    .push(Span::styled(marker, self.theme.list_marker_style));
            }
            None => self.current.push(Span::raw(LIST_INDENT.repeat(depth))),
        }
    }

    fn push_span(&mut self, text: String, style: Style) {
        if text.is_empty() {
            return;
        }
        if self.current.is_empty() {
            self.push_line_prefix();
        }
        self.current.push(Span::styled(text, style));
    }

    fn push_text(&mut self, text: &str) {
        if let Some((_, shown)) = self.link_stack.last_mut() {
            shown.push_str(text);
        }
        let style = self.style();
        self.push_span(detab(text), style);
    }

    fn flush(&mut self) {
        if !self.current.is_empty() {
            self.lines.push(Line::from(mem::take(&mut self.current)));
        }
    }

    fn push_blank(&mut self) {
        self.flush();
        if self.lines.last().is_some_and(|line| !is_blank(line)) {
            self.lines.push(Line::default());
        }
    }

    fn finish_code_block(&mut self) {
        let Some(code) = self.code_block.take() else {
            return;
        };
        let style = self.theme.code_block_style;
        for line in code.trim_end_matches('\n').split('\n') {
            self.push_line_prefix();
            self.current
                .push(Span::styled(format!("{CODE_INDENT}{}", detab(line)), style));
            self.flush();
        }
        self.push_blank();
    }

    fn start_item(&mut self) {
        self.flush();
        let marker = match self.list_stack.last_mut() {
            Some(Some(next)) => {
                let marker = format!("{next}. ");
                *next += 1;
                marker
            }
            _ => "• ".to_string(),
        };
        self.pending_marker = Some(marker);
    }

    fn end_link(&mut self) {
        self.pop_style();
        if let Some((url, shown)) = self.link_stack.pop() {
            if !url.is_empty() && url != shown {
                self.push_span(format!(" ({url})"), self.theme.muted_style);
            }
        }
    }

    pub(super) fn render(mut self) -> Vec<Line<'static>> {
        let mut options = Options::empty();
        options.insert(Options::ENABLE_STRIKETHROUGH);
        options.insert(Options::ENABLE_TABLES);
        options.insert(Options::ENABLE_TASKLISTS);
        options.insert(Options::ENABLE_FOOTNOTES);
        let parser = Parser::new_ext(self.content, options);

        for event in parser {
            match event {
                Event::Start(tag) => match tag {
                    Tag::Heading { level, .. } => {
                        self.flush();
                        self.push_style(self.theme.heading_style);
                        let hashes = "#".repeat(level as usize);
                        let style = self.style();
                        self.push_span(format!("{hashes} "), style);
                    }
                    Tag::BlockQuote(_) => {
                        self.flush();
                        self.quote_depth += 1;
                        self.push_style(self.theme.quote_style);
                    }
                    Tag::CodeBlock(kind) => {
                        self.flush();
                        if let CodeBlockKind::Fenced(lang) = &kind {
                            let lang = lang.split_whitespace().next().unwrap_or_default();
                            if !lang.is_empty() {
                                self.push_span(lang.to_string(), self.theme.muted_style);
                                self.flush();
                            }
                        }
                        self.code_block = Some(String::new());
                    }
                    Tag::List(start) => {
                        self.flush();
                        self.list_stack.push(start);
                    }
                    Tag::Item => self.start_item(),
                    Tag::Emphasis => self.push_style(Style::default().add_modifier(Modifier::ITALIC)),
                    Tag::Strong => self.push_style(Style::default().add_modifier(Modifier::BOLD)),
                    Tag::Strikethrough => {
                        self.push_style(Style::default().add_modifier(Modifier::CROSSED_OUT))
                    }
                    Tag::Link { dest_url, .. } | Tag::Image { dest_url, .. } => {
                        self.push_style(self.theme.link_style);
                        self.link_stack.push((dest_url.to_string(), String::new()));
                    }
                    Tag::Table(_) => self.flush(),
                    Tag::TableHead => {
                        self.table_cell = 0;
                        self.push_style(Style::default().add_modifier(Modifier::BOLD));
                    }
                    Tag::TableRow => self.table_cell = 0,
                    Tag::TableCell => {
                        if self.table_cell > 0 {
                            self.push_span(" │ ".to_string(), self.theme.muted_style);
                        }
                        self.table_cell += 1;
                    }
                    _ => {}
                },
                Event::End(tag_end) => match tag_end {
                    TagEnd::Paragraph => {
                        self.flush();
                        if self.list_stack.is_empty() {
                            self.push_blank();
                        }
                    }
                    TagEnd::Heading(_) => {
                        self.push_blank();
                        self.pop_style();
                    }
                    TagEnd::BlockQuote(_) => {
                        self.flush();
                        self.quote_depth = self.quote_depth.saturating_sub(1);
                        self.pop_style();
                        if self.quote_depth == 0 {
                            self.push_blank();
                        }
                    }
                    TagEnd::CodeBlock => self.finish_code_block(),
                    TagEnd::List(_) => {
                        self.flush();
                        self.list_stack.pop();
                        if self.list_stack.is_empty() {
                            self.push_blank();
                        }
                    }
                    TagEnd::Item => {
                        self.flush();
                        self.pending_marker = None;
                    }
                    TagEnd::Emphasis | TagEnd::Strong | TagEnd::Strikethrough => self.pop_style(),
                    TagEnd::Link | TagEnd::Image => self.end_link(),
                    TagEnd::TableHead => {
                        self.pop_style();
                        self.flush();
                    }
                    TagEnd::TableRow => self.flush(),
                    TagEnd::Table => self.push_blank(),
                    _ => {}
                },
                Event::Text(text) => match self.code_block.as_mut() {
                    Some(code) => code.push_str(&text),
                    None => self.push_text(&text),
                },
                Event::Code(code) => {
                    if let Some((_, shown)) = self.link_stack.last_mut() {
                        shown.push_str(&code);
                    }
                    self.push_span(detab(&code), self.theme.inline_code_style);
                }
                Event::InlineMath(math) | Event::DisplayMath(math) => {
                    self.push_span(detab(&math), self.theme.inline_code_style);
                }
                Event::SoftBreak | Event::HardBreak => self.flush(),
                Event::Rule => {
                    self.flush();
                    self.push_span("─".repeat(RULE_WIDTH), self.theme.rule_style);
                    self.push_blank();
                }
                Event::TaskListMarker(checked) => {
                    let marker = if checked { "[x] " } else { "[ ] " };
                    self.push_span(marker.to_string(), self.theme.list_marker_style);
                }
                Event::Html(html) => {
                    for line in html.lines() {
                        self.push_span(detab(line), self.theme.muted_style);
                        self.flush();
                    }
                }
                Event::InlineHtml(html) => {
                    self.push_span(html.to_string(), self.theme.muted_style);
                }
                Event::FootnoteReference(name) => {
                    self.push_span(format!("[^{name}]"), self.theme.muted_style);
                }
            }
        }

        // An unterminated fence while streaming still shows its body.
        self.finish_code_block();
        self.flush();
        while self.lines.last().is_some_and(is_blank) {
            self.lines.pop();
        }
        self.lines
    }
}
