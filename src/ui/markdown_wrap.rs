use ratatui::style::Style;
use ratatui::text::{Line, Span};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

/// Split text into alternating whitespace and non-whitespace runs.
fn tokens(text: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut start = 0usize;
    let mut in_space: Option<bool> = None;
    for (idx, ch) in text.char_indices() {
        let space = ch.is_whitespace();
        if in_space.is_some_and(|prev| prev != space) {
            out.push(&text[start..idx]);
            start = idx;
        }
        in_space = Some(space);
    }
    if start < text.len() {
        out.push(&text[start..]);
    }
    out
}

fn line_width(line: &Line<'_>) -> usize {
    line.spans
        .iter()
        .map(|span| UnicodeWidthStr::width(span.content.as_ref()))
        .sum()
}

struct LineBuilder {
    max_width: usize,
    lines: Vec<Line<'static>>,
    current: Vec<Span<'static>>,
    width: usize,
}

impl LineBuilder {
    fn push(&mut self, text: &str, style: Style) {
        if text.is_empty() {
            return;
        }
        self.width += UnicodeWidthStr::width(text);
        match self.current.last_mut() {
            Some(last) if last.style == style => last.content.to_mut().push_str(text),
            _ => self.current.push(Span::styled(text.to_string(), style)),
        }
    }

    fn break_line(&mut self) {
        while let Some(last) = self.current.last_mut() {
            let kept = last.content.trim_end().len();
            if kept == 0 {
                self.current.pop();
                continue;
            }
            last.content.to_mut().truncate(kept);
            break;
        }
        self.lines.push(Line::from(std::mem::take(&mut self.current)));
        self.width = 0;
    }

    fn remaining(&self) -> usize {
        self.max_width.saturating_sub(self.width)
    }

    /// Hard-split a token wider than the whole line.
    fn push_split(&mut self, token: &str, style: Style) {
        let mut chunk = String::new();
        let mut chunk_width = 0usize;
        for ch in token.chars() {
            let cw = UnicodeWidthChar::width(ch).unwrap_or(0);
            if chunk_width + cw > self.remaining() && (chunk_width > 0 || self.width > 0) {
                self.push(&chunk, style);
                self.break_line();
                chunk.clear();
                chunk_width = 0;
            }
            chunk.push(ch);
            chunk_width += cw;
        }
        self.push(&chunk, style);
    }
}

/// Wrap styled lines to `max_width` columns at word boundaries.
///
/// Lines that already fit are returned untouched. Whitespace at a wrap point
/// is dropped so continuation lines start with text.
pub(crate) fn wrap_lines(lines: Vec<Line<'static>>, max_width: usize) -> Vec<Line<'static>> {
    if max_width == 0 {
        return lines;
    }
    let mut builder = LineBuilder {
        max_width,
        lines: Vec::with_capacity(lines.len()),
        current: Vec::new(),
        width: 0,
    };
    for line in lines {
        if line_width(&line) <= max_width {
            builder.lines.push(line);
            continue;
        }
        let mut wrapped = false;
        for span in &line.spans {
            for token in tokens(span.content.as_ref()) {
                let token_width = UnicodeWidthStr::width(token);
                let is_space = token.starts_with(char::is_whitespace);
                if token_width <= builder.remaining() {
                    if !(is_space && wrapped && builder.width == 0) {
                        builder.push(token, span.style);
                    }
                    continue;
                }
                if is_space {
                    builder.break_line();
                    wrapped = true;
                    continue;
                }
                if builder.width > 0 && token_width <= max_width {
                    builder.break_line();
                    wrapped = true;
                    builder.push(token, span.style);
                } else {
                    builder.push_split(token, span.style);
                    wrapped = true;
                }
            }
        }
        if !builder.current.is_empty() {
            builder.break_line();
        }
    }
    builder.lines
}
