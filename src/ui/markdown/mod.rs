//! Markdown to terminal lines.
//!
//! Replies are re-rendered from their full accumulated text on every update,
//! so a construct split across chunks (an opening `**`, a half-written fence)
//! resolves itself once the rest arrives.

mod render;
#[path = "../markdown_wrap.rs"]
mod wrap;


use ratatui::style::Style;
use ratatui::text::Line;

use crate::ui::theme::Theme;

pub(crate) use wrap::wrap_lines;

/// Render markdown `content` into styled lines, unwrapped.
pub fn render_markdown(content: &str, theme: &Theme, base_style: Style) -> Vec<Line<'static>> {
    render::MarkdownRenderer::new(content, theme, base_style).render()
}

/// Render markdown and wrap the result to `width` columns.
pub fn render_markdown_wrapped(
    content: &str,
    theme: &Theme,
    base_style: Style,
    width: usize,
) -> Vec<Line<'static>> {
    wrap_lines(render_markdown(content, theme, base_style), width)
}
