use ratatui::{
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

use super::html_to_lines;
use crate::app::{App, Focus};

pub struct PageWidget;

impl PageWidget {
    pub fn render(frame: &mut Frame, area: Rect, app: &mut App) {
        let theme = &app.theme;
        let border_style = if app.focus == Focus::Page {
            Style::default().fg(theme.accent)
        } else {
            Style::default().fg(theme.grey1)
        };

        let block = Block::default()
            .title(Span::styled(
                format!(" {} ", app.page_title),
                Style::default().fg(theme.fg1).add_modifier(Modifier::BOLD),
            ))
            .title_bottom(Line::from(format!(" {} ", app.source)).right_aligned())
            .borders(Borders::ALL)
            .border_style(border_style)
            .style(Style::default().bg(theme.bg0));

        let inner_area = block.inner(area);
        frame.render_widget(block, area);

        // Re-wrap only when the width changes
        let text_width = inner_area.width.saturating_sub(1);
        if app.page_width != text_width || app.page_lines.is_empty() {
            app.page_lines = html_to_lines(&app.page_html, text_width);
            app.page_width = text_width;
        }

        let max_scroll = app
            .page_lines
            .len()
            .saturating_sub(usize::from(inner_area.height))
            .min(u16::MAX as usize) as u16;
        app.page_scroll = app.page_scroll.min(max_scroll);

        let lines: Vec<Line> = app
            .page_lines
            .iter()
            .map(|l| Line::from(Span::styled(l.as_str(), Style::default().fg(app.theme.fg0))))
            .collect();

        let paragraph = Paragraph::new(lines).scroll((app.page_scroll, 0));
        frame.render_widget(paragraph, inner_area);
    }
}
