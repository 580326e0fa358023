use ratatui::{
    layout::{Position, Rect},
    style::Style,
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};
use unicode_width::UnicodeWidthStr;

use crate::app::{App, Focus};

pub struct InputBarWidget;

impl InputBarWidget {
    pub fn render(frame: &mut Frame, area: Rect, app: &mut App) {
        let theme = &app.theme;
        let focused = app.focus == Focus::Input;

        let line = if focused || !app.input.is_empty() {
            Line::from(vec![
                Span::styled("/", Style::default().fg(theme.accent)),
                Span::styled(app.input.as_str(), Style::default().fg(theme.fg1)),
            ])
        } else {
            Line::from(Span::styled(
                "/ find in page",
                Style::default().fg(theme.grey1),
            ))
        };

        frame.render_widget(
            Paragraph::new(line).style(Style::default().bg(theme.bg1)),
            area,
        );

        if focused {
            let x = area.x + 1 + app.input.width() as u16;
            frame.set_cursor_position(Position::new(x.min(area.right().saturating_sub(1)), area.y));
        }
        app.input_area = Some(area);
    }
}
