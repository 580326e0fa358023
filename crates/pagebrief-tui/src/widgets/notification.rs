use ratatui::{
    layout::Rect,
    style::Style,
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
    Frame,
};
use unicode_width::UnicodeWidthStr;

use pagebrief_core::presentation::NotificationKind;

use crate::app::App;

const MAX_WIDTH: u16 = 48;

pub struct NotificationWidget;

impl NotificationWidget {
    /// Toast in the top-right corner
    pub fn render(frame: &mut Frame, area: Rect, app: &App) {
        let Some(notification) = app.session.presentation().notification() else {
            return;
        };
        let theme = &app.theme;

        let (title, color) = match notification.kind {
            NotificationKind::Error => (" Error ", theme.error),
            NotificationKind::Info => (" Info ", theme.info),
        };

        let text_width = (notification.text.width() as u16).clamp(10, MAX_WIDTH);
        let width = (text_width + 2).min(area.width);
        let inner_width = width.saturating_sub(2).max(1);
        let rows = (notification.text.width() as u16).div_ceil(inner_width).max(1);
        let height = (rows + 2).min(area.height);

        let toast_area = Rect::new(
            area.right().saturating_sub(width + 1),
            area.y + 1,
            width,
            height,
        );

        frame.render_widget(Clear, toast_area);
        let paragraph = Paragraph::new(notification.text.as_str())
            .wrap(Wrap { trim: true })
            .style(Style::default().fg(theme.fg1).bg(theme.bg2))
            .block(
                Block::default()
                    .title(title)
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(color)),
            );
        frame.render_widget(paragraph, toast_area);
    }
}
