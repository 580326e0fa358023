use ratatui::{
    layout::{Alignment, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
    Frame,
};

use pagebrief_core::presentation::PresentationState;

use super::{centered_rect, html_to_lines};
use crate::app::App;

const CLOSE_LABEL: &str = "[x]";

pub struct OverlayWidget;

impl OverlayWidget {
    /// Summary overlay over the page. Records its own area and the close
    /// control's for mouse hit testing.
    pub fn render(frame: &mut Frame, area: Rect, app: &mut App) {
        let Some(overlay) = app.session.presentation().overlay() else {
            app.overlay_area = None;
            app.overlay_close_area = None;
            return;
        };
        let theme = &app.theme;

        let width = (area.width * 7 / 10).max(30).min(area.width);
        let height = (area.height * 7 / 10).max(8).min(area.height);
        let overlay_area = centered_rect(width, height, area);

        frame.render_widget(Clear, overlay_area);

        let state = app.session.presentation().state();
        let border_color = match state {
            PresentationState::Failed => theme.error,
            PresentationState::Cancelled => theme.warning,
            _ => theme.accent,
        };
        let hint = match state {
            PresentationState::Pending | PresentationState::Loading | PresentationState::Streaming => {
                " c:cancel  Esc:close "
            }
            _ => " j/k:scroll  Esc:close ",
        };

        let block = Block::default()
            .title(Span::styled(
                format!(" Summary · {} ", app.session.active_model()),
                Style::default().fg(theme.fg1).add_modifier(Modifier::BOLD),
            ))
            .title(
                Line::from(Span::styled(CLOSE_LABEL, Style::default().fg(theme.error)))
                    .right_aligned(),
            )
            .title_bottom(Line::from(Span::styled(hint, Style::default().fg(theme.grey1))))
            .title_alignment(Alignment::Left)
            .borders(Borders::ALL)
            .border_style(Style::default().fg(border_color))
            .style(Style::default().bg(theme.bg1));

        let inner_area = block.inner(overlay_area);
        let lines = html_to_lines(&overlay.content_html, inner_area.width.saturating_sub(1));
        frame.render_widget(block, overlay_area);

        let max_scroll = lines
            .len()
            .saturating_sub(usize::from(inner_area.height))
            .min(u16::MAX as usize) as u16;
        let scroll = app.overlay_scroll.min(max_scroll);

        let text: Vec<Line> = lines
            .into_iter()
            .map(|l| Line::from(Span::styled(l, Style::default().fg(theme.fg0))))
            .collect();
        frame.render_widget(Paragraph::new(text).scroll((scroll, 0)), inner_area);

        app.overlay_scroll = scroll;
        app.overlay_area = Some(overlay_area);
        app.overlay_close_area = Some(Rect::new(
            overlay_area.right().saturating_sub(CLOSE_LABEL.len() as u16 + 1),
            overlay_area.y,
            CLOSE_LABEL.len() as u16,
            1,
        ));
    }
}
