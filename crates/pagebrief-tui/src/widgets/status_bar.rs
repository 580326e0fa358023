use ratatui::{
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};
use unicode_width::UnicodeWidthStr;

use crate::app::{App, Focus, Mode};

pub struct StatusBarWidget;

impl StatusBarWidget {
    /// Status line with the summarize trigger at its right edge.
    /// Records where the trigger landed for mouse hit testing.
    pub fn render(frame: &mut Frame, area: Rect, app: &mut App) {
        let theme = &app.theme;

        let status_text = if let Some(msg) = &app.status_message {
            format!(" {}", msg)
        } else {
            let mode_str = match &app.mode {
                Mode::Normal if app.focus == Focus::Input => "FIND",
                Mode::Normal => "NORMAL",
                Mode::SecretPrompt(_) => "API KEY",
                Mode::ModelPicker { .. } => "MODELS",
            };
            format!(" {} | {} ", mode_str, app.state_label())
        };

        let trigger = app
            .session
            .presentation()
            .trigger_visible()
            .then(|| app.trigger_label());
        let trigger_width = trigger.as_deref().map_or(0, UnicodeWidthStr::width) as u16;
        let help_hint = " s:summarize m:models K:reset key q:quit ";

        let used = status_text.width() as u16 + help_hint.width() as u16 + trigger_width;
        let padding_len = area.width.saturating_sub(used) as usize;

        let mut spans = vec![
            Span::styled(status_text, Style::default().fg(theme.fg0).bg(theme.bg2)),
            Span::styled(" ".repeat(padding_len), Style::default().bg(theme.bg2)),
            Span::styled(help_hint, Style::default().fg(theme.grey2).bg(theme.bg2)),
        ];

        app.trigger_area = match trigger {
            Some(label) if area.width >= used => {
                spans.push(Span::styled(
                    label,
                    Style::default()
                        .fg(theme.bg0)
                        .bg(theme.accent)
                        .add_modifier(Modifier::BOLD),
                ));
                Some(Rect::new(
                    area.x + area.width - trigger_width,
                    area.y,
                    trigger_width,
                    1,
                ))
            }
            _ => None,
        };

        frame.render_widget(Paragraph::new(Line::from(spans)), area);
    }
}
