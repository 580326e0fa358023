use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph},
    Frame,
};

use crate::app::ModelChoice;
use crate::theme::Theme;

pub struct PopupWidget;

impl PopupWidget {
    /// Masked API key entry
    pub fn render_secret_prompt(frame: &mut Frame, theme: &Theme, provider: &str, typed: usize) {
        let area = frame.area();

        let popup_width = 56u16.min(area.width.saturating_sub(4));
        let popup_height = 8u16.min(area.height.saturating_sub(2));
        let popup_area = centered_rect(popup_width, popup_height, area);

        frame.render_widget(Clear, popup_area);

        let block = Block::default()
            .title(format!(" {} API key ", provider))
            .title_alignment(Alignment::Center)
            .borders(Borders::ALL)
            .border_style(Style::default().fg(theme.warning))
            .style(Style::default().bg(theme.bg1));

        let inner_area = block.inner(popup_area);
        frame.render_widget(block, popup_area);

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(2), // Message
                Constraint::Length(1), // Masked input
                Constraint::Length(1), // Spacer
                Constraint::Length(1), // Hint
            ])
            .split(inner_area);

        let message = Paragraph::new(Line::from(Span::styled(
            format!("Enter your {} API key to summarize this page.", provider),
            Style::default().fg(theme.fg0),
        )))
        .alignment(Alignment::Center);
        frame.render_widget(message, chunks[0]);

        let max_dots = usize::from(inner_area.width.saturating_sub(4));
        let masked = format!("{}▏", "•".repeat(typed.min(max_dots)));
        let input = Paragraph::new(Line::from(Span::styled(
            masked,
            Style::default().fg(theme.fg1).add_modifier(Modifier::BOLD),
        )))
        .alignment(Alignment::Center);
        frame.render_widget(input, chunks[1]);

        let hint = Paragraph::new(Line::from(vec![
            Span::styled("Enter", Style::default().fg(theme.success).add_modifier(Modifier::BOLD)),
            Span::styled(":save  ", Style::default().fg(theme.grey1)),
            Span::styled("Esc", Style::default().fg(theme.error).add_modifier(Modifier::BOLD)),
            Span::styled(":dismiss", Style::default().fg(theme.grey1)),
        ]))
        .alignment(Alignment::Center);
        frame.render_widget(hint, chunks[3]);
    }

    /// Model list, the active one marked
    pub fn render_model_picker(
        frame: &mut Frame,
        theme: &Theme,
        choices: &[ModelChoice],
        selected: usize,
        active: &str,
    ) {
        let area = frame.area();

        let popup_width = 50u16.min(area.width.saturating_sub(4));
        let popup_height = (choices.len() as u16 + 2).min(area.height.saturating_sub(2));
        let popup_area = centered_rect(popup_width, popup_height, area);

        frame.render_widget(Clear, popup_area);

        let items: Vec<ListItem> = choices
            .iter()
            .map(|choice| {
                let marker = if choice.model == active { "● " } else { "  " };
                ListItem::new(Line::from(vec![
                    Span::styled(marker, Style::default().fg(theme.accent)),
                    Span::styled(choice.model.clone(), Style::default().fg(theme.fg1)),
                    Span::styled(format!("  {}", choice.provider), Style::default().fg(theme.grey1)),
                ]))
            })
            .collect();

        let list = List::new(items)
            .block(
                Block::default()
                    .title(" Summarize with ")
                    .title_alignment(Alignment::Center)
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(theme.accent))
                    .style(Style::default().bg(theme.bg1)),
            )
            .highlight_style(Style::default().bg(theme.bg2).add_modifier(Modifier::BOLD));

        let mut state = ListState::default().with_selected(Some(selected));
        frame.render_stateful_widget(list, popup_area, &mut state);
    }
}

/// Helper function to create a centered rect
pub fn centered_rect(width: u16, height: u16, area: Rect) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    let x = area.x + (area.width.saturating_sub(width)) / 2;
    let y = area.y + (area.height.saturating_sub(height)) / 2;
    Rect::new(x, y, width, height)
}
