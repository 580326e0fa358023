mod input_bar;
mod notification;
mod overlay;
mod page;
mod popup;
mod status_bar;

pub use input_bar::InputBarWidget;
pub use notification::NotificationWidget;
pub use overlay::OverlayWidget;
pub use page::PageWidget;
pub use popup::{centered_rect, PopupWidget};
pub use status_bar::StatusBarWidget;

/// Render HTML as plain text lines wrapped to `width` columns
pub fn html_to_lines(html: &str, width: u16) -> Vec<String> {
    let width = usize::from(width.max(10));
    match html2text::from_read(html.as_bytes(), width) {
        Ok(text) => text.lines().map(str::to_string).collect(),
        Err(e) => {
            tracing::debug!(error = %e, "HTML rendering failed, showing raw markup");
            html.lines().map(str::to_string).collect()
        }
    }
}
