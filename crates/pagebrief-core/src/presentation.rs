//! What the user sees: trigger, overlay and notification.
//!
//! `Presentation` owns the single overlay and the single notification
//! directly. Hosts render from it and never create surfaces of their own.

use std::time::Duration;

use tokio::time::Instant;

use crate::Error;

const LOADING_HTML: &str = "<p>Summarizing this page…</p>";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PresentationState {
    /// Not an article; no trigger
    Hidden,
    TriggerVisible,
    /// Attempt accepted, credential lookup under way
    Pending,
    /// Waiting for the user to enter the provider's API key
    Prompting { provider: String },
    Loading,
    Streaming,
    Done,
    Failed,
    Cancelled,
}

impl PresentationState {
    /// An attempt is in flight
    pub fn is_busy(&self) -> bool {
        matches!(
            self,
            Self::Pending | Self::Prompting { .. } | Self::Loading | Self::Streaming
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed | Self::Cancelled)
    }

    /// A new attempt may start from here
    pub fn can_start(&self) -> bool {
        matches!(self, Self::TriggerVisible) || self.is_terminal()
    }
}

/// Trigger rule, evaluated on every focus change
pub fn trigger_visibility(is_article: bool, editable_focused: bool) -> bool {
    is_article && !editable_focused
}

/// The one overlay surface
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Overlay {
    /// Stable for the lifetime of one overlay instance
    pub id: u64,
    pub content_html: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    Error,
    Info,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub kind: NotificationKind,
    pub text: String,
    pub expires_at: Instant,
}

/// Ways the user can close the overlay
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DismissReason {
    CloseControl,
    OutsideClick,
    Escape,
}

#[derive(Debug)]
pub struct Presentation {
    state: PresentationState,
    is_article: bool,
    editable_focused: bool,
    overlay: Option<Overlay>,
    overlays_created: u64,
    notification: Option<Notification>,
    notification_timeout: Duration,
    scroll_locked: bool,
}

impl Presentation {
    pub fn new(is_article: bool, notification_timeout: Duration) -> Self {
        Self {
            state: if is_article {
                PresentationState::TriggerVisible
            } else {
                PresentationState::Hidden
            },
            is_article,
            editable_focused: false,
            overlay: None,
            overlays_created: 0,
            notification: None,
            notification_timeout,
            scroll_locked: false,
        }
    }

    pub fn state(&self) -> &PresentationState {
        &self.state
    }

    pub fn trigger_visible(&self) -> bool {
        trigger_visibility(self.is_article, self.editable_focused)
    }

    pub fn editable_focused(&self) -> bool {
        self.editable_focused
    }

    pub fn overlay(&self) -> Option<&Overlay> {
        self.overlay.as_ref()
    }

    /// Number of overlay instances ever created
    pub fn overlays_created(&self) -> u64 {
        self.overlays_created
    }

    pub fn notification(&self) -> Option<&Notification> {
        self.notification.as_ref()
    }

    /// Background scrolling is blocked while the overlay is open
    pub fn scroll_locked(&self) -> bool {
        self.scroll_locked
    }

    pub fn focus_changed(&mut self, editable: bool) {
        if self.editable_focused != editable {
            tracing::debug!(editable, "Focus changed");
        }
        self.editable_focused = editable;
    }

    /// Open the overlay, or replace the content of the open one
    pub fn show_overlay(&mut self, html: impl Into<String>) {
        let html = html.into();
        match self.overlay.as_mut() {
            Some(overlay) => overlay.content_html = html,
            None => {
                self.overlays_created += 1;
                self.overlay = Some(Overlay {
                    id: self.overlays_created,
                    content_html: html,
                });
            }
        }
        self.scroll_locked = true;
    }

    /// Close the overlay. Returns false if none was open.
    pub fn close_overlay(&mut self, reason: DismissReason) -> bool {
        let Some(overlay) = self.overlay.take() else {
            return false;
        };
        tracing::debug!(overlay_id = overlay.id, ?reason, "Overlay closed");
        self.scroll_locked = false;
        if self.state.is_terminal() {
            self.settle();
        }
        true
    }

    /// Busy from the moment an attempt is accepted until its first event
    pub fn begin_pending(&mut self) {
        if !self.state.can_start() {
            self.ignore("pending");
            return;
        }
        self.state = PresentationState::Pending;
    }

    pub fn begin_prompting(&mut self, provider: &str) {
        if !(self.state.can_start() || self.state == PresentationState::Pending) {
            self.ignore("prompting");
            return;
        }
        self.state = PresentationState::Prompting {
            provider: provider.to_string(),
        };
    }

    pub fn begin_loading(&mut self) {
        if !(self.state.can_start()
            || matches!(self.state, PresentationState::Pending | PresentationState::Prompting { .. }))
        {
            self.ignore("loading");
            return;
        }
        self.state = PresentationState::Loading;
        self.show_overlay(LOADING_HTML);
    }

    /// Append one delta. The first delta replaces the loading text.
    pub fn append_delta(&mut self, delta: &str) {
        match self.state {
            PresentationState::Loading => {
                self.state = PresentationState::Streaming;
                self.show_overlay(delta);
            }
            PresentationState::Streaming => match self.overlay.as_mut() {
                Some(overlay) => overlay.content_html.push_str(delta),
                None => self.show_overlay(delta),
            },
            _ => self.ignore("delta"),
        }
    }

    pub fn complete(&mut self) {
        if !matches!(self.state, PresentationState::Loading | PresentationState::Streaming) {
            self.ignore("complete");
            return;
        }
        self.state = PresentationState::Done;
        if let Some(overlay) = self.overlay.as_mut() {
            let cleaned = strip_code_fence(&overlay.content_html).to_string();
            overlay.content_html = cleaned;
        }
    }

    /// Terminal failure: message into the overlay, plus a notification.
    /// A missing credential only notifies.
    pub fn fail(&mut self, error: &Error) {
        if !self.state.is_busy() {
            self.ignore("fail");
            return;
        }
        self.state = PresentationState::Failed;
        let message = error.user_message();
        if !matches!(error, Error::CredentialMissing { .. }) {
            self.show_overlay(format!("<p class=\"error\">{}</p>", escape_html(&message)));
        }
        self.notify(NotificationKind::Error, message);
    }

    /// User abort. Streamed content stays as it is; an overlay that holds
    /// no delta of this attempt yet shows the cancelled text instead.
    pub fn cancel(&mut self) {
        if !self.state.is_busy() {
            self.ignore("cancel");
            return;
        }
        let streamed = self.state == PresentationState::Streaming;
        self.state = PresentationState::Cancelled;
        if !streamed {
            if let Some(overlay) = self.overlay.as_mut() {
                overlay.content_html = cancelled_html();
            }
        }
        self.notify(NotificationKind::Info, Error::Cancelled.user_message());
    }

    /// Show `text`, replacing any visible notification and restarting its timer
    pub fn notify(&mut self, kind: NotificationKind, text: impl Into<String>) {
        self.notification = Some(Notification {
            kind,
            text: text.into(),
            expires_at: Instant::now() + self.notification_timeout,
        });
    }

    /// Expire the notification; a dismissed terminal state settles
    pub fn tick(&mut self, now: Instant) {
        if self
            .notification
            .as_ref()
            .is_some_and(|n| now >= n.expires_at)
        {
            self.notification = None;
        }
        if self.state.is_terminal() && self.overlay.is_none() && self.notification.is_none() {
            self.settle();
        }
    }

    fn settle(&mut self) {
        self.state = if self.is_article {
            PresentationState::TriggerVisible
        } else {
            PresentationState::Hidden
        };
    }

    fn ignore(&self, transition: &str) {
        tracing::debug!(state = ?self.state, transition, "Ignoring invalid transition");
    }
}

fn cancelled_html() -> String {
    format!("<p>{}</p>", escape_html(&Error::Cancelled.user_message()))
}

/// Drop a ```html fence wrapped around the whole answer
pub fn strip_code_fence(html: &str) -> &str {
    let trimmed = html.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return html;
    };
    let Some(body) = rest.strip_suffix("```") else {
        return html;
    };
    // The opening fence may carry a language tag on its own line
    match body.split_once('\n') {
        Some((tag, inner)) if !tag.contains('<') => inner.trim(),
        _ => body.trim(),
    }
}

/// [`strip_code_fence`] for text that arrives in pieces.
///
/// The start is held back until it is clear whether it opens a fence.
/// Once a fence was opened, trailing backticks and whitespace are held
/// until more text follows them or the stream ends.
#[derive(Debug, Default)]
pub struct FenceStripper {
    /// `Some(true)` once an opening fence was dropped
    fenced: Option<bool>,
    held: String,
}

impl FenceStripper {
    /// Text of `delta` that is safe to show now
    pub fn push(&mut self, delta: &str) -> String {
        self.held.push_str(delta);

        if self.fenced.is_none() && !self.decide_opening() {
            return String::new();
        }

        if self.fenced == Some(true) {
            let keep = self
                .held
                .trim_end_matches(|c: char| c == '`' || c.is_whitespace())
                .len();
            self.held.drain(..keep).collect()
        } else {
            std::mem::take(&mut self.held)
        }
    }

    /// Whatever is left at the end of the stream
    pub fn finish(&mut self) -> String {
        let rest = std::mem::take(&mut self.held);
        if self.fenced == Some(true) {
            let rest = rest.trim_end();
            rest.strip_suffix("```").unwrap_or(rest).trim_end().to_string()
        } else {
            rest
        }
    }

    /// Returns false while the held start is still ambiguous
    fn decide_opening(&mut self) -> bool {
        let start = self.held.trim_start();
        if start.is_empty() || (start.len() < 3 && "```".starts_with(start)) {
            return false;
        }
        let Some(rest) = start.strip_prefix("```") else {
            self.fenced = Some(false);
            return true;
        };

        // The opening fence may carry a language tag on its own line
        let body = match rest.split_once('\n') {
            Some((tag, inner)) if !tag.contains('<') => inner.trim_start(),
            Some(_) => rest.trim_start(),
            None if rest.contains('<') => rest,
            None => return false,
        };
        self.held = body.to_string();
        self.fenced = Some(true);
        true
    }
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
