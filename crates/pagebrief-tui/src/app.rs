use std::sync::Arc;
use std::time::Duration;

use ratatui::layout::{Position, Rect};
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;

use pagebrief_core::presentation::{DismissReason, NotificationKind, PresentationState};
use pagebrief_core::{AppConfig, Error, SessionController, TriggerSource};

use crate::event::ResetResult;
use crate::prompt::PromptRequest;
use crate::theme::Theme;

/// Where keyboard input goes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    Page,
    /// The input bar, the page's editable element
    Input,
}

/// API key entry modal
#[derive(Debug)]
pub struct SecretEntry {
    pub provider: String,
    pub input: String,
    reply: Option<oneshot::Sender<Option<String>>>,
}

impl SecretEntry {
    fn answer(&mut self, value: Option<String>) {
        if let Some(reply) = self.reply.take() {
            // The asking task may have been cancelled meanwhile
            let _ = reply.send(value);
        }
    }

    /// The task that asked has gone away
    fn is_abandoned(&self) -> bool {
        self.reply.as_ref().map_or(true, |r| r.is_closed())
    }
}

/// Application mode
#[derive(Debug)]
pub enum Mode {
    Normal,
    SecretPrompt(SecretEntry),
    ModelPicker { selected: usize },
}

/// One row of the model picker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelChoice {
    pub provider: String,
    pub model: String,
}

/// Application state
pub struct App {
    /// Application configuration
    pub config: Arc<AppConfig>,
    pub theme: Theme,
    /// Summarization session for the loaded page
    pub session: SessionController,
    /// URL or path the page was loaded from
    pub source: String,
    pub page_title: String,
    pub page_html: String,
    /// Page text wrapped for the last rendered width
    pub page_lines: Vec<String>,
    pub page_width: u16,
    pub focus: Focus,
    pub mode: Mode,
    /// Input bar contents
    pub input: String,
    pub page_scroll: u16,
    pub overlay_scroll: u16,
    /// Whether the app should quit
    pub should_quit: bool,
    /// Status message
    pub status_message: Option<String>,
    // Hit areas recorded by the last render
    pub trigger_area: Option<Rect>,
    pub input_area: Option<Rect>,
    pub overlay_area: Option<Rect>,
    pub overlay_close_area: Option<Rect>,
    /// First click on the trigger, waiting to see if a second follows
    pending_click: Option<Instant>,
    prompt_rx: mpsc::UnboundedReceiver<PromptRequest>,
    reset_tx: mpsc::UnboundedSender<ResetResult>,
    reset_rx: mpsc::UnboundedReceiver<ResetResult>,
}

impl App {
    pub fn new(
        config: Arc<AppConfig>,
        session: SessionController,
        prompt_rx: mpsc::UnboundedReceiver<PromptRequest>,
        source: impl Into<String>,
        page_html: impl Into<String>,
    ) -> Self {
        let (reset_tx, reset_rx) = mpsc::unbounded_channel();
        let page_title = match session.article().title.trim() {
            "" => "Untitled page".to_string(),
            title => title.to_string(),
        };

        Self {
            config,
            theme: Theme::default(),
            session,
            source: source.into(),
            page_title,
            page_html: page_html.into(),
            page_lines: Vec::new(),
            page_width: 0,
            focus: Focus::Page,
            mode: Mode::Normal,
            input: String::new(),
            page_scroll: 0,
            overlay_scroll: 0,
            should_quit: false,
            status_message: None,
            trigger_area: None,
            input_area: None,
            overlay_area: None,
            overlay_close_area: None,
            pending_click: None,
            prompt_rx,
            reset_tx,
            reset_rx,
        }
    }

    /// Set a status message
    pub fn set_status(&mut self, message: impl Into<String>) {
        self.status_message = Some(message.into());
    }

    /// Clear the status message
    pub fn clear_status(&mut self) {
        self.status_message = None;
    }

    pub fn trigger_label(&self) -> String {
        format!("[ ✦ Summarize ({}) ]", self.session.active_model())
    }

    pub fn focus_input(&mut self) {
        if !matches!(self.mode, Mode::Normal) {
            return;
        }
        self.focus = Focus::Input;
        self.session.focus_changed(true);
    }

    pub fn leave_input(&mut self) {
        self.focus = Focus::Page;
        self.session.focus_changed(false);
    }

    /// Enter in the input bar: find the text in the page
    pub fn submit_input(&mut self) {
        let query = self.input.trim().to_lowercase();
        self.leave_input();
        if query.is_empty() {
            return;
        }

        match self
            .page_lines
            .iter()
            .position(|line| line.to_lowercase().contains(&query))
        {
            Some(idx) => {
                if !self.session.presentation().scroll_locked() {
                    self.page_scroll = idx.min(u16::MAX as usize) as u16;
                }
                self.clear_status();
            }
            None => self.set_status(format!("Not found: {}", self.input.trim())),
        }
    }

    pub fn summarize(&mut self, source: TriggerSource) {
        self.start_summary(source, None);
    }

    fn start_summary(&mut self, source: TriggerSource, model: Option<&str>) {
        self.pending_click = None;
        match self.session.summarize(source, model) {
            Ok(Some(_)) => {
                self.overlay_scroll = 0;
                self.clear_status();
            }
            Ok(None) => {}
            // The session already told the user
            Err(Error::Busy) => {}
            Err(e) => self.session.notify_error(&e),
        }
    }

    pub fn cancel(&mut self) {
        if !self.session.cancel() {
            self.set_status("Nothing to cancel");
        }
    }

    pub fn close_overlay(&mut self, reason: DismissReason) {
        if self.session.close_overlay(reason) {
            self.overlay_scroll = 0;
            self.overlay_area = None;
            self.overlay_close_area = None;
        }
    }

    pub fn scroll_down(&mut self, lines: u16) {
        if self.session.presentation().overlay().is_some() {
            self.overlay_scroll = self.overlay_scroll.saturating_add(lines);
        } else if !self.session.presentation().scroll_locked() {
            let max = self.page_lines.len().saturating_sub(1).min(u16::MAX as usize) as u16;
            self.page_scroll = self.page_scroll.saturating_add(lines).min(max);
        }
    }

    pub fn scroll_up(&mut self, lines: u16) {
        if self.session.presentation().overlay().is_some() {
            self.overlay_scroll = self.overlay_scroll.saturating_sub(lines);
        } else if !self.session.presentation().scroll_locked() {
            self.page_scroll = self.page_scroll.saturating_sub(lines);
        }
    }

    /// Every model of every provider, in catalog order
    pub fn model_choices(&self) -> Vec<ModelChoice> {
        self.session
            .registry()
            .models()
            .map(|(provider, model)| ModelChoice {
                provider: provider.display_name.clone(),
                model: model.to_string(),
            })
            .collect()
    }

    pub fn open_model_picker(&mut self) {
        if !matches!(self.mode, Mode::Normal) {
            return;
        }
        let active = self.session.active_model().to_string();
        let selected = self
            .model_choices()
            .iter()
            .position(|c| c.model == active)
            .unwrap_or(0);
        self.mode = Mode::ModelPicker { selected };
    }

    pub fn picker_move(&mut self, down: bool) {
        let count = self.model_choices().len();
        if let Mode::ModelPicker { selected } = &mut self.mode {
            if down {
                *selected = (*selected + 1).min(count.saturating_sub(1));
            } else {
                *selected = selected.saturating_sub(1);
            }
        }
    }

    /// Make the highlighted model active and summarize with it
    pub fn picker_confirm(&mut self) {
        let Mode::ModelPicker { selected } = self.mode else {
            return;
        };
        self.mode = Mode::Normal;

        let Some(choice) = self.model_choices().into_iter().nth(selected) else {
            return;
        };
        if let Err(e) = self.session.set_active_model(&choice.model) {
            self.session.notify_error(&e);
            return;
        }
        self.start_summary(TriggerSource::Button, None);
    }

    pub fn close_modal(&mut self) {
        if let Mode::SecretPrompt(entry) = &mut self.mode {
            entry.answer(None);
        }
        self.mode = Mode::Normal;
    }

    fn open_secret_prompt(&mut self, request: PromptRequest) {
        if matches!(self.mode, Mode::SecretPrompt(_)) {
            // One modal at a time; the newcomer is dismissed
            let _ = request.reply.send(None);
            return;
        }
        if self.focus == Focus::Input {
            self.leave_input();
        }
        self.mode = Mode::SecretPrompt(SecretEntry {
            provider: request.provider,
            input: String::new(),
            reply: Some(request.reply),
        });
    }

    pub fn secret_input_char(&mut self, c: char) {
        if let Mode::SecretPrompt(entry) = &mut self.mode {
            entry.input.push(c);
        }
    }

    pub fn secret_backspace(&mut self) {
        if let Mode::SecretPrompt(entry) = &mut self.mode {
            entry.input.pop();
        }
    }

    pub fn secret_submit(&mut self) {
        if let Mode::SecretPrompt(entry) = &mut self.mode {
            let value = std::mem::take(&mut entry.input);
            entry.answer(Some(value));
        }
        self.mode = Mode::Normal;
    }

    /// A click on the trigger. The first click waits out the double-click
    /// window; a second one inside it resets the key instead.
    pub fn click_trigger(&mut self, now: Instant) {
        let window = Duration::from_millis(self.config.ui.double_click_ms);
        match self.pending_click.take() {
            Some(first) if now.duration_since(first) <= window => self.request_key_reset(),
            _ => self.pending_click = Some(now),
        }
    }

    /// Re-prompt for the active provider's key in the background
    pub fn request_key_reset(&mut self) {
        let (provider_id, provider) = match self.session.registry().resolve(self.session.active_model()) {
            Ok(descriptor) => (descriptor.id.clone(), descriptor.display_name.clone()),
            Err(e) => {
                self.session.notify_error(&e);
                return;
            }
        };

        match self.session.reset_credential(&provider_id) {
            Ok(reset) => {
                let tx = self.reset_tx.clone();
                tokio::spawn(async move {
                    let result = match reset.await {
                        Ok(true) => ResetResult::Stored { provider },
                        Ok(false) => ResetResult::Declined { provider },
                        Err(e) => {
                            tracing::warn!(provider = %provider_id, error = %e, "API key reset failed");
                            ResetResult::Failure {
                                provider,
                                error: e.user_message(),
                            }
                        }
                    };
                    let _ = tx.send(result);
                });
            }
            Err(e) => self.session.notify_error(&e),
        }
    }

    /// Mouse button press at a terminal cell
    pub fn click_at(&mut self, column: u16, row: u16, now: Instant) {
        if !matches!(self.mode, Mode::Normal) {
            return;
        }
        let position = Position::new(column, row);
        let hit = |area: Option<Rect>| area.is_some_and(|a| a.contains(position));

        if self.session.presentation().overlay().is_some() {
            if hit(self.overlay_close_area) {
                self.close_overlay(DismissReason::CloseControl);
            } else if !hit(self.overlay_area) {
                self.close_overlay(DismissReason::OutsideClick);
            }
            return;
        }

        if hit(self.input_area) {
            self.focus_input();
            return;
        }
        if self.focus == Focus::Input {
            self.leave_input();
        }
        if self.session.presentation().trigger_visible() && hit(self.trigger_area) {
            self.click_trigger(now);
        }
    }

    /// Apply background progress; called once per loop iteration
    pub fn update(&mut self, now: Instant) {
        self.session.drain_events();

        while let Ok(request) = self.prompt_rx.try_recv() {
            self.open_secret_prompt(request);
        }

        if let Mode::SecretPrompt(entry) = &self.mode {
            if entry.is_abandoned() {
                self.mode = Mode::Normal;
            }
        }

        while let Ok(result) = self.reset_rx.try_recv() {
            self.handle_reset_result(result);
        }

        let window = Duration::from_millis(self.config.ui.double_click_ms);
        if self
            .pending_click
            .is_some_and(|first| now.duration_since(first) > window)
        {
            self.summarize(TriggerSource::Button);
        }

        self.session.tick(now);
    }

    fn handle_reset_result(&mut self, result: ResetResult) {
        match result {
            ResetResult::Stored { provider } => {
                self.session.notify_info(format!("API key for {provider} saved."));
            }
            ResetResult::Declined { provider } => {
                self.session
                    .notify_info(format!("API key for {provider} left unchanged."));
            }
            ResetResult::Failure { provider, error } => {
                self.session.notify(
                    NotificationKind::Error,
                    format!("Could not reset the {provider} API key: {error}"),
                );
            }
        }
    }

    /// Short label for the current presentation state
    pub fn state_label(&self) -> &'static str {
        match self.session.presentation().state() {
            PresentationState::Hidden => "not an article",
            PresentationState::TriggerVisible => "ready",
            PresentationState::Pending => "starting",
            PresentationState::Prompting { .. } => "waiting for API key",
            PresentationState::Loading => "loading",
            PresentationState::Streaming => "streaming",
            PresentationState::Done => "done",
            PresentationState::Failed => "failed",
            PresentationState::Cancelled => "cancelled",
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::HashMap;

    use pagebrief_core::credentials::{CredentialStore, MemorySecretStore};
    use pagebrief_core::dispatcher::{Dispatcher, ReqwestTransport};
    use pagebrief_core::providers::ProviderRegistry;
    use pagebrief_core::{ArticleCandidate, SessionDeps};

    use crate::prompt::TuiSecretPrompt;

    /// App around a session whose provider endpoint refuses connections
    pub(crate) fn test_app(is_article: bool) -> (App, CredentialStore) {
        let (prompt, prompt_rx) = TuiSecretPrompt::channel();
        let credentials = CredentialStore::new(Arc::new(MemorySecretStore::default()), Arc::new(prompt));
        let registry = ProviderRegistry::with_endpoint_overrides(&HashMap::from([(
            "openai".to_string(),
            "http://127.0.0.1:9/v1/chat/completions".to_string(),
        )]));
        let deps = SessionDeps {
            dispatcher: Dispatcher::new(
                Arc::new(registry),
                Arc::new(ReqwestTransport::new(5).unwrap()),
            ),
            credentials: credentials.clone(),
        };

        let article = ArticleCandidate {
            is_article,
            title: "A headline".to_string(),
            content: "Body".to_string(),
        };
        let config = Arc::new(AppConfig::default());
        let session = SessionController::new(article, deps, &config);
        let app = App::new(config, session, prompt_rx, "page.html", "<p>Body</p>");
        (app, credentials)
    }

    async fn settle(app: &mut App) {
        for _ in 0..50 {
            tokio::time::sleep(Duration::from_millis(10)).await;
            app.update(Instant::now());
            if !app.session.is_busy() {
                return;
            }
        }
    }

    #[tokio::test]
    async fn test_input_focus_hides_trigger() {
        let (mut app, _) = test_app(true);
        assert!(app.session.presentation().trigger_visible());

        app.focus_input();
        assert_eq!(app.focus, Focus::Input);
        assert!(!app.session.presentation().trigger_visible());

        app.leave_input();
        assert!(app.session.presentation().trigger_visible());
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_click_summarizes_after_window() {
        let (mut app, _) = test_app(true);
        app.click_trigger(Instant::now());

        tokio::time::advance(Duration::from_millis(100)).await;
        app.update(Instant::now());
        assert!(!app.session.is_busy());

        tokio::time::advance(Duration::from_millis(300)).await;
        app.update(Instant::now());
        assert!(app.session.is_busy());
        app.cancel();
    }

    #[tokio::test]
    async fn test_double_click_resets_key() {
        let (mut app, credentials) = test_app(true);
        let now = Instant::now();
        app.click_trigger(now);
        app.click_trigger(now + Duration::from_millis(100));
        assert!(!app.session.is_busy());

        for _ in 0..20 {
            tokio::task::yield_now().await;
            app.update(now);
            if matches!(app.mode, Mode::SecretPrompt(_)) {
                break;
            }
        }
        let Mode::SecretPrompt(entry) = &app.mode else {
            panic!("expected the key prompt");
        };
        assert_eq!(entry.provider, "OpenAI");

        for c in "sk-new".chars() {
            app.secret_input_char(c);
        }
        app.secret_backspace();
        app.secret_input_char('w');
        app.secret_submit();

        for _ in 0..20 {
            tokio::task::yield_now().await;
            app.update(now);
        }
        assert_eq!(
            credentials.stored_secret("openai").await.unwrap().as_deref(),
            Some("sk-new")
        );
        assert!(app
            .session
            .presentation()
            .notification()
            .is_some_and(|n| n.text.contains("saved")));
    }

    #[tokio::test]
    async fn test_dismissed_prompt_fails_attempt() {
        let (mut app, _) = test_app(true);
        app.summarize(TriggerSource::Button);

        for _ in 0..20 {
            tokio::task::yield_now().await;
            app.update(Instant::now());
            if matches!(app.mode, Mode::SecretPrompt(_)) {
                break;
            }
        }
        assert!(matches!(app.mode, Mode::SecretPrompt(_)));
        app.close_modal();

        settle(&mut app).await;
        assert_eq!(app.session.presentation().state(), &PresentationState::Failed);
        assert!(app.session.presentation().overlay().is_none());
    }

    #[tokio::test]
    async fn test_outside_click_closes_overlay_and_unlocks_scroll() {
        let (mut app, credentials) = test_app(true);
        credentials.set_secret("openai", "sk").await.unwrap();
        app.page_lines = (0..100).map(|i| format!("line {i}")).collect();

        app.summarize(TriggerSource::Button);
        settle(&mut app).await;
        assert_eq!(app.session.presentation().state(), &PresentationState::Failed);
        assert!(app.session.presentation().scroll_locked());

        app.overlay_area = Some(Rect::new(10, 5, 40, 10));
        app.scroll_down(3);
        assert_eq!(app.page_scroll, 0);
        assert_eq!(app.overlay_scroll, 3);

        app.click_at(20, 8, Instant::now());
        assert!(app.session.presentation().overlay().is_some());

        app.click_at(0, 0, Instant::now());
        assert!(app.session.presentation().overlay().is_none());
        assert_eq!(
            app.session.presentation().state(),
            &PresentationState::TriggerVisible
        );
        app.scroll_down(3);
        assert_eq!(app.page_scroll, 3);
    }

    #[tokio::test]
    async fn test_model_picker_switches_model() {
        let (mut app, _) = test_app(true);
        let choices = app.model_choices();
        assert!(choices.len() >= 3);

        app.open_model_picker();
        assert!(matches!(app.mode, Mode::ModelPicker { selected: 0 }));
        app.picker_move(true);
        app.picker_move(false);
        app.picker_move(true);
        app.picker_confirm();

        assert!(matches!(app.mode, Mode::Normal));
        assert_eq!(app.session.active_model(), choices[1].model);
        assert!(app.session.is_busy());
        app.cancel();
    }

    #[tokio::test]
    async fn test_search_scrolls_to_match() {
        let (mut app, _) = test_app(true);
        app.page_lines = vec!["intro".into(), "middle".into(), "The Needle here".into()];
        app.focus_input();
        app.input = "needle".to_string();
        app.submit_input();

        assert_eq!(app.focus, Focus::Page);
        assert_eq!(app.page_scroll, 2);

        app.input = "absent".to_string();
        app.submit_input();
        assert_eq!(app.status_message.as_deref(), Some("Not found: absent"));
    }

    #[tokio::test]
    async fn test_non_article_shortcut_notifies() {
        let (mut app, _) = test_app(false);
        assert!(!app.session.presentation().trigger_visible());
        app.summarize(TriggerSource::Shortcut);
        assert!(!app.session.is_busy());
        assert!(app.session.presentation().notification().is_some());
    }
}
