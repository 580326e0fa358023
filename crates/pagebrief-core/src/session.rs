//! One page's summarization session.
//!
//! The controller owns the classified article, the presentation and at
//! most one in-flight attempt. Attempts run as spawned tasks and report
//! back over a channel; the controller applies their events on the
//! caller's task, so presentation state is only mutated in one place.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::Instrument;
use uuid::Uuid;

use crate::classifier::ArticleCandidate;
use crate::config::AppConfig;
use crate::credentials::{CredentialStore, FileSecretStore, SecretPrompt};
use crate::dispatcher::{
    CancelHandle, Dispatcher, GenerationParams, ReqwestTransport, SummarizationRequest,
};
use crate::presentation::{DismissReason, NotificationKind, Presentation};
use crate::providers::{ProviderDescriptor, ProviderRegistry};
use crate::{Error, Result};

/// What started an attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerSource {
    Button,
    Shortcut,
}

#[derive(Debug)]
pub struct AttemptEvent {
    pub id: Uuid,
    pub kind: AttemptEventKind,
}

#[derive(Debug)]
pub enum AttemptEventKind {
    Prompting { provider: String },
    Loading,
    Delta(String),
    Completed,
    Failed(Error),
    Cancelled,
}

/// Collaborators injected into a session
#[derive(Clone)]
pub struct SessionDeps {
    pub dispatcher: Dispatcher,
    pub credentials: CredentialStore,
}

impl SessionDeps {
    /// Real HTTP transport and on-disk credentials, with the host's prompt
    pub fn from_config(config: &AppConfig, prompt: Arc<dyn SecretPrompt>) -> Result<Self> {
        let registry = ProviderRegistry::with_endpoint_overrides(&config.ai.endpoints);
        let transport = ReqwestTransport::new(config.ai.request_timeout_secs)?;
        let store = FileSecretStore::new(config.credentials_path());

        Ok(Self {
            dispatcher: Dispatcher::new(Arc::new(registry), Arc::new(transport)),
            credentials: CredentialStore::new(Arc::new(store), prompt),
        })
    }
}

struct ActiveAttempt {
    id: Uuid,
    cancel: CancelHandle,
}

pub struct SessionController {
    article: ArticleCandidate,
    presentation: Presentation,
    deps: SessionDeps,
    locale: String,
    params: GenerationParams,
    active_model: String,
    active: Option<ActiveAttempt>,
    events_tx: mpsc::UnboundedSender<AttemptEvent>,
    events_rx: mpsc::UnboundedReceiver<AttemptEvent>,
}

impl SessionController {
    pub fn new(article: ArticleCandidate, deps: SessionDeps, config: &AppConfig) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let presentation = Presentation::new(
            article.is_article,
            Duration::from_millis(config.ui.notification_timeout_ms),
        );

        Self {
            article,
            presentation,
            deps,
            locale: config.ai.locale.clone(),
            params: GenerationParams::from_config(&config.ai),
            active_model: config.ai.default_model.clone(),
            active: None,
            events_tx,
            events_rx,
        }
    }

    pub fn article(&self) -> &ArticleCandidate {
        &self.article
    }

    pub fn presentation(&self) -> &Presentation {
        &self.presentation
    }

    pub fn registry(&self) -> &ProviderRegistry {
        self.deps.dispatcher.registry()
    }

    pub fn active_model(&self) -> &str {
        &self.active_model
    }

    /// Switch the model used by later triggers
    pub fn set_active_model(&mut self, model_id: &str) -> Result<()> {
        self.registry().resolve(model_id)?;
        self.active_model = model_id.to_string();
        Ok(())
    }

    pub fn is_busy(&self) -> bool {
        self.active.is_some()
    }

    pub fn active_request_id(&self) -> Option<Uuid> {
        self.active.as_ref().map(|a| a.id)
    }

    /// Start an attempt with `model` (or the active model).
    ///
    /// Returns `Ok(None)` when a shortcut is suppressed because an
    /// editable element has focus.
    pub fn summarize(&mut self, source: TriggerSource, model: Option<&str>) -> Result<Option<Uuid>> {
        if !self.article.is_article {
            return Err(Error::NotAnArticle);
        }
        if source == TriggerSource::Shortcut && self.presentation.editable_focused() {
            tracing::debug!("Shortcut ignored while an editable element has focus");
            return Ok(None);
        }
        if self.active.is_some() || self.presentation.state().is_busy() {
            self.presentation
                .notify(NotificationKind::Info, "A summary is already in progress.");
            return Err(Error::Busy);
        }

        let model_id = model.unwrap_or(&self.active_model).to_string();
        let descriptor = self.registry().resolve(&model_id)?.clone();
        self.active_model = model_id.clone();

        let id = Uuid::new_v4();
        let cancel = CancelHandle::new();
        let request = SummarizationRequest {
            provider_id: descriptor.id.clone(),
            model_id: model_id.clone(),
            title: self.article.title.clone(),
            content: self.article.content.clone(),
            locale: self.locale.clone(),
        };

        let attempt = Attempt {
            id,
            descriptor,
            request,
            params: self.params,
            deps: self.deps.clone(),
            cancel: cancel.clone(),
            events: self.events_tx.clone(),
        };
        let span = tracing::info_span!(
            "summary",
            request_id = %id,
            provider = %attempt.descriptor.id,
            model = %model_id
        );
        self.presentation.begin_pending();
        tokio::spawn(attempt.run().instrument(span));

        tracing::info!(request_id = %id, ?source, model = %model_id, "Summary started");
        self.active = Some(ActiveAttempt { id, cancel });
        Ok(Some(id))
    }

    /// Apply one attempt event. Events of any attempt but the active one
    /// are dropped.
    pub fn handle_event(&mut self, event: AttemptEvent) {
        if self.active_request_id() != Some(event.id) {
            tracing::debug!(request_id = %event.id, "Dropping event of an inactive attempt");
            return;
        }

        match event.kind {
            AttemptEventKind::Prompting { provider } => self.presentation.begin_prompting(&provider),
            AttemptEventKind::Loading => self.presentation.begin_loading(),
            AttemptEventKind::Delta(delta) => self.presentation.append_delta(&delta),
            AttemptEventKind::Completed => {
                tracing::info!(request_id = %event.id, "Summary completed");
                self.presentation.complete();
                self.active = None;
            }
            AttemptEventKind::Failed(error) => {
                tracing::warn!(request_id = %event.id, error = %error, "Summary failed");
                self.presentation.fail(&error);
                self.active = None;
            }
            AttemptEventKind::Cancelled => {
                self.presentation.cancel();
                self.active = None;
            }
        }
    }

    /// Apply every event already queued
    pub fn drain_events(&mut self) {
        while let Ok(event) = self.events_rx.try_recv() {
            self.handle_event(event);
        }
    }

    /// Wait for the next attempt event without applying it
    pub async fn next_event(&mut self) -> Option<AttemptEvent> {
        self.events_rx.recv().await
    }

    /// Drive events until no attempt is active
    pub async fn run_until_settled(&mut self) {
        while self.active.is_some() {
            match self.events_rx.recv().await {
                Some(event) => self.handle_event(event),
                None => break,
            }
        }
    }

    /// Abort the active attempt. Returns false if there was none.
    pub fn cancel(&mut self) -> bool {
        // Apply progress the attempt already reported, so the presentation
        // reflects everything delivered before the abort
        self.drain_events();

        let Some(active) = self.active.take() else {
            return false;
        };
        active.cancel.cancel();
        tracing::info!(request_id = %active.id, "Summary cancelled");

        if self.presentation.state().is_busy() {
            self.presentation.cancel();
        } else {
            self.presentation
                .notify(NotificationKind::Info, Error::Cancelled.user_message());
        }
        true
    }

    /// Close the overlay, cancelling an in-flight attempt first
    pub fn close_overlay(&mut self, reason: DismissReason) -> bool {
        if self.presentation.overlay().is_none() {
            return false;
        }
        if self.active.is_some() {
            self.cancel();
        }
        self.presentation.close_overlay(reason)
    }

    pub fn focus_changed(&mut self, editable: bool) {
        self.presentation.focus_changed(editable);
    }

    pub fn tick(&mut self, now: Instant) {
        self.presentation.tick(now);
    }

    /// Surface an error that happened outside an attempt
    pub fn notify_error(&mut self, error: &Error) {
        self.presentation
            .notify(NotificationKind::Error, error.user_message());
    }

    pub fn notify_info(&mut self, text: impl Into<String>) {
        self.presentation.notify(NotificationKind::Info, text);
    }

    pub fn notify(&mut self, kind: NotificationKind, text: impl Into<String>) {
        self.presentation.notify(kind, text);
    }

    /// Re-prompt for `provider_id`'s key and overwrite the stored one.
    ///
    /// The returned future does not borrow the session, so hosts whose
    /// prompt is answered by their own event loop can spawn it.
    pub fn reset_credential(
        &self,
        provider_id: &str,
    ) -> Result<impl Future<Output = Result<bool>> + Send + 'static> {
        let descriptor = self
            .registry()
            .get(provider_id)
            .cloned()
            .ok_or_else(|| Error::UnknownProvider(provider_id.to_string()))?;
        let credentials = self.deps.credentials.clone();

        Ok(async move {
            tracing::info!(provider = %descriptor.id, "Resetting API key");
            credentials.reset(&descriptor).await
        })
    }
}

/// Everything one spawned attempt owns
struct Attempt {
    id: Uuid,
    descriptor: ProviderDescriptor,
    request: SummarizationRequest,
    params: GenerationParams,
    deps: SessionDeps,
    cancel: CancelHandle,
    events: mpsc::UnboundedSender<AttemptEvent>,
}

impl Attempt {
    async fn run(self) {
        let outcome = self.execute().await;
        let kind = match outcome {
            Ok(()) => AttemptEventKind::Completed,
            Err(Error::Cancelled) => AttemptEventKind::Cancelled,
            Err(e) => AttemptEventKind::Failed(e),
        };
        self.emit(kind);
    }

    async fn execute(&self) -> Result<()> {
        let secret = match self.deps.credentials.stored_secret(&self.descriptor.id).await? {
            Some(secret) => secret,
            None => {
                self.emit(AttemptEventKind::Prompting {
                    provider: self.descriptor.display_name.clone(),
                });
                let answer = self
                    .cancel
                    .run(self.deps.credentials.prompt_and_store(&self.descriptor))
                    .await??;
                answer.ok_or_else(|| Error::CredentialMissing {
                    provider: self.descriptor.display_name.clone(),
                })?
            }
        };

        self.emit(AttemptEventKind::Loading);
        let mut reader = self
            .deps
            .dispatcher
            .dispatch(&self.request, &secret, &self.params, &self.cancel)
            .await?;

        while let Some(delta) = reader.next_delta().await? {
            self.emit(AttemptEventKind::Delta(delta));
        }
        Ok(())
    }

    fn emit(&self, kind: AttemptEventKind) {
        // The session may already be gone
        let _ = self.events.send(AttemptEvent { id: self.id, kind });
    }
}
