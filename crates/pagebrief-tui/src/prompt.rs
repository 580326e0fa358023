//! API key prompt answered by the UI loop.

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};

use pagebrief_core::credentials::SecretPrompt;
use pagebrief_core::providers::ProviderDescriptor;

/// A pending request for the user to type a key
#[derive(Debug)]
pub struct PromptRequest {
    /// Display name of the provider
    pub provider: String,
    pub reply: oneshot::Sender<Option<String>>,
}

/// [`SecretPrompt`] that forwards to the UI loop and waits for its answer
pub struct TuiSecretPrompt {
    requests: mpsc::UnboundedSender<PromptRequest>,
}

impl TuiSecretPrompt {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<PromptRequest>) {
        let (requests, rx) = mpsc::unbounded_channel();
        (Self { requests }, rx)
    }
}

#[async_trait]
impl SecretPrompt for TuiSecretPrompt {
    async fn prompt_for_secret(&self, provider: &ProviderDescriptor) -> Option<String> {
        let (reply, answer) = oneshot::channel();
        let request = PromptRequest {
            provider: provider.display_name.clone(),
            reply,
        };
        if self.requests.send(request).is_err() {
            tracing::warn!(provider = %provider.id, "UI is gone, cannot prompt for API key");
            return None;
        }
        // A dropped reply counts as a dismissal
        answer.await.ok().flatten()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pagebrief_core::providers::ProviderRegistry;

    #[tokio::test]
    async fn test_answer_is_forwarded() {
        let (prompt, mut rx) = TuiSecretPrompt::channel();
        let registry = ProviderRegistry::builtin();
        let openai = registry.get("openai").unwrap().clone();

        let asking = tokio::spawn(async move { prompt.prompt_for_secret(&openai).await });
        let request = rx.recv().await.unwrap();
        assert_eq!(request.provider, "OpenAI");
        request.reply.send(Some("sk-typed".to_string())).unwrap();

        assert_eq!(asking.await.unwrap().as_deref(), Some("sk-typed"));
    }

    #[tokio::test]
    async fn test_dropped_reply_or_ui_means_none() {
        let registry = ProviderRegistry::builtin();
        let gemini = registry.get("gemini").unwrap().clone();

        let (prompt, mut rx) = TuiSecretPrompt::channel();
        let provider = gemini.clone();
        let asking = tokio::spawn(async move { prompt.prompt_for_secret(&provider).await });
        drop(rx.recv().await.unwrap());
        assert_eq!(asking.await.unwrap(), None);

        let (prompt, rx) = TuiSecretPrompt::channel();
        drop(rx);
        assert_eq!(prompt.prompt_for_secret(&gemini).await, None);
    }
}
