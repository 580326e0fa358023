use async_trait::async_trait;
use dialoguer::Password;

use pagebrief_core::credentials::SecretPrompt;
use pagebrief_core::providers::ProviderDescriptor;

/// Masked terminal prompt. An empty answer dismisses it.
pub struct TerminalSecretPrompt;

#[async_trait]
impl SecretPrompt for TerminalSecretPrompt {
    async fn prompt_for_secret(&self, provider: &ProviderDescriptor) -> Option<String> {
        let label = format!("{} API key (empty to cancel)", provider.display_name);
        let answer = tokio::task::spawn_blocking(move || {
            Password::new()
                .with_prompt(label)
                .allow_empty_password(true)
                .interact()
        })
        .await;

        match answer {
            Ok(Ok(value)) if !value.trim().is_empty() => Some(value),
            Ok(Ok(_)) => None,
            Ok(Err(e)) => {
                tracing::warn!(provider = %provider.id, error = %e, "API key prompt failed");
                None
            }
            Err(e) => {
                tracing::warn!(provider = %provider.id, error = %e, "API key prompt task failed");
                None
            }
        }
    }
}
