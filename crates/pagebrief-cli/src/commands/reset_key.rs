use std::sync::Arc;

use anyhow::{anyhow, Result};

use pagebrief_core::credentials::{CredentialStore, FileSecretStore};
use pagebrief_core::providers::ProviderRegistry;
use pagebrief_core::AppConfig;

use crate::prompt::TerminalSecretPrompt;

pub async fn run(config: &AppConfig, provider_id: &str) -> Result<()> {
    let registry = ProviderRegistry::with_endpoint_overrides(&config.ai.endpoints);
    let descriptor = registry.get(provider_id).ok_or_else(|| {
        let known: Vec<&str> = registry.all().iter().map(|p| p.id.as_str()).collect();
        anyhow!("Unknown provider '{}'. Known providers: {}", provider_id, known.join(", "))
    })?;

    let credentials = CredentialStore::new(
        Arc::new(FileSecretStore::new(config.credentials_path())),
        Arc::new(TerminalSecretPrompt),
    );

    if credentials.reset(descriptor).await? {
        println!("Saved a new API key for {}.", descriptor.display_name);
    } else {
        println!("No key entered; the {} key is unchanged.", descriptor.display_name);
    }

    Ok(())
}
