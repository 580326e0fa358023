use std::sync::Arc;

use anyhow::Result;

use pagebrief_core::credentials::{mask_secret, CredentialStore, FileSecretStore};
use pagebrief_core::providers::ProviderRegistry;
use pagebrief_core::AppConfig;

use crate::prompt::TerminalSecretPrompt;

pub async fn run(config: &AppConfig) -> Result<()> {
    let registry = ProviderRegistry::with_endpoint_overrides(&config.ai.endpoints);
    let credentials = CredentialStore::new(
        Arc::new(FileSecretStore::new(config.credentials_path())),
        Arc::new(TerminalSecretPrompt),
    );

    println!("API keys ({}):\n", config.credentials_path().display());

    for provider in registry.all() {
        let stored = match credentials.stored_secret(&provider.id).await? {
            Some(secret) => mask_secret(&secret),
            None => "(not set)".to_string(),
        };
        println!("  {:<10} {:<16} {}", provider.id, provider.display_name, stored);
    }

    println!("\nTo set or replace a key, run:");
    println!("  pagebrief reset-key <provider>");
    Ok(())
}
