//! Per-provider API keys.
//!
//! Storage and prompting are injected capabilities: the core never talks
//! to a terminal or a file directly. Values are trimmed before they are
//! stored and again before they are used, and are never logged.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::providers::ProviderDescriptor;
use crate::{Error, Result};

/// Storage key for a provider's secret
pub fn storage_key(provider_id: &str) -> String {
    format!("{provider_id}_api_key")
}

/// Show the first 3 and last 2 characters of a secret
pub fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 6 {
        return "*".repeat(chars.len());
    }
    let head: String = chars[..3].iter().collect();
    let tail: String = chars[chars.len() - 2..].iter().collect();
    format!("{head}…{tail}")
}

/// Async key/value persistence for secrets
#[async_trait]
pub trait SecretStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn set(&self, key: &str, value: &str) -> Result<()>;
}

/// Asks the user for a provider's secret; `None` when they decline
#[async_trait]
pub trait SecretPrompt: Send + Sync {
    async fn prompt_for_secret(&self, provider: &ProviderDescriptor) -> Option<String>;
}

/// In-memory store, for tests and ephemeral sessions
#[derive(Default)]
pub struct MemorySecretStore {
    values: Mutex<HashMap<String, String>>,
}

#[async_trait]
impl SecretStore for MemorySecretStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.values.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.values
            .lock()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// JSON map on disk, cached after the first read
pub struct FileSecretStore {
    path: PathBuf,
    cache: Mutex<Option<HashMap<String, String>>>,
}

impl FileSecretStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cache: Mutex::new(None),
        }
    }

    async fn read_file(&self) -> Result<HashMap<String, String>> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) if content.trim().is_empty() => Ok(HashMap::new()),
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_file(&self, values: &HashMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let content = serde_json::to_string_pretty(values)?;
        tokio::fs::write(&self.path, content).await?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tokio::fs::set_permissions(&self.path, std::fs::Permissions::from_mode(0o600)).await?;
        }

        Ok(())
    }
}

#[async_trait]
impl SecretStore for FileSecretStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut cache = self.cache.lock().await;
        if cache.is_none() {
            *cache = Some(self.read_file().await?);
        }
        Ok(cache.as_ref().and_then(|values| values.get(key).cloned()))
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut cache = self.cache.lock().await;
        let mut values = match cache.take() {
            Some(values) => values,
            None => self.read_file().await?,
        };
        values.insert(key.to_string(), value.to_string());
        let written = self.write_file(&values).await;
        *cache = Some(values);
        written
    }
}

/// Combines persistence with the interactive prompt
#[derive(Clone)]
pub struct CredentialStore {
    store: Arc<dyn SecretStore>,
    prompt: Arc<dyn SecretPrompt>,
}

impl CredentialStore {
    pub fn new(store: Arc<dyn SecretStore>, prompt: Arc<dyn SecretPrompt>) -> Self {
        Self { store, prompt }
    }

    /// Stored secret without prompting
    pub async fn stored_secret(&self, provider_id: &str) -> Result<Option<String>> {
        let value = self.store.get(&storage_key(provider_id)).await?;
        Ok(value
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty()))
    }

    /// Stored secret, prompting (and persisting the answer) if absent.
    /// `None` means the user declined.
    pub async fn get_secret(&self, provider: &ProviderDescriptor) -> Result<Option<String>> {
        if let Some(secret) = self.stored_secret(&provider.id).await? {
            return Ok(Some(secret));
        }
        self.prompt_and_store(provider).await
    }

    pub async fn set_secret(&self, provider_id: &str, value: &str) -> Result<()> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(Error::CredentialMissing {
                provider: provider_id.to_string(),
            });
        }
        self.store.set(&storage_key(provider_id), trimmed).await?;
        tracing::info!(provider = %provider_id, "Stored API key");
        Ok(())
    }

    /// Prompt unconditionally; a non-empty answer is persisted
    pub async fn prompt_and_store(&self, provider: &ProviderDescriptor) -> Result<Option<String>> {
        let answer = self
            .prompt
            .prompt_for_secret(provider)
            .await
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());

        match answer {
            Some(secret) => {
                self.set_secret(&provider.id, &secret).await?;
                Ok(Some(secret))
            }
            None => {
                tracing::info!(provider = %provider.id, "API key prompt declined");
                Ok(None)
            }
        }
    }

    /// Explicit reset: always prompts and overwrites. Returns whether a new
    /// value was stored; declining keeps the old one.
    pub async fn reset(&self, provider: &ProviderDescriptor) -> Result<bool> {
        Ok(self.prompt_and_store(provider).await?.is_some())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::providers::ProviderRegistry;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Prompt replaying scripted answers
    #[derive(Default)]
    pub(crate) struct ScriptedPrompt {
        answers: std::sync::Mutex<VecDeque<Option<String>>>,
        pub(crate) calls: AtomicUsize,
    }

    impl ScriptedPrompt {
        pub(crate) fn new(answers: Vec<Option<&str>>) -> Self {
            Self {
                answers: std::sync::Mutex::new(
                    answers.into_iter().map(|a| a.map(str::to_string)).collect(),
                ),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl SecretPrompt for ScriptedPrompt {
        async fn prompt_for_secret(&self, _provider: &ProviderDescriptor) -> Option<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.answers.lock().unwrap().pop_front().flatten()
        }
    }

    fn store_with(prompt: Arc<ScriptedPrompt>) -> CredentialStore {
        CredentialStore::new(Arc::new(MemorySecretStore::default()), prompt)
    }

    fn openai() -> ProviderDescriptor {
        ProviderRegistry::builtin().get("openai").unwrap().clone()
    }

    #[tokio::test]
    async fn test_set_then_get_trims() {
        let prompt = Arc::new(ScriptedPrompt::default());
        let creds = store_with(prompt.clone());

        creds.set_secret("openai", "  abc123  ").await.unwrap();
        assert_eq!(creds.get_secret(&openai()).await.unwrap().as_deref(), Some("abc123"));
        assert_eq!(prompt.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_missing_secret_prompts_and_persists() {
        let prompt = Arc::new(ScriptedPrompt::new(vec![Some(" sk-new \n")]));
        let creds = store_with(prompt.clone());

        assert_eq!(creds.get_secret(&openai()).await.unwrap().as_deref(), Some("sk-new"));
        assert_eq!(creds.stored_secret("openai").await.unwrap().as_deref(), Some("sk-new"));
        assert_eq!(prompt.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_declined_or_blank_prompt_returns_none() {
        let prompt = Arc::new(ScriptedPrompt::new(vec![None, Some("   ")]));
        let creds = store_with(prompt);

        assert_eq!(creds.get_secret(&openai()).await.unwrap(), None);
        assert_eq!(creds.get_secret(&openai()).await.unwrap(), None);
        assert_eq!(creds.stored_secret("openai").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_reset_always_prompts_and_overwrites() {
        let prompt = Arc::new(ScriptedPrompt::new(vec![Some("second"), None]));
        let creds = store_with(prompt.clone());
        creds.set_secret("openai", "first").await.unwrap();

        assert!(creds.reset(&openai()).await.unwrap());
        assert_eq!(creds.stored_secret("openai").await.unwrap().as_deref(), Some("second"));

        // Declining a reset keeps the previous key
        assert!(!creds.reset(&openai()).await.unwrap());
        assert_eq!(creds.stored_secret("openai").await.unwrap().as_deref(), Some("second"));
        assert_eq!(prompt.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_set_blank_is_rejected() {
        let creds = store_with(Arc::new(ScriptedPrompt::default()));
        assert!(matches!(
            creds.set_secret("openai", "  ").await,
            Err(Error::CredentialMissing { .. })
        ));
    }

    #[tokio::test]
    async fn test_file_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("credentials.json");

        let store = FileSecretStore::new(&path);
        store.set("openai_api_key", "abc").await.unwrap();
        store.set("gemini_api_key", "def").await.unwrap();

        let reopened = FileSecretStore::new(&path);
        assert_eq!(reopened.get("openai_api_key").await.unwrap().as_deref(), Some("abc"));
        assert_eq!(reopened.get("gemini_api_key").await.unwrap().as_deref(), Some("def"));
        assert_eq!(reopened.get("deepseek_api_key").await.unwrap(), None);

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }
    }

    #[test]
    fn test_storage_key_and_mask() {
        assert_eq!(storage_key("gemini"), "gemini_api_key");
        assert_eq!(mask_secret("sk-abcdef123456"), "sk-…56");
        assert_eq!(mask_secret("short"), "*****");
    }
}
