use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::providers::ProviderRegistry;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub ai: AiConfig,
    #[serde(default)]
    pub classifier: ClassifierConfig,
    #[serde(default)]
    pub ui: UiConfig,
    #[serde(default)]
    pub keymap: KeymapConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Data directory path (credentials, logs)
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            log_level: default_log_level(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiConfig {
    /// Model used by the trigger until another one is picked
    #[serde(default = "default_model")]
    pub default_model: String,
    /// Locale the summary is written in, alongside the article's own language
    #[serde(default = "default_locale")]
    pub locale: String,
    /// Request incremental (SSE) responses
    #[serde(default = "default_true")]
    pub stream: bool,
    /// Max output tokens
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Article content longer than this (chars) is truncated before sending
    #[serde(default = "default_max_content_chars")]
    pub max_content_chars: usize,
    /// Request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    /// Endpoint template overrides keyed by provider id
    /// (e.g. `openai = "http://localhost:8080/v1/chat/completions"`)
    #[serde(default)]
    pub endpoints: HashMap<String, String>,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            default_model: default_model(),
            locale: default_locale(),
            stream: default_true(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            max_content_chars: default_max_content_chars(),
            request_timeout_secs: default_request_timeout(),
            endpoints: HashMap::new(),
        }
    }
}

/// Article detection strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClassifierMode {
    /// OR of coarse signals; sends the raw document
    Heuristic,
    /// Readability-style extraction; sends extracted prose
    Extractor,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    #[serde(default = "default_classifier_mode")]
    pub mode: ClassifierMode,
    /// Visible word count above which a page counts as an article (heuristic mode)
    #[serde(default = "default_min_word_count")]
    pub min_word_count: usize,
    /// URL path keywords that mark a page as an article (heuristic mode)
    #[serde(default = "default_url_keywords")]
    pub url_keywords: Vec<String>,
    /// Readability score a page must exceed (extractor mode)
    #[serde(default = "default_min_readable_score")]
    pub min_readable_score: f64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            mode: default_classifier_mode(),
            min_word_count: default_min_word_count(),
            url_keywords: default_url_keywords(),
            min_readable_score: default_min_readable_score(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UiConfig {
    /// Tick rate in milliseconds
    #[serde(default = "default_tick_rate")]
    pub tick_rate_ms: u64,
    /// How long an error notification stays visible
    #[serde(default = "default_notification_timeout")]
    pub notification_timeout_ms: u64,
    /// Max gap between two clicks on the trigger to count as a double-click
    #[serde(default = "default_double_click")]
    pub double_click_ms: u64,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            tick_rate_ms: default_tick_rate(),
            notification_timeout_ms: default_notification_timeout(),
            double_click_ms: default_double_click(),
        }
    }
}

/// Keymap configuration using Vim-style notation
/// Format: "s", "<A-s>" (Alt+s), "<C-s>" (Ctrl+s), "<S-k>" (Shift+k), "<Esc>"
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeymapConfig {
    /// Summarize the page with the active model
    #[serde(default = "default_key_summarize")]
    pub summarize: String,
    /// Re-prompt for the active provider's API key
    #[serde(default = "default_key_reset_key")]
    pub reset_key: String,
    /// Open the model picker
    #[serde(default = "default_key_pick_model")]
    pub pick_model: String,
    /// Cancel the in-flight summary
    #[serde(default = "default_key_cancel")]
    pub cancel: String,
    /// Focus the input bar
    #[serde(default = "default_key_focus_input")]
    pub focus_input: String,
    /// Quit the application
    #[serde(default = "default_key_quit")]
    pub quit: String,
}

impl Default for KeymapConfig {
    fn default() -> Self {
        Self {
            summarize: default_key_summarize(),
            reset_key: default_key_reset_key(),
            pick_model: default_key_pick_model(),
            cancel: default_key_cancel(),
            focus_input: default_key_focus_input(),
            quit: default_key_quit(),
        }
    }
}

fn default_key_summarize() -> String { "s".to_string() }
fn default_key_reset_key() -> String { "K".to_string() }
fn default_key_pick_model() -> String { "m".to_string() }
fn default_key_cancel() -> String { "c".to_string() }
fn default_key_focus_input() -> String { "/".to_string() }
fn default_key_quit() -> String { "q".to_string() }

fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("pagebrief")
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

/// Derive a BCP-47-ish tag from `LANG` ("de_DE.UTF-8" -> "de-DE")
fn default_locale() -> String {
    std::env::var("LANG")
        .ok()
        .and_then(|lang| locale_from_lang(&lang))
        .unwrap_or_else(|| "en-US".to_string())
}

fn locale_from_lang(lang: &str) -> Option<String> {
    let tag = lang.split(['.', '@']).next()?.trim();
    if tag.is_empty() || tag == "C" || tag == "POSIX" {
        return None;
    }
    Some(tag.replace('_', "-"))
}

fn default_max_tokens() -> u32 {
    1000
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_content_chars() -> usize {
    100_000
}

fn default_request_timeout() -> u64 {
    120
}

fn default_classifier_mode() -> ClassifierMode {
    ClassifierMode::Extractor
}

fn default_min_word_count() -> usize {
    500
}

fn default_url_keywords() -> Vec<String> {
    ["news", "article", "story", "post"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_min_readable_score() -> f64 {
    20.0
}

fn default_tick_rate() -> u64 {
    100
}

fn default_notification_timeout() -> u64 {
    4000
}

fn default_double_click() -> u64 {
    350
}

/// Expand tilde (~) in path to user's home directory
fn expand_tilde(path: &std::path::Path) -> PathBuf {
    if let Some(path_str) = path.to_str() {
        if let Some(stripped) = path_str.strip_prefix("~/") {
            if let Some(home) = dirs::home_dir() {
                return home.join(stripped);
            }
        } else if path_str == "~" {
            if let Some(home) = dirs::home_dir() {
                return home;
            }
        }
    }
    path.to_path_buf()
}

impl AppConfig {
    /// Load configuration from file or return defaults
    pub fn load() -> crate::Result<Self> {
        Self::load_from(&Self::config_path())
    }

    pub fn load_from(config_path: &Path) -> crate::Result<Self> {
        if config_path.exists() {
            let content = std::fs::read_to_string(config_path)?;
            Self::from_toml(&content)
        } else {
            Ok(Self::default())
        }
    }

    /// Parse configuration from TOML text
    pub fn from_toml(content: &str) -> crate::Result<Self> {
        toml::from_str(content).map_err(|e| crate::Error::Config(e.to_string()))
    }

    /// Save configuration to file
    pub fn save(&self) -> crate::Result<()> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, config_path: &Path) -> crate::Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::Error::Config(e.to_string()))?;
        std::fs::write(config_path, content)?;

        Ok(())
    }

    /// Make `model_id` the default model. It must be in `registry`.
    pub fn set_default_model(&mut self, registry: &ProviderRegistry, model_id: &str) -> crate::Result<()> {
        let provider = registry.resolve(model_id)?;
        tracing::info!(provider = %provider.id, model = %model_id, "Default model changed");
        self.ai.default_model = model_id.to_string();
        Ok(())
    }

    /// Get the configuration file path
    /// Always uses ~/.config/pagebrief/config.toml on all platforms
    pub fn config_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".config")
            .join("pagebrief")
            .join("config.toml")
    }

    /// Get the data directory (with tilde expansion)
    pub fn data_dir(&self) -> PathBuf {
        expand_tilde(&self.general.data_dir)
    }

    /// Get the credential file path
    pub fn credentials_path(&self) -> PathBuf {
        self.data_dir().join("credentials.json")
    }

    /// Get the log file path used while the TUI owns the terminal
    pub fn log_path(&self) -> PathBuf {
        self.data_dir().join("pagebrief.log")
    }
}
