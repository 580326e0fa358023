//! Static provider catalog.
//!
//! The registry is the only place that knows how a provider authenticates
//! and which wire shape it speaks. Everything downstream branches on the
//! descriptor's declared [`AuthScheme`] and [`ProviderFamily`], never on
//! the provider id.

mod chat;
mod gemini;

pub use chat::{ChatChunk, ChatMessage, ChatRequest, ChatResponse};
pub use gemini::{GeminiRequest, GeminiResponse};

use std::collections::HashMap;

use crate::{Error, Result};

/// How the secret travels with a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthScheme {
    /// `Authorization: Bearer <secret>`
    BearerHeader,
    /// `?<name>=<secret>` appended to the endpoint
    QueryParam { name: String },
}

/// Request/response wire shape
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderFamily {
    /// Role-tagged messages, `choices[].message|delta.content`
    Chat,
    /// One text blob, `candidates[].content.parts[].text`
    SingleDocument,
}

#[derive(Debug, Clone)]
pub struct ProviderDescriptor {
    pub id: String,
    pub display_name: String,
    pub models: Vec<String>,
    /// Buffered endpoint; `{model}` is substituted
    pub endpoint_template: String,
    /// Incremental endpoint when it differs from the buffered one
    pub stream_endpoint_template: Option<String>,
    pub auth_scheme: AuthScheme,
    pub family: ProviderFamily,
}

impl ProviderDescriptor {
    pub fn supports_model(&self, model_id: &str) -> bool {
        self.models.iter().any(|m| m == model_id)
    }

    /// Endpoint for `model_id`, before auth is applied
    pub fn endpoint(&self, model_id: &str, stream: bool) -> String {
        let template = if stream {
            self.stream_endpoint_template
                .as_deref()
                .unwrap_or(&self.endpoint_template)
        } else {
            &self.endpoint_template
        };
        template.replace("{model}", model_id)
    }
}

/// Credential material produced for one request
#[derive(Clone, PartialEq, Eq)]
pub enum Auth {
    Header { name: String, value: String },
    Query { name: String, value: String },
}

impl std::fmt::Debug for Auth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Auth::Header { name, .. } => write!(f, "Header({name}: <redacted>)"),
            Auth::Query { name, .. } => write!(f, "Query({name}=<redacted>)"),
        }
    }
}

/// A complete provider body, tagged by wire shape
#[derive(Debug)]
pub enum ProviderResponse {
    Chat(ChatResponse),
    Gemini(GeminiResponse),
}

impl ProviderResponse {
    pub fn parse(family: ProviderFamily, body: &[u8]) -> Result<Self> {
        let parsed = match family {
            ProviderFamily::Chat => serde_json::from_slice(body).map(Self::Chat),
            ProviderFamily::SingleDocument => serde_json::from_slice(body).map(Self::Gemini),
        };
        parsed.map_err(|e| Error::MalformedResponse(format!("invalid JSON body: {e}")))
    }

    /// The generated text, or an error naming the missing field
    pub fn into_text(self) -> Result<String> {
        match self {
            Self::Chat(response) => response.text().ok_or_else(|| {
                Error::MalformedResponse("missing choices[0].message.content".to_string())
            }),
            Self::Gemini(response) => {
                if let Some(message) = response.error_message() {
                    return Err(Error::MalformedResponse(format!("provider error: {message}")));
                }
                response.text().ok_or_else(|| {
                    Error::MalformedResponse(
                        "missing candidates[0].content.parts[].text".to_string(),
                    )
                })
            }
        }
    }
}

/// Delta text carried by one streamed JSON payload
pub fn frame_delta(family: ProviderFamily, payload: &str) -> serde_json::Result<Option<String>> {
    match family {
        ProviderFamily::Chat => serde_json::from_str::<ChatChunk>(payload).map(ChatChunk::delta_text),
        ProviderFamily::SingleDocument => {
            serde_json::from_str::<GeminiResponse>(payload).map(GeminiResponse::text)
        }
    }
}

pub struct ProviderRegistry {
    providers: Vec<ProviderDescriptor>,
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl ProviderRegistry {
    pub fn builtin() -> Self {
        Self {
            providers: vec![
                ProviderDescriptor {
                    id: "openai".to_string(),
                    display_name: "OpenAI".to_string(),
                    models: to_strings(&["gpt-4o-mini", "gpt-4o", "gpt-4.1-mini", "gpt-3.5-turbo"]),
                    endpoint_template: "https://api.openai.com/v1/chat/completions".to_string(),
                    stream_endpoint_template: None,
                    auth_scheme: AuthScheme::BearerHeader,
                    family: ProviderFamily::Chat,
                },
                ProviderDescriptor {
                    id: "gemini".to_string(),
                    display_name: "Google Gemini".to_string(),
                    models: to_strings(&["gemini-2.0-flash", "gemini-1.5-flash", "gemini-1.5-pro"]),
                    endpoint_template:
                        "https://generativelanguage.googleapis.com/v1beta/models/{model}:generateContent"
                            .to_string(),
                    stream_endpoint_template: Some(
                        "https://generativelanguage.googleapis.com/v1beta/models/{model}:streamGenerateContent?alt=sse"
                            .to_string(),
                    ),
                    auth_scheme: AuthScheme::QueryParam {
                        name: "key".to_string(),
                    },
                    family: ProviderFamily::SingleDocument,
                },
                ProviderDescriptor {
                    id: "deepseek".to_string(),
                    display_name: "DeepSeek".to_string(),
                    models: to_strings(&["deepseek-chat"]),
                    endpoint_template: "https://api.deepseek.com/chat/completions".to_string(),
                    stream_endpoint_template: None,
                    auth_scheme: AuthScheme::BearerHeader,
                    family: ProviderFamily::Chat,
                },
            ],
        }
    }

    /// Builtin catalog with endpoint overrides keyed by provider id.
    /// An override replaces both the buffered and the incremental endpoint.
    pub fn with_endpoint_overrides(overrides: &HashMap<String, String>) -> Self {
        let mut registry = Self::builtin();
        for provider in &mut registry.providers {
            if let Some(endpoint) = overrides.get(&provider.id) {
                tracing::info!(provider = %provider.id, "Using endpoint override");
                provider.endpoint_template = endpoint.clone();
                provider.stream_endpoint_template = None;
            }
        }
        registry
    }

    pub fn all(&self) -> &[ProviderDescriptor] {
        &self.providers
    }

    pub fn get(&self, provider_id: &str) -> Option<&ProviderDescriptor> {
        self.providers.iter().find(|p| p.id == provider_id)
    }

    /// Provider serving `model_id`
    pub fn resolve(&self, model_id: &str) -> Result<&ProviderDescriptor> {
        self.providers
            .iter()
            .find(|p| p.supports_model(model_id))
            .ok_or_else(|| Error::UnknownModel(model_id.to_string()))
    }

    /// Every `(provider, model)` pair in catalog order
    pub fn models(&self) -> impl Iterator<Item = (&ProviderDescriptor, &str)> {
        self.providers
            .iter()
            .flat_map(|p| p.models.iter().map(move |m| (p, m.as_str())))
    }
}

/// Auth material for `descriptor` carrying `secret`
pub fn build_auth(descriptor: &ProviderDescriptor, secret: &str) -> Auth {
    match &descriptor.auth_scheme {
        AuthScheme::BearerHeader => Auth::Header {
            name: "Authorization".to_string(),
            value: format!("Bearer {}", secret.trim()),
        },
        AuthScheme::QueryParam { name } => Auth::Query {
            name: name.clone(),
            value: secret.trim().to_string(),
        },
    }
}

fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_models() {
        let registry = ProviderRegistry::builtin();
        assert_eq!(registry.resolve("gpt-4o-mini").unwrap().id, "openai");
        assert_eq!(registry.resolve("gemini-2.0-flash").unwrap().id, "gemini");
        assert_eq!(registry.resolve("deepseek-chat").unwrap().family, ProviderFamily::Chat);
        assert!(matches!(
            registry.resolve("llama-9000"),
            Err(Error::UnknownModel(m)) if m == "llama-9000"
        ));
    }

    #[test]
    fn test_build_auth_follows_scheme() {
        let registry = ProviderRegistry::builtin();

        let openai = registry.get("openai").unwrap();
        assert_eq!(
            build_auth(openai, " sk-1 "),
            Auth::Header {
                name: "Authorization".to_string(),
                value: "Bearer sk-1".to_string()
            }
        );

        let gemini = registry.get("gemini").unwrap();
        assert_eq!(
            build_auth(gemini, "g-key"),
            Auth::Query {
                name: "key".to_string(),
                value: "g-key".to_string()
            }
        );
    }

    #[test]
    fn test_auth_debug_redacts_secret() {
        let auth = Auth::Header {
            name: "Authorization".to_string(),
            value: "Bearer sk-secret".to_string(),
        };
        assert!(!format!("{auth:?}").contains("sk-secret"));
    }

    #[test]
    fn test_endpoint_substitution() {
        let registry = ProviderRegistry::builtin();
        let gemini = registry.get("gemini").unwrap();
        assert!(gemini
            .endpoint("gemini-1.5-flash", false)
            .ends_with("/models/gemini-1.5-flash:generateContent"));
        assert!(gemini
            .endpoint("gemini-1.5-flash", true)
            .ends_with("/models/gemini-1.5-flash:streamGenerateContent?alt=sse"));
    }

    #[test]
    fn test_endpoint_overrides() {
        let overrides = HashMap::from([(
            "openai".to_string(),
            "http://127.0.0.1:9/v1/chat/completions".to_string(),
        )]);
        let registry = ProviderRegistry::with_endpoint_overrides(&overrides);
        assert_eq!(
            registry.get("openai").unwrap().endpoint("gpt-4o", true),
            "http://127.0.0.1:9/v1/chat/completions"
        );
        assert!(registry
            .get("gemini")
            .unwrap()
            .endpoint_template
            .starts_with("https://generativelanguage"));
    }

    #[test]
    fn test_parse_buffered_bodies() {
        let chat = ProviderResponse::parse(
            ProviderFamily::Chat,
            br#"{"choices":[{"message":{"role":"assistant","content":"<p>ok</p>"}}]}"#,
        )
        .unwrap();
        assert_eq!(chat.into_text().unwrap(), "<p>ok</p>");

        let gemini = ProviderResponse::parse(
            ProviderFamily::SingleDocument,
            br#"{"candidates":[{"content":{"parts":[{"text":"<p>ok</p>"}]}}]}"#,
        )
        .unwrap();
        assert_eq!(gemini.into_text().unwrap(), "<p>ok</p>");
    }

    #[test]
    fn test_missing_fields_are_malformed() {
        let chat = ProviderResponse::parse(ProviderFamily::Chat, br#"{"choices":[]}"#).unwrap();
        assert!(matches!(chat.into_text(), Err(Error::MalformedResponse(_))));

        assert!(matches!(
            ProviderResponse::parse(ProviderFamily::SingleDocument, b"not json"),
            Err(Error::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_frame_delta_per_family() {
        assert_eq!(
            frame_delta(ProviderFamily::Chat, r#"{"choices":[{"delta":{"content":"He"}}]}"#)
                .unwrap()
                .as_deref(),
            Some("He")
        );
        assert_eq!(
            frame_delta(
                ProviderFamily::SingleDocument,
                r#"{"candidates":[{"content":{"parts":[{"text":"llo"}]}}]}"#
            )
            .unwrap()
            .as_deref(),
            Some("llo")
        );
        assert!(frame_delta(ProviderFamily::Chat, "{oops").is_err());
    }

    #[test]
    fn test_models_lists_every_pair() {
        let registry = ProviderRegistry::builtin();
        let count: usize = registry.all().iter().map(|p| p.models.len()).sum();
        assert_eq!(registry.models().count(), count);
    }
}
