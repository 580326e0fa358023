use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Classification error: {0}")]
    Classification(String),

    #[error("API key required for {provider}")]
    CredentialMissing { provider: String },

    #[error("Network error: {0}")]
    Transport(String),

    #[error("Invalid API key for {provider} (HTTP 401)")]
    InvalidCredential { provider: String },

    #[error("HTTP error {status}: {body}")]
    HttpStatus { status: u16, body: String },

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Malformed stream frame: {0}")]
    StreamFrame(String),

    #[error("Request cancelled")]
    Cancelled,

    #[error("Unknown model: {0}")]
    UnknownModel(String),

    #[error("Unknown provider: {0}")]
    UnknownProvider(String),

    #[error("A summary is already in progress")]
    Busy,

    #[error("This page does not look like an article")]
    NotAnArticle,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("URL parsing error: {0}")]
    UrlParse(#[from] url::ParseError),
}

impl Error {
    /// Text shown to the user in the overlay and notification
    pub fn user_message(&self) -> String {
        match self {
            Error::CredentialMissing { provider } => {
                format!("An API key for {provider} is required to summarize this page.")
            }
            Error::InvalidCredential { provider } => format!(
                "The {provider} API key was rejected (401). Reset the key and try again."
            ),
            Error::HttpStatus { status, .. } => {
                format!("Summary request failed with HTTP status {status}.")
            }
            Error::Transport(msg) => format!("Network error while contacting the provider: {msg}"),
            Error::MalformedResponse(_) | Error::StreamFrame(_) | Error::Json(_) => {
                "The provider returned a response that could not be read.".to_string()
            }
            Error::Cancelled => "Summary cancelled.".to_string(),
            other => other.to_string(),
        }
    }

    /// Errors the user can fix without changing anything but the stored key
    pub fn suggests_key_reset(&self) -> bool {
        matches!(self, Error::InvalidCredential { .. } | Error::CredentialMissing { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_credential_message_differs_from_generic_status() {
        let unauthorized = Error::InvalidCredential { provider: "OpenAI".to_string() };
        let server = Error::HttpStatus { status: 500, body: String::new() };

        assert_ne!(unauthorized.user_message(), server.user_message());
        assert!(unauthorized.user_message().contains("401"));
        assert!(unauthorized.suggests_key_reset());
        assert!(!server.suggests_key_reset());
        assert!(server.user_message().contains("500"));
    }

    #[test]
    fn test_cancelled_message_is_neutral() {
        let msg = Error::Cancelled.user_message();
        assert_eq!(msg, "Summary cancelled.");
        assert!(!msg.to_lowercase().contains("error"));
    }
}
