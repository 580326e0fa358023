//! Loading the document a session is built around.
//!
//! A document is either fetched over HTTP(S) or read from a local file.
//! It is never modified after loading; classification works on its own
//! parsed copy.

use std::path::Path;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, USER_AGENT};
use reqwest::Client;
use url::Url;

use crate::{Error, Result};

const MAX_PAGE_BYTES: usize = 5 * 1024 * 1024;

const BROWSER_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64; rv:128.0) Gecko/20100101 Firefox/128.0";

/// A loaded page: its address (if any) and serialized markup
#[derive(Debug, Clone)]
pub struct Document {
    pub url: Option<Url>,
    pub html: String,
}

impl Document {
    pub fn new(url: Option<Url>, html: impl Into<String>) -> Self {
        Self {
            url,
            html: html.into(),
        }
    }

    /// Path component of the address, empty for local documents
    pub fn path(&self) -> &str {
        self.url.as_ref().map(|u| u.path()).unwrap_or("")
    }
}

/// Load a document from a URL or a file path
pub async fn load_document(source: &str, timeout_secs: u64) -> Result<Document> {
    if source.starts_with("http://") || source.starts_with("https://") {
        let url = Url::parse(source)?;
        fetch_document(url, timeout_secs).await
    } else {
        read_document(Path::new(source)).await
    }
}

async fn read_document(path: &Path) -> Result<Document> {
    let html = tokio::fs::read_to_string(path).await?;
    let url = std::fs::canonicalize(path)
        .ok()
        .and_then(|abs| Url::from_file_path(abs).ok());
    Ok(Document::new(url, html))
}

async fn fetch_document(url: Url, timeout_secs: u64) -> Result<Document> {
    let client = Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .gzip(true)
        .brotli(true)
        .redirect(reqwest::redirect::Policy::limited(10))
        .build()
        .map_err(|e| Error::Transport(e.to_string()))?;

    let response = client
        .get(url.clone())
        .headers(browser_headers())
        .send()
        .await
        .map_err(|e| Error::Transport(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        return Err(Error::HttpStatus {
            status: status.as_u16(),
            body: format!("failed to load {}", url),
        });
    }

    if let Some(len) = response.content_length() {
        ensure_size(len as usize)?;
    }

    let final_url = response.url().clone();
    let bytes = response
        .bytes()
        .await
        .map_err(|e| Error::Transport(e.to_string()))?;
    ensure_size(bytes.len())?;

    tracing::debug!(url = %final_url, bytes = bytes.len(), "Loaded page");
    Ok(Document::new(
        Some(final_url),
        String::from_utf8_lossy(&bytes).into_owned(),
    ))
}

fn browser_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        ACCEPT,
        HeaderValue::from_static("text/html,application/xhtml+xml;q=0.9,*/*;q=0.8"),
    );
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
    headers.insert(USER_AGENT, HeaderValue::from_static(BROWSER_USER_AGENT));
    headers
}

fn ensure_size(size: usize) -> Result<()> {
    if size > MAX_PAGE_BYTES {
        return Err(Error::Transport(format!(
            "Page too large ({} bytes, limit {})",
            size, MAX_PAGE_BYTES
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_document_path() {
        let doc = Document::new(Url::parse("https://example.com/news/today?x=1").ok(), "");
        assert_eq!(doc.path(), "/news/today");
        assert_eq!(Document::new(None, "").path(), "");
    }

    #[tokio::test]
    async fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("page.html");
        std::fs::write(&file, "<html><body><p>hi</p></body></html>").unwrap();

        let doc = load_document(file.to_str().unwrap(), 5).await.unwrap();
        assert!(doc.html.contains("<p>hi</p>"));
        assert_eq!(doc.url.unwrap().scheme(), "file");
    }

    #[tokio::test]
    async fn test_load_over_http() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/story/1"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>story</html>"))
            .mount(&server)
            .await;

        let doc = load_document(&format!("{}/story/1", server.uri()), 5)
            .await
            .unwrap();
        assert_eq!(doc.html, "<html>story</html>");
        assert_eq!(doc.path(), "/story/1");
    }

    #[tokio::test]
    async fn test_http_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let err = load_document(&format!("{}/missing", server.uri()), 5)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::HttpStatus { status: 404, .. }));
    }
}
