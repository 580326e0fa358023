//! Provider-agnostic request dispatch.
//!
//! A [`SummarizationRequest`] is rendered into the wire shape declared by
//! the provider's descriptor, sent once through an injected
//! [`HttpTransport`], and read back through a [`ResponseReader`] that
//! yields text deltas. Every suspension point is raced against a
//! [`CancelHandle`].

use std::collections::VecDeque;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use tokio::sync::Notify;
use url::Url;

use crate::config::AiConfig;
use crate::prompt;
use crate::providers::{
    build_auth, Auth, ChatMessage, ChatRequest, GeminiRequest, ProviderDescriptor,
    ProviderFamily, ProviderRegistry, ProviderResponse,
};
use crate::stream::StreamAssembler;
use crate::{Error, Result};

/// Error bodies are kept only up to this size
const MAX_ERROR_BODY_BYTES: usize = 4 * 1024;

/// Buffered bodies larger than this are rejected
const MAX_BODY_BYTES: usize = 8 * 1024 * 1024;

/// Normalized input of one summarization attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummarizationRequest {
    pub provider_id: String,
    pub model_id: String,
    pub title: String,
    pub content: String,
    pub locale: String,
}

/// Generation knobs shared by every provider
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationParams {
    pub max_tokens: u32,
    pub temperature: f32,
    pub stream: bool,
    pub max_content_chars: usize,
}

impl GenerationParams {
    pub fn from_config(config: &AiConfig) -> Self {
        Self {
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            stream: config.stream,
            max_content_chars: config.max_content_chars,
        }
    }
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self::from_config(&AiConfig::default())
    }
}

/// A fully rendered POST request
#[derive(Clone)]
pub struct HttpRequest {
    pub url: Url,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HttpRequest {
    /// URL without its query string, safe to log
    pub fn redacted_url(&self) -> String {
        let mut url = self.url.clone();
        url.set_query(None);
        url.to_string()
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

impl std::fmt::Debug for HttpRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpRequest")
            .field("url", &self.redacted_url())
            .field("body_bytes", &self.body.len())
            .finish_non_exhaustive()
    }
}

pub type ByteStream = BoxStream<'static, Result<Bytes>>;

/// Status and body of a response whose headers have arrived
pub struct RawResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: ByteStream,
}

/// Injected HTTP capability
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<RawResponse>;
}

/// `reqwest`-backed transport
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(timeout_secs: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| Error::Transport(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<RawResponse> {
        let mut builder = self.client.post(request.url.clone()).body(request.body);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        // reqwest errors may embed the URL, which carries query-param secrets
        let response = builder
            .send()
            .await
            .map_err(|e| Error::Transport(e.without_url().to_string()))?;

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        Ok(RawResponse {
            status: response.status().as_u16(),
            content_type,
            body: response
                .bytes_stream()
                .map(|chunk| chunk.map_err(|e| Error::Transport(e.without_url().to_string())))
                .boxed(),
        })
    }
}

/// Cooperative cancellation shared between a caller and one attempt
#[derive(Clone, Default)]
pub struct CancelHandle {
    inner: Arc<CancelState>,
}

#[derive(Default)]
struct CancelState {
    cancelled: AtomicBool,
    notify: Notify,
}

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Resolves once `cancel` has been called
    pub async fn cancelled(&self) {
        loop {
            let notified = self.inner.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }

    /// Run `future` unless cancellation wins first
    pub async fn run<F: Future>(&self, future: F) -> Result<F::Output> {
        tokio::select! {
            biased;
            _ = self.cancelled() => Err(Error::Cancelled),
            output = future => Ok(output),
        }
    }
}

impl std::fmt::Debug for CancelHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancelHandle")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// Builds, sends and reads back provider requests
#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<ProviderRegistry>,
    transport: Arc<dyn HttpTransport>,
}

impl Dispatcher {
    pub fn new(registry: Arc<ProviderRegistry>, transport: Arc<dyn HttpTransport>) -> Self {
        Self { registry, transport }
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    /// Render `request` for its provider. Branches only on the descriptor's
    /// declared family and auth scheme.
    pub fn build_request(
        &self,
        request: &SummarizationRequest,
        secret: &str,
        params: &GenerationParams,
    ) -> Result<HttpRequest> {
        let descriptor = self.descriptor(request)?;
        render_request(descriptor, request, secret, params)
    }

    /// Send `request` once and return a reader over its body.
    ///
    /// Non-2xx statuses are errors; 401 is reported as an invalid credential.
    pub async fn dispatch(
        &self,
        request: &SummarizationRequest,
        secret: &str,
        params: &GenerationParams,
        cancel: &CancelHandle,
    ) -> Result<ResponseReader> {
        let descriptor = self.descriptor(request)?;
        let http_request = render_request(descriptor, request, secret, params)?;

        tracing::info!(
            provider = %descriptor.id,
            model = %request.model_id,
            url = %http_request.redacted_url(),
            stream = params.stream,
            "Dispatching summary request"
        );

        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        let response = cancel.run(self.transport.send(http_request)).await??;

        if !(200..300).contains(&response.status) {
            return Err(status_error(descriptor, response, cancel).await);
        }

        let streaming = match response.content_type.as_deref() {
            Some(ct) if ct.starts_with("application/json") => false,
            _ => params.stream,
        };
        tracing::debug!(status = response.status, streaming, "Response headers received");

        Ok(ResponseReader::new(
            descriptor.family,
            response.body,
            streaming,
            cancel.clone(),
        ))
    }

    fn descriptor(&self, request: &SummarizationRequest) -> Result<&ProviderDescriptor> {
        let descriptor = self.registry.resolve(&request.model_id)?;
        if descriptor.id != request.provider_id {
            return Err(Error::UnknownModel(format!(
                "{} is not served by {}",
                request.model_id, request.provider_id
            )));
        }
        Ok(descriptor)
    }
}

fn render_request(
    descriptor: &ProviderDescriptor,
    request: &SummarizationRequest,
    secret: &str,
    params: &GenerationParams,
) -> Result<HttpRequest> {
    let mut url = Url::parse(&descriptor.endpoint(&request.model_id, params.stream))?;
    let mut headers = vec![("Content-Type".to_string(), "application/json".to_string())];
    if params.stream {
        headers.push(("Accept".to_string(), "text/event-stream".to_string()));
    }

    match build_auth(descriptor, secret) {
        Auth::Header { name, value } => headers.push((name, value)),
        Auth::Query { name, value } => {
            url.query_pairs_mut().append_pair(&name, &value);
        }
    }

    let body = match descriptor.family {
        ProviderFamily::Chat => serde_json::to_vec(&ChatRequest {
            model: request.model_id.clone(),
            messages: vec![
                ChatMessage::system(prompt::instructions(&request.locale)),
                ChatMessage::user(prompt::article_text(
                    &request.title,
                    &request.content,
                    params.max_content_chars,
                )),
            ],
            max_tokens: params.max_tokens,
            temperature: params.temperature,
            n: 1,
            stream: params.stream,
        })?,
        ProviderFamily::SingleDocument => serde_json::to_vec(&GeminiRequest::single(
            prompt::single_document(
                &request.locale,
                &request.title,
                &request.content,
                params.max_content_chars,
            ),
        ))?,
    };

    Ok(HttpRequest { url, headers, body })
}

async fn status_error(
    descriptor: &ProviderDescriptor,
    mut response: RawResponse,
    cancel: &CancelHandle,
) -> Error {
    tracing::warn!(provider = %descriptor.id, status = response.status, "Provider returned error status");

    if response.status == 401 {
        return Error::InvalidCredential {
            provider: descriptor.display_name.clone(),
        };
    }

    let mut body = Vec::new();
    while body.len() < MAX_ERROR_BODY_BYTES {
        match cancel.run(response.body.next()).await {
            Ok(Some(Ok(chunk))) => body.extend_from_slice(&chunk),
            Ok(Some(Err(_))) | Ok(None) => break,
            Err(cancelled) => return cancelled,
        }
    }
    body.truncate(MAX_ERROR_BODY_BYTES);

    Error::HttpStatus {
        status: response.status,
        body: String::from_utf8_lossy(&body).trim().to_string(),
    }
}

/// Pulls text deltas out of a response body
pub struct ResponseReader {
    family: ProviderFamily,
    body: ByteStream,
    cancel: CancelHandle,
    /// `None` in buffered mode
    assembler: Option<StreamAssembler>,
    queue: VecDeque<String>,
    finished: bool,
}

impl ResponseReader {
    pub fn new(family: ProviderFamily, body: ByteStream, streaming: bool, cancel: CancelHandle) -> Self {
        Self {
            family,
            body,
            cancel,
            assembler: streaming.then(|| StreamAssembler::new(family)),
            queue: VecDeque::new(),
            finished: false,
        }
    }

    /// Next delta in order, `None` once the body is exhausted.
    ///
    /// After cancellation this returns `Err(Cancelled)` and nothing else,
    /// even if deltas were already queued.
    pub async fn next_delta(&mut self) -> Result<Option<String>> {
        loop {
            if self.cancel.is_cancelled() {
                self.queue.clear();
                return Err(Error::Cancelled);
            }
            if let Some(delta) = self.queue.pop_front() {
                return Ok(Some(delta));
            }
            if self.finished {
                return Ok(None);
            }

            if self.assembler.is_some() {
                self.pull_stream_chunk().await?;
            } else {
                let text = self.read_buffered().await?;
                self.queue.push_back(text);
                self.finished = true;
            }
        }
    }

    /// Drain the reader into one string
    pub async fn collect_text(mut self) -> Result<String> {
        let mut text = String::new();
        while let Some(delta) = self.next_delta().await? {
            text.push_str(&delta);
        }
        Ok(text)
    }

    async fn pull_stream_chunk(&mut self) -> Result<()> {
        let next = self.cancel.run(self.body.next()).await?;
        let Some(assembler) = self.assembler.as_mut() else {
            return Ok(());
        };

        match next {
            Some(chunk) => {
                let chunk = chunk?;
                self.queue.extend(assembler.feed(&chunk));
                if assembler.is_done() {
                    self.finished = true;
                }
            }
            None => {
                self.queue.extend(assembler.finish());
                self.finished = true;
                if !assembler.is_done() {
                    tracing::debug!("Stream ended without a sentinel frame");
                }
            }
        }

        if self.finished && assembler.emitted().is_empty() {
            return Err(Error::MalformedResponse(
                "stream ended without any content".to_string(),
            ));
        }
        Ok(())
    }

    async fn read_buffered(&mut self) -> Result<String> {
        let mut body = Vec::new();
        while let Some(chunk) = self.cancel.run(self.body.next()).await? {
            body.extend_from_slice(&chunk?);
            if body.len() > MAX_BODY_BYTES {
                return Err(Error::MalformedResponse("response body too large".to_string()));
            }
        }
        if body.is_empty() {
            return Err(Error::MalformedResponse("empty response body".to_string()));
        }
        ProviderResponse::parse(self.family, &body)?.into_text()
    }
}
