//! HTTP client for the Z.AI GLM API
//!
//! One `reqwest::Client` per process, configured once with the bearer
//! credential, base URL and transport timeout. Response bodies are read chunk
//! by chunk against a byte ceiling so an oversized body is abandoned instead
//! of buffered.

use super::GlmApi;
use super::types::{ChatRequest, ChatResponse, ErrorEnvelope, ImageRequest, ImageResponse};
use super::url_guard::{UrlRejection, validate_image_url};
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Default production endpoint
pub const DEFAULT_BASE_URL: &str = "https://api.z.ai/api/paas/v4";

/// Coding-plan endpoint, selected by the caller (see `--coding`)
pub const CODING_BASE_URL: &str = "https://api.z.ai/api/coding/paas/v4";

/// Transport timeout applied to every request
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Ceiling for chat and image-generation JSON bodies (10 MiB)
pub const MAX_API_RESPONSE_BYTES: usize = 10 << 20;

/// Ceiling for raw image downloads (50 MiB)
pub const MAX_IMAGE_DOWNLOAD_BYTES: usize = 50 << 20;

/// MIME type assumed when a download carries no `Content-Type`
pub const FALLBACK_IMAGE_MIME: &str = "image/png";

/// Longest body excerpt carried in an `UnexpectedStatus` message
const BODY_PREVIEW_CHARS: usize = 200;

/// Errors from a single GLM API operation
///
/// Upstream error envelopes are normalized into `UpstreamApi`; bodies that
/// are not a recognizable envelope keep the raw status and text in
/// `UnexpectedStatus`.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("build HTTP client: {0}")]
    Build(#[source] reqwest::Error),

    #[error("marshal request: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("send request: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("read response: {0}")]
    ReadBody(#[source] reqwest::Error),

    #[error("response body exceeded {limit} bytes")]
    ResponseTooLarge { limit: usize },

    #[error("GLM API error ({code}): {message}")]
    UpstreamApi { code: String, message: String },

    #[error("GLM API returned status {status}{}", body_preview(.body))]
    UnexpectedStatus { status: u16, body: String },

    #[error("malformed response: {0}")]
    MalformedResponse(#[source] serde_json::Error),

    #[error("invalid image URL: {0}")]
    InvalidImageUrl(#[from] UrlRejection),

    #[error("download image returned status {status}")]
    DownloadFailed { status: u16 },

    #[error("request cancelled")]
    Cancelled,
}

impl ClientError {
    /// True when the caller's cancellation signal ended the operation
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ClientError::Cancelled)
    }
}

fn body_preview(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return String::new();
    }
    let preview: String = trimmed.chars().take(BODY_PREVIEW_CHARS).collect();
    if trimmed.chars().count() > BODY_PREVIEW_CHARS {
        format!(": {}...", preview)
    } else {
        format!(": {}", preview)
    }
}

/// Read-only client configuration, fixed at construction
#[derive(Clone)]
pub struct ClientConfig {
    api_key: String,
    base_url: String,
    timeout: Duration,
}

impl ClientConfig {
    /// Create a configuration; an empty `base_url` selects [`DEFAULT_BASE_URL`]
    pub fn new(api_key: impl Into<String>, base_url: &str) -> Self {
        let base_url = if base_url.trim().is_empty() {
            DEFAULT_BASE_URL
        } else {
            base_url
        };
        Self {
            api_key: api_key.into(),
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Override the transport timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Downloaded image bytes with their MIME type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadedImage {
    pub data: Vec<u8>,
    pub mime_type: String,
}

/// GLM API client
///
/// Cheap to clone; clones share the connection pool and configuration.
#[derive(Debug, Clone)]
pub struct GlmClient {
    http: Client,
    config: ClientConfig,
}

impl GlmClient {
    /// Build the client; fails only if the TLS/HTTP stack cannot be created
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(ClientError::Build)?;

        tracing::debug!(
            base_url = %config.base_url,
            timeout_seconds = config.timeout.as_secs(),
            "GLM client initialized"
        );

        Ok(Self { http, config })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// POST a JSON body to `{base}{path}` and decode a 200 response as `Resp`
    async fn post_json<Req, Resp>(&self, path: &str, request: &Req) -> Result<Resp, ClientError>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        let body = serde_json::to_vec(request).map_err(ClientError::Encode)?;
        let url = format!("{}{}", self.config.base_url, path);

        tracing::debug!(url = %url, request_bytes = body.len(), "Sending GLM API request");

        let response = self
            .http
            .post(&url)
            .header(CONTENT_TYPE, "application/json")
            .bearer_auth(&self.config.api_key)
            .body(body)
            .send()
            .await
            .map_err(ClientError::Transport)?;

        let status = response.status();
        let bytes = read_limited(response, MAX_API_RESPONSE_BYTES).await?;

        if status != StatusCode::OK {
            let error = parse_api_error(status, &bytes);
            tracing::warn!(
                url = %url,
                status = status.as_u16(),
                response_bytes = bytes.len(),
                error = %error,
                "GLM API request failed"
            );
            return Err(error);
        }

        tracing::debug!(
            url = %url,
            response_bytes = bytes.len(),
            "GLM API request succeeded"
        );

        serde_json::from_slice(&bytes).map_err(ClientError::MalformedResponse)
    }

    /// GET an image without validating the URL and without credentials
    async fn fetch_image(&self, url: &str) -> Result<DownloadedImage, ClientError> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(ClientError::Transport)?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(ClientError::DownloadFailed {
                status: status.as_u16(),
            });
        }

        let mime_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .unwrap_or(FALLBACK_IMAGE_MIME)
            .to_string();

        let data = read_limited(response, MAX_IMAGE_DOWNLOAD_BYTES).await?;

        tracing::debug!(
            bytes = data.len(),
            mime_type = %mime_type,
            "Image downloaded"
        );

        Ok(DownloadedImage { data, mime_type })
    }
}

#[async_trait]
impl GlmApi for GlmClient {
    async fn chat_completion(
        &self,
        request: &ChatRequest,
        cancel: &CancellationToken,
    ) -> Result<ChatResponse, ClientError> {
        cancellable(cancel, self.post_json("/chat/completions", request)).await
    }

    async fn image_generation(
        &self,
        request: &ImageRequest,
        cancel: &CancellationToken,
    ) -> Result<ImageResponse, ClientError> {
        cancellable(cancel, self.post_json("/images/generations", request)).await
    }

    async fn download_image(
        &self,
        url: &str,
        cancel: &CancellationToken,
    ) -> Result<DownloadedImage, ClientError> {
        let parsed = validate_image_url(url)?;
        cancellable(cancel, self.fetch_image(parsed.as_str())).await
    }
}

/// Race `operation` against the cancellation signal
///
/// Dropping the losing future aborts the in-flight request and closes its
/// connection.
async fn cancellable<T, F>(cancel: &CancellationToken, operation: F) -> Result<T, ClientError>
where
    F: Future<Output = Result<T, ClientError>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ClientError::Cancelled),
        result = operation => result,
    }
}

/// Read a response body, failing once it grows past `limit` bytes
async fn read_limited(mut response: reqwest::Response, limit: usize) -> Result<Vec<u8>, ClientError> {
    let capacity = response
        .content_length()
        .map(|len| len.min(limit as u64) as usize)
        .unwrap_or(0);
    let mut body = Vec::with_capacity(capacity);

    while let Some(chunk) = response.chunk().await.map_err(ClientError::ReadBody)? {
        if body.len() + chunk.len() > limit {
            tracing::warn!(
                received_bytes = body.len() + chunk.len(),
                limit_bytes = limit,
                "Response body exceeded size limit, abandoning read"
            );
            return Err(ClientError::ResponseTooLarge { limit });
        }
        body.extend_from_slice(&chunk);
    }

    Ok(body)
}

/// Normalize a non-200 response body into a [`ClientError`]
fn parse_api_error(status: StatusCode, body: &[u8]) -> ClientError {
    match serde_json::from_slice::<ErrorEnvelope>(body) {
        Ok(envelope) if !envelope.error.message.is_empty() => ClientError::UpstreamApi {
            code: envelope.error.code_text(),
            message: envelope.error.message,
        },
        _ => ClientError::UnexpectedStatus {
            status: status.as_u16(),
            body: String::from_utf8_lossy(body).into_owned(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_empty_base_url_selects_default() {
        let config = ClientConfig::new("key", "");
        assert_eq!(config.base_url(), DEFAULT_BASE_URL);
        assert_eq!(config.timeout(), Duration::from_secs(120));
    }

    #[test]
    fn test_base_url_trailing_slash_is_trimmed() {
        let config = ClientConfig::new("key", "https://api.z.ai/api/coding/paas/v4/");
        assert_eq!(config.base_url(), CODING_BASE_URL);
    }

    #[test]
    fn test_config_debug_redacts_api_key() {
        let config = ClientConfig::new("super-secret", "");
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("super-secret"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn test_parse_api_error_with_envelope() {
        let err = parse_api_error(
            StatusCode::BAD_REQUEST,
            br#"{"error":{"code":"1211","message":"Unknown Model"}}"#,
        );
        assert_eq!(err.to_string(), "GLM API error (1211): Unknown Model");
    }

    #[test]
    fn test_parse_api_error_empty_message_falls_back_to_status() {
        let err = parse_api_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            br#"{"error":{"code":"500","message":""}}"#,
        );
        assert!(matches!(
            err,
            ClientError::UnexpectedStatus { status: 500, .. }
        ));
    }

    #[test]
    fn test_parse_api_error_non_json_keeps_body() {
        let err = parse_api_error(StatusCode::BAD_GATEWAY, b"<html>bad gateway</html>");
        match &err {
            ClientError::UnexpectedStatus { status, body } => {
                assert_eq!(*status, 502);
                assert_eq!(body, "<html>bad gateway</html>");
            }
            other => panic!("expected UnexpectedStatus, got {:?}", other),
        }
        assert_eq!(
            err.to_string(),
            "GLM API returned status 502: <html>bad gateway</html>"
        );
    }

    #[test]
    fn test_unexpected_status_preview_is_truncated() {
        let err = ClientError::UnexpectedStatus {
            status: 503,
            body: "x".repeat(1_000),
        };
        let msg = err.to_string();
        assert!(msg.ends_with("..."));
        assert!(msg.len() < 300);
    }

    #[test]
    fn test_unexpected_status_without_body() {
        let err = ClientError::UnexpectedStatus {
            status: 404,
            body: String::new(),
        };
        assert_eq!(err.to_string(), "GLM API returned status 404");
    }

    #[tokio::test]
    async fn test_read_limited_rejects_oversized_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/big"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![b'a'; 4096]))
            .mount(&server)
            .await;

        let response = reqwest::get(format!("{}/big", server.uri())).await.unwrap();
        let result = read_limited(response, 1024).await;
        assert!(matches!(
            result,
            Err(ClientError::ResponseTooLarge { limit: 1024 })
        ));
    }

    #[tokio::test]
    async fn test_read_limited_accepts_body_at_limit() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/exact"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![b'a'; 1024]))
            .mount(&server)
            .await;

        let response = reqwest::get(format!("{}/exact", server.uri())).await.unwrap();
        let body = read_limited(response, 1024).await.unwrap();
        assert_eq!(body.len(), 1024);
    }

    #[tokio::test]
    async fn test_fetch_image_uses_content_type() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/cat.jpg"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "image/jpeg")
                    .set_body_bytes(vec![0xFF, 0xD8, 0xFF]),
            )
            .mount(&server)
            .await;

        let client = GlmClient::new(ClientConfig::new("key", "")).unwrap();
        let image = client
            .fetch_image(&format!("{}/cat.jpg", server.uri()))
            .await
            .unwrap();
        assert_eq!(image.mime_type, "image/jpeg");
        assert_eq!(image.data, vec![0xFF, 0xD8, 0xFF]);
    }

    #[tokio::test]
    async fn test_fetch_image_defaults_mime_to_png() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/raw"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1, 2, 3]))
            .mount(&server)
            .await;

        let client = GlmClient::new(ClientConfig::new("key", "")).unwrap();
        let image = client
            .fetch_image(&format!("{}/raw", server.uri()))
            .await
            .unwrap();
        assert_eq!(image.mime_type, FALLBACK_IMAGE_MIME);
    }

    #[tokio::test]
    async fn test_fetch_image_non_200_is_download_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/gone.png"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = GlmClient::new(ClientConfig::new("key", "")).unwrap();
        let err = client
            .fetch_image(&format!("{}/gone.png", server.uri()))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::DownloadFailed { status: 404 }));
        assert_eq!(err.to_string(), "download image returned status 404");
    }

    #[tokio::test]
    async fn test_fetch_image_sends_no_authorization() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/img.png"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0]))
            .mount(&server)
            .await;

        let client = GlmClient::new(ClientConfig::new("secret-key", "")).unwrap();
        client
            .fetch_image(&format!("{}/img.png", server.uri()))
            .await
            .unwrap();

        let received = server.received_requests().await.unwrap();
        assert_eq!(received.len(), 1);
        assert!(received[0].headers.get("authorization").is_none());
    }

    #[tokio::test]
    async fn test_download_rejects_unsafe_url_without_request() {
        let server = MockServer::start().await;
        let client = GlmClient::new(ClientConfig::new("key", "")).unwrap();

        let err = client
            .download_image(&format!("{}/img.png", server.uri()), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, ClientError::InvalidImageUrl(_)));
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_token_aborts_operation() {
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result: Result<(), ClientError> =
            cancellable(&cancel, std::future::pending()).await;
        assert!(matches!(result, Err(ClientError::Cancelled)));
    }
}
