//! GLM API client
//!
//! Wraps the three upstream operations used by the tools: chat completion,
//! image generation and image download. See [`GlmClient`] for the concrete
//! HTTP implementation and [`GlmApi`] for the seam the tools depend on.

pub mod client;
pub mod types;
pub mod url_guard;

pub use client::{
    ClientConfig, ClientError, CODING_BASE_URL, DEFAULT_BASE_URL, DownloadedImage, GlmClient,
};
pub use url_guard::{UrlRejection, validate_image_url};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use types::{ChatRequest, ChatResponse, ImageRequest, ImageResponse};

/// Upstream operations available to the tools
///
/// Allows dependency injection of the HTTP client, enabling tests that
/// exercise tool output mapping without network calls.
///
/// Every operation makes a single attempt. Triggering `cancel` aborts the
/// in-flight call and yields [`ClientError::Cancelled`].
#[async_trait]
pub trait GlmApi: Send + Sync {
    /// `POST {base}/chat/completions`
    async fn chat_completion(
        &self,
        request: &ChatRequest,
        cancel: &CancellationToken,
    ) -> Result<ChatResponse, ClientError>;

    /// `POST {base}/images/generations`
    async fn image_generation(
        &self,
        request: &ImageRequest,
        cancel: &CancellationToken,
    ) -> Result<ImageResponse, ClientError>;

    /// `GET {url}` after the URL passes [`validate_image_url`]
    async fn download_image(
        &self,
        url: &str,
        cancel: &CancellationToken,
    ) -> Result<DownloadedImage, ClientError>;
}
