//! `glm_image_gen`: image generation with inline download
//!
//! The generated image is downloaded and returned inline when possible. A
//! failed download is logged and the call still succeeds with the URL alone.

use super::GlmTool;
use super::common::{ToolError, parse_arguments, require_prompt, resolve_model};
use crate::glm::GlmApi;
use crate::glm::types::ImageRequest;
use crate::mcp::protocol::{CallToolResult, Content};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Default, Deserialize)]
pub struct ImageGenInput {
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub size: Option<String>,
    #[serde(default)]
    pub quality: Option<String>,
}

/// Text line that always accompanies a generated image
pub fn image_url_notice(url: &str) -> String {
    format!("Image URL (valid for 30 days): {}", url)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

pub struct ImageGenTool {
    api: Arc<dyn GlmApi>,
    default_model: String,
}

impl ImageGenTool {
    pub fn new(api: Arc<dyn GlmApi>, default_model: impl Into<String>) -> Self {
        Self {
            api,
            default_model: default_model.into(),
        }
    }

    async fn run(
        &self,
        input: ImageGenInput,
        cancel: &CancellationToken,
    ) -> Result<CallToolResult, ToolError> {
        require_prompt(&input.prompt)?;

        let request = ImageRequest {
            model: resolve_model(input.model.as_deref(), &self.default_model),
            prompt: input.prompt,
            quality: non_empty(input.quality),
            size: non_empty(input.size),
        };

        let response = self.api.image_generation(&request, cancel).await?;

        let Some(image) = response.data.first() else {
            tracing::warn!(model = %request.model, "Image generation returned no entries");
            return Err(ToolError::NoImageGenerated);
        };

        let mut content = Vec::with_capacity(2);

        match self.api.download_image(&image.url, cancel).await {
            Ok(downloaded) => {
                content.push(Content::image(downloaded.data, downloaded.mime_type));
            }
            Err(e) if e.is_cancelled() => return Err(e.into()),
            Err(e) => {
                tracing::warn!(
                    url = %image.url,
                    error = %e,
                    "Image download failed, returning URL only"
                );
            }
        }

        content.push(Content::text(image_url_notice(&image.url)));

        Ok(CallToolResult::success(content))
    }
}

#[async_trait]
impl GlmTool for ImageGenTool {
    fn name(&self) -> &'static str {
        "glm_image_gen"
    }

    fn description(&self) -> &'static str {
        "Generate images with CogView-4 or GLM-Image. Returns inline image and URL. | 이미지를 생성하고 인라인 이미지와 URL을 반환합니다. | 画像を生成し、インライン画像とURLを返します。 | 生成图像并返回内联图像和URL。"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "prompt": {
                    "type": "string",
                    "description": "description of the image to generate"
                },
                "model": {
                    "type": "string",
                    "description": format!(
                        "model to use: cogview-4-250304 or glm-image (default: {})",
                        self.default_model
                    )
                },
                "size": {
                    "type": "string",
                    "description": "image size e.g. 1024x1024"
                },
                "quality": {
                    "type": "string",
                    "description": "quality: hd or standard"
                }
            },
            "required": ["prompt"]
        })
    }

    async fn invoke(&self, arguments: Option<Value>, cancel: &CancellationToken) -> CallToolResult {
        let outcome = match parse_arguments::<ImageGenInput>(arguments) {
            Ok(input) => self.run(input, cancel).await,
            Err(e) => Err(e),
        };
        outcome.unwrap_or_else(ToolError::into_result)
    }
}
