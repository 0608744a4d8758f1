//! GLM tools exposed over MCP
//!
//! Each tool validates its input, builds one upstream request, calls the
//! [`GlmApi`] and maps the result into tool content. Expected failures
//! (bad input, upstream errors) come back as error-flagged results; a tool
//! invocation never fails at the transport level.
//!
//! | Tool | Upstream call | Extra switches |
//! |------|---------------|----------------|
//! | `glm_chat` | chat completion | temperature |
//! | `glm_chat_with_thinking` | chat completion | `thinking: enabled` |
//! | `glm_web_search` | chat completion | `web_search: search_pro_jina` |
//! | `glm_image_gen` | image generation + download | size, quality |

pub mod chat;
pub mod common;
pub mod image_gen;
pub mod thinking;
pub mod web_search;

pub use chat::ChatTool;
pub use common::{EMPTY_RESPONSE, ToolError};
pub use image_gen::ImageGenTool;
pub use thinking::ThinkingTool;
pub use web_search::WebSearchTool;

use crate::glm::GlmApi;
use crate::mcp::protocol::{CallToolResult, ToolDefinition};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Chat model used when neither the caller nor the configuration names one
pub const DEFAULT_CHAT_MODEL: &str = "glm-4.7";

/// Image model used when neither the caller nor the configuration names one
pub const DEFAULT_IMAGE_MODEL: &str = "cogview-4-250304";

/// A callable tool
///
/// Implementations share the validate / build / call / map shape but own
/// their input and output formats.
#[async_trait]
pub trait GlmTool: Send + Sync {
    /// Unique tool name (e.g., "glm_chat")
    fn name(&self) -> &'static str;

    /// Human-readable description shown to MCP clients
    fn description(&self) -> &'static str;

    /// JSON Schema for the tool's arguments
    fn input_schema(&self) -> Value;

    /// Run the tool; expected failures are returned as error-flagged results
    async fn invoke(&self, arguments: Option<Value>, cancel: &CancellationToken) -> CallToolResult;

    /// Definition advertised by `tools/list`
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            input_schema: self.input_schema(),
        }
    }
}

/// Default models applied when a call does not name one
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolSettings {
    chat_model: String,
    image_model: String,
}

impl ToolSettings {
    /// Empty names fall back to [`DEFAULT_CHAT_MODEL`] / [`DEFAULT_IMAGE_MODEL`]
    pub fn new(chat_model: &str, image_model: &str) -> Self {
        let or_default = |name: &str, fallback: &str| {
            if name.trim().is_empty() {
                fallback.to_string()
            } else {
                name.to_string()
            }
        };
        Self {
            chat_model: or_default(chat_model, DEFAULT_CHAT_MODEL),
            image_model: or_default(image_model, DEFAULT_IMAGE_MODEL),
        }
    }

    pub fn chat_model(&self) -> &str {
        &self.chat_model
    }

    pub fn image_model(&self) -> &str {
        &self.image_model
    }
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self::new("", "")
    }
}

/// The four GLM tools, in advertisement order
pub struct ToolRegistry {
    tools: Vec<Arc<dyn GlmTool>>,
}

impl ToolRegistry {
    /// Register every GLM tool against the given API
    pub fn new(api: Arc<dyn GlmApi>, settings: &ToolSettings) -> Self {
        let tools: Vec<Arc<dyn GlmTool>> = vec![
            Arc::new(ChatTool::new(Arc::clone(&api), settings.chat_model())),
            Arc::new(ThinkingTool::new(Arc::clone(&api), settings.chat_model())),
            Arc::new(WebSearchTool::new(Arc::clone(&api), settings.chat_model())),
            Arc::new(ImageGenTool::new(api, settings.image_model())),
        ];

        tracing::debug!(
            tools = tools.len(),
            chat_model = %settings.chat_model(),
            image_model = %settings.image_model(),
            "Tool registry initialized"
        );

        Self { tools }
    }

    /// Look up a tool by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn GlmTool>> {
        self.tools.iter().find(|tool| tool.name() == name).cloned()
    }

    /// Definitions for `tools/list`
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(|tool| tool.definition()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}
