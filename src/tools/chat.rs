//! `glm_chat`: plain chat completion

use super::GlmTool;
use super::common::{
    ToolError, build_messages, extract_content, parse_arguments, require_prompt, resolve_model,
    validate_chat_params,
};
use crate::glm::GlmApi;
use crate::glm::types::ChatRequest;
use crate::mcp::protocol::{CallToolResult, Content};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Default, Deserialize)]
pub struct ChatInput {
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub system_msg: Option<String>,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub max_tokens: Option<i64>,
}

pub struct ChatTool {
    api: Arc<dyn GlmApi>,
    default_model: String,
}

impl ChatTool {
    pub fn new(api: Arc<dyn GlmApi>, default_model: impl Into<String>) -> Self {
        Self {
            api,
            default_model: default_model.into(),
        }
    }

    async fn run(
        &self,
        input: ChatInput,
        cancel: &CancellationToken,
    ) -> Result<CallToolResult, ToolError> {
        require_prompt(&input.prompt)?;
        let max_tokens = validate_chat_params(input.temperature, input.max_tokens)?;

        let mut request = ChatRequest::new(
            resolve_model(input.model.as_deref(), &self.default_model),
            build_messages(input.system_msg.as_deref(), &input.prompt),
        );
        request.temperature = input.temperature;
        request.max_tokens = max_tokens;

        let response = self.api.chat_completion(&request, cancel).await?;

        Ok(CallToolResult::success(vec![Content::text(
            extract_content(&response),
        )]))
    }
}

#[async_trait]
impl GlmTool for ChatTool {
    fn name(&self) -> &'static str {
        "glm_chat"
    }

    fn description(&self) -> &'static str {
        "Chat with GLM model. Use for general questions, code generation, and text creation. | GLM 모델과 대화합니다. | GLMモデルと会話します。 | 与GLM模型对话，用于问答、代码生成和文本创作。"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "prompt": {
                    "type": "string",
                    "description": "user message to send"
                },
                "model": {
                    "type": "string",
                    "description": format!("model ID override (default: {})", self.default_model)
                },
                "system_msg": {
                    "type": "string",
                    "description": "optional system message"
                },
                "temperature": {
                    "type": "number",
                    "minimum": 0.0,
                    "maximum": 1.0,
                    "description": "sampling temperature between 0.0 and 1.0"
                },
                "max_tokens": {
                    "type": "integer",
                    "minimum": 1,
                    "description": "maximum number of output tokens"
                }
            },
            "required": ["prompt"]
        })
    }

    async fn invoke(&self, arguments: Option<Value>, cancel: &CancellationToken) -> CallToolResult {
        let outcome = match parse_arguments::<ChatInput>(arguments) {
            Ok(input) => self.run(input, cancel).await,
            Err(e) => Err(e),
        };
        outcome.unwrap_or_else(ToolError::into_result)
    }
}
