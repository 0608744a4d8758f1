//! `glm_chat_with_thinking`: chat with thinking mode enabled
//!
//! The reasoning text, when present, is wrapped in a `<thinking>` block and
//! placed before the final answer.

use super::GlmTool;
use super::common::{
    EMPTY_RESPONSE, ToolError, build_messages, parse_arguments, require_prompt, resolve_model,
    validate_chat_params,
};
use crate::glm::GlmApi;
use crate::glm::types::{ChatRequest, ChatResponse, Thinking};
use crate::mcp::protocol::{CallToolResult, Content};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Default, Deserialize)]
pub struct ThinkingInput {
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub system_msg: Option<String>,
    #[serde(default)]
    pub max_tokens: Option<i64>,
}

/// Reasoning block (if any) and answer joined by a blank line
///
/// Falls back to [`EMPTY_RESPONSE`] when both are empty or absent.
pub fn format_thinking_output(response: &ChatResponse) -> String {
    let mut parts = Vec::with_capacity(2);

    if let Some(message) = response.first_message() {
        if let Some(reasoning) = message.reasoning_content.as_deref().filter(|r| !r.is_empty()) {
            parts.push(format!("<thinking>\n{}\n</thinking>", reasoning));
        }
        if let Some(content) = message.content.as_deref().filter(|c| !c.is_empty()) {
            parts.push(content.to_string());
        }
    }

    if parts.is_empty() {
        return EMPTY_RESPONSE.to_string();
    }
    parts.join("\n\n")
}

pub struct ThinkingTool {
    api: Arc<dyn GlmApi>,
    default_model: String,
}

impl ThinkingTool {
    pub fn new(api: Arc<dyn GlmApi>, default_model: impl Into<String>) -> Self {
        Self {
            api,
            default_model: default_model.into(),
        }
    }

    async fn run(
        &self,
        input: ThinkingInput,
        cancel: &CancellationToken,
    ) -> Result<CallToolResult, ToolError> {
        require_prompt(&input.prompt)?;
        let max_tokens = validate_chat_params(None, input.max_tokens)?;

        let mut request = ChatRequest::new(
            resolve_model(input.model.as_deref(), &self.default_model),
            build_messages(input.system_msg.as_deref(), &input.prompt),
        );
        request.thinking = Some(Thinking::enabled());
        request.max_tokens = max_tokens;

        let response = self.api.chat_completion(&request, cancel).await?;

        Ok(CallToolResult::success(vec![Content::text(
            format_thinking_output(&response),
        )]))
    }
}

#[async_trait]
impl GlmTool for ThinkingTool {
    fn name(&self) -> &'static str {
        "glm_chat_with_thinking"
    }

    fn description(&self) -> &'static str {
        "Chat with thinking mode enabled. Returns both reasoning process and final answer. | 사고 모드로 추론 과정과 최종 답변을 반환합니다. | 思考モードで推論過程と最終回答を返します。 | 启用思考模式，返回推理过程和最终答案。"
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
        let outcome = match parse_arguments::<ThinkingInput>(arguments) {
            Ok(input) => self.run(input, cancel).await,
            Err(e) => Err(e),
        };
        outcome.unwrap_or_else(ToolError::into_result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::glm::types::{Choice, ResponseMessage, ThinkingMode};
    use crate::tools::test_support::MockApi;

    fn reply(reasoning: Option<&str>, content: Option<&str>) -> ChatResponse {
        ChatResponse {
            choices: vec![Choice {
                message: ResponseMessage {
                    role: "assistant".to_string(),
                    content: content.map(str::to_string),
                    reasoning_content: reasoning.map(str::to_string),
                    ..Default::default()
                },
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    #[test]
    fn test_reasoning_precedes_answer() {
        let output = format_thinking_output(&reply(Some("step 1"), Some("42")));
        assert_eq!(output, "<thinking>\nstep 1\n</thinking>\n\n42");
    }

    #[test]
    fn test_answer_only() {
        assert_eq!(format_thinking_output(&reply(None, Some("42"))), "42");
        assert_eq!(format_thinking_output(&reply(Some(""), Some("42"))), "42");
    }

    #[test]
    fn test_reasoning_only() {
        assert_eq!(
            format_thinking_output(&reply(Some("hmm"), Some(""))),
            "<thinking>\nhmm\n</thinking>"
        );
    }

    #[test]
    fn test_both_empty_yields_placeholder() {
        assert_eq!(format_thinking_output(&reply(Some(""), Some(""))), "(empty response)");
        assert_eq!(format_thinking_output(&reply(None, None)), "(empty response)");
        assert_eq!(format_thinking_output(&ChatResponse::default()), "(empty response)");
    }

    #[tokio::test]
    async fn test_request_enables_thinking_without_temperature() {
        let api = Arc::new(MockApi::default().with_chat(Ok(reply(Some("r"), Some("a")))));
        let tool = ThinkingTool::new(api.clone(), "glm-4.7");

        let result = tool
            .invoke(
                Some(json!({"prompt": "why?", "max_tokens": 128, "temperature": 0.9})),
                &CancellationToken::new(),
            )
            .await;

        assert!(!result.is_error);
        let request = api.last_chat_request();
        assert_eq!(request.thinking.map(|t| t.mode), Some(ThinkingMode::Enabled));
        assert_eq!(request.max_tokens, Some(128));
        // temperature is not a parameter of this tool
        assert_eq!(request.temperature, None);
        assert_eq!(request.web_search, None);
    }

    #[tokio::test]
    async fn test_invalid_max_tokens_is_rejected() {
        let api = Arc::new(MockApi::default());
        let tool = ThinkingTool::new(api.clone(), "glm-4.7");

        let result = tool
            .invoke(
                Some(json!({"prompt": "why?", "max_tokens": -1})),
                &CancellationToken::new(),
            )
            .await;

        assert!(result.is_error);
        assert_eq!(api.calls(), 0);
    }
}
