//! `glm_web_search`: chat with web search, answer followed by its sources

use super::GlmTool;
use super::common::{
    ToolError, build_messages, extract_content, parse_arguments, require_prompt, resolve_model,
    validate_chat_params,
};
use crate::glm::GlmApi;
use crate::glm::types::{ChatRequest, ChatResponse, WebSearch};
use crate::mcp::protocol::{CallToolResult, Content};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Default, Deserialize)]
pub struct WebSearchInput {
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub system_msg: Option<String>,
    #[serde(default)]
    pub max_tokens: Option<i64>,
}

/// Answer text, then a numbered markdown list of references if any came back
pub fn format_with_sources(response: &ChatResponse) -> String {
    let mut lines = vec![extract_content(response)];

    let references = response
        .web_search
        .as_ref()
        .map(|result| result.refer.as_slice())
        .unwrap_or_default();

    if !references.is_empty() {
        lines.push("\n---\n**Sources:**".to_string());
        lines.extend(
            references
                .iter()
                .enumerate()
                .map(|(i, reference)| format!("{}. [{}]({})", i + 1, reference.title, reference.link)),
        );
    }

    lines.join("\n")
}

pub struct WebSearchTool {
    api: Arc<dyn GlmApi>,
    default_model: String,
}

impl WebSearchTool {
    pub fn new(api: Arc<dyn GlmApi>, default_model: impl Into<String>) -> Self {
        Self {
            api,
            default_model: default_model.into(),
        }
    }

    async fn run(
        &self,
        input: WebSearchInput,
        cancel: &CancellationToken,
    ) -> Result<CallToolResult, ToolError> {
        require_prompt(&input.prompt)?;
        let max_tokens = validate_chat_params(None, input.max_tokens)?;

        let mut request = ChatRequest::new(
            resolve_model(input.model.as_deref(), &self.default_model),
            build_messages(input.system_msg.as_deref(), &input.prompt),
        );
        request.web_search = Some(WebSearch::enabled());
        request.max_tokens = max_tokens;

        let response = self.api.chat_completion(&request, cancel).await?;

        tracing::debug!(
            references = response
                .web_search
                .as_ref()
                .map_or(0, |result| result.refer.len()),
            "Web search completed"
        );

        Ok(CallToolResult::success(vec![Content::text(
            format_with_sources(&response),
        )]))
    }
}

#[async_trait]
impl GlmTool for WebSearchTool {
    fn name(&self) -> &'static str {
        "glm_web_search"
    }

    fn description(&self) -> &'static str {
        "Chat with web search enabled. Returns up-to-date answers with source references. | 웹 검색으로 최신 정보와 출처를 포함한 답변을 생성합니다. | Web検索で最新情報とソースを含む回答を生成します。 | 启用网络搜索，返回包含来源的最新信息。"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "prompt": {
                    "type": "string",
                    "description": "question to search and answer"
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
        let outcome = match parse_arguments::<WebSearchInput>(arguments) {
            Ok(input) => self.run(input, cancel).await,
            Err(e) => Err(e),
        };
        outcome.unwrap_or_else(ToolError::into_result)
    }
}
