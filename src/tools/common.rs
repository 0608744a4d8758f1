//! Helpers shared by every tool: argument decoding, validation, request
//! assembly and response text extraction.

use crate::glm::ClientError;
use crate::glm::types::{ChatResponse, Message};
use crate::mcp::protocol::CallToolResult;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Placeholder returned when the model produced no text
pub const EMPTY_RESPONSE: &str = "(empty response)";

const PROMPT_REQUIRED: &str =
    "prompt is required. | prompt는 필수입니다. | promptは必須です。 | prompt为必填项。";

const NO_IMAGE_GENERATED: &str = "No image generated. | 이미지 생성 결과가 없습니다. | 画像が生成されませんでした。 | 未生成图像。";

/// Everything that turns a tool call into an error-flagged result
///
/// None of these are fatal to the server.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("{}", PROMPT_REQUIRED)]
    MissingPrompt,

    #[error("invalid arguments: {0}")]
    InvalidArguments(#[source] serde_json::Error),

    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Client(#[from] ClientError),

    #[error("{}", NO_IMAGE_GENERATED)]
    NoImageGenerated,
}

impl ToolError {
    /// Render as an error-flagged tool result
    ///
    /// User-facing notices (missing prompt, no image) are passed through
    /// as-is; everything else is prefixed with `Error: `.
    pub fn into_result(self) -> CallToolResult {
        match self {
            ToolError::MissingPrompt | ToolError::NoImageGenerated => {
                CallToolResult::error_text(self.to_string())
            }
            other => CallToolResult::error_text(format!("Error: {}", other)),
        }
    }
}

/// Decode tool arguments; a missing argument object decodes as `{}`
pub fn parse_arguments<T: DeserializeOwned>(arguments: Option<Value>) -> Result<T, ToolError> {
    let value = match arguments {
        None | Some(Value::Null) => Value::Object(Default::default()),
        Some(value) => value,
    };
    serde_json::from_value(value).map_err(ToolError::InvalidArguments)
}

/// Reject an empty prompt before anything is sent upstream
pub fn require_prompt(prompt: &str) -> Result<(), ToolError> {
    if prompt.is_empty() {
        return Err(ToolError::MissingPrompt);
    }
    Ok(())
}

/// Validate optional sampling parameters
///
/// Temperature, when present, must lie in [0.0, 1.0]. Max tokens, when
/// present, must be at least 1 and fit the wire type. Returns the max token
/// count narrowed for the request.
pub fn validate_chat_params(
    temperature: Option<f64>,
    max_tokens: Option<i64>,
) -> Result<Option<u32>, ToolError> {
    if let Some(temp) = temperature
        && !(0.0..=1.0).contains(&temp)
    {
        return Err(ToolError::Validation(
            "temperature must be between 0.0 and 1.0".to_string(),
        ));
    }

    match max_tokens {
        None => Ok(None),
        Some(n) if n < 1 => Err(ToolError::Validation(
            "max_tokens must be at least 1".to_string(),
        )),
        Some(n) => u32::try_from(n).map(Some).map_err(|_| {
            ToolError::Validation(format!("max_tokens must not exceed {}", u32::MAX))
        }),
    }
}

/// Caller's model when given and non-empty, otherwise `default_model`
pub fn resolve_model(requested: Option<&str>, default_model: &str) -> String {
    requested
        .filter(|model| !model.is_empty())
        .unwrap_or(default_model)
        .to_string()
}

/// Optional system message (only when non-empty) followed by the user prompt
pub fn build_messages(system_msg: Option<&str>, prompt: &str) -> Vec<Message> {
    let mut messages = Vec::with_capacity(2);
    if let Some(system) = system_msg.filter(|s| !s.is_empty()) {
        messages.push(Message::system(system));
    }
    messages.push(Message::user(prompt));
    messages
}

/// First choice's content, or [`EMPTY_RESPONSE`] when empty or absent
pub fn extract_content(response: &ChatResponse) -> String {
    response
        .first_message()
        .and_then(|message| message.content.as_deref())
        .filter(|content| !content.is_empty())
        .unwrap_or(EMPTY_RESPONSE)
        .to_string()
}
