//! Wire types for the GLM chat completion and image generation APIs
//!
//! Optional fields are `Option<T>` on both sides of the wire. A request never
//! serializes an absent field, and a response decodes a missing or `null`
//! field as `None` rather than as a zero value, so "not set" and "explicitly
//! zero" stay distinguishable. Echo and metadata fields that are not optional
//! (`id`, `role`, `refer` and the like) take their zero value for both.

use serde::{Deserialize, Deserializer, Serialize};

/// Fixed search engine identifier sent with web-search requests
pub const WEB_SEARCH_ENGINE: &str = "search_pro_jina";

/// Decode an explicit `null` the same way as a missing field
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

// =============================================================================
// Chat Completions - Request
// =============================================================================

/// Message role accepted by the chat completions endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

/// A single request message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Thinking mode switch (`{"type": "enabled"}`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thinking {
    #[serde(rename = "type")]
    pub mode: ThinkingMode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThinkingMode {
    Enabled,
    Disabled,
}

impl Thinking {
    pub fn enabled() -> Self {
        Self {
            mode: ThinkingMode::Enabled,
        }
    }
}

/// Web search switch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebSearch {
    pub enable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_engine: Option<String>,
}

impl WebSearch {
    /// Web search enabled with the fixed search engine
    pub fn enabled() -> Self {
        Self {
            enable: true,
            search_engine: Some(WEB_SEARCH_ENGINE.to_string()),
        }
    }
}

/// Chat completion request body
///
/// Built in one go by the tool layer and never mutated after it is handed to
/// the client. `stream` is always `false`; streaming is not supported.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<Message>,
    pub stream: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thinking: Option<Thinking>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub web_search: Option<WebSearch>,
}

impl ChatRequest {
    /// Non-streaming request with every optional switch unset
    pub fn new(model: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            model: model.into(),
            messages,
            stream: false,
            temperature: None,
            max_tokens: None,
            thinking: None,
            web_search: None,
        }
    }
}

// =============================================================================
// Chat Completions - Response
// =============================================================================

/// Chat completion response body
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub created: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub model: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub choices: Vec<Choice>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub web_search: Option<WebSearchResult>,
}

impl ChatResponse {
    /// Message of the first choice, if any
    pub fn first_message(&self) -> Option<&ResponseMessage> {
        self.choices.first().map(|choice| &choice.message)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Choice {
    #[serde(default, deserialize_with = "null_as_default")]
    pub index: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub message: ResponseMessage,
}

/// Assistant message inside a choice
///
/// `content` is `null` when the model answers with tool calls only, so it is
/// optional like the reasoning text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseMessage {
    #[serde(default, deserialize_with = "null_as_default")]
    pub role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning_content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(rename = "type", default, deserialize_with = "null_as_default")]
    pub kind: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub function: FunctionCall,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    /// JSON-encoded arguments, passed through untouched
    #[serde(default, deserialize_with = "null_as_default")]
    pub arguments: String,
}

/// Token accounting
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    #[serde(default, deserialize_with = "null_as_default")]
    pub prompt_tokens: u32,
    #[serde(default, deserialize_with = "null_as_default")]
    pub completion_tokens: u32,
    #[serde(default, deserialize_with = "null_as_default")]
    pub total_tokens: u32,
}

/// Search references attached to a web-search response
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WebSearchResult {
    #[serde(default, deserialize_with = "null_as_default")]
    pub refer: Vec<SearchReference>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchReference {
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub link: String,
    /// Snippet of the referenced page
    #[serde(rename = "content", default, deserialize_with = "null_as_default")]
    pub snippet: String,
}

// =============================================================================
// Image Generation
// =============================================================================

/// Image generation request body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRequest {
    pub model: String,
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality: Option<String>,
    /// Size hint such as `1024x1024`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
}

/// Image generation response body
///
/// Entries carry remote URLs only. The bytes are fetched separately.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageResponse {
    #[serde(default, deserialize_with = "null_as_default")]
    pub created: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub data: Vec<ImageData>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageData {
    #[serde(default, deserialize_with = "null_as_default")]
    pub url: String,
}

// =============================================================================
// Error Envelope
// =============================================================================

/// Error body returned with non-200 statuses: `{"error": {"code", "message"}}`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorEnvelope {
    #[serde(default, deserialize_with = "null_as_default")]
    pub error: ErrorDetail,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorDetail {
    /// Usually a string such as `"1211"`, occasionally a bare number
    #[serde(default)]
    pub code: Option<serde_json::Value>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub message: String,
}

impl ErrorDetail {
    /// Code rendered as plain text (`""` when absent)
    pub fn code_text(&self) -> String {
        match &self.code {
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(serde_json::Value::Null) | None => String::new(),
            Some(other) => other.to_string(),
        }
    }
}
