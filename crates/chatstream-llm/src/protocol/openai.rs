//! `OpenAI` chat completion API wire format types

use serde::{Deserialize, Serialize};
use serde_json::Value;

// -- Request types --

/// `OpenAI` chat completion request
#[derive(Debug, Clone, Serialize)]
pub struct ChatCompletionRequest {
    /// Model identifier
    pub model: String,
    /// Conversation messages
    pub messages: Vec<ChatMessage>,
    /// Always streamed
    pub stream: bool,
    /// Stream options (e.g. `include_usage`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream_options: Option<StreamOptions>,
    /// Token ceiling for current models
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_completion_tokens: Option<u32>,
    /// Token ceiling for compatible servers that predate `max_completion_tokens`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Tool definitions
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ChatTool>,
    /// Structured output constraint
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_format: Option<ResponseFormat>,
    /// End-user identifier
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
}

/// `OpenAI` stream options
#[derive(Debug, Clone, Serialize)]
pub struct StreamOptions {
    /// Include usage statistics in stream
    pub include_usage: bool,
}

/// `OpenAI` message within a request
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum ChatMessage {
    /// System instructions
    System {
        /// Instruction text
        content: String,
    },
    /// User message
    User {
        /// Text or multipart content
        content: UserContent,
    },
    /// Assistant message, possibly carrying tool calls
    Assistant {
        /// Answer text
        #[serde(skip_serializing_if = "Option::is_none")]
        content: Option<String>,
        /// Tool calls made by the assistant
        #[serde(skip_serializing_if = "Vec::is_empty")]
        tool_calls: Vec<ChatToolCall>,
    },
    /// Tool result
    Tool {
        /// Tool output
        content: String,
        /// Tool call ID this message responds to
        tool_call_id: String,
    },
}

/// User content can be a string or array of content parts
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum UserContent {
    /// Plain text content
    Text(String),
    /// Array of content parts
    Parts(Vec<ContentPart>),
}

/// Individual content part in a user message
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    /// Text content
    Text {
        /// The text string
        text: String,
    },
    /// Image content via URL
    ImageUrl {
        /// Image URL specification
        image_url: ImageUrl,
    },
}

/// Image URL specification for `OpenAI`
#[derive(Debug, Clone, Serialize)]
pub struct ImageUrl {
    /// Base64 data URI
    pub url: String,
    /// Detail level
    pub detail: String,
}

/// `OpenAI` tool definition
#[derive(Debug, Clone, Serialize)]
pub struct ChatTool {
    /// Tool type (always "function")
    #[serde(rename = "type")]
    pub tool_type: &'static str,
    /// Function specification
    pub function: FunctionDefinition,
}

/// `OpenAI` function specification
#[derive(Debug, Clone, Serialize)]
pub struct FunctionDefinition {
    /// Function name
    pub name: String,
    /// Human-readable description
    pub description: String,
    /// JSON Schema for parameters
    pub parameters: Value,
}

/// `OpenAI` tool call within an assistant message
#[derive(Debug, Clone, Serialize)]
pub struct ChatToolCall {
    /// Unique tool call identifier
    pub id: String,
    /// Tool type (always "function")
    #[serde(rename = "type")]
    pub tool_type: &'static str,
    /// Function call details
    pub function: FunctionCall,
}

/// Function call details within a tool call
#[derive(Debug, Clone, Serialize)]
pub struct FunctionCall {
    /// Function name
    pub name: String,
    /// JSON-encoded arguments
    pub arguments: String,
}

/// Structured output constraint
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponseFormat {
    /// Answer must match a JSON Schema
    JsonSchema {
        /// Named schema
        json_schema: JsonSchemaFormat,
    },
}

/// Named JSON Schema for structured output
#[derive(Debug, Clone, Serialize)]
pub struct JsonSchemaFormat {
    /// Schema name
    pub name: String,
    /// The schema
    pub schema: Value,
    /// Enforce the schema exactly
    pub strict: bool,
}

// -- Streaming types --

/// `OpenAI` streaming chunk
#[derive(Debug, Clone, Deserialize)]
pub struct ChatCompletionChunk {
    /// Delta choices
    #[serde(default)]
    pub choices: Vec<StreamChoice>,
    /// Usage (present on final chunk when `stream_options.include_usage` is true)
    #[serde(default)]
    pub usage: Option<Usage>,
}

/// Choice within a streaming chunk
#[derive(Debug, Clone, Deserialize)]
pub struct StreamChoice {
    /// Incremental delta
    #[serde(default)]
    pub delta: StreamDelta,
    /// Finish reason (present on final chunk)
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// Delta content within a streaming choice
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StreamDelta {
    /// Incremental text content
    #[serde(default)]
    pub content: Option<String>,
    /// Incremental reasoning from compatible reasoning servers
    #[serde(default)]
    pub reasoning_content: Option<String>,
    /// Incremental tool calls
    #[serde(default)]
    pub tool_calls: Vec<StreamToolCall>,
}

/// Tool call within a streaming delta
#[derive(Debug, Clone, Deserialize)]
pub struct StreamToolCall {
    /// Index within the `tool_calls` array
    #[serde(default)]
    pub index: usize,
    /// Tool call ID (first chunk only)
    #[serde(default)]
    pub id: Option<String>,
    /// Partial function call
    #[serde(default)]
    pub function: Option<StreamFunctionCall>,
}

/// Partial function call within a streaming tool call
#[derive(Debug, Clone, Deserialize)]
pub struct StreamFunctionCall {
    /// Function name (first chunk only)
    #[serde(default)]
    pub name: Option<String>,
    /// Incremental arguments fragment
    #[serde(default)]
    pub arguments: Option<String>,
}

/// Token usage in an `OpenAI` response
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct Usage {
    /// Prompt tokens
    #[serde(default)]
    pub prompt_tokens: u64,
    /// Completion tokens
    #[serde(default)]
    pub completion_tokens: u64,
}

// -- Models list types --

/// `OpenAI` models list response
#[derive(Debug, Clone, Deserialize)]
pub struct ModelList {
    /// List of models
    pub data: Vec<Model>,
}

/// `OpenAI` model entry
#[derive(Debug, Clone, Deserialize)]
pub struct Model {
    /// Model identifier
    pub id: String,
}

/// `OpenAI` embeddings request
#[derive(Debug, Clone, Serialize)]
pub struct EmbeddingRequest<'a> {
    pub input: &'a [String],
    pub model: &'a str,
    pub encoding_format: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<u32>,
}

/// `OpenAI` embeddings response
#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingResponse {
    pub data: Vec<EmbeddingData>,
}

/// One vector, positioned by `index` in the request input
#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingData {
    pub embedding: Vec<f32>,
    pub index: usize,
}
