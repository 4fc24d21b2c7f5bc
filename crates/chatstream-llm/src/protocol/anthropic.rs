//! Anthropic Messages API wire format types

use serde::{Deserialize, Serialize};
use serde_json::Value;

// -- Request types --

/// Anthropic messages API request
#[derive(Debug, Clone, Serialize)]
pub struct MessagesRequest {
    /// Model identifier
    pub model: String,
    /// Maximum tokens to generate (required by Anthropic)
    pub max_tokens: u32,
    /// System prompt (top-level, not in messages)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    /// Conversation messages
    pub messages: Vec<Message>,
    /// Always streamed
    pub stream: bool,
    /// Tool definitions
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDefinition>,
    /// Extended thinking configuration
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thinking: Option<ThinkingConfig>,
}

/// Anthropic message
#[derive(Debug, Clone, Serialize)]
pub struct Message {
    /// Role ("user" or "assistant")
    pub role: &'static str,
    /// Content blocks
    pub content: Vec<ContentBlock>,
}

/// Content block in an Anthropic message
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    /// Text content
    Text {
        /// The text string
        text: String,
    },
    /// Image content
    Image {
        /// Image source
        source: ImageSource,
    },
    /// Earlier reasoning, echoed back with its signature
    Thinking {
        /// Reasoning text
        thinking: String,
        /// Opaque signature
        signature: String,
    },
    /// Tool use request from the assistant
    ToolUse {
        /// Tool use identifier
        id: String,
        /// Tool name
        name: String,
        /// Tool input as JSON
        input: Value,
    },
    /// Tool result from the user
    ToolResult {
        /// Tool use ID this result responds to
        tool_use_id: String,
        /// Result content
        content: String,
        /// Whether the tool call errored
        is_error: bool,
    },
}

/// Anthropic image source
#[derive(Debug, Clone, Serialize)]
pub struct ImageSource {
    /// Source type (always "base64")
    #[serde(rename = "type")]
    pub source_type: &'static str,
    /// Media type (e.g. "image/png")
    pub media_type: String,
    /// Base64-encoded image data
    pub data: String,
}

/// Tool offered to the model
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ToolDefinition {
    /// Caller-resolved tool
    Custom {
        /// Tool name
        name: String,
        /// Human-readable description
        description: String,
        /// JSON Schema for input parameters
        input_schema: Value,
    },
    /// Server-side tool such as web search
    Server {
        /// Versioned tool type
        #[serde(rename = "type")]
        tool_type: &'static str,
        /// Tool name
        name: &'static str,
    },
}

/// Extended thinking configuration
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ThinkingConfig {
    /// Thinking enabled with a token budget
    Enabled {
        /// Tokens reserved for thinking
        budget_tokens: u32,
    },
}

// -- Streaming types --

/// Anthropic SSE event types
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// Stream started
    MessageStart {
        /// Partial message with metadata
        message: StreamMessage,
    },
    /// New content block started
    ContentBlockStart {
        /// Block index
        index: usize,
        /// Initial block content
        content_block: StartBlock,
    },
    /// Incremental content within a block
    ContentBlockDelta {
        /// Block index
        index: usize,
        /// Delta content
        delta: BlockDelta,
    },
    /// Content block finished
    ContentBlockStop {
        /// Block index
        index: usize,
    },
    /// Message metadata delta (stop reason, usage)
    MessageDelta {
        /// Delta with stop reason
        #[serde(default)]
        delta: MessageDelta,
        /// Updated usage
        #[serde(default)]
        usage: Option<Usage>,
    },
    /// Stream completed
    MessageStop,
    /// Ping event for keep-alive
    Ping,
    /// Error reported mid-stream
    Error {
        /// Error details
        error: ErrorDetail,
    },
}

/// Partial message in a `message_start` event
#[derive(Debug, Clone, Deserialize)]
pub struct StreamMessage {
    /// Initial usage
    #[serde(default)]
    pub usage: Option<Usage>,
}

/// Content block in a `content_block_start` event
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StartBlock {
    /// Text block
    Text {
        /// Initial text (usually empty)
        #[serde(default)]
        text: String,
    },
    /// Thinking block
    Thinking {
        /// Initial thinking (usually empty)
        #[serde(default)]
        thinking: String,
    },
    /// Tool use block
    ToolUse {
        /// Tool use ID
        id: String,
        /// Tool name
        name: String,
    },
    /// Server tool use, web search results and other blocks the engine does not decode
    #[serde(other)]
    Other,
}

/// Delta content in a `content_block_delta` event
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BlockDelta {
    /// Incremental text
    TextDelta {
        /// Text fragment
        text: String,
    },
    /// Incremental tool input JSON
    InputJsonDelta {
        /// JSON fragment
        partial_json: String,
    },
    /// Incremental thinking
    ThinkingDelta {
        /// Thinking fragment
        thinking: String,
    },
    /// Thinking signature fragment
    SignatureDelta {
        /// Signature fragment
        signature: String,
    },
    /// Citation attached to the current text block
    CitationsDelta {
        /// The citation
        citation: Citation,
    },
    /// Deltas the engine does not decode
    #[serde(other)]
    Other,
}

/// Citation source
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Citation {
    /// Web search result
    WebSearchResultLocation {
        /// Source URL
        url: String,
        /// Source title
        #[serde(default)]
        title: Option<String>,
        /// Quoted source text
        #[serde(default)]
        cited_text: String,
    },
    /// Document citations and other kinds
    #[serde(other)]
    Other,
}

/// Delta in a `message_delta` event
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MessageDelta {
    /// Stop reason
    #[serde(default)]
    pub stop_reason: Option<String>,
}

/// Anthropic token usage
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct Usage {
    /// Input tokens
    #[serde(default)]
    pub input_tokens: Option<u64>,
    /// Output tokens
    #[serde(default)]
    pub output_tokens: Option<u64>,
}

/// Anthropic error detail
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorDetail {
    /// Error type
    #[serde(rename = "type", default)]
    pub error_type: String,
    /// Error message
    #[serde(default)]
    pub message: String,
}

// -- Models list types --

/// One page of the models list
#[derive(Debug, Clone, Deserialize)]
pub struct ModelPage {
    /// Models on this page
    pub data: Vec<Model>,
    /// Whether another page follows
    #[serde(default)]
    pub has_more: bool,
    /// Cursor for the next page
    #[serde(default)]
    pub last_id: Option<String>,
}

/// Anthropic model entry
#[derive(Debug, Clone, Deserialize)]
pub struct Model {
    /// Model identifier
    pub id: String,
    /// Human-readable name
    #[serde(default)]
    pub display_name: String,
}
