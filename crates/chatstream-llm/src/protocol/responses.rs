//! `OpenAI` Responses API wire format types

use serde::{Deserialize, Serialize};
use serde_json::Value;

// -- Request types --

/// Responses API request
#[derive(Debug, Clone, Serialize)]
pub struct ResponsesRequest {
    /// Model identifier
    pub model: String,
    /// Structured conversation items
    pub input: Vec<InputItem>,
    /// System instructions
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
    /// Always streamed
    pub stream: bool,
    /// Token ceiling
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u32>,
    /// Function and native tools
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ResponsesTool>,
    /// Reasoning options
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<ReasoningParams>,
    /// Output format options
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<TextOptions>,
    /// Stable end-user identifier
    #[serde(skip_serializing_if = "Option::is_none")]
    pub safety_identifier: Option<String>,
}

/// One conversation item
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InputItem {
    /// User or assistant message
    Message {
        /// "user" or "assistant"
        role: &'static str,
        /// Content parts
        content: Vec<InputContent>,
    },
    /// Function call previously made by the model
    FunctionCall {
        /// Call identifier
        call_id: String,
        /// Function name
        name: String,
        /// JSON-encoded arguments
        arguments: String,
    },
    /// Output answering a function call
    FunctionCallOutput {
        /// Call identifier
        call_id: String,
        /// Tool output
        output: String,
    },
}

/// Content part of a message item
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InputContent {
    /// User text
    InputText {
        /// The text string
        text: String,
    },
    /// User image
    InputImage {
        /// Base64 data URI
        image_url: String,
        /// Detail level
        detail: &'static str,
    },
    /// Earlier assistant text
    OutputText {
        /// The text string
        text: String,
    },
}

/// Tool offered to the model
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponsesTool {
    /// Caller-resolved function
    Function {
        /// Function name
        name: String,
        /// Human-readable description
        description: String,
        /// JSON Schema for parameters
        parameters: Value,
        /// Strict schema adherence
        strict: bool,
    },
    /// Vendor-hosted web search
    WebSearchPreview,
}

/// Reasoning options
#[derive(Debug, Clone, Serialize)]
pub struct ReasoningParams {
    /// minimal, low, medium or high
    pub effort: &'static str,
    /// Summary mode
    pub summary: &'static str,
}

/// Output format options
#[derive(Debug, Clone, Serialize)]
pub struct TextOptions {
    /// Format constraint
    pub format: TextFormat,
}

/// Output format constraint
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TextFormat {
    /// Answer must match a JSON Schema
    JsonSchema {
        /// Schema name
        name: String,
        /// The schema
        schema: Value,
        /// Enforce the schema exactly
        strict: bool,
    },
}

// -- Streaming types --

/// Responses API SSE event
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum ResponsesStreamEvent {
    /// Answer text delta
    #[serde(rename = "response.output_text.delta")]
    OutputTextDelta {
        /// Text fragment
        #[serde(default)]
        delta: String,
    },
    /// Answer text part finished
    #[serde(rename = "response.output_text.done")]
    OutputTextDone,
    /// Content part finished, carrying its annotations
    #[serde(rename = "response.content_part.done")]
    ContentPartDone {
        /// Completed part
        part: OutputPart,
    },
    /// New output item
    #[serde(rename = "response.output_item.added")]
    OutputItemAdded {
        /// Position in the output list
        #[serde(default)]
        output_index: usize,
        /// The item
        item: OutputItem,
    },
    /// Output item finished
    #[serde(rename = "response.output_item.done")]
    OutputItemDone {
        /// Position in the output list
        #[serde(default)]
        output_index: usize,
        /// The item
        item: OutputItem,
    },
    /// Function call arguments fragment
    #[serde(rename = "response.function_call_arguments.delta")]
    FunctionCallArgumentsDelta {
        /// Position in the output list
        #[serde(default)]
        output_index: usize,
        /// Arguments fragment
        #[serde(default)]
        delta: String,
    },
    /// Function call arguments complete
    #[serde(rename = "response.function_call_arguments.done")]
    FunctionCallArgumentsDone {
        /// Position in the output list
        #[serde(default)]
        output_index: usize,
        /// Full arguments
        #[serde(default)]
        arguments: String,
    },
    /// Reasoning summary delta
    #[serde(rename = "response.reasoning_summary_text.delta")]
    ReasoningSummaryTextDelta {
        /// Summary fragment
        #[serde(default)]
        delta: String,
    },
    /// Response finished
    #[serde(rename = "response.completed")]
    Completed {
        /// Final response
        response: ResponseBody,
    },
    /// Response stopped early
    #[serde(rename = "response.incomplete")]
    Incomplete {
        /// Partial response
        response: ResponseBody,
    },
    /// Response failed
    #[serde(rename = "response.failed")]
    Failed {
        /// Failed response
        response: ResponseBody,
    },
    /// Stream-level error
    #[serde(rename = "error")]
    Error {
        /// Error message
        #[serde(default)]
        message: Option<String>,
    },
    /// Lifecycle and progress events that carry nothing to decode
    #[serde(other)]
    Other,
}

/// Output item in an item event
#[derive(Debug, Clone, Deserialize)]
pub struct OutputItem {
    /// Item type, e.g. "message" or "`function_call`"
    #[serde(rename = "type")]
    pub item_type: String,
    /// Item identifier
    #[serde(default)]
    pub id: Option<String>,
    /// Function call identifier
    #[serde(default)]
    pub call_id: Option<String>,
    /// Function name
    #[serde(default)]
    pub name: Option<String>,
    /// Function arguments
    #[serde(default)]
    pub arguments: Option<String>,
}

/// Completed content part
#[derive(Debug, Clone, Deserialize)]
pub struct OutputPart {
    /// Part type, e.g. "`output_text`"
    #[serde(rename = "type")]
    pub part_type: String,
    /// Full part text
    #[serde(default)]
    pub text: String,
    /// Annotations with offsets relative to this part
    #[serde(default)]
    pub annotations: Vec<PartAnnotation>,
}

/// Annotation on an output part
#[derive(Debug, Clone, Deserialize)]
pub struct PartAnnotation {
    /// Annotation type, e.g. "`url_citation`"
    #[serde(rename = "type")]
    pub annotation_type: String,
    /// Span start within the part
    #[serde(default)]
    pub start_index: usize,
    /// Span end within the part
    #[serde(default)]
    pub end_index: usize,
    /// Source URL
    #[serde(default)]
    pub url: String,
    /// Source title
    #[serde(default)]
    pub title: String,
}

/// Response object carried by terminal events
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResponseBody {
    /// Token usage
    #[serde(default)]
    pub usage: Option<ResponseUsage>,
    /// Failure details
    #[serde(default)]
    pub error: Option<ResponseError>,
}

/// Responses API token usage
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct ResponseUsage {
    /// Prompt tokens
    #[serde(default)]
    pub input_tokens: u64,
    /// Generated tokens
    #[serde(default)]
    pub output_tokens: u64,
}

/// Failure details
#[derive(Debug, Clone, Deserialize)]
pub struct ResponseError {
    /// Error message
    #[serde(default)]
    pub message: String,
}
