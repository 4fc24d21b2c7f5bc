//! Vendor-neutral types shared by every provider
//!
//! Callers describe a conversation with these types and receive
//! normalized stream events back, regardless of the vendor behind the
//! language model.

pub mod config;
pub mod post;
pub mod request;
pub mod store;
pub mod stream;
pub mod tool;
pub mod tool_call;

pub use config::{
    LanguageModelConfig, LanguageModelOption, with_auto_run_tools, with_json_output, with_max_generated_tokens,
    with_model, with_reasoning_disabled, with_tools_disabled,
};
pub use post::{File, Post, Role};
pub use request::{CompletionRequest, Context, ModelInfo};
pub use store::{ToolAuthError, ToolStore, Tools};
pub use stream::{Annotation, AnnotationType, ReasoningData, TextStreamEvent, TextStreamResult, TokenUsage};
pub use tool::{Tool, ToolArguments, ToolInfo, ToolResolver};
pub use tool_call::{
    AutoRunResult, ToolCall, ToolCallStatus, execute_auto_run_tools, sanitize_non_printable, should_auto_run_tools,
};
