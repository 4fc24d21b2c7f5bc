//! Multi-provider streaming chat completion engine
//!
//! Translates a vendor-neutral conversation into `OpenAI` (Chat Completions
//! and Responses), Anthropic Messages and AWS Bedrock Converse requests,
//! decodes their streams into one event model, and runs a bounded
//! tool-calling loop with an idle watchdog. `OpenAI` protocol providers also
//! serve text embeddings.

#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

pub mod convert;
pub mod embeddings;
pub mod engine;
pub mod error;
pub mod factory;
pub mod protocol;
pub mod provider;
pub mod reasoning;
pub mod tokens;
pub mod types;

pub use embeddings::{Embeddings, OpenAiEmbeddings};
pub use engine::cancel::{CancelReason, CancelSignal};
pub use engine::{ChatEngine, LanguageModel, MAX_TOOL_RESOLUTION_DEPTH};
pub use error::{LlmError, ToolError};
pub use factory::{build_embeddings, build_language_model};
pub use provider::Provider;
pub use types::*;
