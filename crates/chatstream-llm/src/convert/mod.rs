//! Conversion between the vendor-neutral conversation and wire formats
//!
//! [`turns`] folds posts into a role-alternating conversation that every
//! vendor encoder starts from. Each vendor submodule encodes that
//! conversation into request parameters and decodes the vendor's stream
//! back into [`TextStreamEvent`](crate::types::TextStreamEvent)s.

pub mod anthropic;
pub mod bedrock;
pub mod openai;
pub mod responses;
pub mod turns;

use std::collections::BTreeMap;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde_json::{Map, Value};

use crate::types::ToolCall;

/// Tool parameter schema with the `type` and `properties` keys vendors require
pub fn tool_parameters(schema: &Value) -> Value {
    let mut object = match schema {
        Value::Object(object) => object.clone(),
        _ => Map::new(),
    };

    object.entry("type").or_insert_with(|| Value::String("object".to_owned()));
    object
        .entry("properties")
        .or_insert_with(|| Value::Object(Map::new()));

    Value::Object(object)
}

/// Base64 data URI for inline image bytes
pub fn data_uri(mime_type: &str, data: &[u8]) -> String {
    format!("data:{mime_type};base64,{}", STANDARD.encode(data))
}

/// Tool call being assembled from streamed fragments
#[derive(Debug, Default)]
pub struct PartialToolCall {
    /// Call identifier
    pub id: String,
    /// Tool name
    pub name: String,
    /// Raw JSON arguments accumulated so far
    pub arguments: String,
}

/// Ordered arena of partial tool calls keyed by the vendor's slot index
///
/// Fragments append to their slot; calls materialize in slot order once the
/// turn ends.
#[derive(Debug, Default)]
pub struct ToolCallBuffer {
    slots: BTreeMap<usize, PartialToolCall>,
}

impl ToolCallBuffer {
    /// Builder for `slot`, created on first use
    pub fn slot(&mut self, slot: usize) -> &mut PartialToolCall {
        self.slots.entry(slot).or_default()
    }

    /// Builder for `slot`, if it was started
    pub fn get_mut(&mut self, slot: usize) -> Option<&mut PartialToolCall> {
        self.slots.get_mut(&slot)
    }

    /// Whether no slot was started
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Materialize the buffered calls in slot order
    ///
    /// Slots that never received a name are dropped. Empty arguments become
    /// an empty JSON object.
    pub fn finish(&mut self) -> Vec<ToolCall> {
        std::mem::take(&mut self.slots)
            .into_values()
            .filter(|partial| !partial.name.is_empty())
            .map(|partial| {
                let arguments = if partial.arguments.trim().is_empty() {
                    "{}".to_owned()
                } else {
                    partial.arguments
                };
                ToolCall::new(partial.id, partial.name, arguments)
            })
            .collect()
    }
}
