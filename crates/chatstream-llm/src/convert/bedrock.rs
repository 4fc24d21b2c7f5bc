//! Conversion between the conversation model and the Bedrock Converse API

use std::collections::HashMap;

use aws_sdk_bedrockruntime::types::{
    ContentBlock, ContentBlockDelta, ContentBlockStart, ConversationRole, ConverseStreamOutput, ImageBlock, ImageFormat,
    ImageSource, Message, StopReason, SystemContentBlock, Tool as BedrockTool, ToolConfiguration, ToolInputSchema,
    ToolResultBlock, ToolResultContentBlock, ToolResultStatus, ToolSpecification, ToolUseBlock,
};
use aws_smithy_types::{Blob, Document, Number};
use serde_json::Value;

use super::turns::{Block, Conversation, TurnRole};
use super::{ToolCallBuffer, tool_parameters};
use crate::error::LlmError;
use crate::provider::{DecodeFlow, StreamDecoder, TurnOutcome};
use crate::types::{TextStreamEvent, TokenUsage, Tool};

// -- Outbound: conversation -> Converse input --

/// System prompt blocks, one per system entry
pub fn system_blocks(conversation: &Conversation) -> Vec<SystemContentBlock> {
    conversation
        .system
        .iter()
        .map(|text| SystemContentBlock::Text(text.clone()))
        .collect()
}

/// Encode turns as Converse messages
///
/// # Errors
///
/// Returns [`LlmError::InvalidRequest`] if the SDK rejects a block
pub fn messages(conversation: &Conversation) -> Result<Vec<Message>, LlmError> {
    let mut messages = Vec::with_capacity(conversation.turns.len());

    for turn in &conversation.turns {
        let mut content = Vec::with_capacity(turn.blocks.len());
        for block in &turn.blocks {
            if let Some(block) = content_block(block)? {
                content.push(block);
            }
        }

        if content.is_empty() {
            continue;
        }

        let role = match turn.role {
            TurnRole::User => ConversationRole::User,
            TurnRole::Assistant => ConversationRole::Assistant,
        };

        let message = Message::builder()
            .role(role)
            .set_content(Some(content))
            .build()
            .map_err(|e| LlmError::InvalidRequest(format!("invalid bedrock message: {e}")))?;
        messages.push(message);
    }

    Ok(messages)
}

fn content_block(block: &Block) -> Result<Option<ContentBlock>, LlmError> {
    let block = match block {
        Block::Text(text) => ContentBlock::Text(text.clone()),
        Block::Image { mime_type, data } => {
            let format = match mime_type.as_str() {
                "image/png" => ImageFormat::Png,
                "image/gif" => ImageFormat::Gif,
                "image/webp" => ImageFormat::Webp,
                _ => ImageFormat::Jpeg,
            };
            let image = ImageBlock::builder()
                .format(format)
                .source(ImageSource::Bytes(Blob::new(data.clone())))
                .build()
                .map_err(|e| LlmError::InvalidRequest(format!("invalid image block: {e}")))?;
            ContentBlock::Image(image)
        }
        Block::Thinking(_) => return Ok(None),
        Block::ToolUse { id, name, arguments } => {
            let tool_use = ToolUseBlock::builder()
                .tool_use_id(id)
                .name(name)
                .input(value_to_document(arguments))
                .build()
                .map_err(|e| LlmError::InvalidRequest(format!("invalid tool use: {e}")))?;
            ContentBlock::ToolUse(tool_use)
        }
        Block::ToolResult {
            tool_use_id,
            content,
            is_error,
        } => {
            let status = if *is_error {
                ToolResultStatus::Error
            } else {
                ToolResultStatus::Success
            };
            let result = ToolResultBlock::builder()
                .tool_use_id(tool_use_id)
                .content(ToolResultContentBlock::Text(content.clone()))
                .status(status)
                .build()
                .map_err(|e| LlmError::InvalidRequest(format!("invalid tool result: {e}")))?;
            ContentBlock::ToolResult(result)
        }
    };

    Ok(Some(block))
}

/// Tool configuration for caller tools, or `None` when there are none
///
/// # Errors
///
/// Returns [`LlmError::InvalidRequest`] if the SDK rejects a tool spec
pub fn tool_config(tools: &[Tool]) -> Result<Option<ToolConfiguration>, LlmError> {
    if tools.is_empty() {
        return Ok(None);
    }

    let mut config = ToolConfiguration::builder();
    for tool in tools {
        let spec = ToolSpecification::builder()
            .name(&tool.name)
            .description(&tool.description)
            .input_schema(ToolInputSchema::Json(value_to_document(&tool_parameters(&tool.schema))))
            .build()
            .map_err(|e| LlmError::InvalidRequest(format!("invalid tool spec for {}: {e}", tool.name)))?;
        config = config.tools(BedrockTool::ToolSpec(spec));
    }

    config
        .build()
        .map(Some)
        .map_err(|e| LlmError::InvalidRequest(format!("invalid tool configuration: {e}")))
}

/// Convert a JSON value to an AWS document
pub fn value_to_document(value: &Value) -> Document {
    match value {
        Value::Null => Document::Null,
        Value::Bool(b) => Document::Bool(*b),
        Value::Number(n) => {
            if let Some(u) = n.as_u64() {
                Document::Number(Number::PosInt(u))
            } else if let Some(i) = n.as_i64() {
                Document::Number(Number::NegInt(i))
            } else {
                n.as_f64().map_or(Document::Null, |f| Document::Number(Number::Float(f)))
            }
        }
        Value::String(s) => Document::String(s.clone()),
        Value::Array(items) => Document::Array(items.iter().map(value_to_document).collect()),
        Value::Object(map) => {
            let object: HashMap<String, Document> = map.iter().map(|(k, v)| (k.clone(), value_to_document(v))).collect();
            Document::Object(object)
        }
    }
}

// -- Inbound: ConverseStream events -> stream events --

/// Subset of `ConverseStream` events the decoder acts on
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BedrockEvent {
    /// A tool use block opened
    ToolUseStart {
        /// Content block index
        index: usize,
        /// Call identifier
        id: String,
        /// Tool name
        name: String,
    },
    /// Answer text fragment
    TextDelta(String),
    /// Tool input JSON fragment
    ToolInputDelta {
        /// Content block index
        index: usize,
        /// JSON fragment
        input: String,
    },
    /// The model stopped
    MessageStop {
        /// Whether the model stopped to call tools
        tool_use: bool,
    },
    /// Token usage, sent after the stop
    Usage(TokenUsage),
}

impl BedrockEvent {
    /// Map an SDK stream event; events the decoder ignores become `None`
    pub fn from_output(output: ConverseStreamOutput) -> Option<Self> {
        match output {
            ConverseStreamOutput::ContentBlockStart(start) => {
                let index = usize::try_from(start.content_block_index()).unwrap_or_default();
                match start.start()? {
                    ContentBlockStart::ToolUse(tool) => Some(Self::ToolUseStart {
                        index,
                        id: tool.tool_use_id().to_owned(),
                        name: tool.name().to_owned(),
                    }),
                    _ => None,
                }
            }
            ConverseStreamOutput::ContentBlockDelta(delta) => {
                let index = usize::try_from(delta.content_block_index()).unwrap_or_default();
                match delta.delta()? {
                    ContentBlockDelta::Text(text) => Some(Self::TextDelta(text.clone())),
                    ContentBlockDelta::ToolUse(tool) => Some(Self::ToolInputDelta {
                        index,
                        input: tool.input().to_owned(),
                    }),
                    _ => None,
                }
            }
            ConverseStreamOutput::MessageStop(stop) => Some(Self::MessageStop {
                tool_use: *stop.stop_reason() == StopReason::ToolUse,
            }),
            ConverseStreamOutput::Metadata(metadata) => metadata.usage().map(|usage| {
                Self::Usage(TokenUsage {
                    input_tokens: u64::try_from(usage.input_tokens()).unwrap_or_default(),
                    output_tokens: u64::try_from(usage.output_tokens()).unwrap_or_default(),
                })
            }),
            _ => None,
        }
    }
}

/// Decoder for Bedrock `ConverseStream` events
///
/// The stream is read to its end because usage arrives after the stop
/// event. Tool calls are surfaced only when the model stopped for tool use.
#[derive(Debug, Default)]
pub struct BedrockDecoder {
    text: String,
    tools: ToolCallBuffer,
    tool_use: bool,
    usage: TokenUsage,
}

impl StreamDecoder for BedrockDecoder {
    type Event = BedrockEvent;

    fn decode(&mut self, event: BedrockEvent, out: &mut Vec<TextStreamEvent>) -> Result<DecodeFlow, LlmError> {
        match event {
            BedrockEvent::ToolUseStart { index, id, name } => {
                let slot = self.tools.slot(index);
                slot.id = id;
                slot.name = name;
            }
            BedrockEvent::TextDelta(text) => {
                if !text.is_empty() {
                    self.text.push_str(&text);
                    out.push(TextStreamEvent::Text(text));
                }
            }
            BedrockEvent::ToolInputDelta { index, input } => {
                if let Some(slot) = self.tools.get_mut(index) {
                    slot.arguments.push_str(&input);
                }
            }
            BedrockEvent::MessageStop { tool_use } => self.tool_use = tool_use,
            BedrockEvent::Usage(usage) => self.usage = usage,
        }

        Ok(DecodeFlow::Continue)
    }

    fn finish(mut self) -> Result<TurnOutcome, LlmError> {
        let calls = self.tools.finish();

        Ok(TurnOutcome {
            text: self.text,
            tool_calls: if self.tool_use { calls } else { Vec::new() },
            usage: self.usage,
            ..TurnOutcome::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::convert::turns::TranslateOptions;
    use crate::types::{Post, ToolCall, ToolCallStatus};

    fn run(events: Vec<BedrockEvent>) -> (Vec<TextStreamEvent>, TurnOutcome) {
        let mut decoder = BedrockDecoder::default();
        let mut out = Vec::new();
        for event in events {
            decoder.decode(event, &mut out).unwrap();
        }
        (out, decoder.finish().unwrap())
    }

    #[test]
    fn failed_results_carry_error_status() {
        let failed = ToolCall::new("t1", "search", r#"{"q":"x"}"#).resolved("boom", ToolCallStatus::Error);
        let conversation = Conversation::translate(
            vec![Post::system("sys"), Post::user("hi"), Post::bot("").with_tool_use(vec![failed])],
            &TranslateOptions::default(),
        );

        let messages = messages(&conversation).unwrap();

        assert_eq!(system_blocks(&conversation).len(), 1);
        assert_eq!(messages.len(), 3);
        let ContentBlock::ToolResult(result) = &messages[2].content()[0] else {
            panic!("expected tool result");
        };
        assert_eq!(result.status(), Some(&ToolResultStatus::Error));
    }

    #[test]
    fn documents_keep_integer_precision() {
        let document = value_to_document(&json!({"n": 3, "neg": -2, "f": 1.5, "tags": ["a"]}));
        let Document::Object(map) = document else {
            panic!("expected object");
        };

        assert_eq!(map["n"], Document::Number(Number::PosInt(3)));
        assert_eq!(map["neg"], Document::Number(Number::NegInt(-2)));
        assert_eq!(map["f"], Document::Number(Number::Float(1.5)));
    }

    #[test]
    fn tool_calls_surface_only_on_tool_use_stop() {
        let events = || {
            vec![
                BedrockEvent::ToolUseStart {
                    index: 1,
                    id: "t1".into(),
                    name: "search".into(),
                },
                BedrockEvent::ToolInputDelta {
                    index: 1,
                    input: r#"{"q":"#.into(),
                },
                BedrockEvent::ToolInputDelta {
                    index: 1,
                    input: r#""x"}"#.into(),
                },
            ]
        };

        let mut with_stop = events();
        with_stop.push(BedrockEvent::MessageStop { tool_use: true });
        let (_, outcome) = run(with_stop);
        assert_eq!(outcome.tool_calls[0].arguments, r#"{"q":"x"}"#);

        let mut end_turn = events();
        end_turn.push(BedrockEvent::MessageStop { tool_use: false });
        let (_, outcome) = run(end_turn);
        assert!(outcome.tool_calls.is_empty());
    }

    #[test]
    fn usage_after_stop_is_kept() {
        let (out, outcome) = run(vec![
            BedrockEvent::TextDelta("hello".into()),
            BedrockEvent::MessageStop { tool_use: false },
            BedrockEvent::Usage(TokenUsage {
                input_tokens: 9,
                output_tokens: 2,
            }),
        ]);

        assert!(matches!(&out[0], TextStreamEvent::Text(t) if t == "hello"));
        assert_eq!(outcome.text, "hello");
        assert_eq!(outcome.usage.output_tokens, 2);
    }
}
