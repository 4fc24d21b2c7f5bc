//! Conversion between the conversation model and Anthropic Messages

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use eventsource_stream::Event;

use super::turns::{Block, Conversation, TurnRole};
use super::{ToolCallBuffer, tool_parameters};
use crate::error::LlmError;
use crate::protocol::anthropic::{
    BlockDelta, Citation, ContentBlock, ImageSource, Message, StartBlock, StreamEvent, ToolDefinition, Usage,
};
use crate::provider::{DecodeFlow, StreamDecoder, TurnOutcome, parse_event};
use crate::types::{Annotation, AnnotationType, ReasoningData, TextStreamEvent, TokenUsage, Tool};

/// Versioned type of the hosted web search tool
pub const WEB_SEARCH_TOOL_TYPE: &str = "web_search_20250305";

// -- Outbound: conversation -> messages --

/// Encode turns as Anthropic messages
///
/// Thinking blocks are echoed only when they carry a signature; the vendor
/// rejects unsigned thinking.
pub fn messages(conversation: &Conversation) -> Vec<Message> {
    conversation
        .turns
        .iter()
        .filter_map(|turn| {
            let content: Vec<ContentBlock> = turn.blocks.iter().filter_map(content_block).collect();
            if content.is_empty() {
                return None;
            }

            let role = match turn.role {
                TurnRole::User => "user",
                TurnRole::Assistant => "assistant",
            };
            Some(Message { role, content })
        })
        .collect()
}

fn content_block(block: &Block) -> Option<ContentBlock> {
    let block = match block {
        Block::Text(text) => ContentBlock::Text { text: text.clone() },
        Block::Image { mime_type, data } => ContentBlock::Image {
            source: ImageSource {
                source_type: "base64",
                media_type: mime_type.clone(),
                data: STANDARD.encode(data),
            },
        },
        Block::Thinking(reasoning) if !reasoning.signature.is_empty() => ContentBlock::Thinking {
            thinking: reasoning.text.clone(),
            signature: reasoning.signature.clone(),
        },
        Block::Thinking(_) => return None,
        Block::ToolUse { id, name, arguments } => ContentBlock::ToolUse {
            id: id.clone(),
            name: name.clone(),
            input: arguments.clone(),
        },
        Block::ToolResult {
            tool_use_id,
            content,
            is_error,
        } => ContentBlock::ToolResult {
            tool_use_id: tool_use_id.clone(),
            content: content.clone(),
            is_error: *is_error,
        },
    };

    Some(block)
}

/// Encode caller tools, plus hosted web search when enabled
pub fn tool_definitions(tools: &[Tool], web_search: bool) -> Vec<ToolDefinition> {
    let mut definitions: Vec<ToolDefinition> = tools
        .iter()
        .map(|tool| ToolDefinition::Custom {
            name: tool.name.clone(),
            description: tool.description.clone(),
            input_schema: tool_parameters(&tool.schema),
        })
        .collect();

    if web_search {
        definitions.push(ToolDefinition::Server {
            tool_type: WEB_SEARCH_TOOL_TYPE,
            name: "web_search",
        });
    }

    definitions
}

// -- Inbound: Anthropic events -> stream events --

/// Decoder for Anthropic Messages SSE events
#[derive(Debug, Default)]
pub struct AnthropicDecoder {
    text: String,
    text_chars: usize,
    block_start: usize,
    citations: Vec<Citation>,
    thinking: Option<ReasoningData>,
    reasoning: Vec<ReasoningData>,
    tools: ToolCallBuffer,
    stop_reason: Option<String>,
    usage: TokenUsage,
}

impl AnthropicDecoder {
    fn record_usage(&mut self, usage: Option<Usage>) {
        let Some(usage) = usage else { return };

        if let Some(input) = usage.input_tokens {
            self.usage.input_tokens = input;
        }
        if let Some(output) = usage.output_tokens {
            self.usage.output_tokens = output;
        }
    }

    fn close_thinking(&mut self) -> Option<TextStreamEvent> {
        let data = self.thinking.take()?;
        self.reasoning.push(data.clone());
        Some(TextStreamEvent::ReasoningEnd(data))
    }

    /// Citations of the text block just closed, spanning the whole block
    fn block_annotations(&mut self) -> Vec<Annotation> {
        std::mem::take(&mut self.citations)
            .into_iter()
            .filter_map(|citation| match citation {
                Citation::WebSearchResultLocation { url, title, cited_text } => Some(Annotation {
                    annotation_type: AnnotationType::UrlCitation,
                    start_index: self.block_start,
                    end_index: self.text_chars,
                    title: title.unwrap_or_else(|| url.clone()),
                    url,
                    cited_text,
                    index: 0,
                }),
                Citation::Other => None,
            })
            .collect()
    }
}

impl StreamDecoder for AnthropicDecoder {
    type Event = Event;

    fn decode(&mut self, event: Event, out: &mut Vec<TextStreamEvent>) -> Result<DecodeFlow, LlmError> {
        let Some(event) = parse_event::<StreamEvent>(&event.data) else {
            return Ok(DecodeFlow::Continue);
        };

        match event {
            StreamEvent::MessageStart { message } => self.record_usage(message.usage),
            StreamEvent::ContentBlockStart { index, content_block } => match content_block {
                StartBlock::Text { text } => {
                    self.block_start = self.text_chars;
                    if !text.is_empty() {
                        self.text_chars += text.chars().count();
                        self.text.push_str(&text);
                        out.push(TextStreamEvent::Text(text));
                    }
                }
                StartBlock::Thinking { thinking } => {
                    if !thinking.is_empty() {
                        out.push(TextStreamEvent::Reasoning(thinking.clone()));
                    }
                    self.thinking = Some(ReasoningData {
                        text: thinking,
                        signature: String::new(),
                    });
                }
                StartBlock::ToolUse { id, name } => {
                    let slot = self.tools.slot(index);
                    slot.id = id;
                    slot.name = name;
                }
                StartBlock::Other => {}
            },
            StreamEvent::ContentBlockDelta { index, delta } => match delta {
                BlockDelta::TextDelta { text } if !text.is_empty() => {
                    self.text_chars += text.chars().count();
                    self.text.push_str(&text);
                    out.push(TextStreamEvent::Text(text));
                }
                BlockDelta::ThinkingDelta { thinking } if !thinking.is_empty() => {
                    self.thinking.get_or_insert_with(ReasoningData::default).text.push_str(&thinking);
                    out.push(TextStreamEvent::Reasoning(thinking));
                }
                BlockDelta::SignatureDelta { signature } => {
                    self.thinking
                        .get_or_insert_with(ReasoningData::default)
                        .signature
                        .push_str(&signature);
                }
                BlockDelta::InputJsonDelta { partial_json } => {
                    if let Some(slot) = self.tools.get_mut(index) {
                        slot.arguments.push_str(&partial_json);
                    }
                }
                BlockDelta::CitationsDelta { citation } => self.citations.push(citation),
                _ => {}
            },
            StreamEvent::ContentBlockStop { .. } => {
                if let Some(end) = self.close_thinking() {
                    out.push(end);
                }
                let annotations = self.block_annotations();
                if !annotations.is_empty() {
                    out.push(TextStreamEvent::Annotations(annotations));
                }
            }
            StreamEvent::MessageDelta { delta, usage } => {
                self.record_usage(usage);
                if let Some(reason) = delta.stop_reason {
                    tracing::debug!(stop_reason = %reason, "anthropic message stopped");
                    self.stop_reason = Some(reason);
                }
            }
            StreamEvent::MessageStop => return Ok(DecodeFlow::Done),
            StreamEvent::Ping => {}
            StreamEvent::Error { error } => {
                return Err(LlmError::Upstream(format!("{}: {}", error.error_type, error.message)));
            }
        }

        Ok(DecodeFlow::Continue)
    }

    fn finish(mut self) -> Result<TurnOutcome, LlmError> {
        let closing: Vec<TextStreamEvent> = self.close_thinking().into_iter().collect();
        let annotations = self.block_annotations();

        // Tool use blocks only count when the model stopped to call them
        let tool_calls = if self.stop_reason.as_deref() == Some("tool_use") {
            self.tools.finish()
        } else {
            if !self.tools.is_empty() {
                tracing::debug!(stop_reason = ?self.stop_reason, "dropping tool use blocks");
            }
            Vec::new()
        };

        Ok(TurnOutcome {
            tool_calls,
            text: self.text,
            reasoning: self.reasoning,
            closing,
            annotations,
            usage: self.usage,
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{Value, json};

    use super::*;
    use crate::convert::turns::TranslateOptions;
    use crate::types::{File, Post, ToolCall, ToolCallStatus};

    fn run(events: Vec<Value>) -> (Vec<TextStreamEvent>, Result<TurnOutcome, LlmError>) {
        let mut decoder = AnthropicDecoder::default();
        let mut out = Vec::new();
        for event in events {
            let event = Event {
                data: event.to_string(),
                ..Event::default()
            };
            match decoder.decode(event, &mut out) {
                Ok(DecodeFlow::Continue) => {}
                Ok(DecodeFlow::Done) => break,
                Err(e) => return (out, Err(e)),
            }
        }
        (out, decoder.finish())
    }

    #[test]
    fn signed_thinking_leads_the_tool_turn() {
        let call = ToolCall::new("toolu_1", "search", r#"{"q":"rust"}"#).resolved("hits", ToolCallStatus::Error);
        let conversation = Conversation::translate(
            vec![
                Post::user("find rust"),
                Post::bot("").with_tool_use(vec![call]).with_reasoning("plan", "sig"),
                Post::user("thanks").with_file(File::from_bytes("image/png", vec![1, 2])),
            ],
            &TranslateOptions::default(),
        );

        let value = serde_json::to_value(messages(&conversation)).unwrap();

        assert_eq!(value[1]["content"][0], json!({"type": "thinking", "thinking": "plan", "signature": "sig"}));
        assert_eq!(value[1]["content"][1]["input"], json!({"q": "rust"}));
        assert_eq!(
            value[2]["content"][0],
            json!({"type": "tool_result", "tool_use_id": "toolu_1", "content": "hits", "is_error": true})
        );
        assert_eq!(value[2]["content"][1], json!({"type": "text", "text": "thanks"}));
        assert_eq!(value[2]["content"][2]["source"]["data"], "AQI=");
    }

    #[test]
    fn unsigned_thinking_is_dropped() {
        let call = ToolCall::new("t", "search", "{}").resolved("ok", ToolCallStatus::Success);
        let conversation = Conversation::translate(
            vec![Post::bot("").with_tool_use(vec![call]).with_reasoning("plan", "")],
            &TranslateOptions::default(),
        );

        let value = serde_json::to_value(messages(&conversation)).unwrap();
        assert_eq!(value[0]["content"][0]["type"], "tool_use");
    }

    #[test]
    fn web_search_tool_is_appended() {
        let tools = tool_definitions(&[], true);
        assert_eq!(
            serde_json::to_value(tools).unwrap(),
            json!([{"type": "web_search_20250305", "name": "web_search"}])
        );
    }

    #[test]
    fn decodes_thinking_then_tool_use() {
        let (out, outcome) = run(vec![
            json!({"type": "message_start", "message": {"usage": {"input_tokens": 12, "output_tokens": 1}}}),
            json!({"type": "content_block_start", "index": 0, "content_block": {"type": "thinking", "thinking": ""}}),
            json!({"type": "content_block_delta", "index": 0, "delta": {"type": "thinking_delta", "thinking": "plan"}}),
            json!({"type": "content_block_delta", "index": 0, "delta": {"type": "signature_delta", "signature": "sig"}}),
            json!({"type": "content_block_stop", "index": 0}),
            json!({"type": "content_block_start", "index": 1, "content_block": {"type": "tool_use", "id": "toolu_1", "name": "search", "input": {}}}),
            json!({"type": "content_block_delta", "index": 1, "delta": {"type": "input_json_delta", "partial_json": "{\"q\":"}}),
            json!({"type": "content_block_delta", "index": 1, "delta": {"type": "input_json_delta", "partial_json": "\"rust\"}"}}),
            json!({"type": "content_block_stop", "index": 1}),
            json!({"type": "message_delta", "delta": {"stop_reason": "tool_use"}, "usage": {"output_tokens": 30}}),
            json!({"type": "message_stop"}),
        ]);

        assert!(matches!(&out[0], TextStreamEvent::Reasoning(r) if r == "plan"));
        assert!(matches!(&out[1], TextStreamEvent::ReasoningEnd(d) if d.signature == "sig"));

        let outcome = outcome.unwrap();
        assert_eq!(outcome.tool_calls[0].arguments, r#"{"q":"rust"}"#);
        assert_eq!(outcome.reasoning[0].text, "plan");
        assert_eq!(outcome.usage, TokenUsage { input_tokens: 12, output_tokens: 30 });
    }

    #[test]
    fn tool_use_without_tool_use_stop_is_dropped() {
        let (_, outcome) = run(vec![
            json!({"type": "content_block_start", "index": 0, "content_block": {"type": "tool_use", "id": "toolu_1", "name": "search", "input": {}}}),
            json!({"type": "content_block_delta", "index": 0, "delta": {"type": "input_json_delta", "partial_json": "{\"q\":"}}),
            json!({"type": "message_delta", "delta": {"stop_reason": "max_tokens"}, "usage": {"output_tokens": 64}}),
            json!({"type": "message_stop"}),
        ]);

        let outcome = outcome.unwrap();
        assert!(outcome.tool_calls.is_empty());
        assert_eq!(outcome.usage.output_tokens, 64);
    }

    #[test]
    fn citations_span_their_text_block() {
        let (out, _) = run(vec![
            json!({"type": "content_block_start", "index": 0, "content_block": {"type": "text", "text": ""}}),
            json!({"type": "content_block_delta", "index": 0, "delta": {"type": "text_delta", "text": "Intro. "}}),
            json!({"type": "content_block_stop", "index": 0}),
            json!({"type": "content_block_start", "index": 1, "content_block": {"type": "text", "text": ""}}),
            json!({"type": "content_block_delta", "index": 1, "delta": {"type": "citations_delta", "citation": {
                "type": "web_search_result_location", "url": "https://rust-lang.org", "title": "Rust", "cited_text": "fast"
            }}}),
            json!({"type": "content_block_delta", "index": 1, "delta": {"type": "text_delta", "text": "Rust is fast."}}),
            json!({"type": "content_block_stop", "index": 1}),
            json!({"type": "message_stop"}),
        ]);

        let annotations = out
            .iter()
            .find_map(|e| match e {
                TextStreamEvent::Annotations(a) => Some(a),
                _ => None,
            })
            .unwrap();
        assert_eq!((annotations[0].start_index, annotations[0].end_index), (7, 20));
        assert_eq!(annotations[0].cited_text, "fast");
    }

    #[test]
    fn error_event_fails_the_stream() {
        let (_, outcome) = run(vec![json!({
            "type": "error",
            "error": {"type": "overloaded_error", "message": "Overloaded"}
        })]);

        assert!(outcome.is_err_and(|e| e.to_string() == "upstream error: overloaded_error: Overloaded"));
    }
}
