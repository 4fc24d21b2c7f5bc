//! Conversion between the conversation model and `OpenAI` chat completions

use eventsource_stream::Event;

use super::turns::{Block, Conversation, TurnRole};
use super::{ToolCallBuffer, data_uri, tool_parameters};
use crate::error::LlmError;
use crate::protocol::openai::{
    ChatCompletionChunk, ChatMessage, ChatTool, ChatToolCall, ContentPart, FunctionCall, FunctionDefinition, ImageUrl,
    UserContent,
};
use crate::provider::{DecodeFlow, StreamDecoder, TurnOutcome, parse_event};
use crate::types::{ReasoningData, TextStreamEvent, TokenUsage, Tool};

/// Error text when the model ran out of output tokens
pub const INCOMPLETE_MESSAGE: &str = "response incomplete: max tokens reached before completion";

// -- Outbound: conversation -> chat completion messages --

/// Encode the conversation as chat completion messages
///
/// Tool results become `tool` messages placed right after the assistant
/// message that requested them.
pub fn chat_messages(conversation: &Conversation) -> Vec<ChatMessage> {
    let mut messages: Vec<ChatMessage> = conversation
        .system
        .iter()
        .map(|text| ChatMessage::System { content: text.clone() })
        .collect();

    for turn in &conversation.turns {
        match turn.role {
            TurnRole::User => push_user_turn(&mut messages, &turn.blocks),
            TurnRole::Assistant => push_assistant_turn(&mut messages, &turn.blocks),
        }
    }

    messages
}

fn push_user_turn(messages: &mut Vec<ChatMessage>, blocks: &[Block]) {
    let mut parts = Vec::new();

    for block in blocks {
        match block {
            Block::ToolResult {
                tool_use_id, content, ..
            } => messages.push(ChatMessage::Tool {
                content: content.clone(),
                tool_call_id: tool_use_id.clone(),
            }),
            Block::Text(text) => parts.push(ContentPart::Text { text: text.clone() }),
            Block::Image { mime_type, data } => parts.push(ContentPart::ImageUrl {
                image_url: ImageUrl {
                    url: data_uri(mime_type, data),
                    detail: "auto".to_owned(),
                },
            }),
            Block::Thinking(_) | Block::ToolUse { .. } => {}
        }
    }

    if parts.is_empty() {
        return;
    }

    let all_text = parts.iter().all(|part| matches!(part, ContentPart::Text { .. }));
    let content = if all_text {
        let texts: Vec<String> = parts
            .into_iter()
            .filter_map(|part| match part {
                ContentPart::Text { text } => Some(text),
                ContentPart::ImageUrl { .. } => None,
            })
            .collect();
        UserContent::Text(texts.join("\n"))
    } else {
        UserContent::Parts(parts)
    };

    messages.push(ChatMessage::User { content });
}

fn push_assistant_turn(messages: &mut Vec<ChatMessage>, blocks: &[Block]) {
    let mut text = String::new();
    let mut tool_calls = Vec::new();

    for block in blocks {
        match block {
            Block::Text(t) => {
                if !text.is_empty() {
                    text.push('\n');
                }
                text.push_str(t);
            }
            Block::ToolUse { id, name, arguments } => tool_calls.push(ChatToolCall {
                id: id.clone(),
                tool_type: "function",
                function: FunctionCall {
                    name: name.clone(),
                    arguments: arguments.to_string(),
                },
            }),
            Block::Thinking(_) | Block::Image { .. } | Block::ToolResult { .. } => {}
        }
    }

    if text.is_empty() && tool_calls.is_empty() {
        return;
    }

    messages.push(ChatMessage::Assistant {
        content: (!text.is_empty()).then_some(text),
        tool_calls,
    });
}

/// Encode caller tools as function definitions
pub fn chat_tools(tools: &[Tool]) -> Vec<ChatTool> {
    tools
        .iter()
        .map(|tool| ChatTool {
            tool_type: "function",
            function: FunctionDefinition {
                name: tool.name.clone(),
                description: tool.description.clone(),
                parameters: tool_parameters(&tool.schema),
            },
        })
        .collect()
}

// -- Inbound: chat completion chunks -> stream events --

/// Decoder for chat completion SSE chunks
#[derive(Debug, Default)]
pub struct ChatCompletionsDecoder {
    text: String,
    reasoning: String,
    reasoning_done: Vec<ReasoningData>,
    tools: ToolCallBuffer,
    finish_reason: Option<String>,
    usage: TokenUsage,
}

impl ChatCompletionsDecoder {
    fn close_reasoning(&mut self) -> Option<TextStreamEvent> {
        if self.reasoning.is_empty() {
            return None;
        }

        let data = ReasoningData {
            text: std::mem::take(&mut self.reasoning),
            signature: String::new(),
        };
        self.reasoning_done.push(data.clone());
        Some(TextStreamEvent::ReasoningEnd(data))
    }
}

impl StreamDecoder for ChatCompletionsDecoder {
    type Event = Event;

    fn decode(&mut self, event: Event, out: &mut Vec<TextStreamEvent>) -> Result<DecodeFlow, LlmError> {
        let data = event.data.trim();
        if data == "[DONE]" {
            return Ok(DecodeFlow::Done);
        }

        let Some(chunk) = parse_event::<ChatCompletionChunk>(data) else {
            return Ok(DecodeFlow::Continue);
        };

        if let Some(usage) = chunk.usage
            && (usage.prompt_tokens > 0 || usage.completion_tokens > 0)
        {
            self.usage = TokenUsage {
                input_tokens: usage.prompt_tokens,
                output_tokens: usage.completion_tokens,
            };
        }

        let Some(choice) = chunk.choices.into_iter().next() else {
            return Ok(DecodeFlow::Continue);
        };
        let delta = choice.delta;

        if let Some(reasoning) = delta.reasoning_content.filter(|r| !r.is_empty()) {
            self.reasoning.push_str(&reasoning);
            out.push(TextStreamEvent::Reasoning(reasoning));
        }

        if let Some(content) = delta.content.filter(|c| !c.is_empty()) {
            out.extend(self.close_reasoning());
            self.text.push_str(&content);
            out.push(TextStreamEvent::Text(content));
        }

        for call in delta.tool_calls {
            let slot = self.tools.slot(call.index);
            if let Some(id) = call.id {
                slot.id.push_str(&id);
            }
            if let Some(function) = call.function {
                if let Some(name) = function.name {
                    slot.name.push_str(&name);
                }
                if let Some(arguments) = function.arguments {
                    slot.arguments.push_str(&arguments);
                }
            }
        }

        if let Some(reason) = choice.finish_reason {
            match reason.as_str() {
                "length" => return Err(LlmError::Upstream(INCOMPLETE_MESSAGE.to_owned())),
                "content_filter" => return Err(LlmError::Upstream("response blocked by content filter".to_owned())),
                _ => self.finish_reason = Some(reason),
            }
        }

        Ok(DecodeFlow::Continue)
    }

    fn finish(mut self) -> Result<TurnOutcome, LlmError> {
        let closing: Vec<_> = self.close_reasoning().into_iter().collect();

        // Fragments only become calls when the model stopped to call tools
        let tool_calls = match self.finish_reason.as_deref() {
            Some("tool_calls" | "function_call") => self.tools.finish(),
            reason => {
                if !self.tools.is_empty() {
                    tracing::debug!(finish_reason = ?reason, "dropping tool call fragments");
                }
                Vec::new()
            }
        };

        Ok(TurnOutcome {
            tool_calls,
            text: self.text,
            reasoning: self.reasoning_done,
            closing,
            annotations: Vec::new(),
            usage: self.usage,
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::convert::turns::TranslateOptions;
    use crate::types::{File, Post, ToolCall, ToolCallStatus};

    fn sse(data: serde_json::Value) -> Event {
        Event {
            data: data.to_string(),
            ..Event::default()
        }
    }

    fn decode_all(events: Vec<Event>) -> (Vec<TextStreamEvent>, Result<TurnOutcome, LlmError>) {
        let mut decoder = ChatCompletionsDecoder::default();
        let mut out = Vec::new();
        for event in events {
            match decoder.decode(event, &mut out) {
                Ok(DecodeFlow::Continue) => {}
                Ok(DecodeFlow::Done) => break,
                Err(e) => return (out, Err(e)),
            }
        }
        (out, decoder.finish())
    }

    #[test]
    fn messages_keep_tool_results_after_their_call() {
        let call = ToolCall::new("call_1", "search", r#"{"q":"rust"}"#).resolved("found", ToolCallStatus::Success);
        let conversation = Conversation::translate(
            vec![
                Post::system("sys"),
                Post::user("hi"),
                Post::bot("").with_tool_use(vec![call]),
            ],
            &TranslateOptions::default(),
        );

        let value = serde_json::to_value(chat_messages(&conversation)).unwrap();

        assert_eq!(value[0], json!({"role": "system", "content": "sys"}));
        assert_eq!(value[1], json!({"role": "user", "content": "hi"}));
        assert_eq!(value[2]["tool_calls"][0]["id"], "call_1");
        assert_eq!(value[2]["tool_calls"][0]["function"]["arguments"], r#"{"q":"rust"}"#);
        assert_eq!(value[3], json!({"role": "tool", "content": "found", "tool_call_id": "call_1"}));
    }

    #[test]
    fn images_become_data_uri_parts() {
        let conversation = Conversation::translate(
            vec![Post::user("see").with_file(File::from_bytes("image/png", b"hi".to_vec()))],
            &TranslateOptions::default(),
        );

        let value = serde_json::to_value(chat_messages(&conversation)).unwrap();
        let parts = &value[0]["content"];

        assert_eq!(parts[0], json!({"type": "text", "text": "see"}));
        assert_eq!(parts[1]["image_url"]["url"], "data:image/png;base64,aGk=");
        assert_eq!(parts[1]["image_url"]["detail"], "auto");
    }

    #[test]
    fn tools_get_object_schema() {
        let tool = Tool::from_fn("ping", "Ping", serde_json::Value::Null, |_, _| async { Ok(String::new()) });
        let value = serde_json::to_value(chat_tools(&[tool])).unwrap();

        assert_eq!(value[0]["function"]["parameters"], json!({"type": "object", "properties": {}}));
    }

    #[test]
    fn decodes_text_and_usage() {
        let (out, outcome) = decode_all(vec![
            sse(json!({"choices": [{"index": 0, "delta": {"role": "assistant", "content": "Hel"}}]})),
            sse(json!({"choices": [{"index": 0, "delta": {"content": "lo"}, "finish_reason": "stop"}]})),
            sse(json!({"choices": [], "usage": {"prompt_tokens": 7, "completion_tokens": 2}})),
            Event {
                data: "[DONE]".into(),
                ..Event::default()
            },
        ]);

        let outcome = outcome.unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(outcome.text, "Hello");
        assert_eq!(outcome.usage.input_tokens, 7);
        assert!(outcome.tool_calls.is_empty());
    }

    #[test]
    fn assembles_tool_call_fragments() {
        let (_, outcome) = decode_all(vec![
            sse(json!({"choices": [{"index": 0, "delta": {"tool_calls": [
                {"index": 1, "id": "call_b", "type": "function", "function": {"name": "lookup", "arguments": ""}},
                {"index": 0, "id": "call_a", "type": "function", "function": {"name": "search", "arguments": "{\"q\":"}}
            ]}}]})),
            sse(json!({"choices": [{"index": 0, "delta": {"tool_calls": [
                {"index": 0, "function": {"arguments": "\"rust\"}"}}
            ]}, "finish_reason": "tool_calls"}]})),
        ]);

        let calls = outcome.unwrap().tool_calls;
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].id, "call_a");
        assert_eq!(calls[0].arguments, r#"{"q":"rust"}"#);
        assert_eq!(calls[1].name, "lookup");
        assert_eq!(calls[1].arguments, "{}");
    }

    #[test]
    fn fragments_without_tool_calls_finish_are_dropped() {
        let (out, outcome) = decode_all(vec![
            sse(json!({"choices": [{"index": 0, "delta": {"content": "Sure"}}]})),
            sse(json!({"choices": [{"index": 0, "delta": {"tool_calls": [
                {"index": 0, "id": "call_a", "type": "function", "function": {"name": "search", "arguments": "{\"q\":"}}
            ]}, "finish_reason": "stop"}]})),
        ]);

        assert_eq!(out.len(), 1);
        let outcome = outcome.unwrap();
        assert_eq!(outcome.text, "Sure");
        assert!(outcome.tool_calls.is_empty());
    }

    #[test]
    fn reasoning_content_closes_before_text() {
        let (out, outcome) = decode_all(vec![
            sse(json!({"choices": [{"delta": {"reasoning_content": "think"}}]})),
            sse(json!({"choices": [{"delta": {"content": "answer"}}]})),
        ]);

        assert!(matches!(&out[0], TextStreamEvent::Reasoning(r) if r == "think"));
        assert!(matches!(&out[1], TextStreamEvent::ReasoningEnd(d) if d.text == "think"));
        assert!(matches!(&out[2], TextStreamEvent::Text(t) if t == "answer"));
        assert!(outcome.unwrap().closing.is_empty());
    }

    #[test]
    fn length_finish_is_an_error() {
        let (out, outcome) = decode_all(vec![sse(
            json!({"choices": [{"delta": {"content": "par"}, "finish_reason": "length"}]}),
        )]);

        assert_eq!(out.len(), 1);
        assert!(outcome.unwrap_err().to_string().contains(INCOMPLETE_MESSAGE));
    }

    #[test]
    fn unparseable_chunks_are_skipped() {
        let (out, outcome) = decode_all(vec![
            Event {
                data: "not json".into(),
                ..Event::default()
            },
            sse(json!({"choices": [{"delta": {"content": "ok"}}]})),
        ]);

        assert_eq!(out.len(), 1);
        assert_eq!(outcome.unwrap().text, "ok");
    }
}
