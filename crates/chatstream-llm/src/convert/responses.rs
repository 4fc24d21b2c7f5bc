//! Conversion between the conversation model and the `OpenAI` Responses API

use eventsource_stream::Event;

use super::openai::INCOMPLETE_MESSAGE;
use super::turns::{Block, Conversation, TurnRole};
use super::{ToolCallBuffer, data_uri, tool_parameters};
use crate::error::LlmError;
use crate::protocol::responses::{InputContent, InputItem, ResponseBody, ResponsesStreamEvent, ResponsesTool};
use crate::provider::{DecodeFlow, StreamDecoder, TurnOutcome, parse_event};
use crate::types::{Annotation, AnnotationType, ReasoningData, TextStreamEvent, TokenUsage, Tool};

/// Fallback text for error events without a message
const UNKNOWN_ERROR: &str = "Unknown error from Responses API";

// -- Outbound: conversation -> input items --

/// Encode turns as structured input items
///
/// System text travels separately as `instructions`.
pub fn input_items(conversation: &Conversation) -> Vec<InputItem> {
    let mut items = Vec::new();

    for turn in &conversation.turns {
        let mut content = Vec::new();
        let mut calls = Vec::new();

        for block in &turn.blocks {
            match (turn.role, block) {
                (TurnRole::User, Block::ToolResult { tool_use_id, content, .. }) => {
                    items.push(InputItem::FunctionCallOutput {
                        call_id: tool_use_id.clone(),
                        output: content.clone(),
                    });
                }
                (TurnRole::User, Block::Text(text)) => content.push(InputContent::InputText { text: text.clone() }),
                (TurnRole::User, Block::Image { mime_type, data }) => content.push(InputContent::InputImage {
                    image_url: data_uri(mime_type, data),
                    detail: "auto",
                }),
                (TurnRole::Assistant, Block::Text(text)) => {
                    content.push(InputContent::OutputText { text: text.clone() });
                }
                (TurnRole::Assistant, Block::ToolUse { id, name, arguments }) => calls.push(InputItem::FunctionCall {
                    call_id: id.clone(),
                    name: name.clone(),
                    arguments: arguments.to_string(),
                }),
                _ => {}
            }
        }

        if !content.is_empty() {
            let role = match turn.role {
                TurnRole::User => "user",
                TurnRole::Assistant => "assistant",
            };
            items.push(InputItem::Message { role, content });
        }
        items.extend(calls);
    }

    items
}

/// Encode caller tools as function tools
pub fn function_tools(tools: &[Tool]) -> Vec<ResponsesTool> {
    tools
        .iter()
        .map(|tool| ResponsesTool::Function {
            name: tool.name.clone(),
            description: tool.description.clone(),
            parameters: tool_parameters(&tool.schema),
            strict: false,
        })
        .collect()
}

// -- Inbound: Responses API events -> stream events --

/// Decoder for Responses API SSE events
#[derive(Debug, Default)]
pub struct ResponsesDecoder {
    text: String,
    text_chars: usize,
    reasoning: String,
    tools: ToolCallBuffer,
    annotations: Vec<Annotation>,
    usage: TokenUsage,
}

impl ResponsesDecoder {
    fn record_usage(&mut self, response: &ResponseBody) {
        if let Some(usage) = response.usage
            && (usage.input_tokens > 0 || usage.output_tokens > 0)
        {
            self.usage = TokenUsage {
                input_tokens: usage.input_tokens,
                output_tokens: usage.output_tokens,
            };
        }
    }
}

impl StreamDecoder for ResponsesDecoder {
    type Event = Event;

    fn decode(&mut self, event: Event, out: &mut Vec<TextStreamEvent>) -> Result<DecodeFlow, LlmError> {
        let Some(event) = parse_event::<ResponsesStreamEvent>(event.data.trim()) else {
            return Ok(DecodeFlow::Continue);
        };

        match event {
            ResponsesStreamEvent::OutputTextDelta { delta } if !delta.is_empty() => {
                self.text.push_str(&delta);
                self.text_chars += delta.chars().count();
                out.push(TextStreamEvent::Text(delta));
            }
            ResponsesStreamEvent::ReasoningSummaryTextDelta { delta } if !delta.is_empty() => {
                self.reasoning.push_str(&delta);
                out.push(TextStreamEvent::Reasoning(delta));
            }
            ResponsesStreamEvent::ContentPartDone { part } if part.part_type == "output_text" => {
                let part_start = self.text_chars.saturating_sub(part.text.chars().count());
                self.annotations.extend(
                    part.annotations
                        .into_iter()
                        .filter(|a| a.annotation_type == "url_citation")
                        .map(|a| Annotation {
                            annotation_type: AnnotationType::UrlCitation,
                            start_index: part_start + a.start_index,
                            end_index: part_start + a.end_index,
                            url: a.url,
                            title: a.title,
                            cited_text: String::new(),
                            index: 0,
                        }),
                );
            }
            ResponsesStreamEvent::OutputTextDone => {
                if !self.annotations.is_empty() {
                    out.push(TextStreamEvent::Annotations(std::mem::take(&mut self.annotations)));
                }
            }
            ResponsesStreamEvent::OutputItemAdded { output_index, item } if item.item_type == "function_call" => {
                let slot = self.tools.slot(output_index);
                if let Some(id) = item.call_id.or(item.id) {
                    slot.id = id;
                }
                if let Some(name) = item.name {
                    slot.name = name;
                }
            }
            ResponsesStreamEvent::FunctionCallArgumentsDelta { output_index, delta } => {
                self.tools.slot(output_index).arguments.push_str(&delta);
            }
            ResponsesStreamEvent::FunctionCallArgumentsDone { output_index, arguments } => {
                if let Some(slot) = self.tools.get_mut(output_index)
                    && slot.arguments.is_empty()
                {
                    slot.arguments = arguments;
                }
            }
            ResponsesStreamEvent::OutputItemDone { output_index, item } if item.item_type == "function_call" => {
                if let Some(slot) = self.tools.get_mut(output_index) {
                    if slot.name.is_empty()
                        && let Some(name) = item.name
                    {
                        slot.name = name;
                    }
                    if slot.id.is_empty()
                        && let Some(id) = item.call_id
                    {
                        slot.id = id;
                    }
                }
            }
            ResponsesStreamEvent::Completed { response } => {
                self.record_usage(&response);
                return Ok(DecodeFlow::Done);
            }
            ResponsesStreamEvent::Incomplete { response } => {
                self.record_usage(&response);
                if !self.usage.is_empty() {
                    out.push(TextStreamEvent::Usage(self.usage));
                }
                return Err(LlmError::Upstream(INCOMPLETE_MESSAGE.to_owned()));
            }
            ResponsesStreamEvent::Failed { response } => {
                let message = response
                    .error
                    .map(|e| e.message)
                    .filter(|m| !m.is_empty())
                    .unwrap_or_else(|| UNKNOWN_ERROR.to_owned());
                return Err(LlmError::Upstream(message));
            }
            ResponsesStreamEvent::Error { message } => {
                let message = message.filter(|m| !m.is_empty()).unwrap_or_else(|| UNKNOWN_ERROR.to_owned());
                return Err(LlmError::Upstream(message));
            }
            _ => {}
        }

        Ok(DecodeFlow::Continue)
    }

    fn finish(mut self) -> Result<TurnOutcome, LlmError> {
        let mut reasoning = Vec::new();
        let mut closing = Vec::new();

        if !self.reasoning.is_empty() {
            let data = ReasoningData {
                text: self.reasoning,
                signature: String::new(),
            };
            reasoning.push(data.clone());
            closing.push(TextStreamEvent::ReasoningEnd(data));
        }

        Ok(TurnOutcome {
            tool_calls: self.tools.finish(),
            text: self.text,
            reasoning,
            closing,
            annotations: self.annotations,
            usage: self.usage,
        })
    }
}
