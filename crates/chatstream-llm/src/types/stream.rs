use std::pin::Pin;
use std::task::{Context, Poll};

use futures_util::Stream;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::engine::cancel::{CancelReason, CancelSignal};
use crate::error::LlmError;
use crate::types::tool_call::ToolCall;

/// Normalized streaming event
///
/// Ordering is significant: `ReasoningEnd` precedes the `ToolCalls` or
/// `End` it explains, and every stream ends with exactly one `Error` or
/// `End`.
#[derive(Debug)]
pub enum TextStreamEvent {
    /// Answer text delta
    Text(String),
    /// Reasoning text delta
    Reasoning(String),
    /// A reasoning block closed
    ReasoningEnd(ReasoningData),
    /// Tool calls awaiting approval; the stream ends after this turn
    ToolCalls(Vec<ToolCall>),
    /// Citations for the answer text
    Annotations(Vec<Annotation>),
    /// Token usage for one model call
    Usage(TokenUsage),
    /// Terminal failure
    Error(LlmError),
    /// Terminal success
    End,
}

impl TextStreamEvent {
    /// Whether this event ends the stream
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Error(_) | Self::End)
    }
}

/// A complete reasoning block
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReasoningData {
    /// Full reasoning text
    pub text: String,
    /// Opaque signature to echo back verbatim on the next request
    pub signature: String,
}

/// Kind of annotation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnnotationType {
    /// Web citation
    UrlCitation,
}

/// A citation attached to a span of the answer
///
/// Offsets are character positions in the full emitted answer. `index` is
/// 1-based and increases in emission order across the whole response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Annotation {
    /// Annotation kind
    #[serde(rename = "type")]
    pub annotation_type: AnnotationType,
    /// Start of the cited span
    pub start_index: usize,
    /// End of the cited span
    pub end_index: usize,
    /// Source URL
    pub url: String,
    /// Source title
    pub title: String,
    /// Quoted source text, when the vendor provides it
    #[serde(default)]
    pub cited_text: String,
    /// 1-based citation number
    pub index: usize,
}

/// Token usage reported by the vendor
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Prompt tokens
    pub input_tokens: u64,
    /// Generated tokens
    pub output_tokens: u64,
}

impl TokenUsage {
    /// Whether the vendor reported any tokens
    pub const fn is_empty(&self) -> bool {
        self.input_tokens == 0 && self.output_tokens == 0
    }
}

/// Live stream of events for one completion request
///
/// Dropping the result cancels the request.
pub struct TextStreamResult {
    events: mpsc::Receiver<TextStreamEvent>,
    cancel: CancelSignal,
}

impl TextStreamResult {
    pub(crate) fn new(events: mpsc::Receiver<TextStreamEvent>, cancel: CancelSignal) -> Self {
        Self { events, cancel }
    }

    /// Stop the request; the stream ends with a cancellation error
    pub fn cancel(&self) {
        self.cancel.cancel(CancelReason::Caller);
    }

    /// Handle that can cancel the request from another task
    pub fn cancel_handle(&self) -> CancelSignal {
        self.cancel.clone()
    }

    /// Next event, or `None` once the stream has closed
    pub async fn recv(&mut self) -> Option<TextStreamEvent> {
        self.events.recv().await
    }

    /// Drain the stream and concatenate the answer text
    ///
    /// # Errors
    ///
    /// Returns the terminal error if the stream ended with one
    pub async fn read_all(mut self) -> Result<String, LlmError> {
        let mut text = String::new();

        while let Some(event) = self.events.recv().await {
            match event {
                TextStreamEvent::Text(delta) => text.push_str(&delta),
                TextStreamEvent::Error(e) => return Err(e),
                TextStreamEvent::End => break,
                _ => {}
            }
        }

        Ok(text)
    }
}

impl Stream for TextStreamResult {
    type Item = TextStreamEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.events.poll_recv(cx)
    }
}

impl Drop for TextStreamResult {
    fn drop(&mut self) {
        self.cancel.cancel(CancelReason::Caller);
    }
}
