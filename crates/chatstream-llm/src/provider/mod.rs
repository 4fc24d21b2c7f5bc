//! Provider trait and implementations for vendor backends
//!
//! A provider knows how to open one streaming call against its vendor and
//! how to decode that vendor's events. Everything else (the tool loop,
//! cancellation, the idle watchdog) lives in the generic engine.

pub mod anthropic;
pub mod bedrock;
pub mod openai;

use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use eventsource_stream::{Event, Eventsource};
use futures_util::{Stream, StreamExt};

use crate::convert::turns::{Conversation, TranslateOptions};
use crate::error::LlmError;
use crate::types::{
    Annotation, Context, LanguageModelConfig, ModelInfo, ReasoningData, TextStreamEvent, TokenUsage, Tool, ToolCall,
};

/// Live stream of raw vendor events
pub type VendorStream<E> = Pin<Box<dyn Stream<Item = Result<E, LlmError>> + Send>>;

/// Inputs for one vendor call
pub struct StreamRequest<'a> {
    /// Conversation so far, including earlier auto-run rounds
    pub conversation: &'a Conversation,
    /// Caller tools; empty when tools are disabled
    pub tools: &'a [Tool],
    /// Effective per-call settings
    pub config: &'a LanguageModelConfig,
    /// Request-scoped collaborators
    pub context: &'a Context,
}

/// Whether the decoder expects more events for this turn
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeFlow {
    /// Keep reading
    Continue,
    /// The vendor signalled the end of the turn
    Done,
}

/// Everything a decoder accumulated over one vendor call
#[derive(Debug, Default)]
pub struct TurnOutcome {
    /// Full answer text of this turn
    pub text: String,
    /// Completed reasoning blocks, echoed back on the next call
    pub reasoning: Vec<ReasoningData>,
    /// Tool calls requested at the end of the turn
    pub tool_calls: Vec<ToolCall>,
    /// Events that close still-open blocks, emitted before anything else
    pub closing: Vec<TextStreamEvent>,
    /// Citations not yet emitted, with offsets relative to this turn
    pub annotations: Vec<Annotation>,
    /// Token usage for this call
    pub usage: TokenUsage,
}

/// Per-call state machine turning vendor events into normalized events
pub trait StreamDecoder: Send {
    /// Raw vendor event type
    type Event: Send;

    /// Decode one event, pushing live events onto `out`
    ///
    /// An error ends the stream; events already pushed are still emitted.
    fn decode(&mut self, event: Self::Event, out: &mut Vec<TextStreamEvent>) -> Result<DecodeFlow, LlmError>;

    /// Close the turn once the vendor stream ends
    fn finish(self) -> Result<TurnOutcome, LlmError>;
}

/// Trait implemented by each vendor backend
#[async_trait]
pub trait Provider: Send + Sync + 'static {
    /// Raw vendor event type
    type Event: Send + 'static;
    /// Decoder for this vendor's events
    type Decoder: StreamDecoder<Event = Self::Event>;

    /// Configured provider name
    fn name(&self) -> &str;

    /// Defaults the caller's options apply over
    fn default_config(&self) -> LanguageModelConfig;

    /// Vendor limits for post translation
    fn translate_options(&self) -> TranslateOptions {
        TranslateOptions::default()
    }

    /// Idle timeout; `None` disables the watchdog
    fn streaming_timeout(&self) -> Option<Duration>;

    /// Reject settings the vendor cannot honour
    fn check_config(&self, _config: &LanguageModelConfig) -> Result<(), LlmError> {
        Ok(())
    }

    /// Open one streaming vendor call
    async fn open_stream(&self, request: StreamRequest<'_>) -> Result<VendorStream<Self::Event>, LlmError>;

    /// Fresh decoder for one call
    fn decoder(&self) -> Self::Decoder;

    /// Approximate token count of `text`
    fn count_tokens(&self, text: &str) -> usize;

    /// Prompt size ceiling
    fn input_token_limit(&self) -> usize;

    /// Models the vendor offers
    async fn list_models(&self) -> Result<Vec<ModelInfo>, LlmError>;
}

/// Send a streaming HTTP request and expose its SSE events
///
/// Non-success statuses become [`LlmError::Upstream`] carrying the body.
pub(crate) async fn open_event_stream(
    provider: &str,
    request: reqwest::RequestBuilder,
) -> Result<VendorStream<Event>, LlmError> {
    let response = request.send().await.map_err(|e| {
        tracing::error!(provider = %provider, error = %e, "upstream stream request failed");
        LlmError::Upstream(e.to_string())
    })?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        tracing::warn!(provider = %provider, status = %status, "upstream returned error");
        return Err(LlmError::Upstream(format!("provider returned {status}: {body}")));
    }

    let events = response
        .bytes_stream()
        .eventsource()
        .map(|result| result.map_err(|e| LlmError::Streaming(e.to_string())));

    Ok(Box::pin(events))
}

/// Send a JSON GET request and decode the body
pub(crate) async fn get_json<T: serde::de::DeserializeOwned>(
    provider: &str,
    request: reqwest::RequestBuilder,
) -> Result<T, LlmError> {
    let response = request.send().await.map_err(|e| {
        tracing::error!(provider = %provider, error = %e, "upstream request failed");
        LlmError::Upstream(e.to_string())
    })?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        tracing::warn!(provider = %provider, status = %status, "upstream returned error");
        return Err(LlmError::Upstream(format!("provider returned {status}: {body}")));
    }

    response
        .json()
        .await
        .map_err(|e| LlmError::Upstream(format!("failed to parse response: {e}")))
}

/// Parse an SSE data payload, skipping chunks that do not decode
pub(crate) fn parse_event<T: serde::de::DeserializeOwned>(data: &str) -> Option<T> {
    match serde_json::from_str::<T>(data) {
        Ok(parsed) => Some(parsed),
        Err(e) => {
            tracing::debug!(error = %e, data = %data, "skipping unparseable SSE chunk");
            None
        }
    }
}
