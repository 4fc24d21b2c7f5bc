//! Generic completion engine
//!
//! [`ChatEngine`] drives any [`Provider`]: it translates posts, streams one
//! vendor call at a time, runs allow-listed tools and loops until the model
//! answers, a call needs approval, or the depth ceiling is reached. One
//! producer task per request owns the vendor stream and writes into a
//! channel of capacity 1.

pub mod cancel;
pub mod watchdog;

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use chatstream_telemetry::{LlmMetrics, RequestOutcome};
use futures_util::StreamExt;
use tokio::sync::mpsc;
use tracing::Instrument;

use self::cancel::{CancelReason, CancelSignal};
use self::watchdog::Watchdog;
use crate::convert::turns::Conversation;
use crate::error::{LlmError, ToolError};
use crate::provider::{DecodeFlow, Provider, StreamDecoder, StreamRequest, TurnOutcome};
use crate::types::{
    Annotation, AutoRunResult, CompletionRequest, Context, LanguageModelConfig, LanguageModelOption, ModelInfo, TextStreamEvent,
    TextStreamResult, TokenUsage, Tool, ToolCall, execute_auto_run_tools, should_auto_run_tools,
};

/// Most model→tool→model cycles one request may run
pub const MAX_TOOL_RESOLUTION_DEPTH: usize = 10;

/// A configured language model
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Configured provider name
    fn name(&self) -> &str;

    /// Start a streaming completion
    ///
    /// Options apply in order over the provider's defaults. The returned
    /// stream ends with exactly one `Error` or `End`.
    ///
    /// # Errors
    ///
    /// Returns an error if the options ask for something the provider
    /// cannot do, or if called outside a Tokio runtime.
    fn chat_completion(
        &self,
        request: CompletionRequest,
        options: Vec<LanguageModelOption>,
    ) -> Result<TextStreamResult, LlmError>;

    /// Run a completion and return the whole answer
    ///
    /// # Errors
    ///
    /// Returns the terminal error of the stream, if any
    async fn chat_completion_no_stream(
        &self,
        request: CompletionRequest,
        options: Vec<LanguageModelOption>,
    ) -> Result<String, LlmError> {
        self.chat_completion(request, options)?.read_all().await
    }

    /// Approximate token count of `text`
    fn count_tokens(&self, text: &str) -> usize;

    /// Prompt size ceiling in tokens
    fn input_token_limit(&self) -> usize;

    /// Models the vendor offers
    async fn list_models(&self) -> Result<Vec<ModelInfo>, LlmError>;
}

/// Language model backed by a single provider
pub struct ChatEngine<P> {
    provider: Arc<P>,
    metrics: LlmMetrics,
}

impl<P: Provider> ChatEngine<P> {
    /// Wrap a provider
    pub fn new(provider: P) -> Self {
        Self {
            provider: Arc::new(provider),
            metrics: LlmMetrics::new(),
        }
    }
}

#[async_trait]
impl<P: Provider> LanguageModel for ChatEngine<P> {
    fn name(&self) -> &str {
        self.provider.name()
    }

    fn chat_completion(
        &self,
        request: CompletionRequest,
        options: Vec<LanguageModelOption>,
    ) -> Result<TextStreamResult, LlmError> {
        let config = self.provider.default_config().apply(options);
        self.provider.check_config(&config)?;

        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| LlmError::Internal(anyhow::anyhow!("chat completion needs a tokio runtime: {e}")))?;

        let tools = match &request.context.tools {
            Some(registry) if !config.tools_disabled => registry.get_tools(),
            _ => Vec::new(),
        };
        let conversation = Conversation::translate(request.posts, &self.provider.translate_options());

        let (events, receiver) = mpsc::channel(1);
        let signal = CancelSignal::new();

        let span = tracing::info_span!(
            "chat_completion",
            provider = %self.provider.name(),
            model = %config.model,
        );

        let run = Run {
            provider: Arc::clone(&self.provider),
            metrics: self.metrics.clone(),
            config,
            conversation,
            tools,
            context: request.context,
            events,
            signal: signal.clone(),
            started: Instant::now(),
            first_token: false,
            emitted_chars: 0,
            turn_offset: 0,
            citations: 0,
        };
        runtime.spawn(run.run().instrument(span));

        Ok(TextStreamResult::new(receiver, signal))
    }

    fn count_tokens(&self, text: &str) -> usize {
        self.provider.count_tokens(text)
    }

    fn input_token_limit(&self) -> usize {
        self.provider.input_token_limit()
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>, LlmError> {
        self.provider.list_models().await
    }
}

/// Producer state for one request
struct Run<P> {
    provider: Arc<P>,
    metrics: LlmMetrics,
    config: LanguageModelConfig,
    conversation: Conversation,
    tools: Vec<Tool>,
    context: Context,
    events: mpsc::Sender<TextStreamEvent>,
    signal: CancelSignal,
    started: Instant,
    first_token: bool,
    /// Answer characters emitted across all turns
    emitted_chars: usize,
    /// Answer characters emitted before the current turn
    turn_offset: usize,
    /// Last citation number handed out
    citations: usize,
}

impl<P: Provider> Run<P> {
    async fn run(mut self) {
        let result = self.drive().await;

        let outcome = match &result {
            Ok(()) => RequestOutcome::Success,
            Err(LlmError::StreamingTimeout(_)) => RequestOutcome::Timeout,
            Err(LlmError::Cancelled) => RequestOutcome::Cancelled,
            Err(_) => RequestOutcome::Error,
        };
        self.metrics
            .record_request(self.provider.name(), &self.config.model, outcome, self.started);

        let terminal = match result {
            Ok(()) => TextStreamEvent::End,
            Err(e) => {
                if e.is_timeout() {
                    tracing::warn!(error = %e, "completion timed out");
                } else if !matches!(e, LlmError::Cancelled) {
                    tracing::error!(error = %e, "completion failed");
                }
                TextStreamEvent::Error(e)
            }
        };

        // The receiver may be gone already; nothing is left to notify.
        let _ = self.events.send(terminal).await;
    }

    async fn drive(&mut self) -> Result<(), LlmError> {
        let mut depth = 0;

        loop {
            if depth >= MAX_TOOL_RESOLUTION_DEPTH {
                return Err(LlmError::MaxToolDepthExceeded {
                    limit: MAX_TOOL_RESOLUTION_DEPTH,
                });
            }

            let TurnOutcome {
                text,
                reasoning,
                mut tool_calls,
                closing,
                annotations,
                usage,
            } = self.stream_turn().await?;

            for event in closing {
                self.emit(event).await?;
            }

            let auto_run = should_auto_run_tools(&tool_calls, &self.config.auto_run_tools);
            self.metrics
                .record_tool_calls(self.provider.name(), tool_calls.len(), auto_run);

            if auto_run {
                self.emit_summary(annotations, usage).await?;

                tracing::debug!(depth, calls = tool_calls.len(), "auto-running tools");
                let results = self.run_tools(&tool_calls).await?;
                self.conversation
                    .push_tool_round(&reasoning, &text, &tool_calls, &results);

                depth += 1;
                continue;
            }

            if !tool_calls.is_empty() {
                for call in &mut tool_calls {
                    call.sanitize_arguments();
                }
                self.emit(TextStreamEvent::ToolCalls(tool_calls)).await?;
            }
            self.emit_summary(annotations, usage).await?;

            return Ok(());
        }
    }

    /// Stream one vendor call under the watchdog
    async fn stream_turn(&mut self) -> Result<TurnOutcome, LlmError> {
        let watchdog = self
            .provider
            .streaming_timeout()
            .map(|timeout| Watchdog::start(timeout, self.signal.clone()));

        let result = self.read_turn(watchdog.as_ref()).await;

        if let Some(watchdog) = watchdog {
            watchdog.stop().await;
        }

        result
    }

    async fn read_turn(&mut self, watchdog: Option<&Watchdog>) -> Result<TurnOutcome, LlmError> {
        self.turn_offset = self.emitted_chars;

        let request = StreamRequest {
            conversation: &self.conversation,
            tools: &self.tools,
            config: &self.config,
            context: &self.context,
        };

        let mut stream = tokio::select! {
            biased;
            () = self.signal.cancelled() => return Err(self.signal.error()),
            opened = self.provider.open_stream(request) => opened?,
        };

        let mut decoder = self.provider.decoder();
        let mut out = Vec::new();

        loop {
            let next = tokio::select! {
                biased;
                () = self.signal.cancelled() => return Err(self.signal.error()),
                next = stream.next() => next,
            };

            let Some(event) = next else { break };

            if let Some(watchdog) = watchdog {
                watchdog.reset();
            }

            let event = event.map_err(|e| if self.signal.is_cancelled() { self.signal.error() } else { e })?;
            let flow = decoder.decode(event, &mut out);

            // Time spent waiting on a slow consumer is not vendor idle time
            if !out.is_empty()
                && let Some(watchdog) = watchdog
            {
                watchdog.suspend();
            }
            for event in std::mem::take(&mut out) {
                self.emit(event).await?;
            }
            if let Some(watchdog) = watchdog {
                watchdog.resume();
            }

            if flow? == DecodeFlow::Done {
                break;
            }
        }

        drop(stream);
        decoder.finish()
    }

    /// Resolve calls unless the request is cancelled meanwhile
    async fn run_tools(&self, calls: &[ToolCall]) -> Result<Vec<AutoRunResult>, LlmError> {
        let Some(registry) = &self.context.tools else {
            tracing::warn!(calls = calls.len(), "auto-run requested without a tool registry");
            return Ok(calls
                .iter()
                .map(|call| AutoRunResult {
                    tool_call_id: call.id.clone(),
                    tool_name: call.name.clone(),
                    result: format!("Error executing tool: {}", ToolError::NoTools),
                    is_error: true,
                })
                .collect());
        };

        tokio::select! {
            biased;
            () = self.signal.cancelled() => Err(self.signal.error()),
            results = execute_auto_run_tools(calls, registry.as_ref(), &self.context) => Ok(results),
        }
    }

    async fn emit_summary(&mut self, annotations: Vec<Annotation>, usage: TokenUsage) -> Result<(), LlmError> {
        if !annotations.is_empty() {
            self.emit(TextStreamEvent::Annotations(annotations)).await?;
        }
        if !usage.is_empty() {
            self.emit(TextStreamEvent::Usage(usage)).await?;
        }
        Ok(())
    }

    /// Send one event, keeping answer offsets and citation numbers global
    async fn emit(&mut self, mut event: TextStreamEvent) -> Result<(), LlmError> {
        match &mut event {
            TextStreamEvent::Text(text) => {
                if !self.first_token {
                    self.first_token = true;
                    self.metrics
                        .record_first_token(self.provider.name(), self.started.elapsed());
                }
                self.emitted_chars += text.chars().count();
            }
            TextStreamEvent::Annotations(annotations) => {
                for annotation in annotations {
                    self.citations += 1;
                    annotation.index = self.citations;
                    annotation.start_index += self.turn_offset;
                    annotation.end_index += self.turn_offset;
                }
            }
            TextStreamEvent::Usage(usage) => {
                self.metrics.record_tokens(
                    self.provider.name(),
                    &self.config.model,
                    usage.input_tokens,
                    usage.output_tokens,
                );
            }
            _ => {}
        }

        tokio::select! {
            biased;
            () = self.signal.cancelled() => Err(self.signal.error()),
            sent = self.events.send(event) => sent.map_err(|_| {
                self.signal.cancel(CancelReason::Caller);
                LlmError::Cancelled
            }),
        }
    }
}
