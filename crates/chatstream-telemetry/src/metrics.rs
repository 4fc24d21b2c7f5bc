//! Metric name constants and recording helpers

use std::time::{Duration, Instant};

use opentelemetry::KeyValue;
use opentelemetry::metrics::{Counter, Histogram};

pub const LLM_REQUEST_COUNT: &str = "llm.request.count";
pub const LLM_TOKEN_USAGE: &str = "llm.token.usage";
pub const LLM_TOOL_CALL_COUNT: &str = "llm.tool_call.count";
pub const LLM_STREAMING_DURATION: &str = "llm.streaming.duration";
pub const LLM_TIME_TO_FIRST_TOKEN: &str = "llm.time_to_first_token";

/// Record a duration measurement on a histogram
pub fn record_duration(histogram: &Histogram<f64>, start: Instant, attributes: &[KeyValue]) {
    let duration = start.elapsed().as_secs_f64();
    histogram.record(duration, attributes);
}

/// How a completion request ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestOutcome {
    /// Stream ended normally
    Success,
    /// Stream ended with an error
    Error,
    /// Watchdog fired
    Timeout,
    /// Caller cancelled
    Cancelled,
}

impl RequestOutcome {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Error => "error",
            Self::Timeout => "timeout",
            Self::Cancelled => "cancelled",
        }
    }
}

/// OpenTelemetry instruments for completion requests
///
/// Instruments come from the global meter provider, so they are no-ops
/// unless telemetry export is configured.
#[derive(Clone)]
pub struct LlmMetrics {
    requests: Counter<u64>,
    tokens: Counter<u64>,
    tool_calls: Counter<u64>,
    streaming_duration: Histogram<f64>,
    time_to_first_token: Histogram<f64>,
}

impl LlmMetrics {
    /// Create instruments from the global `chatstream` meter
    pub fn new() -> Self {
        let meter = opentelemetry::global::meter("chatstream");

        Self {
            requests: meter
                .u64_counter(LLM_REQUEST_COUNT)
                .with_description("Completion requests by outcome")
                .build(),
            tokens: meter
                .u64_counter(LLM_TOKEN_USAGE)
                .with_description("Tokens consumed by direction")
                .build(),
            tool_calls: meter
                .u64_counter(LLM_TOOL_CALL_COUNT)
                .with_description("Tool calls requested by the model")
                .build(),
            streaming_duration: meter
                .f64_histogram(LLM_STREAMING_DURATION)
                .with_unit("s")
                .with_description("Wall time from request to terminal event")
                .build(),
            time_to_first_token: meter
                .f64_histogram(LLM_TIME_TO_FIRST_TOKEN)
                .with_unit("s")
                .with_description("Wall time until the first streamed token")
                .build(),
        }
    }

    /// Record the terminal outcome of a request
    pub fn record_request(&self, provider: &str, model: &str, outcome: RequestOutcome, started: Instant) {
        let attributes = [
            KeyValue::new("llm.provider", provider.to_string()),
            KeyValue::new("llm.model", model.to_string()),
            KeyValue::new("llm.outcome", outcome.as_str()),
        ];

        self.requests.add(1, &attributes);
        record_duration(&self.streaming_duration, started, &attributes);
    }

    /// Record token usage reported by the vendor
    pub fn record_tokens(&self, provider: &str, model: &str, input: u64, output: u64) {
        let base = [
            KeyValue::new("llm.provider", provider.to_string()),
            KeyValue::new("llm.model", model.to_string()),
        ];

        for (direction, count) in [("input", input), ("output", output)] {
            if count > 0 {
                let mut attributes = base.to_vec();
                attributes.push(KeyValue::new("llm.token.direction", direction));
                self.tokens.add(count, &attributes);
            }
        }
    }

    /// Record tool calls requested in one turn
    pub fn record_tool_calls(&self, provider: &str, count: usize, auto_run: bool) {
        if count == 0 {
            return;
        }

        let attributes = [
            KeyValue::new("llm.provider", provider.to_string()),
            KeyValue::new("llm.tool.auto_run", auto_run),
        ];
        self.tool_calls.add(u64::try_from(count).unwrap_or(u64::MAX), &attributes);
    }

    /// Record the delay before the first streamed token
    pub fn record_first_token(&self, provider: &str, elapsed: Duration) {
        self.time_to_first_token.record(
            elapsed.as_secs_f64(),
            &[KeyValue::new("llm.provider", provider.to_string())],
        );
    }
}

impl Default for LlmMetrics {
    fn default() -> Self {
        Self::new()
    }
}
