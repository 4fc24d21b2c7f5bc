//! Anthropic Messages API provider

use std::time::Duration;

use async_trait::async_trait;
use chatstream_config::{LlmProviderConfig, NativeTool, ReasoningConfig};
use eventsource_stream::Event;
use reqwest::{Client, RequestBuilder};
use secrecy::{ExposeSecret, SecretString};
use url::Url;

use super::{Provider, StreamRequest, VendorStream, get_json, open_event_stream};
use crate::convert::anthropic::{AnthropicDecoder, messages, tool_definitions};
use crate::error::LlmError;
use crate::protocol::anthropic::{MessagesRequest, ModelPage, ThinkingConfig};
use crate::reasoning::thinking_budget;
use crate::tokens::estimate_tokens;
use crate::types::{LanguageModelConfig, ModelInfo};

/// Default Anthropic API base URL
const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1";

/// Anthropic API version header value
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Generated token ceiling when none is configured
const DEFAULT_MAX_TOKENS: u32 = 8192;

/// Prompt ceiling when none is configured
const DEFAULT_INPUT_TOKEN_LIMIT: usize = 100_000;

/// Models requested per listing page
const MODELS_PAGE_SIZE: u32 = 100;

/// Anthropic Messages API provider
pub struct AnthropicProvider {
    name: String,
    client: Client,
    base_url: Url,
    api_key: Option<SecretString>,
    reasoning: ReasoningConfig,
    default_model: String,
    input_token_limit: Option<usize>,
    output_token_limit: Option<u32>,
    streaming_timeout: Option<Duration>,
    web_search: bool,
}

impl AnthropicProvider {
    /// Create from provider configuration
    ///
    /// # Errors
    ///
    /// Returns `LlmError::Internal` if the streaming timeout does not parse.
    pub fn new(name: String, config: &LlmProviderConfig) -> Result<Self, LlmError> {
        let base_url = match &config.base_url {
            Some(url) => url.clone(),
            None => Url::parse(DEFAULT_BASE_URL).map_err(anyhow::Error::from)?,
        };

        Ok(Self {
            streaming_timeout: config.streaming_timeout()?,
            client: Client::new(),
            base_url,
            api_key: config.api_key.clone(),
            reasoning: config.reasoning.clone(),
            default_model: config.default_model.clone(),
            input_token_limit: config.input_token_limit,
            output_token_limit: config.output_token_limit,
            web_search: config.native_tool_enabled(NativeTool::WebSearch),
            name,
        })
    }

    fn base(&self) -> &str {
        self.base_url.as_str().trim_end_matches('/')
    }

    /// Attach the API key and version headers
    fn authorize(&self, mut builder: RequestBuilder) -> RequestBuilder {
        builder = builder.header("anthropic-version", ANTHROPIC_VERSION);
        if let Some(key) = &self.api_key {
            builder = builder.header("x-api-key", key.expose_secret());
        }
        builder
    }

    fn request_body(&self, request: &StreamRequest<'_>) -> MessagesRequest {
        let config = request.config;
        let max_tokens = if config.max_generated_tokens > 0 {
            config.max_generated_tokens
        } else {
            DEFAULT_MAX_TOKENS
        };

        MessagesRequest {
            model: config.model.clone(),
            max_tokens,
            system: request.conversation.system_prompt(),
            messages: messages(request.conversation),
            stream: true,
            tools: tool_definitions(request.tools, self.web_search && !config.tools_disabled),
            thinking: thinking_budget(&self.reasoning, config.reasoning_disabled, max_tokens)
                .map(|budget_tokens| ThinkingConfig::Enabled { budget_tokens }),
        }
    }
}

#[async_trait]
impl Provider for AnthropicProvider {
    type Event = Event;
    type Decoder = AnthropicDecoder;

    fn name(&self) -> &str {
        &self.name
    }

    fn default_config(&self) -> LanguageModelConfig {
        LanguageModelConfig {
            model: self.default_model.clone(),
            max_generated_tokens: self
                .output_token_limit
                .filter(|limit| *limit > 0)
                .unwrap_or(DEFAULT_MAX_TOKENS),
            ..LanguageModelConfig::default()
        }
    }

    fn streaming_timeout(&self) -> Option<Duration> {
        self.streaming_timeout
    }

    fn check_config(&self, config: &LanguageModelConfig) -> Result<(), LlmError> {
        if config.json_output_format.is_some() {
            return Err(LlmError::Unsupported("JSON output format on anthropic".to_owned()));
        }
        Ok(())
    }

    async fn open_stream(&self, request: StreamRequest<'_>) -> Result<VendorStream<Event>, LlmError> {
        let builder = self
            .client
            .post(format!("{}/messages", self.base()))
            .json(&self.request_body(&request));

        open_event_stream(&self.name, self.authorize(builder)).await
    }

    fn decoder(&self) -> AnthropicDecoder {
        AnthropicDecoder::default()
    }

    fn count_tokens(&self, text: &str) -> usize {
        estimate_tokens(text)
    }

    fn input_token_limit(&self) -> usize {
        self.input_token_limit.unwrap_or(DEFAULT_INPUT_TOKEN_LIMIT)
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>, LlmError> {
        let mut models = Vec::new();
        let mut after_id: Option<String> = None;

        loop {
            let mut builder = self
                .client
                .get(format!("{}/models", self.base()))
                .query(&[("limit", MODELS_PAGE_SIZE.to_string())]);
            if let Some(cursor) = &after_id {
                builder = builder.query(&[("after_id", cursor)]);
            }

            let page: ModelPage = get_json(&self.name, self.authorize(builder)).await?;
            models.extend(page.data.into_iter().map(|model| ModelInfo {
                id: model.id,
                display_name: model.display_name,
            }));

            match page.last_id {
                Some(last_id) if page.has_more => after_id = Some(last_id),
                _ => break,
            }
        }

        Ok(models)
    }
}
