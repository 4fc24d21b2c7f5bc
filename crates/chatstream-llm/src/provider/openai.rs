//! `OpenAI` provider: official API, compatible servers and Azure deployments
//!
//! Speaks either Chat Completions or the Responses API depending on
//! `[openai] use_responses_api`.

use std::time::Duration;

use async_trait::async_trait;
use chatstream_config::{LlmProviderConfig, LlmProviderType, NativeTool, OpenAiOptions, ReasoningConfig};
use eventsource_stream::Event;
use reqwest::{Client, RequestBuilder};
use secrecy::{ExposeSecret, SecretString};
use url::Url;

use super::{DecodeFlow, Provider, StreamDecoder, StreamRequest, TurnOutcome, VendorStream, get_json, open_event_stream};
use crate::convert::openai::{ChatCompletionsDecoder, chat_messages, chat_tools};
use crate::convert::responses::{ResponsesDecoder, function_tools, input_items};
use crate::convert::turns::TranslateOptions;
use crate::error::LlmError;
use crate::protocol::openai::{ChatCompletionRequest, JsonSchemaFormat, ModelList, ResponseFormat, StreamOptions};
use crate::protocol::responses::{ReasoningParams, ResponsesRequest, ResponsesTool, TextFormat, TextOptions};
use crate::tokens::count_openai_tokens;
use crate::types::{LanguageModelConfig, ModelInfo, TextStreamEvent};

/// Default `OpenAI` API base URL
const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Largest image forwarded inline
const MAX_IMAGE_SIZE: u64 = 20 * 1024 * 1024;

/// Schema name used for structured output
const OUTPUT_FORMAT_NAME: &str = "output_format";

/// Which `OpenAI` dialect the endpoint speaks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flavour {
    Official,
    Compatible,
    Azure,
}

/// `OpenAI` and OpenAI-compatible provider
pub struct OpenAiProvider {
    name: String,
    client: Client,
    base_url: Url,
    api_key: Option<SecretString>,
    flavour: Flavour,
    options: OpenAiOptions,
    reasoning: ReasoningConfig,
    default_model: String,
    input_token_limit: Option<usize>,
    output_token_limit: Option<u32>,
    streaming_timeout: Option<Duration>,
    send_user_id: bool,
    web_search: bool,
}

impl OpenAiProvider {
    /// Create from provider configuration
    ///
    /// # Errors
    ///
    /// Returns `LlmError::Internal` if the base URL is missing for Azure
    /// or the streaming timeout does not parse.
    pub fn new(name: String, config: &LlmProviderConfig) -> Result<Self, LlmError> {
        let flavour = match config.provider_type {
            LlmProviderType::Openai => Flavour::Official,
            LlmProviderType::OpenaiCompatible => Flavour::Compatible,
            LlmProviderType::Azure => Flavour::Azure,
            _ => return Err(LlmError::Internal(anyhow::anyhow!("expected an openai provider type"))),
        };

        let base_url = match (&config.base_url, flavour) {
            (Some(url), _) => url.clone(),
            (None, Flavour::Official) => Url::parse(DEFAULT_BASE_URL).map_err(anyhow::Error::from)?,
            (None, _) => {
                return Err(LlmError::Internal(anyhow::anyhow!("provider '{name}' requires base_url")));
            }
        };

        Ok(Self {
            streaming_timeout: config.streaming_timeout()?,
            client: Client::new(),
            base_url,
            api_key: config.api_key.clone(),
            flavour,
            options: config.openai.clone(),
            reasoning: config.reasoning.clone(),
            default_model: config.default_model.clone(),
            input_token_limit: config.input_token_limit,
            output_token_limit: config.output_token_limit,
            send_user_id: config.send_user_id,
            web_search: config.native_tool_enabled(NativeTool::WebSearch),
            name,
        })
    }

    fn base(&self) -> &str {
        self.base_url.as_str().trim_end_matches('/')
    }

    /// Chat completions URL for `model`
    fn completions_url(&self, model: &str) -> String {
        let base = self.base();
        match self.flavour {
            Flavour::Azure => format!(
                "{base}/openai/deployments/{model}/chat/completions?api-version={}",
                self.options.azure_api_version()
            ),
            Flavour::Official | Flavour::Compatible => format!("{base}/chat/completions"),
        }
    }

    fn responses_url(&self) -> String {
        format!("{}/responses", self.base())
    }

    /// Embeddings URL for `model`; Azure addresses the deployment
    pub(crate) fn embeddings_url(&self, model: &str) -> String {
        let base = self.base();
        match self.flavour {
            Flavour::Azure => format!(
                "{base}/openai/deployments/{model}/embeddings?api-version={}",
                self.options.azure_api_version()
            ),
            Flavour::Official | Flavour::Compatible => format!("{base}/embeddings"),
        }
    }

    /// Authorized POST to `url`
    pub(crate) fn post(&self, url: &str) -> RequestBuilder {
        self.authorize(self.client.post(url))
    }

    /// Attach credentials and the organization header
    fn authorize(&self, mut builder: RequestBuilder) -> RequestBuilder {
        if let Some(key) = &self.api_key {
            builder = match self.flavour {
                Flavour::Azure => builder.header("api-key", key.expose_secret()),
                Flavour::Official | Flavour::Compatible => builder.bearer_auth(key.expose_secret()),
            };
        }

        if let Some(organization) = &self.options.organization {
            builder = builder.header("OpenAI-Organization", organization);
        }

        builder
    }

    fn user_id(&self, request: &StreamRequest<'_>) -> Option<String> {
        self.send_user_id
            .then(|| request.context.requesting_user_id.clone())
            .flatten()
    }

    fn completions_body(&self, request: &StreamRequest<'_>) -> ChatCompletionRequest {
        let config = request.config;
        let max_tokens = (config.max_generated_tokens > 0).then_some(config.max_generated_tokens);

        ChatCompletionRequest {
            model: config.model.clone(),
            messages: chat_messages(request.conversation),
            stream: true,
            stream_options: (!self.options.disable_stream_options).then_some(StreamOptions { include_usage: true }),
            max_completion_tokens: max_tokens.filter(|_| !self.options.use_max_tokens),
            max_tokens: max_tokens.filter(|_| self.options.use_max_tokens),
            tools: chat_tools(request.tools),
            response_format: config.json_output_format.clone().map(|schema| ResponseFormat::JsonSchema {
                json_schema: JsonSchemaFormat {
                    name: OUTPUT_FORMAT_NAME.to_owned(),
                    schema,
                    strict: true,
                },
            }),
            user: self.user_id(request),
        }
    }

    fn responses_body(&self, request: &StreamRequest<'_>) -> ResponsesRequest {
        let config = request.config;

        let mut tools = function_tools(request.tools);
        if self.web_search && !config.tools_disabled {
            tools.push(ResponsesTool::WebSearchPreview);
        }

        let reasoning = (self.reasoning.enabled && !config.reasoning_disabled).then(|| ReasoningParams {
            effort: self.reasoning.effort.as_str(),
            summary: "auto",
        });

        ResponsesRequest {
            model: config.model.clone(),
            input: input_items(request.conversation),
            instructions: request.conversation.system_prompt(),
            stream: true,
            max_output_tokens: (config.max_generated_tokens > 0).then_some(config.max_generated_tokens),
            tools,
            reasoning,
            text: config.json_output_format.clone().map(|schema| TextOptions {
                format: TextFormat::JsonSchema {
                    name: OUTPUT_FORMAT_NAME.to_owned(),
                    schema,
                    strict: true,
                },
            }),
            safety_identifier: self.user_id(request),
        }
    }
}

/// Decoder for whichever `OpenAI` API the provider speaks
#[derive(Debug)]
pub enum OpenAiDecoder {
    /// Chat Completions chunks
    Completions(ChatCompletionsDecoder),
    /// Responses API events
    Responses(ResponsesDecoder),
}

impl StreamDecoder for OpenAiDecoder {
    type Event = Event;

    fn decode(&mut self, event: Event, out: &mut Vec<TextStreamEvent>) -> Result<DecodeFlow, LlmError> {
        match self {
            Self::Completions(decoder) => decoder.decode(event, out),
            Self::Responses(decoder) => decoder.decode(event, out),
        }
    }

    fn finish(self) -> Result<TurnOutcome, LlmError> {
        match self {
            Self::Completions(decoder) => decoder.finish(),
            Self::Responses(decoder) => decoder.finish(),
        }
    }
}

#[async_trait]
impl Provider for OpenAiProvider {
    type Event = Event;
    type Decoder = OpenAiDecoder;

    fn name(&self) -> &str {
        &self.name
    }

    fn default_config(&self) -> LanguageModelConfig {
        LanguageModelConfig {
            model: self.default_model.clone(),
            max_generated_tokens: self.output_token_limit.unwrap_or(0),
            ..LanguageModelConfig::default()
        }
    }

    fn translate_options(&self) -> TranslateOptions {
        TranslateOptions {
            max_image_size: Some(MAX_IMAGE_SIZE),
        }
    }

    fn streaming_timeout(&self) -> Option<Duration> {
        self.streaming_timeout
    }

    async fn open_stream(&self, request: StreamRequest<'_>) -> Result<VendorStream<Event>, LlmError> {
        let builder = if self.options.use_responses_api {
            self.client.post(self.responses_url()).json(&self.responses_body(&request))
        } else {
            self.client
                .post(self.completions_url(&request.config.model))
                .json(&self.completions_body(&request))
        };

        open_event_stream(&self.name, self.authorize(builder)).await
    }

    fn decoder(&self) -> OpenAiDecoder {
        if self.options.use_responses_api {
            OpenAiDecoder::Responses(ResponsesDecoder::default())
        } else {
            OpenAiDecoder::Completions(ChatCompletionsDecoder::default())
        }
    }

    fn count_tokens(&self, text: &str) -> usize {
        count_openai_tokens(text)
    }

    fn input_token_limit(&self) -> usize {
        self.input_token_limit
            .unwrap_or_else(|| default_input_token_limit(&self.default_model))
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>, LlmError> {
        if self.flavour == Flavour::Azure {
            return Err(LlmError::Unsupported("listing models of an Azure deployment".to_owned()));
        }

        let builder = self.authorize(self.client.get(format!("{}/models", self.base())));
        let list: ModelList = get_json(&self.name, builder).await?;

        Ok(list
            .data
            .into_iter()
            .map(|model| ModelInfo {
                display_name: model.id.clone(),
                id: model.id,
            })
            .collect())
    }
}

/// Prompt ceiling by model family
fn default_input_token_limit(model: &str) -> usize {
    const LARGE_CONTEXT: [&str; 6] = [
        "gpt-4o",
        "o1-",
        "gpt-4-turbo",
        "gpt-4-0125-preview",
        "gpt-4-1106-preview",
        "gpt-4.1",
    ];

    if LARGE_CONTEXT.iter().any(|prefix| model.starts_with(prefix)) {
        128_000
    } else if model.starts_with("gpt-4") {
        8192
    } else if model == "gpt-3.5-turbo-instruct" {
        4096
    } else if model.starts_with("gpt-3.5-turbo") {
        16_385
    } else {
        128_000
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{Value, json};

    use super::*;
    use crate::convert::turns::Conversation;
    use crate::types::{Context, Post, Tool};

    fn provider(config: Value) -> OpenAiProvider {
        let config: LlmProviderConfig = serde_json::from_value(config).unwrap();
        OpenAiProvider::new("test".to_owned(), &config).unwrap()
    }

    fn official() -> Value {
        json!({"type": "openai", "api_key": "sk-test", "default_model": "gpt-4o", "output_token_limit": 4096})
    }

    fn body<T: serde::Serialize>(
        provider: &OpenAiProvider,
        config: &LanguageModelConfig,
        tools: &[Tool],
        build: impl Fn(&OpenAiProvider, &StreamRequest<'_>) -> T,
    ) -> Value {
        let conversation = Conversation::translate(
            vec![Post::system("be brief"), Post::user("hi")],
            &TranslateOptions::default(),
        );
        let context = Context {
            requesting_user_id: Some("user-1".to_owned()),
            ..Context::default()
        };
        let request = StreamRequest {
            conversation: &conversation,
            tools,
            config,
            context: &context,
        };
        serde_json::to_value(build(provider, &request)).unwrap()
    }

    #[test]
    fn completions_body_uses_defaults() {
        let provider = provider(official());
        let config = provider.default_config();

        let value = body(&provider, &config, &[], OpenAiProvider::completions_body);

        assert_eq!(value["model"], "gpt-4o");
        assert_eq!(value["max_completion_tokens"], 4096);
        assert_eq!(value["stream_options"], json!({"include_usage": true}));
        assert!(value.get("user").is_none());
        assert!(value.get("max_tokens").is_none());
    }

    #[test]
    fn completions_switches_apply() {
        let provider = provider(json!({
            "type": "openai_compatible",
            "base_url": "http://localhost:8000/v1",
            "default_model": "llama",
            "output_token_limit": 512,
            "send_user_id": true,
            "openai": {"disable_stream_options": true, "use_max_tokens": true}
        }));
        let config = LanguageModelConfig {
            json_output_format: Some(json!({"type": "object"})),
            ..provider.default_config()
        };

        let value = body(&provider, &config, &[], OpenAiProvider::completions_body);

        assert_eq!(value["max_tokens"], 512);
        assert!(value.get("max_completion_tokens").is_none());
        assert!(value.get("stream_options").is_none());
        assert_eq!(value["user"], "user-1");
        assert_eq!(value["response_format"]["json_schema"]["name"], "output_format");
        assert_eq!(provider.completions_url("llama"), "http://localhost:8000/v1/chat/completions");
    }

    #[test]
    fn azure_url_names_the_deployment() {
        let provider = provider(json!({
            "type": "azure",
            "base_url": "https://example.openai.azure.com/",
            "default_model": "gpt-4o"
        }));

        assert_eq!(
            provider.completions_url("prod-4o"),
            "https://example.openai.azure.com/openai/deployments/prod-4o/chat/completions?api-version=2025-04-01-preview"
        );
    }

    #[test]
    fn azure_requires_base_url() {
        let config: LlmProviderConfig =
            serde_json::from_value(json!({"type": "azure", "default_model": "gpt-4o"})).unwrap();
        assert!(OpenAiProvider::new("azure".to_owned(), &config).is_err());
    }

    #[test]
    fn responses_body_carries_reasoning_and_web_search() {
        let provider = provider(json!({
            "type": "openai",
            "default_model": "o3",
            "send_user_id": true,
            "enabled_native_tools": ["web_search"],
            "reasoning": {"enabled": true, "effort": "high"},
            "openai": {"use_responses_api": true}
        }));
        let config = provider.default_config();

        let value = body(&provider, &config, &[], OpenAiProvider::responses_body);

        assert_eq!(value["instructions"], "be brief");
        assert_eq!(value["reasoning"], json!({"effort": "high", "summary": "auto"}));
        assert_eq!(value["tools"], json!([{"type": "web_search_preview"}]));
        assert_eq!(value["safety_identifier"], "user-1");
        assert!(value.get("max_output_tokens").is_none());

        let disabled = LanguageModelConfig {
            reasoning_disabled: true,
            tools_disabled: true,
            ..config
        };
        let value = body(&provider, &disabled, &[], OpenAiProvider::responses_body);
        assert!(value.get("reasoning").is_none());
        assert!(value.get("tools").is_none());
    }

    #[test]
    fn input_limits_follow_model_family() {
        assert_eq!(default_input_token_limit("gpt-4o-mini"), 128_000);
        assert_eq!(default_input_token_limit("gpt-4-0613"), 8192);
        assert_eq!(default_input_token_limit("gpt-3.5-turbo-instruct"), 4096);
        assert_eq!(default_input_token_limit("gpt-3.5-turbo-0125"), 16_385);
        assert_eq!(default_input_token_limit("o3"), 128_000);

        let configured = provider(json!({"type": "openai", "default_model": "gpt-4", "input_token_limit": 1000}));
        assert_eq!(configured.input_token_limit(), 1000);
    }
}
