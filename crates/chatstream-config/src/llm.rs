use std::time::Duration;

use indexmap::IndexMap;
use secrecy::SecretString;
use serde::Deserialize;
use url::Url;

/// Idle timeout applied to vendor streams when none is configured
pub const DEFAULT_STREAMING_TIMEOUT: Duration = Duration::from_secs(30);

/// Azure OpenAI API version used when none is configured
pub const DEFAULT_AZURE_API_VERSION: &str = "2025-04-01-preview";

/// Top-level LLM configuration
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LlmConfig {
    /// Provider used when the caller does not name one
    #[serde(default)]
    pub default_provider: Option<String>,
    /// LLM provider configurations keyed by name
    #[serde(default)]
    pub providers: IndexMap<String, LlmProviderConfig>,
}

impl LlmConfig {
    /// Look up a provider by name, falling back to the default provider
    ///
    /// Without a name or a configured default, the first provider wins.
    pub fn provider(&self, name: Option<&str>) -> Option<(&str, &LlmProviderConfig)> {
        match name.or(self.default_provider.as_deref()) {
            Some(name) => self.providers.get_key_value(name).map(|(k, v)| (k.as_str(), v)),
            None => self.providers.first().map(|(k, v)| (k.as_str(), v)),
        }
    }
}

/// Configuration for a single LLM provider
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LlmProviderConfig {
    /// Provider protocol type
    #[serde(rename = "type")]
    pub provider_type: LlmProviderType,
    /// API key for authentication
    #[serde(default)]
    pub api_key: Option<SecretString>,
    /// Base URL override
    #[serde(default)]
    pub base_url: Option<Url>,
    /// Model used unless a request overrides it
    pub default_model: String,
    /// Maximum prompt size in tokens
    #[serde(default)]
    pub input_token_limit: Option<usize>,
    /// Maximum generated tokens per response
    #[serde(default)]
    pub output_token_limit: Option<u32>,
    /// Idle timeout between stream events (e.g. "30s", "0s" disables)
    #[serde(default)]
    pub streaming_timeout: Option<String>,
    /// Forward the requesting user's id to the vendor
    #[serde(default)]
    pub send_user_id: bool,
    /// Vendor-hosted tools to enable
    #[serde(default)]
    pub enabled_native_tools: Vec<NativeTool>,
    /// Reasoning / extended thinking settings
    #[serde(default)]
    pub reasoning: ReasoningConfig,
    /// OpenAI protocol switches
    #[serde(default)]
    pub openai: OpenAiOptions,
    /// Embedding model settings (`OpenAI` protocol providers only)
    #[serde(default)]
    pub embeddings: EmbeddingsOptions,
}

impl LlmProviderConfig {
    /// Resolve the streaming idle timeout
    ///
    /// Returns `None` when the watchdog is disabled with a zero duration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured duration cannot be parsed
    pub fn streaming_timeout(&self) -> anyhow::Result<Option<Duration>> {
        let Some(raw) = &self.streaming_timeout else {
            return Ok(Some(DEFAULT_STREAMING_TIMEOUT));
        };

        let timeout =
            duration_str::parse(raw).map_err(|e| anyhow::anyhow!("invalid streaming_timeout '{raw}': {e}"))?;

        Ok((!timeout.is_zero()).then_some(timeout))
    }

    /// Whether a vendor-hosted tool is enabled
    pub fn native_tool_enabled(&self, tool: NativeTool) -> bool {
        self.enabled_native_tools.contains(&tool)
    }
}

/// Supported LLM provider protocols
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmProviderType {
    /// OpenAI API
    Openai,
    /// Any OpenAI-compatible API at a custom base URL
    OpenaiCompatible,
    /// Azure OpenAI deployment
    Azure,
    /// Anthropic Messages API
    Anthropic,
    /// AWS Bedrock
    Bedrock(BedrockConfig),
}

/// AWS Bedrock-specific configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BedrockConfig {
    /// AWS region
    pub region: String,
    /// Access key ID (optional, uses default credential chain if absent)
    #[serde(default)]
    pub access_key_id: Option<SecretString>,
    /// Secret access key
    #[serde(default)]
    pub secret_access_key: Option<SecretString>,
    /// Custom endpoint, e.g. a VPC endpoint or proxy
    #[serde(default)]
    pub endpoint_url: Option<Url>,
}

/// Vendor-hosted tools
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NativeTool {
    /// Web search with citations
    WebSearch,
}

/// Reasoning configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReasoningConfig {
    /// Request reasoning from models that support it
    #[serde(default)]
    pub enabled: bool,
    /// Effort level for OpenAI reasoning models
    #[serde(default)]
    pub effort: ReasoningEffort,
    /// Explicit Anthropic thinking budget in tokens
    #[serde(default)]
    pub thinking_budget: Option<u32>,
}

/// OpenAI reasoning effort level
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasoningEffort {
    /// Minimal reasoning
    Minimal,
    /// Low effort
    Low,
    /// Medium effort
    #[default]
    Medium,
    /// High effort
    High,
}

impl ReasoningEffort {
    /// Wire name of the effort level
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Minimal => "minimal",
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

/// OpenAI protocol switches
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OpenAiOptions {
    /// Use the Responses API instead of Chat Completions
    #[serde(default)]
    pub use_responses_api: bool,
    /// Omit `stream_options` for servers that reject it
    #[serde(default)]
    pub disable_stream_options: bool,
    /// Send `max_tokens` instead of `max_completion_tokens`
    #[serde(default)]
    pub use_max_tokens: bool,
    /// Organization header value
    #[serde(default)]
    pub organization: Option<String>,
    /// Azure API version (Azure providers only)
    #[serde(default)]
    pub azure_api_version: Option<String>,
}

impl OpenAiOptions {
    /// Azure API version, falling back to the default
    pub fn azure_api_version(&self) -> &str {
        self.azure_api_version.as_deref().unwrap_or(DEFAULT_AZURE_API_VERSION)
    }
}

/// Embedding model settings
///
/// Without a model, `text-embedding-3-large` at 3072 dimensions is used.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EmbeddingsOptions {
    /// Embedding model name
    #[serde(default)]
    pub model: Option<String>,
    /// Output dimensions sent to the vendor; omitted when absent or zero
    #[serde(default)]
    pub dimensions: Option<u32>,
}
