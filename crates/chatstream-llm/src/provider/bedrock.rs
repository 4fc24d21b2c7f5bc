//! AWS Bedrock provider using the `ConverseStream` API

use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_bedrockruntime::Client as BedrockClient;
use aws_sdk_bedrockruntime::types::InferenceConfiguration;
use aws_smithy_runtime_api::client::auth::http::HTTP_BEARER_AUTH_SCHEME_ID;
use chatstream_config::{BedrockConfig, LlmProviderConfig, LlmProviderType};
use futures_util::stream;
use secrecy::{ExposeSecret, SecretString};

use super::{Provider, StreamRequest, VendorStream};
use crate::convert::bedrock::{BedrockDecoder, BedrockEvent, messages, system_blocks, tool_config};
use crate::error::LlmError;
use crate::tokens::estimate_tokens;
use crate::types::{LanguageModelConfig, ModelInfo};

/// Generated token ceiling when none is configured
const DEFAULT_MAX_TOKENS: u32 = 8192;

/// Prompt ceiling when none is configured
const DEFAULT_INPUT_TOKEN_LIMIT: usize = 200_000;

/// AWS Bedrock provider
pub struct BedrockProvider {
    name: String,
    runtime: BedrockClient,
    control: aws_sdk_bedrock::Client,
    default_model: String,
    input_token_limit: Option<usize>,
    output_token_limit: Option<u32>,
    streaming_timeout: Option<Duration>,
    reasoning_enabled: bool,
}

impl BedrockProvider {
    /// Create from provider configuration
    ///
    /// # Errors
    ///
    /// Returns `LlmError::Internal` for a non-Bedrock provider type or a bad
    /// timeout.
    pub async fn new(name: String, config: &LlmProviderConfig) -> Result<Self, LlmError> {
        let LlmProviderType::Bedrock(bedrock_config) = &config.provider_type else {
            return Err(LlmError::Internal(anyhow::anyhow!("expected bedrock provider type")));
        };

        let auth = AwsAuth::select(bedrock_config, config.api_key.as_ref());
        tracing::debug!(provider = %name, auth = auth.kind(), "loading aws config");
        let sdk_config = load_aws_config(bedrock_config, auth).await;

        Ok(Self {
            runtime: BedrockClient::new(&sdk_config),
            control: aws_sdk_bedrock::Client::new(&sdk_config),
            default_model: config.default_model.clone(),
            input_token_limit: config.input_token_limit,
            output_token_limit: config.output_token_limit,
            streaming_timeout: config.streaming_timeout()?,
            reasoning_enabled: config.reasoning.enabled,
            name,
        })
    }
}

/// How requests to Bedrock are signed
#[derive(Debug, Clone, Copy)]
enum AwsAuth<'a> {
    /// Configured IAM access key pair, SigV4
    Static {
        access_key: &'a SecretString,
        secret_key: &'a SecretString,
    },
    /// Bedrock API key sent as an HTTP bearer token
    Bearer(&'a SecretString),
    /// Environment, profile or instance credentials, SigV4
    DefaultChain,
}

impl<'a> AwsAuth<'a> {
    /// Static credentials win over an API key; neither means the default chain
    fn select(config: &'a BedrockConfig, api_key: Option<&'a SecretString>) -> Self {
        match (&config.access_key_id, &config.secret_access_key, api_key) {
            (Some(access_key), Some(secret_key), _) => Self::Static { access_key, secret_key },
            (_, _, Some(key)) => Self::Bearer(key),
            _ => Self::DefaultChain,
        }
    }

    const fn kind(self) -> &'static str {
        match self {
            Self::Static { .. } => "static",
            Self::Bearer(_) => "bearer",
            Self::DefaultChain => "default_chain",
        }
    }
}

/// Shared AWS config for the runtime and control-plane clients
async fn load_aws_config(config: &BedrockConfig, auth: AwsAuth<'_>) -> aws_config::SdkConfig {
    let mut loader =
        aws_config::defaults(aws_config::BehaviorVersion::latest()).region(aws_config::Region::new(config.region.clone()));

    match auth {
        AwsAuth::Static { access_key, secret_key } => {
            let credentials = aws_credential_types::Credentials::new(
                access_key.expose_secret(),
                secret_key.expose_secret(),
                None,
                None,
                "chatstream-config",
            );
            loader = loader.credentials_provider(credentials);
        }
        AwsAuth::Bearer(key) => {
            loader = loader
                .token_provider(aws_credential_types::Token::new(key.expose_secret(), None))
                .auth_scheme_preference([HTTP_BEARER_AUTH_SCHEME_ID]);
        }
        AwsAuth::DefaultChain => {}
    }

    if let Some(endpoint) = &config.endpoint_url {
        loader = loader.endpoint_url(endpoint.as_str());
    }

    loader.load().await
}

#[async_trait]
impl Provider for BedrockProvider {
    type Event = BedrockEvent;
    type Decoder = BedrockDecoder;

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
            return Err(LlmError::Unsupported("JSON output format on bedrock".to_owned()));
        }
        if self.reasoning_enabled && !config.reasoning_disabled {
            tracing::debug!(provider = %self.name, "reasoning is not sent to bedrock");
        }
        Ok(())
    }

    async fn open_stream(&self, request: StreamRequest<'_>) -> Result<VendorStream<BedrockEvent>, LlmError> {
        let max_tokens = i32::try_from(request.config.max_generated_tokens)
            .map_err(|_| LlmError::InvalidRequest("max generated tokens out of range".to_owned()))?;

        let mut converse = self
            .runtime
            .converse_stream()
            .model_id(&request.config.model)
            .set_system(Some(system_blocks(request.conversation)))
            .set_messages(Some(messages(request.conversation)?));

        if max_tokens > 0 {
            converse = converse.inference_config(InferenceConfiguration::builder().max_tokens(max_tokens).build());
        }

        if let Some(tools) = tool_config(request.tools)? {
            converse = converse.tool_config(tools);
        }

        let output = converse.send().await.map_err(|e| {
            tracing::error!(provider = %self.name, error = %e, "bedrock converse_stream failed");
            LlmError::Upstream(e.to_string())
        })?;

        let events = stream::unfold(output.stream, |mut receiver| async move {
            loop {
                match receiver.recv().await {
                    Ok(Some(output)) => {
                        if let Some(event) = BedrockEvent::from_output(output) {
                            return Some((Ok(event), receiver));
                        }
                    }
                    Ok(None) => return None,
                    Err(e) => return Some((Err(LlmError::Streaming(e.to_string())), receiver)),
                }
            }
        });

        Ok(Box::pin(events))
    }

    fn decoder(&self) -> BedrockDecoder {
        BedrockDecoder::default()
    }

    fn count_tokens(&self, text: &str) -> usize {
        estimate_tokens(text)
    }

    fn input_token_limit(&self) -> usize {
        self.input_token_limit.unwrap_or(DEFAULT_INPUT_TOKEN_LIMIT)
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>, LlmError> {
        let output = self.control.list_foundation_models().send().await.map_err(|e| {
            tracing::error!(provider = %self.name, error = %e, "bedrock list_foundation_models failed");
            LlmError::Upstream(e.to_string())
        })?;

        Ok(output
            .model_summaries()
            .iter()
            .map(|summary| ModelInfo {
                id: summary.model_id().to_owned(),
                display_name: summary.model_name().unwrap_or_else(|| summary.model_id()).to_owned(),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use aws_credential_types::provider::token::ProvideToken;
    use serde_json::{Value, json};

    use super::*;

    fn provider_config(config: Value) -> LlmProviderConfig {
        serde_json::from_value(config).unwrap()
    }

    fn bedrock(config: &LlmProviderConfig) -> &BedrockConfig {
        let LlmProviderType::Bedrock(bedrock) = &config.provider_type else {
            panic!("expected bedrock config");
        };
        bedrock
    }

    #[test]
    fn api_key_selects_bearer_auth() {
        let config = provider_config(json!({
            "type": {"bedrock": {"region": "us-east-1"}},
            "api_key": "br-test-key",
            "default_model": "anthropic.claude-sonnet-4"
        }));

        let auth = AwsAuth::select(bedrock(&config), config.api_key.as_ref());

        assert!(matches!(auth, AwsAuth::Bearer(key) if key.expose_secret() == "br-test-key"));
    }

    #[test]
    fn static_credentials_win_over_api_key() {
        let config = provider_config(json!({
            "type": {"bedrock": {"region": "us-east-1", "access_key_id": "AKIA", "secret_access_key": "secret"}},
            "api_key": "br-test-key",
            "default_model": "anthropic.claude-sonnet-4"
        }));

        let auth = AwsAuth::select(bedrock(&config), config.api_key.as_ref());

        assert_eq!(auth.kind(), "static");
    }

    #[test]
    fn no_credentials_use_the_default_chain() {
        let config = provider_config(json!({
            "type": {"bedrock": {"region": "us-east-1"}},
            "default_model": "anthropic.claude-sonnet-4"
        }));

        assert_eq!(AwsAuth::select(bedrock(&config), None).kind(), "default_chain");
    }

    #[tokio::test]
    async fn api_key_config_builds_with_a_bearer_token() {
        let config = provider_config(json!({
            "type": {"bedrock": {"region": "us-west-2"}},
            "api_key": "br-test-key",
            "default_model": "anthropic.claude-sonnet-4"
        }));

        let provider = BedrockProvider::new("bedrock".to_owned(), &config).await.unwrap();
        assert_eq!(provider.name(), "bedrock");

        let auth = AwsAuth::select(bedrock(&config), config.api_key.as_ref());
        let sdk_config = load_aws_config(bedrock(&config), auth).await;
        let token = sdk_config.token_provider().unwrap().provide_token().await.unwrap();
        assert_eq!(token.token(), "br-test-key");
    }
}
