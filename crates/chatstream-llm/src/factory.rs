//! Build language models from provider configuration

use std::sync::Arc;

use chatstream_config::{LlmProviderConfig, LlmProviderType};

use crate::embeddings::{Embeddings, OpenAiEmbeddings};
use crate::engine::{ChatEngine, LanguageModel};
use crate::error::LlmError;
use crate::provider::anthropic::AnthropicProvider;
use crate::provider::bedrock::BedrockProvider;
use crate::provider::openai::OpenAiProvider;

/// Create the language model for one configured provider
///
/// # Errors
///
/// Returns an error if the provider configuration is invalid or names a
/// feature the vendor does not support.
pub async fn build_language_model(name: &str, config: &LlmProviderConfig) -> Result<Arc<dyn LanguageModel>, LlmError> {
    let model: Arc<dyn LanguageModel> = match &config.provider_type {
        LlmProviderType::Openai | LlmProviderType::OpenaiCompatible | LlmProviderType::Azure => {
            Arc::new(ChatEngine::new(OpenAiProvider::new(name.to_owned(), config)?))
        }
        LlmProviderType::Anthropic => Arc::new(ChatEngine::new(AnthropicProvider::new(name.to_owned(), config)?)),
        LlmProviderType::Bedrock(_) => Arc::new(ChatEngine::new(BedrockProvider::new(name.to_owned(), config).await?)),
    };

    tracing::debug!(provider = %name, model = %config.default_model, "language model ready");

    Ok(model)
}

/// Create the embeddings client for one configured provider
///
/// # Errors
///
/// Returns `LlmError::Unsupported` for providers without an embeddings
/// endpoint, or an error if the configuration is invalid.
pub fn build_embeddings(name: &str, config: &LlmProviderConfig) -> Result<Arc<dyn Embeddings>, LlmError> {
    match &config.provider_type {
        LlmProviderType::Openai | LlmProviderType::OpenaiCompatible | LlmProviderType::Azure => {
            Ok(Arc::new(OpenAiEmbeddings::new(name.to_owned(), config)?))
        }
        LlmProviderType::Anthropic | LlmProviderType::Bedrock(_) => {
            Err(LlmError::Unsupported(format!("embeddings on provider '{name}'")))
        }
    }
}
