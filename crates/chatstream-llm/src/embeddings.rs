//! Text embeddings over the `OpenAI` embeddings API
//!
//! Shares credentials, base URL and Azure deployment addressing with the
//! chat provider for the same configuration entry.

use async_trait::async_trait;
use chatstream_config::LlmProviderConfig;

use crate::error::LlmError;
use crate::protocol::openai::{EmbeddingRequest, EmbeddingResponse};
use crate::provider::openai::OpenAiProvider;
use crate::provider::{Provider, get_json};

/// Model used when none is configured
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-large";

/// Output size of [`DEFAULT_EMBEDDING_MODEL`]
pub const DEFAULT_EMBEDDING_DIMENSIONS: u32 = 3072;

/// Vector embeddings for text
#[async_trait]
pub trait Embeddings: Send + Sync {
    /// Embed one text
    async fn create_embedding(&self, text: &str) -> Result<Vec<f32>, LlmError>;

    /// Embed many texts in one vendor call, in input order
    async fn batch_create_embeddings(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LlmError>;

    /// Configured vector size; zero when the vendor decides
    fn dimensions(&self) -> u32;
}

/// Embeddings for the `OpenAI` official, compatible and Azure flavours
pub struct OpenAiEmbeddings {
    provider: OpenAiProvider,
    model: String,
    dimensions: u32,
}

impl OpenAiEmbeddings {
    /// Create from provider configuration
    ///
    /// # Errors
    ///
    /// Returns `LlmError::Internal` when the provider is not an `OpenAI`
    /// protocol type or its base URL is missing.
    pub fn new(name: String, config: &LlmProviderConfig) -> Result<Self, LlmError> {
        let provider = OpenAiProvider::new(name, config)?;

        let (model, dimensions) = match &config.embeddings.model {
            Some(model) if !model.is_empty() => (model.clone(), config.embeddings.dimensions.unwrap_or(0)),
            _ => (DEFAULT_EMBEDDING_MODEL.to_owned(), DEFAULT_EMBEDDING_DIMENSIONS),
        };

        Ok(Self {
            provider,
            model,
            dimensions,
        })
    }

    /// Model sent with every request
    pub fn model(&self) -> &str {
        &self.model
    }

    fn request<'a>(&'a self, input: &'a [String]) -> EmbeddingRequest<'a> {
        EmbeddingRequest {
            input,
            model: &self.model,
            encoding_format: "float",
            dimensions: (self.dimensions > 0).then_some(self.dimensions),
        }
    }

    async fn embed(&self, input: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
        let name = self.provider.name();
        tracing::debug!(provider = %name, model = %self.model, inputs = input.len(), "sending embeddings request");

        let builder = self
            .provider
            .post(&self.provider.embeddings_url(&self.model))
            .json(&self.request(input));
        let mut response: EmbeddingResponse = get_json(name, builder).await?;

        response.data.sort_by_key(|data| data.index);
        Ok(response.data.into_iter().map(|data| data.embedding).collect())
    }
}

#[async_trait]
impl Embeddings for OpenAiEmbeddings {
    async fn create_embedding(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        self.embed(&[text.to_owned()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::Upstream("no embedding data returned".to_owned()))
    }

    async fn batch_create_embeddings(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let embeddings = self.embed(texts).await?;
        if embeddings.len() != texts.len() {
            return Err(LlmError::Upstream(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                embeddings.len()
            )));
        }

        Ok(embeddings)
    }

    fn dimensions(&self) -> u32 {
        self.dimensions
    }
}
