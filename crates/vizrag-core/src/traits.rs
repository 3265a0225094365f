use async_trait::async_trait;

use crate::error::ProviderError;
use crate::types::{Embedding, Generation, Prompt};

/// Capability that turns text into fixed-dimension vectors.
///
/// Implementations must return vectors of one dimension for every input and
/// be deterministic for identical text.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Identifier of the embedding model, recorded in persisted indexes.
    fn model_id(&self) -> &str;

    /// Generates the embedding for a single text.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails or returns no vector.
    async fn embed(&self, text: &str) -> Result<Embedding, ProviderError>;

    /// Embeds several texts, preserving input order.
    ///
    /// # Errors
    ///
    /// Returns an error if any embedding fails.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>, ProviderError> {
        let mut embeddings = Vec::with_capacity(texts.len());
        for text in texts {
            embeddings.push(self.embed(text).await?);
        }
        Ok(embeddings)
    }
}

/// Capability that answers a composed prompt with generated text.
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    /// Returns the unique identifier for this provider.
    fn name(&self) -> &'static str;

    /// Generates an answer for the prompt with the given model.
    ///
    /// # Errors
    ///
    /// Returns an error on authentication failure, throttling, transport
    /// failure or an unusable response.
    async fn generate(&self, prompt: &Prompt, model: &str) -> Result<Generation, ProviderError>;
}
