use async_trait::async_trait;
use ollama_rs::Ollama;
use ollama_rs::generation::embeddings::request::GenerateEmbeddingsRequest;
use tracing::debug;
use vizrag_core::{Embedding, EmbeddingProvider, ProviderError};

/// Default Ollama host.
pub const DEFAULT_HOST: &str = "http://localhost";
/// Default Ollama port.
pub const DEFAULT_PORT: u16 = 11434;
/// Default embedding model.
pub const DEFAULT_EMBEDDING_MODEL: &str = "nomic-embed-text";

/// Embedding provider backed by a local Ollama server.
pub struct OllamaEmbedder {
    ollama: Ollama,
    model: String,
}

impl OllamaEmbedder {
    pub fn new(host: &str, port: u16, model: impl Into<String>) -> Self {
        Self {
            ollama: Ollama::new(host.to_owned(), port),
            model: model.into(),
        }
    }

    fn map_error(&self, error: &impl std::fmt::Debug) -> ProviderError {
        let error_str = format!("{error:?}");
        if error_str.contains("model") && error_str.contains("not found") {
            ProviderError::Other(format!(
                "Embedding model '{}' not found. Run: ollama pull {}",
                self.model, self.model
            ))
        } else {
            ProviderError::Unavailable(format!(
                "Embedding generation failed: {error_str}. Ensure Ollama is running (ollama serve)"
            ))
        }
    }
}

impl Default for OllamaEmbedder {
    fn default() -> Self {
        Self::new(DEFAULT_HOST, DEFAULT_PORT, DEFAULT_EMBEDDING_MODEL)
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaEmbedder {
    fn model_id(&self) -> &str {
        &self.model
    }

    async fn embed(&self, text: &str) -> Result<Embedding, ProviderError> {
        let request = GenerateEmbeddingsRequest::new(self.model.clone(), text.to_owned().into());
        let response = self
            .ollama
            .generate_embeddings(request)
            .await
            .map_err(|error| self.map_error(&error))?;

        // Ollama returns Vec<Vec<f32>>, we want the first embedding
        response
            .embeddings
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::InvalidResponse("No embeddings returned".to_owned()))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>, ProviderError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!("Requesting {} embeddings from Ollama", texts.len());
        let request = GenerateEmbeddingsRequest::new(self.model.clone(), texts.to_vec().into());
        let response = self
            .ollama
            .generate_embeddings(request)
            .await
            .map_err(|error| self.map_error(&error))?;

        if response.embeddings.len() != texts.len() {
            return Err(ProviderError::InvalidResponse(format!(
                "Ollama returned {} embeddings for {} inputs",
                response.embeddings.len(),
                texts.len()
            )));
        }
        Ok(response.embeddings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_model() {
        let embedder = OllamaEmbedder::default();
        assert_eq!(embedder.model_id(), DEFAULT_EMBEDDING_MODEL);
    }

    #[test]
    fn test_model_not_found_hint() {
        let embedder = OllamaEmbedder::new(DEFAULT_HOST, DEFAULT_PORT, "custom-embed");
        let error = embedder.map_error(&"model \"custom-embed\" not found");
        assert!(error.to_string().contains("ollama pull custom-embed"));
        assert!(!error.is_retryable());

        let offline = embedder.map_error(&"connection refused");
        assert!(offline.is_retryable());
    }
}
