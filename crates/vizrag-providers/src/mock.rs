//! Mock providers for testing the orchestrator without network access.
//!
//! [`MockGenerator`] returns canned answers keyed by query substrings and
//! records every prompt it receives; [`FailingEmbedder`] delegates to a
//! [`HashedEmbedder`] until a configured number of calls has been served.

use core::sync::atomic::{AtomicUsize, Ordering};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use vizrag_core::{Embedding, EmbeddingProvider, Generation, GenerationProvider, IgnoreLock as _, Prompt, ProviderError, TokenUsage};

use crate::hashed::HashedEmbedder;

/// Response storage type
type ResponseMap = Arc<Mutex<HashMap<String, String>>>;

/// Builds the error a failing mock returns.
pub type FailureFactory = fn() -> ProviderError;

/// Generation provider with pre-defined responses.
#[derive(Clone)]
pub struct MockGenerator {
    /// Predefined responses keyed by query substring
    responses: ResponseMap,
    /// Fallback when no pattern matches
    default_response: Arc<Mutex<Option<String>>>,
    /// Every prompt received, in order
    prompts: Arc<Mutex<Vec<Prompt>>>,
    /// When set, every call fails with this error
    failure: Arc<Mutex<Option<FailureFactory>>>,
}

impl Default for MockGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl MockGenerator {
    #[must_use]
    pub fn new() -> Self {
        Self {
            responses: Arc::new(Mutex::new(HashMap::new())),
            default_response: Arc::new(Mutex::new(None)),
            prompts: Arc::new(Mutex::new(Vec::new())),
            failure: Arc::new(Mutex::new(None)),
        }
    }

    /// Answer queries containing `pattern` with `response`.
    #[must_use]
    pub fn with_response(self, pattern: impl Into<String>, response: impl Into<String>) -> Self {
        {
            let mut responses = self.responses.lock_ignore_poison();
            responses.insert(pattern.into(), response.into());
        }
        self
    }

    /// Set a default response for queries that don't match any pattern.
    #[must_use]
    pub fn with_default_response(self, response: impl Into<String>) -> Self {
        *self.default_response.lock_ignore_poison() = Some(response.into());
        self
    }

    /// Fail every subsequent call with the error built by `failure`.
    #[must_use]
    pub fn with_failure(self, failure: FailureFactory) -> Self {
        *self.failure.lock_ignore_poison() = Some(failure);
        self
    }

    /// Prompts received so far.
    #[must_use]
    pub fn prompts(&self) -> Vec<Prompt> {
        self.prompts.lock_ignore_poison().clone()
    }

    /// Get the number of calls made.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.prompts.lock_ignore_poison().len()
    }

    /// Find a matching response for the given query text.
    fn find_response(&self, query: &str) -> Option<String> {
        let responses = self.responses.lock_ignore_poison();
        if let Some(response) = responses.get(query) {
            return Some(response.clone());
        }
        let mut matches: Vec<(&String, &String)> = responses
            .iter()
            .filter(|(pattern, _)| query.contains(pattern.as_str()))
            .collect();
        // longest pattern wins
        matches.sort_by(|first, second| second.0.len().cmp(&first.0.len()).then_with(|| first.0.cmp(second.0)));
        matches.first().map(|(_, response)| (*response).clone())
    }
}

#[async_trait]
impl GenerationProvider for MockGenerator {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn generate(&self, prompt: &Prompt, model: &str) -> Result<Generation, ProviderError> {
        self.prompts.lock_ignore_poison().push(prompt.clone());

        let failure = *self.failure.lock_ignore_poison();
        if let Some(failure) = failure {
            return Err(failure());
        }

        let text = self.find_response(&prompt.query).unwrap_or_else(|| {
            self.default_response
                .lock_ignore_poison()
                .clone()
                .unwrap_or_else(|| format!("Mock response for query: {}", prompt.query))
        });

        Ok(Generation {
            tokens_used: TokenUsage {
                input: prompt.token_estimate() as u64,
                output: (text.len() / 4) as u64,
            },
            text,
            provider: format!("mock/{model}"),
            latency_ms: 0,
        })
    }
}

/// Embedder that serves `successes` calls and then fails every call.
pub struct FailingEmbedder {
    inner: HashedEmbedder,
    successes: usize,
    calls: AtomicUsize,
}

impl FailingEmbedder {
    /// An embedder whose first call already fails.
    pub fn new() -> Self {
        Self::after(0)
    }

    /// An embedder that fails from call `successes + 1` on.
    pub fn after(successes: usize) -> Self {
        Self {
            inner: HashedEmbedder::default(),
            successes,
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of `embed` or `embed_batch` calls received.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn admit(&self) -> Result<(), ProviderError> {
        let previous = self.calls.fetch_add(1, Ordering::SeqCst);
        if previous < self.successes {
            Ok(())
        } else {
            Err(ProviderError::Unavailable("embedding backend offline".to_owned()))
        }
    }
}

impl Default for FailingEmbedder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EmbeddingProvider for FailingEmbedder {
    fn model_id(&self) -> &str {
        self.inner.model_id()
    }

    async fn embed(&self, text: &str) -> Result<Embedding, ProviderError> {
        self.admit()?;
        Ok(self.inner.vector(text))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>, ProviderError> {
        self.admit()?;
        Ok(texts.iter().map(|text| self.inner.vector(text)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prompt(query: &str) -> Prompt {
        Prompt::new("instruction", vec!["context".to_owned()], query)
    }

    #[tokio::test]
    async fn test_mock_generator_matches_substrings() {
        let generator = MockGenerator::new()
            .with_response("pie chart", "Use pie charts for parts of a whole.")
            .with_response("pie", "Pie answer.")
            .with_default_response("I only answer data visualization questions.");

        let answer = generator.generate(&prompt("When is a pie chart useful?"), "model").await.unwrap();
        assert_eq!(answer.text, "Use pie charts for parts of a whole.");
        assert_eq!(answer.provider, "mock/model");

        let fallback = generator.generate(&prompt("What sound does a cow make?"), "model").await.unwrap();
        assert_eq!(fallback.text, "I only answer data visualization questions.");

        assert_eq!(generator.call_count(), 2);
        assert_eq!(generator.prompts()[1].query, "What sound does a cow make?");
    }

    #[tokio::test]
    async fn test_mock_generator_failure_is_recorded() {
        let generator = MockGenerator::new().with_failure(|| ProviderError::Timeout);
        let result = generator.generate(&prompt("anything"), "model").await;
        assert!(matches!(result, Err(ProviderError::Timeout)));
        assert_eq!(generator.call_count(), 1);
    }

    #[tokio::test]
    async fn test_failing_embedder_counts_calls() {
        let embedder = FailingEmbedder::after(1);
        embedder.embed("first").await.unwrap();
        let second = embedder.embed_batch(&["second".to_owned()]).await;
        assert!(matches!(second, Err(ProviderError::Unavailable(_))));
        assert_eq!(embedder.call_count(), 2);
    }
}
