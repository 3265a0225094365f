use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, info};
use vizrag_context::{
    ChunkingConfig, CorpusIndex, DEFAULT_BATCH_SIZE, DocumentLoader, IndexBuilder, ProgressCallback, ScoredChunk,
};
use vizrag_core::{EmbeddingProvider, Error, GenerationProvider, Prompt, Result, TokenUsage};

use crate::prompts::default_instruction;

/// Number of chunks retrieved per query unless the request says otherwise.
pub const DEFAULT_TOP_K: usize = 5;
/// Generation model used when none is configured.
pub const DEFAULT_MODEL: &str = "mixtral-8x7b-32768";

/// Everything the orchestrator needs, passed in explicitly.
#[derive(Clone)]
pub struct RagConfig {
    /// Directory holding the persisted index.
    pub storage_dir: PathBuf,
    pub embedder: Arc<dyn EmbeddingProvider>,
    pub generator: Arc<dyn GenerationProvider>,
    /// Instruction preamble sent with every query.
    pub instruction: String,
    /// Model name forwarded to the generation provider.
    pub model: String,
    pub default_top_k: usize,
    pub chunking: ChunkingConfig,
    pub batch_size: usize,
    /// Reports embedding progress during `build_index`.
    pub progress: Option<ProgressCallback>,
}

impl RagConfig {
    /// Configuration with the default instruction, model and retrieval settings.
    pub fn new(
        storage_dir: impl Into<PathBuf>,
        embedder: Arc<dyn EmbeddingProvider>,
        generator: Arc<dyn GenerationProvider>,
    ) -> Self {
        Self {
            storage_dir: storage_dir.into(),
            embedder,
            generator,
            instruction: default_instruction(),
            model: DEFAULT_MODEL.to_owned(),
            default_top_k: DEFAULT_TOP_K,
            chunking: ChunkingConfig::default(),
            batch_size: DEFAULT_BATCH_SIZE,
            progress: None,
        }
    }

    #[must_use]
    pub fn with_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.instruction = instruction.into();
        self
    }

    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    #[must_use]
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.default_top_k = top_k;
        self
    }

    #[must_use]
    pub fn with_chunking(mut self, chunking: ChunkingConfig) -> Self {
        self.chunking = chunking;
        self
    }

    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    #[must_use]
    pub fn with_progress(mut self, progress: ProgressCallback) -> Self {
        self.progress = Some(progress);
        self
    }
}

/// A single question for the orchestrator.
#[derive(Debug, Clone, Default)]
pub struct QueryRequest {
    pub query: String,
    /// Overrides [`RagConfig::default_top_k`].
    pub top_k: Option<usize>,
    /// Overrides [`RagConfig::instruction`].
    pub instruction: Option<String>,
}

impl QueryRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = Some(top_k);
        self
    }

    #[must_use]
    pub fn with_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.instruction = Some(instruction.into());
        self
    }
}

/// A chunk used as context for an answer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievedChunk {
    pub id: String,
    pub ordinal: usize,
    pub text: String,
    pub score: f32,
}

impl From<&ScoredChunk<'_>> for RetrievedChunk {
    fn from(hit: &ScoredChunk<'_>) -> Self {
        Self {
            id: hit.chunk.id.clone(),
            ordinal: hit.chunk.ordinal,
            text: hit.chunk.text.clone(),
            score: hit.score,
        }
    }
}

/// Answer plus the material it was generated from.
#[derive(Debug, Clone, Serialize)]
pub struct QueryResult {
    /// Provider text, verbatim.
    pub answer: String,
    /// Retrieved chunks in ranked order.
    pub context: Vec<RetrievedChunk>,
    pub prompt: Prompt,
    pub provider: String,
    pub tokens_used: TokenUsage,
    /// Wall time of retrieval and generation.
    pub latency_ms: u64,
}

/// Answers queries from the installed corpus index.
pub struct Orchestrator {
    config: RagConfig,
    index: Option<CorpusIndex>,
}

impl Orchestrator {
    /// Creates an orchestrator without an index.
    pub fn new(config: RagConfig) -> Self {
        Self { config, index: None }
    }

    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    pub fn index(&self) -> Option<&CorpusIndex> {
        self.index.as_ref()
    }

    pub fn is_ready(&self) -> bool {
        self.index.is_some()
    }

    /// Install the index persisted in the storage directory.
    ///
    /// Returns `false` and leaves the orchestrator unchanged when nothing
    /// has been persisted yet.
    ///
    /// # Errors
    /// Returns [`Error::CorruptIndex`] or [`Error::IncompatibleIndex`] for
    /// stored indexes that cannot be used.
    pub fn load_index(&mut self) -> Result<bool> {
        info!("Attempting to load index from {}...", self.config.storage_dir.display());
        match CorpusIndex::load(&self.config.storage_dir, self.config.embedder.as_ref())? {
            Some(index) => {
                info!("Index loaded successfully ({} chunks)", index.len());
                self.index = Some(index);
                Ok(true)
            }
            None => {
                info!("No existing index found");
                Ok(false)
            }
        }
    }

    /// Load `source`, embed it, persist the index and install it.
    ///
    /// # Errors
    /// Propagates loader, embedding and persistence errors. The previously
    /// installed index stays in place on failure.
    pub async fn build_index(&mut self, source: &Path) -> Result<&CorpusIndex> {
        let document = DocumentLoader::new(self.config.chunking).load(source)?;

        let mut builder = IndexBuilder::new().with_batch_size(self.config.batch_size);
        if let Some(progress) = &self.config.progress {
            builder = builder.with_progress(Arc::clone(progress));
        }
        let index = builder.build(&document, self.config.embedder.as_ref()).await?;
        index.persist(&self.config.storage_dir)?;

        Ok(self.index.insert(index))
    }

    /// Replace the installed index.
    pub fn install_index(&mut self, index: CorpusIndex) {
        self.index = Some(index);
    }

    /// Retrieve context for the request and generate an answer.
    ///
    /// # Errors
    /// - [`Error::IndexNotReady`] before any provider is called when no index is installed
    /// - [`Error::InvalidTopK`] when the effective `top_k` is zero
    /// - [`Error::Embedding`] when the query cannot be embedded
    /// - [`Error::Generation`] when the generation provider fails
    pub async fn answer(&self, request: &QueryRequest) -> Result<QueryResult> {
        let index = self.index.as_ref().ok_or(Error::IndexNotReady)?;
        let top_k = request.top_k.unwrap_or(self.config.default_top_k);
        if top_k == 0 {
            return Err(Error::InvalidTopK(top_k));
        }

        let start = Instant::now();
        info!("Executing query: {}", request.query);
        let query_embedding = self
            .config
            .embedder
            .embed(&request.query)
            .await
            .map_err(Error::Embedding)?;

        let context: Vec<RetrievedChunk> = index
            .query(&query_embedding, top_k)?
            .iter()
            .map(RetrievedChunk::from)
            .collect();
        debug!(
            "Retrieved chunks: {:?}",
            context.iter().map(|chunk| (&chunk.id, chunk.score)).collect::<Vec<_>>()
        );

        let instruction = request.instruction.as_deref().unwrap_or(&self.config.instruction);
        let prompt = Prompt::new(
            instruction,
            context.iter().map(|chunk| chunk.text.clone()).collect(),
            request.query.as_str(),
        );

        let generation = self
            .config
            .generator
            .generate(&prompt, &self.config.model)
            .await
            .map_err(Error::Generation)?;
        info!("Query executed successfully via {}", generation.provider);

        Ok(QueryResult {
            answer: generation.text,
            context,
            prompt,
            provider: generation.provider,
            tokens_used: generation.tokens_used,
            latency_ms: start.elapsed().as_millis() as u64,
        })
    }

    /// Answer `query` with the default settings, returning only the text.
    ///
    /// # Errors
    /// See [`Orchestrator::answer`].
    pub async fn answer_text(&self, query: &str) -> Result<String> {
        self.answer(&QueryRequest::new(query)).await.map(|result| result.answer)
    }
}
