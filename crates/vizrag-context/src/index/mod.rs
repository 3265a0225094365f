//! Corpus index: embedded chunks with build, persistence and similarity query.

/// Manifest format of persisted indexes.
pub mod manifest;
/// Cosine similarity ranking.
pub mod similarity;
mod storage;

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info};
use uuid::Uuid;
use vizrag_core::{Embedding, EmbeddingProvider, Error, ProviderError, Result};

pub use manifest::{EmbeddingInfo, IndexFiles, MANIFEST_FILE, MANIFEST_VERSION, Manifest};

use crate::loader::{LoadedDocument, SourceInfo};

/// Default number of chunks sent to the embedding provider per request.
pub const DEFAULT_BATCH_SIZE: usize = 16;

/// One embedded passage of the source document.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    /// `"<source-stem>:<ordinal>"`
    pub id: String,
    /// Position in build order.
    pub ordinal: usize,
    pub text: String,
    pub embedding: Embedding,
}

/// A chunk paired with its similarity to a query.
#[derive(Debug, Clone, Copy)]
pub struct ScoredChunk<'index> {
    pub chunk: &'index Chunk,
    pub score: f32,
}

/// Whether the source an index was built from is unchanged on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// Source bytes hash to the stored digest.
    Current,
    /// Source exists but its content differs.
    SourceChanged,
    /// Source path no longer exists.
    SourceMissing,
}

/// Invoked after each embedded batch with `(embedded, total)`.
pub type ProgressCallback = Arc<dyn Fn(usize, usize) + Send + Sync>;

/// Ordered chunks with the metadata needed to reload and compare them.
#[derive(Debug, Clone, PartialEq)]
pub struct CorpusIndex {
    build_id: Uuid,
    created_at: DateTime<Utc>,
    source: SourceInfo,
    embedding_model: String,
    dimension: usize,
    chunks: Vec<Chunk>,
}

impl CorpusIndex {
    /// Assemble an index from already embedded chunks.
    ///
    /// Chunks are ordered by ordinal. An empty chunk list is accepted and
    /// yields an index whose queries fail with [`Error::EmptyIndex`]. Ordinals
    /// and ids are not checked here; [`CorpusIndex::persist`] refuses indexes
    /// whose ordinals are not `0..len` or whose ids repeat.
    ///
    /// # Errors
    /// Returns [`Error::DimensionMismatch`] if the chunk embeddings differ in length.
    pub fn from_parts(
        source: SourceInfo,
        embedding_model: impl Into<String>,
        mut chunks: Vec<Chunk>,
    ) -> Result<Self> {
        chunks.sort_by_key(|chunk| chunk.ordinal);
        let dimension = chunks.first().map_or(0, |chunk| chunk.embedding.len());
        if let Some(offender) = chunks.iter().find(|chunk| chunk.embedding.len() != dimension) {
            return Err(Error::DimensionMismatch {
                expected: dimension,
                actual: offender.embedding.len(),
            });
        }

        Ok(Self {
            build_id: Uuid::new_v4(),
            created_at: Utc::now(),
            source,
            embedding_model: embedding_model.into(),
            dimension,
            chunks,
        })
    }

    /// Embed every chunk of `document` with the default builder settings.
    ///
    /// # Errors
    /// See [`IndexBuilder::build`].
    pub async fn build(document: &LoadedDocument, embedder: &dyn EmbeddingProvider) -> Result<Self> {
        IndexBuilder::new().build(document, embedder).await
    }

    /// Write the index into `directory`, committing with the manifest.
    ///
    /// Nothing is written unless the chunks are non-empty, numbered `0..len`
    /// and carry unique non-empty ids.
    ///
    /// # Errors
    /// - [`Error::EmptyIndex`] or [`Error::InvalidIndex`] for indexes `load` would reject
    /// - [`Error::Persistence`] on any I/O failure
    ///
    /// A previously committed index in the directory stays loadable in every case.
    pub fn persist(&self, directory: &Path) -> Result<()> {
        storage::persist(self, directory)
    }

    /// Load the index committed in `directory`.
    ///
    /// Returns `Ok(None)` when no index has been persisted there yet.
    ///
    /// # Errors
    /// - [`Error::CorruptIndex`] when stored files are unreadable or inconsistent
    /// - [`Error::IncompatibleIndex`] when the index was built with another embedding model
    pub fn load(directory: &Path, embedder: &dyn EmbeddingProvider) -> Result<Option<Self>> {
        storage::load(directory, embedder.model_id())
    }

    /// Read only the manifest of the index in `directory`.
    ///
    /// # Errors
    /// Returns [`Error::CorruptIndex`] when the manifest cannot be parsed.
    pub fn manifest(directory: &Path) -> Result<Option<Manifest>> {
        storage::read_manifest(directory)
    }

    /// The `top_k` chunks most similar to `query_embedding`.
    ///
    /// Scores are cosine similarities in descending order; equal scores keep
    /// build order. Exactly `min(top_k, len)` results are returned.
    ///
    /// # Errors
    /// - [`Error::EmptyIndex`] if the index has no chunks
    /// - [`Error::InvalidTopK`] if `top_k` is zero
    /// - [`Error::DimensionMismatch`] if the query vector has the wrong length
    pub fn query(&self, query_embedding: &[f32], top_k: usize) -> Result<Vec<ScoredChunk<'_>>> {
        if self.chunks.is_empty() {
            return Err(Error::EmptyIndex);
        }
        if top_k == 0 {
            return Err(Error::InvalidTopK(top_k));
        }
        if query_embedding.len() != self.dimension {
            return Err(Error::DimensionMismatch {
                expected: self.dimension,
                actual: query_embedding.len(),
            });
        }

        let results = similarity::rank(&self.chunks, query_embedding, top_k);
        debug!(
            "Query matched {} chunks (best score {:.3})",
            results.len(),
            results.first().map_or(0.0, |hit| hit.score)
        );
        Ok(results)
    }

    /// Compare the stored source digest with the file at `source_path`.
    ///
    /// # Errors
    /// Returns [`Error::Io`] if the file exists but cannot be read.
    pub fn freshness(&self, source_path: &Path) -> Result<Freshness> {
        self.source.freshness(source_path)
    }

    pub fn build_id(&self) -> Uuid {
        self.build_id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn source(&self) -> &SourceInfo {
        &self.source
    }

    pub fn embedding_model(&self) -> &str {
        &self.embedding_model
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

/// Embeds a loaded document into a [`CorpusIndex`].
#[derive(Clone)]
pub struct IndexBuilder {
    batch_size: usize,
    progress: Option<ProgressCallback>,
}

impl Default for IndexBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl IndexBuilder {
    pub fn new() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            progress: None,
        }
    }

    /// Set the number of chunks per embedding request (minimum 1).
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    #[must_use]
    pub fn with_progress(mut self, progress: ProgressCallback) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Embed every chunk of `document`.
    ///
    /// Either every chunk is embedded or no index is produced.
    ///
    /// # Errors
    /// - [`Error::EmptyCorpus`] if the document has no chunks
    /// - [`Error::Embedding`] if the provider fails, returns the wrong number
    ///   of vectors, or returns empty, non-finite or inconsistently sized vectors
    pub async fn build(
        &self,
        document: &LoadedDocument,
        embedder: &dyn EmbeddingProvider,
    ) -> Result<CorpusIndex> {
        if document.is_empty() {
            return Err(Error::EmptyCorpus(document.source.label.clone()));
        }

        let total = document.len();
        info!(
            "Embedding {total} chunks with model '{}' (batch size {})",
            embedder.model_id(),
            self.batch_size
        );

        let mut embeddings: Vec<Embedding> = Vec::with_capacity(total);
        for batch in document.chunks.chunks(self.batch_size) {
            let vectors = embedder.embed_batch(batch).await.map_err(Error::Embedding)?;
            if vectors.len() != batch.len() {
                return Err(invalid_embedding(format!(
                    "expected {} vectors, provider returned {}",
                    batch.len(),
                    vectors.len()
                )));
            }
            embeddings.extend(vectors);
            debug!("Embedded {}/{total} chunks", embeddings.len());
            if let Some(progress) = &self.progress {
                progress(embeddings.len(), total);
            }
        }

        let dimension = validate_embeddings(&embeddings)?;
        let stem = document.source.stem();
        let chunks = document
            .chunks
            .iter()
            .zip(embeddings)
            .enumerate()
            .map(|(ordinal, (text, embedding))| Chunk {
                id: format!("{stem}:{ordinal}"),
                ordinal,
                text: text.clone(),
                embedding,
            })
            .collect();

        info!("Index built: {total} chunks, dimension {dimension}");
        Ok(CorpusIndex {
            build_id: Uuid::new_v4(),
            created_at: Utc::now(),
            source: document.source.clone(),
            embedding_model: embedder.model_id().to_owned(),
            dimension,
            chunks,
        })
    }
}

fn invalid_embedding(reason: String) -> Error {
    Error::Embedding(ProviderError::InvalidResponse(reason))
}

/// Check that all vectors share one non-zero dimension and hold finite values.
fn validate_embeddings(embeddings: &[Embedding]) -> Result<usize> {
    let dimension = embeddings.first().map_or(0, Vec::len);
    if dimension == 0 {
        return Err(invalid_embedding("provider returned an empty vector".to_owned()));
    }
    for (ordinal, vector) in embeddings.iter().enumerate() {
        if vector.len() != dimension {
            return Err(invalid_embedding(format!(
                "chunk {ordinal} has dimension {}, expected {dimension}",
                vector.len()
            )));
        }
        if vector.iter().any(|value| !value.is_finite()) {
            return Err(invalid_embedding(format!("chunk {ordinal} contains a non-finite value")));
        }
    }
    Ok(dimension)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(ordinal: usize, embedding: Vec<f32>) -> Chunk {
        Chunk {
            id: format!("book:{ordinal}"),
            ordinal,
            text: format!("text {ordinal}"),
            embedding,
        }
    }

    fn index(chunks: Vec<Chunk>) -> CorpusIndex {
        CorpusIndex::from_parts(SourceInfo::from_bytes("book.txt", b"book"), "test-model", chunks).unwrap()
    }

    #[test]
    fn test_from_parts_orders_by_ordinal() {
        let built = index(vec![chunk(1, vec![1.0, 0.0]), chunk(0, vec![0.0, 1.0])]);
        assert_eq!(built.chunks()[0].ordinal, 0);
        assert_eq!(built.dimension(), 2);
    }

    #[test]
    fn test_from_parts_rejects_mixed_dimensions() {
        let result = CorpusIndex::from_parts(
            SourceInfo::from_bytes("book.txt", b"book"),
            "test-model",
            vec![chunk(0, vec![1.0, 0.0]), chunk(1, vec![1.0])],
        );
        assert!(matches!(
            result,
            Err(Error::DimensionMismatch {
                expected: 2,
                actual: 1
            })
        ));
    }

    #[test]
    fn test_query_error_precedence() {
        let empty = index(Vec::new());
        assert!(matches!(empty.query(&[1.0], 0), Err(Error::EmptyIndex)));

        let populated = index(vec![chunk(0, vec![1.0, 0.0])]);
        assert!(matches!(populated.query(&[1.0], 0), Err(Error::InvalidTopK(0))));
        assert!(matches!(
            populated.query(&[1.0], 1),
            Err(Error::DimensionMismatch {
                expected: 2,
                actual: 1
            })
        ));
    }

    #[test]
    fn test_query_clamps_top_k() {
        let populated = index(vec![chunk(0, vec![1.0, 0.0]), chunk(1, vec![0.0, 1.0])]);
        let results = populated.query(&[1.0, 0.0], 50).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].chunk.id, "book:0");
        assert!(results[0].score >= results[1].score);
    }

    #[test]
    fn test_validate_embeddings() {
        assert_eq!(validate_embeddings(&[vec![1.0, 2.0], vec![3.0, 4.0]]).unwrap(), 2);
        assert!(matches!(validate_embeddings(&[Vec::new()]), Err(Error::Embedding(_))));
        assert!(matches!(
            validate_embeddings(&[vec![1.0, 2.0], vec![1.0]]),
            Err(Error::Embedding(_))
        ));
        assert!(matches!(
            validate_embeddings(&[vec![1.0, f32::INFINITY]]),
            Err(Error::Embedding(_))
        ));
    }
}
