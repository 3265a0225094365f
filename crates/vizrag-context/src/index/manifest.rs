//! Index manifest, the commit record of a persisted build.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::loader::SourceInfo;

/// File name of the manifest inside an index directory.
pub const MANIFEST_FILE: &str = "manifest.json";

/// Manifest format version understood by this build.
pub const MANIFEST_VERSION: u32 = 1;

/// Embedding metadata recorded with an index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbeddingInfo {
    /// Model identifier of the provider that produced the vectors.
    pub model: String,
    /// Vector dimension.
    pub dimension: usize,
}

/// Data file names of one build, relative to the index directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexFiles {
    /// JSON chunk records.
    pub chunks: String,
    /// Bincode vector block.
    pub vectors: String,
}

impl IndexFiles {
    /// File names derived from `build_id`.
    pub fn for_build(build_id: Uuid) -> Self {
        Self {
            chunks: format!("chunks-{build_id}.json"),
            vectors: format!("vectors-{build_id}.bin"),
        }
    }
}

/// Description of a persisted index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    /// Layout version; loads fail on any other value.
    pub version: u32,
    /// Identifier shared by the manifest and its data files.
    pub build_id: Uuid,
    /// When the build finished.
    pub created_at: DateTime<Utc>,
    /// Document the chunks were cut from.
    pub source: SourceInfo,
    /// Model and dimension of the stored vectors.
    pub embedding: EmbeddingInfo,
    /// Number of chunks in the build.
    pub chunk_count: usize,
    /// Data files of the build.
    pub files: IndexFiles,
}

impl Manifest {
    /// Data files referenced by this manifest.
    pub fn file_names(&self) -> [&str; 2] {
        [self.files.chunks.as_str(), self.files.vectors.as_str()]
    }
}
