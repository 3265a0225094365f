//! Document loading, chunking and the persisted corpus index.
#![cfg_attr(
    test,
    allow(
        dead_code,
        clippy::expect_used,
        clippy::unwrap_used,
        clippy::panic,
        clippy::missing_panics_doc,
        clippy::missing_errors_doc,
        clippy::print_stdout,
        clippy::print_stderr,
        reason = "Test allows"
    )
)]

/// Paragraph chunking with token limits.
pub mod chunking;
pub mod index;
/// Source document loading.
pub mod loader;

pub use chunking::{ChunkingConfig, chunk_text, estimate_tokens};
pub use index::{
    Chunk, CorpusIndex, DEFAULT_BATCH_SIZE, Freshness, IndexBuilder, Manifest, ProgressCallback, ScoredChunk,
};
pub use loader::{DocumentLoader, LoadedDocument, SourceInfo, content_hash};
