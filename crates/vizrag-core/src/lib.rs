//! Core types and traits for the vizrag assistant.
//!
//! This crate provides the error taxonomy, the embedding and generation
//! capability traits, and the prompt and response types shared by the index,
//! the providers and the orchestrator.
#![cfg_attr(
    test,
    allow(
        clippy::expect_used,
        clippy::unwrap_used,
        clippy::panic,
        clippy::missing_panics_doc,
        reason = "Test allows"
    )
)]

/// Error types and result definitions.
pub mod error;
/// Poison-tolerant locking.
pub mod sync;
/// Trait definitions for embedding and generation providers.
pub mod traits;
/// Core data types for prompts and generated responses.
pub mod types;

pub use error::{Error, PersistenceFailure, ProviderError, Result};
pub use sync::IgnoreLock;
pub use traits::{EmbeddingProvider, GenerationProvider};
pub use types::{Embedding, Generation, Prompt, TokenUsage};
