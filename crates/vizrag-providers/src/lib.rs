//! Provider adapters for embedding and generation backends.
#![cfg_attr(
    test,
    allow(
        dead_code,
        clippy::expect_used,
        clippy::unwrap_used,
        clippy::panic,
        clippy::missing_panics_doc,
        clippy::missing_errors_doc,
        reason = "Test allows"
    )
)]

/// Groq chat completion provider.
pub mod groq;
/// Offline bag-of-words embedder.
pub mod hashed;
/// Test doubles with canned behaviour.
pub mod mock;
/// Ollama embedding provider.
pub mod ollama;

pub use groq::GroqProvider;
pub use hashed::HashedEmbedder;
pub use mock::{FailingEmbedder, MockGenerator};
pub use ollama::OllamaEmbedder;
