//! Retrieval-augmented answering over a persisted corpus index.
//!
//! - [`orchestrator`]: composes the instruction, the top-K retrieved chunks
//!   and the query into one generation request
//! - [`evaluation`]: keyword scoring of answers against a fixed question set
//! - [`prompts`]: the embedded data visualization instruction
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use std::sync::Arc;
//! use vizrag_agent::{Orchestrator, RagConfig};
//! use vizrag_providers::{GroqProvider, OllamaEmbedder};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = RagConfig::new(
//!     "storage",
//!     Arc::new(OllamaEmbedder::default()),
//!     Arc::new(GroqProvider::new("gsk_...")?),
//! );
//! let mut orchestrator = Orchestrator::new(config);
//! if !orchestrator.load_index()? {
//!     orchestrator.build_index(Path::new("data/The Big Book of Dashboards.pdf")).await?;
//! }
//! println!("{}", orchestrator.answer_text("When should I use a pie chart?").await?);
//! # Ok(())
//! # }
//! ```
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

/// Keyword-based answer evaluation.
pub mod evaluation;
/// Query orchestration.
pub mod orchestrator;
pub mod prompts;

pub use evaluation::{CaseOutcome, CaseResult, CaseScore, EvalCase, EvalReport, Evaluator, default_cases, score_response};
pub use orchestrator::{DEFAULT_TOP_K, Orchestrator, QueryRequest, QueryResult, RagConfig, RetrievedChunk};
pub use prompts::{default_instruction, load_instruction_file};
