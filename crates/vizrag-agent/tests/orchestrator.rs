//! Query orchestration and evaluation over mock providers.
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
        clippy::tests_outside_test_module,
        reason = "Test allows"
    )
)]

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use tempfile::TempDir;
use vizrag_agent::{CaseResult, Evaluator, Orchestrator, QueryRequest, RagConfig, default_instruction};
use vizrag_context::{CorpusIndex, LoadedDocument};
use vizrag_core::{EmbeddingProvider as _, Error, ProviderError};
use vizrag_providers::{FailingEmbedder, HashedEmbedder, MockGenerator};

const PIE_CHUNK: &str = "Pie charts show parts of a whole when there are a small number of categories.";

fn corpus() -> LoadedDocument {
    LoadedDocument::from_texts(
        "dashboards",
        vec![
            PIE_CHUNK,
            "Line charts reveal the trend of time series data over time.",
            "A BAN is a Big-Ass Number that highlights a key metric.",
            "Sequential color schemes suit ordered values such as median household income.",
            "Dashboard design favours clarity, simplicity and a focus on the user.",
        ],
    )
}

fn generator() -> MockGenerator {
    MockGenerator::new()
        .with_response("pie chart", "Use a pie chart for a small number of categories that form a whole.")
        .with_response("cow", "I cannot answer that since it is not related to data visualization.")
        .with_default_response("Answer from context.")
}

struct Harness {
    _temp: TempDir,
    storage: PathBuf,
    generator: MockGenerator,
    orchestrator: Orchestrator,
}

async fn ready_harness() -> Harness {
    let temp = TempDir::new().unwrap();
    let storage = temp.path().join("storage");
    let embedder = Arc::new(HashedEmbedder::default());
    let generator = generator();

    let index = CorpusIndex::build(&corpus(), embedder.as_ref()).await.unwrap();
    let config = RagConfig::new(&storage, embedder, Arc::new(generator.clone()));
    let mut orchestrator = Orchestrator::new(config);
    orchestrator.install_index(index);

    Harness {
        _temp: temp,
        storage,
        generator,
        orchestrator,
    }
}

#[tokio::test]
async fn test_pie_chart_query_uses_best_chunk_first() {
    let harness = ready_harness().await;
    let request = QueryRequest::new("When should I use a pie chart?").with_top_k(2);
    let result = harness.orchestrator.answer(&request).await.unwrap();

    assert_eq!(result.answer, "Use a pie chart for a small number of categories that form a whole.");
    assert_eq!(result.context.len(), 2);
    assert_eq!(result.context[0].ordinal, 0);
    assert_eq!(result.context[0].id, "dashboards:0");
    assert!(result.context[0].score >= result.context[1].score);
    assert_eq!(result.provider, "mock/mixtral-8x7b-32768");

    let prompts = harness.generator.prompts();
    assert_eq!(prompts.len(), 1);
    assert_eq!(prompts[0].context[0], PIE_CHUNK);
    assert!(prompts[0].render().contains(PIE_CHUNK));
    assert_eq!(prompts[0].instruction, default_instruction());
    assert_eq!(prompts[0], result.prompt);
}

#[tokio::test]
async fn test_cow_query_still_answers_with_low_scores() {
    let harness = ready_harness().await;
    let result = harness
        .orchestrator
        .answer(&QueryRequest::new("What sound does a cow make?"))
        .await
        .unwrap();

    assert!(result.answer.contains("not related to data visualization"));
    assert_eq!(result.context.len(), 5);
    assert!(result.context.iter().all(|chunk| chunk.score < 0.5));
}

#[tokio::test]
async fn test_answer_without_index_calls_no_provider() {
    let temp = TempDir::new().unwrap();
    let embedder = Arc::new(FailingEmbedder::new());
    let generator = generator();
    let config = RagConfig::new(temp.path(), Arc::clone(&embedder) as _, Arc::new(generator.clone()));
    let orchestrator = Orchestrator::new(config);

    let result = orchestrator.answer_text("When should I use a pie chart?").await;
    assert!(matches!(result, Err(Error::IndexNotReady)));
    assert_eq!(embedder.call_count(), 0);
    assert_eq!(generator.call_count(), 0);
}

#[tokio::test]
async fn test_zero_top_k_is_rejected_before_embedding() {
    let harness = ready_harness().await;
    let result = harness.orchestrator.answer(&QueryRequest::new("pie").with_top_k(0)).await;
    assert!(matches!(result, Err(Error::InvalidTopK(0))));
    assert_eq!(harness.generator.call_count(), 0);
}

#[tokio::test]
async fn test_generation_failure_is_surfaced() {
    let temp = TempDir::new().unwrap();
    let embedder = Arc::new(HashedEmbedder::default());
    let generator = MockGenerator::new().with_failure(|| ProviderError::Authentication("invalid API key".to_owned()));
    let index = CorpusIndex::build(&corpus(), embedder.as_ref()).await.unwrap();

    let mut orchestrator = Orchestrator::new(RagConfig::new(temp.path(), embedder, Arc::new(generator)));
    orchestrator.install_index(index);

    let result = orchestrator.answer_text("When should I use a pie chart?").await;
    assert!(matches!(result, Err(Error::Generation(ProviderError::Authentication(_)))));
}

#[tokio::test]
async fn test_query_embedding_failure_is_surfaced() {
    let temp = TempDir::new().unwrap();
    let index = CorpusIndex::build(&corpus(), &HashedEmbedder::default()).await.unwrap();
    let config = RagConfig::new(temp.path(), Arc::new(FailingEmbedder::new()), Arc::new(generator()));
    let mut orchestrator = Orchestrator::new(config);
    orchestrator.install_index(index);

    let result = orchestrator.answer_text("pie").await;
    assert!(matches!(result, Err(Error::Embedding(_))));
}

#[tokio::test]
async fn test_request_instruction_overrides_config() {
    let harness = ready_harness().await;
    let request = QueryRequest::new("pie chart").with_instruction("Answer in one sentence.");
    harness.orchestrator.answer(&request).await.unwrap();
    assert_eq!(harness.generator.prompts()[0].instruction, "Answer in one sentence.");
}

#[tokio::test]
async fn test_build_then_reload_from_storage() {
    let temp = TempDir::new().unwrap();
    let source = temp.path().join("dashboards.md");
    fs::write(
        &source,
        format!("{PIE_CHUNK}\n\nLine charts reveal the trend of time series data over time.\n"),
    )
    .unwrap();
    let storage = temp.path().join("storage");
    let embedder = Arc::new(HashedEmbedder::new(256));

    let mut builder = Orchestrator::new(RagConfig::new(&storage, Arc::clone(&embedder) as _, Arc::new(generator())));
    let built_id = builder.build_index(&source).await.unwrap().build_id();
    assert!(builder.is_ready());

    let mut reader = Orchestrator::new(RagConfig::new(&storage, embedder, Arc::new(generator())));
    assert!(!reader.is_ready());
    assert!(reader.load_index().unwrap());
    assert_eq!(reader.index().unwrap().build_id(), built_id);
    assert!(reader.answer_text("pie chart").await.is_ok());
}

#[tokio::test]
async fn test_load_index_reports_first_run() {
    let harness = ready_harness().await;
    let mut fresh = Orchestrator::new(RagConfig::new(
        &harness.storage,
        Arc::new(HashedEmbedder::default()),
        Arc::new(generator()),
    ));
    assert!(!fresh.load_index().unwrap());
    assert!(!fresh.is_ready());
}

#[tokio::test]
async fn test_load_index_rejects_other_embedding_model() {
    let temp = TempDir::new().unwrap();
    let source = temp.path().join("dashboards.txt");
    fs::write(&source, PIE_CHUNK).unwrap();

    let storage = temp.path().join("storage");
    let mut builder = Orchestrator::new(RagConfig::new(&storage, Arc::new(HashedEmbedder::new(64)), Arc::new(generator())));
    builder.build_index(&source).await.unwrap();

    let mut reader = Orchestrator::new(RagConfig::new(&storage, Arc::new(HashedEmbedder::new(32)), Arc::new(generator())));
    assert!(matches!(reader.load_index(), Err(Error::IncompatibleIndex { .. })));
}

#[tokio::test]
async fn test_evaluator_records_every_case() {
    let harness = ready_harness().await;
    let report = Evaluator::default().with_top_k(3).run(&harness.orchestrator).await;

    assert_eq!(report.outcomes.len(), 6);
    assert_eq!(report.failed_count(), 0);
    let pie = report.outcomes[0].score().unwrap();
    assert!(pie.keyword_hit_rate > 0.0);
    assert!(pie.judged_relevant);
    assert!(report.accuracy > 0.0);
    assert!(report.f1_score > 0.0);
    assert_eq!(harness.generator.call_count(), 6);
}

#[tokio::test]
async fn test_evaluator_reports_failures() {
    let temp = TempDir::new().unwrap();
    let orchestrator = Orchestrator::new(RagConfig::new(
        temp.path(),
        Arc::new(HashedEmbedder::default()),
        Arc::new(generator()),
    ));
    let report = Evaluator::default().run(&orchestrator).await;

    assert_eq!(report.failed_count(), 6);
    assert!(matches!(&report.outcomes[0].result, CaseResult::Failed { error } if error.contains("Index is not available")));
    assert!(report.accuracy.abs() < f64::EPSILON);
}

#[tokio::test]
async fn test_query_vector_matches_index_dimension() {
    let harness = ready_harness().await;
    let embedder = HashedEmbedder::default();
    let vector = embedder.embed("pie").await.unwrap();
    assert_eq!(vector.len(), harness.orchestrator.index().unwrap().dimension());
}
