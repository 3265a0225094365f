use std::io::{self, Write as _};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context as _, Result, bail};
use tracing::{error, info, warn};
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;
use tracing_subscriber::{EnvFilter, Registry, fmt};
use vizrag_agent::{CaseResult, EvalReport, Evaluator, Orchestrator, QueryRequest, QueryResult, RagConfig};
use vizrag_context::{ChunkingConfig, CorpusIndex, DocumentLoader, Freshness, IndexBuilder, ProgressCallback};
use vizrag_providers::groq::KNOWN_MODELS;

use crate::cli::{Cli, Commands};
use crate::config::AppConfig;

/// Shown when a chat session starts.
pub const DISCLAIMER: &str = "This application is meant only to answer questions relevant to data visualization. \
Queries irrelevant to data visualization should not be utilized. Please note that generated AI content may be incorrect.";

/// Initialize logging to stderr so stdout only carries answers.
fn init_logging(verbose: bool) {
    let default_filter = if verbose {
        "warn,vizrag_cli=debug,vizrag_agent=debug,vizrag_context=debug,vizrag_providers=debug"
    } else {
        "warn,vizrag_cli=info,vizrag_agent=info,vizrag_context=info,vizrag_providers=info"
    };

    Registry::default()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()))
        .with(fmt::layer().with_writer(io::stderr).with_target(verbose))
        .init();
}

/// Configuration merged with command-line overrides.
struct Settings {
    config: AppConfig,
    storage: PathBuf,
    source: PathBuf,
    model: String,
    api_key: Option<String>,
}

impl Settings {
    fn resolve(cli: &Cli) -> Result<Self> {
        let (config, origin) = AppConfig::load(cli.config.as_deref())?;
        match &origin {
            Some(path) => info!("Using configuration from {}", path.display()),
            None => info!("No configuration file found, using defaults"),
        }

        let storage = cli.storage.clone().unwrap_or_else(|| config.storage.directory.clone());
        let source = cli.source.clone().unwrap_or_else(|| config.source.path.clone());
        let model = cli.model.clone().unwrap_or_else(|| config.generation.model.clone());
        if !KNOWN_MODELS.contains(&model.as_str()) {
            warn!("Model '{model}' is not one of {}", KNOWN_MODELS.join(", "));
        }

        Ok(Self {
            config,
            storage,
            source,
            model,
            api_key: cli.api_key.clone(),
        })
    }

    fn chunking(&self) -> ChunkingConfig {
        ChunkingConfig::from(&self.config.chunking)
    }

    /// Orchestrator with the stored index installed, if there is one.
    fn orchestrator(&self) -> Result<Orchestrator> {
        let api_key = self.config.resolve_api_key(self.api_key.as_deref())?;
        let generator = self.config.generation.generator(api_key)?;

        let mut rag = RagConfig::new(&self.storage, self.config.embedding.embedder(), Arc::new(generator))
            .with_model(self.model.as_str())
            .with_top_k(self.config.retrieval.top_k)
            .with_chunking(self.chunking())
            .with_batch_size(self.config.embedding.batch_size);
        if let Some(instruction) = self.config.prompt.instruction()? {
            rag = rag.with_instruction(instruction);
        }

        let mut orchestrator = Orchestrator::new(rag);
        if !orchestrator
            .load_index()
            .with_context(|| format!("Cannot use the index in {}", self.storage.display()))?
        {
            warn!("No index in {}. Run `vizrag build` first.", self.storage.display());
        }
        if let Some(index) = orchestrator.index() {
            match index.freshness(&self.source)? {
                Freshness::Current => {}
                Freshness::SourceChanged => warn!(
                    "{} changed since the index was built. Run `vizrag build` to refresh it.",
                    self.source.display()
                ),
                Freshness::SourceMissing => warn!("Source document {} is missing", self.source.display()),
            }
        }
        Ok(orchestrator)
    }
}

/// Run the parsed command.
///
/// # Errors
/// Returns an error if the command fails.
pub async fn run(cli: Cli) -> Result<()> {
    init_logging(cli.verbose);
    let settings = Settings::resolve(&cli)?;

    match cli.command {
        Commands::Build { force } => handle_build(&settings, force).await,
        Commands::Ask {
            query,
            top_k,
            show_context,
        } => handle_ask(&settings, query, top_k, show_context).await,
        Commands::Chat { top_k } => handle_chat(&settings, top_k).await,
        Commands::Eval { top_k } => handle_eval(&settings, top_k).await,
        Commands::Status => handle_status(&settings),
    }
}

async fn handle_build(settings: &Settings, force: bool) -> Result<()> {
    let embedder = settings.config.embedding.embedder();

    if !force {
        match CorpusIndex::load(&settings.storage, embedder.as_ref()) {
            Ok(Some(index)) => match index.freshness(&settings.source)? {
                Freshness::Current => {
                    writeln!(
                        io::stdout(),
                        "Index is up to date: {} chunks (build {})",
                        index.len(),
                        index.build_id()
                    )?;
                    return Ok(());
                }
                Freshness::SourceChanged => info!("Source document changed, rebuilding"),
                Freshness::SourceMissing => {
                    bail!(
                        "Source document {} is missing, keeping the existing index",
                        settings.source.display()
                    )
                }
            },
            Ok(None) => info!("No existing index found"),
            Err(error) => warn!("Stored index cannot be reused, rebuilding: {error}"),
        }
    }

    let document = DocumentLoader::new(settings.chunking()).load(&settings.source)?;
    info!("Loaded {} chunks from {}", document.len(), settings.source.display());

    let progress: ProgressCallback =
        Arc::new(|embedded: usize, total: usize| info!("Embedded {embedded}/{total} chunks"));
    let index = IndexBuilder::new()
        .with_batch_size(settings.config.embedding.batch_size)
        .with_progress(progress)
        .build(&document, embedder.as_ref())
        .await?;
    index.persist(&settings.storage)?;

    writeln!(
        io::stdout(),
        "Built index with {} chunks using {} (build {})",
        index.len(),
        index.embedding_model(),
        index.build_id()
    )?;
    Ok(())
}

async fn handle_ask(settings: &Settings, query: String, top_k: Option<usize>, show_context: bool) -> Result<()> {
    let orchestrator = settings.orchestrator()?;
    let mut request = QueryRequest::new(query);
    request.top_k = top_k;

    let result = orchestrator.answer(&request).await?;
    write_answer(&result, show_context)?;
    Ok(())
}

fn write_answer(result: &QueryResult, show_context: bool) -> io::Result<()> {
    let mut out = io::stdout().lock();
    writeln!(out, "{}", result.answer)?;
    if show_context {
        writeln!(out)?;
        writeln!(out, "Context ({} chunks):", result.context.len())?;
        for chunk in &result.context {
            writeln!(out, "[{:.3}] {}", chunk.score, chunk.id)?;
            writeln!(out, "{}", chunk.text)?;
            writeln!(out)?;
        }
    }
    Ok(())
}

async fn handle_chat(settings: &Settings, top_k: Option<usize>) -> Result<()> {
    let orchestrator = settings.orchestrator()?;
    {
        let mut out = io::stdout().lock();
        writeln!(out, "{DISCLAIMER}")?;
        writeln!(out, "Type 'exit' or 'quit' to leave.")?;
    }

    loop {
        {
            let mut out = io::stdout().lock();
            write!(out, "> ")?;
            out.flush()?;
        }

        let mut line = String::new();
        if io::stdin().read_line(&mut line)? == 0 {
            break;
        }
        let query = line.trim();
        if query.is_empty() {
            continue;
        }
        if matches!(query, "exit" | "quit") {
            break;
        }

        let mut request = QueryRequest::new(query);
        request.top_k = top_k;
        match orchestrator.answer(&request).await {
            Ok(result) => write_answer(&result, false)?,
            Err(err) => {
                error!("Query failed: {err}");
                writeln!(io::stdout(), "Error: {err}")?;
            }
        }
    }
    Ok(())
}

async fn handle_eval(settings: &Settings, top_k: Option<usize>) -> Result<()> {
    let orchestrator = settings.orchestrator()?;
    let mut evaluator = Evaluator::default();
    if let Some(top_k) = top_k {
        evaluator = evaluator.with_top_k(top_k);
    }

    let report = evaluator.run(&orchestrator).await;
    write_report(&report)?;
    if !report.outcomes.is_empty() && report.failed_count() == report.outcomes.len() {
        bail!("Every evaluation query failed");
    }
    Ok(())
}

fn write_report(report: &EvalReport) -> io::Result<()> {
    let mut out = io::stdout().lock();
    for outcome in &report.outcomes {
        writeln!(out, "Query: {}", outcome.case.query)?;
        match &outcome.result {
            CaseResult::Scored { response, score } => {
                writeln!(out, "Response: {response}")?;
                writeln!(
                    out,
                    "Keyword hit rate: {:.2} | Judged relevant: {}",
                    score.keyword_hit_rate, score.judged_relevant
                )?;
            }
            CaseResult::Failed { error } => writeln!(out, "Failed: {error}")?,
        }
        writeln!(out)?;
    }
    writeln!(out, "Accuracy: {:.2}", report.accuracy)?;
    writeln!(out, "F1 Score: {:.2}", report.f1_score)?;
    writeln!(out, "Average Keyword Hit Rate: {:.2}", report.average_hit_rate)?;
    if report.failed_count() > 0 {
        writeln!(out, "Failed queries: {}", report.failed_count())?;
    }
    Ok(())
}

fn handle_status(settings: &Settings) -> Result<()> {
    let mut out = io::stdout().lock();
    writeln!(out, "Storage: {}", settings.storage.display())?;

    let Some(manifest) = CorpusIndex::manifest(&settings.storage)? else {
        writeln!(out, "No index found. Run `vizrag build` to create one.")?;
        return Ok(());
    };

    writeln!(out, "Build: {}", manifest.build_id)?;
    writeln!(out, "Created: {}", manifest.created_at.to_rfc3339())?;
    writeln!(out, "Source: {} ({} bytes)", manifest.source.label, manifest.source.byte_len)?;
    writeln!(out, "Chunks: {}", manifest.chunk_count)?;
    writeln!(
        out,
        "Embedding: {} ({} dimensions)",
        manifest.embedding.model, manifest.embedding.dimension
    )?;

    let active_model = settings.config.embedding.embedder().model_id().to_owned();
    if active_model != manifest.embedding.model {
        writeln!(out, "Configured embedding model is {active_model}; run `vizrag build` to rebuild")?;
    }

    let freshness = match manifest.source.freshness(&settings.source)? {
        Freshness::Current => "current",
        Freshness::SourceChanged => "source changed, run `vizrag build`",
        Freshness::SourceMissing => "source missing",
    };
    writeln!(out, "Status: {freshness}")?;
    Ok(())
}
