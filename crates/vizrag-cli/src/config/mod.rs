//! Configuration file handling for the `vizrag` binary.
//!
//! Every section and field is optional; anything left out falls back to
//! the built-in defaults. Command-line flags override the file.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;
use vizrag_agent::orchestrator::DEFAULT_MODEL;
use vizrag_agent::{DEFAULT_TOP_K, load_instruction_file};
use vizrag_context::{ChunkingConfig, DEFAULT_BATCH_SIZE};
use vizrag_core::{EmbeddingProvider, Error, Result};
use vizrag_providers::groq::{DEFAULT_MAX_TOKENS, DEFAULT_TEMPERATURE, ENV_GROQ_API_KEY};
use vizrag_providers::hashed::DEFAULT_DIMENSION;
use vizrag_providers::ollama::{DEFAULT_EMBEDDING_MODEL, DEFAULT_HOST, DEFAULT_PORT};
use vizrag_providers::{GroqProvider, HashedEmbedder, OllamaEmbedder};

/// File looked up in the working directory.
pub const LOCAL_CONFIG_FILE: &str = "vizrag.toml";
/// Plain-text key file looked up in the working directory.
pub const API_KEY_FILE: &str = ".groq_api_key";

const DEFAULT_SOURCE: &str = "data/The Big Book of Dashboards.pdf";
const DEFAULT_STORAGE: &str = "storage";

/// Complete application configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub source: SourceConfig,
    pub storage: StorageConfig,
    pub chunking: ChunkingSection,
    pub embedding: EmbeddingConfig,
    pub generation: GenerationConfig,
    pub retrieval: RetrievalConfig,
    pub api_keys: ApiKeys,
    pub prompt: PromptConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Document the index is built from.
    pub path: PathBuf,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_SOURCE),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding the persisted index.
    pub directory: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from(DEFAULT_STORAGE),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingSection {
    pub max_tokens: usize,
    pub overlap_words: usize,
}

impl Default for ChunkingSection {
    fn default() -> Self {
        let chunking = ChunkingConfig::default();
        Self {
            max_tokens: chunking.max_tokens,
            overlap_words: chunking.overlap_words,
        }
    }
}

impl From<&ChunkingSection> for ChunkingConfig {
    fn from(section: &ChunkingSection) -> Self {
        Self {
            max_tokens: section.max_tokens,
            overlap_words: section.overlap_words,
        }
    }
}

/// Embedding backend selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingBackend {
    /// A local Ollama server.
    #[default]
    Ollama,
    /// The offline hashed bag-of-words embedder.
    Hashed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub provider: EmbeddingBackend,
    pub host: String,
    pub port: u16,
    pub model: String,
    /// Vector length of the hashed embedder.
    pub dimension: usize,
    pub batch_size: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingBackend::default(),
            host: DEFAULT_HOST.to_owned(),
            port: DEFAULT_PORT,
            model: DEFAULT_EMBEDDING_MODEL.to_owned(),
            dimension: DEFAULT_DIMENSION,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

impl EmbeddingConfig {
    /// Instantiate the configured embedding provider.
    pub fn embedder(&self) -> Arc<dyn EmbeddingProvider> {
        match self.provider {
            EmbeddingBackend::Ollama => Arc::new(OllamaEmbedder::new(&self.host, self.port, self.model.as_str())),
            EmbeddingBackend::Hashed => Arc::new(HashedEmbedder::new(self.dimension)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: usize,
    pub timeout_seconds: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_owned(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
            timeout_seconds: 60,
        }
    }
}

impl GenerationConfig {
    /// Build a Groq client with this section's sampling settings.
    ///
    /// # Errors
    /// Returns an error if the key is blank or the HTTP client cannot be built.
    pub fn generator(&self, api_key: String) -> Result<GroqProvider> {
        let provider = GroqProvider::with_timeout(api_key, Duration::from_secs(self.timeout_seconds))?
            .with_temperature(self.temperature)
            .with_max_tokens(self.max_tokens);
        Ok(provider)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self { top_k: DEFAULT_TOP_K }
    }
}

/// API keys for generation providers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiKeys {
    pub groq_api_key: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptConfig {
    /// Replaces the built-in instruction when set.
    pub instruction_file: Option<PathBuf>,
}

impl PromptConfig {
    /// The configured instruction, if a file is set.
    ///
    /// # Errors
    /// Returns [`Error::Config`] if the file is unreadable or blank.
    pub fn instruction(&self) -> Result<Option<String>> {
        self.instruction_file.as_deref().map(load_instruction_file).transpose()
    }
}

impl AppConfig {
    /// Get the user-level configuration directory (~/.vizrag)
    ///
    /// # Errors
    /// Returns an error if the home directory cannot be determined
    pub fn config_dir() -> Result<PathBuf> {
        let home = dirs::home_dir().ok_or_else(|| Error::Config("Could not determine home directory".to_owned()))?;
        Ok(home.join(".vizrag"))
    }

    /// Load the configuration.
    ///
    /// An explicit path must exist. Otherwise `./vizrag.toml` is tried, then
    /// `~/.vizrag/config.toml`, then the defaults are used. Returns the file
    /// that was read, if any.
    ///
    /// # Errors
    /// Returns an error if a chosen file cannot be read or parsed.
    pub fn load(explicit: Option<&Path>) -> Result<(Self, Option<PathBuf>)> {
        if let Some(path) = explicit {
            return Ok((Self::load_from_file(path)?, Some(path.to_path_buf())));
        }

        let mut candidates = vec![PathBuf::from(LOCAL_CONFIG_FILE)];
        if let Ok(dir) = Self::config_dir() {
            candidates.push(dir.join("config.toml"));
        }
        for candidate in candidates {
            if candidate.is_file() {
                return Ok((Self::load_from_file(&candidate)?, Some(candidate)));
            }
        }
        Ok((Self::default(), None))
    }

    /// Load configuration from a specific file
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .map_err(|error| Error::Config(format!("Failed to read config {}: {error}", path.display())))?;
        let config: Self = toml::from_str(&contents)
            .map_err(|error| Error::Config(format!("Failed to parse config {}: {error}", path.display())))?;

        debug!(
            "Loaded config from {}: embedding={:?}, groq_api_key={}",
            path.display(),
            config.embedding.provider,
            if config.api_keys.groq_api_key.is_some() {
                "present"
            } else {
                "missing"
            }
        );
        Ok(config)
    }

    /// Find the Groq API key from the flag, the environment, the key file
    /// in the working directory or the config file, in that order.
    ///
    /// # Errors
    /// Returns [`Error::MissingApiKey`] if no source has a non-blank key.
    pub fn resolve_api_key(&self, flag: Option<&str>) -> Result<String> {
        let key_file = fs::read_to_string(API_KEY_FILE).ok();
        first_key([
            flag.map(str::to_owned),
            env::var(ENV_GROQ_API_KEY).ok(),
            key_file,
            self.api_keys.groq_api_key.clone(),
        ])
        .ok_or_else(|| {
            Error::MissingApiKey(format!(
                "pass --api-key, set {ENV_GROQ_API_KEY}, create {API_KEY_FILE} or set api_keys.groq_api_key"
            ))
        })
    }
}

fn first_key<const N: usize>(candidates: [Option<String>; N]) -> Option<String> {
    candidates
        .into_iter()
        .flatten()
        .map(|key| key.trim().to_owned())
        .find(|key| !key.is_empty())
}
