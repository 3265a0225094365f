use core::fmt;
use core::result::Result as CoreResult;
use core::time::Duration;
use std::io::{Error as IoError, ErrorKind};
use std::path::PathBuf;

use serde_json::Error as SerdeJsonError;
use thiserror::Error;

/// Result type for core operations.
pub type Result<T> = CoreResult<T, Error>;

/// Errors surfaced by the loader, the corpus index and the orchestrator.
#[derive(Debug, Error)]
pub enum Error {
    /// The source document path does not exist.
    #[error("Source document not found: {}", .0.display())]
    NotFound(PathBuf),

    /// The source document has an extension the loader cannot read.
    #[error("Unsupported document format: {}", .0.display())]
    UnsupportedFormat(PathBuf),

    /// Text could not be extracted from the source document.
    #[error("Failed to extract text from {}: {reason}", .path.display())]
    Extraction {
        /// Document that failed to parse.
        path: PathBuf,
        /// Parser message.
        reason: String,
    },

    /// The loader produced zero chunks.
    #[error("No text chunks could be extracted from {0}")]
    EmptyCorpus(String),

    /// The embedding provider failed or returned unusable vectors.
    #[error("Embedding failed: {0}")]
    Embedding(#[source] ProviderError),

    /// Writing the index to disk failed.
    #[error("Failed to persist index at {} ({failure}): {source}", .path.display())]
    Persistence {
        /// File or directory being written.
        path: PathBuf,
        /// Classified cause.
        failure: PersistenceFailure,
        /// Underlying I/O error.
        #[source]
        source: IoError,
    },

    /// A stored index exists but cannot be read back consistently.
    #[error("Stored index at {} is corrupt: {reason}", .path.display())]
    CorruptIndex {
        /// Index directory or file.
        path: PathBuf,
        /// What was inconsistent.
        reason: String,
    },

    /// A stored index was built with a different embedding model.
    #[error("Stored index was built with embedding model '{stored}', active model is '{active}'")]
    IncompatibleIndex {
        /// Model recorded in the manifest.
        stored: String,
        /// Model of the configured provider.
        active: String,
    },

    /// A similarity query was issued against an index without chunks.
    #[error("Index contains no chunks")]
    EmptyIndex,

    /// `top_k` must be at least one.
    #[error("top_k must be at least 1 (got {0})")]
    InvalidTopK(usize),

    /// Query vector length differs from the index dimension.
    #[error("Embedding dimension mismatch: index has {expected}, query has {actual}")]
    DimensionMismatch {
        /// Dimension of the stored embeddings.
        expected: usize,
        /// Dimension of the offending vector.
        actual: usize,
    },

    /// An index breaks the stored layout (ordinals, ids or dimension) and cannot be persisted.
    #[error("Index cannot be persisted: {0}")]
    InvalidIndex(String),

    /// `answer` was called before an index was built or loaded.
    #[error("Index is not available. Build or load the index first.")]
    IndexNotReady,

    /// The generation provider failed.
    #[error("Generation failed: {0}")]
    Generation(#[source] ProviderError),

    /// Configuration is invalid or missing.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Required API key was not found.
    #[error("API key not found: {0}")]
    MissingApiKey(String),

    /// An I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] IoError),

    /// JSON serialization or deserialization failed.
    #[error("JSON serialization error: {0}")]
    Json(#[from] SerdeJsonError),
}

impl Error {
    /// Builds a [`Error::Persistence`] from an I/O error, classifying its cause.
    pub fn persistence(path: impl Into<PathBuf>, source: IoError) -> Self {
        Self::Persistence {
            path: path.into(),
            failure: PersistenceFailure::classify(&source),
            source,
        }
    }

    /// Builds a [`Error::CorruptIndex`].
    pub fn corrupt(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::CorruptIndex {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Determines whether this error may succeed if retried by the caller.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Embedding(cause) | Self::Generation(cause) => cause.is_retryable(),
            _ => false,
        }
    }
}

/// Classification of an I/O failure during persistence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistenceFailure {
    /// No space left on the device.
    DiskFull,
    /// The process lacks permission for the path.
    PermissionDenied,
    /// The filesystem is mounted read-only.
    ReadOnly,
    /// A path component that must be a directory is a file.
    NotADirectory,
    /// Any other I/O failure.
    Other,
}

impl PersistenceFailure {
    /// Maps an I/O error onto a failure class.
    pub fn classify(error: &IoError) -> Self {
        match error.kind() {
            ErrorKind::StorageFull => Self::DiskFull,
            ErrorKind::PermissionDenied => Self::PermissionDenied,
            ErrorKind::ReadOnlyFilesystem => Self::ReadOnly,
            ErrorKind::NotADirectory => Self::NotADirectory,
            _ => Self::Other,
        }
    }
}

impl fmt::Display for PersistenceFailure {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::DiskFull => "disk full",
            Self::PermissionDenied => "permission denied",
            Self::ReadOnly => "read-only filesystem",
            Self::NotADirectory => "not a directory",
            Self::Other => "I/O failure",
        };
        formatter.write_str(label)
    }
}

/// Failure reported by an embedding or generation backend.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The API key was rejected.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// The provider throttled the request.
    #[error("rate limited{}", retry_suffix(.retry_after))]
    RateLimited {
        /// Wait hint from the provider, if any.
        retry_after: Option<Duration>,
    },

    /// The request did not complete in time.
    #[error("request timed out")]
    Timeout,

    /// The provider could not be reached or is overloaded.
    #[error("provider unavailable: {0}")]
    Unavailable(String),

    /// The provider answered with an unexpected status.
    #[error("API error {status}: {body}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Response body.
        body: String,
    },

    /// The transport layer failed.
    #[error("transport error: {0}")]
    Transport(String),

    /// The response could not be used.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Anything else.
    #[error("{0}")]
    Other(String),
}

impl ProviderError {
    /// Returns `true` for transient failures such as throttling or network errors.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RateLimited { .. } | Self::Timeout | Self::Unavailable(_) | Self::Transport(_)
        )
    }
}

/// Formats the optional wait hint of a rate-limit error.
#[allow(clippy::ref_option, reason = "thiserror passes fields by reference")]
fn retry_suffix(retry_after: &Option<Duration>) -> String {
    retry_after
        .map(|wait| format!(" (retry after {}s)", wait.as_secs()))
        .unwrap_or_default()
}
