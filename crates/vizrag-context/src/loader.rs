//! Source document loading.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256};
use tracing::{debug, info};
use vizrag_core::{Error, Result};

use crate::chunking::{ChunkingConfig, chunk_text};
use crate::index::Freshness;

/// Identity of the document an index was built from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceInfo {
    /// Path of the source file, or a caller-chosen name for in-memory corpora.
    pub label: String,
    /// Hex SHA-256 of the raw source bytes.
    pub sha256: String,
    /// Size of the raw source in bytes.
    pub byte_len: u64,
}

impl SourceInfo {
    pub fn from_bytes(label: impl Into<String>, bytes: &[u8]) -> Self {
        Self {
            label: label.into(),
            sha256: content_hash(bytes),
            byte_len: bytes.len() as u64,
        }
    }

    /// File stem of the label, used as the chunk id prefix.
    pub fn stem(&self) -> String {
        Path::new(&self.label)
            .file_stem()
            .map_or_else(|| self.label.clone(), |stem| stem.to_string_lossy().into_owned())
    }

    /// Compare the recorded digest with the file at `path`.
    ///
    /// # Errors
    /// Returns [`Error::Io`] if the file exists but cannot be read.
    pub fn freshness(&self, path: &Path) -> Result<Freshness> {
        match fs::read(path) {
            Ok(bytes) if content_hash(&bytes) == self.sha256 => Ok(Freshness::Current),
            Ok(_) => Ok(Freshness::SourceChanged),
            Err(error) if error.kind() == ErrorKind::NotFound => Ok(Freshness::SourceMissing),
            Err(error) => Err(Error::Io(error)),
        }
    }
}

/// Compute the hex SHA-256 of a byte slice.
pub fn content_hash(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// A source document split into ordered raw text chunks.
#[derive(Debug, Clone)]
pub struct LoadedDocument {
    /// Identity of the loaded file.
    pub source: SourceInfo,
    /// Chunk texts in document order.
    pub chunks: Vec<String>,
}

impl LoadedDocument {
    /// Build a document from texts that are already chunked.
    ///
    /// Whitespace-only texts are dropped; the hash covers the remaining texts.
    pub fn from_texts<S: Into<String>>(label: impl Into<String>, texts: Vec<S>) -> Self {
        let chunks: Vec<String> = texts
            .into_iter()
            .map(Into::into)
            .filter(|text: &String| !text.trim().is_empty())
            .collect();
        let joined = chunks.join("\n\n");
        Self {
            source: SourceInfo::from_bytes(label, joined.as_bytes()),
            chunks,
        }
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

/// Supported source formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SourceFormat {
    Pdf,
    Text,
}

impl SourceFormat {
    fn detect(path: &Path) -> Option<Self> {
        let extension = path.extension()?.to_str()?.to_ascii_lowercase();
        match extension.as_str() {
            "pdf" => Some(Self::Pdf),
            "txt" | "text" | "md" | "markdown" => Some(Self::Text),
            _ => None,
        }
    }
}

/// Reads a single document from disk and chunks it.
#[derive(Debug, Clone, Default)]
pub struct DocumentLoader {
    config: ChunkingConfig,
}

impl DocumentLoader {
    pub fn new(config: ChunkingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ChunkingConfig {
        &self.config
    }

    /// Load and chunk the document at `path`.
    ///
    /// # Errors
    /// - [`Error::NotFound`] when the path does not exist
    /// - [`Error::UnsupportedFormat`] for directories and unknown extensions
    /// - [`Error::Extraction`] when a PDF cannot be parsed
    /// - [`Error::EmptyCorpus`] when no text chunks were produced
    pub fn load(&self, path: &Path) -> Result<LoadedDocument> {
        info!("Reading source document from {}...", path.display());
        if !path.exists() {
            return Err(Error::NotFound(path.to_path_buf()));
        }
        let format = if path.is_dir() {
            None
        } else {
            SourceFormat::detect(path)
        }
        .ok_or_else(|| Error::UnsupportedFormat(path.to_path_buf()))?;

        let bytes = fs::read(path)?;
        let text = match format {
            SourceFormat::Pdf => extract_pdf_text(path, &bytes)?,
            SourceFormat::Text => String::from_utf8_lossy(&bytes).into_owned(),
        };
        debug!("Extracted {} characters from {}", text.len(), path.display());

        let label = path.display().to_string();
        let chunks = chunk_text(&text, &self.config);
        if chunks.is_empty() {
            return Err(Error::EmptyCorpus(label));
        }
        info!("Source document read successfully: {} chunks", chunks.len());

        Ok(LoadedDocument {
            source: SourceInfo::from_bytes(label, &bytes),
            chunks,
        })
    }
}

fn extract_pdf_text(path: &Path, bytes: &[u8]) -> Result<String> {
    pdf_extract::extract_text_from_mem(bytes).map_err(|error| Error::Extraction {
        path: PathBuf::from(path),
        reason: error.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_path_is_not_found() {
        let loader = DocumentLoader::default();
        let result = loader.load(Path::new("/definitely/not/here/book.pdf"));
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[test]
    fn test_unknown_extension_is_rejected() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("book.docx");
        fs::write(&path, "content").unwrap();
        let result = DocumentLoader::default().load(&path);
        assert!(matches!(result, Err(Error::UnsupportedFormat(_))));
    }

    #[test]
    fn test_directory_is_rejected() {
        let temp = TempDir::new().unwrap();
        let result = DocumentLoader::default().load(temp.path());
        assert!(matches!(result, Err(Error::UnsupportedFormat(_))));
    }

    #[test]
    fn test_whitespace_file_is_empty_corpus() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("blank.txt");
        fs::write(&path, "   \n\n  \n").unwrap();
        let result = DocumentLoader::default().load(&path);
        assert!(matches!(result, Err(Error::EmptyCorpus(_))));
    }

    #[test]
    fn test_text_file_loads_with_hash() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("notes.md");
        fs::write(&path, "Pie charts show proportions of a whole.\n").unwrap();

        let document = DocumentLoader::default().load(&path).unwrap();
        assert_eq!(document.chunks, vec!["Pie charts show proportions of a whole.".to_owned()]);
        assert_eq!(document.source.byte_len, 40);
        assert_eq!(document.source.sha256.len(), 64);
        assert_eq!(document.source.stem(), "notes");
    }

    #[test]
    fn test_invalid_pdf_is_extraction_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("broken.pdf");
        fs::write(&path, "this is not a pdf").unwrap();
        let result = DocumentLoader::default().load(&path);
        assert!(matches!(result, Err(Error::Extraction { .. })));
    }

    #[test]
    fn test_from_texts_drops_blank_entries() {
        let document = LoadedDocument::from_texts("memory", vec!["one", "  ", "two"]);
        assert_eq!(document.len(), 2);
        assert_eq!(document.source.label, "memory");
        assert_eq!(document.source.stem(), "memory");
    }
}
