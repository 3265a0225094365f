//! On-disk layout of a corpus index.
//!
//! Data files carry the build id in their names and are written first. The
//! manifest is renamed into place last, so a directory only ever commits to
//! complete builds.

use std::collections::HashSet;
use std::fs;
use std::io::{Error as IoError, ErrorKind, Write as _};
use std::path::Path;

use bincode::config::standard as bincode_config;
use bincode::{Decode, Encode, decode_from_slice, encode_to_vec};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};
use vizrag_core::{Embedding, Error, Result};

use super::manifest::{EmbeddingInfo, IndexFiles, MANIFEST_FILE, MANIFEST_VERSION, Manifest};
use super::{Chunk, CorpusIndex};

/// Chunk entry of `chunks-<build>.json`.
#[derive(Debug, Serialize, Deserialize)]
struct ChunkRecord {
    id: String,
    ordinal: usize,
    text: String,
}

/// Contents of `vectors-<build>.bin`.
#[derive(Debug, Encode, Decode)]
struct VectorFile {
    build_id: String,
    dimension: u64,
    vectors: Vec<Embedding>,
}

pub(super) fn persist(index: &CorpusIndex, directory: &Path) -> Result<()> {
    check_persistable(index)?;
    fs::create_dir_all(directory).map_err(|error| Error::persistence(directory, error))?;

    let files = IndexFiles::for_build(index.build_id);
    let records: Vec<ChunkRecord> = index
        .chunks
        .iter()
        .map(|chunk| ChunkRecord {
            id: chunk.id.clone(),
            ordinal: chunk.ordinal,
            text: chunk.text.clone(),
        })
        .collect();
    let chunk_bytes = serde_json::to_vec_pretty(&records)?;

    let vector_file = VectorFile {
        build_id: index.build_id.to_string(),
        dimension: index.dimension as u64,
        vectors: index.chunks.iter().map(|chunk| chunk.embedding.clone()).collect(),
    };
    let vector_bytes = encode_to_vec(&vector_file, bincode_config())
        .map_err(|error| Error::persistence(directory.join(&files.vectors), IoError::other(error.to_string())))?;

    write_atomic(directory, &files.chunks, &chunk_bytes)?;
    write_atomic(directory, &files.vectors, &vector_bytes)?;

    let manifest = Manifest {
        version: MANIFEST_VERSION,
        build_id: index.build_id,
        created_at: index.created_at,
        source: index.source.clone(),
        embedding: EmbeddingInfo {
            model: index.embedding_model.clone(),
            dimension: index.dimension,
        },
        chunk_count: index.chunks.len(),
        files,
    };
    write_atomic(directory, MANIFEST_FILE, &serde_json::to_vec_pretty(&manifest)?)?;
    info!(
        "Index {} persisted to {} ({} chunks, {} vector bytes)",
        index.build_id,
        directory.display(),
        manifest.chunk_count,
        vector_bytes.len()
    );

    remove_stale_builds(directory, &manifest);
    Ok(())
}

/// Reject indexes that `load` would refuse, before anything is written.
fn check_persistable(index: &CorpusIndex) -> Result<()> {
    if index.chunks.is_empty() {
        return Err(Error::EmptyIndex);
    }
    if index.dimension == 0 {
        return Err(Error::InvalidIndex("embedding dimension is zero".to_owned()));
    }

    let mut seen_ids = HashSet::with_capacity(index.chunks.len());
    for (position, chunk) in index.chunks.iter().enumerate() {
        if chunk.ordinal != position {
            return Err(Error::InvalidIndex(format!(
                "chunk at position {position} has ordinal {}",
                chunk.ordinal
            )));
        }
        if chunk.id.is_empty() || !seen_ids.insert(chunk.id.as_str()) {
            return Err(Error::InvalidIndex(format!(
                "chunk {position} has a missing or duplicate id"
            )));
        }
        if chunk.embedding.len() != index.dimension {
            return Err(Error::DimensionMismatch {
                expected: index.dimension,
                actual: chunk.embedding.len(),
            });
        }
    }
    Ok(())
}

/// Write `bytes` to `directory/name` through a temp file in the same directory.
fn write_atomic(directory: &Path, name: &str, bytes: &[u8]) -> Result<()> {
    let target = directory.join(name);
    let mut temp = NamedTempFile::new_in(directory).map_err(|error| Error::persistence(directory, error))?;
    temp.write_all(bytes)
        .and_then(|()| temp.as_file().sync_all())
        .map_err(|error| Error::persistence(&target, error))?;
    temp.persist(&target)
        .map_err(|error| Error::persistence(&target, error.error))?;
    debug!("Wrote {} ({} bytes)", target.display(), bytes.len());
    Ok(())
}

/// Delete data files of builds other than the committed one.
fn remove_stale_builds(directory: &Path, manifest: &Manifest) {
    let Ok(entries) = fs::read_dir(directory) else {
        return;
    };
    let keep = manifest.file_names();

    for entry in entries.flatten() {
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        let is_data_file = (name.starts_with("chunks-") && name.ends_with(".json"))
            || (name.starts_with("vectors-") && name.ends_with(".bin"));
        if !is_data_file || keep.contains(&name) {
            continue;
        }
        match fs::remove_file(entry.path()) {
            Ok(()) => debug!("Removed stale index file {name}"),
            Err(error) => warn!("Failed to remove stale index file {name}: {error}"),
        }
    }
}

pub(super) fn read_manifest(directory: &Path) -> Result<Option<Manifest>> {
    let path = directory.join(MANIFEST_FILE);
    let bytes = match fs::read(&path) {
        Ok(bytes) => bytes,
        Err(error) if error.kind() == ErrorKind::NotFound => return Ok(None),
        Err(error) => return Err(Error::corrupt(&path, format!("unreadable manifest: {error}"))),
    };
    let manifest: Manifest = serde_json::from_slice(&bytes)
        .map_err(|error| Error::corrupt(&path, format!("invalid manifest: {error}")))?;
    if manifest.version != MANIFEST_VERSION {
        return Err(Error::corrupt(
            &path,
            format!("unknown manifest version {}", manifest.version),
        ));
    }
    Ok(Some(manifest))
}

pub(super) fn load(directory: &Path, active_model: &str) -> Result<Option<CorpusIndex>> {
    let Some(manifest) = read_manifest(directory)? else {
        debug!("No index manifest in {}", directory.display());
        return Ok(None);
    };
    if manifest.embedding.model != active_model {
        return Err(Error::IncompatibleIndex {
            stored: manifest.embedding.model,
            active: active_model.to_owned(),
        });
    }

    let chunks_path = directory.join(&manifest.files.chunks);
    let chunk_bytes = fs::read(&chunks_path)
        .map_err(|error| Error::corrupt(&chunks_path, format!("unreadable chunk file: {error}")))?;
    let records: Vec<ChunkRecord> = serde_json::from_slice(&chunk_bytes)
        .map_err(|error| Error::corrupt(&chunks_path, format!("invalid chunk file: {error}")))?;

    let vectors_path = directory.join(&manifest.files.vectors);
    let vector_bytes = fs::read(&vectors_path)
        .map_err(|error| Error::corrupt(&vectors_path, format!("unreadable vector file: {error}")))?;
    let (vector_file, consumed): (VectorFile, usize) = decode_from_slice(&vector_bytes, bincode_config())
        .map_err(|error| Error::corrupt(&vectors_path, format!("invalid vector file: {error}")))?;
    if consumed != vector_bytes.len() {
        return Err(Error::corrupt(
            &vectors_path,
            format!("{} trailing bytes", vector_bytes.len() - consumed),
        ));
    }

    let chunks = assemble(directory, &manifest, records, vector_file)?;
    info!(
        "Loaded index {} from {} ({} chunks)",
        manifest.build_id,
        directory.display(),
        chunks.len()
    );

    Ok(Some(CorpusIndex {
        build_id: manifest.build_id,
        created_at: manifest.created_at,
        source: manifest.source,
        embedding_model: manifest.embedding.model,
        dimension: manifest.embedding.dimension,
        chunks,
    }))
}

/// Cross-check manifest, chunk records and vectors, then zip them into chunks.
fn assemble(
    directory: &Path,
    manifest: &Manifest,
    records: Vec<ChunkRecord>,
    vector_file: VectorFile,
) -> Result<Vec<Chunk>> {
    let corrupt = |reason: String| Error::corrupt(directory, reason);
    let dimension = manifest.embedding.dimension;

    if vector_file.build_id != manifest.build_id.to_string() {
        return Err(corrupt(format!(
            "vector file belongs to build {}, manifest names {}",
            vector_file.build_id, manifest.build_id
        )));
    }
    if manifest.chunk_count == 0 {
        return Err(corrupt("manifest records zero chunks".to_owned()));
    }
    if dimension == 0 || vector_file.dimension != dimension as u64 {
        return Err(corrupt(format!(
            "manifest dimension {dimension}, vector file dimension {}",
            vector_file.dimension
        )));
    }
    if records.len() != manifest.chunk_count || vector_file.vectors.len() != manifest.chunk_count {
        return Err(corrupt(format!(
            "manifest lists {} chunks, found {} texts and {} vectors",
            manifest.chunk_count,
            records.len(),
            vector_file.vectors.len()
        )));
    }

    let mut seen_ids = HashSet::with_capacity(records.len());
    let mut chunks = Vec::with_capacity(records.len());
    for (position, (record, embedding)) in records.into_iter().zip(vector_file.vectors).enumerate() {
        if record.ordinal != position {
            return Err(corrupt(format!(
                "chunk at position {position} has ordinal {}",
                record.ordinal
            )));
        }
        if record.id.is_empty() || !seen_ids.insert(record.id.clone()) {
            return Err(corrupt(format!("chunk {position} has a missing or duplicate id")));
        }
        if embedding.len() != dimension {
            return Err(corrupt(format!(
                "vector {position} has dimension {}, expected {dimension}",
                embedding.len()
            )));
        }
        chunks.push(Chunk {
            id: record.id,
            ordinal: record.ordinal,
            text: record.text,
            embedding,
        });
    }
    Ok(chunks)
}
