//! Core data models that flow through indexing and retrieval.
//!
//! A markdown file becomes one or more [`ChunkRecord`]s. Each record is
//! addressed by its *logical path*: the file path itself when the file fits
//! in a single chunk, or `path#<index>` when it was split.

use serde::{Deserialize, Serialize};

/// Per-chunk metadata, stored as JSON alongside the vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub file_path: String,
    pub file_name: String,
    pub file_size: u64,
    /// RFC 3339, UTC.
    pub modified_at: String,
    /// RFC 3339, UTC. Falls back to the modification time on filesystems
    /// that do not report creation time.
    pub created_at: String,
    /// SHA-256 of the whole file. Identical across all chunks of a file.
    pub content_hash: String,
    pub chunk_index: usize,
    pub total_chunks: usize,
    /// Length of this chunk in characters.
    pub chunk_size: usize,
    pub indexed_at: String,
}

/// A chunk ready to be written to the vector store.
#[derive(Debug, Clone)]
pub struct ChunkRecord {
    pub id: String,
    pub logical_path: String,
    pub source_path: String,
    pub content: String,
    pub embedding: Vec<f32>,
    pub metadata: ChunkMetadata,
}

/// A chunk as read back from the store, without its vector.
#[derive(Debug, Clone, Serialize)]
pub struct StoredChunk {
    pub id: String,
    pub logical_path: String,
    pub source_path: String,
    pub content: String,
    pub metadata: ChunkMetadata,
}

/// A nearest-neighbour match.
#[derive(Debug, Clone, Serialize)]
pub struct ChunkHit {
    pub id: String,
    pub logical_path: String,
    pub content: String,
    pub metadata: ChunkMetadata,
    /// Cosine distance (`1 - cosine similarity`); smaller is closer.
    pub distance: f32,
}

/// Counters reported by one index run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IndexRunResult {
    pub processed: usize,
    pub skipped: usize,
    pub errors: usize,
    pub total_files: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CollectionStats {
    pub count: u64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VaultStats {
    pub total_files: usize,
    pub total_size_bytes: u64,
    pub vault_path: String,
}

/// All chunks of one note, reassembled for display.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentView {
    pub file_path: String,
    pub total_chunks: usize,
    pub content: String,
    pub chunks: Vec<StoredChunk>,
}

impl DocumentView {
    pub fn from_chunks(file_path: &str, chunks: Vec<StoredChunk>) -> Self {
        let content = chunks
            .iter()
            .map(|c| c.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");
        Self {
            file_path: file_path.to_string(),
            total_chunks: chunks.len(),
            content,
            chunks,
        }
    }
}

/// Logical path for chunk `index` of a file that produced `total` chunks.
pub fn logical_path(file_path: &str, index: usize, total: usize) -> String {
    if total > 1 {
        format!("{}#{}", file_path, index)
    } else {
        file_path.to_string()
    }
}

/// Strip a trailing `#<digits>` chunk suffix, if any.
///
/// Only an all-digit suffix is removed, so headings-style anchors in file
/// names (`notes#todo.md`) are left alone.
pub fn strip_chunk_suffix(path: &str) -> &str {
    match path.rsplit_once('#') {
        Some((base, suffix))
            if !base.is_empty()
                && !suffix.is_empty()
                && suffix.bytes().all(|b| b.is_ascii_digit()) =>
        {
            base
        }
        _ => path,
    }
}
