//! Vector store abstraction.
//!
//! The [`VectorStore`] trait is everything the indexing pipeline and the
//! query path need from persistence. Records are addressed by an id derived
//! from their logical path ([`derive_id`]), which makes writes idempotent:
//! re-indexing a file overwrites its chunks instead of duplicating them.
//!
//! | Method | Purpose | Failure mode |
//! |--------|---------|--------------|
//! | [`upsert_batch`](VectorStore::upsert_batch) | insert-or-replace a batch in one transaction | propagates |
//! | [`query`](VectorStore::query) | nearest neighbours by cosine distance | empty list, counted |
//! | [`get_by_logical_path`](VectorStore::get_by_logical_path) | point lookup | propagates |
//! | [`delete`](VectorStore::delete) | remove a note or a single chunk | propagates |
//! | [`collection_stats`](VectorStore::collection_stats) | record count | zero count |
//! | [`chunks_for_source`](VectorStore::chunks_for_source) | every chunk of one file | propagates |
//!
//! Implementations: [`SqliteStore`] for the real index and [`InMemoryStore`]
//! for tests and throwaway runs.

pub mod memory;
pub mod sqlite;

pub use memory::InMemoryStore;
pub use sqlite::SqliteStore;

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use crate::error::StoreError;
use crate::models::{ChunkHit, ChunkRecord, CollectionStats, StoredChunk};

/// Name reported by [`VectorStore::collection_stats`].
pub const COLLECTION_NAME: &str = "vault_documents";

#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Insert or replace `chunks` by id, atomically.
    ///
    /// For every source file present in the batch, chunks of that file whose
    /// ids are not in the batch are removed in the same transaction, so a
    /// file that shrinks does not leave stale `#n` chunks behind.
    async fn upsert_batch(&self, chunks: &[ChunkRecord]) -> Result<(), StoreError>;

    /// Up to `limit` nearest neighbours of `vector`, closest first.
    ///
    /// Never fails. On an internal error, or when `vector` does not match
    /// the dimension of the stored vectors, the result is empty, the error
    /// is logged, and [`query_failures`](VectorStore::query_failures) is
    /// incremented.
    async fn query(&self, vector: &[f32], limit: usize) -> Vec<ChunkHit>;

    async fn get_by_logical_path(&self, path: &str) -> Result<Option<StoredChunk>, StoreError>;

    /// Remove the record whose id derives from `path`, plus every chunk
    /// whose source file is `path`. Returns whether anything was removed.
    async fn delete(&self, path: &str) -> Result<bool, StoreError>;

    /// Never fails; reports a zero count on internal error.
    async fn collection_stats(&self) -> CollectionStats;

    /// All chunks of one source file, ordered by chunk index.
    async fn chunks_for_source(&self, source_path: &str) -> Result<Vec<StoredChunk>, StoreError>;

    /// Number of [`query`](VectorStore::query) calls that failed internally.
    fn query_failures(&self) -> u64;

    /// Release backing resources.
    async fn close(&self) {}
}

/// Deterministic record id: lowercase hex SHA-256 of the logical path.
pub fn derive_id(logical_path: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(logical_path.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Reject empty vectors and any vector whose dimension differs from the
/// store's (`existing`) or from the rest of the batch.
pub(crate) fn check_dimensions(
    existing: Option<usize>,
    chunks: &[ChunkRecord],
) -> Result<(), StoreError> {
    let mut expected = existing;
    for chunk in chunks {
        let actual = chunk.embedding.len();
        if actual == 0 {
            return Err(StoreError::EmptyEmbedding {
                id: chunk.id.clone(),
            });
        }
        match expected {
            Some(dims) if dims != actual => {
                return Err(StoreError::DimensionMismatch {
                    expected: dims,
                    actual,
                })
            }
            Some(_) => {}
            None => expected = Some(actual),
        }
    }
    Ok(())
}

/// Ids to keep per source file present in a batch.
pub(crate) fn kept_ids_by_source(chunks: &[ChunkRecord]) -> HashMap<&str, HashSet<&str>> {
    let mut kept: HashMap<&str, HashSet<&str>> = HashMap::new();
    for chunk in chunks {
        kept.entry(chunk.source_path.as_str())
            .or_default()
            .insert(chunk.id.as_str());
    }
    kept
}

/// Sort by ascending distance and keep the closest `limit`.
pub(crate) fn rank_hits(mut hits: Vec<ChunkHit>, limit: usize) -> Vec<ChunkHit> {
    hits.sort_by(|a, b| {
        a.distance
            .partial_cmp(&b.distance)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    hits.truncate(limit);
    hits
}
