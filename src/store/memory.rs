//! In-memory [`VectorStore`] for tests and ephemeral runs.
//!
//! Records live in a `HashMap` behind `std::sync::RwLock`. Queries are a
//! brute-force cosine scan, same as the SQLite store.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use tracing::error;

use crate::embedding::cosine_distance;
use crate::error::StoreError;
use crate::models::{ChunkHit, ChunkRecord, CollectionStats, StoredChunk};

use super::{check_dimensions, derive_id, kept_ids_by_source, rank_hits, VectorStore, COLLECTION_NAME};

pub struct InMemoryStore {
    records: RwLock<HashMap<String, ChunkRecord>>,
    query_failures: AtomicU64,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            query_failures: AtomicU64::new(0),
        }
    }

    fn scan(&self, vector: &[f32], limit: usize) -> Result<Vec<ChunkHit>, StoreError> {
        let records = self.records.read().unwrap_or_else(PoisonError::into_inner);
        let mut hits = Vec::with_capacity(records.len());
        for r in records.values() {
            if r.embedding.len() != vector.len() {
                return Err(StoreError::DimensionMismatch {
                    expected: r.embedding.len(),
                    actual: vector.len(),
                });
            }
            hits.push(ChunkHit {
                id: r.id.clone(),
                logical_path: r.logical_path.clone(),
                content: r.content.clone(),
                metadata: r.metadata.clone(),
                distance: cosine_distance(vector, &r.embedding),
            });
        }
        Ok(rank_hits(hits, limit))
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn to_stored(record: &ChunkRecord) -> StoredChunk {
    StoredChunk {
        id: record.id.clone(),
        logical_path: record.logical_path.clone(),
        source_path: record.source_path.clone(),
        content: record.content.clone(),
        metadata: record.metadata.clone(),
    }
}

#[async_trait]
impl VectorStore for InMemoryStore {
    async fn upsert_batch(&self, chunks: &[ChunkRecord]) -> Result<(), StoreError> {
        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);

        let existing = records.values().next().map(|r| r.embedding.len());
        check_dimensions(existing, chunks)?;

        for (source_path, keep) in kept_ids_by_source(chunks) {
            records.retain(|id, r| r.source_path != source_path || keep.contains(id.as_str()));
        }
        for chunk in chunks {
            records.insert(chunk.id.clone(), chunk.clone());
        }
        Ok(())
    }

    async fn query(&self, vector: &[f32], limit: usize) -> Vec<ChunkHit> {
        match self.scan(vector, limit) {
            Ok(hits) => hits,
            Err(e) => {
                self.query_failures.fetch_add(1, Ordering::Relaxed);
                error!(error = %e, "vector query failed");
                Vec::new()
            }
        }
    }

    async fn get_by_logical_path(&self, path: &str) -> Result<Option<StoredChunk>, StoreError> {
        let records = self.records.read().unwrap_or_else(PoisonError::into_inner);
        Ok(records.get(&derive_id(path)).map(to_stored))
    }

    async fn delete(&self, path: &str) -> Result<bool, StoreError> {
        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
        let id = derive_id(path);
        let before = records.len();
        records.retain(|key, r| *key != id && r.source_path != path);
        Ok(records.len() < before)
    }

    async fn collection_stats(&self) -> CollectionStats {
        let records = self.records.read().unwrap_or_else(PoisonError::into_inner);
        CollectionStats {
            count: records.len() as u64,
            name: COLLECTION_NAME.to_string(),
        }
    }

    async fn chunks_for_source(&self, source_path: &str) -> Result<Vec<StoredChunk>, StoreError> {
        let records = self.records.read().unwrap_or_else(PoisonError::into_inner);
        let mut chunks: Vec<StoredChunk> = records
            .values()
            .filter(|r| r.source_path == source_path)
            .map(to_stored)
            .collect();
        chunks.sort_by_key(|c| c.metadata.chunk_index);
        Ok(chunks)
    }

    fn query_failures(&self) -> u64 {
        self.query_failures.load(Ordering::Relaxed)
    }
}
