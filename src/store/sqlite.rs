//! SQLite-backed [`VectorStore`].
//!
//! Vectors are stored as little-endian `f32` BLOBs next to the chunk text
//! and its JSON metadata. Queries are a brute-force cosine scan over every
//! row, which is fine for a personal notes vault.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::{debug, error};

use crate::db;
use crate::embedding::{blob_to_vec, cosine_distance, vec_to_blob};
use crate::error::StoreError;
use crate::migrate;
use crate::models::{ChunkHit, ChunkMetadata, ChunkRecord, CollectionStats, StoredChunk};

use super::{check_dimensions, derive_id, kept_ids_by_source, rank_hits, VectorStore, COLLECTION_NAME};

pub struct SqliteStore {
    pool: SqlitePool,
    query_failures: AtomicU64,
}

impl SqliteStore {
    /// Open the database at `path`, creating the file and schema if needed.
    pub async fn open(path: &Path) -> Result<Self, StoreError> {
        let pool = db::connect(path).await?;
        migrate::ensure_schema(&pool).await?;
        Ok(Self::from_pool(pool))
    }

    /// Wrap a pool whose schema is already in place.
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self {
            pool,
            query_failures: AtomicU64::new(0),
        }
    }

    async fn scan(&self, vector: &[f32], limit: usize) -> Result<Vec<ChunkHit>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, logical_path, content, metadata_json, embedding FROM chunks",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut hits = Vec::with_capacity(rows.len());
        for row in &rows {
            let blob: Vec<u8> = row.try_get("embedding")?;
            let stored = blob_to_vec(&blob);
            if stored.len() != vector.len() {
                return Err(StoreError::DimensionMismatch {
                    expected: stored.len(),
                    actual: vector.len(),
                });
            }
            let metadata_json: String = row.try_get("metadata_json")?;
            hits.push(ChunkHit {
                id: row.try_get("id")?,
                logical_path: row.try_get("logical_path")?,
                content: row.try_get("content")?,
                metadata: serde_json::from_str(&metadata_json)?,
                distance: cosine_distance(vector, &stored),
            });
        }

        Ok(rank_hits(hits, limit))
    }
}

fn row_to_chunk(row: &SqliteRow) -> Result<StoredChunk, StoreError> {
    let metadata_json: String = row.try_get("metadata_json")?;
    let metadata: ChunkMetadata = serde_json::from_str(&metadata_json)?;
    Ok(StoredChunk {
        id: row.try_get("id")?,
        logical_path: row.try_get("logical_path")?,
        source_path: row.try_get("source_path")?,
        content: row.try_get("content")?,
        metadata,
    })
}

#[async_trait]
impl VectorStore for SqliteStore {
    async fn upsert_batch(&self, chunks: &[ChunkRecord]) -> Result<(), StoreError> {
        if chunks.is_empty() {
            return Ok(());
        }

        let existing: Option<i64> = sqlx::query_scalar("SELECT dims FROM chunks LIMIT 1")
            .fetch_optional(&self.pool)
            .await?;
        check_dimensions(existing.map(|d| d as usize), chunks)?;

        let mut tx = self.pool.begin().await?;

        for chunk in chunks {
            let metadata_json = serde_json::to_string(&chunk.metadata)?;
            sqlx::query(
                r#"
                INSERT INTO chunks (id, logical_path, source_path, chunk_index, content,
                                    content_hash, metadata_json, embedding, dims, indexed_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(id) DO UPDATE SET
                    logical_path = excluded.logical_path,
                    source_path = excluded.source_path,
                    chunk_index = excluded.chunk_index,
                    content = excluded.content,
                    content_hash = excluded.content_hash,
                    metadata_json = excluded.metadata_json,
                    embedding = excluded.embedding,
                    dims = excluded.dims,
                    indexed_at = excluded.indexed_at
                "#,
            )
            .bind(&chunk.id)
            .bind(&chunk.logical_path)
            .bind(&chunk.source_path)
            .bind(chunk.metadata.chunk_index as i64)
            .bind(&chunk.content)
            .bind(&chunk.metadata.content_hash)
            .bind(&metadata_json)
            .bind(vec_to_blob(&chunk.embedding))
            .bind(chunk.embedding.len() as i64)
            .bind(&chunk.metadata.indexed_at)
            .execute(&mut *tx)
            .await?;
        }

        for (source_path, keep) in kept_ids_by_source(chunks) {
            let ids: Vec<String> = sqlx::query_scalar("SELECT id FROM chunks WHERE source_path = ?")
                .bind(source_path)
                .fetch_all(&mut *tx)
                .await?;
            for stale in ids.iter().filter(|id| !keep.contains(id.as_str())) {
                sqlx::query("DELETE FROM chunks WHERE id = ?")
                    .bind(stale)
                    .execute(&mut *tx)
                    .await?;
                debug!(source = %source_path, id = %stale, "removed stale chunk");
            }
        }

        tx.commit().await?;
        Ok(())
    }

    async fn query(&self, vector: &[f32], limit: usize) -> Vec<ChunkHit> {
        match self.scan(vector, limit).await {
            Ok(hits) => hits,
            Err(e) => {
                self.query_failures.fetch_add(1, Ordering::Relaxed);
                error!(error = %e, "vector query failed");
                Vec::new()
            }
        }
    }

    async fn get_by_logical_path(&self, path: &str) -> Result<Option<StoredChunk>, StoreError> {
        let row = sqlx::query(
            "SELECT id, logical_path, source_path, content, metadata_json FROM chunks WHERE id = ?",
        )
        .bind(derive_id(path))
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_chunk).transpose()
    }

    async fn delete(&self, path: &str) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM chunks WHERE id = ? OR source_path = ?")
            .bind(derive_id(path))
            .bind(path)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn collection_stats(&self) -> CollectionStats {
        let count = match sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM chunks")
            .fetch_one(&self.pool)
            .await
        {
            Ok(n) => n.max(0) as u64,
            Err(e) => {
                error!(error = %e, "failed to count chunks");
                0
            }
        };
        CollectionStats {
            count,
            name: COLLECTION_NAME.to_string(),
        }
    }

    async fn chunks_for_source(&self, source_path: &str) -> Result<Vec<StoredChunk>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, logical_path, source_path, content, metadata_json
            FROM chunks
            WHERE source_path = ?
            ORDER BY chunk_index ASC
            "#,
        )
        .bind(source_path)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_chunk).collect()
    }

    fn query_failures(&self) -> u64 {
        self.query_failures.load(Ordering::Relaxed)
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}
