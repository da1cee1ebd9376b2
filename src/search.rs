//! The query path.
//!
//! [`search`] embeds the query text and asks the store for its nearest
//! neighbours. Hits come back exactly as the store ranked them (ascending
//! cosine distance). There is no re-ranking.
//!
//! Input problems are rejected before any network call, and a query that
//! cannot be embedded is an error rather than an empty result, so callers
//! can tell "provider down" apart from "nothing matched".
//!
//! [`ScoredHit`] is the presentation shape shared by the CLI, the HTTP API
//! and the agent tools. It adds `similarity = 1 - distance`, rounded to
//! four decimals.

use serde::Serialize;
use tracing::debug;

use crate::embedding::EmbeddingProvider;
use crate::error::SearchError;
use crate::models::ChunkHit;
use crate::store::VectorStore;

/// Embed `query` and return up to `limit` nearest chunks, closest first.
pub async fn search(
    embedder: &dyn EmbeddingProvider,
    store: &dyn VectorStore,
    query: &str,
    limit: usize,
) -> Result<Vec<ChunkHit>, SearchError> {
    if query.trim().is_empty() {
        return Err(SearchError::EmptyQuery);
    }
    if limit == 0 {
        return Err(SearchError::InvalidLimit);
    }

    let vector = embedder.embed(query).await;
    if vector.is_empty() {
        return Err(SearchError::EmbeddingUnavailable);
    }

    let hits = store.query(&vector, limit).await;
    debug!(query = %query, limit, hits = hits.len(), "search complete");
    Ok(hits)
}

/// `1 - distance`, rounded to four decimals.
pub fn similarity(distance: f32) -> f64 {
    let s = 1.0 - distance as f64;
    (s * 10_000.0).round() / 10_000.0
}

/// A search hit as shown to people and agents.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredHit {
    pub id: String,
    pub file_path: String,
    pub file_name: String,
    pub logical_path: String,
    pub content: String,
    pub similarity: f64,
    pub distance: f32,
    pub chunk_index: usize,
    pub total_chunks: usize,
    pub file_size: u64,
    pub modified_at: String,
    /// First eight hex digits of the file's content hash.
    pub content_hash: String,
}

impl From<ChunkHit> for ScoredHit {
    fn from(hit: ChunkHit) -> Self {
        let short_hash: String = hit.metadata.content_hash.chars().take(8).collect();
        Self {
            similarity: similarity(hit.distance),
            distance: hit.distance,
            id: hit.id,
            file_path: hit.metadata.file_path,
            file_name: hit.metadata.file_name,
            logical_path: hit.logical_path,
            content: hit.content,
            chunk_index: hit.metadata.chunk_index,
            total_chunks: hit.metadata.total_chunks,
            file_size: hit.metadata.file_size,
            modified_at: hit.metadata.modified_at,
            content_hash: short_hash,
        }
    }
}

pub fn to_scored(hits: Vec<ChunkHit>) -> Vec<ScoredHit> {
    hits.into_iter().map(ScoredHit::from).collect()
}

/// Print hits for the `vsearch search` command.
pub fn print_hits(hits: &[ScoredHit]) {
    if hits.is_empty() {
        println!("No results.");
        return;
    }

    for (i, hit) in hits.iter().enumerate() {
        println!(
            "{}. [{:.4}] {} (chunk {}/{})",
            i + 1,
            hit.similarity,
            hit.file_path,
            hit.chunk_index + 1,
            hit.total_chunks
        );
        let preview: String = hit.content.chars().take(200).collect();
        println!("    {}", preview.replace('\n', " "));
        println!();
    }
}
