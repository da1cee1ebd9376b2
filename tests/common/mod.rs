#![allow(dead_code)]

use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use vault_search::config::Config;
use vault_search::embedding::EmbeddingProvider;
use vault_search::error::StoreError;
use vault_search::models::{ChunkHit, ChunkRecord, CollectionStats, StoredChunk};
use vault_search::service::VaultSearch;
use vault_search::store::{InMemoryStore, VectorStore};

pub const DIMS: usize = 16;

/// Deterministic embedder: a normalised bag-of-bytes vector, so identical
/// texts embed identically and similar texts land close together.
pub struct StubEmbedder {
    healthy: bool,
    has_model: bool,
    fail_marker: Option<String>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl StubEmbedder {
    pub fn new() -> Self {
        Self {
            healthy: true,
            has_model: true,
            fail_marker: None,
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn unreachable() -> Self {
        Self {
            healthy: false,
            ..Self::new()
        }
    }

    pub fn without_model(mut self) -> Self {
        self.has_model = false;
        self
    }

    /// Texts containing `marker` fail to embed.
    pub fn failing_on(mut self, marker: &str) -> Self {
        self.fail_marker = Some(marker.to_string());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

pub fn stub_vector(text: &str) -> Vec<f32> {
    let mut v = vec![0.0f32; DIMS];
    for b in text.bytes() {
        v[(b as usize) % DIMS] += 1.0;
    }
    v[0] += 0.5;
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    v.iter().map(|x| x / norm).collect()
}

#[async_trait]
impl EmbeddingProvider for StubEmbedder {
    fn model_name(&self) -> &str {
        "stub-embed"
    }

    async fn embed(&self, text: &str) -> Vec<f32> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if !self.healthy {
            return Vec::new();
        }
        if let Some(marker) = &self.fail_marker {
            if text.contains(marker.as_str()) {
                return Vec::new();
            }
        }
        stub_vector(text)
    }

    async fn is_healthy(&self) -> bool {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.healthy
    }

    async fn has_model(&self) -> bool {
        self.has_model
    }
}

/// Store whose writes always fail; reads go to an empty in-memory store.
pub struct FailingStore {
    inner: InMemoryStore,
}

impl FailingStore {
    pub fn new() -> Self {
        Self {
            inner: InMemoryStore::new(),
        }
    }
}

#[async_trait]
impl VectorStore for FailingStore {
    async fn upsert_batch(&self, _chunks: &[ChunkRecord]) -> Result<(), StoreError> {
        Err(StoreError::Io(std::io::Error::other("disk full")))
    }

    async fn query(&self, vector: &[f32], limit: usize) -> Vec<ChunkHit> {
        self.inner.query(vector, limit).await
    }

    async fn get_by_logical_path(&self, path: &str) -> Result<Option<StoredChunk>, StoreError> {
        self.inner.get_by_logical_path(path).await
    }

    async fn delete(&self, path: &str) -> Result<bool, StoreError> {
        self.inner.delete(path).await
    }

    async fn collection_stats(&self) -> CollectionStats {
        self.inner.collection_stats().await
    }

    async fn chunks_for_source(&self, source_path: &str) -> Result<Vec<StoredChunk>, StoreError> {
        self.inner.chunks_for_source(source_path).await
    }

    fn query_failures(&self) -> u64 {
        self.inner.query_failures()
    }
}

pub fn write_note(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

/// `n` characters with no periods and no blank lines.
pub fn filler(n: usize) -> String {
    "lorem ipsum dolor sit amet consectetur adipiscing elit "
        .chars()
        .cycle()
        .take(n)
        .collect()
}

pub fn test_config(root: &Path) -> Config {
    let vault = root.join("vault");
    fs::create_dir_all(&vault).unwrap();
    Config::minimal(vault, root.join("data").join("vault.sqlite"))
}

pub fn service_with(
    config: Config,
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
) -> Arc<VaultSearch> {
    Arc::new(VaultSearch::new(config, embedder, store))
}
