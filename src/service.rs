//! The application facade.
//!
//! [`VaultSearch`] owns the long-lived pieces (embedding client, vector
//! store, indexer) and exposes every operation the CLI, HTTP API, agent
//! tools and scheduler need. Dependencies are injected through
//! [`VaultSearch::new`], so tests can swap in a stub provider or an
//! in-memory store. [`VaultSearch::open`] wires up the production ones.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{info, warn};

use crate::config::Config;
use crate::discover::path_key;
use crate::embedding::{EmbeddingProvider, OllamaClient};
use crate::error::{IndexError, SearchError, StoreError};
use crate::indexer::Indexer;
use crate::models::{strip_chunk_suffix, ChunkHit, DocumentView, IndexRunResult, VaultStats};
use crate::search;
use crate::stats::{Settings, StatsReport};
use crate::store::{SqliteStore, VectorStore};

pub struct VaultSearch {
    config: Config,
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
    indexer: Indexer,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    pub provider_url: String,
    pub provider_reachable: bool,
    pub model: String,
    pub model_available: bool,
    pub documents: u64,
    pub indexing: bool,
}

impl VaultSearch {
    /// Build the service from configuration: an [`OllamaClient`] and a
    /// [`SqliteStore`] at `db.path`.
    pub async fn open(config: Config) -> Result<Self> {
        let embedder =
            OllamaClient::new(&config.embedding).context("Failed to build HTTP client")?;
        let store = SqliteStore::open(&config.db.path)
            .await
            .with_context(|| format!("Failed to open database: {}", config.db.path.display()))?;
        Ok(Self::new(config, Arc::new(embedder), Arc::new(store)))
    }

    pub fn new(
        config: Config,
        embedder: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn VectorStore>,
    ) -> Self {
        let indexer = Indexer::new(embedder.clone(), store.clone(), &config);
        Self {
            config,
            embedder,
            store,
            indexer,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn VectorStore> {
        &self.store
    }

    pub async fn search(&self, query: &str, limit: usize) -> Result<Vec<ChunkHit>, SearchError> {
        search::search(self.embedder.as_ref(), self.store.as_ref(), query, limit).await
    }

    pub async fn reindex(&self) -> Result<IndexRunResult, IndexError> {
        self.indexer.run().await
    }

    pub async fn stats(&self) -> StatsReport {
        let vault = match self.indexer.vault_stats() {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "could not scan vault for statistics");
                VaultStats {
                    total_files: 0,
                    total_size_bytes: 0,
                    vault_path: self.config.vault.path.to_string_lossy().into_owned(),
                }
            }
        };
        StatsReport {
            vault,
            collection: self.store.collection_stats().await,
            settings: Settings::from_config(&self.config),
        }
    }

    pub async fn health(&self) -> HealthReport {
        let provider_reachable = self.embedder.is_healthy().await;
        let model_available = provider_reachable && self.embedder.has_model().await;
        HealthReport {
            status: if provider_reachable {
                "healthy"
            } else {
                "degraded"
            },
            provider_url: self.config.embedding.url.clone(),
            provider_reachable,
            model: self.embedder.model_name().to_string(),
            model_available,
            documents: self.store.collection_stats().await.count,
            indexing: self.indexer.is_running(),
        }
    }

    /// Every stored chunk of a note. A `#n` chunk suffix on `path` is
    /// ignored, so any hit's logical path resolves to its whole document.
    pub async fn document(&self, path: &str) -> Result<Option<DocumentView>, StoreError> {
        let resolved = self.resolve_path(path);
        let file_path = strip_chunk_suffix(&resolved);
        let chunks = self.store.chunks_for_source(file_path).await?;
        if chunks.is_empty() {
            return Ok(None);
        }
        Ok(Some(DocumentView::from_chunks(file_path, chunks)))
    }

    pub async fn delete_document(&self, path: &str) -> Result<bool, StoreError> {
        let resolved = self.resolve_path(path);
        let removed = self.store.delete(&resolved).await?;
        if removed {
            info!(path = %resolved, "deleted from index");
        }
        Ok(removed)
    }

    /// Notes are keyed by the path discovery produced (vault root joined
    /// with the relative path). Relative input is resolved the same way.
    fn resolve_path(&self, path: &str) -> String {
        let candidate = Path::new(path);
        if candidate.is_absolute() || candidate.starts_with(&self.config.vault.path) {
            path.to_string()
        } else {
            path_key(&self.config.vault.path.join(path))
        }
    }

    /// Release the store's connections.
    pub async fn shutdown(&self) {
        self.store.close().await;
    }
}
