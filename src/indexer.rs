//! The indexing pipeline.
//!
//! One run walks the whole vault and brings the store up to date:
//!
//! ```text
//! Preflight ──► Discover ──► for each batch of files:
//!                               Process (hash, skip or chunk) ──► Embed ──► Write
//!                            ──► Summarize
//! ```
//!
//! # Change detection
//!
//! Every chunk carries the SHA-256 of its *whole* source file. A file whose
//! stored hash equals the hash of its current content is skipped without
//! any embedding calls. Timestamps are never consulted.
//!
//! # Failure policy
//!
//! | Failure | Effect |
//! |---------|--------|
//! | provider unreachable at preflight | run aborts with [`IndexError::ProviderUnavailable`] |
//! | configured model not listed | warning only |
//! | file unreadable, store lookup fails | `errors += 1`, run continues |
//! | a chunk's embedding comes back empty | chunk dropped, logged |
//! | no chunk of a changed file embeds | old chunks removed, file retried next run |
//! | batch write fails | `errors += chunks in batch`, no retry |
//!
//! # Concurrency
//!
//! Runs are exclusive. A second [`Indexer::run`] while one is in flight
//! returns [`IndexError::RunInProgress`] immediately instead of queueing.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::chunk::chunk_text;
use crate::config::{ChunkingConfig, Config, VaultConfig};
use crate::discover::{discover_notes, path_key};
use crate::embedding::EmbeddingProvider;
use crate::error::IndexError;
use crate::models::{logical_path, ChunkMetadata, ChunkRecord, IndexRunResult, VaultStats};
use crate::store::{derive_id, VectorStore};

pub struct Indexer {
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
    vault: VaultConfig,
    chunking: ChunkingConfig,
    batch_size: usize,
    provider_url: String,
    run_guard: Mutex<()>,
    running: AtomicBool,
}

/// Clears the running flag when a run ends, however it ends.
struct RunningFlag<'a>(&'a AtomicBool);

impl<'a> RunningFlag<'a> {
    fn raise(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::SeqCst);
        Self(flag)
    }
}

impl Drop for RunningFlag<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

enum FileOutcome {
    Skipped,
    Processed(Vec<ChunkRecord>),
}

impl Indexer {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn VectorStore>,
        config: &Config,
    ) -> Self {
        Self {
            embedder,
            store,
            vault: config.vault.clone(),
            chunking: config.chunking.clone(),
            batch_size: config.indexing.batch_size.max(1),
            provider_url: config.embedding.url.clone(),
            run_guard: Mutex::new(()),
            running: AtomicBool::new(false),
        }
    }

    /// Whether a run is in flight. Reads a flag and never touches the run
    /// guard, so polling it cannot make a concurrent [`run`](Self::run) fail.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Run the full pipeline once.
    pub async fn run(&self) -> Result<IndexRunResult, IndexError> {
        let _guard = self
            .run_guard
            .try_lock()
            .map_err(|_| IndexError::RunInProgress)?;
        let _running = RunningFlag::raise(&self.running);

        let span = info_span!("index_run", run_id = %Uuid::new_v4());
        self.run_locked().instrument(span).await
    }

    async fn run_locked(&self) -> Result<IndexRunResult, IndexError> {
        info!(vault = %self.vault.path.display(), "starting index run");

        if !self.embedder.is_healthy().await {
            error!(url = %self.provider_url, "embedding provider unreachable; aborting run");
            return Err(IndexError::ProviderUnavailable {
                url: self.provider_url.clone(),
            });
        }
        if !self.embedder.has_model().await {
            warn!(
                model = %self.embedder.model_name(),
                "model not listed by provider; proceeding anyway"
            );
        }

        let files = discover_notes(&self.vault)?;
        info!(files = files.len(), "discovered notes");

        let mut result = IndexRunResult {
            total_files: files.len(),
            ..IndexRunResult::default()
        };

        for batch in files.chunks(self.batch_size) {
            let mut pending: Vec<ChunkRecord> = Vec::new();

            for path in batch {
                match self.process_file(path).await {
                    Ok(FileOutcome::Skipped) => {
                        debug!(path = %path.display(), "unchanged, skipping");
                        result.skipped += 1;
                    }
                    Ok(FileOutcome::Processed(records)) => {
                        info!(path = %path.display(), chunks = records.len(), "processed");
                        result.processed += 1;
                        pending.extend(records);
                    }
                    Err(e) => {
                        error!(path = %path.display(), error = %e, "failed to process file");
                        result.errors += 1;
                    }
                }
            }

            if pending.is_empty() {
                continue;
            }
            if let Err(e) = self.store.upsert_batch(&pending).await {
                error!(chunks = pending.len(), error = %e, "batch write failed");
                result.errors += pending.len();
            }
        }

        info!(
            processed = result.processed,
            skipped = result.skipped,
            errors = result.errors,
            total_files = result.total_files,
            "index run complete"
        );
        Ok(result)
    }

    async fn process_file(&self, path: &Path) -> Result<FileOutcome, IndexError> {
        let read_err = |source| IndexError::Read {
            path: path.to_path_buf(),
            source,
        };
        let content = tokio::fs::read_to_string(path).await.map_err(read_err)?;
        let stat = tokio::fs::metadata(path).await.map_err(read_err)?;

        let file_path = path_key(path);
        let hash = content_hash(&content);

        let previous = self.stored_hash(&file_path).await?;
        if previous.as_deref() == Some(hash.as_str()) {
            return Ok(FileOutcome::Skipped);
        }

        let chunks: Vec<String> =
            chunk_text(&content, self.chunking.max_chars, self.chunking.overlap_chars)
                .into_iter()
                .filter(|c| !c.trim().is_empty())
                .collect();
        let total = chunks.len();

        let modified = stat.modified().ok();
        let modified_at = rfc3339(modified);
        let created_at = rfc3339(stat.created().ok().or(modified));
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let embeddings = self.embedder.embed_many(&chunks).await;

        let mut records = Vec::with_capacity(total);
        for (index, (text, embedding)) in chunks.into_iter().zip(embeddings).enumerate() {
            let logical = logical_path(&file_path, index, total);
            if embedding.is_empty() {
                warn!(chunk = %logical, "embedding unavailable; dropping chunk");
                continue;
            }
            records.push(ChunkRecord {
                id: derive_id(&logical),
                logical_path: logical,
                source_path: file_path.clone(),
                metadata: ChunkMetadata {
                    file_path: file_path.clone(),
                    file_name: file_name.clone(),
                    file_size: stat.len(),
                    modified_at: modified_at.clone(),
                    created_at: created_at.clone(),
                    content_hash: hash.clone(),
                    chunk_index: index,
                    total_chunks: total,
                    chunk_size: text.chars().count(),
                    indexed_at: Utc::now().to_rfc3339(),
                },
                content: text,
                embedding,
            });
        }

        if records.is_empty() {
            if total > 0 {
                warn!(path = %file_path, chunks = total, "no chunk of the file could be embedded");
            }
            // Nothing will be written, so the upsert cannot prune the old
            // version. Drop it here; the next run then retries the file.
            if previous.is_some() {
                self.store.delete(&file_path).await?;
                warn!(path = %file_path, "removed chunks of the previous version");
            }
        }

        Ok(FileOutcome::Processed(records))
    }

    /// Content hash recorded for a file, checking the single-chunk logical
    /// path first and then the first chunk of a split file.
    async fn stored_hash(&self, file_path: &str) -> Result<Option<String>, IndexError> {
        for candidate in [file_path.to_string(), logical_path(file_path, 0, 2)] {
            if let Some(chunk) = self.store.get_by_logical_path(&candidate).await? {
                return Ok(Some(chunk.metadata.content_hash));
            }
        }
        Ok(None)
    }

    /// File count and total size of the notes a run would consider.
    pub fn vault_stats(&self) -> Result<VaultStats, IndexError> {
        let files = discover_notes(&self.vault)?;
        let total_size_bytes = files
            .iter()
            .filter_map(|p| std::fs::metadata(p).ok())
            .map(|m| m.len())
            .sum();
        Ok(VaultStats {
            total_files: files.len(),
            total_size_bytes,
            vault_path: path_key(&self.vault.path),
        })
    }
}

/// Lowercase hex SHA-256 of a file's full content.
pub fn content_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn rfc3339(time: Option<SystemTime>) -> String {
    time.map(|t| DateTime::<Utc>::from(t).to_rfc3339())
        .unwrap_or_default()
}
