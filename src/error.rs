//! Typed errors for the library layers.
//!
//! The indexing pipeline, query path and vector store each have their own
//! error enum so callers (HTTP handlers, agent tools, the CLI) can map a
//! failure to the right response without string matching. Application
//! edges wrap these in `anyhow`.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("metadata serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("embedding dimension mismatch: store holds {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("refusing to store chunk {id} with an empty embedding")]
    EmptyEmbedding { id: String },

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("embedding provider at {url} is not reachable")]
    ProviderUnavailable { url: String },

    #[error("an index run is already in progress")]
    RunInProgress,

    #[error("vault directory does not exist: {}", .0.display())]
    VaultMissing(PathBuf),

    #[error("invalid glob pattern '{pattern}': {source}")]
    InvalidGlob {
        pattern: String,
        #[source]
        source: globset::Error,
    },

    #[error("failed to walk vault: {0}")]
    Discover(#[from] walkdir::Error),

    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SearchError {
    #[error("query must not be empty")]
    EmptyQuery,

    #[error("limit must be at least 1")]
    InvalidLimit,

    #[error("could not embed the query; is the embedding provider running?")]
    EmbeddingUnavailable,
}
