//! TOML configuration parsing and validation.
//!
//! A single file (default `./config/vsearch.toml`) describes the vault to
//! index, where the SQLite store lives, which Ollama endpoint and model to
//! embed with, how to chunk notes, and how the server and scheduler behave.
//!
//! ```toml
//! [vault]
//! path = "/home/me/Notes"
//!
//! [embedding]
//! url = "http://localhost:11434"
//! model = "mxbai-embed-large:latest"
//! ```
//!
//! Every section except `[vault]` is optional and falls back to defaults.

use anyhow::{bail, Context, Result};
use globset::Glob;
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub vault: VaultConfig,
    #[serde(default)]
    pub db: DbConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub indexing: IndexingConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct VaultConfig {
    /// Root directory of the notes tree.
    pub path: PathBuf,
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
}

fn default_include_globs() -> Vec<String> {
    vec!["**/*.md".to_string()]
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./data/vault.sqlite")
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    /// Base URL of the Ollama server.
    #[serde(default = "default_embedding_url")]
    pub url: String,
    #[serde(default = "default_embedding_model")]
    pub model: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            url: default_embedding_url(),
            model: default_embedding_model(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_embedding_url() -> String {
    "http://localhost:11434".to_string()
}
fn default_embedding_model() -> String {
    "mxbai-embed-large:latest".to_string()
}
fn default_timeout_secs() -> u64 {
    60
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,
    #[serde(default = "default_overlap_chars")]
    pub overlap_chars: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_chars: default_max_chars(),
            overlap_chars: default_overlap_chars(),
        }
    }
}

fn default_max_chars() -> usize {
    1000
}
fn default_overlap_chars() -> usize {
    200
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexingConfig {
    /// Number of files whose chunks are written to the store together.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Period of the scheduled reindex while `vsearch serve` is running.
    #[serde(default = "default_interval_minutes")]
    pub interval_minutes: u64,
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            interval_minutes: default_interval_minutes(),
        }
    }
}

fn default_batch_size() -> usize {
    10
}
fn default_interval_minutes() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "0.0.0.0:8000".to_string()
}

impl Config {
    /// A configuration with every section at its default, pointing at the
    /// given vault and database. Used by tests and embedding applications
    /// that do not read a TOML file.
    pub fn minimal(vault_path: impl Into<PathBuf>, db_path: impl Into<PathBuf>) -> Self {
        Self {
            vault: VaultConfig {
                path: vault_path.into(),
                include_globs: default_include_globs(),
                exclude_globs: Vec::new(),
            },
            db: DbConfig {
                path: db_path.into(),
            },
            embedding: EmbeddingConfig::default(),
            chunking: ChunkingConfig::default(),
            indexing: IndexingConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content)
}

/// Parse and validate configuration from TOML text.
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.chunking.max_chars == 0 {
        bail!("chunking.max_chars must be > 0");
    }
    if config.chunking.overlap_chars >= config.chunking.max_chars {
        tracing::warn!(
            max_chars = config.chunking.max_chars,
            overlap_chars = config.chunking.overlap_chars,
            "chunk overlap is not smaller than chunk size; chunks will not overlap"
        );
    }

    if config.indexing.batch_size == 0 {
        bail!("indexing.batch_size must be > 0");
    }
    if config.indexing.interval_minutes == 0 {
        bail!("indexing.interval_minutes must be > 0");
    }

    if config.embedding.model.trim().is_empty() {
        bail!("embedding.model must not be empty");
    }
    if config.embedding.url.trim().is_empty() {
        bail!("embedding.url must not be empty");
    }

    for pattern in config
        .vault
        .include_globs
        .iter()
        .chain(config.vault.exclude_globs.iter())
    {
        Glob::new(pattern).with_context(|| format!("Invalid glob pattern: '{}'", pattern))?;
    }

    Ok(())
}
