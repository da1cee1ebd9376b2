//! Index statistics.
//!
//! Combines a fresh scan of the vault (how many notes exist and how large
//! they are) with the store's record count and the effective settings.
//! Used by `vsearch stats`, `GET /stats` and the `get_vault_statistics`
//! tool.

use serde::Serialize;

use crate::config::Config;
use crate::models::{CollectionStats, VaultStats};

#[derive(Debug, Clone, Serialize)]
pub struct StatsReport {
    pub vault: VaultStats,
    pub collection: CollectionStats,
    pub settings: Settings,
}

#[derive(Debug, Clone, Serialize)]
pub struct Settings {
    pub embedding_model: String,
    pub provider_url: String,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub batch_size: usize,
    pub reindex_interval_minutes: u64,
}

impl Settings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            embedding_model: config.embedding.model.clone(),
            provider_url: config.embedding.url.clone(),
            chunk_size: config.chunking.max_chars,
            chunk_overlap: config.chunking.overlap_chars,
            batch_size: config.indexing.batch_size,
            reindex_interval_minutes: config.indexing.interval_minutes,
        }
    }
}

/// Print a report for `vsearch stats`.
pub fn print_report(report: &StatsReport, db_path: &std::path::Path) {
    let db_size = std::fs::metadata(db_path).map(|m| m.len()).unwrap_or(0);

    println!("Vault Search — Index Stats");
    println!("==========================");
    println!();
    println!("  Vault:       {}", report.vault.vault_path);
    println!("  Notes:       {}", report.vault.total_files);
    println!("  Note bytes:  {}", format_bytes(report.vault.total_size_bytes));
    println!();
    println!("  Database:    {}", db_path.display());
    println!("  Size:        {}", format_bytes(db_size));
    println!("  Collection:  {}", report.collection.name);
    println!("  Chunks:      {}", report.collection.count);
    println!();
    println!("  Model:       {}", report.settings.embedding_model);
    println!("  Provider:    {}", report.settings.provider_url);
    println!(
        "  Chunking:    {} chars, {} overlap",
        report.settings.chunk_size, report.settings.chunk_overlap
    );
    println!(
        "  Reindex:     every {} min",
        report.settings.reindex_interval_minutes
    );
    println!();
}

/// Format a byte count as a human-readable string.
pub fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}
