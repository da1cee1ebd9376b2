//! # Vault Search CLI (`vsearch`)
//!
//! ## Usage
//!
//! ```bash
//! vsearch --config ./config/vsearch.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `vsearch init` | Create the SQLite database and schema |
//! | `vsearch index` | Embed new and changed notes |
//! | `vsearch search "<query>"` | Semantic search over indexed notes |
//! | `vsearch get <path>` | Print every indexed chunk of a note |
//! | `vsearch delete <path>` | Remove a note or chunk from the index |
//! | `vsearch stats` | Vault and index statistics |
//! | `vsearch health` | Check the embedding provider |
//! | `vsearch serve` | Start the HTTP + MCP server with scheduled reindexing |
//!
//! Logs go to stderr and honour `RUST_LOG` (default `info`).

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use tracing_subscriber::EnvFilter;
use vault_search::config::load_config;
use vault_search::search::{print_hits, to_scored};
use vault_search::server::run_server;
use vault_search::service::VaultSearch;
use vault_search::stats::print_report;

#[derive(Parser)]
#[command(
    name = "vsearch",
    about = "Vault Search — semantic search over a folder of markdown notes",
    version,
    long_about = "Vault Search chunks the markdown notes in a vault, embeds them with a local \
    Ollama model, stores the vectors in SQLite, and answers similarity queries from the CLI, \
    a JSON HTTP API, and an MCP endpoint for AI agents."
)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, global = true, default_value = "./config/vsearch.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the database and schema.
    Init,

    /// Index new and changed notes.
    Index,

    /// Search indexed notes.
    Search {
        query: String,

        /// Maximum number of results.
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },

    /// Print the indexed content of a note.
    Get {
        /// Note path (absolute or relative to the vault). A `#n` suffix is ignored.
        path: String,
    },

    /// Remove a note, or a single `#n` chunk, from the index.
    Delete { path: String },

    /// Show vault and index statistics.
    Stats,

    /// Check that the embedding provider is reachable and has the model.
    Health,

    /// Start the HTTP server.
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = load_config(&cli.config)?;
    let db_path = cfg.db.path.clone();
    let service = Arc::new(VaultSearch::open(cfg).await?);

    let outcome = run_command(cli.command, service.clone(), &db_path).await;
    service.shutdown().await;
    outcome
}

async fn run_command(
    command: Commands,
    service: Arc<VaultSearch>,
    db_path: &std::path::Path,
) -> anyhow::Result<()> {
    match command {
        Commands::Init => {
            println!("Database initialized at {}", db_path.display());
        }
        Commands::Index => {
            let result = service.reindex().await?;
            println!(
                "Indexed {} files: {} processed, {} skipped, {} errors",
                result.total_files, result.processed, result.skipped, result.errors
            );
        }
        Commands::Search { query, limit } => {
            let hits = service.search(&query, limit).await?;
            print_hits(&to_scored(hits));
        }
        Commands::Get { path } => match service.document(&path).await? {
            Some(doc) => {
                println!("{} ({} chunks)", doc.file_path, doc.total_chunks);
                println!();
                println!("{}", doc.content);
            }
            None => anyhow::bail!("Document not found: {}", path),
        },
        Commands::Delete { path } => {
            if service.delete_document(&path).await? {
                println!("Deleted {}", path);
            } else {
                anyhow::bail!("Document not found: {}", path);
            }
        }
        Commands::Stats => {
            print_report(&service.stats().await, db_path);
        }
        Commands::Health => {
            let report = service.health().await;
            println!("Status:    {}", report.status);
            println!(
                "Provider:  {} ({})",
                report.provider_url,
                if report.provider_reachable {
                    "reachable"
                } else {
                    "unreachable"
                }
            );
            println!(
                "Model:     {} ({})",
                report.model,
                if report.model_available {
                    "available"
                } else {
                    "not found"
                }
            );
            println!("Chunks:    {}", report.documents);
            if !report.provider_reachable {
                anyhow::bail!("Embedding provider is not reachable");
            }
        }
        Commands::Serve => {
            run_server(service).await?;
        }
    }
    Ok(())
}
