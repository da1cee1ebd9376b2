//! # Vault Search
//!
//! Semantic search over a folder of markdown notes.
//!
//! Notes are split into overlapping chunks, embedded by a local Ollama
//! model, and stored with their vectors in SQLite. Queries are embedded the
//! same way and answered by cosine distance.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────────────┐   ┌──────────────┐
//! │   Vault     │──▶│ Indexer          │──▶│ VectorStore  │
//! │  *.md files │   │ hash·chunk·embed │   │ SQLite BLOBs │
//! └─────────────┘   └────────┬─────────┘   └──────┬───────┘
//!                            │ Ollama             │
//!                            ▼                    ▼
//!                       ┌──────────┐   ┌──────────────────────┐
//!                       │ search   │◀──│ VaultSearch service  │
//!                       └──────────┘   └──┬────────┬────────┬─┘
//!                                         ▼        ▼        ▼
//!                                       CLI   HTTP API   MCP tools
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`error`] | Typed errors |
//! | [`embedding`] | Embedding provider trait, Ollama client, vector helpers |
//! | [`store`] | Vector store trait with SQLite and in-memory backends |
//! | [`db`] | SQLite connection |
//! | [`migrate`] | Schema creation |
//! | [`chunk`] | Overlapping text chunking |
//! | [`discover`] | Vault file discovery |
//! | [`indexer`] | The indexing pipeline |
//! | [`search`] | The query path |
//! | [`stats`] | Index statistics |
//! | [`service`] | Application facade shared by every surface |
//! | [`scheduler`] | Periodic reindexing |
//! | [`tools`] | Agent tool registry |
//! | [`mcp`] | MCP bridge |
//! | [`server`] | HTTP server |

pub mod chunk;
pub mod config;
pub mod db;
pub mod discover;
pub mod embedding;
pub mod error;
pub mod indexer;
pub mod mcp;
pub mod migrate;
pub mod models;
pub mod scheduler;
pub mod search;
pub mod server;
pub mod service;
pub mod stats;
pub mod store;
pub mod tools;
