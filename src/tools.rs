//! Agent tools.
//!
//! Every capability an AI agent can call is a [`Tool`] in a
//! [`ToolRegistry`]. The same registry backs both `POST /tools/{name}` on
//! the HTTP API and `tools/call` on the MCP endpoint, so the two surfaces
//! cannot drift apart.
//!
//! | Tool | Parameters | Returns |
//! |------|------------|---------|
//! | `search_vault` | `query`, `limit` (1–50, default 10) | scored hits |
//! | `get_document_content` | `file_path` | every chunk of the note |
//! | `get_vault_statistics` | none | vault, collection and settings |
//! | `reindex_vault` | none | run counters |
//! | `delete_document` | `path` | whether anything was removed |

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;

use crate::error::{IndexError, SearchError, StoreError};
use crate::search::to_scored;
use crate::service::VaultSearch;

const DEFAULT_LIMIT: i64 = 10;
const MAX_LIMIT: i64 = 50;

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("invalid parameters: {0}")]
    InvalidParams(String),

    #[error("{0}")]
    NotFound(String),

    #[error(transparent)]
    Search(#[from] SearchError),

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON Schema for the tool's parameters object.
    fn parameters_schema(&self) -> Value;

    /// Whether calling the tool leaves the index untouched.
    fn is_read_only(&self) -> bool {
        true
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value, ToolError>;
}

/// What a tool gets to work with.
pub struct ToolContext {
    service: Arc<VaultSearch>,
}

impl ToolContext {
    pub fn new(service: Arc<VaultSearch>) -> Self {
        Self { service }
    }

    pub fn service(&self) -> &VaultSearch {
        &self.service
    }
}

/// Tool descriptor for `GET /tools/list`.
#[derive(Debug, Clone, Serialize)]
pub struct ToolInfo {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

fn required_str<'a>(params: &'a Value, key: &str) -> Result<&'a str, ToolError> {
    match params.get(key).and_then(Value::as_str) {
        Some(s) if !s.trim().is_empty() => Ok(s),
        _ => Err(ToolError::InvalidParams(format!(
            "'{}' is required and must be a non-empty string",
            key
        ))),
    }
}

fn to_value<T: Serialize>(value: &T) -> Result<Value, ToolError> {
    serde_json::to_value(value).map_err(|e| StoreError::Serialization(e).into())
}

// ============ search_vault ============

pub struct SearchVaultTool;

#[async_trait]
impl Tool for SearchVaultTool {
    fn name(&self) -> &str {
        "search_vault"
    }

    fn description(&self) -> &str {
        "Semantic search over the indexed notes. Returns the closest chunks with similarity scores."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": { "type": "string", "description": "Natural-language search query" },
                "limit": {
                    "type": "integer",
                    "description": "Maximum number of results",
                    "minimum": 1,
                    "maximum": MAX_LIMIT,
                    "default": DEFAULT_LIMIT
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value, ToolError> {
        let query = required_str(&params, "query")?;
        let limit = params
            .get("limit")
            .and_then(Value::as_i64)
            .unwrap_or(DEFAULT_LIMIT)
            .clamp(1, MAX_LIMIT) as usize;

        let hits = to_scored(ctx.service().search(query, limit).await?);
        Ok(json!({
            "query": query,
            "count": hits.len(),
            "results": hits,
        }))
    }
}

// ============ get_document_content ============

pub struct GetDocumentTool;

#[async_trait]
impl Tool for GetDocumentTool {
    fn name(&self) -> &str {
        "get_document_content"
    }

    fn description(&self) -> &str {
        "Fetch the full indexed content of one note. A '#n' chunk suffix is ignored."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "file_path": { "type": "string", "description": "Path of the note, as returned by search_vault" }
            },
            "required": ["file_path"]
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value, ToolError> {
        let path = required_str(&params, "file_path")?;
        match ctx.service().document(path).await? {
            Some(doc) => to_value(&doc),
            None => Err(ToolError::NotFound(format!("document not found: {}", path))),
        }
    }
}

// ============ get_vault_statistics ============

pub struct VaultStatisticsTool;

#[async_trait]
impl Tool for VaultStatisticsTool {
    fn name(&self) -> &str {
        "get_vault_statistics"
    }

    fn description(&self) -> &str {
        "Report how many notes the vault holds, how many chunks are indexed, and the active settings."
    }

    fn parameters_schema(&self) -> Value {
        json!({ "type": "object", "properties": {} })
    }

    async fn execute(&self, _params: Value, ctx: &ToolContext) -> Result<Value, ToolError> {
        to_value(&ctx.service().stats().await)
    }
}

// ============ reindex_vault ============

pub struct ReindexTool;

#[async_trait]
impl Tool for ReindexTool {
    fn is_read_only(&self) -> bool {
        false
    }

    fn name(&self) -> &str {
        "reindex_vault"
    }

    fn description(&self) -> &str {
        "Re-scan the vault and embed new or changed notes. Unchanged notes are skipped."
    }

    fn parameters_schema(&self) -> Value {
        json!({ "type": "object", "properties": {} })
    }

    async fn execute(&self, _params: Value, ctx: &ToolContext) -> Result<Value, ToolError> {
        let result = ctx.service().reindex().await?;
        to_value(&result)
    }
}

// ============ delete_document ============

pub struct DeleteDocumentTool;

#[async_trait]
impl Tool for DeleteDocumentTool {
    fn is_read_only(&self) -> bool {
        false
    }

    fn name(&self) -> &str {
        "delete_document"
    }

    fn description(&self) -> &str {
        "Remove a note (or a single '#n' chunk) from the index. The file on disk is untouched."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": { "type": "string", "description": "Note path or chunk logical path" }
            },
            "required": ["path"]
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value, ToolError> {
        let path = required_str(&params, "path")?;
        let deleted = ctx.service().delete_document(path).await?;
        Ok(json!({ "path": path, "deleted": deleted }))
    }
}

// ============ Registry ============

pub struct ToolRegistry {
    tools: Vec<Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self { tools: Vec::new() }
    }

    /// A registry holding every built-in tool.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(SearchVaultTool));
        registry.register(Box::new(GetDocumentTool));
        registry.register(Box::new(VaultStatisticsTool));
        registry.register(Box::new(ReindexTool));
        registry.register(Box::new(DeleteDocumentTool));
        registry
    }

    pub fn register(&mut self, tool: Box<dyn Tool>) {
        self.tools.push(tool);
    }

    pub fn tools(&self) -> &[Box<dyn Tool>] {
        &self.tools
    }

    pub fn find(&self, name: &str) -> Option<&dyn Tool> {
        self.tools
            .iter()
            .find(|t| t.name() == name)
            .map(|t| t.as_ref())
    }

    pub fn infos(&self) -> Vec<ToolInfo> {
        self.tools
            .iter()
            .map(|t| ToolInfo {
                name: t.name().to_string(),
                description: t.description().to_string(),
                parameters: t.parameters_schema(),
            })
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
