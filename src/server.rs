//! HTTP API server.
//!
//! Exposes search, reindexing, statistics and document management as a JSON
//! API, plus the agent tool registry over plain HTTP and over MCP.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`    | `/` | service name and version |
//! | `GET`    | `/health` | provider reachability, model availability, chunk count |
//! | `POST`   | `/search` | `{ "query": "...", "limit": 10 }` |
//! | `POST`   | `/reindex` | run the pipeline now |
//! | `GET`    | `/stats` | vault, collection and settings |
//! | `GET`    | `/documents/{*path}` | all chunks of one note |
//! | `DELETE` | `/documents/{*path}` | remove a note or chunk from the index |
//! | `GET`    | `/tools/list` | registered tools with schemas |
//! | `POST`   | `/tools/{name}` | call a tool |
//! | any      | `/mcp` | MCP Streamable HTTP endpoint |
//!
//! Document paths may be absolute or relative to the vault root.
//!
//! # Error contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "query must not be empty" } }
//! ```
//!
//! | Code | Status |
//! |------|--------|
//! | `bad_request` | 400 |
//! | `not_found` | 404 |
//! | `run_in_progress` | 409 |
//! | `provider_unavailable` | 503 |
//! | `internal` | 500 |
//!
//! While serving, the vault is reindexed every `indexing.interval_minutes`
//! (see [`crate::scheduler`]). Ctrl-C shuts down gracefully.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::watch;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

use crate::error::{IndexError, SearchError, StoreError};
use crate::models::DocumentView;
use crate::mcp::{mcp_service, McpBridge};
use crate::scheduler::spawn_periodic_reindex;
use crate::search::to_scored;
use crate::service::{HealthReport, VaultSearch};
use crate::stats::StatsReport;
use crate::tools::{ToolContext, ToolError, ToolInfo, ToolRegistry};

#[derive(Clone)]
struct AppState {
    service: Arc<VaultSearch>,
    tools: Arc<ToolRegistry>,
}

/// Build the application router around a shared service.
pub fn router(service: Arc<VaultSearch>) -> Router {
    let tools = Arc::new(ToolRegistry::with_builtins());
    let bridge = McpBridge::new(service.clone(), tools.clone());

    let state = AppState { service, tools };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(handle_root))
        .route("/health", get(handle_health))
        .route("/search", post(handle_search))
        .route("/reindex", post(handle_reindex))
        .route("/stats", get(handle_stats))
        .route(
            "/documents/{*path}",
            get(handle_get_document).delete(handle_delete_document),
        )
        .route("/tools/list", get(handle_list_tools))
        .route("/tools/{name}", post(handle_tool_call))
        .nest_service("/mcp", mcp_service(bridge))
        .layer(cors)
        .with_state(state)
}

/// Bind, serve until Ctrl-C, run the periodic reindexer alongside, then
/// release the store.
pub async fn run_server(service: Arc<VaultSearch>) -> anyhow::Result<()> {
    let bind_addr = service.config().server.bind.clone();
    let period = Duration::from_secs(service.config().indexing.interval_minutes * 60);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let scheduler = spawn_periodic_reindex(service.clone(), period, shutdown_rx);

    let app = router(service.clone());
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", bind_addr))?;

    info!(addr = %bind_addr, "vault search listening");
    println!("Vault search listening on http://{}", bind_addr);
    println!("  MCP endpoint: http://{}/mcp", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "failed to listen for shutdown signal");
            }
            info!("shutdown requested");
        })
        .await?;

    let _ = shutdown_tx.send(true);
    if let Err(e) = scheduler.await {
        error!(error = %e, "scheduler task ended abnormally");
    }
    service.shutdown().await;
    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code.to_string(),
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn app_error(status: StatusCode, code: &'static str, message: impl Into<String>) -> AppError {
    AppError {
        status,
        code,
        message: message.into(),
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    app_error(StatusCode::BAD_REQUEST, "bad_request", message)
}

fn not_found(message: impl Into<String>) -> AppError {
    app_error(StatusCode::NOT_FOUND, "not_found", message)
}

fn internal(message: impl Into<String>) -> AppError {
    app_error(StatusCode::INTERNAL_SERVER_ERROR, "internal", message)
}

impl From<SearchError> for AppError {
    fn from(e: SearchError) -> Self {
        match e {
            SearchError::EmptyQuery | SearchError::InvalidLimit => bad_request(e.to_string()),
            SearchError::EmbeddingUnavailable => app_error(
                StatusCode::SERVICE_UNAVAILABLE,
                "provider_unavailable",
                e.to_string(),
            ),
        }
    }
}

impl From<IndexError> for AppError {
    fn from(e: IndexError) -> Self {
        match e {
            IndexError::RunInProgress => {
                app_error(StatusCode::CONFLICT, "run_in_progress", e.to_string())
            }
            IndexError::ProviderUnavailable { .. } => app_error(
                StatusCode::SERVICE_UNAVAILABLE,
                "provider_unavailable",
                e.to_string(),
            ),
            other => internal(other.to_string()),
        }
    }
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        internal(e.to_string())
    }
}

impl From<ToolError> for AppError {
    fn from(e: ToolError) -> Self {
        match e {
            ToolError::InvalidParams(_) => bad_request(e.to_string()),
            ToolError::NotFound(msg) => not_found(msg),
            ToolError::Search(e) => e.into(),
            ToolError::Index(e) => e.into(),
            ToolError::Store(e) => e.into(),
        }
    }
}

// ============ GET / ============

async fn handle_root() -> Json<Value> {
    Json(json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": ["/health", "/search", "/reindex", "/stats", "/documents/{path}", "/tools/list", "/mcp"],
    }))
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    #[serde(flatten)]
    report: HealthReport,
    version: &'static str,
}

async fn handle_health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        report: state.service.health().await,
        version: env!("CARGO_PKG_VERSION"),
    })
}

// ============ POST /search ============

#[derive(Deserialize)]
struct SearchRequest {
    query: String,
    #[serde(default = "default_limit")]
    limit: usize,
}

fn default_limit() -> usize {
    10
}

async fn handle_search(
    State(state): State<AppState>,
    Json(req): Json<SearchRequest>,
) -> Result<Json<Value>, AppError> {
    let hits = to_scored(state.service.search(&req.query, req.limit).await?);
    Ok(Json(json!({
        "query": req.query,
        "count": hits.len(),
        "results": hits,
    })))
}

// ============ POST /reindex ============

async fn handle_reindex(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    let result = state.service.reindex().await?;
    Ok(Json(json!({ "status": "completed", "result": result })))
}

// ============ GET /stats ============

async fn handle_stats(State(state): State<AppState>) -> Json<StatsReport> {
    Json(state.service.stats().await)
}

// ============ /documents/{*path} ============

async fn handle_get_document(
    State(state): State<AppState>,
    Path(path): Path<String>,
) -> Result<Json<DocumentView>, AppError> {
    match state.service.document(&path).await? {
        Some(doc) => Ok(Json(doc)),
        None => Err(not_found(format!("document not found: {}", path))),
    }
}

async fn handle_delete_document(
    State(state): State<AppState>,
    Path(path): Path<String>,
) -> Result<Json<Value>, AppError> {
    if state.service.delete_document(&path).await? {
        Ok(Json(json!({ "path": path, "deleted": true })))
    } else {
        Err(not_found(format!("document not found: {}", path)))
    }
}

// ============ GET /tools/list ============

#[derive(Serialize)]
struct ToolListResponse {
    tools: Vec<ToolInfo>,
}

async fn handle_list_tools(State(state): State<AppState>) -> Json<ToolListResponse> {
    Json(ToolListResponse {
        tools: state.tools.infos(),
    })
}

// ============ POST /tools/{name} ============

async fn handle_tool_call(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(params): Json<Value>,
) -> Result<Json<Value>, AppError> {
    let tool = state
        .tools
        .find(&name)
        .ok_or_else(|| not_found(format!("no tool registered with name: {}", name)))?;

    let ctx = ToolContext::new(state.service.clone());
    let result = tool.execute(params, &ctx).await?;

    Ok(Json(json!({ "result": result })))
}
