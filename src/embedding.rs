//! Embedding provider abstraction and the Ollama client.
//!
//! Defines the [`EmbeddingProvider`] trait and [`OllamaClient`], which talks
//! to a local Ollama server:
//!
//! | Call | Endpoint | Result |
//! |------|----------|--------|
//! | [`embed`](EmbeddingProvider::embed) | `POST /api/embeddings` | one vector, or empty on failure |
//! | [`is_healthy`](EmbeddingProvider::is_healthy) | `GET /api/tags` | `true` on 2xx |
//! | [`has_model`](EmbeddingProvider::has_model) | `GET /api/tags` | whether the model is pulled |
//!
//! Embedding failures never raise. A failed call logs and yields an empty
//! vector, and callers treat an empty vector as "embedding unavailable".
//! There are no retries.
//!
//! Also provides the vector helpers used by the stores:
//! - [`cosine_similarity`] and [`cosine_distance`]
//! - [`vec_to_blob`] / [`blob_to_vec`] for little-endian `f32` BLOB storage

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, error, warn};

use crate::config::EmbeddingConfig;

/// A source of embedding vectors.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// The model identifier sent with every request.
    fn model_name(&self) -> &str;

    /// Embed one text. Returns an empty vector on any failure.
    async fn embed(&self, text: &str) -> Vec<f32>;

    /// Embed several texts, positionally aligned with the input. Each text
    /// is an independent call; a failure leaves an empty vector in its slot.
    async fn embed_many(&self, texts: &[String]) -> Vec<Vec<f32>> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await);
        }
        out
    }

    /// Whether the provider answers at all.
    async fn is_healthy(&self) -> bool;

    /// Whether the configured model is available on the provider.
    async fn has_model(&self) -> bool;
}

/// HTTP client for an Ollama server.
///
/// The underlying `reqwest::Client` holds the connection pool. It is built
/// once here and released when the client is dropped.
pub struct OllamaClient {
    http: reqwest::Client,
    base_url: String,
    model: String,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    embedding: Option<Vec<f32>>,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<ModelTag>,
}

#[derive(Debug, Deserialize)]
struct ModelTag {
    name: String,
}

impl OllamaClient {
    pub fn new(config: &EmbeddingConfig) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            http,
            base_url: config.url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn list_models(&self) -> Option<Vec<String>> {
        let url = format!("{}/api/tags", self.base_url);
        let resp = match self.http.get(&url).send().await {
            Ok(r) => r,
            Err(e) => {
                warn!(url = %url, error = %e, "failed to list models");
                return None;
            }
        };
        if !resp.status().is_success() {
            warn!(url = %url, status = %resp.status(), "model listing returned an error status");
            return None;
        }
        match resp.text().await {
            Ok(body) => parse_model_names(&body),
            Err(e) => {
                warn!(url = %url, error = %e, "failed to read model listing");
                None
            }
        }
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaClient {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn embed(&self, text: &str) -> Vec<f32> {
        let url = format!("{}/api/embeddings", self.base_url);
        let body = serde_json::json!({
            "model": self.model,
            "prompt": text,
        });

        let resp = match self.http.post(&url).json(&body).send().await {
            Ok(r) => r,
            Err(e) => {
                error!(url = %url, error = %e, "embedding request failed");
                return Vec::new();
            }
        };

        let status = resp.status();
        if !status.is_success() {
            let detail = resp.text().await.unwrap_or_default();
            error!(url = %url, status = %status, body = %detail, "embedding request rejected");
            return Vec::new();
        }

        match resp.text().await {
            Ok(body) => match parse_embedding(&body) {
                Some(v) => {
                    debug!(dims = v.len(), chars = text.chars().count(), "embedded text");
                    v
                }
                None => {
                    warn!(url = %url, "embedding response had no usable 'embedding' field");
                    Vec::new()
                }
            },
            Err(e) => {
                error!(url = %url, error = %e, "failed to read embedding response");
                Vec::new()
            }
        }
    }

    async fn is_healthy(&self) -> bool {
        let url = format!("{}/api/tags", self.base_url);
        match self.http.get(&url).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                debug!(url = %url, error = %e, "health check failed");
                false
            }
        }
    }

    async fn has_model(&self) -> bool {
        match self.list_models().await {
            Some(names) => model_listed(&self.model, &names),
            None => false,
        }
    }
}

/// Extract the vector from an `/api/embeddings` response body.
/// Missing, null, or malformed bodies yield `None`.
fn parse_embedding(body: &str) -> Option<Vec<f32>> {
    serde_json::from_str::<EmbeddingResponse>(body)
        .ok()
        .and_then(|r| r.embedding)
}

fn parse_model_names(body: &str) -> Option<Vec<String>> {
    serde_json::from_str::<TagsResponse>(body)
        .ok()
        .map(|r| r.models.into_iter().map(|m| m.name).collect())
}

/// Ollama reports untagged pulls as `name:latest`, so an untagged
/// configured model also matches its `:latest` listing.
fn model_listed(model: &str, names: &[String]) -> bool {
    names.iter().any(|name| {
        name == model || (!model.contains(':') && *name == format!("{}:latest", model))
    })
}

// ============ Vector utilities ============

/// Encode a float vector as little-endian bytes for a SQLite BLOB.
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode a BLOB written by [`vec_to_blob`]. Trailing bytes that do not
/// form a whole `f32` are ignored.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Cosine similarity in `[-1.0, 1.0]`.
///
/// Returns `0.0` for empty vectors, vectors of different lengths, or a
/// zero-norm vector.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}

/// Cosine distance: `1 - cosine_similarity`, in `[0.0, 2.0]`.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    1.0 - cosine_similarity(a, b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_embedding() {
        let v = parse_embedding(r#"{"embedding": [0.5, -1.0, 2.0]}"#).unwrap();
        assert_eq!(v, vec![0.5, -1.0, 2.0]);
    }

    #[test]
    fn test_parse_embedding_missing_field() {
        assert!(parse_embedding(r#"{"error": "model not found"}"#).is_none());
        assert!(parse_embedding(r#"{"embedding": null}"#).is_none());
        assert!(parse_embedding("not json").is_none());
    }

    #[test]
    fn test_parse_model_names() {
        let body = r#"{"models":[{"name":"mxbai-embed-large:latest","size":1},{"name":"llama3:8b"}]}"#;
        let names = parse_model_names(body).unwrap();
        assert_eq!(names, vec!["mxbai-embed-large:latest", "llama3:8b"]);
        assert_eq!(parse_model_names("{}").unwrap(), Vec::<String>::new());
    }

    #[test]
    fn test_model_listed() {
        let names = vec!["mxbai-embed-large:latest".to_string()];
        assert!(model_listed("mxbai-embed-large:latest", &names));
        assert!(model_listed("mxbai-embed-large", &names));
        assert!(!model_listed("mxbai-embed-large:v2", &names));
        assert!(!model_listed("nomic-embed-text", &names));
    }

    #[test]
    fn test_blob_roundtrip() {
        let original = vec![1.0f32, -0.25, 3.5, 0.0];
        let blob = vec_to_blob(&original);
        assert_eq!(blob.len(), 16);
        assert_eq!(blob_to_vec(&blob), original);
    }

    #[test]
    fn test_cosine_similarity_identical() {
        let a = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&a, &a) - 1.0).abs() < 1e-6);
        assert!(cosine_distance(&a, &a).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_similarity_orthogonal() {
        let a = vec![1.0, 0.0];
        let b = vec![0.0, 1.0];
        assert!(cosine_similarity(&a, &b).abs() < 1e-6);
        assert!((cosine_distance(&a, &b) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_similarity_degenerate() {
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 2.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let cfg = EmbeddingConfig {
            url: "http://localhost:11434/".into(),
            ..EmbeddingConfig::default()
        };
        let client = OllamaClient::new(&cfg).unwrap();
        assert_eq!(client.base_url(), "http://localhost:11434");
        assert_eq!(client.model_name(), "mxbai-embed-large:latest");
    }
}
