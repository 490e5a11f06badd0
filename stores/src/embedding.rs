//! Embedding provider contract and implementations.

use crate::error::StoreError;
use async_trait::async_trait;
use engram_core::config::EmbeddingConfig;
use engram_core::embedding::deterministic_embedding;
use serde_json::{json, Value};

/// Produces a fixed-dimension dense vector for a text query. Implementations
/// must be safe for concurrent use across exploration tasks.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, StoreError>;
}

/// Embedding client for an OpenAI-compatible `/v1/embeddings` endpoint.
#[derive(Debug, Clone)]
pub struct OpenAiEmbedder {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    dimensions: usize,
}

impl OpenAiEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            dimensions: config.dimensions,
        }
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, StoreError> {
        let response = self
            .client
            .post(format!("{}/v1/embeddings", self.endpoint))
            .bearer_auth(&self.api_key)
            .json(&json!({
                "model": self.model,
                "input": [text],
                "dimensions": self.dimensions,
            }))
            .send()
            .await?;

        let status = response.status();
        let body: Value = response.json().await?;
        if !status.is_success() {
            let message = body
                .pointer("/error/message")
                .and_then(Value::as_str)
                .unwrap_or("unknown failure");
            return Err(StoreError::Embedding(format!(
                "embedding request failed with {}: {}",
                status, message
            )));
        }
        decode_embedding(&body, self.dimensions)
    }
}

fn decode_embedding(body: &Value, dimensions: usize) -> Result<Vec<f32>, StoreError> {
    let values = body
        .pointer("/data/0/embedding")
        .and_then(Value::as_array)
        .ok_or_else(|| StoreError::Embedding("response carries no embedding".to_string()))?;

    let vector: Vec<f32> = values
        .iter()
        .filter_map(Value::as_f64)
        .map(|component| component as f32)
        .collect();
    if vector.len() != values.len() || vector.len() != dimensions {
        return Err(StoreError::Embedding(format!(
            "expected {} dimensions, got {}",
            dimensions,
            vector.len()
        )));
    }
    Ok(vector)
}

/// Deterministic offline provider; embeds via the hash-seeded vector from
/// `engram-core`. Used for fixtures and when no real provider is reachable.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    model_id: String,
    dimensions: usize,
}

impl HashEmbedder {
    pub fn new(model_id: impl Into<String>, dimensions: usize) -> Self {
        Self {
            model_id: model_id.into(),
            dimensions,
        }
    }
}

#[async_trait]
impl EmbeddingProvider for HashEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, StoreError> {
        Ok(deterministic_embedding(text, &self.model_id, self.dimensions))
    }
}
