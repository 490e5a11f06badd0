//! Vector store adapter: hybrid BM25 + dense search over the embedding
//! collection, fused server-side with a weighted linear ranker.

use crate::error::StoreError;
use async_trait::async_trait;
use engram_core::config::{InvalidConfig, VectorConfig};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Entity field holding the graph node id a hit points at.
pub const NODE_POINTER_FIELD: &str = "pointer_to_node";

/// Fusion weights for the two search legs. BM25 first, dense second; the
/// order matches the request order shipped to the store.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeightedRanker {
    pub bm25_weight: f32,
    pub dense_weight: f32,
}

impl WeightedRanker {
    pub fn new(bm25_weight: f32, dense_weight: f32) -> Result<Self, InvalidConfig> {
        let ranker = Self {
            bm25_weight,
            dense_weight,
        };
        ranker.validate()?;
        Ok(ranker)
    }

    pub fn validate(&self) -> Result<(), InvalidConfig> {
        for (name, value) in [
            ("bm25_weight", self.bm25_weight),
            ("dense_weight", self.dense_weight),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(InvalidConfig::WeightOutOfRange { name, value });
            }
        }
        if self.bm25_weight == 0.0 && self.dense_weight == 0.0 {
            return Err(InvalidConfig::AllWeightsZero);
        }
        Ok(())
    }

    /// Linear fusion of the two per-leg scores.
    pub fn fuse(&self, bm25_score: f32, dense_score: f32) -> f32 {
        self.bm25_weight * bm25_score + self.dense_weight * dense_score
    }
}

/// One fused hit: the graph node it points at plus the fused score.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorHit {
    pub node_id: String,
    pub score: f32,
}

#[derive(Debug, Clone)]
pub struct HybridSearchRequest<'a> {
    pub query_text: &'a str,
    pub dense_vector: &'a [f32],
    /// Candidates requested per leg before fusion; reranking only considers
    /// these, so it should exceed `limit`.
    pub candidate_k: usize,
    pub limit: usize,
    pub ranker: WeightedRanker,
    pub filter: Option<&'a str>,
}

#[async_trait]
pub trait VectorSearcher: Send + Sync {
    async fn hybrid_search(
        &self,
        request: &HybridSearchRequest<'_>,
    ) -> Result<Vec<VectorHit>, StoreError>;
}

/// Hybrid search client over the Milvus REST API.
#[derive(Debug, Clone)]
pub struct MilvusHttpSearcher {
    client: reqwest::Client,
    endpoint: String,
    token: Option<String>,
    collection: String,
    sparse_field: String,
    dense_field: String,
}

impl MilvusHttpSearcher {
    pub fn new(config: &VectorConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            token: config.token.clone(),
            collection: config.collection.clone(),
            sparse_field: config.sparse_field.clone(),
            dense_field: config.dense_field.clone(),
        }
    }
}

#[async_trait]
impl VectorSearcher for MilvusHttpSearcher {
    async fn hybrid_search(
        &self,
        request: &HybridSearchRequest<'_>,
    ) -> Result<Vec<VectorHit>, StoreError> {
        let url = format!("{}/v2/vectordb/entities/advanced_search", self.endpoint);
        let body = build_search_body(
            &self.collection,
            &self.sparse_field,
            &self.dense_field,
            request,
        );

        let mut http_request = self.client.post(&url).json(&body);
        if let Some(token) = &self.token {
            http_request = http_request.bearer_auth(token);
        }
        let response: Value = http_request.send().await?.json().await?;
        decode_hits(&response)
    }
}

fn build_search_body(
    collection: &str,
    sparse_field: &str,
    dense_field: &str,
    request: &HybridSearchRequest<'_>,
) -> Value {
    let mut bm25_search = json!({
        "data": [request.query_text],
        "annsField": sparse_field,
        "limit": request.candidate_k,
    });
    let mut dense_search = json!({
        "data": [request.dense_vector],
        "annsField": dense_field,
        "metricType": "COSINE",
        "limit": request.candidate_k,
    });
    if let Some(filter) = request.filter {
        bm25_search["filter"] = json!(filter);
        dense_search["filter"] = json!(filter);
    }

    json!({
        "collectionName": collection,
        "search": [bm25_search, dense_search],
        "rerank": {
            "strategy": "weighted",
            "params": { "weights": [request.ranker.bm25_weight, request.ranker.dense_weight] }
        },
        "limit": request.limit,
        "outputFields": [NODE_POINTER_FIELD],
    })
}

fn decode_hits(body: &Value) -> Result<Vec<VectorHit>, StoreError> {
    let code = body.get("code").and_then(Value::as_i64).unwrap_or(0);
    if code != 0 {
        let message = body
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("unknown failure");
        return Err(StoreError::Rejected(format!(
            "vector store code {}: {}",
            code, message
        )));
    }

    let data = body
        .get("data")
        .and_then(Value::as_array)
        .ok_or_else(|| StoreError::Decode("hybrid search response carries no data".to_string()))?;

    let mut hits = Vec::with_capacity(data.len());
    for hit in data {
        let node_id = match hit.get(NODE_POINTER_FIELD).and_then(Value::as_str) {
            Some(node_id) if !node_id.is_empty() => node_id,
            _ => continue,
        };
        let score = hit
            .get("distance")
            .and_then(Value::as_f64)
            .ok_or_else(|| StoreError::Decode("hit carries no distance".to_string()))?;
        hits.push(VectorHit {
            node_id: node_id.to_string(),
            score: score as f32,
        });
    }
    Ok(hits)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ranker_rejects_out_of_range_weights() {
        assert!(matches!(
            WeightedRanker::new(1.2, 0.5),
            Err(InvalidConfig::WeightOutOfRange {
                name: "bm25_weight",
                ..
            })
        ));
        assert!(matches!(
            WeightedRanker::new(0.5, -0.1),
            Err(InvalidConfig::WeightOutOfRange {
                name: "dense_weight",
                ..
            })
        ));
    }

    #[test]
    fn ranker_rejects_all_zero_weights() {
        assert_eq!(
            WeightedRanker::new(0.0, 0.0),
            Err(InvalidConfig::AllWeightsZero)
        );
        assert!(WeightedRanker::new(0.0, 1.0).is_ok());
    }

    #[test]
    fn fuse_is_the_weighted_sum() {
        let ranker = WeightedRanker::new(0.3, 0.7).unwrap();
        assert!((ranker.fuse(1.0, 0.5) - 0.65).abs() < 1e-6);
    }

    #[test]
    fn search_body_requests_both_legs_with_shared_filter() {
        let ranker = WeightedRanker::new(0.4, 0.6).unwrap();
        let dense = vec![0.1_f32, 0.2, 0.3];
        let request = HybridSearchRequest {
            query_text: "stockout causes",
            dense_vector: &dense,
            candidate_k: 15,
            limit: 3,
            ranker,
            filter: Some("status == \"active\""),
        };
        let body = build_search_body("graphembeddings", "sparse_vector", "dense_vector", &request);

        assert_eq!(body["collectionName"], json!("graphembeddings"));
        assert_eq!(body["search"][0]["annsField"], json!("sparse_vector"));
        assert_eq!(body["search"][0]["data"], json!(["stockout causes"]));
        assert_eq!(body["search"][0]["limit"], json!(15));
        assert_eq!(body["search"][0]["filter"], json!("status == \"active\""));
        assert_eq!(body["search"][1]["annsField"], json!("dense_vector"));
        assert_eq!(body["search"][1]["metricType"], json!("COSINE"));
        assert_eq!(body["rerank"]["params"]["weights"], json!([0.4, 0.6]));
        assert_eq!(body["limit"], json!(3));
        assert_eq!(body["outputFields"], json!(["pointer_to_node"]));
    }

    #[test]
    fn hits_without_a_node_pointer_are_dropped() {
        let body = json!({
            "code": 0,
            "data": [
                { "pointer_to_node": "T3000", "distance": 0.91 },
                { "distance": 0.88 },
                { "pointer_to_node": "", "distance": 0.85 },
                { "pointer_to_node": "T4000", "distance": 0.62 },
            ]
        });
        let hits = decode_hits(&body).unwrap();
        assert_eq!(
            hits,
            vec![
                VectorHit {
                    node_id: "T3000".to_string(),
                    score: 0.91
                },
                VectorHit {
                    node_id: "T4000".to_string(),
                    score: 0.62
                },
            ]
        );
    }

    #[test]
    fn nonzero_code_surfaces_as_rejected() {
        let body = json!({ "code": 1100, "message": "collection not loaded" });
        assert!(matches!(
            decode_hits(&body),
            Err(StoreError::Rejected(message)) if message.contains("collection not loaded")
        ));
    }
}
