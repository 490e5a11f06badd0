//! Hybrid seed retriever: composes the embedding provider and the vector
//! searcher into the ordered seed set that starts an exploration.

use crate::RetrieverError;
use engram_core::config::InvalidConfig;
use engram_core::model::SeedInput;
use std::sync::Arc;
use stores::{EmbeddingProvider, HybridSearchRequest, VectorSearcher, WeightedRanker};
use tracing::debug;

pub struct SeedRetriever {
    searcher: Arc<dyn VectorSearcher>,
    embedder: Arc<dyn EmbeddingProvider>,
    ranker: WeightedRanker,
    min_score: Option<f32>,
}

impl SeedRetriever {
    pub fn new(
        searcher: Arc<dyn VectorSearcher>,
        embedder: Arc<dyn EmbeddingProvider>,
        ranker: WeightedRanker,
    ) -> Result<Self, InvalidConfig> {
        ranker.validate()?;
        Ok(Self {
            searcher,
            embedder,
            ranker,
            min_score: None,
        })
    }

    /// Applies a minimum fused-score floor. Collections that do not configure
    /// one take every hit.
    pub fn with_min_score(mut self, min_score: f32) -> Self {
        self.min_score = Some(min_score);
        self
    }

    /// Runs hybrid search for `user_query` and returns at most `limit` seeds
    /// ordered by fused score descending.
    ///
    /// A blank query or a zero limit returns empty without calling any
    /// downstream service. `candidate_multiplier` oversamples each search leg
    /// (`candidate_k = max(limit, limit × multiplier)`) because reranking
    /// only considers the returned candidates, not the whole collection.
    pub async fn retrieve(
        &self,
        user_query: &str,
        limit: usize,
        candidate_multiplier: usize,
    ) -> Result<Vec<SeedInput>, RetrieverError> {
        if user_query.trim().is_empty() || limit == 0 {
            return Ok(Vec::new());
        }

        let candidate_k = limit.max(limit * candidate_multiplier.max(1));
        let dense_vector = self.embedder.embed(user_query).await?;

        let request = HybridSearchRequest {
            query_text: user_query,
            dense_vector: &dense_vector,
            candidate_k,
            limit,
            ranker: self.ranker,
            filter: None,
        };
        let hits = self.searcher.hybrid_search(&request).await?;

        let seeds: Vec<SeedInput> = hits
            .into_iter()
            .filter(|hit| self.min_score.map_or(true, |floor| hit.score >= floor))
            .map(|hit| SeedInput::new(hit.node_id, hit.score as f64))
            .collect();
        debug!(seeds = seeds.len(), "hybrid seed retrieval complete");
        Ok(seeds)
    }
}
