//! In-memory store implementations.
//!
//! `MemoryGraphStore` evaluates the expansion contract in-process through the
//! scoring kernel and `MemoryVectorSearcher` fuses recorded per-leg scores
//! with the ranker. They make the whole pipeline runnable without external
//! services and back the end-to-end test fixtures.

use crate::error::StoreError;
use crate::graph::{ExpandOptions, GraphStore, GraphTx};
use crate::vector::{HybridSearchRequest, VectorHit, VectorSearcher};
use async_trait::async_trait;
use engram_core::model::{
    ExpansionCandidate, FrontierInput, GraphEdge, GraphNode, RELATES_TYPE,
};
use engram_core::scoring;
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

#[derive(Debug, Default, Clone)]
pub struct MemoryGraph {
    nodes: HashMap<String, GraphNode>,
    edges: Vec<GraphEdge>,
}

impl MemoryGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_node(&mut self, node: GraphNode) {
        self.nodes.insert(node.id.clone(), node);
    }

    pub fn insert_edge(&mut self, edge: GraphEdge) {
        self.edges.push(edge);
    }

    pub fn into_store(self) -> MemoryGraphStore {
        MemoryGraphStore {
            data: Arc::new(self),
        }
    }

    /// Undirected `RELATES` degree.
    fn degree(&self, node_id: &str) -> usize {
        self.edges
            .iter()
            .filter(|edge| edge.rel_type == RELATES_TYPE)
            .filter(|edge| edge.source_id == node_id || edge.target_id == node_id)
            .count()
    }

    fn expand(
        &self,
        frontier: &[FrontierInput],
        visited_ids: &HashSet<String>,
        options: &ExpandOptions<'_>,
    ) -> Vec<ExpansionCandidate> {
        let mut candidates = Vec::new();
        for input in frontier {
            let degree = self.degree(&input.node_id);
            if degree == 0 {
                continue;
            }
            for edge in &self.edges {
                if edge.rel_type != RELATES_TYPE {
                    continue;
                }
                let neighbor_id = if edge.source_id == input.node_id {
                    &edge.target_id
                } else if edge.target_id == input.node_id {
                    &edge.source_id
                } else {
                    continue;
                };
                if visited_ids.contains(neighbor_id) {
                    continue;
                }
                let Some(neighbor) = self.nodes.get(neighbor_id) else {
                    continue;
                };

                let tag_sim =
                    scoring::tag_similarity(&edge.tags, options.query_tags, options.tag_sim_floor);
                let transfer_energy =
                    scoring::transfer_energy(input.activation, edge.weight, degree, tag_sim);
                if transfer_energy > options.min_activation {
                    candidates.push(ExpansionCandidate {
                        parent_id: input.node_id.clone(),
                        neighbor_node: neighbor.clone(),
                        edge: edge.clone(),
                        transfer_energy,
                    });
                }
            }
        }

        candidates.sort_by(|a, b| {
            a.parent_id.cmp(&b.parent_id).then_with(|| {
                b.transfer_energy
                    .partial_cmp(&a.transfer_energy)
                    .unwrap_or(Ordering::Equal)
            })
        });
        candidates
    }
}

/// Shareable read-only handle over a [`MemoryGraph`].
#[derive(Debug, Clone)]
pub struct MemoryGraphStore {
    data: Arc<MemoryGraph>,
}

#[async_trait]
impl GraphStore for MemoryGraphStore {
    async fn begin_read(&self) -> Result<Box<dyn GraphTx>, StoreError> {
        Ok(Box::new(MemoryGraphTx {
            data: Arc::clone(&self.data),
        }))
    }
}

struct MemoryGraphTx {
    data: Arc<MemoryGraph>,
}

#[async_trait]
impl GraphTx for MemoryGraphTx {
    async fn fetch_seed(&mut self, node_id: &str) -> Result<Option<GraphNode>, StoreError> {
        Ok(self.data.nodes.get(node_id).cloned())
    }

    async fn expand_frontier(
        &mut self,
        frontier: &[FrontierInput],
        visited_ids: &HashSet<String>,
        options: &ExpandOptions<'_>,
    ) -> Result<Vec<ExpansionCandidate>, StoreError> {
        Ok(self.data.expand(frontier, visited_ids, options))
    }

    async fn finish(self: Box<Self>) -> Result<(), StoreError> {
        Ok(())
    }
}

/// One recorded entry of the embedding collection: per-leg scores a query
/// would observe, plus the node pointer (absent for malformed entries).
#[derive(Debug, Clone)]
pub struct MemoryVectorEntry {
    pub node_id: Option<String>,
    pub bm25_score: f32,
    pub dense_score: f32,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryVectorSearcher {
    entries: Vec<MemoryVectorEntry>,
}

impl MemoryVectorSearcher {
    pub fn new(entries: Vec<MemoryVectorEntry>) -> Self {
        Self { entries }
    }
}

#[async_trait]
impl VectorSearcher for MemoryVectorSearcher {
    async fn hybrid_search(
        &self,
        request: &HybridSearchRequest<'_>,
    ) -> Result<Vec<VectorHit>, StoreError> {
        let mut hits: Vec<VectorHit> = self
            .entries
            .iter()
            .filter_map(|entry| {
                entry.node_id.as_ref().map(|node_id| VectorHit {
                    node_id: node_id.clone(),
                    score: request.ranker.fuse(entry.bm25_score, entry.dense_score),
                })
            })
            .collect();
        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
        hits.truncate(request.limit);
        Ok(hits)
    }
}
