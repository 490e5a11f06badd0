//! Owned value types for the memory graph.
//!
//! Records coming back from the graph store are normalized into these types at
//! the adapter boundary; the traversal state machine and the projections work
//! on them exclusively and never hold driver-side references.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Property bag of a node or relationship, as decoded from the store.
pub type Properties = Map<String, Value>;

/// The only relationship type in the current memory graph model.
pub const RELATES_TYPE: &str = "RELATES";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: String,
    pub labels: Vec<String>,
    #[serde(default)]
    pub properties: Properties,
}

impl GraphNode {
    pub fn new(id: impl Into<String>, labels: Vec<String>) -> Self {
        Self {
            id: id.into(),
            labels,
            properties: Properties::new(),
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// First label, or `"Node"` for an unlabelled node.
    pub fn primary_label(&self) -> &str {
        self.labels.first().map(String::as_str).unwrap_or("Node")
    }

    pub fn text(&self) -> Option<&str> {
        self.properties.get("text").and_then(Value::as_str)
    }
}

/// An undirectedly-traversable `RELATES` relationship.
///
/// `source_id`/`target_id` keep the stored direction; the expansion rule
/// matches the edge from either endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphEdge {
    pub source_id: String,
    pub target_id: String,
    pub rel_type: String,
    #[serde(default)]
    pub edge_id: Option<String>,
    #[serde(default)]
    pub weight: Option<f64>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub properties: Properties,
}

impl GraphEdge {
    pub fn relates(source_id: impl Into<String>, target_id: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            target_id: target_id.into(),
            rel_type: RELATES_TYPE.to_string(),
            edge_id: None,
            weight: None,
            tags: Vec::new(),
            properties: Properties::new(),
        }
    }

    pub fn with_edge_id(mut self, edge_id: impl Into<String>) -> Self {
        self.edge_id = Some(edge_id.into());
        self
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = Some(weight);
        self
    }

    pub fn with_tags(mut self, tags: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Stored weight, or the model default for weightless edges.
    pub fn effective_weight(&self) -> f64 {
        self.weight.unwrap_or(crate::scoring::DEFAULT_EDGE_WEIGHT)
    }

    pub fn text(&self) -> Option<&str> {
        self.properties.get("text").and_then(Value::as_str)
    }
}

/// Seed produced by hybrid vector search: starting node id plus its fused
/// similarity score, which becomes the initial activation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeedInput {
    pub node_id: String,
    pub score: f64,
}

impl SeedInput {
    pub fn new(node_id: impl Into<String>, score: f64) -> Self {
        Self {
            node_id: node_id.into(),
            score,
        }
    }
}

/// One hop: the edge traversed and the node reached, with the transfer energy
/// computed for the hop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphStep {
    pub from_node: GraphNode,
    pub edge: GraphEdge,
    pub to_node: GraphNode,
    pub transfer_energy: f64,
}

/// A complete path from the seed outward.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GraphPath {
    pub steps: Vec<GraphStep>,
}

impl GraphPath {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Returns a new path extended by one step; the receiver is untouched so
    /// sibling branches can keep extending the same prefix.
    pub fn with_step(&self, step: GraphStep) -> Self {
        let mut steps = self.steps.clone();
        steps.push(step);
        Self { steps }
    }

    pub fn depth(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Node ids along the path, seed first.
    pub fn node_ids<'a>(&'a self, seed_id: &'a str) -> Vec<&'a str> {
        let mut ids = Vec::with_capacity(self.steps.len() + 1);
        ids.push(seed_id);
        ids.extend(self.steps.iter().map(|step| step.to_node.id.as_str()));
        ids
    }

    /// Transfer energy at the last hop (the lowest along the path under
    /// monotone decay).
    pub fn final_energy(&self) -> Option<f64> {
        self.steps.last().map(|step| step.transfer_energy)
    }
}

/// One active branch during BFS expansion.
#[derive(Debug, Clone, PartialEq)]
pub struct FrontierNode {
    pub node_id: String,
    pub activation: f64,
    pub path: GraphPath,
}

/// The `(node_id, activation)` pair shipped to the expansion query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrontierInput {
    pub node_id: String,
    pub activation: f64,
}

/// Candidate hop emitted by the expansion query, already above the activation
/// threshold and ordered parent-ascending / energy-descending.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpansionCandidate {
    pub parent_id: String,
    pub neighbor_node: GraphNode,
    pub edge: GraphEdge,
    pub transfer_energy: f64,
}

/// Outcome of one frontier-selection step.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FrontierUpdate {
    pub next_frontier: Vec<FrontierNode>,
    pub completed_paths: Vec<GraphPath>,
    pub newly_visited: std::collections::HashSet<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminatedReason {
    Complete,
    SeedNotFound,
}

/// Final output of one exploration, per seed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalResult {
    pub seed: SeedInput,
    pub seed_node: Option<GraphNode>,
    pub paths: Vec<GraphPath>,
    pub max_depth_reached: usize,
    pub terminated_reason: TerminatedReason,
}

impl RetrievalResult {
    /// The non-error outcome for a seed id that is absent from the graph.
    pub fn seed_not_found(seed: SeedInput) -> Self {
        Self {
            seed,
            seed_node: None,
            paths: Vec::new(),
            max_depth_reached: 0,
            terminated_reason: TerminatedReason::SeedNotFound,
        }
    }
}
