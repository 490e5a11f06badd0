//! Per-seed BFS state machine.
//!
//! Single-threaded within its exploration task. The frontier, the visited
//! set and the completed paths are task-local arenas whose lifetime is the
//! exploration.

use engram_core::model::{
    ExpansionCandidate, FrontierInput, FrontierNode, FrontierUpdate, GraphNode, GraphPath,
    GraphStep, RetrievalResult, SeedInput, TerminatedReason,
};
use std::collections::{HashMap, HashSet};

/// Drives one multi-path exploration from a single resolved seed.
pub struct GraphTraversalState {
    seed: SeedInput,
    seed_node: GraphNode,
    max_branches: usize,
    frontier: Vec<FrontierNode>,
    visited: HashSet<String>,
    completed_paths: Vec<GraphPath>,
}

impl GraphTraversalState {
    pub fn new(seed: SeedInput, seed_node: GraphNode, max_branches: usize) -> Self {
        let frontier = vec![FrontierNode {
            node_id: seed.node_id.clone(),
            activation: seed.score,
            path: GraphPath::empty(),
        }];
        let visited = HashSet::from([seed.node_id.clone()]);
        Self {
            seed,
            seed_node,
            max_branches,
            frontier,
            visited,
            completed_paths: Vec::new(),
        }
    }

    pub fn is_active(&self) -> bool {
        !self.frontier.is_empty()
    }

    pub fn frontier(&self) -> &[FrontierNode] {
        &self.frontier
    }

    /// Replaces the frontier wholesale; the entry point for resuming from a
    /// hand-built state.
    pub fn set_frontier(&mut self, frontier: Vec<FrontierNode>) {
        self.frontier = frontier;
    }

    /// The `(node_id, activation)` pairs shipped to the expansion query.
    pub fn frontier_inputs(&self) -> Vec<FrontierInput> {
        self.frontier
            .iter()
            .map(|frontier_node| FrontierInput {
                node_id: frontier_node.node_id.clone(),
                activation: frontier_node.activation,
            })
            .collect()
    }

    pub fn visited(&self) -> &HashSet<String> {
        &self.visited
    }

    /// One depth iteration over adapter-ordered candidates.
    ///
    /// Frontier entries are honored in frontier order; within a parent the
    /// adapter's energy-descending order decides which branches fill the cap.
    /// A neighbor claimed by an earlier entry at this depth is skipped (the
    /// skip does not consume a branch slot). A frontier entry that accepts no
    /// branch completes its path, unless the path is still empty.
    pub fn select_next_frontier(&self, candidates: &[ExpansionCandidate]) -> FrontierUpdate {
        let mut by_parent: HashMap<&str, Vec<&ExpansionCandidate>> = HashMap::new();
        for candidate in candidates {
            by_parent
                .entry(candidate.parent_id.as_str())
                .or_default()
                .push(candidate);
        }

        let mut update = FrontierUpdate::default();
        for frontier_node in &self.frontier {
            let parent_candidates = by_parent
                .get(frontier_node.node_id.as_str())
                .map(Vec::as_slice)
                .unwrap_or(&[]);

            let mut branch_count = 0;
            for candidate in parent_candidates {
                if branch_count >= self.max_branches {
                    break;
                }
                let neighbor_id = candidate.neighbor_node.id.as_str();
                if update.newly_visited.contains(neighbor_id) {
                    continue;
                }
                branch_count += 1;
                update.newly_visited.insert(neighbor_id.to_string());

                let from_node = frontier_node
                    .path
                    .steps
                    .last()
                    .map(|step| step.to_node.clone())
                    .unwrap_or_else(|| self.seed_node.clone());
                let step = GraphStep {
                    from_node,
                    edge: candidate.edge.clone(),
                    to_node: candidate.neighbor_node.clone(),
                    transfer_energy: candidate.transfer_energy,
                };
                update.next_frontier.push(FrontierNode {
                    node_id: candidate.neighbor_node.id.clone(),
                    activation: candidate.transfer_energy,
                    path: frontier_node.path.with_step(step),
                });
            }

            if branch_count == 0 && !frontier_node.path.is_empty() {
                update.completed_paths.push(frontier_node.path.clone());
            }
        }
        update
    }

    pub fn apply(&mut self, update: FrontierUpdate) {
        self.visited.extend(update.newly_visited);
        self.frontier = update.next_frontier;
        self.completed_paths.extend(update.completed_paths);
    }

    /// Depth-cap flush: every remaining frontier node with a non-empty path
    /// is complete.
    pub fn finalize_remaining(&mut self) {
        let remaining = std::mem::take(&mut self.frontier);
        self.completed_paths.extend(
            remaining
                .into_iter()
                .filter(|frontier_node| !frontier_node.path.is_empty())
                .map(|frontier_node| frontier_node.path),
        );
    }

    pub fn completed_paths(&self) -> &[GraphPath] {
        &self.completed_paths
    }

    pub fn into_result(self) -> RetrievalResult {
        let max_depth_reached = self
            .completed_paths
            .iter()
            .map(GraphPath::depth)
            .max()
            .unwrap_or(0);
        RetrievalResult {
            seed: self.seed,
            seed_node: Some(self.seed_node),
            paths: self.completed_paths,
            max_depth_reached,
            terminated_reason: TerminatedReason::Complete,
        }
    }
}
