//! Activation-energy scoring kernel.
//!
//! The graph store evaluates the same arithmetic inside the expansion query;
//! this in-process version must stay bit-identical to it (f64, operation
//! order as written) so test oracles hold across both.

/// Weight assumed for an edge that carries no `weight` property.
pub const DEFAULT_EDGE_WEIGHT: f64 = 0.01;

/// Floored Jaccard similarity between edge tags and query tags.
///
/// Degenerate cases: an untagged query matches everything (`1.0`); an
/// untagged edge under a tagged query scores exactly the floor.
pub fn tag_similarity(edge_tags: &[String], query_tags: &[String], tag_sim_floor: f64) -> f64 {
    if query_tags.is_empty() {
        return 1.0;
    }
    if edge_tags.is_empty() {
        return tag_sim_floor;
    }
    let inter_count = edge_tags
        .iter()
        .filter(|tag| query_tags.contains(tag))
        .count();
    let union_count = edge_tags.len() + query_tags.len() - inter_count;
    tag_sim_floor + (1.0 - tag_sim_floor) * inter_count as f64 / union_count as f64
}

/// Energy transferred over one hop.
///
/// `degree` is the undirected `RELATES` degree of the parent node; weightless
/// edges fall back to [`DEFAULT_EDGE_WEIGHT`].
pub fn transfer_energy(activation: f64, weight: Option<f64>, degree: usize, tag_sim: f64) -> f64 {
    (activation * weight.unwrap_or(DEFAULT_EDGE_WEIGHT) / (degree as f64).sqrt()) * tag_sim
}
