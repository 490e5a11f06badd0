//! Projections of a [`RetrievalResult`] for its three consumers: the
//! force-directed frontend, the LLM prompt builder, and the debug query
//! reconstructor. All three are pure; repeated application yields equal
//! output.

use engram_core::model::{GraphEdge, GraphNode, GraphPath, GraphStep, RetrievalResult};
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::collections::HashMap;

/// Node properties copied through to the flattened attribute objects when
/// present; `text` is handled separately (cleaned).
const NODE_PASSTHROUGH_FIELDS: [&str; 17] = [
    "conv_id",
    "status",
    "tags",
    "parameter_field",
    "analysis_types",
    "metrics",
    "doc_pointer",
    "source_type",
    "relevant_parts",
    "start_date",
    "end_date",
    "user_role",
    "user_id",
    "preference_type",
    "update_time",
    "ingestion_time",
    "created_time",
];

const NODE_TEXT_PREVIEW_WORDS: usize = 12;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct D3Graph {
    pub nodes: Vec<Map<String, Value>>,
    pub edges: Vec<Map<String, Value>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttributeSections {
    pub nodes: Vec<Map<String, Value>>,
    pub edges: Vec<Map<String, Value>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LlmContext {
    pub paths: Vec<String>,
    pub node_and_edge_attributes: AttributeSections,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DebugCypher {
    pub paths_combined: String,
    pub individual_paths: Vec<String>,
}

/// Force-directed layout input: one object per distinct node, one per
/// distinct `(source, target, type)` edge, energies aggregated by max.
pub fn to_d3(result: &RetrievalResult) -> D3Graph {
    let (nodes, edges) = collect(result);
    let seed_id = result.seed_node.as_ref().map(|node| node.id.as_str());
    D3Graph {
        nodes: nodes
            .iter()
            .map(|agg| flatten_node(agg, seed_id, true))
            .collect(),
        edges: edges
            .iter()
            .map(|agg| flatten_edge(agg, EdgeKeyStyle::Layout))
            .collect(),
    }
}

/// Prompt-context rendering: one string per path plus the flattened node and
/// edge attributes (layout fields replaced, `is_seed` omitted, edges without
/// an id dropped from the attribute section).
pub fn to_llm_context(result: &RetrievalResult) -> LlmContext {
    let (nodes, edges) = collect(result);
    let seed_id = result.seed_node.as_ref().map(|node| node.id.as_str());
    let paths = result
        .paths
        .iter()
        .enumerate()
        .map(|(index, path)| render_path(index + 1, path, result))
        .collect();

    LlmContext {
        paths,
        node_and_edge_attributes: AttributeSections {
            nodes: nodes
                .iter()
                .map(|agg| flatten_node(agg, seed_id, false))
                .collect(),
            edges: edges
                .iter()
                .filter(|agg| agg.edge.edge_id.is_some())
                .map(|agg| flatten_edge(agg, EdgeKeyStyle::Attributes))
                .collect(),
        },
    }
}

/// Reconstructs each path as an undirected Cypher pattern, one `MATCH … RETURN`
/// per path, combined with `UNION` so the client tool never evaluates a
/// Cartesian product of patterns.
pub fn to_debug_cypher(result: &RetrievalResult) -> DebugCypher {
    let seed_id = result
        .seed_node
        .as_ref()
        .map(|node| node.id.as_str())
        .unwrap_or(result.seed.node_id.as_str());

    let individual_paths: Vec<String> = result
        .paths
        .iter()
        .enumerate()
        .map(|(path_index, path)| {
            let pattern = path
                .node_ids(seed_id)
                .iter()
                .enumerate()
                .map(|(node_index, node_id)| {
                    format!(
                        "(n{}_{} {{id: '{}'}})",
                        path_index,
                        node_index,
                        escape_literal(node_id)
                    )
                })
                .collect::<Vec<_>>()
                .join("-[:RELATES]-");
            format!("MATCH p{} = {} RETURN p{}", path_index, pattern, path_index)
        })
        .collect();

    DebugCypher {
        paths_combined: individual_paths.join("\nUNION\n"),
        individual_paths,
    }
}

/// Replaces the literal escape sequences for en/em dash and curly quotes with
/// plain ASCII; everything else passes through unchanged.
pub(crate) fn clean_text(text: &str) -> String {
    text.replace("\\u2013", "-")
        .replace("\\u2014", "--")
        .replace("\\u2019", "'")
        .replace("\\u201c", "\"")
        .replace("\\u201d", "\"")
}

struct NodeAgg<'a> {
    node: &'a GraphNode,
    activation: f64,
}

struct EdgeAgg<'a> {
    edge: &'a GraphEdge,
    transfer_energy: f64,
}

/// Walks the result once, deduplicating nodes by id and edges by
/// `(source, target, type)` with max-aggregated energies, in discovery order
/// (seed first).
fn collect(result: &RetrievalResult) -> (Vec<NodeAgg<'_>>, Vec<EdgeAgg<'_>>) {
    let mut nodes: Vec<NodeAgg> = Vec::new();
    let mut node_index: HashMap<&str, usize> = HashMap::new();
    let mut edges: Vec<EdgeAgg> = Vec::new();
    let mut edge_index: HashMap<(&str, &str, &str), usize> = HashMap::new();

    if let Some(seed_node) = &result.seed_node {
        node_index.insert(seed_node.id.as_str(), nodes.len());
        nodes.push(NodeAgg {
            node: seed_node,
            activation: result.seed.score,
        });
    }

    for path in &result.paths {
        for step in &path.steps {
            for node in [&step.from_node, &step.to_node] {
                if !node_index.contains_key(node.id.as_str()) {
                    node_index.insert(node.id.as_str(), nodes.len());
                    nodes.push(NodeAgg {
                        node,
                        activation: 0.0,
                    });
                }
            }
            let to_index = node_index[step.to_node.id.as_str()];
            if step.transfer_energy > nodes[to_index].activation {
                nodes[to_index].activation = step.transfer_energy;
            }

            let key = (
                step.edge.source_id.as_str(),
                step.edge.target_id.as_str(),
                step.edge.rel_type.as_str(),
            );
            match edge_index.get(&key) {
                Some(&edge_position) => {
                    if step.transfer_energy > edges[edge_position].transfer_energy {
                        edges[edge_position].transfer_energy = step.transfer_energy;
                    }
                }
                None => {
                    edge_index.insert(key, edges.len());
                    edges.push(EdgeAgg {
                        edge: &step.edge,
                        transfer_energy: step.transfer_energy,
                    });
                }
            }
        }
    }

    (nodes, edges)
}

fn flatten_node(agg: &NodeAgg<'_>, seed_id: Option<&str>, include_is_seed: bool) -> Map<String, Value> {
    let mut out = Map::new();
    out.insert("id".to_string(), json!(agg.node.id));
    out.insert("label".to_string(), json!(agg.node.primary_label()));
    if include_is_seed {
        out.insert(
            "is_seed".to_string(),
            json!(seed_id == Some(agg.node.id.as_str())),
        );
    }
    out.insert("retrieval_activation".to_string(), json!(agg.activation));
    for field in NODE_PASSTHROUGH_FIELDS {
        if let Some(value) = agg.node.properties.get(field) {
            out.insert(field.to_string(), value.clone());
        }
    }
    if let Some(text) = agg.node.text() {
        out.insert("text".to_string(), json!(clean_text(text)));
    }
    out
}

enum EdgeKeyStyle {
    Layout,
    Attributes,
}

fn flatten_edge(agg: &EdgeAgg<'_>, style: EdgeKeyStyle) -> Map<String, Value> {
    let edge = agg.edge;
    let mut out = Map::new();
    match style {
        EdgeKeyStyle::Layout => {
            out.insert("source".to_string(), json!(edge.source_id));
            out.insert("target".to_string(), json!(edge.target_id));
        }
        EdgeKeyStyle::Attributes => {
            out.insert("source_node_id".to_string(), json!(edge.source_id));
            out.insert("target_node_id".to_string(), json!(edge.target_id));
        }
    }
    out.insert(
        "transfer_energy".to_string(),
        json!(round_to(agg.transfer_energy, 3)),
    );
    if let Some(edge_id) = &edge.edge_id {
        out.insert("edge_id".to_string(), json!(edge_id));
    }
    if let Some(weight) = edge.weight {
        out.insert("weight".to_string(), json!(round_to(weight, 2)));
    }
    if !edge.tags.is_empty() {
        out.insert("tags".to_string(), json!(edge.tags));
    }
    if let Some(created_time) = edge.properties.get("created_time") {
        out.insert("created_time".to_string(), created_time.clone());
    }
    if let Some(text) = edge.text() {
        out.insert("text".to_string(), json!(clean_text(text)));
    }
    out
}

fn render_path(index: usize, path: &GraphPath, result: &RetrievalResult) -> String {
    let mut out = format!("Path {}: [SEED] ", index);
    match &result.seed_node {
        Some(seed_node) => out.push_str(&render_node(seed_node)),
        None => out.push_str(&format!("(Node {})", result.seed.node_id)),
    }
    for step in &path.steps {
        out.push_str(" -");
        out.push_str(&render_edge_meta(step));
        out.push_str("- ");
        out.push_str(&render_node(&step.to_node));
    }
    out
}

fn render_node(node: &GraphNode) -> String {
    match node.text() {
        Some(text) => format!(
            "({} {}: \"{}\")",
            node.primary_label(),
            node.id,
            preview(&clean_text(text))
        ),
        None => format!("({} {})", node.primary_label(), node.id),
    }
}

/// First twelve words of the node text, `...`-terminated when longer. Edge
/// text is never truncated.
fn preview(text: &str) -> String {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.len() <= NODE_TEXT_PREVIEW_WORDS {
        text.to_string()
    } else {
        format!("{}...", words[..NODE_TEXT_PREVIEW_WORDS].join(" "))
    }
}

fn render_edge_meta(step: &GraphStep) -> String {
    let mut parts: Vec<String> = Vec::new();
    if let Some(edge_id) = &step.edge.edge_id {
        parts.push(edge_id.clone());
    }
    if let Some(text) = step.edge.text() {
        parts.push(format!("\"{}\"", clean_text(text)));
    }
    parts.push(format!("weight={:.3}", step.edge.effective_weight()));
    parts.push(format!("activation_score={:.3}", step.transfer_energy));
    format!("[{}]", parts.join(" "))
}

fn escape_literal(id: &str) -> String {
    id.replace('\\', "\\\\").replace('\'', "\\'")
}

fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}
