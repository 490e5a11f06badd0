//! Graph store adapter.
//!
//! Two read-only operations against the memory graph: seed lookup and
//! frontier expansion. The expansion query computes the activation arithmetic
//! server-side; [`engram_core::scoring`] is the in-process mirror of it and
//! the two must agree bit-for-bit.

use crate::error::StoreError;
use async_trait::async_trait;
use engram_core::config::GraphConfig;
use engram_core::model::{ExpansionCandidate, FrontierInput, GraphEdge, GraphNode, Properties};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashSet;
use tracing::debug;

/// Seed lookup by the node's `id` property.
pub const SEED_QUERY: &str = "\
MATCH (n {id: $node_id})
RETURN properties(n) AS data, labels(n) AS labels
";

/// Frontier expansion over undirected `RELATES` edges.
///
/// Emits, per frontier entry, every unvisited neighbor whose transfer energy
/// clears `$min_threshold`, ordered by parent id ascending and energy
/// descending within each parent.
pub const EXPAND_QUERY: &str = "\
UNWIND $frontier AS f
MATCH (current {id: f.node_id})
WITH current, f.node_id AS parent_id, f.activation AS activation,
     COUNT { (current)-[:RELATES]-() } AS degree

MATCH (current)-[r:RELATES]-(neighbor)
WHERE NOT neighbor.id IN $visited_ids

WITH parent_id, r, neighbor, activation, degree,
     coalesce(r.tags, []) AS eTags
WITH parent_id, r, neighbor, activation, degree, eTags,
     size([t IN eTags WHERE t IN $query_tags]) AS inter_count
WITH parent_id, r, neighbor, activation, degree, eTags, inter_count,
     CASE
         WHEN $query_tags_count = 0 THEN 1.0
         WHEN size(eTags) = 0       THEN $tag_sim_floor
         ELSE $tag_sim_floor
              + (1.0 - $tag_sim_floor)
              * toFloat(inter_count)
              / (size(eTags) + $query_tags_count - inter_count)
     END AS tag_sim

WITH parent_id, r, neighbor,
     (activation * coalesce(r.weight, 0.01) / sqrt(toFloat(degree))) * tag_sim
         AS transfer_energy

WHERE transfer_energy > $min_threshold

RETURN parent_id,
       properties(neighbor) AS neighbor_data,
       labels(neighbor)     AS neighbor_labels,
       neighbor.id          AS neighbor_id,
       properties(r)        AS edge_data,
       startNode(r).id      AS edge_source_id,
       endNode(r).id        AS edge_target_id,
       type(r)              AS edge_type,
       transfer_energy
ORDER BY parent_id, transfer_energy DESC
";

/// Per-query tuning forwarded into the expansion arithmetic.
#[derive(Debug, Clone)]
pub struct ExpandOptions<'a> {
    pub query_tags: &'a [String],
    pub tag_sim_floor: f64,
    pub min_activation: f64,
}

/// One read transaction against the graph store. Explorations never write;
/// [`GraphTx::finish`] rolls the server-side transaction back.
#[async_trait]
pub trait GraphTx: Send {
    async fn fetch_seed(&mut self, node_id: &str) -> Result<Option<GraphNode>, StoreError>;

    async fn expand_frontier(
        &mut self,
        frontier: &[FrontierInput],
        visited_ids: &HashSet<String>,
        options: &ExpandOptions<'_>,
    ) -> Result<Vec<ExpansionCandidate>, StoreError>;

    async fn finish(self: Box<Self>) -> Result<(), StoreError>;
}

#[async_trait]
pub trait GraphStore: Send + Sync {
    async fn begin_read(&self) -> Result<Box<dyn GraphTx>, StoreError>;
}

/// Graph store client over the Neo4j HTTP transaction API.
///
/// The underlying `reqwest` client pools connections; clones share the pool,
/// and every exploration checks out its own transaction.
#[derive(Debug, Clone)]
pub struct Neo4jHttpStore {
    client: reqwest::Client,
    base_url: String,
    database: String,
    user: String,
    password: String,
}

impl Neo4jHttpStore {
    pub fn new(config: &GraphConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: config.uri.trim_end_matches('/').to_string(),
            database: config.database.clone(),
            user: config.user.clone(),
            password: config.password.clone(),
        }
    }
}

#[async_trait]
impl GraphStore for Neo4jHttpStore {
    async fn begin_read(&self) -> Result<Box<dyn GraphTx>, StoreError> {
        let open_url = format!("{}/db/{}/tx", self.base_url, self.database);
        let response = self
            .client
            .post(&open_url)
            .basic_auth(&self.user, Some(&self.password))
            .json(&json!({ "statements": [] }))
            .send()
            .await?;

        let location = response
            .headers()
            .get(reqwest::header::LOCATION)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let body: TxResponse = response.json().await?;
        fail_on_server_errors(&body)?;

        let tx_id = location
            .as_deref()
            .and_then(|location| location.trim_end_matches('/').rsplit('/').next())
            .filter(|segment| !segment.is_empty())
            .ok_or_else(|| {
                StoreError::Decode("transaction endpoint missing from open response".to_string())
            })?
            .to_string();

        debug!(database = %self.database, tx_id = %tx_id, "opened read transaction");

        Ok(Box::new(Neo4jHttpTx {
            client: self.client.clone(),
            tx_url: format!("{}/db/{}/tx/{}", self.base_url, self.database, tx_id),
            user: self.user.clone(),
            password: self.password.clone(),
        }))
    }
}

struct Neo4jHttpTx {
    client: reqwest::Client,
    tx_url: String,
    user: String,
    password: String,
}

impl Neo4jHttpTx {
    async fn run(&self, statement: &str, parameters: Value) -> Result<StatementResult, StoreError> {
        let response = self
            .client
            .post(&self.tx_url)
            .basic_auth(&self.user, Some(&self.password))
            .json(&json!({
                "statements": [{ "statement": statement, "parameters": parameters }]
            }))
            .send()
            .await?;
        let body: TxResponse = response.json().await?;
        fail_on_server_errors(&body)?;
        body.results
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::Decode("statement produced no result frame".to_string()))
    }
}

#[async_trait]
impl GraphTx for Neo4jHttpTx {
    async fn fetch_seed(&mut self, node_id: &str) -> Result<Option<GraphNode>, StoreError> {
        let result = self
            .run(SEED_QUERY, json!({ "node_id": node_id }))
            .await?;
        let Some(row) = result.data.first() else {
            return Ok(None);
        };
        let node = decode_node(Some(node_id), row.row.first(), row.row.get(1))?;
        Ok(Some(node))
    }

    async fn expand_frontier(
        &mut self,
        frontier: &[FrontierInput],
        visited_ids: &HashSet<String>,
        options: &ExpandOptions<'_>,
    ) -> Result<Vec<ExpansionCandidate>, StoreError> {
        let parameters = json!({
            "frontier": frontier,
            "visited_ids": visited_ids.iter().collect::<Vec<_>>(),
            "query_tags": options.query_tags,
            "query_tags_count": options.query_tags.len(),
            "tag_sim_floor": options.tag_sim_floor,
            "min_threshold": options.min_activation,
        });
        let result = self.run(EXPAND_QUERY, parameters).await?;
        result
            .data
            .iter()
            .map(|row| decode_candidate(&row.row))
            .collect()
    }

    async fn finish(self: Box<Self>) -> Result<(), StoreError> {
        let response = self
            .client
            .delete(&self.tx_url)
            .basic_auth(&self.user, Some(&self.password))
            .send()
            .await?;
        let body: TxResponse = response.json().await?;
        fail_on_server_errors(&body)
    }
}

#[derive(Debug, Deserialize)]
struct TxResponse {
    #[serde(default)]
    results: Vec<StatementResult>,
    #[serde(default)]
    errors: Vec<ServerError>,
}

#[derive(Debug, Deserialize)]
struct StatementResult {
    #[serde(default)]
    data: Vec<RowEnvelope>,
}

#[derive(Debug, Deserialize)]
struct RowEnvelope {
    #[serde(default)]
    row: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct ServerError {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

fn fail_on_server_errors(body: &TxResponse) -> Result<(), StoreError> {
    match body.errors.first() {
        None => Ok(()),
        Some(error) => Err(StoreError::Rejected(format!(
            "{}: {}",
            error.code, error.message
        ))),
    }
}

fn decode_candidate(row: &[Value]) -> Result<ExpansionCandidate, StoreError> {
    let parent_id = row_str(row, 0, "parent_id")?.to_string();
    let neighbor_id = row_str(row, 3, "neighbor_id")?.to_string();
    let neighbor_node = decode_node(Some(neighbor_id.as_str()), row.get(1), row.get(2))?;
    let edge = decode_edge(
        row.get(4),
        row_str(row, 5, "edge_source_id")?,
        row_str(row, 6, "edge_target_id")?,
        row_str(row, 7, "edge_type")?,
    );
    let transfer_energy = row_f64(row, 8, "transfer_energy")?;
    Ok(ExpansionCandidate {
        parent_id,
        neighbor_node,
        edge,
        transfer_energy,
    })
}

fn decode_node(
    id_hint: Option<&str>,
    data: Option<&Value>,
    labels: Option<&Value>,
) -> Result<GraphNode, StoreError> {
    let properties: Properties = data
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();
    let id = properties
        .get("id")
        .and_then(Value::as_str)
        .or(id_hint)
        .ok_or_else(|| StoreError::Decode("node record carries no id".to_string()))?
        .to_string();
    let labels = labels
        .and_then(Value::as_array)
        .map(|values| {
            values
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();
    Ok(GraphNode {
        id,
        labels,
        properties,
    })
}

fn decode_edge(data: Option<&Value>, source_id: &str, target_id: &str, rel_type: &str) -> GraphEdge {
    let properties: Properties = data
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();
    let edge_id = properties
        .get("id")
        .and_then(Value::as_str)
        .map(str::to_string);
    let weight = properties.get("weight").and_then(Value::as_f64);
    let tags = properties
        .get("tags")
        .and_then(Value::as_array)
        .map(|values| {
            values
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();
    GraphEdge {
        source_id: source_id.to_string(),
        target_id: target_id.to_string(),
        rel_type: rel_type.to_string(),
        edge_id,
        weight,
        tags,
        properties,
    }
}

fn row_str<'a>(row: &'a [Value], index: usize, column: &str) -> Result<&'a str, StoreError> {
    row.get(index)
        .and_then(Value::as_str)
        .ok_or_else(|| StoreError::Decode(format!("column {} is not a string", column)))
}

fn row_f64(row: &[Value], index: usize, column: &str) -> Result<f64, StoreError> {
    row.get(index)
        .and_then(Value::as_f64)
        .ok_or_else(|| StoreError::Decode(format!("column {} is not a number", column)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_node_prefers_the_id_property() {
        let data = json!({ "id": "T3001", "text": "campaign evidence", "status": "active" });
        let labels = json!(["Insight"]);
        let node = decode_node(Some("fallback"), Some(&data), Some(&labels)).unwrap();

        assert_eq!(node.id, "T3001");
        assert_eq!(node.labels, vec!["Insight".to_string()]);
        assert_eq!(node.text(), Some("campaign evidence"));
    }

    #[test]
    fn decode_node_falls_back_to_the_queried_id() {
        let data = json!({ "text": "no id property" });
        let node = decode_node(Some("T3000"), Some(&data), None).unwrap();
        assert_eq!(node.id, "T3000");
        assert!(node.labels.is_empty());
    }

    #[test]
    fn decode_node_without_any_id_is_an_error() {
        let data = json!({ "text": "orphan" });
        let decoded = decode_node(None, Some(&data), None);
        assert!(matches!(decoded, Err(StoreError::Decode(_))));
    }

    #[test]
    fn decode_edge_extracts_typed_fields_from_properties() {
        let data = json!({
            "id": "E7001",
            "weight": 0.9,
            "tags": ["campaign", "evidence", "region"],
            "created_time": "2025-06-01T00:00:00Z"
        });
        let edge = decode_edge(Some(&data), "T3000", "T3001", "RELATES");

        assert_eq!(edge.edge_id.as_deref(), Some("E7001"));
        assert_eq!(edge.weight, Some(0.9));
        assert_eq!(edge.tags.len(), 3);
        assert_eq!(edge.source_id, "T3000");
        assert_eq!(edge.target_id, "T3001");
        assert!(edge.properties.contains_key("created_time"));
    }

    #[test]
    fn decode_edge_tolerates_missing_optionals() {
        let edge = decode_edge(Some(&json!({})), "A", "B", "RELATES");
        assert_eq!(edge.edge_id, None);
        assert_eq!(edge.weight, None);
        assert!(edge.tags.is_empty());
        assert_eq!(edge.effective_weight(), 0.01);
    }

    #[test]
    fn decode_candidate_reads_the_full_row() {
        let row = vec![
            json!("T3000"),
            json!({ "id": "T3002", "text": "normalization methodology" }),
            json!(["Analysis"]),
            json!("T3002"),
            json!({ "id": "E7002", "weight": 0.8, "tags": ["campaign", "methodology"] }),
            json!("T3000"),
            json!("T3002"),
            json!("RELATES"),
            json!(0.2390),
        ];
        let candidate = decode_candidate(&row).unwrap();

        assert_eq!(candidate.parent_id, "T3000");
        assert_eq!(candidate.neighbor_node.id, "T3002");
        assert_eq!(candidate.edge.edge_id.as_deref(), Some("E7002"));
        assert_eq!(candidate.transfer_energy, 0.2390);
    }

    #[test]
    fn decode_candidate_rejects_short_rows() {
        let row = vec![json!("T3000")];
        assert!(matches!(
            decode_candidate(&row),
            Err(StoreError::Decode(_))
        ));
    }

    #[test]
    fn server_errors_surface_as_rejected() {
        let body: TxResponse = serde_json::from_value(json!({
            "results": [],
            "errors": [{ "code": "Neo.ClientError.Statement.SyntaxError", "message": "bad query" }]
        }))
        .unwrap();
        let outcome = fail_on_server_errors(&body);
        assert!(matches!(outcome, Err(StoreError::Rejected(message)) if message.contains("SyntaxError")));
    }
}
