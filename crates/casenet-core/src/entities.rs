//! Merge externally supplied entity graphs (JSON node and edge lists).
//!
//! Node records look like `{"id": ..., ...attributes}` and edge records like
//! `{"from": ..., "to": ..., ...attributes}` (`source`/`target` accepted as
//! aliases). Merges are additive: existing attributes not present in an
//! incoming record survive.

use serde_json::Value;
use std::path::Path;
use tracing::{info, warn};

use crate::error::{CasenetError, CasenetResult};
use crate::model::{AttrValue, Attributes, Graph, MergeOutcome};
use crate::normalize::normalize_id;

/// Record field that cross-references a case identifier and carries the same
/// quoting artifact as node identifiers.
pub const CROSS_REFERENCE_FIELD: &str = "nunc";

/// Counters for one merge.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeReport {
    pub nodes_created: usize,
    pub nodes_updated: usize,
    pub edges_created: usize,
    pub edges_updated: usize,
    pub placeholders_created: usize,
    pub skipped_nodes: usize,
    pub skipped_edges: usize,
}

/// Read a JSON file whose top level must be an array of records.
pub fn read_records(path: &Path) -> CasenetResult<Vec<Value>> {
    if !path.exists() {
        return Err(CasenetError::SourceNotFound(path.to_path_buf()));
    }
    let content = std::fs::read_to_string(path).map_err(|source| CasenetError::Unreadable {
        path: path.to_path_buf(),
        source,
    })?;
    let value: Value = serde_json::from_str(&content)
        .map_err(|e| CasenetError::invalid_input(path, e.to_string()))?;

    match value {
        Value::Array(records) => Ok(records),
        other => Err(CasenetError::invalid_input(
            path,
            format!("expected a JSON array at top level, found {}", json_kind(&other)),
        )),
    }
}

/// Load node and edge files and merge them into `existing` (or a new graph).
pub fn entity_network(
    nodes_path: &Path,
    edges_path: &Path,
    existing: Option<Graph>,
) -> CasenetResult<(Graph, MergeReport)> {
    // Both files are validated before the graph is touched.
    let nodes = read_records(nodes_path)?;
    let edges = read_records(edges_path)?;
    info!(nodes = nodes.len(), edges = edges.len(), "Entity records loaded");

    let mut graph = existing.unwrap_or_default();
    let report = merge_entities(&mut graph, &nodes, &edges);
    Ok((graph, report))
}

/// Merge node records, then edge records, into `graph`.
pub fn merge_entities(graph: &mut Graph, nodes: &[Value], edges: &[Value]) -> MergeReport {
    let mut report = MergeReport::default();

    for (position, record) in nodes.iter().enumerate() {
        match merge_node_record(graph, record) {
            Some(MergeOutcome::Created) => report.nodes_created += 1,
            Some(MergeOutcome::Updated) => report.nodes_updated += 1,
            None => {
                report.skipped_nodes += 1;
                warn!(position, "Skipping node record without usable 'id'");
            }
        }
    }

    for (position, record) in edges.iter().enumerate() {
        match merge_edge_record(graph, record) {
            Some((outcome, placeholders)) => {
                report.placeholders_created += placeholders;
                match outcome {
                    MergeOutcome::Created => report.edges_created += 1,
                    MergeOutcome::Updated => report.edges_updated += 1,
                }
            }
            None => {
                report.skipped_edges += 1;
                warn!(position, "Skipping edge record without usable endpoints");
            }
        }
    }

    info!(
        nodes_created = report.nodes_created,
        nodes_updated = report.nodes_updated,
        edges_created = report.edges_created,
        edges_updated = report.edges_updated,
        placeholders = report.placeholders_created,
        skipped_nodes = report.skipped_nodes,
        skipped_edges = report.skipped_edges,
        "Entity records merged"
    );
    report
}

/// Merge a single node record. `None` when the record is malformed.
pub fn merge_node_record(graph: &mut Graph, record: &Value) -> Option<MergeOutcome> {
    let object = record.as_object()?;
    let id = object.get("id").and_then(identifier)?;

    let attrs: Attributes = object
        .iter()
        .filter(|(key, _)| key.as_str() != "id")
        .map(|(key, value)| (key.clone(), attribute(key, value)))
        .collect();
    Some(graph.merge_node(&id, attrs))
}

/// Merge a single edge record. Returns the outcome and the number of
/// placeholder endpoints synthesized, or `None` when malformed.
pub fn merge_edge_record(graph: &mut Graph, record: &Value) -> Option<(MergeOutcome, usize)> {
    let object = record.as_object()?;
    let endpoint = |primary: &str, alias: &str| {
        object
            .get(primary)
            .or_else(|| object.get(alias))
            .and_then(identifier)
    };
    let from = endpoint("from", "source")?;
    let to = endpoint("to", "target")?;

    let mut placeholders = usize::from(!graph.contains_node(&from));
    if to != from && !graph.contains_node(&to) {
        placeholders += 1;
    }

    let attrs: Attributes = object
        .iter()
        .filter(|(key, _)| !matches!(key.as_str(), "from" | "to" | "source" | "target"))
        .map(|(key, value)| (key.clone(), attribute(key, value)))
        .collect();
    Some((graph.merge_edge(&from, &to, attrs), placeholders))
}

/// Text or numeric identifiers, normalized; empty identifiers are rejected.
fn identifier(value: &Value) -> Option<String> {
    let raw = match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    let id = normalize_id(&raw);
    (!id.is_empty()).then_some(id)
}

fn attribute(key: &str, value: &Value) -> AttrValue {
    match value {
        Value::String(s) if key == CROSS_REFERENCE_FIELD => AttrValue::from(normalize_id(s)),
        other => AttrValue::from(other.clone()),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::keys;
    use serde_json::json;

    #[test]
    fn test_merging_same_node_twice_updates() {
        let mut graph = Graph::new();
        let nodes = vec![
            json!({"id": "'E1", "name": "Empresa", "entity_type": "empresa"}),
            json!({"id": "E1", "sector": "minero"}),
        ];
        let report = merge_entities(&mut graph, &nodes, &[]);

        assert_eq!(report.nodes_created, 1);
        assert_eq!(report.nodes_updated, 1);
        assert_eq!(graph.node_count(), 1);
        let node = graph.node("E1").unwrap();
        assert_eq!(node["name"], AttrValue::from("Empresa"));
        assert_eq!(node["sector"], AttrValue::from("minero"));
        assert!(!node.contains_key("id"));
    }

    #[test]
    fn test_edge_with_missing_endpoints_creates_placeholders() {
        let mut graph = Graph::new();
        let edges = vec![json!({"from": "A", "to": 42, "accion": "pago"})];
        let report = merge_entities(&mut graph, &[], &edges);

        assert_eq!(report.placeholders_created, 2);
        assert_eq!(report.edges_created, 1);
        assert!(graph.has_edge("A", "42"));
        assert_eq!(graph.node_attr("42", keys::SYNTHESIZED), Some(&AttrValue::Bool(true)));
    }

    #[test]
    fn test_duplicate_edges_union_attributes() {
        let mut graph = Graph::new();
        let edges = vec![
            json!({"source": "A", "target": "B", "accion": "pago"}),
            json!({"from": "B", "to": "A", "monto": 10}),
        ];
        let report = merge_entities(&mut graph, &[], &edges);

        assert_eq!(report.edges_created, 1);
        assert_eq!(report.edges_updated, 1);
        let edge = graph.edge("A", "B").unwrap();
        assert_eq!(edge["accion"], AttrValue::from("pago"));
        assert_eq!(edge["monto"], AttrValue::Int(10));
    }

    #[test]
    fn test_malformed_records_are_skipped() {
        let mut graph = Graph::new();
        let nodes = vec![json!({"name": "no id"}), json!("not an object"), json!({"id": "''"})];
        let edges = vec![json!({"from": "A"}), json!({"to": "B", "from": null})];
        let report = merge_entities(&mut graph, &nodes, &edges);

        assert_eq!(report.skipped_nodes, 3);
        assert_eq!(report.skipped_edges, 2);
        assert!(graph.is_empty());
    }

    #[test]
    fn test_cross_reference_field_is_normalized() {
        let mut graph = Graph::new();
        merge_entities(&mut graph, &[json!({"id": "E1", "nunc": "'1100160"})], &[]);
        assert_eq!(graph.node_attr("E1", "nunc"), Some(&AttrValue::from("1100160")));
    }

    #[test]
    fn test_top_level_must_be_array() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nodes.json");
        std::fs::write(&path, r#"{"id": "x"}"#).unwrap();

        let err = read_records(&path).unwrap_err();
        assert!(matches!(err, CasenetError::InvalidInput { .. }));
        assert!(err.to_string().contains("nodes.json"));
    }

    #[test]
    fn test_entity_network_merges_into_existing() {
        let dir = tempfile::tempdir().unwrap();
        let nodes = dir.path().join("nodes.json");
        let edges = dir.path().join("edges.json");
        std::fs::write(&nodes, r#"[{"id": "E1", "entity_type": "empresa"}]"#).unwrap();
        std::fs::write(&edges, r#"[{"from": "E1", "to": "C1"}]"#).unwrap();

        let mut existing = Graph::new();
        existing.merge_node("C1", crate::model::attrs([("tipo", "nunc")]));
        let (graph, report) = entity_network(&nodes, &edges, Some(existing)).unwrap();

        assert_eq!(graph.node_count(), 2);
        assert_eq!(report.placeholders_created, 0);
        assert_eq!(graph.node_attr("C1", keys::TIPO), Some(&AttrValue::from("nunc")));
    }
}
