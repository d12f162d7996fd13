//! Write operations the persistence writer needs from a graph backend.

use anyhow::{Context, Result};
use async_trait::async_trait;
use casenet_core::analysis::CentralityScores;
use casenet_core::{AttrValue, Attributes};
use neo4rs::{query, BoltFloat, BoltMap, BoltNull, BoltString, BoltType};
use tracing::debug;

use crate::client::{GraphClient, GraphCounts};
use crate::schema;

/// A node to write: identifier plus property bag.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeRow {
    pub id: String,
    pub props: Attributes,
}

/// A relationship to write between two node identifiers.
#[derive(Debug, Clone, PartialEq)]
pub struct RelRow {
    pub source: String,
    pub target: String,
    pub props: Attributes,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CentralityRow {
    pub id: String,
    pub scores: CentralityScores,
}

/// Graph backend seam.
///
/// `create_*` calls are unconditional creates issued in one statement per
/// batch; `merge_*` calls upsert row by row inside one transaction per batch.
#[async_trait]
pub trait GraphBackend: Send + Sync {
    /// Whether the bulk-procedure library is installed.
    async fn detect_bulk(&self) -> Result<bool>;

    /// Delete up to `limit` nodes with their relationships; returns how many.
    async fn clear_round(&self, limit: usize) -> Result<usize>;

    async fn create_index(&self, label: &str) -> Result<()>;

    async fn create_nodes(&self, label: &str, rows: &[NodeRow]) -> Result<()>;

    async fn create_relationships(&self, rows: &[RelRow]) -> Result<()>;

    async fn merge_nodes(&self, label: &str, rows: &[NodeRow]) -> Result<()>;

    async fn merge_relationships(&self, rows: &[RelRow]) -> Result<()>;

    async fn set_centrality(&self, rows: &[CentralityRow]) -> Result<()>;

    async fn counts(&self) -> Result<GraphCounts>;
}

/// Property value as sent over bolt. Nested values travel as compact JSON
/// text since node properties cannot hold maps.
pub fn to_bolt(value: &AttrValue) -> BoltType {
    match value {
        AttrValue::Null => BoltType::Null(BoltNull),
        AttrValue::Bool(b) => BoltType::from(*b),
        AttrValue::Int(i) => BoltType::from(*i),
        AttrValue::Float(f) => BoltType::Float(BoltFloat::new(*f)),
        AttrValue::Text(s) => BoltType::String(BoltString::from(s.as_str())),
        AttrValue::List(_) | AttrValue::Map(_) => BoltType::String(BoltString::from(value.to_json().as_str())),
    }
}

pub fn props_to_bolt(props: &Attributes) -> BoltType {
    BoltType::Map(BoltMap::from_iter(
        props
            .iter()
            .map(|(k, v)| (BoltString::from(k.as_str()), to_bolt(v))),
    ))
}

fn bolt_map<const N: usize>(entries: [(&str, BoltType); N]) -> BoltType {
    BoltType::Map(BoltMap::from_iter(
        entries.into_iter().map(|(k, v)| (BoltString::from(k), v)),
    ))
}

fn node_rows(rows: &[NodeRow]) -> Vec<BoltType> {
    rows.iter()
        .map(|row| {
            bolt_map([
                ("id", BoltType::String(BoltString::from(row.id.as_str()))),
                ("props", props_to_bolt(&row.props)),
            ])
        })
        .collect()
}

fn rel_rows(rows: &[RelRow]) -> Vec<BoltType> {
    rows.iter()
        .map(|row| {
            bolt_map([
                ("source", BoltType::String(BoltString::from(row.source.as_str()))),
                ("target", BoltType::String(BoltString::from(row.target.as_str()))),
                ("props", props_to_bolt(&row.props)),
            ])
        })
        .collect()
}

#[async_trait]
impl GraphBackend for GraphClient {
    async fn detect_bulk(&self) -> Result<bool> {
        match self.execute(query(schema::CAPABILITY_CHECK)).await {
            Ok(()) => Ok(true),
            Err(e) => {
                debug!(error = %e, "Bulk procedures unavailable");
                Ok(false)
            }
        }
    }

    async fn clear_round(&self, limit: usize) -> Result<usize> {
        let deleted: Option<i64> = self
            .query_scalar(query(schema::CLEAR_ROUND).param("limit", limit as i64), "deleted")
            .await
            .context("Failed to clear graph")?;
        Ok(deleted.unwrap_or(0) as usize)
    }

    async fn create_index(&self, label: &str) -> Result<()> {
        self.execute(query(&schema::index_statement(label)))
            .await
            .with_context(|| format!("Failed to create index on :{label}(id)"))
    }

    async fn create_nodes(&self, label: &str, rows: &[NodeRow]) -> Result<()> {
        self.execute(query(&schema::bulk_create_nodes(label)).param("rows", node_rows(rows)))
            .await
            .with_context(|| format!("Bulk node insert failed for :{label}"))
    }

    async fn create_relationships(&self, rows: &[RelRow]) -> Result<()> {
        self.execute(query(&schema::bulk_create_relationships()).param("rows", rel_rows(rows)))
            .await
            .context("Bulk relationship insert failed")
    }

    async fn merge_nodes(&self, label: &str, rows: &[NodeRow]) -> Result<()> {
        let statement = schema::merge_node(label);
        let queries = rows
            .iter()
            .map(|row| {
                query(&statement)
                    .param("id", row.id.as_str())
                    .param("props", props_to_bolt(&row.props))
            })
            .collect();
        self.run_in_txn(queries)
            .await
            .with_context(|| format!("Transactional node upsert failed for :{label}"))
    }

    async fn merge_relationships(&self, rows: &[RelRow]) -> Result<()> {
        let statement = schema::merge_relationship();
        let queries = rows
            .iter()
            .map(|row| {
                query(&statement)
                    .param("source", row.source.as_str())
                    .param("target", row.target.as_str())
                    .param("props", props_to_bolt(&row.props))
            })
            .collect();
        self.run_in_txn(queries)
            .await
            .context("Transactional relationship upsert failed")
    }

    async fn set_centrality(&self, rows: &[CentralityRow]) -> Result<()> {
        let rows: Vec<BoltType> = rows
            .iter()
            .map(|row| {
                bolt_map([
                    ("id", BoltType::String(BoltString::from(row.id.as_str()))),
                    ("degree", BoltType::Float(BoltFloat::new(row.scores.degree))),
                    ("betweenness", BoltType::Float(BoltFloat::new(row.scores.betweenness))),
                    ("closeness", BoltType::Float(BoltFloat::new(row.scores.closeness))),
                ])
            })
            .collect();
        self.execute(query(&schema::update_centrality()).param("rows", rows))
            .await
            .context("Centrality update failed")
    }

    async fn counts(&self) -> Result<GraphCounts> {
        self.get_counts().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use casenet_core::model::attrs;

    #[test]
    fn test_nested_values_become_json_text() {
        let value = AttrValue::from(serde_json::json!({"a": [1, 2]}));
        assert_eq!(
            to_bolt(&value),
            BoltType::String(BoltString::from(r#"{"a":[1,2]}"#))
        );
        assert_eq!(to_bolt(&AttrValue::Null), BoltType::Null(BoltNull));
        assert_eq!(to_bolt(&AttrValue::Int(3)), BoltType::from(3i64));
    }

    #[test]
    fn test_props_map_keeps_every_key() {
        let props = attrs([("name", "Juan"), ("tipo", "persona")]);
        match props_to_bolt(&props) {
            BoltType::Map(map) => assert_eq!(map.value.len(), 2),
            other => panic!("expected map, got {other:?}"),
        }
    }
}
