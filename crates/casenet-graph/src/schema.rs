//! Labels, indexes and the Cypher used to load a case network.

use casenet_core::labels::{CASE_LABEL, PERSON_LABEL};

/// Label carried by every loaded node, so relationship lookups by `id` hit a
/// single index whatever the node type.
pub const BASE_LABEL: &str = "RedNodo";

/// Relationship type of every loaded edge.
pub const RELATIONSHIP_TYPE: &str = "VINCULADO_A";

/// Labels indexed on every load, before any entity label.
pub const FIXED_INDEX_LABELS: &[&str] = &[BASE_LABEL, CASE_LABEL, PERSON_LABEL];

/// Checks for the bulk-procedure library.
pub const CAPABILITY_CHECK: &str = "CALL apoc.help('apoc')";

pub fn index_statement(label: &str) -> String {
    format!("CREATE INDEX IF NOT EXISTS FOR (n:`{label}`) ON (n.id)")
}

/// One clearing round; returns the number of deleted nodes as `deleted`.
pub const CLEAR_ROUND: &str = "MATCH (n) WITH n LIMIT $limit DETACH DELETE n RETURN count(n) AS deleted";

pub fn bulk_create_nodes(label: &str) -> String {
    format!(
        "UNWIND $rows AS row \
         CREATE (n:{BASE_LABEL}:`{label}` {{id: row.id}}) \
         SET n += row.props"
    )
}

pub fn bulk_create_relationships() -> String {
    format!(
        "UNWIND $rows AS row \
         MATCH (a:{BASE_LABEL} {{id: row.source}}) \
         MATCH (b:{BASE_LABEL} {{id: row.target}}) \
         CREATE (a)-[r:{RELATIONSHIP_TYPE}]->(b) \
         SET r += row.props"
    )
}

pub fn merge_node(label: &str) -> String {
    format!(
        "MERGE (n:`{label}` {{id: $id}}) \
         SET n:{BASE_LABEL} \
         SET n += $props"
    )
}

pub fn merge_relationship() -> String {
    format!(
        "MATCH (a:{BASE_LABEL} {{id: $source}}) \
         MATCH (b:{BASE_LABEL} {{id: $target}}) \
         MERGE (a)-[r:{RELATIONSHIP_TYPE}]->(b) \
         SET r += $props"
    )
}

pub fn update_centrality() -> String {
    format!(
        "UNWIND $rows AS row \
         MATCH (n:{BASE_LABEL} {{id: row.id}}) \
         SET n.degree_centrality = row.degree, \
             n.betweenness_centrality = row.betweenness, \
             n.closeness_centrality = row.closeness"
    )
}
