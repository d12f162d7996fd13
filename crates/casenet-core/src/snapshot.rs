//! Binary snapshot of a built graph, reused between pipeline runs.

use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use tracing::info;

use crate::error::{CasenetError, CasenetResult};
use crate::model::{Attributes, Graph};

/// Default snapshot for case/person (optionally merged) networks.
pub const DEFAULT_SNAPSHOT: &str = "red_consolidado.bin";

/// Default snapshot for entity-only runs.
pub const ENTITY_SNAPSHOT: &str = "red_entidades.bin";

const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct GraphSnapshot {
    version: u32,
    nodes: Vec<(String, Attributes)>,
    edges: Vec<(String, String, Attributes)>,
}

impl From<&Graph> for GraphSnapshot {
    fn from(graph: &Graph) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            nodes: graph
                .nodes()
                .map(|n| (n.id.to_string(), n.attrs.clone()))
                .collect(),
            edges: graph
                .edges()
                .map(|e| (e.source.to_string(), e.target.to_string(), e.attrs.clone()))
                .collect(),
        }
    }
}

impl GraphSnapshot {
    fn into_graph(self) -> Graph {
        let mut graph = Graph::new();
        for (id, attrs) in self.nodes {
            graph.merge_node(&id, attrs);
        }
        for (source, target, attrs) in self.edges {
            graph.merge_edge(&source, &target, attrs);
        }
        graph
    }
}

/// Serialize `graph` to `path`.
pub fn save(graph: &Graph, path: &Path) -> CasenetResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let writer = BufWriter::new(File::create(path)?);
    bincode::serialize_into(writer, &GraphSnapshot::from(graph))?;
    info!(
        path = %path.display(),
        nodes = graph.node_count(),
        edges = graph.edge_count(),
        "Snapshot saved"
    );
    Ok(())
}

/// Load a graph previously written by [`save`].
pub fn load(path: &Path) -> CasenetResult<Graph> {
    if !path.exists() {
        return Err(CasenetError::SourceNotFound(path.to_path_buf()));
    }
    let file = File::open(path).map_err(|source| CasenetError::Unreadable {
        path: path.to_path_buf(),
        source,
    })?;
    let snapshot: GraphSnapshot = bincode::deserialize_from(BufReader::new(file))?;
    if snapshot.version != SNAPSHOT_VERSION {
        return Err(CasenetError::invalid_input(
            path,
            format!("unsupported snapshot version {}", snapshot.version),
        ));
    }

    let graph = snapshot.into_graph();
    info!(
        path = %path.display(),
        nodes = graph.node_count(),
        edges = graph.edge_count(),
        "Snapshot loaded"
    );
    Ok(graph)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{attrs, keys, AttrValue};

    #[test]
    fn test_snapshot_restores_graph() {
        let mut g = Graph::new();
        g.merge_node("C1", attrs([("tipo", "nunc")]));
        g.merge_edge("C1", "P1", attrs([("calidad_vinculo", "victima")]));
        g.set_node_attr(0, keys::DEGREE_CENTRALITY, AttrValue::Float(0.5));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(DEFAULT_SNAPSHOT);
        save(&g, &path).unwrap();
        let restored = load(&path).unwrap();

        assert_eq!(restored.node_count(), 2);
        assert_eq!(restored.edge_count(), 1);
        assert_eq!(restored.node_id(0), Some("C1"));
        assert_eq!(
            restored.node_attr("C1", keys::DEGREE_CENTRALITY),
            Some(&AttrValue::Float(0.5))
        );
        assert_eq!(restored.degree("P1"), Some(1));
    }

    #[test]
    fn test_missing_snapshot() {
        let err = load(Path::new("/nonexistent/red.bin")).unwrap_err();
        assert!(matches!(err, CasenetError::SourceNotFound(_)));
    }
}
