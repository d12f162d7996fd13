//! Full-replace persistence of a case network.
//!
//! A load walks `Connected -> Cleared -> Indexed -> (BulkLoad | FallbackLoad)
//! -> Done`. Batches already committed when a later batch fails stay in the
//! backend; a failed load is retried from a cleared database.

use anyhow::{Context, Result};
use casenet_core::labels::{backend_label, CASE_LABEL, PERSON_LABEL};
use casenet_core::{Graph, NodeKind};
use indexmap::IndexMap;
use std::fmt;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use crate::backend::{CentralityRow, GraphBackend, NodeRow, RelRow};
use crate::schema::FIXED_INDEX_LABELS;
use casenet_core::analysis::CentralityScores;
use casenet_core::model::keys;

/// Default number of rows per batch.
pub const DEFAULT_BATCH_SIZE: usize = 5_000;

/// Nodes deleted per clearing round.
pub const CLEAR_ROUND_SIZE: usize = 10_000;

/// Write path negotiated once per load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    BulkCapable,
    StandardOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStage {
    Connected,
    Cleared,
    Indexed,
    BulkLoad,
    FallbackLoad,
    Done,
}

impl fmt::Display for LoadStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LoadStage::Connected => "connected",
            LoadStage::Cleared => "cleared",
            LoadStage::Indexed => "indexed",
            LoadStage::BulkLoad => "bulk load",
            LoadStage::FallbackLoad => "fallback load",
            LoadStage::Done => "done",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone)]
pub struct LoadOptions {
    pub batch_size: usize,
    /// Skip negotiation and use this path.
    pub capability: Option<Capability>,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            capability: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoadReport {
    pub capability: Capability,
    pub case_nodes: usize,
    pub person_nodes: usize,
    /// Entity nodes written per label.
    pub entity_nodes: IndexMap<String, usize>,
    pub relationships: usize,
    /// Time spent reaching each stage.
    pub stage_timings: Vec<(LoadStage, Duration)>,
}

impl LoadReport {
    pub fn nodes_written(&self) -> usize {
        self.case_nodes + self.person_nodes + self.entity_nodes.values().sum::<usize>()
    }
}

/// Rows grouped the way they are written.
struct LoadPlan {
    cases: Vec<NodeRow>,
    persons: Vec<NodeRow>,
    entities: IndexMap<String, Vec<NodeRow>>,
    relationships: Vec<RelRow>,
}

impl LoadPlan {
    fn from_graph(graph: &Graph) -> Self {
        let mut plan = LoadPlan {
            cases: Vec::new(),
            persons: Vec::new(),
            entities: IndexMap::new(),
            relationships: Vec::with_capacity(graph.edge_count()),
        };

        for node in graph.nodes() {
            let row = NodeRow {
                id: node.id.to_string(),
                props: node.attrs.clone(),
            };
            match node.kind() {
                NodeKind::Case => plan.cases.push(row),
                NodeKind::Person => plan.persons.push(row),
                NodeKind::Entity => plan
                    .entities
                    .entry(backend_label(node.id, node.attrs))
                    .or_default()
                    .push(row),
            }
        }

        for edge in graph.edges() {
            plan.relationships.push(RelRow {
                source: edge.source.to_string(),
                target: edge.target.to_string(),
                props: edge.attrs.clone(),
            });
        }
        plan
    }

    fn index_labels(&self) -> Vec<&str> {
        let mut labels: Vec<&str> = FIXED_INDEX_LABELS.to_vec();
        for label in self.entities.keys() {
            if !labels.contains(&label.as_str()) {
                labels.push(label);
            }
        }
        labels
    }
}

/// Writes a graph into a backend, replacing its contents.
pub struct GraphWriter<'a, B: GraphBackend + ?Sized> {
    backend: &'a B,
    options: LoadOptions,
    stage: LoadStage,
}

impl<'a, B: GraphBackend + ?Sized> GraphWriter<'a, B> {
    pub fn new(backend: &'a B, options: LoadOptions) -> Self {
        Self {
            backend,
            options,
            stage: LoadStage::Connected,
        }
    }

    pub fn stage(&self) -> LoadStage {
        self.stage
    }

    fn transition(&mut self, next: LoadStage, started: Instant, timings: &mut Vec<(LoadStage, Duration)>) {
        let elapsed = started.elapsed();
        info!(from = %self.stage, to = %next, elapsed_s = elapsed.as_secs_f64(), "Load stage");
        self.stage = next;
        timings.push((next, elapsed));
    }

    /// Negotiate the write path: the forced capability if any, else detection.
    pub async fn negotiate(&self) -> Result<Capability> {
        if let Some(forced) = self.options.capability {
            info!(capability = ?forced, "Using forced write path");
            return Ok(forced);
        }
        let capability = if self.backend.detect_bulk().await? {
            Capability::BulkCapable
        } else {
            Capability::StandardOnly
        };
        info!(capability = ?capability, "Write path negotiated");
        Ok(capability)
    }

    /// Clear the backend and write `graph` into it.
    pub async fn load(&mut self, graph: &Graph) -> Result<LoadReport> {
        let batch_size = self.options.batch_size.max(1);
        let mut timings = Vec::new();
        let plan = LoadPlan::from_graph(graph);
        info!(
            cases = plan.cases.len(),
            persons = plan.persons.len(),
            entity_labels = plan.entities.len(),
            relationships = plan.relationships.len(),
            batch_size,
            "Loading network into graph backend"
        );

        let started = Instant::now();
        let capability = self.negotiate().await?;

        let deleted = clear(self.backend).await?;
        info!(deleted, "Previous contents removed");
        self.transition(LoadStage::Cleared, started, &mut timings);

        let started = Instant::now();
        for label in plan.index_labels() {
            self.backend.create_index(label).await?;
        }
        self.transition(LoadStage::Indexed, started, &mut timings);

        let started = Instant::now();
        let mut report = LoadReport {
            capability,
            case_nodes: 0,
            person_nodes: 0,
            entity_nodes: IndexMap::new(),
            relationships: 0,
            stage_timings: Vec::new(),
        };
        let load_stage = match capability {
            Capability::BulkCapable => LoadStage::BulkLoad,
            Capability::StandardOnly => LoadStage::FallbackLoad,
        };
        info!(stage = %load_stage, "Writing nodes and relationships");

        report.case_nodes = self.write_nodes(capability, CASE_LABEL, &plan.cases, batch_size).await?;
        report.person_nodes = self.write_nodes(capability, PERSON_LABEL, &plan.persons, batch_size).await?;
        for (label, rows) in &plan.entities {
            let written = self.write_nodes(capability, label, rows, batch_size).await?;
            report.entity_nodes.insert(label.clone(), written);
        }
        report.relationships = self
            .write_relationships(capability, &plan.relationships, batch_size)
            .await?;
        self.transition(load_stage, started, &mut timings);

        self.transition(LoadStage::Done, Instant::now(), &mut timings);
        report.stage_timings = timings;
        info!(
            nodes = report.nodes_written(),
            relationships = report.relationships,
            "Network loaded"
        );
        Ok(report)
    }

    async fn write_nodes(
        &self,
        capability: Capability,
        label: &str,
        rows: &[NodeRow],
        batch_size: usize,
    ) -> Result<usize> {
        let mut written = 0;
        for batch in rows.chunks(batch_size) {
            let result = match capability {
                Capability::BulkCapable => self.backend.create_nodes(label, batch).await,
                Capability::StandardOnly => self.backend.merge_nodes(label, batch).await,
            };
            result.with_context(|| format!("Node batch failed for :{label} after {written} rows"))?;
            written += batch.len();
            info!(label, written, total = rows.len(), "Node batch written");
        }
        Ok(written)
    }

    async fn write_relationships(
        &self,
        capability: Capability,
        rows: &[RelRow],
        batch_size: usize,
    ) -> Result<usize> {
        let mut written = 0;
        for batch in rows.chunks(batch_size) {
            let result = match capability {
                Capability::BulkCapable => self.backend.create_relationships(batch).await,
                Capability::StandardOnly => self.backend.merge_relationships(batch).await,
            };
            result.with_context(|| format!("Relationship batch failed after {written} rows"))?;
            written += batch.len();
            info!(written, total = rows.len(), "Relationship batch written");
        }
        Ok(written)
    }
}

/// Delete everything in bounded rounds until a round deletes nothing.
pub async fn clear<B: GraphBackend + ?Sized>(backend: &B) -> Result<usize> {
    let mut total = 0;
    loop {
        let deleted = backend.clear_round(CLEAR_ROUND_SIZE).await?;
        if deleted == 0 {
            return Ok(total);
        }
        total += deleted;
        info!(deleted = total, "Clearing graph");
    }
}

/// Push the centrality attributes of every node. Nodes outside a centrality
/// sample are written as zero.
pub async fn update_centrality<B: GraphBackend + ?Sized>(
    backend: &B,
    graph: &Graph,
    batch_size: usize,
) -> Result<usize> {
    let score = |attrs: &casenet_core::Attributes, key: &str| {
        attrs.get(key).and_then(|v| v.as_f64()).unwrap_or(0.0)
    };
    let rows: Vec<CentralityRow> = graph
        .nodes()
        .map(|n| CentralityRow {
            id: n.id.to_string(),
            scores: CentralityScores {
                degree: score(n.attrs, keys::DEGREE_CENTRALITY),
                betweenness: score(n.attrs, keys::BETWEENNESS_CENTRALITY),
                closeness: score(n.attrs, keys::CLOSENESS_CENTRALITY),
            },
        })
        .collect();

    let mut written = 0;
    for batch in rows.chunks(batch_size.max(1)) {
        backend.set_centrality(batch).await?;
        written += batch.len();
    }
    if written == 0 {
        warn!("No nodes to update with centrality");
    } else {
        info!(nodes = written, "Centrality written to graph backend");
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::GraphCounts;
    use async_trait::async_trait;
    use casenet_core::model::attrs;
    use casenet_core::{AttrValue, Attributes};
    use std::sync::Mutex;

    #[derive(Debug, Clone)]
    struct StoredNode {
        labels: Vec<String>,
        id: String,
        props: Attributes,
    }

    /// In-memory backend with CREATE vs MERGE semantics.
    #[derive(Default)]
    struct MemoryBackend {
        bulk: bool,
        fail_relationships: bool,
        nodes: Mutex<Vec<StoredNode>>,
        rels: Mutex<Vec<RelRow>>,
        indexes: Mutex<Vec<String>>,
        transactions: Mutex<usize>,
        statements: Mutex<usize>,
        centrality: Mutex<Vec<CentralityRow>>,
    }

    impl MemoryBackend {
        fn with_bulk(bulk: bool) -> Self {
            Self {
                bulk,
                ..Self::default()
            }
        }

        fn has_node(&self, id: &str) -> bool {
            self.nodes.lock().unwrap().iter().any(|n| n.id == id)
        }
    }

    #[async_trait]
    impl GraphBackend for MemoryBackend {
        async fn detect_bulk(&self) -> Result<bool> {
            Ok(self.bulk)
        }

        async fn clear_round(&self, limit: usize) -> Result<usize> {
            let mut nodes = self.nodes.lock().unwrap();
            let n = limit.min(nodes.len());
            let removed: Vec<String> = nodes.drain(..n).map(|n| n.id).collect();
            self.rels
                .lock()
                .unwrap()
                .retain(|r| !removed.contains(&r.source) && !removed.contains(&r.target));
            Ok(n)
        }

        async fn create_index(&self, label: &str) -> Result<()> {
            self.indexes.lock().unwrap().push(label.to_string());
            Ok(())
        }

        async fn create_nodes(&self, label: &str, rows: &[NodeRow]) -> Result<()> {
            *self.statements.lock().unwrap() += 1;
            let mut nodes = self.nodes.lock().unwrap();
            for row in rows {
                nodes.push(StoredNode {
                    labels: vec!["RedNodo".into(), label.into()],
                    id: row.id.clone(),
                    props: row.props.clone(),
                });
            }
            Ok(())
        }

        async fn create_relationships(&self, rows: &[RelRow]) -> Result<()> {
            if self.fail_relationships {
                anyhow::bail!("connection reset");
            }
            *self.statements.lock().unwrap() += 1;
            for row in rows {
                if self.has_node(&row.source) && self.has_node(&row.target) {
                    self.rels.lock().unwrap().push(row.clone());
                }
            }
            Ok(())
        }

        async fn merge_nodes(&self, label: &str, rows: &[NodeRow]) -> Result<()> {
            *self.transactions.lock().unwrap() += 1;
            let mut nodes = self.nodes.lock().unwrap();
            for row in rows {
                match nodes
                    .iter_mut()
                    .find(|n| n.id == row.id && n.labels.iter().any(|l| l == label))
                {
                    Some(existing) => existing.props.extend(row.props.clone()),
                    None => nodes.push(StoredNode {
                        labels: vec![label.into(), "RedNodo".into()],
                        id: row.id.clone(),
                        props: row.props.clone(),
                    }),
                }
            }
            Ok(())
        }

        async fn merge_relationships(&self, rows: &[RelRow]) -> Result<()> {
            if self.fail_relationships {
                anyhow::bail!("connection reset");
            }
            *self.transactions.lock().unwrap() += 1;
            for row in rows {
                if !(self.has_node(&row.source) && self.has_node(&row.target)) {
                    continue;
                }
                let mut rels = self.rels.lock().unwrap();
                match rels
                    .iter_mut()
                    .find(|r| r.source == row.source && r.target == row.target)
                {
                    Some(existing) => existing.props.extend(row.props.clone()),
                    None => rels.push(row.clone()),
                }
            }
            Ok(())
        }

        async fn set_centrality(&self, rows: &[CentralityRow]) -> Result<()> {
            self.centrality.lock().unwrap().extend_from_slice(rows);
            Ok(())
        }

        async fn counts(&self) -> Result<GraphCounts> {
            Ok(GraphCounts {
                nodes: self.nodes.lock().unwrap().len(),
                relationships: self.rels.lock().unwrap().len(),
            })
        }
    }

    fn network() -> Graph {
        let mut g = Graph::new();
        for (nunc, doc, name, calidad) in [
            ("C1", "P1", "Juan Perez", "testigo"),
            ("C1", "P2", "Ana Ruiz", "victima"),
            ("C2", "P1", "Juan Perez", "testigo"),
        ] {
            g.merge_node(nunc, attrs([("tipo", "nunc"), ("name", nunc)]));
            g.merge_node(doc, attrs([("tipo", "persona"), ("name", name)]));
            g.merge_edge(nunc, doc, attrs([("calidad_vinculo", calidad)]));
        }
        g.merge_node("E1", attrs([("entity_type", "empresa")]));
        g.merge_edge("E1", "C2", attrs([("accion", "pago")]));
        g.merge_edge("E9", "C1", Attributes::new());
        g
    }

    #[tokio::test]
    async fn test_bulk_load_writes_whole_graph() {
        let backend = MemoryBackend::with_bulk(true);
        let graph = network();
        let mut writer = GraphWriter::new(&backend, LoadOptions { batch_size: 2, capability: None });
        let report = writer.load(&graph).await.unwrap();

        assert_eq!(report.capability, Capability::BulkCapable);
        assert_eq!(writer.stage(), LoadStage::Done);
        assert_eq!(report.case_nodes, 2);
        assert_eq!(report.person_nodes, 2);
        assert_eq!(report.entity_nodes.get("Empresa"), Some(&1));
        assert_eq!(report.entity_nodes.get("Entidad"), Some(&1));
        assert_eq!(report.relationships, 5);

        let counts = backend.counts().await.unwrap();
        assert_eq!(counts.nodes, graph.node_count());
        assert_eq!(counts.relationships, graph.edge_count());
        // 1 + 1 + 1 + 1 node statements, 3 relationship statements of 2 rows.
        assert_eq!(*backend.statements.lock().unwrap(), 7);

        let stages: Vec<LoadStage> = report.stage_timings.iter().map(|(s, _)| *s).collect();
        assert_eq!(
            stages,
            vec![LoadStage::Cleared, LoadStage::Indexed, LoadStage::BulkLoad, LoadStage::Done]
        );
    }

    #[tokio::test]
    async fn test_fallback_matches_source_counts() {
        let backend = MemoryBackend::with_bulk(false);
        let graph = network();
        let mut writer = GraphWriter::new(&backend, LoadOptions { batch_size: 2, capability: None });
        let report = writer.load(&graph).await.unwrap();

        assert_eq!(report.capability, Capability::StandardOnly);
        let counts = backend.counts().await.unwrap();
        assert_eq!(counts.nodes, graph.node_count());
        assert_eq!(counts.relationships, graph.edge_count());
        // One transaction per batch: cases, persons, 2 entity labels, 3 relationship batches.
        assert_eq!(*backend.transactions.lock().unwrap(), 7);
        assert_eq!(*backend.statements.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_reload_replaces_previous_contents() {
        let backend = MemoryBackend::with_bulk(true);
        let graph = network();
        GraphWriter::new(&backend, LoadOptions::default()).load(&graph).await.unwrap();
        GraphWriter::new(&backend, LoadOptions::default()).load(&graph).await.unwrap();

        let counts = backend.counts().await.unwrap();
        assert_eq!(counts.nodes, graph.node_count());
        assert_eq!(counts.relationships, graph.edge_count());
    }

    #[tokio::test]
    async fn test_forced_standard_path_skips_detection() {
        let backend = MemoryBackend::with_bulk(true);
        let options = LoadOptions {
            batch_size: 10,
            capability: Some(Capability::StandardOnly),
        };
        let report = GraphWriter::new(&backend, options).load(&network()).await.unwrap();
        assert_eq!(report.capability, Capability::StandardOnly);
        assert!(*backend.transactions.lock().unwrap() > 0);
    }

    #[tokio::test]
    async fn test_indexes_created_per_label() {
        let backend = MemoryBackend::with_bulk(true);
        GraphWriter::new(&backend, LoadOptions::default()).load(&network()).await.unwrap();
        let indexes = backend.indexes.lock().unwrap().clone();
        assert_eq!(indexes, vec!["RedNodo", "NUNC", "Persona", "Empresa", "Entidad"]);
    }

    #[tokio::test]
    async fn test_failed_batch_aborts_load() {
        let backend = MemoryBackend {
            bulk: true,
            fail_relationships: true,
            ..MemoryBackend::default()
        };
        let mut writer = GraphWriter::new(&backend, LoadOptions::default());
        let err = writer.load(&network()).await.unwrap_err();

        assert!(format!("{err:#}").contains("connection reset"));
        assert_eq!(writer.stage(), LoadStage::Indexed);
        // Node batches committed before the failure stay.
        assert_eq!(backend.counts().await.unwrap().nodes, 6);
    }

    #[tokio::test]
    async fn test_update_centrality_defaults_to_zero() {
        let backend = MemoryBackend::with_bulk(true);
        let mut graph = network();
        let idx = graph.node_index("C1").unwrap();
        graph.set_node_attr(idx, keys::DEGREE_CENTRALITY, AttrValue::Float(0.4));

        let written = update_centrality(&backend, &graph, 4).await.unwrap();
        assert_eq!(written, graph.node_count());

        let rows = backend.centrality.lock().unwrap();
        let c1 = rows.iter().find(|r| r.id == "C1").unwrap();
        assert_eq!(c1.scores.degree, 0.4);
        let p1 = rows.iter().find(|r| r.id == "P1").unwrap();
        assert_eq!(p1.scores.betweenness, 0.0);
    }
}
