//! Case/person network construction.
//!
//! Builds the bipartite case-person graph either from a pipe-delimited
//! extract (two chunked passes) or by paging through a record store. A
//! builder can start from an existing graph so several sources accumulate
//! into one network.

mod file;
mod store;

pub use file::{CaseRow, ChunkedReader};
pub use store::{CaseRecord, CaseRecordStore, PersonRecord};

use std::path::Path;
use tracing::info;

use crate::error::CasenetResult;
use crate::model::{keys, AttrValue, Attributes, Graph, NodeKind};

/// Default number of rows read per chunk in file mode.
pub const DEFAULT_CHUNK_SIZE: usize = 50_000;

/// Default page size in store mode.
pub const DEFAULT_PAGE_SIZE: usize = 5_000;

/// Tuning knobs for ingestion.
#[derive(Debug, Clone)]
pub struct BuildOptions {
    pub chunk_size: usize,
    pub page_size: usize,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

/// Where the case records come from.
pub enum CaseSource<'a> {
    /// A pipe-delimited extract on disk.
    File(&'a Path),
    /// An already-populated relational store.
    Store(&'a dyn CaseRecordStore),
}

/// Counters collected while building.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildReport {
    pub rows_read: usize,
    pub case_nodes_created: usize,
    pub person_nodes_created: usize,
    pub edges_created: usize,
    pub skipped_rows: usize,
    /// Store mode: links whose person is absent from the person registry.
    /// The endpoint is synthesized as a placeholder entity.
    pub placeholder_persons: usize,
}

/// Accumulates case and person records into a graph.
pub struct GraphBuilder {
    graph: Graph,
    options: BuildOptions,
    report: BuildReport,
}

impl GraphBuilder {
    /// Start from an empty graph.
    pub fn new(options: BuildOptions) -> Self {
        Self::with_graph(Graph::new(), options)
    }

    /// Start from an existing graph; every insertion adds to it.
    pub fn with_graph(graph: Graph, options: BuildOptions) -> Self {
        Self {
            graph,
            options,
            report: BuildReport::default(),
        }
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn report(&self) -> &BuildReport {
        &self.report
    }

    /// Ingest from either source.
    pub fn ingest(&mut self, source: CaseSource<'_>) -> CasenetResult<()> {
        match source {
            CaseSource::File(path) => self.ingest_file(path),
            CaseSource::Store(store) => self.ingest_store(store),
        }
    }

    /// Ingest an in-memory batch of rows with the same two-pass semantics
    /// as file mode.
    pub fn ingest_rows(&mut self, rows: &[CaseRow]) {
        for row in rows {
            self.add_case_node(row);
        }
        for row in rows {
            self.link_person(row);
        }
        self.report.rows_read += rows.len();
    }

    pub fn finish(self) -> (Graph, BuildReport) {
        info!(
            nodes = self.graph.node_count(),
            edges = self.graph.edge_count(),
            cases = self.report.case_nodes_created,
            persons = self.report.person_nodes_created,
            skipped = self.report.skipped_rows,
            placeholders = self.report.placeholder_persons,
            "Network built"
        );
        (self.graph, self.report)
    }

    /// First pass: one case node per distinct case key.
    fn add_case_node(&mut self, row: &CaseRow) {
        if row.nunc.is_empty() || self.graph.contains_node(&row.nunc) {
            return;
        }
        self.graph.merge_node(&row.nunc, case_attributes(row));
        self.report.case_nodes_created += 1;
    }

    /// Second pass: person node plus a single case-person edge.
    fn link_person(&mut self, row: &CaseRow) {
        if row.nunc.is_empty() || row.numero_documento.is_empty() {
            self.report.skipped_rows += 1;
            return;
        }

        if !self.graph.contains_node(&row.numero_documento) {
            self.graph.merge_node(
                &row.numero_documento,
                person_attributes(&row.nombre_completo),
            );
            self.report.person_nodes_created += 1;
        }

        if !self.graph.has_edge(&row.nunc, &row.numero_documento) {
            let mut edge = Attributes::new();
            edge.insert(
                keys::LINK_QUALITY.to_string(),
                AttrValue::from(row.calidad_vinculado.as_str()),
            );
            self.graph.merge_edge(&row.nunc, &row.numero_documento, edge);
            self.report.edges_created += 1;
        }
    }
}

/// Build a network from `source`, optionally on top of `existing`.
pub fn build_network(
    source: CaseSource<'_>,
    existing: Option<Graph>,
    options: BuildOptions,
) -> CasenetResult<(Graph, BuildReport)> {
    let mut builder = GraphBuilder::with_graph(existing.unwrap_or_default(), options);
    builder.ingest(source)?;
    Ok(builder.finish())
}

fn case_attributes(row: &CaseRow) -> Attributes {
    let mut attrs = Attributes::new();
    attrs.insert(keys::NAME.into(), AttrValue::from(row.nunc.as_str()));
    attrs.insert(keys::TIPO.into(), AttrValue::from(NodeKind::Case.tipo()));
    attrs.insert("necropsia".into(), AttrValue::from(row.necropsia.as_str()));
    attrs.insert("seccional".into(), AttrValue::from(row.seccional.as_str()));
    attrs.insert("unidad".into(), AttrValue::from(row.unidad.as_str()));
    attrs.insert("despacho".into(), AttrValue::from(row.despacho.as_str()));
    attrs.insert("fuente".into(), AttrValue::from(row.fuente.as_str()));
    attrs
}

fn person_attributes(name: &str) -> Attributes {
    let mut attrs = Attributes::new();
    attrs.insert(keys::NAME.into(), AttrValue::from(name));
    attrs.insert(keys::TIPO.into(), AttrValue::from(NodeKind::Person.tipo()));
    attrs
}
