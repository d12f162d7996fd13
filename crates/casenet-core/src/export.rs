//! Bulk-import file exporter.
//!
//! Flattens a graph into `nodes.csv` and `relationships.csv` in the header
//! format of the offline `neo4j-admin database import` tool.

use csv::WriterBuilder;
use std::collections::BTreeSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::info;

use crate::error::CasenetResult;
use crate::labels::{node_label, relationship_type};
use crate::model::{keys, AttrValue, Attributes, Graph};

pub const NODES_FILE: &str = "nodes.csv";
pub const RELATIONSHIPS_FILE: &str = "relationships.csv";

/// Presentation-only node attributes left out of the node file.
pub const EXCLUDED_NODE_KEYS: &[&str] = &[keys::COLOR, keys::SHAPE, keys::SYNTHESIZED];

const PROGRESS_EVERY: usize = 10_000;

#[derive(Debug, Clone)]
pub struct ExportOptions {
    /// Target directory; a fresh temporary directory when `None`.
    pub output_dir: Option<PathBuf>,
    pub delimiter: u8,
    pub id_type: String,
    /// Database named in the rendered import command.
    pub database: String,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            output_dir: None,
            delimiter: b',',
            id_type: "STRING".to_string(),
            database: "neo4j".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExportReport {
    pub output_dir: PathBuf,
    pub nodes_path: PathBuf,
    pub relationships_path: PathBuf,
    pub nodes_written: usize,
    pub relationships_written: usize,
    pub import_command: ImportCommand,
}

/// Offline import invocation for the exported files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportCommand {
    pub nodes: PathBuf,
    pub relationships: PathBuf,
    pub delimiter: u8,
    pub id_type: String,
    pub database: String,
}

impl fmt::Display for ImportCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let delimiter = match self.delimiter {
            b'\t' => "TAB".to_string(),
            other => format!("'{}'", other as char),
        };
        write!(
            f,
            "neo4j-admin database import full --nodes={} --relationships={} --delimiter={} --id-type={} --overwrite-destination {}",
            self.nodes.display(),
            self.relationships.display(),
            delimiter,
            self.id_type,
            self.database
        )
    }
}

/// Node file header: `id:ID`, sorted attribute keys, `:LABEL`.
pub fn node_columns(graph: &Graph) -> Vec<String> {
    graph
        .nodes()
        .flat_map(|n| n.attrs.keys())
        .filter(|k| !EXCLUDED_NODE_KEYS.contains(&k.as_str()))
        .map(String::as_str)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(String::from)
        .collect()
}

/// Relationship attribute keys, sorted.
pub fn relationship_columns(graph: &Graph) -> Vec<String> {
    graph
        .edges()
        .flat_map(|e| e.attrs.keys())
        .map(String::as_str)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(String::from)
        .collect()
}

fn fields<'a>(columns: &'a [String], attrs: &'a Attributes) -> impl Iterator<Item = String> + 'a {
    columns
        .iter()
        .map(|c| attrs.get(c).map(AttrValue::to_field).unwrap_or_default())
}

/// Write both files and return their locations plus the import command.
pub fn export_graph(graph: &Graph, options: &ExportOptions) -> CasenetResult<ExportReport> {
    let start = Instant::now();
    let output_dir = match &options.output_dir {
        Some(dir) => dir.clone(),
        None => std::env::temp_dir().join(format!("casenet-export-{}", uuid::Uuid::new_v4())),
    };
    fs::create_dir_all(&output_dir)?;

    let nodes_path = output_dir.join(NODES_FILE);
    let relationships_path = output_dir.join(RELATIONSHIPS_FILE);
    info!(dir = %output_dir.display(), "Exporting graph for bulk import");

    let nodes_written = write_nodes(graph, &nodes_path, options.delimiter)?;
    let relationships_written = write_relationships(graph, &relationships_path, options.delimiter)?;

    info!(
        nodes = nodes_written,
        relationships = relationships_written,
        elapsed_s = start.elapsed().as_secs_f64(),
        "Export complete"
    );

    let import_command = ImportCommand {
        nodes: nodes_path.clone(),
        relationships: relationships_path.clone(),
        delimiter: options.delimiter,
        id_type: options.id_type.clone(),
        database: options.database.clone(),
    };
    Ok(ExportReport {
        output_dir,
        nodes_path,
        relationships_path,
        nodes_written,
        relationships_written,
        import_command,
    })
}

fn write_nodes(graph: &Graph, path: &Path, delimiter: u8) -> CasenetResult<usize> {
    let columns = node_columns(graph);
    let mut writer = WriterBuilder::new().delimiter(delimiter).from_path(path)?;

    let mut header = vec!["id:ID".to_string()];
    header.extend(columns.iter().cloned());
    header.push(":LABEL".to_string());
    writer.write_record(&header)?;

    let mut count = 0;
    for node in graph.nodes() {
        let mut row = vec![node.id.to_string()];
        row.extend(fields(&columns, node.attrs));
        row.push(node_label(node.id, node.attrs));
        writer.write_record(&row)?;

        count += 1;
        if count % PROGRESS_EVERY == 0 {
            info!(processed = count, "Nodes exported");
        }
    }
    writer.flush()?;
    Ok(count)
}

fn write_relationships(graph: &Graph, path: &Path, delimiter: u8) -> CasenetResult<usize> {
    let columns = relationship_columns(graph);
    let mut writer = WriterBuilder::new().delimiter(delimiter).from_path(path)?;

    let mut header = vec![":START_ID".to_string(), ":END_ID".to_string()];
    header.extend(columns.iter().cloned());
    header.push(":TYPE".to_string());
    writer.write_record(&header)?;

    let mut count = 0;
    for edge in graph.edges() {
        let mut row = vec![edge.source.to_string(), edge.target.to_string()];
        row.extend(fields(&columns, edge.attrs));
        row.push(relationship_type(edge.attrs));
        writer.write_record(&row)?;

        count += 1;
        if count % PROGRESS_EVERY == 0 {
            info!(processed = count, "Relationships exported");
        }
    }
    writer.flush()?;
    Ok(count)
}
