//! File mode: two chunked passes over a pipe-delimited extract.

use csv::{ByteRecord, Reader, ReaderBuilder};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::time::Instant;
use tracing::{info, warn};

use super::GraphBuilder;
use crate::error::{CasenetError, CasenetResult};
use crate::normalize::{clean_field, normalize_id};

/// Field delimiter of the case extracts.
const EXTRACT_DELIMITER: u8 = b'|';

/// One normalized row of the case extract.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CaseRow {
    pub nunc: String,
    pub numero_documento: String,
    pub nombre_completo: String,
    pub calidad_vinculado: String,
    pub necropsia: String,
    pub seccional: String,
    pub unidad: String,
    pub despacho: String,
    pub fuente: String,
}

/// Column positions resolved from the header.
#[derive(Debug, Clone)]
struct Columns {
    nunc: usize,
    numero_documento: usize,
    nombre_completo: Option<usize>,
    calidad_vinculado: Option<usize>,
    necropsia: Option<usize>,
    seccional: Option<usize>,
    unidad: Option<usize>,
    despacho: Option<usize>,
    fuente: Option<usize>,
}

impl Columns {
    fn resolve(headers: &ByteRecord, path: &Path) -> CasenetResult<Self> {
        let names: Vec<String> = headers
            .iter()
            .map(|h| String::from_utf8_lossy(h).trim().to_string())
            .collect();
        let find = |name: &str| names.iter().position(|h| h == name);
        let require = |name: &str| {
            find(name).ok_or_else(|| {
                CasenetError::invalid_input(path, format!("missing required column '{name}'"))
            })
        };

        Ok(Self {
            nunc: require("nunc")?,
            numero_documento: require("numero_documento")?,
            nombre_completo: find("nombre_completo"),
            calidad_vinculado: find("calidad_vinculado"),
            necropsia: find("necropsia"),
            seccional: find("seccional"),
            unidad: find("unidad"),
            despacho: find("despacho"),
            fuente: find("fuente"),
        })
    }

    fn row(&self, record: &ByteRecord) -> CaseRow {
        let cell = |idx: Option<usize>| {
            idx.and_then(|i| record.get(i))
                .map(|raw| clean_field(&String::from_utf8_lossy(raw)))
                .unwrap_or_default()
        };
        let id = |idx: usize| {
            record
                .get(idx)
                .map(|raw| normalize_id(&String::from_utf8_lossy(raw)))
                .unwrap_or_default()
        };

        CaseRow {
            nunc: id(self.nunc),
            numero_documento: id(self.numero_documento),
            nombre_completo: cell(self.nombre_completo),
            calidad_vinculado: cell(self.calidad_vinculado),
            necropsia: cell(self.necropsia),
            seccional: cell(self.seccional),
            unidad: cell(self.unidad),
            despacho: cell(self.despacho),
            fuente: cell(self.fuente),
        }
    }
}

/// Streams a case extract in bounded chunks of normalized rows.
///
/// The reader is flexible: rows shorter than the header degrade to empty
/// cells instead of failing the pass.
pub struct ChunkedReader {
    reader: Reader<BufReader<File>>,
    columns: Columns,
    chunk_size: usize,
    record: ByteRecord,
}

impl ChunkedReader {
    /// Open `path`. Fails before reading any row if the file is missing,
    /// unreadable or lacks the key columns.
    pub fn open(path: &Path, chunk_size: usize) -> CasenetResult<Self> {
        if !path.exists() {
            return Err(CasenetError::SourceNotFound(path.to_path_buf()));
        }
        let file = File::open(path).map_err(|source| CasenetError::Unreadable {
            path: path.to_path_buf(),
            source,
        })?;

        let mut reader = ReaderBuilder::new()
            .delimiter(EXTRACT_DELIMITER)
            .has_headers(true)
            .flexible(true)
            .from_reader(BufReader::new(file));
        let headers = reader.byte_headers()?.clone();
        let columns = Columns::resolve(&headers, path)?;

        Ok(Self {
            reader,
            columns,
            chunk_size: chunk_size.max(1),
            record: ByteRecord::new(),
        })
    }

    /// Next chunk of at most `chunk_size` rows, or `None` at end of input.
    pub fn next_chunk(&mut self) -> CasenetResult<Option<Vec<CaseRow>>> {
        let mut chunk = Vec::with_capacity(self.chunk_size.min(DEFAULT_CHUNK_CAPACITY));
        while chunk.len() < self.chunk_size && self.reader.read_byte_record(&mut self.record)? {
            chunk.push(self.columns.row(&self.record));
        }
        Ok(if chunk.is_empty() { None } else { Some(chunk) })
    }
}

/// Initial allocation cap so a huge configured chunk size does not reserve
/// memory up front.
const DEFAULT_CHUNK_CAPACITY: usize = 8_192;

#[derive(Clone, Copy)]
enum Pass {
    Cases,
    Persons,
}

impl GraphBuilder {
    /// File mode: pass 1 adds case nodes, pass 2 adds person nodes and edges.
    pub fn ingest_file(&mut self, path: &Path) -> CasenetResult<()> {
        let start = Instant::now();
        info!(path = %path.display(), chunk_size = self.options.chunk_size, "Reading case extract");

        let first = ChunkedReader::open(path, self.options.chunk_size)?;
        self.run_pass(first, Pass::Cases, path)?;
        info!(
            cases = self.report.case_nodes_created,
            elapsed_s = start.elapsed().as_secs_f64(),
            "First pass complete"
        );

        let second = ChunkedReader::open(path, self.options.chunk_size)?;
        self.run_pass(second, Pass::Persons, path)?;
        info!(
            persons = self.report.person_nodes_created,
            edges = self.report.edges_created,
            elapsed_s = start.elapsed().as_secs_f64(),
            "Second pass complete"
        );
        Ok(())
    }

    fn run_pass(&mut self, mut reader: ChunkedReader, pass: Pass, path: &Path) -> CasenetResult<()> {
        let mut processed = 0usize;
        let mut chunk_idx = 0usize;
        while let Some(chunk) = reader.next_chunk()? {
            chunk_idx += 1;
            processed += chunk.len();
            match pass {
                Pass::Cases => {
                    for row in &chunk {
                        self.add_case_node(row);
                    }
                    info!(chunk = chunk_idx, processed, cases = self.report.case_nodes_created, "Case chunk processed");
                }
                Pass::Persons => {
                    for row in &chunk {
                        self.link_person(row);
                    }
                    info!(
                        chunk = chunk_idx,
                        processed,
                        persons = self.report.person_nodes_created,
                        edges = self.report.edges_created,
                        "Person chunk processed"
                    );
                }
            }
        }

        if let Pass::Persons = pass {
            self.report.rows_read += processed;
            if self.report.skipped_rows > 0 {
                warn!(path = %path.display(), skipped = self.report.skipped_rows, "Rows skipped during ingestion");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::BuildOptions;
    use crate::model::{keys, AttrValue, NodeKind};
    use std::io::Write;

    fn write_extract(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    const EXTRACT: &str = "nunc|numero_documento|nombre_completo|calidad_vinculado|seccional|fuente\n\
        'C1|P1|Juan Perez|witness|Bogota|spoa\n\
        C1|P2|Ana Ruiz|victim|Bogota|spoa\n\
        C2|P1|Juan Perez|witness|nan|spoa\n\
        C3||Sin Documento|victim|Cali|spoa\n";

    #[test]
    fn test_file_mode_builds_network_across_chunks() {
        let file = write_extract(EXTRACT);
        let options = BuildOptions { chunk_size: 2, ..BuildOptions::default() };
        let mut builder = GraphBuilder::new(options);
        builder.ingest_file(file.path()).unwrap();
        let (graph, report) = builder.finish();

        assert_eq!(graph.count_kind(NodeKind::Case), 3);
        assert_eq!(graph.count_kind(NodeKind::Person), 2);
        assert_eq!(graph.edge_count(), 3);
        assert_eq!(report.rows_read, 4);
        assert_eq!(report.skipped_rows, 1);
        // Quoting artifact stripped, sentinel coerced.
        assert_eq!(graph.node_attr("C1", "seccional"), Some(&AttrValue::from("Bogota")));
        assert_eq!(graph.node_attr("C2", "seccional"), Some(&AttrValue::from("")));
        assert_eq!(graph.node_attr("C1", "necropsia"), Some(&AttrValue::from("")));
        assert_eq!(graph.node_attr("P1", keys::NAME), Some(&AttrValue::from("Juan Perez")));
    }

    #[test]
    fn test_short_rows_degrade_to_empty_fields() {
        let file = write_extract("nunc|numero_documento|nombre_completo|calidad_vinculado\nC1|P1\n");
        let mut builder = GraphBuilder::new(BuildOptions::default());
        builder.ingest_file(file.path()).unwrap();
        let (graph, _) = builder.finish();

        assert!(graph.has_edge("C1", "P1"));
        assert_eq!(graph.node_attr("P1", keys::NAME), Some(&AttrValue::from("")));
    }

    #[test]
    fn test_ragged_rows_are_read_not_dropped() {
        let file = write_extract(
            "nunc|numero_documento|nombre_completo|calidad_vinculado|fuente\n\
             C1|P1|Juan Perez|testigo|spoa|extra|cells\n\
             C2|P2\n",
        );
        let mut reader = ChunkedReader::open(file.path(), 10).unwrap();
        let chunk = reader.next_chunk().unwrap().unwrap();

        assert_eq!(chunk.len(), 2);
        assert_eq!(chunk[0].fuente, "spoa");
        assert_eq!(chunk[1].numero_documento, "P2");
        assert_eq!(chunk[1].fuente, "");
        assert!(reader.next_chunk().unwrap().is_none());
    }

    #[test]
    fn test_missing_file_is_fatal() {
        let mut builder = GraphBuilder::new(BuildOptions::default());
        let err = builder.ingest_file(Path::new("/nonexistent/extract.csv")).unwrap_err();
        assert!(matches!(err, CasenetError::SourceNotFound(_)));
        assert!(builder.graph().is_empty());
    }

    #[test]
    fn test_missing_key_column_is_fatal() {
        let file = write_extract("case|person\nC1|P1\n");
        let err = ChunkedReader::open(file.path(), 10).err().unwrap();
        assert!(matches!(err, CasenetError::InvalidInput { .. }));
    }
}
