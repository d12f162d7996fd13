//! Store mode: page through an already-populated relational store.

use chrono::NaiveDate;
use tracing::{info, warn};

use super::GraphBuilder;
use crate::error::CasenetResult;
use crate::model::{keys, AttrValue, Attributes, NodeKind};
use crate::normalize::{clean_field, normalize_id};

/// One case record as held by the relational store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CaseRecord {
    pub nunc: String,
    pub fecha_hechos: Option<NaiveDate>,
    pub fecha_denuncia: Option<NaiveDate>,
    pub seccional: String,
    pub unidad: String,
    pub despacho: String,
    pub necropsia: String,
    pub fuente: String,
    pub numero_documento: Option<String>,
    pub calidad_vinculado: String,
}

/// One person record as held by the relational store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PersonRecord {
    pub numero_identificacion: String,
    pub nombre_completo: String,
}

/// Paged read access to case and person records.
pub trait CaseRecordStore {
    fn count_cases(&self) -> CasenetResult<usize>;
    fn case_page(&self, offset: usize, limit: usize) -> CasenetResult<Vec<CaseRecord>>;
    fn count_persons(&self) -> CasenetResult<usize>;
    fn person_page(&self, offset: usize, limit: usize) -> CasenetResult<Vec<PersonRecord>>;
}

/// Progress is logged every this many records.
const PROGRESS_EVERY: usize = 10_000;

impl GraphBuilder {
    /// Store mode: case nodes, then person nodes, then case-person edges.
    ///
    /// Like file mode, an identifier already in the graph keeps its node as
    /// is, so entities merged earlier are not retyped. A link whose person is
    /// missing from the registry gets a placeholder endpoint and is counted in
    /// `placeholder_persons`.
    pub fn ingest_store(&mut self, store: &dyn CaseRecordStore) -> CasenetResult<()> {
        let page_size = self.options.page_size.max(1);

        let total_cases = store.count_cases()?;
        info!(total_cases, page_size, "Adding case nodes from store");
        let mut seen = 0usize;
        for offset in (0..total_cases).step_by(page_size) {
            for record in store.case_page(offset, page_size)? {
                seen += 1;
                if seen % PROGRESS_EVERY == 0 {
                    info!(processed = seen, "Case records processed");
                }
                let nunc = normalize_id(&record.nunc);
                if nunc.is_empty() || self.graph.contains_node(&nunc) {
                    continue;
                }
                self.graph.merge_node(&nunc, store_case_attributes(&nunc, &record));
                self.report.case_nodes_created += 1;
            }
        }

        let total_persons = store.count_persons()?;
        info!(total_persons, "Adding person nodes from store");
        seen = 0;
        for offset in (0..total_persons).step_by(page_size) {
            for person in store.person_page(offset, page_size)? {
                seen += 1;
                if seen % PROGRESS_EVERY == 0 {
                    info!(processed = seen, "Person records processed");
                }
                let id = normalize_id(&person.numero_identificacion);
                if id.is_empty() {
                    self.report.skipped_rows += 1;
                    continue;
                }
                if self.graph.contains_node(&id) {
                    continue;
                }
                let mut attrs = Attributes::new();
                attrs.insert(keys::NAME.into(), AttrValue::from(clean_field(&person.nombre_completo)));
                attrs.insert(keys::TIPO.into(), AttrValue::from(NodeKind::Person.tipo()));
                self.graph.merge_node(&id, attrs);
                self.report.person_nodes_created += 1;
            }
        }

        info!("Creating case-person edges from store");
        seen = 0;
        for offset in (0..total_cases).step_by(page_size) {
            for record in store.case_page(offset, page_size)? {
                seen += 1;
                if seen % PROGRESS_EVERY == 0 {
                    info!(processed = seen, edges = self.report.edges_created, "Case records linked");
                }
                let nunc = normalize_id(&record.nunc);
                let documento = record
                    .numero_documento
                    .as_deref()
                    .map(normalize_id)
                    .unwrap_or_default();
                if nunc.is_empty() || documento.is_empty() {
                    self.report.skipped_rows += 1;
                    continue;
                }
                if !self.graph.contains_node(&documento) {
                    self.report.placeholder_persons += 1;
                }
                let mut edge = Attributes::new();
                edge.insert(
                    keys::LINK_QUALITY.into(),
                    AttrValue::from(clean_field(&record.calidad_vinculado)),
                );
                if self.graph.merge_edge(&nunc, &documento, edge).is_created() {
                    self.report.edges_created += 1;
                }
            }
        }

        if self.report.placeholder_persons > 0 {
            warn!(
                placeholders = self.report.placeholder_persons,
                "Linked persons missing from the person registry, created as placeholder entities"
            );
        }
        self.report.rows_read += total_cases;
        Ok(())
    }
}

fn store_case_attributes(nunc: &str, record: &CaseRecord) -> Attributes {
    let mut attrs = Attributes::new();
    attrs.insert(keys::NAME.into(), AttrValue::from(nunc));
    attrs.insert(keys::TIPO.into(), AttrValue::from(NodeKind::Case.tipo()));
    attrs.insert("necropsia".into(), AttrValue::from(clean_field(&record.necropsia)));
    attrs.insert("seccional".into(), AttrValue::from(clean_field(&record.seccional)));
    attrs.insert("unidad".into(), AttrValue::from(clean_field(&record.unidad)));
    attrs.insert("despacho".into(), AttrValue::from(clean_field(&record.despacho)));
    attrs.insert("fuente".into(), AttrValue::from(clean_field(&record.fuente)));
    if let Some(date) = record.fecha_hechos {
        attrs.insert("fecha_hechos".into(), AttrValue::from(date.to_string()));
    }
    if let Some(date) = record.fecha_denuncia {
        attrs.insert("fecha_denuncia".into(), AttrValue::from(date.to_string()));
    }
    attrs
}
