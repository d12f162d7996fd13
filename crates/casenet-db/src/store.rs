//! [`CaseRecordStore`] over the SQLite tables.

use casenet_core::builder::{CaseRecord, CaseRecordStore, PersonRecord};
use casenet_core::normalize::parse_date;
use casenet_core::{CasenetError, CasenetResult};
use rusqlite::{params, Row};
use tracing::debug;

use crate::pool::{DbError, DbPool, DbResult};

/// Pages case and person records ordered by row id.
pub struct SqliteCaseStore {
    pool: DbPool,
}

impl SqliteCaseStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn count(pool: &DbPool, table: &str) -> DbResult<usize> {
    pool.with_conn(|conn| {
        let n: i64 = conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))?;
        Ok(n as usize)
    })
}

fn text(row: &Row<'_>, idx: usize) -> rusqlite::Result<String> {
    Ok(row.get::<_, Option<String>>(idx)?.unwrap_or_default())
}

fn case_from_row(row: &Row<'_>) -> rusqlite::Result<CaseRecord> {
    let date = |idx: usize| -> rusqlite::Result<_> {
        Ok(row.get::<_, Option<String>>(idx)?.as_deref().and_then(parse_date))
    };
    Ok(CaseRecord {
        nunc: text(row, 0)?,
        fecha_hechos: date(1)?,
        fecha_denuncia: date(2)?,
        seccional: text(row, 3)?,
        unidad: text(row, 4)?,
        despacho: text(row, 5)?,
        necropsia: text(row, 6)?,
        fuente: text(row, 7)?,
        numero_documento: row.get(8)?,
        calidad_vinculado: text(row, 9)?,
    })
}

fn store_error(e: DbError) -> CasenetError {
    CasenetError::store(e.to_string())
}

impl CaseRecordStore for SqliteCaseStore {
    fn count_cases(&self) -> CasenetResult<usize> {
        count(&self.pool, "consolidado_spoa").map_err(store_error)
    }

    fn case_page(&self, offset: usize, limit: usize) -> CasenetResult<Vec<CaseRecord>> {
        debug!(offset, limit, "Fetching case page");
        self.pool
            .with_conn(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT nunc, fecha_hechos, fecha_denuncia, seccional, unidad, despacho,
                            necropsia, fuente, numero_documento, calidad_vinculado
                     FROM consolidado_spoa ORDER BY id LIMIT ?1 OFFSET ?2",
                )?;
                let rows = stmt
                    .query_map(params![limit as i64, offset as i64], case_from_row)?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .map_err(store_error)
    }

    fn count_persons(&self) -> CasenetResult<usize> {
        count(&self.pool, "personas_df").map_err(store_error)
    }

    fn person_page(&self, offset: usize, limit: usize) -> CasenetResult<Vec<PersonRecord>> {
        debug!(offset, limit, "Fetching person page");
        self.pool
            .with_conn(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT numero_identificacion, nombre_completo
                     FROM personas_df ORDER BY id LIMIT ?1 OFFSET ?2",
                )?;
                let rows = stmt
                    .query_map(params![limit as i64, offset as i64], |row| {
                        Ok(PersonRecord {
                            numero_identificacion: text(row, 0)?,
                            nombre_completo: text(row, 1)?,
                        })
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .map_err(store_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrations::run_migrations;
    use casenet_core::builder::{build_network, BuildOptions, CaseSource};
    use casenet_core::model::{keys, AttrValue, NodeKind};

    /// Raw case row as stored. Dates stay in their source format until read.
    #[derive(Debug, Clone, Default)]
    struct NewCase<'a> {
        nunc: &'a str,
        fecha_hechos: Option<&'a str>,
        fecha_denuncia: Option<&'a str>,
        seccional: Option<&'a str>,
        unidad: Option<&'a str>,
        despacho: Option<&'a str>,
        necropsia: Option<&'a str>,
        fuente: Option<&'a str>,
        numero_documento: Option<&'a str>,
        calidad_vinculado: Option<&'a str>,
    }

    /// Insert one case row.
    fn insert_case(pool: &DbPool, case: &NewCase<'_>) -> DbResult<()> {
        pool.with_conn(|conn| {
            conn.execute(
                "INSERT INTO consolidado_spoa (nunc, fecha_hechos, fecha_denuncia, seccional, unidad,
                                               despacho, necropsia, fuente, numero_documento, calidad_vinculado)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    case.nunc,
                    case.fecha_hechos,
                    case.fecha_denuncia,
                    case.seccional,
                    case.unidad,
                    case.despacho,
                    case.necropsia,
                    case.fuente,
                    case.numero_documento,
                    case.calidad_vinculado
                ],
            )?;
            Ok(())
        })
    }

    /// Insert one person row.
    fn insert_person(pool: &DbPool, numero_identificacion: &str, nombre_completo: Option<&str>) -> DbResult<()> {
        pool.with_conn(|conn| {
            conn.execute(
                "INSERT INTO personas_df (numero_identificacion, nombre_completo) VALUES (?1, ?2)",
                params![numero_identificacion, nombre_completo],
            )?;
            Ok(())
        })
    }

    fn seeded_store() -> SqliteCaseStore {
        let pool = DbPool::in_memory().unwrap();
        run_migrations(&pool).unwrap();

        let cases = [
            ("'C1", "P1", "testigo", Some("14/03/2021")),
            ("C1", "P2", "victima", Some("2021-03-14")),
            ("C2", "P1", "testigo", None),
        ];
        for (nunc, doc, calidad, fecha) in cases {
            insert_case(
                &pool,
                &NewCase {
                    nunc,
                    numero_documento: Some(doc),
                    calidad_vinculado: Some(calidad),
                    fecha_hechos: fecha,
                    seccional: Some("Bogota"),
                    ..NewCase::default()
                },
            )
            .unwrap();
        }
        insert_person(&pool, "P1", Some("Juan Perez")).unwrap();
        insert_person(&pool, "P2", Some("Ana Ruiz")).unwrap();
        SqliteCaseStore::new(pool)
    }

    #[test]
    fn test_pages_are_ordered_and_bounded() {
        let store = seeded_store();
        assert_eq!(store.count_cases().unwrap(), 3);
        assert_eq!(store.count_persons().unwrap(), 2);

        let first = store.case_page(0, 2).unwrap();
        let second = store.case_page(2, 2).unwrap();
        assert_eq!(first.len(), 2);
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].nunc, "C2");
        assert_eq!(first[0].fecha_hechos, chrono::NaiveDate::from_ymd_opt(2021, 3, 14));
        assert_eq!(first[1].fecha_hechos, first[0].fecha_hechos);
        assert_eq!(second[0].fecha_hechos, None);
    }

    #[test]
    fn test_store_mode_build() {
        let store = seeded_store();
        let options = BuildOptions {
            page_size: 2,
            ..BuildOptions::default()
        };
        let (graph, report) = build_network(CaseSource::Store(&store), None, options).unwrap();

        assert_eq!(graph.count_kind(NodeKind::Case), 2);
        assert_eq!(graph.count_kind(NodeKind::Person), 2);
        assert_eq!(graph.edge_count(), 3);
        assert_eq!(report.skipped_rows, 0);
        assert_eq!(
            graph.node_attr("C1", "fecha_hechos"),
            Some(&AttrValue::from("2021-03-14"))
        );
        assert_eq!(graph.node_attr("P1", keys::NAME), Some(&AttrValue::from("Juan Perez")));
    }

    #[test]
    fn test_file_backed_pool() {
        let dir = tempfile::tempdir().unwrap();
        let pool = crate::init_pool(&dir.path().join("casos.db")).unwrap();
        insert_person(&pool, "P9", None).unwrap();
        let store = SqliteCaseStore::new(pool);
        let persons = store.person_page(0, 10).unwrap();
        assert_eq!(persons[0].nombre_completo, "");
    }
}
