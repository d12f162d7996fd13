//! Schema of the case store.
//!
//! `consolidado_spoa` holds the case extract, one row per case/person link
//! (a case with several linked persons spans several rows). `personas_df` is
//! the person registry keyed by identification number. Both are indexed on
//! the identifiers the store-mode pager and the builder join on.

use crate::pool::{DbError, DbPool, DbResult};
use rusqlite_migration::{Migrations, M};

/// Version 1: case extract and person registry tables.
const V1_CASE_TABLES: &str = include_str!("schema.sql");

fn migrations() -> Migrations<'static> {
    Migrations::new(vec![M::up(V1_CASE_TABLES)])
}

/// Bring the store schema to the latest version.
pub fn run_migrations(pool: &DbPool) -> DbResult<()> {
    pool.with_conn_mut(|conn| {
        migrations()
            .to_latest(conn)
            .map_err(|e| DbError::Migration(e.to_string()))
    })
}
