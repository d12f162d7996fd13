//! Casenet Database Layer
//!
//! SQLite-backed record store for store-mode network builds.

pub mod migrations;
pub mod pool;
pub mod store;

pub use pool::{DbError, DbPool, DbResult};
pub use store::SqliteCaseStore;

use std::path::Path;

/// Open (or create) the database at `path` and bring its schema up to date.
pub fn init_pool(path: &Path) -> DbResult<DbPool> {
    let pool = DbPool::open(path)?;
    migrations::run_migrations(&pool)?;
    Ok(pool)
}
