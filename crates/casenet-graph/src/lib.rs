//! # Casenet Graph
//!
//! Neo4j persistence for case networks: connection client, index schema,
//! and a full-replace writer with a bulk path and a transactional fallback.

pub mod backend;
pub mod client;
pub mod schema;
pub mod writer;

pub use backend::{CentralityRow, GraphBackend, NodeRow, RelRow};
pub use client::{GraphClient, GraphConfig, GraphCounts};
pub use writer::{
    clear, update_centrality, Capability, GraphWriter, LoadOptions, LoadReport, LoadStage,
    DEFAULT_BATCH_SIZE,
};
