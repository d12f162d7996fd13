//! Casenet Core Library
//!
//! Graph model and the synchronous stages of the case network pipeline:
//! building, merging, analysis, export and snapshots.

pub mod analysis;
pub mod builder;
pub mod entities;
pub mod error;
pub mod export;
pub mod labels;
pub mod model;
pub mod normalize;
pub mod snapshot;

pub use error::{CasenetError, CasenetResult};
pub use model::{AttrValue, Attributes, Graph, MergeOutcome, NodeKind};
