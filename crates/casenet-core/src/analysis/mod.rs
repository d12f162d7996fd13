//! Post-hoc structural analysis: components, degree and centrality.

pub mod centrality;
pub mod components;
mod view;

pub use centrality::{
    analyze_centrality, CentralityOptions, CentralityPlan, CentralityReport, CentralityScores,
    GraphStats, RankedNode,
};
pub use components::{annotate_components, connected_components, ComponentSummary};
pub use view::GraphView;
