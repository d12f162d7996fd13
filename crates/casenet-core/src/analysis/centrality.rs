//! Degree, betweenness and closeness centrality plus graph-level statistics.
//!
//! Scores follow the usual normalized undirected definitions:
//!
//! - degree: `deg(v) / (n - 1)`
//! - betweenness: Brandes accumulation scaled by `1 / ((n - 1)(n - 2))`
//! - closeness: `(r - 1) / sum(dist)` scaled by `(r - 1) / (n - 1)`, where `r`
//!   is the size of the reachable set, so disconnected graphs stay comparable
//!
//! Graphs above [`SAMPLING_THRESHOLD`] nodes are analyzed on the induced
//! subgraph of a uniform random sample. Nodes outside the sample are left
//! without centrality attributes.

use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::VecDeque;
use std::time::Instant;
use tracing::{debug, info};

use super::components::connected_components;
use super::view::GraphView;
use crate::error::{CasenetError, CasenetResult};
use crate::model::{keys, AttrValue, Graph};

/// Graphs with more nodes than this are sampled.
pub const SAMPLING_THRESHOLD: usize = 100_000;

/// Lower bound on the sample size.
pub const MIN_SAMPLE_SIZE: usize = 50_000;

/// Number of ranked nodes kept per measure.
pub const TOP_N: usize = 10;

/// How centrality will be computed for a graph of a given size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CentralityPlan {
    Exact,
    Sampled { sample_size: usize },
}

impl CentralityPlan {
    pub fn for_node_count(node_count: usize) -> Self {
        if node_count > SAMPLING_THRESHOLD {
            CentralityPlan::Sampled {
                sample_size: MIN_SAMPLE_SIZE.max(node_count / 10),
            }
        } else {
            CentralityPlan::Exact
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CentralityOptions {
    /// Fix the sampling RNG; `None` draws from OS entropy.
    pub seed: Option<u64>,
}

/// The three scores of one node.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CentralityScores {
    pub degree: f64,
    pub betweenness: f64,
    pub closeness: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RankedNode {
    pub id: String,
    pub score: f64,
}

/// Statistics of the analyzed graph (the sample, when sampling applies).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GraphStats {
    pub node_count: usize,
    pub edge_count: usize,
    pub component_count: usize,
    pub density: f64,
    /// Only defined for a connected, non-empty graph.
    pub diameter: Option<usize>,
    pub top_degree: Vec<RankedNode>,
    pub top_betweenness: Vec<RankedNode>,
    pub top_closeness: Vec<RankedNode>,
}

#[derive(Debug, Clone)]
pub struct CentralityReport {
    pub plan: CentralityPlan,
    /// Scores keyed by node identifier, in analyzed-graph order.
    pub scores: Vec<(String, CentralityScores)>,
    pub stats: GraphStats,
}

/// Compute centrality (sampling large graphs) and stamp the scores onto the
/// analyzed nodes of `graph`.
pub fn analyze_centrality(
    graph: &mut Graph,
    options: &CentralityOptions,
) -> CasenetResult<CentralityReport> {
    let start = Instant::now();
    let plan = CentralityPlan::for_node_count(graph.node_count());

    let (scores, stats) = match plan {
        CentralityPlan::Exact => {
            info!(nodes = graph.node_count(), "Computing exact centrality");
            compute(graph)
        }
        CentralityPlan::Sampled { sample_size } => {
            if sample_size > graph.node_count() {
                return Err(CasenetError::Centrality(format!(
                    "sample of {sample_size} exceeds {} nodes",
                    graph.node_count()
                )));
            }
            info!(nodes = graph.node_count(), sample_size, "Large graph, computing centrality on a sample");
            let mut rng = match options.seed {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => StdRng::from_entropy(),
            };
            let mut sample =
                rand::seq::index::sample(&mut rng, graph.node_count(), sample_size).into_vec();
            sample.sort_unstable();
            let sub = graph.induced_subgraph(&sample);
            compute(&sub)
        }
    };

    for (id, s) in &scores {
        if let Some(idx) = graph.node_index(id) {
            graph.set_node_attr(idx, keys::DEGREE_CENTRALITY, AttrValue::Float(s.degree));
            graph.set_node_attr(idx, keys::BETWEENNESS_CENTRALITY, AttrValue::Float(s.betweenness));
            graph.set_node_attr(idx, keys::CLOSENESS_CENTRALITY, AttrValue::Float(s.closeness));
        }
    }

    info!(
        analyzed = stats.node_count,
        components = stats.component_count,
        density = stats.density,
        elapsed_s = start.elapsed().as_secs_f64(),
        "Centrality computed"
    );
    Ok(CentralityReport { plan, scores, stats })
}

/// Exact centrality and statistics over the whole of `graph`. Does not mutate.
pub fn compute(graph: &Graph) -> (Vec<(String, CentralityScores)>, GraphStats) {
    let view = GraphView::from_graph(graph);
    let n = view.node_count;

    let mut betweenness = vec![0.0; n];
    let mut closeness = vec![0.0; n];
    let mut diameter = 0usize;
    let mut buffers = Buffers::new(n);

    for source in 0..n {
        let walk = buffers.single_source(&view, source, &mut betweenness);
        diameter = diameter.max(walk.eccentricity);
        if walk.total_distance > 0 && n > 1 {
            let reached = (walk.reached - 1) as f64;
            closeness[source] = (reached / walk.total_distance as f64) * (reached / (n - 1) as f64);
        }
        if source > 0 && source % 10_000 == 0 {
            debug!(processed = source, total = n, "Centrality sources processed");
        }
    }

    if n > 2 {
        let scale = 1.0 / ((n - 1) as f64 * (n - 2) as f64);
        betweenness.iter_mut().for_each(|b| *b *= scale);
    }

    let degree: Vec<f64> = match n {
        0 => Vec::new(),
        1 => vec![1.0],
        _ => (0..n).map(|i| view.degree(i) as f64 / (n - 1) as f64).collect(),
    };

    let scores: Vec<(String, CentralityScores)> = graph
        .nodes()
        .map(|node| {
            let i = node.index;
            (
                node.id.to_string(),
                CentralityScores {
                    degree: degree[i],
                    betweenness: betweenness[i],
                    closeness: closeness[i],
                },
            )
        })
        .collect();

    let component_count = connected_components(graph).len();
    let edge_count = view.edge_count();
    let stats = GraphStats {
        node_count: n,
        edge_count,
        component_count,
        density: density(n, edge_count),
        diameter: (component_count == 1).then_some(diameter),
        top_degree: top(&scores, |s| s.degree),
        top_betweenness: top(&scores, |s| s.betweenness),
        top_closeness: top(&scores, |s| s.closeness),
    };
    (scores, stats)
}

fn density(n: usize, m: usize) -> f64 {
    if n <= 1 {
        0.0
    } else {
        2.0 * m as f64 / (n as f64 * (n - 1) as f64)
    }
}

/// Highest [`TOP_N`] scores; ties keep graph order.
fn top(
    scores: &[(String, CentralityScores)],
    metric: impl Fn(&CentralityScores) -> f64,
) -> Vec<RankedNode> {
    let mut ranked: Vec<RankedNode> = scores
        .iter()
        .map(|(id, s)| RankedNode {
            id: id.clone(),
            score: metric(s),
        })
        .collect();
    ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
    ranked.truncate(TOP_N);
    ranked
}

struct Walk {
    reached: usize,
    total_distance: usize,
    eccentricity: usize,
}

/// Per-source BFS state, reset only where the last walk touched it so that a
/// walk costs time proportional to its component.
struct Buffers {
    dist: Vec<Option<usize>>,
    sigma: Vec<f64>,
    delta: Vec<f64>,
    preds: Vec<Vec<usize>>,
    order: Vec<usize>,
    queue: VecDeque<usize>,
}

impl Buffers {
    fn new(n: usize) -> Self {
        Self {
            dist: vec![None; n],
            sigma: vec![0.0; n],
            delta: vec![0.0; n],
            preds: vec![Vec::new(); n],
            order: Vec::new(),
            queue: VecDeque::new(),
        }
    }

    fn single_source(&mut self, view: &GraphView, source: usize, betweenness: &mut [f64]) -> Walk {
        self.dist[source] = Some(0);
        self.sigma[source] = 1.0;
        self.queue.push_back(source);

        let mut total_distance = 0;
        let mut eccentricity = 0;
        while let Some(v) = self.queue.pop_front() {
            self.order.push(v);
            let dv = self.dist[v].unwrap_or_default();
            total_distance += dv;
            eccentricity = eccentricity.max(dv);
            for &w in view.neighbors(v) {
                if self.dist[w].is_none() {
                    self.dist[w] = Some(dv + 1);
                    self.queue.push_back(w);
                }
                if self.dist[w] == Some(dv + 1) {
                    self.sigma[w] += self.sigma[v];
                    self.preds[w].push(v);
                }
            }
        }

        // Dependency accumulation in reverse BFS order.
        for &w in self.order.iter().rev() {
            for &v in &self.preds[w] {
                self.delta[v] += self.sigma[v] / self.sigma[w] * (1.0 + self.delta[w]);
            }
            if w != source {
                betweenness[w] += self.delta[w];
            }
        }

        let reached = self.order.len();
        for &v in &self.order {
            self.dist[v] = None;
            self.sigma[v] = 0.0;
            self.delta[v] = 0.0;
            self.preds[v].clear();
        }
        self.order.clear();

        Walk {
            reached,
            total_distance,
            eccentricity,
        }
    }
}
