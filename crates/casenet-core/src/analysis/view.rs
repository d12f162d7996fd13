//! Read-only, dense view of the graph topology for algorithm execution.

use crate::model::Graph;

/// Undirected adjacency in Compressed Sparse Row form.
///
/// Indices match the source graph's node indices.
pub struct GraphView {
    pub node_count: usize,
    /// Offsets into `targets`. Size = node_count + 1
    offsets: Vec<usize>,
    /// Contiguous neighbor indices
    targets: Vec<usize>,
}

impl GraphView {
    pub fn from_graph(graph: &Graph) -> Self {
        let node_count = graph.node_count();
        let mut offsets = Vec::with_capacity(node_count + 1);
        let mut targets = Vec::new();

        offsets.push(0);
        for idx in 0..node_count {
            targets.extend_from_slice(graph.neighbors(idx));
            offsets.push(targets.len());
        }

        Self {
            node_count,
            offsets,
            targets,
        }
    }

    pub fn degree(&self, idx: usize) -> usize {
        self.offsets[idx + 1] - self.offsets[idx]
    }

    pub fn neighbors(&self, idx: usize) -> &[usize] {
        &self.targets[self.offsets[idx]..self.offsets[idx + 1]]
    }

    /// Number of undirected edges, self-loops counted once.
    pub fn edge_count(&self) -> usize {
        let loops = (0..self.node_count)
            .filter(|&i| self.neighbors(i).contains(&i))
            .count();
        (self.targets.len() - loops) / 2 + loops
    }
}
