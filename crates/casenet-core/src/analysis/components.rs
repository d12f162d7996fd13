//! Connected components and per-node degree annotation.

use std::collections::VecDeque;
use tracing::info;

use crate::model::{keys, AttrValue, Graph};

/// Above this node count, enumeration logs progress as components are found.
pub const STREAMING_THRESHOLD: usize = 1_000_000;

const PROGRESS_EVERY: usize = 1_000;

/// Breadth-first walk yielding one component at a time.
///
/// Start nodes are taken in insertion order, so each component is discovered
/// from its earliest-inserted member.
struct ComponentWalker<'a> {
    graph: &'a Graph,
    visited: Vec<bool>,
    next_start: usize,
    queue: VecDeque<usize>,
}

impl<'a> ComponentWalker<'a> {
    fn new(graph: &'a Graph) -> Self {
        Self {
            graph,
            visited: vec![false; graph.node_count()],
            next_start: 0,
            queue: VecDeque::new(),
        }
    }
}

impl Iterator for ComponentWalker<'_> {
    type Item = Vec<usize>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.next_start < self.visited.len() && self.visited[self.next_start] {
            self.next_start += 1;
        }
        if self.next_start >= self.visited.len() {
            return None;
        }

        let start = self.next_start;
        self.visited[start] = true;
        self.queue.push_back(start);
        let mut members = Vec::new();

        while let Some(node) = self.queue.pop_front() {
            members.push(node);
            for &neighbor in self.graph.neighbors(node) {
                if !self.visited[neighbor] {
                    self.visited[neighbor] = true;
                    self.queue.push_back(neighbor);
                }
            }
        }
        Some(members)
    }
}

/// Connected components as node index lists, largest first.
///
/// Components of equal size keep discovery order (the sort is stable).
pub fn connected_components(graph: &Graph) -> Vec<Vec<usize>> {
    let streaming = graph.node_count() > STREAMING_THRESHOLD;
    if streaming {
        info!(nodes = graph.node_count(), "Large graph, enumerating components progressively");
    }

    let mut components = Vec::new();
    for component in ComponentWalker::new(graph) {
        components.push(component);
        if streaming && components.len() % PROGRESS_EVERY == 0 {
            info!(found = components.len(), "Components discovered");
        }
    }

    components.sort_by(|a, b| b.len().cmp(&a.len()));
    components
}

/// Outcome of [`annotate_components`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComponentSummary {
    pub count: usize,
    /// Component sizes, index 0 = largest.
    pub sizes: Vec<usize>,
}

impl ComponentSummary {
    pub fn largest(&self) -> usize {
        self.sizes.first().copied().unwrap_or(0)
    }
}

/// Stamp `componente` (0 = largest) and `grado` on every node.
pub fn annotate_components(graph: &mut Graph) -> ComponentSummary {
    let components = connected_components(graph);

    for (component_idx, members) in components.iter().enumerate() {
        for &node in members {
            let degree = graph.neighbors(node).len();
            graph.set_node_attr(node, keys::COMPONENT, AttrValue::from(component_idx));
            graph.set_node_attr(node, keys::DEGREE, AttrValue::from(degree));
        }
    }

    let summary = ComponentSummary {
        count: components.len(),
        sizes: components.iter().map(Vec::len).collect(),
    };
    info!(
        components = summary.count,
        largest = summary.largest(),
        "Components annotated"
    );
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Attributes;

    fn link(g: &mut Graph, a: &str, b: &str) {
        g.merge_edge(a, b, Attributes::new());
    }

    fn component_of(g: &Graph, id: &str) -> i64 {
        g.node_attr(id, keys::COMPONENT).and_then(AttrValue::as_i64).unwrap()
    }

    #[test]
    fn test_components_sorted_by_size() {
        let mut g = Graph::new();
        link(&mut g, "x1", "x2");
        link(&mut g, "C1", "P1");
        link(&mut g, "C1", "P2");
        link(&mut g, "C2", "P1");
        g.merge_node("solo", Attributes::new());

        let summary = annotate_components(&mut g);

        assert_eq!(summary.count, 3);
        assert_eq!(summary.sizes, vec![4, 2, 1]);
        assert_eq!(component_of(&g, "P2"), 0);
        assert_eq!(component_of(&g, "x1"), 1);
        assert_eq!(component_of(&g, "solo"), 2);
    }

    #[test]
    fn test_equal_sizes_keep_discovery_order() {
        let mut g = Graph::new();
        link(&mut g, "b1", "b2");
        link(&mut g, "a1", "a2");
        link(&mut g, "c1", "c2");

        annotate_components(&mut g);

        assert_eq!(component_of(&g, "b2"), 0);
        assert_eq!(component_of(&g, "a1"), 1);
        assert_eq!(component_of(&g, "c1"), 2);
    }

    #[test]
    fn test_degree_counts_distinct_edges() {
        let mut g = Graph::new();
        link(&mut g, "C1", "P1");
        link(&mut g, "P1", "C1");
        link(&mut g, "C2", "P1");
        link(&mut g, "P1", "P1");

        annotate_components(&mut g);

        assert_eq!(g.node_attr("P1", keys::DEGREE), Some(&AttrValue::Int(3)));
        assert_eq!(g.node_attr("C1", keys::DEGREE), Some(&AttrValue::Int(1)));
    }

    #[test]
    fn test_empty_graph() {
        let mut g = Graph::new();
        let summary = annotate_components(&mut g);
        assert_eq!(summary.count, 0);
        assert_eq!(summary.largest(), 0);
    }
}
