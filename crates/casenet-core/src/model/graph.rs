use indexmap::IndexMap;

use super::{keys, AttrValue, Attributes, NodeKind};

/// Result of a node or edge merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    Created,
    Updated,
}

impl MergeOutcome {
    pub fn is_created(&self) -> bool {
        matches!(self, MergeOutcome::Created)
    }
}

#[derive(Debug, Clone)]
struct EdgeData {
    source: usize,
    target: usize,
    attrs: Attributes,
}

/// Undirected graph with string-keyed nodes and at most one edge per pair.
///
/// Node indices are dense and follow insertion order; nodes are never removed,
/// so an index stays valid for the lifetime of the graph.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    nodes: IndexMap<String, Attributes>,
    edges: IndexMap<(usize, usize), EdgeData>,
    adjacency: Vec<Vec<usize>>,
}

/// Borrowed view of a node.
#[derive(Debug, Clone, Copy)]
pub struct NodeRef<'a> {
    pub index: usize,
    pub id: &'a str,
    pub attrs: &'a Attributes,
}

impl NodeRef<'_> {
    pub fn kind(&self) -> NodeKind {
        NodeKind::of(self.attrs)
    }
}

/// Borrowed view of an edge, oriented as first inserted.
#[derive(Debug, Clone, Copy)]
pub struct EdgeRef<'a> {
    pub source: &'a str,
    pub target: &'a str,
    pub attrs: &'a Attributes,
}

fn edge_key(a: usize, b: usize) -> (usize, usize) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains_node(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn node_index(&self, id: &str) -> Option<usize> {
        self.nodes.get_index_of(id)
    }

    /// Identifier of the node at `index`.
    pub fn node_id(&self, index: usize) -> Option<&str> {
        self.nodes.get_index(index).map(|(id, _)| id.as_str())
    }

    pub fn node(&self, id: &str) -> Option<&Attributes> {
        self.nodes.get(id)
    }

    pub fn node_attr(&self, id: &str, key: &str) -> Option<&AttrValue> {
        self.nodes.get(id).and_then(|attrs| attrs.get(key))
    }

    /// Set a single attribute on the node at `index`.
    pub fn set_node_attr(&mut self, index: usize, key: &str, value: AttrValue) {
        if let Some((_, attrs)) = self.nodes.get_index_mut(index) {
            attrs.insert(key.to_string(), value);
        }
    }

    pub fn nodes(&self) -> impl Iterator<Item = NodeRef<'_>> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(index, (id, attrs))| NodeRef {
                index,
                id: id.as_str(),
                attrs,
            })
    }

    pub fn edges(&self) -> impl Iterator<Item = EdgeRef<'_>> {
        self.edges.values().filter_map(|edge| {
            Some(EdgeRef {
                source: self.node_id(edge.source)?,
                target: self.node_id(edge.target)?,
                attrs: &edge.attrs,
            })
        })
    }

    /// Neighbor indices of the node at `index`, one entry per distinct edge.
    pub fn neighbors(&self, index: usize) -> &[usize] {
        &self.adjacency[index]
    }

    /// Number of distinct edges incident to `id`.
    pub fn degree(&self, id: &str) -> Option<usize> {
        self.node_index(id).map(|i| self.adjacency[i].len())
    }

    pub fn has_edge(&self, a: &str, b: &str) -> bool {
        match (self.node_index(a), self.node_index(b)) {
            (Some(ia), Some(ib)) => self.edges.contains_key(&edge_key(ia, ib)),
            _ => false,
        }
    }

    pub fn edge(&self, a: &str, b: &str) -> Option<&Attributes> {
        let (ia, ib) = (self.node_index(a)?, self.node_index(b)?);
        self.edges.get(&edge_key(ia, ib)).map(|e| &e.attrs)
    }

    /// Insert a node or update an existing one additively: incoming keys are
    /// added or overwritten, keys absent from `attrs` are left untouched.
    pub fn merge_node(&mut self, id: &str, attrs: Attributes) -> MergeOutcome {
        if let Some(existing) = self.nodes.get_mut(id) {
            existing.extend(attrs);
            return MergeOutcome::Updated;
        }
        self.nodes.insert(id.to_string(), attrs);
        self.adjacency.push(Vec::new());
        MergeOutcome::Created
    }

    /// Create a minimal entity node flagged as synthesized if `id` is absent.
    /// Returns true when a placeholder was created.
    pub fn ensure_placeholder(&mut self, id: &str) -> bool {
        if self.contains_node(id) {
            return false;
        }
        let mut attrs = Attributes::new();
        attrs.insert(keys::NAME.to_string(), AttrValue::from(id));
        attrs.insert(
            keys::TIPO.to_string(),
            AttrValue::from(NodeKind::Entity.tipo()),
        );
        attrs.insert(keys::SYNTHESIZED.to_string(), AttrValue::Bool(true));
        self.merge_node(id, attrs);
        true
    }

    /// Insert an edge or union `attrs` into the existing edge between `a` and
    /// `b`. Missing endpoints are synthesized as placeholders first.
    pub fn merge_edge(&mut self, a: &str, b: &str, attrs: Attributes) -> MergeOutcome {
        let ia = self.endpoint(a);
        let ib = self.endpoint(b);

        let key = edge_key(ia, ib);
        if let Some(edge) = self.edges.get_mut(&key) {
            edge.attrs.extend(attrs);
            return MergeOutcome::Updated;
        }

        self.edges.insert(
            key,
            EdgeData {
                source: ia,
                target: ib,
                attrs,
            },
        );
        // Self-loops are a single adjacency entry.
        self.adjacency[ia].push(ib);
        if ia != ib {
            self.adjacency[ib].push(ia);
        }
        MergeOutcome::Created
    }

    /// Index of `id`, synthesizing a placeholder when absent.
    fn endpoint(&mut self, id: &str) -> usize {
        match self.node_index(id) {
            Some(index) => index,
            None => {
                self.ensure_placeholder(id);
                self.nodes.len() - 1
            }
        }
    }

    /// Induced subgraph on `indices` (attributes copied, order preserved).
    pub fn induced_subgraph(&self, indices: &[usize]) -> Graph {
        let mut sub = Graph::new();
        for (id, attrs) in indices.iter().filter_map(|&i| self.nodes.get_index(i)) {
            sub.merge_node(id, attrs.clone());
        }
        for edge in self.edges() {
            if sub.contains_node(edge.source) && sub.contains_node(edge.target) {
                sub.merge_edge(edge.source, edge.target, edge.attrs.clone());
            }
        }
        sub
    }

    /// Count nodes per kind.
    pub fn count_kind(&self, kind: NodeKind) -> usize {
        self.nodes().filter(|n| n.kind() == kind).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::attrs;

    #[test]
    fn test_merge_node_is_additive() {
        let mut g = Graph::new();
        let first = g.merge_node("n1", attrs([("name", "A"), ("fuente", "x")]));
        let second = g.merge_node("n1", attrs([("name", "B"), ("seccional", "y")]));

        assert_eq!(first, MergeOutcome::Created);
        assert_eq!(second, MergeOutcome::Updated);
        assert_eq!(g.node_count(), 1);
        let node = g.node("n1").unwrap();
        assert_eq!(node["name"], AttrValue::from("B"));
        assert_eq!(node["fuente"], AttrValue::from("x"));
        assert_eq!(node["seccional"], AttrValue::from("y"));
    }

    #[test]
    fn test_merge_edge_deduplicates_both_orientations() {
        let mut g = Graph::new();
        g.merge_node("a", Attributes::new());
        g.merge_node("b", Attributes::new());
        assert!(g.merge_edge("a", "b", attrs([("calidad_vinculo", "x")])).is_created());
        assert_eq!(
            g.merge_edge("b", "a", attrs([("extra", "y")])),
            MergeOutcome::Updated
        );

        assert_eq!(g.edge_count(), 1);
        assert_eq!(g.degree("a"), Some(1));
        let edge = g.edge("a", "b").unwrap();
        assert_eq!(edge.len(), 2);
        let only = g.edges().next().unwrap();
        assert_eq!((only.source, only.target), ("a", "b"));
    }

    #[test]
    fn test_merge_edge_creates_placeholders() {
        let mut g = Graph::new();
        g.merge_edge("x", "y", Attributes::new());

        assert_eq!(g.node_count(), 2);
        for id in ["x", "y"] {
            assert_eq!(g.node_attr(id, keys::SYNTHESIZED), Some(&AttrValue::Bool(true)));
            assert_eq!(g.node_attr(id, keys::TIPO), Some(&AttrValue::from("entidad")));
        }
    }

    #[test]
    fn test_self_loop_counts_once() {
        let mut g = Graph::new();
        g.merge_edge("a", "a", Attributes::new());
        assert_eq!(g.degree("a"), Some(1));
        assert_eq!(g.edge_count(), 1);
    }

    #[test]
    fn test_induced_subgraph() {
        let mut g = Graph::new();
        g.merge_edge("a", "b", Attributes::new());
        g.merge_edge("b", "c", Attributes::new());
        let sub = g.induced_subgraph(&[0, 1]);
        assert_eq!(sub.node_count(), 2);
        assert_eq!(sub.edge_count(), 1);
        assert!(sub.has_edge("a", "b"));
    }

    #[test]
    fn test_node_id_out_of_range() {
        let mut g = Graph::new();
        g.merge_node("a", Attributes::new());
        assert_eq!(g.node_id(0), Some("a"));
        assert_eq!(g.node_id(1), None);
    }
}
