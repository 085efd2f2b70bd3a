use std::collections::{HashMap, HashSet};

/// Kind of an ordering edge.
///
/// Dependency edges are the strongest signal, then user-supplied
/// ordering, then declared load hints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EdgeKind {
    /// Declared dependency (dependency -> dependent).
    Dep,
    /// User ordering directive supplied at registration time.
    User,
    /// Plugin `load_before` / `load_after` hint.
    Hint,
}

impl EdgeKind {
    /// Resolution weight of this edge kind.
    pub fn weight(&self) -> u8 {
        match self {
            EdgeKind::Dep => 3,
            EdgeKind::User => 2,
            EdgeKind::Hint => 1,
        }
    }
}

/// A typed directed edge to `to`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edge {
    pub to: String,
    pub kind: EdgeKind,
}

/// Directed multigraph of plugin names with typed edges and incrementally
/// maintained per-node in-degree counters.
///
/// Node enumeration order is insertion order.
#[derive(Debug, Default, Clone)]
pub struct ConstraintGraph {
    nodes: Vec<String>,
    index: HashMap<String, usize>,
    outgoing: HashMap<String, Vec<Edge>>,
    incoming: HashMap<String, usize>,
    seen_edges: HashSet<(String, String, EdgeKind)>,
}

impl ConstraintGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a node. Returns `false` if the node already exists.
    pub fn add_node(&mut self, name: &str) -> bool {
        if self.index.contains_key(name) {
            return false;
        }
        self.index.insert(name.to_string(), self.nodes.len());
        self.nodes.push(name.to_string());
        self.outgoing.insert(name.to_string(), Vec::new());
        self.incoming.insert(name.to_string(), 0);
        true
    }

    pub fn has_node(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Adds an edge `from -> to`.
    ///
    /// Self-edges are silently dropped, as are edges whose endpoints are
    /// not registered nodes. Adding the exact same (from, to, kind) twice
    /// is idempotent. Returns whether an edge was actually added.
    pub fn add_edge(&mut self, from: &str, to: &str, kind: EdgeKind) -> bool {
        if from == to {
            return false;
        }
        if !self.index.contains_key(from) || !self.index.contains_key(to) {
            return false;
        }
        let key = (from.to_string(), to.to_string(), kind);
        if !self.seen_edges.insert(key) {
            return false;
        }
        if let Some(edges) = self.outgoing.get_mut(from) {
            edges.push(Edge { to: to.to_string(), kind });
        }
        if let Some(count) = self.incoming.get_mut(to) {
            *count += 1;
        }
        true
    }

    /// Node names in insertion order.
    pub fn nodes(&self) -> &[String] {
        &self.nodes
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Zero-based insertion index of a node.
    pub fn insertion_index(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    /// Outgoing edges of a node; empty for unknown nodes.
    pub fn outgoing(&self, name: &str) -> &[Edge] {
        self.outgoing.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Current incoming-edge count of a node.
    pub fn incoming_count(&self, name: &str) -> usize {
        self.incoming.get(name).copied().unwrap_or(0)
    }

    /// Decrements the incoming counter of a node, saturating at zero.
    /// Returns the new count.
    pub fn decrement_incoming(&mut self, name: &str) -> usize {
        match self.incoming.get_mut(name) {
            Some(count) => {
                *count = count.saturating_sub(1);
                *count
            }
            None => 0,
        }
    }

    /// Snapshot of all in-degree counters, for non-destructive sorts.
    pub fn incoming_counts(&self) -> HashMap<String, usize> {
        self.incoming.clone()
    }

    /// Copy of this graph with every edge of `kind` removed.
    pub fn without_edges(&self, kind: EdgeKind) -> ConstraintGraph {
        let mut graph = ConstraintGraph::new();
        for node in &self.nodes {
            graph.add_node(node);
        }
        for node in &self.nodes {
            for edge in self.outgoing(node) {
                if edge.kind != kind {
                    graph.add_edge(node, &edge.to, edge.kind);
                }
            }
        }
        graph
    }
}
