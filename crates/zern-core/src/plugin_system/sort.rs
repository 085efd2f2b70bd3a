use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};

use crate::plugin_system::graph::ConstraintGraph;

/// A cycle found during topological sorting, with one concrete path
/// (first and last element coincide).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cycle {
    pub path: Vec<String>,
}

/// Stable Kahn sort over the constraint graph.
///
/// The ready set is ordered by insertion index. The index map is
/// injective, so preference ties cannot exist and identical inputs yield
/// bit-identical output. On a cycle, the sorter's partial output is
/// discarded and one concrete cycle path is extracted by DFS.
pub fn stable_topological_sort(graph: &ConstraintGraph) -> Result<Vec<String>, Cycle> {
    let mut in_degree = graph.incoming_counts();
    let mut ready: BinaryHeap<Reverse<(usize, String)>> = BinaryHeap::new();

    for name in graph.nodes() {
        if graph.incoming_count(name) == 0 {
            let index = graph.insertion_index(name).unwrap_or(usize::MAX);
            ready.push(Reverse((index, name.clone())));
        }
    }

    let mut sorted = Vec::with_capacity(graph.node_count());
    while let Some(Reverse((_, name))) = ready.pop() {
        for edge in graph.outgoing(&name) {
            if let Some(degree) = in_degree.get_mut(&edge.to) {
                *degree -= 1;
                if *degree == 0 {
                    let index = graph.insertion_index(&edge.to).unwrap_or(usize::MAX);
                    ready.push(Reverse((index, edge.to.clone())));
                }
            }
        }
        sorted.push(name);
    }

    if sorted.len() == graph.node_count() {
        Ok(sorted)
    } else {
        Err(find_cycle(graph, &sorted))
    }
}

/// Extract one concrete cycle from the unresolved remainder via a DFS
/// that records its recursion stack.
fn find_cycle(graph: &ConstraintGraph, sorted: &[String]) -> Cycle {
    let resolved: HashSet<String> = sorted.iter().cloned().collect();
    let mut visited = HashSet::new();

    for start in graph.nodes().iter().filter(|n| !resolved.contains(*n)) {
        let mut stack = Vec::new();
        let mut on_stack = HashSet::new();
        if let Some(path) = dfs(graph, start, &resolved, &mut visited, &mut stack, &mut on_stack) {
            return Cycle { path };
        }
    }

    // The sort came up short, so a cycle must exist among the remainder;
    // fall back to naming the stuck nodes if the walk missed it.
    Cycle {
        path: graph
            .nodes()
            .iter()
            .filter(|n| !resolved.contains(*n))
            .cloned()
            .collect(),
    }
}

fn dfs(
    graph: &ConstraintGraph,
    node: &str,
    resolved: &HashSet<String>,
    visited: &mut HashSet<String>,
    stack: &mut Vec<String>,
    on_stack: &mut HashSet<String>,
) -> Option<Vec<String>> {
    visited.insert(node.to_string());
    stack.push(node.to_string());
    on_stack.insert(node.to_string());

    for edge in graph.outgoing(node) {
        if resolved.contains(&edge.to) {
            continue;
        }
        if on_stack.contains(&edge.to) {
            // Close the loop at the first occurrence of the target.
            let start = stack.iter().position(|n| n == &edge.to).unwrap_or(0);
            let mut path: Vec<String> = stack[start..].to_vec();
            path.push(edge.to.clone());
            return Some(path);
        }
        if !visited.contains(&edge.to) {
            if let Some(path) = dfs(graph, &edge.to, resolved, visited, stack, on_stack) {
                return Some(path);
            }
        }
    }

    stack.pop();
    on_stack.remove(node);
    None
}

/// Group the graph's nodes into topological levels: level `n` holds every
/// node whose unresolved predecessors all sit in earlier levels. Nodes
/// within a level are ordered by `order_index`.
///
/// The caller must have established that the graph is acyclic.
pub fn topological_levels(
    graph: &ConstraintGraph,
    order_index: &HashMap<String, usize>,
) -> Vec<Vec<String>> {
    let mut in_degree = graph.incoming_counts();
    let mut current: Vec<String> = graph
        .nodes()
        .iter()
        .filter(|n| graph.incoming_count(n.as_str()) == 0)
        .cloned()
        .collect();
    current.sort_by_key(|n| order_index.get(n).copied().unwrap_or(usize::MAX));

    let mut levels = Vec::new();
    while !current.is_empty() {
        let mut next = Vec::new();
        for name in &current {
            for edge in graph.outgoing(name) {
                if let Some(degree) = in_degree.get_mut(&edge.to) {
                    *degree -= 1;
                    if *degree == 0 {
                        next.push(edge.to.clone());
                    }
                }
            }
        }
        next.sort_by_key(|n| order_index.get(n).copied().unwrap_or(usize::MAX));
        levels.push(std::mem::replace(&mut current, next));
    }
    levels
}
