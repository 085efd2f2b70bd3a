#![cfg(test)]

use std::collections::HashMap;

use crate::plugin_system::graph::{ConstraintGraph, EdgeKind};
use crate::plugin_system::sort::{stable_topological_sort, topological_levels};

fn graph_with_nodes(names: &[&str]) -> ConstraintGraph {
    let mut graph = ConstraintGraph::new();
    for name in names {
        graph.add_node(name);
    }
    graph
}

#[test]
fn unconstrained_sort_keeps_insertion_order() {
    let graph = graph_with_nodes(&["c", "a", "b"]);
    let order = stable_topological_sort(&graph).unwrap();
    assert_eq!(order, vec!["c", "a", "b"]);
}

#[test]
fn dependencies_come_before_dependents() {
    let mut graph = graph_with_nodes(&["app", "db", "log"]);
    // app depends on db, db depends on log.
    graph.add_edge("db", "app", EdgeKind::Dep);
    graph.add_edge("log", "db", EdgeKind::Dep);

    let order = stable_topological_sort(&graph).unwrap();
    let index: HashMap<&str, usize> = order.iter().enumerate().map(|(i, n)| (n.as_str(), i)).collect();
    assert!(index["log"] < index["db"]);
    assert!(index["db"] < index["app"]);
}

#[test]
fn output_is_bit_identical_across_runs() {
    let mut graph = graph_with_nodes(&["e", "d", "c", "b", "a"]);
    graph.add_edge("a", "b", EdgeKind::Dep);
    graph.add_edge("c", "d", EdgeKind::User);

    let first = stable_topological_sort(&graph).unwrap();
    for _ in 0..10 {
        assert_eq!(stable_topological_sort(&graph).unwrap(), first);
    }
}

#[test]
fn cycle_is_reported_with_a_concrete_path() {
    let mut graph = graph_with_nodes(&["a", "b", "c"]);
    graph.add_edge("a", "b", EdgeKind::Dep);
    graph.add_edge("b", "c", EdgeKind::Dep);
    graph.add_edge("c", "a", EdgeKind::Dep);

    let cycle = stable_topological_sort(&graph).unwrap_err();
    // The path closes on itself and walks real edges.
    assert!(cycle.path.len() >= 3);
    assert_eq!(cycle.path.first(), cycle.path.last());
    for pair in cycle.path.windows(2) {
        assert!(
            graph.outgoing(&pair[0]).iter().any(|e| e.to == pair[1]),
            "no edge {} -> {}",
            pair[0],
            pair[1]
        );
    }
}

#[test]
fn partial_cycle_leaves_no_partial_order() {
    let mut graph = graph_with_nodes(&["free", "x", "y"]);
    graph.add_edge("x", "y", EdgeKind::Dep);
    graph.add_edge("y", "x", EdgeKind::Dep);

    // Even though "free" is sortable, the sorter fails as a whole.
    let cycle = stable_topological_sort(&graph).unwrap_err();
    assert!(cycle.path.contains(&"x".to_string()));
    assert!(cycle.path.contains(&"y".to_string()));
}

#[test]
fn levels_group_independent_nodes() {
    let mut graph = graph_with_nodes(&["a", "b", "c", "d"]);
    // c depends on a and b; d depends on c.
    graph.add_edge("a", "c", EdgeKind::Dep);
    graph.add_edge("b", "c", EdgeKind::Dep);
    graph.add_edge("c", "d", EdgeKind::Dep);

    let index: HashMap<String, usize> = ["a", "b", "c", "d"]
        .iter()
        .enumerate()
        .map(|(i, n)| (n.to_string(), i))
        .collect();
    let levels = topological_levels(&graph, &index);
    assert_eq!(levels, vec![
        vec!["a".to_string(), "b".to_string()],
        vec!["c".to_string()],
        vec!["d".to_string()],
    ]);
}
