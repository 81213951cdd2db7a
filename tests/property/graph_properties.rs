//! Random relation graphs: idempotent selection, invalidation before notify,
//! clear completeness.

use context_graph::{ClearOptions, ContextGraph, ContextSpec, SelectOptions};
use parking_lot::Mutex;
use proptest::prelude::*;
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

const NODES: usize = 7;

fn name(index: usize) -> String {
    format!("ctx-{}", index)
}

/// Acyclic graph: edges only point from lower to higher indices.
fn build(edges: &[bool]) -> (ContextGraph, Vec<Vec<usize>>) {
    let graph = ContextGraph::new();
    let mut adjacency = vec![Vec::new(); NODES];
    for from in 0..NODES {
        for to in (from + 1)..NODES {
            if edges[from * NODES + to] {
                adjacency[from].push(to);
            }
        }
        let rels: Vec<String> = adjacency[from].iter().map(|&to| name(to)).collect();
        graph.register(ContextSpec::new(name(from)).with_rels(rels)).unwrap();
    }
    (graph, adjacency)
}

fn reachable(adjacency: &[Vec<usize>], root: usize) -> HashSet<usize> {
    let mut seen = HashSet::new();
    let mut stack = adjacency[root].clone();
    while let Some(node) = stack.pop() {
        if seen.insert(node) {
            stack.extend(adjacency[node].iter().copied());
        }
    }
    seen
}

fn payload(fields: &BTreeMap<String, i64>) -> Value {
    json!(fields)
}

proptest! {
    #[test]
    fn select_same_data_publishes_once(
        fields in prop::collection::btree_map("[a-z]{1,6}", any::<i64>(), 0..6),
        repeats in 2usize..5,
    ) {
        let graph = ContextGraph::new();
        graph.register(ContextSpec::new("user")).unwrap();
        let count = Arc::new(Mutex::new(0usize));
        let counter = count.clone();
        graph.subscribe("user", move |_| *counter.lock() += 1);

        for _ in 0..repeats {
            let returned = graph.select("user", payload(&fields), SelectOptions::default());
            prop_assert_eq!(returned, payload(&fields));
        }
        prop_assert_eq!(*count.lock(), 1);
    }

    #[test]
    fn descendants_empty_when_direct_relations_notified(
        edges in prop::collection::vec(any::<bool>(), NODES * NODES),
        root in 0usize..NODES,
    ) {
        let (graph, adjacency) = build(&edges);
        for index in 0..NODES {
            graph.select(&name(index), json!({"uuid": index}), SelectOptions::default());
        }

        let descendants = reachable(&adjacency, root);
        let violations = Arc::new(Mutex::new(Vec::new()));
        for &direct in &adjacency[root] {
            let observer = graph.clone();
            let watched: Vec<String> = descendants.iter().map(|&d| name(d)).collect();
            let sink = violations.clone();
            graph.subscribe(&name(direct), move |_| {
                for other in &watched {
                    if observer.current(other, false).is_some() {
                        sink.lock().push(other.clone());
                    }
                }
            });
        }

        graph.select(&name(root), json!({"uuid": "fresh"}), SelectOptions::default());
        let stale = violations.lock().clone();
        prop_assert!(stale.is_empty(), "stale: {:?}", stale);
    }

    #[test]
    fn clear_reaches_exactly_the_descendants(
        edges in prop::collection::vec(any::<bool>(), NODES * NODES),
        root in 0usize..NODES,
    ) {
        let (graph, adjacency) = build(&edges);
        for index in 0..NODES {
            graph.select(&name(index), json!({"uuid": index}), SelectOptions::default());
            graph.subscribe(&name(index), |_| {});
        }

        graph.clear(&name(root), ClearOptions::default());

        let descendants = reachable(&adjacency, root);
        for index in 0..NODES {
            let cleared = index == root || descendants.contains(&index);
            prop_assert_eq!(graph.current(&name(index), false).is_none(), cleared);
            prop_assert_eq!(graph.listener_count(&name(index)) == 0, cleared);
        }
    }
}
