//! Integration tests for clearing
//!
//! Tests cover:
//! - Default clear removes data and listeners transitively
//! - Unreachable contexts are untouched
//! - Partial clear flags

use super::test_utils::{graph_with, record};
use context_graph::{ClearOptions, ContextGraph, SelectOptions};
use serde_json::json;

fn populated() -> ContextGraph {
    let graph = graph_with(&[
        ("user", &["quote"]),
        ("quote", &["site", "line"]),
        ("site", &["region"]),
        ("line", &[]),
        ("region", &[]),
        ("catalog", &["line"]),
    ]);
    // Roots first, so later selections do not clear earlier ones.
    for name in ["catalog", "user", "quote", "site", "line", "region"] {
        graph.select(name, json!({"uuid": name}), SelectOptions::default());
        graph.subscribe(name, |_| {});
    }
    graph
}

#[test]
fn test_clear_removes_reachable_data_and_listeners() {
    let graph = populated();
    graph.handle("quote").clear().unwrap();

    for name in ["quote", "site", "line", "region"] {
        assert_eq!(graph.current(name, false), None, "{} data", name);
        assert_eq!(graph.listener_count(name), 0, "{} listeners", name);
    }
    for name in ["user", "catalog"] {
        assert!(graph.current(name, false).is_some(), "{} data kept", name);
        assert_eq!(graph.listener_count(name), 1, "{} listener kept", name);
    }
}

#[test]
fn test_clear_without_self_keeps_own_data_but_drops_own_listeners() {
    let graph = populated();
    graph.clear(
        "quote",
        ClearOptions {
            clear_self: false,
            ..ClearOptions::default()
        },
    );

    assert_eq!(graph.current("quote", false), Some(json!({"uuid": "quote"})));
    assert_eq!(graph.listener_count("quote"), 0);
    assert_eq!(graph.current("region", false), None);
}

#[test]
fn test_clear_subscriptions_keeps_data() {
    let graph = populated();
    graph.handle("user").clear_subscriptions().unwrap();

    for name in ["user", "quote", "site", "line", "region"] {
        assert!(graph.current(name, false).is_some(), "{} data kept", name);
        assert_eq!(graph.listener_count(name), 0, "{} listeners", name);
    }
    assert_eq!(graph.listener_count("catalog"), 1);
}

#[test]
fn test_descendant_data_clear_keeps_listeners() {
    let graph = populated();
    graph.clear("user", ClearOptions::descendant_data());

    assert!(graph.current("user", false).is_some());
    for name in ["quote", "site", "line", "region"] {
        assert_eq!(graph.current(name, false), None);
        assert_eq!(graph.listener_count(name), 1);
    }
}

#[test]
fn test_clear_terminates_on_cyclic_relations() {
    let graph = graph_with(&[("a", &["b"]), ("b", &["a"])]);
    graph.select("b", json!({"uuid": "b"}), SelectOptions::default());
    graph.select("a", json!({"uuid": "a"}), SelectOptions::default());

    assert_eq!(graph.current("a", false), Some(json!({"uuid": "a"})));
    assert_eq!(graph.current("b", false), None);

    graph.clear("a", ClearOptions::default());
    assert_eq!(graph.current("a", false), None);
}

#[test]
fn test_cleared_context_can_be_reselected() {
    let graph = graph_with(&[("user", &[])]);
    graph.select("user", json!({"uuid": "a"}), SelectOptions::default());
    graph.handle("user").clear().unwrap();

    let events = record(&graph, "user");
    graph.select("user", json!({"uuid": "a"}), SelectOptions::default());
    assert_eq!(events.lock().len(), 1, "same data publishes again after clear");
}
