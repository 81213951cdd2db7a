//! Integration tests for the refresh pipeline
//!
//! Tests cover:
//! - Model mapping over sequences and single entities
//! - Asynchronous generators driven by the runtime
//! - Failures never reaching the continuation
//! - Results discarded after a subscription stops
//! - Data source generators
//! - Runtime-bound generators invoked without a runtime

use super::test_utils::sink;
use context_graph::{
    ContextGraph, ContextSpec, DataSource, Generator, MemorySource, RefreshError, SelectOptions,
};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Notify};

fn tagged_graph() -> ContextGraph {
    let graph = ContextGraph::new();
    graph
        .register(ContextSpec::new("site").with_model(|mut v: Value| {
            v["modeled"] = json!(true);
            v
        }))
        .unwrap();
    graph
}

/// Generator that blocks on `gate` and counts how often it settled.
fn gated(gate: Arc<Notify>, settled: Arc<AtomicUsize>, result: Value) -> Generator {
    Generator::new(move || {
        let gate = gate.clone();
        let settled = settled.clone();
        let result = result.clone();
        async move {
            gate.notified().await;
            settled.fetch_add(1, Ordering::SeqCst);
            Ok(result)
        }
    })
}

async fn wait_for(counter: &AtomicUsize, expected: usize) {
    tokio::time::timeout(Duration::from_secs(2), async {
        while counter.load(Ordering::SeqCst) < expected {
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("generator did not settle in time");
}

#[test]
fn test_refresh_maps_model_over_sequences() {
    let graph = tagged_graph();
    let (and_then, seen) = sink();
    graph
        .handle("site")
        .refresh(&Generator::value(json!([{"uuid": 1}, {"uuid": 2}])), and_then)
        .unwrap();

    assert_eq!(
        *seen.lock(),
        vec![json!([{"uuid": 1, "modeled": true}, {"uuid": 2, "modeled": true}])]
    );
}

#[test]
fn test_refresh_applies_model_to_single_value() {
    let graph = tagged_graph();
    let (and_then, seen) = sink();
    graph
        .handle("site")
        .refresh(&Generator::value(json!({"uuid": 1})), and_then)
        .unwrap();
    assert_eq!(*seen.lock(), vec![json!({"uuid": 1, "modeled": true})]);
}

#[test]
fn test_refresh_failure_is_swallowed() {
    let graph = tagged_graph();
    graph.select("site", json!({"uuid": 1}), SelectOptions::default());

    let (and_then, seen) = sink();
    let failing = Generator::ready(|| Err(RefreshError::SourceUnavailable("offline".to_string())));
    let subscription = graph.handle("site").using(failing, and_then, false).unwrap();

    graph.select("site", json!({"uuid": 2}), SelectOptions::default());

    assert!(seen.lock().is_empty());
    assert!(subscription.is_active());
    assert_eq!(graph.current("site", false), Some(json!({"uuid": 2})), "no rollback");
}

#[test]
fn test_refresh_on_unregistered_context_fails() {
    let graph = ContextGraph::new();
    let result = graph.refreshing("ghost", &Generator::value(json!([])), |_| {});
    assert!(result.is_err());
}

#[tokio::test]
async fn test_async_generator_delivers_through_runtime() {
    let graph = tagged_graph();
    let gate = Arc::new(Notify::new());
    let settled = Arc::new(AtomicUsize::new(0));
    let (tx, mut rx) = mpsc::unbounded_channel();

    graph
        .handle("site")
        .using(
            gated(gate.clone(), settled.clone(), json!([{"uuid": "s-1"}])),
            move |sites| {
                let _ = tx.send(sites);
            },
            false,
        )
        .unwrap();

    assert!(rx.try_recv().is_err(), "pending generator must not deliver synchronously");
    gate.notify_one();

    let delivered = tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(delivered, json!([{"uuid": "s-1", "modeled": true}]));
}

#[tokio::test]
async fn test_result_discarded_after_stop() {
    let graph = tagged_graph();
    let gate = Arc::new(Notify::new());
    let settled = Arc::new(AtomicUsize::new(0));
    let (and_then, seen) = sink();

    let subscription = graph
        .handle("site")
        .using(
            gated(gate.clone(), settled.clone(), json!({"uuid": "late"})),
            and_then,
            false,
        )
        .unwrap();

    subscription.stop();
    gate.notify_one();
    wait_for(&settled, 1).await;
    tokio::task::yield_now().await;

    assert!(seen.lock().is_empty());
}

#[tokio::test]
async fn test_data_source_generators() {
    let graph = ContextGraph::new();
    graph.register(ContextSpec::new("quote")).unwrap();
    let quotes = Arc::new(MemorySource::new(vec![
        json!({"uuid": "q-1", "siteId": 9}),
        json!({"uuid": "q-2", "siteId": 4}),
    ]));

    let (all_then, listed) = sink();
    graph
        .handle("quote")
        .refresh(&Generator::all(quotes.clone()), all_then)
        .unwrap();
    assert_eq!(listed.lock()[0].as_array().map(Vec::len), Some(2));

    let (one_then, found) = sink();
    graph
        .handle("quote")
        .refresh(&Generator::by_id(quotes.clone(), json!("q-2")), one_then)
        .unwrap();
    assert_eq!(*found.lock(), vec![json!({"uuid": "q-2", "siteId": 4})]);

    let (missing_then, missing) = sink();
    graph
        .handle("quote")
        .refresh(&Generator::by_id(quotes.clone(), json!("q-9")), missing_then)
        .unwrap();
    assert!(missing.lock().is_empty());

    let selected = quotes.by_id(&json!("q-1")).await.unwrap();
    graph.handle("quote").select(selected).unwrap();
    assert!(graph.handle("quote").exists());
}

#[test]
fn test_select_survives_timer_generator_without_runtime() {
    let graph = tagged_graph();
    let (and_then, seen) = sink();
    graph
        .handle("site")
        .using(
            Generator::new(|| async {
                tokio::time::sleep(Duration::from_millis(1)).await;
                Ok(json!([]))
            }),
            and_then,
            true,
        )
        .unwrap();

    let returned = graph.select("site", json!({"uuid": 1}), SelectOptions::default());

    assert_eq!(returned, json!({"uuid": 1}));
    assert_eq!(graph.current("site", false), Some(json!({"uuid": 1})));
    assert!(seen.lock().is_empty());
}

#[test]
fn test_upserted_entities_reach_next_refresh() {
    let graph = ContextGraph::new();
    graph.register(ContextSpec::new("site")).unwrap();
    let sites = Arc::new(MemorySource::new(vec![json!({"uuid": "s-1"})]));
    let (and_then, seen) = sink();
    graph
        .handle("site")
        .using(Generator::all(sites.clone()), and_then, false)
        .unwrap();
    assert_eq!(seen.lock()[0], json!([{"uuid": "s-1"}]));

    sites.upsert(json!({"uuid": "s-2"}));
    sites.upsert(json!({"uuid": "s-1", "label": "North"}));
    graph.select("site", json!({"uuid": "s-2"}), SelectOptions::default());

    assert_eq!(
        seen.lock()[1],
        json!([{"uuid": "s-1", "label": "North"}, {"uuid": "s-2"}])
    );
}
