//! Subscription Table
//!
//! Per-graph publish/subscribe table keyed by relation name. Listeners are
//! dispatched synchronously in subscription order. Removal is bulk only: all
//! listeners of a relation go at once.

use crate::types::Listener;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tracing::debug;

#[derive(Clone)]
struct Entry {
    alive: Arc<AtomicBool>,
    listener: Listener,
}

/// Listener table shared by a context graph.
#[derive(Default)]
pub struct SubscriptionTable {
    listeners: Mutex<HashMap<String, Vec<Entry>>>,
}

impl SubscriptionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener for `rel`; the returned flag stays true until the
    /// relation is unsubscribed.
    pub fn subscribe(&self, rel: &str, listener: Listener) -> Arc<AtomicBool> {
        let alive = Arc::new(AtomicBool::new(true));
        self.attach(rel, listener, alive.clone());
        alive
    }

    /// Register a listener under an existing liveness flag.
    pub fn attach(&self, rel: &str, listener: Listener, alive: Arc<AtomicBool>) {
        self.listeners
            .lock()
            .entry(rel.to_string())
            .or_default()
            .push(Entry { alive, listener });
    }

    /// Remove every listener registered for `rel`. Returns how many were removed.
    pub fn unsubscribe(&self, rel: &str) -> usize {
        let removed = self.listeners.lock().remove(rel).unwrap_or_default();
        for entry in &removed {
            entry.alive.store(false, Ordering::SeqCst);
        }
        if !removed.is_empty() {
            debug!(relation = rel, removed = removed.len(), "Removed listeners");
        }
        removed.len()
    }

    /// Deliver `data` to every listener of `rel`. Returns the number invoked.
    ///
    /// The listener list is snapshotted before dispatch so listeners may
    /// subscribe, unsubscribe or publish re-entrantly. A listener removed by an
    /// earlier listener in the same dispatch is skipped.
    pub fn broadcast(&self, rel: &str, data: &Value) -> usize {
        let snapshot: Vec<Entry> = match self.listeners.lock().get(rel) {
            Some(entries) => entries.clone(),
            None => return 0,
        };

        let mut delivered = 0;
        for entry in snapshot {
            if entry.alive.load(Ordering::SeqCst) {
                (entry.listener)(data.clone());
                delivered += 1;
            }
        }
        delivered
    }

    pub fn listener_count(&self, rel: &str) -> usize {
        self.listeners.lock().get(rel).map_or(0, Vec::len)
    }
}

/// Handle returned by `subscribe` and `use`.
///
/// Dropping it does nothing; `stop` (or `unsubscribe`) removes every listener
/// of the bound relation, not just this one.
#[derive(Clone)]
pub struct Subscription {
    relation: String,
    alive: Arc<AtomicBool>,
    table: Weak<SubscriptionTable>,
}

impl Subscription {
    pub(crate) fn new(relation: &str, alive: Arc<AtomicBool>, table: &Arc<SubscriptionTable>) -> Self {
        Self {
            relation: relation.to_string(),
            alive,
            table: Arc::downgrade(table),
        }
    }

    pub fn relation(&self) -> &str {
        &self.relation
    }

    /// Whether this listener is still registered.
    pub fn is_active(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    pub fn unsubscribe(&self) {
        if let Some(table) = self.table.upgrade() {
            table.unsubscribe(&self.relation);
        }
        self.alive.store(false, Ordering::SeqCst);
    }

    /// Alias for [`Subscription::unsubscribe`].
    pub fn stop(&self) {
        self.unsubscribe()
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("relation", &self.relation)
            .field("active", &self.is_active())
            .finish()
    }
}
