//! Context handles: the per-context operations installed by registration.

use crate::bus::Subscription;
use crate::error::ContextError;
use crate::graph::{ClearOptions, ContextGraph, SelectOptions};
use crate::refresh::Generator;
use serde_json::Value;
use tracing::error;

/// A context bound to its graph.
///
/// Returned by [`ContextGraph::register`]. Every operation first checks that
/// the name is registered; if not it logs and returns
/// [`ContextError::NotRegistered`] (or the empty answer for read accessors).
#[derive(Clone)]
pub struct ContextHandle {
    graph: ContextGraph,
    name: String,
}

impl ContextHandle {
    pub(crate) fn new(graph: ContextGraph, name: String) -> Self {
        Self { graph, name }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn graph(&self) -> &ContextGraph {
        &self.graph
    }

    pub fn rels(&self) -> Vec<String> {
        self.graph.rels(&self.name)
    }

    fn ensure_registered(&self, operation: &str) -> Result<(), ContextError> {
        if self.graph.is_registered(&self.name) {
            return Ok(());
        }
        error!(
            context = %self.name,
            operation = operation,
            "Context operation invoked before registration"
        );
        Err(ContextError::NotRegistered(self.name.clone()))
    }

    /// Select `data` with default options.
    pub fn select(&self, data: Value) -> Result<Value, ContextError> {
        self.select_with(data, SelectOptions::default())
    }

    pub fn select_with(&self, data: Value, options: SelectOptions) -> Result<Value, ContextError> {
        self.ensure_registered("select")?;
        Ok(self.graph.select(&self.name, data, options))
    }

    pub fn refresh<F>(&self, generator: &Generator, and_then: F) -> Result<(), ContextError>
    where
        F: Fn(Value) + Send + Sync + 'static,
    {
        self.graph.refreshing(&self.name, generator, and_then)
    }

    /// Subscribe `generator` to this context's publications (`use`).
    pub fn using<F>(&self, generator: Generator, and_then: F, defer: bool) -> Result<Subscription, ContextError>
    where
        F: Fn(Value) + Send + Sync + 'static,
    {
        self.graph.using(&self.name, generator, and_then, defer)
    }

    pub fn modify(&self, updates: Value, publish: bool) -> Result<Value, ContextError> {
        self.graph.modifying(&self.name, updates, publish)
    }

    pub fn selected(&self) -> Option<Value> {
        self.ensure_registered("selected").ok()?;
        self.graph.selected(&self.name)
    }

    pub fn exists(&self) -> bool {
        self.ensure_registered("exists").is_ok() && self.graph.existing(&self.name)
    }

    /// Clear this context's data and listeners and those of every descendant.
    pub fn clear(&self) -> Result<(), ContextError> {
        self.ensure_registered("clear")?;
        self.graph.clear(&self.name, ClearOptions::default());
        Ok(())
    }

    /// Drop listeners of this context and its descendants, keeping data.
    pub fn clear_subscriptions(&self) -> Result<(), ContextError> {
        self.ensure_registered("clear_subscriptions")?;
        self.graph.clear(&self.name, ClearOptions::subscriptions());
        Ok(())
    }
}

impl std::fmt::Debug for ContextHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextHandle")
            .field("name", &self.name)
            .finish()
    }
}
