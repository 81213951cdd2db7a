//! Context Graph Engine
//!
//! Owns the relation registry, the model registry, the selection store and the
//! subscription table. Selecting data for a context invalidates every
//! transitively dependent selection before the context's direct relations are
//! notified. Publication is shallow: one relation hop per publish, deeper
//! propagation happens only when an intermediate context re-publishes (which
//! every `use` listener does).
//!
//! Locks are never held while listeners, models or continuations run, so any
//! of them may call back into the graph.

use crate::bus::{Subscription, SubscriptionTable};
use crate::config::GraphConfig;
use crate::context::ContextHandle;
use crate::error::ContextError;
use crate::refresh::{run_refresh, Generator};
use crate::registry::{ContextRegistry, ContextSpec};
use crate::snapshot::{ContextSnapshot, GraphSnapshot};
use crate::types::{empty_object, is_object_like, is_truthy, shallow_merge, Continuation, Listener, ModelFn};
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, error};

/// Options for [`ContextGraph::select`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SelectOptions {
    /// Store and publish even when the data is unchanged.
    pub force: bool,
    /// Run the registered model over the data before storing it.
    pub apply_model: bool,
}

impl SelectOptions {
    pub fn forced() -> Self {
        Self {
            force: true,
            ..Self::default()
        }
    }

    pub fn modeled() -> Self {
        Self {
            apply_model: true,
            ..Self::default()
        }
    }
}

/// Options for [`ContextGraph::clear`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClearOptions {
    pub clear_self: bool,
    pub clear_listeners: bool,
    pub clear_data: bool,
}

impl Default for ClearOptions {
    fn default() -> Self {
        Self {
            clear_self: true,
            clear_listeners: true,
            clear_data: true,
        }
    }
}

impl ClearOptions {
    /// Descendant data only; used when a context selects new data.
    pub fn descendant_data() -> Self {
        Self {
            clear_self: false,
            clear_listeners: false,
            clear_data: true,
        }
    }

    /// Listeners of the context and its descendants, data untouched.
    pub fn subscriptions() -> Self {
        Self {
            clear_self: true,
            clear_listeners: true,
            clear_data: false,
        }
    }
}

struct GraphInner {
    registry: RwLock<ContextRegistry>,
    current: RwLock<HashMap<String, Value>>,
    subscriptions: Arc<SubscriptionTable>,
}

/// Relational publish/subscribe state manager.
///
/// Cloning is cheap and every clone refers to the same graph.
#[derive(Clone)]
pub struct ContextGraph {
    inner: Arc<GraphInner>,
}

impl Default for ContextGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl ContextGraph {
    pub fn new() -> Self {
        Self::with_registry(ContextRegistry::new())
    }

    /// Graph whose contexts fall back to `identifier` when they declare none.
    pub fn with_default_identifier(identifier: impl Into<String>) -> Self {
        Self::with_registry(ContextRegistry::with_default_identifier(identifier))
    }

    fn with_registry(registry: ContextRegistry) -> Self {
        Self {
            inner: Arc::new(GraphInner {
                registry: RwLock::new(registry),
                current: RwLock::new(HashMap::new()),
                subscriptions: Arc::new(SubscriptionTable::new()),
            }),
        }
    }

    /// Build a graph and register every context declared in `config`, in order.
    pub fn from_config(config: &GraphConfig) -> Result<Self, ContextError> {
        config.validate().map_err(|errors| {
            let messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            ContextError::ConfigError(format!(
                "Configuration validation failed:\n{}",
                messages.join("\n")
            ))
        })?;

        let graph = Self::with_default_identifier(config.identifier.clone());
        for declaration in &config.contexts {
            graph.register(declaration.to_spec())?;
        }
        Ok(graph)
    }

    /// Register a context and return its handle.
    ///
    /// Records relations and model, and sets the graph-wide identifier field
    /// (the last registration wins). No selection is stored. Registering an
    /// existing name replaces its relations and model.
    pub fn register(&self, spec: ContextSpec) -> Result<ContextHandle, ContextError> {
        spec.validate()?;
        let name = spec.name.clone();
        debug!(context = %name, rels = ?spec.rels, "Registering context");
        self.inner.registry.write().insert(spec);
        Ok(ContextHandle::new(self.clone(), name))
    }

    /// Bind a handle to `name` without registering it. Operations on the
    /// handle fail until the name is registered.
    pub fn handle(&self, name: impl Into<String>) -> ContextHandle {
        ContextHandle::new(self.clone(), name.into())
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.inner.registry.read().contains(name)
    }

    /// Entity id field name currently in effect for the whole graph.
    pub fn identifier(&self) -> String {
        self.inner.registry.read().identifier().to_string()
    }

    /// Direct relations of `name`.
    pub fn rels(&self, name: &str) -> Vec<String> {
        self.inner.registry.read().rels(name).to_vec()
    }

    /// Every context reachable from `name` through relations.
    pub fn descendants(&self, name: &str) -> Vec<String> {
        self.inner.registry.read().descendants(name)
    }

    fn model_for(&self, name: &str) -> ModelFn {
        self.inner.registry.read().model_or_identity(name)
    }

    fn ensure_registered(&self, name: &str, operation: &str) -> Result<(), ContextError> {
        if self.is_registered(name) {
            Ok(())
        } else {
            error!(
                context = %name,
                operation = operation,
                "Malformed context: register it with the graph before use"
            );
            Err(ContextError::NotRegistered(name.to_string()))
        }
    }

    /// Establish `data` as the current selection of `name`.
    ///
    /// Unchanged data (deep equality) is a no-op unless forced. On change the
    /// data is optionally passed through the model, stored, every descendant's
    /// stored selection is cleared, and the result is published to `name` and
    /// its direct relations. Returns the (possibly transformed) data.
    pub fn select(&self, name: &str, data: Value, options: SelectOptions) -> Value {
        let unchanged = self.inner.current.read().get(name) == Some(&data);
        if unchanged && !options.force {
            debug!(context = %name, "Selection unchanged, skipping publish");
            return data;
        }

        let data = if options.apply_model {
            let model = self.model_for(name);
            model(data)
        } else {
            data
        };

        self.inner
            .current
            .write()
            .insert(name.to_string(), data.clone());

        // Stale dependents go before anyone hears about the new value.
        self.clear(name, ClearOptions::descendant_data());

        debug!(context = %name, forced = options.force, "Selected context data");
        self.publish(name, data)
    }

    /// Clear `name` and everything reachable from it through relations.
    ///
    /// Descendants lose their data (when `clear_data`) and listeners (when
    /// `clear_listeners`). `name` loses its data only when both `clear_self`
    /// and `clear_data` are set, and its listeners whenever `clear_listeners`
    /// is set.
    pub fn clear(&self, name: &str, options: ClearOptions) {
        let descendants = self.descendants(name);

        if options.clear_data {
            let mut current = self.inner.current.write();
            for rel in &descendants {
                current.remove(rel);
            }
            if options.clear_self {
                current.remove(name);
            }
        }

        if options.clear_listeners {
            for rel in &descendants {
                self.inner.subscriptions.unsubscribe(rel);
            }
            self.inner.subscriptions.unsubscribe(name);
        }

        debug!(
            context = %name,
            descendants = descendants.len(),
            clear_self = options.clear_self,
            clear_listeners = options.clear_listeners,
            clear_data = options.clear_data,
            "Cleared context state"
        );
    }

    /// Deliver `data` to listeners of `rel` and of each direct relation of
    /// `rel`. No further hops. Returns `data`.
    pub fn publish(&self, rel: &str, data: Value) -> Value {
        let targets: Vec<String> = {
            let registry = self.inner.registry.read();
            std::iter::once(rel.to_string())
                .chain(registry.rels(rel).iter().cloned())
                .collect()
        };

        for target in &targets {
            let delivered = self.inner.subscriptions.broadcast(target, &data);
            debug!(relation = %target, source = %rel, delivered, "Published context data");
        }
        data
    }

    /// Run `on` for every publication to `rel`. A `null` payload arrives as `{}`.
    pub fn subscribe<F>(&self, rel: &str, on: F) -> Subscription
    where
        F: Fn(Value) + Send + Sync + 'static,
    {
        let alive = self
            .inner
            .subscriptions
            .subscribe(rel, null_as_empty(Arc::new(on)));
        Subscription::new(rel, alive, &self.inner.subscriptions)
    }

    fn listen(&self, rel: &str, alive: Arc<AtomicBool>, on: Listener) -> Subscription {
        self.inner
            .subscriptions
            .attach(rel, null_as_empty(on), alive.clone());
        Subscription::new(rel, alive, &self.inner.subscriptions)
    }

    /// Remove every listener registered for `rel`.
    pub fn unsubscribe(&self, rel: &str) -> usize {
        self.inner.subscriptions.unsubscribe(rel)
    }

    pub fn listener_count(&self, rel: &str) -> usize {
        self.inner.subscriptions.listener_count(rel)
    }

    /// Stored selection of `name`.
    ///
    /// With `apply_model` the registered model is applied to the stored value,
    /// or to `{}` when nothing is stored, so the result is always `Some`.
    pub fn current(&self, name: &str, apply_model: bool) -> Option<Value> {
        let stored = self.inner.current.read().get(name).cloned();
        if !apply_model {
            return stored;
        }
        let model = self.model_for(name);
        Some(model(stored.unwrap_or_else(empty_object)))
    }

    /// [`ContextGraph::current`], or `fallback` when that is not an object or array.
    pub fn current_or(&self, name: &str, fallback: Value, apply_model: bool) -> Value {
        match self.current(name, apply_model) {
            Some(value) if is_object_like(&value) => value,
            _ => fallback,
        }
    }

    /// Alias for [`ContextGraph::current`].
    pub fn get(&self, name: &str, apply_model: bool) -> Option<Value> {
        self.current(name, apply_model)
    }

    /// Alias for [`ContextGraph::current_or`].
    pub fn get_or(&self, name: &str, fallback: Value, apply_model: bool) -> Value {
        self.current_or(name, fallback, apply_model)
    }

    /// Model-applied selection of `name`; `None` when nothing object-like is stored.
    pub fn selected(&self, name: &str) -> Option<Value> {
        let stored = self.current(name, false)?;
        let model = self.model_for(name);
        Some(model(stored)).filter(is_object_like)
    }

    /// Whether the selection of `name` carries a truthy identifier field.
    pub fn existing(&self, name: &str) -> bool {
        let identifier = self.identifier();
        self.selected(name)
            .and_then(|selected| selected.get(identifier.as_str()).map(is_truthy))
            .unwrap_or(false)
    }

    /// Run `generator` for `name` once and feed the model-applied result to
    /// `and_then`. Generator failures are logged; `and_then` is skipped.
    pub fn refreshing<F>(&self, name: &str, generator: &Generator, and_then: F) -> Result<(), ContextError>
    where
        F: Fn(Value) + Send + Sync + 'static,
    {
        self.ensure_registered(name, "refresh")?;
        run_refresh(name, generator, self.model_for(name), Arc::new(and_then), None);
        Ok(())
    }

    /// Bind `generator` to publications of `name`.
    ///
    /// Unless `defer`, refreshes immediately. Then, on every publication to
    /// `name`, refreshes again and re-publishes the received data to each
    /// direct relation of `name`. Results settling after the subscription was
    /// stopped are discarded.
    pub fn using<F>(
        &self,
        name: &str,
        generator: Generator,
        and_then: F,
        defer: bool,
    ) -> Result<Subscription, ContextError>
    where
        F: Fn(Value) + Send + Sync + 'static,
    {
        self.ensure_registered(name, "use")?;

        let and_then: Continuation = Arc::new(and_then);
        let alive = Arc::new(AtomicBool::new(true));

        if !defer {
            run_refresh(
                name,
                &generator,
                self.model_for(name),
                and_then.clone(),
                Some(alive.clone()),
            );
        }

        let weak = Arc::downgrade(&self.inner);
        let context = name.to_string();
        let listener_alive = alive.clone();
        let on_publish: Listener = Arc::new(move |data: Value| {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            if !listener_alive.load(Ordering::SeqCst) {
                return;
            }
            let graph = ContextGraph { inner };
            run_refresh(
                &context,
                &generator,
                graph.model_for(&context),
                and_then.clone(),
                Some(listener_alive.clone()),
            );
            for rel in graph.rels(&context) {
                graph.publish(&rel, data.clone());
            }
        });

        Ok(self.listen(name, alive, on_publish))
    }

    /// Shallow-merge `updates` into the current selection of `name`.
    ///
    /// Requires an existing selection (see [`ContextGraph::existing`]); without
    /// one nothing changes and `NoSelection` is returned. With `publish` the
    /// merged value is published.
    pub fn modifying(&self, name: &str, updates: Value, publish: bool) -> Result<Value, ContextError> {
        self.ensure_registered(name, "modify")?;

        if !self.existing(name) {
            error!(context = %name, "No selected data to modify found for context");
            return Err(ContextError::NoSelection(name.to_string()));
        }

        let merged = {
            let mut current = self.inner.current.write();
            let Some(entry) = current.get_mut(name) else {
                return Err(ContextError::NoSelection(name.to_string()));
            };
            let merged = shallow_merge(entry.take(), updates);
            *entry = merged.clone();
            merged
        };

        debug!(context = %name, publish, "Modified context selection");
        if publish {
            self.publish(name, merged.clone());
        }
        Ok(merged)
    }

    /// Point-in-time view of every registered context.
    pub fn snapshot(&self) -> GraphSnapshot {
        let (identifier, relations) = {
            let registry = self.inner.registry.read();
            let relations: Vec<(String, Vec<String>)> = registry
                .names()
                .into_iter()
                .map(|name| {
                    let rels = registry.rels(&name).to_vec();
                    (name, rels)
                })
                .collect();
            (registry.identifier().to_string(), relations)
        };

        let contexts = relations
            .into_iter()
            .map(|(name, rels)| ContextSnapshot {
                selected: self.current(&name, false),
                listeners: self.listener_count(&name),
                name,
                rels,
            })
            .collect();

        GraphSnapshot::now(identifier, contexts)
    }
}

fn null_as_empty(on: Listener) -> Listener {
    Arc::new(move |data: Value| on(if data.is_null() { empty_object() } else { data }))
}
