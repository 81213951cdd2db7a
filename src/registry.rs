//! Context registry: relation edges, models and the graph-wide identifier.

use crate::error::ContextError;
use crate::types::{identity_model, ModelFn, DEFAULT_IDENTIFIER};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Declaration of a context passed to `ContextGraph::register`.
#[derive(Clone)]
pub struct ContextSpec {
    pub name: String,
    /// Downstream contexts, in publication order.
    pub rels: Vec<String>,
    pub model: Option<ModelFn>,
    /// Entity id field name. Applies to the whole graph, last registration wins.
    pub identifier: Option<String>,
}

impl ContextSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rels: Vec::new(),
            model: None,
            identifier: None,
        }
    }

    pub fn with_rels<I, S>(mut self, rels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.rels = rels.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_model<F>(mut self, model: F) -> Self
    where
        F: Fn(Value) -> Value + Send + Sync + 'static,
    {
        self.model = Some(Arc::new(model));
        self
    }

    pub fn with_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.identifier = Some(identifier.into());
        self
    }

    /// Relation names must be non-empty.
    pub fn validate(&self) -> Result<(), ContextError> {
        if self.name.trim().is_empty() {
            return Err(ContextError::InvalidRelation {
                context: self.name.clone(),
                reason: "context name must not be empty".to_string(),
            });
        }
        if let Some(position) = self.rels.iter().position(|rel| rel.trim().is_empty()) {
            return Err(ContextError::InvalidRelation {
                context: self.name.clone(),
                reason: format!("relation at index {} must be a non-empty name", position),
            });
        }
        Ok(())
    }
}

impl std::fmt::Debug for ContextSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextSpec")
            .field("name", &self.name)
            .field("rels", &self.rels)
            .field("model", &self.model.as_ref().map(|_| "<fn>"))
            .field("identifier", &self.identifier)
            .finish()
    }
}

/// Registered relations and models.
pub struct ContextRegistry {
    relations: HashMap<String, Vec<String>>,
    models: HashMap<String, ModelFn>,
    identifier: String,
    default_identifier: String,
}

impl Default for ContextRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ContextRegistry {
    pub fn new() -> Self {
        Self::with_default_identifier(DEFAULT_IDENTIFIER)
    }

    pub fn with_default_identifier(default_identifier: impl Into<String>) -> Self {
        let default_identifier = default_identifier.into();
        Self {
            relations: HashMap::new(),
            models: HashMap::new(),
            identifier: default_identifier.clone(),
            default_identifier,
        }
    }

    /// Record a context, replacing any earlier registration under the same name.
    pub fn insert(&mut self, spec: ContextSpec) {
        self.identifier = spec
            .identifier
            .unwrap_or_else(|| self.default_identifier.clone());
        self.models
            .insert(spec.name.clone(), spec.model.unwrap_or_else(identity_model));
        self.relations.insert(spec.name, spec.rels);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.relations.contains_key(name)
    }

    /// Direct relations of `name`; empty for unknown names.
    pub fn rels(&self, name: &str) -> &[String] {
        self.relations.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn model(&self, name: &str) -> Option<ModelFn> {
        self.models.get(name).cloned()
    }

    /// Model for `name`, identity when none is registered.
    pub fn model_or_identity(&self, name: &str) -> ModelFn {
        self.model(name).unwrap_or_else(identity_model)
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Every context reachable from `name` through relation edges, depth-first
    /// in relation order. `name` itself is excluded and each node appears once.
    pub fn descendants(&self, name: &str) -> Vec<String> {
        let mut visited = HashSet::new();
        visited.insert(name.to_string());
        let mut order = Vec::new();
        self.collect_descendants(name, &mut visited, &mut order);
        order
    }

    fn collect_descendants(&self, name: &str, visited: &mut HashSet<String>, order: &mut Vec<String>) {
        for rel in self.rels(name) {
            if visited.insert(rel.clone()) {
                order.push(rel.clone());
                self.collect_descendants(rel, visited, order);
            }
        }
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.relations.keys().cloned().collect();
        names.sort();
        names
    }
}
