//! Data Sources
//!
//! Contract for the asynchronous data-fetch collaborators that feed context
//! refreshes, plus an in-memory implementation.

use crate::error::RefreshError;
use crate::types::DEFAULT_IDENTIFIER;
use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;

/// Asynchronous entity source.
#[async_trait]
pub trait DataSource: Send + Sync {
    /// List every entity.
    async fn all(&self) -> Result<Vec<Value>, RefreshError>;

    /// Look up one entity by its id.
    async fn by_id(&self, id: &Value) -> Result<Value, RefreshError>;
}

/// Entities held in memory, keyed by a configurable id field.
pub struct MemorySource {
    id_field: String,
    entities: RwLock<Vec<Value>>,
}

impl MemorySource {
    pub fn new(entities: Vec<Value>) -> Self {
        Self::with_id_field(DEFAULT_IDENTIFIER, entities)
    }

    pub fn with_id_field(id_field: impl Into<String>, entities: Vec<Value>) -> Self {
        Self {
            id_field: id_field.into(),
            entities: RwLock::new(entities),
        }
    }

    pub fn id_field(&self) -> &str {
        &self.id_field
    }

    /// Insert or replace an entity by id.
    pub fn upsert(&self, entity: Value) {
        let mut entities = self.entities.write();
        let id = entity.get(&self.id_field).cloned();
        match entities
            .iter_mut()
            .find(|existing| id.is_some() && existing.get(&self.id_field) == id.as_ref())
        {
            Some(existing) => *existing = entity,
            None => entities.push(entity),
        }
    }

    pub fn len(&self) -> usize {
        self.entities.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.read().is_empty()
    }
}

#[async_trait]
impl DataSource for MemorySource {
    async fn all(&self) -> Result<Vec<Value>, RefreshError> {
        Ok(self.entities.read().clone())
    }

    async fn by_id(&self, id: &Value) -> Result<Value, RefreshError> {
        self.entities
            .read()
            .iter()
            .find(|entity| entity.get(&self.id_field) == Some(id))
            .cloned()
            .ok_or_else(|| RefreshError::NotFound(format!("{} = {}", self.id_field, id)))
    }
}
