//! Serializable point-in-time view of a context graph.

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextSnapshot {
    pub name: String,
    pub rels: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected: Option<Value>,
    pub listeners: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub taken_at: String,
    pub identifier: String,
    pub contexts: Vec<ContextSnapshot>,
}

impl GraphSnapshot {
    pub fn now(identifier: String, contexts: Vec<ContextSnapshot>) -> Self {
        Self {
            taken_at: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            identifier,
            contexts,
        }
    }

    pub fn context(&self, name: &str) -> Option<&ContextSnapshot> {
        self.contexts.iter().find(|c| c.name == name)
    }
}
