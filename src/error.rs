//! Error types for the context graph engine.

use thiserror::Error;

/// Engine-level errors
#[derive(Debug, Error)]
pub enum ContextError {
    #[error("Context not registered: {0}. Register it with ContextGraph::register first.")]
    NotRegistered(String),

    #[error("No selected data to modify for context: {0}")]
    NoSelection(String),

    #[error("Invalid relation on context '{context}': {reason}")]
    InvalidRelation { context: String, reason: String },

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Failures raised while resolving a refresh generator
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RefreshError {
    #[error("Entity not found: {0}")]
    NotFound(String),

    #[error("Data source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("Refresh failed: {0}")]
    Failed(String),
}

impl From<config::ConfigError> for ContextError {
    fn from(err: config::ConfigError) -> Self {
        ContextError::ConfigError(err.to_string())
    }
}
