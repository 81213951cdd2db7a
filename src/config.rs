//! Configuration System
//!
//! Declarative context definitions and logging settings, loaded from layered
//! TOML files and environment overrides. Contexts declared here are registered
//! in file order by [`crate::ContextGraph::from_config`], so the last
//! declaration decides the graph-wide identifier field.

use crate::error::ContextError;
use crate::logging::LoggingConfig;
use crate::registry::ContextSpec;
use crate::types::DEFAULT_IDENTIFIER;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

mod facade;
mod merge;
mod sources;

pub use facade::ConfigLoader;
pub use sources::global_file::global_config_path;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphConfig {
    /// Identifier field used when a context declares none
    #[serde(default = "default_identifier")]
    pub identifier: String,

    /// Context declarations, registered in order
    #[serde(default)]
    pub contexts: Vec<ContextDecl>,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_identifier() -> String {
    DEFAULT_IDENTIFIER.to_string()
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            identifier: default_identifier(),
            contexts: Vec::new(),
            logging: LoggingConfig::default(),
        }
    }
}

/// A context declared in configuration. Models cannot be expressed in TOML,
/// so declared contexts use the identity model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextDecl {
    pub name: String,

    #[serde(default)]
    pub rels: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,
}

impl ContextDecl {
    pub fn to_spec(&self) -> ContextSpec {
        let spec = ContextSpec::new(self.name.clone()).with_rels(self.rels.iter().cloned());
        match &self.identifier {
            Some(identifier) => spec.with_identifier(identifier.clone()),
            None => spec,
        }
    }
}

/// Configuration validation errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Context '{0}': {1}")]
    Context(String, String),

    #[error("Duplicate context name '{0}'")]
    Duplicate(String),

    #[error("Identifier field must not be empty")]
    EmptyIdentifier,
}

impl GraphConfig {
    /// Render the configuration as TOML, e.g. to seed a workspace file.
    pub fn to_toml(&self) -> Result<String, ContextError> {
        toml::to_string_pretty(self)
            .map_err(|e| ContextError::ConfigError(format!("Failed to render config: {}", e)))
    }

    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if self.identifier.trim().is_empty() {
            errors.push(ValidationError::EmptyIdentifier);
        }

        let mut seen = HashSet::new();
        for declaration in &self.contexts {
            if let Err(e) = declaration.to_spec().validate() {
                errors.push(ValidationError::Context(
                    declaration.name.clone(),
                    e.to_string(),
                ));
            }
            if !seen.insert(declaration.name.as_str()) {
                errors.push(ValidationError::Duplicate(declaration.name.clone()));
            }
            if declaration
                .identifier
                .as_deref()
                .is_some_and(|id| id.trim().is_empty())
            {
                errors.push(ValidationError::Context(
                    declaration.name.clone(),
                    "identifier must not be empty".to_string(),
                ));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
