//! Merge rules: defaults, override order, conflict handling.

use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError};

use crate::types::DEFAULT_IDENTIFIER;

/// Create a Config builder with merge policy defaults applied.
pub fn builder_with_defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    Config::builder()
        .set_default("identifier", DEFAULT_IDENTIFIER)?
        .set_default("logging.level", "info")?
        .set_default("logging.format", "text")
}
