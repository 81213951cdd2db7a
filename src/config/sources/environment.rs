//! Environment overrides: `CONTEXT_GRAPH__IDENTIFIER`, `CONTEXT_GRAPH__LOGGING__LEVEL`, ...

use config::builder::DefaultState;
use config::{ConfigBuilder, Environment};

pub fn add_to_builder(builder: ConfigBuilder<DefaultState>) -> ConfigBuilder<DefaultState> {
    builder.add_source(Environment::with_prefix("CONTEXT_GRAPH").separator("__"))
}
