//! Config loading entry points.

use super::merge::builder_with_defaults;
use super::sources::{environment, global_file, workspace_file};
use super::GraphConfig;
use config::{ConfigError, File};
use std::path::Path;

/// Loads [`GraphConfig`] from layered sources.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Defaults, then global file, then workspace files, then environment.
    pub fn load(workspace_root: &Path) -> Result<GraphConfig, ConfigError> {
        let builder = builder_with_defaults()?;
        let builder = global_file::add_to_builder(builder)?;
        let builder = workspace_file::add_to_builder(builder, workspace_root)?;
        let builder = environment::add_to_builder(builder);
        builder.build()?.try_deserialize()
    }

    /// Defaults overlaid with a single explicit file, then environment.
    pub fn load_from_file(path: &Path) -> Result<GraphConfig, ConfigError> {
        let builder = builder_with_defaults()?.add_source(File::from(path).required(true));
        let builder = environment::add_to_builder(builder);
        builder.build()?.try_deserialize()
    }
}
