//! Context Graph: relational publish/subscribe state management
//!
//! Named contexts each hold one current selection. Selecting new data for a
//! context clears every transitively dependent selection, stores the data and
//! publishes it one relation hop downward; contexts subscribed through `use`
//! refresh their derived data and re-publish to their own relations.

pub mod bus;
pub mod config;
pub mod context;
pub mod error;
pub mod graph;
pub mod logging;
pub mod refresh;
pub mod registry;
pub mod snapshot;
pub mod source;
pub mod types;

pub use bus::Subscription;
pub use context::ContextHandle;
pub use error::{ContextError, RefreshError};
pub use graph::{ClearOptions, ContextGraph, SelectOptions};
pub use refresh::Generator;
pub use registry::ContextSpec;
pub use source::{DataSource, MemorySource};
