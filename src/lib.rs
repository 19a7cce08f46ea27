//! plugin-status - dependency-aware status aggregation for plugin graphs
//!
//! Every plugin in a static dependency graph gets a status derived from the
//! core subsystems and from its dependencies, unless it reports its own.
//! Updates are debounced and batched so every dependent ends up reflecting
//! the worst known status upstream, recomputed once per run.

pub mod config;
pub mod engine;
pub mod error;
pub mod graph;
pub mod scenario;
pub mod service;
pub mod status;
pub mod store;
pub mod utils;

pub use config::{Config, EngineConfig, LogFormat, LoggingConfig};
pub use error::{Result, StatusError};
pub use graph::DependencyGraph;
pub use service::{PluginsStatusService, StatusMap};
pub use status::{combine, CoreStatus, PluginName, ServiceLevel, ServiceStatus};
pub use store::{StatusSnapshot, StatusStore};
