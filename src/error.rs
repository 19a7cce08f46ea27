//! Error types for plugin-status
//!
//! This module defines all error types used by the status engine.
//! Uses `thiserror` for ergonomic error handling with automatic `Display` and
//! `Error` trait implementations.

use thiserror::Error;

/// The primary error type for plugin-status operations.
#[derive(Error, Debug)]
pub enum StatusError {
    /// A query or registration referenced a plugin that is not in the graph.
    #[error("Unknown plugin: {0}")]
    UnknownPlugin(String),

    /// A plugin declared a dependency that is not itself a declared plugin.
    #[error("Plugin [{plugin}] depends on unknown plugin [{dependency}]")]
    UnknownDependency { plugin: String, dependency: String },

    /// The declared dependencies contain a cycle.
    #[error("Cyclic dependency: {}", .cycle.join(" -> "))]
    CyclicDependency { cycle: Vec<String> },

    /// A report feed was registered after registrations were locked.
    #[error("Custom statuses cannot be registered after setup, plugin [{0}] attempted")]
    RegistrationClosed(String),

    /// The engine actor has shut down.
    #[error("Status engine stopped")]
    EngineStopped,

    /// A helper task panicked or was cancelled.
    #[error("Task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    /// Configuration-related errors (invalid values, unparseable files, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Standard I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A specialized `Result` type for plugin-status operations.
pub type Result<T> = std::result::Result<T, StatusError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = StatusError::Config("debounce_ms must be positive".to_string());
        assert_eq!(
            err.to_string(),
            "Configuration error: debounce_ms must be positive"
        );
    }

    #[test]
    fn test_unknown_dependency_display() {
        let err = StatusError::UnknownDependency {
            plugin: "reporting".into(),
            dependency: "licensing".into(),
        };
        assert_eq!(
            err.to_string(),
            "Plugin [reporting] depends on unknown plugin [licensing]"
        );
    }

    #[test]
    fn test_cycle_display_joins_path() {
        let err = StatusError::CyclicDependency {
            cycle: vec!["a".into(), "b".into(), "a".into()],
        };
        assert_eq!(err.to_string(), "Cyclic dependency: a -> b -> a");
    }

    #[test]
    fn test_registration_closed_names_plugin() {
        let err = StatusError::RegistrationClosed("alerting".into());
        assert!(err.to_string().contains("[alerting]"));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: StatusError = io_err.into();
        assert!(matches!(err, StatusError::Io(_)));
    }

    #[test]
    fn test_result_type() {
        fn returns_result() -> Result<i32> {
            Ok(42)
        }
        assert_eq!(returns_result().unwrap(), 42);
    }
}
