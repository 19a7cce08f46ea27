//! Configuration management for plugin-status
//!
//! Configuration is loaded from `~/.plugin-status/config.json` with environment
//! variable overrides.

mod types;
pub mod validate;

pub use types::*;

use crate::error::{Result, StatusError};
use std::path::{Path, PathBuf};

impl Config {
    /// Returns the configuration directory path (~/.plugin-status)
    pub fn dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".plugin-status")
    }

    /// Returns the path to the config file (~/.plugin-status/config.json)
    pub fn path() -> PathBuf {
        Self::dir().join("config.json")
    }

    /// Load configuration from the default path with environment overrides.
    ///
    /// If the config file doesn't exist, returns default configuration.
    pub fn load() -> Result<Self> {
        Self::load_from_path(&Self::path())
    }

    /// Load configuration from a specific path with environment overrides.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            serde_json::from_str(&content)?
        } else {
            Config::default()
        };

        config.apply_env_overrides()?;
        config.check()?;

        Ok(config)
    }

    /// Apply environment variable overrides to the configuration.
    ///
    /// Environment variables follow the pattern: PLUGIN_STATUS_SECTION_KEY
    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(val) = std::env::var("PLUGIN_STATUS_ENGINE_DEBOUNCE_MS") {
            self.engine.debounce_ms = parse_env("PLUGIN_STATUS_ENGINE_DEBOUNCE_MS", &val)?;
        }
        if let Ok(val) = std::env::var("PLUGIN_STATUS_ENGINE_BATCH_MS") {
            self.engine.batch_ms = parse_env("PLUGIN_STATUS_ENGINE_BATCH_MS", &val)?;
        }
        if let Ok(val) = std::env::var("PLUGIN_STATUS_ENGINE_ALL_AVAILABLE_SUMMARY") {
            self.engine.all_available_summary = val;
        }

        if let Ok(val) = std::env::var("PLUGIN_STATUS_LOG_LEVEL") {
            self.logging.level = val;
        }
        if let Ok(val) = std::env::var("PLUGIN_STATUS_LOG_FORMAT") {
            self.logging.format = val.parse().map_err(StatusError::Config)?;
        }
        Ok(())
    }

    /// Reject values the engine cannot run with.
    fn check(&self) -> Result<()> {
        if self.engine.all_available_summary.trim().is_empty() {
            return Err(StatusError::Config(
                "engine.all_available_summary must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, val: &str) -> Result<T> {
    val.parse()
        .map_err(|_| StatusError::Config(format!("{} has invalid value '{}'", key, val)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn test_default_engine_config() {
        let config = Config::default();
        assert_eq!(config.engine.debounce_ms, 100);
        assert_eq!(config.engine.batch_ms, 100);
        assert_eq!(
            config.engine.all_available_summary,
            "All dependencies are available"
        );
    }

    #[test]
    fn test_load_missing_file_gives_defaults() {
        let dir = tempdir().unwrap();
        let config = Config::load_from_path(&dir.path().join("missing.json")).unwrap();
        assert_eq!(config.engine, EngineConfig::default());
    }

    #[test]
    fn test_load_partial_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, r#"{{"engine": {{"batch_ms": 250}}}}"#).unwrap();

        let config = Config::load_from_path(&path).unwrap();
        assert_eq!(config.engine.batch_ms, 250);
        assert_eq!(config.engine.debounce_ms, 100);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_load_invalid_json_fails() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(
            Config::load_from_path(&path),
            Err(StatusError::Json(_))
        ));
    }

    #[test]
    fn test_empty_summary_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"engine": {"all_available_summary": "  "}}"#).unwrap();
        assert!(matches!(
            Config::load_from_path(&path),
            Err(StatusError::Config(_))
        ));
    }

    #[test]
    fn test_parse_env_rejects_garbage() {
        let err = parse_env::<u64>("PLUGIN_STATUS_ENGINE_BATCH_MS", "soon").unwrap_err();
        assert!(err.to_string().contains("PLUGIN_STATUS_ENGINE_BATCH_MS"));
    }

    #[test]
    fn test_durations() {
        let engine = EngineConfig {
            debounce_ms: 5,
            batch_ms: 7,
            ..EngineConfig::default()
        };
        assert_eq!(engine.debounce().as_millis(), 5);
        assert_eq!(engine.batch().as_millis(), 7);
    }

    #[test]
    fn test_log_format_from_str() {
        assert_eq!("JSON".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert!("xml".parse::<LogFormat>().is_err());
    }
}
