//! Configuration type definitions for plugin-status
//!
//! All types implement serde traits for JSON serialization and have sensible defaults.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::status::DEFAULT_ALL_AVAILABLE_SUMMARY;

/// Main configuration struct
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Propagation engine timing and summaries
    pub engine: EngineConfig,
    /// Log output configuration
    pub logging: LoggingConfig,
}

// ============================================================================
// Engine
// ============================================================================

fn default_debounce_ms() -> u64 {
    100
}

fn default_batch_ms() -> u64 {
    100
}

fn default_all_available_summary() -> String {
    DEFAULT_ALL_AVAILABLE_SUMMARY.to_string()
}

/// Propagation engine configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EngineConfig {
    /// Quiet period after a core status change before it is applied
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    /// Window during which propagation triggers are coalesced into one run
    #[serde(default = "default_batch_ms")]
    pub batch_ms: u64,
    /// Summary of an aggregate whose inputs are all available
    #[serde(default = "default_all_available_summary")]
    pub all_available_summary: String,
}

impl EngineConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn batch(&self) -> Duration {
        Duration::from_millis(self.batch_ms)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            batch_ms: default_batch_ms(),
            all_available_summary: default_all_available_summary(),
        }
    }
}

// ============================================================================
// Logging
// ============================================================================

/// Log output format
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable multi-line output
    Pretty,
    /// Compact single-line output with component fields
    #[default]
    Component,
    /// JSON lines for log aggregators
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "component" => Ok(LogFormat::Component),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format '{}'", other)),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Output format
    #[serde(default)]
    pub format: LogFormat,
    /// Append logs to this file instead of stderr
    #[serde(default)]
    pub file: Option<String>,
    /// Default filter when RUST_LOG is unset
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            file: None,
            level: default_log_level(),
        }
    }
}
