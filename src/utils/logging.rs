//! Logging initialization for plugin-status.
//!
//! Supports three formats:
//! - `pretty`: default tracing pretty-print (human-readable, coloured)
//! - `component`: compact single-line output; use the [`log_component!`]
//!   macro to add a `component` field for per-subsystem filtering
//! - `json`: structured JSON lines for log aggregators

use std::fs::OpenOptions;
use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use crate::config::{LogFormat, LoggingConfig};
use crate::error::{Result, StatusError};

/// Initialize the global tracing subscriber from config.
///
/// Call this once at startup before any tracing events are emitted.
/// Falls back to `RUST_LOG` env var; if unset, uses `cfg.level`.
pub fn init_logging(cfg: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&cfg.level))
        .map_err(|e| StatusError::Config(format!("invalid log level '{}': {}", cfg.level, e)))?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    let installed = match (cfg.format, &cfg.file) {
        (LogFormat::Json, Some(path)) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            builder
                .json()
                .with_writer(Arc::new(file))
                .try_init()
        }
        (LogFormat::Json, None) => builder.json().try_init(),
        (LogFormat::Pretty, Some(path)) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            builder
                .pretty()
                .with_ansi(false)
                .with_writer(Arc::new(file))
                .try_init()
        }
        (LogFormat::Pretty, None) => builder.pretty().try_init(),
        // Component-tagged events carry a structured `component` field
        // added by `log_component!`; no custom layer needed.
        (LogFormat::Component, Some(path)) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            builder
                .with_target(true)
                .compact()
                .with_ansi(false)
                .with_writer(Arc::new(file))
                .try_init()
        }
        (LogFormat::Component, None) => builder.with_target(true).compact().try_init(),
    };

    installed.map_err(|e| StatusError::Config(format!("logging already initialized: {}", e)))
}

/// Emit a component-tagged tracing event.
///
/// Works with any tracing level (`trace`, `debug`, `info`, `warn`, `error`).
///
/// ```
/// # use plugin_status::log_component;
/// log_component!(info, "engine", "run published");
/// log_component!(debug, "graph", "roots computed", roots = 3u64);
/// ```
#[macro_export]
macro_rules! log_component {
    ($level:ident, $component:expr, $msg:expr) => {
        tracing::$level!(component = $component, $msg)
    };
    ($level:ident, $component:expr, $msg:expr, $($key:ident = $val:expr),+ $(,)?) => {
        tracing::$level!(component = $component, $($key = $val,)+ $msg)
    };
}
