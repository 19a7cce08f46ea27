//! Status values shared by the whole engine.
//!
//! A [`ServiceStatus`] is an immutable `{level, summary}` pair. Levels are
//! totally ordered from best ([`ServiceLevel::Available`]) to worst
//! ([`ServiceLevel::Critical`]); aggregation always keeps the worst one.

pub mod summary;

pub use summary::{combine, DEFAULT_ALL_AVAILABLE_SUMMARY};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a plugin in the dependency graph.
pub type PluginName = String;

/// Summary carried by the sentinel status every derived status starts with.
pub const UNKNOWN_SUMMARY: &str = "Unknown status";

// ============================================================================
// ServiceLevel
// ============================================================================

/// Severity of a status, ordered best to worst.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum ServiceLevel {
    /// Everything is working.
    #[default]
    Available,
    /// Working with reduced functionality or performance.
    Degraded,
    /// Not working.
    Unavailable,
    /// Not working, and something needs immediate attention.
    Critical,
}

impl ServiceLevel {
    /// Lowercase name, as used in JSON and summaries.
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceLevel::Available => "available",
            ServiceLevel::Degraded => "degraded",
            ServiceLevel::Unavailable => "unavailable",
            ServiceLevel::Critical => "critical",
        }
    }

    /// Returns `true` for the best level.
    pub fn is_available(&self) -> bool {
        *self == ServiceLevel::Available
    }
}

impl fmt::Display for ServiceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// ServiceStatus
// ============================================================================

/// A severity level plus a human-readable summary.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ServiceStatus {
    pub level: ServiceLevel,
    pub summary: String,
}

impl ServiceStatus {
    pub fn new(level: ServiceLevel, summary: impl Into<String>) -> Self {
        Self {
            level,
            summary: summary.into(),
        }
    }

    pub fn available(summary: impl Into<String>) -> Self {
        Self::new(ServiceLevel::Available, summary)
    }

    pub fn degraded(summary: impl Into<String>) -> Self {
        Self::new(ServiceLevel::Degraded, summary)
    }

    pub fn unavailable(summary: impl Into<String>) -> Self {
        Self::new(ServiceLevel::Unavailable, summary)
    }

    pub fn critical(summary: impl Into<String>) -> Self {
        Self::new(ServiceLevel::Critical, summary)
    }

    /// The status held before anything is known: unavailable, "Unknown status".
    pub fn unknown() -> Self {
        Self::unavailable(UNKNOWN_SUMMARY)
    }
}

impl fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.level, self.summary)
    }
}

// ============================================================================
// CoreStatus
// ============================================================================

/// Status of the foundational subsystems every root plugin depends on.
///
/// Arrives as a whole snapshot; the engine never merges partial updates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoreStatus {
    /// The search backend the plugins query.
    pub search: ServiceStatus,
    /// Object storage plugins persist their state in.
    pub storage: ServiceStatus,
}

impl CoreStatus {
    pub fn new(search: ServiceStatus, storage: ServiceStatus) -> Self {
        Self { search, storage }
    }

    /// Both subsystems at the same status.
    pub fn uniform(status: ServiceStatus) -> Self {
        Self {
            search: status.clone(),
            storage: status,
        }
    }

    /// Core status before the first snapshot arrives.
    pub fn unknown() -> Self {
        Self::uniform(ServiceStatus::unknown())
    }

    /// Named entries in name order.
    pub fn entries(&self) -> [(&'static str, &ServiceStatus); 2] {
        [("search", &self.search), ("storage", &self.storage)]
    }
}

impl Default for CoreStatus {
    fn default() -> Self {
        Self::unknown()
    }
}
