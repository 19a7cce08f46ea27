//! Per-plugin status records and the propagation reducer.
//!
//! [`StatusStore`] is the single owner of every mutable status. It does no
//! scheduling and no I/O: callers feed it core snapshots and report
//! emissions, then ask it to run a [`RunPlan`]. The engine actor is the only
//! caller in production; tests drive it directly.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde::Serialize;

use crate::error::{Result, StatusError};
use crate::graph::DependencyGraph;
use crate::status::{combine, CoreStatus, PluginName, ServiceStatus};

/// Mutable status state of one plugin.
#[derive(Debug, Clone)]
pub struct PluginRecord {
    /// Latest value emitted by the plugin's own feed, if it has one.
    pub reported: Option<ServiceStatus>,
    /// Status computed from core and dependencies. Always maintained.
    pub derived: ServiceStatus,
}

impl PluginRecord {
    fn new() -> Self {
        Self {
            reported: None,
            derived: ServiceStatus::unknown(),
        }
    }

    /// The reported status when present, otherwise the derived one.
    pub fn effective(&self) -> &ServiceStatus {
        self.reported.as_ref().unwrap_or(&self.derived)
    }
}

/// How a report emission compares with the plugin's previous effective status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportChange {
    /// Same level and summary; nothing to do.
    Unchanged,
    /// Same level, new summary; republish without touching dependents.
    SummaryChanged,
    /// New level; dependents must be recomputed.
    LevelChanged,
}

/// Everything one propagation run has to do.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunPlan {
    /// Core status changed: recompute every root and everything downstream.
    pub core_changed: bool,
    /// Plugins whose reported level changed: recompute their dependents.
    pub reporters: BTreeSet<PluginName>,
    /// Publish a snapshot even if nothing needs recomputation.
    pub republish: bool,
}

impl RunPlan {
    pub fn is_empty(&self) -> bool {
        !self.core_changed && self.reporters.is_empty() && !self.republish
    }
}

/// Result of one propagation run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunOutcome {
    /// Plugins recomputed, in the order they were recomputed.
    pub recomputed: Vec<PluginName>,
    /// Recomputed plugins whose derived status actually changed.
    pub derived_changed: Vec<PluginName>,
}

/// Immutable view of all statuses at the end of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatusSnapshot {
    /// Number of runs completed when the snapshot was taken.
    pub run: u64,
    /// Externally visible status of every plugin.
    pub effective: BTreeMap<PluginName, ServiceStatus>,
    /// Derived status of every plugin, ignoring reported overrides.
    pub derived: BTreeMap<PluginName, ServiceStatus>,
}

/// Owner of all plugin records.
#[derive(Debug)]
pub struct StatusStore {
    graph: Arc<DependencyGraph>,
    core: CoreStatus,
    records: BTreeMap<PluginName, PluginRecord>,
    all_available_summary: String,
    runs: u64,
}

impl StatusStore {
    /// Create one record per plugin, every derived status at the sentinel.
    pub fn new(graph: Arc<DependencyGraph>, all_available_summary: impl Into<String>) -> Self {
        let records = graph
            .plugins()
            .map(|name| (name.clone(), PluginRecord::new()))
            .collect();
        Self {
            graph,
            core: CoreStatus::unknown(),
            records,
            all_available_summary: all_available_summary.into(),
            runs: 0,
        }
    }

    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    pub fn core(&self) -> &CoreStatus {
        &self.core
    }

    /// Replace the stored core status. Recomputation happens on the next run.
    pub fn set_core(&mut self, core: CoreStatus) {
        self.core = core;
    }

    /// Store a report emission and classify it against the previous effective status.
    pub fn record_report(&mut self, name: &str, status: ServiceStatus) -> Result<ReportChange> {
        let record = self.record_mut(name)?;
        let previous = record.effective();
        let change = if previous.level != status.level {
            ReportChange::LevelChanged
        } else if *previous != status {
            ReportChange::SummaryChanged
        } else {
            ReportChange::Unchanged
        };
        record.reported = Some(status);
        Ok(change)
    }

    /// Recompute every plugin the plan affects, each exactly once.
    ///
    /// The affected set is walked in topological order so every plugin sees
    /// the final values of its dependencies for this run.
    pub fn propagate(&mut self, plan: &RunPlan) -> RunOutcome {
        let mut affected: BTreeSet<PluginName> = BTreeSet::new();
        if plan.core_changed {
            let roots = self.graph.roots();
            affected.extend(self.graph.transitive_dependents(&roots));
            affected.extend(roots);
        }
        affected.extend(self.graph.transitive_dependents(&plan.reporters));

        let mut outcome = RunOutcome::default();
        for name in self.graph.in_topological_order(&affected) {
            let status = self.determine_status(&name);
            if let Some(record) = self.records.get_mut(&name) {
                if record.derived != status {
                    record.derived = status;
                    outcome.derived_changed.push(name.clone());
                }
                outcome.recomputed.push(name);
            }
        }
        self.runs += 1;
        outcome
    }

    /// Aggregate of core entries plus each dependency's effective status.
    fn determine_status(&self, name: &str) -> ServiceStatus {
        let mut inputs: Vec<(&str, &ServiceStatus)> = self.core.entries().to_vec();
        for dep in self.graph.dependencies(name).unwrap_or_default() {
            if let Some(record) = self.records.get(dep) {
                inputs.push((dep.as_str(), record.effective()));
            }
        }
        combine(inputs, &self.all_available_summary)
    }

    pub fn record(&self, name: &str) -> Result<&PluginRecord> {
        self.records
            .get(name)
            .ok_or_else(|| StatusError::UnknownPlugin(name.to_string()))
    }

    pub fn effective(&self, name: &str) -> Result<&ServiceStatus> {
        self.record(name).map(PluginRecord::effective)
    }

    pub fn derived(&self, name: &str) -> Result<&ServiceStatus> {
        self.record(name).map(|record| &record.derived)
    }

    pub fn reported(&self, name: &str) -> Result<Option<&ServiceStatus>> {
        self.record(name).map(|record| record.reported.as_ref())
    }

    pub fn runs(&self) -> u64 {
        self.runs
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        let mut effective = BTreeMap::new();
        let mut derived = BTreeMap::new();
        for (name, record) in &self.records {
            effective.insert(name.clone(), record.effective().clone());
            derived.insert(name.clone(), record.derived.clone());
        }
        StatusSnapshot {
            run: self.runs,
            effective,
            derived,
        }
    }

    fn record_mut(&mut self, name: &str) -> Result<&mut PluginRecord> {
        self.records
            .get_mut(name)
            .ok_or_else(|| StatusError::UnknownPlugin(name.to_string()))
    }
}
