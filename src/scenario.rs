//! Timed replay of status inputs against a real engine.
//!
//! A scenario file declares a graph and a timeline of core snapshots and
//! plugin reports. [`replay`] feeds the timeline to a
//! [`PluginsStatusService`] in real time and records every published
//! snapshot, plus any registrations the engine refused.
//!
//! ```json
//! {
//!   "graph": { "a": [], "b": ["a"] },
//!   "events": [
//!     { "at_ms": 0, "core": { "search": {...}, "storage": {...} } },
//!     { "at_ms": 500, "plugin": "b", "status": { "level": "degraded", "summary": "slow" } }
//!   ],
//!   "lock_after_ms": 1000
//! }
//! ```

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::time::Duration;

use futures::channel::mpsc as fmpsc;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::config::EngineConfig;
use crate::error::Result;
use crate::graph::DependencyGraph;
use crate::log_component;
use crate::service::{PluginsStatusService, StatusMap};
use crate::status::{CoreStatus, PluginName, ServiceStatus};

/// One timed input.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScenarioEvent {
    /// Offset from the start of the replay.
    pub at_ms: u64,
    #[serde(flatten)]
    pub input: ScenarioInput,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ScenarioInput {
    /// Whole core snapshot.
    Core { core: CoreStatus },
    /// Emission on a plugin's report feed. The first one registers the feed.
    Report {
        plugin: PluginName,
        status: ServiceStatus,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    pub graph: BTreeMap<PluginName, Vec<PluginName>>,
    #[serde(default)]
    pub events: Vec<ScenarioEvent>,
    /// Lock registrations this long after the start.
    #[serde(default)]
    pub lock_after_ms: Option<u64>,
}

impl Scenario {
    pub fn from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

/// Something observable during a replay, in the order it happened.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReplayRecord {
    /// A propagation run published these effective statuses.
    Published { run: u64, statuses: StatusMap },
    /// A report feed registration was refused.
    Rejected {
        at_ms: u64,
        plugin: PluginName,
        error: String,
    },
}

/// Replay `scenario` and collect every run the engine published.
///
/// Waits one debounce plus one batch window after the last event (with a
/// small margin) so the final run is included.
pub async fn replay(scenario: Scenario, config: &EngineConfig) -> Result<Vec<ReplayRecord>> {
    let graph = DependencyGraph::build(scenario.graph)?;
    let (core_tx, core_rx) = fmpsc::unbounded::<CoreStatus>();
    let service = PluginsStatusService::new(graph, core_rx, config);

    let mut records = Vec::new();
    let mut published = service.published_runs();
    let collector = tokio::spawn(async move {
        let mut seen = Vec::new();
        while let Some(snapshot) = published.next().await {
            seen.push((snapshot.run, snapshot.effective.clone()));
        }
        seen
    });

    let start = Instant::now();
    let mut feeds: HashMap<PluginName, fmpsc::UnboundedSender<ServiceStatus>> = HashMap::new();
    let mut events = scenario.events;
    events.sort_by_key(|e| e.at_ms);
    let mut lock_at = scenario.lock_after_ms;

    for event in events {
        if let Some(lock_ms) = lock_at {
            if lock_ms <= event.at_ms {
                tokio::time::sleep_until(start + Duration::from_millis(lock_ms)).await;
                service.lock_registrations();
                lock_at = None;
            }
        }
        tokio::time::sleep_until(start + Duration::from_millis(event.at_ms)).await;

        match event.input {
            ScenarioInput::Core { core } => {
                let _ = core_tx.unbounded_send(core);
            }
            ScenarioInput::Report { plugin, status } => {
                if !feeds.contains_key(&plugin) {
                    let (tx, rx) = fmpsc::unbounded();
                    match service.register_reported_status(&plugin, rx) {
                        Ok(()) => {
                            feeds.insert(plugin.clone(), tx);
                        }
                        Err(e) => {
                            records.push(ReplayRecord::Rejected {
                                at_ms: event.at_ms,
                                plugin,
                                error: e.to_string(),
                            });
                            continue;
                        }
                    }
                }
                if let Some(tx) = feeds.get(&plugin) {
                    let _ = tx.unbounded_send(status);
                }
            }
        }
    }
    if lock_at.is_some() {
        service.lock_registrations();
    }

    tokio::time::sleep(config.debounce() + config.batch() + Duration::from_millis(50)).await;
    service.shutdown();

    let seen = collector.await?;
    log_component!(debug, "scenario", "Scenario replay finished", runs = seen.len());
    records.extend(
        seen.into_iter()
            .map(|(run, statuses)| ReplayRecord::Published { run, statuses }),
    );
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::ServiceLevel;

    const SCENARIO: &str = r#"{
        "graph": { "a": [], "b": ["a"], "c": ["b"] },
        "events": [
            { "at_ms": 0, "core": {
                "search": { "level": "available", "summary": "green" },
                "storage": { "level": "available", "summary": "ok" } } },
            { "at_ms": 500, "plugin": "b", "status": { "level": "degraded", "summary": "slow" } },
            { "at_ms": 1500, "plugin": "a", "status": { "level": "critical", "summary": "boom" } }
        ],
        "lock_after_ms": 1000
    }"#;

    #[test]
    fn test_scenario_parses_both_event_kinds() {
        let scenario: Scenario = serde_json::from_str(SCENARIO).unwrap();
        assert_eq!(scenario.events.len(), 3);
        assert!(matches!(scenario.events[0].input, ScenarioInput::Core { .. }));
        assert!(matches!(
            &scenario.events[1].input,
            ScenarioInput::Report { plugin, .. } if plugin == "b"
        ));
        assert_eq!(scenario.lock_after_ms, Some(1000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_replay_records_runs_and_rejections() {
        let scenario: Scenario = serde_json::from_str(SCENARIO).unwrap();
        let records = replay(scenario, &EngineConfig::default()).await.unwrap();

        assert!(records.iter().any(|r| matches!(
            r,
            ReplayRecord::Rejected { plugin, at_ms: 1500, .. } if plugin == "a"
        )));

        let last = records
            .iter()
            .rev()
            .find_map(|r| match r {
                ReplayRecord::Published { statuses, .. } => Some(statuses.clone()),
                _ => None,
            })
            .unwrap();
        assert_eq!(last["a"].level, ServiceLevel::Available);
        assert_eq!(last["b"], ServiceStatus::degraded("slow"));
        assert_eq!(last["c"].level, ServiceLevel::Degraded);

        let runs: Vec<u64> = records
            .iter()
            .filter_map(|r| match r {
                ReplayRecord::Published { run, .. } => Some(*run),
                _ => None,
            })
            .collect();
        let expected: Vec<u64> = (1..=runs.len() as u64).collect();
        assert_eq!(runs, expected);
    }
}
