//! Public subscription and registration surface.
//!
//! [`PluginsStatusService`] is a cheap, cloneable handle to one running
//! engine. It validates requests synchronously (unknown plugins, closed
//! registrations) and forwards everything else to the engine queue.
//!
//! # Example
//!
//! ```
//! use futures::StreamExt;
//! use plugin_status::{CoreStatus, DependencyGraph, EngineConfig, PluginsStatusService, ServiceStatus};
//!
//! #[tokio::main]
//! async fn main() {
//!     let graph = DependencyGraph::build(vec![
//!         ("licensing".to_string(), vec![]),
//!         ("alerting".to_string(), vec!["licensing".to_string()]),
//!     ])
//!     .unwrap();
//!     let core = futures::stream::iter(vec![CoreStatus::uniform(ServiceStatus::available("ok"))])
//!         .chain(futures::stream::pending());
//!
//!     let service = PluginsStatusService::new(graph, core, &EngineConfig::default());
//!     let mut all = service.all_statuses();
//!     let statuses = all.next().await.unwrap();
//!     assert!(statuses["alerting"].level.is_available());
//! }
//! ```

pub mod streams;

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use futures::stream::{BoxStream, Stream, StreamExt};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info};

use crate::config::EngineConfig;
use crate::engine::{EngineEvent, SnapshotCell, StatusEngine};
use crate::error::{Result, StatusError};
use crate::graph::DependencyGraph;
use crate::status::{CoreStatus, PluginName, ServiceStatus};
use crate::store::{StatusSnapshot, StatusStore};

use streams::{distinct_until_changed, snapshots};

/// Map of plugin name to status, as published after each run.
pub type StatusMap = BTreeMap<PluginName, ServiceStatus>;

struct Inner {
    graph: Arc<DependencyGraph>,
    events: mpsc::UnboundedSender<EngineEvent>,
    snapshots: watch::Receiver<SnapshotCell>,
    registrations_locked: AtomicBool,
    stopped: AtomicBool,
    next_generation: AtomicU64,
    runs: Arc<AtomicU64>,
}

/// Handle to a running status engine.
#[derive(Clone)]
pub struct PluginsStatusService {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for PluginsStatusService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginsStatusService").finish_non_exhaustive()
    }
}

impl PluginsStatusService {
    /// Start an engine for `graph`, fed by `core_feed`.
    ///
    /// Spawns the engine actor and the core feed forwarder on the current
    /// Tokio runtime. Must be called from within a runtime.
    pub fn new<S>(graph: DependencyGraph, core_feed: S, config: &EngineConfig) -> Self
    where
        S: Stream<Item = CoreStatus> + Send + 'static,
    {
        let graph = Arc::new(graph);
        let store = StatusStore::new(Arc::clone(&graph), config.all_available_summary.clone());
        let (events, rx) = mpsc::unbounded_channel();
        let (publisher, snapshots) = watch::channel(None);
        let runs = Arc::new(AtomicU64::new(0));

        let core_tx = events.clone();
        let core_forwarder = tokio::spawn(async move {
            let mut core_feed = Box::pin(core_feed);
            while let Some(core) = core_feed.next().await {
                if core_tx.send(EngineEvent::Core(core)).is_err() {
                    return;
                }
            }
            let _ = core_tx.send(EngineEvent::CoreFeedEnded);
        });

        let engine = StatusEngine::new(
            store,
            config.debounce(),
            config.batch(),
            rx,
            publisher,
            Arc::clone(&runs),
        )
        .with_core_feed(core_forwarder.abort_handle());
        tokio::spawn(engine.run());

        Self {
            inner: Arc::new(Inner {
                graph,
                events,
                snapshots,
                registrations_locked: AtomicBool::new(false),
                stopped: AtomicBool::new(false),
                next_generation: AtomicU64::new(1),
                runs,
            }),
        }
    }

    /// Build the graph from raw edges, then start the engine.
    ///
    /// # Errors
    /// Graph validation errors; no engine is started on failure.
    pub fn from_dependencies<I, D, S>(edges: I, core_feed: S, config: &EngineConfig) -> Result<Self>
    where
        I: IntoIterator<Item = (PluginName, D)>,
        D: IntoIterator<Item = PluginName>,
        S: Stream<Item = CoreStatus> + Send + 'static,
    {
        let graph = DependencyGraph::build(edges)?;
        Ok(Self::new(graph, core_feed, config))
    }

    /// Attach `feed` as the reported status of `plugin`, replacing any previous feed.
    ///
    /// # Errors
    /// - [`StatusError::UnknownPlugin`] if `plugin` is not in the graph.
    /// - [`StatusError::RegistrationClosed`] after [`Self::lock_registrations`].
    /// - [`StatusError::EngineStopped`] after [`Self::shutdown`].
    pub fn register_reported_status<S>(&self, plugin: &str, feed: S) -> Result<()>
    where
        S: Stream<Item = ServiceStatus> + Send + 'static,
    {
        self.ensure_known(plugin)?;
        if self.registrations_locked() {
            return Err(StatusError::RegistrationClosed(plugin.to_string()));
        }
        if self.inner.stopped.load(Ordering::Acquire) || self.inner.events.is_closed() {
            return Err(StatusError::EngineStopped);
        }

        let generation = self.inner.next_generation.fetch_add(1, Ordering::Relaxed);
        let name = plugin.to_string();
        let tx = self.inner.events.clone();
        let task = tokio::spawn(async move {
            let mut feed = Box::pin(feed);
            while let Some(status) = feed.next().await {
                let event = EngineEvent::Reported {
                    plugin: name.clone(),
                    generation,
                    status,
                };
                if tx.send(event).is_err() {
                    return;
                }
            }
            let _ = tx.send(EngineEvent::FeedEnded {
                plugin: name,
                generation,
            });
        });

        let attached = EngineEvent::FeedAttached {
            plugin: plugin.to_string(),
            generation,
            handle: task.abort_handle(),
        };
        if self.inner.events.send(attached).is_err() {
            task.abort();
            return Err(StatusError::EngineStopped);
        }
        debug!(plugin, generation, "Registered custom status feed");
        Ok(())
    }

    /// Forbid new feed registrations from now on. Idempotent.
    pub fn lock_registrations(&self) {
        if !self
            .inner
            .registrations_locked
            .swap(true, Ordering::AcqRel)
        {
            info!("Custom status registrations locked");
        }
    }

    pub fn registrations_locked(&self) -> bool {
        self.inner.registrations_locked.load(Ordering::Acquire)
    }

    /// Every published snapshot, effective and derived, after every completed run.
    pub fn snapshots(&self) -> BoxStream<'static, Arc<StatusSnapshot>> {
        snapshots(self.inner.snapshots.clone()).boxed()
    }

    /// Every snapshot published after this call, none skipped.
    ///
    /// Unlike [`Self::snapshots`] nothing is replayed and a slow consumer
    /// buffers instead of skipping. Ends when the engine stops.
    pub fn published_runs(&self) -> BoxStream<'static, Arc<StatusSnapshot>> {
        let (observer, rx) = mpsc::unbounded_channel();
        let _ = self.inner.events.send(EngineEvent::Observe(observer));
        futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|snapshot| (snapshot, rx))
        })
        .boxed()
    }

    /// Effective status of every plugin, after every completed run.
    pub fn all_statuses(&self) -> BoxStream<'static, StatusMap> {
        snapshots(self.inner.snapshots.clone())
            .map(|snapshot| snapshot.effective.clone())
            .boxed()
    }

    /// Effective statuses of `plugin`'s direct dependencies, when they change.
    pub fn dependency_statuses(&self, plugin: &str) -> Result<BoxStream<'static, StatusMap>> {
        let dependencies = self.inner.graph.dependencies(plugin)?.to_vec();
        let subset = snapshots(self.inner.snapshots.clone()).map(move |snapshot| {
            dependencies
                .iter()
                .filter_map(|dep| {
                    snapshot
                        .effective
                        .get(dep)
                        .map(|status| (dep.clone(), status.clone()))
                })
                .collect::<StatusMap>()
        });
        Ok(distinct_until_changed(subset).boxed())
    }

    /// Derived status of `plugin`, ignoring its reported override, when it changes.
    pub fn derived_status(&self, plugin: &str) -> Result<BoxStream<'static, ServiceStatus>> {
        self.ensure_known(plugin)?;
        let name = plugin.to_string();
        let derived = snapshots(self.inner.snapshots.clone())
            .filter_map(move |snapshot| futures::future::ready(snapshot.derived.get(&name).cloned()));
        Ok(distinct_until_changed(derived).boxed())
    }

    /// Latest published effective statuses, if any run has completed.
    pub fn current_statuses(&self) -> Option<StatusMap> {
        self.inner
            .snapshots
            .borrow()
            .as_ref()
            .map(|snapshot| snapshot.effective.clone())
    }

    /// Number of propagation runs published so far.
    pub fn runs_completed(&self) -> u64 {
        self.inner.runs.load(Ordering::Acquire)
    }

    pub fn graph(&self) -> &DependencyGraph {
        &self.inner.graph
    }

    /// Stop the engine and abort every report feed forwarder.
    ///
    /// Open streams end after yielding what was already published.
    pub fn shutdown(&self) {
        if !self.inner.stopped.swap(true, Ordering::AcqRel) {
            let _ = self.inner.events.send(EngineEvent::Shutdown);
        }
    }

    fn ensure_known(&self, plugin: &str) -> Result<()> {
        if self.inner.graph.contains(plugin) {
            Ok(())
        } else {
            Err(StatusError::UnknownPlugin(plugin.to_string()))
        }
    }
}
