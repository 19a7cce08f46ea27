//! Propagation engine actor.
//!
//! One task owns the [`StatusStore`], the [`Scheduler`] and the handles of
//! every report-feed forwarder. All inputs arrive through a single ordered
//! queue of [`EngineEvent`]s, so no state is shared for mutation.
//!
//! ```text
//! core feed ──┐
//! report feeds ├──> event queue ──> StatusEngine ──> watch<StatusSnapshot>
//! service API ─┘                    (store + scheduler)
//! ```
//!
//! Each run publishes exactly one snapshot, no matter how many plugins it
//! recomputed.

pub mod scheduler;

pub use scheduler::{Due, Scheduler};

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::AbortHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::status::{CoreStatus, PluginName, ServiceStatus};
use crate::store::{ReportChange, StatusSnapshot, StatusStore};

/// Latest published snapshot; `None` until the first run completes.
pub type SnapshotCell = Option<Arc<StatusSnapshot>>;

/// Inputs to the engine, in the order they must be applied.
#[derive(Debug)]
pub enum EngineEvent {
    /// New core snapshot from the core feed.
    Core(CoreStatus),
    /// The core feed ended; the last snapshot stays in effect.
    CoreFeedEnded,
    /// Emission from the `generation`-th registered report feed.
    Reported {
        plugin: PluginName,
        generation: u64,
        status: ServiceStatus,
    },
    /// A report feed forwarder was spawned.
    FeedAttached {
        plugin: PluginName,
        generation: u64,
        handle: AbortHandle,
    },
    /// A report feed ended on its own.
    FeedEnded { plugin: PluginName, generation: u64 },
    /// Deliver every snapshot published from now on to this sender.
    Observe(mpsc::UnboundedSender<Arc<StatusSnapshot>>),
    /// Stop the actor and abort every feed forwarder.
    Shutdown,
}

struct Feed {
    generation: u64,
    handle: AbortHandle,
}

/// The actor. Construct with [`StatusEngine::new`], then drive with [`StatusEngine::run`].
pub struct StatusEngine {
    store: StatusStore,
    scheduler: Scheduler,
    events: mpsc::UnboundedReceiver<EngineEvent>,
    publisher: watch::Sender<SnapshotCell>,
    runs: Arc<AtomicU64>,
    feeds: HashMap<PluginName, Feed>,
    core_feed: Option<AbortHandle>,
    observers: Vec<mpsc::UnboundedSender<Arc<StatusSnapshot>>>,
    /// Newest feed generation seen per plugin; older emissions are stale.
    current_generation: HashMap<PluginName, u64>,
}

impl StatusEngine {
    pub fn new(
        store: StatusStore,
        debounce: Duration,
        batch: Duration,
        events: mpsc::UnboundedReceiver<EngineEvent>,
        publisher: watch::Sender<SnapshotCell>,
        runs: Arc<AtomicU64>,
    ) -> Self {
        Self {
            store,
            scheduler: Scheduler::new(debounce, batch),
            events,
            publisher,
            runs,
            feeds: HashMap::new(),
            core_feed: None,
            observers: Vec::new(),
            current_generation: HashMap::new(),
        }
    }

    /// Abort the core feed forwarder when the actor stops.
    pub fn with_core_feed(mut self, handle: AbortHandle) -> Self {
        self.core_feed = Some(handle);
        self
    }

    /// Process events and timers until shutdown or until every sender is gone.
    pub async fn run(mut self) {
        debug!(plugins = self.store.graph().len(), "Status engine started");
        loop {
            let deadline = self.scheduler.next_deadline();
            tokio::select! {
                event = self.events.recv() => match event {
                    Some(EngineEvent::Shutdown) | None => break,
                    Some(event) => self.handle(event, Instant::now()),
                },
                _ = sleep_until(deadline) => self.on_deadline(Instant::now()),
            }
        }
        self.stop();
        info!("Status engine stopped");
    }

    fn handle(&mut self, event: EngineEvent, now: Instant) {
        match event {
            EngineEvent::Core(core) => {
                debug!(
                    search = %core.search.level,
                    storage = %core.storage.level,
                    "Core status changed"
                );
                self.scheduler.core_changed(core, now);
            }
            EngineEvent::CoreFeedEnded => {
                debug!("Core status feed ended, keeping last snapshot");
            }
            EngineEvent::Reported {
                plugin,
                generation,
                status,
            } => self.on_reported(plugin, generation, status, now),
            EngineEvent::FeedAttached {
                plugin,
                generation,
                handle,
            } => self.on_attached(plugin, generation, handle),
            EngineEvent::FeedEnded { plugin, generation } => {
                if self
                    .feeds
                    .get(&plugin)
                    .is_some_and(|feed| feed.generation == generation)
                {
                    self.feeds.remove(&plugin);
                    debug!(plugin = %plugin, "Report feed ended, keeping last reported status");
                }
            }
            EngineEvent::Observe(observer) => self.observers.push(observer),
            EngineEvent::Shutdown => {}
        }
    }

    /// Abort every forwarder, including ones whose attach notice is still queued.
    fn stop(&mut self) {
        self.events.close();
        while let Ok(event) = self.events.try_recv() {
            if let EngineEvent::FeedAttached { handle, .. } = event {
                handle.abort();
            }
        }
        for (_, feed) in self.feeds.drain() {
            feed.handle.abort();
        }
        if let Some(core_feed) = self.core_feed.take() {
            core_feed.abort();
        }
    }

    fn on_reported(&mut self, plugin: PluginName, generation: u64, status: ServiceStatus, now: Instant) {
        let current = self.current_generation.get(&plugin).copied().unwrap_or(0);
        if generation < current {
            debug!(plugin = %plugin, generation, current, "Dropping emission from replaced feed");
            return;
        }
        self.current_generation.insert(plugin.clone(), generation);

        let level = status.level;
        match self.store.record_report(&plugin, status) {
            Ok(ReportChange::LevelChanged) => {
                debug!(plugin = %plugin, level = %level, "Plugin reported new level");
                self.scheduler.mark_reporter(plugin, now);
            }
            Ok(ReportChange::SummaryChanged) => self.scheduler.mark_republish(now),
            Ok(ReportChange::Unchanged) => {}
            Err(e) => warn!(plugin = %plugin, error = %e, "Ignoring report"),
        }
    }

    fn on_attached(&mut self, plugin: PluginName, generation: u64, handle: AbortHandle) {
        let newest = self.current_generation.get(&plugin).copied().unwrap_or(0);
        let superseded = generation < newest
            || self
                .feeds
                .get(&plugin)
                .is_some_and(|feed| feed.generation > generation);
        if superseded {
            handle.abort();
            return;
        }
        self.current_generation.insert(plugin.clone(), generation);
        if let Some(previous) = self.feeds.insert(plugin.clone(), Feed { generation, handle }) {
            previous.handle.abort();
            info!(plugin = %plugin, "Replaced report feed");
        }
    }

    fn on_deadline(&mut self, now: Instant) {
        let due = self.scheduler.poll(now);
        if let Some(core) = due.core {
            self.store.set_core(core);
        }
        if let Some(plan) = due.run {
            if !plan.reporters.is_empty() {
                let names: Vec<&str> = plan.reporters.iter().map(String::as_str).collect();
                debug!(plugins = %names.join(","), "Updating dependency tree");
            }
            let outcome = self.store.propagate(&plan);
            self.publish(outcome.recomputed.len());
        }
    }

    fn publish(&mut self, recomputed: usize) {
        let snapshot = self.store.snapshot();
        let ready = snapshot
            .effective
            .values()
            .filter(|status| status.level.is_available())
            .count();
        debug!(
            run = snapshot.run,
            recomputed,
            ready,
            total = snapshot.effective.len(),
            "Published plugin statuses"
        );
        let snapshot = Arc::new(snapshot);
        self.observers
            .retain(|observer| observer.send(Arc::clone(&snapshot)).is_ok());
        self.runs.fetch_add(1, Ordering::Release);
        self.publisher.send_replace(Some(snapshot));
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
