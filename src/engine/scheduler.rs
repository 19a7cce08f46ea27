//! Debounce and batch windows.
//!
//! The scheduler is pure bookkeeping: callers pass the current instant in and
//! ask for the next deadline, so it can be tested without a runtime.
//!
//! - Core snapshots are **debounced**: a newer snapshot replaces the pending
//!   one and pushes the deadline out again.
//! - Propagation triggers are **batched**: the first trigger opens a window
//!   of fixed length; everything marked before it closes runs together.
//!
//! A debounced core snapshot becomes a trigger for the batch when it fires.

use std::time::Duration;

use tokio::time::Instant;

use crate::status::{CoreStatus, PluginName};
use crate::store::RunPlan;

/// What became due on a [`Scheduler::poll`].
#[derive(Debug, Default, PartialEq)]
pub struct Due {
    /// Core snapshot whose debounce window elapsed; store it now.
    pub core: Option<CoreStatus>,
    /// Batch whose window elapsed; run it now.
    pub run: Option<RunPlan>,
}

#[derive(Debug)]
pub struct Scheduler {
    debounce: Duration,
    batch: Duration,
    pending_core: Option<(CoreStatus, Instant)>,
    plan: RunPlan,
    batch_deadline: Option<Instant>,
}

impl Scheduler {
    pub fn new(debounce: Duration, batch: Duration) -> Self {
        Self {
            debounce,
            batch,
            pending_core: None,
            plan: RunPlan::default(),
            batch_deadline: None,
        }
    }

    /// A new core snapshot arrived; it replaces any pending one.
    pub fn core_changed(&mut self, core: CoreStatus, now: Instant) {
        self.pending_core = Some((core, now + self.debounce));
    }

    /// A plugin's reported level changed; its dependents need recomputation.
    pub fn mark_reporter(&mut self, plugin: PluginName, now: Instant) {
        self.plan.reporters.insert(plugin);
        self.open_batch(now);
    }

    /// Something visible changed without needing recomputation.
    pub fn mark_republish(&mut self, now: Instant) {
        self.plan.republish = true;
        self.open_batch(now);
    }

    /// Earliest instant at which [`Scheduler::poll`] has work.
    pub fn next_deadline(&self) -> Option<Instant> {
        let core = self.pending_core.as_ref().map(|(_, deadline)| *deadline);
        match (core, self.batch_deadline) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Collect whatever is due at `now`.
    pub fn poll(&mut self, now: Instant) -> Due {
        let mut due = Due::default();

        if matches!(self.pending_core, Some((_, deadline)) if deadline <= now) {
            if let Some((core, _)) = self.pending_core.take() {
                due.core = Some(core);
                self.plan.core_changed = true;
                self.open_batch(now);
            }
        }

        if matches!(self.batch_deadline, Some(deadline) if deadline <= now) {
            self.batch_deadline = None;
            let plan = std::mem::take(&mut self.plan);
            if !plan.is_empty() {
                due.run = Some(plan);
            }
        }

        due
    }

    /// Whether anything is waiting on a window.
    pub fn is_idle(&self) -> bool {
        self.pending_core.is_none() && self.batch_deadline.is_none()
    }

    fn open_batch(&mut self, now: Instant) {
        if self.batch_deadline.is_none() {
            self.batch_deadline = Some(now + self.batch);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::ServiceStatus;

    const WINDOW: Duration = Duration::from_millis(100);

    fn scheduler() -> Scheduler {
        Scheduler::new(WINDOW, WINDOW)
    }

    fn core(summary: &str) -> CoreStatus {
        CoreStatus::uniform(ServiceStatus::available(summary))
    }

    #[test]
    fn test_idle_has_no_deadline() {
        let mut s = scheduler();
        assert!(s.is_idle());
        assert_eq!(s.next_deadline(), None);
        assert_eq!(s.poll(Instant::now()), Due::default());
    }

    #[test]
    fn test_core_debounce_keeps_latest_and_resets_deadline() {
        let mut s = scheduler();
        let t0 = Instant::now();
        s.core_changed(core("first"), t0);
        s.core_changed(core("second"), t0 + Duration::from_millis(60));

        assert_eq!(s.next_deadline(), Some(t0 + Duration::from_millis(160)));
        assert!(s.poll(t0 + Duration::from_millis(120)).core.is_none());

        let due = s.poll(t0 + Duration::from_millis(160));
        assert_eq!(due.core, Some(core("second")));
        assert!(due.run.is_none());
    }

    #[test]
    fn test_core_fire_opens_batch() {
        let mut s = scheduler();
        let t0 = Instant::now();
        s.core_changed(core("ok"), t0);
        let fired = t0 + WINDOW;
        s.poll(fired);
        assert_eq!(s.next_deadline(), Some(fired + WINDOW));

        let due = s.poll(fired + WINDOW);
        let plan = due.run.unwrap();
        assert!(plan.core_changed);
        assert!(plan.reporters.is_empty());
        assert!(s.is_idle());
    }

    #[test]
    fn test_batch_coalesces_reporters() {
        let mut s = scheduler();
        let t0 = Instant::now();
        s.mark_reporter("b".into(), t0);
        s.mark_reporter("b".into(), t0 + Duration::from_millis(30));
        s.mark_reporter("c".into(), t0 + Duration::from_millis(90));

        assert_eq!(s.next_deadline(), Some(t0 + WINDOW));
        let due = s.poll(t0 + WINDOW);
        let plan = due.run.unwrap();
        let names: Vec<_> = plan.reporters.into_iter().collect();
        assert_eq!(names, vec!["b", "c"]);
    }

    #[test]
    fn test_batch_not_extended_by_later_marks() {
        let mut s = scheduler();
        let t0 = Instant::now();
        s.mark_reporter("b".into(), t0);
        s.mark_republish(t0 + Duration::from_millis(99));
        assert_eq!(s.next_deadline(), Some(t0 + WINDOW));
    }

    #[test]
    fn test_marks_after_batch_start_new_window() {
        let mut s = scheduler();
        let t0 = Instant::now();
        s.mark_reporter("b".into(), t0);
        assert!(s.poll(t0 + WINDOW).run.is_some());

        let t1 = t0 + Duration::from_millis(150);
        s.mark_reporter("c".into(), t1);
        assert_eq!(s.next_deadline(), Some(t1 + WINDOW));
    }

    #[test]
    fn test_republish_only_plan() {
        let mut s = scheduler();
        let t0 = Instant::now();
        s.mark_republish(t0);
        let plan = s.poll(t0 + WINDOW).run.unwrap();
        assert!(plan.republish);
        assert!(!plan.core_changed);
    }

    #[test]
    fn test_next_deadline_is_earliest() {
        let mut s = scheduler();
        let t0 = Instant::now();
        s.mark_reporter("b".into(), t0);
        s.core_changed(core("ok"), t0 + Duration::from_millis(50));
        assert_eq!(s.next_deadline(), Some(t0 + WINDOW));
    }
}
