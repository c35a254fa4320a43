//! Update Scheduler
//!
//! Four ordered work queues drained synchronously in one pass:
//!
//! 1. **Updates**: dependees whose keys changed, in the order the flush
//!    queued them.
//! 2. **Mounts**: ref assignment and first effect runs of freshly created
//!    instances.
//! 3. **Post-mounts**: `component_did_mount` callbacks.
//! 4. **Destroys**: teardown of unmounted instances.
//!
//! # Ordering
//!
//! A queue is only consulted when every queue before it is empty, and the
//! check restarts from the top after each item. An effect that writes state
//! during a mount therefore cannot observe a half-updated tree, and teardown
//! always happens last.
//!
//! # Re-entrancy
//!
//! Starting a pass while one is running does not nest: the call returns at
//! once and the running pass picks up whatever was enqueued.

mod microtask;

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;

use tracing::trace;

pub(crate) use microtask::MicrotaskQueue;

use crate::error::Result;
use crate::reactive::{DependeeId, Runtime};

/// Deferred work run by a scheduler pass.
pub(crate) type Task = Box<dyn FnOnce(&Runtime) -> Result<()>>;

/// The four ordered queues.
#[derive(Default)]
pub(crate) struct Scheduler {
    /// Dependee and the epoch of the write that queued it.
    updates: RefCell<VecDeque<(DependeeId, u64)>>,
    mounts: RefCell<VecDeque<Task>>,
    post_mounts: RefCell<VecDeque<Task>>,
    destroys: RefCell<VecDeque<Task>>,
    running: Cell<bool>,
}

/// Work item taken from the highest-priority non-empty queue.
enum Work {
    Update(DependeeId, u64),
    Task(Task),
}

impl Scheduler {
    pub fn queue_update(&self, id: DependeeId, epoch: u64) {
        self.updates.borrow_mut().push_back((id, epoch));
    }

    pub fn queue_mount(&self, task: Task) {
        self.mounts.borrow_mut().push_back(task);
    }

    pub fn queue_post_mount(&self, task: Task) {
        self.post_mounts.borrow_mut().push_back(task);
    }

    pub fn queue_destroy(&self, task: Task) {
        self.destroys.borrow_mut().push_back(task);
    }

    /// Whether a pass is in progress.
    pub fn is_running(&self) -> bool {
        self.running.get()
    }

    /// Drop all queued work.
    pub fn clear(&self) {
        self.updates.borrow_mut().clear();
        self.mounts.borrow_mut().clear();
        self.post_mounts.borrow_mut().clear();
        self.destroys.borrow_mut().clear();
    }

    fn next(&self) -> Option<Work> {
        if let Some((id, epoch)) = self.updates.borrow_mut().pop_front() {
            return Some(Work::Update(id, epoch));
        }
        [&self.mounts, &self.post_mounts, &self.destroys]
            .into_iter()
            .find_map(|queue| queue.borrow_mut().pop_front())
            .map(Work::Task)
    }

    /// Drain every queue in priority order. Returns immediately if a pass is
    /// already running. On error the remaining work is dropped.
    pub fn run_pass(&self, rt: &Runtime) -> Result<()> {
        if self.running.replace(true) {
            return Ok(());
        }
        let result = self.drain(rt);
        self.running.set(false);
        if result.is_err() {
            self.clear();
        }
        result
    }

    fn drain(&self, rt: &Runtime) -> Result<()> {
        let mut items = 0usize;
        while let Some(work) = self.next() {
            items += 1;
            match work {
                Work::Update(id, epoch) => rt.run_update(id, epoch)?,
                Work::Task(task) => task(rt)?,
            }
        }
        trace!(items, "scheduler pass complete");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::*;

    fn log_task(log: &Rc<RefCell<Vec<&'static str>>>, name: &'static str) -> Task {
        let log = log.clone();
        Box::new(move |_| {
            log.borrow_mut().push(name);
            Ok(())
        })
    }

    #[test]
    fn queues_drain_in_priority_order() {
        let rt = Runtime::new();
        let scheduler = Scheduler::default();
        let log = Rc::new(RefCell::new(Vec::new()));

        scheduler.queue_destroy(log_task(&log, "destroy"));
        scheduler.queue_post_mount(log_task(&log, "post-mount"));
        scheduler.queue_mount(log_task(&log, "mount"));
        scheduler.run_pass(&rt).unwrap();

        assert_eq!(*log.borrow(), vec!["mount", "post-mount", "destroy"]);
    }

    #[test]
    fn work_queued_mid_pass_respects_priority() {
        let rt = Runtime::new();
        let scheduler = Rc::new(Scheduler::default());
        let log = Rc::new(RefCell::new(Vec::new()));

        let inner = scheduler.clone();
        let inner_log = log.clone();
        scheduler.queue_post_mount(Box::new(move |_| {
            inner_log.borrow_mut().push("post-mount");
            inner.queue_destroy(log_task(&inner_log, "destroy"));
            inner.queue_mount(log_task(&inner_log, "late mount"));
            Ok(())
        }));
        scheduler.run_pass(&rt).unwrap();

        assert_eq!(*log.borrow(), vec!["post-mount", "late mount", "destroy"]);
    }

    #[test]
    fn nested_pass_is_absorbed() {
        let rt = Runtime::new();
        let scheduler = Rc::new(Scheduler::default());
        let log = Rc::new(RefCell::new(Vec::new()));

        let inner = scheduler.clone();
        let inner_log = log.clone();
        scheduler.queue_mount(Box::new(move |rt| {
            inner.queue_mount(log_task(&inner_log, "queued"));
            inner.run_pass(rt)?;
            inner_log.borrow_mut().push("outer");
            Ok(())
        }));
        scheduler.run_pass(&rt).unwrap();

        assert_eq!(*log.borrow(), vec!["outer", "queued"]);
        assert!(!scheduler.is_running());
    }

    #[test]
    fn failure_clears_remaining_work() {
        let rt = Runtime::new();
        let scheduler = Scheduler::default();
        let log = Rc::new(RefCell::new(Vec::new()));

        scheduler.queue_mount(Box::new(|_| Err(crate::Error::EffectLoop { depth: 0 })));
        scheduler.queue_destroy(log_task(&log, "destroy"));
        assert!(scheduler.run_pass(&rt).is_err());
        scheduler.run_pass(&rt).unwrap();
        assert!(log.borrow().is_empty());
    }
}
