//! Reactive Runtime
//!
//! The runtime is the central coordinator. It owns the store arena, the
//! dependency graph, the tracking stack, the scheduler queues and the
//! document the reconciler renders into. Nothing is global: two runtimes
//! never see each other's state, dependees or keys.
//!
//! # How It Works
//!
//! 1. A dependee runs inside [`tracked_execute`](Runtime::tracked_execute).
//!    Every read it performs lands in a fresh tracking frame; when it
//!    returns, the frame is diffed against the dependee's previous key set
//!    and the graph is patched.
//!
//! 2. A write that changes a value stamps the key with a new epoch and
//!    appends it to the pending queue. The first pending write of a tick
//!    schedules a flush on the microtask queue.
//!
//! 3. A flush drains the pending queue in batches. Each batch resolves keys
//!    to dependees, enqueues each distinct dependee once, and runs a
//!    scheduler pass. Work that dirties more keys produces another batch.
//!
//! # Epochs
//!
//! A dependee remembers the epoch at which its last run started. A write
//! stamped at or before that epoch was already visible to the run, so the
//! dependee is skipped. This is what keeps a child component that was just
//! re-rendered by its parent from rendering a second time for the same
//! change. For that to hold, the components queued by a batch run in
//! creation order, so a parent always runs before its children.
//!
//! # Ownership
//!
//! [`Obj`] handles point back at the runtime through a `Weak`, so state can
//! be dropped independently of the runtime and never keeps it alive.

use std::cell::{Cell, Ref, RefCell, RefMut};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::rc::{Rc, Weak};

use tracing::{debug, trace, warn};

use super::context::TrackingStack;
use super::dependee::{Dependee, DependeeId, DependeeKind};
use super::key::StateKey;
use super::store::{Obj, Store};
use super::value::Value;
use crate::config::RuntimeConfig;
use crate::dom::{Document, DomId};
use crate::error::{Error, Result};
use crate::graph::DependencyGraph;
use crate::hooks::HookRegistry;
use crate::reconcile::Instance;
use crate::scheduler::{MicrotaskQueue, Scheduler};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FlushState {
    Idle,
    /// A flush microtask is queued.
    Scheduled,
    Running,
}

pub(crate) struct RuntimeInner {
    config: RuntimeConfig,
    document: Document,
    store: RefCell<Store>,
    graph: RefCell<DependencyGraph>,
    tracking: TrackingStack,
    dependees: RefCell<HashMap<DependeeId, Rc<dyn Dependee>>>,
    next_dependee: Cell<u64>,
    epoch: Cell<u64>,
    pending: RefCell<Vec<(StateKey, u64)>>,
    flush: Cell<FlushState>,
    microtasks: MicrotaskQueue,
    scheduler: Scheduler,
    hooks: HookRegistry,
    roots: RefCell<HashMap<DomId, Instance>>,
}

/// Handle to a reactive runtime.
///
/// Cloning yields another handle to the same runtime. The runtime is
/// single-threaded and is neither `Send` nor `Sync`.
#[derive(Clone)]
pub struct Runtime {
    inner: Rc<RuntimeInner>,
}

impl Runtime {
    /// Create a runtime with the default configuration and an empty
    /// document.
    pub fn new() -> Self {
        Self::with_config(RuntimeConfig::default())
    }

    /// Create a runtime with the given configuration.
    pub fn with_config(config: RuntimeConfig) -> Self {
        Self::with_document(config, Document::new())
    }

    /// Create a runtime rendering into an existing document.
    pub fn with_document(config: RuntimeConfig, document: Document) -> Self {
        debug!(?config, "runtime created");
        Self {
            inner: Rc::new(RuntimeInner {
                config,
                document,
                store: RefCell::new(Store::default()),
                graph: RefCell::new(DependencyGraph::new()),
                tracking: TrackingStack::default(),
                dependees: RefCell::new(HashMap::new()),
                next_dependee: Cell::new(1),
                epoch: Cell::new(0),
                pending: RefCell::new(Vec::new()),
                flush: Cell::new(FlushState::Idle),
                microtasks: MicrotaskQueue::default(),
                scheduler: Scheduler::default(),
                hooks: HookRegistry::default(),
                roots: RefCell::new(HashMap::new()),
            }),
        }
    }

    pub(crate) fn from_weak(weak: &Weak<RuntimeInner>) -> Option<Self> {
        weak.upgrade().map(|inner| Self { inner })
    }

    pub(crate) fn downgrade(&self) -> Weak<RuntimeInner> {
        Rc::downgrade(&self.inner)
    }

    /// The active configuration.
    pub fn config(&self) -> &RuntimeConfig {
        &self.inner.config
    }

    /// The document this runtime renders into.
    pub fn document(&self) -> &Document {
        &self.inner.document
    }

    // ---- State ----

    /// Wrap a JSON tree as reactive state. Nested objects and arrays are
    /// wrapped too. A scalar is wrapped as `{ "value": x }`.
    pub fn create_state(&self, initial: serde_json::Value) -> Obj {
        self.wrap(initial, false)
    }

    /// Wrap a JSON value without wrapping its nested containers.
    pub fn create_shallow(&self, initial: serde_json::Value) -> Obj {
        self.wrap(initial, true)
    }

    fn wrap(&self, initial: serde_json::Value, shallow: bool) -> Obj {
        let rt = self.downgrade();
        let id = self.store_mut().wrap_json(initial, shallow, &rt);
        Obj { id, rt }
    }

    /// Allocate a shallow object without dirtying anything. Nothing can
    /// depend on an object nobody has seen yet.
    pub(crate) fn create_record(&self, fields: Vec<(Rc<str>, Value)>) -> Obj {
        let id = self.store_mut().alloc_record(fields);
        Obj {
            id,
            rt: self.downgrade(),
        }
    }

    pub(crate) fn store(&self) -> Ref<'_, Store> {
        self.inner.store.borrow()
    }

    pub(crate) fn store_mut(&self) -> RefMut<'_, Store> {
        self.inner.store.borrow_mut()
    }

    // ---- Tracking ----

    /// Record a read into the innermost tracking frame.
    pub(crate) fn track(&self, key: StateKey) {
        self.inner.tracking.record(key);
    }

    /// Whether reads are currently being recorded.
    pub fn is_tracking(&self) -> bool {
        self.inner.tracking.is_tracking()
    }

    /// Run `f` as dependee `id`, then replace the dependee's dependencies
    /// with exactly the keys `f` read.
    pub(crate) fn tracked_execute<R>(&self, id: DependeeId, f: impl FnOnce() -> R) -> R {
        debug_assert!(
            self.inner.graph.borrow().contains(id),
            "tracked execution of released dependee {id:?}"
        );
        let started = self.inner.epoch.get();
        let guard = self.inner.tracking.enter(Some(id));
        let result = f();
        let reads = guard.finish();

        let mut graph = self.inner.graph.borrow_mut();
        if graph.contains(id) {
            graph.update_dependencies(id, reads.into_iter().collect());
            graph.set_last_run(id, started);
        }
        if cfg!(debug_assertions) && self.inner.config.verify_graph {
            debug_assert!(graph.check_invariant(), "dependency graph out of sync");
        }
        result
    }

    /// Run `f` without recording any of its reads.
    pub fn untracked<R>(&self, f: impl FnOnce() -> R) -> R {
        let _guard = self.inner.tracking.enter(None);
        f()
    }

    // ---- Dependees ----

    pub(crate) fn next_dependee_id(&self) -> DependeeId {
        let raw = self.inner.next_dependee.get();
        self.inner.next_dependee.set(raw + 1);
        DependeeId::from_raw(raw)
    }

    /// Register a dependee under an id from
    /// [`next_dependee_id`](Self::next_dependee_id).
    pub(crate) fn register_dependee(
        &self,
        id: DependeeId,
        kind: DependeeKind,
        dependee: Rc<dyn Dependee>,
    ) {
        self.inner.graph.borrow_mut().insert(id, kind);
        self.inner.dependees.borrow_mut().insert(id, dependee);
        trace!(?id, ?kind, "dependee registered");
    }

    /// Remove a dependee and all of its graph edges. Later writes to keys it
    /// read no longer reach it.
    pub(crate) fn release_dependee(&self, id: DependeeId) {
        self.inner.graph.borrow_mut().remove(id);
        let released = self.inner.dependees.borrow_mut().remove(&id);
        drop(released);
    }

    /// Number of live dependees.
    pub fn dependee_count(&self) -> usize {
        self.inner.graph.borrow().len()
    }

    /// Run a queued update unless the dependee was released or has already
    /// run since the write that queued it.
    pub(crate) fn run_update(&self, id: DependeeId, epoch: u64) -> Result<()> {
        let fresh = self
            .inner
            .graph
            .borrow()
            .node(id)
            .is_some_and(|n| epoch > n.last_run());
        if !fresh {
            return Ok(());
        }
        let dependee = self.inner.dependees.borrow().get(&id).cloned();
        match dependee {
            Some(dependee) => dependee.run(self),
            None => Ok(()),
        }
    }

    // ---- Writes and flushing ----

    /// Record a changed key and make sure a flush will pick it up.
    pub(crate) fn mark_dirty(&self, key: StateKey) {
        let epoch = self.inner.epoch.get() + 1;
        self.inner.epoch.set(epoch);
        self.inner.pending.borrow_mut().push((key, epoch));
        if self.inner.flush.get() == FlushState::Idle {
            self.inner.flush.set(FlushState::Scheduled);
            self.inner.microtasks.enqueue(Box::new(|rt: &Runtime| rt.flush()));
            trace!(?key, "flush scheduled");
        }
    }

    /// Whether dirty keys are waiting for a flush.
    pub fn has_pending_updates(&self) -> bool {
        !self.inner.pending.borrow().is_empty()
    }

    /// Flush pending writes now instead of waiting for the microtask.
    ///
    /// Calling this while a flush is already running is a no-op; the running
    /// flush picks the new keys up. On error the remaining pending keys and
    /// queued work are discarded.
    pub fn flush(&self) -> Result<()> {
        if self.inner.flush.get() == FlushState::Running {
            return Ok(());
        }
        self.inner.flush.set(FlushState::Running);
        let result = self.flush_batches();
        self.inner.flush.set(FlushState::Idle);
        if let Err(err) = &result {
            warn!(%err, "flush aborted");
            self.inner.pending.borrow_mut().clear();
            self.inner.scheduler.clear();
        }
        result
    }

    fn flush_batches(&self) -> Result<()> {
        let mut depth = 0usize;
        loop {
            let batch = std::mem::take(&mut *self.inner.pending.borrow_mut());
            if batch.is_empty() {
                break;
            }
            depth += 1;
            if let Some(max) = self.inner.config.max_flush_depth {
                if depth > max {
                    return Err(Error::EffectLoop { depth: max });
                }
            }

            let mut updated = HashSet::new();
            let mut queue = Vec::new();
            {
                let graph = self.inner.graph.borrow();
                for (key, epoch) in &batch {
                    for id in graph.dependents(key) {
                        let Some(node) = graph.node(id) else { continue };
                        if *epoch > node.last_run() && updated.insert(id) {
                            queue.push((id, *epoch, node.kind()));
                        }
                    }
                }
            }
            order_components_parent_first(&mut queue);
            for (id, epoch, _) in queue {
                self.inner.scheduler.queue_update(id, epoch);
            }
            trace!(keys = batch.len(), dependees = updated.len(), depth, "flush batch");
            self.inner.scheduler.run_pass(self)?;
        }
        if depth > 0 {
            debug!(depth, "flush complete");
        }
        Ok(())
    }

    /// Queue a task on the microtask queue.
    pub fn queue_microtask(&self, task: impl FnOnce(&Runtime) -> Result<()> + 'static) {
        self.inner.microtasks.enqueue(Box::new(task));
    }

    /// Drain the microtask queue, including tasks queued while draining.
    ///
    /// The host calls this at the end of each tick. Stops at the first
    /// failing task.
    pub fn run_microtasks(&self) -> Result<()> {
        while let Some(task) = self.inner.microtasks.pop() {
            task(self)?;
        }
        Ok(())
    }

    // ---- Collaborators ----

    pub(crate) fn scheduler(&self) -> &Scheduler {
        &self.inner.scheduler
    }

    pub(crate) fn hooks(&self) -> &HookRegistry {
        &self.inner.hooks
    }

    pub(crate) fn roots(&self) -> &RefCell<HashMap<DomId, Instance>> {
        &self.inner.roots
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("dependees", &self.inner.graph.borrow().len())
            .field("pending", &self.inner.pending.borrow().len())
            .field("microtasks", &self.inner.microtasks.len())
            .field("flush", &self.inner.flush.get())
            .field("in_pass", &self.inner.scheduler.is_running())
            .finish_non_exhaustive()
    }
}

/// Reorder the component entries of a batch by id, leaving every other
/// entry where it is. A parent is created before its children, so its id is
/// lower and its re-render reaches a child before the child's own update.
fn order_components_parent_first(queue: &mut [(DependeeId, u64, DependeeKind)]) {
    let slots: Vec<usize> = queue
        .iter()
        .enumerate()
        .filter(|(_, entry)| entry.2 == DependeeKind::Component)
        .map(|(i, _)| i)
        .collect();
    let mut components: Vec<_> = slots.iter().map(|&i| queue[i]).collect();
    components.sort_by_key(|entry| entry.0);
    for (slot, entry) in slots.into_iter().zip(components) {
        queue[slot] = entry;
    }
}

// ---- Test support ----

#[cfg(test)]
impl Runtime {
    pub(crate) fn pending_len(&self) -> usize {
        self.inner.pending.borrow().len()
    }

    pub(crate) fn dependencies_of(&self, id: DependeeId) -> HashSet<StateKey> {
        self.inner
            .graph
            .borrow()
            .node(id)
            .map(|n| n.dependencies().clone())
            .unwrap_or_default()
    }

    /// Register a dependee that counts its runs.
    pub(crate) fn register_probe(&self) -> DependeeId {
        self.register_counter(Rc::new(Cell::new(0)))
    }

    pub(crate) fn register_counter(&self, runs: Rc<Cell<usize>>) -> DependeeId {
        struct Probe(Rc<Cell<usize>>);
        impl Dependee for Probe {
            fn run(&self, _rt: &Runtime) -> Result<()> {
                self.0.set(self.0.get() + 1);
                Ok(())
            }
        }
        let id = self.next_dependee_id();
        self.register_dependee(id, DependeeKind::Effect, Rc::new(Probe(runs)));
        id
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn runtimes_are_isolated() {
        let a = Runtime::new();
        let b = Runtime::new();
        let sa = a.create_state(json!({ "x": 1 }));
        let _sb = b.create_state(json!({ "x": 1 }));
        sa.set("x", 2);
        assert!(a.has_pending_updates());
        assert!(!b.has_pending_updates());
    }

    #[test]
    fn first_write_schedules_one_flush() {
        let rt = Runtime::new();
        let state = rt.create_state(json!({ "a": 0, "b": 0 }));
        state.set("a", 1);
        state.set("b", 1);
        assert_eq!(rt.inner.microtasks.len(), 1);
        rt.run_microtasks().unwrap();
        assert!(!rt.has_pending_updates());
        assert_eq!(rt.inner.flush.get(), FlushState::Idle);
    }

    #[test]
    fn dependee_runs_once_per_flush() {
        let rt = Runtime::new();
        let state = rt.create_state(json!({ "a": 0, "b": 0 }));
        let runs = Rc::new(Cell::new(0));
        let id = rt.register_counter(runs.clone());
        rt.tracked_execute(id, || {
            state.get("a");
            state.get("b");
        });

        state.set("a", 1);
        state.set("b", 1);
        rt.run_microtasks().unwrap();
        assert_eq!(runs.get(), 1);
    }

    #[test]
    fn unread_keys_do_not_trigger() {
        let rt = Runtime::new();
        let state = rt.create_state(json!({ "a": 0, "b": 0 }));
        let runs = Rc::new(Cell::new(0));
        let id = rt.register_counter(runs.clone());
        rt.tracked_execute(id, || state.get("a"));

        state.set("b", 1);
        rt.flush().unwrap();
        assert_eq!(runs.get(), 0);
    }

    #[test]
    fn dependencies_are_replaced_per_run() {
        let rt = Runtime::new();
        let state = rt.create_state(json!({ "a": 0, "b": 0 }));
        let id = rt.register_probe();

        rt.tracked_execute(id, || state.get("a"));
        rt.tracked_execute(id, || state.get("b"));
        let deps = rt.dependencies_of(id);
        assert_eq!(deps.len(), 1);
        assert!(rt.inner.graph.borrow().check_invariant());
    }

    #[test]
    fn untracked_reads_are_ignored() {
        let rt = Runtime::new();
        let state = rt.create_state(json!({ "a": 0 }));
        let id = rt.register_probe();
        rt.tracked_execute(id, || rt.untracked(|| state.get("a")));
        assert!(rt.dependencies_of(id).is_empty());
    }

    #[test]
    fn writes_seen_by_a_later_run_are_skipped() {
        let rt = Runtime::new();
        let state = rt.create_state(json!({ "a": 0 }));
        let runs = Rc::new(Cell::new(0));
        let id = rt.register_counter(runs.clone());
        rt.tracked_execute(id, || state.get("a"));

        state.set("a", 1);
        // The dependee re-runs before the flush and observes the write.
        rt.tracked_execute(id, || state.get("a"));
        rt.flush().unwrap();
        assert_eq!(runs.get(), 0);
    }

    #[test]
    fn released_dependees_stop_updating() {
        let rt = Runtime::new();
        let state = rt.create_state(json!({ "a": 0 }));
        let runs = Rc::new(Cell::new(0));
        let id = rt.register_counter(runs.clone());
        rt.tracked_execute(id, || state.get("a"));
        rt.release_dependee(id);
        assert_eq!(rt.dependee_count(), 0);

        state.set("a", 1);
        rt.flush().unwrap();
        assert_eq!(runs.get(), 0);
    }

    #[test]
    fn config_is_exposed() {
        let rt = Runtime::with_config(RuntimeConfig::default().with_max_flush_depth(None));
        assert_eq!(rt.config().max_flush_depth, None);
    }

    #[test]
    fn components_in_a_batch_run_parent_first() {
        let id = DependeeId::from_raw;
        let mut queue = vec![
            (id(7), 1, DependeeKind::Component),
            (id(9), 1, DependeeKind::Effect),
            (id(3), 1, DependeeKind::Component),
            (id(2), 1, DependeeKind::LazyProperty),
        ];
        order_components_parent_first(&mut queue);
        let order: Vec<u64> = queue.iter().map(|entry| entry.0.raw()).collect();
        assert_eq!(order, vec![3, 9, 7, 2]);
    }
}
