//! Effect Implementation
//!
//! An Effect is a side-effecting computation that re-runs whenever state it
//! read on its last run changes.
//!
//! # How Effects Work
//!
//! 1. The first run happens either immediately (standalone effects) or in
//!    the mount queue after the owning component is mounted.
//!
//! 2. Each run executes under tracked execution, so the effect depends on
//!    exactly what its latest run read. A branch not taken is not a
//!    dependency.
//!
//! 3. When a dependency changes, the flush queues the effect on the update
//!    queue. It re-runs on its own schedule, independent of the component
//!    that created it.
//!
//! # Cleanup
//!
//! The body may return a [`Cleanup`]. It runs right before the next run and
//! when the effect is disposed, which happens when the owning component
//! unmounts.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use tracing::trace;

use super::dependee::{Dependee, DependeeId, DependeeKind};
use super::runtime::{Runtime, RuntimeInner};
use crate::error::Result;

/// Teardown returned by an effect body.
pub type Cleanup = Box<dyn FnOnce()>;

type Body = Box<dyn Fn() -> Option<Cleanup>>;

/// A side-effecting computation registered as a dependee.
pub(crate) struct Effect {
    id: DependeeId,
    body: Body,
    cleanup: RefCell<Option<Cleanup>>,
    runs: Cell<usize>,
    disposed: Cell<bool>,
}

impl Effect {
    /// Create and register an effect without running it.
    pub fn register<F>(rt: &Runtime, body: F) -> Rc<Self>
    where
        F: Fn() -> Option<Cleanup> + 'static,
    {
        let id = rt.next_dependee_id();
        let effect = Rc::new(Self {
            id,
            body: Box::new(body),
            cleanup: RefCell::new(None),
            runs: Cell::new(0),
            disposed: Cell::new(false),
        });
        rt.register_dependee(id, DependeeKind::Effect, effect.clone());
        effect
    }

    /// Run the previous cleanup, then the body under tracking.
    pub fn execute(&self, rt: &Runtime) {
        if self.disposed.get() {
            return;
        }
        self.run_cleanup();
        let cleanup = rt.tracked_execute(self.id, || (self.body)());
        *self.cleanup.borrow_mut() = cleanup;
        self.runs.set(self.runs.get() + 1);
        trace!(id = ?self.id, runs = self.runs.get(), "effect ran");
    }

    /// Stop the effect and run its pending cleanup. Idempotent.
    pub fn dispose(&self, rt: &Runtime) {
        self.stop(rt);
        self.run_cleanup();
    }

    /// Leave the graph without running the cleanup. Returns `false` if the
    /// effect was already stopped.
    pub fn stop(&self, rt: &Runtime) -> bool {
        if self.disposed.replace(true) {
            return false;
        }
        rt.release_dependee(self.id);
        true
    }

    pub fn run_cleanup(&self) {
        let cleanup = self.cleanup.borrow_mut().take();
        if let Some(cleanup) = cleanup {
            cleanup();
        }
    }

    pub fn run_count(&self) -> usize {
        self.runs.get()
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.get()
    }
}

impl Dependee for Effect {
    fn run(&self, rt: &Runtime) -> Result<()> {
        self.execute(rt);
        Ok(())
    }
}

/// Handle to an effect created by [`Runtime::use_effect`].
#[derive(Clone)]
pub struct EffectHandle {
    effect: Rc<Effect>,
    rt: Weak<RuntimeInner>,
}

impl EffectHandle {
    pub(crate) fn new(rt: &Runtime, effect: Rc<Effect>) -> Self {
        Self {
            effect,
            rt: rt.downgrade(),
        }
    }

    /// Stop the effect and run its cleanup.
    pub fn dispose(&self) {
        if let Some(rt) = Runtime::from_weak(&self.rt) {
            self.effect.dispose(&rt);
        }
    }

    /// Number of times the body has run.
    pub fn run_count(&self) -> usize {
        self.effect.run_count()
    }

    /// Whether the effect was disposed.
    pub fn is_disposed(&self) -> bool {
        self.effect.is_disposed()
    }
}

impl fmt::Debug for EffectHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EffectHandle")
            .field("id", &self.effect.id)
            .field("run_count", &self.run_count())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::error::Error;
    use crate::RuntimeConfig;

    #[test]
    fn effect_tracks_only_its_latest_branch() {
        let rt = Runtime::new();
        let state = rt.create_state(json!({ "flag": false, "a": 0, "b": 0 }));

        let s = state.clone();
        let effect = Effect::register(&rt, move || {
            if s.get("flag").is_truthy() {
                s.get("a");
            } else {
                s.get("b");
            }
            None
        });
        effect.execute(&rt);
        assert_eq!(effect.run_count(), 1);

        state.set("a", 1);
        rt.flush().unwrap();
        assert_eq!(effect.run_count(), 1);

        state.set("flag", true);
        rt.flush().unwrap();
        assert_eq!(effect.run_count(), 2);

        state.set("a", 2);
        rt.flush().unwrap();
        assert_eq!(effect.run_count(), 3);
    }

    #[test]
    fn cleanup_runs_before_rerun_and_on_dispose() {
        let rt = Runtime::new();
        let state = rt.create_state(json!({ "n": 0 }));
        let cleanups = Rc::new(Cell::new(0));

        let s = state.clone();
        let counter = cleanups.clone();
        let effect = Effect::register(&rt, move || {
            s.get("n");
            let counter = counter.clone();
            Some(Box::new(move || counter.set(counter.get() + 1)) as Cleanup)
        });
        effect.execute(&rt);
        assert_eq!(cleanups.get(), 0);

        state.set("n", 1);
        rt.flush().unwrap();
        assert_eq!(cleanups.get(), 1);

        effect.dispose(&rt);
        effect.dispose(&rt);
        assert_eq!(cleanups.get(), 2);
        assert_eq!(rt.dependee_count(), 0);

        state.set("n", 2);
        rt.flush().unwrap();
        assert_eq!(effect.run_count(), 2);
    }

    #[test]
    fn self_feeding_effect_is_reported_as_a_loop() {
        let rt = Runtime::with_config(RuntimeConfig::default().with_max_flush_depth(Some(8)));
        let state = rt.create_state(json!({ "n": 0 }));

        let s = state.clone();
        let effect = Effect::register(&rt, move || {
            let n = s.get("n").as_f64().unwrap_or(0.0);
            s.set("n", n + 1.0);
            None
        });
        effect.execute(&rt);

        let err = rt.run_microtasks().unwrap_err();
        assert!(matches!(err, Error::EffectLoop { depth: 8 }));
        assert!(!rt.has_pending_updates());
    }

    #[test]
    fn converging_effect_settles() {
        let rt = Runtime::new();
        let state = rt.create_state(json!({ "n": 0 }));

        let s = state.clone();
        let effect = Effect::register(&rt, move || {
            let n = s.get("n").as_f64().unwrap_or(0.0);
            if n < 5.0 {
                s.set("n", n + 1.0);
            }
            None
        });
        effect.execute(&rt);
        rt.run_microtasks().unwrap();
        assert_eq!(rt.untracked(|| state.get("n")).as_f64(), Some(5.0));
        assert_eq!(effect.run_count(), 6);
    }
}
