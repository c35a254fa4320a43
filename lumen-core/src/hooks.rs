//! Hooks
//!
//! Per-instance state for function components, addressed by call order.
//!
//! # How It Works
//!
//! While a function component renders, its instance id sits on the hook
//! frame stack with a cursor starting at zero. Every hook call takes the
//! slot at the cursor and advances it. The first render fills the slots;
//! later renders find them and hand back what they hold, so the n-th hook
//! call of a component always returns the n-th slot. Hooks must therefore
//! be called in the same order on every render.
//!
//! Slots are dropped when the instance unmounts. Effects stored in them are
//! stopped right away and cleaned up in the destroy queue.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use tracing::{trace, warn};

use crate::error::{Error, Result};
use crate::reactive::{Cleanup, DependeeId, Effect, EffectHandle, Obj, Runtime, Value};

#[derive(Clone)]
enum HookSlot {
    State(Obj),
    Ref(Obj),
    Effect(Rc<Effect>),
}

struct Frame {
    owner: DependeeId,
    cursor: usize,
}

/// Hook slots of every mounted function component.
#[derive(Default)]
pub(crate) struct HookRegistry {
    frames: RefCell<Vec<Frame>>,
    slots: RefCell<HashMap<DependeeId, Vec<HookSlot>>>,
}

/// Pops the hook frame when the render returns.
pub(crate) struct HookFrame<'a> {
    registry: &'a HookRegistry,
}

impl Drop for HookFrame<'_> {
    fn drop(&mut self) {
        self.registry.frames.borrow_mut().pop();
    }
}

impl HookRegistry {
    /// Make `owner` the component whose hooks are being called.
    pub fn enter(&self, owner: DependeeId) -> HookFrame<'_> {
        self.frames.borrow_mut().push(Frame { owner, cursor: 0 });
        HookFrame { registry: self }
    }

    /// Claim the next slot of the rendering component.
    fn next_slot(&self) -> Option<(DependeeId, usize)> {
        let mut frames = self.frames.borrow_mut();
        let frame = frames.last_mut()?;
        let index = frame.cursor;
        frame.cursor += 1;
        Some((frame.owner, index))
    }

    fn slot(&self, owner: DependeeId, index: usize) -> Option<HookSlot> {
        self.slots
            .borrow()
            .get(&owner)
            .and_then(|slots| slots.get(index))
            .cloned()
    }

    fn store(&self, owner: DependeeId, index: usize, slot: HookSlot) {
        let mut all = self.slots.borrow_mut();
        let slots = all.entry(owner).or_default();
        if index < slots.len() {
            warn!(?owner, index, "hook order changed between renders");
            slots[index] = slot;
        } else {
            slots.push(slot);
        }
    }

    /// Drop the slots of `owner`. Its effects are stopped and returned so
    /// their cleanups can run later.
    pub fn release(&self, rt: &Runtime, owner: DependeeId) -> Vec<Rc<Effect>> {
        let slots = self.slots.borrow_mut().remove(&owner).unwrap_or_default();
        let mut stopped = Vec::new();
        for slot in slots {
            if let HookSlot::Effect(effect) = slot {
                if effect.stop(rt) {
                    stopped.push(effect);
                }
            }
        }
        if !stopped.is_empty() {
            trace!(?owner, effects = stopped.len(), "hook effects stopped");
        }
        stopped
    }

    #[cfg(test)]
    fn slot_count(&self, owner: DependeeId) -> usize {
        self.slots.borrow().get(&owner).map_or(0, Vec::len)
    }
}

impl Runtime {
    /// Per-instance shallow state. The first render creates it from
    /// `initial` (a non-object is stored as `{ "value": x }`); later
    /// renders return the same object.
    pub fn use_state(&self, initial: serde_json::Value) -> Result<Obj> {
        let (owner, index) = self
            .hooks()
            .next_slot()
            .ok_or(Error::HookOutsideRender { hook: "use_state" })?;
        if let Some(HookSlot::State(state)) = self.hooks().slot(owner, index) {
            return Ok(state);
        }
        let state = self.create_shallow(initial);
        self.hooks().store(owner, index, HookSlot::State(state.clone()));
        Ok(state)
    }

    /// Per-instance `{ current }` object, for DOM refs and mutable values
    /// that should survive renders.
    pub fn use_ref(&self, initial: impl Into<Value>) -> Result<Obj> {
        let (owner, index) = self
            .hooks()
            .next_slot()
            .ok_or(Error::HookOutsideRender { hook: "use_ref" })?;
        if let Some(HookSlot::Ref(target)) = self.hooks().slot(owner, index) {
            return Ok(target);
        }
        let target = self.create_record(vec![(Rc::from("current"), initial.into())]);
        self.hooks().store(owner, index, HookSlot::Ref(target.clone()));
        Ok(target)
    }

    /// Run `f` as an effect.
    ///
    /// Inside a component the effect is created on the first render and
    /// first runs after the instance is mounted; later renders return the
    /// existing effect and ignore `f`. It re-runs on its own whenever state
    /// it read changes, and is cleaned up when the instance unmounts.
    ///
    /// Outside a component the effect runs immediately and lives until it is
    /// disposed.
    pub fn use_effect<F>(&self, f: F) -> EffectHandle
    where
        F: Fn() -> Option<Cleanup> + 'static,
    {
        let Some((owner, index)) = self.hooks().next_slot() else {
            let effect = Effect::register(self, f);
            effect.execute(self);
            return EffectHandle::new(self, effect);
        };
        if let Some(HookSlot::Effect(effect)) = self.hooks().slot(owner, index) {
            return EffectHandle::new(self, effect);
        }
        let effect = Effect::register(self, f);
        self.hooks().store(owner, index, HookSlot::Effect(effect.clone()));
        let first = effect.clone();
        self.scheduler().queue_mount(Box::new(move |rt| {
            first.execute(rt);
            Ok(())
        }));
        EffectHandle::new(self, effect)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use serde_json::json;

    use super::*;

    #[test]
    fn hooks_need_a_rendering_component() {
        let rt = Runtime::new();
        let err = rt.use_state(json!({})).unwrap_err();
        assert!(matches!(err, Error::HookOutsideRender { hook: "use_state" }));
        assert!(rt.use_ref(Value::Null).is_err());
    }

    #[test]
    fn slots_are_returned_by_call_order() {
        let rt = Runtime::new();
        let owner = rt.register_probe();

        let (first, second) = {
            let _frame = rt.hooks().enter(owner);
            (rt.use_state(json!({ "n": 0 })).unwrap(), rt.use_ref(1).unwrap())
        };
        let (again, ref_again) = {
            let _frame = rt.hooks().enter(owner);
            (rt.use_state(json!({ "n": 99 })).unwrap(), rt.use_ref(2).unwrap())
        };
        assert_eq!(first, again);
        assert_eq!(second, ref_again);
        assert_eq!(rt.untracked(|| again.get("n")).as_f64(), Some(0.0));
        assert_eq!(rt.untracked(|| ref_again.get("current")).as_f64(), Some(1.0));
    }

    #[test]
    fn scalar_state_is_boxed() {
        let rt = Runtime::new();
        let owner = rt.register_probe();
        let _frame = rt.hooks().enter(owner);
        let state = rt.use_state(json!(5)).unwrap();
        assert_eq!(rt.untracked(|| state.get("value")).as_f64(), Some(5.0));
    }

    #[test]
    fn component_effects_wait_for_the_mount_queue() {
        let rt = Runtime::new();
        let owner = rt.register_probe();
        let runs = Rc::new(Cell::new(0));

        let r = runs.clone();
        let handle = {
            let _frame = rt.hooks().enter(owner);
            rt.use_effect(move || {
                r.set(r.get() + 1);
                None
            })
        };
        assert_eq!(runs.get(), 0);
        rt.scheduler().run_pass(&rt).unwrap();
        assert_eq!(runs.get(), 1);
        assert_eq!(handle.run_count(), 1);

        let stopped = rt.hooks().release(&rt, owner);
        assert_eq!(stopped.len(), 1);
        assert!(handle.is_disposed());
        assert_eq!(rt.hooks().slot_count(owner), 0);
    }

    #[test]
    fn standalone_effects_run_immediately() {
        let rt = Runtime::new();
        let state = rt.create_state(json!({ "n": 0 }));
        let seen = Rc::new(Cell::new(-1.0));

        let (s, out) = (state.clone(), seen.clone());
        let handle = rt.use_effect(move || {
            out.set(s.get("n").as_f64().unwrap_or(f64::NAN));
            None
        });
        assert_eq!(seen.get(), 0.0);

        state.set("n", 4);
        rt.run_microtasks().unwrap();
        assert_eq!(seen.get(), 4.0);

        handle.dispose();
        state.set("n", 5);
        rt.run_microtasks().unwrap();
        assert_eq!(seen.get(), 4.0);
    }
}
