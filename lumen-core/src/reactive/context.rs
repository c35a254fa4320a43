//! Tracking Context
//!
//! The tracking context records which observable keys a computation reads.
//! It is a stack of frames owned by the runtime: entering a tracked
//! execution pushes a frame, every read appends to the innermost frame, and
//! leaving pops it and hands the collected keys back.
//!
//! Nested executions (a component mounting a child whose render reads state)
//! each get their own frame, so a read is attributed only to the innermost
//! computation.

use std::cell::RefCell;

use smallvec::SmallVec;

use super::dependee::DependeeId;
use super::key::StateKey;

/// Reads collected by one frame. Most computations read a handful of keys.
pub(crate) type Reads = SmallVec<[StateKey; 8]>;

#[derive(Debug)]
struct Frame {
    /// `None` for untracked sections, whose reads are discarded.
    dependee: Option<DependeeId>,
    reads: Reads,
}

/// Stack of active tracking frames.
#[derive(Debug, Default)]
pub(crate) struct TrackingStack {
    frames: RefCell<Vec<Frame>>,
}

impl TrackingStack {
    /// Enter a frame. The frame is popped when the guard is dropped or
    /// finished.
    pub fn enter(&self, dependee: Option<DependeeId>) -> TrackingGuard<'_> {
        self.frames.borrow_mut().push(Frame {
            dependee,
            reads: SmallVec::new(),
        });
        TrackingGuard {
            stack: self,
            dependee,
            done: false,
        }
    }

    /// Record a read into the innermost frame.
    pub fn record(&self, key: StateKey) {
        if let Some(frame) = self.frames.borrow_mut().last_mut() {
            if frame.dependee.is_some() {
                frame.reads.push(key);
            }
        }
    }

    /// Whether reads are currently being recorded.
    pub fn is_tracking(&self) -> bool {
        self.frames
            .borrow()
            .last()
            .is_some_and(|f| f.dependee.is_some())
    }

    /// The dependee of the innermost frame.
    #[cfg(test)]
    pub fn current(&self) -> Option<DependeeId> {
        self.frames.borrow().last().and_then(|f| f.dependee)
    }

    fn pop(&self, expected: Option<DependeeId>) -> Reads {
        let popped = self.frames.borrow_mut().pop();
        match popped {
            Some(frame) => {
                debug_assert_eq!(
                    frame.dependee, expected,
                    "tracking frame mismatch: expected {:?}, got {:?}",
                    expected, frame.dependee
                );
                frame.reads
            }
            None => {
                debug_assert!(false, "tracking stack underflow");
                Reads::new()
            }
        }
    }
}

/// Guard that pops its frame when dropped, even if the computation panics.
pub(crate) struct TrackingGuard<'a> {
    stack: &'a TrackingStack,
    dependee: Option<DependeeId>,
    done: bool,
}

impl TrackingGuard<'_> {
    /// Pop the frame and return the keys it collected.
    pub fn finish(mut self) -> Reads {
        self.done = true;
        self.stack.pop(self.dependee)
    }
}

impl Drop for TrackingGuard<'_> {
    fn drop(&mut self) {
        if !self.done {
            self.stack.pop(self.dependee);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::key::{ObjectId, PropertyKey};

    fn key(n: u32) -> StateKey {
        StateKey::new(ObjectId(n), PropertyKey::WHOLE)
    }

    #[test]
    fn frame_collects_reads() {
        let stack = TrackingStack::default();
        let id = DependeeId::from_raw(1);

        assert!(!stack.is_tracking());
        let guard = stack.enter(Some(id));
        assert!(stack.is_tracking());
        assert_eq!(stack.current(), Some(id));

        stack.record(key(1));
        stack.record(key(2));
        assert_eq!(guard.finish().as_slice(), &[key(1), key(2)]);
        assert!(!stack.is_tracking());
    }

    #[test]
    fn nested_frames_are_isolated() {
        let stack = TrackingStack::default();
        let outer = stack.enter(Some(DependeeId::from_raw(1)));
        stack.record(key(1));
        {
            let inner = stack.enter(Some(DependeeId::from_raw(2)));
            stack.record(key(2));
            assert_eq!(inner.finish().as_slice(), &[key(2)]);
        }
        stack.record(key(3));
        assert_eq!(outer.finish().as_slice(), &[key(1), key(3)]);
    }

    #[test]
    fn untracked_frame_discards_reads() {
        let stack = TrackingStack::default();
        let outer = stack.enter(Some(DependeeId::from_raw(1)));
        {
            let _quiet = stack.enter(None);
            assert!(!stack.is_tracking());
            stack.record(key(9));
        }
        assert!(outer.finish().is_empty());
    }

    #[test]
    fn dropped_guard_pops() {
        let stack = TrackingStack::default();
        {
            let _guard = stack.enter(Some(DependeeId::from_raw(1)));
        }
        assert_eq!(stack.current(), None);
    }
}
