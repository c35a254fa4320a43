//! Microtask queue.
//!
//! The one suspension point of the engine. Writes schedule their flush here
//! and the host drains the queue at the end of each tick with
//! [`Runtime::run_microtasks`].

use std::cell::RefCell;
use std::collections::VecDeque;

use crate::error::Result;
use crate::reactive::Runtime;

/// A deferred unit of work.
pub(crate) type Microtask = Box<dyn FnOnce(&Runtime) -> Result<()>>;

/// FIFO of pending microtasks.
#[derive(Default)]
pub(crate) struct MicrotaskQueue {
    tasks: RefCell<VecDeque<Microtask>>,
}

impl MicrotaskQueue {
    pub fn enqueue(&self, task: Microtask) {
        self.tasks.borrow_mut().push_back(task);
    }

    /// Take the oldest task. The queue is not borrowed while it runs, so
    /// tasks may enqueue more tasks.
    pub fn pop(&self) -> Option<Microtask> {
        self.tasks.borrow_mut().pop_front()
    }

    pub fn len(&self) -> usize {
        self.tasks.borrow().len()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use super::*;

    #[test]
    fn tasks_run_in_order_including_nested_ones() {
        let rt = Runtime::new();
        let log = Rc::new(RefCell::new(Vec::new()));

        let first = log.clone();
        rt.queue_microtask(move |rt| {
            first.borrow_mut().push(1);
            let nested = first.clone();
            rt.queue_microtask(move |_| {
                nested.borrow_mut().push(3);
                Ok(())
            });
            Ok(())
        });
        let second = log.clone();
        rt.queue_microtask(move |_| {
            second.borrow_mut().push(2);
            Ok(())
        });

        rt.run_microtasks().unwrap();
        assert_eq!(*log.borrow(), vec![1, 2, 3]);
    }

    #[test]
    fn draining_stops_at_the_first_error() {
        let rt = Runtime::new();
        let ran = Rc::new(Cell::new(false));
        rt.queue_microtask(|_| Err(crate::Error::EffectLoop { depth: 1 }));
        let flag = ran.clone();
        rt.queue_microtask(move |_| {
            flag.set(true);
            Ok(())
        });

        assert!(rt.run_microtasks().is_err());
        assert!(!ran.get());
        rt.run_microtasks().unwrap();
        assert!(ran.get());
    }
}
