//! Reactive Primitives
//!
//! This module implements the reactive store and the machinery that decides
//! which computations re-run after a write.
//!
//! # Concepts
//!
//! ## State
//!
//! [`Runtime::create_state`] wraps plain JSON into records addressed by
//! [`ObjectId`]. Application code reads and writes them through [`Obj`]
//! handles. Each (object, property) pair is one observable [`StateKey`].
//!
//! ## Dependees
//!
//! A dependee is a computation the runtime can re-run: an effect, a lazy
//! element property or style, or a component instance. Running one under
//! tracked execution records every key it reads; the dependency graph maps
//! keys back to the dependees that read them.
//!
//! ## Flushing
//!
//! Writes are not propagated immediately. They accumulate in a pending
//! queue and are resolved to dependees by a flush, scheduled as a microtask
//! on the first write of a tick.
//!
//! # Implementation Notes
//!
//! Tracking is transparent: no computation declares what it depends on. The
//! tracking stack lives in the runtime rather than in thread-local storage,
//! so independent runtimes on the same thread never see each other's reads.

mod context;
mod dependee;
mod effect;
mod key;
mod runtime;
mod store;
mod value;

pub(crate) use dependee::Dependee;
pub use dependee::{DependeeId, DependeeKind};
pub(crate) use effect::Effect;
pub use effect::{Cleanup, EffectHandle};
pub use key::{ObjectId, PropertyKey, StateKey};
pub use runtime::Runtime;
pub(crate) use runtime::RuntimeInner;
pub use store::Obj;
pub use value::{immutable, Immutable, Value};
