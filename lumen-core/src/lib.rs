//! Lumen Core
//!
//! This crate provides the runtime for the Lumen fine-grained reactive DOM
//! renderer. It implements:
//!
//! - A reactive store with transparent, per-property dependency tracking
//! - A dependency graph and a microtask-driven flush
//! - A reconciler with keyed children, lazy properties and components
//! - Hooks (`use_state`, `use_ref`, `use_effect`) and class components
//! - An in-memory document the reconciler renders into
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `reactive`: Store, runtime, tracking and effects
//! - `graph`: Key ↔ dependee index
//! - `scheduler`: Update, mount, post-mount and destroy queues
//! - `node`: Descriptors and the builders that produce them
//! - `reconcile`: Mounted instances and the diffing algorithm
//! - `dom`: The document model
//!
//! Everything hangs off a [`Runtime`]. Runtimes are independent of each
//! other and single-threaded.
//!
//! # Example
//!
//! ```rust
//! use lumen_core::{component, element, Node, Obj, Result, Runtime};
//! use serde_json::json;
//!
//! fn counter(rt: &Runtime, _props: &Obj) -> Result<Option<Node>> {
//!     let state = rt.use_state(json!({ "count": 0 }))?;
//!     let s = state.clone();
//!     Ok(Some(
//!         element("button")
//!             .on("click", move |_| {
//!                 let n = s.get("count").as_f64().unwrap_or(0.0);
//!                 s.set("count", n + 1.0);
//!             })
//!             .child(state.get("count"))
//!             .build(),
//!     ))
//! }
//!
//! let rt = Runtime::new();
//! let container = rt.document().create_element("div");
//! rt.render(component(counter), container).unwrap();
//!
//! let button = rt.document().children(container)[0];
//! rt.document().dispatch_event(button, "click");
//! // Writes are flushed at the end of the tick.
//! rt.run_microtasks().unwrap();
//! assert_eq!(rt.document().text_content(container), "1");
//! ```

pub mod config;
pub mod dom;
pub mod error;
pub mod graph;
pub mod node;
pub mod reactive;

mod hooks;
mod reconcile;
mod render;
mod scheduler;

pub use config::RuntimeConfig;
pub use dom::{listener, Document, DomId, DomStats, Event, Listener};
pub use error::{Error, Result};
pub use node::{
    class, component, element, fragment, h, jsx, text, Child, ChildList, ClassType, Component,
    ComponentFn, Key, Node, NodeBuilder, NodeType, Prop, Props, Style, StyleValue,
};
pub use reactive::{
    immutable, Cleanup, DependeeId, DependeeKind, EffectHandle, Immutable, Obj, ObjectId,
    PropertyKey, Runtime, StateKey, Value,
};
pub use render::Root;
