//! Dependee types for the reactive system.
//!
//! A dependee is any computation that can be re-run when the state it read
//! changes: effects, lazy property/style updates and component instances.

use std::fmt;

use crate::error::Result;

use super::runtime::Runtime;

/// Unique identifier for a dependee.
///
/// Ids are handed out by the owning runtime and never reused within it.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DependeeId(u64);

impl DependeeId {
    /// Build an id from its raw value.
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw value.
    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for DependeeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DependeeId({})", self.0)
    }
}

/// What kind of computation a dependee is. Used for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DependeeKind {
    /// `use_effect` body, standalone or owned by a component.
    Effect,
    /// Function-valued element property.
    LazyProperty,
    /// Function-valued style property.
    LazyStyle,
    /// Function or class component instance.
    Component,
}

/// A computation the flush can re-run.
pub(crate) trait Dependee {
    /// Re-run after one of the dependee's keys changed.
    fn run(&self, rt: &Runtime) -> Result<()>;
}
