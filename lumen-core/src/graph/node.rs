//! Graph Nodes
//!
//! One record per registered dependee: the keys it currently depends on and
//! the write epoch at which its last run started.

use std::collections::HashSet;

use crate::reactive::{DependeeKind, StateKey};

/// A dependee's entry in the dependency graph.
#[derive(Debug)]
pub struct DependeeNode {
    kind: DependeeKind,

    /// Keys read during the most recent run.
    dependencies: HashSet<StateKey>,

    /// Write epoch observed when the most recent run started. Writes stamped
    /// at or before this epoch were already visible to that run.
    last_run: u64,
}

impl DependeeNode {
    /// Create an empty node of the given kind.
    pub fn new(kind: DependeeKind) -> Self {
        Self {
            kind,
            dependencies: HashSet::new(),
            last_run: 0,
        }
    }

    /// What kind of computation this is.
    pub fn kind(&self) -> DependeeKind {
        self.kind
    }

    /// Keys read during the last run.
    pub fn dependencies(&self) -> &HashSet<StateKey> {
        &self.dependencies
    }

    pub(crate) fn dependencies_mut(&mut self) -> &mut HashSet<StateKey> {
        &mut self.dependencies
    }

    /// Epoch at which the last run started.
    pub fn last_run(&self) -> u64 {
        self.last_run
    }

    pub(crate) fn set_last_run(&mut self, epoch: u64) {
        self.last_run = epoch;
    }
}
