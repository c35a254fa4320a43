//! Dependency Graph
//!
//! Bidirectional index between observable keys and the dependees that read
//! them.
//!
//! # Invariant
//!
//! For every (key, dependee) pair: the key is in the dependee's dependency
//! set if and only if the dependee is in the key's dependent set.
//!
//! # Maintenance
//!
//! The graph is never rescanned. After each tracked run the dependee's
//! previous key set is diffed against the new one: edges for new keys are
//! added, edges for keys no longer read are removed. Releasing a dependee
//! removes all of its edges at once.
//!
//! Dependents of a key are kept in insertion order, which is the order a
//! flush invokes them in.

mod node;

use std::collections::{HashMap, HashSet};

use indexmap::IndexSet;
use tracing::trace;

pub use node::DependeeNode;

use crate::reactive::{DependeeId, DependeeKind, StateKey};

/// The key ↔ dependee index.
#[derive(Debug, Default)]
pub struct DependencyGraph {
    /// Dependees registered in the graph.
    nodes: HashMap<DependeeId, DependeeNode>,

    /// Reverse edges: who read each key.
    dependents: HashMap<StateKey, IndexSet<DependeeId>>,
}

impl DependencyGraph {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a dependee with no dependencies.
    pub fn insert(&mut self, id: DependeeId, kind: DependeeKind) {
        self.nodes.entry(id).or_insert_with(|| DependeeNode::new(kind));
    }

    /// Whether a dependee is registered.
    pub fn contains(&self, id: DependeeId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// Look up a dependee's record.
    pub fn node(&self, id: DependeeId) -> Option<&DependeeNode> {
        self.nodes.get(&id)
    }

    /// Replace a dependee's dependency set with `next`, editing only the
    /// edges that differ.
    pub fn update_dependencies(&mut self, id: DependeeId, next: HashSet<StateKey>) {
        let Some(node) = self.nodes.get_mut(&id) else {
            debug_assert!(false, "updating dependencies of unregistered {id:?}");
            return;
        };
        let previous = std::mem::replace(node.dependencies_mut(), next);
        let current = node.dependencies();

        for stale in previous.difference(current) {
            if let Some(set) = self.dependents.get_mut(stale) {
                set.shift_remove(&id);
                if set.is_empty() {
                    self.dependents.remove(stale);
                }
            }
        }
        let mut added = 0usize;
        for fresh in current.difference(&previous) {
            self.dependents.entry(*fresh).or_default().insert(id);
            added += 1;
        }
        trace!(?id, deps = current.len(), added, "dependencies updated");
    }

    /// Record the epoch at which a dependee's run started.
    pub fn set_last_run(&mut self, id: DependeeId, epoch: u64) {
        if let Some(node) = self.nodes.get_mut(&id) {
            node.set_last_run(epoch);
        }
    }

    /// Remove a dependee and every edge that involves it.
    pub fn remove(&mut self, id: DependeeId) -> bool {
        let Some(node) = self.nodes.remove(&id) else {
            return false;
        };
        for key in node.dependencies() {
            if let Some(set) = self.dependents.get_mut(key) {
                set.shift_remove(&id);
                if set.is_empty() {
                    self.dependents.remove(key);
                }
            }
        }
        trace!(?id, "dependee removed");
        true
    }

    /// Dependees that read `key`, in registration order.
    pub fn dependents(&self, key: &StateKey) -> impl Iterator<Item = DependeeId> + '_ {
        self.dependents.get(key).into_iter().flat_map(|s| s.iter().copied())
    }

    /// Number of dependees registered.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether no dependee is registered.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Verify the bidirectional invariant. Linear in the number of edges.
    pub fn check_invariant(&self) -> bool {
        let forward = self.nodes.iter().all(|(id, node)| {
            node.dependencies()
                .iter()
                .all(|key| self.dependents.get(key).is_some_and(|s| s.contains(id)))
        });
        let backward = self.dependents.iter().all(|(key, ids)| {
            !ids.is_empty()
                && ids.iter().all(|id| {
                    self.nodes
                        .get(id)
                        .is_some_and(|n| n.dependencies().contains(key))
                })
        });
        forward && backward
    }
}
