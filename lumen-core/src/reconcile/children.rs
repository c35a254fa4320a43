//! Child Reconciliation
//!
//! # How It Works
//!
//! 1. The new children are flattened: nested lists are spliced into the
//!    parent, dynamic children are evaluated, and values that render nothing
//!    are dropped. Every remaining child gets a key: its explicit key, or
//!    its position path (`[2, 0]` is the first item of the list in slot 2).
//!    Two children with the same explicit key are an error.
//!
//! 2. The longest common subsequence of old and new keys is computed after
//!    trimming the common prefix and suffix. Children in the subsequence
//!    keep their DOM position.
//!
//! 3. Each new key is matched against the old children. A match with the
//!    same identity is updated in place, otherwise the old instance is
//!    unmounted and a fresh one created. Old keys missing from the new list
//!    are unmounted.
//!
//! 4. Children are placed walking from the end: each child outside the
//!    subsequence is inserted before the first DOM node of its successor.
//!    Components and fragments in the subsequence are checked too, since an
//!    update can swap the nodes they render.

use std::cell::RefCell;

use indexmap::map::Entry;
use indexmap::IndexMap;
use smallvec::SmallVec;
use tracing::trace;

use super::{dom_anchor, Instance};
use crate::dom::{Document, DomId};
use crate::error::{Error, Result};
use crate::node::{Child, Key, Node};
use crate::reactive::{Runtime, Value};

/// Identity of a child among its siblings.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub(crate) enum ChildKey {
    Explicit(Key),
    Position(SmallVec<[u32; 4]>),
}

/// Mounted children of an element or fragment, in order.
#[derive(Default)]
pub(crate) struct ChildSlots {
    slots: RefCell<IndexMap<ChildKey, Instance>>,
}

impl ChildSlots {
    pub fn instances(&self) -> Vec<Instance> {
        self.slots.borrow().values().cloned().collect()
    }

    #[cfg(test)]
    pub fn keys(&self) -> Vec<ChildKey> {
        self.slots.borrow().keys().cloned().collect()
    }
}

/// Flatten children into keyed descriptors.
pub(crate) fn flatten(children: &[Child]) -> Result<IndexMap<ChildKey, Node>> {
    let mut out = IndexMap::with_capacity(children.len());
    let mut path = SmallVec::new();
    flatten_into(children, &mut path, &mut out)?;
    Ok(out)
}

fn flatten_into(
    children: &[Child],
    path: &mut SmallVec<[u32; 4]>,
    out: &mut IndexMap<ChildKey, Node>,
) -> Result<()> {
    for (i, child) in children.iter().enumerate() {
        path.push(i as u32);
        flatten_child(child, path, out)?;
        path.pop();
    }
    Ok(())
}

fn flatten_child(
    child: &Child,
    path: &mut SmallVec<[u32; 4]>,
    out: &mut IndexMap<ChildKey, Node>,
) -> Result<()> {
    let node = match child {
        Child::List(items) => return flatten_into(items, path, out),
        Child::Dynamic(f) => return flatten_child(&f(), path, out),
        Child::Node(node) => node.clone(),
        Child::Value(value) => match value_node(value) {
            Some(node) => node,
            None => return Ok(()),
        },
    };
    let key = match node.key() {
        Some(key) => ChildKey::Explicit(key.clone()),
        None => ChildKey::Position(path.clone()),
    };
    match out.entry(key) {
        Entry::Occupied(entry) => Err(Error::DuplicateKey {
            key: match entry.key() {
                ChildKey::Explicit(key) => key.to_string(),
                ChildKey::Position(path) => format!("{path:?}"),
            },
        }),
        Entry::Vacant(entry) => {
            entry.insert(node);
            Ok(())
        }
    }
}

fn value_node(value: &Value) -> Option<Node> {
    if let Some(node) = value.downcast_ref::<Node>() {
        return Some(node.clone());
    }
    value.to_text().map(Node::text)
}

/// Mark which entries of `new` belong to a longest common subsequence of
/// `old` and `new`.
pub(crate) fn stable_mask<T: PartialEq>(old: &[T], new: &[T]) -> Vec<bool> {
    let mut mask = vec![false; new.len()];

    let prefix = old.iter().zip(new).take_while(|(a, b)| a == b).count();
    let suffix = old[prefix..]
        .iter()
        .rev()
        .zip(new[prefix..].iter().rev())
        .take_while(|(a, b)| a == b)
        .count();
    mask[..prefix].fill(true);
    mask[new.len() - suffix..].fill(true);

    let old_mid = &old[prefix..old.len() - suffix];
    let new_mid = &new[prefix..new.len() - suffix];
    let (n, m) = (old_mid.len(), new_mid.len());
    if n == 0 || m == 0 {
        return mask;
    }

    // table[i][j]: LCS length of old_mid[i..] and new_mid[j..].
    let width = m + 1;
    let mut table = vec![0u32; (n + 1) * width];
    for i in (0..n).rev() {
        for j in (0..m).rev() {
            table[i * width + j] = if old_mid[i] == new_mid[j] {
                table[(i + 1) * width + j + 1] + 1
            } else {
                table[(i + 1) * width + j].max(table[i * width + j + 1])
            };
        }
    }
    let (mut i, mut j) = (0, 0);
    while i < n && j < m {
        if old_mid[i] == new_mid[j] {
            mask[prefix + j] = true;
            i += 1;
            j += 1;
        } else if table[(i + 1) * width + j] >= table[i * width + j + 1] {
            i += 1;
        } else {
            j += 1;
        }
    }
    mask
}

/// Reconcile `slots` against new children.
///
/// `parent` is the DOM element the children live in; `None` while the
/// owner is not attached yet, in which case nothing is inserted. `tail` is
/// the instance following the last child.
pub(crate) fn reconcile_children(
    rt: &Runtime,
    slots: &ChildSlots,
    children: &[Child],
    parent: Option<DomId>,
    tail: Option<Instance>,
) -> Result<()> {
    let next = flatten(children)?;
    let mut old = std::mem::take(&mut *slots.slots.borrow_mut());

    let old_keys: Vec<&ChildKey> = old.keys().collect();
    let new_keys: Vec<&ChildKey> = next.keys().collect();
    let stable = stable_mask(&old_keys, &new_keys);
    let old_order: IndexMap<ChildKey, usize> = old
        .keys()
        .enumerate()
        .map(|(i, key)| (key.clone(), i))
        .collect();
    drop(old_keys);
    drop(new_keys);

    let mut result: IndexMap<ChildKey, Instance> = IndexMap::with_capacity(next.len());
    let mut placed = Vec::with_capacity(next.len());
    let mut created = 0usize;
    for ((key, node), in_lcs) in next.into_iter().zip(stable) {
        let instance = match old.swap_remove(&key) {
            Some(existing) => {
                if existing.reuse(rt, &node)? {
                    placed.push(in_lcs);
                    existing
                } else {
                    existing.unmount(rt);
                    created += 1;
                    placed.push(false);
                    Instance::create(rt, &node)?
                }
            }
            None => {
                created += 1;
                placed.push(false);
                Instance::create(rt, &node)?
            }
        };
        result.insert(key, instance);
    }

    let mut removed: Vec<(usize, Instance)> = old
        .into_iter()
        .map(|(key, instance)| (old_order.get(&key).copied().unwrap_or(0), instance))
        .collect();
    removed.sort_by_key(|(i, _)| *i);
    let removed_count = removed.len();
    for (_, instance) in removed {
        instance.unmount(rt);
    }

    let doc = rt.document();
    let mut following = tail;
    let mut anchor = dom_anchor(following.clone());
    let mut moved = 0usize;
    for (instance, in_place) in result.values().rev().zip(placed.into_iter().rev()) {
        instance.set_position(parent, following.clone());
        if let Some(parent) = parent {
            let needs_insert = if !in_place {
                true
            } else if instance.is_composite() {
                !is_positioned(doc, instance, parent, anchor)
            } else {
                false
            };
            if needs_insert {
                instance.insert(doc, parent, anchor);
                moved += 1;
            }
        }
        anchor = instance.first_dom().or(anchor);
        following = Some(instance.clone());
    }
    trace!(
        children = result.len(),
        created,
        removed = removed_count,
        moved,
        "children reconciled"
    );

    *slots.slots.borrow_mut() = result;
    Ok(())
}

/// Whether the DOM nodes of `instance` sit contiguously under `parent`,
/// right before `anchor`.
fn is_positioned(doc: &Document, instance: &Instance, parent: DomId, anchor: Option<DomId>) -> bool {
    let mut nodes = Vec::new();
    instance.dom_nodes(&mut nodes);
    let Some(last) = nodes.last().copied() else {
        return true;
    };
    nodes.iter().all(|n| doc.parent(*n) == Some(parent))
        && nodes.windows(2).all(|w| doc.next_sibling(w[0]) == Some(w[1]))
        && doc.next_sibling(last) == anchor
}
