//! Reconciler
//!
//! Instances are the mounted counterparts of descriptors. Each one owns its
//! DOM node (elements, text) or its child instances (components,
//! fragments). The reconciler creates instances from descriptors, updates
//! them in place when a new descriptor has the same identity, and tears
//! them down otherwise.
//!
//! # Lifecycle
//!
//! ```text
//! created ──► mounted ──► updated* ──► unmounted
//! ```
//!
//! Unmounting is split in two. The synchronous half runs class unmount
//! callbacks while the DOM is still attached, removes every graph entry of
//! the subtree and then detaches its DOM, so no further update can reach
//! it. The deferred half (destroy queue) runs effect cleanups, clears refs
//! and frees the DOM nodes.
//!
//! # Positions
//!
//! Every instance records its parent element and its next sibling
//! instance. A component that re-renders into a different root, or a
//! fragment whose children change, uses them to find where its DOM nodes
//! belong without walking up through its ancestors.

mod children;
mod component;
mod element;
mod lazy;

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use tracing::trace;

use children::{reconcile_children, ChildSlots};
use component::ComponentInstance;
use element::ElementInstance;

use crate::dom::{Document, DomId};
use crate::error::Result;
use crate::node::{Key, Node, Props};
use crate::reactive::Runtime;

/// Where an instance sits: its parent element and the sibling after it.
#[derive(Default)]
pub(crate) struct Position {
    parent: Cell<Option<DomId>>,
    next: RefCell<Option<Instance>>,
}

impl Position {
    fn set(&self, parent: Option<DomId>, next: Option<Instance>) {
        self.parent.set(parent);
        *self.next.borrow_mut() = next;
    }

    pub fn parent(&self) -> Option<DomId> {
        self.parent.get()
    }

    pub fn next(&self) -> Option<Instance> {
        self.next.borrow().clone()
    }

    /// The first DOM node that follows this instance.
    pub fn anchor(&self) -> Option<DomId> {
        dom_anchor(self.next())
    }
}

/// First DOM node of `next` or, if it renders nothing, of its successors.
pub(crate) fn dom_anchor(mut next: Option<Instance>) -> Option<DomId> {
    while let Some(instance) = next {
        if let Some(dom) = instance.first_dom() {
            return Some(dom);
        }
        next = instance.position().next();
    }
    None
}

/// A mounted text node.
pub(crate) struct TextInstance {
    dom: DomId,
    text: RefCell<Rc<str>>,
    position: Position,
}

/// A mounted fragment.
pub(crate) struct FragmentInstance {
    key: Option<Key>,
    children: ChildSlots,
    position: Position,
}

/// A mounted descriptor.
#[derive(Clone)]
pub(crate) enum Instance {
    Element(Rc<ElementInstance>),
    Text(Rc<TextInstance>),
    Component(Rc<ComponentInstance>),
    Fragment(Rc<FragmentInstance>),
}

impl Instance {
    /// Build an instance and its subtree. The result is detached: the
    /// caller positions and inserts it.
    pub fn create(rt: &Runtime, node: &Node) -> Result<Instance> {
        Ok(match node {
            Node::Text(text) => {
                let dom = rt.document().create_text_node(text);
                Instance::Text(Rc::new(TextInstance {
                    dom,
                    text: RefCell::new(text.clone()),
                    position: Position::default(),
                }))
            }
            Node::Element(el) => Instance::Element(ElementInstance::create(rt, el)?),
            Node::Component(c) => {
                Instance::Component(ComponentInstance::create_function(rt, c)?)
            }
            Node::Class(c) => Instance::Component(ComponentInstance::create_class(rt, c)?),
            Node::Fragment(f) => {
                let fragment = Rc::new(FragmentInstance {
                    key: f.props.key.clone(),
                    children: ChildSlots::default(),
                    position: Position::default(),
                });
                reconcile_children(rt, &fragment.children, &f.props.children, None, None)?;
                Instance::Fragment(fragment)
            }
        })
    }

    /// Update in place from `node` if it has the same variant, identity and
    /// key. Returns `false` when the caller must replace the instance.
    pub fn reuse(&self, rt: &Runtime, node: &Node) -> Result<bool> {
        match (self, node) {
            (Instance::Text(t), Node::Text(text)) => {
                if **t.text.borrow() != **text {
                    rt.document().set_text(t.dom, text);
                    *t.text.borrow_mut() = text.clone();
                }
                Ok(true)
            }
            (Instance::Element(el), Node::Element(next)) => el.reuse(rt, next),
            (Instance::Component(c), Node::Component(next)) => c.reuse_function(rt, next),
            (Instance::Component(c), Node::Class(next)) => c.reuse_class(rt, next),
            (Instance::Fragment(f), Node::Fragment(next)) => {
                if f.key != next.props.key {
                    return Ok(false);
                }
                reuse_fragment(rt, f, &next.props)?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// Tear the instance down: unmount callbacks and graph entries first,
    /// then DOM attachment, the rest in the destroy queue.
    pub fn unmount(&self, rt: &Runtime) {
        self.release(rt);
        let doc = rt.document();
        let mut nodes = Vec::new();
        self.dom_nodes(&mut nodes);
        for node in nodes {
            doc.remove(node);
        }
        let instance = self.clone();
        rt.scheduler().queue_destroy(Box::new(move |rt| {
            instance.destroy(rt);
            Ok(())
        }));
    }

    /// Synchronous half of unmounting.
    pub(crate) fn release(&self, rt: &Runtime) {
        match self {
            Instance::Text(_) => {}
            Instance::Element(el) => el.release(rt),
            Instance::Component(c) => c.release(rt),
            Instance::Fragment(f) => {
                for child in f.children.instances() {
                    child.release(rt);
                }
            }
        }
    }

    /// Deferred half of unmounting.
    pub(crate) fn destroy(&self, rt: &Runtime) {
        match self {
            Instance::Text(t) => rt.document().release(t.dom),
            Instance::Element(el) => el.destroy(rt),
            Instance::Component(c) => c.destroy(rt),
            Instance::Fragment(f) => {
                for child in f.children.instances() {
                    child.destroy(rt);
                }
            }
        }
    }

    /// First DOM node this instance renders, in document order.
    pub fn first_dom(&self) -> Option<DomId> {
        match self {
            Instance::Text(t) => Some(t.dom),
            Instance::Element(el) => Some(el.dom()),
            Instance::Component(c) => c.child().and_then(|child| child.first_dom()),
            Instance::Fragment(f) => f.children.instances().iter().find_map(Instance::first_dom),
        }
    }

    /// Top-level DOM nodes of this instance, in document order.
    pub fn dom_nodes(&self, out: &mut Vec<DomId>) {
        match self {
            Instance::Text(t) => out.push(t.dom),
            Instance::Element(el) => out.push(el.dom()),
            Instance::Component(c) => {
                if let Some(child) = c.child() {
                    child.dom_nodes(out);
                }
            }
            Instance::Fragment(f) => {
                for child in f.children.instances() {
                    child.dom_nodes(out);
                }
            }
        }
    }

    pub fn position(&self) -> &Position {
        match self {
            Instance::Text(t) => &t.position,
            Instance::Element(el) => el.position(),
            Instance::Component(c) => c.position(),
            Instance::Fragment(f) => &f.position,
        }
    }

    /// Record where this instance sits. Components pass the position on to
    /// their child; fragments to their children, the last one inheriting
    /// the fragment's successor.
    pub fn set_position(&self, parent: Option<DomId>, next: Option<Instance>) {
        self.position().set(parent, next.clone());
        match self {
            Instance::Text(_) | Instance::Element(_) => {}
            Instance::Component(c) => {
                if let Some(child) = c.child() {
                    child.set_position(parent, next);
                }
            }
            Instance::Fragment(f) => {
                let children = f.children.instances();
                let mut following = next;
                for child in children.iter().rev() {
                    child.set_position(parent, following);
                    following = Some(child.clone());
                }
            }
        }
    }

    /// Insert all DOM nodes of this instance under `parent` before
    /// `before`, keeping their order.
    pub fn insert(&self, doc: &Document, parent: DomId, before: Option<DomId>) {
        let mut nodes = Vec::new();
        self.dom_nodes(&mut nodes);
        for node in nodes {
            doc.insert_before(parent, node, before);
        }
    }

    /// Whether this instance is a component or fragment, whose DOM nodes can
    /// change while it is reused.
    fn is_composite(&self) -> bool {
        matches!(self, Instance::Component(_) | Instance::Fragment(_))
    }
}

fn reuse_fragment(rt: &Runtime, fragment: &FragmentInstance, props: &Props) -> Result<()> {
    let parent = fragment.position.parent();
    let tail = fragment.position.next();
    trace!(children = props.children.len(), "fragment update");
    reconcile_children(rt, &fragment.children, &props.children, parent, tail)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{element, fragment, text};

    #[test]
    fn created_instances_are_detached() {
        let rt = Runtime::new();
        let node = element("p").child("hi").build();
        let instance = Instance::create(&rt, &node).unwrap();
        let dom = instance.first_dom().unwrap();
        assert_eq!(rt.document().parent(dom), None);
        assert_eq!(rt.document().outer_html(dom), "<p>hi</p>");
    }

    #[test]
    fn fragments_insert_all_their_nodes_in_order() {
        let rt = Runtime::new();
        let doc = rt.document();
        let root = doc.create_element("div");
        let instance = Instance::create(&rt, &fragment([text("a"), text("b")])).unwrap();
        instance.set_position(Some(root), None);
        instance.insert(doc, root, None);
        assert_eq!(doc.inner_html(root), "ab");
    }

    #[test]
    fn reuse_requires_matching_identity() {
        let rt = Runtime::new();
        let instance = Instance::create(&rt, &element("p").build()).unwrap();
        assert!(instance.reuse(&rt, &element("p").build()).unwrap());
        assert!(!instance.reuse(&rt, &element("span").build()).unwrap());
        assert!(!instance.reuse(&rt, &text("p")).unwrap());
        assert!(!instance.reuse(&rt, &element("p").key("k").build()).unwrap());
    }

    #[test]
    fn text_updates_in_place() {
        let rt = Runtime::new();
        let instance = Instance::create(&rt, &text("a")).unwrap();
        let dom = instance.first_dom().unwrap();
        assert!(instance.reuse(&rt, &text("b")).unwrap());
        assert_eq!(rt.document().text(dom).as_deref(), Some("b"));
        assert_eq!(instance.first_dom(), Some(dom));
    }

    #[test]
    fn anchors_skip_instances_without_dom() {
        let rt = Runtime::new();
        let empty = Instance::create(&rt, &fragment(Vec::<Node>::new())).unwrap();
        let tail = Instance::create(&rt, &text("t")).unwrap();
        empty.set_position(None, Some(tail.clone()));
        assert_eq!(dom_anchor(Some(empty)), tail.first_dom());
    }
}
