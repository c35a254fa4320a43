//! Element Instances
//!
//! An element instance owns one DOM element. Updating it diffs the previous
//! descriptor's properties against the new one's, entry by entry:
//!
//! - plain values become attributes (`className` → `class`,
//!   `htmlFor` → `for`; `true` → empty attribute; `false`, `null` and
//!   `undefined` remove it),
//! - function values get their own [`LazyUpdate`] dependee,
//! - `on*` listeners are rebound only when the listener itself changed,
//! - `style` is diffed per style property,
//! - `ref` receives the DOM node from the mount queue and is cleared on
//!   unmount.
//!
//! Entries that are identical by [`Prop::same`] are skipped without
//! touching the DOM.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use indexmap::IndexSet;
use tracing::trace;

use super::children::{reconcile_children, ChildSlots};
use super::lazy::{LazyTarget, LazyUpdate};
use super::Position;
use crate::dom::{event_type, Document, DomId, Listener};
use crate::error::Result;
use crate::node::{ElementNode, Prop, Style, StyleValue};
use crate::reactive::{Obj, Runtime, Value};

pub(crate) struct ElementInstance {
    dom: DomId,
    descriptor: RefCell<Rc<ElementNode>>,
    lazy_attributes: RefCell<HashMap<Rc<str>, Rc<LazyUpdate>>>,
    lazy_styles: RefCell<HashMap<Rc<str>, Rc<LazyUpdate>>>,
    node_ref: RefCell<Option<Obj>>,
    children: ChildSlots,
    position: Position,
}

impl ElementInstance {
    pub fn create(rt: &Runtime, node: &Rc<ElementNode>) -> Result<Rc<Self>> {
        let dom = rt.document().create_element(&node.tag);
        let instance = Rc::new(Self {
            dom,
            descriptor: RefCell::new(node.clone()),
            lazy_attributes: RefCell::new(HashMap::new()),
            lazy_styles: RefCell::new(HashMap::new()),
            node_ref: RefCell::new(None),
            children: ChildSlots::default(),
            position: Position::default(),
        });
        for (name, prop) in &node.props.entries {
            instance.apply_prop(rt, name, None, Some(prop));
        }
        reconcile_children(rt, &instance.children, &node.props.children, Some(dom), None)?;
        Ok(instance)
    }

    pub fn dom(&self) -> DomId {
        self.dom
    }

    pub fn position(&self) -> &Position {
        &self.position
    }

    /// Update from a new descriptor. Returns `false` if the tag or key
    /// differs.
    pub fn reuse(&self, rt: &Runtime, next: &Rc<ElementNode>) -> Result<bool> {
        let previous = self.descriptor.borrow().clone();
        if previous.tag != next.tag || previous.props.key != next.props.key {
            return Ok(false);
        }
        if Rc::ptr_eq(&previous, next) {
            return Ok(true);
        }

        let names: IndexSet<&Rc<str>> = previous
            .props
            .entries
            .keys()
            .chain(next.props.entries.keys())
            .collect();
        for name in names {
            let old = previous.props.entries.get(name);
            let new = next.props.entries.get(name);
            if let (Some(a), Some(b)) = (old, new) {
                if a.same(b) {
                    continue;
                }
            }
            self.apply_prop(rt, name, old, new);
        }
        *self.descriptor.borrow_mut() = next.clone();

        reconcile_children(rt, &self.children, &next.props.children, Some(self.dom), None)?;
        Ok(true)
    }

    fn apply_prop(&self, rt: &Runtime, name: &Rc<str>, old: Option<&Prop>, new: Option<&Prop>) {
        trace!(dom = ?self.dom, %name, "apply prop");
        let doc = rt.document();

        match old {
            Some(Prop::Lazy(_)) => {
                if let Some(update) = self.lazy_attributes.borrow_mut().remove(name) {
                    update.release(rt);
                }
            }
            Some(Prop::Listener(listener)) => {
                if let Some(kind) = event_type(name) {
                    doc.remove_event_listener(self.dom, &kind, listener);
                }
            }
            Some(Prop::Ref(target)) => {
                if !matches!(new, Some(Prop::Ref(_))) {
                    self.node_ref.borrow_mut().take();
                    target.set("current", Value::Undefined);
                }
            }
            Some(Prop::Style(style)) if !matches!(new, Some(Prop::Style(_))) => {
                self.apply_style(rt, style, &Style::new());
            }
            _ => {}
        }

        match new {
            Some(Prop::Value(value)) => write_attribute(doc, self.dom, name, value),
            Some(Prop::Lazy(compute)) => {
                let target = LazyTarget::Attribute(name.clone());
                let update = LazyUpdate::create(rt, self.dom, target, compute.clone());
                self.lazy_attributes.borrow_mut().insert(name.clone(), update);
            }
            Some(Prop::Listener(listener)) => self.bind(doc, name, listener),
            Some(Prop::Style(style)) => {
                let empty = Style::new();
                let previous = match old {
                    Some(Prop::Style(previous)) => previous,
                    _ => &empty,
                };
                self.apply_style(rt, previous, style);
            }
            Some(Prop::Ref(target)) => self.assign_ref(rt, target),
            None => {
                if matches!(old, Some(Prop::Value(_) | Prop::Lazy(_))) {
                    doc.remove_attribute(self.dom, attribute_name(name));
                }
            }
        }
    }

    fn bind(&self, doc: &Document, name: &str, listener: &Listener) {
        match event_type(name) {
            Some(kind) => doc.add_event_listener(self.dom, &kind, listener.clone()),
            None => trace!(name, "listener under a non-event name ignored"),
        }
    }

    fn apply_style(&self, rt: &Runtime, old: &Style, new: &Style) {
        let doc = rt.document();
        for (name, previous) in old {
            if new.contains_key(name) {
                continue;
            }
            if matches!(previous, StyleValue::Lazy(_)) {
                if let Some(update) = self.lazy_styles.borrow_mut().remove(name) {
                    update.release(rt);
                }
            }
            doc.remove_style(self.dom, name);
        }
        for (name, value) in new {
            let previous = old.get(name);
            if previous.is_some_and(|p| p.same(value)) {
                continue;
            }
            if matches!(previous, Some(StyleValue::Lazy(_))) {
                if let Some(update) = self.lazy_styles.borrow_mut().remove(name) {
                    update.release(rt);
                }
            }
            match value {
                StyleValue::Value(v) => write_style(doc, self.dom, name, v),
                StyleValue::Lazy(compute) => {
                    let target = LazyTarget::Style(name.clone());
                    let update = LazyUpdate::create(rt, self.dom, target, compute.clone());
                    self.lazy_styles.borrow_mut().insert(name.clone(), update);
                }
            }
        }
    }

    /// Hand the DOM node to `target.current` once the pass reaches the
    /// mount queue.
    fn assign_ref(&self, rt: &Runtime, target: &Obj) {
        if let Some(previous) = self.node_ref.borrow_mut().replace(target.clone()) {
            previous.set("current", Value::Undefined);
        }
        let target = target.clone();
        let dom = self.dom;
        rt.scheduler().queue_mount(Box::new(move |rt| {
            if rt.document().contains(dom) {
                target.set("current", Value::Node(dom));
            }
            Ok(())
        }));
    }

    /// Drop lazy dependees of this element and its subtree.
    pub fn release(&self, rt: &Runtime) {
        for (_, update) in self.lazy_attributes.borrow_mut().drain() {
            update.release(rt);
        }
        for (_, update) in self.lazy_styles.borrow_mut().drain() {
            update.release(rt);
        }
        for child in self.children.instances() {
            child.release(rt);
        }
    }

    /// Clear the ref and free the DOM node, then do the same for the
    /// subtree.
    pub fn destroy(&self, rt: &Runtime) {
        if let Some(target) = self.node_ref.borrow_mut().take() {
            target.set("current", Value::Undefined);
        }
        for child in self.children.instances() {
            child.destroy(rt);
        }
        rt.document().release(self.dom);
    }
}

fn attribute_name(name: &str) -> &str {
    match name {
        "className" => "class",
        "htmlFor" => "for",
        other => other,
    }
}

/// Write a property value as an attribute.
pub(crate) fn write_attribute(doc: &Document, dom: DomId, name: &str, value: &Value) {
    let name = attribute_name(name);
    match value {
        Value::Bool(true) => doc.set_attribute(dom, name, ""),
        Value::Bool(false) | Value::Null | Value::Undefined => doc.remove_attribute(dom, name),
        other => match other.to_text() {
            Some(text) => doc.set_attribute(dom, name, &text),
            None => {
                trace!(name, value = ?other, "value has no attribute form");
                doc.remove_attribute(dom, name);
            }
        },
    }
}

/// Write a value as an inline style property.
pub(crate) fn write_style(doc: &Document, dom: DomId, name: &str, value: &Value) {
    match value.to_text() {
        Some(text) => doc.set_style(dom, name, &text),
        None => doc.remove_style(dom, name),
    }
}
