//! Document Model
//!
//! The live tree the reconciler keeps in sync with application state. It
//! mirrors the subset of the browser DOM API the engine relies on:
//! element and text creation, `insertBefore`/`removeChild`, attributes,
//! inline style properties and event listeners.
//!
//! # Strictness
//!
//! The document is lenient. Operations on unknown or released nodes, or on a
//! node of the wrong kind, are logged at `warn` level and ignored rather than
//! reported as errors, the same way a browser silently ignores most misuse of
//! detached nodes. The reconciler never relies on such calls succeeding.
//!
//! # Identity
//!
//! Nodes live in an arena and are addressed by [`DomId`]. Ids are never
//! reused, so a test can hold on to an id and later check whether the same
//! node is still mounted (keyed moves keep ids, recreation does not).

mod event;

use std::cell::RefCell;
use std::fmt;
use std::fmt::Write as _;
use std::rc::Rc;

use indexmap::IndexMap;
use tracing::{trace, warn};

pub use event::{listener, Event, Listener};
pub(crate) use event::event_type;

/// Identifier of a node in a [`Document`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DomId(u32);

impl DomId {
    /// Raw arena index.
    pub fn raw(self) -> u32 {
        self.0
    }
}

/// Counters of structural work done on a document.
///
/// Useful to assert that an update only moved nodes instead of recreating
/// them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DomStats {
    /// Nodes created (elements and text).
    pub created: usize,
    /// `insertBefore`/`appendChild` calls that attached or moved a node.
    pub inserted: usize,
    /// Nodes detached from their parent.
    pub removed: usize,
    /// Attribute and style writes, including removals.
    pub attribute_writes: usize,
    /// Text node content writes.
    pub text_writes: usize,
}

struct ElementData {
    tag: Rc<str>,
    attributes: IndexMap<String, String>,
    style: IndexMap<String, String>,
    listeners: Vec<(Rc<str>, Listener)>,
}

enum NodeData {
    Element(ElementData),
    Text(String),
}

struct DomNode {
    parent: Option<DomId>,
    children: Vec<DomId>,
    data: NodeData,
}

#[derive(Default)]
struct DocumentInner {
    nodes: Vec<Option<DomNode>>,
    stats: DomStats,
}

impl DocumentInner {
    fn node(&self, id: DomId) -> Option<&DomNode> {
        self.nodes.get(id.0 as usize).and_then(Option::as_ref)
    }

    fn node_mut(&mut self, id: DomId) -> Option<&mut DomNode> {
        self.nodes.get_mut(id.0 as usize).and_then(Option::as_mut)
    }

    fn element_mut(&mut self, id: DomId) -> Option<&mut ElementData> {
        match self.node_mut(id).map(|n| &mut n.data) {
            Some(NodeData::Element(el)) => Some(el),
            _ => {
                warn!(?id, "expected a live element");
                None
            }
        }
    }

    fn push(&mut self, data: NodeData) -> DomId {
        let id = DomId(self.nodes.len() as u32);
        self.nodes.push(Some(DomNode {
            parent: None,
            children: Vec::new(),
            data,
        }));
        self.stats.created += 1;
        id
    }

    fn detach(&mut self, child: DomId) -> bool {
        let Some(parent) = self.node(child).and_then(|n| n.parent) else {
            return false;
        };
        if let Some(p) = self.node_mut(parent) {
            p.children.retain(|c| *c != child);
        }
        if let Some(c) = self.node_mut(child) {
            c.parent = None;
        }
        self.stats.removed += 1;
        true
    }

    fn is_ancestor(&self, ancestor: DomId, mut node: DomId) -> bool {
        loop {
            if node == ancestor {
                return true;
            }
            match self.node(node).and_then(|n| n.parent) {
                Some(parent) => node = parent,
                None => return false,
            }
        }
    }
}

/// An in-memory document.
///
/// Cloning a `Document` yields another handle to the same tree.
#[derive(Clone, Default)]
pub struct Document {
    inner: Rc<RefCell<DocumentInner>>,
}

impl Document {
    /// Create an empty document.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a detached element.
    pub fn create_element(&self, tag: &str) -> DomId {
        let id = self.inner.borrow_mut().push(NodeData::Element(ElementData {
            tag: Rc::from(tag),
            attributes: IndexMap::new(),
            style: IndexMap::new(),
            listeners: Vec::new(),
        }));
        trace!(?id, tag, "create element");
        id
    }

    /// Create a detached text node.
    pub fn create_text_node(&self, text: &str) -> DomId {
        let id = self
            .inner
            .borrow_mut()
            .push(NodeData::Text(text.to_owned()));
        trace!(?id, "create text");
        id
    }

    /// Whether `id` refers to a node that has not been released.
    pub fn contains(&self, id: DomId) -> bool {
        self.inner.borrow().node(id).is_some()
    }

    /// Insert `child` into `parent` before `before`, or append when `before`
    /// is `None`. A node that already has a parent is moved.
    pub fn insert_before(&self, parent: DomId, child: DomId, before: Option<DomId>) {
        if before == Some(child) {
            return;
        }
        let mut doc = self.inner.borrow_mut();
        let parent_is_element = matches!(
            doc.node(parent).map(|n| &n.data),
            Some(NodeData::Element(_))
        );
        if doc.node(child).is_none() || !parent_is_element {
            warn!(?parent, ?child, "insert into or of a missing node");
            return;
        }
        if doc.is_ancestor(child, parent) {
            warn!(?parent, ?child, "refusing to insert a node into its own subtree");
            return;
        }
        let already_there = doc.node(child).and_then(|n| n.parent) == Some(parent) && {
            let siblings = doc.node(parent).map(|n| n.children.as_slice()).unwrap_or(&[]);
            let pos = siblings.iter().position(|c| *c == child);
            match (pos, before) {
                (Some(i), Some(b)) => siblings.get(i + 1) == Some(&b),
                (Some(i), None) => i + 1 == siblings.len(),
                _ => false,
            }
        };
        if already_there {
            return;
        }
        doc.detach(child);
        let Some(p) = doc.node_mut(parent) else {
            return;
        };
        let index = match before {
            Some(b) => match p.children.iter().position(|c| *c == b) {
                Some(i) => i,
                None => {
                    warn!(?parent, ?b, "reference node is not a child, appending");
                    p.children.len()
                }
            },
            None => p.children.len(),
        };
        p.children.insert(index, child);
        if let Some(c) = doc.node_mut(child) {
            c.parent = Some(parent);
        }
        doc.stats.inserted += 1;
        trace!(?parent, ?child, ?before, "insert");
    }

    /// Append `child` as the last child of `parent`.
    pub fn append_child(&self, parent: DomId, child: DomId) {
        self.insert_before(parent, child, None);
    }

    /// Detach a node from its parent. Returns whether it had one.
    pub fn remove(&self, id: DomId) -> bool {
        let removed = self.inner.borrow_mut().detach(id);
        if removed {
            trace!(?id, "remove");
        }
        removed
    }

    /// Detach a node and free its slot. Remaining children become orphans.
    pub fn release(&self, id: DomId) {
        let mut doc = self.inner.borrow_mut();
        doc.detach(id);
        let Some(node) = doc.nodes.get_mut(id.0 as usize).and_then(Option::take) else {
            return;
        };
        for child in node.children {
            if let Some(c) = doc.node_mut(child) {
                c.parent = None;
            }
        }
    }

    /// Parent of a node.
    pub fn parent(&self, id: DomId) -> Option<DomId> {
        self.inner.borrow().node(id).and_then(|n| n.parent)
    }

    /// Children of a node, in order.
    pub fn children(&self, id: DomId) -> Vec<DomId> {
        self.inner
            .borrow()
            .node(id)
            .map(|n| n.children.clone())
            .unwrap_or_default()
    }

    /// The node following `id` under the same parent.
    pub fn next_sibling(&self, id: DomId) -> Option<DomId> {
        let doc = self.inner.borrow();
        let parent = doc.node(id)?.parent?;
        let siblings = &doc.node(parent)?.children;
        let pos = siblings.iter().position(|c| *c == id)?;
        siblings.get(pos + 1).copied()
    }

    /// Tag name of an element.
    pub fn tag_name(&self, id: DomId) -> Option<Rc<str>> {
        match self.inner.borrow().node(id).map(|n| &n.data) {
            Some(NodeData::Element(el)) => Some(el.tag.clone()),
            _ => None,
        }
    }

    /// Set an attribute.
    pub fn set_attribute(&self, id: DomId, name: &str, value: &str) {
        let mut doc = self.inner.borrow_mut();
        if let Some(el) = doc.element_mut(id) {
            el.attributes.insert(name.to_owned(), value.to_owned());
            doc.stats.attribute_writes += 1;
            trace!(?id, name, value, "set attribute");
        }
    }

    /// Remove an attribute.
    pub fn remove_attribute(&self, id: DomId, name: &str) {
        let mut doc = self.inner.borrow_mut();
        if let Some(el) = doc.element_mut(id) {
            if el.attributes.shift_remove(name).is_some() {
                doc.stats.attribute_writes += 1;
                trace!(?id, name, "remove attribute");
            }
        }
    }

    /// Read an attribute.
    pub fn attribute(&self, id: DomId, name: &str) -> Option<String> {
        match self.inner.borrow().node(id).map(|n| &n.data) {
            Some(NodeData::Element(el)) => el.attributes.get(name).cloned(),
            _ => None,
        }
    }

    /// Set an inline style property.
    pub fn set_style(&self, id: DomId, name: &str, value: &str) {
        let mut doc = self.inner.borrow_mut();
        if let Some(el) = doc.element_mut(id) {
            el.style.insert(name.to_owned(), value.to_owned());
            doc.stats.attribute_writes += 1;
            trace!(?id, name, value, "set style");
        }
    }

    /// Remove an inline style property.
    pub fn remove_style(&self, id: DomId, name: &str) {
        let mut doc = self.inner.borrow_mut();
        if let Some(el) = doc.element_mut(id) {
            if el.style.shift_remove(name).is_some() {
                doc.stats.attribute_writes += 1;
            }
        }
    }

    /// Read an inline style property.
    pub fn style(&self, id: DomId, name: &str) -> Option<String> {
        match self.inner.borrow().node(id).map(|n| &n.data) {
            Some(NodeData::Element(el)) => el.style.get(name).cloned(),
            _ => None,
        }
    }

    /// Replace the content of a text node.
    pub fn set_text(&self, id: DomId, text: &str) {
        let mut doc = self.inner.borrow_mut();
        match doc.node_mut(id).map(|n| &mut n.data) {
            Some(NodeData::Text(data)) => {
                data.clear();
                data.push_str(text);
                doc.stats.text_writes += 1;
                trace!(?id, text, "set text");
            }
            _ => warn!(?id, "expected a live text node"),
        }
    }

    /// Content of a text node.
    pub fn text(&self, id: DomId) -> Option<String> {
        match self.inner.borrow().node(id).map(|n| &n.data) {
            Some(NodeData::Text(data)) => Some(data.clone()),
            _ => None,
        }
    }

    /// Bind a listener for events of type `kind`.
    pub fn add_event_listener(&self, id: DomId, kind: &str, listener: Listener) {
        let mut doc = self.inner.borrow_mut();
        if let Some(el) = doc.element_mut(id) {
            el.listeners.push((Rc::from(kind), listener));
            trace!(?id, kind, "add listener");
        }
    }

    /// Unbind a listener previously added with the same `Rc`.
    pub fn remove_event_listener(&self, id: DomId, kind: &str, listener: &Listener) -> bool {
        let mut doc = self.inner.borrow_mut();
        let Some(el) = doc.element_mut(id) else {
            return false;
        };
        let before = el.listeners.len();
        el.listeners
            .retain(|(k, l)| !(&**k == kind && Rc::ptr_eq(l, listener)));
        before != el.listeners.len()
    }

    /// Number of listeners bound on a node for `kind`.
    pub fn listener_count(&self, id: DomId, kind: &str) -> usize {
        match self.inner.borrow().node(id).map(|n| &n.data) {
            Some(NodeData::Element(el)) => el.listeners.iter().filter(|(k, _)| &**k == kind).count(),
            _ => 0,
        }
    }

    /// Dispatch an event at `target`, bubbling to its ancestors.
    ///
    /// Listeners run synchronously with no document borrow held, so they may
    /// mutate the document or application state freely.
    pub fn dispatch_event(&self, target: DomId, kind: &str) {
        let kind: Rc<str> = Rc::from(kind);
        let mut current = Some(target);
        while let Some(node) = current {
            let (listeners, parent) = {
                let doc = self.inner.borrow();
                let Some(n) = doc.node(node) else {
                    return;
                };
                let listeners: Vec<Listener> = match &n.data {
                    NodeData::Element(el) => el
                        .listeners
                        .iter()
                        .filter(|(k, _)| *k == kind)
                        .map(|(_, l)| l.clone())
                        .collect(),
                    NodeData::Text(_) => Vec::new(),
                };
                (listeners, n.parent)
            };
            let event = Event {
                kind: kind.clone(),
                target,
                current_target: node,
            };
            for l in listeners {
                l(&event);
            }
            current = parent;
        }
    }

    /// Concatenated text of a node and its descendants.
    pub fn text_content(&self, id: DomId) -> String {
        let doc = self.inner.borrow();
        let mut out = String::new();
        collect_text(&doc, id, &mut out);
        out
    }

    /// Serialize a node and its subtree.
    pub fn outer_html(&self, id: DomId) -> String {
        let doc = self.inner.borrow();
        let mut out = String::new();
        write_node(&doc, id, &mut out);
        out
    }

    /// Serialize the children of a node.
    pub fn inner_html(&self, id: DomId) -> String {
        let doc = self.inner.borrow();
        let mut out = String::new();
        if let Some(n) = doc.node(id) {
            for child in &n.children {
                write_node(&doc, *child, &mut out);
            }
        }
        out
    }

    /// Structural work counters since creation or the last reset.
    pub fn stats(&self) -> DomStats {
        self.inner.borrow().stats
    }

    /// Reset the work counters.
    pub fn reset_stats(&self) {
        self.inner.borrow_mut().stats = DomStats::default();
    }
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let doc = self.inner.borrow();
        f.debug_struct("Document")
            .field("live_nodes", &doc.nodes.iter().filter(|n| n.is_some()).count())
            .field("stats", &doc.stats)
            .finish()
    }
}

fn collect_text(doc: &DocumentInner, id: DomId, out: &mut String) {
    let Some(node) = doc.node(id) else {
        return;
    };
    match &node.data {
        NodeData::Text(data) => out.push_str(data),
        NodeData::Element(_) => {
            for child in &node.children {
                collect_text(doc, *child, out);
            }
        }
    }
}

fn write_node(doc: &DocumentInner, id: DomId, out: &mut String) {
    let Some(node) = doc.node(id) else {
        return;
    };
    match &node.data {
        NodeData::Text(data) => escape_into(data, false, out),
        NodeData::Element(el) => {
            out.push('<');
            out.push_str(&el.tag);
            for (name, value) in &el.attributes {
                if name == "style" && !el.style.is_empty() {
                    continue;
                }
                let _ = write!(out, " {name}=\"");
                escape_into(value, true, out);
                out.push('"');
            }
            if !el.style.is_empty() {
                let css = el
                    .style
                    .iter()
                    .map(|(k, v)| format!("{k}: {v}"))
                    .collect::<Vec<_>>()
                    .join("; ");
                out.push_str(" style=\"");
                escape_into(&css, true, out);
                out.push('"');
            }
            out.push('>');
            for child in &node.children {
                write_node(doc, *child, out);
            }
            let _ = write!(out, "</{}>", el.tag);
        }
    }
}

fn escape_into(text: &str, attribute: bool, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' if attribute => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn builds_and_serializes_a_tree() {
        let doc = Document::new();
        let div = doc.create_element("div");
        let span = doc.create_element("span");
        let text = doc.create_text_node("a < b");
        doc.append_child(div, span);
        doc.append_child(span, text);
        doc.set_attribute(div, "class", "x\"y");
        doc.set_style(span, "color", "red");

        assert_eq!(
            doc.outer_html(div),
            "<div class=\"x&quot;y\"><span style=\"color: red\">a &lt; b</span></div>"
        );
        assert_eq!(doc.text_content(div), "a < b");
    }

    #[test]
    fn insert_before_moves_existing_children() {
        let doc = Document::new();
        let ul = doc.create_element("ul");
        let a = doc.create_text_node("a");
        let b = doc.create_text_node("b");
        let c = doc.create_text_node("c");
        for n in [a, b, c] {
            doc.append_child(ul, n);
        }
        doc.insert_before(ul, c, Some(a));
        assert_eq!(doc.children(ul), vec![c, a, b]);
        assert_eq!(doc.next_sibling(a), Some(b));
        assert_eq!(doc.parent(c), Some(ul));
    }

    #[test]
    fn insert_in_place_is_not_counted() {
        let doc = Document::new();
        let ul = doc.create_element("ul");
        let a = doc.create_text_node("a");
        let b = doc.create_text_node("b");
        doc.append_child(ul, a);
        doc.append_child(ul, b);
        doc.reset_stats();

        doc.insert_before(ul, a, Some(b));
        doc.append_child(ul, b);
        assert_eq!(doc.stats().inserted, 0);
    }

    #[test]
    fn release_frees_the_slot() {
        let doc = Document::new();
        let div = doc.create_element("div");
        let span = doc.create_element("span");
        doc.append_child(div, span);
        doc.release(span);
        assert!(!doc.contains(span));
        assert!(doc.children(div).is_empty());
        // Operations on released nodes are ignored.
        doc.set_attribute(span, "id", "gone");
        assert_eq!(doc.attribute(span, "id"), None);
    }

    #[test]
    fn refuses_cycles() {
        let doc = Document::new();
        let outer = doc.create_element("div");
        let inner = doc.create_element("div");
        doc.append_child(outer, inner);
        doc.append_child(inner, outer);
        assert_eq!(doc.parent(outer), None);
    }

    #[test]
    fn events_bubble_to_ancestors() {
        let doc = Document::new();
        let div = doc.create_element("div");
        let button = doc.create_element("button");
        doc.append_child(div, button);

        let hits = Rc::new(Cell::new(0));
        let h = hits.clone();
        let l = listener(move |e: &Event| {
            assert_eq!(&*e.kind, "click");
            h.set(h.get() + 1);
        });
        doc.add_event_listener(button, "click", l.clone());
        doc.add_event_listener(div, "click", l.clone());

        doc.dispatch_event(button, "click");
        assert_eq!(hits.get(), 2);

        assert!(doc.remove_event_listener(div, "click", &l));
        doc.dispatch_event(button, "click");
        assert_eq!(hits.get(), 3);
        assert_eq!(doc.listener_count(button, "click"), 1);
    }
}
