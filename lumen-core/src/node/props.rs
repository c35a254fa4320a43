//! Descriptor payloads: keys, properties and children.

use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use super::Node;
use crate::dom::{DomId, Event, Listener};
use crate::reactive::{Immutable, Obj, Value};

/// A function-valued property, recomputed on its own when the state it
/// reads changes.
pub type LazyFn = Rc<dyn Fn() -> Value>;

/// Explicit identity of a child among its siblings.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Key(Rc<str>);

impl Key {
    /// The key text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", &*self.0)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Key {
    fn from(s: &str) -> Self {
        Key(Rc::from(s))
    }
}

impl From<String> for Key {
    fn from(s: String) -> Self {
        Key(Rc::from(s))
    }
}

impl From<Rc<str>> for Key {
    fn from(s: Rc<str>) -> Self {
        Key(s)
    }
}

macro_rules! key_from_int {
    ($($t:ty),*) => {
        $(impl From<$t> for Key {
            fn from(n: $t) -> Self {
                Key(Rc::from(n.to_string()))
            }
        })*
    };
}

key_from_int!(i32, i64, u32, u64, usize);

impl From<&Value> for Key {
    fn from(v: &Value) -> Self {
        Key(Rc::from(v.to_string()))
    }
}

/// One entry of an inline `style` map.
#[derive(Clone)]
pub enum StyleValue {
    /// A fixed value.
    Value(Value),
    /// A value recomputed on its own.
    Lazy(LazyFn),
}

impl StyleValue {
    pub(crate) fn same(&self, other: &StyleValue) -> bool {
        match (self, other) {
            (StyleValue::Value(a), StyleValue::Value(b)) => a.same(b),
            (StyleValue::Lazy(a), StyleValue::Lazy(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

macro_rules! from_value {
    ($target:ident: $($t:ty),*) => {
        $(impl From<$t> for $target {
            fn from(v: $t) -> Self {
                $target::Value(Value::from(v))
            }
        })*
    };
}

from_value!(StyleValue: Value, &str, String, Rc<str>, f64, i32, u32, usize, bool);

/// Inline style properties, diffed entry by entry.
pub type Style = IndexMap<Rc<str>, StyleValue>;

/// A property on an element or component descriptor.
#[derive(Clone)]
pub enum Prop {
    /// A plain value.
    Value(Value),
    /// A function-valued property.
    Lazy(LazyFn),
    /// An `on*` event handler.
    Listener(Listener),
    /// The inline style map.
    Style(Style),
    /// An object whose `current` receives the element's DOM node.
    Ref(Obj),
}

impl Prop {
    /// Identity comparison used when deciding whether anything changed.
    pub(crate) fn same(&self, other: &Prop) -> bool {
        match (self, other) {
            (Prop::Value(a), Prop::Value(b)) => a.same(b),
            (Prop::Lazy(a), Prop::Lazy(b)) => Rc::ptr_eq(a, b),
            (Prop::Listener(a), Prop::Listener(b)) => Rc::ptr_eq(a, b),
            (Prop::Ref(a), Prop::Ref(b)) => a == b,
            (Prop::Style(a), Prop::Style(b)) => {
                a.len() == b.len()
                    && a
                        .iter()
                        .all(|(k, v)| b.get(k).is_some_and(|w| v.same(w)))
            }
            _ => false,
        }
    }
}

from_value!(Prop: Value, &str, String, Rc<str>, f64, i32, u32, usize, bool, Obj, &Obj, Immutable, DomId);

impl From<Listener> for Prop {
    fn from(listener: Listener) -> Self {
        Prop::Listener(listener)
    }
}

/// Property map, children and key of a descriptor.
#[derive(Clone, Default)]
pub struct Props {
    pub(crate) entries: IndexMap<Rc<str>, Prop>,
    pub(crate) children: Vec<Child>,
    pub(crate) key: Option<Key>,
}

impl Props {
    /// An empty property set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a property.
    pub fn set(mut self, name: &str, value: impl Into<Prop>) -> Self {
        self.entries.insert(Rc::from(name), value.into());
        self
    }

    /// Set a function-valued property.
    pub fn lazy<F>(self, name: &str, f: F) -> Self
    where
        F: Fn() -> Value + 'static,
    {
        self.set(name, Prop::Lazy(Rc::new(f)))
    }

    /// Bind an event handler. `event` is the event type, e.g. `"click"`.
    pub fn on<F>(self, event: &str, f: F) -> Self
    where
        F: Fn(&Event) + 'static,
    {
        self.listener(event, Rc::new(f))
    }

    /// Bind an existing listener. Reusing the same `Rc` across renders keeps
    /// the native binding in place.
    pub fn listener(self, event: &str, listener: Listener) -> Self {
        let name = format!("on{event}");
        self.set(&name, Prop::Listener(listener))
    }

    /// Set one inline style property.
    pub fn style(self, name: &str, value: impl Into<StyleValue>) -> Self {
        self.style_entry(name, value.into())
    }

    /// Set one function-valued inline style property.
    pub fn lazy_style<F>(self, name: &str, f: F) -> Self
    where
        F: Fn() -> Value + 'static,
    {
        self.style_entry(name, StyleValue::Lazy(Rc::new(f)))
    }

    fn style_entry(mut self, name: &str, value: StyleValue) -> Self {
        match self.entries.get_mut("style") {
            Some(Prop::Style(style)) => {
                style.insert(Rc::from(name), value);
            }
            _ => {
                let mut style = Style::new();
                style.insert(Rc::from(name), value);
                self.entries.insert(Rc::from("style"), Prop::Style(style));
            }
        }
        self
    }

    /// Receive the element's DOM node in `target.current`.
    pub fn node_ref(self, target: &Obj) -> Self {
        self.set("ref", Prop::Ref(target.clone()))
    }

    /// Set the explicit key.
    pub fn key(mut self, key: impl Into<Key>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Append a child.
    pub fn child(mut self, child: impl Into<Child>) -> Self {
        self.children.push(child.into());
        self
    }

    /// Append several children.
    pub fn children<I>(mut self, children: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Child>,
    {
        self.children.extend(children.into_iter().map(Into::into));
        self
    }

    /// Look a property up.
    pub fn get(&self, name: &str) -> Option<&Prop> {
        self.entries.get(name)
    }

    /// Number of properties, children and key excluded.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether there are no properties.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A child slot of an element, fragment or component.
#[derive(Clone)]
pub enum Child {
    /// A descriptor.
    Node(Node),
    /// A value rendered as text. Booleans, null and undefined render
    /// nothing.
    Value(Value),
    /// Nested children, flattened into the parent.
    List(Vec<Child>),
    /// Children produced when the parent reconciles.
    Dynamic(Rc<dyn Fn() -> Child>),
}

impl Child {
    /// A child computed during reconciliation. It is evaluated as part of
    /// the owner's render, so the owner depends on what it reads.
    pub fn dynamic<F>(f: F) -> Self
    where
        F: Fn() -> Child + 'static,
    {
        Child::Dynamic(Rc::new(f))
    }

    /// Nothing.
    pub fn empty() -> Self {
        Child::Value(Value::Undefined)
    }

    #[cfg(test)]
    pub(crate) fn is_empty(&self) -> bool {
        match self {
            Child::Value(v) => v.to_text().is_none(),
            Child::List(items) => items.is_empty(),
            Child::Node(_) | Child::Dynamic(_) => false,
        }
    }
}

/// Children handed to a component through its `children` property.
///
/// Read them back with `Child::from(props.get("children"))`.
#[derive(Clone)]
pub struct ChildList(pub Vec<Child>);

impl From<Node> for Child {
    fn from(node: Node) -> Self {
        Child::Node(node)
    }
}

impl From<Option<Node>> for Child {
    fn from(node: Option<Node>) -> Self {
        node.map_or(Child::Value(Value::Null), Child::Node)
    }
}

impl From<Vec<Child>> for Child {
    fn from(children: Vec<Child>) -> Self {
        Child::List(children)
    }
}

impl From<Vec<Node>> for Child {
    fn from(nodes: Vec<Node>) -> Self {
        Child::List(nodes.into_iter().map(Child::Node).collect())
    }
}

impl From<Value> for Child {
    fn from(value: Value) -> Self {
        if let Some(ChildList(children)) = value.downcast_ref::<ChildList>() {
            return Child::List(children.clone());
        }
        if let Some(node) = value.downcast_ref::<Node>() {
            return Child::Node(node.clone());
        }
        Child::Value(value)
    }
}

from_value!(Child: &str, String, Rc<str>, f64, i32, u32, usize, bool);
