//! Node Model
//!
//! Descriptors say what to render. They are immutable, cheap to clone
//! (`Rc` inside) and rebuilt on every render; the reconciler compares them
//! with what is mounted and applies the difference.
//!
//! # Identity
//!
//! Two descriptors can update one another in place only if they are the
//! same variant with the same identity:
//!
//! | Variant   | Identity                |
//! |-----------|-------------------------|
//! | Element   | tag name                |
//! | Component | function pointer        |
//! | Class     | component type          |
//! | Fragment  | always compatible       |
//! | Text      | always compatible       |
//!
//! and, when placed among siblings, the same key.
//!
//! # Building
//!
//! [`h`] and [`jsx`] mirror the two call shapes a JSX transform emits. The
//! fluent [`element`], [`component`] and [`class`] builders produce the same
//! descriptors with less ceremony.

mod component;
mod props;

use std::fmt;
use std::rc::Rc;

use crate::dom::{Event, Listener};
use crate::reactive::{Obj, Value};

pub use component::{ClassType, Component, ComponentFn};
pub use props::{Child, ChildList, Key, LazyFn, Prop, Props, Style, StyleValue};

/// An immutable description of a node to render.
#[derive(Clone)]
pub enum Node {
    /// An HTML element.
    Element(Rc<ElementNode>),
    /// A function component.
    Component(Rc<ComponentNode>),
    /// A class component.
    Class(Rc<ClassNode>),
    /// Children without a wrapper element.
    Fragment(Rc<FragmentNode>),
    /// A text node.
    Text(Rc<str>),
}

/// Payload of [`Node::Element`].
pub struct ElementNode {
    pub(crate) tag: Rc<str>,
    pub(crate) props: Props,
}

/// Payload of [`Node::Component`].
pub struct ComponentNode {
    pub(crate) func: ComponentFn,
    pub(crate) props: Props,
}

/// Payload of [`Node::Class`].
pub struct ClassNode {
    pub(crate) class: ClassType,
    pub(crate) props: Props,
}

/// Payload of [`Node::Fragment`].
pub struct FragmentNode {
    pub(crate) props: Props,
}

impl Node {
    /// A text descriptor.
    pub fn text(text: impl Into<Rc<str>>) -> Self {
        Node::Text(text.into())
    }

    /// The explicit key, if any.
    pub fn key(&self) -> Option<&Key> {
        match self {
            Node::Element(e) => e.props.key.as_ref(),
            Node::Component(c) => c.props.key.as_ref(),
            Node::Class(c) => c.props.key.as_ref(),
            Node::Fragment(f) => f.props.key.as_ref(),
            Node::Text(_) => None,
        }
    }

    /// Tag name of an element descriptor.
    pub fn tag(&self) -> Option<&str> {
        match self {
            Node::Element(e) => Some(&e.tag),
            _ => None,
        }
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Element(e) => write!(f, "<{}>", e.tag),
            Node::Component(c) => write!(f, "<fn@{:p}>", c.func as *const ()),
            Node::Class(c) => write!(f, "<{}>", c.class.name()),
            Node::Fragment(_) => f.write_str("<>"),
            Node::Text(t) => write!(f, "{t:?}"),
        }
    }
}

/// The `type` argument of [`h`] and [`jsx`].
#[derive(Clone)]
pub enum NodeType {
    /// An HTML tag name.
    Tag(Rc<str>),
    /// A function component.
    Function(ComponentFn),
    /// A class component.
    Class(ClassType),
    /// The fragment marker.
    Fragment,
}

impl NodeType {
    /// Class component type `T`.
    pub fn class<T: Component + 'static>() -> Self {
        NodeType::Class(ClassType::of::<T>())
    }
}

impl From<&str> for NodeType {
    fn from(tag: &str) -> Self {
        NodeType::Tag(Rc::from(tag))
    }
}

impl From<ComponentFn> for NodeType {
    fn from(f: ComponentFn) -> Self {
        NodeType::Function(f)
    }
}

impl From<ClassType> for NodeType {
    fn from(class: ClassType) -> Self {
        NodeType::Class(class)
    }
}

/// Build a descriptor from a type, properties and trailing children.
pub fn h<I>(ty: impl Into<NodeType>, props: Props, children: I) -> Node
where
    I: IntoIterator,
    I::Item: Into<Child>,
{
    NodeBuilder::new(ty.into(), props.children(children)).build()
}

/// Build a descriptor whose children travel inside `props`, with the key
/// passed separately.
pub fn jsx(ty: impl Into<NodeType>, mut props: Props, key: Option<Key>) -> Node {
    if key.is_some() {
        props.key = key;
    }
    NodeBuilder::new(ty.into(), props).build()
}

/// Fluent descriptor builder.
///
/// ```rust
/// use lumen_core::element;
///
/// let node = element("button")
///     .attr("className", "primary")
///     .on("click", |_| {})
///     .child("Save")
///     .build();
/// assert_eq!(node.tag(), Some("button"));
/// ```
#[derive(Clone)]
pub struct NodeBuilder {
    ty: NodeType,
    props: Props,
}

/// Start an element descriptor.
pub fn element(tag: &str) -> NodeBuilder {
    NodeBuilder::new(NodeType::from(tag), Props::new())
}

/// Start a function component descriptor.
pub fn component(f: ComponentFn) -> NodeBuilder {
    NodeBuilder::new(NodeType::Function(f), Props::new())
}

/// Start a class component descriptor.
pub fn class<T: Component + 'static>() -> NodeBuilder {
    NodeBuilder::new(NodeType::class::<T>(), Props::new())
}

/// A fragment of children.
pub fn fragment<I>(children: I) -> Node
where
    I: IntoIterator,
    I::Item: Into<Child>,
{
    h(NodeType::Fragment, Props::new(), children)
}

/// A text descriptor.
pub fn text(text: impl Into<Rc<str>>) -> Node {
    Node::text(text)
}

impl NodeBuilder {
    fn new(ty: NodeType, props: Props) -> Self {
        Self { ty, props }
    }

    /// Set an attribute or component property.
    pub fn attr(mut self, name: &str, value: impl Into<Prop>) -> Self {
        self.props = self.props.set(name, value);
        self
    }

    /// Alias of [`attr`](Self::attr), reads better on components.
    pub fn prop(self, name: &str, value: impl Into<Prop>) -> Self {
        self.attr(name, value)
    }

    /// Set a function-valued property.
    pub fn lazy<F>(mut self, name: &str, f: F) -> Self
    where
        F: Fn() -> Value + 'static,
    {
        self.props = self.props.lazy(name, f);
        self
    }

    /// Bind an event handler.
    pub fn on<F>(mut self, event: &str, f: F) -> Self
    where
        F: Fn(&Event) + 'static,
    {
        self.props = self.props.on(event, f);
        self
    }

    /// Bind an existing listener, keeping the native binding across renders
    /// that pass the same `Rc`.
    pub fn listener(mut self, event: &str, listener: Listener) -> Self {
        self.props = self.props.listener(event, listener);
        self
    }

    /// Set an inline style property.
    pub fn style(mut self, name: &str, value: impl Into<StyleValue>) -> Self {
        self.props = self.props.style(name, value);
        self
    }

    /// Set a function-valued inline style property.
    pub fn lazy_style<F>(mut self, name: &str, f: F) -> Self
    where
        F: Fn() -> Value + 'static,
    {
        self.props = self.props.lazy_style(name, f);
        self
    }

    /// Receive the DOM node in `target.current`.
    pub fn node_ref(mut self, target: &Obj) -> Self {
        self.props = self.props.node_ref(target);
        self
    }

    /// Set the explicit key.
    pub fn key(mut self, key: impl Into<Key>) -> Self {
        self.props = self.props.key(key);
        self
    }

    /// Append a child.
    pub fn child(mut self, child: impl Into<Child>) -> Self {
        self.props = self.props.child(child);
        self
    }

    /// Append several children.
    pub fn children<I>(mut self, children: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Child>,
    {
        self.props = self.props.children(children);
        self
    }

    /// Finish the descriptor.
    pub fn build(self) -> Node {
        let props = self.props;
        match self.ty {
            NodeType::Tag(tag) => Node::Element(Rc::new(ElementNode { tag, props })),
            NodeType::Function(func) => Node::Component(Rc::new(ComponentNode { func, props })),
            NodeType::Class(class) => Node::Class(Rc::new(ClassNode { class, props })),
            NodeType::Fragment => Node::Fragment(Rc::new(FragmentNode { props })),
        }
    }
}

impl From<NodeBuilder> for Node {
    fn from(builder: NodeBuilder) -> Self {
        builder.build()
    }
}

impl From<NodeBuilder> for Child {
    fn from(builder: NodeBuilder) -> Self {
        Child::Node(builder.build())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use crate::reactive::Runtime;

    fn nothing(_: &Runtime, _: &Obj) -> Result<Option<Node>> {
        Ok(None)
    }

    #[test]
    fn h_and_builder_agree() {
        let a = h("li", Props::new().key("k").set("title", "t"), ["x"]);
        let b = element("li").key("k").attr("title", "t").child("x").build();
        assert_eq!(a.tag(), b.tag());
        assert_eq!(a.key(), b.key());
        match (&a, &b) {
            (Node::Element(a), Node::Element(b)) => {
                assert_eq!(a.props.children.len(), b.props.children.len());
                assert!(a.props.get("title").unwrap().same(b.props.get("title").unwrap()));
            }
            _ => panic!("expected elements"),
        }
    }

    #[test]
    fn jsx_key_overrides_props() {
        let node = jsx(
            NodeType::Function(nothing),
            Props::new().key("a").child("c"),
            Some(Key::from("b")),
        );
        assert_eq!(node.key().map(Key::as_str), Some("b"));
        assert!(matches!(node, Node::Component(_)));
    }

    #[test]
    fn fragments_and_text() {
        let node = fragment([text("a"), text("b")]);
        match node {
            Node::Fragment(f) => assert_eq!(f.props.children.len(), 2),
            _ => panic!("expected a fragment"),
        }
        assert_eq!(format!("{:?}", text("hi")), "\"hi\"");
    }
}
