//! Component contracts.
//!
//! Function components are plain `fn` items; their identity is the function
//! pointer. Class components implement [`Component`] and are identified by
//! their Rust type.

use std::any::{type_name, TypeId};
use std::fmt;

use super::Node;
use crate::error::Result;
use crate::reactive::{Obj, Runtime};

/// A function component. Receives the runtime (for hooks) and its props.
pub type ComponentFn = fn(&Runtime, &Obj) -> Result<Option<Node>>;

/// A stateful component with lifecycle callbacks.
///
/// ```rust
/// use lumen_core::{element, Component, Node, Obj, Result, Runtime};
///
/// struct Greeting;
///
/// impl Component for Greeting {
///     fn create(_props: &Obj) -> Self {
///         Greeting
///     }
///
///     fn render(&mut self, _rt: &Runtime, props: &Obj) -> Result<Option<Node>> {
///         Ok(Some(element("p").child(props.get("name")).build()))
///     }
/// }
/// ```
pub trait Component {
    /// Construct the instance from its first props.
    fn create(props: &Obj) -> Self
    where
        Self: Sized;

    /// Describe what to render. Reads of reactive state are tracked.
    fn render(&mut self, rt: &Runtime, props: &Obj) -> Result<Option<Node>>;

    /// Called once, after the first mount, from the post-mount queue.
    fn component_did_mount(&mut self, _rt: &Runtime) -> Result<()> {
        Ok(())
    }

    /// Called once, before the instance is torn down.
    fn component_will_unmount(&mut self, _rt: &Runtime) {}
}

/// Runtime identity of a class component type.
#[derive(Clone, Copy)]
pub struct ClassType {
    type_id: TypeId,
    name: &'static str,
    construct: fn(&Obj) -> Box<dyn Component>,
}

fn construct<T: Component + 'static>(props: &Obj) -> Box<dyn Component> {
    Box::new(T::create(props))
}

impl ClassType {
    /// The class type of `T`.
    pub fn of<T: Component + 'static>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            name: type_name::<T>(),
            construct: construct::<T>,
        }
    }

    /// Type name, for diagnostics.
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub(crate) fn construct(&self, props: &Obj) -> Box<dyn Component> {
        (self.construct)(props)
    }
}

impl PartialEq for ClassType {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl Eq for ClassType {}

impl fmt::Debug for ClassType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ClassType({})", self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct A;
    struct B;

    impl Component for A {
        fn create(_: &Obj) -> Self {
            A
        }
        fn render(&mut self, _: &Runtime, _: &Obj) -> Result<Option<Node>> {
            Ok(None)
        }
    }

    impl Component for B {
        fn create(_: &Obj) -> Self {
            B
        }
        fn render(&mut self, _: &Runtime, _: &Obj) -> Result<Option<Node>> {
            Ok(Some(Node::text("b")))
        }
    }

    #[test]
    fn class_identity_is_the_type() {
        assert_eq!(ClassType::of::<A>(), ClassType::of::<A>());
        assert_ne!(ClassType::of::<A>(), ClassType::of::<B>());
        assert!(ClassType::of::<B>().name().ends_with("B"));
    }

    #[test]
    fn construct_builds_the_right_type() {
        let rt = Runtime::new();
        let props = rt.create_shallow(serde_json::json!({}));
        let mut instance = ClassType::of::<B>().construct(&props);
        let rendered = instance.render(&rt, &props).unwrap();
        assert!(matches!(rendered, Some(Node::Text(t)) if &*t == "b"));
    }
}
