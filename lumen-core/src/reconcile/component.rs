//! Component Instances
//!
//! A component instance is a dependee whose computation is "render, then
//! reconcile the result against the current child". Everything the render
//! reads (props, state, dynamic children) becomes a dependency, so a write
//! to any of it re-renders the component from the flush, independently of
//! its parent.
//!
//! # Props
//!
//! Props live in a shallow reactive object owned by the instance. When the
//! parent re-renders, the new descriptor's properties are compared with the
//! previous ones entry by entry. If nothing changed the render is skipped.
//! Otherwise the changed entries are written to the props object, which
//! dirties them for any effect reading them, and the component renders
//! right away. The write epochs keep the flush from rendering it a second
//! time for the same change.
//!
//! Children are handed over under the `children` property.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use tracing::trace;

use super::{Instance, Position};
use crate::error::Result;
use crate::node::{
    ChildList, ClassNode, ClassType, Component, ComponentFn, ComponentNode, Key, Node, Prop, Props,
};
use crate::reactive::{immutable, Dependee, DependeeId, DependeeKind, Effect, Obj, Runtime, Value};

enum Renderer {
    Function(ComponentFn),
    Class {
        class: ClassType,
        state: RefCell<Box<dyn Component>>,
    },
}

pub(crate) struct ComponentInstance {
    id: DependeeId,
    renderer: Renderer,
    key: Option<Key>,
    props: Obj,
    descriptor: RefCell<Props>,
    child: RefCell<Option<Instance>>,
    position: Position,
    /// Effects stopped at release, cleaned up at destroy.
    stopped: RefCell<Vec<Rc<Effect>>>,
    alive: Cell<bool>,
}

impl ComponentInstance {
    pub fn create_function(rt: &Runtime, node: &Rc<ComponentNode>) -> Result<Rc<Self>> {
        let func = node.func;
        Self::create(rt, &node.props, move |_| Renderer::Function(func))
    }

    pub fn create_class(rt: &Runtime, node: &Rc<ClassNode>) -> Result<Rc<Self>> {
        let class = node.class.clone();
        let instance = Self::create(rt, &node.props, move |props| Renderer::Class {
            state: RefCell::new(class.construct(props)),
            class,
        })?;
        let mounted = instance.clone();
        rt.scheduler()
            .queue_post_mount(Box::new(move |rt| mounted.did_mount(rt)));
        Ok(instance)
    }

    fn create(
        rt: &Runtime,
        props: &Props,
        renderer: impl FnOnce(&Obj) -> Renderer,
    ) -> Result<Rc<Self>> {
        let id = rt.next_dependee_id();
        let fields = props
            .entries
            .iter()
            .map(|(name, prop)| (name.clone(), prop_value(prop)))
            .chain(children_value(props).map(|v| (Rc::from("children"), v)))
            .collect();
        let props_obj = rt.create_record(fields);
        let renderer = rt.untracked(|| renderer(&props_obj));
        let instance = Rc::new(Self {
            id,
            renderer,
            key: props.key.clone(),
            props: props_obj,
            descriptor: RefCell::new(props.clone()),
            child: RefCell::new(None),
            position: Position::default(),
            stopped: RefCell::new(Vec::new()),
            alive: Cell::new(true),
        });
        rt.register_dependee(id, DependeeKind::Component, instance.clone());
        trace!(?id, component = instance.name(), "component created");
        instance.update(rt)?;
        Ok(instance)
    }

    fn name(&self) -> &'static str {
        match &self.renderer {
            Renderer::Function(_) => "fn",
            Renderer::Class { class, .. } => class.name(),
        }
    }

    pub fn child(&self) -> Option<Instance> {
        self.child.borrow().clone()
    }

    pub fn position(&self) -> &Position {
        &self.position
    }

    pub fn reuse_function(&self, rt: &Runtime, node: &Rc<ComponentNode>) -> Result<bool> {
        let Renderer::Function(func) = &self.renderer else {
            return Ok(false);
        };
        if !std::ptr::fn_addr_eq(*func, node.func) || self.key != node.props.key {
            return Ok(false);
        }
        self.receive(rt, &node.props)?;
        Ok(true)
    }

    pub fn reuse_class(&self, rt: &Runtime, node: &Rc<ClassNode>) -> Result<bool> {
        let Renderer::Class { class, .. } = &self.renderer else {
            return Ok(false);
        };
        if *class != node.class || self.key != node.props.key {
            return Ok(false);
        }
        self.receive(rt, &node.props)?;
        Ok(true)
    }

    /// Take new props from the parent. Renders only if an entry changed.
    fn receive(&self, rt: &Runtime, next: &Props) -> Result<()> {
        let changes = changed_props(&self.descriptor.borrow(), next);
        if changes.is_empty() {
            trace!(id = ?self.id, "props unchanged, render skipped");
            return Ok(());
        }
        *self.descriptor.borrow_mut() = next.clone();
        for (name, value) in changes {
            match value {
                Some(value) => self.props.set(&name, value),
                None => {
                    self.props.delete(&name);
                }
            }
        }
        self.update(rt)
    }

    /// Render and reconcile the result against the current child.
    fn update(&self, rt: &Runtime) -> Result<()> {
        if !self.alive.get() {
            return Ok(());
        }
        rt.tracked_execute(self.id, || {
            let next = self.render(rt)?;
            self.reconcile(rt, next)
        })
    }

    fn render(&self, rt: &Runtime) -> Result<Option<Node>> {
        trace!(id = ?self.id, component = self.name(), "render");
        match &self.renderer {
            Renderer::Function(func) => {
                let _frame = rt.hooks().enter(self.id);
                func(rt, &self.props)
            }
            Renderer::Class { state, .. } => state.borrow_mut().render(rt, &self.props),
        }
    }

    fn reconcile(&self, rt: &Runtime, next: Option<Node>) -> Result<()> {
        let current = self.child();
        if let (Some(current), Some(node)) = (&current, &next) {
            if current.reuse(rt, node)? {
                return Ok(());
            }
        }

        let fresh = next.as_ref().map(|node| Instance::create(rt, node)).transpose()?;
        let parent = self.position.parent();
        if let Some(fresh) = &fresh {
            fresh.set_position(parent, self.position.next());
            if let Some(parent) = parent {
                let before = current
                    .as_ref()
                    .and_then(Instance::first_dom)
                    .or_else(|| self.position.anchor());
                fresh.insert(rt.document(), parent, before);
            }
        }
        if let Some(old) = current {
            old.unmount(rt);
        }
        *self.child.borrow_mut() = fresh;
        Ok(())
    }

    fn did_mount(&self, rt: &Runtime) -> Result<()> {
        if !self.alive.get() {
            return Ok(());
        }
        match &self.renderer {
            Renderer::Class { state, .. } => state.borrow_mut().component_did_mount(rt),
            Renderer::Function(_) => Ok(()),
        }
    }

    /// Run the unmount callback while the DOM is still attached, then leave
    /// the graph, stop hook effects and release the subtree.
    pub fn release(&self, rt: &Runtime) {
        if !self.alive.replace(false) {
            return;
        }
        if let Renderer::Class { state, .. } = &self.renderer {
            rt.untracked(|| state.borrow_mut().component_will_unmount(rt));
        }
        rt.release_dependee(self.id);
        *self.stopped.borrow_mut() = rt.hooks().release(rt, self.id);
        if let Some(child) = self.child() {
            child.release(rt);
        }
    }

    /// Effect cleanups, then the subtree.
    pub fn destroy(&self, rt: &Runtime) {
        for effect in self.stopped.take() {
            effect.run_cleanup();
        }
        if let Some(child) = self.child() {
            child.destroy(rt);
        }
        trace!(id = ?self.id, component = self.name(), "component destroyed");
    }
}

impl Dependee for ComponentInstance {
    fn run(&self, rt: &Runtime) -> Result<()> {
        self.update(rt)
    }
}

/// Value stored in the props object for a descriptor property.
fn prop_value(prop: &Prop) -> Value {
    match prop {
        Prop::Value(value) => value.clone(),
        Prop::Ref(target) => Value::Object(target.clone()),
        Prop::Lazy(f) => immutable(f.clone()),
        Prop::Listener(l) => immutable(l.clone()),
        Prop::Style(style) => immutable(style.clone()),
    }
}

fn children_value(props: &Props) -> Option<Value> {
    if props.children.is_empty() {
        None
    } else {
        Some(immutable(ChildList(props.children.clone())))
    }
}

/// Entries to write into the props object: a new value, or `None` to
/// delete.
fn changed_props(previous: &Props, next: &Props) -> Vec<(Rc<str>, Option<Value>)> {
    let mut changes = Vec::new();
    for (name, prop) in &next.entries {
        if previous.entries.get(name).is_some_and(|p| p.same(prop)) {
            continue;
        }
        changes.push((name.clone(), Some(prop_value(prop))));
    }
    for name in previous.entries.keys() {
        if !next.entries.contains_key(name) {
            changes.push((name.clone(), None));
        }
    }
    if !previous.children.is_empty() || !next.children.is_empty() {
        changes.push((Rc::from("children"), children_value(next)));
    }
    changes
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use serde_json::json;

    use super::*;
    use crate::node::{component, element, Child};

    thread_local! {
        static RENDERS: Cell<usize> = const { Cell::new(0) };
    }

    fn counted(_rt: &Runtime, props: &Obj) -> Result<Option<Node>> {
        RENDERS.with(|r| r.set(r.get() + 1));
        Ok(Some(element("span").child(props.get("label")).build()))
    }

    fn renders() -> usize {
        RENDERS.with(Cell::get)
    }

    fn create(rt: &Runtime, node: Node) -> Rc<ComponentInstance> {
        match node {
            Node::Component(c) => ComponentInstance::create_function(rt, &c).unwrap(),
            _ => panic!("expected a function component"),
        }
    }

    fn receive(rt: &Runtime, instance: &ComponentInstance, node: Node) -> bool {
        match node {
            Node::Component(c) => instance.reuse_function(rt, &c).unwrap(),
            _ => panic!("expected a function component"),
        }
    }

    #[test]
    fn identical_props_skip_the_render() {
        let rt = Runtime::new();
        let before = renders();
        let instance = create(&rt, component(counted).prop("label", "a").build());
        assert_eq!(renders(), before + 1);

        assert!(receive(&rt, &instance, component(counted).prop("label", "a").build()));
        assert_eq!(renders(), before + 1);

        assert!(receive(&rt, &instance, component(counted).prop("label", "b").build()));
        assert_eq!(renders(), before + 2);
        let dom = instance.child().and_then(|c| c.first_dom()).unwrap();
        assert_eq!(rt.document().text_content(dom), "b");
    }

    #[test]
    fn parent_driven_render_is_not_repeated_by_the_flush() {
        let rt = Runtime::new();
        let instance = create(&rt, component(counted).prop("label", "a").build());
        let before = renders();
        receive(&rt, &instance, component(counted).prop("label", "b").build());
        rt.run_microtasks().unwrap();
        assert_eq!(renders(), before + 1);
    }

    #[test]
    fn state_reads_rerender_the_component() {
        fn reader(_rt: &Runtime, props: &Obj) -> Result<Option<Node>> {
            let state = props.get("state");
            let n = state.as_obj().map(|s| s.get("n")).unwrap_or_default();
            Ok(Some(element("b").child(n).build()))
        }
        let rt = Runtime::new();
        let state = rt.create_state(json!({ "n": 1 }));
        let instance = create(&rt, component(reader).prop("state", &state).build());
        let dom = instance.child().and_then(|c| c.first_dom()).unwrap();

        state.set("n", 2);
        rt.run_microtasks().unwrap();
        assert_eq!(rt.document().text_content(dom), "2");
    }

    #[test]
    fn children_arrive_as_a_prop() {
        fn wrapper(_rt: &Runtime, props: &Obj) -> Result<Option<Node>> {
            Ok(Some(element("div").child(Child::from(props.get("children"))).build()))
        }
        let rt = Runtime::new();
        let instance = create(&rt, component(wrapper).child("x").child("y").build());
        let dom = instance.child().and_then(|c| c.first_dom()).unwrap();
        assert_eq!(rt.document().inner_html(dom), "xy");
    }

    #[test]
    fn identity_mismatch_is_not_reused() {
        fn other(_rt: &Runtime, _props: &Obj) -> Result<Option<Node>> {
            Ok(None)
        }
        let rt = Runtime::new();
        let instance = create(&rt, component(counted).prop("label", "a").build());
        assert!(!receive(&rt, &instance, component(other).build()));
        assert!(!receive(&rt, &instance, component(counted).key("k").build()));
    }

    #[test]
    fn changed_props_lists_updates_and_removals() {
        let previous = Props::new().set("a", 1).set("b", 2);
        let next = Props::new().set("a", 1).set("c", 3);
        let changes = changed_props(&previous, &next);
        let names: Vec<_> = changes.iter().map(|(n, v)| (&**n, v.is_some())).collect();
        assert_eq!(names, vec![("c", true), ("b", false)]);
    }

    #[test]
    fn release_leaves_the_graph() {
        let rt = Runtime::new();
        let instance = create(&rt, component(counted).prop("label", "a").build());
        assert_eq!(rt.dependee_count(), 1);
        instance.release(&rt);
        instance.release(&rt);
        assert_eq!(rt.dependee_count(), 0);
    }
}
