//! Lazy Properties
//!
//! A function-valued element property or style entry is its own dependee.
//! It runs once when the element is created and again whenever something
//! it read changes, writing straight to the DOM node. The component that
//! rendered the element never depends on what the function reads, so a
//! lazy update never re-renders it.

use std::cell::RefCell;
use std::rc::Rc;

use tracing::trace;

use super::element::{write_attribute, write_style};
use crate::dom::DomId;
use crate::error::Result;
use crate::node::LazyFn;
use crate::reactive::{Dependee, DependeeId, DependeeKind, Runtime, Value};

/// What a lazy update writes to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum LazyTarget {
    Attribute(Rc<str>),
    Style(Rc<str>),
}

pub(crate) struct LazyUpdate {
    id: DependeeId,
    dom: DomId,
    target: LazyTarget,
    compute: LazyFn,
    current: RefCell<Option<Value>>,
}

impl LazyUpdate {
    /// Register the update and apply it immediately.
    pub fn create(rt: &Runtime, dom: DomId, target: LazyTarget, compute: LazyFn) -> Rc<Self> {
        let id = rt.next_dependee_id();
        let kind = match target {
            LazyTarget::Attribute(_) => DependeeKind::LazyProperty,
            LazyTarget::Style(_) => DependeeKind::LazyStyle,
        };
        let update = Rc::new(Self {
            id,
            dom,
            target,
            compute,
            current: RefCell::new(None),
        });
        rt.register_dependee(id, kind, update.clone());
        update.apply(rt);
        update
    }

    fn apply(&self, rt: &Runtime) {
        let value = rt.tracked_execute(self.id, || (self.compute)());
        let unchanged = self
            .current
            .borrow()
            .as_ref()
            .is_some_and(|current| current.same(&value));
        if unchanged {
            return;
        }
        trace!(id = ?self.id, target = ?self.target, "lazy update");
        let doc = rt.document();
        match &self.target {
            LazyTarget::Attribute(name) => write_attribute(doc, self.dom, name, &value),
            LazyTarget::Style(name) => write_style(doc, self.dom, name, &value),
        }
        *self.current.borrow_mut() = Some(value);
    }

    /// Stop reacting. The last written value stays on the node.
    pub fn release(&self, rt: &Runtime) {
        rt.release_dependee(self.id);
    }
}

impl Dependee for LazyUpdate {
    fn run(&self, rt: &Runtime) -> Result<()> {
        self.apply(rt);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn applies_on_create_and_on_change() {
        let rt = Runtime::new();
        let doc = rt.document();
        let dom = doc.create_element("div");
        let state = rt.create_state(json!({ "title": "a" }));

        let s = state.clone();
        let update = LazyUpdate::create(
            &rt,
            dom,
            LazyTarget::Attribute("title".into()),
            Rc::new(move || s.get("title")),
        );
        assert_eq!(doc.attribute(dom, "title").as_deref(), Some("a"));

        state.set("title", "b");
        rt.flush().unwrap();
        assert_eq!(doc.attribute(dom, "title").as_deref(), Some("b"));

        update.release(&rt);
        state.set("title", "c");
        rt.flush().unwrap();
        assert_eq!(doc.attribute(dom, "title").as_deref(), Some("b"));
    }

    #[test]
    fn style_targets_write_styles() {
        let rt = Runtime::new();
        let doc = rt.document();
        let dom = doc.create_element("div");
        let state = rt.create_state(json!({ "color": "red" }));

        let s = state.clone();
        let _update = LazyUpdate::create(
            &rt,
            dom,
            LazyTarget::Style("color".into()),
            Rc::new(move || s.get("color")),
        );
        assert_eq!(doc.style(dom, "color").as_deref(), Some("red"));

        state.set("color", "blue");
        rt.flush().unwrap();
        assert_eq!(doc.style(dom, "color").as_deref(), Some("blue"));
    }

    #[test]
    fn recomputing_the_same_value_skips_the_write() {
        let rt = Runtime::new();
        let doc = rt.document();
        let dom = doc.create_element("div");
        let state = rt.create_state(json!({ "n": 1 }));

        let s = state.clone();
        let _update = LazyUpdate::create(
            &rt,
            dom,
            LazyTarget::Attribute("data-odd".into()),
            Rc::new(move || {
                let n = s.get("n").as_f64().unwrap_or(0.0);
                Value::from(n % 2.0 == 1.0)
            }),
        );
        doc.reset_stats();
        state.set("n", 3);
        rt.flush().unwrap();
        assert_eq!(doc.stats().attribute_writes, 0);
    }
}
