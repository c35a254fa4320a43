//! Rendering entry point.
//!
//! [`Runtime::render`] mounts a descriptor tree into a container element.
//! Rendering into the same container again reconciles against the tree
//! already there, so a host can re-render from the top without losing
//! component state or DOM identity.

use std::fmt;
use std::rc::Weak;

use tracing::debug;

use crate::dom::DomId;
use crate::error::{Error, Result};
use crate::node::Node;
use crate::reactive::{Runtime, RuntimeInner};
use crate::reconcile::Instance;

/// A tree mounted by [`Runtime::render`].
pub struct Root {
    rt: Weak<RuntimeInner>,
    container: DomId,
}

impl Runtime {
    /// Render `node` into `container`.
    ///
    /// The first call creates the tree and appends it to the container.
    /// Later calls for the same container update it in place when the root
    /// descriptor has the same identity, and replace it otherwise. Mount
    /// work (refs, first effect runs, `component_did_mount`) has run by the
    /// time this returns.
    pub fn render(&self, node: impl Into<Node>, container: DomId) -> Result<Root> {
        let node = node.into();
        let existing = self.roots().borrow().get(&container).cloned();
        debug!(?container, update = existing.is_some(), "render");

        let instance = match existing {
            Some(current) if current.reuse(self, &node)? => current,
            existing => {
                let fresh = Instance::create(self, &node)?;
                fresh.set_position(Some(container), None);
                let before = existing.as_ref().and_then(Instance::first_dom);
                fresh.insert(self.document(), container, before);
                if let Some(old) = existing {
                    old.unmount(self);
                }
                fresh
            }
        };
        self.roots().borrow_mut().insert(container, instance);
        self.scheduler().run_pass(self)?;
        Ok(Root {
            rt: self.downgrade(),
            container,
        })
    }
}

impl Root {
    /// The container element.
    pub fn container(&self) -> DomId {
        self.container
    }

    /// Unmount the tree. Unmount callbacks and effect cleanups have run by
    /// the time this returns. Unmounting twice is a no-op.
    pub fn unmount(&self) -> Result<()> {
        let rt = Runtime::from_weak(&self.rt).ok_or(Error::RuntimeDropped)?;
        let removed = rt.roots().borrow_mut().remove(&self.container);
        if let Some(instance) = removed {
            debug!(container = ?self.container, "unmount");
            instance.unmount(&rt);
            rt.scheduler().run_pass(&rt)?;
        }
        Ok(())
    }
}

impl fmt::Debug for Root {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Root")
            .field("container", &self.container)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::node::{element, text};

    #[test]
    fn rendering_twice_updates_in_place() {
        let rt = Runtime::new();
        let doc = rt.document();
        let container = doc.create_element("div");

        rt.render(element("p").child("a"), container).unwrap();
        let p = doc.children(container)[0];
        rt.render(element("p").child("b"), container).unwrap();
        assert_eq!(doc.children(container), vec![p]);
        assert_eq!(doc.inner_html(container), "<p>b</p>");

        rt.render(text("plain"), container).unwrap();
        assert_eq!(doc.inner_html(container), "plain");
        assert!(!doc.contains(p));
    }

    #[test]
    fn unmount_empties_the_container() {
        let rt = Runtime::new();
        let doc = rt.document();
        let container = doc.create_element("div");
        let state = rt.create_state(json!({ "title": "t" }));
        let s = state.clone();
        let root = rt
            .render(element("p").lazy("title", move || s.get("title")), container)
            .unwrap();
        assert_eq!(rt.dependee_count(), 1);

        root.unmount().unwrap();
        root.unmount().unwrap();
        assert_eq!(doc.inner_html(container), "");
        assert_eq!(rt.dependee_count(), 0);
    }

    #[test]
    fn roots_do_not_keep_the_runtime_alive() {
        let rt = Runtime::new();
        let container = rt.document().create_element("div");
        let root = rt.render(text("x"), container).unwrap();
        drop(rt);
        assert!(matches!(root.unmount(), Err(Error::RuntimeDropped)));
    }
}
