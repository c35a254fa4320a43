//! Events and listeners.

use std::fmt;
use std::rc::Rc;

use super::DomId;

/// A native event listener.
///
/// Listeners are compared by reference: re-rendering with the same `Rc`
/// leaves the bound listener alone, a new `Rc` rebinds it.
pub type Listener = Rc<dyn Fn(&Event)>;

/// Wrap a closure as a [`Listener`].
pub fn listener<F>(f: F) -> Listener
where
    F: Fn(&Event) + 'static,
{
    Rc::new(f)
}

/// An event delivered to listeners by [`Document::dispatch_event`](super::Document::dispatch_event).
#[derive(Clone, PartialEq, Eq)]
pub struct Event {
    /// Event type, e.g. `"click"`.
    pub kind: Rc<str>,
    /// Node the event was dispatched on.
    pub target: DomId,
    /// Node whose listener is currently running.
    pub current_target: DomId,
}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("kind", &self.kind)
            .field("target", &self.target)
            .field("current_target", &self.current_target)
            .finish()
    }
}

/// Map a property name such as `onClick` to its event type (`click`).
pub(crate) fn event_type(prop: &str) -> Option<String> {
    let rest = prop.strip_prefix("on")?;
    if rest.is_empty() {
        return None;
    }
    Some(rest.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_type_strips_prefix() {
        assert_eq!(event_type("onClick").as_deref(), Some("click"));
        assert_eq!(event_type("oninput").as_deref(), Some("input"));
        assert_eq!(event_type("on"), None);
        assert_eq!(event_type("class"), None);
    }
}
