//! Reactive Store
//!
//! Wrapped objects and arrays live in an arena owned by the runtime and are
//! addressed by [`ObjectId`]. Application code holds [`Obj`] handles.
//!
//! # How It Works
//!
//! Every handle operation goes through the runtime:
//!
//! 1. A read records the [`StateKey`] it touched into the innermost tracking
//!    frame. Enumeration, membership checks and object lengths record the
//!    whole-object key instead of a property key.
//!
//! 2. A write compares the new value with the stored one using
//!    [`Value::same`]. Equal writes are dropped. Changed writes mark the key
//!    dirty, which schedules a flush on the microtask queue. Array length
//!    changes are always marked dirty.
//!
//! 3. Adding or removing a property also dirties the whole-object key, so
//!    computations that enumerated the object re-run.
//!
//! On arrays, canonical numeric names (`"0"`, `"12"`) address elements and
//! writing `"length"` truncates or pads the array.
//!
//! # Wrapping
//!
//! JSON handed to [`Runtime::create_state`] is wrapped recursively: nested
//! objects and arrays become their own records. Storing an existing [`Obj`]
//! stores the handle, which is what makes cyclic state graphs safe: nothing
//! is ever wrapped twice.
//!
//! Shallow records (component props, refs, hook state) keep nested JSON as
//! an [`Immutable`](super::Immutable) payload instead of wrapping it.

use std::collections::HashSet;
use std::fmt;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;
use serde_json::{Map, Number};
use tracing::warn;

use super::key::{KeyInterner, ObjectId, PropertyKey, StateKey};
use super::runtime::{Runtime, RuntimeInner};
use super::value::{immutable, Value};
use crate::error::{Error, Result};

enum Slot {
    Object(IndexMap<PropertyKey, Value>),
    Array(Vec<Value>),
}

struct Record {
    slot: Slot,
    shallow: bool,
}

/// Outcome of a store write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WriteOutcome {
    /// The stored value was already identical.
    Unchanged,
    /// An existing property changed.
    Changed,
    /// A new property was created.
    Added,
}

/// The arena of wrapped records plus the property name table.
pub(crate) struct Store {
    records: Vec<Record>,
    interner: KeyInterner,
    length: PropertyKey,
}

impl Default for Store {
    fn default() -> Self {
        let mut interner = KeyInterner::default();
        let length = interner.intern("length");
        Self {
            records: Vec::new(),
            interner,
            length,
        }
    }
}

impl Store {
    /// Key used for array lengths.
    pub fn length_key(&self) -> PropertyKey {
        self.length
    }

    pub fn intern(&mut self, name: &str) -> PropertyKey {
        self.interner.intern(name)
    }

    pub fn name(&self, key: PropertyKey) -> Option<Rc<str>> {
        self.interner.name(key)
    }

    fn alloc(&mut self, slot: Slot, shallow: bool) -> ObjectId {
        let id = ObjectId(self.records.len() as u32);
        self.records.push(Record { slot, shallow });
        id
    }

    fn record(&self, id: ObjectId) -> Option<&Record> {
        self.records.get(id.0 as usize)
    }

    fn record_mut(&mut self, id: ObjectId) -> Option<&mut Record> {
        self.records.get_mut(id.0 as usize)
    }

    /// Wrap a JSON container. Scalars are wrapped as `{ "value": x }`.
    pub fn wrap_json(
        &mut self,
        json: serde_json::Value,
        shallow: bool,
        owner: &Weak<RuntimeInner>,
    ) -> ObjectId {
        match json {
            serde_json::Value::Object(map) => {
                let mut fields = IndexMap::with_capacity(map.len());
                for (name, v) in map {
                    let key = self.intern(&name);
                    let value = self.json_to_value(v, shallow, owner);
                    fields.insert(key, value);
                }
                self.alloc(Slot::Object(fields), shallow)
            }
            serde_json::Value::Array(items) => {
                let items = items
                    .into_iter()
                    .map(|v| self.json_to_value(v, shallow, owner))
                    .collect();
                self.alloc(Slot::Array(items), shallow)
            }
            scalar => {
                let key = self.intern("value");
                let mut fields = IndexMap::new();
                fields.insert(key, scalar_to_value(scalar));
                self.alloc(Slot::Object(fields), shallow)
            }
        }
    }

    /// Allocate a shallow object from already converted values.
    pub fn alloc_record(&mut self, fields: Vec<(Rc<str>, Value)>) -> ObjectId {
        let fields = fields
            .into_iter()
            .map(|(name, value)| (self.intern(&name), value))
            .collect();
        self.alloc(Slot::Object(fields), true)
    }

    /// Convert a JSON value for storage. Containers are wrapped unless the
    /// target is shallow.
    pub fn json_to_value(
        &mut self,
        json: serde_json::Value,
        shallow: bool,
        owner: &Weak<RuntimeInner>,
    ) -> Value {
        match json {
            container @ (serde_json::Value::Object(_) | serde_json::Value::Array(_)) => {
                if shallow {
                    immutable(container)
                } else {
                    let id = self.wrap_json(container, false, owner);
                    Value::Object(Obj {
                        id,
                        rt: owner.clone(),
                    })
                }
            }
            scalar => scalar_to_value(scalar),
        }
    }

    pub fn is_shallow(&self, id: ObjectId) -> bool {
        self.record(id).is_some_and(|r| r.shallow)
    }

    pub fn is_array(&self, id: ObjectId) -> bool {
        matches!(self.record(id).map(|r| &r.slot), Some(Slot::Array(_)))
    }

    pub fn read(&self, id: ObjectId, key: PropertyKey) -> Value {
        match self.record(id).map(|r| &r.slot) {
            Some(Slot::Object(fields)) => fields.get(&key).cloned().unwrap_or_default(),
            Some(Slot::Array(items)) => match key.as_index() {
                Some(i) => items.get(i).cloned().unwrap_or_default(),
                None if key == self.length => Value::from(items.len()),
                None => Value::Undefined,
            },
            None => Value::Undefined,
        }
    }

    pub fn contains(&self, id: ObjectId, key: PropertyKey) -> bool {
        match self.record(id).map(|r| &r.slot) {
            Some(Slot::Object(fields)) => fields.contains_key(&key),
            Some(Slot::Array(items)) => match key.as_index() {
                Some(i) => i < items.len(),
                None => key == self.length,
            },
            None => false,
        }
    }

    pub fn write(&mut self, id: ObjectId, key: PropertyKey, value: Value) -> WriteOutcome {
        match self.record_mut(id).map(|r| &mut r.slot) {
            Some(Slot::Object(fields)) => match fields.get_mut(&key) {
                Some(slot) if slot.same(&value) => WriteOutcome::Unchanged,
                Some(slot) => {
                    *slot = value;
                    WriteOutcome::Changed
                }
                None => {
                    fields.insert(key, value);
                    WriteOutcome::Added
                }
            },
            Some(Slot::Array(items)) => {
                let Some(i) = key.as_index() else {
                    return WriteOutcome::Unchanged;
                };
                if i >= items.len() {
                    items.resize(i + 1, Value::Undefined);
                    items[i] = value;
                    return WriteOutcome::Added;
                }
                if items[i].same(&value) {
                    WriteOutcome::Unchanged
                } else {
                    items[i] = value;
                    WriteOutcome::Changed
                }
            }
            None => WriteOutcome::Unchanged,
        }
    }

    pub fn remove(&mut self, id: ObjectId, key: PropertyKey) -> bool {
        match self.record_mut(id).map(|r| &mut r.slot) {
            Some(Slot::Object(fields)) => fields.shift_remove(&key).is_some(),
            // Deleting an element leaves a hole; the length stays.
            Some(Slot::Array(items)) => match key.as_index() {
                Some(i) if i < items.len() => {
                    items[i] = Value::Undefined;
                    true
                }
                _ => false,
            },
            None => false,
        }
    }

    pub fn keys(&self, id: ObjectId) -> Vec<PropertyKey> {
        match self.record(id).map(|r| &r.slot) {
            Some(Slot::Object(fields)) => fields.keys().copied().collect(),
            Some(Slot::Array(items)) => (0..items.len()).map(PropertyKey::index).collect(),
            None => Vec::new(),
        }
    }

    /// Element count of an array, property count of an object.
    pub fn size(&self, id: ObjectId) -> usize {
        match self.record(id).map(|r| &r.slot) {
            Some(Slot::Object(fields)) => fields.len(),
            Some(Slot::Array(items)) => items.len(),
            None => 0,
        }
    }

    fn items_mut(&mut self, id: ObjectId) -> Option<&mut Vec<Value>> {
        match self.record_mut(id).map(|r| &mut r.slot) {
            Some(Slot::Array(items)) => Some(items),
            _ => None,
        }
    }
}

fn scalar_to_value(json: serde_json::Value) -> Value {
    match json {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(b),
        serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
        serde_json::Value::String(s) => Value::from(s),
        serde_json::Value::Array(_) | serde_json::Value::Object(_) => Value::Null,
    }
}

fn number_to_json(n: f64) -> serde_json::Value {
    if n.fract() == 0.0 && n.abs() < 9.0e15 {
        serde_json::Value::from(n as i64)
    } else {
        Number::from_f64(n).map_or(serde_json::Value::Null, serde_json::Value::Number)
    }
}

/// Handle to a wrapped object or array.
///
/// Handles are cheap to clone and compare by identity. A handle does not keep
/// its runtime alive; once the runtime is dropped, reads return
/// [`Value::Undefined`] and writes are ignored.
#[derive(Clone)]
pub struct Obj {
    pub(crate) id: ObjectId,
    pub(crate) rt: Weak<RuntimeInner>,
}

impl Obj {
    /// Identifier of the wrapped record.
    pub fn id(&self) -> ObjectId {
        self.id
    }

    fn runtime(&self) -> Option<Runtime> {
        let rt = Runtime::from_weak(&self.rt);
        if rt.is_none() {
            warn!(id = ?self.id, "state used after its runtime was dropped");
        }
        rt
    }

    /// Resolve a property name. On arrays, numeric names address elements.
    fn key_of(&self, rt: &Runtime, name: &str) -> PropertyKey {
        let mut store = rt.store_mut();
        if store.is_array(self.id) {
            if let Some(key) = PropertyKey::parse_index(name) {
                return key;
            }
        }
        store.intern(name)
    }

    /// Read a property.
    pub fn get(&self, name: &str) -> Value {
        let Some(rt) = self.runtime() else {
            return Value::Undefined;
        };
        let key = self.key_of(&rt, name);
        rt.track(StateKey::new(self.id, key));
        let value = rt.store().read(self.id, key);
        value
    }

    /// Write a property.
    pub fn set(&self, name: &str, value: impl Into<Value>) {
        let Some(rt) = self.runtime() else {
            return;
        };
        let key = self.key_of(&rt, name);
        self.write_key(&rt, key, value.into());
    }

    /// Write a property from JSON. Containers are wrapped, or kept opaque if
    /// this object is shallow.
    pub fn set_json(&self, name: &str, json: serde_json::Value) {
        let Some(rt) = self.runtime() else {
            return;
        };
        let value = {
            let mut store = rt.store_mut();
            let shallow = store.is_shallow(self.id);
            store.json_to_value(json, shallow, &self.rt)
        };
        let key = self.key_of(&rt, name);
        self.write_key(&rt, key, value);
    }

    fn write_key(&self, rt: &Runtime, key: PropertyKey, value: Value) {
        if key == rt.store().length_key() && self.is_array() {
            match value.as_f64() {
                Some(n) if n >= 0.0 && n.fract() == 0.0 => self.set_len(n as usize),
                _ => warn!(id = ?self.id, "ignoring non-integer array length"),
            }
            return;
        }
        let outcome = rt.store_mut().write(self.id, key, value);
        match outcome {
            WriteOutcome::Unchanged => {}
            WriteOutcome::Changed => rt.mark_dirty(StateKey::new(self.id, key)),
            WriteOutcome::Added => {
                rt.mark_dirty(StateKey::new(self.id, key));
                rt.mark_dirty(StateKey::whole(self.id));
                if key.as_index().is_some() {
                    let length = rt.store().length_key();
                    rt.mark_dirty(StateKey::new(self.id, length));
                }
            }
        }
    }

    /// Remove a property. Returns whether it existed.
    pub fn delete(&self, name: &str) -> bool {
        let Some(rt) = self.runtime() else {
            return false;
        };
        let key = self.key_of(&rt, name);
        let removed = rt.store_mut().remove(self.id, key);
        if removed {
            rt.mark_dirty(StateKey::new(self.id, key));
            rt.mark_dirty(StateKey::whole(self.id));
        }
        removed
    }

    /// Whether a property exists. Tracks the whole object.
    pub fn has(&self, name: &str) -> bool {
        let Some(rt) = self.runtime() else {
            return false;
        };
        let key = self.key_of(&rt, name);
        rt.track(StateKey::whole(self.id));
        let found = rt.store().contains(self.id, key);
        found
    }

    /// Property names in insertion order, or indices for arrays. Tracks the
    /// whole object.
    pub fn keys(&self) -> Vec<Rc<str>> {
        let Some(rt) = self.runtime() else {
            return Vec::new();
        };
        rt.track(StateKey::whole(self.id));
        let store = rt.store();
        let names = store
            .keys(self.id)
            .into_iter()
            .filter_map(|k| match k.as_index() {
                Some(i) => Some(Rc::from(i.to_string())),
                None => store.name(k),
            })
            .collect();
        names
    }

    /// Number of elements (arrays) or properties (objects).
    pub fn len(&self) -> usize {
        let Some(rt) = self.runtime() else {
            return 0;
        };
        let key = if self.is_array() {
            rt.store().length_key()
        } else {
            PropertyKey::WHOLE
        };
        rt.track(StateKey::new(self.id, key));
        let n = rt.store().size(self.id);
        n
    }

    /// Whether [`len`](Self::len) is zero.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether this handle wraps an array.
    pub fn is_array(&self) -> bool {
        match Runtime::from_weak(&self.rt) {
            Some(rt) => {
                let array = rt.store().is_array(self.id);
                array
            }
            None => false,
        }
    }

    /// Read an array element.
    pub fn index(&self, i: usize) -> Value {
        let Some(rt) = self.runtime() else {
            return Value::Undefined;
        };
        let key = PropertyKey::index(i);
        rt.track(StateKey::new(self.id, key));
        let value = rt.store().read(self.id, key);
        value
    }

    /// Write an array element, growing the array if needed.
    pub fn set_index(&self, i: usize, value: impl Into<Value>) {
        let Some(rt) = self.runtime() else {
            return;
        };
        self.write_key(&rt, PropertyKey::index(i), value.into());
    }

    /// All array elements. Tracks the length and every index.
    pub fn items(&self) -> Vec<Value> {
        let Some(rt) = self.runtime() else {
            return Vec::new();
        };
        let length = rt.store().length_key();
        rt.track(StateKey::new(self.id, length));
        let n = rt.store().size(self.id);
        (0..n)
            .map(|i| {
                let key = PropertyKey::index(i);
                rt.track(StateKey::new(self.id, key));
                let value = rt.store().read(self.id, key);
                value
            })
            .collect()
    }

    /// Append to an array.
    pub fn push(&self, value: impl Into<Value>) {
        let Some(rt) = self.runtime() else {
            return;
        };
        let value = value.into();
        let pushed = rt.store_mut().items_mut(self.id).map(|items| {
            items.push(value);
            items.len() - 1
        });
        if let Some(i) = pushed {
            self.structural_change(&rt, i..i + 1);
        }
    }

    /// Remove and return the last array element.
    pub fn pop(&self) -> Value {
        let Some(rt) = self.runtime() else {
            return Value::Undefined;
        };
        let popped = rt
            .store_mut()
            .items_mut(self.id)
            .and_then(|items| items.pop().map(|v| (v, items.len())));
        match popped {
            Some((value, i)) => {
                self.structural_change(&rt, i..i + 1);
                value
            }
            None => Value::Undefined,
        }
    }

    /// Insert into an array, shifting later elements.
    pub fn insert(&self, i: usize, value: impl Into<Value>) {
        let Some(rt) = self.runtime() else {
            return;
        };
        let value = value.into();
        let end = rt.store_mut().items_mut(self.id).map(|items| {
            let at = i.min(items.len());
            items.insert(at, value);
            (at, items.len())
        });
        if let Some((at, len)) = end {
            self.structural_change(&rt, at..len);
        }
    }

    /// Remove an array element, shifting later elements.
    pub fn remove_at(&self, i: usize) -> Value {
        let Some(rt) = self.runtime() else {
            return Value::Undefined;
        };
        let removed = rt.store_mut().items_mut(self.id).and_then(|items| {
            (i < items.len()).then(|| (items.remove(i), items.len() + 1))
        });
        match removed {
            Some((value, old_len)) => {
                self.structural_change(&rt, i..old_len);
                value
            }
            None => Value::Undefined,
        }
    }

    /// Shorten an array.
    pub fn truncate(&self, len: usize) {
        let Some(rt) = self.runtime() else {
            return;
        };
        let old = rt.store_mut().items_mut(self.id).map(|items| {
            let old = items.len();
            items.truncate(len);
            old
        });
        if let Some(old) = old {
            // Length writes are always reported, even when nothing was cut.
            self.structural_change(&rt, len.min(old)..old);
        }
    }

    /// Set an array's length, truncating or padding with `undefined`.
    pub fn set_len(&self, len: usize) {
        let Some(rt) = self.runtime() else {
            return;
        };
        let grown = rt.store_mut().items_mut(self.id).and_then(|items| {
            let old = items.len();
            (len > old).then(|| {
                items.resize(len, Value::Undefined);
                old
            })
        });
        match grown {
            Some(old) => self.structural_change(&rt, old..len),
            None => self.truncate(len),
        }
    }

    /// Swap two array elements.
    pub fn swap(&self, a: usize, b: usize) {
        let Some(rt) = self.runtime() else {
            return;
        };
        let (va, vb) = {
            let store = rt.store();
            (
                store.read(self.id, PropertyKey::index(a)),
                store.read(self.id, PropertyKey::index(b)),
            )
        };
        self.write_key(&rt, PropertyKey::index(a), vb);
        self.write_key(&rt, PropertyKey::index(b), va);
    }

    fn structural_change(&self, rt: &Runtime, touched: std::ops::Range<usize>) {
        for i in touched {
            rt.mark_dirty(StateKey::new(self.id, PropertyKey::index(i)));
        }
        let length = rt.store().length_key();
        rt.mark_dirty(StateKey::new(self.id, length));
        rt.mark_dirty(StateKey::whole(self.id));
    }

    /// Convert the wrapped tree back to plain JSON. Reads are tracked.
    ///
    /// An object reached a second time along the same path becomes `null`,
    /// so cyclic graphs serialize. Opaque values serialize only when they
    /// hold a `serde_json::Value`.
    pub fn to_json(&self) -> Result<serde_json::Value> {
        let rt = Runtime::from_weak(&self.rt).ok_or(Error::RuntimeDropped)?;
        let mut path = HashSet::new();
        Ok(object_to_json(&rt, self.id, &mut path))
    }
}

fn object_to_json(rt: &Runtime, id: ObjectId, path: &mut HashSet<ObjectId>) -> serde_json::Value {
    if !path.insert(id) {
        return serde_json::Value::Null;
    }
    rt.track(StateKey::whole(id));
    let (is_array, keys) = {
        let store = rt.store();
        (store.is_array(id), store.keys(id))
    };
    let json = if is_array {
        let length = rt.store().length_key();
        rt.track(StateKey::new(id, length));
        let items = keys
            .into_iter()
            .map(|k| {
                rt.track(StateKey::new(id, k));
                let v = rt.store().read(id, k);
                value_to_json(rt, &v, path).unwrap_or(serde_json::Value::Null)
            })
            .collect();
        serde_json::Value::Array(items)
    } else {
        let mut map = Map::new();
        for k in keys {
            rt.track(StateKey::new(id, k));
            let (name, v) = {
                let store = rt.store();
                (store.name(k), store.read(id, k))
            };
            if let (Some(name), Some(json)) = (name, value_to_json(rt, &v, path)) {
                map.insert(name.to_string(), json);
            }
        }
        serde_json::Value::Object(map)
    };
    path.remove(&id);
    json
}

fn value_to_json(
    rt: &Runtime,
    value: &Value,
    path: &mut HashSet<ObjectId>,
) -> Option<serde_json::Value> {
    Some(match value {
        Value::Undefined => return None,
        Value::Null | Value::Node(_) => serde_json::Value::Null,
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Number(n) => number_to_json(*n),
        Value::Str(s) => serde_json::Value::String(s.to_string()),
        Value::Object(o) => object_to_json(rt, o.id, path),
        Value::Immutable(i) => i
            .downcast_ref::<serde_json::Value>()
            .cloned()
            .unwrap_or(serde_json::Value::Null),
    })
}

impl PartialEq for Obj {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && Weak::ptr_eq(&self.rt, &other.rt)
    }
}

impl Eq for Obj {}

impl fmt::Debug for Obj {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Obj(#{})", self.id.0)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn nested_objects_are_wrapped() {
        let rt = Runtime::new();
        let state = rt.create_state(json!({ "user": { "name": "ada" }, "tags": ["x", "y"] }));

        let user = state.get("user");
        let user = user.as_obj().expect("wrapped object");
        assert_eq!(user.get("name").as_str(), Some("ada"));

        let tags = state.get("tags");
        let tags = tags.as_obj().expect("wrapped array");
        assert!(tags.is_array());
        assert_eq!(tags.len(), 2);
        assert_eq!(tags.index(1).as_str(), Some("y"));
    }

    #[test]
    fn shallow_objects_keep_json_opaque() {
        let rt = Runtime::new();
        let state = rt.create_shallow(json!({ "inner": { "a": 1 } }));
        let inner = state.get("inner");
        assert!(inner.as_obj().is_none());
        assert_eq!(
            inner.downcast_ref::<serde_json::Value>(),
            Some(&json!({ "a": 1 }))
        );
    }

    #[test]
    fn scalars_are_boxed_under_value() {
        let rt = Runtime::new();
        let state = rt.create_state(json!(5));
        assert_eq!(state.get("value").as_f64(), Some(5.0));
    }

    #[test]
    fn equal_writes_are_dropped() {
        let rt = Runtime::new();
        let state = rt.create_state(json!({ "n": 1 }));
        state.set("n", 1);
        assert_eq!(rt.pending_len(), 0);
        state.set("n", 2);
        assert_eq!(rt.pending_len(), 1);
    }

    #[test]
    fn numeric_names_address_array_elements() {
        let rt = Runtime::new();
        let list = rt.create_state(json!([10, 20]));

        let keys = list.keys();
        assert_eq!(keys.iter().map(|k| &**k).collect::<Vec<_>>(), vec!["0", "1"]);
        let values: Vec<_> = keys.iter().map(|k| list.get(k).as_f64()).collect();
        assert_eq!(values, vec![Some(10.0), Some(20.0)]);
        assert!(list.has("0"));
        assert!(list.has("length"));
        assert!(!list.has("2"));
        assert_eq!(list.get("length").as_f64(), Some(2.0));

        list.set("1", 99);
        assert_eq!(list.to_json().unwrap(), json!([10, 99]));
        assert!(list.delete("0"));
        assert_eq!(list.to_json().unwrap(), json!([null, 99]));
        assert_eq!(list.len(), 2);

        // Only arrays treat digits specially.
        let record = rt.create_state(json!({ "0": "zero" }));
        assert_eq!(record.get("0").as_str(), Some("zero"));
    }

    #[test]
    fn length_writes_resize_arrays() {
        let rt = Runtime::new();
        let list = rt.create_state(json!([1, 2, 3]));
        let runs = Rc::new(std::cell::Cell::new(0));
        let id = rt.register_counter(runs.clone());
        rt.tracked_execute(id, || list.len());

        list.set("length", 3);
        rt.flush().unwrap();
        assert_eq!(runs.get(), 1);

        list.set("length", 1);
        assert_eq!(rt.untracked(|| list.to_json()).unwrap(), json!([1]));
        list.set("length", 3);
        assert_eq!(rt.untracked(|| list.to_json()).unwrap(), json!([1, null, null]));

        list.set("length", "many");
        assert_eq!(rt.untracked(|| list.len()), 3);
    }

    #[test]
    fn adding_a_property_dirties_the_whole_object() {
        let rt = Runtime::new();
        let state = rt.create_state(json!({}));
        state.set("fresh", true);
        assert_eq!(rt.pending_len(), 2);
        assert!(state.delete("fresh"));
        assert!(!state.delete("fresh"));
        assert_eq!(rt.pending_len(), 4);
    }

    #[test]
    fn reads_are_recorded_in_the_active_frame() {
        let rt = Runtime::new();
        let state = rt.create_state(json!({ "a": 1, "b": 2 }));
        let id = rt.register_probe();
        rt.tracked_execute(id, || {
            state.get("a");
            state.has("b");
        });
        let deps = rt.dependencies_of(id);
        assert_eq!(deps.len(), 2);
        assert!(deps.contains(&StateKey::whole(state.id())));
    }

    #[test]
    fn array_mutations() {
        let rt = Runtime::new();
        let list = rt.create_state(json!([1, 2, 3]));
        list.push(4);
        assert_eq!(list.pop().as_f64(), Some(4.0));
        list.swap(0, 2);
        list.insert(0, 0);
        assert_eq!(list.remove_at(1).as_f64(), Some(3.0));
        list.truncate(2);
        assert_eq!(list.to_json().ok(), Some(json!([0, 2])));
    }

    #[test]
    fn cyclic_graphs_serialize() {
        let rt = Runtime::new();
        let a = rt.create_state(json!({ "name": "a" }));
        let b = rt.create_state(json!({ "name": "b" }));
        a.set("peer", &b);
        b.set("peer", &a);
        assert_eq!(
            a.to_json().ok(),
            Some(json!({ "name": "a", "peer": { "name": "b", "peer": null } }))
        );
    }

    #[test]
    fn handles_outliving_the_runtime_are_inert() {
        let rt = Runtime::new();
        let state = rt.create_state(json!({ "a": 1 }));
        drop(rt);
        assert!(state.get("a").is_undefined());
        state.set("a", 2);
        assert!(matches!(state.to_json(), Err(Error::RuntimeDropped)));
    }

    #[test]
    fn handles_compare_by_identity() {
        let rt = Runtime::new();
        let a = rt.create_state(json!({}));
        let b = rt.create_state(json!({}));
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
    }
}
