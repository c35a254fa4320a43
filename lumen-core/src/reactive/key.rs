//! Observable keys.
//!
//! A [`StateKey`] names one observable fact: a property of one wrapped
//! object. Property names are interned per runtime so that the hot path
//! (recording a read, resolving a write) works on plain integers.

use std::fmt;
use std::rc::Rc;

use indexmap::IndexSet;

/// Identifier of a wrapped object or array. Assigned once at wrap time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(pub(crate) u32);

impl ObjectId {
    /// Raw arena index.
    pub fn raw(self) -> u32 {
        self.0
    }
}

/// Interned property name.
///
/// Array indices are encoded directly with the top bit set and never touch
/// the interning table.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PropertyKey(u32);

const INDEX_BIT: u32 = 1 << 31;

impl PropertyKey {
    /// The whole-object key, read by enumeration and membership checks.
    pub const WHOLE: PropertyKey = PropertyKey(0);

    /// Key of an array slot.
    pub fn index(i: usize) -> Self {
        debug_assert!((i as u64) < INDEX_BIT as u64, "array index {i} out of range");
        PropertyKey(INDEX_BIT | i as u32)
    }

    /// Parse a canonical array index name such as `"3"`. Leading zeros,
    /// signs and out-of-range numbers are ordinary property names.
    pub fn parse_index(name: &str) -> Option<Self> {
        if name.len() > 1 && name.starts_with('0') {
            return None;
        }
        if !name.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let i: u32 = name.parse().ok()?;
        (i < INDEX_BIT).then(|| PropertyKey(INDEX_BIT | i))
    }

    /// The array slot this key addresses, if it is an index key.
    pub fn as_index(self) -> Option<usize> {
        (self.0 & INDEX_BIT != 0).then_some((self.0 & !INDEX_BIT) as usize)
    }

    /// Raw integer form.
    pub fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for PropertyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.as_index(), *self == Self::WHOLE) {
            (Some(i), _) => write!(f, "[{i}]"),
            (None, true) => f.write_str("*"),
            (None, false) => write!(f, "#{}", self.0),
        }
    }
}

/// One observable (object, property) fact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StateKey {
    /// Owning object.
    pub object: ObjectId,
    /// Property within it.
    pub property: PropertyKey,
}

impl StateKey {
    /// Key of a single property.
    pub fn new(object: ObjectId, property: PropertyKey) -> Self {
        Self { object, property }
    }

    /// Whole-object key of `object`.
    pub fn whole(object: ObjectId) -> Self {
        Self::new(object, PropertyKey::WHOLE)
    }
}

/// Interning table mapping property names to [`PropertyKey`]s.
///
/// Ids are dense and start at 1; 0 is [`PropertyKey::WHOLE`].
#[derive(Debug, Default)]
pub(crate) struct KeyInterner {
    names: IndexSet<Rc<str>>,
}

impl KeyInterner {
    /// Intern a name, returning its stable key.
    pub fn intern(&mut self, name: &str) -> PropertyKey {
        if let Some(i) = self.names.get_index_of(name) {
            return PropertyKey(i as u32 + 1);
        }
        let (i, _) = self.names.insert_full(Rc::from(name));
        PropertyKey(i as u32 + 1)
    }

    /// Look a name up without interning it.
    #[cfg(test)]
    pub fn get(&self, name: &str) -> Option<PropertyKey> {
        self.names.get_index_of(name).map(|i| PropertyKey(i as u32 + 1))
    }

    /// The name behind a key.
    pub fn name(&self, key: PropertyKey) -> Option<Rc<str>> {
        if key == PropertyKey::WHOLE || key.as_index().is_some() {
            return None;
        }
        self.names.get_index(key.0 as usize - 1).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_is_stable() {
        let mut interner = KeyInterner::default();
        let foo = interner.intern("foo");
        let bar = interner.intern("bar");
        assert_ne!(foo, bar);
        assert_ne!(foo, PropertyKey::WHOLE);
        assert_eq!(interner.intern("foo"), foo);
        assert_eq!(interner.get("bar"), Some(bar));
        assert_eq!(interner.get("baz"), None);
        assert_eq!(interner.name(foo).as_deref(), Some("foo"));
    }

    #[test]
    fn only_canonical_names_parse_as_indices() {
        assert_eq!(PropertyKey::parse_index("0"), Some(PropertyKey::index(0)));
        assert_eq!(PropertyKey::parse_index("17"), Some(PropertyKey::index(17)));
        assert_eq!(PropertyKey::parse_index("07"), None);
        assert_eq!(PropertyKey::parse_index("-1"), None);
        assert_eq!(PropertyKey::parse_index("+1"), None);
        assert_eq!(PropertyKey::parse_index(""), None);
        assert_eq!(PropertyKey::parse_index("length"), None);
        assert_eq!(PropertyKey::parse_index("4294967295"), None);
    }

    #[test]
    fn index_keys_bypass_the_table() {
        let key = PropertyKey::index(42);
        assert_eq!(key.as_index(), Some(42));
        assert_eq!(PropertyKey::WHOLE.as_index(), None);
        assert_eq!(KeyInterner::default().name(key), None);
        assert_eq!(format!("{key:?}"), "[42]");
    }
}
