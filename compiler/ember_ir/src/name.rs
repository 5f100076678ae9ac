//! Interned identifiers scoped to one compilation unit.
//!
//! Unlike a process-wide interner, a [`StringTable`] belongs to a single
//! `SrcArena`. Units converted on different threads each carry their own
//! table, so interning never takes a lock.

use std::fmt;

use rustc_hash::FxHashMap;

/// Interned string identifier.
///
/// Only meaningful together with the [`StringTable`] that produced it.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Default)]
#[repr(transparent)]
pub struct Name(u32);

impl Name {
    /// Pre-interned empty string.
    pub const EMPTY: Name = Name(0);

    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }

    #[inline]
    pub const fn from_raw(raw: u32) -> Self {
        Name(raw)
    }

    #[inline]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Debug for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Name({})", self.0)
    }
}

/// Per-unit string interner.
#[derive(Clone)]
pub struct StringTable {
    map: FxHashMap<Box<str>, Name>,
    strings: Vec<Box<str>>,
}

impl StringTable {
    /// Create a table holding only the empty string.
    pub fn new() -> Self {
        let mut table = StringTable {
            map: FxHashMap::default(),
            strings: Vec::with_capacity(64),
        };
        table.strings.push(Box::from(""));
        table.map.insert(Box::from(""), Name::EMPTY);
        table
    }

    /// Intern a string, returning its `Name`.
    pub fn intern(&mut self, s: &str) -> Name {
        if let Some(&name) = self.map.get(s) {
            return name;
        }
        #[expect(
            clippy::cast_possible_truncation,
            reason = "a unit never holds 4 billion distinct identifiers"
        )]
        let name = Name(self.strings.len() as u32);
        self.strings.push(Box::from(s));
        self.map.insert(Box::from(s), name);
        name
    }

    /// Look up an already-interned string without inserting.
    pub fn get(&self, s: &str) -> Option<Name> {
        self.map.get(s).copied()
    }

    /// Resolve a `Name` to its text. Unknown names resolve to `""`.
    pub fn lookup(&self, name: Name) -> &str {
        self.strings.get(name.0 as usize).map_or("", |s| s)
    }

    pub fn len(&self) -> usize {
        self.strings.len()
    }

    /// Check if the table holds only the empty string.
    pub fn is_empty(&self) -> bool {
        self.strings.len() == 1
    }
}

impl Default for StringTable {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for StringTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StringTable")
            .field("len", &self.strings.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intern_is_idempotent() {
        let mut table = StringTable::new();
        let a = table.intern("total");
        let b = table.intern("total");
        assert_eq!(a, b);
        assert_eq!(table.lookup(a), "total");
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn empty_is_preinterned() {
        let mut table = StringTable::new();
        assert!(table.is_empty());
        assert_eq!(table.intern(""), Name::EMPTY);
        assert_eq!(table.lookup(Name::EMPTY), "");
    }

    #[test]
    fn unknown_name_resolves_empty() {
        let table = StringTable::new();
        assert_eq!(table.lookup(Name::from_raw(99)), "");
        assert_eq!(table.get("missing"), None);
    }
}
