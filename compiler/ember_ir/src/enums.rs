//! Tagged-union side table.
//!
//! The front-end hands over every enum it knows with its constructors in
//! declaration order and each constructor's declared parameter names. The
//! binding plan builder queries this table; missing entries are normal
//! (externs, generated enums) and make callers fall back to placeholders.

use rustc_hash::FxHashMap;

use crate::Name;

/// One constructor: name and declared parameter names in order.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct CtorDef {
    pub name: Name,
    pub params: Vec<Name>,
}

impl CtorDef {
    pub fn new(name: Name, params: impl IntoIterator<Item = Name>) -> Self {
        CtorDef {
            name,
            params: params.into_iter().collect(),
        }
    }

    pub fn arity(&self) -> usize {
        self.params.len()
    }
}

/// One tagged union with its constructors in declaration order.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct EnumDef {
    pub name: Name,
    pub ctors: Vec<CtorDef>,
}

/// Enum name → definition, plus a constructor-name index.
#[derive(Clone, Debug, Default)]
pub struct EnumTable {
    enums: FxHashMap<Name, EnumDef>,
    /// Constructor name → owning enum. Ambiguous names map to `None`.
    by_ctor: FxHashMap<Name, Option<Name>>,
}

impl EnumTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an enum. A later definition with the same name replaces the
    /// earlier one.
    pub fn insert(&mut self, def: EnumDef) {
        for ctor in &def.ctors {
            self.by_ctor
                .entry(ctor.name)
                .and_modify(|owner| {
                    if *owner != Some(def.name) {
                        *owner = None;
                    }
                })
                .or_insert(Some(def.name));
        }
        self.enums.insert(def.name, def);
    }

    pub fn get(&self, enum_name: Name) -> Option<&EnumDef> {
        self.enums.get(&enum_name)
    }

    /// Constructor by enum and constructor name.
    pub fn ctor(&self, enum_name: Name, ctor: Name) -> Option<&CtorDef> {
        self.get(enum_name)?.ctors.iter().find(|c| c.name == ctor)
    }

    /// Declared parameter names of a constructor.
    pub fn ctor_params(&self, enum_name: Name, ctor: Name) -> Option<&[Name]> {
        self.ctor(enum_name, ctor).map(|c| c.params.as_slice())
    }

    /// Constructor at a discriminant index.
    pub fn ctor_at(&self, enum_name: Name, index: usize) -> Option<&CtorDef> {
        self.get(enum_name)?.ctors.get(index)
    }

    /// Discriminant index of a constructor.
    pub fn ctor_index(&self, enum_name: Name, ctor: Name) -> Option<usize> {
        self.get(enum_name)?.ctors.iter().position(|c| c.name == ctor)
    }

    /// Look a constructor up by name alone. `None` when unknown or when two
    /// enums declare the same constructor name.
    pub fn find_ctor(&self, ctor: Name) -> Option<(Name, &CtorDef)> {
        let owner = (*self.by_ctor.get(&ctor)?)?;
        self.ctor(owner, ctor).map(|def| (owner, def))
    }

    pub fn len(&self) -> usize {
        self.enums.len()
    }

    pub fn is_empty(&self) -> bool {
        self.enums.is_empty()
    }
}
