//! Resolved source types.
//!
//! The front-end has already type-checked the tree; lowering only needs to
//! ask coarse questions ("is this a string?", "which enum is this?"), so the
//! pool stores a small closed set of shapes with structural deduplication.

use rustc_hash::FxHashMap;

use crate::Name;

/// Index into a [`TypePool`].
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
#[repr(transparent)]
pub struct TypeId(u32);

impl TypeId {
    pub const UNKNOWN: TypeId = TypeId(0);
    pub const INT: TypeId = TypeId(1);
    pub const FLOAT: TypeId = TypeId(2);
    pub const BOOL: TypeId = TypeId(3);
    pub const STRING: TypeId = TypeId(4);
    pub const VOID: TypeId = TypeId(5);
    pub const DYNAMIC: TypeId = TypeId(6);

    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl Default for TypeId {
    fn default() -> Self {
        Self::UNKNOWN
    }
}

/// Shape of a resolved type.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum TypeKind {
    Unknown,
    Int,
    Float,
    Bool,
    String,
    Void,
    Dynamic,
    Array(TypeId),
    Map(TypeId, TypeId),
    Enum(Name),
    Class(Name),
    Function,
}

/// Deduplicating store of [`TypeKind`]s.
#[derive(Clone, Debug)]
pub struct TypePool {
    kinds: Vec<TypeKind>,
    dedup: FxHashMap<TypeKind, TypeId>,
}

impl TypePool {
    pub fn new() -> Self {
        let mut pool = TypePool {
            kinds: Vec::with_capacity(16),
            dedup: FxHashMap::default(),
        };
        for kind in [
            TypeKind::Unknown,
            TypeKind::Int,
            TypeKind::Float,
            TypeKind::Bool,
            TypeKind::String,
            TypeKind::Void,
            TypeKind::Dynamic,
        ] {
            pool.intern(kind);
        }
        pool
    }

    /// Intern a type shape.
    pub fn intern(&mut self, kind: TypeKind) -> TypeId {
        if let Some(&id) = self.dedup.get(&kind) {
            return id;
        }
        #[expect(
            clippy::cast_possible_truncation,
            reason = "type pools stay far below u32::MAX entries"
        )]
        let id = TypeId(self.kinds.len() as u32);
        self.kinds.push(kind);
        self.dedup.insert(kind, id);
        id
    }

    pub fn array(&mut self, elem: TypeId) -> TypeId {
        self.intern(TypeKind::Array(elem))
    }

    pub fn map(&mut self, key: TypeId, value: TypeId) -> TypeId {
        self.intern(TypeKind::Map(key, value))
    }

    pub fn enum_type(&mut self, name: Name) -> TypeId {
        self.intern(TypeKind::Enum(name))
    }

    pub fn class(&mut self, name: Name) -> TypeId {
        self.intern(TypeKind::Class(name))
    }

    /// Shape of a type. Out-of-range ids report `Unknown`.
    pub fn kind(&self, id: TypeId) -> TypeKind {
        self.kinds
            .get(id.0 as usize)
            .copied()
            .unwrap_or(TypeKind::Unknown)
    }

    pub fn is_string(&self, id: TypeId) -> bool {
        matches!(self.kind(id), TypeKind::String)
    }

    pub fn is_array(&self, id: TypeId) -> bool {
        matches!(self.kind(id), TypeKind::Array(_))
    }

    pub fn is_map(&self, id: TypeId) -> bool {
        matches!(self.kind(id), TypeKind::Map(..))
    }

    /// Enum name of a tagged-union type, if it is one.
    pub fn enum_name(&self, id: TypeId) -> Option<Name> {
        match self.kind(id) {
            TypeKind::Enum(name) => Some(name),
            _ => None,
        }
    }
}

impl Default for TypePool {
    fn default() -> Self {
        Self::new()
    }
}
