//! Typed source tree, as handed over by the front-end.
//!
//! The tree is flat: every node lives in a [`SrcArena`] and refers to its
//! children through [`SrcId`] indices and list ranges. Optional children use
//! [`SrcId::INVALID`].
//!
//! The shapes here are post-desugaring: iteration syntax has already been
//! rewritten into index loops over temporaries, and tagged-union patterns
//! have been split into a discriminant switch plus `EnumParameter`
//! extractions. Undoing that is the lowering core's job.

mod arena;

use std::fmt;

use bitflags::bitflags;

use crate::{Name, Span, TypeId};

pub use arena::SrcArena;

/// Index into the source arena.
#[derive(Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct SrcId(u32);

impl SrcId {
    /// Sentinel for an absent optional child.
    pub const INVALID: SrcId = SrcId(u32::MAX);

    #[inline]
    pub const fn new(index: u32) -> Self {
        SrcId(index)
    }

    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }

    #[inline]
    pub const fn is_valid(self) -> bool {
        self.0 != u32::MAX
    }
}

impl fmt::Debug for SrcId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            write!(f, "SrcId({})", self.0)
        } else {
            write!(f, "SrcId::INVALID")
        }
    }
}

impl Default for SrcId {
    fn default() -> Self {
        Self::INVALID
    }
}

/// Identity of a source variable, unique within one unit.
///
/// Ids are allocated in declaration order, so ordering by id is ordering by
/// declaration.
#[derive(Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct VarId(u32);

impl VarId {
    #[inline]
    pub const fn new(index: u32) -> Self {
        VarId(index)
    }

    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for VarId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VarId({})", self.0)
    }
}

/// Generates a `(start, len)` range type over one of the arena's side lists.
macro_rules! list_range {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Copy, Clone, Eq, PartialEq, Hash, Default)]
        pub struct $name {
            pub start: u32,
            pub len: u32,
        }

        impl $name {
            pub const EMPTY: $name = $name { start: 0, len: 0 };

            #[inline]
            pub const fn new(start: u32, len: u32) -> Self {
                $name { start, len }
            }

            #[inline]
            pub const fn is_empty(&self) -> bool {
                self.len == 0
            }

            #[inline]
            pub const fn len(&self) -> usize {
                self.len as usize
            }

            #[inline]
            pub(crate) fn as_range(&self) -> std::ops::Range<usize> {
                self.start as usize..(self.start + self.len) as usize
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({}..{})", stringify!($name), self.start, self.start + self.len)
            }
        }
    };
}

list_range!(
    /// Range of expression ids (block statements, call args, array items).
    SrcRange
);
list_range!(
    /// Range of switch arms.
    ArmRange
);
list_range!(
    /// Range of catch clauses.
    CatchRange
);
list_range!(
    /// Range of object literal fields.
    FieldRange
);
list_range!(
    /// Range of variable ids (closure parameters).
    VarRange
);

bitflags! {
    /// Front-end facts about a variable.
    #[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
    pub struct VarFlags: u8 {
        /// Compiler-generated temporary (`_g`, `_g1`, ...).
        const GENERATED = 1 << 0;
        /// Captured by a closure.
        const CAPTURED = 1 << 1;
        /// Declared final (never reassigned).
        const FINAL = 1 << 2;
    }
}

/// A declared source variable.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct SrcVar {
    pub name: Name,
    pub ty: TypeId,
    pub flags: VarFlags,
}

impl SrcVar {
    #[inline]
    pub fn is_generated(&self) -> bool {
        self.flags.contains(VarFlags::GENERATED)
    }
}

/// Value-level binary operators shared by source and target.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    And,
    Or,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
}

impl BinaryOp {
    /// Comparison and logic operators produce booleans and have no effects.
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOp::Eq
                | BinaryOp::NotEq
                | BinaryOp::Lt
                | BinaryOp::LtEq
                | BinaryOp::Gt
                | BinaryOp::GtEq
        )
    }
}

/// Source binary operator: value operators plus the assignment forms.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum SrcBinOp {
    Op(BinaryOp),
    Assign,
    /// Compound assignment such as `x += e`.
    AssignOp(BinaryOp),
}

/// Source unary operator.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum SrcUnaryOp {
    Not,
    Neg,
    BitNot,
    Increment,
    Decrement,
}

impl SrcUnaryOp {
    pub fn is_update(self) -> bool {
        matches!(self, SrcUnaryOp::Increment | SrcUnaryOp::Decrement)
    }
}

/// Source expression kind.
///
/// `Copy` so that passes can take the kind out of the arena and then recurse
/// with `&mut self` without holding a borrow.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum SrcKind {
    // Constants
    Int(i64),
    /// `f64` stored as bits to keep `Eq`/`Hash`.
    Float(u64),
    Bool(bool),
    Str(Name),
    Null,
    This,

    // Variables
    Local(VarId),
    VarDecl {
        var: VarId,
        init: SrcId,
    },

    // Operators
    Binary {
        op: SrcBinOp,
        left: SrcId,
        right: SrcId,
    },
    Unary {
        op: SrcUnaryOp,
        postfix: bool,
        operand: SrcId,
    },

    // Calls and access
    Call {
        callee: SrcId,
        args: SrcRange,
    },
    Field {
        receiver: SrcId,
        field: Name,
    },
    /// Module-level function or static reference. `module` is `EMPTY` for
    /// functions of the unit's own module.
    Global {
        module: Name,
        name: Name,
    },
    /// Reference to a tagged-union constructor.
    EnumCtor {
        enum_name: Name,
        ctor: Name,
    },
    ArrayDecl(SrcRange),
    Index {
        receiver: SrcId,
        index: SrcId,
    },
    ObjectDecl(FieldRange),
    New {
        class: Name,
        args: SrcRange,
    },

    // Control flow
    If {
        cond: SrcId,
        then_branch: SrcId,
        else_branch: SrcId,
    },
    Block(SrcRange),
    Return(SrcId),
    Break,
    Continue,
    Throw(SrcId),
    Switch {
        scrutinee: SrcId,
        arms: ArmRange,
        default: SrcId,
    },
    Try {
        body: SrcId,
        catches: CatchRange,
    },
    Function {
        params: VarRange,
        body: SrcId,
    },
    For {
        var: VarId,
        iter: SrcId,
        body: SrcId,
    },
    /// `eager = true` checks the condition before each iteration (`while`),
    /// `false` after (`do … while`).
    While {
        cond: SrcId,
        body: SrcId,
        eager: bool,
    },

    // Tagged unions
    EnumParameter {
        subject: SrcId,
        ctor: Name,
        index: u32,
    },
    EnumIndex(SrcId),

    // Wrappers
    TypeExpr(Name),
    Cast {
        expr: SrcId,
    },
    Meta {
        name: Name,
        expr: SrcId,
    },
}

impl SrcKind {
    /// Stable label used by the repetition guard and by trace output.
    pub fn label(&self) -> &'static str {
        match self {
            SrcKind::Int(_)
            | SrcKind::Float(_)
            | SrcKind::Bool(_)
            | SrcKind::Str(_)
            | SrcKind::Null
            | SrcKind::This => "constant",
            SrcKind::Local(_) => "local",
            SrcKind::VarDecl { .. } => "var",
            SrcKind::Binary { .. } => "binop",
            SrcKind::Unary { .. } => "unop",
            SrcKind::Call { .. } => "call",
            SrcKind::Field { .. } => "field",
            SrcKind::Global { .. } => "global",
            SrcKind::EnumCtor { .. } => "enum_ctor",
            SrcKind::ArrayDecl(_) => "array",
            SrcKind::Index { .. } => "index",
            SrcKind::ObjectDecl(_) => "object",
            SrcKind::New { .. } => "new",
            SrcKind::If { .. } => "if",
            SrcKind::Block(_) => "block",
            SrcKind::Return(_) => "return",
            SrcKind::Break => "break",
            SrcKind::Continue => "continue",
            SrcKind::Throw(_) => "throw",
            SrcKind::Switch { .. } => "switch",
            SrcKind::Try { .. } => "try",
            SrcKind::Function { .. } => "function",
            SrcKind::For { .. } => "for",
            SrcKind::While { .. } => "while",
            SrcKind::EnumParameter { .. } => "enum_parameter",
            SrcKind::EnumIndex(_) => "enum_index",
            SrcKind::TypeExpr(_) => "type_expr",
            SrcKind::Cast { .. } => "cast",
            SrcKind::Meta { .. } => "meta",
        }
    }
}

/// A source node: kind plus position and resolved type.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct SrcExpr {
    pub kind: SrcKind,
    pub span: Span,
    pub ty: TypeId,
}

impl SrcExpr {
    pub const fn new(kind: SrcKind, span: Span, ty: TypeId) -> Self {
        SrcExpr { kind, span, ty }
    }
}

/// One switch arm: one or more match values sharing a body.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct SrcArm {
    pub values: SrcRange,
    /// `SrcId::INVALID` when the arm has no guard.
    pub guard: SrcId,
    pub body: SrcId,
    pub span: Span,
}

/// One `catch (var) body` clause.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct SrcCatch {
    pub var: VarId,
    pub body: SrcId,
}

/// One `name: value` entry of an object literal.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct SrcField {
    pub name: Name,
    pub value: SrcId,
}
