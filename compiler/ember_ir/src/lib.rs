//! Ember IR - shared types for the lowering core.
//!
//! This crate holds both sides of the lowering boundary:
//! - Spans, interned names and the per-unit type pool
//! - The typed source tree produced by the front-end (`SrcArena`)
//! - The tagged-union side table (`EnumTable`)
//! - The target tree consumed by the printer (`TargetNode`)
//!
//! # Design
//!
//! - **Flat source**: source nodes are referenced by `SrcId(u32)` into one
//!   arena per unit, and `SrcKind` is `Copy` so passes can read a node
//!   without holding a borrow on the arena.
//! - **Owned target**: target nodes own their children. Later passes rebuild
//!   subtrees by value through [`target::TargetFolder`].
//! - **No shared state**: the string table and type pool live inside the
//!   unit's arena, so independent units never contend on a lock.

mod enums;
mod name;
pub mod source;
mod span;
pub mod target;
mod types;
pub mod visitor;

pub use enums::{CtorDef, EnumDef, EnumTable};
pub use name::{Name, StringTable};
pub use source::{
    ArmRange, BinaryOp, CatchRange, FieldRange, SrcArena, SrcArm, SrcBinOp, SrcCatch, SrcExpr,
    SrcField, SrcId, SrcKind, SrcRange, SrcUnaryOp, SrcVar, VarFlags, VarId, VarRange,
};
pub use span::Span;
pub use target::{
    for_each_node, CaseClause, DeclOrigin, FnClause, Generator, Lit, NodeFlags, NodeMeta, Pattern,
    TargetBinOp, TargetKind, TargetNode, TargetUnaryOp,
};
pub use types::{TypeId, TypeKind, TypePool};
