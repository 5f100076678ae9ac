//! Source tree visitor.
//!
//! Read-only traversal over a [`SrcArena`]. The visitor may mutate its own
//! state; the tree stays immutable.
//!
//! Default implementations call `walk_expr`, which visits children in source
//! order (see [`SrcArena::children`]). Override `visit_expr` to act on
//! specific kinds, and skip the `walk_expr` call to prune a subtree.
//!
//! # Example
//!
//! ```text
//! struct CountLocals {
//!     count: usize,
//! }
//!
//! impl<'a> Visitor<'a> for CountLocals {
//!     fn visit_expr(&mut self, id: SrcId, arena: &'a SrcArena) {
//!         if let SrcKind::Local(_) = arena.kind(id) {
//!             self.count += 1;
//!         }
//!         walk_expr(self, id, arena);
//!     }
//! }
//! ```

use crate::{SrcArena, SrcId};

pub trait Visitor<'a> {
    fn visit_expr(&mut self, id: SrcId, arena: &'a SrcArena) {
        walk_expr(self, id, arena);
    }

    /// Visit an optional child. Invalid ids are skipped.
    fn visit_optional(&mut self, id: SrcId, arena: &'a SrcArena) {
        if id.is_valid() {
            self.visit_expr(id, arena);
        }
    }
}

/// Visit every direct child of `id` in source order.
pub fn walk_expr<'a, V: Visitor<'a> + ?Sized>(visitor: &mut V, id: SrcId, arena: &'a SrcArena) {
    for child in arena.children(id) {
        visitor.visit_expr(child, arena);
    }
}
