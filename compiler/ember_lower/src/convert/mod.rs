//! Tree converter.
//!
//! Structural recursion over the source arena, one rule per source kind.
//! Variables, declarations, switches and loops consult the resolver, the
//! binding plan builder, the loop detector and the state-threading
//! rewriter; everything else translates directly.
//!
//! Conversion never fails. Shapes without a specific rule get the generic
//! translation for their category, flagged [`ember_ir::NodeFlags::FALLBACK`].
//! Invariant violations become error sentinels with a diagnostic.
//!
//! Children are converted strictly in source order: later naming decisions
//! depend on earlier ones being memoized.

mod access;
mod control;
mod loops;
mod ops;
mod sequence;
mod switch;

use ember_ir::{Lit, SrcExpr, SrcId, SrcKind, TargetKind, TargetNode, TypeId, TypeKind};

use crate::context::LowerCtx;
use crate::naming::case;
use crate::stack::ensure_sufficient_stack;

pub(crate) use control::accumulator;
pub(crate) use sequence::Tail;

/// Target name of the receiver inside instance methods.
pub(crate) const SELF_NAME: &str = "struct";

impl LowerCtx<'_> {
    /// Convert one source node.
    ///
    /// An absent child (`SrcId::INVALID`) converts to `nil`. Once the unit
    /// has been abandoned every conversion yields an elided node.
    pub fn lower_expr(&mut self, id: SrcId) -> TargetNode {
        let Some(&expr) = self.arena.try_expr(id) else {
            return TargetNode::nil();
        };
        if let Some(name) = self.substitutions.get(&id) {
            return TargetNode::var(name.clone()).with_span(expr.span);
        }
        tracing::trace!(kind = expr.kind.label(), ?id, "lower");
        self.with_node(id, |this, expr| this.lower_kind(id, expr))
    }

    /// Count `id` against the budget and run `f` on its node.
    pub(crate) fn with_node(
        &mut self,
        id: SrcId,
        f: impl FnOnce(&mut Self, SrcExpr) -> TargetNode,
    ) -> TargetNode {
        let Some(&expr) = self.arena.try_expr(id) else {
            return TargetNode::nil();
        };
        if !self.enter(id) {
            return TargetNode::elided();
        }
        let node = ensure_sufficient_stack(|| f(self, expr));
        self.exit();
        node
    }

    fn lower_kind(&mut self, id: SrcId, expr: SrcExpr) -> TargetNode {
        let span = expr.span;
        match expr.kind {
            // Constants
            SrcKind::Int(value) => TargetNode::int(value).with_span(span),
            SrcKind::Float(bits) => TargetNode::lit(Lit::Float(bits)).with_span(span),
            SrcKind::Bool(value) => TargetNode::lit(Lit::Bool(value)).with_span(span),
            SrcKind::Str(s) => {
                TargetNode::lit(Lit::Str(self.arena.name(s).to_string())).with_span(span)
            }
            SrcKind::Null => TargetNode::nil().with_span(span),
            SrcKind::This => TargetNode::var(SELF_NAME).with_span(span),

            // Variables
            SrcKind::Local(var) => self.reference_var(var, span),
            SrcKind::VarDecl { var, init } => self.lower_decl(id, var, init, span),

            // Operators
            SrcKind::Binary { op, left, right } => self.lower_binary(op, left, right, span),
            SrcKind::Unary {
                op,
                postfix,
                operand,
            } => self.lower_unary(op, postfix, operand, false, span),

            // Calls and access
            SrcKind::Call { callee, args } => self.lower_call(callee, args, span),
            SrcKind::Field { receiver, field } => self.lower_field(receiver, field, span),
            SrcKind::Global { module, name } => self.lower_global(module, name, span),
            SrcKind::EnumCtor { ctor, .. } => self.lower_ctor(ctor, Vec::new(), span),
            SrcKind::ArrayDecl(items) => {
                let arena = self.arena;
                let items = self.lower_list(arena.get_expr_list(items));
                TargetNode::list(items).with_span(span)
            }
            SrcKind::Index { receiver, index } => self.lower_index(receiver, index, span),
            SrcKind::ObjectDecl(fields) => self.lower_object(fields, span),
            SrcKind::New { class, args } => self.lower_new(class, args, span),

            // Control flow
            SrcKind::If {
                cond,
                then_branch,
                else_branch,
            } => self.lower_if(cond, then_branch, else_branch, &[], &Tail::Value, span),
            SrcKind::Block(_) => self.lower_block(id, span),
            SrcKind::Return(value) => self.lower_return(value, span),
            SrcKind::Break => self.lower_exit(true, span),
            SrcKind::Continue => self.lower_exit(false, span),
            SrcKind::Throw(value) => {
                let value = self.lower_expr(value);
                TargetNode::call("raise", vec![value]).with_span(span)
            }
            SrcKind::Switch { .. } => self.lower_switch(id, &[], &Tail::Value),
            SrcKind::Try { body, catches } => self.lower_try(body, catches, &Tail::Value, span),
            SrcKind::Function { params, body } => self.lower_function(params, body, span),
            SrcKind::For { var, iter, body } => self.lower_for(var, iter, body, span),
            SrcKind::While { .. } => self.lower_while(id, span),

            // Tagged unions
            SrcKind::EnumParameter {
                subject,
                ctor,
                index,
            } => self.lower_enum_param(subject, ctor, index, span),
            SrcKind::EnumIndex(subject) => self.lower_enum_index(subject, span),

            // Wrappers
            SrcKind::TypeExpr(name) => {
                TargetNode::new(TargetKind::Raw(self.arena.name(name).to_string()), span)
            }
            SrcKind::Cast { expr } | SrcKind::Meta { expr, .. } => self.lower_expr(expr),
        }
    }

    /// Convert a child list in order.
    pub(crate) fn lower_list(&mut self, ids: &[SrcId]) -> Vec<TargetNode> {
        ids.iter().map(|&id| self.lower_expr(id)).collect()
    }

    // Type queries

    pub(crate) fn ty_of(&self, id: SrcId) -> TypeId {
        self.arena
            .try_expr(self.arena.unwrap_transparent(id))
            .map_or(TypeId::UNKNOWN, |e| e.ty)
    }

    pub(crate) fn type_kind(&self, id: SrcId) -> TypeKind {
        self.arena.types().kind(self.ty_of(id))
    }

    pub(crate) fn is_string(&self, id: SrcId) -> bool {
        self.arena.types().is_string(self.ty_of(id))
    }

    /// Target spelling of a function, method or field name.
    pub(crate) fn member_name(&self, name: ember_ir::Name) -> String {
        case::convert_name(self.arena.name(name), self.names.config().escape_reserved)
    }
}
