//! Operators and assignment.

use ember_diagnostic::unsupported_assignment_target;
use ember_ir::{
    BinaryOp, NodeFlags, Pattern, Span, SrcBinOp, SrcId, SrcKind, SrcUnaryOp, TargetBinOp,
    TargetKind, TargetNode, TargetUnaryOp,
};

use super::SELF_NAME;
use crate::analysis::{self, Written};
use crate::context::LowerCtx;

/// Direct target operator; `None` for operators spelled as calls.
fn target_op(op: BinaryOp) -> Option<TargetBinOp> {
    Some(match op {
        BinaryOp::Add => TargetBinOp::Add,
        BinaryOp::Sub => TargetBinOp::Sub,
        BinaryOp::Mul => TargetBinOp::Mul,
        BinaryOp::Div => TargetBinOp::Div,
        BinaryOp::Mod => return None,
        BinaryOp::Eq => TargetBinOp::Eq,
        BinaryOp::NotEq => TargetBinOp::NotEq,
        BinaryOp::Lt => TargetBinOp::Lt,
        BinaryOp::LtEq => TargetBinOp::LtEq,
        BinaryOp::Gt => TargetBinOp::Gt,
        BinaryOp::GtEq => TargetBinOp::GtEq,
        BinaryOp::And => TargetBinOp::And,
        BinaryOp::Or => TargetBinOp::Or,
        BinaryOp::BitAnd => TargetBinOp::BitAnd,
        BinaryOp::BitOr => TargetBinOp::BitOr,
        BinaryOp::BitXor => TargetBinOp::BitXor,
        BinaryOp::Shl => TargetBinOp::Shl,
        BinaryOp::Shr => TargetBinOp::Shr,
    })
}

impl LowerCtx<'_> {
    pub(crate) fn lower_binary(
        &mut self,
        op: SrcBinOp,
        left: SrcId,
        right: SrcId,
        span: Span,
    ) -> TargetNode {
        match op {
            SrcBinOp::Op(op) => {
                let l = self.lower_expr(left);
                let r = self.lower_expr(right);
                self.apply_op(op, left, right, l, r).with_span(span)
            }
            SrcBinOp::Assign => {
                let value = self.lower_expr(right);
                self.assign_to(left, value, span)
            }
            // `x op= e` is `x = x op e`.
            SrcBinOp::AssignOp(op) => {
                let current = self.lower_expr(left);
                let rhs = self.lower_expr(right);
                let value = self.apply_op(op, left, right, current, rhs);
                self.assign_to(left, value, span)
            }
        }
    }

    /// Combine two converted operands; `left`/`right` are their sources,
    /// consulted for operand types.
    fn apply_op(
        &self,
        op: BinaryOp,
        left: SrcId,
        right: SrcId,
        l: TargetNode,
        r: TargetNode,
    ) -> TargetNode {
        match op {
            BinaryOp::Add if self.is_string(left) || self.is_string(right) => {
                let l = if self.is_string(left) { l } else { stringify(l) };
                let r = if self.is_string(right) { r } else { stringify(r) };
                TargetNode::binary(TargetBinOp::Concat, l, r)
            }
            _ => match target_op(op) {
                Some(op) => TargetNode::binary(op, l, r),
                None => {
                    let pure = l.is_pure() && r.is_pure();
                    let node = TargetNode::call("rem", vec![l, r]);
                    if pure {
                        node.with_flags(NodeFlags::PURE)
                    } else {
                        node
                    }
                }
            },
        }
    }

    pub(crate) fn lower_unary(
        &mut self,
        op: SrcUnaryOp,
        postfix: bool,
        operand: SrcId,
        as_stmt: bool,
        span: Span,
    ) -> TargetNode {
        let target_op = match op {
            SrcUnaryOp::Not => TargetUnaryOp::Not,
            SrcUnaryOp::Neg => TargetUnaryOp::Neg,
            SrcUnaryOp::BitNot => TargetUnaryOp::BitNot,
            SrcUnaryOp::Increment | SrcUnaryOp::Decrement => {
                let step = if op == SrcUnaryOp::Increment {
                    TargetBinOp::Add
                } else {
                    TargetBinOp::Sub
                };
                let current = self.lower_expr(operand);
                let value = TargetNode::binary(step, current, TargetNode::int(1));
                let node = self.assign_to(operand, value, span);
                // The old value of `x++` has no spelling once `x` is rebound.
                return if postfix && !as_stmt {
                    node.with_flags(NodeFlags::FALLBACK)
                } else {
                    node
                };
            }
        };
        let operand = self.lower_expr(operand);
        let pure = operand.is_pure();
        let node = TargetNode::new(
            TargetKind::Unary {
                op: target_op,
                operand: Box::new(operand),
            },
            span,
        );
        if pure {
            node.with_flags(NodeFlags::PURE)
        } else {
            node
        }
    }

    // Assignment

    /// Bind `value` to the root variable of `target`.
    ///
    /// Member paths rebuild the root with the member replaced; the root is
    /// then rebound as a whole.
    pub(crate) fn assign_to(&mut self, target: SrcId, value: TargetNode, span: Span) -> TargetNode {
        let arena = self.arena;
        let target = arena.unwrap_transparent(target);
        let label = arena.try_expr(target).map_or("?", |e| e.kind.label());

        match analysis::written_root(arena, target) {
            Written::Local(var) => {
                let name = self.bind_var(var);
                if value.as_var() == Some(name.as_str()) {
                    return TargetNode::elided();
                }
                let used = self.used_after(var);
                TargetNode::match_(Pattern::Bind { name, used }, value).with_span(span)
            }
            Written::Member(var) => {
                let root = self.rebuild_path(target, value);
                let name = self.bind_var(var);
                let used = self.used_after(var);
                TargetNode::match_(Pattern::Bind { name, used }, root).with_span(span)
            }
            Written::NonLocal if self.is_self_path(target) => {
                let root = self.rebuild_path(target, value);
                TargetNode::match_(Pattern::bind(SELF_NAME), root)
                    .with_span(span)
                    .with_flags(NodeFlags::FALLBACK)
            }
            Written::NonLocal => {
                let diag = unsupported_assignment_target(span, label);
                self.error_node(diag, span)
            }
        }
    }

    /// The path is rooted at the receiver `this`.
    pub(super) fn is_self_path(&self, target: SrcId) -> bool {
        let arena = self.arena;
        let mut cur = arena.unwrap_transparent(target);
        loop {
            match arena.try_expr(cur).map(|e| e.kind) {
                Some(SrcKind::Field { receiver, .. } | SrcKind::Index { receiver, .. }) => {
                    cur = arena.unwrap_transparent(receiver);
                }
                Some(SrcKind::This) => return true,
                _ => return false,
            }
        }
    }

    /// Rebuild the root of `path` with the innermost member set to `value`.
    fn rebuild_path(&mut self, path: SrcId, value: TargetNode) -> TargetNode {
        let arena = self.arena;
        let path = arena.unwrap_transparent(path);
        match arena.try_expr(path).map(|e| e.kind) {
            Some(SrcKind::Field { receiver, field }) => {
                let base = self.lower_expr(receiver);
                let key = TargetNode::atom(self.member_name(field));
                let updated = TargetNode::synthetic(TargetKind::MapUpdate {
                    base: Box::new(base),
                    entries: vec![(key, value)],
                });
                self.rebuild_path(receiver, updated)
            }
            Some(SrcKind::Index { receiver, index }) => {
                let base = self.lower_expr(receiver);
                let key = self.lower_expr(index);
                let updated = if self.arena.types().is_map(self.ty_of(receiver)) {
                    TargetNode::remote_call("Map", "put", vec![base, key, value])
                } else {
                    TargetNode::remote_call("List", "replace_at", vec![base, key, value])
                };
                self.rebuild_path(receiver, updated)
            }
            _ => value,
        }
    }
}

/// `to_string(node)` for the non-string side of a concatenation.
fn stringify(node: TargetNode) -> TargetNode {
    TargetNode::call("to_string", vec![node])
}
