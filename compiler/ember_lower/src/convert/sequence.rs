//! Statement sequences.
//!
//! A source block is a list of statements executed for effect, with the
//! last one supplying the value. The target has no mutation, so a sequence
//! also decides what its *result* is: the last value, the variables a
//! conditional rebinds, or the next accumulator of a fold step.

use std::collections::BTreeSet;

use smallvec::SmallVec;

use ember_ir::{DeclOrigin, Pattern, Span, SrcArena, SrcId, SrcKind, TargetNode, VarId};

use crate::analysis::Effects;
use crate::context::LowerCtx;
use crate::loops::flat_stmts;

/// What a statement sequence yields once it falls off its end.
#[derive(Clone, Debug)]
pub(crate) enum Tail {
    /// Value of the last statement.
    Value,
    /// Current values of these variables: one bare, several as a tuple.
    Rebind(Vec<VarId>),
    /// Continue the enclosing fold with the current accumulator.
    Step,
}

/// The statement never completes normally.
fn is_terminal(arena: &SrcArena, stmt: SrcId) -> bool {
    matches!(
        arena.try_expr(arena.unwrap_transparent(stmt)).map(|e| e.kind),
        Some(SrcKind::Break | SrcKind::Continue | SrcKind::Return(_) | SrcKind::Throw(_))
    )
}

/// Every path through `body` leaves it by a jump.
pub(crate) fn always_exits(arena: &SrcArena, body: SrcId) -> bool {
    let stmts = flat_stmts(arena, body);
    let Some(&last) = stmts.last() else {
        return false;
    };
    let last = arena.unwrap_transparent(last);
    match arena.try_expr(last).map(|e| e.kind) {
        Some(SrcKind::Break | SrcKind::Continue | SrcKind::Return(_) | SrcKind::Throw(_)) => true,
        Some(SrcKind::If {
            then_branch,
            else_branch,
            ..
        }) => {
            else_branch.is_valid()
                && always_exits(arena, then_branch)
                && always_exits(arena, else_branch)
        }
        Some(SrcKind::Switch { arms, default, .. }) => {
            default.is_valid()
                && always_exits(arena, default)
                && arena
                    .get_arms(arms)
                    .iter()
                    .all(|arm| always_exits(arena, arm.body))
        }
        _ => false,
    }
}

impl LowerCtx<'_> {
    pub(crate) fn lower_block(&mut self, id: SrcId, span: Span) -> TargetNode {
        let stmts = flat_stmts(self.arena, id);
        self.lower_seq(&stmts, &Tail::Value, span)
    }

    /// Convert a statement list ending in `tail`.
    pub(crate) fn lower_seq(&mut self, stmts: &[SrcId], tail: &Tail, span: Span) -> TargetNode {
        let plans = self.plan_loops(stmts, tail);
        let mut out = Vec::with_capacity(stmts.len() + 1);
        let mut falls_through = true;

        for (i, &stmt) in stmts.iter().enumerate() {
            if self.is_aborted() {
                break;
            }
            if self.consumed.contains(&stmt) {
                continue;
            }
            let rest = &stmts[i + 1..];

            if let Some(node) = self.lower_unrolled(&stmts[i..]) {
                out.push(node);
                break;
            }
            if let Some(plan) = plans.get(&stmt) {
                self.push_following(rest);
                let node = self.lower_planned(stmt, plan);
                self.pop_following();
                out.push(node);
                continue;
            }
            if self.needs_split(stmt, tail) {
                // The rest of the sequence moves into the branches.
                out.push(self.lower_split(stmt, rest, tail));
                falls_through = false;
                break;
            }

            self.push_following(rest);
            let node = self.lower_stmt(stmt);
            self.pop_following();
            out.push(node);
            if is_terminal(self.arena, stmt) {
                falls_through = false;
                break;
            }
        }

        if falls_through {
            if let Some(node) = self.tail_node(tail, span) {
                out.push(node);
            }
        }
        TargetNode::block(out, span)
    }

    /// A conditional whose effects cannot be expressed as a value of the
    /// statement itself: early `return`, or a fold step that exits or
    /// rebinds threaded state inside a branch.
    fn needs_split(&self, stmt: SrcId, tail: &Tail) -> bool {
        let arena = self.arena;
        let stmt = arena.unwrap_transparent(stmt);
        if !matches!(
            arena.try_expr(stmt).map(|e| e.kind),
            Some(SrcKind::If { .. } | SrcKind::Switch { .. })
        ) {
            return false;
        }
        let fx = Effects::of(arena, &[stmt]);
        if fx.returns {
            return true;
        }
        matches!(tail, Tail::Step)
            && (fx.has_exits()
                || !fx.outer_assigned().is_empty()
                || !fx.outer_nested_assigned().is_empty())
    }

    fn lower_split(&mut self, stmt: SrcId, rest: &[SrcId], tail: &Tail) -> TargetNode {
        let stmt = self.arena.unwrap_transparent(stmt);
        self.with_node(stmt, |this, expr| match expr.kind {
            SrcKind::If {
                cond,
                then_branch,
                else_branch,
            } => this.lower_if(cond, then_branch, else_branch, rest, tail, expr.span),
            SrcKind::Switch { .. } => this.lower_switch(stmt, rest, tail),
            _ => this.lower_stmt(stmt),
        })
    }

    /// Convert `body` followed by `rest` in a fresh naming scope.
    ///
    /// `rest` is dropped when `body` never falls through.
    pub(crate) fn lower_branch(
        &mut self,
        body: SrcId,
        rest: &[SrcId],
        tail: &Tail,
        span: Span,
    ) -> TargetNode {
        let arena = self.arena;
        let mut stmts: SmallVec<[SrcId; 8]> = flat_stmts(arena, body);
        if !always_exits(arena, body) {
            stmts.extend_from_slice(rest);
        }
        let span = arena.try_expr(body).map_or(span, |e| e.span);
        self.names.push_scope();
        let node = self.lower_seq(&stmts, tail, span);
        self.names.pop_scope();
        node
    }

    fn lower_stmt(&mut self, stmt: SrcId) -> TargetNode {
        let stmt = self.arena.unwrap_transparent(stmt);
        let Some(&expr) = self.arena.try_expr(stmt) else {
            return TargetNode::elided();
        };
        match expr.kind {
            SrcKind::If { .. } | SrcKind::Switch { .. } | SrcKind::Try { .. } => {
                let vars = self.rebind_vars(stmt);
                if vars.is_empty() {
                    self.lower_expr(stmt)
                } else {
                    self.with_node(stmt, |this, expr| this.lower_rebinding(stmt, expr.kind, vars))
                }
            }
            SrcKind::Unary {
                op,
                postfix,
                operand,
            } if op.is_update() => self.with_node(stmt, |this, expr| {
                this.lower_unary(op, postfix, operand, true, expr.span)
            }),
            _ => self.lower_expr(stmt),
        }
    }

    /// Outer variables a conditional statement writes and the code after it
    /// still reads, in id order.
    fn rebind_vars(&self, stmt: SrcId) -> Vec<VarId> {
        let fx = Effects::of(self.arena, &[stmt]);
        let written: BTreeSet<VarId> = fx
            .outer_assigned()
            .into_iter()
            .chain(fx.outer_nested_assigned())
            .collect();
        written
            .into_iter()
            .filter(|&v| self.knows_var(v) && self.used_after(v))
            .collect()
    }

    /// `{a, b} = if … do …; {a, b} else …; {a, b} end`
    fn lower_rebinding(&mut self, stmt: SrcId, kind: SrcKind, vars: Vec<VarId>) -> TargetNode {
        let span = self.arena.span(stmt);
        let pattern = self.rebind_pattern(&vars);
        let tail = Tail::Rebind(vars);
        let value = match kind {
            SrcKind::If {
                cond,
                then_branch,
                else_branch,
            } => self.lower_if(cond, then_branch, else_branch, &[], &tail, span),
            SrcKind::Switch { .. } => self.lower_switch(stmt, &[], &tail),
            SrcKind::Try { body, catches } => self.lower_try(body, catches, &tail, span),
            _ => return self.lower_expr(stmt),
        };
        TargetNode::match_(pattern, value).with_span(span)
    }

    fn rebind_pattern(&mut self, vars: &[VarId]) -> Pattern {
        let mut binds: Vec<Pattern> = vars
            .iter()
            .map(|&v| Pattern::Bind {
                name: self.bind_var(v),
                used: true,
            })
            .collect();
        if binds.len() == 1 {
            binds.pop().unwrap_or(Pattern::Wildcard)
        } else {
            Pattern::Tuple(binds)
        }
    }

    fn tail_node(&mut self, tail: &Tail, span: Span) -> Option<TargetNode> {
        match tail {
            Tail::Value => None,
            Tail::Rebind(vars) => {
                let mut refs: Vec<TargetNode> =
                    vars.iter().map(|&v| self.reference_var(v, span)).collect();
                Some(if refs.len() == 1 {
                    refs.pop().unwrap_or_else(TargetNode::nil)
                } else {
                    TargetNode::tuple(refs)
                })
            }
            Tail::Step => Some(self.step_continue(span)),
        }
    }

    // Declarations

    pub(crate) fn lower_decl(
        &mut self,
        id: SrcId,
        var: VarId,
        init: SrcId,
        span: Span,
    ) -> TargetNode {
        if self.consumed.contains(&id) || self.is_plan_elided(id) {
            tracing::debug!(var = self.arena.var_name(var), "declaration elided");
            return TargetNode::elided();
        }
        let arena = self.arena;
        let value = if init.is_valid() {
            self.lower_expr(init)
        } else {
            TargetNode::nil().with_span(span)
        };
        let name = self.bind_var(var);
        if value.as_var() == Some(name.as_str()) {
            return TargetNode::elided();
        }

        let origin = if matches!(
            arena.try_expr(arena.unwrap_transparent(init)).map(|e| e.kind),
            Some(SrcKind::EnumParameter { .. })
        ) {
            DeclOrigin::PatternTemp
        } else if self.is_surfaced(&name) {
            DeclOrigin::PatternBinder
        } else {
            DeclOrigin::User
        };
        let used = self.used_after(var);
        TargetNode::match_(Pattern::Bind { name, used }, value)
            .with_span(span)
            .with_origin(origin)
    }
}
