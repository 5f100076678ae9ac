//! Loops.
//!
//! A loop statement whose signature the detector recognizes is planned
//! before its sequence is converted, so the scaffold declarations ahead of
//! it can be dropped. Collecting loops become comprehensions, reducing
//! loops become folds, and everything else goes to the state-threading
//! rewriter or stays an opaque repetition.

use rustc_hash::FxHashMap;

use ember_ir::{
    Generator, NodeFlags, Pattern, Span, SrcArena, SrcId, SrcKind, TargetBinOp, TargetKind,
    TargetNode, VarId,
};

use super::Tail;
use crate::analysis::{self, Effects};
use crate::context::{LoopFrame, LowerCtx};
use crate::loops::{
    classify, classify_for, classify_unrolled, flat_stmts, LoopElem, LoopKind, LoopSignature,
    LoopSource, RangeEnd, Unrolled, UnrolledItem,
};
use crate::threading;

/// Where the collected list of a comprehension goes.
#[derive(Copy, Clone, Debug)]
pub(super) enum Collect {
    /// The comprehension is the sequence's value.
    Yield,
    /// `acc = for …`, replacing the empty declaration.
    Bind(VarId),
    /// `acc = acc ++ for …`
    Append(VarId),
    None,
}

#[derive(Clone, Debug)]
pub(super) struct LoopPlan {
    sig: LoopSignature,
    collect: Collect,
}

fn is_decl_of(arena: &SrcArena, stmt: SrcId, var: VarId) -> bool {
    matches!(
        arena.try_expr(arena.unwrap_transparent(stmt)).map(|e| e.kind),
        Some(SrcKind::VarDecl { var: v, .. }) if v == var
    )
}

fn is_empty_array(arena: &SrcArena, id: SrcId) -> bool {
    matches!(
        arena.try_expr(arena.unwrap_transparent(id)).map(|e| e.kind),
        Some(SrcKind::ArrayDecl(items)) if items.is_empty()
    )
}

impl LowerCtx<'_> {
    /// Plan every recognizable loop statement of `stmts`, marking the
    /// statements the plans absorb as consumed.
    pub(super) fn plan_loops(
        &mut self,
        stmts: &[SrcId],
        tail: &Tail,
    ) -> FxHashMap<SrcId, LoopPlan> {
        let mut plans = FxHashMap::default();
        if !self.config.recover_loops {
            return plans;
        }
        let arena = self.arena;
        for (i, &stmt) in stmts.iter().enumerate() {
            let inner = arena.unwrap_transparent(stmt);
            let (sig, is_while) = match arena.try_expr(inner).map(|e| e.kind) {
                Some(SrcKind::While {
                    cond,
                    body,
                    eager: true,
                }) => (classify(arena, &self.decls, cond, body), true),
                Some(SrcKind::For { var, iter, body }) => {
                    (classify_for(arena, var, iter, body), false)
                }
                _ => continue,
            };
            let (before, after) = (&stmts[..i], &stmts[i + 1..]);
            let Some((plan, absorbed)) = self.plan_one(sig, is_while, before, after, tail) else {
                continue;
            };
            tracing::debug!(kind = ?plan.sig.kind, collect = ?plan.collect, "loop planned");
            self.consumed.extend(absorbed);
            plans.insert(stmt, plan);
        }
        plans
    }

    fn plan_one(
        &self,
        sig: LoopSignature,
        is_while: bool,
        before: &[SrcId],
        after: &[SrcId],
        tail: &Tail,
    ) -> Option<(LoopPlan, Vec<SrcId>)> {
        let arena = self.arena;
        if is_while && !sig.has_scaffold() {
            return None;
        }
        match sig.kind {
            LoopKind::Map | LoopKind::Filter => {}
            LoopKind::Reduce if is_while => {}
            LoopKind::Opaque if is_while && Effects::of(arena, &sig.rest).is_self_contained() => {}
            _ => return None,
        }

        // Scaffold temporaries: declared earlier here, unused afterwards.
        let mut absorbed = Vec::new();
        for &var in &sig.scaffold_vars {
            let decl = before.iter().copied().find(|&s| is_decl_of(arena, s, var))?;
            if after.iter().any(|&s| analysis::mentions_var(arena, s, var)) {
                return None;
            }
            absorbed.push(decl);
        }

        let collect = match (sig.is_collecting(), sig.accumulator) {
            (true, Some(acc)) => {
                let decl = before.iter().rposition(|&s| is_decl_of(arena, s, acc));
                let fresh = decl.filter(|&d| {
                    let init = match arena.try_expr(before[d]).map(|e| e.kind) {
                        Some(SrcKind::VarDecl { init, .. }) => init,
                        _ => SrcId::INVALID,
                    };
                    is_empty_array(arena, init)
                        && !before[d + 1..]
                            .iter()
                            .any(|&s| analysis::mentions_var(arena, s, acc))
                });
                match fresh {
                    Some(d) => {
                        absorbed.push(before[d]);
                        let yields = matches!(tail, Tail::Value)
                            && matches!(after, &[last]
                                if analysis::local_of(arena, last) == Some(acc));
                        if yields {
                            absorbed.push(after[0]);
                            Collect::Yield
                        } else {
                            Collect::Bind(acc)
                        }
                    }
                    None => Collect::Append(acc),
                }
            }
            (true, None) => return None,
            (false, _) => Collect::None,
        };
        Some((LoopPlan { sig, collect }, absorbed))
    }

    pub(super) fn lower_planned(&mut self, stmt: SrcId, plan: &LoopPlan) -> TargetNode {
        let stmt = self.arena.unwrap_transparent(stmt);
        self.with_node(stmt, |this, expr| {
            this.lower_signature(&plan.sig, plan.collect, expr.span)
        })
    }

    fn lower_signature(&mut self, sig: &LoopSignature, collect: Collect, span: Span) -> TargetNode {
        match sig.kind {
            LoopKind::Map | LoopKind::Filter => self.comprehension(sig, collect, span),
            LoopKind::Reduce => threading::thread_bounded(self, sig, span),
            LoopKind::Opaque => self.each(sig, span),
        }
    }

    /// Iteration source of a recognized scaffold.
    pub(crate) fn loop_source(&mut self, sig: &LoopSignature, span: Span) -> TargetNode {
        match sig.source {
            Some(LoopSource::Collection(id)) => self.lower_expr(id),
            Some(LoopSource::Range {
                start,
                end: RangeEnd::Literal(last),
            }) => {
                if last < start {
                    return TargetNode::list(Vec::new()).with_span(span);
                }
                TargetNode::new(
                    TargetKind::Range {
                        start: Box::new(TargetNode::int(start)),
                        end: Box::new(TargetNode::int(last)),
                    },
                    span,
                )
                .with_flags(NodeFlags::PURE)
            }
            // An exclusive bound may leave the range empty; the explicit
            // step keeps it from counting down.
            Some(LoopSource::Range {
                start,
                end: RangeEnd::Expr(bound),
            }) => {
                let bound = self.lower_expr(bound);
                let last = TargetNode::binary(TargetBinOp::Sub, bound, TargetNode::int(1));
                let args = vec![TargetNode::int(start), last, TargetNode::int(1)];
                TargetNode::remote_call("Range", "new", args).with_span(span)
            }
            None => TargetNode::nil().with_flags(NodeFlags::FALLBACK),
        }
    }

    fn elem_pattern(&mut self, sig: &LoopSignature, body: &[SrcId]) -> Pattern {
        let arena = self.arena;
        match sig.elem_var() {
            Some(var) => Pattern::Bind {
                name: self.bind_var(var),
                used: body.iter().any(|&s| analysis::mentions_var(arena, s, var)),
            },
            None => Pattern::Wildcard,
        }
    }

    /// `for elem <- source, filter, do: value`
    fn comprehension(&mut self, sig: &LoopSignature, collect: Collect, span: Span) -> TargetNode {
        let source = self.loop_source(sig, span);
        let mut stmts: Vec<SrcId> = sig.prefix.to_vec();
        stmts.push(sig.body);

        self.names.push_scope();
        let mut mentions = stmts.clone();
        mentions.push(sig.filter);
        let pattern = self.elem_pattern(sig, &mentions);
        let filters = if sig.filter.is_valid() {
            vec![self.lower_expr(sig.filter)]
        } else {
            Vec::new()
        };
        let body = self.lower_seq(&stmts, &Tail::Value, span);
        self.names.pop_scope();

        let node = TargetNode::new(
            TargetKind::For {
                generators: vec![Generator { pattern, source }],
                filters,
                body: Box::new(body),
            },
            span,
        );
        self.collect_into(node, collect, span)
    }

    fn collect_into(&mut self, node: TargetNode, collect: Collect, span: Span) -> TargetNode {
        match collect {
            Collect::Yield | Collect::None => node,
            Collect::Bind(acc) => {
                let name = self.bind_var(acc);
                let used = self.used_after(acc);
                TargetNode::match_(Pattern::Bind { name, used }, node).with_span(span)
            }
            Collect::Append(acc) => {
                let current = self.reference_var(acc, span);
                let value = TargetNode::binary(TargetBinOp::ListConcat, current, node);
                let name = self.bind_var(acc);
                let used = self.used_after(acc);
                TargetNode::match_(Pattern::Bind { name, used }, value).with_span(span)
            }
        }
    }

    /// `Enum.each(source, fn elem -> rest end)` for a body with no effect on
    /// outer state.
    fn each(&mut self, sig: &LoopSignature, span: Span) -> TargetNode {
        let source = self.loop_source(sig, span);
        self.push_loop(LoopFrame::Barrier);
        self.names.push_scope();
        let pattern = self.elem_pattern(sig, &sig.rest);
        let body = self.lower_seq(&sig.rest, &Tail::Value, span);
        self.names.pop_scope();
        self.pop_loop();
        let callback = TargetNode::lambda(vec![pattern], body);
        let node = TargetNode::remote_call("Enum", "each", vec![source, callback]).with_span(span);
        if Effects::of(self.arena, &sig.rest).is_self_contained() {
            node
        } else {
            node.with_flags(NodeFlags::FALLBACK)
        }
    }

    /// Opaque `while` repetition.
    pub(crate) fn repeat(
        &mut self,
        cond: SrcId,
        body: SrcId,
        eager: bool,
        span: Span,
    ) -> TargetNode {
        let cond = self.lower_expr(cond);
        self.push_loop(LoopFrame::Opaque);
        self.names.push_scope();
        let stmts = flat_stmts(self.arena, body);
        let body = self.lower_seq(&stmts, &Tail::Value, span);
        self.names.pop_scope();
        self.pop_loop();
        TargetNode::new(
            TargetKind::Repeat {
                cond: Box::new(cond),
                body: Box::new(body),
                check_first: eager,
            },
            span,
        )
    }

    /// A `while` that no enclosing sequence planned.
    pub(crate) fn lower_while(&mut self, id: SrcId, span: Span) -> TargetNode {
        let Some(SrcKind::While { cond, body, eager }) = self.arena.try_expr(id).map(|e| e.kind)
        else {
            return TargetNode::nil();
        };
        if !self.config.recover_loops {
            return self.repeat(cond, body, eager, span);
        }
        threading::thread_loop(self, cond, body, eager, span)
    }

    /// A `for` that no enclosing sequence planned.
    pub(crate) fn lower_for(
        &mut self,
        var: VarId,
        iter: SrcId,
        body: SrcId,
        span: Span,
    ) -> TargetNode {
        let sig = classify_for(self.arena, var, iter, body);
        if !self.config.recover_loops {
            return self.each(&sig, span);
        }
        match (sig.kind, sig.accumulator) {
            (LoopKind::Map | LoopKind::Filter, Some(acc)) => {
                self.comprehension(&sig, Collect::Append(acc), span)
            }
            (LoopKind::Reduce, _) => threading::thread_bounded(self, &sig, span),
            _ => self.each(&sig, span),
        }
    }

    // Unrolled comprehensions

    /// Recover `[acc = [], appends…, acc]` at the head of `stmts`.
    pub(super) fn lower_unrolled(&mut self, stmts: &[SrcId]) -> Option<TargetNode> {
        if !self.config.recover_loops || stmts.len() < 3 {
            return None;
        }
        let arena = self.arena;
        match arena.try_expr(stmts[0]).map(|e| e.kind) {
            Some(SrcKind::VarDecl { init, .. }) if is_empty_array(arena, init) => {}
            _ => return None,
        }
        let unrolled = classify_unrolled(arena, stmts)?;
        let span = arena.span(stmts[0]);
        Some(self.unrolled_node(&unrolled, span))
    }

    fn unrolled_node(&mut self, unrolled: &Unrolled, span: Span) -> TargetNode {
        match unrolled {
            Unrolled::List { items, .. } => {
                let items = items
                    .iter()
                    .map(|item| match item {
                        UnrolledItem::Expr(id) => self.lower_expr(*id),
                        UnrolledItem::Nested(nested) => self.unrolled_node(nested, span),
                    })
                    .collect();
                TargetNode::list(items).with_span(span)
            }
            Unrolled::Filter(sig) => {
                let Some(LoopElem::Holes(holes)) = &sig.elem else {
                    return TargetNode::nil().with_flags(NodeFlags::FALLBACK);
                };
                let source = self.loop_source(sig, span);
                self.names.push_scope();
                let name = self.fresh_name("v");
                for &hole in holes {
                    self.substitutions.insert(hole, name.clone());
                }
                let filter = self.lower_expr(sig.filter);
                let body = self.lower_expr(sig.body);
                for hole in holes {
                    self.substitutions.remove(hole);
                }
                self.names.pop_scope();
                TargetNode::new(
                    TargetKind::For {
                        generators: vec![Generator {
                            pattern: Pattern::Bind { name, used: true },
                            source,
                        }],
                        filters: vec![filter],
                        body: Box::new(body),
                    },
                    span,
                )
            }
        }
    }
}
