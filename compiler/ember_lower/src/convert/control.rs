//! Conditionals, jumps, exception handling and closures.

use ember_diagnostic::loop_control_outside_loop;
use ember_ir::{
    CaseClause, CatchRange, NodeFlags, Pattern, Span, SrcId, TargetKind, TargetNode, VarRange,
};

use super::Tail;
use crate::analysis;
use crate::context::{LoopFrame, LowerCtx, StepFrame};
use crate::loops::flat_stmts;

/// `{:ok, acc_a, acc_b}` from the frame's field names.
pub(crate) fn accumulator(fields: &[String]) -> TargetNode {
    let mut items = Vec::with_capacity(fields.len() + 1);
    items.push(TargetNode::atom("ok"));
    items.extend(fields.iter().map(TargetNode::var));
    TargetNode::tuple(items)
}

fn halt(fields: &[String]) -> TargetNode {
    TargetNode::tuple(vec![TargetNode::atom("halt"), accumulator(fields)])
}

fn cont(fields: &[String]) -> TargetNode {
    TargetNode::tuple(vec![TargetNode::atom("cont"), accumulator(fields)])
}

impl LowerCtx<'_> {
    /// Convert `if`. With a non-empty `rest` (or a non-value tail) the
    /// statements after the conditional continue inside both branches.
    pub(crate) fn lower_if(
        &mut self,
        cond: SrcId,
        then_branch: SrcId,
        else_branch: SrcId,
        rest: &[SrcId],
        tail: &Tail,
        span: Span,
    ) -> TargetNode {
        let cond = self.lower_expr(cond);
        let then_node = self.lower_branch(then_branch, rest, tail, span);
        let needs_else =
            else_branch.is_valid() || !rest.is_empty() || !matches!(tail, Tail::Value);
        let else_node = if needs_else {
            Some(Box::new(self.lower_branch(else_branch, rest, tail, span)))
        } else {
            None
        };
        TargetNode::new(
            TargetKind::If {
                cond: Box::new(cond),
                then_branch: Box::new(then_node),
                else_branch: else_node,
            },
            span,
        )
    }

    /// A `return` ends the enclosing function by being its last value. One
    /// inside a repeating loop has no such position.
    pub(crate) fn lower_return(&mut self, value: SrcId, span: Span) -> TargetNode {
        let node = if value.is_valid() {
            self.lower_expr(value)
        } else {
            TargetNode::nil().with_span(span)
        };
        if self.in_loop() {
            node.with_flags(NodeFlags::FALLBACK)
        } else {
            node
        }
    }

    pub(crate) fn lower_exit(&mut self, is_break: bool, span: Span) -> TargetNode {
        let keyword = if is_break { "break" } else { "continue" };
        match self.current_loop().cloned() {
            Some(LoopFrame::Step(frame)) => {
                if is_break {
                    halt(&frame.fields).with_span(span)
                } else {
                    self.continue_step(&frame, span)
                }
            }
            Some(LoopFrame::Opaque) => TargetNode::new(TargetKind::Raw(keyword.to_string()), span)
                .with_flags(NodeFlags::FALLBACK),
            Some(LoopFrame::Barrier) | None => {
                let diag = loop_control_outside_loop(span, keyword);
                self.error_node(diag, span)
            }
        }
    }

    /// Next-iteration value of the innermost fold step.
    pub(crate) fn step_continue(&mut self, span: Span) -> TargetNode {
        match self.current_loop().cloned() {
            Some(LoopFrame::Step(frame)) => self.continue_step(&frame, span),
            _ => TargetNode::nil().with_flags(NodeFlags::FALLBACK),
        }
    }

    /// `{:cont, acc}`. A post-checked loop re-tests its condition first.
    fn continue_step(&mut self, frame: &StepFrame, span: Span) -> TargetNode {
        match frame.cond {
            Some(cond) if !frame.check_first => {
                let test = self.lower_expr(cond);
                TargetNode::new(
                    TargetKind::If {
                        cond: Box::new(test),
                        then_branch: Box::new(cont(&frame.fields)),
                        else_branch: Some(Box::new(halt(&frame.fields))),
                    },
                    span,
                )
            }
            _ => cont(&frame.fields),
        }
    }

    pub(crate) fn lower_try(
        &mut self,
        body: SrcId,
        catches: CatchRange,
        tail: &Tail,
        span: Span,
    ) -> TargetNode {
        let arena = self.arena;
        let body = self.lower_branch(body, &[], tail, span);
        let mut rescue = Vec::new();
        for catch in arena.get_catches(catches) {
            self.names.push_scope();
            let pattern = if analysis::mentions_var(arena, catch.body, catch.var) {
                Pattern::bind(self.bind_var(catch.var))
            } else {
                Pattern::Wildcard
            };
            let stmts = flat_stmts(arena, catch.body);
            let handler = self.lower_seq(&stmts, tail, span);
            self.names.pop_scope();
            rescue.push(CaseClause {
                pattern,
                guard: None,
                body: handler,
            });
        }
        TargetNode::new(
            TargetKind::Try {
                body: Box::new(body),
                rescue,
            },
            span,
        )
    }

    /// Closures see the enclosing names but no enclosing loop.
    pub(crate) fn lower_function(
        &mut self,
        params: VarRange,
        body: SrcId,
        span: Span,
    ) -> TargetNode {
        let arena = self.arena;
        self.push_loop(LoopFrame::Barrier);
        self.names.push_scope();
        let params: Vec<Pattern> = arena
            .get_var_list(params)
            .iter()
            .map(|&p| Pattern::Bind {
                name: self.bind_var(p),
                used: analysis::mentions_var(arena, body, p),
            })
            .collect();
        let stmts = flat_stmts(arena, body);
        let body = self.lower_seq(&stmts, &Tail::Value, span);
        self.names.pop_scope();
        self.pop_loop();
        TargetNode::lambda(params, body).with_span(span)
    }
}
