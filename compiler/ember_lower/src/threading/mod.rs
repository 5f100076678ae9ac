//! State-threading rewriter.
//!
//! Turns a mutating loop into a fold that carries every outer variable the
//! body writes or the condition reads:
//!
//! ```text
//! {:ok, a, b} =
//!   Enum.reduce_while(Stream.iterate(0, fn n -> n + 1 end), {:ok, a, b},
//!     fn _, {:ok, acc_a, acc_b} ->
//!       if cond do … {:cont, {:ok, acc_a, acc_b}} else {:halt, {:ok, acc_a, acc_b}} end
//!     end)
//! ```
//!
//! Inside the step function the threaded variables are renamed to their
//! accumulator fields through clause overrides. `break` halts and
//! `continue` continues with the current fields. A conditional that writes
//! threaded state or exits takes the rest of the body into each branch, so
//! every path ends in exactly one control tuple.
//!
//! Loops the rewriter cannot prove it handles (writes from nested loops or
//! closures, `return`, writes through `this`, jumps in expression position)
//! stay opaque repetitions.

use rustc_hash::FxHashMap;

use ember_ir::{
    DeclOrigin, NodeFlags, Pattern, Span, SrcArena, SrcBinOp, SrcId, SrcKind, TargetBinOp,
    TargetKind, TargetNode, VarId,
};

use crate::analysis::{self, Effects};
use crate::context::{ClauseContext, LoopFrame, LowerCtx, StepFrame};
use crate::convert::{accumulator, Tail};
use crate::loops::{flat_stmts, LoopSignature};

/// Name of the control field leading every accumulator tuple.
const CONTROL: &str = "ok";

/// Rewrite the loop `id` as a fold, or convert it unchanged when it is not a
/// `while` loop.
pub fn thread_state(ctx: &mut LowerCtx<'_>, id: SrcId) -> TargetNode {
    match ctx.arena.try_expr(id).map(|e| e.kind) {
        Some(SrcKind::While { cond, body, eager }) => {
            ctx.with_node(id, |ctx, expr| thread_loop(ctx, cond, body, eager, expr.span))
        }
        _ => ctx.lower_expr(id),
    }
}

/// Why a loop cannot be threaded, if it cannot.
fn unthreadable(body: &Effects, cond: &Effects) -> Option<&'static str> {
    if !body.outer_nested_assigned().is_empty() {
        return Some("nested write");
    }
    if body.returns {
        return Some("return inside loop");
    }
    if body.non_local_write {
        return Some("non-local write");
    }
    if body.exit_in_expr {
        return Some("jump in expression position");
    }
    if !cond.assigned.is_empty() || cond.non_local_write || cond.has_exits() || cond.returns {
        return Some("condition has effects");
    }
    None
}

/// Unbounded `while`/`do … while` loop.
pub(crate) fn thread_loop(
    ctx: &mut LowerCtx<'_>,
    cond: SrcId,
    body: SrcId,
    eager: bool,
    span: Span,
) -> TargetNode {
    let arena = ctx.arena;
    let body_fx = Effects::of(arena, &[body]);
    let cond_fx = Effects::of(arena, &[cond]);
    if let Some(reason) = unthreadable(&body_fx, &cond_fx) {
        tracing::debug!(reason, "loop left opaque");
        return ctx
            .repeat(cond, body, eager, span)
            .with_flags(NodeFlags::FALLBACK);
    }

    // Written by the body or read by the condition, in id order.
    let mut threaded = body_fx.outer_assigned();
    threaded.extend(cond_fx.outer_reads());
    let vars: Vec<VarId> = threaded.into_iter().filter(|&v| ctx.knows_var(v)).collect();
    if vars.is_empty() {
        return ctx.repeat(cond, body, eager, span);
    }

    let source = TargetNode::remote_call(
        "Stream",
        "iterate",
        vec![
            TargetNode::int(0),
            TargetNode::lambda(
                vec![Pattern::bind("n")],
                TargetNode::binary(TargetBinOp::Add, TargetNode::var("n"), TargetNode::int(1)),
            ),
        ],
    );
    let fold = Fold {
        vars,
        elem: None,
        cond: Some(cond),
        check_first: eager,
        body: flat_stmts(arena, body).to_vec(),
    };
    build_fold(ctx, fold, source, span)
}

/// Bounded fold over a recognized iteration scaffold.
pub(crate) fn thread_bounded(
    ctx: &mut LowerCtx<'_>,
    sig: &LoopSignature,
    span: Span,
) -> TargetNode {
    let vars: Vec<VarId> = sig
        .threaded
        .iter()
        .copied()
        .filter(|&v| ctx.knows_var(v))
        .collect();
    let source = ctx.loop_source(sig, span);
    let fold = Fold {
        vars,
        elem: sig.elem_var(),
        cond: None,
        check_first: true,
        body: sig.rest.to_vec(),
    };
    build_fold(ctx, fold, source, span)
}

struct Fold {
    /// Threaded outer variables, in id order.
    vars: Vec<VarId>,
    elem: Option<VarId>,
    cond: Option<SrcId>,
    check_first: bool,
    body: Vec<SrcId>,
}

/// Whether the incoming accumulator field for `var` is read before the step
/// overwrites it. A `while` check and every exit or fall-through path hand
/// the current field back, so only an unconditional top-level write that
/// precedes all of those leaves it unread.
fn field_read(arena: &SrcArena, fold: &Fold, var: VarId) -> bool {
    if fold.check_first && fold.cond.is_some() {
        return true;
    }
    for &stmt in &fold.body {
        if let Some(value) = plain_write(arena, stmt, var) {
            return analysis::mentions_var(arena, value, var);
        }
        if analysis::mentions_var(arena, stmt, var) || Effects::of(arena, &[stmt]).has_exits() {
            return true;
        }
    }
    true
}

/// The assigned value when `stmt` is `var = value`.
fn plain_write(arena: &SrcArena, stmt: SrcId, var: VarId) -> Option<SrcId> {
    match arena.try_expr(arena.unwrap_transparent(stmt))?.kind {
        SrcKind::Binary {
            op: SrcBinOp::Assign,
            left,
            right,
        } if analysis::local_of(arena, left) == Some(var) => Some(right),
        _ => None,
    }
}

fn control_tuple(items: impl IntoIterator<Item = Pattern>) -> Pattern {
    let mut all = vec![Pattern::atom(CONTROL)];
    all.extend(items);
    Pattern::Tuple(all)
}

fn build_fold(ctx: &mut LowerCtx<'_>, fold: Fold, source: TargetNode, span: Span) -> TargetNode {
    let arena = ctx.arena;

    // Outer side
    let mut init = vec![TargetNode::atom(CONTROL)];
    let mut outer = Vec::with_capacity(fold.vars.len());
    for &var in &fold.vars {
        init.push(ctx.reference_var(var, span));
        outer.push(ctx.bind_var(var));
    }
    let init = TargetNode::tuple(init);

    // Step function
    ctx.names.push_scope();
    let fields: Vec<String> = outer
        .iter()
        .map(|name| ctx.fresh_name(&format!("acc_{name}")))
        .collect();
    let overrides: FxHashMap<VarId, String> =
        fold.vars.iter().copied().zip(fields.iter().cloned()).collect();
    ctx.push_clause(ClauseContext::with_overrides(overrides));

    let elem_pattern = match fold.elem {
        Some(var) => Pattern::Bind {
            name: ctx.bind_var(var),
            used: fold.body.iter().any(|&s| analysis::mentions_var(arena, s, var)),
        },
        None => Pattern::Wildcard,
    };
    let acc_pattern = control_tuple(fold.vars.iter().zip(&fields).map(|(&var, field)| {
        Pattern::Bind {
            name: field.clone(),
            used: field_read(arena, &fold, var),
        }
    }));

    ctx.push_loop(LoopFrame::Step(StepFrame {
        fields: fields.clone(),
        cond: fold.cond,
        check_first: fold.check_first,
    }));
    let step = match fold.cond {
        Some(cond) if fold.check_first => {
            let test = ctx.lower_expr(cond);
            let seq = ctx.lower_seq(&fold.body, &Tail::Step, span);
            let halt = TargetNode::tuple(vec![
                TargetNode::atom("halt"),
                accumulator(&fields),
            ]);
            TargetNode::new(
                TargetKind::If {
                    cond: Box::new(test),
                    then_branch: Box::new(seq),
                    else_branch: Some(Box::new(halt)),
                },
                span,
            )
        }
        _ => ctx.lower_seq(&fold.body, &Tail::Step, span),
    };
    ctx.pop_loop();
    ctx.pop_clause();
    ctx.names.pop_scope();

    let step_fn = TargetNode::lambda(vec![elem_pattern, acc_pattern], step);
    let call = TargetNode::remote_call("Enum", "reduce_while", vec![source, init, step_fn]);

    // Results
    let binds: Vec<Pattern> = fold
        .vars
        .iter()
        .zip(outer)
        .map(|(&var, name)| Pattern::Bind {
            name,
            used: ctx.used_after(var),
        })
        .collect();
    let all_unused = binds
        .iter()
        .all(|b| matches!(b, Pattern::Bind { used: false, .. }));
    let node = TargetNode::match_(control_tuple(binds), call)
        .with_span(span)
        .with_origin(DeclOrigin::LoopAccumulator);
    tracing::debug!(threaded = fields.len(), "loop threaded");
    if all_unused {
        node.with_flags(NodeFlags::DISCARDABLE)
    } else {
        node
    }
}

#[cfg(test)]
mod tests;
