use pretty_assertions::assert_eq;

use ember_diagnostic::Diagnostic;
use ember_ir::{
    for_each_node, BinaryOp, DeclOrigin, NodeFlags, Pattern, SrcId, TargetKind, TargetNode,
    VarId,
};

use super::*;
use crate::config::LowerConfig;
use crate::test_helpers::{init_tracing, show, Builder};

const COUNTER: &str = "Stream.iterate(0, fn n -> n + 1 end)";

fn lower_with(b: Builder, root: SrcId, config: &LowerConfig) -> (TargetNode, Vec<Diagnostic>) {
    init_tracing();
    let (arena, enums) = b.finish_with_enums();
    let mut ctx = LowerCtx::new(&arena, &enums, config, root);
    let node = ctx.lower_expr(root);
    (node, ctx.take_diagnostics())
}

fn lower(b: Builder, root: SrcId) -> TargetNode {
    let (node, diagnostics) = lower_with(b, root, &LowerConfig::default());
    assert!(diagnostics.is_empty(), "{diagnostics:?}");
    node
}

fn find(node: &TargetNode, pred: impl Fn(&TargetNode) -> bool) -> Option<&TargetNode> {
    let mut found = None;
    for_each_node(node, &mut |n| {
        if found.is_none() && pred(n) {
            found = Some(n);
        }
    });
    found
}

fn is_fold(node: &TargetNode) -> bool {
    matches!(
        &node.kind,
        TargetKind::Match { value, .. }
            if matches!(&value.kind, TargetKind::RemoteCall { name, .. } if name == "reduce_while")
    )
}

fn fold_in(node: &TargetNode) -> &TargetNode {
    let Some(fold) = find(node, is_fold) else {
        panic!("no fold in {}", show(node));
    };
    fold
}

fn repeat_in(node: &TargetNode) -> &TargetNode {
    let Some(repeat) = find(node, |n| matches!(n.kind, TargetKind::Repeat { .. })) else {
        panic!("no repetition in {}", show(node));
    };
    repeat
}

fn int_decl(b: &mut Builder, name: &str, value: i64) -> (VarId, SrcId) {
    let var = b.var(name);
    let init = b.int(value);
    (var, b.decl(var, init))
}

/// `var i = 0; var sum = 0; while (i < 10) { sum += i; ++i; }` plus `tail`.
fn summing_loop(b: &mut Builder, read_after: bool) -> SrcId {
    let (i, i_decl) = int_decl(b, "i", 0);
    let (sum, sum_decl) = int_decl(b, "sum", 0);
    let i_ref = b.local(i);
    let ten = b.int(10);
    let cond = b.lt(i_ref, ten);
    let i_ref = b.local(i);
    let add = b.assign_op(BinaryOp::Add, sum, i_ref);
    let advance = b.incr(i);
    let body = b.block(&[add, advance]);
    let while_ = b.while_loop(cond, body);
    let mut stmts = vec![i_decl, sum_decl, while_];
    if read_after {
        stmts.push(b.local(sum));
    }
    b.block(&stmts)
}

#[test]
fn while_loop_threads_written_variables() {
    let mut b = Builder::new();
    let root = summing_loop(&mut b, true);

    let expected = format!(
        "(i = 0; sum = 0; {{:ok, i, sum}} = Enum.reduce_while({COUNTER}, {{:ok, i, sum}}, \
         fn _, {{:ok, acc_i, acc_sum}} -> if acc_i < 10 do \
         (acc_sum = acc_sum + acc_i; acc_i = acc_i + 1; {{:cont, {{:ok, acc_i, acc_sum}}}}) \
         else {{:halt, {{:ok, acc_i, acc_sum}}}} end end); sum)"
    );
    assert_eq!(show(&lower(b, root)), expected);
}

#[test]
fn fold_result_marks_unread_variables() {
    let mut b = Builder::new();
    let root = summing_loop(&mut b, true);
    let node = lower(b, root);

    let fold = fold_in(&node);
    assert_eq!(fold.meta.origin, Some(DeclOrigin::LoopAccumulator));
    assert!(!fold.meta.flags.contains(NodeFlags::DISCARDABLE));
    let TargetKind::Match { pattern, .. } = &fold.kind else {
        unreachable!()
    };
    assert_eq!(
        **pattern,
        Pattern::Tuple(vec![
            Pattern::atom("ok"),
            Pattern::Bind {
                name: "i".into(),
                used: false,
            },
            Pattern::Bind {
                name: "sum".into(),
                used: true,
            },
        ])
    );
}

#[test]
fn fold_with_no_later_reads_is_discardable() {
    let mut b = Builder::new();
    let root = summing_loop(&mut b, false);
    let node = lower(b, root);

    let fold = fold_in(&node);
    assert!(fold.meta.flags.contains(NodeFlags::DISCARDABLE));
}

#[test]
fn condition_reads_are_carried_in_id_order() {
    let mut b = Builder::new();
    let (total, total_decl) = int_decl(&mut b, "total", 0);
    let (limit, limit_decl) = int_decl(&mut b, "limit", 10);
    let total_ref = b.local(total);
    let limit_ref = b.local(limit);
    let cond = b.lt(total_ref, limit_ref);
    let three = b.int(3);
    let add = b.assign_op(BinaryOp::Add, total, three);
    let body = b.block(&[add]);
    let while_ = b.while_loop(cond, body);
    let read = b.local(total);
    let root = b.block(&[total_decl, limit_decl, while_, read]);
    let node = lower(b, root);

    let expected = format!(
        "(total = 0; limit = 10; {{:ok, total, limit}} = Enum.reduce_while({COUNTER}, \
         {{:ok, total, limit}}, fn _, {{:ok, acc_total, acc_limit}} -> \
         if acc_total < acc_limit do (acc_total = acc_total + 3; \
         {{:cont, {{:ok, acc_total, acc_limit}}}}) \
         else {{:halt, {{:ok, acc_total, acc_limit}}}} end end); total)"
    );
    assert_eq!(show(&node), expected);

    let fold = fold_in(&node);
    let TargetKind::Match { pattern, .. } = &fold.kind else {
        unreachable!()
    };
    let Pattern::Tuple(items) = pattern.as_ref() else {
        unreachable!()
    };
    assert_eq!(
        items[2],
        Pattern::Bind {
            name: "limit".into(),
            used: false,
        }
    );
}

#[test]
fn break_halts_and_rest_continues() {
    let mut b = Builder::new();
    let (count, decl) = int_decl(&mut b, "count", 0);
    let one = b.int(1);
    let add = b.assign_op(BinaryOp::Add, count, one);
    let count_ref = b.local(count);
    let three = b.int(3);
    let over = b.binop(BinaryOp::Gt, count_ref, three);
    let brk = b.brk();
    let check = b.if_(over, brk, None);
    let body = b.block(&[add, check]);
    let cond = b.bool(true);
    let while_ = b.while_loop(cond, body);
    let read = b.local(count);
    let root = b.block(&[decl, while_, read]);

    let expected = format!(
        "(count = 0; {{:ok, count}} = Enum.reduce_while({COUNTER}, {{:ok, count}}, \
         fn _, {{:ok, acc_count}} -> if true do (acc_count = acc_count + 1; \
         if acc_count > 3 do {{:halt, {{:ok, acc_count}}}} else {{:cont, {{:ok, acc_count}}}} end) \
         else {{:halt, {{:ok, acc_count}}}} end end); count)"
    );
    assert_eq!(show(&lower(b, root)), expected);
}

#[test]
fn do_while_checks_condition_after_body() {
    let mut b = Builder::new();
    let (count, decl) = int_decl(&mut b, "count", 0);
    let one = b.int(1);
    let add = b.assign_op(BinaryOp::Add, count, one);
    let body = b.block(&[add]);
    let count_ref = b.local(count);
    let three = b.int(3);
    let cond = b.lt(count_ref, three);
    let loop_ = b.do_while(cond, body);
    let read = b.local(count);
    let root = b.block(&[decl, loop_, read]);

    let expected = format!(
        "(count = 0; {{:ok, count}} = Enum.reduce_while({COUNTER}, {{:ok, count}}, \
         fn _, {{:ok, acc_count}} -> (acc_count = acc_count + 1; \
         if acc_count < 3 do {{:cont, {{:ok, acc_count}}}} else {{:halt, {{:ok, acc_count}}}} end) \
         end); count)"
    );
    assert_eq!(show(&lower(b, root)), expected);
}

#[test]
fn continue_skips_rest_of_step() {
    let mut b = Builder::new();
    let (count, count_decl) = int_decl(&mut b, "count", 0);
    let (odd, odd_decl) = int_decl(&mut b, "odd", 0);
    let count_ref = b.local(count);
    let ten = b.int(10);
    let cond = b.lt(count_ref, ten);

    let advance = b.incr(count);
    let count_ref = b.local(count);
    let two = b.int(2);
    let rem = b.binop(BinaryOp::Mod, count_ref, two);
    let zero = b.int(0);
    let even = b.binop(BinaryOp::Eq, rem, zero);
    let cont = b.cont();
    let skip = b.if_(even, cont, None);
    let bump = b.incr(odd);
    let body = b.block(&[advance, skip, bump]);
    let while_ = b.while_loop(cond, body);
    let read = b.local(odd);
    let root = b.block(&[count_decl, odd_decl, while_, read]);

    let expected = format!(
        "(count = 0; odd = 0; {{:ok, count, odd}} = Enum.reduce_while({COUNTER}, \
         {{:ok, count, odd}}, fn _, {{:ok, acc_count, acc_odd}} -> if acc_count < 10 do \
         (acc_count = acc_count + 1; if rem(acc_count, 2) == 0 do \
         {{:cont, {{:ok, acc_count, acc_odd}}}} else \
         (acc_odd = acc_odd + 1; {{:cont, {{:ok, acc_count, acc_odd}}}}) end) \
         else {{:halt, {{:ok, acc_count, acc_odd}}}} end end); odd)"
    );
    assert_eq!(show(&lower(b, root)), expected);
}

#[test]
fn range_scaffold_with_outer_writes_is_bounded_fold() {
    let mut b = Builder::new();
    let (total, total_decl) = int_decl(&mut b, "total", 0);
    let index = b.gen_var("_g");
    let zero = b.int(0);
    let index_decl = b.decl(index, zero);
    let index_ref = b.local(index);
    let three = b.int(3);
    let cond = b.lt(index_ref, three);
    let i = b.var("i");
    let read = b.post_incr(index);
    let i_decl = b.decl(i, read);
    let i_ref = b.local(i);
    let add = b.assign_op(BinaryOp::Add, total, i_ref);
    let body = b.block(&[i_decl, add]);
    let while_ = b.while_loop(cond, body);
    let total_ref = b.local(total);
    let root = b.block(&[total_decl, index_decl, while_, total_ref]);

    assert_eq!(
        show(&lower(b, root)),
        "(total = 0; {:ok, total} = Enum.reduce_while(0..2, {:ok, total}, \
         fn i, {:ok, acc_total} -> (acc_total = acc_total + i; {:cont, {:ok, acc_total}}) end); \
         total)"
    );
}

#[test]
fn overwritten_field_is_marked_unread() {
    let mut b = Builder::new();
    let (total, total_decl) = int_decl(&mut b, "total", 0);
    let (last, last_decl) = int_decl(&mut b, "last", -1);
    let index = b.gen_var("_g");
    let zero = b.int(0);
    let index_decl = b.decl(index, zero);
    let index_ref = b.local(index);
    let three = b.int(3);
    let cond = b.lt(index_ref, three);
    let i = b.var("i");
    let read = b.post_incr(index);
    let i_decl = b.decl(i, read);
    let i_ref = b.local(i);
    let keep = b.assign_local(last, i_ref);
    let i_ref = b.local(i);
    let add = b.assign_op(BinaryOp::Add, total, i_ref);
    let body = b.block(&[i_decl, keep, add]);
    let while_ = b.while_loop(cond, body);
    let total_ref = b.local(total);
    let last_ref = b.local(last);
    let sum = b.add(total_ref, last_ref);
    let root = b.block(&[total_decl, last_decl, index_decl, while_, sum]);
    let node = lower(b, root);

    let fold = fold_in(&node);
    let TargetKind::Match { value, .. } = &fold.kind else {
        unreachable!()
    };
    let TargetKind::RemoteCall { args, .. } = &value.kind else {
        unreachable!()
    };
    let Some(TargetKind::Fn { clauses }) = args.last().map(|n| &n.kind) else {
        panic!("no step function in {}", show(fold));
    };
    assert_eq!(
        clauses[0].params[1],
        Pattern::Tuple(vec![
            Pattern::atom("ok"),
            Pattern::Bind {
                name: "acc_total".into(),
                used: true,
            },
            Pattern::Bind {
                name: "acc_last".into(),
                used: false,
            },
        ])
    );
}

// Fallbacks

#[test]
fn return_inside_loop_stays_opaque() {
    let mut b = Builder::new();
    let (count, decl) = int_decl(&mut b, "count", 0);
    let one = b.int(1);
    let add = b.assign_op(BinaryOp::Add, count, one);
    let count_ref = b.local(count);
    let ret = b.ret(count_ref);
    let body = b.block(&[add, ret]);
    let cond = b.bool(true);
    let while_ = b.while_loop(cond, body);
    let root = b.block(&[decl, while_]);
    let node = lower(b, root);

    assert!(find(&node, is_fold).is_none());
    let repeat = repeat_in(&node);
    assert!(repeat.meta.flags.contains(NodeFlags::FALLBACK));
}

#[test]
fn write_from_closure_stays_opaque() {
    let mut b = Builder::new();
    let (count, decl) = int_decl(&mut b, "count", 0);
    let one = b.int(1);
    let assign = b.assign_local(count, one);
    let fn_body = b.block(&[assign]);
    let closure = b.function(&[], fn_body);
    let callee = b.global("defer");
    let call = b.call(callee, &[closure]);
    let body = b.block(&[call]);
    let cond = b.bool(true);
    let while_ = b.while_loop(cond, body);
    let root = b.block(&[decl, while_]);
    let node = lower(b, root);

    let repeat = repeat_in(&node);
    assert!(repeat.meta.flags.contains(NodeFlags::FALLBACK));
}

#[test]
fn loop_without_outer_writes_is_plain_repetition() {
    let mut b = Builder::new();
    let cond = b.global("running");
    let one = b.int(1);
    let callee = b.global("trace");
    let call = b.call(callee, &[one]);
    let body = b.block(&[call]);
    let root = b.while_loop(cond, body);

    let node = lower(b, root);
    assert_eq!(show(&node), "while running do trace(1) end");
    assert!(!node.meta.flags.contains(NodeFlags::FALLBACK));
}

#[test]
fn disabled_recovery_never_threads() {
    let mut b = Builder::new();
    let root = summing_loop(&mut b, true);
    let config = LowerConfig::default().without_loop_recovery();

    let (node, _) = lower_with(b, root, &config);
    assert!(find(&node, is_fold).is_none());
    assert!(find(&node, |n| matches!(n.kind, TargetKind::Repeat { .. })).is_some());
}

// Entry point

#[test]
fn thread_state_lowers_other_nodes_unchanged() {
    let mut b = Builder::new();
    let root = b.int(7);
    let (arena, enums) = b.finish_with_enums();
    let config = LowerConfig::default();
    let mut ctx = LowerCtx::new(&arena, &enums, &config, root);

    assert_eq!(show(&thread_state(&mut ctx, root)), "7");
}

#[test]
fn thread_state_rewrites_loop_in_scope() {
    let mut b = Builder::new();
    let (n, decl) = int_decl(&mut b, "n", 0);
    let n_ref = b.local(n);
    let five = b.int(5);
    let cond = b.lt(n_ref, five);
    let advance = b.incr(n);
    let body = b.block(&[advance]);
    let while_ = b.while_loop(cond, body);
    let root = b.block(&[decl, while_]);
    let (arena, enums) = b.finish_with_enums();
    let config = LowerConfig::default();
    let mut ctx = LowerCtx::new(&arena, &enums, &config, root);

    // Bind `n` first, as the enclosing sequence would.
    let _ = ctx.lower_expr(decl);
    let node = thread_state(&mut ctx, while_);
    assert!(is_fold(&node));
    assert!(ctx.diagnostics().is_empty());
}
