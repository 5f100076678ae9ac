use pretty_assertions::assert_eq;

use ember_ir::{BinaryOp, SrcArena, SrcId, VarId};

use super::*;
use crate::analysis::DeclIndex;
use crate::test_helpers::Builder;

/// A scaffolded loop plus the ids tests inspect.
struct Scaffold {
    arena: SrcArena,
    root: SrcId,
    cond: SrcId,
    body: SrcId,
}

impl Scaffold {
    fn classify(&self) -> LoopSignature {
        let decls = DeclIndex::build(&self.arena, self.root);
        classify(&self.arena, &decls, self.cond, self.body)
    }
}

/// `var _g = 0; var _g1 = source; while (_g < _g1.length) { var elem = _g1[_g]; ++_g; rest… }`
fn over_collection(
    mut b: Builder,
    source: SrcId,
    elem: VarId,
    rest: &[SrcId],
    before: &[SrcId],
) -> Scaffold {
    let index = b.gen_var("_g");
    let zero = b.int(0);
    let index_decl = b.decl(index, zero);
    let copy = b.gen_array_var("_g1");
    let copy_decl = b.decl(copy, source);

    let index_ref = b.local(index);
    let copy_ref = b.local(copy);
    let len = b.length(copy_ref);
    let cond = b.lt(index_ref, len);

    let copy_ref = b.local(copy);
    let index_ref = b.local(index);
    let read = b.index(copy_ref, index_ref);
    let elem_decl = b.decl(elem, read);
    let advance = b.incr(index);
    let mut stmts = vec![elem_decl, advance];
    stmts.extend_from_slice(rest);
    let body = b.block(&stmts);
    let while_ = b.while_loop(cond, body);

    let mut all = before.to_vec();
    all.extend([index_decl, copy_decl, while_]);
    let root = b.block(&all);
    Scaffold {
        arena: b.finish(),
        root,
        cond,
        body,
    }
}

/// `var _g = start; while (_g < end) { var elem = _g++; rest… }`
fn over_range(
    mut b: Builder,
    start: i64,
    end: i64,
    elem: VarId,
    rest: &[SrcId],
    before: &[SrcId],
) -> Scaffold {
    let index = b.gen_var("_g");
    let start = b.int(start);
    let index_decl = b.decl(index, start);
    let index_ref = b.local(index);
    let end = b.int(end);
    let cond = b.lt(index_ref, end);
    let read = b.post_incr(index);
    let elem_decl = b.decl(elem, read);
    let mut stmts = vec![elem_decl];
    stmts.extend_from_slice(rest);
    let body = b.block(&stmts);
    let while_ = b.while_loop(cond, body);

    let mut all = before.to_vec();
    all.extend([index_decl, while_]);
    let root = b.block(&all);
    Scaffold {
        arena: b.finish(),
        root,
        cond,
        body,
    }
}

/// `v % 2 == 0`
fn is_even(b: &mut Builder, value: SrcId) -> SrcId {
    let two = b.int(2);
    let rem = b.binop(BinaryOp::Mod, value, two);
    let zero = b.int(0);
    b.binop(BinaryOp::Eq, rem, zero)
}

#[test]
fn doubling_loop_is_a_map() {
    let mut b = Builder::new();
    let acc = b.gen_array_var("_acc");
    let empty = b.array(&[]);
    let acc_decl = b.decl(acc, empty);
    let source = b.int_array(&[1, 2, 3]);
    let v = b.var("v");
    let v_ref = b.local(v);
    let two = b.int(2);
    let doubled = b.binop(BinaryOp::Mul, v_ref, two);
    let push = b.push(acc, doubled);

    let scaffold = over_collection(b, source, v, &[push], &[acc_decl]);
    let sig = scaffold.classify();
    assert_eq!(sig.kind, LoopKind::Map);
    assert_eq!(sig.elem_var(), Some(v));
    assert_eq!(sig.source, Some(LoopSource::Collection(source)));
    assert_eq!(sig.body, doubled);
    assert_eq!(sig.accumulator, Some(acc));
    assert_eq!(sig.scaffold_vars.len(), 2);
    assert!(sig.prefix.is_empty());
}

#[test]
fn conditional_push_over_range_is_a_filter() {
    let mut b = Builder::new();
    let acc = b.gen_array_var("_acc");
    let v = b.var("v");
    let v_ref = b.local(v);
    let cond = is_even(&mut b, v_ref);
    let v_ref = b.local(v);
    let push = b.push(acc, v_ref);
    let then = b.block(&[push]);
    let if_ = b.if_(cond, then, None);

    let scaffold = over_range(b, 0, 10, v, &[if_], &[]);
    let sig = scaffold.classify();
    assert_eq!(sig.kind, LoopKind::Filter);
    assert_eq!(sig.filter, cond);
    assert_eq!(sig.body, v_ref);
    assert_eq!(
        sig.source,
        Some(LoopSource::Range {
            start: 0,
            end: RangeEnd::Literal(9),
        })
    );
}

#[test]
fn push_with_else_threads_the_accumulator() {
    let mut b = Builder::new();
    let acc = b.gen_array_var("_acc");
    let v = b.var("v");
    let v_ref = b.local(v);
    let cond = is_even(&mut b, v_ref);
    let v_ref = b.local(v);
    let push = b.push(acc, v_ref);
    let other = b.int(0);
    let if_ = b.if_(cond, push, Some(other));

    let sig = over_range(b, 0, 10, v, &[if_], &[]).classify();
    assert_eq!(sig.kind, LoopKind::Reduce);
    assert_eq!(sig.threaded, vec![acc]);
}

#[test]
fn accumulating_loop_is_a_reduce() {
    let mut b = Builder::new();
    let total = b.var("total");
    let zero = b.int(0);
    let total_decl = b.decl(total, zero);
    let xs = b.array_var("xs");
    let source = b.local(xs);
    let x = b.var("x");
    let x_ref = b.local(x);
    let add = b.assign_op(BinaryOp::Add, total, x_ref);

    let sig = over_collection(b, source, x, &[add], &[total_decl]).classify();
    assert_eq!(sig.kind, LoopKind::Reduce);
    assert_eq!(sig.threaded, vec![total]);
    assert_eq!(sig.source, Some(LoopSource::Collection(source)));
    assert_eq!(sig.rest.as_slice(), &[add]);
}

#[test]
fn closure_write_keeps_loop_opaque() {
    let mut b = Builder::new();
    let total = b.var("total");
    let zero = b.int(0);
    let total_decl = b.decl(total, zero);
    let x = b.var("x");
    let x_ref = b.local(x);
    let assign = b.assign_local(total, x_ref);
    let body = b.block(&[assign]);
    let closure = b.function(&[], body);

    let sig = over_range(b, 0, 3, x, &[closure], &[total_decl]).classify();
    assert_eq!(sig.kind, LoopKind::Opaque);
    assert!(sig.has_scaffold());
}

#[test]
fn index_read_in_body_rejects_scaffold() {
    let mut b = Builder::new();
    let total = b.var("total");
    let v = b.var("v");
    let index = b.gen_var("_g");
    let zero = b.int(0);
    let index_decl = b.decl(index, zero);
    let index_ref = b.local(index);
    let three = b.int(3);
    let cond = b.lt(index_ref, three);
    let read = b.post_incr(index);
    let elem_decl = b.decl(v, read);
    let leak = b.local(index);
    let assign = b.assign_local(total, leak);
    let body = b.block(&[elem_decl, assign]);
    let while_ = b.while_loop(cond, body);
    let root = b.block(&[index_decl, while_]);
    let arena = b.finish();

    let decls = DeclIndex::build(&arena, root);
    let sig = classify(&arena, &decls, cond, body);
    assert_eq!(sig.kind, LoopKind::Opaque);
    assert!(!sig.has_scaffold());
}

#[test]
fn user_counter_is_not_a_scaffold() {
    let mut b = Builder::new();
    let i = b.var("i");
    let zero = b.int(0);
    let i_decl = b.decl(i, zero);
    let i_ref = b.local(i);
    let ten = b.int(10);
    let cond = b.lt(i_ref, ten);
    let v = b.var("v");
    let read = b.post_incr(i);
    let v_decl = b.decl(v, read);
    let body = b.block(&[v_decl]);
    let while_ = b.while_loop(cond, body);
    let root = b.block(&[i_decl, while_]);
    let arena = b.finish();

    let sig = classify(&arena, &DeclIndex::build(&arena, root), cond, body);
    assert_eq!(sig.kind, LoopKind::Opaque);
    assert!(sig.source.is_none());
}

#[test]
fn malformed_loops_classify_as_opaque() {
    let mut b = Builder::new();
    let cond = b.bool(true);
    let empty = b.block(&[]);
    let root = b.while_loop(cond, empty);
    let arena = b.finish();
    let decls = DeclIndex::build(&arena, root);

    assert_eq!(classify(&arena, &decls, cond, empty).kind, LoopKind::Opaque);
    assert_eq!(
        classify(&arena, &decls, SrcId::INVALID, SrcId::INVALID).kind,
        LoopKind::Opaque
    );
    assert_eq!(
        classify(&arena, &decls, SrcId::new(9_999), SrcId::new(9_998)).kind,
        LoopKind::Opaque
    );
}

#[test]
fn body_without_work_is_opaque() {
    let mut b = Builder::new();
    let v = b.var("v");
    let sig = over_range(b, 0, 3, v, &[], &[]).classify();
    assert_eq!(sig.kind, LoopKind::Opaque);
    assert!(sig.has_scaffold());
    assert!(sig.rest.is_empty());
}

#[test]
fn range_bound_through_temporary() {
    let mut b = Builder::new();
    let n = b.var("n");
    let index = b.gen_var("_g");
    let zero = b.int(0);
    let index_decl = b.decl(index, zero);
    let bound = b.gen_var("_g1");
    let n_ref = b.local(n);
    let bound_decl = b.decl(bound, n_ref);
    let index_ref = b.local(index);
    let bound_ref = b.local(bound);
    let cond = b.lt(index_ref, bound_ref);
    let i = b.var("i");
    let read = b.post_incr(index);
    let i_decl = b.decl(i, read);
    let trace = b.global("trace");
    let i_ref = b.local(i);
    let call = b.call(trace, &[i_ref]);
    let body = b.block(&[i_decl, call]);
    let while_ = b.while_loop(cond, body);
    let root = b.block(&[index_decl, bound_decl, while_]);
    let arena = b.finish();

    let sig = classify(&arena, &DeclIndex::build(&arena, root), cond, body);
    assert_eq!(sig.kind, LoopKind::Opaque);
    assert_eq!(
        sig.source,
        Some(LoopSource::Range {
            start: 0,
            end: RangeEnd::Expr(n_ref),
        })
    );
    assert_eq!(sig.scaffold_vars.as_slice(), &[index, bound]);
}

#[test]
fn for_loop_body_is_classified() {
    let mut b = Builder::new();
    let acc = b.gen_array_var("_acc");
    let xs = b.array_var("xs");
    let iter = b.local(xs);
    let x = b.var("x");
    let x_ref = b.local(x);
    let one = b.int(1);
    let value = b.add(x_ref, one);
    let push = b.push(acc, value);
    let body = b.block(&[push]);
    let arena = b.finish();

    let sig = classify_for(&arena, x, iter, body);
    assert_eq!(sig.kind, LoopKind::Map);
    assert_eq!(sig.elem_var(), Some(x));
    assert_eq!(sig.source, Some(LoopSource::Collection(iter)));
}

// Unrolled

/// `var acc = []; if (k % 2 == 0) acc.push(k); … ; acc;` for `k` in `range`.
fn unrolled_filter(b: &mut Builder, acc: VarId, range: std::ops::Range<i64>) -> Vec<SrcId> {
    let empty = b.array(&[]);
    let mut stmts = vec![b.decl(acc, empty)];
    for k in range {
        let lit = b.int(k);
        let cond = is_even(b, lit);
        let value = b.int(k);
        let push = b.push(acc, value);
        stmts.push(b.if_(cond, push, None));
    }
    stmts.push(b.local(acc));
    stmts
}

#[test]
fn unrolled_filter_recovers_range_and_holes() {
    let mut b = Builder::new();
    let acc = b.gen_array_var("_g");
    let stmts = unrolled_filter(&mut b, acc, 0..10);
    let arena = b.finish();

    let Some(Unrolled::Filter(sig)) = classify_unrolled(&arena, &stmts) else {
        panic!("expected unrolled filter");
    };
    assert_eq!(sig.kind, LoopKind::Filter);
    assert_eq!(sig.accumulator, Some(acc));
    assert_eq!(
        sig.source,
        Some(LoopSource::Range {
            start: 0,
            end: RangeEnd::Literal(9),
        })
    );
    let Some(LoopElem::Holes(holes)) = &sig.elem else {
        panic!("expected holes");
    };
    // One in the condition, one in the pushed value.
    assert_eq!(holes.len(), 2);
}

#[test]
fn unrolled_filter_with_offset_start() {
    let mut b = Builder::new();
    let acc = b.gen_array_var("_g");
    let stmts = unrolled_filter(&mut b, acc, 5..8);
    let arena = b.finish();

    let Some(Unrolled::Filter(sig)) = classify_unrolled(&arena, &stmts) else {
        panic!("expected unrolled filter");
    };
    assert_eq!(
        sig.source,
        Some(LoopSource::Range {
            start: 5,
            end: RangeEnd::Literal(7),
        })
    );
}

#[test]
fn unrolled_filter_ending_at_integer_limit() {
    let mut b = Builder::new();
    let acc = b.gen_array_var("_g");
    let empty = b.array(&[]);
    let mut stmts = vec![b.decl(acc, empty)];
    for k in [i64::MAX - 1, i64::MAX] {
        let lit = b.int(k);
        let cond = is_even(&mut b, lit);
        let value = b.int(k);
        let push = b.push(acc, value);
        stmts.push(b.if_(cond, push, None));
    }
    stmts.push(b.local(acc));
    let arena = b.finish();

    let Some(Unrolled::Filter(sig)) = classify_unrolled(&arena, &stmts) else {
        panic!("expected unrolled filter");
    };
    assert_eq!(
        sig.source,
        Some(LoopSource::Range {
            start: i64::MAX - 1,
            end: RangeEnd::Literal(i64::MAX),
        })
    );
}

#[test]
fn non_consecutive_literals_are_not_a_filter() {
    let mut b = Builder::new();
    let acc = b.gen_array_var("_g");
    let empty = b.array(&[]);
    let mut stmts = vec![b.decl(acc, empty)];
    for k in [0, 1, 5] {
        let lit = b.int(k);
        let cond = is_even(&mut b, lit);
        let value = b.int(k);
        let push = b.push(acc, value);
        stmts.push(b.if_(cond, push, None));
    }
    stmts.push(b.local(acc));
    let arena = b.finish();

    assert!(classify_unrolled(&arena, &stmts).is_none());
}

#[test]
fn unconditional_pushes_form_a_list() {
    let mut b = Builder::new();
    let acc = b.gen_array_var("_g");
    let empty = b.array(&[]);
    let decl = b.decl(acc, empty);

    let inner = b.gen_array_var("_g1");
    let inner_stmts = unrolled_filter(&mut b, inner, 0..3);
    let nested = b.block(&inner_stmts);

    let one = b.int(1);
    let first = b.push(acc, one);
    let second = b.push(acc, nested);
    let tail = b.local(acc);
    let stmts = [decl, first, second, tail];
    let arena = b.finish();

    let Some(Unrolled::List { accumulator, items }) = classify_unrolled(&arena, &stmts) else {
        panic!("expected unrolled list");
    };
    assert_eq!(accumulator, acc);
    assert_eq!(items.len(), 2);
    assert!(matches!(items[0], UnrolledItem::Expr(id) if id == one));
    assert!(matches!(
        items[1],
        UnrolledItem::Nested(Unrolled::Filter(_))
    ));
}

#[test]
fn shape_without_trailing_read_is_not_unrolled() {
    let mut b = Builder::new();
    let acc = b.gen_array_var("_g");
    let mut stmts = unrolled_filter(&mut b, acc, 0..4);
    stmts.pop();
    let arena = b.finish();

    assert!(classify_unrolled(&arena, &stmts).is_none());
    assert!(classify_unrolled(&arena, &[]).is_none());
}
