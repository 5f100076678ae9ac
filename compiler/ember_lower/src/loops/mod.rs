//! Loop signature detection.
//!
//! Recognizes the index-loop scaffold the front-end emits for iteration
//! syntax:
//!
//! ```text
//! var _g = 0; var _g1 = xs;
//! while (_g < _g1.length) { var v = _g1[_g]; ++_g; <rest> }
//! ```
//!
//! and classifies `<rest>`:
//!
//! - **Map**: ends in an unconditional `acc.push(e)`.
//! - **Filter**: a single `if (c) acc.push(e)` with no else.
//! - **Reduce**: writes outer variables but nothing a fold cannot thread.
//! - **Opaque**: anything else, including every shape the detector cannot
//!   prove. Scaffold pieces that were recognized stay filled in.
//!
//! Classification never fails; malformed input classifies as `Opaque`.

mod unrolled;

use smallvec::SmallVec;

use ember_ir::{BinaryOp, SrcArena, SrcBinOp, SrcId, SrcKind, SrcUnaryOp, VarId};

use crate::analysis::{self, DeclIndex, Effects};

pub use unrolled::{classify_unrolled, Unrolled, UnrolledItem};

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum LoopKind {
    Map,
    Filter,
    Reduce,
    Opaque,
}

/// Upper bound of an integer range source.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum RangeEnd {
    /// Inclusive literal bound.
    Literal(i64),
    /// Exclusive bound expression; the range ends one before it.
    Expr(SrcId),
}

/// What the loop iterates.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum LoopSource {
    Collection(SrcId),
    Range { start: i64, end: RangeEnd },
}

/// How the current element is named inside the body.
#[derive(Clone, Eq, PartialEq, Debug)]
pub enum LoopElem {
    Var(VarId),
    /// Unrolled loops have no variable; these literal positions stand for
    /// the element.
    Holes(Vec<SrcId>),
}

/// Everything needed to rebuild a loop declaratively.
#[derive(Clone, Debug)]
pub struct LoopSignature {
    pub kind: LoopKind,
    pub elem: Option<LoopElem>,
    pub source: Option<LoopSource>,
    pub index: Option<VarId>,
    pub accumulator: Option<VarId>,
    /// Local statements evaluated before the appended value (Map/Filter).
    pub prefix: SmallVec<[SrcId; 4]>,
    /// Appended value (Map/Filter).
    pub body: SrcId,
    /// Filter condition, `SrcId::INVALID` unless `Filter`.
    pub filter: SrcId,
    /// Loop body after the element read and index advance.
    pub rest: SmallVec<[SrcId; 4]>,
    /// Outer variables a `Reduce` fold threads, ordered by id.
    pub threaded: Vec<VarId>,
    /// Front-end temporaries only the scaffold uses: index, collection and
    /// bound copies.
    pub scaffold_vars: SmallVec<[VarId; 3]>,
}

impl LoopSignature {
    pub fn opaque() -> Self {
        LoopSignature {
            kind: LoopKind::Opaque,
            elem: None,
            source: None,
            index: None,
            accumulator: None,
            prefix: SmallVec::new(),
            body: SrcId::INVALID,
            filter: SrcId::INVALID,
            rest: SmallVec::new(),
            threaded: Vec::new(),
            scaffold_vars: SmallVec::new(),
        }
    }

    /// Element variable, for scaffolds that bind one.
    pub fn elem_var(&self) -> Option<VarId> {
        match self.elem {
            Some(LoopElem::Var(var)) => Some(var),
            _ => None,
        }
    }

    /// The iteration scaffold was recognized, whatever the body does.
    pub fn has_scaffold(&self) -> bool {
        self.source.is_some() && self.elem.is_some()
    }

    pub fn is_collecting(&self) -> bool {
        matches!(self.kind, LoopKind::Map | LoopKind::Filter)
    }
}

/// Element and bound facts pulled from the loop header.
struct Header {
    index: VarId,
    source: LoopSource,
    scaffold_vars: SmallVec<[VarId; 3]>,
}

/// Classify a `while (cond) body` loop.
pub fn classify(arena: &SrcArena, decls: &DeclIndex, cond: SrcId, body: SrcId) -> LoopSignature {
    let sig = classify_inner(arena, decls, cond, body).unwrap_or_else(LoopSignature::opaque);
    tracing::debug!(
        kind = ?sig.kind,
        scaffold = sig.has_scaffold(),
        threaded = sig.threaded.len(),
        "loop signature"
    );
    sig
}

fn classify_inner(
    arena: &SrcArena,
    decls: &DeclIndex,
    cond: SrcId,
    body: SrcId,
) -> Option<LoopSignature> {
    let header = header(arena, decls, cond)?;
    let stmts = flat_stmts(arena, body);

    let (elem, consumed) = element(arena, &header, &stmts)?;
    let rest: SmallVec<[SrcId; 4]> = stmts[consumed..].iter().copied().collect();

    // The index is scaffold-only: one advance, no other reads.
    if decls.write_count(header.index) != 1
        || rest
            .iter()
            .any(|&s| analysis::mentions_var(arena, s, header.index))
    {
        return None;
    }

    let mut sig = LoopSignature {
        elem: Some(LoopElem::Var(elem)),
        source: Some(header.source),
        index: Some(header.index),
        scaffold_vars: header.scaffold_vars,
        ..LoopSignature::opaque()
    };
    classify_rest(arena, elem, rest, &mut sig);
    Some(sig)
}

/// Classify a source `for (var in iter) body` loop.
pub fn classify_for(arena: &SrcArena, var: VarId, iter: SrcId, body: SrcId) -> LoopSignature {
    let mut sig = LoopSignature {
        elem: Some(LoopElem::Var(var)),
        source: Some(LoopSource::Collection(iter)),
        ..LoopSignature::opaque()
    };
    let rest: SmallVec<[SrcId; 4]> = flat_stmts(arena, body).into_iter().collect();
    classify_rest(arena, var, rest, &mut sig);
    tracing::debug!(kind = ?sig.kind, "for-loop signature");
    sig
}

/// Statements of a body with nested statement blocks flattened.
pub(crate) fn flat_stmts(arena: &SrcArena, body: SrcId) -> SmallVec<[SrcId; 8]> {
    let mut out = SmallVec::new();
    flatten_into(arena, body, &mut out);
    out
}

fn flatten_into(arena: &SrcArena, id: SrcId, out: &mut SmallVec<[SrcId; 8]>) {
    match arena.try_expr(id).map(|e| e.kind) {
        Some(SrcKind::Block(range)) => {
            for &stmt in arena.get_expr_list(range) {
                flatten_into(arena, stmt, out);
            }
        }
        Some(_) => out.push(id),
        None => {}
    }
}

// Header

fn header(arena: &SrcArena, decls: &DeclIndex, cond: SrcId) -> Option<Header> {
    let SrcKind::Binary {
        op: SrcBinOp::Op(BinaryOp::Lt),
        left,
        right,
    } = arena.try_expr(arena.unwrap_transparent(cond))?.kind
    else {
        return None;
    };
    // A user-declared counter stays observable after the loop.
    let index = analysis::local_of(arena, left)?;
    if !analysis::is_generated(arena, index) {
        return None;
    }
    let start = analysis::int_literal(arena, decls.init(index)?)?;
    let mut scaffold_vars = smallvec::smallvec![index];

    let bound = arena.unwrap_transparent(right);
    let source = match arena.try_expr(bound)?.kind {
        SrcKind::Int(hi) => LoopSource::Range {
            start,
            end: RangeEnd::Literal(hi.saturating_sub(1)),
        },
        SrcKind::Field { receiver, field } if arena.name(field) == "length" => {
            collection(arena, decls, receiver, &mut scaffold_vars)
        }
        SrcKind::Local(var) if analysis::is_generated(arena, var) && !decls.is_reassigned(var) => {
            let init = decls.init(var)?;
            scaffold_vars.push(var);
            match arena.try_expr(arena.unwrap_transparent(init))?.kind {
                SrcKind::Field { receiver, field } if arena.name(field) == "length" => {
                    collection(arena, decls, receiver, &mut scaffold_vars)
                }
                SrcKind::Int(hi) => LoopSource::Range {
                    start,
                    end: RangeEnd::Literal(hi.saturating_sub(1)),
                },
                _ => LoopSource::Range {
                    start,
                    end: RangeEnd::Expr(init),
                },
            }
        }
        _ => LoopSource::Range {
            start,
            end: RangeEnd::Expr(bound),
        },
    };

    // Collections are walked from the front.
    if matches!(source, LoopSource::Collection(_)) && start != 0 {
        return None;
    }
    Some(Header {
        index,
        source,
        scaffold_vars,
    })
}

/// Resolve a collection temporary to the expression it copies.
fn collection(
    arena: &SrcArena,
    decls: &DeclIndex,
    receiver: SrcId,
    scaffold_vars: &mut SmallVec<[VarId; 3]>,
) -> LoopSource {
    if let Some(var) = analysis::local_of(arena, receiver) {
        if analysis::is_generated(arena, var) && !decls.is_reassigned(var) {
            if let Some(init) = decls.init(var) {
                scaffold_vars.push(var);
                return LoopSource::Collection(init);
            }
        }
    }
    LoopSource::Collection(receiver)
}

// Element read and advance

fn is_advance(arena: &SrcArena, stmt: SrcId, index: VarId) -> bool {
    let Some(expr) = arena.try_expr(arena.unwrap_transparent(stmt)) else {
        return false;
    };
    match expr.kind {
        SrcKind::Unary {
            op: SrcUnaryOp::Increment,
            operand,
            ..
        } => analysis::local_of(arena, operand) == Some(index),
        SrcKind::Binary {
            op: SrcBinOp::AssignOp(BinaryOp::Add),
            left,
            right,
        } => {
            analysis::local_of(arena, left) == Some(index)
                && analysis::int_literal(arena, right) == Some(1)
        }
        SrcKind::Binary {
            op: SrcBinOp::Assign,
            left,
            right,
        } => {
            analysis::local_of(arena, left) == Some(index)
                && matches!(
                    arena.try_expr(arena.unwrap_transparent(right)).map(|e| e.kind),
                    Some(SrcKind::Binary { op: SrcBinOp::Op(BinaryOp::Add), left: l, right: r })
                        if analysis::local_of(arena, l) == Some(index)
                            && analysis::int_literal(arena, r) == Some(1)
                )
        }
        _ => false,
    }
}

/// Find the element declaration and the index advance at the head of the
/// body. Returns the element variable and how many statements they take.
fn element(arena: &SrcArena, header: &Header, stmts: &[SrcId]) -> Option<(VarId, usize)> {
    let (&first, tail) = stmts.split_first()?;
    // The element read comes first; the advance follows unless it is folded
    // into the read (`var i = _g++`).
    let SrcKind::VarDecl { var, init } = arena.try_expr(first)?.kind else {
        return None;
    };
    let init = arena.unwrap_transparent(init);
    let init_kind = arena.try_expr(init)?.kind;
    match header.source {
        LoopSource::Collection(source) => {
            let SrcKind::Index { receiver, index } = init_kind else {
                return None;
            };
            if analysis::local_of(arena, index) != Some(header.index) {
                return None;
            }
            let reads_source = analysis::same_subject(arena, receiver, source)
                || analysis::local_of(arena, receiver)
                    .is_some_and(|v| header.scaffold_vars.contains(&v));
            if !reads_source {
                return None;
            }
            let &advance = tail.first()?;
            is_advance(arena, advance, header.index).then_some((var, 2))
        }
        LoopSource::Range { .. } => match init_kind {
            // `var i = _g++;`
            SrcKind::Unary {
                op: SrcUnaryOp::Increment,
                postfix: true,
                operand,
            } if analysis::local_of(arena, operand) == Some(header.index) => Some((var, 1)),
            SrcKind::Local(idx) if idx == header.index => {
                let &advance = tail.first()?;
                is_advance(arena, advance, header.index).then_some((var, 2))
            }
            _ => None,
        },
    }
}

// Body classification

/// `acc.push(value)` → `(acc, value)`.
pub(crate) fn as_push(arena: &SrcArena, stmt: SrcId) -> Option<(VarId, SrcId)> {
    let SrcKind::Call { callee, args } = arena.try_expr(arena.unwrap_transparent(stmt))?.kind
    else {
        return None;
    };
    let SrcKind::Field { receiver, field } = arena.try_expr(arena.unwrap_transparent(callee))?.kind
    else {
        return None;
    };
    if arena.name(field) != "push" {
        return None;
    }
    let acc = analysis::local_of(arena, receiver)?;
    match arena.get_expr_list(args) {
        &[value] => Some((acc, value)),
        _ => None,
    }
}

/// Prefix statements of a Map/Filter body may only touch fresh locals.
fn prefix_is_local(arena: &SrcArena, prefix: &[SrcId], elem: VarId, acc: VarId) -> bool {
    let fx = Effects::of(arena, prefix);
    let outer_writes = fx
        .outer_assigned()
        .into_iter()
        .chain(fx.outer_nested_assigned())
        .any(|v| v != elem);
    !outer_writes
        && !fx.has_exits()
        && !fx.returns
        && !fx.non_local_write
        && !fx.reads.contains(&acc)
}

fn classify_rest(
    arena: &SrcArena,
    elem: VarId,
    rest: SmallVec<[SrcId; 4]>,
    sig: &mut LoopSignature,
) {
    sig.rest = rest;
    let rest = sig.rest.clone();

    if let Some((&last, prefix)) = rest.split_last() {
        // Map
        if let Some((acc, value)) = as_push(arena, last) {
            if acc != elem
                && prefix_is_local(arena, prefix, elem, acc)
                && !analysis::mentions_var(arena, value, acc)
            {
                sig.kind = LoopKind::Map;
                sig.accumulator = Some(acc);
                sig.prefix = prefix.iter().copied().collect();
                sig.body = value;
                return;
            }
        }
        // Filter
        if prefix.is_empty() {
            if let Some(SrcKind::If {
                cond,
                then_branch,
                else_branch,
            }) = arena.try_expr(last).map(|e| e.kind)
            {
                let then_stmts = flat_stmts(arena, then_branch);
                if let Some((&push, inner_prefix)) = then_stmts.split_last() {
                    if let Some((acc, value)) = as_push(arena, push) {
                        if !else_branch.is_valid()
                            && acc != elem
                            && prefix_is_local(arena, inner_prefix, elem, acc)
                            && !analysis::mentions_var(arena, value, acc)
                            && !analysis::mentions_var(arena, cond, acc)
                            && Effects::of(arena, &[cond]).assigned.is_empty()
                        {
                            sig.kind = LoopKind::Filter;
                            sig.accumulator = Some(acc);
                            sig.prefix = inner_prefix.iter().copied().collect();
                            sig.body = value;
                            sig.filter = cond;
                            return;
                        }
                    }
                }
            }
        }
    }

    // Reduce
    let fx = Effects::of(arena, &rest);
    let mut threaded = fx.outer_assigned();
    threaded.remove(&elem);
    if !threaded.is_empty()
        && fx.outer_nested_assigned().is_empty()
        && !fx.returns
        && !fx.non_local_write
        && !fx.exit_in_expr
    {
        sig.kind = LoopKind::Reduce;
        sig.threaded = threaded.into_iter().collect();
        return;
    }
    sig.kind = LoopKind::Opaque;
}

#[cfg(test)]
mod tests;
