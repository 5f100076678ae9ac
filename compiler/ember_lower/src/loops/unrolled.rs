//! Constant-unrolled comprehensions.
//!
//! With a literal source the front-end may emit the comprehension fully
//! unrolled:
//!
//! ```text
//! var _g = []; _g.push(0); _g.push(2); _g.push(4); _g;
//! var _g = []; if (0 % 2 == 0) _g.push(0); if (1 % 2 == 0) _g.push(1); …; _g;
//! ```
//!
//! The first shape is a literal list. The second is a filter over a range
//! when every condition and pushed value is the same expression with only
//! the consecutive element literal changed.

use ember_ir::{
    ArmRange, CatchRange, FieldRange, SrcArena, SrcId, SrcKind, SrcRange, VarId, VarRange,
};

use super::{as_push, flat_stmts, LoopElem, LoopKind, LoopSignature, LoopSource, RangeEnd};
use crate::analysis;

/// One pushed element of an unrolled list.
#[derive(Clone, Debug)]
pub enum UnrolledItem {
    Expr(SrcId),
    /// The element is itself an unrolled comprehension.
    Nested(Unrolled),
}

#[derive(Clone, Debug)]
pub enum Unrolled {
    List {
        accumulator: VarId,
        items: Vec<UnrolledItem>,
    },
    /// Holes of the first condition and value stand for the element.
    Filter(LoopSignature),
}

/// Recognize `[acc = [], appends…, acc]`.
pub fn classify_unrolled(arena: &SrcArena, stmts: &[SrcId]) -> Option<Unrolled> {
    let (&first, rest) = stmts.split_first()?;
    let (&last, middle) = rest.split_last()?;

    let SrcKind::VarDecl { var: acc, init } = arena.try_expr(first)?.kind else {
        return None;
    };
    match arena.try_expr(arena.unwrap_transparent(init))?.kind {
        SrcKind::ArrayDecl(items) if items.is_empty() => {}
        _ => return None,
    }
    if analysis::local_of(arena, last) != Some(acc) {
        return None;
    }

    if let Some(items) = unconditional(arena, acc, middle) {
        tracing::debug!(items = items.len(), "unrolled list");
        return Some(Unrolled::List {
            accumulator: acc,
            items,
        });
    }
    let sig = conditional(arena, acc, middle)?;
    tracing::debug!(holes = ?sig.elem, "unrolled filter");
    Some(Unrolled::Filter(sig))
}

fn unconditional(arena: &SrcArena, acc: VarId, middle: &[SrcId]) -> Option<Vec<UnrolledItem>> {
    middle
        .iter()
        .map(|&stmt| {
            let (target, value) = as_push(arena, stmt)?;
            if target != acc || analysis::mentions_var(arena, value, acc) {
                return None;
            }
            let value = arena.unwrap_transparent(value);
            if let Some(SrcKind::Block(_)) = arena.try_expr(value).map(|e| e.kind) {
                if let Some(nested) = classify_unrolled(arena, &flat_stmts(arena, value)) {
                    return Some(UnrolledItem::Nested(nested));
                }
            }
            Some(UnrolledItem::Expr(value))
        })
        .collect()
}

/// `if (cond) acc.push(value)` → `(cond, value)`.
fn conditional_push(arena: &SrcArena, acc: VarId, stmt: SrcId) -> Option<(SrcId, SrcId)> {
    let SrcKind::If {
        cond,
        then_branch,
        else_branch,
    } = arena.try_expr(stmt)?.kind
    else {
        return None;
    };
    if else_branch.is_valid() {
        return None;
    }
    let then_stmts = flat_stmts(arena, then_branch);
    let &[push] = then_stmts.as_slice() else {
        return None;
    };
    let (target, value) = as_push(arena, push)?;
    (target == acc && !analysis::mentions_var(arena, value, acc)).then_some((cond, value))
}

fn conditional(arena: &SrcArena, acc: VarId, middle: &[SrcId]) -> Option<LoopSignature> {
    if middle.len() < 2 {
        return None;
    }
    let arms: Vec<(SrcId, SrcId)> = middle
        .iter()
        .map(|&stmt| conditional_push(arena, acc, stmt))
        .collect::<Option<_>>()?;
    let (cond0, value0) = arms[0];

    let mut base = None;
    let mut holes: Option<Vec<SrcId>> = None;
    for (k, &(cond, value)) in arms.iter().enumerate().skip(1) {
        let step = i64::try_from(k).ok()?;
        let mut found = Vec::new();
        let mut diff = Diff {
            arena,
            step,
            base: &mut base,
            holes: &mut found,
        };
        if !diff.same_shape(cond0, cond) || !diff.same_shape(value0, value) {
            return None;
        }
        match &holes {
            None => holes = Some(found),
            Some(previous) if *previous == found => {}
            Some(_) => return None,
        }
    }
    let holes = holes.filter(|h| !h.is_empty())?;
    let start = base?;
    let count = i64::try_from(arms.len()).ok()?;
    let end = count.checked_sub(1).and_then(|n| start.checked_add(n))?;

    Some(LoopSignature {
        kind: LoopKind::Filter,
        elem: Some(LoopElem::Holes(holes)),
        source: Some(LoopSource::Range {
            start,
            end: RangeEnd::Literal(end),
        }),
        accumulator: Some(acc),
        body: value0,
        filter: cond0,
        rest: middle.iter().copied().collect(),
        ..LoopSignature::opaque()
    })
}

/// Structural comparison of statement `0` against statement `step`.
struct Diff<'a, 'd> {
    arena: &'a SrcArena,
    step: i64,
    /// Element value of statement `0`, learned from the first difference.
    base: &'d mut Option<i64>,
    /// Positions in statement `0` where the element literal sits.
    holes: &'d mut Vec<SrcId>,
}

impl Diff<'_, '_> {
    fn same_shape(&mut self, a: SrcId, b: SrcId) -> bool {
        if a.is_valid() != b.is_valid() {
            return false;
        }
        let (Some(ea), Some(eb)) = (self.arena.try_expr(a), self.arena.try_expr(b)) else {
            return !a.is_valid();
        };
        if let (SrcKind::Int(x), SrcKind::Int(y)) = (ea.kind, eb.kind) {
            if x == y {
                return true;
            }
            let base = *self.base.get_or_insert(x);
            if x == base && Some(y) == base.checked_add(self.step) {
                self.holes.push(a);
                return true;
            }
            return false;
        }
        if head(ea.kind) != head(eb.kind) {
            return false;
        }
        let (ca, cb) = (self.arena.children(a), self.arena.children(b));
        ca.len() == cb.len() && ca.iter().zip(cb.iter()).all(|(&x, &y)| self.same_shape(x, y))
    }
}

/// A kind with its children erased, for comparing node heads.
fn head(kind: SrcKind) -> SrcKind {
    let x = SrcId::INVALID;
    match kind {
        SrcKind::VarDecl { var, .. } => SrcKind::VarDecl { var, init: x },
        SrcKind::Binary { op, .. } => SrcKind::Binary {
            op,
            left: x,
            right: x,
        },
        SrcKind::Unary { op, postfix, .. } => SrcKind::Unary {
            op,
            postfix,
            operand: x,
        },
        SrcKind::Call { .. } => SrcKind::Call {
            callee: x,
            args: SrcRange::EMPTY,
        },
        SrcKind::Field { field, .. } => SrcKind::Field { receiver: x, field },
        SrcKind::ArrayDecl(_) => SrcKind::ArrayDecl(SrcRange::EMPTY),
        SrcKind::Index { .. } => SrcKind::Index {
            receiver: x,
            index: x,
        },
        SrcKind::ObjectDecl(_) => SrcKind::ObjectDecl(FieldRange::EMPTY),
        SrcKind::New { class, .. } => SrcKind::New {
            class,
            args: SrcRange::EMPTY,
        },
        SrcKind::If { .. } => SrcKind::If {
            cond: x,
            then_branch: x,
            else_branch: x,
        },
        SrcKind::Block(_) => SrcKind::Block(SrcRange::EMPTY),
        SrcKind::Return(_) => SrcKind::Return(x),
        SrcKind::Throw(_) => SrcKind::Throw(x),
        SrcKind::Switch { .. } => SrcKind::Switch {
            scrutinee: x,
            arms: ArmRange::EMPTY,
            default: x,
        },
        SrcKind::Try { .. } => SrcKind::Try {
            body: x,
            catches: CatchRange::EMPTY,
        },
        SrcKind::Function { .. } => SrcKind::Function {
            params: VarRange::EMPTY,
            body: x,
        },
        SrcKind::For { var, .. } => SrcKind::For {
            var,
            iter: x,
            body: x,
        },
        SrcKind::While { eager, .. } => SrcKind::While {
            cond: x,
            body: x,
            eager,
        },
        SrcKind::EnumParameter { ctor, index, .. } => SrcKind::EnumParameter {
            subject: x,
            ctor,
            index,
        },
        SrcKind::EnumIndex(_) => SrcKind::EnumIndex(x),
        SrcKind::Cast { .. } => SrcKind::Cast { expr: x },
        SrcKind::Meta { name, .. } => SrcKind::Meta { name, expr: x },
        leaf => leaf,
    }
}
