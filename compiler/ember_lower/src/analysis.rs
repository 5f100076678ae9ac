//! Read-only facts about source subtrees.
//!
//! Everything here walks the arena without touching the lowering context, so
//! the loop detector and binding plan builder can share it.

use std::collections::BTreeSet;

use rustc_hash::{FxHashMap, FxHashSet};

use ember_ir::visitor::{walk_expr, Visitor};
use ember_ir::{SrcArena, SrcBinOp, SrcId, SrcKind, VarId};

/// Methods that mutate their receiver in place. A call to one of these on a
/// local counts as an assignment of that local.
const MUTATING_METHODS: &[&str] = &[
    "insert", "pop", "push", "remove", "reverse", "set", "shift", "sort", "splice", "unshift",
];

pub fn is_mutating_method(name: &str) -> bool {
    MUTATING_METHODS.binary_search(&name).is_ok()
}

// Declarations

/// Where each variable is declared and how often it is written.
#[derive(Debug, Default)]
pub struct DeclIndex {
    decls: FxHashMap<VarId, (SrcId, SrcId)>,
    writes: FxHashMap<VarId, u32>,
}

impl DeclIndex {
    /// Index every declaration reachable from `root`.
    pub fn build(arena: &SrcArena, root: SrcId) -> Self {
        let mut index = DeclIndex::default();
        index.visit_optional(root, arena);
        index
    }

    /// `VarDecl` node of `var`. The first declaration wins.
    pub fn decl(&self, var: VarId) -> Option<SrcId> {
        self.decls.get(&var).map(|&(decl, _)| decl)
    }

    /// Initializer of `var`'s declaration, if it has one.
    pub fn init(&self, var: VarId) -> Option<SrcId> {
        self.decls
            .get(&var)
            .map(|&(_, init)| init)
            .filter(|init| init.is_valid())
    }

    /// Assignments, updates and in-place mutations of `var`.
    pub fn write_count(&self, var: VarId) -> u32 {
        self.writes.get(&var).copied().unwrap_or(0)
    }

    pub fn is_reassigned(&self, var: VarId) -> bool {
        self.write_count(var) > 0
    }
}

impl<'a> Visitor<'a> for DeclIndex {
    fn visit_expr(&mut self, id: SrcId, arena: &'a SrcArena) {
        let Some(expr) = arena.try_expr(id) else {
            return;
        };
        match expr.kind {
            SrcKind::VarDecl { var, init } => {
                self.decls.entry(var).or_insert((id, init));
            }
            SrcKind::Binary {
                op: SrcBinOp::Assign | SrcBinOp::AssignOp(_),
                left,
                ..
            } => {
                if let Some(var) = written_root(arena, left).var() {
                    *self.writes.entry(var).or_insert(0) += 1;
                }
            }
            SrcKind::Unary { op, operand, .. } if op.is_update() => {
                if let Some(var) = written_root(arena, operand).var() {
                    *self.writes.entry(var).or_insert(0) += 1;
                }
            }
            SrcKind::Call { callee, .. } => {
                if let Some(var) = mutated_receiver(arena, callee) {
                    *self.writes.entry(var).or_insert(0) += 1;
                }
            }
            _ => {}
        }
        walk_expr(self, id, arena);
    }
}

// Assignment targets

/// What an assignment target ultimately writes.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum Written {
    /// `x = …`
    Local(VarId),
    /// `x.f = …`, `x[i] = …` and deeper paths rooted at a local.
    Member(VarId),
    /// `this.f = …`, `f().x = …`, statics.
    NonLocal,
}

impl Written {
    pub fn var(self) -> Option<VarId> {
        match self {
            Written::Local(var) | Written::Member(var) => Some(var),
            Written::NonLocal => None,
        }
    }
}

pub fn written_root(arena: &SrcArena, target: SrcId) -> Written {
    let target = arena.unwrap_transparent(target);
    match arena.try_expr(target).map(|e| e.kind) {
        Some(SrcKind::Local(var)) => Written::Local(var),
        Some(SrcKind::Field { receiver, .. } | SrcKind::Index { receiver, .. }) => {
            match written_root(arena, receiver) {
                Written::Local(var) | Written::Member(var) => Written::Member(var),
                Written::NonLocal => Written::NonLocal,
            }
        }
        _ => Written::NonLocal,
    }
}

/// Local mutated by a call such as `xs.push(v)`.
pub fn mutated_receiver(arena: &SrcArena, callee: SrcId) -> Option<VarId> {
    let callee = arena.unwrap_transparent(callee);
    match arena.try_expr(callee)?.kind {
        SrcKind::Field { receiver, field } if is_mutating_method(arena.name(field)) => {
            written_root(arena, receiver).var()
        }
        _ => None,
    }
}

// Small shape helpers

/// The variable of a plain local reference.
pub fn local_of(arena: &SrcArena, id: SrcId) -> Option<VarId> {
    match arena.try_expr(arena.unwrap_transparent(id))?.kind {
        SrcKind::Local(var) => Some(var),
        _ => None,
    }
}

/// Integer constant, including a negated literal.
pub fn int_literal(arena: &SrcArena, id: SrcId) -> Option<i64> {
    match arena.try_expr(arena.unwrap_transparent(id))?.kind {
        SrcKind::Int(value) => Some(value),
        SrcKind::Unary {
            op: ember_ir::SrcUnaryOp::Neg,
            operand,
            ..
        } => int_literal(arena, operand).map(i64::wrapping_neg),
        _ => None,
    }
}

pub fn is_generated(arena: &SrcArena, var: VarId) -> bool {
    arena.var(var).is_some_and(ember_ir::SrcVar::is_generated)
}

/// Whether two expressions denote the same storage location.
///
/// Only locals, `this` and field paths over them are compared; anything
/// else is equal only to itself.
pub fn same_subject(arena: &SrcArena, a: SrcId, b: SrcId) -> bool {
    let (a, b) = (arena.unwrap_transparent(a), arena.unwrap_transparent(b));
    if a == b {
        return true;
    }
    let (Some(ea), Some(eb)) = (arena.try_expr(a), arena.try_expr(b)) else {
        return false;
    };
    match (ea.kind, eb.kind) {
        (SrcKind::Local(x), SrcKind::Local(y)) => x == y,
        (SrcKind::This, SrcKind::This) => true,
        (
            SrcKind::Field {
                receiver: ra,
                field: fa,
            },
            SrcKind::Field {
                receiver: rb,
                field: fb,
            },
        ) => fa == fb && same_subject(arena, ra, rb),
        _ => false,
    }
}

// Variable mentions

struct Mentions {
    var: VarId,
    found: bool,
}

impl<'a> Visitor<'a> for Mentions {
    fn visit_expr(&mut self, id: SrcId, arena: &'a SrcArena) {
        if self.found {
            return;
        }
        match arena.try_expr(id).map(|e| e.kind) {
            Some(SrcKind::Local(var) | SrcKind::VarDecl { var, .. }) if var == self.var => {
                self.found = true;
            }
            Some(_) => walk_expr(self, id, arena),
            None => {}
        }
    }
}

/// Whether `var` is read, written or declared anywhere under `root`.
pub fn mentions_var(arena: &SrcArena, root: SrcId, var: VarId) -> bool {
    let mut mentions = Mentions { var, found: false };
    mentions.visit_optional(root, arena);
    mentions.found
}

// Effects

/// Side effects of a statement list, as seen from the enclosing loop.
///
/// "This level" means not inside a nested loop or closure: a `break` in a
/// nested loop belongs to that loop, an assignment in a closure happens at an
/// unknown time.
#[derive(Debug, Default, Clone)]
pub struct Effects {
    /// Variables written at this level.
    pub assigned: BTreeSet<VarId>,
    /// Variables written inside a nested loop or closure.
    pub nested_assigned: BTreeSet<VarId>,
    /// Variables declared anywhere inside.
    pub declared: FxHashSet<VarId>,
    /// Variables read anywhere inside.
    pub reads: BTreeSet<VarId>,
    pub breaks: u32,
    pub continues: u32,
    /// A `return` at this level or in a nested loop.
    pub returns: bool,
    /// A write through `this`, a static, or a call result.
    pub non_local_write: bool,
    /// A `break`/`continue` of this level sits in expression position, where
    /// it cannot be turned into a continuation.
    pub exit_in_expr: bool,
}

impl Effects {
    pub fn of(arena: &SrcArena, roots: &[SrcId]) -> Self {
        let mut scan = EffectScan {
            arena,
            fx: Effects::default(),
            loop_depth: 0,
            fn_depth: 0,
        };
        for &root in roots {
            scan.scan(root, true);
        }
        scan.fx
    }

    /// Outer variables written at this level, in declaration order.
    pub fn outer_assigned(&self) -> BTreeSet<VarId> {
        self.assigned
            .iter()
            .copied()
            .filter(|v| !self.declared.contains(v))
            .collect()
    }

    /// Outer variables written inside nested loops or closures.
    pub fn outer_nested_assigned(&self) -> BTreeSet<VarId> {
        self.nested_assigned
            .iter()
            .copied()
            .filter(|v| !self.declared.contains(v))
            .collect()
    }

    pub fn outer_reads(&self) -> BTreeSet<VarId> {
        self.reads
            .iter()
            .copied()
            .filter(|v| !self.declared.contains(v))
            .collect()
    }

    pub fn has_exits(&self) -> bool {
        self.breaks > 0 || self.continues > 0
    }

    /// No writes to outer state and no control transfer out of the body.
    pub fn is_self_contained(&self) -> bool {
        self.outer_assigned().is_empty()
            && self.outer_nested_assigned().is_empty()
            && !self.has_exits()
            && !self.returns
            && !self.non_local_write
    }
}

struct EffectScan<'a> {
    arena: &'a SrcArena,
    fx: Effects,
    loop_depth: u32,
    fn_depth: u32,
}

impl EffectScan<'_> {
    fn nested(&self) -> bool {
        self.loop_depth > 0 || self.fn_depth > 0
    }

    fn write(&mut self, written: Written) {
        match written {
            Written::Local(var) | Written::Member(var) => {
                if self.nested() {
                    self.fx.nested_assigned.insert(var);
                } else {
                    self.fx.assigned.insert(var);
                }
            }
            Written::NonLocal => self.fx.non_local_write = true,
        }
    }

    fn exit(&mut self, at_stmt: bool, is_break: bool) {
        if self.nested() {
            return;
        }
        if is_break {
            self.fx.breaks += 1;
        } else {
            self.fx.continues += 1;
        }
        if !at_stmt {
            self.fx.exit_in_expr = true;
        }
    }

    fn scan_children(&mut self, id: SrcId) {
        for child in self.arena.children(id) {
            self.scan(child, false);
        }
    }

    fn scan(&mut self, id: SrcId, at_stmt: bool) {
        let Some(expr) = self.arena.try_expr(id) else {
            return;
        };
        match expr.kind {
            SrcKind::Local(var) => {
                self.fx.reads.insert(var);
            }
            SrcKind::VarDecl { var, init } => {
                self.fx.declared.insert(var);
                self.scan(init, false);
            }
            SrcKind::Binary { op, left, right } => {
                if let SrcBinOp::Assign | SrcBinOp::AssignOp(_) = op {
                    let written = written_root(self.arena, left);
                    self.write(written);
                    if matches!(op, SrcBinOp::AssignOp(_)) || matches!(written, Written::Member(_))
                    {
                        self.scan(left, false);
                    } else {
                        // Plain `x = …` does not read `x`.
                        self.scan_target_indices(left);
                    }
                } else {
                    self.scan(left, false);
                }
                self.scan(right, false);
            }
            SrcKind::Unary { op, operand, .. } => {
                if op.is_update() {
                    let written = written_root(self.arena, operand);
                    self.write(written);
                }
                self.scan(operand, false);
            }
            SrcKind::Call { callee, .. } => {
                if let Some(var) = mutated_receiver(self.arena, callee) {
                    self.write(Written::Member(var));
                }
                self.scan_children(id);
            }
            SrcKind::Break => self.exit(at_stmt, true),
            SrcKind::Continue => self.exit(at_stmt, false),
            SrcKind::Return(value) => {
                if self.fn_depth == 0 {
                    self.fx.returns = true;
                }
                self.scan(value, false);
            }
            SrcKind::Block(stmts) => {
                for &stmt in self.arena.get_expr_list(stmts) {
                    self.scan(stmt, at_stmt);
                }
            }
            SrcKind::If {
                cond,
                then_branch,
                else_branch,
            } => {
                self.scan(cond, false);
                self.scan(then_branch, at_stmt);
                self.scan(else_branch, at_stmt);
            }
            SrcKind::Switch {
                scrutinee,
                arms,
                default,
            } => {
                self.scan(scrutinee, false);
                for arm in self.arena.get_arms(arms) {
                    for &value in self.arena.get_expr_list(arm.values) {
                        self.scan(value, false);
                    }
                    self.scan(arm.guard, false);
                    self.scan(arm.body, at_stmt);
                }
                self.scan(default, at_stmt);
            }
            SrcKind::Try { catches, .. } => {
                for catch in self.arena.get_catches(catches) {
                    self.fx.declared.insert(catch.var);
                }
                self.scan_children(id);
            }
            SrcKind::While { .. } => {
                self.loop_depth += 1;
                self.scan_children(id);
                self.loop_depth -= 1;
            }
            SrcKind::For { var, .. } => {
                self.fx.declared.insert(var);
                self.loop_depth += 1;
                self.scan_children(id);
                self.loop_depth -= 1;
            }
            SrcKind::Function { params, .. } => {
                for &param in self.arena.get_var_list(params) {
                    self.fx.declared.insert(param);
                }
                self.fn_depth += 1;
                self.scan_children(id);
                self.fn_depth -= 1;
            }
            SrcKind::Meta { expr, .. } | SrcKind::Cast { expr } => self.scan(expr, at_stmt),
            _ => self.scan_children(id),
        }
    }

    /// Index expressions inside an assignment target, which are evaluated.
    fn scan_target_indices(&mut self, target: SrcId) {
        let target = self.arena.unwrap_transparent(target);
        let kind = self.arena.try_expr(target).map(|e| e.kind);
        if let Some(SrcKind::Index { receiver, index }) = kind {
            self.scan_target_indices(receiver);
            self.scan(index, false);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::Builder;

    #[test]
    fn mutating_methods_are_sorted() {
        let mut sorted = MUTATING_METHODS.to_vec();
        sorted.sort_unstable();
        assert_eq!(sorted, MUTATING_METHODS);
    }

    #[test]
    fn decl_index_counts_writes() {
        let mut b = Builder::new();
        let x = b.var("x");
        let xs = b.array_var("xs");
        let one = b.int(1);
        let decl = b.decl(x, one);
        let two = b.int(2);
        let assign = b.assign_local(x, two);
        let inc = b.incr(x);
        let empty = b.array(&[]);
        let xs_decl = b.decl(xs, empty);
        let three = b.int(3);
        let push = b.push(xs, three);
        let root = b.block(&[decl, assign, inc, xs_decl, push]);
        let arena = b.finish();

        let index = DeclIndex::build(&arena, root);
        assert_eq!(index.decl(x), Some(decl));
        assert_eq!(index.init(x), Some(one));
        assert_eq!(index.write_count(x), 2);
        assert_eq!(index.write_count(xs), 1);
    }

    #[test]
    fn effects_separate_levels() {
        let mut b = Builder::new();
        let total = b.var("total");
        let inner = b.var("inner");
        let one = b.int(1);
        let bump = b.assign_local(total, one);
        let two = b.int(2);
        let nested_write = b.assign_local(inner, two);
        let t = b.bool(true);
        let nested_body = b.block(&[nested_write]);
        let nested = b.while_loop(t, nested_body);
        let brk = b.brk();
        let body = b.block(&[bump, nested, brk]);
        let arena = b.finish();

        let fx = Effects::of(&arena, &[body]);
        assert!(fx.assigned.contains(&total));
        assert!(fx.nested_assigned.contains(&inner));
        assert_eq!(fx.breaks, 1);
        assert!(!fx.exit_in_expr);
    }

    #[test]
    fn exit_in_expression_position_is_flagged() {
        let mut b = Builder::new();
        let brk = b.brk();
        let callee = b.global("f");
        let call = b.call(callee, &[brk]);
        let arena = b.finish();

        let fx = Effects::of(&arena, &[call]);
        assert!(fx.exit_in_expr);
    }

    #[test]
    fn this_write_is_non_local() {
        let mut b = Builder::new();
        let this = b.this();
        let field = b.field(this, "count");
        let one = b.int(1);
        let assign = b.assign(field, one);
        let arena = b.finish();

        let fx = Effects::of(&arena, &[assign]);
        assert!(fx.non_local_write);
        assert!(fx.assigned.is_empty());
    }

    #[test]
    fn same_subject_compares_paths() {
        let mut b = Builder::new();
        let e = b.var("e");
        let a = b.local(e);
        let c = b.local(e);
        let fa = b.field(a, "opt");
        let fc = b.field(c, "opt");
        let fd = b.field(c, "other");
        let arena = b.finish();

        assert!(same_subject(&arena, a, c));
        assert!(same_subject(&arena, fa, fc));
        assert!(!same_subject(&arena, fa, fd));
    }

    #[test]
    fn mentions_finds_nested_reads() {
        let mut b = Builder::new();
        let x = b.var("x");
        let y = b.var("y");
        let rx = b.local(x);
        let one = b.int(1);
        let sum = b.add(rx, one);
        let root = b.block(&[sum]);
        let arena = b.finish();

        assert!(mentions_var(&arena, root, x));
        assert!(!mentions_var(&arena, root, y));
    }
}
