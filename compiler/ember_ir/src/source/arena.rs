//! Arena storage for one unit's source tree.

use smallvec::SmallVec;

use super::{
    ArmRange, CatchRange, FieldRange, SrcArm, SrcCatch, SrcExpr, SrcField, SrcId, SrcKind,
    SrcRange, SrcVar, VarFlags, VarId, VarRange,
};
use crate::{Name, Span, StringTable, TypeId, TypePool};

/// Flat storage for a typed source tree.
///
/// Besides expressions the arena owns the unit's variable table, string
/// table and type pool, so one `SrcArena` is everything the lowering core
/// needs to know about a unit apart from the enum side table.
#[derive(Clone, Debug, Default)]
pub struct SrcArena {
    exprs: Vec<SrcExpr>,
    expr_lists: Vec<SrcId>,
    arms: Vec<SrcArm>,
    catches: Vec<SrcCatch>,
    fields: Vec<SrcField>,
    var_lists: Vec<VarId>,
    vars: Vec<SrcVar>,
    names: StringTable,
    types: TypePool,
}

#[expect(
    clippy::cast_possible_truncation,
    reason = "arena indices always fit u32"
)]
fn next_index(len: usize) -> u32 {
    len as u32
}

impl SrcArena {
    pub fn new() -> Self {
        Self::default()
    }

    // Allocation

    /// Allocate an expression node.
    pub fn alloc_expr(&mut self, expr: SrcExpr) -> SrcId {
        let id = SrcId::new(next_index(self.exprs.len()));
        self.exprs.push(expr);
        id
    }

    /// Shorthand for allocating a node from its parts.
    pub fn alloc(&mut self, kind: SrcKind, span: Span, ty: TypeId) -> SrcId {
        self.alloc_expr(SrcExpr::new(kind, span, ty))
    }

    /// Allocate a list of expression ids (statements, arguments, items).
    pub fn alloc_expr_list(&mut self, ids: impl IntoIterator<Item = SrcId>) -> SrcRange {
        let start = next_index(self.expr_lists.len());
        self.expr_lists.extend(ids);
        SrcRange::new(start, next_index(self.expr_lists.len()) - start)
    }

    pub fn alloc_arms(&mut self, arms: impl IntoIterator<Item = SrcArm>) -> ArmRange {
        let start = next_index(self.arms.len());
        self.arms.extend(arms);
        ArmRange::new(start, next_index(self.arms.len()) - start)
    }

    pub fn alloc_catches(&mut self, catches: impl IntoIterator<Item = SrcCatch>) -> CatchRange {
        let start = next_index(self.catches.len());
        self.catches.extend(catches);
        CatchRange::new(start, next_index(self.catches.len()) - start)
    }

    pub fn alloc_fields(&mut self, fields: impl IntoIterator<Item = SrcField>) -> FieldRange {
        let start = next_index(self.fields.len());
        self.fields.extend(fields);
        FieldRange::new(start, next_index(self.fields.len()) - start)
    }

    pub fn alloc_var_list(&mut self, vars: impl IntoIterator<Item = VarId>) -> VarRange {
        let start = next_index(self.var_lists.len());
        self.var_lists.extend(vars);
        VarRange::new(start, next_index(self.var_lists.len()) - start)
    }

    /// Declare a variable. Ids increase in declaration order.
    pub fn declare_var(&mut self, name: &str, ty: TypeId, flags: VarFlags) -> VarId {
        let name = self.names.intern(name);
        let id = VarId::new(next_index(self.vars.len()));
        self.vars.push(SrcVar { name, ty, flags });
        id
    }

    pub fn intern(&mut self, s: &str) -> Name {
        self.names.intern(s)
    }

    // Access

    #[inline]
    pub fn expr(&self, id: SrcId) -> &SrcExpr {
        &self.exprs[id.index()]
    }

    /// Get an expression if `id` is valid and in bounds.
    #[inline]
    pub fn try_expr(&self, id: SrcId) -> Option<&SrcExpr> {
        if id.is_valid() {
            self.exprs.get(id.index())
        } else {
            None
        }
    }

    #[inline]
    pub fn kind(&self, id: SrcId) -> SrcKind {
        self.exprs[id.index()].kind
    }

    #[inline]
    pub fn span(&self, id: SrcId) -> Span {
        self.exprs[id.index()].span
    }

    #[inline]
    pub fn ty(&self, id: SrcId) -> TypeId {
        self.exprs[id.index()].ty
    }

    pub fn get_expr_list(&self, range: SrcRange) -> &[SrcId] {
        self.expr_lists.get(range.as_range()).unwrap_or(&[])
    }

    pub fn get_arms(&self, range: ArmRange) -> &[SrcArm] {
        self.arms.get(range.as_range()).unwrap_or(&[])
    }

    pub fn get_catches(&self, range: CatchRange) -> &[SrcCatch] {
        self.catches.get(range.as_range()).unwrap_or(&[])
    }

    pub fn get_fields(&self, range: FieldRange) -> &[SrcField] {
        self.fields.get(range.as_range()).unwrap_or(&[])
    }

    pub fn get_var_list(&self, range: VarRange) -> &[VarId] {
        self.var_lists.get(range.as_range()).unwrap_or(&[])
    }

    /// Variable record. `None` for ids this unit never declared.
    pub fn var(&self, id: VarId) -> Option<&SrcVar> {
        self.vars.get(id.index())
    }

    pub fn var_name(&self, id: VarId) -> &str {
        self.var(id).map_or("", |v| self.names.lookup(v.name))
    }

    pub fn name(&self, name: Name) -> &str {
        self.names.lookup(name)
    }

    pub fn names(&self) -> &StringTable {
        &self.names
    }

    pub fn types(&self) -> &TypePool {
        &self.types
    }

    pub fn types_mut(&mut self) -> &mut TypePool {
        &mut self.types
    }

    pub fn expr_count(&self) -> usize {
        self.exprs.len()
    }

    pub fn var_count(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exprs.is_empty()
    }

    /// Direct children of a node in source order.
    ///
    /// Switch arms contribute values, guard and body in that order; the
    /// default body comes last. Invalid optional children are skipped.
    pub fn children(&self, id: SrcId) -> SmallVec<[SrcId; 4]> {
        let mut out = SmallVec::new();
        let Some(expr) = self.try_expr(id) else {
            return out;
        };
        let mut push = |child: SrcId| {
            if child.is_valid() {
                out.push(child);
            }
        };
        match expr.kind {
            SrcKind::Int(_)
            | SrcKind::Float(_)
            | SrcKind::Bool(_)
            | SrcKind::Str(_)
            | SrcKind::Null
            | SrcKind::This
            | SrcKind::Local(_)
            | SrcKind::Global { .. }
            | SrcKind::EnumCtor { .. }
            | SrcKind::Break
            | SrcKind::Continue
            | SrcKind::TypeExpr(_) => {}
            SrcKind::VarDecl { init, .. } => push(init),
            SrcKind::Binary { left, right, .. } => {
                push(left);
                push(right);
            }
            SrcKind::Unary { operand, .. } => push(operand),
            SrcKind::Call { callee, args } => {
                push(callee);
                for &arg in self.get_expr_list(args) {
                    push(arg);
                }
            }
            SrcKind::Field { receiver, .. } => push(receiver),
            SrcKind::ArrayDecl(items) | SrcKind::Block(items) => {
                for &item in self.get_expr_list(items) {
                    push(item);
                }
            }
            SrcKind::New { args, .. } => {
                for &arg in self.get_expr_list(args) {
                    push(arg);
                }
            }
            SrcKind::Index { receiver, index } => {
                push(receiver);
                push(index);
            }
            SrcKind::ObjectDecl(fields) => {
                for field in self.get_fields(fields) {
                    push(field.value);
                }
            }
            SrcKind::If {
                cond,
                then_branch,
                else_branch,
            } => {
                push(cond);
                push(then_branch);
                push(else_branch);
            }
            SrcKind::Return(value) | SrcKind::Throw(value) => push(value),
            SrcKind::Switch {
                scrutinee,
                arms,
                default,
            } => {
                push(scrutinee);
                for arm in self.get_arms(arms) {
                    for &value in self.get_expr_list(arm.values) {
                        push(value);
                    }
                    push(arm.guard);
                    push(arm.body);
                }
                push(default);
            }
            SrcKind::Try { body, catches } => {
                push(body);
                for catch in self.get_catches(catches) {
                    push(catch.body);
                }
            }
            SrcKind::Function { body, .. } => push(body),
            SrcKind::For { iter, body, .. } => {
                push(iter);
                push(body);
            }
            SrcKind::While { cond, body, .. } => {
                push(cond);
                push(body);
            }
            SrcKind::EnumParameter { subject, .. } | SrcKind::EnumIndex(subject) => push(subject),
            SrcKind::Cast { expr } | SrcKind::Meta { expr, .. } => push(expr),
        }
        out
    }

    /// Statements of a block, or the node itself for a non-block body.
    pub fn stmts_of(&self, id: SrcId) -> SmallVec<[SrcId; 4]> {
        match self.try_expr(id).map(|e| e.kind) {
            Some(SrcKind::Block(range)) => self.get_expr_list(range).iter().copied().collect(),
            Some(_) => smallvec::smallvec![id],
            None => SmallVec::new(),
        }
    }

    /// Strip transparent wrappers (`Meta`, `Cast`).
    pub fn unwrap_transparent(&self, mut id: SrcId) -> SrcId {
        while let Some(expr) = self.try_expr(id) {
            match expr.kind {
                SrcKind::Meta { expr, .. } | SrcKind::Cast { expr } => id = expr,
                _ => break,
            }
        }
        id
    }
}
