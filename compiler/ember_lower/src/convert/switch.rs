//! `switch` to `case`.
//!
//! Switches over a tagged union (by constructor value or by constructor
//! index) become one clause per constructor, each with its own binding
//! plan. Every other switch matches its values as literals.

use rustc_hash::FxHashSet;

use ember_diagnostic::malformed_enum_parameter;
use ember_ir::{
    CaseClause, EnumTable, Lit, Name, NodeFlags, Pattern, SrcArena, SrcArm, SrcId, SrcKind,
    TargetBinOp, TargetKind, TargetNode, VarId,
};

use super::Tail;
use crate::binding_plan::{build_plan, pattern_binder, ArmInput};
use crate::context::{ClauseContext, LowerCtx};
use crate::naming::case;

/// Constructor matched by one switch value.
struct CtorValue<'s> {
    enum_name: Option<Name>,
    ctor: Name,
    args: &'s [SrcId],
}

/// `Ctor`, `Ctor(args…)`, or with `index_enum`, a constructor index.
fn ctor_value<'s>(
    arena: &'s SrcArena,
    enums: &EnumTable,
    value: SrcId,
    index_enum: Option<Name>,
) -> Option<CtorValue<'s>> {
    let value = arena.unwrap_transparent(value);
    match arena.try_expr(value)?.kind {
        SrcKind::EnumCtor { enum_name, ctor } => Some(CtorValue {
            enum_name: Some(enum_name),
            ctor,
            args: &[],
        }),
        SrcKind::Call { callee, args } => match arena.try_expr(callee)?.kind {
            SrcKind::EnumCtor { enum_name, ctor } => Some(CtorValue {
                enum_name: Some(enum_name),
                ctor,
                args: arena.get_expr_list(args),
            }),
            _ => None,
        },
        SrcKind::Int(k) => {
            let enum_name = index_enum?;
            let def = enums.ctor_at(enum_name, usize::try_from(k).ok()?)?;
            Some(CtorValue {
                enum_name: Some(enum_name),
                ctor: def.name,
                args: &[],
            })
        }
        _ => None,
    }
}

fn literal_of(arena: &SrcArena, value: SrcId) -> Option<Lit> {
    Some(match arena.try_expr(arena.unwrap_transparent(value))?.kind {
        SrcKind::Int(v) => Lit::Int(v),
        SrcKind::Float(bits) => Lit::Float(bits),
        SrcKind::Bool(b) => Lit::Bool(b),
        SrcKind::Str(s) => Lit::Str(arena.name(s).to_string()),
        SrcKind::Null => Lit::Nil,
        _ => return None,
    })
}

impl LowerCtx<'_> {
    /// Convert the switch `id`. `rest` continues inside every clause.
    pub(crate) fn lower_switch(&mut self, id: SrcId, rest: &[SrcId], tail: &Tail) -> TargetNode {
        let arena = self.arena;
        let Some(&expr) = arena.try_expr(id) else {
            return TargetNode::nil();
        };
        let SrcKind::Switch {
            scrutinee,
            arms,
            default,
        } = expr.kind
        else {
            return self.lower_expr(id);
        };
        let span = expr.span;
        let arms = arena.get_arms(arms);

        let scrutinee = arena.unwrap_transparent(scrutinee);
        let (subject, by_index) = match arena.try_expr(scrutinee).map(|e| e.kind) {
            Some(SrcKind::EnumIndex(subject)) => (subject, true),
            _ => (scrutinee, false),
        };
        let enum_mode = by_index
            || arms.iter().any(|arm| {
                arena
                    .get_expr_list(arm.values)
                    .iter()
                    .any(|&v| ctor_value(arena, self.enums, v, None).is_some())
            });

        let (scrut_node, mut clauses, exhaustive) = if enum_mode {
            let scrut_node = self.lower_expr(subject);
            let (clauses, exhaustive) = self.enum_clauses(subject, by_index, arms, rest, tail);
            (scrut_node, clauses, exhaustive)
        } else {
            let scrut_node = self.lower_expr(scrutinee);
            (scrut_node, self.value_clauses(arms, rest, tail), false)
        };

        if default.is_valid() || !exhaustive {
            let body = self.lower_branch(default, rest, tail, span);
            clauses.push(CaseClause {
                pattern: Pattern::Wildcard,
                guard: None,
                body,
            });
        }

        TargetNode::new(
            TargetKind::Case {
                scrutinee: Box::new(scrut_node),
                clauses,
            },
            span,
        )
    }

    fn enum_clauses(
        &mut self,
        subject: SrcId,
        by_index: bool,
        arms: &[SrcArm],
        rest: &[SrcId],
        tail: &Tail,
    ) -> (Vec<CaseClause>, bool) {
        let arena = self.arena;
        let enum_name = arena.types().enum_name(self.ty_of(subject)).or_else(|| {
            arms.iter()
                .flat_map(|arm| arena.get_expr_list(arm.values))
                .find_map(|&v| ctor_value(arena, self.enums, v, None).and_then(|c| c.enum_name))
        });
        let index_enum = if by_index { enum_name } else { None };

        let mut clauses = Vec::new();
        let mut covered: FxHashSet<Name> = FxHashSet::default();
        let mut unguarded_total = true;
        for arm in arms {
            if arm.guard.is_valid() {
                unguarded_total = false;
            }
            for &value in arena.get_expr_list(arm.values) {
                let clause = match ctor_value(arena, self.enums, value, index_enum) {
                    Some(cv) => {
                        covered.insert(cv.ctor);
                        let owner = cv.enum_name.or(enum_name);
                        self.ctor_clause(owner, cv.ctor, subject, cv.args, arm, rest, tail)
                    }
                    None => {
                        unguarded_total = false;
                        self.unknown_ctor_clause(value, arm, rest, tail)
                    }
                };
                clauses.push(clause);
            }
        }

        let exhaustive = unguarded_total
            && enum_name
                .and_then(|e| self.enums.get(e))
                .is_some_and(|def| def.ctors.iter().all(|c| covered.contains(&c.name)));
        (clauses, exhaustive)
    }

    #[expect(
        clippy::too_many_arguments,
        reason = "one arm value plus its continuation"
    )]
    fn ctor_clause(
        &mut self,
        enum_name: Option<Name>,
        ctor: Name,
        subject: SrcId,
        args: &[SrcId],
        arm: &SrcArm,
        rest: &[SrcId],
        tail: &Tail,
    ) -> CaseClause {
        let arena = self.arena;
        let input = ArmInput {
            enum_name,
            ctor,
            subject,
            pattern_args: args,
            guard: arm.guard,
            body: arm.body,
        };
        let plan = build_plan(arena, self.enums, &self.names, &input);
        if let Some(arity) = plan.declared_arity {
            if plan.len() > arity {
                let index = u32::try_from(plan.len() - 1).unwrap_or(u32::MAX);
                self.report(malformed_enum_parameter(arm.span, arena.name(ctor), index));
            }
        }

        // Binders written in the match value.
        let binders: Vec<(usize, VarId)> = args
            .iter()
            .enumerate()
            .filter_map(|(i, &a)| pattern_binder(arena, a).map(|v| (i, v)))
            .collect();
        let surfaced: FxHashSet<String> = binders
            .iter()
            .filter_map(|&(i, _)| plan.final_name(i).map(str::to_owned))
            .collect();
        let finals: Vec<String> = plan.params.iter().map(|p| p.final_name.clone()).collect();
        let mut pattern = plan.pattern(&case::ctor_tag(arena.name(ctor)));
        // Constant arguments constrain the match.
        if let Pattern::Tagged { params, .. } = &mut pattern {
            for (i, &arg) in args.iter().enumerate() {
                if let (Some(slot), Some(lit)) = (params.get_mut(i), literal_of(arena, arg)) {
                    *slot = Pattern::Literal(lit);
                }
            }
        }
        let carriers = plan.overrides.clone();

        let mut clause = ClauseContext::with_overrides(carriers.clone());
        clause.plan = Some(plan);
        clause.surfaced = surfaced;
        self.push_clause(clause);
        for name in &finals {
            self.names.reserve(name);
        }

        // A binder the arm reassigns keeps its own name, seeded from the
        // pattern variable.
        let mut prelude = Vec::new();
        for &(i, var) in &binders {
            if carriers.contains_key(&var) {
                continue;
            }
            let Some(final_name) = finals.get(i) else {
                continue;
            };
            let name = self.bind_var(var);
            if &name != final_name {
                prelude.push(TargetNode::match_(
                    Pattern::Bind { name, used: true },
                    TargetNode::var(final_name.clone()),
                ));
            }
        }

        let guard = arm.guard.is_valid().then(|| self.lower_expr(arm.guard));
        let mut body = self.lower_branch(arm.body, rest, tail, arm.span);
        if !prelude.is_empty() {
            prelude.push(body);
            body = TargetNode::block(prelude, arm.span);
        }
        self.pop_clause();

        CaseClause {
            pattern,
            guard,
            body,
        }
    }

    /// A value naming no constructor this unit knows: compare tags at run
    /// time.
    fn unknown_ctor_clause(
        &mut self,
        value: SrcId,
        arm: &SrcArm,
        rest: &[SrcId],
        tail: &Tail,
    ) -> CaseClause {
        self.names.push_scope();
        let name = self.fresh_name("tagged");
        let tag = TargetNode::call(
            "elem",
            vec![TargetNode::var(name.clone()), TargetNode::int(0)],
        );
        let expected = self.lower_expr(value);
        let mut guard = TargetNode::binary(TargetBinOp::Eq, tag, expected)
            .with_flags(NodeFlags::FALLBACK);
        if arm.guard.is_valid() {
            let extra = self.lower_expr(arm.guard);
            guard = TargetNode::binary(TargetBinOp::And, guard, extra);
        }
        let body = self.lower_branch(arm.body, rest, tail, arm.span);
        self.names.pop_scope();
        CaseClause {
            pattern: Pattern::Bind { name, used: true },
            guard: Some(guard),
            body,
        }
    }

    /// Literal switch: one clause per value sharing the arm body.
    fn value_clauses(&mut self, arms: &[SrcArm], rest: &[SrcId], tail: &Tail) -> Vec<CaseClause> {
        let arena = self.arena;
        let mut clauses = Vec::new();
        for arm in arms {
            let mut heads = Vec::new();
            for &value in arena.get_expr_list(arm.values) {
                heads.push(self.value_pattern(value));
            }
            let arm_guard = arm.guard.is_valid().then(|| self.lower_expr(arm.guard));
            let body = self.lower_branch(arm.body, rest, tail, arm.span);
            for (pattern, guard) in heads {
                let guard = match (guard, arm_guard.clone()) {
                    (Some(a), Some(b)) => Some(TargetNode::binary(TargetBinOp::And, a, b)),
                    (a, b) => a.or(b),
                };
                clauses.push(CaseClause {
                    pattern,
                    guard,
                    body: body.clone(),
                });
            }
        }
        clauses
    }

    /// Pattern (and guard, for non-constant values) matching `value`.
    fn value_pattern(&mut self, value: SrcId) -> (Pattern, Option<TargetNode>) {
        let arena = self.arena;
        let value = arena.unwrap_transparent(value);
        let Some(&expr) = arena.try_expr(value) else {
            return (Pattern::Wildcard, None);
        };
        if let Some(lit) = literal_of(arena, value) {
            return (Pattern::Literal(lit), None);
        }
        if let SrcKind::Local(var) = expr.kind {
            if self.knows_var(var) {
                return (Pattern::Pin(self.bind_var(var)), None);
            }
        }
        let name = self.fresh_name("value");
        let expected = self.lower_expr(value);
        let guard = TargetNode::binary(TargetBinOp::Eq, TargetNode::var(name.clone()), expected)
            .with_flags(NodeFlags::FALLBACK);
        (Pattern::Bind { name, used: true }, Some(guard))
    }
}
