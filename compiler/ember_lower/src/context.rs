//! Per-unit lowering context.
//!
//! All mutable state of one conversion lives here and is threaded through
//! every call: naming tables, the clause stack, loop frames, the budget and
//! collected diagnostics. Nothing is shared between units.

use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;

use ember_diagnostic::{undeclared_variable, Diagnostic};
use ember_ir::{EnumTable, Span, SrcArena, SrcId, TargetNode, VarId};

use crate::analysis::{self, DeclIndex};
use crate::binding_plan::BindingPlan;
use crate::config::LowerConfig;
use crate::naming::Resolver;
use crate::outcome::LowerAbort;

/// State scoped to one pattern-match arm (or one fold step function).
///
/// Created when the arm's conversion begins and dropped when it ends; never
/// shared between arms.
#[derive(Debug, Default)]
pub(crate) struct ClauseContext {
    /// Rule-1 naming overrides.
    pub overrides: FxHashMap<VarId, String>,
    pub plan: Option<BindingPlan>,
    /// Constructor-parameter names written directly in the match value.
    pub surfaced: FxHashSet<String>,
}

impl ClauseContext {
    pub fn with_overrides(overrides: FxHashMap<VarId, String>) -> Self {
        ClauseContext {
            overrides,
            ..Self::default()
        }
    }
}

/// Enclosing loop, as seen by `break`/`continue`.
#[derive(Clone, Debug)]
pub(crate) enum LoopFrame {
    /// Step function of a state-threading fold.
    Step(StepFrame),
    /// Opaque repetition; exits pass through untouched.
    Opaque,
    /// Function boundary. Exits never cross it.
    Barrier,
}

#[derive(Clone, Debug)]
pub(crate) struct StepFrame {
    /// Accumulator field names in tuple order, without the control field.
    pub fields: Vec<String>,
    /// `while` condition; `None` for bounded folds.
    pub cond: Option<SrcId>,
    /// Condition is checked before the body.
    pub check_first: bool,
}

/// Node and repetition counters.
#[derive(Debug)]
struct Budget {
    nodes: usize,
    max_nodes: usize,
    max_repetitions: usize,
    /// Kind label and run length of each active node, outermost first.
    chain: Vec<(&'static str, usize)>,
}

impl Budget {
    fn enter(&mut self, kind: &'static str, span: Span) -> Result<(), LowerAbort> {
        self.nodes += 1;
        if self.nodes > self.max_nodes {
            return Err(LowerAbort::NodeBudget {
                limit: self.max_nodes,
                span,
            });
        }
        let run = match self.chain.last() {
            Some(&(last, run)) if last == kind => run + 1,
            _ => 1,
        };
        if run > self.max_repetitions {
            return Err(LowerAbort::KindRepetition {
                kind,
                limit: self.max_repetitions,
                span,
            });
        }
        self.chain.push((kind, run));
        Ok(())
    }

    fn exit(&mut self) {
        self.chain.pop();
    }
}

/// Per-unit context.
pub struct LowerCtx<'a> {
    pub(crate) arena: &'a SrcArena,
    pub(crate) enums: &'a EnumTable,
    pub(crate) config: &'a LowerConfig,
    pub(crate) names: Resolver,
    pub(crate) decls: DeclIndex,
    clauses: Vec<ClauseContext>,
    loops: Vec<LoopFrame>,
    /// Statements that follow the one being converted, per enclosing block.
    following: Vec<SmallVec<[SrcId; 8]>>,
    /// Declarations and reads absorbed by a recovered loop.
    pub(crate) consumed: FxHashSet<SrcId>,
    /// Source positions standing for a synthesized variable.
    pub(crate) substitutions: FxHashMap<SrcId, String>,
    budget: Budget,
    diagnostics: Vec<Diagnostic>,
    abort: Option<LowerAbort>,
}

impl<'a> LowerCtx<'a> {
    pub fn new(
        arena: &'a SrcArena,
        enums: &'a EnumTable,
        config: &'a LowerConfig,
        root: SrcId,
    ) -> Self {
        LowerCtx {
            arena,
            enums,
            config,
            names: Resolver::new(config.naming.clone()),
            decls: DeclIndex::build(arena, root),
            clauses: Vec::new(),
            loops: Vec::new(),
            following: Vec::new(),
            consumed: FxHashSet::default(),
            substitutions: FxHashMap::default(),
            budget: Budget {
                nodes: 0,
                max_nodes: config.max_nodes,
                max_repetitions: config.max_kind_repetitions,
                chain: Vec::new(),
            },
            diagnostics: Vec::new(),
            abort: None,
        }
    }

    // Budget

    /// Count a node. Returns `false` once the unit has been abandoned.
    pub(crate) fn enter(&mut self, id: SrcId) -> bool {
        if self.abort.is_some() {
            return false;
        }
        let Some(expr) = self.arena.try_expr(id) else {
            return true;
        };
        match self.budget.enter(expr.kind.label(), expr.span) {
            Ok(()) => true,
            Err(abort) => {
                tracing::warn!(%abort, "abandoning unit");
                self.abort = Some(abort);
                false
            }
        }
    }

    pub(crate) fn exit(&mut self) {
        self.budget.exit();
    }

    pub fn is_aborted(&self) -> bool {
        self.abort.is_some()
    }

    pub(crate) fn take_abort(&mut self) -> Option<LowerAbort> {
        self.abort.take()
    }

    pub fn nodes_visited(&self) -> usize {
        self.budget.nodes
    }

    // Diagnostics

    pub(crate) fn report(&mut self, diagnostic: Diagnostic) {
        tracing::warn!(
            code = %diagnostic.code,
            message = %diagnostic.message,
            "lowering diagnostic"
        );
        self.diagnostics.push(diagnostic);
    }

    /// Report and return an error sentinel in one step.
    pub(crate) fn error_node(&mut self, diagnostic: Diagnostic, span: Span) -> TargetNode {
        let message = diagnostic.message.clone();
        self.report(diagnostic);
        TargetNode::error(message, span)
    }

    pub(crate) fn take_diagnostics(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.diagnostics)
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    // Naming

    fn override_for(&self, id: VarId) -> Option<&str> {
        self.clauses
            .iter()
            .rev()
            .find_map(|c| c.overrides.get(&id))
            .map(String::as_str)
    }

    /// Name for a declaration (or any other binder) of `id`.
    pub(crate) fn bind_var(&mut self, id: VarId) -> String {
        let declared = self.arena.var_name(id);
        let over = self.override_for(id).map(str::to_owned);
        self.names.resolve(id, declared, over.as_deref())
    }

    /// Whether a reference to `id` has a binding to resolve to.
    pub(crate) fn knows_var(&self, id: VarId) -> bool {
        self.override_for(id).is_some()
            || self.names.is_bound(id)
            || self.names.is_name_bound(self.arena.var_name(id))
    }

    /// `base`, or `base_N` for the first `N` nobody holds. The result is
    /// reserved in the innermost scope.
    pub(crate) fn fresh_name(&mut self, base: &str) -> String {
        let mut name = base.to_string();
        let mut n = 1usize;
        while self.names.is_held(&name) {
            name = format!("{base}_{n}");
            n += 1;
        }
        self.names.reserve(&name);
        name
    }

    /// Name for a reference to `id`.
    ///
    /// A reference to a variable that no enclosing scope has bound, by id or
    /// by declared name, is an invariant violation and yields an error
    /// sentinel.
    pub(crate) fn reference_var(&mut self, id: VarId, span: Span) -> TargetNode {
        let Some(var) = self.arena.var(id) else {
            let label = format!("#{}", id.raw());
            return self.error_node(undeclared_variable(span, &label), span);
        };
        let declared = self.arena.name(var.name);
        if !self.knows_var(id) {
            let diag = undeclared_variable(span, declared);
            return self.error_node(diag, span);
        }
        let name = self.bind_var(id);
        TargetNode::var(name).with_span(span)
    }

    // Clauses

    pub(crate) fn push_clause(&mut self, clause: ClauseContext) {
        self.names.push_scope();
        self.clauses.push(clause);
    }

    pub(crate) fn pop_clause(&mut self) -> Option<ClauseContext> {
        self.names.pop_scope();
        self.clauses.pop()
    }

    /// Innermost binding plan whose subject matches `subject` and `ctor`.
    pub(crate) fn plan_for(&self, subject: SrcId, ctor: ember_ir::Name) -> Option<&BindingPlan> {
        self.clauses
            .iter()
            .rev()
            .filter_map(|c| c.plan.as_ref())
            .find(|p| p.ctor == ctor && analysis::same_subject(self.arena, p.subject, subject))
    }

    /// Whether an enclosing arm's match value names a parameter `name`.
    pub(crate) fn is_surfaced(&self, name: &str) -> bool {
        self.clauses.iter().any(|c| c.surfaced.contains(name))
    }

    /// Whether a declaration was elided by an enclosing arm's binding plan.
    pub(crate) fn is_plan_elided(&self, decl: SrcId) -> bool {
        self.clauses
            .iter()
            .filter_map(|c| c.plan.as_ref())
            .any(|p| p.elided.contains(&decl))
    }

    // Loops

    pub(crate) fn push_loop(&mut self, frame: LoopFrame) {
        self.loops.push(frame);
    }

    pub(crate) fn pop_loop(&mut self) {
        self.loops.pop();
    }

    pub(crate) fn current_loop(&self) -> Option<&LoopFrame> {
        self.loops.last()
    }

    /// Whether some enclosing loop (inside the current function) repeats.
    pub(crate) fn in_loop(&self) -> bool {
        self.loops
            .iter()
            .rev()
            .take_while(|f| !matches!(f, LoopFrame::Barrier))
            .next()
            .is_some()
    }

    // Following statements

    pub(crate) fn push_following(&mut self, stmts: &[SrcId]) {
        self.following.push(stmts.iter().copied().collect());
    }

    pub(crate) fn pop_following(&mut self) {
        self.following.pop();
    }

    /// Whether `var` may be read after the statement being converted.
    ///
    /// Inside a repeating loop every variable counts as read, since the next
    /// iteration can observe it.
    pub(crate) fn used_after(&self, var: VarId) -> bool {
        if self.in_loop() {
            return true;
        }
        self.following
            .iter()
            .flatten()
            .any(|&stmt| analysis::mentions_var(self.arena, stmt, var))
    }
}
