//! Binding plans for tagged-union pattern arms.
//!
//! The front-end splits `case Some(v): body` into a discriminant switch plus
//! `var _g = EnumParameter(subject, Some, 0); var v = _g;` inside the arm. A
//! plan undoes that: it fixes one final name per constructor parameter
//! before the arm body is converted, decides which extraction temporaries
//! can disappear, and records whether each parameter is read at all.
//!
//! Carriers are found by variable id, never by name, so a user variable that
//! happens to be spelled like a placeholder is never mistaken for one.

use rustc_hash::{FxHashMap, FxHashSet};

use ember_ir::visitor::{walk_expr, Visitor};
use ember_ir::{EnumTable, Name, Pattern, SrcArena, SrcId, SrcKind, VarId};

use crate::analysis::{self, same_subject};
use crate::naming::Resolver;

/// Where a parameter's final name came from.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum NameSource {
    /// Written at that position in the match value, or the name of a user
    /// variable the arm extracts the parameter into.
    Pattern,
    /// The constructor's declared parameter name.
    Declared,
    /// Index-derived placeholder.
    Placeholder,
}

/// Final name and usage of one constructor parameter.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct ParamBinding {
    pub final_name: String,
    pub used: bool,
    pub source: NameSource,
}

/// Authoritative parameter table for one arm.
#[derive(Clone, Debug)]
pub struct BindingPlan {
    pub ctor: Name,
    pub enum_name: Option<Name>,
    /// Expression the arm destructures.
    pub subject: SrcId,
    /// One entry per parameter index, no gaps.
    pub params: Vec<ParamBinding>,
    /// Parameter count the enum table declares, when the constructor is
    /// known. Fewer than `params.len()` means the arm extracts past the end.
    pub declared_arity: Option<usize>,
    /// Carrier variable → final name of its parameter.
    pub overrides: FxHashMap<VarId, String>,
    /// Extraction and copy declarations that produce no output.
    pub elided: FxHashSet<SrcId>,
}

impl BindingPlan {
    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn param(&self, index: usize) -> Option<&ParamBinding> {
        self.params.get(index)
    }

    pub fn final_name(&self, index: usize) -> Option<&str> {
        self.param(index).map(|p| p.final_name.as_str())
    }

    /// Target pattern for the arm. A constructor without parameters gives a
    /// tag with no params, which the printer spells as a bare atom.
    pub fn pattern(&self, tag: &str) -> Pattern {
        Pattern::Tagged {
            tag: tag.to_string(),
            params: self
                .params
                .iter()
                .map(|p| Pattern::Bind {
                    name: p.final_name.clone(),
                    used: p.used,
                })
                .collect(),
        }
    }
}

/// One arm as seen by the plan builder.
#[derive(Copy, Clone, Debug)]
pub struct ArmInput<'s> {
    pub enum_name: Option<Name>,
    pub ctor: Name,
    pub subject: SrcId,
    /// Binders written in the match value (`Some(v)`), possibly empty.
    pub pattern_args: &'s [SrcId],
    /// `SrcId::INVALID` when the arm has no guard.
    pub guard: SrcId,
    pub body: SrcId,
}

struct Extraction {
    decl: SrcId,
    var: VarId,
    index: usize,
}

struct CopyDecl {
    decl: SrcId,
    target: VarId,
    source: VarId,
}

struct Read {
    var: VarId,
    /// Declaration whose initializer this read is, if any.
    init_of: Option<SrcId>,
}

/// Everything in an arm that touches the destructured subject.
struct ArmScan<'i> {
    input: &'i ArmInput<'i>,
    extractions: Vec<Extraction>,
    copies: Vec<CopyDecl>,
    /// Index → number of direct `EnumParameter` reads.
    direct: FxHashMap<usize, u32>,
    reads: Vec<Read>,
    written: FxHashSet<VarId>,
    /// Largest parameter index the arm extracts.
    max_index: Option<usize>,
}

impl ArmScan<'_> {
    fn extraction_index(&self, arena: &SrcArena, init: SrcId) -> Option<usize> {
        match arena.try_expr(arena.unwrap_transparent(init))?.kind {
            SrcKind::EnumParameter {
                subject,
                ctor,
                index,
            } if ctor == self.input.ctor && same_subject(arena, subject, self.input.subject) => {
                Some(index as usize)
            }
            _ => None,
        }
    }

    fn note_index(&mut self, index: usize) {
        self.max_index = Some(self.max_index.map_or(index, |m| m.max(index)));
    }
}

impl<'a> Visitor<'a> for ArmScan<'_> {
    fn visit_expr(&mut self, id: SrcId, arena: &'a SrcArena) {
        let Some(expr) = arena.try_expr(id) else {
            return;
        };
        match expr.kind {
            SrcKind::VarDecl { var, init } => {
                if let Some(index) = self.extraction_index(arena, init) {
                    self.note_index(index);
                    self.extractions.push(Extraction {
                        decl: id,
                        var,
                        index,
                    });
                    return;
                }
                if let Some(source) = analysis::local_of(arena, init) {
                    self.copies.push(CopyDecl {
                        decl: id,
                        target: var,
                        source,
                    });
                    self.reads.push(Read {
                        var: source,
                        init_of: Some(id),
                    });
                    return;
                }
            }
            SrcKind::EnumParameter {
                subject,
                ctor,
                index,
            } if ctor == self.input.ctor && same_subject(arena, subject, self.input.subject) => {
                let index = index as usize;
                self.note_index(index);
                *self.direct.entry(index).or_insert(0) += 1;
                return;
            }
            SrcKind::Local(var) => self.reads.push(Read { var, init_of: None }),
            SrcKind::Binary {
                op: ember_ir::SrcBinOp::Assign | ember_ir::SrcBinOp::AssignOp(_),
                left,
                ..
            } => {
                if let Some(var) = analysis::written_root(arena, left).var() {
                    self.written.insert(var);
                }
            }
            SrcKind::Unary { op, operand, .. } if op.is_update() => {
                if let Some(var) = analysis::written_root(arena, operand).var() {
                    self.written.insert(var);
                }
            }
            SrcKind::Call { callee, .. } => {
                if let Some(var) = analysis::mutated_receiver(arena, callee) {
                    self.written.insert(var);
                }
            }
            _ => {}
        }
        walk_expr(self, id, arena);
    }
}

/// Variable named at a pattern position.
pub(crate) fn pattern_binder(arena: &SrcArena, arg: SrcId) -> Option<VarId> {
    match arena.try_expr(arena.unwrap_transparent(arg))?.kind {
        SrcKind::Local(var) | SrcKind::VarDecl { var, .. } => Some(var),
        _ => None,
    }
}

/// Build the binding plan for one arm.
///
/// The plan covers every parameter index that the constructor declares, the
/// match value names, or the arm extracts, so it is total even when the
/// constructor is unknown to the enum table.
pub fn build_plan(
    arena: &SrcArena,
    enums: &EnumTable,
    names: &Resolver,
    input: &ArmInput<'_>,
) -> BindingPlan {
    let mut scan = ArmScan {
        input,
        extractions: Vec::new(),
        copies: Vec::new(),
        direct: FxHashMap::default(),
        reads: Vec::new(),
        written: FxHashSet::default(),
        max_index: None,
    };
    scan.visit_optional(input.guard, arena);
    scan.visit_optional(input.body, arena);

    let known: Option<&[Name]> = input
        .enum_name
        .and_then(|e| enums.ctor_params(e, input.ctor))
        .or_else(|| enums.find_ctor(input.ctor).map(|(_, c)| c.params.as_slice()));
    let declared = known.unwrap_or(&[]);

    let arity = declared
        .len()
        .max(input.pattern_args.len())
        .max(scan.max_index.map_or(0, |m| m + 1));

    // Carriers: variables that hold the value of a parameter and are never
    // rebound. A rebound variable keeps its own name and declaration.
    let read_count: FxHashMap<VarId, usize> =
        scan.reads.iter().fold(FxHashMap::default(), |mut acc, r| {
            *acc.entry(r.var).or_insert(0) += 1;
            acc
        });
    let mut carrier_of: FxHashMap<VarId, usize> = FxHashMap::default();
    let mut carriers: Vec<Vec<VarId>> = vec![Vec::new(); arity];
    let mut binders: Vec<Option<VarId>> = vec![None; arity];
    // Rebound binders are seeded from the parameter at the top of the arm.
    let mut seeded: Vec<usize> = Vec::new();

    for (index, &arg) in input.pattern_args.iter().enumerate() {
        let Some(var) = pattern_binder(arena, arg) else {
            continue;
        };
        // A generated binder nobody reads is a wildcard, not a name.
        if analysis::is_generated(arena, var) && !read_count.contains_key(&var) {
            continue;
        }
        if scan.written.contains(&var) {
            seeded.push(index);
            continue;
        }
        binders[index] = Some(var);
        carrier_of.insert(var, index);
        carriers[index].push(var);
    }
    for extraction in &scan.extractions {
        if scan.written.contains(&extraction.var) || carrier_of.contains_key(&extraction.var) {
            continue;
        }
        carrier_of.insert(extraction.var, extraction.index);
        carriers[extraction.index].push(extraction.var);
    }
    loop {
        let mut changed = false;
        for copy in &scan.copies {
            if scan.written.contains(&copy.target) || carrier_of.contains_key(&copy.target) {
                continue;
            }
            if let Some(&index) = carrier_of.get(&copy.source) {
                carrier_of.insert(copy.target, index);
                carriers[index].push(copy.target);
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }

    // Seed final names.
    let mut taken: FxHashSet<String> = FxHashSet::default();
    let mut params = Vec::with_capacity(arity);
    for index in 0..arity {
        let user_named = binders[index]
            .filter(|&v| !analysis::is_generated(arena, v))
            .or_else(|| {
                carriers[index]
                    .iter()
                    .copied()
                    .find(|&v| !analysis::is_generated(arena, v))
            });
        let (mut final_name, source) = if let Some(var) = user_named {
            (names.display(arena.var_name(var)), NameSource::Pattern)
        } else if let Some(&param) = declared.get(index) {
            (names.display(arena.name(param)), NameSource::Declared)
        } else {
            #[expect(
                clippy::cast_possible_truncation,
                reason = "constructor arity fits u32"
            )]
            let placeholder = names.placeholder_text(index as u32);
            (placeholder, NameSource::Placeholder)
        };
        if final_name == "_" || taken.contains(&final_name) {
            final_name = format!("{}_{index}", final_name.trim_end_matches('_'));
        }
        // A name the arm did not choose must not capture a live outer binding.
        let captures = |name: &str| {
            source != NameSource::Pattern
                && names
                    .holder(name)
                    .is_some_and(|id| !id.is_some_and(|v| carriers[index].contains(&v)))
        };
        if captures(&final_name) {
            let base = final_name.trim_end_matches('_').to_string();
            let mut n = 1usize;
            loop {
                final_name = format!("{base}_{n}");
                if !taken.contains(&final_name) && !captures(&final_name) {
                    break;
                }
                n += 1;
            }
        }
        taken.insert(final_name.clone());
        params.push(ParamBinding {
            final_name,
            used: false,
            source,
        });
    }

    // Elision and overrides.
    let mut elided = FxHashSet::default();
    for extraction in &scan.extractions {
        if carrier_of.contains_key(&extraction.var) {
            elided.insert(extraction.decl);
        }
    }
    for copy in &scan.copies {
        if carrier_of.contains_key(&copy.target) {
            elided.insert(copy.decl);
        }
    }
    let overrides: FxHashMap<VarId, String> = carrier_of
        .iter()
        .map(|(&var, &index)| (var, params[index].final_name.clone()))
        .collect();

    // Usage: a read of any carrier, other than the initializer of an elided
    // copy, or a direct extraction.
    for read in &scan.reads {
        if read.init_of.is_some_and(|decl| elided.contains(&decl)) {
            continue;
        }
        if let Some(&index) = carrier_of.get(&read.var) {
            params[index].used = true;
        }
    }
    for extraction in &scan.extractions {
        // Kept extractions read the parameter.
        if !elided.contains(&extraction.decl) {
            params[extraction.index].used = true;
        }
    }
    for &index in scan.direct.keys().chain(&seeded) {
        if let Some(param) = params.get_mut(index) {
            param.used = true;
        }
    }

    tracing::debug!(
        ctor = arena.name(input.ctor),
        arity,
        elided = elided.len(),
        params = ?params.iter().map(|p| (&p.final_name, p.used)).collect::<Vec<_>>(),
        "binding plan"
    );

    BindingPlan {
        ctor: input.ctor,
        enum_name: input.enum_name,
        subject: input.subject,
        params,
        declared_arity: known.map(<[Name]>::len),
        overrides,
        elided,
    }
}
