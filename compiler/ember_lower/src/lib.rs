//! Semantic lowering from the typed source tree to the Ember target tree.
//!
//! One compilation unit at a time, a fresh [`LowerCtx`] walks the source
//! arena and produces an owned [`TargetNode`] tree plus diagnostics.
//!
//! # Pipeline Position
//!
//! ```text
//! Front-end (typed tree) → **Lower** → Print
//! ```
//!
//! # Components
//!
//! - [`naming`]: per-variable target names, stable across a unit.
//! - [`binding_plan`]: per-arm decision of how constructor parameters are
//!   named and which extractions disappear.
//! - [`loops`]: recognition of iteration scaffolds as map/filter/fold.
//! - [`threading`]: rewriting of mutating loops as folds carrying their
//!   state.
//! - the tree converter, which drives all of the above.
//!
//! Units are independent; [`lower_units`] converts them in parallel.

pub mod analysis;
pub mod binding_plan;
pub mod config;
mod context;
mod convert;
pub mod loops;
pub mod naming;
pub mod outcome;
mod stack;
pub mod threading;

#[cfg(test)]
#[allow(dead_code)]
mod test_helpers;

use rayon::prelude::*;

use ember_ir::{EnumTable, SrcArena, SrcId};

pub use config::{LowerConfig, NamingConfig};
pub use context::LowerCtx;
pub use outcome::{LowerAbort, LowerOutcome};

/// One compilation unit as handed over by the front-end.
#[derive(Debug)]
pub struct SourceUnit {
    pub arena: SrcArena,
    pub root: SrcId,
    pub enums: EnumTable,
}

impl SourceUnit {
    pub fn new(arena: SrcArena, root: SrcId, enums: EnumTable) -> Self {
        SourceUnit { arena, root, enums }
    }
}

/// Lower one unit.
///
/// Never panics on malformed input: invariant violations become error
/// sentinels in [`LowerOutcome::Recovered`], exhausted budgets a
/// [`LowerOutcome::Fatal`].
pub fn lower_unit(unit: &SourceUnit, config: &LowerConfig) -> LowerOutcome {
    let _span = tracing::info_span!("lower_unit", root = ?unit.root).entered();

    if unit.arena.try_expr(unit.root).is_none() {
        tracing::warn!("unit has no root expression");
        return LowerOutcome::Fatal(LowerAbort::EmptyRoot.into_diagnostic());
    }

    let mut ctx = LowerCtx::new(&unit.arena, &unit.enums, config, unit.root);
    let node = ctx.lower_expr(unit.root);
    if let Some(abort) = ctx.take_abort() {
        tracing::warn!(%abort, "unit abandoned");
        return LowerOutcome::Fatal(abort.into_diagnostic());
    }

    let diagnostics = ctx.take_diagnostics();
    tracing::debug!(
        nodes = ctx.nodes_visited(),
        diagnostics = diagnostics.len(),
        "unit lowered"
    );
    LowerOutcome::from_parts(node, diagnostics)
}

/// Lower independent units in parallel. Output order matches input order.
pub fn lower_units(units: &[SourceUnit], config: &LowerConfig) -> Vec<LowerOutcome> {
    units.par_iter().map(|unit| lower_unit(unit, config)).collect()
}
