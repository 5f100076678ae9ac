//! Per-unit lowering result.

use ember_diagnostic::{Diagnostic, ErrorCode};
use ember_ir::{Span, TargetNode};

/// Conditions that end a unit.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum LowerAbort {
    #[error("node budget of {limit} exceeded")]
    NodeBudget { limit: usize, span: Span },

    #[error("`{kind}` nested more than {limit} times in a row")]
    KindRepetition {
        kind: &'static str,
        limit: usize,
        span: Span,
    },

    #[error("unit has no root expression")]
    EmptyRoot,
}

impl LowerAbort {
    pub fn code(&self) -> ErrorCode {
        match self {
            LowerAbort::NodeBudget { .. } => ErrorCode::E9001,
            LowerAbort::KindRepetition { .. } => ErrorCode::E9002,
            LowerAbort::EmptyRoot => ErrorCode::E9003,
        }
    }

    fn span(&self) -> Span {
        match self {
            LowerAbort::NodeBudget { span, .. } | LowerAbort::KindRepetition { span, .. } => *span,
            LowerAbort::EmptyRoot => Span::DUMMY,
        }
    }

    pub fn into_diagnostic(self) -> Diagnostic {
        let span = self.span();
        Diagnostic::error(self.code())
            .with_message(self.to_string())
            .with_label(span, "lowering stopped here")
            .with_note("output for this unit was discarded; other units are unaffected")
    }
}

/// Result of lowering one unit.
#[derive(Clone, Debug, PartialEq, Eq)]
#[must_use]
pub enum LowerOutcome {
    /// Converted without diagnostics.
    Success(TargetNode),
    /// Converted; some constructs became error sentinels or fallbacks.
    Recovered {
        node: TargetNode,
        diagnostics: Vec<Diagnostic>,
    },
    /// The unit was abandoned. No partial output is kept.
    Fatal(Diagnostic),
}

impl LowerOutcome {
    pub(crate) fn from_parts(node: TargetNode, diagnostics: Vec<Diagnostic>) -> Self {
        if diagnostics.is_empty() {
            LowerOutcome::Success(node)
        } else {
            LowerOutcome::Recovered { node, diagnostics }
        }
    }

    /// The converted tree, unless the unit was abandoned.
    pub fn node(&self) -> Option<&TargetNode> {
        match self {
            LowerOutcome::Success(node) | LowerOutcome::Recovered { node, .. } => Some(node),
            LowerOutcome::Fatal(_) => None,
        }
    }

    pub fn into_node(self) -> Option<TargetNode> {
        match self {
            LowerOutcome::Success(node) | LowerOutcome::Recovered { node, .. } => Some(node),
            LowerOutcome::Fatal(_) => None,
        }
    }

    /// Recoverable diagnostics, or the fatal one.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        match self {
            LowerOutcome::Success(_) => &[],
            LowerOutcome::Recovered { diagnostics, .. } => diagnostics,
            LowerOutcome::Fatal(diag) => std::slice::from_ref(diag),
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, LowerOutcome::Fatal(_))
    }
}
