//! Per-node metadata consumed by the printer.

use bitflags::bitflags;

use crate::Span;

bitflags! {
    /// Facts about a target node.
    #[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    pub struct NodeFlags: u8 {
        /// Evaluating the node has no side effects.
        const PURE = 1 << 0;
        /// Generic translation of a shape no specific rule matched.
        const FALLBACK = 1 << 1;
        /// No source counterpart; the span is a placeholder.
        const SYNTHETIC = 1 << 2;
        /// Binding whose value is never read afterwards.
        const DISCARDABLE = 1 << 3;
    }
}

/// Where a declaration came from. Drives discard naming in the printer.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DeclOrigin {
    /// Written by the user.
    User,
    /// Front-end temporary holding a tagged-union extraction.
    PatternTemp,
    /// Binder introduced by a tagged-union pattern.
    PatternBinder,
    /// Destructured accumulator of a state-threading fold.
    LoopAccumulator,
}

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NodeMeta {
    pub span: Span,
    pub flags: NodeFlags,
    /// Set on declarations only.
    pub origin: Option<DeclOrigin>,
}

impl NodeMeta {
    pub const fn new(span: Span) -> Self {
        NodeMeta {
            span,
            flags: NodeFlags::empty(),
            origin: None,
        }
    }

    pub const fn synthetic() -> Self {
        NodeMeta {
            span: Span::DUMMY,
            flags: NodeFlags::SYNTHETIC,
            origin: None,
        }
    }
}
