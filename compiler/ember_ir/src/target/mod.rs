//! Target tree handed to the printer.
//!
//! Unlike the source side, the target tree owns its children: lowering
//! builds it bottom-up, and the few passes that touch it afterwards rebuild
//! subtrees by value through [`TargetFolder`].
//!
//! # Elision
//!
//! [`TargetKind::Elided`] marks a position that must produce no output at
//! all. It is only ever a transient value: [`TargetNode::block`] drops
//! elided children, and every other constructor that takes a child list
//! does the same through [`retain_output`].

mod fold;
mod meta;
mod pattern;

use std::fmt;

pub use fold::{for_each_node, walk_node, walk_pattern, TargetFolder};
pub use meta::{DeclOrigin, NodeFlags, NodeMeta};
pub use pattern::Pattern;

use crate::Span;

/// Target literal.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Lit {
    Int(i64),
    /// `f64` bits, see [`Lit::float`].
    Float(u64),
    Bool(bool),
    Str(String),
    /// `:name`, stored without the colon.
    Atom(String),
    Nil,
}

impl Lit {
    pub fn float(value: f64) -> Self {
        Lit::Float(value.to_bits())
    }

    pub fn atom(name: impl Into<String>) -> Self {
        Lit::Atom(name.into())
    }
}

/// Target binary operator.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TargetBinOp {
    Add,
    Sub,
    Mul,
    Div,
    /// `<>`
    Concat,
    /// `++`
    ListConcat,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    And,
    Or,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
}

impl TargetBinOp {
    pub fn as_symbol(self) -> &'static str {
        match self {
            TargetBinOp::Add => "+",
            TargetBinOp::Sub => "-",
            TargetBinOp::Mul => "*",
            TargetBinOp::Div => "/",
            TargetBinOp::Concat => "<>",
            TargetBinOp::ListConcat => "++",
            TargetBinOp::Eq => "==",
            TargetBinOp::NotEq => "!=",
            TargetBinOp::Lt => "<",
            TargetBinOp::LtEq => "<=",
            TargetBinOp::Gt => ">",
            TargetBinOp::GtEq => ">=",
            TargetBinOp::And => "and",
            TargetBinOp::Or => "or",
            TargetBinOp::BitAnd => "&&&",
            TargetBinOp::BitOr => "|||",
            TargetBinOp::BitXor => "^^^",
            TargetBinOp::Shl => "<<<",
            TargetBinOp::Shr => ">>>",
        }
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TargetUnaryOp {
    Not,
    Neg,
    BitNot,
}

/// One `pattern when guard -> body` clause of a `case` or `rescue`.
#[derive(Clone, Eq, PartialEq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CaseClause {
    pub pattern: Pattern,
    pub guard: Option<TargetNode>,
    pub body: TargetNode,
}

/// One clause of an anonymous function.
#[derive(Clone, Eq, PartialEq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FnClause {
    pub params: Vec<Pattern>,
    pub guard: Option<TargetNode>,
    pub body: TargetNode,
}

/// `pattern <- source` generator of a comprehension.
#[derive(Clone, Eq, PartialEq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Generator {
    pub pattern: Pattern,
    pub source: TargetNode,
}

/// Target node kind.
#[derive(Clone, Eq, PartialEq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TargetKind {
    Literal(Lit),
    Var(String),
    /// `pattern = value`
    Match {
        pattern: Box<Pattern>,
        value: Box<TargetNode>,
    },
    Binary {
        op: TargetBinOp,
        left: Box<TargetNode>,
        right: Box<TargetNode>,
    },
    Unary {
        op: TargetUnaryOp,
        operand: Box<TargetNode>,
    },
    /// Local or kernel call: `name(args)`.
    Call {
        name: String,
        args: Vec<TargetNode>,
    },
    /// `Module.name(args)`
    RemoteCall {
        module: String,
        name: String,
        args: Vec<TargetNode>,
    },
    /// `callee.(args)`
    ApplyFn {
        callee: Box<TargetNode>,
        args: Vec<TargetNode>,
    },
    /// `receiver.field`
    Field {
        receiver: Box<TargetNode>,
        field: String,
    },
    /// `receiver[key]`
    Access {
        receiver: Box<TargetNode>,
        key: Box<TargetNode>,
    },
    List(Vec<TargetNode>),
    Tuple(Vec<TargetNode>),
    Map(Vec<(TargetNode, TargetNode)>),
    /// `%{base | key: value}`
    MapUpdate {
        base: Box<TargetNode>,
        entries: Vec<(TargetNode, TargetNode)>,
    },
    /// `%Module{field: value}`
    Record {
        module: String,
        fields: Vec<(String, TargetNode)>,
    },
    /// `start..end`, inclusive.
    Range {
        start: Box<TargetNode>,
        end: Box<TargetNode>,
    },
    If {
        cond: Box<TargetNode>,
        then_branch: Box<TargetNode>,
        else_branch: Option<Box<TargetNode>>,
    },
    Block(Vec<TargetNode>),
    Case {
        scrutinee: Box<TargetNode>,
        clauses: Vec<CaseClause>,
    },
    Try {
        body: Box<TargetNode>,
        rescue: Vec<CaseClause>,
    },
    Fn {
        clauses: Vec<FnClause>,
    },
    /// Comprehension: `for gen, filter, do: body`.
    For {
        generators: Vec<Generator>,
        filters: Vec<TargetNode>,
        body: Box<TargetNode>,
    },
    /// Opaque repetition. The printer decides how to spell it.
    Repeat {
        cond: Box<TargetNode>,
        body: Box<TargetNode>,
        check_first: bool,
    },
    Raw(String),
    /// Position that produces no output.
    Elided,
    /// Error sentinel carrying a short description.
    Error(String),
}

/// Target node: kind plus metadata for the printer.
#[derive(Clone, Eq, PartialEq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TargetNode {
    pub kind: TargetKind,
    pub meta: NodeMeta,
}

impl TargetNode {
    pub fn new(kind: TargetKind, span: Span) -> Self {
        TargetNode {
            kind,
            meta: NodeMeta::new(span),
        }
    }

    /// Node with no source counterpart.
    pub fn synthetic(kind: TargetKind) -> Self {
        TargetNode {
            kind,
            meta: NodeMeta::synthetic(),
        }
    }

    pub fn elided() -> Self {
        Self::synthetic(TargetKind::Elided)
    }

    pub fn error(message: impl Into<String>, span: Span) -> Self {
        let mut node = Self::new(TargetKind::Error(message.into()), span);
        node.meta.flags |= NodeFlags::FALLBACK;
        node
    }

    pub fn var(name: impl Into<String>) -> Self {
        Self::synthetic(TargetKind::Var(name.into())).with_flags(NodeFlags::PURE)
    }

    pub fn lit(lit: Lit) -> Self {
        Self::synthetic(TargetKind::Literal(lit)).with_flags(NodeFlags::PURE)
    }

    pub fn int(value: i64) -> Self {
        Self::lit(Lit::Int(value))
    }

    pub fn atom(name: impl Into<String>) -> Self {
        Self::lit(Lit::atom(name))
    }

    pub fn nil() -> Self {
        Self::lit(Lit::Nil)
    }

    pub fn binary(op: TargetBinOp, left: TargetNode, right: TargetNode) -> Self {
        let pure = left.is_pure() && right.is_pure();
        let node = Self::synthetic(TargetKind::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        });
        if pure {
            node.with_flags(NodeFlags::PURE)
        } else {
            node
        }
    }

    pub fn call(name: impl Into<String>, args: Vec<TargetNode>) -> Self {
        Self::synthetic(TargetKind::Call {
            name: name.into(),
            args: retain_output(args),
        })
    }

    pub fn remote_call(
        module: impl Into<String>,
        name: impl Into<String>,
        args: Vec<TargetNode>,
    ) -> Self {
        Self::synthetic(TargetKind::RemoteCall {
            module: module.into(),
            name: name.into(),
            args: retain_output(args),
        })
    }

    pub fn tuple(items: Vec<TargetNode>) -> Self {
        let items = retain_output(items);
        let pure = items.iter().all(TargetNode::is_pure);
        let node = Self::synthetic(TargetKind::Tuple(items));
        if pure {
            node.with_flags(NodeFlags::PURE)
        } else {
            node
        }
    }

    pub fn list(items: Vec<TargetNode>) -> Self {
        let items = retain_output(items);
        let pure = items.iter().all(TargetNode::is_pure);
        let node = Self::synthetic(TargetKind::List(items));
        if pure {
            node.with_flags(NodeFlags::PURE)
        } else {
            node
        }
    }

    /// `pattern = value`
    pub fn match_(pattern: Pattern, value: TargetNode) -> Self {
        Self::synthetic(TargetKind::Match {
            pattern: Box::new(pattern),
            value: Box::new(value),
        })
    }

    /// Single-clause anonymous function.
    pub fn lambda(params: Vec<Pattern>, body: TargetNode) -> Self {
        Self::synthetic(TargetKind::Fn {
            clauses: vec![FnClause {
                params,
                guard: None,
                body,
            }],
        })
    }

    /// Build a block from statements.
    ///
    /// Elided statements are dropped. An empty result is `nil`; a single
    /// remaining statement is returned as-is.
    pub fn block(stmts: Vec<TargetNode>, span: Span) -> Self {
        let mut stmts = retain_output(stmts);
        match stmts.len() {
            0 => {
                let mut node = Self::nil();
                node.meta.span = span;
                node
            }
            1 => stmts.pop().unwrap_or_else(Self::nil),
            _ => Self::new(TargetKind::Block(stmts), span),
        }
    }

    #[must_use]
    pub fn with_span(mut self, span: Span) -> Self {
        self.meta.span = span;
        self.meta.flags.remove(NodeFlags::SYNTHETIC);
        self
    }

    #[must_use]
    pub fn with_flags(mut self, flags: NodeFlags) -> Self {
        self.meta.flags |= flags;
        self
    }

    #[must_use]
    pub fn with_origin(mut self, origin: DeclOrigin) -> Self {
        self.meta.origin = Some(origin);
        self
    }

    #[inline]
    pub fn is_elided(&self) -> bool {
        matches!(self.kind, TargetKind::Elided)
    }

    #[inline]
    pub fn is_error(&self) -> bool {
        matches!(self.kind, TargetKind::Error(_))
    }

    #[inline]
    pub fn is_pure(&self) -> bool {
        self.meta.flags.contains(NodeFlags::PURE)
    }

    /// Variable name if this is a plain variable reference.
    pub fn as_var(&self) -> Option<&str> {
        match &self.kind {
            TargetKind::Var(name) => Some(name),
            _ => None,
        }
    }

    /// Number of nodes in this subtree, patterns excluded.
    pub fn node_count(&self) -> usize {
        let mut count = 0;
        for_each_node(self, &mut |_| count += 1);
        count
    }
}

/// Drop elided entries from a child list.
pub fn retain_output(mut nodes: Vec<TargetNode>) -> Vec<TargetNode> {
    nodes.retain(|n| !n.is_elided());
    nodes
}

impl fmt::Display for Lit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Lit::Int(v) => write!(f, "{v}"),
            Lit::Float(bits) => write!(f, "{:?}", f64::from_bits(*bits)),
            Lit::Bool(v) => write!(f, "{v}"),
            Lit::Str(s) => write!(f, "{s:?}"),
            Lit::Atom(a) => write!(f, ":{a}"),
            Lit::Nil => write!(f, "nil"),
        }
    }
}
