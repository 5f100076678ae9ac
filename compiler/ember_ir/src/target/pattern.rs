use super::{Lit, TargetNode};

/// Target pattern.
#[derive(Clone, Eq, PartialEq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Pattern {
    /// `_`
    Wildcard,
    /// Variable binder. `used = false` lets the printer pick a discard
    /// spelling; the binder keeps its resolved name either way.
    Bind { name: String, used: bool },
    Literal(Lit),
    Tuple(Vec<Pattern>),
    List(Vec<Pattern>),
    /// `[h1, h2 | tail]`
    Cons {
        heads: Vec<Pattern>,
        tail: Box<Pattern>,
    },
    /// `%{key => pattern}`
    Map(Vec<(TargetNode, Pattern)>),
    /// Tagged-union constructor: `{:tag, p0, p1}` or bare `:tag`.
    Tagged { tag: String, params: Vec<Pattern> },
    /// `^name`
    Pin(String),
    /// `pattern = name`
    Alias { pattern: Box<Pattern>, name: String },
    /// `<<seg, ...>>`
    Binary(Vec<Pattern>),
}

impl Pattern {
    pub fn bind(name: impl Into<String>) -> Self {
        Pattern::Bind {
            name: name.into(),
            used: true,
        }
    }

    pub fn atom(name: impl Into<String>) -> Self {
        Pattern::Literal(Lit::atom(name))
    }

    /// Name bound by a plain binder.
    pub fn bound_name(&self) -> Option<&str> {
        match self {
            Pattern::Bind { name, .. } => Some(name),
            _ => None,
        }
    }

    /// Every name this pattern binds, in left-to-right order.
    pub fn binders(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_binders(&mut out);
        out
    }

    fn collect_binders<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Pattern::Bind { name, .. } => out.push(name),
            Pattern::Alias { pattern, name } => {
                pattern.collect_binders(out);
                out.push(name);
            }
            Pattern::Tuple(items) | Pattern::List(items) | Pattern::Binary(items) => {
                for item in items {
                    item.collect_binders(out);
                }
            }
            Pattern::Tagged { params, .. } => {
                for param in params {
                    param.collect_binders(out);
                }
            }
            Pattern::Cons { heads, tail } => {
                for head in heads {
                    head.collect_binders(out);
                }
                tail.collect_binders(out);
            }
            Pattern::Map(entries) => {
                for (_, value) in entries {
                    value.collect_binders(out);
                }
            }
            Pattern::Wildcard | Pattern::Literal(_) | Pattern::Pin(_) => {}
        }
    }
}
