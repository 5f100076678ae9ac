//! By-value rewriting and read-only walking of target trees.
//!
//! Override `fold_node`/`fold_pattern` and call `walk_*` to continue into
//! children. The default implementations rebuild the tree unchanged.

use super::{CaseClause, FnClause, Generator, Pattern, TargetKind, TargetNode};

pub trait TargetFolder {
    fn fold_node(&mut self, node: TargetNode) -> TargetNode {
        walk_node(self, node)
    }

    fn fold_pattern(&mut self, pattern: Pattern) -> Pattern {
        walk_pattern(self, pattern)
    }
}

fn fold_vec<F: TargetFolder + ?Sized>(folder: &mut F, nodes: Vec<TargetNode>) -> Vec<TargetNode> {
    nodes.into_iter().map(|n| folder.fold_node(n)).collect()
}

fn fold_box<F: TargetFolder + ?Sized>(folder: &mut F, node: Box<TargetNode>) -> Box<TargetNode> {
    Box::new(folder.fold_node(*node))
}

fn fold_entries<F: TargetFolder + ?Sized>(
    folder: &mut F,
    entries: Vec<(TargetNode, TargetNode)>,
) -> Vec<(TargetNode, TargetNode)> {
    entries
        .into_iter()
        .map(|(k, v)| (folder.fold_node(k), folder.fold_node(v)))
        .collect()
}

fn fold_clause<F: TargetFolder + ?Sized>(folder: &mut F, clause: CaseClause) -> CaseClause {
    CaseClause {
        pattern: folder.fold_pattern(clause.pattern),
        guard: clause.guard.map(|g| folder.fold_node(g)),
        body: folder.fold_node(clause.body),
    }
}

/// Rebuild a node with folded children.
pub fn walk_node<F: TargetFolder + ?Sized>(folder: &mut F, node: TargetNode) -> TargetNode {
    let TargetNode { kind, meta } = node;
    let kind = match kind {
        TargetKind::Literal(_)
        | TargetKind::Var(_)
        | TargetKind::Raw(_)
        | TargetKind::Elided
        | TargetKind::Error(_) => kind,
        TargetKind::Match { pattern, value } => TargetKind::Match {
            pattern: Box::new(folder.fold_pattern(*pattern)),
            value: fold_box(folder, value),
        },
        TargetKind::Binary { op, left, right } => TargetKind::Binary {
            op,
            left: fold_box(folder, left),
            right: fold_box(folder, right),
        },
        TargetKind::Unary { op, operand } => TargetKind::Unary {
            op,
            operand: fold_box(folder, operand),
        },
        TargetKind::Call { name, args } => TargetKind::Call {
            name,
            args: fold_vec(folder, args),
        },
        TargetKind::RemoteCall { module, name, args } => TargetKind::RemoteCall {
            module,
            name,
            args: fold_vec(folder, args),
        },
        TargetKind::ApplyFn { callee, args } => TargetKind::ApplyFn {
            callee: fold_box(folder, callee),
            args: fold_vec(folder, args),
        },
        TargetKind::Field { receiver, field } => TargetKind::Field {
            receiver: fold_box(folder, receiver),
            field,
        },
        TargetKind::Access { receiver, key } => TargetKind::Access {
            receiver: fold_box(folder, receiver),
            key: fold_box(folder, key),
        },
        TargetKind::List(items) => TargetKind::List(fold_vec(folder, items)),
        TargetKind::Tuple(items) => TargetKind::Tuple(fold_vec(folder, items)),
        TargetKind::Map(entries) => TargetKind::Map(fold_entries(folder, entries)),
        TargetKind::MapUpdate { base, entries } => TargetKind::MapUpdate {
            base: fold_box(folder, base),
            entries: fold_entries(folder, entries),
        },
        TargetKind::Record { module, fields } => TargetKind::Record {
            module,
            fields: fields
                .into_iter()
                .map(|(name, value)| (name, folder.fold_node(value)))
                .collect(),
        },
        TargetKind::Range { start, end } => TargetKind::Range {
            start: fold_box(folder, start),
            end: fold_box(folder, end),
        },
        TargetKind::If {
            cond,
            then_branch,
            else_branch,
        } => TargetKind::If {
            cond: fold_box(folder, cond),
            then_branch: fold_box(folder, then_branch),
            else_branch: else_branch.map(|e| fold_box(folder, e)),
        },
        TargetKind::Block(stmts) => TargetKind::Block(fold_vec(folder, stmts)),
        TargetKind::Case { scrutinee, clauses } => TargetKind::Case {
            scrutinee: fold_box(folder, scrutinee),
            clauses: clauses
                .into_iter()
                .map(|c| fold_clause(folder, c))
                .collect(),
        },
        TargetKind::Try { body, rescue } => TargetKind::Try {
            body: fold_box(folder, body),
            rescue: rescue.into_iter().map(|c| fold_clause(folder, c)).collect(),
        },
        TargetKind::Fn { clauses } => TargetKind::Fn {
            clauses: clauses
                .into_iter()
                .map(|c| FnClause {
                    params: c
                        .params
                        .into_iter()
                        .map(|p| folder.fold_pattern(p))
                        .collect(),
                    guard: c.guard.map(|g| folder.fold_node(g)),
                    body: folder.fold_node(c.body),
                })
                .collect(),
        },
        TargetKind::For {
            generators,
            filters,
            body,
        } => TargetKind::For {
            generators: generators
                .into_iter()
                .map(|g| Generator {
                    pattern: folder.fold_pattern(g.pattern),
                    source: folder.fold_node(g.source),
                })
                .collect(),
            filters: fold_vec(folder, filters),
            body: fold_box(folder, body),
        },
        TargetKind::Repeat {
            cond,
            body,
            check_first,
        } => TargetKind::Repeat {
            cond: fold_box(folder, cond),
            body: fold_box(folder, body),
            check_first,
        },
    };
    TargetNode { kind, meta }
}

/// Rebuild a pattern with folded sub-patterns and map keys.
pub fn walk_pattern<F: TargetFolder + ?Sized>(folder: &mut F, pattern: Pattern) -> Pattern {
    match pattern {
        Pattern::Wildcard | Pattern::Bind { .. } | Pattern::Literal(_) | Pattern::Pin(_) => {
            pattern
        }
        Pattern::Tuple(items) => {
            Pattern::Tuple(items.into_iter().map(|p| folder.fold_pattern(p)).collect())
        }
        Pattern::List(items) => {
            Pattern::List(items.into_iter().map(|p| folder.fold_pattern(p)).collect())
        }
        Pattern::Binary(items) => {
            Pattern::Binary(items.into_iter().map(|p| folder.fold_pattern(p)).collect())
        }
        Pattern::Cons { heads, tail } => Pattern::Cons {
            heads: heads.into_iter().map(|p| folder.fold_pattern(p)).collect(),
            tail: Box::new(folder.fold_pattern(*tail)),
        },
        Pattern::Map(entries) => Pattern::Map(
            entries
                .into_iter()
                .map(|(k, v)| (folder.fold_node(k), folder.fold_pattern(v)))
                .collect(),
        ),
        Pattern::Tagged { tag, params } => Pattern::Tagged {
            tag,
            params: params.into_iter().map(|p| folder.fold_pattern(p)).collect(),
        },
        Pattern::Alias { pattern, name } => Pattern::Alias {
            pattern: Box::new(folder.fold_pattern(*pattern)),
            name,
        },
    }
}

/// Pre-order walk over every node of a tree. Patterns are not entered
/// except for map-pattern keys.
pub fn for_each_node<'a>(node: &'a TargetNode, f: &mut dyn FnMut(&'a TargetNode)) {
    f(node);
    let mut each = |n: &'a TargetNode| for_each_node(n, f);
    match &node.kind {
        TargetKind::Literal(_)
        | TargetKind::Var(_)
        | TargetKind::Raw(_)
        | TargetKind::Elided
        | TargetKind::Error(_) => {}
        TargetKind::Match { pattern, value } => {
            pattern_keys(pattern, &mut each);
            each(value);
        }
        TargetKind::Binary { left, right, .. } => {
            each(left);
            each(right);
        }
        TargetKind::Unary { operand, .. } => each(operand),
        TargetKind::Call { args, .. } | TargetKind::RemoteCall { args, .. } => {
            args.iter().for_each(each);
        }
        TargetKind::ApplyFn { callee, args } => {
            each(callee);
            args.iter().for_each(each);
        }
        TargetKind::Field { receiver, .. } => each(receiver),
        TargetKind::Access { receiver, key } => {
            each(receiver);
            each(key);
        }
        TargetKind::List(items) | TargetKind::Tuple(items) | TargetKind::Block(items) => {
            items.iter().for_each(each);
        }
        TargetKind::Map(entries) => {
            for (k, v) in entries {
                each(k);
                each(v);
            }
        }
        TargetKind::MapUpdate { base, entries } => {
            each(base);
            for (k, v) in entries {
                each(k);
                each(v);
            }
        }
        TargetKind::Record { fields, .. } => {
            for (_, v) in fields {
                each(v);
            }
        }
        TargetKind::Range { start, end } => {
            each(start);
            each(end);
        }
        TargetKind::If {
            cond,
            then_branch,
            else_branch,
        } => {
            each(cond);
            each(then_branch);
            if let Some(e) = else_branch {
                each(e);
            }
        }
        TargetKind::Case { scrutinee, clauses } => {
            each(scrutinee);
            for clause in clauses {
                clause_nodes(clause, &mut each);
            }
        }
        TargetKind::Try { body, rescue } => {
            each(body);
            for clause in rescue {
                clause_nodes(clause, &mut each);
            }
        }
        TargetKind::Fn { clauses } => {
            for clause in clauses {
                for p in &clause.params {
                    pattern_keys(p, &mut each);
                }
                if let Some(g) = &clause.guard {
                    each(g);
                }
                each(&clause.body);
            }
        }
        TargetKind::For {
            generators,
            filters,
            body,
        } => {
            for g in generators {
                pattern_keys(&g.pattern, &mut each);
                each(&g.source);
            }
            filters.iter().for_each(&mut each);
            each(body);
        }
        TargetKind::Repeat { cond, body, .. } => {
            each(cond);
            each(body);
        }
    }
}

fn clause_nodes<'a>(clause: &'a CaseClause, each: &mut impl FnMut(&'a TargetNode)) {
    pattern_keys(&clause.pattern, each);
    if let Some(g) = &clause.guard {
        each(g);
    }
    each(&clause.body);
}

fn pattern_keys<'a>(pattern: &'a Pattern, each: &mut impl FnMut(&'a TargetNode)) {
    match pattern {
        Pattern::Map(entries) => {
            for (k, v) in entries {
                each(k);
                pattern_keys(v, each);
            }
        }
        Pattern::Tuple(items) | Pattern::List(items) | Pattern::Binary(items) => {
            for item in items {
                pattern_keys(item, each);
            }
        }
        Pattern::Tagged { params, .. } => {
            for p in params {
                pattern_keys(p, each);
            }
        }
        Pattern::Cons { heads, tail } => {
            for h in heads {
                pattern_keys(h, each);
            }
            pattern_keys(tail, each);
        }
        Pattern::Alias { pattern, .. } => pattern_keys(pattern, each),
        Pattern::Wildcard | Pattern::Bind { .. } | Pattern::Literal(_) | Pattern::Pin(_) => {}
    }
}
