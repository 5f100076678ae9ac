//! Arena builders for unit tests.
//!
//! Every allocated node gets its own one-byte span so tests can tell nodes
//! apart by position.

use std::sync::Once;

use ember_ir::{
    BinaryOp, CaseClause, CtorDef, EnumDef, EnumTable, Name, Pattern, Span, SrcArena, SrcArm,
    SrcBinOp, SrcCatch, SrcField, SrcId, SrcKind, SrcUnaryOp, TargetKind, TargetNode,
    TargetUnaryOp, TypeId, VarFlags, VarId,
};

static TRACING_INIT: Once = Once::new();

/// Install a log subscriber for test debugging.
///
/// Only when `RUST_LOG` is set, e.g. `RUST_LOG=ember_lower=debug`.
pub(crate) fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{fmt, prelude::*, EnvFilter};

        if std::env::var("RUST_LOG").is_ok() {
            tracing_subscriber::registry()
                .with(fmt::layer().with_test_writer())
                .with(EnvFilter::from_default_env())
                .init();
        }
    });
}

pub(crate) struct Builder {
    pub arena: SrcArena,
    pub enums: EnumTable,
    pos: u32,
}

impl Builder {
    pub fn new() -> Self {
        Builder {
            arena: SrcArena::new(),
            enums: EnumTable::new(),
            pos: 0,
        }
    }

    pub fn finish(self) -> SrcArena {
        self.arena
    }

    pub fn finish_with_enums(self) -> (SrcArena, EnumTable) {
        (self.arena, self.enums)
    }

    pub fn name(&mut self, s: &str) -> Name {
        self.arena.intern(s)
    }

    fn span(&mut self) -> Span {
        self.pos += 1;
        Span::new(self.pos, self.pos + 1)
    }

    pub fn node(&mut self, kind: SrcKind, ty: TypeId) -> SrcId {
        let span = self.span();
        self.arena.alloc(kind, span, ty)
    }

    // Variables

    pub fn var(&mut self, name: &str) -> VarId {
        self.arena.declare_var(name, TypeId::INT, VarFlags::empty())
    }

    pub fn typed_var(&mut self, name: &str, ty: TypeId) -> VarId {
        self.arena.declare_var(name, ty, VarFlags::empty())
    }

    pub fn gen_var(&mut self, name: &str) -> VarId {
        self.arena
            .declare_var(name, TypeId::INT, VarFlags::GENERATED)
    }

    pub fn array_ty(&mut self) -> TypeId {
        self.arena.types_mut().array(TypeId::INT)
    }

    pub fn array_var(&mut self, name: &str) -> VarId {
        let ty = self.array_ty();
        self.typed_var(name, ty)
    }

    pub fn gen_array_var(&mut self, name: &str) -> VarId {
        let ty = self.array_ty();
        self.arena.declare_var(name, ty, VarFlags::GENERATED)
    }

    pub fn enum_var(&mut self, name: &str, enum_name: Name) -> VarId {
        let ty = self.arena.types_mut().enum_type(enum_name);
        self.typed_var(name, ty)
    }

    // Leaves

    pub fn int(&mut self, value: i64) -> SrcId {
        self.node(SrcKind::Int(value), TypeId::INT)
    }

    pub fn bool(&mut self, value: bool) -> SrcId {
        self.node(SrcKind::Bool(value), TypeId::BOOL)
    }

    pub fn str(&mut self, value: &str) -> SrcId {
        let name = self.name(value);
        self.node(SrcKind::Str(name), TypeId::STRING)
    }

    pub fn null(&mut self) -> SrcId {
        self.node(SrcKind::Null, TypeId::DYNAMIC)
    }

    pub fn this(&mut self) -> SrcId {
        self.node(SrcKind::This, TypeId::DYNAMIC)
    }

    pub fn local(&mut self, var: VarId) -> SrcId {
        let ty = self.arena.var(var).map_or(TypeId::UNKNOWN, |v| v.ty);
        self.node(SrcKind::Local(var), ty)
    }

    pub fn global(&mut self, name: &str) -> SrcId {
        let name = self.name(name);
        self.node(
            SrcKind::Global {
                module: Name::EMPTY,
                name,
            },
            TypeId::DYNAMIC,
        )
    }

    pub fn remote(&mut self, module: &str, name: &str) -> SrcId {
        let module = self.name(module);
        let name = self.name(name);
        self.node(SrcKind::Global { module, name }, TypeId::DYNAMIC)
    }

    // Declarations and assignment

    pub fn decl(&mut self, var: VarId, init: SrcId) -> SrcId {
        self.node(SrcKind::VarDecl { var, init }, TypeId::VOID)
    }

    pub fn decl_empty(&mut self, var: VarId) -> SrcId {
        self.decl(var, SrcId::INVALID)
    }

    pub fn assign(&mut self, target: SrcId, value: SrcId) -> SrcId {
        let ty = self.arena.ty(value);
        self.node(
            SrcKind::Binary {
                op: SrcBinOp::Assign,
                left: target,
                right: value,
            },
            ty,
        )
    }

    pub fn assign_local(&mut self, var: VarId, value: SrcId) -> SrcId {
        let target = self.local(var);
        self.assign(target, value)
    }

    pub fn assign_op(&mut self, op: BinaryOp, var: VarId, value: SrcId) -> SrcId {
        let target = self.local(var);
        let ty = self.arena.ty(target);
        self.node(
            SrcKind::Binary {
                op: SrcBinOp::AssignOp(op),
                left: target,
                right: value,
            },
            ty,
        )
    }

    fn update(&mut self, op: SrcUnaryOp, var: VarId, postfix: bool) -> SrcId {
        let operand = self.local(var);
        self.node(
            SrcKind::Unary {
                op,
                postfix,
                operand,
            },
            TypeId::INT,
        )
    }

    /// `++var`
    pub fn incr(&mut self, var: VarId) -> SrcId {
        self.update(SrcUnaryOp::Increment, var, false)
    }

    /// `var++`
    pub fn post_incr(&mut self, var: VarId) -> SrcId {
        self.update(SrcUnaryOp::Increment, var, true)
    }

    // Operators

    pub fn binop(&mut self, op: BinaryOp, left: SrcId, right: SrcId) -> SrcId {
        let ty = if op.is_comparison() || matches!(op, BinaryOp::And | BinaryOp::Or) {
            TypeId::BOOL
        } else {
            self.arena.ty(left)
        };
        self.node(
            SrcKind::Binary {
                op: SrcBinOp::Op(op),
                left,
                right,
            },
            ty,
        )
    }

    pub fn add(&mut self, left: SrcId, right: SrcId) -> SrcId {
        self.binop(BinaryOp::Add, left, right)
    }

    pub fn lt(&mut self, left: SrcId, right: SrcId) -> SrcId {
        self.binop(BinaryOp::Lt, left, right)
    }

    pub fn not(&mut self, operand: SrcId) -> SrcId {
        self.node(
            SrcKind::Unary {
                op: SrcUnaryOp::Not,
                postfix: false,
                operand,
            },
            TypeId::BOOL,
        )
    }

    // Calls and access

    pub fn call(&mut self, callee: SrcId, args: &[SrcId]) -> SrcId {
        let args = self.arena.alloc_expr_list(args.iter().copied());
        self.node(SrcKind::Call { callee, args }, TypeId::DYNAMIC)
    }

    pub fn field(&mut self, receiver: SrcId, field: &str) -> SrcId {
        let field = self.name(field);
        let ty = if self.arena.name(field) == "length" {
            TypeId::INT
        } else {
            TypeId::DYNAMIC
        };
        self.node(SrcKind::Field { receiver, field }, ty)
    }

    pub fn method(&mut self, receiver: SrcId, method: &str, args: &[SrcId]) -> SrcId {
        let callee = self.field(receiver, method);
        self.call(callee, args)
    }

    /// `var.push(value)`
    pub fn push(&mut self, var: VarId, value: SrcId) -> SrcId {
        let receiver = self.local(var);
        self.method(receiver, "push", &[value])
    }

    pub fn length(&mut self, receiver: SrcId) -> SrcId {
        self.field(receiver, "length")
    }

    pub fn index(&mut self, receiver: SrcId, index: SrcId) -> SrcId {
        self.node(SrcKind::Index { receiver, index }, TypeId::INT)
    }

    pub fn array(&mut self, items: &[SrcId]) -> SrcId {
        let items = self.arena.alloc_expr_list(items.iter().copied());
        let ty = self.array_ty();
        self.node(SrcKind::ArrayDecl(items), ty)
    }

    pub fn int_array(&mut self, values: &[i64]) -> SrcId {
        let items: Vec<SrcId> = values.iter().map(|&v| self.int(v)).collect();
        self.array(&items)
    }

    pub fn object(&mut self, fields: &[(&str, SrcId)]) -> SrcId {
        let fields: Vec<SrcField> = fields
            .iter()
            .map(|&(name, value)| SrcField {
                name: self.arena.intern(name),
                value,
            })
            .collect();
        let fields = self.arena.alloc_fields(fields);
        self.node(SrcKind::ObjectDecl(fields), TypeId::DYNAMIC)
    }

    // Control flow

    pub fn block(&mut self, stmts: &[SrcId]) -> SrcId {
        let stmts = self.arena.alloc_expr_list(stmts.iter().copied());
        self.node(SrcKind::Block(stmts), TypeId::VOID)
    }

    pub fn if_(&mut self, cond: SrcId, then_branch: SrcId, else_branch: Option<SrcId>) -> SrcId {
        self.node(
            SrcKind::If {
                cond,
                then_branch,
                else_branch: else_branch.unwrap_or(SrcId::INVALID),
            },
            TypeId::VOID,
        )
    }

    pub fn while_loop(&mut self, cond: SrcId, body: SrcId) -> SrcId {
        self.node(
            SrcKind::While {
                cond,
                body,
                eager: true,
            },
            TypeId::VOID,
        )
    }

    pub fn do_while(&mut self, cond: SrcId, body: SrcId) -> SrcId {
        self.node(
            SrcKind::While {
                cond,
                body,
                eager: false,
            },
            TypeId::VOID,
        )
    }

    pub fn for_in(&mut self, var: VarId, iter: SrcId, body: SrcId) -> SrcId {
        self.node(SrcKind::For { var, iter, body }, TypeId::VOID)
    }

    pub fn brk(&mut self) -> SrcId {
        self.node(SrcKind::Break, TypeId::VOID)
    }

    pub fn cont(&mut self) -> SrcId {
        self.node(SrcKind::Continue, TypeId::VOID)
    }

    pub fn ret(&mut self, value: SrcId) -> SrcId {
        self.node(SrcKind::Return(value), TypeId::VOID)
    }

    pub fn throw(&mut self, value: SrcId) -> SrcId {
        self.node(SrcKind::Throw(value), TypeId::VOID)
    }

    pub fn function(&mut self, params: &[VarId], body: SrcId) -> SrcId {
        let params = self.arena.alloc_var_list(params.iter().copied());
        self.node(SrcKind::Function { params, body }, TypeId::DYNAMIC)
    }

    pub fn try_catch(&mut self, body: SrcId, catches: &[(VarId, SrcId)]) -> SrcId {
        let catches = self.arena.alloc_catches(
            catches
                .iter()
                .map(|&(var, body)| SrcCatch { var, body }),
        );
        self.node(SrcKind::Try { body, catches }, TypeId::VOID)
    }

    /// Switch with unguarded arms.
    pub fn switch(
        &mut self,
        scrutinee: SrcId,
        arms: &[(&[SrcId], SrcId)],
        default: Option<SrcId>,
    ) -> SrcId {
        let arms: Vec<(&[SrcId], SrcId, SrcId)> = arms
            .iter()
            .map(|&(values, body)| (values, SrcId::INVALID, body))
            .collect();
        self.switch_guarded(scrutinee, &arms, default)
    }

    pub fn switch_guarded(
        &mut self,
        scrutinee: SrcId,
        arms: &[(&[SrcId], SrcId, SrcId)],
        default: Option<SrcId>,
    ) -> SrcId {
        let arms: Vec<SrcArm> = arms
            .iter()
            .map(|&(values, guard, body)| {
                let span = self.span();
                SrcArm {
                    values: self.arena.alloc_expr_list(values.iter().copied()),
                    guard,
                    body,
                    span,
                }
            })
            .collect();
        let arms = self.arena.alloc_arms(arms);
        self.node(
            SrcKind::Switch {
                scrutinee,
                arms,
                default: default.unwrap_or(SrcId::INVALID),
            },
            TypeId::VOID,
        )
    }

    // Tagged unions

    /// Register an enum: `(ctor, params)` in declaration order.
    pub fn enum_def(&mut self, name: &str, ctors: &[(&str, &[&str])]) -> Name {
        let enum_name = self.name(name);
        let ctors = ctors
            .iter()
            .map(|&(ctor, params)| {
                let ctor = self.arena.intern(ctor);
                let params: Vec<Name> = params.iter().map(|p| self.arena.intern(p)).collect();
                CtorDef::new(ctor, params)
            })
            .collect();
        self.enums.insert(EnumDef {
            name: enum_name,
            ctors,
        });
        enum_name
    }

    pub fn enum_ctor(&mut self, enum_name: Name, ctor: &str) -> SrcId {
        let ctor = self.name(ctor);
        let ty = self.arena.types_mut().enum_type(enum_name);
        self.node(SrcKind::EnumCtor { enum_name, ctor }, ty)
    }

    /// `Ctor(args…)` as a value or a match pattern.
    pub fn ctor_call(&mut self, enum_name: Name, ctor: &str, args: &[SrcId]) -> SrcId {
        let callee = self.enum_ctor(enum_name, ctor);
        let args = self.arena.alloc_expr_list(args.iter().copied());
        let ty = self.arena.types_mut().enum_type(enum_name);
        self.node(SrcKind::Call { callee, args }, ty)
    }

    pub fn enum_param(&mut self, subject: SrcId, ctor: &str, index: u32) -> SrcId {
        let ctor = self.name(ctor);
        self.node(
            SrcKind::EnumParameter {
                subject,
                ctor,
                index,
            },
            TypeId::DYNAMIC,
        )
    }

    pub fn enum_index(&mut self, subject: SrcId) -> SrcId {
        self.node(SrcKind::EnumIndex(subject), TypeId::INT)
    }
}

// Rendering

/// One-line rendering of a target tree for assertions. Blocks are
/// parenthesized; metadata is not shown.
pub(crate) fn show(node: &TargetNode) -> String {
    match &node.kind {
        TargetKind::Literal(lit) => lit.to_string(),
        TargetKind::Var(name) | TargetKind::Raw(name) => name.clone(),
        TargetKind::Match { pattern, value } => {
            format!("{} = {}", show_pattern(pattern), show(value))
        }
        TargetKind::Binary { op, left, right } => {
            format!("{} {} {}", show(left), op.as_symbol(), show(right))
        }
        TargetKind::Unary { op, operand } => {
            let op = match op {
                TargetUnaryOp::Not => "not ",
                TargetUnaryOp::Neg => "-",
                TargetUnaryOp::BitNot => "~~~",
            };
            format!("{op}{}", show(operand))
        }
        TargetKind::Call { name, args } => format!("{name}({})", show_all(args)),
        TargetKind::RemoteCall { module, name, args } => {
            format!("{module}.{name}({})", show_all(args))
        }
        TargetKind::ApplyFn { callee, args } => format!("{}.({})", show(callee), show_all(args)),
        TargetKind::Field { receiver, field } => format!("{}.{field}", show(receiver)),
        TargetKind::Access { receiver, key } => format!("{}[{}]", show(receiver), show(key)),
        TargetKind::List(items) => format!("[{}]", show_all(items)),
        TargetKind::Tuple(items) => format!("{{{}}}", show_all(items)),
        TargetKind::Map(entries) => format!("%{{{}}}", show_entries(entries)),
        TargetKind::MapUpdate { base, entries } => {
            format!("%{{{} | {}}}", show(base), show_entries(entries))
        }
        TargetKind::Record { module, fields } => {
            let fields: Vec<String> = fields
                .iter()
                .map(|(k, v)| format!("{k}: {}", show(v)))
                .collect();
            format!("%{module}{{{}}}", fields.join(", "))
        }
        TargetKind::Range { start, end } => format!("{}..{}", show(start), show(end)),
        TargetKind::If {
            cond,
            then_branch,
            else_branch,
        } => match else_branch {
            Some(e) => format!(
                "if {} do {} else {} end",
                show(cond),
                show(then_branch),
                show(e)
            ),
            None => format!("if {} do {} end", show(cond), show(then_branch)),
        },
        TargetKind::Block(items) => {
            let items: Vec<String> = items.iter().map(show).collect();
            format!("({})", items.join("; "))
        }
        TargetKind::Case { scrutinee, clauses } => {
            format!("case {} do {} end", show(scrutinee), show_clauses(clauses))
        }
        TargetKind::Try { body, rescue } => {
            format!("try do {} rescue {} end", show(body), show_clauses(rescue))
        }
        TargetKind::Fn { clauses } => {
            let clauses: Vec<String> = clauses
                .iter()
                .map(|c| {
                    let params: Vec<String> = c.params.iter().map(show_pattern).collect();
                    let params = params.join(", ");
                    match &c.guard {
                        Some(g) => format!("{params} when {} -> {}", show(g), show(&c.body)),
                        None => format!("{params} -> {}", show(&c.body)),
                    }
                })
                .collect();
            format!("fn {} end", clauses.join("; "))
        }
        TargetKind::For {
            generators,
            filters,
            body,
        } => {
            let mut heads: Vec<String> = generators
                .iter()
                .map(|g| format!("{} <- {}", show_pattern(&g.pattern), show(&g.source)))
                .collect();
            heads.extend(filters.iter().map(show));
            format!("for {} do {} end", heads.join(", "), show(body))
        }
        TargetKind::Repeat {
            cond,
            body,
            check_first,
        } => {
            if *check_first {
                format!("while {} do {} end", show(cond), show(body))
            } else {
                format!("do {} while {} end", show(body), show(cond))
            }
        }
        TargetKind::Elided => "<elided>".to_string(),
        TargetKind::Error(message) => format!("<error: {message}>"),
    }
}

fn show_all(nodes: &[TargetNode]) -> String {
    nodes.iter().map(show).collect::<Vec<_>>().join(", ")
}

fn show_entries(entries: &[(TargetNode, TargetNode)]) -> String {
    entries
        .iter()
        .map(|(k, v)| format!("{} => {}", show(k), show(v)))
        .collect::<Vec<_>>()
        .join(", ")
}

fn show_clauses(clauses: &[CaseClause]) -> String {
    clauses
        .iter()
        .map(|c| {
            let pattern = show_pattern(&c.pattern);
            match &c.guard {
                Some(g) => format!("{pattern} when {} -> {}", show(g), show(&c.body)),
                None => format!("{pattern} -> {}", show(&c.body)),
            }
        })
        .collect::<Vec<_>>()
        .join("; ")
}

pub(crate) fn show_pattern(pattern: &Pattern) -> String {
    let all = |items: &[Pattern]| items.iter().map(show_pattern).collect::<Vec<_>>().join(", ");
    match pattern {
        Pattern::Wildcard => "_".to_string(),
        Pattern::Bind { name, .. } => name.clone(),
        Pattern::Pin(name) => format!("^{name}"),
        Pattern::Literal(lit) => lit.to_string(),
        Pattern::Tuple(items) => format!("{{{}}}", all(items)),
        Pattern::List(items) => format!("[{}]", all(items)),
        Pattern::Cons { heads, tail } => format!("[{} | {}]", all(heads), show_pattern(tail)),
        Pattern::Map(entries) => {
            let entries: Vec<String> = entries
                .iter()
                .map(|(k, p)| format!("{} => {}", show(k), show_pattern(p)))
                .collect();
            format!("%{{{}}}", entries.join(", "))
        }
        Pattern::Tagged { tag, params } if params.is_empty() => format!(":{tag}"),
        Pattern::Tagged { tag, params } => format!("{{:{tag}, {}}}", all(params)),
        Pattern::Alias { pattern, name } => format!("{} = {name}", show_pattern(pattern)),
        Pattern::Binary(items) => format!("<<{}>>", all(items)),
    }
}
