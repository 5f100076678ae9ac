//! Calls, member access and constructors.

use ember_diagnostic::malformed_enum_parameter;
use ember_ir::{
    FieldRange, Name, NodeFlags, Span, SrcId, SrcKind, SrcRange, TargetBinOp, TargetKind,
    TargetNode, TypeKind,
};

use crate::analysis::{self, Written};
use crate::context::LowerCtx;
use crate::naming::case;

/// Receiver family a method table entry applies to.
#[derive(Copy, Clone, Eq, PartialEq)]
enum Receiver {
    String,
    Array,
}

/// Methods with a direct library counterpart taking the receiver first.
const LIBRARY_METHODS: &[(Receiver, &str, &str, &str)] = &[
    (Receiver::String, "charAt", "String", "at"),
    (Receiver::String, "split", "String", "split"),
    (Receiver::String, "toLowerCase", "String", "downcase"),
    (Receiver::String, "toUpperCase", "String", "upcase"),
    (Receiver::Array, "concat", "Enum", "concat"),
    (Receiver::Array, "filter", "Enum", "filter"),
    (Receiver::Array, "join", "Enum", "join"),
    (Receiver::Array, "map", "Enum", "map"),
];

impl LowerCtx<'_> {
    pub(crate) fn lower_call(&mut self, callee: SrcId, args: SrcRange, span: Span) -> TargetNode {
        let arena = self.arena;
        let callee = arena.unwrap_transparent(callee);
        let arg_ids = arena.get_expr_list(args);
        let node = match arena.try_expr(callee).map(|e| e.kind) {
            Some(SrcKind::Global { module, name }) => {
                let args = self.lower_list(arg_ids);
                let name = self.member_name(name);
                if module == Name::EMPTY {
                    TargetNode::call(name, args)
                } else {
                    TargetNode::remote_call(arena.name(module), name, args)
                }
            }
            Some(SrcKind::EnumCtor { ctor, .. }) => {
                let args = self.lower_list(arg_ids);
                self.lower_ctor(ctor, args, span)
            }
            Some(SrcKind::Field { receiver, field }) => {
                return self.lower_method(receiver, field, arg_ids, span);
            }
            _ => {
                let callee = self.lower_expr(callee);
                let args = self.lower_list(arg_ids);
                TargetNode::synthetic(TargetKind::ApplyFn {
                    callee: Box::new(callee),
                    args,
                })
            }
        };
        node.with_span(span)
    }

    fn lower_method(
        &mut self,
        receiver: SrcId,
        method: Name,
        args: &[SrcId],
        span: Span,
    ) -> TargetNode {
        let arena = self.arena;
        let receiver = arena.unwrap_transparent(receiver);
        let method_text = arena.name(method);

        // Statics
        if let Some(SrcKind::TypeExpr(module)) = arena.try_expr(receiver).map(|e| e.kind) {
            let args = self.lower_list(args);
            return TargetNode::remote_call(arena.name(module), self.member_name(method), args)
                .with_span(span);
        }

        // `xs.push(v)` rebinds `xs`.
        if method_text == "push" && args.len() == 1 && self.is_pushable(receiver) {
            let current = self.lower_expr(receiver);
            let item = self.lower_expr(args[0]);
            let value = TargetNode::binary(
                TargetBinOp::ListConcat,
                current,
                TargetNode::list(vec![item]),
            );
            return self.assign_to(receiver, value, span);
        }

        let family = match self.type_kind(receiver) {
            TypeKind::String => Some(Receiver::String),
            TypeKind::Array(_) => Some(Receiver::Array),
            _ => None,
        };
        if let Some(&(_, _, module, fun)) = LIBRARY_METHODS
            .iter()
            .find(|&&(r, m, _, _)| Some(r) == family && m == method_text)
        {
            let mut all = vec![self.lower_expr(receiver)];
            all.extend(self.lower_list(args));
            return TargetNode::remote_call(module, fun, all).with_span(span);
        }

        if let TypeKind::Class(class) = self.type_kind(receiver) {
            let mut all = vec![self.lower_expr(receiver)];
            all.extend(self.lower_list(args));
            return TargetNode::remote_call(arena.name(class), self.member_name(method), all)
                .with_span(span);
        }

        // Dynamic dispatch through a function-valued field.
        let recv = self.lower_expr(receiver);
        let args = self.lower_list(args);
        let callee = TargetNode::synthetic(TargetKind::Field {
            receiver: Box::new(recv),
            field: self.member_name(method),
        });
        TargetNode::new(
            TargetKind::ApplyFn {
                callee: Box::new(callee),
                args,
            },
            span,
        )
        .with_flags(NodeFlags::FALLBACK)
    }

    /// An array, or an untyped value, whose root can be rebound.
    fn is_pushable(&self, receiver: SrcId) -> bool {
        let typed_ok = matches!(
            self.type_kind(receiver),
            TypeKind::Array(_) | TypeKind::Unknown | TypeKind::Dynamic
        );
        let rebindable = match analysis::written_root(self.arena, receiver) {
            Written::Local(_) | Written::Member(_) => true,
            Written::NonLocal => self.is_self_path(receiver),
        };
        typed_ok && rebindable
    }

    pub(crate) fn lower_field(&mut self, receiver: SrcId, field: Name, span: Span) -> TargetNode {
        let arena = self.arena;
        let receiver = arena.unwrap_transparent(receiver);
        if let Some(SrcKind::TypeExpr(module)) = arena.try_expr(receiver).map(|e| e.kind) {
            return TargetNode::remote_call(arena.name(module), self.member_name(field), Vec::new())
                .with_span(span);
        }
        if arena.name(field) == "length" {
            if self.is_string(receiver) {
                let recv = self.lower_expr(receiver);
                return TargetNode::remote_call("String", "length", vec![recv]).with_span(span);
            }
            if self.arena.types().is_array(self.ty_of(receiver)) {
                let recv = self.lower_expr(receiver);
                return TargetNode::call("length", vec![recv]).with_span(span);
            }
        }
        let recv = self.lower_expr(receiver);
        let pure = recv.is_pure();
        let node = TargetNode::new(
            TargetKind::Field {
                receiver: Box::new(recv),
                field: self.member_name(field),
            },
            span,
        );
        if pure {
            node.with_flags(NodeFlags::PURE)
        } else {
            node
        }
    }

    pub(crate) fn lower_global(&mut self, module: Name, name: Name, span: Span) -> TargetNode {
        let name = self.member_name(name);
        if module == Name::EMPTY {
            return TargetNode::var(name).with_span(span);
        }
        let module = TargetNode::synthetic(TargetKind::Raw(self.arena.name(module).to_string()));
        TargetNode::new(
            TargetKind::Field {
                receiver: Box::new(module),
                field: name,
            },
            span,
        )
        .with_flags(NodeFlags::PURE)
    }

    /// `:tag` for nullary constructors, `{:tag, args…}` otherwise.
    pub(crate) fn lower_ctor(
        &mut self,
        ctor: Name,
        args: Vec<TargetNode>,
        span: Span,
    ) -> TargetNode {
        let tag = TargetNode::atom(case::ctor_tag(self.arena.name(ctor)));
        if args.is_empty() {
            return tag.with_span(span);
        }
        let mut items = Vec::with_capacity(args.len() + 1);
        items.push(tag);
        items.extend(args);
        TargetNode::tuple(items).with_span(span)
    }

    pub(crate) fn lower_index(&mut self, receiver: SrcId, index: SrcId, span: Span) -> TargetNode {
        let is_map = self.arena.types().is_map(self.ty_of(receiver));
        let recv = self.lower_expr(receiver);
        let key = self.lower_expr(index);
        if is_map {
            TargetNode::new(
                TargetKind::Access {
                    receiver: Box::new(recv),
                    key: Box::new(key),
                },
                span,
            )
        } else {
            TargetNode::remote_call("Enum", "at", vec![recv, key]).with_span(span)
        }
    }

    pub(crate) fn lower_object(&mut self, fields: FieldRange, span: Span) -> TargetNode {
        let arena = self.arena;
        let entries = arena
            .get_fields(fields)
            .iter()
            .map(|f| {
                let key = TargetNode::atom(self.member_name(f.name));
                (key, self.lower_expr(f.value))
            })
            .collect();
        TargetNode::new(TargetKind::Map(entries), span)
    }

    pub(crate) fn lower_new(&mut self, class: Name, args: SrcRange, span: Span) -> TargetNode {
        let arena = self.arena;
        let args = self.lower_list(arena.get_expr_list(args));
        TargetNode::remote_call(arena.name(class), "new", args).with_span(span)
    }

    // Tagged unions

    /// Parameter `index` of `subject`, known to hold constructor `ctor`.
    ///
    /// Inside an arm whose binding plan covers the extraction this is the
    /// pattern variable; elsewhere it reads the tuple slot directly.
    pub(crate) fn lower_enum_param(
        &mut self,
        subject: SrcId,
        ctor: Name,
        index: u32,
        span: Span,
    ) -> TargetNode {
        if let Some(name) = self
            .plan_for(subject, ctor)
            .and_then(|plan| plan.final_name(index as usize))
        {
            return TargetNode::var(name.to_string()).with_span(span);
        }

        let arena = self.arena;
        let enum_name = arena
            .types()
            .enum_name(self.ty_of(subject))
            .or_else(|| self.enums.find_ctor(ctor).map(|(e, _)| e));
        if let Some(def) = enum_name.and_then(|e| self.enums.ctor(e, ctor)) {
            if index as usize >= def.arity() {
                let diag = malformed_enum_parameter(span, arena.name(ctor), index);
                return self.error_node(diag, span);
            }
        }

        let subject = self.lower_expr(subject);
        let slot = TargetNode::int(i64::from(index) + 1);
        TargetNode::call("elem", vec![subject, slot]).with_span(span)
    }

    /// Constructor tag of `subject`. Indices have no target counterpart, so
    /// the tag atom stands in for them.
    pub(crate) fn lower_enum_index(&mut self, subject: SrcId, span: Span) -> TargetNode {
        let subject = self.lower_expr(subject);
        TargetNode::call("elem", vec![subject, TargetNode::int(0)])
            .with_span(span)
            .with_flags(NodeFlags::FALLBACK)
    }
}
