// src/sema/analyzer/declarations.rs
//
// Registration of classes, modules, libs, methods and macros. Method
// bodies are not visited here; they are inferred lazily per instantiation
// by the call resolver. Registration is sequential, so a class must appear
// before its first use, and reopening an existing class extends it.

use rustc_hash::FxHashSet;

use crate::errors::InferResult;
use crate::frontend::{DefNode, LibItem, NodeId, NodeKind, Symbol, TypeRef};
use crate::sema::analyzer::Analyzer;
use crate::sema::entity_defs::{
    ClassKind, MacroDef, MethodBody, MethodDef, MethodParam, PrimitiveRet, Restriction,
};
use crate::sema::entity_registry::{ClassId, MacroId, MethodId};

impl Analyzer {
    pub(crate) fn visit_class_def(&mut self, node: NodeId) -> InferResult<()> {
        if self.ast.ty(node).is_some() {
            return Ok(()); // already registered (replay)
        }
        let NodeKind::ClassDef {
            name,
            superclass,
            type_params,
            is_abstract,
            body,
        } = self.ast.kind(node).clone()
        else {
            unreachable!("visit_class_def on a non-class node");
        };

        let class = self.reopen_or_register(name, ClassKind::Class)?;
        if self.registry.class(class).superclass.is_none() {
            let sup = match &superclass {
                Some(tr) => self.resolve_class_path(tr)?,
                None => self.builtins.reference,
            };
            self.registry.set_superclass(class, sup);
        }
        if is_abstract {
            self.registry.class_mut(class).is_abstract = true;
        }
        if !type_params.is_empty() {
            self.registry.class_mut(class).type_params = type_params;
        }

        let instance = self.types.instance(class);
        let meta = self.types.metaclass(instance);
        let saved_scope_class = std::mem::replace(&mut self.scope_class, class);
        let saved_self = std::mem::replace(&mut self.self_type, meta);
        let mut result = Ok(());
        for n in body {
            result = self.visit(n);
            if result.is_err() {
                break;
            }
        }
        self.scope_class = saved_scope_class;
        self.self_type = saved_self;
        result?;

        let nil = self.types.primitives.nil;
        self.set_type(node, nil)
    }

    pub(crate) fn visit_module_def(&mut self, node: NodeId) -> InferResult<()> {
        if self.ast.ty(node).is_some() {
            return Ok(());
        }
        let NodeKind::ModuleDef { name, body } = self.ast.kind(node).clone() else {
            unreachable!("visit_module_def on a non-module node");
        };
        let module = self.reopen_or_register(name, ClassKind::Module)?;

        let instance = self.types.instance(module);
        let meta = self.types.metaclass(instance);
        let saved_scope_class = std::mem::replace(&mut self.scope_class, module);
        let saved_self = std::mem::replace(&mut self.self_type, meta);
        let mut result = Ok(());
        for n in body {
            result = self.visit(n);
            if result.is_err() {
                break;
            }
        }
        self.scope_class = saved_scope_class;
        self.self_type = saved_self;
        result?;

        let nil = self.types.primitives.nil;
        self.set_type(node, nil)
    }

    pub(crate) fn visit_def(&mut self, node: NodeId, def: &DefNode) -> InferResult<()> {
        if self.ast.ty(node).is_some() {
            return Ok(());
        }
        let owner = self.scope_class;
        let params = def
            .params
            .iter()
            .map(|p| MethodParam {
                name: p.name,
                restriction: p.restriction.clone().map(Restriction::Ref),
                default: p.default,
                span: p.span,
            })
            .collect();
        self.registry.add_method(MethodDef {
            id: MethodId::new(0),
            name: def.name,
            owner,
            params,
            block_param: def.block_param.clone(),
            return_type: def.return_type.clone(),
            body: MethodBody::Ast(def.body),
            span: self.ast.span(node),
            instances: Default::default(),
        });

        // Syntactic pre-scan: which instance variables does this body
        // assign? Hoisting reads this before any instantiation exists.
        let mut writes = FxHashSet::default();
        collect_ivar_writes(&self.ast, def.body, &mut writes);
        self.registry
            .class_mut(owner)
            .ivar_writers
            .extend(writes);

        let nil = self.types.primitives.nil;
        self.set_type(node, nil)
    }

    pub(crate) fn visit_macro_def(&mut self, node: NodeId, def: &DefNode) -> InferResult<()> {
        if self.ast.ty(node).is_some() {
            return Ok(());
        }
        let owner = self.scope_class;
        self.registry.add_macro(MacroDef {
            id: MacroId::new(0),
            name: def.name,
            owner,
            params: def.params.iter().map(|p| p.name).collect(),
            body: def.body,
            span: self.ast.span(node),
        });
        let nil = self.types.primitives.nil;
        self.set_type(node, nil)
    }

    pub(crate) fn visit_include(&mut self, node: NodeId, path: &TypeRef) -> InferResult<()> {
        if self.ast.ty(node).is_some() {
            return Ok(());
        }
        let module = self.resolve_class_path(path)?;
        let target = self.scope_class;
        let includes = &mut self.registry.class_mut(target).includes;
        if !includes.contains(&module) {
            includes.push(module);
        }
        let nil = self.types.primitives.nil;
        self.set_type(node, nil)
    }

    pub(crate) fn visit_lib_def(&mut self, node: NodeId) -> InferResult<()> {
        if self.ast.ty(node).is_some() {
            return Ok(());
        }
        let NodeKind::LibDef { name, items } = self.ast.kind(node).clone() else {
            unreachable!("visit_lib_def on a non-lib node");
        };
        let lib = self.reopen_or_register(name, ClassKind::Lib)?;
        let saved_scope_class = std::mem::replace(&mut self.scope_class, lib);
        let result = self.register_lib_items(lib, &items);
        self.scope_class = saved_scope_class;
        result?;
        let nil = self.types.primitives.nil;
        self.set_type(node, nil)
    }

    fn register_lib_items(&mut self, lib: ClassId, items: &[LibItem]) -> InferResult<()> {
        // Types first so fun signatures can reference them in any order
        for item in items {
            match item {
                LibItem::Struct { name, fields, .. } => {
                    let id = self.registry.register_class(*name, ClassKind::CStruct, lib);
                    self.registry.class_mut(id).fields = fields.clone();
                }
                LibItem::Union { name, fields, .. } => {
                    let id = self.registry.register_class(*name, ClassKind::CUnion, lib);
                    self.registry.class_mut(id).fields = fields.clone();
                }
                LibItem::Enum { name, members, .. } => {
                    let id = self.registry.register_class(*name, ClassKind::CEnum, lib);
                    self.registry.class_mut(id).enum_members = members.clone();
                }
                LibItem::Fun { .. } | LibItem::Const { .. } => {}
            }
        }
        for item in items {
            match item {
                LibItem::Fun {
                    name,
                    params,
                    ret,
                    span,
                } => {
                    let mut resolved = Vec::with_capacity(params.len());
                    for p in params {
                        let t = self.resolve_typeref(p)?;
                        resolved.push(MethodParam {
                            name: *name,
                            restriction: Some(Restriction::Exact(t)),
                            default: None,
                            span: p.span(),
                        });
                    }
                    let ret_t = match ret {
                        Some(tr) => self.resolve_typeref(tr)?,
                        None => self.types.primitives.void,
                    };
                    self.registry.add_method(MethodDef {
                        id: MethodId::new(0),
                        name: *name,
                        owner: lib,
                        params: resolved,
                        block_param: None,
                        return_type: None,
                        body: MethodBody::Primitive(PrimitiveRet::Fixed(ret_t)),
                        span: *span,
                        instances: Default::default(),
                    });
                }
                LibItem::Const { name, ty, span } => {
                    let t = self.resolve_typeref(ty)?;
                    let cell = self
                        .ast
                        .alloc(NodeKind::Var { name: *name }, *span);
                    self.set_type(cell, t)?;
                    self.registry.class_mut(lib).constants.insert(*name, cell);
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Look the name up in the current scope and reuse the descriptor
    /// (class reopening), or register a fresh one.
    fn reopen_or_register(&mut self, name: Symbol, kind: ClassKind) -> InferResult<ClassId> {
        if let Some(&existing) = self.registry.class(self.scope_class).types.get(&name) {
            return Ok(existing);
        }
        Ok(self.registry.register_class(name, kind, self.scope_class))
    }

    /// Resolve an annotation that must denote a class (superclass clause,
    /// include path).
    pub(crate) fn resolve_class_path(&mut self, tr: &TypeRef) -> InferResult<ClassId> {
        match tr {
            TypeRef::Path {
                names,
                anchored,
                span,
                ..
            } => self
                .registry
                .resolve_path(self.scope_class, names, *anchored)
                .ok_or_else(|| self.err_undefined_const(names, *span)),
            other => Err(self.err_type_mismatch(
                "a class name",
                "a compound type annotation",
                other.span(),
            )),
        }
    }
}

/// Collect the instance-variable names a method body assigns, without
/// visiting it. Declarations nested inside the body own their writes.
fn collect_ivar_writes(
    ast: &crate::frontend::Ast,
    node: NodeId,
    out: &mut FxHashSet<Symbol>,
) {
    match ast.kind(node) {
        NodeKind::Assign { target, value } => {
            if let NodeKind::InstanceVar { name } = ast.kind(*target) {
                out.insert(*name);
            }
            collect_ivar_writes(ast, *value, out);
        }
        NodeKind::Range { from, to, .. } => {
            collect_ivar_writes(ast, *from, out);
            collect_ivar_writes(ast, *to, out);
        }
        NodeKind::ArrayLit { elements, .. } => {
            for &e in elements {
                collect_ivar_writes(ast, e, out);
            }
        }
        NodeKind::HashLit { entries, .. } => {
            for &(k, v) in entries {
                collect_ivar_writes(ast, k, out);
                collect_ivar_writes(ast, v, out);
            }
        }
        NodeKind::Expressions { body } => {
            for &n in body {
                collect_ivar_writes(ast, n, out);
            }
        }
        NodeKind::If {
            cond,
            then_body,
            else_body,
        } => {
            collect_ivar_writes(ast, *cond, out);
            collect_ivar_writes(ast, *then_body, out);
            if let Some(e) = else_body {
                collect_ivar_writes(ast, *e, out);
            }
        }
        NodeKind::While { cond, body } => {
            collect_ivar_writes(ast, *cond, out);
            collect_ivar_writes(ast, *body, out);
        }
        NodeKind::And { left, right } | NodeKind::Or { left, right } => {
            collect_ivar_writes(ast, *left, out);
            collect_ivar_writes(ast, *right, out);
        }
        NodeKind::Call {
            receiver,
            args,
            block,
            ..
        } => {
            if let Some(r) = receiver {
                collect_ivar_writes(ast, *r, out);
            }
            for &a in args {
                collect_ivar_writes(ast, a, out);
            }
            if let Some(b) = block {
                collect_ivar_writes(ast, *b, out);
            }
        }
        NodeKind::Block { body, .. } => collect_ivar_writes(ast, *body, out),
        NodeKind::Yield { args } => {
            for &a in args {
                collect_ivar_writes(ast, a, out);
            }
        }
        NodeKind::Return { value } | NodeKind::Break { value } | NodeKind::Next { value } => {
            if let Some(v) = value {
                collect_ivar_writes(ast, *v, out);
            }
        }
        NodeKind::Raise { value } => collect_ivar_writes(ast, *value, out),
        NodeKind::ExceptionHandler {
            body,
            rescues,
            else_body,
            ensure_body,
        } => {
            collect_ivar_writes(ast, *body, out);
            for r in rescues {
                collect_ivar_writes(ast, r.body, out);
            }
            if let Some(e) = else_body {
                collect_ivar_writes(ast, *e, out);
            }
            if let Some(e) = ensure_body {
                collect_ivar_writes(ast, *e, out);
            }
        }
        NodeKind::IsA { receiver, .. } => collect_ivar_writes(ast, *receiver, out),
        NodeKind::PointerOf { target } => collect_ivar_writes(ast, *target, out),
        NodeKind::OutArg { var } => collect_ivar_writes(ast, *var, out),
        // Literals, names and nested declarations contribute nothing here
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::{Ast, Interner, IntWidth, Span};

    #[test]
    fn ivar_write_scan_sees_nested_assignments() {
        let mut ast = Ast::new();
        let mut interner = Interner::new();
        let at_x = interner.intern("@x");
        let at_y = interner.intern("@y");

        let one = ast.alloc(
            NodeKind::Int {
                value: 1,
                width: IntWidth::I32,
            },
            Span::default(),
        );
        let ivar_x = ast.alloc(NodeKind::InstanceVar { name: at_x }, Span::default());
        let assign_x = ast.alloc(
            NodeKind::Assign {
                target: ivar_x,
                value: one,
            },
            Span::default(),
        );
        let ivar_y = ast.alloc(NodeKind::InstanceVar { name: at_y }, Span::default());
        let two = ast.alloc(
            NodeKind::Int {
                value: 2,
                width: IntWidth::I32,
            },
            Span::default(),
        );
        let assign_y = ast.alloc(
            NodeKind::Assign {
                target: ivar_y,
                value: two,
            },
            Span::default(),
        );
        let cond = ast.alloc(NodeKind::Bool(true), Span::default());
        let iff = ast.alloc(
            NodeKind::If {
                cond,
                then_body: assign_y,
                else_body: None,
            },
            Span::default(),
        );
        let body = ast.alloc(
            NodeKind::Expressions {
                body: vec![assign_x, iff],
            },
            Span::default(),
        );

        let mut writes = FxHashSet::default();
        collect_ivar_writes(&ast, body, &mut writes);
        assert!(writes.contains(&at_x));
        assert!(writes.contains(&at_y));
        assert_eq!(writes.len(), 2);
    }
}
