// src/sema/analyzer/visit.rs
//
// Per-construct wiring. The visitor traverses the AST once, establishing
// dependency edges; everything after that is propagation. Method bodies are
// not traversed here; the call resolver clones and wires them per
// instantiation.

use crate::errors::{InferError, InferResult, SemanticError, source_span};
use crate::frontend::{FloatWidth, IntWidth, NodeId, NodeKind, Span, Symbol};
use crate::sema::analyzer::Analyzer;
use crate::sema::entity_registry::ClassId;
use crate::sema::scope::Scope;
use crate::sema::type_arena::{InternedType, TypeId, TypeIdVec};

impl Analyzer {
    pub(crate) fn visit(&mut self, node: NodeId) -> InferResult<()> {
        let span = self.ast.span(node);
        match self.ast.kind(node).clone() {
            // ----------------------------------------------------------
            // Literals: typed directly
            // ----------------------------------------------------------
            NodeKind::Nil => {
                let t = self.types.primitives.nil;
                self.set_type(node, t)
            }
            NodeKind::Bool(_) => {
                let t = self.types.primitives.bool;
                self.set_type(node, t)
            }
            NodeKind::Int { width, .. } => {
                let t = match width {
                    IntWidth::I8 => self.types.primitives.i8,
                    IntWidth::I16 => self.types.primitives.i16,
                    IntWidth::I32 => self.types.primitives.i32,
                    IntWidth::I64 => self.types.primitives.i64,
                };
                self.set_type(node, t)
            }
            NodeKind::Float { width, .. } => {
                let t = match width {
                    FloatWidth::F32 => self.types.primitives.f32,
                    FloatWidth::F64 => self.types.primitives.f64,
                };
                self.set_type(node, t)
            }
            NodeKind::Char(_) => {
                let t = self.types.primitives.char;
                self.set_type(node, t)
            }
            NodeKind::Str(_) => {
                let t = self.types.primitives.string;
                self.set_type(node, t)
            }
            NodeKind::Sym(_) => {
                let t = self.types.primitives.symbol;
                self.set_type(node, t)
            }
            NodeKind::Regex(_) => {
                let class = self.builtins.regex;
                let t = self.types.instance(class);
                self.set_type(node, t)
            }
            NodeKind::Range { from, to, .. } => {
                self.visit(from)?;
                self.visit(to)?;
                let nil = self.types.primitives.nil;
                let b = self.ast.ty(from).unwrap_or(nil);
                let e = self.ast.ty(to).unwrap_or(nil);
                let mut args = TypeIdVec::new();
                args.push(b);
                args.push(e);
                let class = self.builtins.range;
                let t = self.types.generic(class, args);
                self.set_type(node, t)
            }
            NodeKind::ArrayLit { elements, of } => {
                for &e in &elements {
                    self.visit(e)?;
                }
                let elem = match of {
                    Some(tr) => self.resolve_typeref(&tr)?,
                    None => {
                        let tys: Vec<TypeId> =
                            elements.iter().filter_map(|&e| self.ast.ty(e)).collect();
                        if tys.is_empty() {
                            return Err(self.err_empty_literal("array", span));
                        }
                        self.merge_types(&tys)
                    }
                };
                let mut args = TypeIdVec::new();
                args.push(elem);
                let class = self.builtins.array;
                let t = self.types.generic(class, args);
                self.set_type(node, t)
            }
            NodeKind::HashLit { entries, of } => {
                for &(k, v) in &entries {
                    self.visit(k)?;
                    self.visit(v)?;
                }
                let (kt, vt) = match of {
                    Some((ktr, vtr)) => {
                        (self.resolve_typeref(&ktr)?, self.resolve_typeref(&vtr)?)
                    }
                    None => {
                        let ks: Vec<TypeId> =
                            entries.iter().filter_map(|&(k, _)| self.ast.ty(k)).collect();
                        let vs: Vec<TypeId> =
                            entries.iter().filter_map(|&(_, v)| self.ast.ty(v)).collect();
                        if ks.is_empty() || vs.is_empty() {
                            return Err(self.err_empty_literal("hash", span));
                        }
                        (self.merge_types(&ks), self.merge_types(&vs))
                    }
                };
                let mut args = TypeIdVec::new();
                args.push(kt);
                args.push(vt);
                let class = self.builtins.hash;
                let t = self.types.generic(class, args);
                self.set_type(node, t)
            }

            // ----------------------------------------------------------
            // Names
            // ----------------------------------------------------------
            NodeKind::Var { name } => match self.scope.get(name) {
                Some(cell) => self.bind(node, cell),
                None => Err(self.err_undefined_var(name, span)),
            },
            NodeKind::SelfRef => {
                let t = self.self_type;
                self.set_type(node, t)
            }
            NodeKind::InstanceVar { name } => {
                let cell = self.ivar_cell_for_read(name, span)?;
                self.bind(node, cell)
            }
            NodeKind::Global { name } => {
                let cell = match self.registry.globals.get(&name) {
                    Some(&c) => c,
                    None => {
                        let c = self.ast.alloc(NodeKind::Var { name }, span);
                        self.registry.globals.insert(name, c);
                        let nil_cell = self.nil_cell();
                        self.bind(c, nil_cell)?;
                        c
                    }
                };
                self.bind(node, cell)
            }
            NodeKind::Const { names, anchored } => {
                match self.registry.resolve_const(self.scope_class, &names, anchored) {
                    Some(crate::sema::entity_registry::ConstTarget::Class(class)) => {
                        let instance = self.types.instance(class);
                        let t = self.types.metaclass(instance);
                        self.set_type(node, t)
                    }
                    Some(crate::sema::entity_registry::ConstTarget::Cell(cell)) => {
                        self.bind(node, cell)
                    }
                    None => Err(self.err_undefined_const(&names, span)),
                }
            }

            // ----------------------------------------------------------
            // Structure
            // ----------------------------------------------------------
            NodeKind::Assign { target, value } => self.visit_assign(node, target, value),
            NodeKind::Expressions { body } => {
                for &n in &body {
                    self.visit(n)?;
                }
                match body.last() {
                    Some(&last) => self.bind(node, last),
                    None => {
                        let nil = self.types.primitives.nil;
                        self.set_type(node, nil)
                    }
                }
            }
            NodeKind::If {
                cond,
                then_body,
                else_body,
            } => {
                self.visit(cond)?;
                self.visit(then_body)?;
                if let Some(e) = else_body {
                    self.visit(e)?;
                }
                self.bind(node, then_body)?;
                let else_source = else_body.unwrap_or(self.nil_cell());
                self.bind(node, else_source)
            }
            NodeKind::While { cond, body } => {
                self.visit(cond)?;
                self.visit(body)?;
                let nil = self.types.primitives.nil;
                self.set_type(node, nil)
            }
            NodeKind::And { left, right } => {
                self.visit(left)?;
                self.visit(right)?;
                self.bind(node, right)
            }
            NodeKind::Or { left, right } => {
                self.visit(left)?;
                self.visit(right)?;
                // Short-circuit can yield either side
                self.bind(node, left)?;
                self.bind(node, right)
            }

            // ----------------------------------------------------------
            // Jumps and handlers
            // ----------------------------------------------------------
            NodeKind::Return { value } => {
                if let Some(v) = value {
                    self.visit(v)?;
                }
                let Some(ctx) = &self.def_ctx else {
                    return Err(InferError::new(SemanticError::ReturnOutsideMethod {
                        span: source_span(span),
                    }));
                };
                let return_cell = ctx.return_cell;
                let source = value.unwrap_or(self.nil_cell());
                self.bind(return_cell, source)
            }
            NodeKind::Break { value } | NodeKind::Next { value } => {
                if let Some(v) = value {
                    self.visit(v)?;
                }
                // Inside a literal block both feed the block's value cell;
                // inside a bare while they contribute nothing (while is Nil)
                if let Some(block) = self.current_block {
                    let source = value.unwrap_or(self.nil_cell());
                    self.bind(block, source)?;
                }
                Ok(())
            }
            NodeKind::Yield { args } => {
                for &a in &args {
                    self.visit(a)?;
                }
                let Some(ctx) = &self.def_ctx else {
                    return Err(InferError::new(SemanticError::NoBlockGiven {
                        span: source_span(span),
                    }));
                };
                let Some(block) = ctx.block else {
                    return Err(InferError::new(SemanticError::NoBlockGiven {
                        span: source_span(span),
                    }));
                };
                let NodeKind::Block { params, .. } = self.ast.kind(block).clone() else {
                    unreachable!("call block is not a Block node");
                };
                for (i, &arg) in args.iter().enumerate() {
                    if let Some(&param) = params.get(i) {
                        self.bind(param, arg)?;
                    }
                }
                Ok(())
            }
            NodeKind::Raise { value } => {
                // Raising never yields a value; the node stays typeless
                self.visit(value)
            }
            NodeKind::ExceptionHandler {
                body,
                rescues,
                else_body,
                ensure_body,
            } => {
                self.visit(body)?;
                for rescue in &rescues {
                    if let Some(binding) = rescue.binding {
                        let t = if rescue.types.is_empty() {
                            let exception = self.builtins.exception;
                            self.types.hierarchy(exception)
                        } else {
                            let mut resolved = Vec::with_capacity(rescue.types.len());
                            for tr in &rescue.types {
                                resolved.push(self.resolve_typeref(tr)?);
                            }
                            // The binding is exactly the union of the listed
                            // classes, never their collapsed hierarchy
                            self.types.union_of(&resolved)
                        };
                        self.set_type(binding, t)?;
                    }
                    let parent = std::mem::take(&mut self.scope);
                    self.scope = Scope::with_parent(parent);
                    if let Some(binding) = rescue.binding {
                        if let NodeKind::Var { name } = *self.ast.kind(binding) {
                            self.scope.define(name, binding);
                        }
                    }
                    let result = self.visit(rescue.body);
                    let scope = std::mem::take(&mut self.scope);
                    if let Some(parent) = scope.into_parent() {
                        self.scope = parent;
                    }
                    result?;
                    self.bind(node, rescue.body)?;
                }
                // The else clause runs exactly when the body completes
                // without raising, replacing the body's contribution
                match else_body {
                    Some(e) => {
                        self.visit(e)?;
                        self.bind(node, e)?;
                    }
                    None => self.bind(node, body)?,
                }
                if let Some(e) = ensure_body {
                    self.visit(e)?;
                }
                Ok(())
            }

            // ----------------------------------------------------------
            // Calls
            // ----------------------------------------------------------
            NodeKind::Call {
                receiver,
                args,
                block,
                ..
            } => {
                if let Some(r) = receiver {
                    self.visit(r)?;
                }
                for &a in &args {
                    self.visit(a)?;
                }
                if let Some(b) = block {
                    self.visit_call_block(b)?;
                }
                // Receiver and arguments trigger re-resolution on widening
                if let Some(r) = receiver {
                    self.add_observer(r, node);
                }
                for &a in &args {
                    self.add_observer(a, node);
                }
                self.recalculate_call(node)
            }
            NodeKind::Block { .. } => {
                // Blocks are wired by their enclosing call
                Ok(())
            }

            // ----------------------------------------------------------
            // Declarations
            // ----------------------------------------------------------
            NodeKind::ClassDef { .. } => self.visit_class_def(node),
            NodeKind::ModuleDef { .. } => self.visit_module_def(node),
            NodeKind::LibDef { .. } => self.visit_lib_def(node),
            NodeKind::Include { path } => self.visit_include(node, &path),
            NodeKind::Def(def) => self.visit_def(node, &def),
            NodeKind::MacroDef(def) => self.visit_macro_def(node, &def),

            // ----------------------------------------------------------
            // Typed-per-rule constructs
            // ----------------------------------------------------------
            NodeKind::IsA { receiver, test } => {
                self.visit(receiver)?;
                self.resolve_typeref(&test)?;
                let t = self.types.primitives.bool;
                self.set_type(node, t)
            }
            NodeKind::PointerOf { target } => {
                self.visit(target)?;
                let nil = self.types.primitives.nil;
                let referent = self.ast.ty(target).unwrap_or(nil);
                let mut args = TypeIdVec::new();
                args.push(referent);
                let class = self.builtins.pointer;
                let t = self.types.generic(class, args);
                self.set_type(node, t)
            }
            NodeKind::OutArg { var } => {
                // The enclosing foreign call defines the variable; make the
                // name visible so later reads resolve
                if let NodeKind::Var { name } = *self.ast.kind(var) {
                    if self.scope.get(name).is_none() {
                        self.scope.define(name, var);
                    }
                }
                Ok(())
            }
        }
    }

    fn visit_call_block(&mut self, block: NodeId) -> InferResult<()> {
        let NodeKind::Block { params, body } = self.ast.kind(block).clone() else {
            unreachable!("call block is not a Block node");
        };
        let parent = std::mem::take(&mut self.scope);
        self.scope = Scope::with_parent(parent);
        for &p in &params {
            if let NodeKind::Var { name } = *self.ast.kind(p) {
                self.scope.define(name, p);
            }
        }
        let saved_block = self.current_block.replace(block);
        let result = self.visit(body);
        self.current_block = saved_block;
        let scope = std::mem::take(&mut self.scope);
        if let Some(parent) = scope.into_parent() {
            self.scope = parent;
        }
        result?;
        // The block's yielded-value cell is the body's last expression
        self.bind(block, body)
    }

    fn visit_assign(&mut self, node: NodeId, target: NodeId, value: NodeId) -> InferResult<()> {
        self.visit(value)?;
        let target_span = self.ast.span(target);
        match self.ast.kind(target).clone() {
            NodeKind::Var { name } => {
                let cell = match self.scope.get(name) {
                    Some(c) => c,
                    None => {
                        self.scope.define(name, target);
                        target
                    }
                };
                self.bind(cell, value)?;
                if cell != target {
                    self.bind(target, cell)?;
                }
                self.bind(node, target)
            }
            NodeKind::InstanceVar { name } => {
                let cell = self.ivar_cell_for_write(name, target_span)?;
                self.bind(cell, value)?;
                self.bind(target, cell)?;
                self.bind(node, target)
            }
            NodeKind::Global { name } => {
                let cell = match self.registry.globals.get(&name) {
                    Some(&c) => c,
                    None => {
                        self.registry.globals.insert(name, target);
                        target
                    }
                };
                self.bind(cell, value)?;
                if cell != target {
                    self.bind(target, cell)?;
                }
                self.bind(node, target)
            }
            NodeKind::Const { names, .. } => {
                // Constant definition in the current scope
                let last = *names.last().expect("empty constant path");
                let scope_class = self.scope_class;
                self.registry
                    .class_mut(scope_class)
                    .constants
                    .entry(last)
                    .or_insert(target);
                self.bind(target, value)?;
                self.bind(node, target)
            }
            other => unreachable!("invalid assignment target: {other:?}"),
        }
    }

    // ------------------------------------------------------------------
    // Instance-variable cells and hoisting
    // ------------------------------------------------------------------

    /// The class whose descriptor owns `self`'s instance variables, when
    /// self is a plain class or hierarchy receiver.
    fn self_ivar_class(&self) -> Option<ClassId> {
        match self.types.get(self.self_type) {
            InternedType::Instance { class } | InternedType::Hierarchy { class } => Some(*class),
            _ => None,
        }
    }

    pub(crate) fn ivar_cell_for_write(
        &mut self,
        name: Symbol,
        span: Span,
    ) -> InferResult<NodeId> {
        if let InternedType::Generic { .. } = self.types.get(self.self_type) {
            let self_t = self.self_type;
            return self.generic_ivar_cell(self_t, name);
        }
        let Some(class) = self.self_ivar_class() else {
            return Err(self.err_undefined_var(name, span));
        };
        let owner = self.hoist_owner(class, name);
        self.class_ivar_cell(owner, name)
    }

    pub(crate) fn ivar_cell_for_read(&mut self, name: Symbol, span: Span) -> InferResult<NodeId> {
        if let InternedType::Generic { .. } = self.types.get(self.self_type) {
            let self_t = self.self_type;
            return self.generic_ivar_cell(self_t, name);
        }
        let Some(class) = self.self_ivar_class() else {
            return Err(self.err_undefined_var(name, span));
        };
        let owner = self.hoist_owner(class, name);
        if !self.registry.class(owner).ivar_writers.contains(&name) {
            // Nothing above writes this name. A write below is the
            // ambiguous case the stricter hoisting rule rejects.
            if let Some(subclass) = self.find_writing_descendant(class, name) {
                return Err(self.err_hoist_conflict(name, subclass, class, span));
            }
        }
        self.class_ivar_cell(owner, name)
    }

    /// The topmost class in the ancestor chain that assigns `name`; falls
    /// back to the receiver's class when no ancestor writes it.
    fn hoist_owner(&self, class: ClassId, name: Symbol) -> ClassId {
        let mut owner = class;
        for c in self.registry.superclass_chain(class) {
            if self.registry.class(c).ivar_writers.contains(&name) {
                owner = c;
            }
        }
        owner
    }

    fn find_writing_descendant(&self, class: ClassId, name: Symbol) -> Option<ClassId> {
        for &sub in &self.registry.class(class).subclasses {
            if self.registry.class(sub).ivar_writers.contains(&name) {
                return Some(sub);
            }
            if let Some(found) = self.find_writing_descendant(sub, name) {
                return Some(found);
            }
        }
        None
    }

    fn class_ivar_cell(&mut self, owner: ClassId, name: Symbol) -> InferResult<NodeId> {
        if let Some(&cell) = self.registry.class(owner).instance_vars.get(&name) {
            return Ok(cell);
        }
        let cell = self.ast.alloc(NodeKind::Var { name }, Span::default());
        self.registry
            .class_mut(owner)
            .instance_vars
            .insert(name, cell);
        // Instance variables are nilable until assigned on every path
        let nil_cell = self.nil_cell();
        self.bind(cell, nil_cell)?;
        Ok(cell)
    }

    fn generic_ivar_cell(&mut self, self_t: TypeId, name: Symbol) -> InferResult<NodeId> {
        if let Some(table) = self.registry.generic_ivars.get(&self_t) {
            if let Some(&cell) = table.get(&name) {
                return Ok(cell);
            }
        }
        let cell = self.ast.alloc(NodeKind::Var { name }, Span::default());
        self.registry
            .generic_ivars
            .entry(self_t)
            .or_default()
            .insert(name, cell);
        let nil_cell = self.nil_cell();
        self.bind(cell, nil_cell)?;
        Ok(cell)
    }
}
