// src/sema/analyzer/calls.rs
//
// Call resolution and method instantiation. A call re-resolves whenever its
// receiver or an argument widens: new instantiations are added, old ones
// stay valid, and the result cell widens monotonically through the return
// channels it is bound to.

use rustc_hash::FxHashMap;

use crate::errors::InferResult;
use crate::frontend::{NodeId, NodeKind, Span, Symbol};
use crate::sema::analyzer::{Analyzer, DefContext, MAX_INSTANTIATE_DEPTH};
use crate::sema::entity_defs::{
    BlockKey, ClassKind, InstanceKey, MethodBody, MethodInstance, MethodParam, PrimitiveRet,
    Restriction,
};
use crate::sema::entity_registry::{ClassId, InstanceId, MacroId, MethodId};
use crate::sema::type_arena::{InternedType, TypeId, TypeIdVec};

impl Analyzer {
    /// Resolve (or re-resolve) a call node. Returns without effect while
    /// the receiver or any non-`out` argument is still untyped; the
    /// observer edges re-enter here once they widen.
    #[tracing::instrument(skip(self), level = "trace")]
    pub(crate) fn recalculate_call(&mut self, node: NodeId) -> InferResult<()> {
        let NodeKind::Call {
            receiver,
            name,
            args,
            block,
            ..
        } = self.ast.kind(node).clone()
        else {
            return Ok(());
        };
        let span = self.ast.span(node);

        let recv_t = match receiver {
            Some(r) => match self.ast.ty(r) {
                Some(t) => Some(t),
                None => return Ok(()),
            },
            None => None,
        };
        let mut arg_types: Vec<Option<TypeId>> = Vec::with_capacity(args.len());
        for &a in &args {
            match self.ast.ty(a) {
                Some(t) => arg_types.push(Some(t)),
                None if matches!(self.ast.kind(a), NodeKind::OutArg { .. }) => {
                    arg_types.push(None)
                }
                None => return Ok(()),
            }
        }

        let target = match recv_t {
            Some(t) => t,
            None => {
                // Receiverless: the current self, falling back to the
                // program scope for top-level definitions
                let self_t = self.self_type;
                let local = self
                    .class_for_type(self_t)
                    .map(|c| {
                        !self.registry.lookup_methods(c, name).is_empty()
                            || self.registry.lookup_macro(c, name).is_some()
                    })
                    .unwrap_or(false);
                if local {
                    self_t
                } else {
                    let root = self.registry.root;
                    self.types.instance(root)
                }
            }
        };
        self.resolve_call_on(node, target, name, &args, &arg_types, block, span, None)
    }

    /// Resolve against one receiver type. Unions fan out member-wise,
    /// hierarchies dispatch over their concrete members, metaclasses handle
    /// `new` and lib funs; everything else is ordinary method lookup.
    #[allow(clippy::too_many_arguments)]
    fn resolve_call_on(
        &mut self,
        node: NodeId,
        recv_t: TypeId,
        name: Symbol,
        arg_nodes: &[NodeId],
        arg_types: &[Option<TypeId>],
        block: Option<NodeId>,
        span: Span,
        hierarchy_member: Option<ClassId>,
    ) -> InferResult<()> {
        match self.types.get(recv_t).clone() {
            InternedType::Union(members) => {
                for m in members {
                    self.resolve_call_on(node, m, name, arg_nodes, arg_types, block, span, None)?;
                }
                return Ok(());
            }
            InternedType::Hierarchy { class } => {
                return self.resolve_hierarchy_call(
                    node, class, name, arg_nodes, arg_types, block, span,
                );
            }
            InternedType::Metaclass { of } => {
                return self.resolve_metaclass_call(
                    node, recv_t, of, name, arg_nodes, arg_types, block, span,
                );
            }
            _ => {}
        }

        let Some(class) = self.class_for_type(recv_t) else {
            return Err(self.err_undefined_method(name, recv_t, span));
        };
        let overloads = self.registry.lookup_methods(class, name);
        if overloads.is_empty() {
            if let Some(mac) = self.registry.lookup_macro(class, name) {
                return self.expand_macro(node, mac, arg_nodes, span);
            }
            return Err(match hierarchy_member {
                Some(member) => self.err_abstract_missing(name, member, span),
                None => self.err_undefined_method(name, recv_t, span),
            });
        }

        let concrete = self.require_concrete_args(arg_types, span)?;
        let base = self.receiver_bindings(recv_t);
        let Some((mid, bindings)) =
            self.find_matching_overload(&overloads, recv_t, &concrete, &base, &[])?
        else {
            return Err(self.err_no_overload(name, recv_t, &concrete, span));
        };
        let inst = self.instantiate(node, mid, recv_t, &concrete, block, bindings, span)?;
        self.bind_call_to_instance(node, inst)
    }

    /// Virtual dispatch at inference time: resolve independently against
    /// every concrete member, group members that land on the same
    /// definition (an inherited, un-overridden method instantiates once),
    /// and bind the call to the union of sub-results.
    #[allow(clippy::too_many_arguments)]
    fn resolve_hierarchy_call(
        &mut self,
        node: NodeId,
        class: ClassId,
        name: Symbol,
        arg_nodes: &[NodeId],
        arg_types: &[Option<TypeId>],
        block: Option<NodeId>,
        span: Span,
    ) -> InferResult<()> {
        let members = self.registry.concrete_descendants(class);
        let concrete = self.require_concrete_args(arg_types, span)?;

        let mut groups: Vec<(MethodId, FxHashMap<Symbol, TypeId>, Vec<TypeId>)> = Vec::new();
        for member in members {
            let recv = self.types.instance(member);
            let overloads = self.registry.lookup_methods(member, name);
            if overloads.is_empty() {
                if self.registry.lookup_macro(member, name).is_some() {
                    return self.resolve_call_on(
                        node,
                        recv,
                        name,
                        arg_nodes,
                        arg_types,
                        block,
                        span,
                        Some(member),
                    );
                }
                return Err(self.err_abstract_missing(name, member, span));
            }
            let base = FxHashMap::default();
            let Some((mid, bindings)) =
                self.find_matching_overload(&overloads, recv, &concrete, &base, &[])?
            else {
                return Err(self.err_no_overload(name, recv, &concrete, span));
            };
            match groups.iter_mut().find(|(existing, ..)| *existing == mid) {
                Some((.., recvs)) => recvs.push(recv),
                None => groups.push((mid, bindings, vec![recv])),
            }
        }

        for (mid, bindings, recvs) in groups {
            // Shared definitions see the plain union of their receivers
            let self_t = self.types.union_of(&recvs);
            let inst = self.instantiate(node, mid, self_t, &concrete, block, bindings, span)?;
            self.bind_call_to_instance(node, inst)?;
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn resolve_metaclass_call(
        &mut self,
        node: NodeId,
        recv_t: TypeId,
        of: TypeId,
        name: Symbol,
        arg_nodes: &[NodeId],
        arg_types: &[Option<TypeId>],
        block: Option<NodeId>,
        span: Span,
    ) -> InferResult<()> {
        if let Some(class) = self.types.class_of(of) {
            if self.registry.class(class).kind == ClassKind::Lib {
                return self.resolve_lib_call(node, class, recv_t, name, arg_nodes, arg_types, span);
            }
        }
        if self.interner.resolve(name) == "new" {
            return self.resolve_new(node, of, name, arg_types, block, span);
        }
        Err(self.err_undefined_method(name, recv_t, span))
    }

    /// `Foo.new`: allocate the instance type, inferring generic arguments
    /// from the matched `initialize` overload's restrictions, then
    /// instantiate `initialize` against the fresh object type.
    fn resolve_new(
        &mut self,
        node: NodeId,
        of_t: TypeId,
        name: Symbol,
        arg_types: &[Option<TypeId>],
        block: Option<NodeId>,
        span: Span,
    ) -> InferResult<()> {
        let Some(class) = self.types.class_of(of_t) else {
            return Err(self.err_undefined_method(name, of_t, span));
        };
        let (is_abstract, type_params, class_name) = {
            let def = self.registry.class(class);
            (def.is_abstract, def.type_params.clone(), def.name)
        };
        if is_abstract {
            let found = format!(
                "abstract class {}",
                self.interner.resolve(class_name)
            );
            return Err(self.err_type_mismatch("a concrete class", &found, span));
        }

        let concrete = self.require_concrete_args(arg_types, span)?;
        let init_sym = self.interner.intern("initialize");
        let overloads = self.registry.lookup_methods(class, init_sym);
        let empty = FxHashMap::default();

        let (obj_t, chosen) = if type_params.is_empty() {
            let obj = self.types.instance(class);
            if overloads.is_empty() {
                if !concrete.is_empty() {
                    return Err(self.err_wrong_args(name, "0".to_string(), concrete.len(), span));
                }
                (obj, None)
            } else {
                match self.find_matching_overload(&overloads, obj, &concrete, &empty, &[])? {
                    Some(found) => (obj, Some(found)),
                    None => return Err(self.err_no_overload(init_sym, obj, &concrete, span)),
                }
            }
        } else {
            // Generic classes instantiate lazily: the first `new` whose
            // `initialize` binds every type parameter determines the tuple
            if overloads.is_empty() {
                return Err(self.err_cannot_infer(type_params[0], class, span));
            }
            let Some((mid, bindings)) =
                self.find_matching_overload(&overloads, of_t, &concrete, &empty, &type_params)?
            else {
                return Err(self.err_no_overload(init_sym, of_t, &concrete, span));
            };
            let mut generic_args = TypeIdVec::new();
            for p in &type_params {
                match bindings.get(p) {
                    Some(&t) => generic_args.push(t),
                    None => return Err(self.err_cannot_infer(*p, class, span)),
                }
            }
            let obj = self.types.generic(class, generic_args);
            (obj, Some((mid, bindings)))
        };

        if let Some((mid, bindings)) = chosen {
            let inst = self.instantiate(node, mid, obj_t, &concrete, block, bindings, span)?;
            self.push_target_def(node, inst);
        }

        let cell = match self.registry.new_cells.get(&obj_t) {
            Some(&c) => c,
            None => {
                let cell_name = self.interner.intern("<new>");
                let c = self.ast.alloc(NodeKind::Var { name: cell_name }, span);
                self.registry.new_cells.insert(obj_t, c);
                self.set_type(c, obj_t)?;
                c
            }
        };
        self.bind(node, cell)
    }

    /// Foreign function call: fixed declared signature, exact arity,
    /// `out` arguments defined by the pointer parameter's referent.
    #[allow(clippy::too_many_arguments)]
    fn resolve_lib_call(
        &mut self,
        node: NodeId,
        lib_class: ClassId,
        recv_t: TypeId,
        name: Symbol,
        arg_nodes: &[NodeId],
        arg_types: &[Option<TypeId>],
        span: Span,
    ) -> InferResult<()> {
        let overloads = self.registry.lookup_methods(lib_class, name);
        let Some(&mid) = overloads.first() else {
            return Err(self.err_undefined_method(name, recv_t, span));
        };
        let params: Vec<MethodParam> = self.registry.method(mid).params.clone();
        if params.len() != arg_nodes.len() {
            return Err(self.err_wrong_args(
                name,
                params.len().to_string(),
                arg_nodes.len(),
                span,
            ));
        }

        let pointer_class = self.builtins.pointer;
        let mut concrete = Vec::with_capacity(params.len());
        for (i, &arg) in arg_nodes.iter().enumerate() {
            let param_t = match &params[i].restriction {
                Some(Restriction::Exact(t)) => *t,
                _ => self.types.primitives.void,
            };
            if let NodeKind::OutArg { var } = *self.ast.kind(arg) {
                if self.types.class_of(param_t) != Some(pointer_class) {
                    let found = self.display_type(param_t);
                    return Err(self.err_type_mismatch(
                        "a pointer parameter",
                        &found,
                        self.ast.span(arg),
                    ));
                }
                let referent = self
                    .types
                    .generic_args(param_t)
                    .and_then(|g| g.first().copied())
                    .unwrap_or(self.types.primitives.void);
                self.set_type(var, referent)?;
                self.set_type(arg, param_t)?;
                concrete.push(param_t);
            } else {
                let Some(arg_t) = arg_types[i] else {
                    return Ok(());
                };
                if !self.subtype(arg_t, param_t) {
                    let expected = self.display_type(param_t);
                    let found = self.display_type(arg_t);
                    return Err(self.err_type_mismatch(
                        &expected,
                        &found,
                        self.ast.span(arg),
                    ));
                }
                concrete.push(arg_t);
            }
        }

        let inst =
            self.instantiate(node, mid, recv_t, &concrete, None, FxHashMap::default(), span)?;
        self.bind_call_to_instance(node, inst)
    }

    /// Expand a macro by cloning its body with parameters substituted by
    /// the unevaluated argument nodes, then infer the expansion in place.
    fn expand_macro(
        &mut self,
        node: NodeId,
        macro_id: MacroId,
        arg_nodes: &[NodeId],
        span: Span,
    ) -> InferResult<()> {
        if let Some(&expanded) = self.macro_expansions.get(&node) {
            return self.bind(node, expanded);
        }
        let mac = self.registry.macro_def(macro_id).clone();
        if mac.params.len() != arg_nodes.len() {
            return Err(self.err_wrong_args(
                mac.name,
                mac.params.len().to_string(),
                arg_nodes.len(),
                span,
            ));
        }
        let mut subst = FxHashMap::default();
        for (&param, &arg) in mac.params.iter().zip(arg_nodes) {
            subst.insert(param, arg);
        }
        let expanded = self.ast.clone_with_subst(mac.body, &subst);
        self.macro_expansions.insert(node, expanded);
        self.visit(expanded)?;
        self.bind(node, expanded)
    }

    // ------------------------------------------------------------------
    // Instantiation
    // ------------------------------------------------------------------

    /// Look up or create the instantiation of `method_id` for the given
    /// receiver and argument tuple. The cache entry is inserted before the
    /// clone is inferred so recursive calls land on the existing channel.
    pub(crate) fn instantiate(
        &mut self,
        call_node: NodeId,
        method_id: MethodId,
        self_t: TypeId,
        arg_ts: &[TypeId],
        block: Option<NodeId>,
        bindings: FxHashMap<Symbol, TypeId>,
        call_span: Span,
    ) -> InferResult<InstanceId> {
        let block_key = match block {
            Some(_) => BlockKey::CallSite(call_node),
            None => BlockKey::None,
        };
        let key = InstanceKey {
            self_type: self_t,
            arg_types: arg_ts.iter().copied().collect(),
            block: block_key,
        };
        if let Some(&existing) = self.registry.method(method_id).instances.get(&key) {
            return Ok(existing);
        }
        if self.depth >= MAX_INSTANTIATE_DEPTH {
            return Err(self.err_too_deep(call_span));
        }
        self.depth += 1;
        let result =
            self.instantiate_fresh(call_node, method_id, self_t, arg_ts, block, bindings, key, call_span);
        self.depth -= 1;
        result
    }

    #[allow(clippy::too_many_arguments)]
    fn instantiate_fresh(
        &mut self,
        call_node: NodeId,
        method_id: MethodId,
        self_t: TypeId,
        arg_ts: &[TypeId],
        block: Option<NodeId>,
        bindings: FxHashMap<Symbol, TypeId>,
        key: InstanceKey,
        call_span: Span,
    ) -> InferResult<InstanceId> {
        let (body, params, return_type, owner) = {
            let def = self.registry.method(method_id);
            (
                def.body.clone(),
                def.params.clone(),
                def.return_type.clone(),
                def.owner,
            )
        };
        let ret_name = self.interner.intern("<return>");
        let return_cell = self.ast.alloc(NodeKind::Var { name: ret_name }, call_span);

        match body {
            MethodBody::Primitive(rule) => {
                let void = self.types.primitives.void;
                let ret = match rule {
                    PrimitiveRet::Fixed(t) => t,
                    PrimitiveRet::SelfType => self_t,
                    PrimitiveRet::Arg(i) => arg_ts.get(i).copied().unwrap_or(void),
                    PrimitiveRet::TypeArg(i) => self
                        .types
                        .generic_args(self_t)
                        .and_then(|g| g.get(i).copied())
                        .unwrap_or(void),
                };
                let inst = self.registry.add_instance(MethodInstance {
                    id: InstanceId::new(0),
                    method: method_id,
                    self_type: self_t,
                    arg_types: key.arg_types.clone(),
                    body: None,
                    return_cell,
                    declared_return: None,
                    mangled_name: String::new(),
                });
                self.registry.method_mut(method_id).instances.insert(key, inst);
                self.set_type(return_cell, ret)?;
                Ok(inst)
            }
            MethodBody::Ast(template) => {
                tracing::debug!(
                    method = self.interner.resolve(self.registry.method(method_id).name),
                    self_type = %self.display_type(self_t),
                    "instantiating method body"
                );
                let cloned = self.ast.clone_subtree(template);
                let declared = match &return_type {
                    Some(tr) => {
                        let saved = std::mem::replace(&mut self.scope_class, owner);
                        let resolved = self.resolve_typeref_in(tr, self_t, &bindings);
                        self.scope_class = saved;
                        Some((resolved?, tr.span()))
                    }
                    None => None,
                };
                let inst = self.registry.add_instance(MethodInstance {
                    id: InstanceId::new(0),
                    method: method_id,
                    self_type: self_t,
                    arg_types: key.arg_types.clone(),
                    body: Some(cloned),
                    return_cell,
                    declared_return: declared,
                    mangled_name: String::new(),
                });
                self.registry.method_mut(method_id).instances.insert(key, inst);

                let saved_scope = std::mem::take(&mut self.scope);
                let saved_self = std::mem::replace(&mut self.self_type, self_t);
                let saved_scope_class = std::mem::replace(&mut self.scope_class, owner);
                let saved_ctx = self.def_ctx.take();
                let saved_block = self.current_block.take();
                self.def_ctx = Some(DefContext {
                    return_cell,
                    block,
                    type_bindings: bindings,
                });

                let result = self.wire_instance_body(&params, arg_ts, cloned, return_cell);

                self.scope = saved_scope;
                self.self_type = saved_self;
                self.scope_class = saved_scope_class;
                self.def_ctx = saved_ctx;
                self.current_block = saved_block;

                result.map_err(|e| e.in_call(call_span))?;
                Ok(inst)
            }
        }
    }

    fn wire_instance_body(
        &mut self,
        params: &[MethodParam],
        arg_ts: &[TypeId],
        body: NodeId,
        return_cell: NodeId,
    ) -> InferResult<()> {
        let mut defaulted: Vec<(NodeId, NodeId)> = Vec::new();
        for (i, param) in params.iter().enumerate() {
            let cell = self.ast.alloc(NodeKind::Var { name: param.name }, param.span);
            self.scope.define(param.name, cell);
            if let Some(&arg) = arg_ts.get(i) {
                self.set_type(cell, arg)?;
            } else if let Some(default) = param.default {
                let expr = self.ast.clone_subtree(default);
                defaulted.push((cell, expr));
            }
        }
        // Defaults are inferred with every parameter already in scope
        for (cell, expr) in defaulted {
            self.visit(expr)?;
            self.bind(cell, expr)?;
        }
        self.visit(body)?;
        self.bind(return_cell, body)
    }

    // ------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------

    fn bind_call_to_instance(&mut self, node: NodeId, inst: InstanceId) -> InferResult<()> {
        let return_cell = self.registry.instance(inst).return_cell;
        self.push_target_def(node, inst);
        self.bind(node, return_cell)
    }

    fn push_target_def(&mut self, node: NodeId, inst: InstanceId) {
        if let NodeKind::Call { target_defs, .. } = &mut self.ast.node_mut(node).kind {
            if !target_defs.contains(&inst) {
                target_defs.push(inst);
            }
        }
    }

    /// Type-parameter bindings implied by a generic receiver.
    fn receiver_bindings(&self, recv_t: TypeId) -> FxHashMap<Symbol, TypeId> {
        let mut map = FxHashMap::default();
        if let InternedType::Generic { class, args } = self.types.get(recv_t) {
            let params = &self.registry.class(*class).type_params;
            for (&p, &a) in params.iter().zip(args.iter()) {
                map.insert(p, a);
            }
        }
        map
    }

    fn require_concrete_args(
        &self,
        arg_types: &[Option<TypeId>],
        span: Span,
    ) -> InferResult<Vec<TypeId>> {
        let mut out = Vec::with_capacity(arg_types.len());
        for t in arg_types {
            match t {
                Some(t) => out.push(*t),
                None => {
                    return Err(self.err_type_mismatch(
                        "a value argument",
                        "an 'out' argument outside a lib fun call",
                        span,
                    ));
                }
            }
        }
        Ok(out)
    }
}
