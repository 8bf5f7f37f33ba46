// src/sema/analyzer/restrictions.rs
//
// Type-annotation resolution and overload filtering. A restriction `T`
// matches an argument type X iff X subtypes T, with `self` resolving to the
// receiver under test, unions resolving member-wise, and free type
// parameters binding to the argument type on first contact.

use rustc_hash::FxHashMap;

use crate::errors::InferResult;
use crate::frontend::{Symbol, TypeRef};
use crate::sema::analyzer::Analyzer;
use crate::sema::entity_defs::{MethodParam, Restriction};
use crate::sema::entity_registry::MethodId;
use crate::sema::type_arena::{TypeId, TypeIdVec};

impl Analyzer {
    /// Resolve an annotation in the current visitor context (lexical scope,
    /// current self, current type-parameter bindings).
    pub(crate) fn resolve_typeref(&mut self, tr: &TypeRef) -> InferResult<TypeId> {
        let bindings = match &self.def_ctx {
            Some(ctx) => ctx.type_bindings.clone(),
            None => FxHashMap::default(),
        };
        let ctx_self = self.self_type;
        self.resolve_typeref_in(tr, ctx_self, &bindings)
    }

    /// Resolve an annotation against an explicit receiver and binding set.
    /// Paths resolve in the current `scope_class`; callers that need a
    /// different lexical scope (overload matching, declared returns) swap
    /// it around this call.
    pub(crate) fn resolve_typeref_in(
        &mut self,
        tr: &TypeRef,
        ctx_self: TypeId,
        bindings: &FxHashMap<Symbol, TypeId>,
    ) -> InferResult<TypeId> {
        match tr {
            TypeRef::SelfType { .. } => Ok(ctx_self),
            TypeRef::Union { parts, .. } => {
                let mut resolved = Vec::with_capacity(parts.len());
                for p in parts {
                    resolved.push(self.resolve_typeref_in(p, ctx_self, bindings)?);
                }
                Ok(self.merge_types(&resolved))
            }
            TypeRef::Fun { span, .. } => {
                Err(self.err_type_mismatch("a value type", "a function type", *span))
            }
            TypeRef::Path {
                names,
                anchored,
                args,
                span,
            } => {
                if names.len() == 1 && !*anchored && args.is_empty() {
                    if let Some(&bound) = bindings.get(&names[0]) {
                        return Ok(bound);
                    }
                    if let Some(prim) = self.primitive_by_name(names[0]) {
                        return Ok(prim);
                    }
                }
                let Some(class) = self.registry.resolve_path(self.scope_class, names, *anchored)
                else {
                    return Err(self.err_undefined_const(names, *span));
                };
                if args.is_empty() {
                    Ok(self.types.instance(class))
                } else {
                    let mut resolved = TypeIdVec::new();
                    for a in args {
                        resolved.push(self.resolve_typeref_in(a, ctx_self, bindings)?);
                    }
                    Ok(self.types.generic(class, resolved))
                }
            }
        }
    }

    /// Primitive names resolve ahead of class lookup so `Int32` in a
    /// restriction means the primitive type, not its method-hosting class.
    fn primitive_by_name(&self, name: Symbol) -> Option<TypeId> {
        use crate::sema::type_arena::PrimitiveType::*;
        let t = match self.interner.resolve(name) {
            "Nil" => Nil,
            "Bool" => Bool,
            "Char" => Char,
            "Int8" => I8,
            "Int16" => I16,
            "Int32" => I32,
            "Int64" => I64,
            "Float32" => F32,
            "Float64" => F64,
            "String" => String,
            "Symbol" => Symbol,
            "Void" => Void,
            _ => return None,
        };
        Some(self.types.primitive(t))
    }

    /// Does `arg` satisfy `restriction`? Free type parameters bind on first
    /// contact and constrain subsequent positions.
    pub(crate) fn restriction_matches(
        &mut self,
        restriction: &Restriction,
        arg: TypeId,
        recv_self: TypeId,
        bindings: &mut FxHashMap<Symbol, TypeId>,
        free_params: &[Symbol],
    ) -> InferResult<bool> {
        match restriction {
            Restriction::Exact(t) => Ok(self.subtype(arg, *t)),
            Restriction::Ref(tr) => {
                if let TypeRef::Path {
                    names,
                    anchored: false,
                    args,
                    ..
                } = tr
                {
                    if names.len() == 1 && args.is_empty() && free_params.contains(&names[0]) {
                        return match bindings.get(&names[0]) {
                            Some(&bound) => Ok(self.subtype(arg, bound)),
                            None => {
                                bindings.insert(names[0], arg);
                                Ok(true)
                            }
                        };
                    }
                }
                let t = self.resolve_typeref_in(tr, recv_self, bindings)?;
                Ok(self.subtype(arg, t))
            }
        }
    }

    /// Filter overloads by parameter restrictions: restricted overloads are
    /// tried first in definition order, the unrestricted catch-alls last.
    /// Returns the chosen method plus the binding set its match produced.
    pub(crate) fn find_matching_overload(
        &mut self,
        overloads: &[MethodId],
        recv_self: TypeId,
        arg_types: &[TypeId],
        base_bindings: &FxHashMap<Symbol, TypeId>,
        free_params: &[Symbol],
    ) -> InferResult<Option<(MethodId, FxHashMap<Symbol, TypeId>)>> {
        let has_restriction = |a: &Analyzer, id: MethodId| {
            a.registry
                .method(id)
                .params
                .iter()
                .any(|p| p.restriction.is_some())
        };
        let mut ordered: Vec<MethodId> = overloads
            .iter()
            .copied()
            .filter(|&id| has_restriction(self, id))
            .collect();
        ordered.extend(
            overloads
                .iter()
                .copied()
                .filter(|&id| !has_restriction(self, id)),
        );

        for id in ordered {
            let def = self.registry.method(id);
            if !def.accepts_arity(arg_types.len()) {
                continue;
            }
            let owner = def.owner;
            let params: Vec<MethodParam> = def.params.clone();

            let saved_scope = std::mem::replace(&mut self.scope_class, owner);
            let mut bindings = base_bindings.clone();
            let mut all_match = true;
            for (i, &arg) in arg_types.iter().enumerate() {
                if let Some(restriction) = &params[i].restriction {
                    match self.restriction_matches(
                        restriction,
                        arg,
                        recv_self,
                        &mut bindings,
                        free_params,
                    ) {
                        Ok(true) => {}
                        Ok(false) => {
                            all_match = false;
                            break;
                        }
                        Err(e) => {
                            self.scope_class = saved_scope;
                            return Err(e);
                        }
                    }
                }
            }
            self.scope_class = saved_scope;
            if all_match {
                return Ok(Some((id, bindings)));
            }
        }
        Ok(None)
    }
}
