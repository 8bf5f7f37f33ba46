// src/sema/analyzer/mod.rs
//
// The inference driver. The Analyzer owns the node arena, the type arena
// and the entity registry for the duration of a compilation; it wires
// dependency edges per construct, resolves calls, and drives propagation to
// the fixpoint. Submodules split the work the way the phases do:
//
// - graph:        the five-node propagation protocol (bind/update/propagate)
// - visit:        per-construct wiring
// - declarations: class/module/lib/def/macro registration
// - calls:        the call resolver and method instantiation
// - restrictions: annotation resolution and overload filtering

mod calls;
mod declarations;
mod graph;
mod restrictions;
mod visit;

use rustc_hash::FxHashMap;

use crate::errors::{InferError, InferResult, SemanticError, source_span};
use crate::frontend::{Ast, Interner, NodeId, NodeKind, Span, Symbol};
use crate::sema::builtins::Builtins;
use crate::sema::entity_registry::{ClassId, EntityRegistry, InstanceId};
use crate::sema::scope::Scope;
use crate::sema::type_arena::{InternedType, TypeArena, TypeId};
use crate::sema::{lattice, mangle, type_display};

/// Instantiation nesting limit: pathological generic recursion widens
/// forever otherwise.
const MAX_INSTANTIATE_DEPTH: usize = 256;

/// Inference context of the method instantiation currently being wired.
#[derive(Debug)]
pub(crate) struct DefContext {
    /// Return channel: the body value and every `return` feed it
    pub return_cell: NodeId,
    /// The call site's literal block, if the enclosing call passed one
    pub block: Option<NodeId>,
    /// Type-parameter bindings of the receiver (and `new` inference)
    pub type_bindings: FxHashMap<Symbol, TypeId>,
}

pub struct Analyzer {
    pub ast: Ast,
    pub types: TypeArena,
    pub registry: EntityRegistry,
    pub interner: Interner,
    pub builtins: Builtins,
    scope: Scope,
    /// Type of `self` in the context currently being wired
    self_type: TypeId,
    /// Lexical scope for constant and type resolution
    scope_class: ClassId,
    def_ctx: Option<DefContext>,
    /// Innermost literal block being visited; Break/Next feed it
    current_block: Option<NodeId>,
    /// Shared cell typed Nil; missing else branches and fresh instance
    /// variables bind to it
    nil_cell: NodeId,
    depth: usize,
    /// Memoized macro expansions per call site
    macro_expansions: FxHashMap<NodeId, NodeId>,
}

impl Analyzer {
    pub fn new(ast: Ast, interner: Interner) -> Self {
        let mut ast = ast;
        let mut interner = interner;
        let mut registry = EntityRegistry::new(interner.intern("main"));
        let mut types = TypeArena::new();
        let builtins = Builtins::install(&mut registry, &mut types, &mut interner);

        // Top-level self inherits Object's catch-alls
        let root = registry.root;
        registry.set_superclass(root, builtins.object);

        let nil_name = interner.intern("<nil>");
        let nil_cell = ast.alloc(NodeKind::Var { name: nil_name }, Span::default());
        ast.node_mut(nil_cell).ty = Some(types.primitives.nil);

        let self_type = types.instance(root);

        Self {
            ast,
            types,
            registry,
            interner,
            builtins,
            scope: Scope::new(),
            self_type,
            scope_class: root,
            def_ctx: None,
            current_block: None,
            nil_cell,
            depth: 0,
            macro_expansions: FxHashMap::default(),
        }
    }

    /// Run inference over the program rooted at `root`, then validate
    /// declared return types and precompute mangled names. Propagation has
    /// reached its fixpoint when this returns.
    pub fn analyze(&mut self, root: NodeId) -> InferResult<()> {
        self.visit(root)?;
        self.finalize()
    }

    // ------------------------------------------------------------------
    // Introspection (tests, diagnostics, codegen boundary)
    // ------------------------------------------------------------------

    pub fn type_of(&self, node: NodeId) -> Option<TypeId> {
        self.ast.ty(node)
    }

    pub fn display_type(&self, ty: TypeId) -> String {
        type_display::type_to_string(&self.types, &self.registry, &self.interner, ty)
    }

    /// Rendered type of a node, `"<untyped>"` when its cell is empty.
    pub fn display_node_type(&self, node: NodeId) -> String {
        match self.ast.ty(node) {
            Some(t) => self.display_type(t),
            None => "<untyped>".to_string(),
        }
    }

    pub fn target_defs(&self, call: NodeId) -> &[InstanceId] {
        match self.ast.kind(call) {
            NodeKind::Call { target_defs, .. } => target_defs,
            _ => &[],
        }
    }

    pub fn class_by_name(&self, name: &str) -> Option<ClassId> {
        let sym = self.interner.lookup(name)?;
        self.registry.lookup_type(self.registry.root, sym)
    }

    /// The inferred type of an instance variable owned by `class`, if the
    /// class owns a cell for it.
    pub fn instance_var_type(&self, class: ClassId, name: &str) -> Option<TypeId> {
        let sym = self.interner.lookup(name)?;
        let cell = *self.registry.class(class).instance_vars.get(&sym)?;
        self.ast.ty(cell)
    }

    pub fn instance_var_count(&self, class: ClassId) -> usize {
        self.registry.class(class).instance_vars.len()
    }

    pub(crate) fn nil_cell(&self) -> NodeId {
        self.nil_cell
    }

    pub(crate) fn merge_types(&mut self, parts: &[TypeId]) -> TypeId {
        lattice::merge(&mut self.types, &self.registry, parts)
    }

    pub(crate) fn subtype(&self, a: TypeId, b: TypeId) -> bool {
        lattice::is_subtype(&self.types, &self.registry, a, b)
    }

    // ------------------------------------------------------------------
    // Error construction
    // ------------------------------------------------------------------

    pub(crate) fn err_undefined_var(&self, name: Symbol, span: Span) -> InferError {
        InferError::new(SemanticError::UndefinedVariable {
            name: self.interner.resolve(name).to_string(),
            span: source_span(span),
        })
    }

    pub(crate) fn err_undefined_const(&self, names: &[Symbol], span: Span) -> InferError {
        let path: Vec<&str> = names.iter().map(|&n| self.interner.resolve(n)).collect();
        InferError::new(SemanticError::UndefinedConstant {
            name: path.join("::"),
            span: source_span(span),
        })
    }

    pub(crate) fn err_undefined_method(
        &self,
        name: Symbol,
        receiver: TypeId,
        span: Span,
    ) -> InferError {
        InferError::new(SemanticError::UndefinedMethod {
            name: self.interner.resolve(name).to_string(),
            receiver: self.display_type(receiver),
            span: source_span(span),
        })
    }

    pub(crate) fn err_no_overload(
        &self,
        name: Symbol,
        receiver: TypeId,
        args: &[TypeId],
        span: Span,
    ) -> InferError {
        let rendered: Vec<String> = args.iter().map(|&a| self.display_type(a)).collect();
        InferError::new(SemanticError::NoOverloadMatches {
            name: self.interner.resolve(name).to_string(),
            receiver: self.display_type(receiver),
            args: rendered.join(", "),
            span: source_span(span),
        })
    }

    pub(crate) fn err_type_mismatch(
        &self,
        expected: &str,
        found: &str,
        span: Span,
    ) -> InferError {
        InferError::new(SemanticError::TypeMismatch {
            expected: expected.to_string(),
            found: found.to_string(),
            span: source_span(span),
        })
    }

    pub(crate) fn err_abstract_missing(
        &self,
        name: Symbol,
        class: ClassId,
        span: Span,
    ) -> InferError {
        InferError::new(SemanticError::AbstractMethodMissing {
            name: self.interner.resolve(name).to_string(),
            class: self.interner.resolve(self.registry.class(class).name).to_string(),
            span: source_span(span),
        })
    }

    pub(crate) fn err_wrong_args(
        &self,
        name: Symbol,
        expected: String,
        found: usize,
        span: Span,
    ) -> InferError {
        InferError::new(SemanticError::WrongArgumentCount {
            name: self.interner.resolve(name).to_string(),
            expected,
            found,
            span: source_span(span),
        })
    }

    pub(crate) fn err_too_deep(&self, span: Span) -> InferError {
        InferError::new(SemanticError::InstantiationTooDeep {
            span: source_span(span),
        })
    }

    pub(crate) fn err_cannot_infer(
        &self,
        param: Symbol,
        class: ClassId,
        span: Span,
    ) -> InferError {
        InferError::new(SemanticError::CannotInferTypeParam {
            param: self.interner.resolve(param).to_string(),
            class: self.interner.resolve(self.registry.class(class).name).to_string(),
            span: source_span(span),
        })
    }

    pub(crate) fn err_hoist_conflict(
        &self,
        name: Symbol,
        subclass: ClassId,
        superclass: ClassId,
        span: Span,
    ) -> InferError {
        InferError::new(SemanticError::InstanceVarHoistConflict {
            name: self.interner.resolve(name).to_string(),
            subclass: self.interner.resolve(self.registry.class(subclass).name).to_string(),
            superclass: self
                .interner
                .resolve(self.registry.class(superclass).name)
                .to_string(),
            span: source_span(span),
        })
    }

    pub(crate) fn err_empty_literal(&self, literal: &str, span: Span) -> InferError {
        InferError::new(SemanticError::EmptyLiteralNeedsOf {
            literal: literal.to_string(),
            span: source_span(span),
        })
    }

    // ------------------------------------------------------------------
    // Finalize: declared-return validation and mangled names
    // ------------------------------------------------------------------

    fn finalize(&mut self) -> InferResult<()> {
        let count = self.registry.instances().count();
        for index in 0..count {
            let id = InstanceId::new(index as u32);
            let (method_id, self_type, arg_types, return_cell, declared) = {
                let inst = self.registry.instance(id);
                (
                    inst.method,
                    inst.self_type,
                    inst.arg_types.clone(),
                    inst.return_cell,
                    inst.declared_return,
                )
            };
            let actual = self
                .ast
                .ty(return_cell)
                .unwrap_or(self.types.primitives.nil);

            if let Some((declared_ty, span)) = declared {
                if !self.subtype(actual, declared_ty) {
                    return Err(self.err_type_mismatch(
                        &self.display_type(declared_ty),
                        &self.display_type(actual),
                        span,
                    ));
                }
            }

            let (owner, name) = {
                let def = self.registry.method(method_id);
                (def.owner, self.interner.resolve(def.name).to_string())
            };
            let mangled = mangle::method_name(
                &self.types,
                &self.registry,
                &self.interner,
                owner,
                &name,
                self_type,
                &arg_types,
                Some(actual),
            );
            self.registry.instance_mut(id).mangled_name = mangled;
        }
        Ok(())
    }

    /// The class hosting methods for a receiver type.
    pub(crate) fn class_for_type(&self, t: TypeId) -> Option<ClassId> {
        match self.types.get(t) {
            InternedType::Primitive(p) => self.builtins.primitive_class(*p),
            InternedType::Instance { class }
            | InternedType::Generic { class, .. }
            | InternedType::Hierarchy { class } => Some(*class),
            _ => None,
        }
    }
}
