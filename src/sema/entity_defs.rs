// src/sema/entity_defs.rs
//
// Definitions for language entities: class descriptors, method definitions,
// macros, and method instantiations. Storage and lookup live in
// entity_registry; these are the records it stores.

use rustc_hash::{FxHashMap, FxHashSet};

use crate::frontend::{BlockParamDecl, NodeId, Span, Symbol, TypeRef};
use crate::sema::entity_registry::{ClassId, InstanceId, MacroId, MethodId};
use crate::sema::type_arena::{TypeId, TypeIdVec};

/// What kind of scope/type a class descriptor models. Lib members are
/// class-shaped but excluded from method inference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassKind {
    Class,
    Module,
    Lib,
    CStruct,
    CUnion,
    CEnum,
}

/// A class descriptor. Identity is the ClassId handle; two descriptors are
/// the same class exactly when their ids are equal.
#[derive(Debug, Clone)]
pub struct ClassDef {
    pub id: ClassId,
    pub name: Symbol,
    pub kind: ClassKind,
    /// Lexically enclosing scope (module, class or the root program scope)
    pub parent_scope: Option<ClassId>,
    pub superclass: Option<ClassId>,
    /// Ordered type-parameter names for generic classes
    pub type_params: Vec<Symbol>,
    pub is_abstract: bool,
    /// Universal roots (Object, Reference) never host a collapsed
    /// hierarchy; unions of otherwise-unrelated classes stay unions.
    pub collapse_boundary: bool,
    /// Method name -> overloads, in definition order
    pub methods: FxHashMap<Symbol, Vec<MethodId>>,
    pub macros: FxHashMap<Symbol, MacroId>,
    /// Instance-variable name -> owning type cell (a Var node). Cells for a
    /// name written anywhere in a subclass hoist to the topmost writer in
    /// the ancestor chain, so this table only has entries this class owns.
    pub instance_vars: FxHashMap<Symbol, NodeId>,
    /// Names this class assigns somewhere in its method bodies, collected
    /// syntactically at registration time. Drives hoisting.
    pub ivar_writers: FxHashSet<Symbol>,
    /// Direct subclasses, in declaration order
    pub subclasses: Vec<ClassId>,
    /// Included modules, most recent last
    pub includes: Vec<ClassId>,
    /// Nested types declared in this scope
    pub types: FxHashMap<Symbol, ClassId>,
    /// Constant name -> value cell in this scope
    pub constants: FxHashMap<Symbol, NodeId>,
    /// Declared members of C structs/unions, enum members for C enums
    pub fields: Vec<(Symbol, TypeRef)>,
    pub enum_members: Vec<Symbol>,
}

impl ClassDef {
    pub fn new(id: ClassId, name: Symbol, kind: ClassKind) -> Self {
        Self {
            id,
            name,
            kind,
            parent_scope: None,
            superclass: None,
            type_params: Vec::new(),
            is_abstract: false,
            collapse_boundary: false,
            methods: FxHashMap::default(),
            macros: FxHashMap::default(),
            instance_vars: FxHashMap::default(),
            ivar_writers: FxHashSet::default(),
            subclasses: Vec::new(),
            includes: Vec::new(),
            types: FxHashMap::default(),
            constants: FxHashMap::default(),
            fields: Vec::new(),
            enum_members: Vec::new(),
        }
    }

    pub fn is_generic(&self) -> bool {
        !self.type_params.is_empty()
    }
}

/// Parameter restriction: either a source-level annotation or a type
/// pre-resolved by the builtin declaration tables.
#[derive(Debug, Clone)]
pub enum Restriction {
    Ref(TypeRef),
    Exact(TypeId),
}

/// Method parameter at the registry level.
#[derive(Debug, Clone)]
pub struct MethodParam {
    pub name: Symbol,
    pub restriction: Option<Restriction>,
    pub default: Option<NodeId>,
    pub span: Span,
}

/// Return-type rule for primitive bodies. Built-in numeric operations and
/// raw-memory access are opaque to inference; their return type comes from
/// this declaration table instead of body traversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimitiveRet {
    /// A fixed, pre-interned type
    Fixed(TypeId),
    /// The receiver type
    SelfType,
    /// The type of the nth argument
    Arg(usize),
    /// The nth generic argument of the receiver (e.g. `Pointer(T)#[]` -> T)
    TypeArg(usize),
}

/// The body of a method definition.
#[derive(Debug, Clone)]
pub enum MethodBody {
    Ast(NodeId),
    Primitive(PrimitiveRet),
}

/// Cache key for a method instantiation. Calls carrying a literal block key
/// on the call site so distinct block bodies never share an instantiation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InstanceKey {
    pub self_type: TypeId,
    pub arg_types: TypeIdVec,
    pub block: BlockKey,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockKey {
    None,
    CallSite(NodeId),
}

/// A method definition: one overload of a name on an owner class.
#[derive(Debug, Clone)]
pub struct MethodDef {
    pub id: MethodId,
    pub name: Symbol,
    pub owner: ClassId,
    pub params: Vec<MethodParam>,
    pub block_param: Option<BlockParamDecl>,
    pub return_type: Option<TypeRef>,
    pub body: MethodBody,
    pub span: Span,
    /// Instantiations keyed by concrete (receiver, argument tuple, block)
    pub instances: FxHashMap<InstanceKey, InstanceId>,
}

impl MethodDef {
    /// Number of parameters without a default value
    pub fn required_args(&self) -> usize {
        self.params.iter().filter(|p| p.default.is_none()).count()
    }

    pub fn accepts_arity(&self, n: usize) -> bool {
        n >= self.required_args() && n <= self.params.len()
    }
}

/// A macro definition. Macros expand by AST substitution before the
/// enclosing scope is inferred.
#[derive(Debug, Clone)]
pub struct MacroDef {
    pub id: MacroId,
    pub name: Symbol,
    pub owner: ClassId,
    pub params: Vec<Symbol>,
    pub body: NodeId,
    pub span: Span,
}

/// One concrete instantiation of a method: the cloned, inferred body plus
/// its return channel. Reused on identical re-lookup.
#[derive(Debug, Clone)]
pub struct MethodInstance {
    pub id: InstanceId,
    pub method: MethodId,
    pub self_type: TypeId,
    pub arg_types: TypeIdVec,
    /// Cloned body root; None for primitive bodies
    pub body: Option<NodeId>,
    /// The return channel cell. Body value and `return` expressions feed it.
    pub return_cell: NodeId,
    /// Declared return type, checked against the channel once the fixpoint
    /// is reached
    pub declared_return: Option<(TypeId, Span)>,
    /// Deterministic identifier for the code generator; filled in by the
    /// finalize pass
    pub mangled_name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_arity_counts_defaults() {
        let mut params = Vec::new();
        for i in 0..3 {
            params.push(MethodParam {
                name: Symbol(i),
                restriction: None,
                default: if i == 2 { Some(NodeId::new(0)) } else { None },
                span: Span::default(),
            });
        }
        let def = MethodDef {
            id: MethodId::new(0),
            name: Symbol(9),
            owner: ClassId::new(0),
            params,
            block_param: None,
            return_type: None,
            body: MethodBody::Primitive(PrimitiveRet::SelfType),
            span: Span::default(),
            instances: FxHashMap::default(),
        };
        assert!(def.accepts_arity(2));
        assert!(def.accepts_arity(3));
        assert!(!def.accepts_arity(1));
        assert!(!def.accepts_arity(4));
    }
}
