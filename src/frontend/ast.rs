// src/frontend/ast.rs
//
// The AST node arena. Every node owns a type cell plus the two adjacency
// lists (dependencies and observers) that drive type propagation. Nodes are
// addressed by NodeId handles into the arena, so the cyclic observer graph
// needs no reference counting.

use smallvec::SmallVec;

use crate::frontend::{Span, Symbol};
use crate::sema::entity_registry::InstanceId;
use crate::sema::type_arena::TypeId;

/// Unique identifier for AST nodes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(u32);

impl NodeId {
    pub fn new(index: u32) -> Self {
        Self(index)
    }

    pub fn index(self) -> u32 {
        self.0
    }
}

/// SmallVec for adjacency lists - most nodes have one or two edges
pub type NodeIdVec = SmallVec<[NodeId; 2]>;

/// Width of an integer literal, selected by its suffix (`_i8`..`_i64`).
/// A bare literal is I32.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntWidth {
    I8,
    I16,
    I32,
    I64,
}

/// Width of a float literal, selected by its suffix (`_f32`, `_f64`).
/// A bare literal is F64.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FloatWidth {
    F32,
    F64,
}

/// Type annotation as written in source: restrictions, `of` clauses,
/// declared returns, lib member types. Resolved against the registry
/// during inference.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeRef {
    /// Qualified path, `Foo::Bar`, optionally anchored at the root with a
    /// leading `::`, optionally carrying generic arguments `Foo(Int32)`.
    Path {
        names: Vec<Symbol>,
        anchored: bool,
        args: Vec<TypeRef>,
        span: Span,
    },
    /// Union restriction: `T | U`
    Union { parts: Vec<TypeRef>, span: Span },
    /// `self` in a restriction resolves to the receiver under test
    SelfType { span: Span },
    /// Function type for block parameters: `Int32 -> Char`
    Fun {
        params: Vec<TypeRef>,
        ret: Option<Box<TypeRef>>,
        span: Span,
    },
}

impl TypeRef {
    pub fn span(&self) -> Span {
        match self {
            TypeRef::Path { span, .. }
            | TypeRef::Union { span, .. }
            | TypeRef::SelfType { span }
            | TypeRef::Fun { span, .. } => *span,
        }
    }
}

/// Method parameter as declared: optional type restriction, optional
/// default-value expression (a node allocated but not visited until
/// instantiation).
#[derive(Debug, Clone, PartialEq)]
pub struct ParamDecl {
    pub name: Symbol,
    pub restriction: Option<TypeRef>,
    pub default: Option<NodeId>,
    pub span: Span,
}

/// Declared block parameter: `&blk : Int32 -> Char`
#[derive(Debug, Clone, PartialEq)]
pub struct BlockParamDecl {
    pub name: Symbol,
    pub fn_type: Option<TypeRef>,
}

/// A method or macro definition carried inside a class/module body.
#[derive(Debug, Clone, PartialEq)]
pub struct DefNode {
    pub name: Symbol,
    pub params: Vec<ParamDecl>,
    pub block_param: Option<BlockParamDecl>,
    pub return_type: Option<TypeRef>,
    pub body: NodeId,
}

/// One rescue clause of an exception handler. `binding` is a Var cell node
/// typed from the listed exception classes.
#[derive(Debug, Clone, PartialEq)]
pub struct RescueClause {
    pub types: Vec<TypeRef>,
    pub binding: Option<NodeId>,
    pub body: NodeId,
}

/// Items inside a `lib` block. Modeled like class members with fixed,
/// declared types; they do not participate in method inference.
#[derive(Debug, Clone, PartialEq)]
pub enum LibItem {
    Fun {
        name: Symbol,
        params: Vec<TypeRef>,
        ret: Option<TypeRef>,
        span: Span,
    },
    Struct {
        name: Symbol,
        fields: Vec<(Symbol, TypeRef)>,
        span: Span,
    },
    Union {
        name: Symbol,
        fields: Vec<(Symbol, TypeRef)>,
        span: Span,
    },
    Enum {
        name: Symbol,
        members: Vec<Symbol>,
        span: Span,
    },
    Const {
        name: Symbol,
        ty: TypeRef,
        span: Span,
    },
}

/// The closed union of node shapes. The propagation protocol is implemented
/// once over the union (see sema::analyzer::graph), never per variant.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    // Literals
    Nil,
    Bool(bool),
    Int { value: i64, width: IntWidth },
    Float { value: f64, width: FloatWidth },
    Char(char),
    Str(String),
    Sym(Symbol),
    Regex(String),
    Range {
        from: NodeId,
        to: NodeId,
        exclusive: bool,
    },
    ArrayLit {
        elements: Vec<NodeId>,
        of: Option<TypeRef>,
    },
    HashLit {
        entries: Vec<(NodeId, NodeId)>,
        of: Option<(TypeRef, TypeRef)>,
    },

    // Names
    Var { name: Symbol },
    InstanceVar { name: Symbol },
    Global { name: Symbol },
    Const { names: Vec<Symbol>, anchored: bool },
    SelfRef,

    // Structure
    Assign { target: NodeId, value: NodeId },
    Expressions { body: Vec<NodeId> },
    If {
        cond: NodeId,
        then_body: NodeId,
        else_body: Option<NodeId>,
    },
    While { cond: NodeId, body: NodeId },
    And { left: NodeId, right: NodeId },
    Or { left: NodeId, right: NodeId },

    // Calls and blocks
    Call {
        receiver: Option<NodeId>,
        name: Symbol,
        args: Vec<NodeId>,
        block: Option<NodeId>,
        /// Chosen instantiations, one per concrete receiver. Populated by the
        /// call resolver; read by the code generator.
        target_defs: Vec<InstanceId>,
    },
    Block { params: Vec<NodeId>, body: NodeId },
    Yield { args: Vec<NodeId> },

    // Jumps (typeless; they feed return channels)
    Return { value: Option<NodeId> },
    Break { value: Option<NodeId> },
    Next { value: Option<NodeId> },
    Raise { value: NodeId },

    ExceptionHandler {
        body: NodeId,
        rescues: Vec<RescueClause>,
        else_body: Option<NodeId>,
        ensure_body: Option<NodeId>,
    },

    // Declarations
    ClassDef {
        name: Symbol,
        superclass: Option<TypeRef>,
        type_params: Vec<Symbol>,
        is_abstract: bool,
        body: Vec<NodeId>,
    },
    ModuleDef { name: Symbol, body: Vec<NodeId> },
    LibDef { name: Symbol, items: Vec<LibItem> },
    Include { path: TypeRef },
    Def(Box<DefNode>),
    MacroDef(Box<DefNode>),

    // Typed-per-rule constructs
    IsA { receiver: NodeId, test: TypeRef },
    PointerOf { target: NodeId },
    OutArg { var: NodeId },
}

/// One arena slot: the node shape plus its type cell, adjacency lists and
/// the dirty flag used for cycle-safe propagation.
#[derive(Debug, Clone)]
pub struct Node {
    pub kind: NodeKind,
    pub span: Span,
    pub ty: Option<TypeId>,
    pub deps: NodeIdVec,
    pub observers: NodeIdVec,
    pub dirty: bool,
}

/// The node arena. The parser collaborator produces one of these; the
/// inference visitor mutates type cells and edges in place; the code
/// generator reads the result.
#[derive(Debug, Default, Clone)]
pub struct Ast {
    nodes: Vec<Node>,
}

impl Ast {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc(&mut self, kind: NodeKind, span: Span) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node {
            kind,
            span,
            ty: None,
            deps: NodeIdVec::new(),
            observers: NodeIdVec::new(),
            dirty: false,
        });
        id
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0 as usize]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0 as usize]
    }

    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.nodes[id.0 as usize].kind
    }

    pub fn ty(&self, id: NodeId) -> Option<TypeId> {
        self.nodes[id.0 as usize].ty
    }

    pub fn span(&self, id: NodeId) -> Span {
        self.nodes[id.0 as usize].span
    }

    /// Deep-clone a subtree for method instantiation. Cloned nodes get fresh
    /// empty type cells and no edges; call target lists are cleared.
    pub fn clone_subtree(&mut self, root: NodeId) -> NodeId {
        self.clone_with_subst(root, &rustc_hash::FxHashMap::default())
    }

    /// Deep-clone with variable substitution: a `Var` whose name appears in
    /// `subst` is replaced by the mapped node itself (shared, not cloned).
    /// Macro expansion binds macro parameters to unevaluated argument nodes
    /// this way.
    pub fn clone_with_subst(
        &mut self,
        root: NodeId,
        subst: &rustc_hash::FxHashMap<Symbol, NodeId>,
    ) -> NodeId {
        let span = self.span(root);
        let kind = self.node(root).kind.clone();
        let kind = match kind {
            NodeKind::Var { name } => {
                if let Some(&mapped) = subst.get(&name) {
                    return mapped;
                }
                NodeKind::Var { name }
            }
            NodeKind::Range { from, to, exclusive } => NodeKind::Range {
                from: self.clone_with_subst(from, subst),
                to: self.clone_with_subst(to, subst),
                exclusive,
            },
            NodeKind::ArrayLit { elements, of } => NodeKind::ArrayLit {
                elements: elements
                    .into_iter()
                    .map(|e| self.clone_with_subst(e, subst))
                    .collect(),
                of,
            },
            NodeKind::HashLit { entries, of } => NodeKind::HashLit {
                entries: entries
                    .into_iter()
                    .map(|(k, v)| {
                        let k = self.clone_with_subst(k, subst);
                        let v = self.clone_with_subst(v, subst);
                        (k, v)
                    })
                    .collect(),
                of,
            },
            NodeKind::Assign { target, value } => NodeKind::Assign {
                target: self.clone_with_subst(target, subst),
                value: self.clone_with_subst(value, subst),
            },
            NodeKind::Expressions { body } => NodeKind::Expressions {
                body: body
                    .into_iter()
                    .map(|n| self.clone_with_subst(n, subst))
                    .collect(),
            },
            NodeKind::If {
                cond,
                then_body,
                else_body,
            } => NodeKind::If {
                cond: self.clone_with_subst(cond, subst),
                then_body: self.clone_with_subst(then_body, subst),
                else_body: else_body.map(|n| self.clone_with_subst(n, subst)),
            },
            NodeKind::While { cond, body } => NodeKind::While {
                cond: self.clone_with_subst(cond, subst),
                body: self.clone_with_subst(body, subst),
            },
            NodeKind::And { left, right } => NodeKind::And {
                left: self.clone_with_subst(left, subst),
                right: self.clone_with_subst(right, subst),
            },
            NodeKind::Or { left, right } => NodeKind::Or {
                left: self.clone_with_subst(left, subst),
                right: self.clone_with_subst(right, subst),
            },
            NodeKind::Call {
                receiver,
                name,
                args,
                block,
                target_defs: _,
            } => NodeKind::Call {
                receiver: receiver.map(|r| self.clone_with_subst(r, subst)),
                name,
                args: args
                    .into_iter()
                    .map(|a| self.clone_with_subst(a, subst))
                    .collect(),
                block: block.map(|b| self.clone_with_subst(b, subst)),
                target_defs: Vec::new(),
            },
            NodeKind::Block { params, body } => NodeKind::Block {
                params: params
                    .into_iter()
                    .map(|p| self.clone_with_subst(p, subst))
                    .collect(),
                body: self.clone_with_subst(body, subst),
            },
            NodeKind::Yield { args } => NodeKind::Yield {
                args: args
                    .into_iter()
                    .map(|a| self.clone_with_subst(a, subst))
                    .collect(),
            },
            NodeKind::Return { value } => NodeKind::Return {
                value: value.map(|v| self.clone_with_subst(v, subst)),
            },
            NodeKind::Break { value } => NodeKind::Break {
                value: value.map(|v| self.clone_with_subst(v, subst)),
            },
            NodeKind::Next { value } => NodeKind::Next {
                value: value.map(|v| self.clone_with_subst(v, subst)),
            },
            NodeKind::Raise { value } => NodeKind::Raise {
                value: self.clone_with_subst(value, subst),
            },
            NodeKind::ExceptionHandler {
                body,
                rescues,
                else_body,
                ensure_body,
            } => NodeKind::ExceptionHandler {
                body: self.clone_with_subst(body, subst),
                rescues: rescues
                    .into_iter()
                    .map(|r| RescueClause {
                        types: r.types,
                        binding: r.binding.map(|b| self.clone_with_subst(b, subst)),
                        body: self.clone_with_subst(r.body, subst),
                    })
                    .collect(),
                else_body: else_body.map(|n| self.clone_with_subst(n, subst)),
                ensure_body: ensure_body.map(|n| self.clone_with_subst(n, subst)),
            },
            NodeKind::IsA { receiver, test } => NodeKind::IsA {
                receiver: self.clone_with_subst(receiver, subst),
                test,
            },
            NodeKind::PointerOf { target } => NodeKind::PointerOf {
                target: self.clone_with_subst(target, subst),
            },
            NodeKind::OutArg { var } => NodeKind::OutArg {
                var: self.clone_with_subst(var, subst),
            },
            NodeKind::Def(def) => {
                let body = self.clone_with_subst(def.body, subst);
                let params = def
                    .params
                    .iter()
                    .map(|p| ParamDecl {
                        name: p.name,
                        restriction: p.restriction.clone(),
                        default: p.default.map(|d| self.clone_with_subst(d, subst)),
                        span: p.span,
                    })
                    .collect();
                NodeKind::Def(Box::new(DefNode {
                    name: def.name,
                    params,
                    block_param: def.block_param.clone(),
                    return_type: def.return_type.clone(),
                    body,
                }))
            }
            // Declarations, literals and names clone as-is; their children
            // are either absent or not part of the instantiable body shape.
            other => other,
        };
        self.alloc(kind, span)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alloc_assigns_sequential_ids() {
        let mut ast = Ast::new();
        let a = ast.alloc(NodeKind::Nil, Span::default());
        let b = ast.alloc(NodeKind::Bool(true), Span::default());
        assert_eq!(a.index(), 0);
        assert_eq!(b.index(), 1);
        assert_eq!(ast.len(), 2);
    }

    #[test]
    fn clone_subtree_produces_fresh_cells() {
        let mut ast = Ast::new();
        let one = ast.alloc(
            NodeKind::Int {
                value: 1,
                width: IntWidth::I32,
            },
            Span::default(),
        );
        let two = ast.alloc(
            NodeKind::Int {
                value: 2,
                width: IntWidth::I32,
            },
            Span::default(),
        );
        let seq = ast.alloc(
            NodeKind::Expressions {
                body: vec![one, two],
            },
            Span::default(),
        );

        let cloned = ast.clone_subtree(seq);
        assert_ne!(cloned, seq);
        let NodeKind::Expressions { body } = ast.kind(cloned) else {
            panic!("expected expressions");
        };
        assert_eq!(body.len(), 2);
        assert_ne!(body[0], one);
        assert!(ast.ty(cloned).is_none());
        assert!(ast.node(cloned).deps.is_empty());
    }

    #[test]
    fn clone_with_subst_shares_mapped_nodes() {
        let mut ast = Ast::new();
        let mut interner = crate::frontend::Interner::new();
        let x = interner.intern("x");
        let arg = ast.alloc(
            NodeKind::Int {
                value: 7,
                width: IntWidth::I32,
            },
            Span::default(),
        );
        let var = ast.alloc(NodeKind::Var { name: x }, Span::default());
        let seq = ast.alloc(NodeKind::Expressions { body: vec![var] }, Span::default());

        let mut subst = rustc_hash::FxHashMap::default();
        subst.insert(x, arg);
        let cloned = ast.clone_with_subst(seq, &subst);

        let NodeKind::Expressions { body } = ast.kind(cloned) else {
            panic!("expected expressions");
        };
        assert_eq!(body[0], arg, "macro parameter must share the argument node");
    }
}
