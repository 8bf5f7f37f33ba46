// src/frontend/dsl.rs
//
// Construction DSL over the node arena. The parser collaborator produces
// the same shapes from source text; tests and fixtures build them directly
// (`b.int(1)`, `b.var("a")`, `b.call(...)`). Sugar the parser lowers before
// inference (`unless`, `case`) is lowered here the same way.

use crate::frontend::ast::{
    Ast, BlockParamDecl, DefNode, FloatWidth, IntWidth, LibItem, NodeId, NodeKind, ParamDecl,
    RescueClause, TypeRef,
};
use crate::frontend::intern::{Interner, Symbol};
use crate::frontend::Span;

pub struct AstBuilder<'a> {
    pub ast: &'a mut Ast,
    pub interner: &'a mut Interner,
}

impl<'a> AstBuilder<'a> {
    pub fn new(ast: &'a mut Ast, interner: &'a mut Interner) -> Self {
        Self { ast, interner }
    }

    fn node(&mut self, kind: NodeKind) -> NodeId {
        self.ast.alloc(kind, Span::default())
    }

    pub fn sym_of(&mut self, name: &str) -> Symbol {
        self.interner.intern(name)
    }

    // ------------------------------------------------------------------
    // Literals
    // ------------------------------------------------------------------

    pub fn nil(&mut self) -> NodeId {
        self.node(NodeKind::Nil)
    }

    pub fn bool_(&mut self, value: bool) -> NodeId {
        self.node(NodeKind::Bool(value))
    }

    pub fn int(&mut self, value: i64) -> NodeId {
        self.node(NodeKind::Int {
            value,
            width: IntWidth::I32,
        })
    }

    pub fn int_with(&mut self, value: i64, width: IntWidth) -> NodeId {
        self.node(NodeKind::Int { value, width })
    }

    pub fn float(&mut self, value: f64) -> NodeId {
        self.node(NodeKind::Float {
            value,
            width: FloatWidth::F64,
        })
    }

    pub fn float_with(&mut self, value: f64, width: FloatWidth) -> NodeId {
        self.node(NodeKind::Float { value, width })
    }

    pub fn char_(&mut self, value: char) -> NodeId {
        self.node(NodeKind::Char(value))
    }

    pub fn str_(&mut self, value: &str) -> NodeId {
        self.node(NodeKind::Str(value.to_string()))
    }

    pub fn sym(&mut self, name: &str) -> NodeId {
        let s = self.sym_of(name);
        self.node(NodeKind::Sym(s))
    }

    pub fn regex(&mut self, source: &str) -> NodeId {
        self.node(NodeKind::Regex(source.to_string()))
    }

    pub fn range(&mut self, from: NodeId, to: NodeId, exclusive: bool) -> NodeId {
        self.node(NodeKind::Range {
            from,
            to,
            exclusive,
        })
    }

    pub fn array(&mut self, elements: Vec<NodeId>) -> NodeId {
        self.node(NodeKind::ArrayLit {
            elements,
            of: None,
        })
    }

    pub fn array_of(&mut self, elements: Vec<NodeId>, of: TypeRef) -> NodeId {
        self.node(NodeKind::ArrayLit {
            elements,
            of: Some(of),
        })
    }

    pub fn hash(&mut self, entries: Vec<(NodeId, NodeId)>) -> NodeId {
        self.node(NodeKind::HashLit { entries, of: None })
    }

    pub fn hash_of(
        &mut self,
        entries: Vec<(NodeId, NodeId)>,
        key: TypeRef,
        value: TypeRef,
    ) -> NodeId {
        self.node(NodeKind::HashLit {
            entries,
            of: Some((key, value)),
        })
    }

    // ------------------------------------------------------------------
    // Names
    // ------------------------------------------------------------------

    pub fn var(&mut self, name: &str) -> NodeId {
        let name = self.sym_of(name);
        self.node(NodeKind::Var { name })
    }

    pub fn ivar(&mut self, name: &str) -> NodeId {
        let name = self.sym_of(name);
        self.node(NodeKind::InstanceVar { name })
    }

    pub fn global(&mut self, name: &str) -> NodeId {
        let name = self.sym_of(name);
        self.node(NodeKind::Global { name })
    }

    pub fn self_(&mut self) -> NodeId {
        self.node(NodeKind::SelfRef)
    }

    pub fn const_(&mut self, path: &[&str]) -> NodeId {
        let names = path.iter().map(|n| self.sym_of(n)).collect();
        self.node(NodeKind::Const {
            names,
            anchored: false,
        })
    }

    pub fn const_anchored(&mut self, path: &[&str]) -> NodeId {
        let names = path.iter().map(|n| self.sym_of(n)).collect();
        self.node(NodeKind::Const {
            names,
            anchored: true,
        })
    }

    // ------------------------------------------------------------------
    // Structure
    // ------------------------------------------------------------------

    pub fn assign(&mut self, target: NodeId, value: NodeId) -> NodeId {
        self.node(NodeKind::Assign { target, value })
    }

    pub fn exprs(&mut self, body: Vec<NodeId>) -> NodeId {
        self.node(NodeKind::Expressions { body })
    }

    pub fn if_(&mut self, cond: NodeId, then_body: NodeId, else_body: Option<NodeId>) -> NodeId {
        self.node(NodeKind::If {
            cond,
            then_body,
            else_body,
        })
    }

    /// `unless` lowers to `if` with swapped branches, the way the parser
    /// desugars it.
    pub fn unless_(
        &mut self,
        cond: NodeId,
        then_body: NodeId,
        else_body: Option<NodeId>,
    ) -> NodeId {
        let swapped_then = else_body.unwrap_or_else(|| self.nil());
        self.node(NodeKind::If {
            cond,
            then_body: swapped_then,
            else_body: Some(then_body),
        })
    }

    pub fn while_(&mut self, cond: NodeId, body: NodeId) -> NodeId {
        self.node(NodeKind::While { cond, body })
    }

    pub fn and_(&mut self, left: NodeId, right: NodeId) -> NodeId {
        self.node(NodeKind::And { left, right })
    }

    pub fn or_(&mut self, left: NodeId, right: NodeId) -> NodeId {
        self.node(NodeKind::Or { left, right })
    }

    // ------------------------------------------------------------------
    // Calls
    // ------------------------------------------------------------------

    pub fn call(&mut self, receiver: Option<NodeId>, name: &str, args: Vec<NodeId>) -> NodeId {
        let name = self.sym_of(name);
        self.node(NodeKind::Call {
            receiver,
            name,
            args,
            block: None,
            target_defs: Vec::new(),
        })
    }

    /// A call carrying a literal block: `recv.name(args) { |params| body }`
    pub fn call_with_block(
        &mut self,
        receiver: Option<NodeId>,
        name: &str,
        args: Vec<NodeId>,
        params: &[&str],
        body: NodeId,
    ) -> NodeId {
        let params = params.iter().map(|p| self.var(p)).collect();
        let block = self.node(NodeKind::Block { params, body });
        let name = self.sym_of(name);
        self.node(NodeKind::Call {
            receiver,
            name,
            args,
            block: Some(block),
            target_defs: Vec::new(),
        })
    }

    pub fn yield_(&mut self, args: Vec<NodeId>) -> NodeId {
        self.node(NodeKind::Yield { args })
    }

    // ------------------------------------------------------------------
    // Jumps and handlers
    // ------------------------------------------------------------------

    pub fn ret(&mut self, value: Option<NodeId>) -> NodeId {
        self.node(NodeKind::Return { value })
    }

    pub fn brk(&mut self, value: Option<NodeId>) -> NodeId {
        self.node(NodeKind::Break { value })
    }

    pub fn next_(&mut self, value: Option<NodeId>) -> NodeId {
        self.node(NodeKind::Next { value })
    }

    pub fn raise_(&mut self, value: NodeId) -> NodeId {
        self.node(NodeKind::Raise { value })
    }

    pub fn rescue_(
        &mut self,
        types: Vec<TypeRef>,
        binding: Option<&str>,
        body: NodeId,
    ) -> RescueClause {
        let binding = binding.map(|name| self.var(name));
        RescueClause {
            types,
            binding,
            body,
        }
    }

    pub fn begin_(
        &mut self,
        body: NodeId,
        rescues: Vec<RescueClause>,
        else_body: Option<NodeId>,
        ensure_body: Option<NodeId>,
    ) -> NodeId {
        self.node(NodeKind::ExceptionHandler {
            body,
            rescues,
            else_body,
            ensure_body,
        })
    }

    // ------------------------------------------------------------------
    // Declarations
    // ------------------------------------------------------------------

    pub fn param(&mut self, name: &str) -> ParamDecl {
        ParamDecl {
            name: self.sym_of(name),
            restriction: None,
            default: None,
            span: Span::default(),
        }
    }

    pub fn param_r(&mut self, name: &str, restriction: TypeRef) -> ParamDecl {
        ParamDecl {
            name: self.sym_of(name),
            restriction: Some(restriction),
            default: None,
            span: Span::default(),
        }
    }

    pub fn param_d(&mut self, name: &str, default: NodeId) -> ParamDecl {
        ParamDecl {
            name: self.sym_of(name),
            restriction: None,
            default: Some(default),
            span: Span::default(),
        }
    }

    pub fn def_(&mut self, name: &str, params: Vec<ParamDecl>, body: NodeId) -> NodeId {
        let name = self.sym_of(name);
        self.node(NodeKind::Def(Box::new(DefNode {
            name,
            params,
            block_param: None,
            return_type: None,
            body,
        })))
    }

    pub fn def_ret(
        &mut self,
        name: &str,
        params: Vec<ParamDecl>,
        return_type: TypeRef,
        body: NodeId,
    ) -> NodeId {
        let name = self.sym_of(name);
        self.node(NodeKind::Def(Box::new(DefNode {
            name,
            params,
            block_param: None,
            return_type: Some(return_type),
            body,
        })))
    }

    pub fn def_block(
        &mut self,
        name: &str,
        params: Vec<ParamDecl>,
        block_name: &str,
        fn_type: Option<TypeRef>,
        body: NodeId,
    ) -> NodeId {
        let block_param = Some(BlockParamDecl {
            name: self.sym_of(block_name),
            fn_type,
        });
        let name = self.sym_of(name);
        self.node(NodeKind::Def(Box::new(DefNode {
            name,
            params,
            block_param,
            return_type: None,
            body,
        })))
    }

    pub fn macro_(&mut self, name: &str, params: Vec<ParamDecl>, body: NodeId) -> NodeId {
        let name = self.sym_of(name);
        self.node(NodeKind::MacroDef(Box::new(DefNode {
            name,
            params,
            block_param: None,
            return_type: None,
            body,
        })))
    }

    pub fn class_(&mut self, name: &str, body: Vec<NodeId>) -> NodeId {
        let name = self.sym_of(name);
        self.node(NodeKind::ClassDef {
            name,
            superclass: None,
            type_params: Vec::new(),
            is_abstract: false,
            body,
        })
    }

    pub fn class_sup(&mut self, name: &str, superclass: &str, body: Vec<NodeId>) -> NodeId {
        let superclass = self.tref(superclass);
        let name = self.sym_of(name);
        self.node(NodeKind::ClassDef {
            name,
            superclass: Some(superclass),
            type_params: Vec::new(),
            is_abstract: false,
            body,
        })
    }

    pub fn abstract_class(
        &mut self,
        name: &str,
        superclass: Option<&str>,
        body: Vec<NodeId>,
    ) -> NodeId {
        let superclass = superclass.map(|s| self.tref(s));
        let name = self.sym_of(name);
        self.node(NodeKind::ClassDef {
            name,
            superclass,
            type_params: Vec::new(),
            is_abstract: true,
            body,
        })
    }

    pub fn generic_class(&mut self, name: &str, type_params: &[&str], body: Vec<NodeId>) -> NodeId {
        let type_params = type_params.iter().map(|p| self.sym_of(p)).collect();
        let name = self.sym_of(name);
        self.node(NodeKind::ClassDef {
            name,
            superclass: None,
            type_params,
            is_abstract: false,
            body,
        })
    }

    pub fn module_(&mut self, name: &str, body: Vec<NodeId>) -> NodeId {
        let name = self.sym_of(name);
        self.node(NodeKind::ModuleDef { name, body })
    }

    pub fn include_(&mut self, path: &str) -> NodeId {
        let path = self.tref(path);
        self.node(NodeKind::Include { path })
    }

    pub fn lib_(&mut self, name: &str, items: Vec<LibItem>) -> NodeId {
        let name = self.sym_of(name);
        self.node(NodeKind::LibDef { name, items })
    }

    pub fn lib_fun(&mut self, name: &str, params: Vec<TypeRef>, ret: Option<TypeRef>) -> LibItem {
        LibItem::Fun {
            name: self.sym_of(name),
            params,
            ret,
            span: Span::default(),
        }
    }

    pub fn lib_struct(&mut self, name: &str, fields: Vec<(&str, TypeRef)>) -> LibItem {
        let fields = fields
            .into_iter()
            .map(|(n, t)| (self.sym_of(n), t))
            .collect();
        LibItem::Struct {
            name: self.sym_of(name),
            fields,
            span: Span::default(),
        }
    }

    pub fn lib_enum(&mut self, name: &str, members: &[&str]) -> LibItem {
        let members = members.iter().map(|m| self.sym_of(m)).collect();
        LibItem::Enum {
            name: self.sym_of(name),
            members,
            span: Span::default(),
        }
    }

    pub fn lib_const(&mut self, name: &str, ty: TypeRef) -> LibItem {
        LibItem::Const {
            name: self.sym_of(name),
            ty,
            span: Span::default(),
        }
    }

    // ------------------------------------------------------------------
    // Typed-per-rule constructs
    // ------------------------------------------------------------------

    pub fn isa(&mut self, receiver: NodeId, test: TypeRef) -> NodeId {
        self.node(NodeKind::IsA { receiver, test })
    }

    pub fn pointerof(&mut self, target: NodeId) -> NodeId {
        self.node(NodeKind::PointerOf { target })
    }

    pub fn out(&mut self, var_name: &str) -> NodeId {
        let var = self.var(var_name);
        self.node(NodeKind::OutArg { var })
    }

    // ------------------------------------------------------------------
    // Type annotations
    // ------------------------------------------------------------------

    pub fn tref(&mut self, name: &str) -> TypeRef {
        TypeRef::Path {
            names: vec![self.sym_of(name)],
            anchored: false,
            args: Vec::new(),
            span: Span::default(),
        }
    }

    pub fn tref_path(&mut self, path: &[&str], anchored: bool) -> TypeRef {
        TypeRef::Path {
            names: path.iter().map(|n| self.sym_of(n)).collect(),
            anchored,
            args: Vec::new(),
            span: Span::default(),
        }
    }

    pub fn tref_generic(&mut self, name: &str, args: Vec<TypeRef>) -> TypeRef {
        TypeRef::Path {
            names: vec![self.sym_of(name)],
            anchored: false,
            args,
            span: Span::default(),
        }
    }

    pub fn tref_union(&mut self, parts: Vec<TypeRef>) -> TypeRef {
        TypeRef::Union {
            parts,
            span: Span::default(),
        }
    }

    pub fn tref_self(&mut self) -> TypeRef {
        TypeRef::SelfType {
            span: Span::default(),
        }
    }

    pub fn tref_fun(&mut self, params: Vec<TypeRef>, ret: Option<TypeRef>) -> TypeRef {
        TypeRef::Fun {
            params,
            ret: ret.map(Box::new),
            span: Span::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_literal_nodes() {
        let mut ast = Ast::new();
        let mut interner = Interner::new();
        let mut b = AstBuilder::new(&mut ast, &mut interner);

        let one = b.int(1);
        let c = b.char_('c');
        let or = b.or_(one, c);
        let a = b.var("a");
        let assign = b.assign(a, or);

        assert!(matches!(
            ast.kind(assign),
            NodeKind::Assign { .. }
        ));
        assert!(matches!(ast.kind(or), NodeKind::Or { .. }));
        assert_eq!(ast.len(), 5);
    }

    #[test]
    fn unless_lowers_to_if_with_swapped_branches() {
        let mut ast = Ast::new();
        let mut interner = Interner::new();
        let mut b = AstBuilder::new(&mut ast, &mut interner);

        let cond = b.bool_(true);
        let then_body = b.int(1);
        let lowered = b.unless_(cond, then_body, None);

        let NodeKind::If {
            then_body: t,
            else_body,
            ..
        } = ast.kind(lowered)
        else {
            panic!("expected if");
        };
        assert!(matches!(ast.kind(*t), NodeKind::Nil));
        assert_eq!(*else_body, Some(then_body));
    }
}
