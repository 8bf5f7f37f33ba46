// src/sema/scope.rs

use rustc_hash::FxHashMap;

use crate::frontend::{NodeId, Symbol};

/// Lexical scope: variable name -> type cell node. Method instantiations
/// get a fresh scope; blocks chain onto the scope of their call site.
#[derive(Debug, Default)]
pub struct Scope {
    vars: FxHashMap<Symbol, NodeId>,
    parent: Option<Box<Scope>>,
}

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_parent(parent: Scope) -> Self {
        Self {
            vars: FxHashMap::default(),
            parent: Some(Box::new(parent)),
        }
    }

    pub fn define(&mut self, name: Symbol, cell: NodeId) {
        self.vars.insert(name, cell);
    }

    pub fn get(&self, name: Symbol) -> Option<NodeId> {
        self.vars
            .get(&name)
            .copied()
            .or_else(|| self.parent.as_ref().and_then(|p| p.get(name)))
    }

    pub fn into_parent(self) -> Option<Scope> {
        self.parent.map(|b| *b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chained_lookup_prefers_innermost() {
        let a = Symbol(0);
        let b = Symbol(1);
        let mut outer = Scope::new();
        outer.define(a, NodeId::new(0));
        outer.define(b, NodeId::new(1));

        let mut inner = Scope::with_parent(outer);
        inner.define(a, NodeId::new(2));

        assert_eq!(inner.get(a), Some(NodeId::new(2)));
        assert_eq!(inner.get(b), Some(NodeId::new(1)));

        let outer = inner.into_parent().unwrap();
        assert_eq!(outer.get(a), Some(NodeId::new(0)));
    }
}
