// src/sema/analyzer/graph.rs
//
// The propagation core. Every node supports the same five operations:
// bind, update, propagate, set_type and raise (the error constructors in
// mod.rs). Types only widen, the lattice is finite, and the dirty flag
// keeps cyclic observer graphs from re-entering a node mid-notification,
// so propagation always reaches a fixpoint.

use crate::errors::InferResult;
use crate::frontend::{NodeId, NodeKind};
use crate::sema::analyzer::Analyzer;
use crate::sema::type_arena::TypeId;

impl Analyzer {
    /// Register `observer` on `source` without a value edge. Call nodes
    /// observe their receiver and arguments this way: a widening there
    /// re-runs resolution instead of merging.
    pub(crate) fn add_observer(&mut self, source: NodeId, observer: NodeId) {
        let obs = &mut self.ast.node_mut(source).observers;
        if !obs.contains(&observer) {
            obs.push(observer);
        }
    }

    /// Add `source` to `node`'s dependencies and `node` to `source`'s
    /// observers. If the source already has a type, adopt it (first
    /// dependency) or merge it in, then propagate any change. Re-binding an
    /// existing edge is a no-op, so replaying inference is stable.
    pub(crate) fn bind(&mut self, node: NodeId, source: NodeId) -> InferResult<()> {
        if node == source || self.ast.node(node).deps.contains(&source) {
            return Ok(());
        }
        self.ast.node_mut(node).deps.push(source);
        self.add_observer(source, node);

        let Some(src_ty) = self.ast.ty(source) else {
            return Ok(());
        };
        let cur = self.ast.ty(node);
        let new_ty = self.widened(node, cur, src_ty);
        if cur != Some(new_ty) {
            self.ast.node_mut(node).ty = Some(new_ty);
            self.ast.node_mut(node).dirty = true;
            self.propagate(node)?;
        }
        Ok(())
    }

    /// Called on an observer when `from`'s type changed. Value dependencies
    /// adopt or merge; a call observing an argument or receiver re-runs
    /// resolution instead.
    pub(crate) fn update(&mut self, node: NodeId, from: NodeId) -> InferResult<()> {
        if !self.ast.node(node).deps.contains(&from) {
            if matches!(self.ast.kind(node), NodeKind::Call { .. }) {
                return self.recalculate_call(node);
            }
            return Ok(());
        }
        let Some(from_ty) = self.ast.ty(from) else {
            return Ok(());
        };
        let cur = self.ast.ty(node);
        let new_ty = self.widened(node, cur, from_ty);
        if cur != Some(new_ty) {
            self.ast.node_mut(node).ty = Some(new_ty);
            self.ast.node_mut(node).dirty = true;
        }
        Ok(())
    }

    /// Two-phase notification: update every observer, then propagate each.
    /// Observers never see a partially-updated neighborhood, and the dirty
    /// flag absorbs cycles.
    pub(crate) fn propagate(&mut self, node: NodeId) -> InferResult<()> {
        if !self.ast.node(node).dirty {
            return Ok(());
        }
        self.ast.node_mut(node).dirty = false;
        let observers: Vec<NodeId> = self.ast.node(node).observers.to_vec();
        for &o in &observers {
            self.update(o, node)?;
        }
        for &o in &observers {
            self.propagate(o)?;
        }
        Ok(())
    }

    /// Write a node's cell directly (literals, primitive returns, rescue
    /// bindings). Observers are notified only when the value changes by
    /// identity.
    pub(crate) fn set_type(&mut self, node: NodeId, ty: TypeId) -> InferResult<()> {
        if self.ast.ty(node) == Some(ty) {
            return Ok(());
        }
        self.ast.node_mut(node).ty = Some(ty);
        self.ast.node_mut(node).dirty = true;
        self.propagate(node)
    }

    /// The recompute rule shared by bind and update: adopt when this is the
    /// only dependency or the cell is empty, merge otherwise. Monotone
    /// because incoming types only widen.
    fn widened(&mut self, node: NodeId, cur: Option<TypeId>, incoming: TypeId) -> TypeId {
        match cur {
            None => incoming,
            Some(_) if self.ast.node(node).deps.len() <= 1 => incoming,
            Some(c) => self.merge_types(&[c, incoming]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::{Ast, Interner, Span};

    fn analyzer() -> Analyzer {
        Analyzer::new(Ast::new(), Interner::new())
    }

    fn cell(a: &mut Analyzer, name: &str) -> NodeId {
        let sym = a.interner.intern(name);
        a.ast.alloc(NodeKind::Var { name: sym }, Span::default())
    }

    #[test]
    fn bind_adopts_then_merges() {
        let mut a = analyzer();
        let x = cell(&mut a, "x");
        let one = cell(&mut a, "one");
        let chr = cell(&mut a, "chr");
        let i32t = a.types.primitives.i32;
        let chart = a.types.primitives.char;

        a.set_type(one, i32t).unwrap();
        a.set_type(chr, chart).unwrap();

        a.bind(x, one).unwrap();
        assert_eq!(a.ast.ty(x), Some(i32t));

        a.bind(x, chr).unwrap();
        let union = a.ast.ty(x).unwrap();
        let members = a.types.as_union(union).unwrap().to_vec();
        assert!(members.contains(&i32t) && members.contains(&chart));
    }

    #[test]
    fn widening_reaches_transitive_observers() {
        let mut a = analyzer();
        let src = cell(&mut a, "src");
        let mid = cell(&mut a, "mid");
        let dst = cell(&mut a, "dst");
        a.bind(mid, src).unwrap();
        a.bind(dst, mid).unwrap();

        let i32t = a.types.primitives.i32;
        a.set_type(src, i32t).unwrap();
        assert_eq!(a.ast.ty(dst), Some(i32t));

        // Widen the source through a second dependency
        let extra = cell(&mut a, "extra");
        let chart = a.types.primitives.char;
        a.set_type(extra, chart).unwrap();
        a.bind(mid, extra).unwrap();

        let expect = a.merge_types(&[i32t, chart]);
        assert_eq!(a.ast.ty(mid), Some(expect));
        assert_eq!(a.ast.ty(dst), Some(expect));
    }

    #[test]
    fn cyclic_binding_terminates_at_fixpoint() {
        let mut a = analyzer();
        let x = cell(&mut a, "x");
        let y = cell(&mut a, "y");
        a.bind(x, y).unwrap();
        a.bind(y, x).unwrap();

        let i32t = a.types.primitives.i32;
        let seed = cell(&mut a, "seed");
        a.set_type(seed, i32t).unwrap();
        a.bind(x, seed).unwrap();

        assert_eq!(a.ast.ty(x), Some(i32t));
        assert_eq!(a.ast.ty(y), Some(i32t));
    }

    #[test]
    fn rebinding_is_idempotent() {
        let mut a = analyzer();
        let x = cell(&mut a, "x");
        let src = cell(&mut a, "src");
        let i32t = a.types.primitives.i32;
        a.set_type(src, i32t).unwrap();
        a.bind(x, src).unwrap();
        a.bind(x, src).unwrap();
        assert_eq!(a.ast.node(x).deps.len(), 1);
        assert_eq!(a.ast.node(src).observers.len(), 1);
        assert_eq!(a.ast.ty(x), Some(i32t));
    }
}
