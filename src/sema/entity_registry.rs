// src/sema/entity_registry.rs
//
// Central registry for all language entities: class descriptors, method
// definitions, macros, and method instantiations. IDs are indices into
// Vec-backed storage; lookups go through per-class maps.

use rustc_hash::FxHashMap;

use crate::frontend::{NodeId, Symbol};
use crate::sema::entity_defs::{ClassDef, ClassKind, MacroDef, MethodDef, MethodInstance};
use crate::sema::type_arena::TypeId;

/// Identity for a class descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClassId(u32);

impl ClassId {
    pub fn new(index: u32) -> Self {
        Self(index)
    }

    pub fn index(self) -> u32 {
        self.0
    }
}

/// Identity for a method definition (always has an owner class)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MethodId(u32);

impl MethodId {
    pub fn new(index: u32) -> Self {
        Self(index)
    }

    pub fn index(self) -> u32 {
        self.0
    }
}

/// Identity for a macro definition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MacroId(u32);

impl MacroId {
    pub fn new(index: u32) -> Self {
        Self(index)
    }

    pub fn index(self) -> u32 {
        self.0
    }
}

/// Identity for a method instantiation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InstanceId(u32);

impl InstanceId {
    pub fn new(index: u32) -> Self {
        Self(index)
    }

    pub fn index(self) -> u32 {
        self.0
    }
}

/// What a qualified constant path resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstTarget {
    Class(ClassId),
    Cell(NodeId),
}

/// Central registry: the root program scope, every nested class/module/lib
/// scope, constants and globals as named cells, and the instantiation store.
#[derive(Debug, Clone)]
pub struct EntityRegistry {
    classes: Vec<ClassDef>,
    methods: Vec<MethodDef>,
    macros: Vec<MacroDef>,
    instances: Vec<MethodInstance>,
    /// The root "program" scope hosting top-level methods and types
    pub root: ClassId,
    /// Global variables as named cells
    pub globals: FxHashMap<Symbol, NodeId>,
    /// Instance-variable tables for generic instantiations, keyed by the
    /// interned generic self type
    pub generic_ivars: FxHashMap<TypeId, FxHashMap<Symbol, NodeId>>,
    /// Memoized result cells for `new` per constructed object type
    pub new_cells: FxHashMap<TypeId, NodeId>,
}

impl EntityRegistry {
    /// Create a registry whose root scope carries the given name.
    pub fn new(root_name: Symbol) -> Self {
        let root = ClassId(0);
        let root_def = ClassDef::new(root, root_name, ClassKind::Module);
        Self {
            classes: vec![root_def],
            methods: Vec::new(),
            macros: Vec::new(),
            instances: Vec::new(),
            root,
            globals: FxHashMap::default(),
            generic_ivars: FxHashMap::default(),
            new_cells: FxHashMap::default(),
        }
    }

    // ------------------------------------------------------------------
    // Classes
    // ------------------------------------------------------------------

    /// Register a new class/module/lib scope nested in `parent_scope`.
    pub fn register_class(
        &mut self,
        name: Symbol,
        kind: ClassKind,
        parent_scope: ClassId,
    ) -> ClassId {
        let id = ClassId(self.classes.len() as u32);
        let mut def = ClassDef::new(id, name, kind);
        def.parent_scope = Some(parent_scope);
        self.classes.push(def);
        self.classes[parent_scope.0 as usize].types.insert(name, id);
        id
    }

    pub fn class(&self, id: ClassId) -> &ClassDef {
        &self.classes[id.0 as usize]
    }

    pub fn class_mut(&mut self, id: ClassId) -> &mut ClassDef {
        &mut self.classes[id.0 as usize]
    }

    pub fn classes(&self) -> impl Iterator<Item = &ClassDef> {
        self.classes.iter()
    }

    /// Record `sub` as a direct subclass of `superclass` and set the back
    /// link. A class with recorded subclasses is "open" for hierarchy
    /// collapse.
    pub fn set_superclass(&mut self, sub: ClassId, superclass: ClassId) {
        self.classes[sub.0 as usize].superclass = Some(superclass);
        let subs = &mut self.classes[superclass.0 as usize].subclasses;
        if !subs.contains(&sub) {
            subs.push(sub);
        }
    }

    /// Look up a name in a scope's nested types, walking the lexical chain
    /// outward to the root.
    pub fn lookup_type(&self, scope: ClassId, name: Symbol) -> Option<ClassId> {
        let mut current = Some(scope);
        while let Some(c) = current {
            let def = self.class(c);
            if let Some(&found) = def.types.get(&name) {
                return Some(found);
            }
            current = def.parent_scope;
        }
        None
    }

    /// Resolve a qualified path (`Foo::Bar`). A leading `::` anchors the
    /// first segment at the root scope.
    pub fn resolve_path(&self, scope: ClassId, names: &[Symbol], anchored: bool) -> Option<ClassId> {
        let (first, rest) = names.split_first()?;
        let mut current = if anchored {
            *self.class(self.root).types.get(first)?
        } else {
            self.lookup_type(scope, *first)?
        };
        for name in rest {
            current = *self.class(current).types.get(name)?;
        }
        Some(current)
    }

    /// Resolve a qualified constant path to either a class or a constant
    /// cell. The last segment checks nested types first, then constants.
    pub fn resolve_const(
        &self,
        scope: ClassId,
        names: &[Symbol],
        anchored: bool,
    ) -> Option<ConstTarget> {
        let (last, init) = names.split_last()?;
        let holder = if init.is_empty() {
            // Single segment: walk the lexical chain looking for either kind
            if anchored {
                self.root
            } else {
                let mut current = Some(scope);
                while let Some(c) = current {
                    let def = self.class(c);
                    if let Some(&found) = def.types.get(last) {
                        return Some(ConstTarget::Class(found));
                    }
                    if let Some(&cell) = def.constants.get(last) {
                        return Some(ConstTarget::Cell(cell));
                    }
                    current = def.parent_scope;
                }
                return None;
            }
        } else {
            self.resolve_path(scope, init, anchored)?
        };
        let def = self.class(holder);
        if let Some(&found) = def.types.get(last) {
            return Some(ConstTarget::Class(found));
        }
        if let Some(&cell) = def.constants.get(last) {
            return Some(ConstTarget::Cell(cell));
        }
        None
    }

    // ------------------------------------------------------------------
    // Ancestry
    // ------------------------------------------------------------------

    /// The superclass chain starting at (and including) `class`.
    pub fn superclass_chain(&self, class: ClassId) -> Vec<ClassId> {
        let mut chain = vec![class];
        let mut current = self.class(class).superclass;
        while let Some(c) = current {
            chain.push(c);
            current = self.class(c).superclass;
        }
        chain
    }

    /// Whether `d` is `c` or has `c` in its ancestor chain (superclasses
    /// and included modules).
    pub fn has_ancestor(&self, d: ClassId, c: ClassId) -> bool {
        if d == c {
            return true;
        }
        let def = self.class(d);
        for &inc in &def.includes {
            if self.has_ancestor(inc, c) {
                return true;
            }
        }
        match def.superclass {
            Some(s) => self.has_ancestor(s, c),
            None => false,
        }
    }

    /// The concrete members of `Hierarchy(class)`: the class itself when
    /// concrete, plus every transitive concrete subclass. Abstract classes
    /// are traversed but not included.
    pub fn concrete_descendants(&self, class: ClassId) -> Vec<ClassId> {
        let mut out = Vec::new();
        self.collect_concrete(class, &mut out);
        out
    }

    fn collect_concrete(&self, class: ClassId, out: &mut Vec<ClassId>) {
        let def = self.class(class);
        if !def.is_abstract {
            out.push(class);
        }
        for &sub in &def.subclasses {
            self.collect_concrete(sub, out);
        }
    }

    // ------------------------------------------------------------------
    // Methods, macros, instantiations
    // ------------------------------------------------------------------

    /// Register a method definition, appending it to its owner's overloads.
    pub fn add_method(&mut self, mut def: MethodDef) -> MethodId {
        let id = MethodId(self.methods.len() as u32);
        def.id = id;
        let owner = def.owner;
        let name = def.name;
        self.methods.push(def);
        self.classes[owner.0 as usize]
            .methods
            .entry(name)
            .or_default()
            .push(id);
        id
    }

    pub fn method(&self, id: MethodId) -> &MethodDef {
        &self.methods[id.0 as usize]
    }

    pub fn method_mut(&mut self, id: MethodId) -> &mut MethodDef {
        &mut self.methods[id.0 as usize]
    }

    /// Find the overload set for `name` on `class`: the nearest level of
    /// the ancestor chain (the class itself, then its included modules,
    /// then upward) that defines the name wins.
    pub fn lookup_methods(&self, class: ClassId, name: Symbol) -> Vec<MethodId> {
        let mut current = Some(class);
        while let Some(c) = current {
            let def = self.class(c);
            if let Some(ids) = def.methods.get(&name) {
                return ids.clone();
            }
            for &inc in def.includes.iter().rev() {
                if let Some(ids) = self.class(inc).methods.get(&name) {
                    return ids.clone();
                }
            }
            current = def.superclass;
        }
        Vec::new()
    }

    pub fn add_macro(&mut self, mut def: MacroDef) -> MacroId {
        let id = MacroId(self.macros.len() as u32);
        def.id = id;
        let owner = def.owner;
        let name = def.name;
        self.macros.push(def);
        self.classes[owner.0 as usize].macros.insert(name, id);
        id
    }

    pub fn macro_def(&self, id: MacroId) -> &MacroDef {
        &self.macros[id.0 as usize]
    }

    /// Find a macro by name on the ancestor chain of `class`.
    pub fn lookup_macro(&self, class: ClassId, name: Symbol) -> Option<MacroId> {
        let mut current = Some(class);
        while let Some(c) = current {
            let def = self.class(c);
            if let Some(&id) = def.macros.get(&name) {
                return Some(id);
            }
            for &inc in def.includes.iter().rev() {
                if let Some(&id) = self.class(inc).macros.get(&name) {
                    return Some(id);
                }
            }
            current = def.superclass;
        }
        None
    }

    pub fn add_instance(&mut self, mut instance: MethodInstance) -> InstanceId {
        let id = InstanceId(self.instances.len() as u32);
        instance.id = id;
        self.instances.push(instance);
        id
    }

    pub fn instance(&self, id: InstanceId) -> &MethodInstance {
        &self.instances[id.0 as usize]
    }

    pub fn instance_mut(&mut self, id: InstanceId) -> &mut MethodInstance {
        &mut self.instances[id.0 as usize]
    }

    pub fn instances(&self) -> impl Iterator<Item = &MethodInstance> {
        self.instances.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::Interner;

    fn registry_with(names: &mut Interner) -> EntityRegistry {
        EntityRegistry::new(names.intern("main"))
    }

    #[test]
    fn register_and_resolve_nested_path() {
        let mut names = Interner::new();
        let mut registry = registry_with(&mut names);
        let foo = names.intern("Foo");
        let bar = names.intern("Bar");

        let root = registry.root;
        let foo_id = registry.register_class(foo, ClassKind::Module, root);
        let bar_id = registry.register_class(bar, ClassKind::Class, foo_id);

        assert_eq!(registry.resolve_path(root, &[foo, bar], false), Some(bar_id));
        // Inside Foo, a bare `Bar` resolves lexically
        assert_eq!(registry.resolve_path(bar_id, &[bar], false), Some(bar_id));
        // Anchored lookup skips the lexical chain
        assert_eq!(registry.resolve_path(bar_id, &[bar], true), None);
        assert_eq!(
            registry.resolve_path(bar_id, &[foo, bar], true),
            Some(bar_id)
        );
    }

    #[test]
    fn subclass_links_and_concrete_descendants() {
        let mut names = Interner::new();
        let mut registry = registry_with(&mut names);
        let root = registry.root;
        let a = registry.register_class(names.intern("A"), ClassKind::Class, root);
        let b = registry.register_class(names.intern("B"), ClassKind::Class, root);
        let c = registry.register_class(names.intern("C"), ClassKind::Class, root);
        registry.set_superclass(b, a);
        registry.set_superclass(c, b);
        registry.class_mut(b).is_abstract = true;

        assert!(registry.has_ancestor(c, a));
        assert!(!registry.has_ancestor(a, c));
        assert_eq!(registry.concrete_descendants(a), vec![a, c]);
        assert_eq!(registry.superclass_chain(c), vec![c, b, a]);
    }

    #[test]
    fn method_lookup_walks_ancestors() {
        let mut names = Interner::new();
        let mut registry = registry_with(&mut names);
        let root = registry.root;
        let a = registry.register_class(names.intern("A"), ClassKind::Class, root);
        let b = registry.register_class(names.intern("B"), ClassKind::Class, root);
        registry.set_superclass(b, a);

        let m = names.intern("m");
        let def = MethodDef {
            id: MethodId::new(0),
            name: m,
            owner: a,
            params: Vec::new(),
            block_param: None,
            return_type: None,
            body: crate::sema::entity_defs::MethodBody::Primitive(
                crate::sema::entity_defs::PrimitiveRet::SelfType,
            ),
            span: crate::frontend::Span::default(),
            instances: FxHashMap::default(),
        };
        let id = registry.add_method(def);

        assert_eq!(registry.lookup_methods(b, m), vec![id]);
        assert_eq!(registry.lookup_methods(a, m), vec![id]);
        assert!(registry.lookup_methods(a, names.intern("other")).is_empty());
    }
}
