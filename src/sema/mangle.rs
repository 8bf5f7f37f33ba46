// src/sema/mangle.rs
//
// Deterministic mangled identifiers for types and method instantiations.
// The code generator and the instantiation cache both consume these, so
// they must be stable across runs: no counters, no hash values, only the
// canonical structure of the types involved.

use crate::frontend::Interner;
use crate::sema::entity_registry::EntityRegistry;
use crate::sema::type_arena::{InternedType, TypeArena, TypeId};

/// Stable mangled identifier for a type, used in function and struct names
/// emitted to the IR.
pub fn llvm_name(
    types: &TypeArena,
    registry: &EntityRegistry,
    interner: &Interner,
    id: TypeId,
) -> String {
    match types.get(id) {
        InternedType::Primitive(p) => p.name().to_string(),
        InternedType::Instance { class } => class_path(registry, interner, *class),
        InternedType::Generic { class, args } => {
            let mut out = class_path(registry, interner, *class);
            out.push('<');
            for (i, &a) in args.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&llvm_name(types, registry, interner, a));
            }
            out.push('>');
            out
        }
        InternedType::Union(members) => {
            // Members are canonically sorted, so the name is stable
            let mut out = String::from("[");
            for (i, &m) in members.iter().enumerate() {
                if i > 0 {
                    out.push('|');
                }
                out.push_str(&llvm_name(types, registry, interner, m));
            }
            out.push(']');
            out
        }
        InternedType::Hierarchy { class } => {
            let mut out = class_path(registry, interner, *class);
            out.push('+');
            out
        }
        InternedType::Metaclass { of } => {
            let mut out = llvm_name(types, registry, interner, *of);
            out.push_str(":Class");
            out
        }
    }
}

/// Fully qualified class path, `Foo.Bar` for nested scopes.
fn class_path(registry: &EntityRegistry, interner: &Interner, class: crate::sema::entity_registry::ClassId) -> String {
    let mut segments = Vec::new();
    let mut current = Some(class);
    while let Some(c) = current {
        if c == registry.root {
            break;
        }
        let def = registry.class(c);
        segments.push(interner.resolve(def.name).to_string());
        current = def.parent_scope;
    }
    segments.reverse();
    segments.join(".")
}

/// Deterministic identifier for a method instantiation: owner, name
/// (`@` replaced by `.`), receiver type, argument tuple and return type.
pub fn method_name(
    types: &TypeArena,
    registry: &EntityRegistry,
    interner: &Interner,
    owner: crate::sema::entity_registry::ClassId,
    name: &str,
    self_type: TypeId,
    arg_types: &[TypeId],
    return_type: Option<TypeId>,
) -> String {
    let mut out = class_path(registry, interner, owner);
    if out.is_empty() {
        out.push_str(interner.resolve(registry.class(registry.root).name));
    }
    out.push('#');
    out.push_str(&name.replace('@', "."));
    out.push('<');
    out.push_str(&llvm_name(types, registry, interner, self_type));
    for &a in arg_types {
        out.push(',');
        out.push_str(&llvm_name(types, registry, interner, a));
    }
    out.push('>');
    out.push(':');
    match return_type {
        Some(r) => out.push_str(&llvm_name(types, registry, interner, r)),
        None => out.push_str("Void"),
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::Interner;
    use crate::sema::entity_defs::ClassKind;

    #[test]
    fn union_name_is_order_independent() {
        let mut names = Interner::new();
        let registry = EntityRegistry::new(names.intern("main"));
        let mut types = TypeArena::new();

        let a = types.union_of(&[types.primitives.i32, types.primitives.char]);
        let b = types.union_of(&[types.primitives.char, types.primitives.i32]);
        assert_eq!(a, b);
        let rendered = llvm_name(&types, &registry, &names, a);
        assert_eq!(rendered, llvm_name(&types, &registry, &names, b));
    }

    #[test]
    fn method_name_is_fully_qualified() {
        let mut names = Interner::new();
        let mut registry = EntityRegistry::new(names.intern("main"));
        let mut types = TypeArena::new();
        let root = registry.root;
        let outer = registry.register_class(names.intern("Outer"), ClassKind::Module, root);
        let foo = registry.register_class(names.intern("Foo"), ClassKind::Class, outer);
        let self_t = types.instance(foo);

        let mangled = method_name(
            &types,
            &registry,
            &names,
            foo,
            "x=",
            self_t,
            &[types.primitives.i32],
            Some(types.primitives.i32),
        );
        assert_eq!(mangled, "Outer.Foo#x=<Outer.Foo,Int32>:Int32");
    }
}
