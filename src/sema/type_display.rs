// src/sema/type_display.rs
//
// Human-readable rendering of interned types for diagnostics and tests.

use crate::frontend::Interner;
use crate::sema::entity_registry::EntityRegistry;
use crate::sema::type_arena::{InternedType, TypeArena, TypeId};

/// Render a type the way it would appear in a diagnostic:
/// `Int32`, `Foo`, `Array(Int32)`, `(Int32 | Char)`, `Foo+`, `Foo:Class`.
pub fn type_to_string(
    types: &TypeArena,
    registry: &EntityRegistry,
    interner: &Interner,
    id: TypeId,
) -> String {
    match types.get(id) {
        InternedType::Primitive(p) => p.name().to_string(),
        InternedType::Instance { class } => {
            interner.resolve(registry.class(*class).name).to_string()
        }
        InternedType::Generic { class, args } => {
            let name = interner.resolve(registry.class(*class).name);
            let args: Vec<String> = args
                .iter()
                .map(|&a| type_to_string(types, registry, interner, a))
                .collect();
            format!("{}({})", name, args.join(", "))
        }
        InternedType::Union(members) => {
            let parts: Vec<String> = members
                .iter()
                .map(|&m| type_to_string(types, registry, interner, m))
                .collect();
            format!("({})", parts.join(" | "))
        }
        InternedType::Hierarchy { class } => {
            format!("{}+", interner.resolve(registry.class(*class).name))
        }
        InternedType::Metaclass { of } => {
            format!("{}:Class", type_to_string(types, registry, interner, *of))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::Interner;
    use crate::sema::entity_defs::ClassKind;

    #[test]
    fn renders_compound_types() {
        let mut names = Interner::new();
        let mut registry = EntityRegistry::new(names.intern("main"));
        let mut types = TypeArena::new();
        let root = registry.root;
        let array = registry.register_class(names.intern("Array"), ClassKind::Class, root);

        let mut args = crate::sema::type_arena::TypeIdVec::new();
        args.push(types.primitives.i32);
        let generic = types.generic(array, args);
        assert_eq!(
            type_to_string(&types, &registry, &names, generic),
            "Array(Int32)"
        );

        let uni = types.union_of(&[types.primitives.i32, types.primitives.char]);
        let rendered = type_to_string(&types, &registry, &names, uni);
        assert!(rendered.starts_with('(') && rendered.contains('|'));

        let hier = types.hierarchy(array);
        assert_eq!(type_to_string(&types, &registry, &names, hier), "Array+");
    }
}
