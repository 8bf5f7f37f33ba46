// src/sema/lattice.rs
//
// The type lattice: least-upper-bound merging with union canonicalization
// and hierarchy collapse, plus the subtype test used by overload
// restrictions. Pure functions over the arena and registry.

use crate::sema::entity_registry::{ClassId, EntityRegistry};
use crate::sema::type_arena::{InternedType, TypeArena, TypeId, TypeIdVec};

/// Least upper bound of a non-empty set of types.
///
/// Rules, in order: drop duplicates by identity; a single survivor returns
/// itself; members covered by a hierarchy member are absorbed; if all
/// remaining are plain instance or hierarchy types sharing a nearest common
/// superclass that is open (has subclasses recorded), collapse to
/// `Hierarchy` of it; otherwise build a canonical union.
pub fn merge(types: &mut TypeArena, registry: &EntityRegistry, parts: &[TypeId]) -> TypeId {
    debug_assert!(!parts.is_empty(), "merge of zero types");

    let mut flat: TypeIdVec = TypeIdVec::new();
    for &p in parts {
        for m in types.union_members(p) {
            if !flat.contains(&m) {
                flat.push(m);
            }
        }
    }
    if flat.len() == 1 {
        return flat[0];
    }

    absorb_into_hierarchies(types, registry, &mut flat);
    if flat.len() == 1 {
        return flat[0];
    }

    if let Some(common) = common_open_superclass(types, registry, &flat) {
        return types.hierarchy(common);
    }

    types.union_of(&flat)
}

/// Drop members already covered by a hierarchy member of the same set.
fn absorb_into_hierarchies(types: &TypeArena, registry: &EntityRegistry, flat: &mut TypeIdVec) {
    let hierarchies: Vec<(TypeId, ClassId)> = flat
        .iter()
        .filter_map(|&m| match types.get(m) {
            InternedType::Hierarchy { class } => Some((m, *class)),
            _ => None,
        })
        .collect();
    if hierarchies.is_empty() {
        return;
    }
    flat.retain(|m| {
        let m = *m;
        let class = match types.get(m) {
            InternedType::Instance { class } | InternedType::Generic { class, .. } => *class,
            InternedType::Hierarchy { class } => *class,
            _ => return true,
        };
        !hierarchies
            .iter()
            .any(|&(h, hc)| h != m && registry.has_ancestor(class, hc))
    });
}

/// The nearest common superclass of all members, when every member is a
/// plain instance or hierarchy type. Generic instantiations never collapse
/// (that would erase their argument tuples), and the universal roots marked
/// as collapse boundaries (Object, Reference) never host a hierarchy.
fn common_open_superclass(
    types: &TypeArena,
    registry: &EntityRegistry,
    members: &[TypeId],
) -> Option<ClassId> {
    let mut classes = Vec::with_capacity(members.len());
    for &m in members {
        match types.get(m) {
            InternedType::Instance { class } | InternedType::Hierarchy { class } => {
                classes.push(*class)
            }
            _ => return None,
        }
    }

    let first_chain = registry.superclass_chain(classes[0]);
    let common = first_chain.into_iter().find(|&candidate| {
        if registry.class(candidate).collapse_boundary {
            return false;
        }
        classes[1..]
            .iter()
            .all(|&c| registry.has_ancestor(c, candidate))
    })?;

    if registry.class(common).subclasses.is_empty() {
        return None;
    }
    Some(common)
}

/// Subtype test: identity, union membership, hierarchy closure, or the
/// nominal ancestor chain (superclasses and included modules).
pub fn is_subtype(
    types: &TypeArena,
    registry: &EntityRegistry,
    a: TypeId,
    b: TypeId,
) -> bool {
    if a == b {
        return true;
    }

    // A union is a subtype when every member is
    if let InternedType::Union(members) = types.get(a) {
        return members.iter().all(|&m| is_subtype(types, registry, m, b));
    }

    match types.get(b) {
        InternedType::Union(members) => members
            .iter()
            .any(|&m| is_subtype(types, registry, a, m)),
        InternedType::Hierarchy { class } => match types.get(a) {
            InternedType::Instance { class: d }
            | InternedType::Generic { class: d, .. }
            | InternedType::Hierarchy { class: d } => registry.has_ancestor(*d, *class),
            _ => false,
        },
        InternedType::Instance { class } => match types.get(a) {
            InternedType::Instance { class: d } | InternedType::Generic { class: d, .. } => {
                registry.has_ancestor(*d, *class)
            }
            _ => false,
        },
        InternedType::Generic { class, args } => match types.get(a) {
            // Generic arguments are invariant
            InternedType::Generic { class: d, args: da } => {
                registry.has_ancestor(*d, *class) && da == args
            }
            _ => false,
        },
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::Interner;
    use crate::sema::entity_defs::ClassKind;

    struct Fixture {
        types: TypeArena,
        registry: EntityRegistry,
    }

    fn fixture() -> (Fixture, ClassId, ClassId, ClassId) {
        let mut names = Interner::new();
        let mut registry = EntityRegistry::new(names.intern("main"));
        let root = registry.root;
        let foo = registry.register_class(names.intern("Foo"), ClassKind::Class, root);
        let bar = registry.register_class(names.intern("Bar"), ClassKind::Class, root);
        let baz = registry.register_class(names.intern("Baz"), ClassKind::Class, root);
        registry.set_superclass(bar, foo);
        registry.set_superclass(baz, foo);
        (
            Fixture {
                types: TypeArena::new(),
                registry,
            },
            foo,
            bar,
            baz,
        )
    }

    #[test]
    fn merge_primitives_builds_union() {
        let (mut f, ..) = fixture();
        let i32t = f.types.primitives.i32;
        let chart = f.types.primitives.char;
        let merged = merge(&mut f.types, &f.registry, &[i32t, chart]);
        let members = f.types.as_union(merged).unwrap().to_vec();
        assert_eq!(members.len(), 2);
        assert!(members.contains(&i32t));
        assert!(members.contains(&chart));
    }

    #[test]
    fn merge_is_idempotent_and_identity_on_duplicates() {
        let (mut f, foo, ..) = fixture();
        let t = f.types.instance(foo);
        assert_eq!(merge(&mut f.types, &f.registry, &[t, t]), t);

        let i32t = f.types.primitives.i32;
        let u1 = merge(&mut f.types, &f.registry, &[t, i32t]);
        let u2 = merge(&mut f.types, &f.registry, &[u1, i32t]);
        assert_eq!(u1, u2);
    }

    #[test]
    fn merge_collapses_open_class_family_to_hierarchy() {
        let (mut f, foo, bar, baz) = fixture();
        let foot = f.types.instance(foo);
        let bart = f.types.instance(bar);
        let bazt = f.types.instance(baz);

        let merged = merge(&mut f.types, &f.registry, &[foot, bart, bazt]);
        assert_eq!(
            f.types.get(merged),
            &InternedType::Hierarchy { class: foo }
        );

        // Two siblings without their parent still collapse to the parent
        let merged = merge(&mut f.types, &f.registry, &[bart, bazt]);
        assert_eq!(
            f.types.get(merged),
            &InternedType::Hierarchy { class: foo }
        );
    }

    #[test]
    fn hierarchy_absorbs_covered_members() {
        let (mut f, foo, _bar, baz) = fixture();
        let hier = f.types.hierarchy(foo);
        let bazt = f.types.instance(baz);
        let merged = merge(&mut f.types, &f.registry, &[hier, bazt]);
        assert_eq!(merged, hier);
    }

    #[test]
    fn union_with_nil_does_not_collapse() {
        let (mut f, foo, bar, _) = fixture();
        let foot = f.types.instance(foo);
        let bart = f.types.instance(bar);
        let nil = f.types.primitives.nil;
        let merged = merge(&mut f.types, &f.registry, &[foot, bart, nil]);
        assert!(f.types.as_union(merged).is_some());
    }

    #[test]
    fn subtype_follows_superclass_chain_and_unions() {
        let (mut f, foo, bar, _) = fixture();
        let foot = f.types.instance(foo);
        let bart = f.types.instance(bar);
        let i32t = f.types.primitives.i32;

        assert!(is_subtype(&f.types, &f.registry, bart, foot));
        assert!(!is_subtype(&f.types, &f.registry, foot, bart));

        let uni = f.types.union_of(&[i32t, foot]);
        assert!(is_subtype(&f.types, &f.registry, i32t, uni));
        assert!(is_subtype(&f.types, &f.registry, bart, uni));

        let hier = f.types.hierarchy(foo);
        assert!(is_subtype(&f.types, &f.registry, bart, hier));
        assert!(is_subtype(&f.types, &f.registry, uni, hier) == false);
    }
}
