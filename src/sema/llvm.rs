// src/sema/llvm.rs
//
// IR type descriptors at the code-generator boundary. The core does not
// link against LLVM; it only promises that every inferred type maps to a
// stable descriptor the generator can lower.

use crate::sema::entity_registry::EntityRegistry;
use crate::sema::type_arena::{InternedType, PrimitiveType, TypeArena, TypeId};

/// The IR-level shape of a beryl type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LlvmType {
    Void,
    I1,
    I8,
    I16,
    I32,
    I64,
    F32,
    F64,
    /// Heap references: class instances, strings, hierarchies
    Ptr,
    /// Tagged union: a type id discriminant plus a payload slot
    TaggedUnion { members: u32 },
}

/// Map an inferred type to its IR descriptor.
pub fn llvm_type(types: &TypeArena, _registry: &EntityRegistry, id: TypeId) -> LlvmType {
    match types.get(id) {
        InternedType::Primitive(p) => match p {
            PrimitiveType::Nil | PrimitiveType::Void => LlvmType::Void,
            PrimitiveType::Bool => LlvmType::I1,
            PrimitiveType::Char | PrimitiveType::I8 => LlvmType::I8,
            PrimitiveType::I16 => LlvmType::I16,
            PrimitiveType::I32 => LlvmType::I32,
            PrimitiveType::I64 => LlvmType::I64,
            PrimitiveType::F32 => LlvmType::F32,
            PrimitiveType::F64 => LlvmType::F64,
            PrimitiveType::String => LlvmType::Ptr,
            // Symbols are interned to table indices
            PrimitiveType::Symbol => LlvmType::I32,
        },
        InternedType::Instance { .. }
        | InternedType::Generic { .. }
        | InternedType::Hierarchy { .. } => LlvmType::Ptr,
        InternedType::Union(members) => LlvmType::TaggedUnion {
            members: members.len() as u32,
        },
        // Class values lower to their type-table index
        InternedType::Metaclass { .. } => LlvmType::I32,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::Interner;

    #[test]
    fn primitive_mapping() {
        let mut names = Interner::new();
        let registry = EntityRegistry::new(names.intern("main"));
        let mut types = TypeArena::new();

        assert_eq!(llvm_type(&types, &registry, types.primitives.bool), LlvmType::I1);
        assert_eq!(llvm_type(&types, &registry, types.primitives.i64), LlvmType::I64);
        assert_eq!(llvm_type(&types, &registry, types.primitives.f32), LlvmType::F32);

        let uni = types.union_of(&[types.primitives.i32, types.primitives.nil]);
        assert_eq!(
            llvm_type(&types, &registry, uni),
            LlvmType::TaggedUnion { members: 2 }
        );
    }
}
