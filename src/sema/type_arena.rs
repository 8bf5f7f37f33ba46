// src/sema/type_arena.rs
//
// Interned type system using TypeId handles for O(1) identity and minimal
// allocations. Two types are "the same type" exactly when their TypeIds are
// equal; the arena guarantees this by deduplicating on intern.

use hashbrown::HashMap;
use smallvec::SmallVec;

use crate::sema::entity_registry::ClassId;

/// Concrete type identity in the TypeArena.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, PartialOrd, Ord)]
pub struct TypeId(u32);

impl TypeId {
    pub fn index(self) -> u32 {
        self.0
    }
}

/// SmallVec for type children - inline up to 4 (covers most unions and
/// generic argument tuples)
pub type TypeIdVec = SmallVec<[TypeId; 4]>;

/// The primitive variants. Numeric-literal suffixes select the exact
/// variant; a bare integer is Int32 and a bare float is Float64.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveType {
    Nil,
    Bool,
    Char,
    I8,
    I16,
    I32,
    I64,
    F32,
    F64,
    String,
    Symbol,
    Void,
}

impl PrimitiveType {
    pub fn name(self) -> &'static str {
        match self {
            PrimitiveType::Nil => "Nil",
            PrimitiveType::Bool => "Bool",
            PrimitiveType::Char => "Char",
            PrimitiveType::I8 => "Int8",
            PrimitiveType::I16 => "Int16",
            PrimitiveType::I32 => "Int32",
            PrimitiveType::I64 => "Int64",
            PrimitiveType::F32 => "Float32",
            PrimitiveType::F64 => "Float64",
            PrimitiveType::String => "String",
            PrimitiveType::Symbol => "Symbol",
            PrimitiveType::Void => "Void",
        }
    }

    pub fn is_integer(self) -> bool {
        matches!(
            self,
            PrimitiveType::I8 | PrimitiveType::I16 | PrimitiveType::I32 | PrimitiveType::I64
        )
    }

    pub fn is_float(self) -> bool {
        matches!(self, PrimitiveType::F32 | PrimitiveType::F64)
    }
}

/// Internal representation of interned types.
///
/// Children are TypeIds rather than recursive values, which keeps the
/// variant sizes small and lets SmallVec inline the common cases.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum InternedType {
    Primitive(PrimitiveType),

    /// A plain class instance
    Instance { class: ClassId },

    /// A generic instantiation: class descriptor plus ordered argument
    /// tuple. Identical iff descriptor and tuple match elementwise, which
    /// interning gives for free.
    Generic { class: ClassId, args: TypeIdVec },

    /// Canonical union: flattened, deduplicated, sorted, at least two
    /// members. Nil is permitted as a member.
    Union(TypeIdVec),

    /// The class or any subclass thereof
    Hierarchy { class: ClassId },

    /// The type of a class value itself
    Metaclass { of: TypeId },
}

/// Pre-interned primitives for O(1) access
#[derive(Debug, Clone, Copy)]
pub struct PrimitiveTypes {
    pub nil: TypeId,
    pub bool: TypeId,
    pub char: TypeId,
    pub i8: TypeId,
    pub i16: TypeId,
    pub i32: TypeId,
    pub i64: TypeId,
    pub f32: TypeId,
    pub f64: TypeId,
    pub string: TypeId,
    pub symbol: TypeId,
    pub void: TypeId,
}

/// Per-compilation type arena with automatic interning/deduplication.
#[derive(Debug, Clone)]
pub struct TypeArena {
    /// Interned types, indexed by TypeId
    types: Vec<InternedType>,
    /// Deduplication map
    intern_map: HashMap<InternedType, TypeId>,
    /// Pre-interned primitives
    pub primitives: PrimitiveTypes,
}

impl TypeArena {
    pub fn new() -> Self {
        let zero = TypeId(0);
        let mut arena = Self {
            types: Vec::new(),
            intern_map: HashMap::new(),
            primitives: PrimitiveTypes {
                nil: zero,
                bool: zero,
                char: zero,
                i8: zero,
                i16: zero,
                i32: zero,
                i64: zero,
                f32: zero,
                f64: zero,
                string: zero,
                symbol: zero,
                void: zero,
            },
        };

        arena.primitives.nil = arena.intern(InternedType::Primitive(PrimitiveType::Nil));
        arena.primitives.bool = arena.intern(InternedType::Primitive(PrimitiveType::Bool));
        arena.primitives.char = arena.intern(InternedType::Primitive(PrimitiveType::Char));
        arena.primitives.i8 = arena.intern(InternedType::Primitive(PrimitiveType::I8));
        arena.primitives.i16 = arena.intern(InternedType::Primitive(PrimitiveType::I16));
        arena.primitives.i32 = arena.intern(InternedType::Primitive(PrimitiveType::I32));
        arena.primitives.i64 = arena.intern(InternedType::Primitive(PrimitiveType::I64));
        arena.primitives.f32 = arena.intern(InternedType::Primitive(PrimitiveType::F32));
        arena.primitives.f64 = arena.intern(InternedType::Primitive(PrimitiveType::F64));
        arena.primitives.string = arena.intern(InternedType::Primitive(PrimitiveType::String));
        arena.primitives.symbol = arena.intern(InternedType::Primitive(PrimitiveType::Symbol));
        arena.primitives.void = arena.intern(InternedType::Primitive(PrimitiveType::Void));

        arena
    }

    /// Intern a type, returning the existing TypeId if already interned
    fn intern(&mut self, ty: InternedType) -> TypeId {
        let next_id = TypeId(self.types.len() as u32);
        *self.intern_map.entry(ty.clone()).or_insert_with(|| {
            self.types.push(ty);
            next_id
        })
    }

    pub fn get(&self, id: TypeId) -> &InternedType {
        &self.types[id.0 as usize]
    }

    pub fn instance(&mut self, class: ClassId) -> TypeId {
        self.intern(InternedType::Instance { class })
    }

    pub fn generic(&mut self, class: ClassId, args: TypeIdVec) -> TypeId {
        self.intern(InternedType::Generic { class, args })
    }

    pub fn hierarchy(&mut self, class: ClassId) -> TypeId {
        self.intern(InternedType::Hierarchy { class })
    }

    pub fn metaclass(&mut self, of: TypeId) -> TypeId {
        self.intern(InternedType::Metaclass { of })
    }

    /// Build a canonical union from the given parts: nested unions are
    /// flattened, duplicates dropped, members sorted by identity. A single
    /// surviving member collapses to that member.
    pub fn union_of(&mut self, parts: &[TypeId]) -> TypeId {
        let mut flat = TypeIdVec::new();
        for &p in parts {
            match self.get(p) {
                InternedType::Union(members) => flat.extend(members.iter().copied()),
                _ => flat.push(p),
            }
        }
        flat.sort_unstable();
        flat.dedup();
        if flat.len() == 1 {
            flat[0]
        } else {
            self.intern(InternedType::Union(flat))
        }
    }

    /// The pre-interned TypeId for a primitive variant.
    pub fn primitive(&self, p: PrimitiveType) -> TypeId {
        match p {
            PrimitiveType::Nil => self.primitives.nil,
            PrimitiveType::Bool => self.primitives.bool,
            PrimitiveType::Char => self.primitives.char,
            PrimitiveType::I8 => self.primitives.i8,
            PrimitiveType::I16 => self.primitives.i16,
            PrimitiveType::I32 => self.primitives.i32,
            PrimitiveType::I64 => self.primitives.i64,
            PrimitiveType::F32 => self.primitives.f32,
            PrimitiveType::F64 => self.primitives.f64,
            PrimitiveType::String => self.primitives.string,
            PrimitiveType::Symbol => self.primitives.symbol,
            PrimitiveType::Void => self.primitives.void,
        }
    }

    pub fn is_nil(&self, id: TypeId) -> bool {
        id == self.primitives.nil
    }

    pub fn as_primitive(&self, id: TypeId) -> Option<PrimitiveType> {
        match self.get(id) {
            InternedType::Primitive(p) => Some(*p),
            _ => None,
        }
    }

    pub fn as_union(&self, id: TypeId) -> Option<&[TypeId]> {
        match self.get(id) {
            InternedType::Union(members) => Some(members),
            _ => None,
        }
    }

    /// The class behind an instance, generic instance or hierarchy type.
    pub fn class_of(&self, id: TypeId) -> Option<ClassId> {
        match self.get(id) {
            InternedType::Instance { class }
            | InternedType::Generic { class, .. }
            | InternedType::Hierarchy { class } => Some(*class),
            _ => None,
        }
    }

    /// Generic arguments of a generic instance.
    pub fn generic_args(&self, id: TypeId) -> Option<&[TypeId]> {
        match self.get(id) {
            InternedType::Generic { args, .. } => Some(args),
            _ => None,
        }
    }

    /// Members of a type viewed as a set: a union's members, or the type
    /// itself. Hierarchies are not expanded here (see lattice).
    pub fn union_members(&self, id: TypeId) -> TypeIdVec {
        match self.get(id) {
            InternedType::Union(members) => members.clone(),
            _ => {
                let mut v = TypeIdVec::new();
                v.push(id);
                v
            }
        }
    }
}

impl Default for TypeArena {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primitives_are_pre_interned() {
        let arena = TypeArena::new();
        assert_eq!(
            arena.as_primitive(arena.primitives.i32),
            Some(PrimitiveType::I32)
        );
        assert_eq!(
            arena.as_primitive(arena.primitives.nil),
            Some(PrimitiveType::Nil)
        );
    }

    #[test]
    fn interning_deduplicates() {
        let mut arena = TypeArena::new();
        let class = ClassId::new(3);
        let a = arena.instance(class);
        let b = arena.instance(class);
        assert_eq!(a, b);

        let mut args = TypeIdVec::new();
        args.push(arena.primitives.i32);
        let g1 = arena.generic(class, args.clone());
        let g2 = arena.generic(class, args);
        assert_eq!(g1, g2);
    }

    #[test]
    fn union_of_flattens_and_collapses() {
        let mut arena = TypeArena::new();
        let i32t = arena.primitives.i32;
        let chart = arena.primitives.char;
        let nil = arena.primitives.nil;

        let inner = arena.union_of(&[i32t, chart]);
        assert!(arena.as_union(inner).is_some());

        // Nested union flattens; duplicates drop
        let outer = arena.union_of(&[inner, nil, i32t]);
        let members = arena.as_union(outer).unwrap();
        assert_eq!(members.len(), 3);

        // Order of construction does not matter
        let outer2 = arena.union_of(&[nil, chart, i32t]);
        assert_eq!(outer, outer2);

        // Single member collapses
        assert_eq!(arena.union_of(&[i32t, i32t]), i32t);
    }
}
