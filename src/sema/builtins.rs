// src/sema/builtins.rs
//
// The built-in class graph and the primitive-method declaration table.
// Primitive bodies are opaque to inference: their return types come from
// the PrimitiveRet rules registered here, never from body traversal.

use rustc_hash::FxHashMap;

use crate::frontend::{Interner, Span};
use crate::sema::entity_defs::{
    ClassKind, MethodBody, MethodDef, MethodParam, PrimitiveRet, Restriction,
};
use crate::sema::entity_registry::{ClassId, EntityRegistry, MethodId};
use crate::sema::type_arena::{PrimitiveType, TypeArena};

/// Cached identifiers for the built-in types, looked up once at startup.
#[derive(Debug, Clone)]
pub struct Builtins {
    pub object: ClassId,
    pub reference: ClassId,
    pub exception: ClassId,
    pub string: ClassId,
    pub array: ClassId,
    pub hash: ClassId,
    pub range: ClassId,
    pub regex: ClassId,
    pub pointer: ClassId,
    /// Method-hosting pseudo-classes for the primitive types
    primitive_classes: FxHashMap<PrimitiveType, ClassId>,
}

impl Builtins {
    /// Register the built-in classes and the primitive operation table.
    pub fn install(
        registry: &mut EntityRegistry,
        types: &mut TypeArena,
        interner: &mut Interner,
    ) -> Self {
        let root = registry.root;

        let object = registry.register_class(interner.intern("Object"), ClassKind::Class, root);
        registry.class_mut(object).collapse_boundary = true;

        let reference =
            registry.register_class(interner.intern("Reference"), ClassKind::Class, root);
        registry.set_superclass(reference, object);
        registry.class_mut(reference).collapse_boundary = true;

        let exception =
            registry.register_class(interner.intern("Exception"), ClassKind::Class, root);
        registry.set_superclass(exception, reference);

        let string = registry.register_class(interner.intern("String"), ClassKind::Class, root);
        registry.set_superclass(string, object);

        let regex = registry.register_class(interner.intern("Regex"), ClassKind::Class, root);
        registry.set_superclass(regex, reference);

        let t = interner.intern("T");
        let k = interner.intern("K");
        let v = interner.intern("V");
        let b = interner.intern("B");
        let e = interner.intern("E");

        let array = registry.register_class(interner.intern("Array"), ClassKind::Class, root);
        registry.set_superclass(array, reference);
        registry.class_mut(array).type_params = vec![t];

        let hash = registry.register_class(interner.intern("Hash"), ClassKind::Class, root);
        registry.set_superclass(hash, reference);
        registry.class_mut(hash).type_params = vec![k, v];

        let range = registry.register_class(interner.intern("Range"), ClassKind::Class, root);
        registry.set_superclass(range, reference);
        registry.class_mut(range).type_params = vec![b, e];

        let pointer = registry.register_class(interner.intern("Pointer"), ClassKind::Class, root);
        registry.set_superclass(pointer, object);
        registry.class_mut(pointer).type_params = vec![t];

        let mut primitive_classes = FxHashMap::default();
        for prim in [
            PrimitiveType::Nil,
            PrimitiveType::Bool,
            PrimitiveType::Char,
            PrimitiveType::I8,
            PrimitiveType::I16,
            PrimitiveType::I32,
            PrimitiveType::I64,
            PrimitiveType::F32,
            PrimitiveType::F64,
            PrimitiveType::Symbol,
        ] {
            let class =
                registry.register_class(interner.intern(prim.name()), ClassKind::Class, root);
            registry.set_superclass(class, object);
            primitive_classes.insert(prim, class);
        }
        primitive_classes.insert(PrimitiveType::String, string);

        let builtins = Self {
            object,
            reference,
            exception,
            string,
            array,
            hash,
            range,
            regex,
            pointer,
            primitive_classes,
        };
        builtins.install_primitive_methods(registry, types, interner);
        builtins
    }

    fn install_primitive_methods(
        &self,
        registry: &mut EntityRegistry,
        types: &mut TypeArena,
        interner: &mut Interner,
    ) {
        let bool_t = types.primitives.bool;
        let i32_t = types.primitives.i32;
        let i64_t = types.primitives.i64;
        let string_t = types.primitives.string;

        // Reference equality on the root: the unrestricted catch-all
        prim_method(registry, interner, self.object, "==", &[None], PrimitiveRet::Fixed(bool_t));
        prim_method(registry, interner, self.object, "!=", &[None], PrimitiveRet::Fixed(bool_t));
        prim_method(registry, interner, self.object, "object_id", &[], PrimitiveRet::Fixed(i64_t));

        // Numeric arithmetic and comparison, same-width operands
        let numerics = [
            PrimitiveType::I8,
            PrimitiveType::I16,
            PrimitiveType::I32,
            PrimitiveType::I64,
            PrimitiveType::F32,
            PrimitiveType::F64,
        ];
        for prim in numerics {
            let class = self.primitive_classes[&prim];
            let operand = types.primitive(prim);
            for op in ["+", "-", "*", "/"] {
                prim_method(
                    registry,
                    interner,
                    class,
                    op,
                    &[Some(operand)],
                    PrimitiveRet::SelfType,
                );
            }
            if prim.is_integer() {
                prim_method(
                    registry,
                    interner,
                    class,
                    "%",
                    &[Some(operand)],
                    PrimitiveRet::SelfType,
                );
            }
            for op in ["==", "!=", "<", "<=", ">", ">="] {
                prim_method(
                    registry,
                    interner,
                    class,
                    op,
                    &[Some(operand)],
                    PrimitiveRet::Fixed(bool_t),
                );
            }
        }

        // Char ordering
        let char_class = self.primitive_classes[&PrimitiveType::Char];
        let char_t = types.primitives.char;
        for op in ["==", "!=", "<", ">"] {
            prim_method(
                registry,
                interner,
                char_class,
                op,
                &[Some(char_t)],
                PrimitiveRet::Fixed(bool_t),
            );
        }

        // Strings
        prim_method(registry, interner, self.string, "==", &[Some(string_t)], PrimitiveRet::Fixed(bool_t));
        prim_method(registry, interner, self.string, "+", &[Some(string_t)], PrimitiveRet::Fixed(string_t));
        prim_method(registry, interner, self.string, "length", &[], PrimitiveRet::Fixed(i32_t));

        // Raw memory
        prim_method(registry, interner, self.pointer, "[]", &[Some(i32_t)], PrimitiveRet::TypeArg(0));
        prim_method(registry, interner, self.pointer, "[]=", &[Some(i32_t), None], PrimitiveRet::Arg(1));
        prim_method(registry, interner, self.pointer, "value", &[], PrimitiveRet::TypeArg(0));

        // Collections
        prim_method(registry, interner, self.array, "[]", &[Some(i32_t)], PrimitiveRet::TypeArg(0));
        prim_method(registry, interner, self.array, "<<", &[None], PrimitiveRet::SelfType);
        prim_method(registry, interner, self.array, "length", &[], PrimitiveRet::Fixed(i32_t));
        prim_method(registry, interner, self.hash, "[]", &[None], PrimitiveRet::TypeArg(1));
        prim_method(registry, interner, self.hash, "[]=", &[None, None], PrimitiveRet::Arg(1));
        prim_method(registry, interner, self.hash, "length", &[], PrimitiveRet::Fixed(i32_t));

        // Exceptions
        prim_method(registry, interner, self.exception, "message", &[], PrimitiveRet::Fixed(string_t));
    }

    /// The method-hosting class for a primitive type.
    pub fn primitive_class(&self, prim: PrimitiveType) -> Option<ClassId> {
        self.primitive_classes.get(&prim).copied()
    }
}

/// Register one primitive method. `params` lists the operand restrictions
/// (None is the unrestricted catch-all position).
fn prim_method(
    registry: &mut EntityRegistry,
    interner: &mut Interner,
    owner: ClassId,
    name: &str,
    params: &[Option<crate::sema::type_arena::TypeId>],
    ret: PrimitiveRet,
) -> MethodId {
    let name = interner.intern(name);
    let mut method_params = Vec::with_capacity(params.len());
    for (i, restriction) in params.iter().enumerate() {
        method_params.push(MethodParam {
            name: interner.intern(&format!("arg{i}")),
            restriction: restriction.map(Restriction::Exact),
            default: None,
            span: Span::default(),
        });
    }
    registry.add_method(MethodDef {
        id: MethodId::new(0),
        name,
        owner,
        params: method_params,
        block_param: None,
        return_type: None,
        body: MethodBody::Primitive(ret),
        span: Span::default(),
        instances: FxHashMap::default(),
    })
}
