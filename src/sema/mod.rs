// src/sema/mod.rs

pub mod analyzer;
pub mod builtins;
pub mod entity_defs;
pub mod entity_registry;
pub mod lattice;
pub mod llvm;
pub mod mangle;
pub mod scope;
pub mod type_arena;
pub mod type_display;

pub use analyzer::Analyzer;
pub use builtins::Builtins;
pub use entity_defs::{
    ClassDef, ClassKind, InstanceKey, MacroDef, MethodBody, MethodDef, MethodInstance,
    MethodParam, PrimitiveRet, Restriction,
};
pub use entity_registry::{ClassId, ConstTarget, EntityRegistry, InstanceId, MacroId, MethodId};
pub use lattice::{is_subtype, merge};
pub use llvm::{LlvmType, llvm_type};
pub use mangle::llvm_name;
pub use scope::Scope;
pub use type_arena::{InternedType, PrimitiveType, TypeArena, TypeId, TypeIdVec};
pub use type_display::type_to_string;
