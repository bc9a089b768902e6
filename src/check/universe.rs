//! Predeclared identifiers and the built-in `unsafe` package.

use crate::check::constant::ConstValue;
use crate::types::{
    BasicKind, FuncType, InterfaceType, Scope, Symbol, SymbolKind, Type, TypedPackage,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    Append,
    Cap,
    Clear,
    Close,
    Complex,
    Copy,
    Delete,
    Imag,
    Len,
    Make,
    Max,
    Min,
    New,
    Panic,
    Print,
    Println,
    Real,
    Recover,
}

#[derive(Debug, Clone)]
pub enum Universal {
    Type(Type),
    Const(Type, ConstValue),
    Nil,
    Iota,
    Builtin(Builtin),
}

pub fn error_type() -> Type {
    Type::named(None, "error", vec![])
}

/// `interface{ Error() string }`
pub fn error_underlying() -> Type {
    Type::Interface(Box::new(InterfaceType {
        methods: vec![(
            "Error".to_string(),
            FuncType {
                params: vec![],
                results: vec![Type::Basic(BasicKind::String)],
                variadic: false,
            },
        )],
        embeds: vec![],
    }))
}

pub fn lookup(name: &str) -> Option<Universal> {
    let basic = |kind| Some(Universal::Type(Type::Basic(kind)));
    match name {
        "bool" => basic(BasicKind::Bool),
        "int" => basic(BasicKind::Int),
        "int8" => basic(BasicKind::Int8),
        "int16" => basic(BasicKind::Int16),
        "int32" => basic(BasicKind::Int32),
        "int64" => basic(BasicKind::Int64),
        "uint" => basic(BasicKind::Uint),
        "uint8" => basic(BasicKind::Uint8),
        "uint16" => basic(BasicKind::Uint16),
        "uint32" => basic(BasicKind::Uint32),
        "uint64" => basic(BasicKind::Uint64),
        "uintptr" => basic(BasicKind::Uintptr),
        "float32" => basic(BasicKind::Float32),
        "float64" => basic(BasicKind::Float64),
        "complex64" => basic(BasicKind::Complex64),
        "complex128" => basic(BasicKind::Complex128),
        "string" => basic(BasicKind::String),
        "byte" => basic(BasicKind::Byte),
        "rune" => basic(BasicKind::Rune),
        "any" => Some(Universal::Type(Type::empty_interface())),
        "error" => Some(Universal::Type(error_type())),
        "comparable" => Some(Universal::Type(Type::named(None, "comparable", vec![]))),
        "true" => Some(Universal::Const(
            Type::Basic(BasicKind::UntypedBool),
            ConstValue::Bool(true),
        )),
        "false" => Some(Universal::Const(
            Type::Basic(BasicKind::UntypedBool),
            ConstValue::Bool(false),
        )),
        "nil" => Some(Universal::Nil),
        "iota" => Some(Universal::Iota),
        "append" => Some(Universal::Builtin(Builtin::Append)),
        "cap" => Some(Universal::Builtin(Builtin::Cap)),
        "clear" => Some(Universal::Builtin(Builtin::Clear)),
        "close" => Some(Universal::Builtin(Builtin::Close)),
        "complex" => Some(Universal::Builtin(Builtin::Complex)),
        "copy" => Some(Universal::Builtin(Builtin::Copy)),
        "delete" => Some(Universal::Builtin(Builtin::Delete)),
        "imag" => Some(Universal::Builtin(Builtin::Imag)),
        "len" => Some(Universal::Builtin(Builtin::Len)),
        "make" => Some(Universal::Builtin(Builtin::Make)),
        "max" => Some(Universal::Builtin(Builtin::Max)),
        "min" => Some(Universal::Builtin(Builtin::Min)),
        "new" => Some(Universal::Builtin(Builtin::New)),
        "panic" => Some(Universal::Builtin(Builtin::Panic)),
        "print" => Some(Universal::Builtin(Builtin::Print)),
        "println" => Some(Universal::Builtin(Builtin::Println)),
        "real" => Some(Universal::Builtin(Builtin::Real)),
        "recover" => Some(Universal::Builtin(Builtin::Recover)),
        _ => None,
    }
}

/// Underlying type of a predeclared named type.
pub fn underlying(name: &str) -> Type {
    match name {
        "error" => error_underlying(),
        _ => Type::empty_interface(),
    }
}

/// The `unsafe` package, which has no source.
pub fn unsafe_package() -> TypedPackage {
    let mut scope = Scope::new();
    let pointer = Type::Basic(BasicKind::UnsafePointer);
    scope.insert(Symbol::new("Pointer", SymbolKind::Type, pointer.clone(), pointer.clone()));

    let uintptr = Type::Basic(BasicKind::Uintptr);
    for name in ["Sizeof", "Alignof", "Offsetof"] {
        scope.insert(function(name, vec![Type::empty_interface()], vec![uintptr.clone()]));
    }
    scope.insert(function(
        "Add",
        vec![pointer.clone(), Type::Basic(BasicKind::Int)],
        vec![pointer.clone()],
    ));
    scope.insert(function(
        "String",
        vec![Type::Pointer(Box::new(Type::Basic(BasicKind::Byte))), Type::Basic(BasicKind::Int)],
        vec![Type::Basic(BasicKind::String)],
    ));
    scope.insert(function(
        "StringData",
        vec![Type::Basic(BasicKind::String)],
        vec![Type::Pointer(Box::new(Type::Basic(BasicKind::Byte)))],
    ));
    // Slice and SliceData are generic over the element type
    scope.insert(function("Slice", vec![Type::Invalid, Type::Basic(BasicKind::Int)], vec![Type::Invalid]));
    scope.insert(function("SliceData", vec![Type::Invalid], vec![Type::Invalid]));

    TypedPackage {
        path: "unsafe".into(),
        name: "unsafe".into(),
        imports: Vec::new(),
        scope,
        complete: true,
    }
}

fn function(name: &str, params: Vec<Type>, results: Vec<Type>) -> Symbol {
    let ty = Type::Func(Box::new(FuncType {
        params,
        results,
        variadic: false,
    }));
    Symbol::new(name, SymbolKind::Function, ty.clone(), ty)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_predeclared_types() {
        assert!(matches!(lookup("byte"), Some(Universal::Type(Type::Basic(BasicKind::Byte)))));
        assert!(matches!(lookup("len"), Some(Universal::Builtin(Builtin::Len))));
        assert!(lookup("Println").is_none());
        match lookup("error") {
            Some(Universal::Type(ty)) => assert_eq!(ty.to_string(), "error"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_unsafe_package() {
        let pkg = unsafe_package();
        assert!(pkg.complete);
        assert_eq!(pkg.lookup("Pointer").map(|s| s.kind), Some(SymbolKind::Type));
        assert_eq!(
            pkg.lookup("Sizeof").map(|s| s.ty.to_string()),
            Some("func(any) uintptr".to_string())
        );
    }
}
