//! Type model shared by the checker, the importers and the target resolver.
//!
//! Named types are referenced by identity (package, name, type arguments);
//! their underlying form lives in the declaring package's [`Scope`]. Printing
//! follows go/types: foreign named types are qualified by their import path
//! unless a caller supplies a different qualifier.

pub use crate::ast::ChanDir;
use crate::check::constant::ConstValue;
use crate::error::Location;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct PackageId {
    pub path: String,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BasicKind {
    Bool,
    Int,
    Int8,
    Int16,
    Int32,
    Int64,
    Uint,
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    Uintptr,
    Float32,
    Float64,
    Complex64,
    Complex128,
    String,
    UnsafePointer,
    /// Alias of uint8 that keeps its spelling
    Byte,
    /// Alias of int32 that keeps its spelling
    Rune,
    UntypedBool,
    UntypedInt,
    UntypedRune,
    UntypedFloat,
    UntypedComplex,
    UntypedString,
    UntypedNil,
}

impl BasicKind {
    pub fn name(self) -> &'static str {
        match self {
            BasicKind::Bool => "bool",
            BasicKind::Int => "int",
            BasicKind::Int8 => "int8",
            BasicKind::Int16 => "int16",
            BasicKind::Int32 => "int32",
            BasicKind::Int64 => "int64",
            BasicKind::Uint => "uint",
            BasicKind::Uint8 => "uint8",
            BasicKind::Uint16 => "uint16",
            BasicKind::Uint32 => "uint32",
            BasicKind::Uint64 => "uint64",
            BasicKind::Uintptr => "uintptr",
            BasicKind::Float32 => "float32",
            BasicKind::Float64 => "float64",
            BasicKind::Complex64 => "complex64",
            BasicKind::Complex128 => "complex128",
            BasicKind::String => "string",
            BasicKind::UnsafePointer => "unsafe.Pointer",
            BasicKind::Byte => "byte",
            BasicKind::Rune => "rune",
            BasicKind::UntypedBool => "untyped bool",
            BasicKind::UntypedInt => "untyped int",
            BasicKind::UntypedRune => "untyped rune",
            BasicKind::UntypedFloat => "untyped float",
            BasicKind::UntypedComplex => "untyped complex",
            BasicKind::UntypedString => "untyped string",
            BasicKind::UntypedNil => "untyped nil",
        }
    }

    pub fn is_untyped(self) -> bool {
        matches!(
            self,
            BasicKind::UntypedBool
                | BasicKind::UntypedInt
                | BasicKind::UntypedRune
                | BasicKind::UntypedFloat
                | BasicKind::UntypedComplex
                | BasicKind::UntypedString
                | BasicKind::UntypedNil
        )
    }

    pub fn is_string(self) -> bool {
        matches!(self, BasicKind::String | BasicKind::UntypedString)
    }

    pub fn is_integer(self) -> bool {
        matches!(
            self,
            BasicKind::Int
                | BasicKind::Int8
                | BasicKind::Int16
                | BasicKind::Int32
                | BasicKind::Int64
                | BasicKind::Uint
                | BasicKind::Uint8
                | BasicKind::Uint16
                | BasicKind::Uint32
                | BasicKind::Uint64
                | BasicKind::Uintptr
                | BasicKind::Byte
                | BasicKind::Rune
                | BasicKind::UntypedInt
                | BasicKind::UntypedRune
        )
    }
}

/// Reference to a named (defined) type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NamedType {
    /// `None` for predeclared types (`error`, `comparable`)
    pub package: Option<PackageId>,
    pub name: String,
    pub args: Vec<Type>,
    /// Index of a function-local declaration inside its package
    pub local: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ArrayLen {
    Const(u64),
    /// Length expression that could not be folded, as written
    Expr(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct FuncType {
    pub params: Vec<Type>,
    pub results: Vec<Type>,
    pub variadic: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Field {
    pub name: String,
    pub ty: Type,
    pub embedded: bool,
    pub tag: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct InterfaceType {
    pub methods: Vec<(String, FuncType)>,
    pub embeds: Vec<Type>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Term {
    pub tilde: bool,
    pub ty: Type,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    Basic(BasicKind),
    Named(Arc<NamedType>),
    TypeParam(String),
    Pointer(Box<Type>),
    Slice(Box<Type>),
    Array { len: ArrayLen, elem: Box<Type> },
    Map { key: Box<Type>, value: Box<Type> },
    Chan { dir: ChanDir, elem: Box<Type> },
    Func(Box<FuncType>),
    Struct(Vec<Field>),
    Interface(Box<InterfaceType>),
    Union(Vec<Term>),
    Tuple(Vec<Type>),
    Invalid,
}

impl Type {
    pub fn named(package: Option<PackageId>, name: impl Into<String>, args: Vec<Type>) -> Type {
        Type::Named(Arc::new(NamedType {
            package,
            name: name.into(),
            args,
            local: None,
        }))
    }

    pub fn empty_interface() -> Type {
        Type::Interface(Box::default())
    }

    pub fn is_invalid(&self) -> bool {
        matches!(self, Type::Invalid)
    }

    pub fn as_named(&self) -> Option<&NamedType> {
        match self {
            Type::Named(named) => Some(named),
            _ => None,
        }
    }

    /// Default type of an untyped constant; other types are returned as is.
    pub fn default_type(&self) -> Type {
        match self {
            Type::Basic(kind) => Type::Basic(match kind {
                BasicKind::UntypedBool => BasicKind::Bool,
                BasicKind::UntypedInt => BasicKind::Int,
                BasicKind::UntypedRune => BasicKind::Rune,
                BasicKind::UntypedFloat => BasicKind::Float64,
                BasicKind::UntypedComplex => BasicKind::Complex128,
                BasicKind::UntypedString => BasicKind::String,
                BasicKind::UntypedNil => return Type::Invalid,
                other => *other,
            }),
            other => other.clone(),
        }
    }

    pub fn is_untyped(&self) -> bool {
        matches!(self, Type::Basic(kind) if kind.is_untyped())
    }

    /// Replace type parameters by name.
    pub fn subst(&self, map: &HashMap<String, Type>) -> Type {
        if map.is_empty() {
            return self.clone();
        }
        match self {
            Type::TypeParam(name) => map.get(name).cloned().unwrap_or_else(|| self.clone()),
            Type::Named(named) if !named.args.is_empty() => Type::Named(Arc::new(NamedType {
                package: named.package.clone(),
                name: named.name.clone(),
                args: named.args.iter().map(|arg| arg.subst(map)).collect(),
                local: named.local,
            })),
            Type::Pointer(elem) => Type::Pointer(Box::new(elem.subst(map))),
            Type::Slice(elem) => Type::Slice(Box::new(elem.subst(map))),
            Type::Array { len, elem } => Type::Array {
                len: len.clone(),
                elem: Box::new(elem.subst(map)),
            },
            Type::Map { key, value } => Type::Map {
                key: Box::new(key.subst(map)),
                value: Box::new(value.subst(map)),
            },
            Type::Chan { dir, elem } => Type::Chan {
                dir: *dir,
                elem: Box::new(elem.subst(map)),
            },
            Type::Func(func) => Type::Func(Box::new(func.subst(map))),
            Type::Struct(fields) => Type::Struct(
                fields
                    .iter()
                    .map(|field| Field {
                        ty: field.ty.subst(map),
                        ..field.clone()
                    })
                    .collect(),
            ),
            Type::Interface(iface) => Type::Interface(Box::new(InterfaceType {
                methods: iface
                    .methods
                    .iter()
                    .map(|(name, sig)| (name.clone(), sig.subst(map)))
                    .collect(),
                embeds: iface.embeds.iter().map(|embed| embed.subst(map)).collect(),
            })),
            Type::Union(terms) => Type::Union(
                terms
                    .iter()
                    .map(|term| Term {
                        tilde: term.tilde,
                        ty: term.ty.subst(map),
                    })
                    .collect(),
            ),
            Type::Tuple(items) => Type::Tuple(items.iter().map(|item| item.subst(map)).collect()),
            _ => self.clone(),
        }
    }

    /// Pre-order traversal of this type and every type it mentions.
    pub fn walk(&self, visit: &mut dyn FnMut(&Type)) {
        visit(self);
        match self {
            Type::Named(named) => named.args.iter().for_each(|arg| arg.walk(visit)),
            Type::Pointer(elem) | Type::Slice(elem) => elem.walk(visit),
            Type::Array { elem, .. } | Type::Chan { elem, .. } => elem.walk(visit),
            Type::Map { key, value } => {
                key.walk(visit);
                value.walk(visit);
            }
            Type::Func(func) => func.walk(visit),
            Type::Struct(fields) => fields.iter().for_each(|field| field.ty.walk(visit)),
            Type::Interface(iface) => {
                iface.methods.iter().for_each(|(_, sig)| sig.walk(visit));
                iface.embeds.iter().for_each(|embed| embed.walk(visit));
            }
            Type::Union(terms) => terms.iter().for_each(|term| term.ty.walk(visit)),
            Type::Tuple(items) => items.iter().for_each(|item| item.walk(visit)),
            Type::Basic(_) | Type::TypeParam(_) | Type::Invalid => {}
        }
    }

    /// Write the type, asking `qualifier` for the prefix of every package
    /// reference. A `None` prefix writes the bare name.
    pub fn write(&self, out: &mut String, qualifier: &mut dyn FnMut(&PackageId) -> Option<String>) {
        match self {
            Type::Basic(BasicKind::UnsafePointer) => {
                let unsafe_pkg = PackageId {
                    path: "unsafe".into(),
                    name: "unsafe".into(),
                };
                write_qualified(out, qualifier(&unsafe_pkg), "Pointer");
            }
            Type::Basic(kind) => out.push_str(kind.name()),
            Type::Named(named) => {
                let prefix = named.package.as_ref().and_then(|pkg| qualifier(pkg));
                write_qualified(out, prefix, &named.name);
                if !named.args.is_empty() {
                    out.push('[');
                    write_list(out, &named.args, qualifier);
                    out.push(']');
                }
            }
            Type::TypeParam(name) => out.push_str(name),
            Type::Pointer(elem) => {
                out.push('*');
                elem.write(out, qualifier);
            }
            Type::Slice(elem) => {
                out.push_str("[]");
                elem.write(out, qualifier);
            }
            Type::Array { len, elem } => {
                match len {
                    ArrayLen::Const(n) => out.push_str(&format!("[{}]", n)),
                    ArrayLen::Expr(text) => out.push_str(&format!("[{}]", text)),
                }
                elem.write(out, qualifier);
            }
            Type::Map { key, value } => {
                out.push_str("map[");
                key.write(out, qualifier);
                out.push(']');
                value.write(out, qualifier);
            }
            Type::Chan { dir, elem } => {
                let paren = *dir == ChanDir::Both
                    && matches!(elem.as_ref(), Type::Chan { dir: ChanDir::Recv, .. });
                out.push_str(match dir {
                    ChanDir::Both => "chan ",
                    ChanDir::Send => "chan<- ",
                    ChanDir::Recv => "<-chan ",
                });
                if paren {
                    out.push('(');
                }
                elem.write(out, qualifier);
                if paren {
                    out.push(')');
                }
            }
            Type::Func(func) => {
                out.push_str("func");
                func.write_signature(out, qualifier);
            }
            Type::Struct(fields) => {
                out.push_str("struct{");
                for (i, field) in fields.iter().enumerate() {
                    if i > 0 {
                        out.push_str("; ");
                    }
                    if !field.embedded {
                        out.push_str(&field.name);
                        out.push(' ');
                    }
                    field.ty.write(out, qualifier);
                    if let Some(tag) = &field.tag {
                        out.push_str(&format!(" {:?}", tag));
                    }
                }
                out.push('}');
            }
            Type::Interface(iface) => {
                if iface.methods.is_empty() && iface.embeds.is_empty() {
                    out.push_str("any");
                    return;
                }
                out.push_str("interface{");
                let mut first = true;
                for (name, sig) in &iface.methods {
                    if !first {
                        out.push_str("; ");
                    }
                    first = false;
                    out.push_str(name);
                    sig.write_signature(out, qualifier);
                }
                for embed in &iface.embeds {
                    if !first {
                        out.push_str("; ");
                    }
                    first = false;
                    embed.write(out, qualifier);
                }
                out.push('}');
            }
            Type::Union(terms) => {
                for (i, term) in terms.iter().enumerate() {
                    if i > 0 {
                        out.push_str(" | ");
                    }
                    if term.tilde {
                        out.push('~');
                    }
                    term.ty.write(out, qualifier);
                }
            }
            Type::Tuple(items) => {
                out.push('(');
                write_list(out, items, qualifier);
                out.push(')');
            }
            Type::Invalid => out.push_str("invalid type"),
        }
    }
}

fn write_qualified(out: &mut String, prefix: Option<String>, name: &str) {
    if let Some(prefix) = prefix {
        out.push_str(&prefix);
        out.push('.');
    }
    out.push_str(name);
}

fn write_list(out: &mut String, items: &[Type], qualifier: &mut dyn FnMut(&PackageId) -> Option<String>) {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        item.write(out, qualifier);
    }
}

impl FuncType {
    pub fn subst(&self, map: &HashMap<String, Type>) -> FuncType {
        FuncType {
            params: self.params.iter().map(|p| p.subst(map)).collect(),
            results: self.results.iter().map(|r| r.subst(map)).collect(),
            variadic: self.variadic,
        }
    }

    fn walk(&self, visit: &mut dyn FnMut(&Type)) {
        self.params.iter().for_each(|p| p.walk(visit));
        self.results.iter().for_each(|r| r.walk(visit));
    }

    /// Result of a call: nothing, one type, or a tuple.
    pub fn result(&self) -> Option<Type> {
        match self.results.as_slice() {
            [] => None,
            [single] => Some(single.clone()),
            many => Some(Type::Tuple(many.to_vec())),
        }
    }

    /// `(int, ...string) (bool, error)`
    fn write_signature(&self, out: &mut String, qualifier: &mut dyn FnMut(&PackageId) -> Option<String>) {
        out.push('(');
        let last = self.params.len().saturating_sub(1);
        for (i, param) in self.params.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            if self.variadic && i == last {
                out.push_str("...");
                match param {
                    Type::Slice(elem) => elem.write(out, qualifier),
                    other => other.write(out, qualifier),
                }
            } else {
                param.write(out, qualifier);
            }
        }
        out.push(')');
        match self.results.as_slice() {
            [] => {}
            [single] => {
                out.push(' ');
                single.write(out, qualifier);
            }
            many => {
                out.push_str(" (");
                write_list(out, many, qualifier);
                out.push(')');
            }
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::new();
        self.write(&mut out, &mut |pkg| Some(pkg.path.clone()));
        f.write_str(&out)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SymbolKind {
    Type,
    Value,
    Function,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MethodSig {
    /// Declared on the pointer receiver
    pub pointer: bool,
    pub sig: FuncType,
}

/// A named top-level entity of a package.
#[derive(Debug, Clone)]
pub struct Symbol {
    pub name: String,
    pub kind: SymbolKind,
    pub ty: Type,
    pub underlying: Type,
    /// Type parameter names of a generic type or function
    pub type_params: Vec<String>,
    /// Methods declared on a defined type, keyed by name
    pub methods: BTreeMap<String, MethodSig>,
    /// Folded value of a constant
    pub value: Option<ConstValue>,
    pub location: Option<Location>,
}

impl Symbol {
    pub fn new(name: impl Into<String>, kind: SymbolKind, ty: Type, underlying: Type) -> Self {
        Self {
            name: name.into(),
            kind,
            ty,
            underlying,
            type_params: Vec::new(),
            methods: BTreeMap::new(),
            value: None,
            location: None,
        }
    }

    pub fn is_exported(&self) -> bool {
        is_exported(&self.name)
    }

    /// Underlying type of `args`-instantiation of this generic type symbol.
    pub fn instantiate(&self, args: &[Type]) -> Type {
        if self.type_params.is_empty() || args.len() != self.type_params.len() {
            return self.underlying.clone();
        }
        let map: HashMap<String, Type> = self
            .type_params
            .iter()
            .cloned()
            .zip(args.iter().cloned())
            .collect();
        self.underlying.subst(&map)
    }
}

pub fn is_exported(name: &str) -> bool {
    name.chars().next().is_some_and(char::is_uppercase)
}

/// Identifier → symbol, iterated in name order.
#[derive(Debug, Clone, Default)]
pub struct Scope {
    symbols: BTreeMap<String, Symbol>,
}

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, symbol: Symbol) {
        self.symbols.insert(symbol.name.clone(), symbol);
    }

    pub fn lookup(&self, name: &str) -> Option<&Symbol> {
        self.symbols.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.symbols.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Symbol> {
        self.symbols.values()
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}

/// Result of checking one package.
#[derive(Debug, Clone)]
pub struct TypedPackage {
    pub path: String,
    pub name: String,
    pub imports: Vec<Arc<TypedPackage>>,
    pub scope: Scope,
    /// False for placeholders of packages whose sources were not loaded
    pub complete: bool,
}

impl TypedPackage {
    /// Placeholder for a package that was not loaded.
    pub fn opaque(path: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            name: name.into(),
            imports: Vec::new(),
            scope: Scope::new(),
            complete: false,
        }
    }

    pub fn id(&self) -> PackageId {
        PackageId {
            path: self.path.clone(),
            name: self.name.clone(),
        }
    }

    pub fn lookup(&self, name: &str) -> Option<&Symbol> {
        self.scope.lookup(name)
    }

    /// Underlying type of a named type declared in this package.
    pub fn underlying_of(&self, named: &NamedType) -> Option<Type> {
        let symbol = self.lookup(&named.name)?;
        (symbol.kind == SymbolKind::Type).then(|| symbol.instantiate(&named.args))
    }
}

/// Conventional package name for an import path: the last element, without
/// a major version suffix or a `go-` prefix.
pub fn guess_package_name(path: &str) -> String {
    let mut segments = path.rsplit('/');
    let mut last = segments.next().unwrap_or(path);
    let is_major_version = last.len() > 1
        && last.starts_with('v')
        && last[1..].chars().all(|c| c.is_ascii_digit());
    if is_major_version {
        last = segments.next().unwrap_or(last);
    }
    let last = last.split('.').next().unwrap_or(last);
    let last = last.strip_prefix("go-").unwrap_or(last);
    last.replace('-', "_")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pkg(path: &str, name: &str) -> Option<PackageId> {
        Some(PackageId {
            path: path.into(),
            name: name.into(),
        })
    }

    #[test]
    fn test_display_qualifies_by_path() {
        let user = Type::named(pkg("example.com/app/model", "model"), "User", vec![]);
        let ty = Type::Slice(Box::new(Type::Pointer(Box::new(user))));
        assert_eq!(ty.to_string(), "[]*example.com/app/model.User");
    }

    #[test]
    fn test_write_with_qualifier() {
        let user = Type::named(pkg("example.com/app/model", "model"), "User", vec![]);
        let ty = Type::Map {
            key: Box::new(Type::Basic(BasicKind::String)),
            value: Box::new(user),
        };
        let mut out = String::new();
        ty.write(&mut out, &mut |pkg| Some(pkg.name.clone()));
        assert_eq!(out, "map[string]model.User");
    }

    #[test]
    fn test_func_and_chan_display() {
        let func = Type::Func(Box::new(FuncType {
            params: vec![
                Type::Basic(BasicKind::Int),
                Type::Slice(Box::new(Type::Basic(BasicKind::String))),
            ],
            results: vec![Type::Basic(BasicKind::Bool), Type::named(None, "error", vec![])],
            variadic: true,
        }));
        assert_eq!(func.to_string(), "func(int, ...string) (bool, error)");

        let chan = Type::Chan {
            dir: ChanDir::Both,
            elem: Box::new(Type::Chan {
                dir: ChanDir::Recv,
                elem: Box::new(Type::Basic(BasicKind::Byte)),
            }),
        };
        assert_eq!(chan.to_string(), "chan (<-chan byte)");
    }

    #[test]
    fn test_empty_interface_is_any() {
        assert_eq!(Type::empty_interface().to_string(), "any");
        assert_eq!(Type::Struct(vec![]).to_string(), "struct{}");
    }

    #[test]
    fn test_subst_generic() {
        let list = Type::named(
            pkg("demo", "demo"),
            "List",
            vec![Type::TypeParam("T".into())],
        );
        let map = HashMap::from([("T".to_string(), Type::Basic(BasicKind::Int))]);
        assert_eq!(list.subst(&map).to_string(), "demo.List[int]");
    }

    #[test]
    fn test_default_type() {
        assert_eq!(
            Type::Basic(BasicKind::UntypedRune).default_type(),
            Type::Basic(BasicKind::Rune)
        );
        assert!(Type::Basic(BasicKind::UntypedNil).default_type().is_invalid());
    }

    #[test]
    fn test_guess_package_name() {
        assert_eq!(guess_package_name("fmt"), "fmt");
        assert_eq!(guess_package_name("gopkg.in/yaml.v3"), "yaml");
        assert_eq!(guess_package_name("github.com/foo/bar/v2"), "bar");
        assert_eq!(guess_package_name("github.com/mattn/go-sqlite3"), "sqlite3");
    }

    #[test]
    fn test_channel_types_hash_by_direction() {
        use std::collections::HashSet;
        let chan = |dir| Type::Chan {
            dir,
            elem: Box::new(Type::Basic(BasicKind::Int)),
        };
        let set: HashSet<Type> = [chan(ChanDir::Send), chan(ChanDir::Recv), chan(ChanDir::Send)].into_iter().collect();
        assert_eq!(set.len(), 2);
        assert!(set.contains(&chan(ChanDir::Recv)));
        assert!(!set.contains(&chan(ChanDir::Both)));
    }
}
