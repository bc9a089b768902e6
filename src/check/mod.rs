//! Type checker.
//!
//! Checking runs in passes over all files of one package:
//!
//! 1. `collect` binds imports per file and top-level names per package.
//! 2. `decls` resolves declarations lazily, on first use, so declaration
//!    order does not matter. Named types get their underlying form by
//!    unwrapping named layers; a cycle of layers is an error.
//! 3. `stmts` and `exprs` check function bodies and initializers with block
//!    scopes (full mode only).
//! 4. Imports never mentioned in their file are reported.
//!
//! Shallow mode, used for dependency packages, stops after step 2 and never
//! calls the import resolver.

pub mod constant;
pub mod universe;

mod collect;
mod decls;
mod exprs;
mod stmts;

use crate::ast::{Expr, FuncDecl, Ident, ImportName, TypeSpec, ValueSpec, TypeExpr};
use crate::error::{TypeError, TypeErrorKind};
use crate::importer::ImportResolver;
use crate::parser::{Span, SyntaxTree};
use crate::types::{MethodSig, PackageId, Scope, Symbol, Type, TypedPackage};
use constant::ConstValue;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use universe::Universal;

type Result<T> = std::result::Result<T, TypeError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Every name must resolve; bodies and imports are checked
    Full,
    /// Declarations only, imports are opaque, unresolved names are tolerated
    Shallow,
}

/// Checks the syntax trees of one package.
pub struct TypeChecker<'r> {
    path: String,
    resolver: Option<&'r dyn ImportResolver>,
    mode: Mode,
}

impl<'r> TypeChecker<'r> {
    pub fn new(path: impl Into<String>, resolver: &'r dyn ImportResolver) -> Self {
        Self {
            path: path.into(),
            resolver: Some(resolver),
            mode: Mode::Full,
        }
    }

    pub fn shallow(path: impl Into<String>) -> TypeChecker<'static> {
        TypeChecker {
            path: path.into(),
            resolver: None,
            mode: Mode::Shallow,
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn check(&self, trees: &[SyntaxTree]) -> Result<TypedPackage> {
        let Some(first) = trees.first() else {
            return Err(TypeError::new(
                TypeErrorKind::PackageMismatch,
                format!("no Go files for package {}", self.path),
                None,
            ));
        };

        let mut checker = Checker {
            path: self.path.clone(),
            name: first.package_name().to_string(),
            mode: self.mode,
            resolver: self.resolver,
            trees,
            files: Vec::with_capacity(trees.len()),
            decls: BTreeMap::new(),
            methods: BTreeMap::new(),
            packages: BTreeMap::new(),
            symbols: HashMap::new(),
            underlying: HashMap::new(),
            method_sets: HashMap::new(),
            in_progress: Vec::new(),
            resolving: HashSet::new(),
            local_types: Vec::new(),
            scopes: Vec::new(),
            file: 0,
            iota: None,
        };

        checker.collect()?;
        if self.mode == Mode::Full {
            checker.check_package()?;
            checker.check_unused_imports()?;
        }
        let package = checker.finish();
        tracing::debug!(
            path = %package.path,
            name = %package.name,
            symbols = package.scope.len(),
            mode = ?self.mode,
            "checked package"
        );
        Ok(package)
    }
}

/// Package-level declaration, kept until its symbol is resolved.
#[derive(Debug, Clone, Copy)]
enum DeclRef<'a> {
    Type {
        file: usize,
        spec: &'a TypeSpec,
    },
    Var {
        file: usize,
        spec: &'a ValueSpec,
        index: usize,
    },
    Const {
        file: usize,
        name: &'a Ident,
        ty: Option<&'a TypeExpr>,
        value: Option<&'a Expr>,
        iota: u64,
    },
    Func {
        file: usize,
        decl: &'a FuncDecl,
    },
}

impl<'a> DeclRef<'a> {
    fn file(&self) -> usize {
        match self {
            DeclRef::Type { file, .. }
            | DeclRef::Var { file, .. }
            | DeclRef::Const { file, .. }
            | DeclRef::Func { file, .. } => *file,
        }
    }

    fn ident(&self) -> &'a Ident {
        match *self {
            DeclRef::Type { spec, .. } => &spec.name,
            DeclRef::Var { spec, index, .. } => &spec.names[index],
            DeclRef::Const { name, .. } => name,
            DeclRef::Func { decl, .. } => &decl.name,
        }
    }
}

#[derive(Debug, Clone)]
struct FileImport {
    path: String,
    package: Arc<TypedPackage>,
}

#[derive(Debug, Clone, Default)]
struct FileScope {
    imports: BTreeMap<String, FileImport>,
    dots: Vec<Arc<TypedPackage>>,
}

#[derive(Debug, Clone)]
enum LocalKind {
    Var,
    Const(Option<ConstValue>),
    Type,
}

#[derive(Debug, Clone)]
struct Local {
    kind: LocalKind,
    ty: Type,
}

/// What an identifier refers to at the current point.
#[derive(Debug, Clone)]
enum Binding {
    Local(Local),
    Package,
    Import(Arc<TypedPackage>),
    Dot(Symbol),
    Universe(Universal),
    /// Possibly supplied by an unloaded dot-import
    Unknown,
}

/// Context saved while a package-level declaration is resolved out of order.
struct Saved {
    file: usize,
    scopes: Vec<HashMap<String, Local>>,
    iota: Option<u64>,
}

struct Checker<'a> {
    path: String,
    name: String,
    mode: Mode,
    resolver: Option<&'a dyn ImportResolver>,
    trees: &'a [SyntaxTree],
    files: Vec<FileScope>,
    decls: BTreeMap<String, DeclRef<'a>>,
    /// Methods by receiver base type name
    methods: BTreeMap<String, Vec<(usize, &'a FuncDecl)>>,
    packages: BTreeMap<String, Arc<TypedPackage>>,
    symbols: HashMap<String, Symbol>,
    underlying: HashMap<String, Type>,
    method_sets: HashMap<String, BTreeMap<String, MethodSig>>,
    /// Named types whose underlying form is being computed
    in_progress: Vec<String>,
    /// Aliases, constants and variables being resolved
    resolving: HashSet<String>,
    /// Underlying forms of function-local named types
    local_types: Vec<Type>,
    scopes: Vec<HashMap<String, Local>>,
    file: usize,
    iota: Option<u64>,
}

impl<'a> Checker<'a> {
    fn shallow(&self) -> bool {
        self.mode == Mode::Shallow
    }

    fn id(&self) -> PackageId {
        PackageId {
            path: self.path.clone(),
            name: self.name.clone(),
        }
    }

    fn error(&self, kind: TypeErrorKind, message: impl Into<String>, span: Span) -> TypeError {
        let location = self.trees[self.file].location(span);
        TypeError::new(kind, message, Some(location))
    }

    fn error_in(&self, file: usize, kind: TypeErrorKind, message: impl Into<String>, span: Span) -> TypeError {
        let location = self.trees[file].location(span);
        TypeError::new(kind, message, Some(location))
    }

    /// Source text of a span in the current file.
    fn text(&self, span: Span) -> &str {
        let source: &str = &self.trees[self.file].source;
        source.get(span.start..span.end).unwrap_or("")
    }

    /// Type as the Go toolchain prints it in diagnostics: local names bare,
    /// foreign names qualified by package name.
    fn type_string(&self, ty: &Type) -> String {
        let mut out = String::new();
        ty.write(&mut out, &mut |pkg| {
            (pkg.path != self.path).then(|| pkg.name.clone())
        });
        out
    }

    fn enter(&mut self, file: usize) -> Saved {
        Saved {
            file: std::mem::replace(&mut self.file, file),
            scopes: std::mem::take(&mut self.scopes),
            iota: self.iota.take(),
        }
    }

    fn leave(&mut self, saved: Saved) {
        self.file = saved.file;
        self.scopes = saved.scopes;
        self.iota = saved.iota;
    }

    fn push_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    fn pop_scope(&mut self) {
        self.scopes.pop();
    }

    /// Bind a name in the innermost block scope.
    fn declare_local(&mut self, ident: &Ident, local: Local) {
        if ident.is_blank() {
            return;
        }
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(ident.name.clone(), local);
        }
    }

    fn declared_in_block(&self, name: &str) -> bool {
        self.scopes
            .last()
            .is_some_and(|scope| scope.contains_key(name))
    }

    fn lookup(&self, name: &str) -> Option<Binding> {
        for scope in self.scopes.iter().rev() {
            if let Some(local) = scope.get(name) {
                return Some(Binding::Local(local.clone()));
            }
        }
        if self.decls.contains_key(name) {
            return Some(Binding::Package);
        }
        let file = &self.files[self.file];
        if let Some(import) = file.imports.get(name) {
            return Some(Binding::Import(import.package.clone()));
        }
        for package in &file.dots {
            if let Some(symbol) = package.lookup(name).filter(|s| s.is_exported()) {
                return Some(Binding::Dot(symbol.clone()));
            }
        }
        if let Some(universal) = universe::lookup(name) {
            return Some(Binding::Universe(universal));
        }
        if file.dots.iter().any(|package| !package.complete) {
            return Some(Binding::Unknown);
        }
        None
    }

    fn check_unused_imports(&self) -> Result<()> {
        for (file, tree) in self.trees.iter().enumerate() {
            for spec in &tree.file.imports {
                if spec.path == "C" {
                    continue;
                }
                let (name, renamed) = match &spec.name {
                    Some(ImportName::Blank(_)) | Some(ImportName::Dot(_)) => continue,
                    Some(ImportName::Named(ident)) => (ident.name.clone(), true),
                    None => match self.packages.get(&spec.path) {
                        Some(package) => {
                            let last = spec.path.rsplit('/').next().unwrap_or(&spec.path);
                            (package.name.clone(), package.name != last)
                        }
                        None => continue,
                    },
                };
                if tree.mentions.contains(&name) {
                    continue;
                }
                let message = if renamed {
                    format!("\"{}\" imported as {} and not used", spec.path, name)
                } else {
                    format!("\"{}\" imported and not used", spec.path)
                };
                return Err(self.error_in(file, TypeErrorKind::UnusedImport, message, spec.span));
            }
        }
        Ok(())
    }

    fn finish(mut self) -> TypedPackage {
        let names: Vec<String> = self.decls.keys().cloned().collect();
        let mut scope = Scope::new();
        for name in names {
            scope.insert(self.symbol_or_invalid(&name));
        }
        TypedPackage {
            path: self.path,
            name: self.name,
            imports: self.packages.into_values().collect(),
            scope,
            complete: true,
        }
    }
}
