//! Package-level declarations, resolved lazily.

use super::{Binding, Checker, DeclRef, Local, LocalKind, Mode, Result};
use crate::ast::{
    Decl, FieldDecl, FuncDecl, Ident, InterfaceElem, Signature, TypeExpr, TypeExprKind, TypeParam,
};
use crate::check::exprs::Operand;
use crate::check::universe::{self, Universal};
use crate::error::TypeErrorKind;
use crate::types::{
    ArrayLen, Field, FuncType, InterfaceType, MethodSig, NamedType, Symbol, SymbolKind, Term, Type,
    TypedPackage,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

impl<'a> Checker<'a> {
    /// Full mode: resolve every declaration and check every body, in
    /// source order.
    pub(super) fn check_package(&mut self) -> Result<()> {
        let trees = self.trees;
        for (file, tree) in trees.iter().enumerate() {
            for decl in &tree.file.decls {
                match decl {
                    Decl::Type(specs) => {
                        for spec in specs.iter().filter(|spec| !spec.name.is_blank()) {
                            self.resolve_symbol(&spec.name.name)?;
                        }
                    }
                    Decl::Var(specs) | Decl::Const(specs) => {
                        for spec in specs {
                            if spec.names.iter().any(Ident::is_blank) {
                                self.check_values(file, &spec.values)?;
                            }
                            for name in spec.names.iter().filter(|name| !name.is_blank()) {
                                self.resolve_symbol(&name.name)?;
                            }
                        }
                    }
                    Decl::Func(func) => {
                        if func.recv.is_none() && func.name.name != "init" && !func.name.is_blank() {
                            self.resolve_symbol(&func.name.name)?;
                        }
                        self.check_func(file, func)?;
                    }
                }
            }
        }
        Ok(())
    }

    fn check_values(&mut self, file: usize, values: &[crate::ast::Expr]) -> Result<()> {
        let saved = self.enter(file);
        let result = values.iter().try_for_each(|value| self.value(value).map(drop));
        self.leave(saved);
        result
    }

    /// Resolved symbol, or an invalid placeholder when resolution failed.
    pub(super) fn symbol_or_invalid(&mut self, name: &str) -> Symbol {
        match self.resolve_symbol(name) {
            Ok(symbol) => symbol,
            Err(_) => {
                let kind = match self.decls.get(name) {
                    Some(DeclRef::Type { .. }) => SymbolKind::Type,
                    Some(DeclRef::Func { .. }) => SymbolKind::Function,
                    _ => SymbolKind::Value,
                };
                Symbol::new(name, kind, Type::Invalid, Type::Invalid)
            }
        }
    }

    /// Symbol of a package-level name. In shallow mode failures degrade to
    /// an invalid type instead of an error.
    pub(super) fn resolve_symbol(&mut self, name: &str) -> Result<Symbol> {
        if let Some(symbol) = self.symbols.get(name) {
            return Ok(symbol.clone());
        }
        let Some(decl) = self.decls.get(name).copied() else {
            return Ok(Symbol::new(name, SymbolKind::Value, Type::Invalid, Type::Invalid));
        };

        let cyclic = !matches!(decl, DeclRef::Type { spec, .. } if !spec.alias)
            && !matches!(decl, DeclRef::Func { .. });
        if cyclic && !self.resolving.insert(name.to_string()) {
            if let DeclRef::Type { file, spec } = decl
                && self.mode == Mode::Full
            {
                return Err(self.error_in(
                    file,
                    TypeErrorKind::InvalidRecursiveType,
                    format!("invalid recursive type {}", name),
                    spec.name.span,
                ));
            }
            // Initialization cycles are left to the compiler.
            return Ok(Symbol::new(name, SymbolKind::Value, Type::Invalid, Type::Invalid));
        }

        let saved = self.enter(decl.file());
        let result = self.compute_symbol(name, decl);
        self.leave(saved);
        if cyclic {
            self.resolving.remove(name);
        }

        let mut symbol = match result {
            Ok(symbol) => symbol,
            Err(_) if self.shallow() => {
                let kind = match decl {
                    DeclRef::Type { .. } => SymbolKind::Type,
                    DeclRef::Func { .. } => SymbolKind::Function,
                    _ => SymbolKind::Value,
                };
                Symbol::new(name, kind, Type::Invalid, Type::Invalid)
            }
            Err(err) => return Err(err),
        };
        symbol.location = Some(self.trees[decl.file()].location(decl.ident().span));
        self.symbols.insert(name.to_string(), symbol.clone());
        Ok(symbol)
    }

    fn compute_symbol(&mut self, name: &str, decl: DeclRef<'a>) -> Result<Symbol> {
        match decl {
            DeclRef::Type { spec, .. } if !spec.alias => {
                let params = param_names(&spec.type_params);
                let ty = self.declared_type(name, &params);
                let underlying = self.named_underlying(name)?;
                let mut symbol = Symbol::new(name, SymbolKind::Type, ty, underlying);
                symbol.methods = self.method_set(name)?;
                symbol.type_params = params;
                Ok(symbol)
            }
            DeclRef::Type { spec, .. } => {
                let ty = self.with_type_params(&spec.type_params, |c| c.resolve_type(&spec.ty))?;
                let underlying = self.underlying(&ty)?;
                let mut symbol = Symbol::new(name, SymbolKind::Type, ty, underlying);
                symbol.type_params = param_names(&spec.type_params);
                Ok(symbol)
            }
            DeclRef::Const { ty, value, iota, .. } => {
                self.iota = Some(iota);
                let declared = ty.map(|ty| self.resolve_type(ty)).transpose()?;
                let operand = match value {
                    Some(value) => self.operand(value)?,
                    None => Operand::Value(Type::Invalid),
                };
                let (ty, value) = match operand {
                    Operand::Const(ty, value) => (declared.unwrap_or(ty), Some(value)),
                    other => (declared.unwrap_or_else(|| other.ty()), None),
                };
                let underlying = self.underlying(&ty)?;
                let mut symbol = Symbol::new(name, SymbolKind::Value, ty, underlying);
                symbol.value = value;
                Ok(symbol)
            }
            DeclRef::Var { spec, index, .. } => {
                let declared = spec.ty.as_ref().map(|ty| self.resolve_type(ty)).transpose()?;
                let inferred = if spec.values.is_empty() {
                    Type::Invalid
                } else {
                    let types = self.assign_types(&spec.values, spec.names.len())?;
                    types.get(index).cloned().unwrap_or(Type::Invalid)
                };
                let ty = declared.unwrap_or_else(|| inferred.default_type());
                let underlying = self.underlying(&ty)?;
                Ok(Symbol::new(name, SymbolKind::Value, ty, underlying))
            }
            DeclRef::Func { decl, .. } => {
                let sig = self.with_type_params(&decl.type_params, |c| c.resolve_signature(&decl.sig))?;
                let ty = Type::Func(Box::new(sig));
                let mut symbol = Symbol::new(name, SymbolKind::Function, ty.clone(), ty);
                symbol.type_params = param_names(&decl.type_params);
                Ok(symbol)
            }
        }
    }

    /// `Name[T, U]` for a defined type of this package.
    fn declared_type(&self, name: &str, params: &[String]) -> Type {
        let args = params.iter().cloned().map(Type::TypeParam).collect();
        Type::named(Some(self.id()), name, args)
    }

    fn type_param_names(&self, name: &str) -> Vec<String> {
        match self.decls.get(name) {
            Some(DeclRef::Type { spec, .. }) => param_names(&spec.type_params),
            _ => Vec::new(),
        }
    }

    /// Underlying type of a defined type of this package.
    pub(super) fn named_underlying(&mut self, name: &str) -> Result<Type> {
        if let Some(ty) = self.underlying.get(name) {
            return Ok(ty.clone());
        }
        let Some(DeclRef::Type { file, spec }) = self.decls.get(name).copied() else {
            return Ok(Type::Invalid);
        };
        if self.in_progress.iter().any(|pending| pending == name) {
            return Err(self.error_in(
                file,
                TypeErrorKind::InvalidRecursiveType,
                format!("invalid recursive type {}", name),
                spec.name.span,
            ));
        }

        self.in_progress.push(name.to_string());
        let saved = self.enter(file);
        let result = self.with_type_params(&spec.type_params, |c| {
            let ty = c.resolve_type(&spec.ty)?;
            c.underlying(&ty)
        });
        self.leave(saved);
        self.in_progress.pop();

        let underlying = match result {
            Ok(ty) => ty,
            Err(_) if self.shallow() => Type::Invalid,
            Err(err) => return Err(err),
        };
        self.underlying.insert(name.to_string(), underlying.clone());
        Ok(underlying)
    }

    pub(super) fn underlying(&mut self, ty: &Type) -> Result<Type> {
        let Type::Named(named) = ty else {
            return Ok(ty.clone());
        };
        if let Some(index) = named.local {
            return Ok(self.local_types.get(index).cloned().unwrap_or(Type::Invalid));
        }
        match &named.package {
            None => Ok(universe::underlying(&named.name)),
            Some(package) if package.path == self.path => {
                let underlying = self.named_underlying(&named.name)?;
                let params = self.type_param_names(&named.name);
                if named.args.is_empty() || params.len() != named.args.len() {
                    return Ok(underlying);
                }
                let map: HashMap<String, Type> =
                    params.into_iter().zip(named.args.iter().cloned()).collect();
                Ok(underlying.subst(&map))
            }
            Some(package) => Ok(self
                .find_package(&package.path)
                .and_then(|package| package.underlying_of(named))
                .unwrap_or(Type::Invalid)),
        }
    }

    fn find_package(&self, path: &str) -> Option<Arc<TypedPackage>> {
        if let Some(package) = self.packages.get(path) {
            return Some(package.clone());
        }
        self.packages
            .values()
            .flat_map(|package| package.imports.iter())
            .find(|package| package.path == path && package.complete)
            .cloned()
    }

    /// Methods of a named type; `None` when the set is not known.
    pub(super) fn named_methods(&mut self, named: &NamedType) -> Result<Option<BTreeMap<String, MethodSig>>> {
        if named.local.is_some() {
            return Ok(Some(BTreeMap::new()));
        }
        match &named.package {
            None if named.name == "error" => Ok(Some(BTreeMap::from([(
                "Error".to_string(),
                MethodSig {
                    pointer: false,
                    sig: FuncType {
                        params: vec![],
                        results: vec![Type::Basic(crate::types::BasicKind::String)],
                        variadic: false,
                    },
                },
            )]))),
            None => Ok(Some(BTreeMap::new())),
            Some(package) if package.path == self.path => match self.decls.get(&named.name).copied() {
                Some(DeclRef::Type { spec, .. }) if !spec.alias => Ok(Some(self.method_set(&named.name)?)),
                _ => Ok(None),
            },
            Some(package) => Ok(self
                .find_package(&package.path)
                .filter(|package| package.complete)
                .and_then(|package| package.lookup(&named.name).map(|symbol| symbol.methods.clone()))),
        }
    }

    fn method_set(&mut self, name: &str) -> Result<BTreeMap<String, MethodSig>> {
        if let Some(set) = self.method_sets.get(name) {
            return Ok(set.clone());
        }
        // Recursion through a method signature sees the set as empty.
        self.method_sets.insert(name.to_string(), BTreeMap::new());

        let methods = self.methods.get(name).cloned().unwrap_or_default();
        let mut set = BTreeMap::new();
        for (file, func) in methods {
            let Some(recv) = &func.recv else { continue };
            let saved = self.enter(file);
            self.push_scope();
            let result = self
                .bind_receiver_params(func)
                .and_then(|_| self.resolve_signature(&func.sig));
            self.leave(saved);
            let sig = match result {
                Ok(sig) => sig,
                Err(_) if self.shallow() => FuncType::default(),
                Err(err) => return Err(err),
            };
            set.insert(
                func.name.name.clone(),
                MethodSig {
                    pointer: recv.pointer,
                    sig,
                },
            );
        }
        self.method_sets.insert(name.to_string(), set.clone());
        Ok(set)
    }

    /// Receiver type parameters name the base type's parameters by
    /// position.
    fn bind_receiver_params(&mut self, func: &FuncDecl) -> Result<Type> {
        let Some(recv) = &func.recv else {
            return Ok(Type::Invalid);
        };
        let params = self.type_param_names(&recv.base.name);
        if self.mode == Mode::Full && params.len() != recv.type_params.len() {
            return Err(self.error(
                TypeErrorKind::InvalidReceiver,
                format!(
                    "got {} type parameters, but receiver base type declares {}",
                    recv.type_params.len(),
                    params.len()
                ),
                recv.span,
            ));
        }
        for (ident, param) in recv.type_params.iter().zip(&params) {
            self.declare_local(
                ident,
                Local {
                    kind: LocalKind::Type,
                    ty: Type::TypeParam(param.clone()),
                },
            );
        }
        let base = self.declared_type(&recv.base.name, &params);
        Ok(if recv.pointer {
            Type::Pointer(Box::new(base))
        } else {
            base
        })
    }

    /// Check one function or method declaration with its body.
    fn check_func(&mut self, file: usize, func: &FuncDecl) -> Result<()> {
        let saved = self.enter(file);
        self.push_scope();
        let result = self.check_func_in_scope(func);
        self.leave(saved);
        result
    }

    fn check_func_in_scope(&mut self, func: &FuncDecl) -> Result<()> {
        let recv = match &func.recv {
            Some(recv) => {
                let ty = self.bind_receiver_params(func)?;
                if let Some(DeclRef::Type { spec, .. }) = self.decls.get(&recv.base.name).copied()
                    && !spec.alias
                {
                    let underlying = self.named_underlying(&recv.base.name)?;
                    if matches!(underlying, Type::Pointer(_) | Type::Interface(_)) {
                        return Err(self.error(
                            TypeErrorKind::InvalidReceiver,
                            format!(
                                "invalid receiver type {} (pointer or interface type)",
                                recv.base.name
                            ),
                            recv.base.span,
                        ));
                    }
                }
                recv.name.as_ref().map(|name| (name, ty))
            }
            None => {
                self.bind_type_params(&func.type_params)?;
                None
            }
        };
        let sig = self.resolve_signature(&func.sig)?;
        if let Some(body) = &func.body {
            self.check_body(&func.sig, &sig, recv, body)?;
        }
        Ok(())
    }

    fn bind_type_params(&mut self, params: &[TypeParam]) -> Result<()> {
        for param in params {
            for name in &param.names {
                self.declare_local(
                    name,
                    Local {
                        kind: LocalKind::Type,
                        ty: Type::TypeParam(name.name.clone()),
                    },
                );
            }
        }
        if self.mode == Mode::Full {
            for param in params {
                self.resolve_type(&param.constraint)?;
            }
        }
        Ok(())
    }

    /// Run `f` with the type parameters in scope.
    pub(super) fn with_type_params<R>(
        &mut self,
        params: &[TypeParam],
        f: impl FnOnce(&mut Self) -> Result<R>,
    ) -> Result<R> {
        if params.is_empty() {
            return f(self);
        }
        self.push_scope();
        let result = self.bind_type_params(params).and_then(|_| f(self));
        self.pop_scope();
        result
    }

    pub(super) fn resolve_signature(&mut self, sig: &Signature) -> Result<FuncType> {
        let mut params = Vec::with_capacity(sig.params.len());
        for (i, param) in sig.params.iter().enumerate() {
            let ty = self.resolve_type(&param.ty)?;
            if sig.variadic && i + 1 == sig.params.len() {
                params.push(Type::Slice(Box::new(ty)));
            } else {
                params.push(ty);
            }
        }
        let mut results = Vec::with_capacity(sig.results.len());
        for result in &sig.results {
            results.push(self.resolve_type(&result.ty)?);
        }
        Ok(FuncType {
            params,
            results,
            variadic: sig.variadic,
        })
    }

    pub(super) fn resolve_type(&mut self, expr: &TypeExpr) -> Result<Type> {
        let ty = match &expr.kind {
            TypeExprKind::Name(ident) => self.named_type(ident)?,
            TypeExprKind::Qualified { package, name } => self.qualified_type(package, name)?,
            TypeExprKind::Generic { base, args } => {
                let base = self.resolve_type(base)?;
                let args = args
                    .iter()
                    .map(|arg| self.resolve_type(arg))
                    .collect::<Result<Vec<_>>>()?;
                match base {
                    Type::Named(named) => Type::Named(Arc::new(NamedType {
                        args,
                        ..(*named).clone()
                    })),
                    other => other,
                }
            }
            TypeExprKind::Pointer(elem) => Type::Pointer(Box::new(self.resolve_type(elem)?)),
            TypeExprKind::Slice(elem) => Type::Slice(Box::new(self.resolve_type(elem)?)),
            TypeExprKind::Array { len, elem } => {
                let len = match len {
                    Some(len) => self.array_len(len)?,
                    None => ArrayLen::Expr("...".into()),
                };
                Type::Array {
                    len,
                    elem: Box::new(self.resolve_type(elem)?),
                }
            }
            TypeExprKind::Map { key, value } => Type::Map {
                key: Box::new(self.resolve_type(key)?),
                value: Box::new(self.resolve_type(value)?),
            },
            TypeExprKind::Chan { dir, elem } => Type::Chan {
                dir: *dir,
                elem: Box::new(self.resolve_type(elem)?),
            },
            TypeExprKind::Func(sig) => Type::Func(Box::new(self.resolve_signature(sig)?)),
            TypeExprKind::Struct(fields) => Type::Struct(self.resolve_fields(fields)?),
            TypeExprKind::Interface(elems) => {
                let mut iface = InterfaceType::default();
                for elem in elems {
                    match elem {
                        InterfaceElem::Method { name, sig } => {
                            let sig = self.resolve_signature(sig)?;
                            iface.methods.push((name.name.clone(), sig));
                        }
                        InterfaceElem::Embed(ty) => iface.embeds.push(self.resolve_type(ty)?),
                    }
                }
                Type::Interface(Box::new(iface))
            }
            TypeExprKind::Union(terms) => {
                let mut out = Vec::with_capacity(terms.len());
                for term in terms {
                    match &term.kind {
                        TypeExprKind::Tilde(inner) => out.push(Term {
                            tilde: true,
                            ty: self.resolve_type(inner)?,
                        }),
                        _ => out.push(Term {
                            tilde: false,
                            ty: self.resolve_type(term)?,
                        }),
                    }
                }
                Type::Union(out)
            }
            TypeExprKind::Tilde(inner) => Type::Union(vec![Term {
                tilde: true,
                ty: self.resolve_type(inner)?,
            }]),
        };
        Ok(ty)
    }

    fn resolve_fields(&mut self, fields: &[FieldDecl]) -> Result<Vec<Field>> {
        let mut out = Vec::new();
        for field in fields {
            let ty = self.resolve_type(&field.ty)?;
            if field.names.is_empty() {
                out.push(Field {
                    name: embedded_name(&field.ty),
                    ty: if field.embedded_pointer {
                        Type::Pointer(Box::new(ty))
                    } else {
                        ty
                    },
                    embedded: true,
                    tag: field.tag.clone(),
                });
                continue;
            }
            for name in &field.names {
                out.push(Field {
                    name: name.name.clone(),
                    ty: ty.clone(),
                    embedded: false,
                    tag: field.tag.clone(),
                });
            }
        }
        Ok(out)
    }

    fn array_len(&mut self, len: &crate::ast::Expr) -> Result<ArrayLen> {
        let operand = self.operand(len)?;
        Ok(match operand {
            Operand::Const(_, value) => match value.as_int().and_then(|n| u64::try_from(n).ok()) {
                Some(n) => ArrayLen::Const(n),
                None => ArrayLen::Expr(self.text(len.span).to_string()),
            },
            _ => ArrayLen::Expr(self.text(len.span).to_string()),
        })
    }

    fn named_type(&mut self, ident: &Ident) -> Result<Type> {
        if ident.is_blank() {
            return Err(self.error(
                TypeErrorKind::NotAType,
                "cannot use _ as value or type",
                ident.span,
            ));
        }
        match self.lookup(&ident.name) {
            Some(Binding::Local(local)) => match local.kind {
                LocalKind::Type => Ok(local.ty),
                _ => Err(self.not_a_type(ident)),
            },
            Some(Binding::Package) => self.package_type(ident),
            Some(Binding::Import(package)) => Err(self.error(
                TypeErrorKind::NotAType,
                format!("use of package {} without selector", package.name),
                ident.span,
            )),
            Some(Binding::Dot(symbol)) if symbol.kind == SymbolKind::Type => Ok(symbol.ty),
            Some(Binding::Universe(Universal::Type(ty))) => Ok(ty),
            Some(Binding::Dot(_)) | Some(Binding::Universe(_)) => Err(self.not_a_type(ident)),
            Some(Binding::Unknown) => Ok(Type::Invalid),
            None if self.shallow() => Ok(Type::Invalid),
            None => Err(self.error(
                TypeErrorKind::Undefined,
                format!("undefined: {}", ident.name),
                ident.span,
            )),
        }
    }

    fn not_a_type(&self, ident: &Ident) -> crate::error::TypeError {
        self.error(
            TypeErrorKind::NotAType,
            format!("{} is not a type", ident.name),
            ident.span,
        )
    }

    /// Type named by a package-level declaration.
    pub(super) fn package_type(&mut self, ident: &Ident) -> Result<Type> {
        match self.decls.get(&ident.name).copied() {
            Some(DeclRef::Type { spec, .. }) if !spec.alias => {
                let params = param_names(&spec.type_params);
                Ok(self.declared_type(&ident.name, &params))
            }
            Some(DeclRef::Type { .. }) => Ok(self.resolve_symbol(&ident.name)?.ty),
            _ => Err(self.not_a_type(ident)),
        }
    }

    fn qualified_type(&mut self, package: &Ident, name: &Ident) -> Result<Type> {
        match self.lookup(&package.name) {
            Some(Binding::Import(imported)) => self.member_type(&imported, package, name),
            Some(Binding::Unknown) => Ok(Type::Invalid),
            Some(_) => Err(self.error(
                TypeErrorKind::NotAType,
                format!("{}.{} is not a type", package.name, name.name),
                name.span,
            )),
            None if self.shallow() => Ok(Type::Invalid),
            None => Err(self.error(
                TypeErrorKind::Undefined,
                format!("undefined: {}", package.name),
                package.span,
            )),
        }
    }

    fn member_type(&mut self, imported: &TypedPackage, package: &Ident, name: &Ident) -> Result<Type> {
        if !imported.complete {
            return Ok(Type::named(Some(imported.id()), name.name.clone(), vec![]));
        }
        match imported.lookup(&name.name) {
            Some(symbol) if !symbol.is_exported() => Err(self.error(
                TypeErrorKind::NotExported,
                format!("name {} not exported by package {}", name.name, imported.name),
                name.span,
            )),
            Some(symbol) if symbol.kind == SymbolKind::Type => Ok(symbol.ty.clone()),
            Some(_) => Err(self.error(
                TypeErrorKind::NotAType,
                format!("{}.{} is not a type", package.name, name.name),
                name.span,
            )),
            None => Err(self.error(
                TypeErrorKind::Undefined,
                format!("undefined: {}.{}", package.name, name.name),
                name.span,
            )),
        }
    }
}

fn param_names(params: &[TypeParam]) -> Vec<String> {
    params
        .iter()
        .flat_map(|param| param.names.iter().map(|name| name.name.clone()))
        .collect()
}

/// Field name of an embedded field: the type name without package or
/// type arguments.
fn embedded_name(ty: &TypeExpr) -> String {
    match &ty.kind {
        TypeExprKind::Name(ident) => ident.name.clone(),
        TypeExprKind::Qualified { name, .. } => name.name.clone(),
        TypeExprKind::Generic { base, .. } | TypeExprKind::Pointer(base) => embedded_name(base),
        _ => String::new(),
    }
}
