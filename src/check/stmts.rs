//! Function bodies and block scopes.

use super::{Checker, Local, LocalKind, Result};
use crate::ast::{Block, Decl, Expr, Ident, Signature, Stmt, TypeExprKind};
use crate::check::exprs::Operand;
use crate::error::TypeErrorKind;
use crate::types::{BasicKind, FuncType, NamedType, Type};
use std::sync::Arc;

impl<'a> Checker<'a> {
    /// Check a function body. Parameters, results and the receiver share
    /// the body's outermost scope.
    pub(super) fn check_body(
        &mut self,
        sig: &Signature,
        func: &FuncType,
        recv: Option<(&Ident, Type)>,
        body: &Block,
    ) -> Result<()> {
        self.push_scope();
        if let Some((name, ty)) = recv {
            self.declare_local(name, var(ty));
        }
        for (param, ty) in sig.params.iter().zip(&func.params) {
            if let Some(name) = &param.name {
                self.declare_local(name, var(ty.clone()));
            }
        }
        for (result, ty) in sig.results.iter().zip(&func.results) {
            if let Some(name) = &result.name {
                self.declare_local(name, var(ty.clone()));
            }
        }
        let result = self.stmts(&body.stmts);
        self.pop_scope();
        result
    }

    fn block(&mut self, block: &Block) -> Result<()> {
        self.scoped(|c| c.stmts(&block.stmts))
    }

    fn scoped(&mut self, f: impl FnOnce(&mut Self) -> Result<()>) -> Result<()> {
        self.push_scope();
        let result = f(self);
        self.pop_scope();
        result
    }

    fn stmts(&mut self, stmts: &[Stmt]) -> Result<()> {
        stmts.iter().try_for_each(|stmt| self.stmt(stmt))
    }

    fn stmt(&mut self, stmt: &Stmt) -> Result<()> {
        match stmt {
            Stmt::Empty | Stmt::Branch => Ok(()),
            Stmt::Expr(expr) | Stmt::Go(expr) | Stmt::Defer(expr) => {
                self.operand(expr)?;
                Ok(())
            }
            Stmt::Decl(decl) => self.local_decl(decl),
            Stmt::ShortVar { names, values, span } => {
                let types = self.assign_types(values, names.len())?;
                let mut fresh = false;
                for (name, ty) in names.iter().zip(types) {
                    if name.is_blank() || self.declared_in_block(&name.name) {
                        continue;
                    }
                    fresh = true;
                    self.declare_local(name, var(ty.default_type()));
                }
                if !fresh {
                    return Err(self.error(
                        TypeErrorKind::NoNewVariables,
                        "no new variables on left side of :=",
                        *span,
                    ));
                }
                Ok(())
            }
            Stmt::Assign { lhs, rhs, .. } => {
                for value in rhs {
                    self.value(value)?;
                }
                for target in lhs {
                    if target.as_ident().is_some_and(Ident::is_blank) {
                        continue;
                    }
                    self.value(target)?;
                }
                Ok(())
            }
            Stmt::IncDec(expr) => self.value(expr).map(drop),
            Stmt::Send { chan, value } => {
                self.value(chan)?;
                self.value(value).map(drop)
            }
            Stmt::Return(values) | Stmt::Opaque(values) => {
                values.iter().try_for_each(|value| self.value(value).map(drop))
            }
            Stmt::Labeled(inner) => self.stmt(inner),
            Stmt::Block(block) => self.block(block),
            Stmt::If {
                init,
                cond,
                then,
                els,
            } => self.scoped(|c| {
                if let Some(init) = init {
                    c.stmt(init)?;
                }
                c.value(cond)?;
                c.block(then)?;
                match els {
                    Some(els) => c.stmt(els),
                    None => Ok(()),
                }
            }),
            Stmt::For {
                init,
                cond,
                post,
                body,
            } => self.scoped(|c| {
                if let Some(init) = init {
                    c.stmt(init)?;
                }
                if let Some(cond) = cond {
                    c.value(cond)?;
                }
                if let Some(post) = post {
                    c.stmt(post)?;
                }
                c.block(body)
            }),
            Stmt::Range {
                key,
                value,
                define,
                expr,
                body,
            } => {
                let ty = self.value(expr)?;
                self.scoped(|c| {
                    if *define {
                        let (key_ty, value_ty) = c.range_types(&ty)?;
                        for (target, ty) in [(key, key_ty), (value, value_ty)] {
                            if let Some(ident) = target.as_ref().and_then(Expr::as_ident) {
                                c.declare_local(ident, var(ty));
                            }
                        }
                    } else {
                        for target in [key, value].into_iter().flatten() {
                            if !target.as_ident().is_some_and(Ident::is_blank) {
                                c.value(target)?;
                            }
                        }
                    }
                    c.block(body)
                })
            }
            Stmt::Switch { init, tag, clauses } => self.scoped(|c| {
                if let Some(init) = init {
                    c.stmt(init)?;
                }
                if let Some(tag) = tag {
                    c.value(tag)?;
                }
                for clause in clauses {
                    for expr in &clause.exprs {
                        c.value(expr)?;
                    }
                    c.scoped(|c| c.stmts(&clause.body))?;
                }
                Ok(())
            }),
            Stmt::TypeSwitch {
                init,
                binding,
                subject,
                clauses,
            } => self.scoped(|c| {
                if let Some(init) = init {
                    c.stmt(init)?;
                }
                let subject_ty = c.value(subject)?;
                for clause in clauses {
                    let mut types = Vec::with_capacity(clause.types.len());
                    for ty in &clause.types {
                        match &ty.kind {
                            TypeExprKind::Name(ident) if ident.name == "nil" => {
                                types.push(subject_ty.clone())
                            }
                            _ => types.push(c.resolve_type(ty)?),
                        }
                    }
                    c.scoped(|c| {
                        if let Some(binding) = binding {
                            let ty = match types.as_slice() {
                                [single] => single.clone(),
                                _ => subject_ty.clone(),
                            };
                            c.declare_local(binding, var(ty));
                        }
                        c.stmts(&clause.body)
                    })?;
                }
                Ok(())
            }),
            Stmt::Select(clauses) => {
                for clause in clauses {
                    self.scoped(|c| {
                        if let Some(comm) = &clause.comm {
                            c.stmt(comm)?;
                        }
                        c.stmts(&clause.body)
                    })?;
                }
                Ok(())
            }
        }
    }

    /// Types assigned to `count` targets by `values`, including the
    /// tuple and comma-ok forms.
    pub(super) fn assign_types(&mut self, values: &[Expr], count: usize) -> Result<Vec<Type>> {
        if let [single] = values
            && count > 1
        {
            let ty = self.value(single)?;
            return Ok(match ty {
                Type::Tuple(items) if items.len() == count => items,
                other if count == 2 && !matches!(other, Type::Tuple(_)) => {
                    vec![other, Type::Basic(BasicKind::Bool)]
                }
                _ => vec![Type::Invalid; count],
            });
        }
        let mut types = Vec::with_capacity(count);
        for value in values {
            types.push(self.value(value)?);
        }
        types.resize(count.max(types.len()), Type::Invalid);
        Ok(types)
    }

    /// Key and value types produced by ranging over `ty`.
    fn range_types(&mut self, ty: &Type) -> Result<(Type, Type)> {
        let int = Type::Basic(BasicKind::Int);
        Ok(match self.underlying(ty)? {
            Type::Slice(elem) | Type::Array { elem, .. } => (int, *elem),
            Type::Pointer(inner) => match self.underlying(&inner)? {
                Type::Array { elem, .. } => (int, *elem),
                _ => (Type::Invalid, Type::Invalid),
            },
            Type::Basic(kind) if kind.is_string() => (int, Type::Basic(BasicKind::Rune)),
            Type::Basic(kind) if kind.is_integer() => (ty.default_type(), Type::Invalid),
            Type::Map { key, value } => (*key, *value),
            Type::Chan { elem, .. } => (*elem, Type::Invalid),
            // Range-over-func: the yield callback's parameters
            Type::Func(func) => match func.params.first().map(|param| self.underlying(param)) {
                Some(Ok(Type::Func(yield_fn))) => {
                    let mut params = yield_fn.params.into_iter();
                    (
                        params.next().unwrap_or(Type::Invalid),
                        params.next().unwrap_or(Type::Invalid),
                    )
                }
                Some(Err(err)) => return Err(err),
                _ => (Type::Invalid, Type::Invalid),
            },
            _ => (Type::Invalid, Type::Invalid),
        })
    }

    fn local_decl(&mut self, decl: &Decl) -> Result<()> {
        match decl {
            Decl::Var(specs) => {
                for spec in specs {
                    let declared = spec.ty.as_ref().map(|ty| self.resolve_type(ty)).transpose()?;
                    let inferred = if spec.values.is_empty() {
                        Vec::new()
                    } else {
                        self.assign_types(&spec.values, spec.names.len())?
                    };
                    for (i, name) in spec.names.iter().enumerate() {
                        self.check_redeclared(name)?;
                        let ty = match &declared {
                            Some(ty) => ty.clone(),
                            None => inferred.get(i).map(Type::default_type).unwrap_or(Type::Invalid),
                        };
                        self.declare_local(name, var(ty));
                    }
                }
            }
            Decl::Const(specs) => {
                let saved = self.iota;
                let mut last = None;
                for spec in specs {
                    if !spec.implicit {
                        last = Some(spec);
                    }
                    let source = last.unwrap_or(spec);
                    self.iota = Some(spec.iota);
                    let declared = source.ty.as_ref().map(|ty| self.resolve_type(ty)).transpose()?;
                    for (i, name) in spec.names.iter().enumerate() {
                        let operand = match source.values.get(i) {
                            Some(value) => self.operand(value)?,
                            None => Operand::Value(Type::Invalid),
                        };
                        let (ty, value) = match operand {
                            Operand::Const(ty, value) => (ty, Some(value)),
                            other => (other.ty(), None),
                        };
                        self.check_redeclared(name)?;
                        self.declare_local(
                            name,
                            Local {
                                kind: LocalKind::Const(value),
                                ty: declared.clone().unwrap_or(ty),
                            },
                        );
                    }
                }
                self.iota = saved;
            }
            Decl::Type(specs) => {
                for spec in specs {
                    self.check_redeclared(&spec.name)?;
                    if spec.alias {
                        let ty = self.resolve_type(&spec.ty)?;
                        self.declare_local(&spec.name, Local { kind: LocalKind::Type, ty });
                        continue;
                    }
                    let index = self.local_types.len();
                    self.local_types.push(Type::Invalid);
                    let named = Type::Named(Arc::new(NamedType {
                        package: Some(self.id()),
                        name: spec.name.name.clone(),
                        args: Vec::new(),
                        local: Some(index),
                    }));
                    self.declare_local(&spec.name, Local { kind: LocalKind::Type, ty: named });
                    let underlying = self.with_type_params(&spec.type_params, |c| {
                        let ty = c.resolve_type(&spec.ty)?;
                        c.underlying(&ty)
                    })?;
                    self.local_types[index] = underlying;
                }
            }
            Decl::Func(_) => {}
        }
        Ok(())
    }

    fn check_redeclared(&self, name: &Ident) -> Result<()> {
        if !name.is_blank() && self.declared_in_block(&name.name) {
            return Err(self.error(
                TypeErrorKind::Redeclared,
                format!("{} redeclared in this block", name.name),
                name.span,
            ));
        }
        Ok(())
    }
}

fn var(ty: Type) -> Local {
    Local {
        kind: LocalKind::Var,
        ty,
    }
}
