//! Expression typing.

use super::{Binding, Checker, DeclRef, LocalKind, Result};
use crate::ast::{
    BinaryOp, Element, ElementValue, Expr, ExprKind, Ident, LitKind, TypeExprKind, UnaryOp,
};
use crate::check::constant::{self, ConstValue};
use crate::check::universe::{Builtin, Universal};
use crate::error::TypeErrorKind;
use crate::parser::unquote;
use crate::types::{ArrayLen, BasicKind, Symbol, SymbolKind, Type, TypedPackage};
use std::sync::Arc;

/// What an expression denotes.
#[derive(Debug, Clone)]
pub(super) enum Operand {
    Value(Type),
    Const(Type, ConstValue),
    Type(Type),
    Package(Arc<TypedPackage>),
    Builtin(Builtin),
    Nil,
    /// Call of a function without results
    NoValue,
    /// Member of a package whose sources were not loaded
    Unknown,
}

impl Operand {
    pub(super) fn ty(&self) -> Type {
        match self {
            Operand::Value(ty) | Operand::Const(ty, _) | Operand::Type(ty) => ty.clone(),
            Operand::Nil => Type::Basic(BasicKind::UntypedNil),
            _ => Type::Invalid,
        }
    }
}

enum Member {
    Found(Type),
    Missing,
    Unknown,
}

impl<'a> Checker<'a> {
    /// Type of an expression used as a value.
    pub(super) fn value(&mut self, expr: &Expr) -> Result<Type> {
        let operand = self.operand(expr)?;
        self.as_value(operand, expr)
    }

    fn as_value(&self, operand: Operand, expr: &Expr) -> Result<Type> {
        let message = match operand {
            Operand::Value(ty) | Operand::Const(ty, _) => return Ok(ty),
            Operand::Nil => return Ok(Type::Basic(BasicKind::UntypedNil)),
            Operand::Unknown => return Ok(Type::Invalid),
            Operand::Type(_) => format!("{} (type) is not an expression", self.text(expr.span)),
            Operand::Package(package) => {
                format!("use of package {} without selector", package.name)
            }
            Operand::Builtin(_) => format!("{} (built-in) must be called", self.text(expr.span)),
            Operand::NoValue => format!("{} (no value) used as value", self.text(expr.span)),
        };
        Err(self.error(TypeErrorKind::NotAValue, message, expr.span))
    }

    pub(super) fn operand(&mut self, expr: &Expr) -> Result<Operand> {
        match &expr.kind {
            ExprKind::Ident(ident) => self.ident_operand(ident),
            ExprKind::BasicLit { kind, raw } => Ok(literal(*kind, raw)),
            ExprKind::Composite { ty, elems } => {
                let ty = match ty {
                    Some(ty) => match &ty.kind {
                        TypeExprKind::Array { len: None, elem } => Type::Array {
                            len: ArrayLen::Const(elems.len() as u64),
                            elem: Box::new(self.resolve_type(elem)?),
                        },
                        _ => self.resolve_type(ty)?,
                    },
                    None => Type::Invalid,
                };
                self.elements(&ty, elems)?;
                Ok(Operand::Value(ty))
            }
            ExprKind::FuncLit { sig, body } => {
                let func = self.resolve_signature(sig)?;
                self.check_body(sig, &func, None, body)?;
                Ok(Operand::Value(Type::Func(Box::new(func))))
            }
            ExprKind::Paren(inner) => self.operand(inner),
            ExprKind::Selector { operand, field } => self.selector(operand, field),
            ExprKind::Index { operand, indices } => self.index(operand, indices),
            ExprKind::Slice {
                operand,
                low,
                high,
                max,
            } => {
                let ty = self.value(operand)?;
                for bound in [low, high, max].into_iter().flatten() {
                    self.value(bound)?;
                }
                let sliced = match self.underlying(&ty)? {
                    Type::Basic(kind) if kind.is_string() => ty.default_type(),
                    Type::Slice(_) => ty,
                    Type::Array { elem, .. } => Type::Slice(elem),
                    Type::Pointer(inner) => match self.underlying(&inner)? {
                        Type::Array { elem, .. } => Type::Slice(elem),
                        _ => Type::Invalid,
                    },
                    _ => Type::Invalid,
                };
                Ok(Operand::Value(sliced))
            }
            ExprKind::TypeAssert { operand, ty } => {
                self.value(operand)?;
                match ty {
                    Some(ty) => Ok(Operand::Value(self.resolve_type(ty)?)),
                    None => Ok(Operand::Value(Type::Invalid)),
                }
            }
            ExprKind::Call { func, type_args, args, .. } => {
                let callee = self.operand(func)?;
                for arg in type_args {
                    self.resolve_type(arg)?;
                }
                self.call(callee, func, args)
            }
            ExprKind::Unary { op, operand } => self.unary(*op, operand),
            ExprKind::Binary { op, lhs, rhs } => self.binary(*op, lhs, rhs),
            ExprKind::Type(ty) => Ok(Operand::Type(self.resolve_type(ty)?)),
            ExprKind::Opaque(parts) => {
                for part in parts {
                    self.operand(part)?;
                }
                Ok(Operand::Unknown)
            }
        }
    }

    fn ident_operand(&mut self, ident: &Ident) -> Result<Operand> {
        if ident.is_blank() {
            return Err(self.error(TypeErrorKind::NotAValue, "cannot use _ as value", ident.span));
        }
        match self.lookup(&ident.name) {
            Some(Binding::Local(local)) => Ok(match local.kind {
                LocalKind::Var => Operand::Value(local.ty),
                LocalKind::Const(Some(value)) => Operand::Const(local.ty, value),
                LocalKind::Const(None) => Operand::Value(local.ty),
                LocalKind::Type => Operand::Type(local.ty),
            }),
            Some(Binding::Package) => self.package_operand(ident),
            Some(Binding::Import(package)) => Ok(Operand::Package(package)),
            Some(Binding::Dot(symbol)) => Ok(symbol_operand(&symbol)),
            Some(Binding::Universe(universal)) => match universal {
                Universal::Type(ty) => Ok(Operand::Type(ty)),
                Universal::Const(ty, value) => Ok(Operand::Const(ty, value)),
                Universal::Nil => Ok(Operand::Nil),
                Universal::Builtin(builtin) => Ok(Operand::Builtin(builtin)),
                Universal::Iota => match self.iota {
                    Some(iota) => Ok(Operand::Const(
                        Type::Basic(BasicKind::UntypedInt),
                        ConstValue::Int(i128::from(iota)),
                    )),
                    None => Err(self.error(
                        TypeErrorKind::Undefined,
                        "cannot use iota outside constant declaration",
                        ident.span,
                    )),
                },
            },
            Some(Binding::Unknown) => Ok(Operand::Unknown),
            None if self.shallow() => Ok(Operand::Unknown),
            None => Err(self.error(
                TypeErrorKind::Undefined,
                format!("undefined: {}", ident.name),
                ident.span,
            )),
        }
    }

    fn package_operand(&mut self, ident: &Ident) -> Result<Operand> {
        if matches!(self.decls.get(&ident.name), Some(DeclRef::Type { .. })) {
            return Ok(Operand::Type(self.package_type(ident)?));
        }
        let symbol = self.resolve_symbol(&ident.name)?;
        Ok(symbol_operand(&symbol))
    }

    fn selector(&mut self, operand: &Expr, field: &Ident) -> Result<Operand> {
        if let ExprKind::Ident(ident) = &operand.kind
            && let Some(Binding::Import(package)) = self.lookup(&ident.name)
        {
            return self.member_operand(&package, ident, field);
        }
        let base = self.operand(operand)?;
        let ty = match base {
            Operand::Unknown => return Ok(Operand::Unknown),
            // Method expression `T.Method`
            Operand::Type(_) => return Ok(Operand::Value(Type::Invalid)),
            other => self.as_value(other, operand)?,
        };
        match self.find_member(&ty, &field.name, 0)? {
            Member::Found(ty) => Ok(Operand::Value(ty)),
            Member::Unknown => Ok(Operand::Value(Type::Invalid)),
            Member::Missing => Err(self.error(
                TypeErrorKind::Undefined,
                format!(
                    "{}.{} undefined (type {} has no field or method {})",
                    self.text(operand.span),
                    field.name,
                    self.type_string(&ty),
                    field.name
                ),
                field.span,
            )),
        }
    }

    fn member_operand(&mut self, package: &TypedPackage, ident: &Ident, field: &Ident) -> Result<Operand> {
        if !package.complete {
            return Ok(Operand::Unknown);
        }
        match package.lookup(&field.name) {
            Some(symbol) if !symbol.is_exported() => Err(self.error(
                TypeErrorKind::NotExported,
                format!("name {} not exported by package {}", field.name, package.name),
                field.span,
            )),
            Some(symbol) => Ok(symbol_operand(symbol)),
            None => Err(self.error(
                TypeErrorKind::Undefined,
                format!("undefined: {}.{}", ident.name, field.name),
                field.span,
            )),
        }
    }

    /// Field or method `name` of a value of type `ty`. `Missing` is only
    /// reported when every type on the way is fully known.
    fn find_member(&mut self, ty: &Type, name: &str, depth: usize) -> Result<Member> {
        if depth > 8 {
            return Ok(Member::Unknown);
        }
        let base = match ty {
            Type::Pointer(inner) => inner.as_ref(),
            other => other,
        };
        let mut unknown = false;
        if let Type::Named(named) = base {
            match self.named_methods(named)? {
                Some(methods) => {
                    if let Some(method) = methods.get(name) {
                        return Ok(Member::Found(Type::Func(Box::new(method.sig.clone()))));
                    }
                }
                None => unknown = true,
            }
        }
        match self.underlying(base)? {
            Type::Struct(fields) => {
                if let Some(field) = fields.iter().find(|field| field.name == name) {
                    return Ok(Member::Found(field.ty.clone()));
                }
                for field in fields.iter().filter(|field| field.embedded) {
                    match self.find_member(&field.ty, name, depth + 1)? {
                        Member::Found(ty) => return Ok(Member::Found(ty)),
                        Member::Unknown => unknown = true,
                        Member::Missing => {}
                    }
                }
            }
            Type::Interface(iface) => {
                if let Some((_, sig)) = iface.methods.iter().find(|(method, _)| method == name) {
                    return Ok(Member::Found(Type::Func(Box::new(sig.clone()))));
                }
                for embed in &iface.embeds {
                    match self.find_member(embed, name, depth + 1)? {
                        Member::Found(ty) => return Ok(Member::Found(ty)),
                        Member::Unknown => unknown = true,
                        Member::Missing => {}
                    }
                }
            }
            Type::TypeParam(_) | Type::Invalid | Type::Union(_) => unknown = true,
            _ => {}
        }
        Ok(if unknown { Member::Unknown } else { Member::Missing })
    }

    fn index(&mut self, operand: &Expr, indices: &[Expr]) -> Result<Operand> {
        let base = self.operand(operand)?;
        let mut args = Vec::with_capacity(indices.len());
        for index in indices {
            args.push(match self.operand(index)? {
                Operand::Type(ty) => ty,
                _ => Type::Invalid,
            });
        }
        match base {
            Operand::Type(Type::Named(named)) => Ok(Operand::Type(Type::Named(Arc::new(
                crate::types::NamedType {
                    args,
                    ..(*named).clone()
                },
            )))),
            Operand::Value(ty) | Operand::Const(ty, _) => {
                let elem = match self.underlying(&ty)? {
                    Type::Slice(elem) | Type::Array { elem, .. } => *elem,
                    Type::Map { value, .. } => *value,
                    Type::Basic(kind) if kind.is_string() => Type::Basic(BasicKind::Byte),
                    Type::Pointer(inner) => match self.underlying(&inner)? {
                        Type::Array { elem, .. } => *elem,
                        _ => Type::Invalid,
                    },
                    _ => Type::Invalid,
                };
                Ok(Operand::Value(elem))
            }
            Operand::Package(_) | Operand::Builtin(_) | Operand::NoValue | Operand::Nil => {
                self.as_value(base, operand).map(|_| Operand::Value(Type::Invalid))
            }
            _ => Ok(Operand::Unknown),
        }
    }

    fn call(&mut self, callee: Operand, func: &Expr, args: &[Expr]) -> Result<Operand> {
        match callee {
            // Conversion
            Operand::Type(ty) => {
                let mut value = None;
                for arg in args {
                    if let Operand::Const(_, constant) = self.operand(arg)? {
                        value = Some(constant);
                    } else {
                        value = None;
                    }
                }
                let basic = matches!(self.underlying(&ty)?, Type::Basic(_));
                Ok(match value {
                    Some(value) if basic && args.len() == 1 => Operand::Const(ty, value),
                    _ => Operand::Value(ty),
                })
            }
            Operand::Builtin(builtin) => self.builtin(builtin, args),
            Operand::Value(ty) | Operand::Const(ty, _) => {
                for arg in args {
                    self.value(arg)?;
                }
                Ok(match self.underlying(&ty)? {
                    Type::Func(sig) => match sig.result() {
                        Some(result) => Operand::Value(result),
                        None => Operand::NoValue,
                    },
                    _ => Operand::Value(Type::Invalid),
                })
            }
            Operand::Unknown | Operand::Nil => {
                for arg in args {
                    self.value(arg)?;
                }
                Ok(Operand::Unknown)
            }
            Operand::Package(_) | Operand::NoValue => {
                self.as_value(callee, func).map(|_| Operand::Unknown)
            }
        }
    }

    fn builtin(&mut self, builtin: Builtin, args: &[Expr]) -> Result<Operand> {
        let int = Type::Basic(BasicKind::Int);
        match builtin {
            Builtin::Make | Builtin::New => {
                let Some((first, rest)) = args.split_first() else {
                    return Ok(Operand::Value(Type::Invalid));
                };
                let ty = match self.operand(first)? {
                    Operand::Type(ty) => ty,
                    Operand::Unknown => Type::Invalid,
                    _ => {
                        return Err(self.error(
                            TypeErrorKind::NotAType,
                            format!("{} is not a type", self.text(first.span)),
                            first.span,
                        ));
                    }
                };
                for arg in rest {
                    self.value(arg)?;
                }
                Ok(Operand::Value(if builtin == Builtin::New {
                    Type::Pointer(Box::new(ty))
                } else {
                    ty
                }))
            }
            Builtin::Len | Builtin::Cap => {
                let mut length = None;
                for arg in args {
                    match self.operand(arg)? {
                        Operand::Const(_, ConstValue::String(text)) => length = Some(text.len()),
                        other => {
                            self.as_value(other, arg)?;
                        }
                    }
                }
                Ok(match length {
                    Some(n) if builtin == Builtin::Len => Operand::Const(int, ConstValue::Int(n as i128)),
                    _ => Operand::Value(int),
                })
            }
            Builtin::Append | Builtin::Min | Builtin::Max => {
                let mut first = None;
                for arg in args {
                    let ty = self.value(arg)?;
                    first.get_or_insert(ty);
                }
                Ok(Operand::Value(first.unwrap_or(Type::Invalid)))
            }
            Builtin::Copy => {
                for arg in args {
                    self.value(arg)?;
                }
                Ok(Operand::Value(int))
            }
            Builtin::Complex | Builtin::Real | Builtin::Imag => {
                for arg in args {
                    self.value(arg)?;
                }
                Ok(Operand::Value(Type::Basic(if builtin == Builtin::Complex {
                    BasicKind::Complex128
                } else {
                    BasicKind::Float64
                })))
            }
            Builtin::Recover => Ok(Operand::Value(Type::empty_interface())),
            Builtin::Panic
            | Builtin::Print
            | Builtin::Println
            | Builtin::Close
            | Builtin::Delete
            | Builtin::Clear => {
                for arg in args {
                    self.value(arg)?;
                }
                Ok(Operand::NoValue)
            }
        }
    }

    fn unary(&mut self, op: UnaryOp, operand: &Expr) -> Result<Operand> {
        match op {
            UnaryOp::Addr => Ok(Operand::Value(Type::Pointer(Box::new(self.value(operand)?)))),
            UnaryOp::Deref => match self.operand(operand)? {
                Operand::Type(ty) => Ok(Operand::Type(Type::Pointer(Box::new(ty)))),
                Operand::Unknown => Ok(Operand::Unknown),
                other => {
                    let ty = self.as_value(other, operand)?;
                    Ok(Operand::Value(match self.underlying(&ty)? {
                        Type::Pointer(elem) => *elem,
                        _ => Type::Invalid,
                    }))
                }
            },
            UnaryOp::Recv => {
                let ty = self.value(operand)?;
                Ok(Operand::Value(match self.underlying(&ty)? {
                    Type::Chan { elem, .. } => *elem,
                    _ => Type::Invalid,
                }))
            }
            UnaryOp::Add | UnaryOp::Sub | UnaryOp::Not | UnaryOp::Xor => {
                match self.operand(operand)? {
                    Operand::Const(ty, value) => Ok(match constant::unary(op, &value) {
                        Some(folded) => Operand::Const(ty, folded),
                        None => Operand::Value(ty),
                    }),
                    other => Ok(Operand::Value(self.as_value(other, operand)?)),
                }
            }
        }
    }

    fn binary(&mut self, op: BinaryOp, lhs: &Expr, rhs: &Expr) -> Result<Operand> {
        let left = self.operand(lhs)?;
        let right = self.operand(rhs)?;
        let (left_ty, right_ty) = (left.ty(), right.ty());
        if let (Operand::Const(_, a), Operand::Const(_, b)) = (&left, &right)
            && let Some(value) = constant::binary(op, a, b)
        {
            return Ok(Operand::Const(binary_type(op, &left_ty, &right_ty), value));
        }
        self.as_value(left, lhs)?;
        self.as_value(right, rhs)?;
        Ok(Operand::Value(binary_type(op, &left_ty, &right_ty)))
    }

    /// Check composite literal elements against the literal's type.
    fn elements(&mut self, container: &Type, elems: &[Element]) -> Result<()> {
        let (key, elem, keyed_values) = match self.underlying(container)? {
            Type::Map { key, value } => (*key, *value, true),
            Type::Slice(elem) | Type::Array { elem, .. } => (Type::Basic(BasicKind::Int), *elem, true),
            // Struct keys are field names
            _ => (Type::Invalid, Type::Invalid, false),
        };
        let elided = |ty: &Type| match ty {
            Type::Pointer(inner) => inner.as_ref().clone(),
            other => other.clone(),
        };
        for element in elems {
            match &element.key {
                Some(ElementValue::Expr(expr)) => {
                    if keyed_values || expr.as_ident().is_none() {
                        self.value(expr)?;
                    }
                }
                Some(ElementValue::Literal(inner, _)) => self.elements(&elided(&key), inner)?,
                None => {}
            }
            match &element.value {
                ElementValue::Expr(expr) => {
                    self.value(expr)?;
                }
                ElementValue::Literal(inner, _) => self.elements(&elided(&elem), inner)?,
            }
        }
        Ok(())
    }
}

fn literal(kind: LitKind, raw: &str) -> Operand {
    let untyped = Type::Basic;
    match kind {
        LitKind::Int => match constant::parse_int(raw) {
            Some(n) => Operand::Const(untyped(BasicKind::UntypedInt), ConstValue::Int(n)),
            None => Operand::Value(untyped(BasicKind::UntypedInt)),
        },
        LitKind::Float => match constant::parse_float(raw) {
            Some(f) => Operand::Const(untyped(BasicKind::UntypedFloat), ConstValue::Float(f)),
            None => Operand::Value(untyped(BasicKind::UntypedFloat)),
        },
        LitKind::Imag => Operand::Value(untyped(BasicKind::UntypedComplex)),
        LitKind::Rune => match constant::parse_rune(raw) {
            Some(n) => Operand::Const(untyped(BasicKind::UntypedRune), ConstValue::Int(n)),
            None => Operand::Value(untyped(BasicKind::UntypedRune)),
        },
        LitKind::String => Operand::Const(
            untyped(BasicKind::UntypedString),
            ConstValue::String(unquote(raw)),
        ),
    }
}

fn symbol_operand(symbol: &Symbol) -> Operand {
    match (&symbol.kind, &symbol.value) {
        (SymbolKind::Type, _) => Operand::Type(symbol.ty.clone()),
        (SymbolKind::Value, Some(value)) => Operand::Const(symbol.ty.clone(), value.clone()),
        _ => Operand::Value(symbol.ty.clone()),
    }
}

fn untyped_rank(kind: BasicKind) -> u8 {
    match kind {
        BasicKind::UntypedInt => 1,
        BasicKind::UntypedRune => 2,
        BasicKind::UntypedFloat => 3,
        BasicKind::UntypedComplex => 4,
        _ => 0,
    }
}

/// Result type of a binary operation. Typed operands win over untyped
/// ones; among untyped numeric kinds the larger one wins.
fn binary_type(op: BinaryOp, left: &Type, right: &Type) -> Type {
    if op.is_comparison() {
        return Type::Basic(BasicKind::UntypedBool);
    }
    if op.is_shift() {
        return left.clone();
    }
    match (left, right) {
        (Type::Basic(a), Type::Basic(b)) if a.is_untyped() && b.is_untyped() => {
            if untyped_rank(*b) > untyped_rank(*a) {
                right.clone()
            } else {
                left.clone()
            }
        }
        (l, r) if l.is_untyped() && !r.is_invalid() => r.clone(),
        _ => left.clone(),
    }
}
