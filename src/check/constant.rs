//! Constant folding for untyped and typed constants.
//!
//! Integers are folded exactly up to 128 bits; anything that overflows, or
//! any operation that is not defined on the operands, yields `None` and the
//! expression is treated as non-constant.

use crate::ast::{BinaryOp, UnaryOp};
use crate::parser::unquote;

#[derive(Debug, Clone, PartialEq)]
pub enum ConstValue {
    Bool(bool),
    Int(i128),
    Float(f64),
    String(String),
}

impl ConstValue {
    pub fn as_int(&self) -> Option<i128> {
        match self {
            ConstValue::Int(n) => Some(*n),
            ConstValue::Float(f) if f.fract() == 0.0 && f.abs() < 1e38 => Some(*f as i128),
            _ => None,
        }
    }

    fn as_float(&self) -> Option<f64> {
        match self {
            ConstValue::Int(n) => Some(*n as f64),
            ConstValue::Float(f) => Some(*f),
            _ => None,
        }
    }
}

impl std::fmt::Display for ConstValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConstValue::Bool(b) => write!(f, "{}", b),
            ConstValue::Int(n) => write!(f, "{}", n),
            ConstValue::Float(x) => write!(f, "{}", x),
            ConstValue::String(s) => write!(f, "{:?}", s),
        }
    }
}

/// Value of an integer literal: decimal, `0x`, `0o`, `0b` or legacy octal,
/// with `_` separators.
pub fn parse_int(raw: &str) -> Option<i128> {
    let digits: String = raw.chars().filter(|&c| c != '_').collect();
    let lower = digits.to_ascii_lowercase();
    let (body, radix) = if let Some(rest) = lower.strip_prefix("0x") {
        (rest, 16)
    } else if let Some(rest) = lower.strip_prefix("0b") {
        (rest, 2)
    } else if let Some(rest) = lower.strip_prefix("0o") {
        (rest, 8)
    } else if lower.len() > 1 && lower.starts_with('0') {
        (&lower[1..], 8)
    } else {
        (lower.as_str(), 10)
    };
    u128::from_str_radix(body, radix)
        .ok()
        .and_then(|n| i128::try_from(n).ok())
}

pub fn parse_float(raw: &str) -> Option<f64> {
    let digits: String = raw.chars().filter(|&c| c != '_').collect();
    digits.parse().ok()
}

/// Code point of a rune literal.
pub fn parse_rune(raw: &str) -> Option<i128> {
    unquote(raw).chars().next().map(|c| c as i128)
}

pub fn unary(op: UnaryOp, value: &ConstValue) -> Option<ConstValue> {
    match (op, value) {
        (UnaryOp::Add, ConstValue::Int(_) | ConstValue::Float(_)) => Some(value.clone()),
        (UnaryOp::Sub, ConstValue::Int(n)) => n.checked_neg().map(ConstValue::Int),
        (UnaryOp::Sub, ConstValue::Float(f)) => Some(ConstValue::Float(-f)),
        (UnaryOp::Xor, ConstValue::Int(n)) => Some(ConstValue::Int(!n)),
        (UnaryOp::Not, ConstValue::Bool(b)) => Some(ConstValue::Bool(!b)),
        _ => None,
    }
}

pub fn binary(op: BinaryOp, lhs: &ConstValue, rhs: &ConstValue) -> Option<ConstValue> {
    use ConstValue::*;
    match (lhs, rhs) {
        (Int(a), Int(b)) => int_binary(op, *a, *b),
        (Bool(a), Bool(b)) => match op {
            BinaryOp::LAnd => Some(Bool(*a && *b)),
            BinaryOp::LOr => Some(Bool(*a || *b)),
            BinaryOp::Eq => Some(Bool(a == b)),
            BinaryOp::Ne => Some(Bool(a != b)),
            _ => None,
        },
        (String(a), String(b)) => match op {
            BinaryOp::Add => Some(String(format!("{}{}", a, b))),
            op if op.is_comparison() => Some(Bool(compare(op, a.cmp(b)))),
            _ => None,
        },
        (Int(_) | Float(_), Int(_) | Float(_)) => {
            let (a, b) = (lhs.as_float()?, rhs.as_float()?);
            match op {
                BinaryOp::Add => Some(Float(a + b)),
                BinaryOp::Sub => Some(Float(a - b)),
                BinaryOp::Mul => Some(Float(a * b)),
                BinaryOp::Div if b != 0.0 => Some(Float(a / b)),
                op if op.is_comparison() => Some(Bool(compare(op, a.partial_cmp(&b)?))),
                _ => None,
            }
        }
        _ => None,
    }
}

fn int_binary(op: BinaryOp, a: i128, b: i128) -> Option<ConstValue> {
    let value = match op {
        BinaryOp::Add => a.checked_add(b)?,
        BinaryOp::Sub => a.checked_sub(b)?,
        BinaryOp::Mul => a.checked_mul(b)?,
        BinaryOp::Div => a.checked_div(b)?,
        BinaryOp::Mod => a.checked_rem(b)?,
        BinaryOp::And => a & b,
        BinaryOp::Or => a | b,
        BinaryOp::Xor => a ^ b,
        BinaryOp::AndNot => a & !b,
        BinaryOp::Shl => {
            let shift = u32::try_from(b).ok().filter(|&s| s < 127)?;
            let shifted = a.checked_shl(shift)?;
            (shifted >> shift == a).then_some(shifted)?
        }
        BinaryOp::Shr => a.checked_shr(u32::try_from(b).ok()?.min(127))?,
        op if op.is_comparison() => return Some(ConstValue::Bool(compare(op, a.cmp(&b)))),
        _ => return None,
    };
    Some(ConstValue::Int(value))
}

fn compare(op: BinaryOp, ordering: std::cmp::Ordering) -> bool {
    use std::cmp::Ordering::*;
    match op {
        BinaryOp::Eq => ordering == Equal,
        BinaryOp::Ne => ordering != Equal,
        BinaryOp::Lt => ordering == Less,
        BinaryOp::Le => ordering != Greater,
        BinaryOp::Gt => ordering == Greater,
        BinaryOp::Ge => ordering != Less,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_int_forms() {
        assert_eq!(parse_int("42"), Some(42));
        assert_eq!(parse_int("0x_FF"), Some(255));
        assert_eq!(parse_int("0b101"), Some(5));
        assert_eq!(parse_int("0o17"), Some(15));
        assert_eq!(parse_int("017"), Some(15));
        assert_eq!(parse_int("1_000"), Some(1000));
        assert_eq!(parse_int("0"), Some(0));
    }

    #[test]
    fn test_parse_rune() {
        assert_eq!(parse_rune("'a'"), Some(97));
        assert_eq!(parse_rune(r"'\n'"), Some(10));
    }

    #[test]
    fn test_shift_and_iota_arithmetic() {
        let one = ConstValue::Int(1);
        assert_eq!(
            binary(BinaryOp::Shl, &one, &ConstValue::Int(10)),
            Some(ConstValue::Int(1024))
        );
        assert_eq!(
            binary(BinaryOp::Mul, &ConstValue::Int(4), &ConstValue::Int(4)),
            Some(ConstValue::Int(16))
        );
        assert_eq!(binary(BinaryOp::Div, &one, &ConstValue::Int(0)), None);
    }

    #[test]
    fn test_mixed_and_strings() {
        assert_eq!(
            binary(BinaryOp::Mul, &ConstValue::Int(2), &ConstValue::Float(1.5)),
            Some(ConstValue::Float(3.0))
        );
        assert_eq!(
            binary(
                BinaryOp::Add,
                &ConstValue::String("a".into()),
                &ConstValue::String("b".into())
            ),
            Some(ConstValue::String("ab".into()))
        );
        assert_eq!(
            unary(UnaryOp::Sub, &ConstValue::Int(3)),
            Some(ConstValue::Int(-3))
        );
    }
}
