//! Constant evaluation of scalar operations.
//!
//! Used by constant folding and by the interpreter backend. Returning
//! `None` means "decline": the operation is not defined (division by
//! zero) or folding it would hide undefined behavior (signed overflow).
//! Unsigned arithmetic wraps at the type's width.

use crate::types::{BinaryOp, ConstValue, UnaryOp};
use rill_dtype::Type;

fn wrap_uint(v: u128, ty: &Type) -> ConstValue {
    let bits = ty.bits() as u32;
    let masked = if bits >= 64 { v as u64 } else { (v as u64) & ((1u64 << bits) - 1) };
    ConstValue::UInt(masked)
}

fn int_in_range(v: i64, ty: &Type) -> Option<ConstValue> {
    ty.can_represent_i64(v).then_some(ConstValue::Int(v))
}

/// Floor division: rounds toward negative infinity.
pub fn floor_div(a: i64, b: i64) -> Option<i64> {
    if b == 0 {
        return None;
    }
    let q = a.checked_div(b)?;
    let r = a % b;
    Some(if r != 0 && (r < 0) != (b < 0) { q - 1 } else { q })
}

/// Euclidean-style remainder: the result takes the sign of the divisor.
pub fn floor_mod(a: i64, b: i64) -> Option<i64> {
    if b == 0 {
        return None;
    }
    let r = a % b;
    Some(if r != 0 && (r < 0) != (b < 0) { r + b } else { r })
}

/// Evaluate a unary operation on a constant of type `ty`.
pub fn eval_unary(op: UnaryOp, ty: &Type, v: ConstValue) -> Option<ConstValue> {
    match (op, v) {
        (UnaryOp::Neg, ConstValue::Int(i)) => int_in_range(i.checked_neg()?, ty),
        (UnaryOp::Neg, ConstValue::Float(f)) => Some(ConstValue::Float(-f)),
        (UnaryOp::Neg, ConstValue::UInt(_)) => None,
        (UnaryOp::Not, v) => Some(ConstValue::UInt(!v.as_bool() as u64)),
    }
}

/// Evaluate a binary operation on constants of operand type `ty`.
///
/// Comparisons return a boolean `UInt`; everything else returns a value
/// of `ty`'s domain.
pub fn eval_binary(op: BinaryOp, ty: &Type, a: ConstValue, b: ConstValue) -> Option<ConstValue> {
    use BinaryOp::*;
    use ConstValue::*;

    if op.is_comparison() {
        let result = match (a, b) {
            (Int(x), Int(y)) => compare(op, x.cmp(&y)),
            (UInt(x), UInt(y)) => compare(op, x.cmp(&y)),
            (Float(x), Float(y)) => float_compare(op, x, y)?,
            _ => return None,
        };
        return Some(UInt(result as u64));
    }

    match (a, b) {
        (Int(x), Int(y)) => match op {
            Add => int_in_range(x.checked_add(y)?, ty),
            Sub => int_in_range(x.checked_sub(y)?, ty),
            Mul => int_in_range(x.checked_mul(y)?, ty),
            Div => int_in_range(floor_div(x, y)?, ty),
            Mod => int_in_range(floor_mod(x, y)?, ty),
            Min => Some(Int(x.min(y))),
            Max => Some(Int(x.max(y))),
            And | Or => bool_op(op, a, b),
            _ => None,
        },
        (UInt(x), UInt(y)) => match op {
            Add => Some(wrap_uint(x as u128 + y as u128, ty)),
            Sub => Some(wrap_uint((x as u128).wrapping_sub(y as u128), ty)),
            Mul => Some(wrap_uint(x as u128 * y as u128, ty)),
            Div => (y != 0).then(|| UInt(x / y)),
            Mod => (y != 0).then(|| UInt(x % y)),
            Min => Some(UInt(x.min(y))),
            Max => Some(UInt(x.max(y))),
            And | Or => bool_op(op, a, b),
            _ => None,
        },
        (Float(x), Float(y)) => match op {
            Add => Some(Float(x + y)),
            Sub => Some(Float(x - y)),
            Mul => Some(Float(x * y)),
            Div => Some(Float(x / y)),
            Mod => Some(Float(x - (x / y).floor() * y)),
            Min => Some(Float(x.min(y))),
            Max => Some(Float(x.max(y))),
            _ => None,
        },
        _ => None,
    }
}

fn compare(op: BinaryOp, ord: std::cmp::Ordering) -> bool {
    use std::cmp::Ordering::*;
    match op {
        BinaryOp::Eq => ord == Equal,
        BinaryOp::Ne => ord != Equal,
        BinaryOp::Lt => ord == Less,
        BinaryOp::Le => ord != Greater,
        BinaryOp::Gt => ord == Greater,
        BinaryOp::Ge => ord != Less,
        _ => unreachable!("compare on non-comparison"),
    }
}

fn float_compare(op: BinaryOp, x: f64, y: f64) -> Option<bool> {
    // NaN comparisons fold only for Ne (true) and Eq (false); ordering
    // against NaN is left to the backend's semantics.
    if x.is_nan() || y.is_nan() {
        return match op {
            BinaryOp::Eq => Some(false),
            BinaryOp::Ne => Some(true),
            _ => None,
        };
    }
    let ord = x.partial_cmp(&y)?;
    Some(compare(op, ord))
}

fn bool_op(op: BinaryOp, a: ConstValue, b: ConstValue) -> Option<ConstValue> {
    let v = match op {
        BinaryOp::And => a.as_bool() && b.as_bool(),
        BinaryOp::Or => a.as_bool() || b.as_bool(),
        _ => return None,
    };
    Some(ConstValue::UInt(v as u64))
}
