//! Binary type promotion.
//!
//! When two operands of different types meet in an arithmetic node, the
//! frontend promotes both to a common type before building the node. The
//! IR itself never holds mixed-type arithmetic.

use crate::{Type, TypeCode};

/// Compute the common type of two operands, if one exists.
///
/// Rules, in priority order:
/// - lane counts must match, except that a scalar broadcasts to match a
///   vector;
/// - identical types promote to themselves;
/// - float beats integer; between floats the wider wins, and `bfloat16`
///   mixed with any `float` promotes to at least `float32`;
/// - between integers the wider wins; at equal width, unsigned wins
///   (C-style rank resolution);
/// - handles never promote.
pub fn promote(a: &Type, b: &Type) -> Option<Type> {
    let lanes = match (a.lanes(), b.lanes()) {
        (x, y) if x == y => x,
        (1, y) => y,
        (x, 1) => x,
        _ => return None,
    };
    let a = a.element_of();
    let b = b.element_of();

    if a.is_handle() || b.is_handle() {
        return (a == b).then(|| a.with_lanes(lanes));
    }
    if a == b {
        return Some(a.with_lanes(lanes));
    }

    let elem = match (a.is_float(), b.is_float()) {
        (true, true) => {
            if a.code() == TypeCode::BFloat || b.code() == TypeCode::BFloat {
                Type::float(a.bits().max(b.bits()).max(32))
            } else {
                Type::float(a.bits().max(b.bits()))
            }
        }
        (true, false) => a,
        (false, true) => b,
        (false, false) => {
            let bits = a.bits().max(b.bits()).max(8);
            if a.bits() == b.bits() {
                // Equal width, mixed signedness: unsigned wins.
                if a.is_uint() || b.is_uint() { Type::uint(bits) } else { Type::int(bits) }
            } else if a.bits() > b.bits() {
                Type::new(a.code(), bits, 1)
            } else {
                Type::new(b.code(), bits, 1)
            }
        }
    };
    Some(elem.with_lanes(lanes))
}
