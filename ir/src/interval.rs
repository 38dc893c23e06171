//! Constant interval arithmetic.
//!
//! Bounds sub-expressions during simplification: each expression gets a
//! `ConstantInterval` of possible values, computed bottom-up through
//! transfer functions. Endpoints are `i128` so that no transfer function
//! itself overflows; `None` is an open (unbounded) endpoint.

use crate::expr::{Expr, ExprNode};
use crate::types::{BinaryOp, ConstValue, UnaryOp};

/// An inclusive integer interval with optionally-open endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConstantInterval {
    pub min: Option<i128>,
    pub max: Option<i128>,
}

impl ConstantInterval {
    pub const fn everything() -> Self {
        Self { min: None, max: None }
    }

    pub const fn single(v: i128) -> Self {
        Self { min: Some(v), max: Some(v) }
    }

    pub const fn bounded(min: i128, max: i128) -> Self {
        Self { min: Some(min), max: Some(max) }
    }

    pub const fn at_least(min: i128) -> Self {
        Self { min: Some(min), max: None }
    }

    pub const fn at_most(max: i128) -> Self {
        Self { min: None, max: Some(max) }
    }

    pub fn is_single(&self) -> Option<i128> {
        match (self.min, self.max) {
            (Some(a), Some(b)) if a == b => Some(a),
            _ => None,
        }
    }

    pub fn is_bounded(&self) -> bool {
        self.min.is_some() && self.max.is_some()
    }

    pub fn contains(&self, v: i128) -> bool {
        self.min.is_none_or(|m| m <= v) && self.max.is_none_or(|m| v <= m)
    }

    /// The smallest interval covering both inputs.
    pub fn union(&self, other: &Self) -> Self {
        Self {
            min: self.min.zip(other.min).map(|(a, b)| a.min(b)),
            max: self.max.zip(other.max).map(|(a, b)| a.max(b)),
        }
    }

    /// The intersection (both constraints apply).
    pub fn intersect(&self, other: &Self) -> Self {
        let take = |a: Option<i128>, b: Option<i128>, pick: fn(i128, i128) -> i128| match (a, b) {
            (Some(a), Some(b)) => Some(pick(a, b)),
            (a, b) => a.or(b),
        };
        Self { min: take(self.min, other.min, i128::max), max: take(self.max, other.max, i128::min) }
    }

    /// Entirely below `other`?
    pub fn strictly_less_than(&self, other: &Self) -> bool {
        matches!((self.max, other.min), (Some(a), Some(b)) if a < b)
    }

    pub fn less_or_equal(&self, other: &Self) -> bool {
        matches!((self.max, other.min), (Some(a), Some(b)) if a <= b)
    }

    pub fn add(&self, other: &Self) -> Self {
        Self {
            min: self.min.zip(other.min).map(|(a, b)| a + b),
            max: self.max.zip(other.max).map(|(a, b)| a + b),
        }
    }

    pub fn sub(&self, other: &Self) -> Self {
        Self {
            min: self.min.zip(other.max).map(|(a, b)| a - b),
            max: self.max.zip(other.min).map(|(a, b)| a - b),
        }
    }

    pub fn negate(&self) -> Self {
        Self { min: self.max.map(|v| -v), max: self.min.map(|v| -v) }
    }

    pub fn mul(&self, other: &Self) -> Self {
        // A product endpoint requires all four corners; any open endpoint
        // makes the result open unless the other side is exactly zero.
        if self.is_single() == Some(0) || other.is_single() == Some(0) {
            return Self::single(0);
        }
        let (Some(a0), Some(a1), Some(b0), Some(b1)) = (self.min, self.max, other.min, other.max) else {
            return Self::everything();
        };
        let corners = [a0 * b0, a0 * b1, a1 * b0, a1 * b1];
        let min = corners.iter().copied().min();
        let max = corners.iter().copied().max();
        Self { min, max }
    }

    pub fn div(&self, other: &Self) -> Self {
        // Conservative: only handle a divisor interval that excludes zero.
        let (Some(b0), Some(b1)) = (other.min, other.max) else { return Self::everything() };
        if b0 <= 0 && b1 >= 0 {
            return Self::everything();
        }
        let (Some(a0), Some(a1)) = (self.min, self.max) else { return Self::everything() };
        let fd = |a: i128, b: i128| {
            let q = a / b;
            if a % b != 0 && (a < 0) != (b < 0) { q - 1 } else { q }
        };
        let corners = [fd(a0, b0), fd(a0, b1), fd(a1, b0), fd(a1, b1)];
        Self { min: corners.iter().copied().min(), max: corners.iter().copied().max() }
    }

    pub fn modulo(&self, other: &Self) -> Self {
        // Euclidean mod with positive divisor lands in [0, divisor).
        match (other.min, other.max) {
            (Some(b0), Some(b1)) if b0 > 0 => {
                // A numerator already inside [0, b0) is unchanged.
                if let (Some(a0), Some(a1)) = (self.min, self.max)
                    && a0 >= 0
                    && a1 < b0
                {
                    return *self;
                }
                Self::bounded(0, b1 - 1)
            }
            _ => Self::everything(),
        }
    }

    pub fn min_(&self, other: &Self) -> Self {
        let min = match (self.min, other.min) {
            (Some(a), Some(b)) => Some(a.min(b)),
            _ => None,
        };
        let max = match (self.max, other.max) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
        Self { min, max }
    }

    pub fn max_(&self, other: &Self) -> Self {
        let min = match (self.min, other.min) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };
        let max = match (self.max, other.max) {
            (Some(a), Some(b)) => Some(a.max(b)),
            _ => None,
        };
        Self { min, max }
    }
}

/// Bound an expression's possible values given bounds for its free
/// variables. Only integral expressions get finite bounds; everything
/// else is unbounded.
pub fn bounds_of_expr(e: &Expr, lookup: &dyn Fn(&str) -> Option<ConstantInterval>) -> ConstantInterval {
    if !e.ty().element_of().is_integral() {
        return ConstantInterval::everything();
    }
    match e.node() {
        ExprNode::IntImm(v) => ConstantInterval::single(*v as i128),
        ExprNode::UIntImm(v) => ConstantInterval::single(*v as i128),
        ExprNode::Var(name) => lookup(name).unwrap_or_else(ConstantInterval::everything),
        ExprNode::Cast { value } => {
            // A lossless cast preserves bounds; otherwise clamp to the
            // target type's range when it is known.
            let inner = bounds_of_expr(value, lookup);
            let ty_range = type_range(&e.ty());
            if e.ty().can_represent(&value.ty()) { inner } else { inner.intersect(&ty_range) }
        }
        ExprNode::Unary(UnaryOp::Neg, a) => bounds_of_expr(a, lookup).negate(),
        ExprNode::Unary(UnaryOp::Not, _) => ConstantInterval::bounded(0, 1),
        ExprNode::Binary(op, a, b) => {
            let ia = bounds_of_expr(a, lookup);
            let ib = bounds_of_expr(b, lookup);
            match op {
                BinaryOp::Add => ia.add(&ib),
                BinaryOp::Sub => ia.sub(&ib),
                BinaryOp::Mul => ia.mul(&ib),
                BinaryOp::Div => ia.div(&ib),
                BinaryOp::Mod => ia.modulo(&ib),
                BinaryOp::Min => ia.min_(&ib),
                BinaryOp::Max => ia.max_(&ib),
                _ if op.is_comparison() || op.is_boolean() => ConstantInterval::bounded(0, 1),
                _ => ConstantInterval::everything(),
            }
        }
        ExprNode::Select { true_value, false_value, .. } => {
            bounds_of_expr(true_value, lookup).union(&bounds_of_expr(false_value, lookup))
        }
        ExprNode::Broadcast { value, .. } => bounds_of_expr(value, lookup),
        ExprNode::Ramp { base, stride, lanes } => {
            let ib = bounds_of_expr(base, lookup);
            let is = bounds_of_expr(stride, lookup);
            let span = is.mul(&ConstantInterval::bounded(0, (*lanes as i128) - 1));
            ib.add(&span)
        }
        ExprNode::Let { name: _, value: _, body } => {
            // Conservative: the body's bound without the let-binding's
            // refinement. The simplifier usually inlines trivial lets
            // before bounds matter.
            bounds_of_expr(body, lookup)
        }
        _ => ConstantInterval::everything(),
    }
}

/// The representable range of an integral type.
pub fn type_range(ty: &rill_dtype::Type) -> ConstantInterval {
    match (ty.min_value(), ty.max_value()) {
        (Some(lo), Some(hi)) => ConstantInterval::bounded(lo as i128, hi as i128),
        (Some(lo), None) if ty.is_uint() => {
            ConstantInterval::bounded(lo as i128, u64::MAX as i128)
        }
        _ => ConstantInterval::everything(),
    }
}

/// Bound an expression that has no free variables.
pub fn bounds_of_closed_expr(e: &Expr) -> ConstantInterval {
    bounds_of_expr(e, &|_| None)
}

/// Fold a constant-valued comparison using interval information.
pub fn compare_intervals(op: BinaryOp, a: &ConstantInterval, b: &ConstantInterval) -> Option<bool> {
    match op {
        BinaryOp::Lt => {
            if a.strictly_less_than(b) {
                Some(true)
            } else if b.less_or_equal(a) {
                Some(false)
            } else {
                None
            }
        }
        BinaryOp::Le => {
            if a.less_or_equal(b) {
                Some(true)
            } else if b.strictly_less_than(a) {
                Some(false)
            } else {
                None
            }
        }
        BinaryOp::Gt => compare_intervals(BinaryOp::Lt, b, a),
        BinaryOp::Ge => compare_intervals(BinaryOp::Le, b, a),
        BinaryOp::Eq => {
            if let (Some(x), Some(y)) = (a.is_single(), b.is_single()) {
                Some(x == y)
            } else if a.strictly_less_than(b) || b.strictly_less_than(a) {
                Some(false)
            } else {
                None
            }
        }
        BinaryOp::Ne => compare_intervals(BinaryOp::Eq, a, b).map(|v| !v),
        _ => None,
    }
}

impl From<ConstValue> for ConstantInterval {
    fn from(v: ConstValue) -> Self {
        match v {
            ConstValue::Int(i) => ConstantInterval::single(i as i128),
            ConstValue::UInt(u) => ConstantInterval::single(u as i128),
            ConstValue::Float(_) => ConstantInterval::everything(),
        }
    }
}
