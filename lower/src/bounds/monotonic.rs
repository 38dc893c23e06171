//! Monotonicity of an expression in one variable.
//!
//! Sliding-window legality rests on this: the optimization only fires
//! when the required region's endpoints grow monotonically along the
//! serial loop being slid.

use rill_ir::analysis::uses_var;
use rill_ir::{BinaryOp, Expr, ExprNode, UnaryOp};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Monotonic {
    /// Does not depend on the variable.
    Constant,
    /// Non-decreasing in the variable.
    Increasing,
    /// Non-increasing in the variable.
    Decreasing,
    Unknown,
}

impl Monotonic {
    fn flip(self) -> Monotonic {
        match self {
            Monotonic::Increasing => Monotonic::Decreasing,
            Monotonic::Decreasing => Monotonic::Increasing,
            other => other,
        }
    }

    fn join(self, other: Monotonic) -> Monotonic {
        use Monotonic::*;
        match (self, other) {
            (Constant, x) | (x, Constant) => x,
            (Increasing, Increasing) => Increasing,
            (Decreasing, Decreasing) => Decreasing,
            _ => Unknown,
        }
    }
}

/// Classify `e` as a function of `var`.
pub fn is_monotonic(e: &Expr, var: &str) -> Monotonic {
    use Monotonic::*;
    match e.node() {
        ExprNode::IntImm(_) | ExprNode::UIntImm(_) | ExprNode::FloatImm(_) | ExprNode::StringImm(_) => {
            Constant
        }
        ExprNode::Var(name) => {
            if name == var {
                Increasing
            } else {
                Constant
            }
        }
        ExprNode::Cast { value } => {
            // A widening cast preserves order; a narrowing one wraps.
            if e.ty().can_represent(&value.ty()) { is_monotonic(value, var) } else { Unknown }
        }
        ExprNode::Unary(UnaryOp::Neg, a) => is_monotonic(a, var).flip(),
        ExprNode::Unary(UnaryOp::Not, _) => Unknown,
        ExprNode::Binary(op, a, b) => {
            let ma = is_monotonic(a, var);
            let mb = is_monotonic(b, var);
            match op {
                BinaryOp::Add => ma.join(mb),
                BinaryOp::Sub => ma.join(mb.flip()),
                BinaryOp::Mul => match (b.as_const_i64(), a.as_const_i64()) {
                    (Some(c), _) => {
                        if c >= 0 {
                            ma
                        } else {
                            ma.flip()
                        }
                    }
                    (None, Some(c)) => {
                        if c >= 0 {
                            mb
                        } else {
                            mb.flip()
                        }
                    }
                    (None, None) => {
                        if ma == Constant && mb == Constant {
                            Constant
                        } else {
                            Unknown
                        }
                    }
                },
                BinaryOp::Div => match b.as_const_i64() {
                    // Euclidean division by a positive constant is
                    // order-preserving.
                    Some(c) if c > 0 => ma,
                    _ => {
                        if ma == Constant && mb == Constant {
                            Constant
                        } else {
                            Unknown
                        }
                    }
                },
                BinaryOp::Min | BinaryOp::Max => ma.join(mb),
                _ => {
                    if ma == Constant && mb == Constant {
                        Constant
                    } else {
                        Unknown
                    }
                }
            }
        }
        ExprNode::Select { condition, true_value, false_value } => {
            if uses_var(condition, var) {
                Unknown
            } else {
                is_monotonic(true_value, var).join(is_monotonic(false_value, var))
            }
        }
        ExprNode::Let { name, value, body } => {
            if name == var {
                // Shadowed: the body does not see our variable.
                if is_monotonic(value, var) == Constant { Constant } else { Unknown }
            } else if is_monotonic(value, var) == Constant {
                is_monotonic(body, var)
            } else {
                Unknown
            }
        }
        _ => {
            if uses_var(e, var) {
                Unknown
            } else {
                Constant
            }
        }
    }
}
