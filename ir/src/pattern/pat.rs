//! The `Pat` pattern language.
//!
//! Patterns describe expression shapes the way regular expressions
//! describe strings: wildcards bind subtrees to names, operator patterns
//! constrain the node, and the same name bound twice must match the same
//! subtree (so `min(x, x)` is expressible).
//!
//! Operator overloads make rules read like the expressions they match:
//!
//! ```ignore
//! // x + 0
//! Pat::var("x") + Pat::imm("c")
//! ```

use std::ops::{Add, Div, Mul, Neg, Not, Rem, Sub};

use crate::types::{BinaryOp, UnaryOp};

#[derive(Clone, Debug)]
pub enum Pat {
    /// Matches anything; binds it to `name`.
    Wild { name: &'static str },
    /// Matches a scalar immediate; binds it to `name`.
    Imm { name: &'static str },
    /// Matches any of `ops` applied to matching operands.
    Binary { ops: Vec<BinaryOp>, lhs: Box<Pat>, rhs: Box<Pat> },
    Unary { ops: Vec<UnaryOp>, value: Box<Pat> },
    /// Matches any cast whose operand matches.
    CastOf { value: Box<Pat> },
    SelectOf { condition: Box<Pat>, true_value: Box<Pat>, false_value: Box<Pat> },
    RampOf { base: Box<Pat>, stride: Box<Pat> },
    BroadcastOf { value: Box<Pat> },
    /// Matches any variable reference; binds it to `name`.
    VarRef { name: &'static str },
    /// Matches a let binding whose value and body match.
    LetOf { value: Box<Pat>, body: Box<Pat> },
    /// Matches `inner` and also binds the whole node to `name`.
    Named { name: &'static str, inner: Box<Pat> },
}

impl Pat {
    pub fn var(name: &'static str) -> Pat {
        Pat::Wild { name }
    }

    pub fn imm(name: &'static str) -> Pat {
        Pat::Imm { name }
    }

    pub fn binary(ops: impl Into<Vec<BinaryOp>>, lhs: Pat, rhs: Pat) -> Pat {
        Pat::Binary { ops: ops.into(), lhs: Box::new(lhs), rhs: Box::new(rhs) }
    }

    pub fn unary(ops: impl Into<Vec<UnaryOp>>, value: Pat) -> Pat {
        Pat::Unary { ops: ops.into(), value: Box::new(value) }
    }

    pub fn cast(value: Pat) -> Pat {
        Pat::CastOf { value: Box::new(value) }
    }

    pub fn select(condition: Pat, true_value: Pat, false_value: Pat) -> Pat {
        Pat::SelectOf {
            condition: Box::new(condition),
            true_value: Box::new(true_value),
            false_value: Box::new(false_value),
        }
    }

    pub fn ramp(base: Pat, stride: Pat) -> Pat {
        Pat::RampOf { base: Box::new(base), stride: Box::new(stride) }
    }

    pub fn broadcast(value: Pat) -> Pat {
        Pat::BroadcastOf { value: Box::new(value) }
    }

    pub fn any_var(name: &'static str) -> Pat {
        Pat::VarRef { name }
    }

    pub fn let_of(value: Pat, body: Pat) -> Pat {
        Pat::LetOf { value: Box::new(value), body: Box::new(body) }
    }

    pub fn named(name: &'static str, inner: Pat) -> Pat {
        Pat::Named { name, inner: Box::new(inner) }
    }

    // Comparison and call-style builders; arithmetic comes from the
    // operator impls below.

    pub fn min_(self, rhs: Pat) -> Pat {
        Pat::binary([BinaryOp::Min], self, rhs)
    }

    pub fn max_(self, rhs: Pat) -> Pat {
        Pat::binary([BinaryOp::Max], self, rhs)
    }

    pub fn min_or_max(self, rhs: Pat) -> Pat {
        Pat::binary([BinaryOp::Min, BinaryOp::Max], self, rhs)
    }

    pub fn lt(self, rhs: Pat) -> Pat {
        Pat::binary([BinaryOp::Lt], self, rhs)
    }

    pub fn le(self, rhs: Pat) -> Pat {
        Pat::binary([BinaryOp::Le], self, rhs)
    }

    pub fn gt(self, rhs: Pat) -> Pat {
        Pat::binary([BinaryOp::Gt], self, rhs)
    }

    pub fn ge(self, rhs: Pat) -> Pat {
        Pat::binary([BinaryOp::Ge], self, rhs)
    }

    pub fn eq_(self, rhs: Pat) -> Pat {
        Pat::binary([BinaryOp::Eq], self, rhs)
    }

    pub fn ne_(self, rhs: Pat) -> Pat {
        Pat::binary([BinaryOp::Ne], self, rhs)
    }

    pub fn comparison(self, rhs: Pat) -> Pat {
        Pat::binary(
            [BinaryOp::Eq, BinaryOp::Ne, BinaryOp::Lt, BinaryOp::Le, BinaryOp::Gt, BinaryOp::Ge],
            self,
            rhs,
        )
    }

    pub fn and_(self, rhs: Pat) -> Pat {
        Pat::binary([BinaryOp::And], self, rhs)
    }

    pub fn or_(self, rhs: Pat) -> Pat {
        Pat::binary([BinaryOp::Or], self, rhs)
    }
}

macro_rules! impl_pat_binop {
    ($($trait_:ident, $method:ident, $op:expr;)*) => {
        $(
            impl $trait_ for Pat {
                type Output = Pat;
                fn $method(self, rhs: Pat) -> Pat {
                    Pat::binary([$op], self, rhs)
                }
            }
        )*
    };
}

impl_pat_binop! {
    Add, add, BinaryOp::Add;
    Sub, sub, BinaryOp::Sub;
    Mul, mul, BinaryOp::Mul;
    Div, div, BinaryOp::Div;
    Rem, rem, BinaryOp::Mod;
}

impl Neg for Pat {
    type Output = Pat;
    fn neg(self) -> Pat {
        Pat::unary([UnaryOp::Neg], self)
    }
}

impl Not for Pat {
    type Output = Pat;
    fn not(self) -> Pat {
        Pat::unary([UnaryOp::Not], self)
    }
}
