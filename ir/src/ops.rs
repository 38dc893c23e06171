//! Operator overloads for building expressions.
//!
//! The frontend sees [`Expr`] as an opaque handle with overloaded
//! arithmetic: `x + 1`, `in_buf * 2.0f32`, `1 + x`. Mixed operands
//! promote through [`rill_dtype::promote`]; scalar literals adopt the
//! other operand's element type when it can represent them.

use std::ops::{Add, Div, Mul, Neg, Not, Rem, Sub};

use crate::expr::Expr;
use crate::types::ConstValue;
use rill_dtype::Type;

/// Values that convert to an expression given a type hint from the
/// other operand.
pub trait IntoExpr {
    fn into_expr(self, hint: &Type) -> Expr;
}

impl IntoExpr for Expr {
    fn into_expr(self, _hint: &Type) -> Expr {
        self
    }
}

impl IntoExpr for &Expr {
    fn into_expr(self, _hint: &Type) -> Expr {
        self.clone()
    }
}

impl IntoExpr for i64 {
    fn into_expr(self, hint: &Type) -> Expr {
        let elem = hint.element_of();
        if elem.is_integral() && elem.can_represent_i64(self) {
            Expr::imm(elem, ConstValue::Int(self))
        } else if elem.is_float() {
            Expr::imm(elem, ConstValue::Float(self as f64))
        } else {
            Expr::int(self)
        }
    }
}

impl IntoExpr for i32 {
    fn into_expr(self, hint: &Type) -> Expr {
        (self as i64).into_expr(hint)
    }
}

impl IntoExpr for f32 {
    fn into_expr(self, hint: &Type) -> Expr {
        let elem = hint.element_of();
        if elem.is_float() { Expr::imm(elem, ConstValue::Float(self as f64)) } else { Expr::f32(self) }
    }
}

impl IntoExpr for f64 {
    fn into_expr(self, hint: &Type) -> Expr {
        let elem = hint.element_of();
        if elem.is_float() {
            Expr::imm(elem, ConstValue::Float(self))
        } else {
            Expr::imm(Type::float(64), ConstValue::Float(self))
        }
    }
}

macro_rules! impl_expr_binop {
    ($($trait_:ident, $method:ident, $ctor:ident;)*) => {
        $(
            impl<T: IntoExpr> $trait_<T> for Expr {
                type Output = Expr;
                fn $method(self, rhs: T) -> Expr {
                    let rhs = rhs.into_expr(&self.ty());
                    Expr::$ctor(self, rhs)
                }
            }

            impl<T: IntoExpr> $trait_<T> for &Expr {
                type Output = Expr;
                fn $method(self, rhs: T) -> Expr {
                    let rhs = rhs.into_expr(&self.ty());
                    Expr::$ctor(self.clone(), rhs)
                }
            }
        )*
    };
}

impl_expr_binop! {
    Add, add, add;
    Sub, sub, sub;
    Mul, mul, mul;
    Div, div, div;
    Rem, rem, modulo;
}

macro_rules! impl_scalar_lhs {
    ($($scalar:ty),*) => {
        $(
            impl Add<Expr> for $scalar {
                type Output = Expr;
                fn add(self, rhs: Expr) -> Expr {
                    Expr::add(self.into_expr(&rhs.ty()), rhs)
                }
            }
            impl Sub<Expr> for $scalar {
                type Output = Expr;
                fn sub(self, rhs: Expr) -> Expr {
                    Expr::sub(self.into_expr(&rhs.ty()), rhs)
                }
            }
            impl Mul<Expr> for $scalar {
                type Output = Expr;
                fn mul(self, rhs: Expr) -> Expr {
                    Expr::mul(self.into_expr(&rhs.ty()), rhs)
                }
            }
            impl Div<Expr> for $scalar {
                type Output = Expr;
                fn div(self, rhs: Expr) -> Expr {
                    Expr::div(self.into_expr(&rhs.ty()), rhs)
                }
            }
        )*
    };
}

impl_scalar_lhs!(i32, i64, f32, f64);

impl Neg for Expr {
    type Output = Expr;
    fn neg(self) -> Expr {
        Expr::neg(self)
    }
}

impl Neg for &Expr {
    type Output = Expr;
    fn neg(self) -> Expr {
        Expr::neg(self.clone())
    }
}

impl Not for Expr {
    type Output = Expr;
    fn not(self) -> Expr {
        Expr::not(self)
    }
}

impl Not for &Expr {
    type Output = Expr;
    fn not(self) -> Expr {
        Expr::not(self.clone())
    }
}

/// `min` / `max` / `select` / `clamp` helpers with promotion, mirroring
/// the method-free spelling the frontend reads naturally.
pub fn min(a: impl IntoExpr, b: impl IntoExpr) -> Expr {
    let a = a.into_expr(&Type::int32());
    let b = b.into_expr(&a.ty());
    Expr::min(a, b)
}

pub fn max(a: impl IntoExpr, b: impl IntoExpr) -> Expr {
    let a = a.into_expr(&Type::int32());
    let b = b.into_expr(&a.ty());
    Expr::max(a, b)
}

pub fn select(cond: Expr, t: impl IntoExpr, f: impl IntoExpr) -> Expr {
    let t = t.into_expr(&Type::int32());
    let f = f.into_expr(&t.ty());
    Expr::select(cond, t, f)
}

pub fn clamp(x: Expr, lo: impl IntoExpr, hi: impl IntoExpr) -> Expr {
    let lo = lo.into_expr(&x.ty());
    let hi = hi.into_expr(&x.ty());
    Expr::max(Expr::min(x, hi), lo)
}
