//! Named pure variables.
//!
//! A [`Var`] names one axis of a function's domain. It converts to an
//! int32 [`Expr`] wherever an expression is expected, and carries the
//! usual arithmetic so index expressions read naturally:
//!
//! ```ignore
//! let (x, y) = (Var::new("x"), Var::new("y"));
//! f.define([&x, &y], &x + &y);
//! ```

use std::ops::{Add, Div, Mul, Rem, Sub};

use rill_ir::ops::IntoExpr;
use rill_ir::{Expr, Type};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Var {
    name: String,
}

impl Var {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn expr(&self) -> Expr {
        Expr::var(self.name.clone())
    }
}

impl From<&str> for Var {
    fn from(name: &str) -> Self {
        Var::new(name)
    }
}

impl IntoExpr for Var {
    fn into_expr(self, _hint: &Type) -> Expr {
        self.expr()
    }
}

impl IntoExpr for &Var {
    fn into_expr(self, _hint: &Type) -> Expr {
        self.expr()
    }
}

macro_rules! impl_var_binop {
    ($($trait_:ident, $method:ident;)*) => {
        $(
            impl<T: IntoExpr> $trait_<T> for Var {
                type Output = Expr;
                fn $method(self, rhs: T) -> Expr {
                    self.expr().$method(rhs.into_expr(&Type::int32()))
                }
            }

            impl<T: IntoExpr> $trait_<T> for &Var {
                type Output = Expr;
                fn $method(self, rhs: T) -> Expr {
                    self.expr().$method(rhs.into_expr(&Type::int32()))
                }
            }
        )*
    };
}

impl_var_binop! {
    Add, add;
    Sub, sub;
    Mul, mul;
    Div, div;
    Rem, rem;
}
