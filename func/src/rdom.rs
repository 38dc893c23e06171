//! Reduction domains.
//!
//! A reduction domain is an ordered list of (name, min, extent) triples
//! defining iteration variables that may only appear in update
//! definitions. Each entry optionally carries a boolean predicate gating
//! its iterations.

use std::ops::{Add, Div, Mul, Rem, Sub};

use rill_ir::ops::IntoExpr;
use rill_ir::{Expr, Type};

/// One axis of a reduction domain.
#[derive(Debug, Clone, PartialEq)]
pub struct ReductionVariable {
    pub name: String,
    pub min: Expr,
    pub extent: Expr,
    /// Iterations run only where this holds.
    pub predicate: Option<Expr>,
}

/// An ordered, bounded set of integer tuples an update iterates over.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ReductionDomain {
    pub vars: Vec<ReductionVariable>,
}

impl ReductionDomain {
    pub fn var(&self, name: &str) -> Option<&ReductionVariable> {
        self.vars.iter().find(|v| v.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.var(name).is_some()
    }

    /// The conjunction of every axis predicate, if any exist.
    pub fn combined_predicate(&self) -> Option<Expr> {
        self.vars
            .iter()
            .filter_map(|v| v.predicate.clone())
            .reduce(|a, b| Expr::and(a, b))
    }
}

/// A handle to one reduction variable, usable inside index expressions.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RVar {
    name: String,
}

impl RVar {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn expr(&self) -> Expr {
        Expr::var(self.name.clone())
    }
}

impl IntoExpr for RVar {
    fn into_expr(self, _hint: &Type) -> Expr {
        self.expr()
    }
}

impl IntoExpr for &RVar {
    fn into_expr(self, _hint: &Type) -> Expr {
        self.expr()
    }
}

macro_rules! impl_rvar_binop {
    ($($trait_:ident, $method:ident;)*) => {
        $(
            impl<T: IntoExpr> $trait_<T> for RVar {
                type Output = Expr;
                fn $method(self, rhs: T) -> Expr {
                    self.expr().$method(rhs.into_expr(&Type::int32()))
                }
            }

            impl<T: IntoExpr> $trait_<T> for &RVar {
                type Output = Expr;
                fn $method(self, rhs: T) -> Expr {
                    self.expr().$method(rhs.into_expr(&Type::int32()))
                }
            }
        )*
    };
}

impl_rvar_binop! {
    Add, add;
    Sub, sub;
    Mul, mul;
    Div, div;
    Rem, rem;
}

/// Frontend builder for reduction domains.
///
/// ```ignore
/// let r = RDom::new("r", [(0, n)]);
/// hist.update([in_buf.at([r.x()])], [hist.at([in_buf.at([r.x()])]) + 1], &r);
/// ```
#[derive(Debug, Clone)]
pub struct RDom {
    name: String,
    domain: ReductionDomain,
}

impl RDom {
    /// Build a domain from (min, extent) pairs. Axes are named `name$x`,
    /// `name$y`, `name$z`, `name$w`, then `name$4`, `name$5`, ... (`$`
    /// rather than `.` keeps reduction variables distinct from the
    /// hierarchical dim names splits produce).
    pub fn new(name: impl Into<String>, ranges: impl IntoIterator<Item = (Expr, Expr)>) -> Self {
        let name = name.into();
        let axis_names = ["x", "y", "z", "w"];
        let vars = ranges
            .into_iter()
            .enumerate()
            .map(|(i, (min, extent))| ReductionVariable {
                name: match axis_names.get(i) {
                    Some(axis) => format!("{name}${axis}"),
                    None => format!("{name}${i}"),
                },
                min,
                extent,
                predicate: None,
            })
            .collect();
        Self { name, domain: ReductionDomain { vars } }
    }

    /// One-dimensional convenience constructor.
    pub fn single(name: impl Into<String>, min: Expr, extent: Expr) -> Self {
        Self::new(name, [(min, extent)])
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Attach a predicate to the innermost (last) axis: iterations run
    /// only where it holds.
    pub fn where_(mut self, predicate: Expr) -> Self {
        if let Some(last) = self.domain.vars.last_mut() {
            last.predicate = Some(match last.predicate.take() {
                Some(p) => Expr::and(p, predicate),
                None => predicate,
            });
        }
        self
    }

    pub fn domain(&self) -> &ReductionDomain {
        &self.domain
    }

    /// The first axis.
    pub fn x(&self) -> RVar {
        self.axis(0)
    }

    pub fn y(&self) -> RVar {
        self.axis(1)
    }

    pub fn z(&self) -> RVar {
        self.axis(2)
    }

    /// Axis by position.
    ///
    /// # Panics
    ///
    /// Panics when the domain has fewer axes; using a nonexistent axis
    /// is a frontend programming error.
    pub fn axis(&self, i: usize) -> RVar {
        match self.domain.vars.get(i) {
            Some(v) => RVar { name: v.name.clone() },
            None => panic!("reduction domain {} has no axis {i}", self.name),
        }
    }
}
