//! The algebraic simplifier.
//!
//! A bottom-up rewriter over expressions and statements. The contract:
//! semantics-preserving for every valid input, and strongly normalizing -
//! `simplify(simplify(e)) == simplify(e)`.
//!
//! The simplifier carries a scoped context mapping in-scope variables to
//! constant-bounds intervals and known equalities. Entering a let binding
//! or a loop extends the context; leaving restores it. Rules consult the
//! context through the `; ctx` form of [`rule!`].
//!
//! Floating-point rules are restricted to identities that are exact under
//! IEEE semantics unless [`SimplifyCtx::fast_math`] is set.

pub mod rules;
pub mod stmts;

use crate::expr::Expr;
use crate::interval::{ConstantInterval, bounds_of_expr};
use crate::rewrite::{Rewriter, RewriteScope};

pub use stmts::{Simplifier, simplify_stmt};

/// Everything the simplifier knows about one in-scope variable.
#[derive(Debug, Clone)]
pub struct VarInfo {
    pub interval: ConstantInterval,
    /// The defining expression, when the variable came from a let.
    pub equals: Option<Expr>,
}

/// Scoped simplification context: a stack of variable facts plus the
/// configuration flags that change which rules are legal.
#[derive(Default)]
pub struct SimplifyCtx {
    scopes: Vec<(String, VarInfo)>,
    /// Permit float rewrites that are only approximately value-preserving
    /// (reassociation, x+0, x*0).
    pub fast_math: bool,
}

impl SimplifyCtx {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fast_math() -> Self {
        Self { fast_math: true, ..Self::default() }
    }

    pub fn push_var(&mut self, name: impl Into<String>, info: VarInfo) {
        self.scopes.push((name.into(), info));
    }

    pub fn pop_var(&mut self, name: &str) {
        if let Some(pos) = self.scopes.iter().rposition(|(n, _)| n == name) {
            self.scopes.remove(pos);
        }
    }

    pub fn var_info(&self, name: &str) -> Option<&VarInfo> {
        self.scopes.iter().rev().find(|(n, _)| n == name).map(|(_, info)| info)
    }

    pub fn interval_of(&self, name: &str) -> Option<ConstantInterval> {
        self.var_info(name).map(|info| info.interval)
    }

    /// Bound an expression using every fact in scope.
    pub fn bounds(&self, e: &Expr) -> ConstantInterval {
        bounds_of_expr(e, &|name| self.interval_of(name))
    }
}

impl RewriteScope for SimplifyCtx {
    fn enter_let(&mut self, name: &str, value: &Expr) {
        let interval = self.bounds(value);
        self.push_var(name, VarInfo { interval, equals: Some(value.clone()) });
    }

    fn exit_let(&mut self, name: &str) {
        self.pop_var(name);
    }
}

thread_local! {
    static RULES: crate::pattern::PatternMatcher<SimplifyCtx> = rules::simplify_rules();
}

/// Simplify an expression with an empty context.
pub fn simplify(e: &Expr) -> Expr {
    simplify_in(e, &mut SimplifyCtx::new())
}

/// Simplify an expression under an existing context (outer loop variable
/// bounds, fast-math).
pub fn simplify_in(e: &Expr, ctx: &mut SimplifyCtx) -> Expr {
    RULES.with(|matcher| Rewriter::new(matcher).rewrite(e, ctx))
}
