//! Statement-level simplification.
//!
//! Walks a statement tree, simplifying every embedded expression under
//! the correct scope (loop variables get their iteration interval, let
//! bindings their defining expression) and applying the statement rules:
//! constant-condition branches collapse, zero-extent loops disappear,
//! trivial lets inline, provably-true asserts vanish.

use crate::analysis::is_pure;
use crate::expr::Expr;
use crate::interval::ConstantInterval;
use crate::pattern::PatternMatcher;
use crate::rewrite::Rewriter;
use crate::stmt::{Range, Stmt, StmtNode};
use crate::substitute::substitute_stmt;
use crate::visitor::{Visitor, walk_expr, walk_stmt};

use super::{SimplifyCtx, VarInfo};

/// Whether `name` occurs free in any expression of the statement.
fn stmt_uses_var(s: &Stmt, name: &str) -> bool {
    struct Uses<'a> {
        name: &'a str,
        found: bool,
    }
    impl Visitor for Uses<'_> {
        fn visit_expr(&mut self, e: &Expr) {
            if self.found {
                return;
            }
            if crate::analysis::uses_var(e, self.name) {
                self.found = true;
            } else {
                walk_expr(self, e);
            }
        }

        fn visit_stmt(&mut self, s: &Stmt) {
            if !self.found {
                walk_stmt(self, s);
            }
        }
    }
    let mut v = Uses { name, found: false };
    v.visit_stmt(s);
    v.found
}

/// The statement simplifier. Holds the rewrite engine and the scoped
/// context across the walk.
pub struct Simplifier<'m> {
    rewriter: Rewriter<'m, SimplifyCtx>,
    ctx: SimplifyCtx,
}

impl<'m> Simplifier<'m> {
    pub fn new(matcher: &'m PatternMatcher<SimplifyCtx>) -> Self {
        Self { rewriter: Rewriter::new(matcher), ctx: SimplifyCtx::new() }
    }

    pub fn with_ctx(matcher: &'m PatternMatcher<SimplifyCtx>, ctx: SimplifyCtx) -> Self {
        Self { rewriter: Rewriter::new(matcher), ctx }
    }

    pub fn simplify_expr(&mut self, e: &Expr) -> Expr {
        self.rewriter.rewrite(e, &mut self.ctx)
    }

    fn simplify_opt(&mut self, e: &Option<Expr>) -> Option<Expr> {
        e.as_ref().map(|e| self.simplify_expr(e))
    }

    /// Simplify under a binding for `name`, restoring scope afterwards.
    fn scoped<R>(&mut self, name: &str, info: VarInfo, f: impl FnOnce(&mut Self) -> R) -> R {
        self.ctx.push_var(name, info);
        self.rewriter.push_scope();
        let out = f(self);
        self.rewriter.pop_scope();
        self.ctx.pop_var(name);
        out
    }

    pub fn simplify_stmt(&mut self, s: &Stmt) -> Stmt {
        match s.node() {
            StmtNode::LetStmt { name, value, body } => {
                let value = self.simplify_expr(value);
                if value.is_const() || value.as_var().is_some() {
                    return self.simplify_stmt(&substitute_stmt(body, name, &value));
                }
                let info = VarInfo { interval: self.ctx.bounds(&value), equals: Some(value.clone()) };
                let body = self.scoped(name, info, |this| this.simplify_stmt(body));
                if is_pure(&value) && !stmt_uses_var(&body, name) {
                    return body;
                }
                Stmt::let_stmt(name.clone(), value, body)
            }
            StmtNode::AssertStmt { condition, message } => {
                let condition = self.simplify_expr(condition);
                match condition.as_const() {
                    Some(v) if v.as_bool() => Stmt::no_op(),
                    _ => Stmt::assert_stmt(condition, message.clone()),
                }
            }
            StmtNode::Block { stmts } => {
                Stmt::block(stmts.iter().map(|s| self.simplify_stmt(s)).collect())
            }
            StmtNode::IfThenElse { condition, then_case, else_case } => {
                let condition = self.simplify_expr(condition);
                if let Some(v) = condition.as_const() {
                    return if v.as_bool() {
                        self.simplify_stmt(then_case)
                    } else {
                        match else_case {
                            Some(e) => self.simplify_stmt(e),
                            None => Stmt::no_op(),
                        }
                    };
                }
                let then_case = self.simplify_stmt(then_case);
                let else_case = else_case.as_ref().map(|e| self.simplify_stmt(e));
                if then_case.is_no_op() && else_case.as_ref().is_none_or(Stmt::is_no_op) {
                    return Stmt::no_op();
                }
                Stmt::if_then_else(condition, then_case, else_case.filter(|e| !e.is_no_op()))
            }
            StmtNode::For { var, min, extent, kind, body } => {
                let min = self.simplify_expr(min);
                let extent = self.simplify_expr(extent);
                // A zero-extent (or provably negative) loop has no
                // iterations and no effects.
                if self.ctx.bounds(&extent).max.is_some_and(|m| m <= 0) {
                    return Stmt::no_op();
                }
                let last = Expr::sub(Expr::add(min.clone(), extent.clone()), Expr::int(1));
                let interval = ConstantInterval {
                    min: self.ctx.bounds(&min).min,
                    max: self.ctx.bounds(&last).max,
                };
                let info = VarInfo { interval, equals: None };
                let body = self.scoped(var, info, |this| this.simplify_stmt(body));
                if body.is_no_op() {
                    return Stmt::no_op();
                }
                Stmt::for_(var.clone(), min, extent, *kind, body)
            }
            StmtNode::Store { buffer, index, value, predicate } => {
                let index = self.simplify_expr(index);
                let value = self.simplify_expr(value);
                let predicate = self.simplify_opt(predicate);
                match &predicate {
                    Some(p) if p.is_const() => {
                        if p.as_const().is_some_and(|v| v.as_bool()) {
                            Stmt::store(buffer.clone(), index, value, None)
                        } else {
                            Stmt::no_op()
                        }
                    }
                    _ => Stmt::store(buffer.clone(), index, value, predicate),
                }
            }
            StmtNode::Provide { name, args, values, predicate } => {
                let args: Vec<Expr> = args.iter().map(|a| self.simplify_expr(a)).collect();
                let values: Vec<Expr> = values.iter().map(|v| self.simplify_expr(v)).collect();
                let predicate = self.simplify_opt(predicate);
                match &predicate {
                    Some(p) if p.is_const() => {
                        if p.as_const().is_some_and(|v| v.as_bool()) {
                            Stmt::provide(name.clone(), args, values, None)
                        } else {
                            Stmt::no_op()
                        }
                    }
                    _ => Stmt::provide(name.clone(), args, values, predicate),
                }
            }
            StmtNode::Allocate { name, ty, memory, extents, condition, body } => {
                let extents: Vec<Expr> = extents.iter().map(|e| self.simplify_expr(e)).collect();
                let condition = self.simplify_opt(condition);
                let body = self.simplify_stmt(body);
                if body.is_no_op() {
                    return Stmt::no_op();
                }
                Stmt::allocate(name.clone(), *ty, *memory, extents, condition, body)
            }
            StmtNode::Free { .. } => s.clone(),
            StmtNode::Realize { name, types, bounds, body } => {
                let bounds = bounds
                    .iter()
                    .map(|r| Range::new(self.simplify_expr(&r.min), self.simplify_expr(&r.extent)))
                    .collect();
                let body = self.simplify_stmt(body);
                if body.is_no_op() {
                    return Stmt::no_op();
                }
                Stmt::realize(name.clone(), types.clone(), bounds, body)
            }
            StmtNode::ProducerConsumer { name, is_producer, body } => {
                let body = self.simplify_stmt(body);
                if body.is_no_op() {
                    return Stmt::no_op();
                }
                if *is_producer { Stmt::producer(name.clone(), body) } else { Stmt::consumer(name.clone(), body) }
            }
            StmtNode::Evaluate { value } => {
                let value = self.simplify_expr(value);
                if value.is_const() || is_pure(&value) {
                    return Stmt::no_op();
                }
                Stmt::evaluate(value)
            }
            StmtNode::Prefetch { buffer, bounds } => {
                let bounds = bounds
                    .iter()
                    .map(|r| Range::new(self.simplify_expr(&r.min), self.simplify_expr(&r.extent)))
                    .collect();
                Stmt::prefetch(buffer.clone(), bounds)
            }
            StmtNode::Atomic { body } => {
                let body = self.simplify_stmt(body);
                if body.is_no_op() {
                    return Stmt::no_op();
                }
                Stmt::atomic(body)
            }
        }
    }
}

/// Simplify a whole statement tree with an empty initial context.
pub fn simplify_stmt(s: &Stmt) -> Stmt {
    super::RULES.with(|matcher| Simplifier::new(matcher).simplify_stmt(s))
}

/// Simplify a statement tree under a pre-seeded context (outer loop
/// bounds, fast-math).
pub fn simplify_stmt_in(s: &Stmt, ctx: SimplifyCtx) -> Stmt {
    super::RULES.with(|matcher| Simplifier::with_ctx(matcher, ctx).simplify_stmt(s))
}
