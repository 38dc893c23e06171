//! Read-only traversal.
//!
//! Implementors override `visit_expr`/`visit_stmt`, inspect the node, and
//! call the corresponding `walk_*` helper to descend. The defaults visit
//! every child, so an analysis only has to handle the nodes it cares
//! about.

use crate::expr::Expr;
use crate::stmt::{Stmt, StmtNode};

pub trait Visitor {
    fn visit_expr(&mut self, e: &Expr) {
        walk_expr(self, e);
    }

    fn visit_stmt(&mut self, s: &Stmt) {
        walk_stmt(self, s);
    }
}

/// Visit every child expression of `e`.
pub fn walk_expr<V: Visitor + ?Sized>(v: &mut V, e: &Expr) {
    for child in e.children() {
        v.visit_expr(&child);
    }
}

/// Visit every child expression and statement of `s`.
pub fn walk_stmt<V: Visitor + ?Sized>(v: &mut V, s: &Stmt) {
    match s.node() {
        StmtNode::LetStmt { value, body, .. } => {
            v.visit_expr(value);
            v.visit_stmt(body);
        }
        StmtNode::AssertStmt { condition, .. } => v.visit_expr(condition),
        StmtNode::Block { stmts } => {
            for s in stmts {
                v.visit_stmt(s);
            }
        }
        StmtNode::IfThenElse { condition, then_case, else_case } => {
            v.visit_expr(condition);
            v.visit_stmt(then_case);
            if let Some(e) = else_case {
                v.visit_stmt(e);
            }
        }
        StmtNode::For { min, extent, body, .. } => {
            v.visit_expr(min);
            v.visit_expr(extent);
            v.visit_stmt(body);
        }
        StmtNode::Store { index, value, predicate, .. } => {
            v.visit_expr(index);
            v.visit_expr(value);
            if let Some(p) = predicate {
                v.visit_expr(p);
            }
        }
        StmtNode::Provide { args, values, predicate, .. } => {
            for a in args {
                v.visit_expr(a);
            }
            for val in values {
                v.visit_expr(val);
            }
            if let Some(p) = predicate {
                v.visit_expr(p);
            }
        }
        StmtNode::Allocate { extents, condition, body, .. } => {
            for e in extents {
                v.visit_expr(e);
            }
            if let Some(c) = condition {
                v.visit_expr(c);
            }
            v.visit_stmt(body);
        }
        StmtNode::Free { .. } => {}
        StmtNode::Realize { bounds, body, .. } => {
            for r in bounds {
                v.visit_expr(&r.min);
                v.visit_expr(&r.extent);
            }
            v.visit_stmt(body);
        }
        StmtNode::ProducerConsumer { body, .. } | StmtNode::Atomic { body } => v.visit_stmt(body),
        StmtNode::Evaluate { value } => v.visit_expr(value),
        StmtNode::Prefetch { bounds, .. } => {
            for r in bounds {
                v.visit_expr(&r.min);
                v.visit_expr(&r.extent);
            }
        }
    }
}
