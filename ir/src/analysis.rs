//! Small read-only analyses used throughout the compiler.

use std::collections::HashSet;

use crate::expr::{Expr, ExprNode};
use crate::stmt::{Stmt, StmtNode};
use crate::types::CallType;
use crate::visitor::{Visitor, walk_expr, walk_stmt};

/// Names of variables that occur free in an expression.
pub fn free_vars(e: &Expr) -> HashSet<String> {
    struct FreeVars {
        free: HashSet<String>,
        bound: Vec<String>,
    }
    impl Visitor for FreeVars {
        fn visit_expr(&mut self, e: &Expr) {
            match e.node() {
                ExprNode::Var(name) => {
                    if !self.bound.iter().any(|b| b == name) {
                        self.free.insert(name.clone());
                    }
                }
                ExprNode::Let { name, value, body } => {
                    self.visit_expr(value);
                    self.bound.push(name.clone());
                    self.visit_expr(body);
                    self.bound.pop();
                }
                _ => walk_expr(self, e),
            }
        }
    }
    let mut v = FreeVars { free: HashSet::new(), bound: Vec::new() };
    v.visit_expr(e);
    v.free
}

/// Whether `name` occurs free in the expression.
pub fn uses_var(e: &Expr, name: &str) -> bool {
    free_vars(e).contains(name)
}

/// All calls to pipeline functions in an expression, as (name, args).
pub fn function_calls(e: &Expr) -> Vec<Expr> {
    struct Calls(Vec<Expr>);
    impl Visitor for Calls {
        fn visit_expr(&mut self, e: &Expr) {
            if let ExprNode::Call { call_type: CallType::Function, .. } = e.node() {
                self.0.push(e.clone());
            }
            walk_expr(self, e);
        }
    }
    let mut v = Calls(Vec::new());
    v.visit_expr(e);
    v.0
}

/// Names of pipeline functions called anywhere in an expression.
pub fn called_functions(e: &Expr) -> HashSet<String> {
    function_calls(e)
        .iter()
        .filter_map(|c| match c.node() {
            ExprNode::Call { name, .. } => Some(name.clone()),
            _ => None,
        })
        .collect()
}

/// Names of buffers loaded from or stored to anywhere in a statement.
/// Includes pre-flattening function accesses (Provide/Call/Realize names).
pub fn buffers_touched(s: &Stmt) -> HashSet<String> {
    struct Touched(HashSet<String>);
    impl Visitor for Touched {
        fn visit_expr(&mut self, e: &Expr) {
            match e.node() {
                ExprNode::Load { buffer, .. } => {
                    self.0.insert(buffer.clone());
                }
                ExprNode::Call { name, call_type: CallType::Function | CallType::Image, .. } => {
                    self.0.insert(name.clone());
                }
                _ => {}
            }
            walk_expr(self, e);
        }

        fn visit_stmt(&mut self, s: &Stmt) {
            match s.node() {
                StmtNode::Store { buffer, .. } => {
                    self.0.insert(buffer.clone());
                }
                StmtNode::Provide { name, .. } => {
                    self.0.insert(name.clone());
                }
                _ => {}
            }
            walk_stmt(self, s);
        }
    }
    let mut v = Touched(HashSet::new());
    v.visit_stmt(s);
    v.0
}

/// Whether the statement references `name` as a buffer at all.
pub fn stmt_touches_buffer(s: &Stmt, name: &str) -> bool {
    buffers_touched(s).contains(name)
}

/// Whether an expression is free of loads, impure calls and side
/// channels, i.e. safe to duplicate or reorder.
pub fn is_pure(e: &Expr) -> bool {
    struct Pure(bool);
    impl Visitor for Pure {
        fn visit_expr(&mut self, e: &Expr) {
            match e.node() {
                ExprNode::Load { .. } | ExprNode::Call { call_type: CallType::Extern, .. } => self.0 = false,
                _ => walk_expr(self, e),
            }
        }
    }
    let mut v = Pure(true);
    v.visit_expr(e);
    v.0
}

/// Count free occurrences of `name` (used to decide let inlining).
pub fn count_var_uses(e: &Expr, name: &str) -> usize {
    struct Count<'a> {
        name: &'a str,
        shadow: usize,
        count: usize,
    }
    impl Visitor for Count<'_> {
        fn visit_expr(&mut self, e: &Expr) {
            match e.node() {
                ExprNode::Var(n) if n == self.name && self.shadow == 0 => self.count += 1,
                ExprNode::Let { name, value, body } => {
                    self.visit_expr(value);
                    if name == self.name {
                        self.shadow += 1;
                        self.visit_expr(body);
                        self.shadow -= 1;
                    } else {
                        self.visit_expr(body);
                    }
                }
                _ => walk_expr(self, e),
            }
        }
    }
    let mut v = Count { name, shadow: 0, count: 0 };
    v.visit_expr(e);
    v.count
}
