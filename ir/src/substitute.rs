//! Variable substitution, with correct shadowing.

use std::collections::HashMap;

use crate::expr::{Expr, ExprNode};
use crate::mutator::{Mutator, mutate_expr_children, mutate_stmt_children};
use crate::stmt::{Stmt, StmtNode};

struct Subst<'a> {
    map: &'a HashMap<String, Expr>,
    /// Names rebound by an enclosing Let/LetStmt/For, temporarily removed
    /// from consideration.
    shadowed: Vec<String>,
}

impl Subst<'_> {
    fn is_shadowed(&self, name: &str) -> bool {
        self.shadowed.iter().any(|n| n == name)
    }

    fn with_shadow<R>(&mut self, name: &str, f: impl FnOnce(&mut Self) -> R) -> R {
        self.shadowed.push(name.to_string());
        let out = f(self);
        self.shadowed.pop();
        out
    }
}

impl Mutator for Subst<'_> {
    fn mutate_expr(&mut self, e: &Expr) -> Expr {
        match e.node() {
            ExprNode::Var(name) => {
                if !self.is_shadowed(name)
                    && let Some(replacement) = self.map.get(name)
                {
                    return replacement.clone();
                }
                e.clone()
            }
            ExprNode::Let { name, value, body } => {
                let new_value = self.mutate_expr(value);
                let new_body = self.with_shadow(name, |s| s.mutate_expr(body));
                if new_value.same(value) && new_body.same(body) {
                    return e.clone();
                }
                Expr::let_(name.clone(), new_value, new_body)
            }
            _ => mutate_expr_children(self, e),
        }
    }

    fn mutate_stmt(&mut self, s: &Stmt) -> Stmt {
        match s.node() {
            StmtNode::LetStmt { name, value, body } => {
                let new_value = self.mutate_expr(value);
                let new_body = self.with_shadow(name, |sub| sub.mutate_stmt(body));
                if new_value.same(value) && new_body.same(body) {
                    return s.clone();
                }
                Stmt::let_stmt(name.clone(), new_value, new_body)
            }
            StmtNode::For { var, min, extent, kind, body } => {
                let new_min = self.mutate_expr(min);
                let new_extent = self.mutate_expr(extent);
                let new_body = self.with_shadow(var, |sub| sub.mutate_stmt(body));
                if new_min.same(min) && new_extent.same(extent) && new_body.same(body) {
                    return s.clone();
                }
                Stmt::for_(var.clone(), new_min, new_extent, *kind, new_body)
            }
            _ => mutate_stmt_children(self, s),
        }
    }
}

/// Replace free occurrences of `name` in `e` with `value`.
pub fn substitute(e: &Expr, name: &str, value: &Expr) -> Expr {
    let mut map = HashMap::new();
    map.insert(name.to_string(), value.clone());
    substitute_map(e, &map)
}

/// Replace free occurrences of every mapped variable in `e`.
pub fn substitute_map(e: &Expr, map: &HashMap<String, Expr>) -> Expr {
    if map.is_empty() {
        return e.clone();
    }
    Subst { map, shadowed: Vec::new() }.mutate_expr(e)
}

/// Replace free occurrences of `name` in `s` with `value`.
pub fn substitute_stmt(s: &Stmt, name: &str, value: &Expr) -> Stmt {
    let mut map = HashMap::new();
    map.insert(name.to_string(), value.clone());
    substitute_stmt_map(s, &map)
}

/// Replace free occurrences of every mapped variable in `s`.
pub fn substitute_stmt_map(s: &Stmt, map: &HashMap<String, Expr>) -> Stmt {
    if map.is_empty() {
        return s.clone();
    }
    Subst { map, shadowed: Vec::new() }.mutate_stmt(s)
}
