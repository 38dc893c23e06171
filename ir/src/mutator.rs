//! Rebuilding traversal.
//!
//! A `Mutator` returns a possibly-new node for each visited one. The
//! `mutate_*_children` helpers rebuild a node only when some child
//! actually changed, so an untouched subtree keeps its allocation and a
//! no-op pass returns its input pointer-identical.

use smallvec::SmallVec;

use crate::expr::Expr;
use crate::stmt::{Range, Stmt, StmtNode};

pub trait Mutator {
    fn mutate_expr(&mut self, e: &Expr) -> Expr {
        mutate_expr_children(self, e)
    }

    fn mutate_stmt(&mut self, s: &Stmt) -> Stmt {
        mutate_stmt_children(self, s)
    }
}

/// Rebuild `e` from mutated children, preserving identity when nothing
/// changed.
pub fn mutate_expr_children<M: Mutator + ?Sized>(m: &mut M, e: &Expr) -> Expr {
    let children = e.children();
    if children.is_empty() {
        return e.clone();
    }
    let new: SmallVec<[Expr; 4]> = children.iter().map(|c| m.mutate_expr(c)).collect();
    e.with_children(&new)
}

fn mutate_opt<M: Mutator + ?Sized>(m: &mut M, e: &Option<Expr>) -> Option<Expr> {
    e.as_ref().map(|e| m.mutate_expr(e))
}

fn opt_same(a: &Option<Expr>, b: &Option<Expr>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(x), Some(y)) => x.same(y),
        _ => false,
    }
}

fn mutate_ranges<M: Mutator + ?Sized>(m: &mut M, bounds: &[Range]) -> (Vec<Range>, bool) {
    let mut changed = false;
    let new = bounds
        .iter()
        .map(|r| {
            let min = m.mutate_expr(&r.min);
            let extent = m.mutate_expr(&r.extent);
            changed |= !min.same(&r.min) || !extent.same(&r.extent);
            Range { min, extent }
        })
        .collect();
    (new, changed)
}

/// Rebuild `s` from mutated children, preserving identity when nothing
/// changed.
pub fn mutate_stmt_children<M: Mutator + ?Sized>(m: &mut M, s: &Stmt) -> Stmt {
    match s.node() {
        StmtNode::LetStmt { name, value, body } => {
            let new_value = m.mutate_expr(value);
            let new_body = m.mutate_stmt(body);
            if new_value.same(value) && new_body.same(body) {
                return s.clone();
            }
            Stmt::let_stmt(name.clone(), new_value, new_body)
        }
        StmtNode::AssertStmt { condition, message } => {
            let new_condition = m.mutate_expr(condition);
            if new_condition.same(condition) {
                return s.clone();
            }
            Stmt::assert_stmt(new_condition, message.clone())
        }
        StmtNode::Block { stmts } => {
            let new: Vec<Stmt> = stmts.iter().map(|s| m.mutate_stmt(s)).collect();
            if new.iter().zip(stmts).all(|(a, b)| a.same(b)) {
                return s.clone();
            }
            Stmt::block(new)
        }
        StmtNode::IfThenElse { condition, then_case, else_case } => {
            let new_condition = m.mutate_expr(condition);
            let new_then = m.mutate_stmt(then_case);
            let new_else = else_case.as_ref().map(|e| m.mutate_stmt(e));
            let else_same = match (&new_else, else_case) {
                (None, None) => true,
                (Some(a), Some(b)) => a.same(b),
                _ => false,
            };
            if new_condition.same(condition) && new_then.same(then_case) && else_same {
                return s.clone();
            }
            Stmt::if_then_else(new_condition, new_then, new_else)
        }
        StmtNode::For { var, min, extent, kind, body } => {
            let new_min = m.mutate_expr(min);
            let new_extent = m.mutate_expr(extent);
            let new_body = m.mutate_stmt(body);
            if new_min.same(min) && new_extent.same(extent) && new_body.same(body) {
                return s.clone();
            }
            Stmt::for_(var.clone(), new_min, new_extent, *kind, new_body)
        }
        StmtNode::Store { buffer, index, value, predicate } => {
            let new_index = m.mutate_expr(index);
            let new_value = m.mutate_expr(value);
            let new_predicate = mutate_opt(m, predicate);
            if new_index.same(index) && new_value.same(value) && opt_same(&new_predicate, predicate) {
                return s.clone();
            }
            Stmt::store(buffer.clone(), new_index, new_value, new_predicate)
        }
        StmtNode::Provide { name, args, values, predicate } => {
            let new_args: Vec<Expr> = args.iter().map(|a| m.mutate_expr(a)).collect();
            let new_values: Vec<Expr> = values.iter().map(|v| m.mutate_expr(v)).collect();
            let new_predicate = mutate_opt(m, predicate);
            if new_args.iter().zip(args).all(|(a, b)| a.same(b))
                && new_values.iter().zip(values).all(|(a, b)| a.same(b))
                && opt_same(&new_predicate, predicate)
            {
                return s.clone();
            }
            Stmt::provide(name.clone(), new_args, new_values, new_predicate)
        }
        StmtNode::Allocate { name, ty, memory, extents, condition, body } => {
            let new_extents: Vec<Expr> = extents.iter().map(|e| m.mutate_expr(e)).collect();
            let new_condition = mutate_opt(m, condition);
            let new_body = m.mutate_stmt(body);
            if new_extents.iter().zip(extents).all(|(a, b)| a.same(b))
                && opt_same(&new_condition, condition)
                && new_body.same(body)
            {
                return s.clone();
            }
            Stmt::allocate(name.clone(), *ty, *memory, new_extents, new_condition, new_body)
        }
        StmtNode::Free { .. } => s.clone(),
        StmtNode::Realize { name, types, bounds, body } => {
            let (new_bounds, bounds_changed) = mutate_ranges(m, bounds);
            let new_body = m.mutate_stmt(body);
            if !bounds_changed && new_body.same(body) {
                return s.clone();
            }
            Stmt::realize(name.clone(), types.clone(), new_bounds, new_body)
        }
        StmtNode::ProducerConsumer { name, is_producer, body } => {
            let new_body = m.mutate_stmt(body);
            if new_body.same(body) {
                return s.clone();
            }
            if *is_producer { Stmt::producer(name.clone(), new_body) } else { Stmt::consumer(name.clone(), new_body) }
        }
        StmtNode::Evaluate { value } => {
            let new_value = m.mutate_expr(value);
            if new_value.same(value) {
                return s.clone();
            }
            Stmt::evaluate(new_value)
        }
        StmtNode::Prefetch { buffer, bounds } => {
            let (new_bounds, changed) = mutate_ranges(m, bounds);
            if !changed {
                return s.clone();
            }
            Stmt::prefetch(buffer.clone(), new_bounds)
        }
        StmtNode::Atomic { body } => {
            let new_body = m.mutate_stmt(body);
            if new_body.same(body) {
                return s.clone();
            }
            Stmt::atomic(new_body)
        }
    }
}
