//! Removal of trivial loops.
//!
//! A loop of extent one is a let; a loop of extent zero (or less) is
//! nothing at all.

use rill_ir::mutator::{Mutator, mutate_stmt_children};
use rill_ir::{Stmt, StmtNode};

struct RemoveTrivialLoops;

impl Mutator for RemoveTrivialLoops {
    fn mutate_stmt(&mut self, s: &Stmt) -> Stmt {
        let s = mutate_stmt_children(self, s);
        if let StmtNode::For { var, min, extent, body, .. } = s.node()
            && let Some(n) = extent.as_const_i64()
        {
            if n <= 0 {
                return Stmt::no_op();
            }
            if n == 1 {
                return Stmt::let_stmt(var.clone(), min.clone(), body.clone());
            }
        }
        s
    }
}

pub fn remove_trivial_loops(stmt: Stmt) -> Stmt {
    RemoveTrivialLoops.mutate_stmt(&stmt)
}
