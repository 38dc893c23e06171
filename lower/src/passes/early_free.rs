//! Early free insertion.
//!
//! Allocation lifetimes are LIFO with respect to their enclosing
//! statement, but the memory can be released as soon as the last
//! statement touching the buffer has run. This inserts an explicit
//! `Free` there; backends (and the interpreter) may reclaim earlier
//! than scope exit.

use rill_ir::analysis::stmt_touches_buffer;
use rill_ir::mutator::{Mutator, mutate_stmt_children};
use rill_ir::{Stmt, StmtNode};

struct EarlyFrees;

impl Mutator for EarlyFrees {
    fn mutate_stmt(&mut self, s: &Stmt) -> Stmt {
        let s = mutate_stmt_children(self, s);
        let StmtNode::Allocate { name, ty, memory, extents, condition, body } = s.node() else {
            return s;
        };
        let already_freed = match body.node() {
            StmtNode::Block { stmts } => {
                stmts.iter().any(|s| matches!(s.node(), StmtNode::Free { name: n } if n == name))
            }
            _ => false,
        };
        if already_freed {
            return s;
        }
        let new_body = match body.node() {
            StmtNode::Block { stmts } => {
                let Some(last_use) = stmts.iter().rposition(|s| stmt_touches_buffer(s, name))
                else {
                    return s;
                };
                let mut new = stmts.clone();
                new.insert(last_use + 1, Stmt::free(name.clone()));
                Stmt::block(new)
            }
            _ if stmt_touches_buffer(body, name) => {
                Stmt::block(vec![body.clone(), Stmt::free(name.clone())])
            }
            _ => return s,
        };
        Stmt::allocate(name.clone(), *ty, *memory, extents.clone(), condition.clone(), new_body)
    }
}

pub fn inject_early_frees(stmt: Stmt) -> Stmt {
    EarlyFrees.mutate_stmt(&stmt)
}
