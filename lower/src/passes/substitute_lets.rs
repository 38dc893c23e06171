//! Let substitution.
//!
//! Inlines statement-level lets whose value is a constant or another
//! variable. Expression-level lets and single-use bindings are the
//! simplifier's business; this pass exists so later structural passes
//! (sliding, folding) see through trivial rebinding without running the
//! whole rule engine first.

use rill_ir::mutator::{Mutator, mutate_stmt_children};
use rill_ir::substitute::substitute_stmt;
use rill_ir::{Stmt, StmtNode};

struct SubstituteLets;

impl Mutator for SubstituteLets {
    fn mutate_stmt(&mut self, s: &Stmt) -> Stmt {
        if let StmtNode::LetStmt { name, value, body } = s.node()
            && (value.is_const() || value.as_var().is_some())
        {
            return self.mutate_stmt(&substitute_stmt(body, name, value));
        }
        mutate_stmt_children(self, s)
    }
}

pub fn substitute_in_lets(stmt: Stmt) -> Stmt {
    SubstituteLets.mutate_stmt(&stmt)
}
