//! Full unrolling of loops marked `unrolled`.

use rill_ir::mutator::{Mutator, mutate_stmt_children};
use rill_ir::substitute::substitute_stmt;
use rill_ir::{Expr, ForKind, Stmt, StmtNode};

use crate::error::{Error, Result};

struct UnrollLoops {
    error: Option<Error>,
}

impl Mutator for UnrollLoops {
    fn mutate_stmt(&mut self, s: &Stmt) -> Stmt {
        if self.error.is_some() {
            return s.clone();
        }
        let s = mutate_stmt_children(self, s);
        let StmtNode::For { var, min, extent, kind: ForKind::Unrolled, body } = s.node() else {
            return s;
        };
        let Some(n) = extent.as_const_i64().filter(|n| *n >= 0) else {
            self.error =
                Some(Error::UnrollNonConstant { loop_var: var.clone(), extent: extent.to_string() });
            return s;
        };
        tracing::debug!(loop_var = %var, n, "unrolling");
        Stmt::block(
            (0..n)
                .map(|i| {
                    let value = Expr::add(min.clone(), Expr::int(i));
                    substitute_stmt(body, var, &value)
                })
                .collect(),
        )
    }
}

/// Expand every `unrolled` loop with a statically known extent.
pub fn unroll_loops(stmt: Stmt) -> Result<Stmt> {
    let mut u = UnrollLoops { error: None };
    let out = u.mutate_stmt(&stmt);
    match u.error {
        Some(e) => Err(e),
        None => Ok(out),
    }
}
