//! Allocation bounds tightening.
//!
//! Re-runs bounds analysis over each realization's body - after sliding
//! and folding have rewritten regions and indices - and shrinks the
//! realize bounds to exactly the region still touched. Unbounded or
//! vanished dimensions keep their original bounds.

use rill_func::Environment;
use rill_ir::mutator::{Mutator, mutate_stmt_children};
use rill_ir::{Range, Stmt, StmtNode};

use crate::bounds::boxes_touched;

struct Tighten<'a> {
    env: &'a Environment,
}

impl Mutator for Tighten<'_> {
    fn mutate_stmt(&mut self, s: &Stmt) -> Stmt {
        if let StmtNode::Realize { name, types, bounds, body } = s.node() {
            let body = self.mutate_stmt(body);
            let new_bounds: Vec<Range> = match boxes_touched(&body, name, self.env) {
                Some(region) if region.len() == bounds.len() => region
                    .iter()
                    .zip(bounds)
                    .map(|(interval, old)| {
                        match (interval.min.clone(), interval.extent()) {
                            (Some(min), Some(extent)) => Range::new(min, extent),
                            _ => old.clone(),
                        }
                    })
                    .collect(),
                _ => bounds.clone(),
            };
            return Stmt::realize(name.clone(), types.clone(), new_bounds, body);
        }
        mutate_stmt_children(self, s)
    }
}

/// Shrink realize bounds to the regions their bodies still touch.
pub fn allocation_bounds_tightening(stmt: Stmt, env: &Environment) -> Stmt {
    Tighten { env }.mutate_stmt(&stmt)
}
