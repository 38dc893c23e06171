//! Storage folding.
//!
//! When only a bounded window of an allocation's dimension is ever live
//! at once - the sliding-window situation, compute inside a loop with
//! storage outside - the dimension can shrink to the next power of two
//! covering the window, with every index rewritten modulo that size.
//!
//! Preconditions per folded dimension:
//! - the per-iteration footprint along the candidate loop is a known
//!   constant;
//! - both window endpoints move monotonically (non-decreasing) along
//!   that loop;
//! - no parallel loop sits between the storage and the accesses
//!   (concurrent iterations would clobber each other's windows).
//!
//! Folding is computed against all accesses under the realize node,
//! which in particular means the union of every specialization
//! branch's accesses: a specialized branch cannot change the folded
//! size.

use rill_func::{Environment, SplitKind, TailStrategy};
use rill_ir::mutator::{Mutator, mutate_expr_children, mutate_stmt_children};
use rill_ir::visitor::{Visitor, walk_expr, walk_stmt};
use rill_ir::{CallType, Expr, ExprNode, Range, Stmt, StmtNode, simplify};

use crate::bounds::{Monotonic, boxes_required, is_monotonic};

/// Count accesses (reads + writes) of `name` in a subtree.
fn count_accesses(s: &Stmt, name: &str) -> usize {
    struct Count<'a> {
        name: &'a str,
        count: usize,
    }
    impl Visitor for Count<'_> {
        fn visit_expr(&mut self, e: &Expr) {
            if let ExprNode::Call { name, call_type: CallType::Function, .. } = e.node()
                && name == self.name
            {
                self.count += 1;
            }
            walk_expr(self, e);
        }
        fn visit_stmt(&mut self, s: &Stmt) {
            if let StmtNode::Provide { name, .. } = s.node()
                && name == self.name
            {
                self.count += 1;
            }
            walk_stmt(self, s);
        }
    }
    let mut v = Count { name, count: 0 };
    v.visit_stmt(s);
    v.count
}

/// Serial loop subtrees in `s`, paired with whether any parallel loop
/// encloses them within `s`.
fn serial_loops(s: &Stmt) -> Vec<(String, Stmt, bool)> {
    struct Loops {
        out: Vec<(String, Stmt, bool)>,
        parallel_depth: usize,
    }
    impl Visitor for Loops {
        fn visit_stmt(&mut self, s: &Stmt) {
            if let StmtNode::For { var, kind, body, .. } = s.node() {
                if kind.is_serial() {
                    self.out.push((var.clone(), body.clone(), self.parallel_depth > 0));
                    self.visit_stmt(body);
                } else {
                    self.parallel_depth += 1;
                    self.visit_stmt(body);
                    self.parallel_depth -= 1;
                }
            } else {
                walk_stmt(self, s);
            }
        }
    }
    let mut v = Loops { out: Vec::new(), parallel_depth: 0 };
    v.visit_stmt(s);
    v.out
}

fn next_pow2(v: i64) -> i64 {
    let mut p = 1;
    while p < v {
        p <<= 1;
    }
    p
}

/// Rewrite every access index of `name` in dimension `dim` modulo
/// `fold`.
struct FoldIndices<'a> {
    name: &'a str,
    dim: usize,
    fold: i64,
}

impl Mutator for FoldIndices<'_> {
    fn mutate_expr(&mut self, e: &Expr) -> Expr {
        let e = mutate_expr_children(self, e);
        if let ExprNode::Call { name, args, call_type: CallType::Function, value_index } = e.node()
            && name == self.name
        {
            let mut args: Vec<Expr> = args.iter().cloned().collect();
            if let Some(arg) = args.get_mut(self.dim) {
                *arg = Expr::modulo(arg.clone(), Expr::int(self.fold));
            }
            return Expr::call_indexed(e.ty(), name.clone(), args, CallType::Function, *value_index);
        }
        e
    }

    fn mutate_stmt(&mut self, s: &Stmt) -> Stmt {
        if let StmtNode::Provide { name, args, values, predicate } = s.node()
            && name == self.name
        {
            let mut args: Vec<Expr> = args.iter().cloned().collect();
            if let Some(arg) = args.get_mut(self.dim) {
                *arg = Expr::modulo(arg.clone(), Expr::int(self.fold));
            }
            let values = values.iter().map(|v| self.mutate_expr(v)).collect();
            let predicate = predicate.as_ref().map(|p| self.mutate_expr(p));
            return Stmt::provide(name.clone(), args, values, predicate);
        }
        mutate_stmt_children(self, s)
    }
}

struct Folder<'a> {
    env: &'a Environment,
}

impl Folder<'_> {
    /// Try to fold one dimension of one realization; returns the new
    /// body and bounds when something folded.
    fn fold_realize(&self, name: &str, bounds: &[Range], body: &Stmt) -> Option<(Vec<Range>, Stmt)> {
        let total = count_accesses(body, name);
        if total == 0 {
            return None;
        }
        // A round-up tail writes outside the consumed window, which the
        // fold analysis below (reads-based) would not see.
        let func = self.env.functions.get(name)?;
        for stage in 0..func.num_stages() {
            for split in &func.stage(stage).splits {
                if matches!(split, SplitKind::Split { tail: TailStrategy::RoundUp, .. }) {
                    return None;
                }
            }
        }

        for (loop_var, loop_body, under_parallel) in serial_loops(body) {
            // Every access must sit inside this loop, and no parallel
            // loop may intervene above it.
            if under_parallel || count_accesses(&loop_body, name) != total {
                continue;
            }
            // Footprint from the consumer reads: the produce region per
            // iteration is a subset of the read window by construction
            // (injection derives it from the same required region, and
            // sliding only shrinks it).
            let Some(region) = boxes_required(&loop_body, name, self.env) else { continue };

            for (dim, interval) in region.iter().enumerate() {
                let (Some(min), Some(max)) = (&interval.min, &interval.max) else { continue };
                let footprint = simplify(&Expr::add(
                    Expr::sub(max.clone(), min.clone()),
                    Expr::int(1),
                ));
                let Some(window) = footprint.as_const_i64() else { continue };
                if window <= 0 {
                    continue;
                }
                let min_monotonic = is_monotonic(min, &loop_var);
                let max_monotonic = is_monotonic(max, &loop_var);
                if !matches!(min_monotonic, Monotonic::Increasing | Monotonic::Constant)
                    || !matches!(max_monotonic, Monotonic::Increasing | Monotonic::Constant)
                {
                    continue;
                }
                // Fold only when the window actually varies along the
                // loop; a constant window equal to the whole extent
                // gains nothing.
                if min_monotonic == Monotonic::Constant && max_monotonic == Monotonic::Constant {
                    continue;
                }

                let fold = next_pow2(window);
                if let Some(extent) = bounds[dim].extent.as_const_i64()
                    && fold >= extent
                {
                    continue;
                }
                tracing::debug!(func = name, dim, fold, "storage folding");

                let folded_body =
                    FoldIndices { name, dim, fold }.mutate_stmt(body);
                let mut new_bounds = bounds.to_vec();
                new_bounds[dim] = Range::new(Expr::int(0), Expr::int(fold));
                return Some((new_bounds, folded_body));
            }
        }
        None
    }
}

impl Mutator for Folder<'_> {
    fn mutate_stmt(&mut self, s: &Stmt) -> Stmt {
        if let StmtNode::Realize { name, types, bounds, body } = s.node() {
            if let Some((new_bounds, folded_body)) = self.fold_realize(name, bounds, body) {
                let inner = self.mutate_stmt(&folded_body);
                return Stmt::realize(name.clone(), types.clone(), new_bounds, inner);
            }
            return mutate_stmt_children(self, s);
        }
        mutate_stmt_children(self, s)
    }
}

/// Fold allocations down to their live windows where legal.
pub fn storage_folding(stmt: Stmt, env: &Environment) -> Stmt {
    Folder { env }.mutate_stmt(&stmt)
}
