//! Sliding-window reuse.
//!
//! When a pure function is computed inside a serial loop whose
//! successive iterations need overlapping regions of it (store level
//! outside the loop, compute level inside), each iteration only has to
//! produce the part it is first to need. The first iteration warms up
//! with the full region; later ones shrink to the new tail.
//!
//! Mechanically: the compute-site `loop_min`/`loop_extent` lets are
//! rewritten so that
//!
//! ```text
//! new_min    = select(t == t_min, old_min, max(old_min, old_max(t-1) + 1))
//! new_extent = old_max - new_min + 1
//! ```
//!
//! Legal only when both region endpoints are monotonically
//! non-decreasing in the loop variable, the loop is serial, and the
//! function is pure (updates would observe partially-stale state).

use std::collections::{HashMap, HashSet};

use rill_func::Environment;
use rill_ir::mutator::{Mutator, mutate_stmt_children};
use rill_ir::substitute::substitute;
use rill_ir::{Expr, ForKind, Stmt, StmtNode, simplify};

use crate::bounds::{Monotonic, is_monotonic};
use crate::lowering::names::{loop_extent_var, parse_loop_min_var};

#[derive(Clone)]
struct LoopInfo {
    var: String,
    min: Expr,
    kind: ForKind,
}

struct Slider<'a> {
    env: &'a Environment,
    loops: Vec<LoopInfo>,
    /// Function name -> loop depth at its realize node.
    realize_depth: HashMap<String, usize>,
    /// Functions already slid along one dimension.
    slid: HashSet<String>,
}

impl Slider<'_> {
    /// The innermost serial loop (inside the function's realize) that
    /// the region actually varies along, provided no parallel loop sits
    /// on the path.
    fn sliding_loop(&self, func: &str, min_value: &Expr, max_value: &Expr) -> Option<LoopInfo> {
        let depth = *self.realize_depth.get(func)?;
        let candidates = &self.loops[depth..];
        if candidates.iter().any(|l| !matches!(l.kind, ForKind::Serial | ForKind::Unrolled)) {
            return None;
        }
        for info in candidates.iter().rev() {
            let min_m = is_monotonic(min_value, &info.var);
            let max_m = is_monotonic(max_value, &info.var);
            let varies = min_m == Monotonic::Increasing || max_m == Monotonic::Increasing;
            let legal = matches!(min_m, Monotonic::Increasing | Monotonic::Constant)
                && matches!(max_m, Monotonic::Increasing | Monotonic::Constant);
            if varies && legal {
                return Some(info.clone());
            }
        }
        None
    }
}

impl Mutator for Slider<'_> {
    fn mutate_stmt(&mut self, s: &Stmt) -> Stmt {
        match s.node() {
            StmtNode::Realize { name, .. } => {
                self.realize_depth.insert(name.clone(), self.loops.len());
                let out = mutate_stmt_children(self, s);
                self.realize_depth.remove(name);
                out
            }
            StmtNode::For { var, min, extent, kind, body } => {
                self.loops.push(LoopInfo { var: var.clone(), min: min.clone(), kind: *kind });
                let new_body = self.mutate_stmt(body);
                self.loops.pop();
                if new_body.same(body) {
                    s.clone()
                } else {
                    Stmt::for_(var.clone(), min.clone(), extent.clone(), *kind, new_body)
                }
            }
            // The compute-site chunk: extent let immediately wrapping
            // the matching min let.
            StmtNode::LetStmt { name: extent_name, value: extent_value, body } => {
                if let StmtNode::LetStmt { name: min_name, value: min_value, body: inner } =
                    body.node()
                    && let Some((func, 0, arg)) = parse_loop_min_var(min_name)
                    && extent_name == &loop_extent_var(func, 0, arg)
                    && !self.slid.contains(func)
                    && self.env.functions.get(func).is_some_and(|f| f.is_pure())
                {
                    let old_max = simplify(&Expr::sub(
                        Expr::add(min_value.clone(), extent_value.clone()),
                        Expr::int(1),
                    ));
                    if let Some(loop_info) = self.sliding_loop(func, min_value, &old_max) {
                        let func = func.to_string();
                        tracing::debug!(%func, along = %loop_info.var, "sliding window");
                        self.slid.insert(func);

                        let t = Expr::var(loop_info.var.clone());
                        let prev_max = simplify(&substitute(
                            &old_max,
                            &loop_info.var,
                            &Expr::sub(t.clone(), Expr::int(1)),
                        ));
                        let new_min = Expr::select(
                            Expr::cmp_eq(t, loop_info.min.clone()),
                            min_value.clone(),
                            Expr::max(min_value.clone(), Expr::add(prev_max, Expr::int(1))),
                        );
                        let new_extent = simplify(&Expr::add(
                            Expr::sub(old_max, new_min.clone()),
                            Expr::int(1),
                        ));
                        let inner = self.mutate_stmt(inner);
                        return Stmt::let_stmt(
                            extent_name.clone(),
                            new_extent,
                            Stmt::let_stmt(min_name.clone(), simplify(&new_min), inner),
                        );
                    }
                }
                mutate_stmt_children(self, s)
            }
            _ => mutate_stmt_children(self, s),
        }
    }
}

/// Shrink per-iteration produce regions where successive iterations
/// overlap.
pub fn sliding_window(stmt: Stmt, env: &Environment) -> Stmt {
    let mut slider =
        Slider { env, loops: Vec::new(), realize_depth: HashMap::new(), slid: HashSet::new() };
    slider.mutate_stmt(&stmt)
}
