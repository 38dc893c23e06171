//! Realization placement.
//!
//! For each non-inlined function, working from consumers toward
//! producers, this injects:
//!
//! - a `Realize` node at the function's store level, sized by the
//!   required region of everything beneath it (consumer reads, update
//!   writes, update self-reads, explicit `bound` overrides);
//! - the produce nest at the compute level, with per-stage
//!   `loop_min`/`loop_extent` lets carrying the (possibly tighter,
//!   possibly outer-variable-dependent) compute-site region.
//!
//! The gap between the two levels - storage outside, compute inside a
//! loop - is the reuse hook the sliding-window pass later exploits.

use rill_func::{Environment, Function, LoopLevel};
use rill_ir::analysis::stmt_touches_buffer;
use rill_ir::mutator::{Mutator, mutate_stmt_children};
use rill_ir::{Expr, Range, Stmt, StmtNode, simplify};

use super::loop_nest::build_produce_body;
use super::names::{loop_extent_var, loop_min_var};
use crate::bounds::{
    Interval, Region, Scope, boxes_required, range_max, region_called_in_expr, union_regions,
    update_write_region,
};
use crate::error::{self, Error, Result};

/// The region `f` must cover to satisfy `consumer`, including its own
/// update definitions' writes and self-reads, with explicit `bound`
/// overrides applied last.
pub fn required_region(f: &Function, consumer: &Stmt, env: &Environment) -> Result<Region> {
    let mut region = boxes_required(consumer, &f.name, env)
        .unwrap_or_else(|| vec![Interval::everything(); f.args.len()]);
    if region.len() != f.args.len() {
        region.resize(f.args.len(), Interval::everything());
    }

    // Updates write (and read themselves at) coordinates the consumers
    // never mention; the realized region must cover those too.
    for update in &f.updates {
        let writes = update_write_region(update, &f.args, &region, env);
        region = union_regions(Some(region), writes);

        let mut scope = Scope::new();
        for (arg, interval) in f.args.iter().zip(&region) {
            scope.push(arg.clone(), interval.clone());
        }
        if let Some(domain) = &update.rdom {
            for rv in &domain.vars {
                scope.push(
                    rv.name.clone(),
                    Interval::bounded(rv.min.clone(), range_max(&rv.min, &rv.extent)),
                );
            }
        }
        for value in &update.values {
            if let Some(reads) = region_called_in_expr(value, &f.name, &scope, env) {
                region = union_regions(Some(region), reads);
            }
        }
    }

    // Explicit bounds override inference.
    for (dim, arg) in f.args.iter().enumerate() {
        if let Some(bound) = f.schedule.bound_for(arg) {
            let min = match (&bound.min, &region[dim].min) {
                (Some(m), _) => m.clone(),
                (None, Some(inferred)) => inferred.clone(),
                (None, None) => Expr::int(0),
            };
            let max = range_max(&min, &bound.extent);
            region[dim] = Interval::bounded(simplify(&min), simplify(&max));
        }
    }

    for (dim, interval) in region.iter().enumerate() {
        if !interval.is_bounded() {
            return error::BoundsCannotBeInferredSnafu {
                func: f.name.clone(),
                dim,
                detail: "required interval is unbounded; consider an explicit bound()".to_string(),
            }
            .fail();
        }
    }
    Ok(region.into_iter().map(|i| i.simplified()).collect())
}

/// Runtime assertions that the inferred region stays inside a
/// `bound()` override.
fn bound_override_asserts(f: &Function, inferred: &Region) -> Vec<Stmt> {
    let mut asserts = Vec::new();
    for (dim, arg) in f.args.iter().enumerate() {
        let Some(bound) = f.schedule.bound_for(arg) else { continue };
        let Some(min) = &bound.min else { continue };
        let declared_max = range_max(min, &bound.extent);
        if let (Some(inf_min), Some(inf_max)) = (&inferred[dim].min, &inferred[dim].max) {
            let cond = Expr::and(
                Expr::cmp_ge(inf_min.clone(), min.clone()),
                Expr::cmp_le(inf_max.clone(), declared_max),
            );
            asserts.push(Stmt::assert_stmt(
                simplify_condition(cond),
                format!("bounds: inferred region of {}.{} exceeds bound()", f.name, arg),
            ));
        }
    }
    asserts
}

fn simplify_condition(e: Expr) -> Expr {
    simplify(&e)
}

/// The produce chunk: loop-bound lets for every stage wrapped around
/// the producer nest.
pub(crate) fn produce_chunk(f: &Function, compute_region: &Region) -> Result<Stmt> {
    let mut chunk = Stmt::producer(f.name.clone(), build_produce_body(f)?);
    for stage in 0..f.num_stages() {
        for (arg, interval) in f.args.iter().zip(compute_region) {
            let (Some(min), Some(extent)) = (interval.min.clone(), interval.extent()) else {
                // required_region already rejected unbounded intervals.
                continue;
            };
            chunk = Stmt::let_stmt(loop_min_var(&f.name, stage, arg), min, chunk);
            chunk = Stmt::let_stmt(loop_extent_var(&f.name, stage, arg), extent, chunk);
        }
    }
    Ok(chunk)
}

pub(crate) fn realize_bounds(region: &Region) -> Vec<Range> {
    region
        .iter()
        .filter_map(|i| Some(Range::new(i.min.clone()?, i.extent()?)))
        .collect()
}

/// Wrap `consumer` in the full realization of `f` at a single site
/// (store and compute at the same level).
fn realize_block(f: &Function, consumer: Stmt, env: &Environment) -> Result<Stmt> {
    let region = required_region(f, &consumer, env)?;
    let produce = produce_chunk(f, &region)?;
    let mut parts = bound_override_asserts(f, &region);
    parts.push(produce);
    parts.push(Stmt::consumer(f.name.clone(), consumer));
    Ok(Stmt::realize(
        f.name.clone(),
        f.return_types.clone(),
        realize_bounds(&region),
        Stmt::block(parts),
    ))
}

/// Insert the produce chunk at the top of the compute-level loop body,
/// leaving storage to the caller.
struct ComputeInjector<'a> {
    f: &'a Function,
    env: &'a Environment,
    level: &'a LoopLevel,
    injected: bool,
    error: Option<Error>,
}

impl Mutator for ComputeInjector<'_> {
    fn mutate_stmt(&mut self, s: &Stmt) -> Stmt {
        if self.injected || self.error.is_some() {
            return s.clone();
        }
        if let StmtNode::For { var, min, extent, kind, body } = s.node()
            && self.level.matches_loop(var)
            && stmt_touches_buffer(body, &self.f.name)
        {
            self.injected = true;
            let region = match required_region(self.f, body, self.env) {
                Ok(region) => region,
                Err(e) => {
                    self.error = Some(e);
                    return s.clone();
                }
            };
            let produce = match produce_chunk(self.f, &region) {
                Ok(p) => p,
                Err(e) => {
                    self.error = Some(e);
                    return s.clone();
                }
            };
            let new_body =
                Stmt::block(vec![produce, Stmt::consumer(self.f.name.clone(), body.clone())]);
            return Stmt::for_(var.clone(), min.clone(), extent.clone(), *kind, new_body);
        }
        mutate_stmt_children(self, s)
    }
}

/// Wrap the body of the store-level loop in the `Realize`, after the
/// compute-level injection has run inside it.
struct StoreInjector<'a> {
    f: &'a Function,
    env: &'a Environment,
    store: &'a LoopLevel,
    compute: &'a LoopLevel,
    injected: bool,
    error: Option<Error>,
}

impl StoreInjector<'_> {
    fn realize_around(&mut self, consumer: &Stmt) -> Result<Stmt> {
        // Storage region: everything under the store site, for every
        // iteration of the loops between store and compute.
        let region = required_region(self.f, consumer, self.env)?;
        let inner = if self.compute == self.store {
            // Same level: one combined site.
            let produce = produce_chunk(self.f, &region)?;
            Stmt::block(vec![produce, Stmt::consumer(self.f.name.clone(), consumer.clone())])
        } else {
            let mut compute_injector = ComputeInjector {
                f: self.f,
                env: self.env,
                level: self.compute,
                injected: false,
                error: None,
            };
            let injected = compute_injector.mutate_stmt(consumer);
            if let Some(e) = compute_injector.error {
                return Err(e);
            }
            if !compute_injector.injected {
                let (consumer, var) = match self.compute {
                    LoopLevel::At { func, var } => (func.clone(), var.clone()),
                    other => (format!("{other:?}"), String::new()),
                };
                return error::LoopNotFoundSnafu { func: self.f.name.clone(), consumer, var }
                    .fail();
            }
            injected
        };
        let mut parts = bound_override_asserts(self.f, &region);
        parts.push(inner);
        Ok(Stmt::realize(
            self.f.name.clone(),
            self.f.return_types.clone(),
            realize_bounds(&region),
            Stmt::block(parts),
        ))
    }
}

impl Mutator for StoreInjector<'_> {
    fn mutate_stmt(&mut self, s: &Stmt) -> Stmt {
        if self.injected || self.error.is_some() {
            return s.clone();
        }
        if let StmtNode::For { var, min, extent, kind, body } = s.node()
            && self.store.matches_loop(var)
            && stmt_touches_buffer(body, &self.f.name)
        {
            self.injected = true;
            return match self.realize_around(body) {
                Ok(new_body) => {
                    Stmt::for_(var.clone(), min.clone(), extent.clone(), *kind, new_body)
                }
                Err(e) => {
                    self.error = Some(e);
                    s.clone()
                }
            };
        }
        mutate_stmt_children(self, s)
    }
}

/// Place one function's storage and compute into the consumer tree.
pub fn inject_realization(stmt: Stmt, f: &Function, env: &Environment) -> Result<Stmt> {
    // A function nothing consumes is elided entirely.
    if !stmt_touches_buffer(&stmt, &f.name) {
        tracing::debug!(func = %f.name, "no consumers; eliding");
        return Ok(stmt);
    }
    tracing::debug!(func = %f.name, "injecting realization");

    // Compute must sit at or inside the store level; a store nested
    // below root compute is not a placement this walk can realize.
    if matches!(f.schedule.store_level, LoopLevel::At { .. })
        && f.schedule.compute_level == LoopLevel::Root
    {
        return Err(Error::Graph {
            source: rill_func::Error::ScheduleConflict {
                func: f.name.clone(),
                message: "compute_root with store_at would hoist compute outside its storage"
                    .to_string(),
            },
        });
    }

    match (&f.schedule.store_level, &f.schedule.compute_level) {
        (LoopLevel::Root, LoopLevel::Root) => realize_block(f, stmt, env),
        (LoopLevel::Root, compute @ LoopLevel::At { func, var }) => {
            let mut injector =
                ComputeInjector { f, env, level: compute, injected: false, error: None };
            let injected = injector.mutate_stmt(&stmt);
            if let Some(e) = injector.error {
                return Err(e);
            }
            snafu::ensure!(
                injector.injected,
                error::LoopNotFoundSnafu {
                    func: f.name.clone(),
                    consumer: func.clone(),
                    var: var.clone(),
                }
            );
            let region = required_region(f, &stmt, env)?;
            let mut parts = bound_override_asserts(f, &region);
            parts.push(injected);
            Ok(Stmt::realize(
                f.name.clone(),
                f.return_types.clone(),
                realize_bounds(&region),
                Stmt::block(parts),
            ))
        }
        (store @ LoopLevel::At { func, var }, _) => {
            let mut injector = StoreInjector {
                f,
                env,
                store,
                compute: &f.schedule.compute_level,
                injected: false,
                error: None,
            };
            let injected = injector.mutate_stmt(&stmt);
            if let Some(e) = injector.error {
                return Err(e);
            }
            snafu::ensure!(
                injector.injected,
                error::LoopNotFoundSnafu {
                    func: f.name.clone(),
                    consumer: func.clone(),
                    var: var.clone(),
                }
            );
            Ok(injected)
        }
        (LoopLevel::Inlined, _) | (_, LoopLevel::Inlined) => {
            // Inlined functions were substituted away before injection.
            Ok(stmt)
        }
    }
}
