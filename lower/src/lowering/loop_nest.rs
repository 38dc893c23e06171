//! Per-stage loop nest construction.
//!
//! Builds the imperative form of one definition stage: loops over the
//! stage's dims (splits already applied by the schedule), reconstruction
//! lets recovering the original variables from split loop variables,
//! tail guards or predicates, reduction-domain predicates, and the
//! innermost `Provide`.
//!
//! Loop bounds for pure arguments reference the per-stage
//! `loop_min`/`loop_extent` lets bound at the compute site by
//! realization injection; reduction variables carry their domain bounds
//! directly.

use std::collections::HashMap;

use rill_func::{Function, SplitKind, StageSchedule, TailStrategy};
use rill_ir::{Expr, ForKind, Stmt};
use snafu::ensure;

use super::names::{dim_var, loop_extent_var, loop_min_var};
use crate::bounds::range_max;
use crate::error::{self, Result};

/// Bounds (min, extent) per dim name while splits are replayed.
type RangeMap = HashMap<String, (Expr, Expr)>;

struct NestBuilder<'a> {
    func: &'a Function,
    stage_index: usize,
    ranges: RangeMap,
    /// Names that definitions reference directly (pure args, reduction
    /// variables); their reconstruction lets use the bare name.
    roots: Vec<String>,
}

impl NestBuilder<'_> {
    /// The expression holding a dim's value: the loop variable for leaf
    /// dims, the reconstruction let for split-away dims, the bare let
    /// for roots. Roots bind bare names; everything else is qualified.
    fn value_name(&self, dim: &str) -> String {
        if self.roots.iter().any(|r| r == dim) {
            dim.to_string()
        } else {
            dim_var(&self.func.name, self.stage_index, dim)
        }
    }

    fn value_of(&self, dim: &str) -> Expr {
        Expr::var(self.value_name(dim))
    }
}

/// Build the loop nest for one stage of a function.
pub fn build_stage_nest(f: &Function, stage_index: usize, stage: &StageSchedule) -> Result<Stmt> {
    let update = (stage_index > 0).then(|| &f.updates[stage_index - 1]);
    let (def_args, def_values) = match update {
        None => (f.args.iter().map(Expr::var).collect::<Vec<_>>(), f.values.clone()),
        Some(u) => (u.args.clone(), u.values.clone()),
    };
    let rdom = update.and_then(|u| u.rdom.as_ref());

    validate_stage(f, stage_index, stage, &def_args)?;

    // Replay splits over the root ranges to find each dim's bounds.
    let mut builder =
        NestBuilder { func: f, stage_index, ranges: RangeMap::new(), roots: Vec::new() };
    for arg in &f.args {
        builder.roots.push(arg.clone());
        builder.ranges.insert(
            arg.clone(),
            (
                Expr::var(loop_min_var(&f.name, stage_index, arg)),
                Expr::var(loop_extent_var(&f.name, stage_index, arg)),
            ),
        );
    }
    if let Some(domain) = rdom {
        for rv in &domain.vars {
            builder.roots.push(rv.name.clone());
            builder.ranges.insert(rv.name.clone(), (rv.min.clone(), rv.extent.clone()));
        }
    }

    // (root, name, value): the root keys a canonical ordering so that
    // applying commuting directives in either order prints the same
    // nest. Within one root, registration order is a dependency order
    // and must be preserved.
    let mut lets: Vec<(String, String, Expr)> = Vec::new();
    let mut guards: Vec<Expr> = Vec::new();
    let mut tail_predicates: Vec<Expr> = Vec::new();

    for split in &stage.splits {
        match split {
            SplitKind::Split { old, outer, inner, factor, tail } => {
                let (min_old, ext_old) = builder
                    .ranges
                    .get(old)
                    .cloned()
                    .unwrap_or((Expr::int(0), Expr::int(0)));
                let outer_extent = Expr::div(
                    Expr::add(ext_old.clone(), Expr::sub(factor.clone(), Expr::int(1))),
                    factor.clone(),
                );
                builder.ranges.insert(outer.clone(), (Expr::int(0), outer_extent));
                builder.ranges.insert(inner.clone(), (Expr::int(0), factor.clone()));

                let scaled = Expr::mul(builder.value_of(outer), factor.clone());
                let offset = match tail {
                    TailStrategy::ShiftInward => Expr::min(
                        scaled,
                        Expr::max(Expr::sub(ext_old.clone(), factor.clone()), Expr::int(0)),
                    ),
                    _ => scaled,
                };
                let old_value =
                    Expr::add(Expr::add(min_old.clone(), offset), builder.value_of(inner));
                let root = old.split('.').next().unwrap_or(old).to_string();
                lets.push((root, builder.value_name(old), old_value));

                let in_range =
                    Expr::cmp_le(builder.value_of(old), range_max(&min_old, &ext_old));
                match tail {
                    TailStrategy::GuardWithIf => guards.push(in_range),
                    TailStrategy::Predicate => tail_predicates.push(in_range),
                    TailStrategy::RoundUp | TailStrategy::ShiftInward => {}
                }
            }
            SplitKind::Fuse { outer, inner, fused } => {
                let (min_o, ext_o) =
                    builder.ranges.get(outer).cloned().unwrap_or((Expr::int(0), Expr::int(0)));
                let (min_i, ext_i) =
                    builder.ranges.get(inner).cloned().unwrap_or((Expr::int(0), Expr::int(1)));
                let fused_extent = Expr::mul(ext_o.clone(), ext_i.clone());
                builder.ranges.insert(fused.clone(), (Expr::int(0), fused_extent));

                let root = outer.split('.').next().unwrap_or(outer).to_string();
                lets.push((
                    root.clone(),
                    builder.value_name(outer),
                    Expr::add(min_o, Expr::div(builder.value_of(fused), ext_i.clone())),
                ));
                lets.push((
                    root,
                    builder.value_name(inner),
                    Expr::add(min_i, Expr::modulo(builder.value_of(fused), ext_i)),
                ));
            }
        }
    }

    // The innermost statement: the provide, under atomics, reduction
    // predicates and tail guards.
    let tail_predicate = tail_predicates.into_iter().reduce(Expr::and);
    let provide =
        Stmt::provide(f.name.clone(), def_args, def_values, tail_predicate);
    let mut body = if stage.atomic { Stmt::atomic(provide) } else { provide };
    if let Some(domain) = rdom
        && let Some(pred) = domain.combined_predicate()
    {
        body = Stmt::if_then_else(pred, body, None);
    }
    if let Some(guard) = guards.into_iter().reduce(Expr::and) {
        body = Stmt::if_then_else(guard, body, None);
    }

    // Reconstruction lets: canonical root order (stable, so chained
    // splits on one root keep their dependency order), earliest split
    // innermost.
    lets.sort_by(|a, b| a.0.cmp(&b.0));
    for (_, name, value) in lets {
        body = Stmt::let_stmt(name, value, body);
    }
    // Unsplit roots still present as dims bind their bare names from
    // the loop variable.
    for dim in &stage.dims {
        if builder.roots.iter().any(|r| *r == dim.name) {
            body = Stmt::let_stmt(
                dim.name.clone(),
                Expr::var(dim_var(&f.name, stage_index, &dim.name)),
                body,
            );
        }
    }

    // Loops, innermost (last dim) first.
    for dim in stage.dims.iter().rev() {
        let (min, extent) = builder
            .ranges
            .get(&dim.name)
            .cloned()
            .unwrap_or((Expr::int(0), Expr::int(0)));
        body = Stmt::for_(
            dim_var(&f.name, stage_index, &dim.name),
            min,
            extent,
            dim.kind,
            body,
        );
    }
    Ok(body)
}

/// Stage-level legality: tail strategies on updates, parallel
/// reductions.
fn validate_stage(
    f: &Function,
    stage_index: usize,
    stage: &StageSchedule,
    def_args: &[Expr],
) -> Result<()> {
    if stage_index > 0 {
        for split in &stage.splits {
            if let SplitKind::Split { old, tail, .. } = split {
                ensure!(
                    matches!(tail, TailStrategy::GuardWithIf | TailStrategy::Predicate),
                    error::BadSplitSnafu {
                        func: f.name.clone(),
                        var: old.clone(),
                        message: format!(
                            "{tail:?} would re-apply the update in the overshoot region"
                        ),
                    }
                );
            }
        }
    }

    for dim in &stage.dims {
        let parallel_kind =
            matches!(dim.kind, ForKind::Parallel | ForKind::GpuBlock | ForKind::GpuThread);
        if !parallel_kind || stage_index == 0 {
            continue;
        }
        if stage.atomic {
            continue;
        }
        // Without atomics, a parallel update loop is only safe when the
        // loop's root variable addresses the write directly: distinct
        // iterations then write distinct locations.
        let root = dim.name.split('.').next().unwrap_or(&dim.name);
        let standalone = def_args.iter().any(|a| a.as_var() == Some(root));
        ensure!(
            standalone,
            error::ConcurrencyHazardSnafu {
                func: f.name.clone(),
                message: format!(
                    "update loop over {root:?} is parallel but iterations may collide; \
                     add atomic() or keep the loop serial"
                ),
            }
        );
    }
    Ok(())
}

/// The full produce body of a function: the pure stage (with its
/// specializations compiled to an if-else chain, most specific first),
/// then each update in declaration order.
pub fn build_produce_body(f: &Function) -> Result<Stmt> {
    let mut pure = build_stage_nest(f, 0, &f.pure_stage)?;
    for spec in f.schedule.specializations.iter().rev() {
        let branch = build_stage_nest(f, 0, &spec.stage)?;
        pure = Stmt::if_then_else(spec.condition.clone(), branch, Some(pure));
    }

    let mut parts = vec![pure];
    for (i, update) in f.updates.iter().enumerate() {
        parts.push(build_stage_nest(f, i + 1, &update.stage)?);
    }
    Ok(Stmt::block(parts))
}
