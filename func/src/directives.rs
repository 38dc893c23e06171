//! The chained scheduling API.
//!
//! Every directive is a pure setter over the schedule records in
//! [`crate::schedule`]; nothing here changes what a function computes.
//! Directives validate eagerly where they can (unknown dims, bad
//! factors, kind conflicts); whole-schedule checks that need the final
//! graph run again at lowering time.

use snafu::ensure;

use crate::error::{self, Result};
use crate::function::Func;
use crate::schedule::{
    BoundOverride, Dim, LoopLevel, Specialization, SplitKind, StageSchedule, TailStrategy,
};
use crate::var::Var;
use rill_ir::{Expr, ForKind, MemoryType};

// ===== Stage-schedule manipulation shared by pure, update and
// ===== specialization stages.

fn do_split(
    stage: &mut StageSchedule,
    func: &str,
    old: &str,
    outer: &str,
    inner: &str,
    factor: i64,
    tail: TailStrategy,
) -> Result<()> {
    ensure!(
        factor > 0,
        error::BadSplitSnafu {
            func: func.to_string(),
            var: old.to_string(),
            message: format!("split factor must be positive, got {factor}"),
        }
    );
    let Some(index) = stage.dim_index(old) else {
        return error::UnknownDimensionSnafu { func: func.to_string(), var: old.to_string() }.fail();
    };
    let parent = stage.dims[index].clone();
    for leaf in [outer, inner] {
        ensure!(
            *leaf == *old || stage.dim(leaf).is_none(),
            error::ScheduleConflictSnafu {
                func: func.to_string(),
                message: format!("dimension {leaf:?} already exists"),
            }
        );
    }

    let outer_dim = Dim {
        name: format!("{}.{outer}", parent.name),
        kind: parent.kind,
        is_rvar: parent.is_rvar,
    };
    let inner_dim = Dim {
        name: format!("{}.{inner}", parent.name),
        kind: ForKind::Serial,
        is_rvar: parent.is_rvar,
    };
    stage.dims.splice(index..=index, [outer_dim.clone(), inner_dim.clone()]);
    stage.splits.push(SplitKind::Split {
        old: parent.name,
        outer: outer_dim.name,
        inner: inner_dim.name,
        factor: Expr::int(factor),
        tail,
    });
    Ok(())
}

fn do_fuse(stage: &mut StageSchedule, func: &str, outer: &str, inner: &str, fused: &str) -> Result<()> {
    let Some(outer_index) = stage.dim_index(outer) else {
        return error::UnknownDimensionSnafu { func: func.to_string(), var: outer.to_string() }.fail();
    };
    let Some(inner_index) = stage.dim_index(inner) else {
        return error::UnknownDimensionSnafu { func: func.to_string(), var: inner.to_string() }.fail();
    };
    let outer_dim = stage.dims[outer_index].clone();
    let inner_dim = stage.dims[inner_index].clone();
    ensure!(
        stage.dim(fused).is_none() || fused == outer || fused == inner,
        error::ScheduleConflictSnafu {
            func: func.to_string(),
            message: format!("dimension {fused:?} already exists"),
        }
    );

    let fused_dim = Dim {
        name: format!("{}.{fused}$f", outer_dim.name),
        kind: outer_dim.kind,
        is_rvar: outer_dim.is_rvar || inner_dim.is_rvar,
    };
    let keep = outer_index.min(inner_index);
    stage.dims.retain(|d| d.name != outer_dim.name && d.name != inner_dim.name);
    stage.dims.insert(keep, fused_dim.clone());
    stage.splits.push(SplitKind::Fuse {
        outer: outer_dim.name,
        inner: inner_dim.name,
        fused: fused_dim.name,
    });
    Ok(())
}

fn do_reorder(stage: &mut StageSchedule, func: &str, vars: &[&str]) -> Result<()> {
    let mut positions = Vec::with_capacity(vars.len());
    for v in vars {
        let Some(i) = stage.dim_index(v) else {
            return error::UnknownDimensionSnafu { func: func.to_string(), var: v.to_string() }.fail();
        };
        positions.push(i);
    }
    // The listed dims take the listed order (outermost first) across
    // their own slots; unlisted dims stay put.
    let mut slots = positions.clone();
    slots.sort_unstable();
    let replacements: Vec<Dim> = positions.iter().map(|&i| stage.dims[i].clone()).collect();
    for (slot, dim) in slots.into_iter().zip(replacements) {
        stage.dims[slot] = dim;
    }
    Ok(())
}

fn do_mark(stage: &mut StageSchedule, func: &str, var: &str, kind: ForKind) -> Result<()> {
    let Some(dim) = stage.dim_mut(var) else {
        return error::UnknownDimensionSnafu { func: func.to_string(), var: var.to_string() }.fail();
    };
    ensure!(
        dim.kind == ForKind::Serial || dim.kind == kind,
        error::ScheduleConflictSnafu {
            func: func.to_string(),
            message: format!("dimension {var:?} is already {}, cannot also be {kind}", dim.kind),
        }
    );
    dim.kind = kind;
    Ok(())
}

// ===== Pure-stage directives on Func.

impl Func {
    fn with_schedule<R>(&self, f: impl FnOnce(&mut crate::schedule::FuncSchedule) -> R) -> Result<R> {
        self.ensure_mutable()?;
        let mut inner = self.0.write();
        Ok(f(&mut inner.schedule))
    }

    fn with_pure_stage<R>(&self, f: impl FnOnce(&mut StageSchedule, &str) -> R) -> Result<R> {
        self.ensure_mutable()?;
        let mut inner = self.0.write();
        let name = inner.name.clone();
        Ok(f(&mut inner.pure_stage, &name))
    }

    /// Compute (and by default store) outside every pipeline loop.
    pub fn compute_root(&self) -> Result<&Self> {
        self.with_schedule(|s| {
            s.compute_level = LoopLevel::Root;
            if s.store_level == LoopLevel::Inlined {
                s.store_level = LoopLevel::Root;
            }
        })?;
        Ok(self)
    }

    /// Fuse into every call site (the default).
    pub fn compute_inline(&self) -> Result<&Self> {
        self.with_schedule(|s| {
            s.compute_level = LoopLevel::Inlined;
            s.store_level = LoopLevel::Inlined;
        })?;
        Ok(self)
    }

    /// Compute inside `consumer`'s loop over `var`.
    pub fn compute_at(&self, consumer: &Func, var: &Var) -> Result<&Self> {
        let level = LoopLevel::At { func: consumer.name(), var: var.name().to_string() };
        self.with_schedule(|s| {
            if s.store_level == LoopLevel::Inlined {
                s.store_level = level.clone();
            }
            s.compute_level = level;
        })?;
        Ok(self)
    }

    /// Allocate inside `consumer`'s loop over `var` (compute may sit
    /// deeper; the gap is what sliding-window reuse exploits).
    pub fn store_at(&self, consumer: &Func, var: &Var) -> Result<&Self> {
        let level = LoopLevel::At { func: consumer.name(), var: var.name().to_string() };
        self.with_schedule(|s| s.store_level = level)?;
        Ok(self)
    }

    /// Allocate outside every pipeline loop.
    pub fn store_root(&self) -> Result<&Self> {
        self.with_schedule(|s| s.store_level = LoopLevel::Root)?;
        Ok(self)
    }

    /// Split `old` into `outer * factor + inner`.
    pub fn split(&self, old: &Var, outer: &Var, inner: &Var, factor: i64, tail: TailStrategy) -> Result<&Self> {
        self.with_pure_stage(|stage, name| {
            do_split(stage, name, old.name(), outer.name(), inner.name(), factor, tail)
        })??;
        Ok(self)
    }

    /// Combine two loops into one over their product; `inner` varies
    /// fastest.
    pub fn fuse(&self, outer: &Var, inner: &Var, fused: &Var) -> Result<&Self> {
        self.with_pure_stage(|stage, name| do_fuse(stage, name, outer.name(), inner.name(), fused.name()))??;
        Ok(self)
    }

    /// Permute loop nesting; `vars` lists the reordered dims outermost
    /// first. Unlisted dims keep their positions.
    pub fn reorder(&self, vars: &[&Var]) -> Result<&Self> {
        let names: Vec<&str> = vars.iter().map(|v| v.name()).collect();
        self.with_pure_stage(|stage, name| do_reorder(stage, name, &names))??;
        Ok(self)
    }

    pub fn parallel(&self, var: &Var) -> Result<&Self> {
        self.with_pure_stage(|stage, name| do_mark(stage, name, var.name(), ForKind::Parallel))??;
        Ok(self)
    }

    /// Split off `lanes` inner iterations of `var` and execute them as
    /// one SIMD vector. The tail is guarded with an if.
    pub fn vectorize(&self, var: &Var, lanes: i64) -> Result<&Self> {
        self.vectorize_with_tail(var, lanes, TailStrategy::GuardWithIf)
    }

    pub fn vectorize_with_tail(&self, var: &Var, lanes: i64, tail: TailStrategy) -> Result<&Self> {
        let inner_leaf = format!("{}v", var.name());
        self.with_pure_stage(|stage, name| -> Result<()> {
            do_split(stage, name, var.name(), var.name(), &inner_leaf, lanes, tail)?;
            do_mark(stage, name, &inner_leaf, ForKind::Vectorized)
        })??;
        Ok(self)
    }

    /// Mark an existing dim vectorized (after a manual split).
    pub fn vectorize_dim(&self, var: &Var) -> Result<&Self> {
        self.with_pure_stage(|stage, name| do_mark(stage, name, var.name(), ForKind::Vectorized))??;
        Ok(self)
    }

    /// Fully unroll `factor` inner iterations of `var`.
    pub fn unroll(&self, var: &Var, factor: i64) -> Result<&Self> {
        let inner_leaf = format!("{}u", var.name());
        self.with_pure_stage(|stage, name| -> Result<()> {
            do_split(stage, name, var.name(), var.name(), &inner_leaf, factor, TailStrategy::GuardWithIf)?;
            do_mark(stage, name, &inner_leaf, ForKind::Unrolled)
        })??;
        Ok(self)
    }

    /// Mark an existing dim unrolled.
    pub fn unroll_dim(&self, var: &Var) -> Result<&Self> {
        self.with_pure_stage(|stage, name| do_mark(stage, name, var.name(), ForKind::Unrolled))??;
        Ok(self)
    }

    /// Assert and use an explicit region for one pure dimension.
    pub fn bound(&self, var: &Var, min: Expr, extent: Expr) -> Result<&Self> {
        self.with_schedule(|s| {
            s.bounds.push(BoundOverride { var: var.name().to_string(), min: Some(min), extent })
        })?;
        Ok(self)
    }

    /// Two-dimensional tiling: split both axes and reorder so the tile
    /// loops are outermost. Equivalent to split + split + reorder.
    #[allow(clippy::too_many_arguments)]
    pub fn tile(
        &self,
        x: &Var,
        y: &Var,
        xo: &Var,
        yo: &Var,
        xi: &Var,
        yi: &Var,
        fx: i64,
        fy: i64,
        tail: TailStrategy,
    ) -> Result<&Self> {
        self.split(x, xo, xi, fx, tail)?;
        self.split(y, yo, yi, fy, tail)?;
        self.reorder(&[yo, xo, yi, xi])?;
        Ok(self)
    }

    /// Tile reusing the original names for the tile loops, so
    /// `compute_at(f, x)` still targets the tile loop over x.
    pub fn tile_(&self, x: &Var, y: &Var, xi: &Var, yi: &Var, fx: i64, fy: i64) -> Result<&Self> {
        self.tile(x, y, x, y, xi, yi, fx, fy, TailStrategy::GuardWithIf)
    }

    /// Tile and map the tile loops onto GPU blocks and the intra-tile
    /// loops onto GPU threads.
    #[allow(clippy::too_many_arguments)]
    pub fn gpu_tile(
        &self,
        x: &Var,
        y: &Var,
        bx: &Var,
        by: &Var,
        tx: &Var,
        ty: &Var,
        fx: i64,
        fy: i64,
    ) -> Result<&Self> {
        self.tile(x, y, bx, by, tx, ty, fx, fy, TailStrategy::GuardWithIf)?;
        self.with_pure_stage(|stage, name| -> Result<()> {
            do_mark(stage, name, bx.name(), ForKind::GpuBlock)?;
            do_mark(stage, name, by.name(), ForKind::GpuBlock)?;
            do_mark(stage, name, tx.name(), ForKind::GpuThread)?;
            do_mark(stage, name, ty.name(), ForKind::GpuThread)
        })??;
        Ok(self)
    }

    /// Choose where this function's storage lives.
    pub fn store_in(&self, memory: MemoryType) -> Result<&Self> {
        self.with_schedule(|s| s.memory_type = memory)?;
        Ok(self)
    }

    /// Permute the storage layout (first listed dim gets stride 1).
    pub fn reorder_storage(&self, vars: &[&Var]) -> Result<&Self> {
        let names: Vec<String> = vars.iter().map(|v| v.name().to_string()).collect();
        self.with_schedule(|s| s.storage_dims = names)?;
        Ok(self)
    }

    /// Run every update definition's stores under hardware atomics,
    /// licensing parallel reduction loops.
    pub fn atomic(&self) -> Result<&Self> {
        self.ensure_mutable()?;
        let mut inner = self.0.write();
        for update in &mut inner.updates {
            update.stage.atomic = true;
        }
        Ok(self)
    }

    /// Add a predicate-gated specialization of the pure stage and return
    /// a handle for scheduling it.
    pub fn specialize(&self, condition: Expr) -> Result<Stage> {
        self.ensure_mutable()?;
        let index = {
            let mut inner = self.0.write();
            let stage = inner.pure_stage.clone();
            inner.schedule.specializations.push(Specialization { condition, stage });
            inner.schedule.specializations.len() - 1
        };
        Ok(Stage { func: self.clone(), target: StageTarget::Specialization(index) })
    }

    /// Handle for scheduling one update definition (0-based).
    pub fn update_stage(&self, index: usize) -> Stage {
        Stage { func: self.clone(), target: StageTarget::Update(index) }
    }
}

enum StageTarget {
    Update(usize),
    Specialization(usize),
}

/// Scheduling handle for a non-pure stage: an update definition or a
/// specialization branch.
pub struct Stage {
    func: Func,
    target: StageTarget,
}

impl Stage {
    fn with_stage<R>(&self, f: impl FnOnce(&mut StageSchedule, &str) -> R) -> Result<R> {
        self.func.ensure_mutable()?;
        let mut inner = self.func.0.write();
        let name = inner.name.clone();
        let stage = match self.target {
            StageTarget::Update(i) => &mut inner.updates[i].stage,
            StageTarget::Specialization(i) => &mut inner.schedule.specializations[i].stage,
        };
        Ok(f(stage, &name))
    }

    pub fn split(&self, old: &Var, outer: &Var, inner: &Var, factor: i64, tail: TailStrategy) -> Result<&Self> {
        self.with_stage(|stage, name| do_split(stage, name, old.name(), outer.name(), inner.name(), factor, tail))??;
        Ok(self)
    }

    pub fn reorder(&self, vars: &[&Var]) -> Result<&Self> {
        let names: Vec<&str> = vars.iter().map(|v| v.name()).collect();
        self.with_stage(|stage, name| do_reorder(stage, name, &names))??;
        Ok(self)
    }

    pub fn parallel(&self, var: &Var) -> Result<&Self> {
        self.with_stage(|stage, name| do_mark(stage, name, var.name(), ForKind::Parallel))??;
        Ok(self)
    }

    pub fn vectorize(&self, var: &Var, lanes: i64) -> Result<&Self> {
        let inner_leaf = format!("{}v", var.name());
        self.with_stage(|stage, name| -> Result<()> {
            do_split(stage, name, var.name(), var.name(), &inner_leaf, lanes, TailStrategy::GuardWithIf)?;
            do_mark(stage, name, &inner_leaf, ForKind::Vectorized)
        })??;
        Ok(self)
    }

    pub fn unroll(&self, var: &Var, factor: i64) -> Result<&Self> {
        let inner_leaf = format!("{}u", var.name());
        self.with_stage(|stage, name| -> Result<()> {
            do_split(stage, name, var.name(), var.name(), &inner_leaf, factor, TailStrategy::GuardWithIf)?;
            do_mark(stage, name, &inner_leaf, ForKind::Unrolled)
        })??;
        Ok(self)
    }
}
