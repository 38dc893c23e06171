//! Schedules as plain data.
//!
//! Scheduling directives are pure setters over these records; lowering
//! is a separate function of (function graph, schedules). Nothing here
//! interprets a schedule - see `rill-lower` for that.

use rill_ir::{Expr, ForKind, MemoryType};

/// Where a function's storage or compute sits in the consumer loop nest.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LoopLevel {
    /// Fused into every call site. The default for freshly created
    /// functions.
    #[default]
    Inlined,
    /// Outside every loop of the pipeline.
    Root,
    /// Inside the loop over `var` of `func` (stage 0 of that function).
    At { func: String, var: String },
}

impl LoopLevel {
    /// Whether this level matches a loop variable of the form
    /// `<func>.s0.<...>.<var>` (the hierarchical names splits produce).
    pub fn matches_loop(&self, loop_var: &str) -> bool {
        let LoopLevel::At { func, var } = self else {
            return false;
        };
        let Some(rest) = loop_var.strip_prefix(&format!("{func}.s0.")) else {
            return false;
        };
        rest.rsplit('.').next() == Some(var.as_str())
    }
}

/// How the tail of a split loop is handled when the factor does not
/// divide the extent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TailStrategy {
    /// The outer loop rounds up; extra iterations compute values outside
    /// the required region. Legal only for pure stages.
    RoundUp,
    /// An if guards each inner iteration against the true extent.
    #[default]
    GuardWithIf,
    /// The last outer iteration shifts inward so the inner range still
    /// covers the tail; values may be recomputed.
    ShiftInward,
    /// Loads and stores in the tail carry a boolean predicate consulted
    /// per iteration (or per lane, once vectorized).
    Predicate,
}

/// One loop axis of a stage, outermost first in `StageSchedule::dims`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dim {
    /// Hierarchical dim name: `x`, or `x.xo` / `x.xi` after a split.
    pub name: String,
    pub kind: ForKind,
    /// Set when this is a reduction-domain axis.
    pub is_rvar: bool,
}

impl Dim {
    /// The user-facing name: the last segment of the hierarchical name.
    pub fn leaf_name(&self) -> &str {
        self.name.rsplit('.').next().unwrap_or(&self.name)
    }
}

/// How one dim was divided or combined.
#[derive(Debug, Clone, PartialEq)]
pub enum SplitKind {
    /// `old` becomes `outer * factor + inner`.
    Split { old: String, outer: String, inner: String, factor: Expr, tail: TailStrategy },
    /// `outer` and `inner` combine into `fused` over their product;
    /// `inner` varies fastest.
    Fuse { outer: String, inner: String, fused: String },
}

pub type Split = SplitKind;

/// Per-stage loop structure: the dim list (outermost first) plus the
/// split/fuse history needed to reconstruct the original variables.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StageSchedule {
    pub dims: Vec<Dim>,
    pub splits: Vec<SplitKind>,
    /// Updates only: run this stage's stores under hardware atomics.
    pub atomic: bool,
}

impl StageSchedule {
    /// The default schedule for a pure definition: one serial dim per
    /// argument, last argument outermost (so the first argument is the
    /// innermost loop, matching the stride-1 storage dimension).
    pub fn for_pure_args(args: &[String]) -> Self {
        let dims = args
            .iter()
            .rev()
            .map(|a| Dim { name: a.clone(), kind: ForKind::Serial, is_rvar: false })
            .collect();
        Self { dims, splits: Vec::new(), atomic: false }
    }

    pub fn dim(&self, leaf: &str) -> Option<&Dim> {
        self.dims.iter().find(|d| d.leaf_name() == leaf)
    }

    pub fn dim_mut(&mut self, leaf: &str) -> Option<&mut Dim> {
        self.dims.iter_mut().find(|d| d.leaf_name() == leaf)
    }

    pub fn dim_index(&self, leaf: &str) -> Option<usize> {
        self.dims.iter().position(|d| d.leaf_name() == leaf)
    }
}

/// An explicit bound for one pure dimension.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundOverride {
    pub var: String,
    pub min: Option<Expr>,
    pub extent: Expr,
}

/// A predicate-gated alternative schedule for the pure stage.
#[derive(Debug, Clone, PartialEq)]
pub struct Specialization {
    pub condition: Expr,
    pub stage: StageSchedule,
}

/// Per-function scheduling state shared by every stage.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FuncSchedule {
    pub store_level: LoopLevel,
    pub compute_level: LoopLevel,
    /// Explicit bounds overriding (and asserted against) inference.
    pub bounds: Vec<BoundOverride>,
    pub specializations: Vec<Specialization>,
    /// Storage layout as a permutation of the pure arguments; first
    /// entry has stride 1. Empty means argument order.
    pub storage_dims: Vec<String>,
    pub memory_type: MemoryType,
}

impl FuncSchedule {
    pub fn is_inlined(&self) -> bool {
        self.compute_level == LoopLevel::Inlined
    }

    /// The storage order for `args`, honoring any `storage_dims`
    /// permutation.
    pub fn storage_order(&self, args: &[String]) -> Vec<String> {
        if self.storage_dims.is_empty() { args.to_vec() } else { self.storage_dims.clone() }
    }

    pub fn bound_for(&self, var: &str) -> Option<&BoundOverride> {
        self.bounds.iter().find(|b| b.var == var)
    }
}
