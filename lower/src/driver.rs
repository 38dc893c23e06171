//! The lowering driver.
//!
//! Orchestrates compilation of a frozen function graph: inlining,
//! output loop nests, realization injection in reverse realization
//! order, input-coverage assertions, and the fixed pass pipeline. A
//! cancellation request is honored at pass boundaries only; no partial
//! IR ever escapes.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use rill_codegen::{BufferInfo, DeviceAffinity, LoweredModule, ScalarParam, Target};
use rill_func::{Environment, LoopLevel, SplitKind, TailStrategy};
use rill_ir::simplify::stmts::simplify_stmt_in;
use rill_ir::simplify::SimplifyCtx;
use rill_ir::visitor::{Visitor, walk_expr, walk_stmt};
use rill_ir::{CallType, Expr, ExprNode, Range, Stmt, StmtNode, Type};

use crate::bounds::{Interval, Region, boxes_required};
use crate::error::{self, Result};
use crate::lowering::inject::{inject_realization, produce_chunk};
use crate::lowering::inline::inline_function;
use crate::lowering::storage_flattening;
use crate::passes;

/// Shared cancellation flag checked between passes.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Knobs the pipeline entry point exposes to lowering.
#[derive(Debug, Clone, Default)]
pub struct LowerOptions {
    /// Permit float rewrites that are only approximately
    /// value-preserving.
    pub fast_math: bool,
    pub cancel: Option<CancelToken>,
}

/// Names, types and arities of every `Image` input in the graph.
fn collect_image_inputs(env: &Environment) -> HashMap<String, (Type, usize)> {
    struct Images(HashMap<String, (Type, usize)>);
    impl Visitor for Images {
        fn visit_expr(&mut self, e: &Expr) {
            if let ExprNode::Call { name, args, call_type: CallType::Image, .. } = e.node() {
                self.0.insert(name.clone(), (e.ty().element_of(), args.len()));
            }
            walk_expr(self, e);
        }
    }
    let mut v = Images(HashMap::new());
    for f in env.functions.values() {
        for value in f.values.iter().chain(f.updates.iter().flat_map(|u| &u.values)) {
            v.visit_expr(value);
        }
        for update in &f.updates {
            for arg in &update.args {
                v.visit_expr(arg);
            }
        }
    }
    v.0
}

/// Free variables of a statement tree, with their types.
fn stmt_free_vars(s: &Stmt) -> HashMap<String, Type> {
    struct FreeVars {
        bound: Vec<String>,
        free: HashMap<String, Type>,
    }
    impl Visitor for FreeVars {
        fn visit_expr(&mut self, e: &Expr) {
            match e.node() {
                ExprNode::Var(name) => {
                    if !self.bound.iter().any(|b| b == name) {
                        self.free.insert(name.clone(), e.ty());
                    }
                }
                ExprNode::Let { name, value, body } => {
                    self.visit_expr(value);
                    self.bound.push(name.clone());
                    self.visit_expr(body);
                    self.bound.pop();
                }
                _ => walk_expr(self, e),
            }
        }

        fn visit_stmt(&mut self, s: &Stmt) {
            match s.node() {
                StmtNode::LetStmt { name, value, body } => {
                    self.visit_expr(value);
                    self.bound.push(name.clone());
                    self.visit_stmt(body);
                    self.bound.pop();
                }
                StmtNode::For { var, min, extent, body, .. } => {
                    self.visit_expr(min);
                    self.visit_expr(extent);
                    self.bound.push(var.clone());
                    self.visit_stmt(body);
                    self.bound.pop();
                }
                _ => walk_stmt(self, s),
            }
        }
    }
    let mut v = FreeVars { bound: Vec::new(), free: HashMap::new() };
    v.visit_stmt(s);
    v.free
}

/// Whether a free variable is one of an input buffer's metadata
/// symbols (`<buf>.min.<d>` / `.extent.<d>` / `.stride.<d>`).
fn is_buffer_meta(name: &str, inputs: &HashMap<String, (Type, usize)>) -> bool {
    inputs.keys().any(|buf| {
        name.strip_prefix(&format!("{buf}."))
            .and_then(|rest| rest.split_once('.'))
            .is_some_and(|(kind, d)| {
                matches!(kind, "min" | "extent" | "stride")
                    && !d.is_empty()
                    && d.chars().all(|c| c.is_ascii_digit())
            })
    })
}

/// Assertions that every input buffer covers the region the pipeline
/// reads from it.
fn input_coverage_asserts(
    stmt: &Stmt,
    inputs: &HashMap<String, (Type, usize)>,
    env: &Environment,
) -> Vec<Stmt> {
    let mut asserts = Vec::new();
    let mut names: Vec<&String> = inputs.keys().collect();
    names.sort();
    for name in names {
        let Some(region) = boxes_required(stmt, name, env) else { continue };
        for (d, interval) in region.iter().enumerate() {
            let (Some(req_min), Some(req_max)) = (&interval.min, &interval.max) else { continue };
            let declared_min = Expr::var(format!("{name}.min.{d}"));
            let declared_max = Expr::sub(
                Expr::add(declared_min.clone(), Expr::var(format!("{name}.extent.{d}"))),
                Expr::int(1),
            );
            let cond = Expr::and(
                Expr::cmp_ge(req_min.clone(), declared_min),
                Expr::cmp_le(req_max.clone(), declared_max),
            );
            asserts.push(Stmt::assert_stmt(
                cond,
                format!("bounds: input {name} does not cover the required region in dimension {d}"),
            ));
        }
    }
    asserts
}

/// Lower a frozen environment to a final module for `target`, realizing
/// each output over `[0, extent)` in every dimension.
pub fn lower(
    env: &Environment,
    target: &Target,
    output_extents: &HashMap<String, Vec<i64>>,
    options: &LowerOptions,
) -> Result<LoweredModule> {
    let mut env = env.clone();

    // An output cannot be inlined into its (nonexistent) consumers.
    for name in env.outputs.clone() {
        if let Some(f) = env.functions.get_mut(&name)
            && f.schedule.is_inlined()
        {
            f.schedule.compute_level = LoopLevel::Root;
            f.schedule.store_level = LoopLevel::Root;
        }
    }

    // Inline pass: producers first, so chains collapse fully.
    for name in env.order.clone() {
        if !env.outputs.contains(&name) && env.functions.get(&name).is_some_and(|f| f.is_inlined()) {
            inline_function(&mut env, &name)?;
        }
    }

    // Round-up tails on an output would write outside the caller's
    // buffer.
    for name in &env.outputs {
        let f = env.function(name)?;
        for stage in 0..f.num_stages() {
            for split in &f.stage(stage).splits {
                if let SplitKind::Split { old, tail: TailStrategy::RoundUp, .. } = split {
                    return error::BadSplitSnafu {
                        func: name.clone(),
                        var: old.clone(),
                        message: "round-up tail on an output writes outside its buffer".to_string(),
                    }
                    .fail();
                }
            }
        }
    }

    // Output loop nests over caller-declared regions.
    let mut output_regions: HashMap<String, Vec<Range>> = HashMap::new();
    let mut parts = Vec::new();
    for name in env.outputs.clone() {
        let f = env.function(&name)?.clone();
        let extents = output_extents.get(&name).cloned().unwrap_or_default();
        if extents.len() != f.args.len() {
            return error::BoundsCannotBeInferredSnafu {
                func: name.clone(),
                dim: extents.len(),
                detail: format!("output realized with {} sizes for {} dimensions", extents.len(), f.args.len()),
            }
            .fail();
        }
        let region: Region = extents
            .iter()
            .map(|&e| Interval::bounded(Expr::int(0), Expr::int(e - 1)))
            .collect();
        // An output buffer has concrete bounds; every update write must
        // be boundable to check against them.
        for update in &f.updates {
            let writes = crate::bounds::update_write_region(update, &f.args, &region, &env);
            for (dim, interval) in writes.iter().enumerate() {
                if !interval.is_bounded() {
                    return error::BoundsCannotBeInferredSnafu {
                        func: name.clone(),
                        dim,
                        detail: "update write region is unbounded at an output buffer".to_string(),
                    }
                    .fail();
                }
            }
        }
        output_regions.insert(
            name.clone(),
            extents.iter().map(|&e| Range::new(Expr::int(0), Expr::int(e))).collect(),
        );
        parts.push(produce_chunk(&f, &region)?);
    }
    let mut stmt = Stmt::block(parts);

    // Realize every non-output producer, consumers first.
    for name in env.order.clone().into_iter().rev() {
        if env.outputs.contains(&name) {
            continue;
        }
        let Some(f) = env.functions.get(&name).cloned() else { continue };
        stmt = inject_realization(stmt, &f, &env)?;
    }

    let inputs = collect_image_inputs(&env);
    let asserts = input_coverage_asserts(&stmt, &inputs, &env);
    if !asserts.is_empty() {
        let mut with_asserts = asserts;
        with_asserts.push(stmt);
        stmt = Stmt::block(with_asserts);
    }

    // The fixed pass pipeline. Cancellation is honored only here, at
    // pass boundaries.
    macro_rules! pass {
        ($name:literal, $body:expr) => {{
            tracing::debug!(pass = $name, "lowering pass");
            stmt = $body;
            if options.cancel.as_ref().is_some_and(CancelToken::is_cancelled) {
                return error::CancelledSnafu { after_pass: $name.to_string() }.fail();
            }
        }};
    }

    let simplify_ctx =
        || if options.fast_math { SimplifyCtx::with_fast_math() } else { SimplifyCtx::new() };

    pass!("sliding_window", passes::sliding_window(stmt, &env));
    pass!("substitute_in_lets", passes::substitute_in_lets(stmt));
    pass!("storage_folding", passes::storage_folding(stmt, &env));
    pass!("allocation_bounds_tightening", passes::allocation_bounds_tightening(stmt, &env));
    pass!("storage_flattening", storage_flattening(stmt, &env, &output_regions)?);
    pass!("simplify", simplify_stmt_in(&stmt, simplify_ctx()));
    pass!("vectorize", passes::vectorize_loops(stmt)?);
    pass!("unroll", passes::unroll_loops(stmt)?);
    pass!("remove_trivial_loops", passes::remove_trivial_loops(stmt));
    pass!("simplify", simplify_stmt_in(&stmt, simplify_ctx()));
    pass!("inject_early_frees", passes::inject_early_frees(stmt));
    pass!("device_lowering", passes::device_lowering(stmt, target)?);

    // Scalar parameters are whatever stays free once loop variables,
    // lets and buffer metadata are accounted for. Collected before
    // parallel extraction so closure bodies keep their lexical scope.
    let free = stmt_free_vars(&stmt);
    let mut params: Vec<ScalarParam> = free
        .into_iter()
        .filter(|(name, _)| !is_buffer_meta(name, &inputs))
        .map(|(name, ty)| ScalarParam { name, ty })
        .collect();
    params.sort_by(|a, b| a.name.cmp(&b.name));

    let (stmt, closures) = passes::lower_parallel_tasks(stmt);
    tracing::debug!(closures = closures.len(), params = params.len(), "lowering complete");

    // Buffer table: outputs (concrete), inputs (runtime-checked).
    let mut buffers = Vec::new();
    for name in &env.outputs {
        let f = env.function(name)?;
        for (k, ty) in f.return_types.iter().enumerate() {
            buffers.push(BufferInfo {
                name: crate::lowering::names::component_buffer(name, k, f.return_types.len()),
                ty: *ty,
                dimensions: f.args.len(),
                is_input: false,
                is_output: true,
                affinity: DeviceAffinity::Host,
            });
        }
    }
    let mut input_names: Vec<&String> = inputs.keys().collect();
    input_names.sort();
    for name in input_names {
        let (ty, dims) = inputs[name];
        buffers.push(BufferInfo {
            name: name.clone(),
            ty,
            dimensions: dims,
            is_input: true,
            is_output: false,
            affinity: DeviceAffinity::Host,
        });
    }

    Ok(LoweredModule { stmt, buffers, params, closures, target: target.clone() })
}
