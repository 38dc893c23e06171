//! Symbolic bounds inference.
//!
//! Required regions are computed backward through the pipeline: given
//! the statements that consume a function, every call site's argument
//! expressions are bounded in the scope of the loops around them, and
//! the union across call sites is the region the producer must cover.
//!
//! Intervals are pairs of symbolic expressions; an open endpoint means
//! the analysis could not bound that side. Unbounded intervals propagate
//! and become hard errors where a concrete region is required.

pub mod monotonic;

use rill_func::Environment;
use rill_ir::visitor::{Visitor, walk_expr, walk_stmt};
use rill_ir::{BinaryOp, CallType, Expr, ExprNode, Stmt, StmtNode, UnaryOp, simplify};

pub use monotonic::{Monotonic, is_monotonic};

/// An inclusive interval with symbolic endpoints. `None` is an open
/// (unboundable) endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct Interval {
    pub min: Option<Expr>,
    pub max: Option<Expr>,
}

impl Interval {
    pub fn everything() -> Self {
        Self { min: None, max: None }
    }

    /// A single point.
    pub fn point(e: Expr) -> Self {
        Self { min: Some(e.clone()), max: Some(e) }
    }

    pub fn bounded(min: Expr, max: Expr) -> Self {
        Self { min: Some(min), max: Some(max) }
    }

    pub fn is_bounded(&self) -> bool {
        self.min.is_some() && self.max.is_some()
    }

    /// Number of covered points: `max - min + 1`.
    pub fn extent(&self) -> Option<Expr> {
        let (min, max) = (self.min.clone()?, self.max.clone()?);
        Some(simplify(&Expr::add(Expr::sub(max, min), Expr::int(1))))
    }

    pub fn simplified(&self) -> Self {
        Self {
            min: self.min.as_ref().map(simplify),
            max: self.max.as_ref().map(simplify),
        }
    }

    /// The smallest interval containing both.
    pub fn union(&self, other: &Interval) -> Interval {
        Interval {
            min: combine(&self.min, &other.min, Expr::min),
            max: combine(&self.max, &other.max, Expr::max),
        }
    }

    pub fn add(&self, other: &Interval) -> Interval {
        Interval {
            min: combine(&self.min, &other.min, Expr::add),
            max: combine(&self.max, &other.max, Expr::add),
        }
    }

    pub fn sub(&self, other: &Interval) -> Interval {
        Interval {
            min: combine(&self.min, &other.max, Expr::sub),
            max: combine(&self.max, &other.min, Expr::sub),
        }
    }

    pub fn negate(&self) -> Interval {
        Interval {
            min: self.max.clone().map(Expr::neg),
            max: self.min.clone().map(Expr::neg),
        }
    }

    fn scale(&self, c: i64) -> Interval {
        let by = |e: Expr| Expr::mul(e, Expr::int(c));
        if c >= 0 {
            Interval { min: self.min.clone().map(by), max: self.max.clone().map(by) }
        } else {
            Interval { min: self.max.clone().map(by), max: self.min.clone().map(by) }
        }
    }

    fn div_by(&self, c: i64) -> Interval {
        let by = |e: Expr| Expr::div(e, Expr::int(c));
        if c > 0 {
            Interval { min: self.min.clone().map(by), max: self.max.clone().map(by) }
        } else {
            Interval::everything()
        }
    }

    pub fn min_(&self, other: &Interval) -> Interval {
        Interval {
            min: combine(&self.min, &other.min, Expr::min),
            max: match (&self.max, &other.max) {
                (Some(a), Some(b)) => Some(Expr::min(a.clone(), b.clone())),
                (a, b) => a.clone().or_else(|| b.clone()),
            },
        }
    }

    pub fn max_(&self, other: &Interval) -> Interval {
        Interval {
            min: match (&self.min, &other.min) {
                (Some(a), Some(b)) => Some(Expr::max(a.clone(), b.clone())),
                (a, b) => a.clone().or_else(|| b.clone()),
            },
            max: combine(&self.max, &other.max, Expr::max),
        }
    }
}

fn combine(a: &Option<Expr>, b: &Option<Expr>, f: impl Fn(Expr, Expr) -> Expr) -> Option<Expr> {
    match (a, b) {
        (Some(a), Some(b)) => Some(f(a.clone(), b.clone())),
        _ => None,
    }
}

/// A multi-dimensional required region: one interval per argument.
pub type Region = Vec<Interval>;

/// Union two regions dimension-wise, padding arity with the other side.
pub fn union_regions(a: Option<Region>, b: Region) -> Region {
    match a {
        None => b,
        Some(a) => a.iter().zip(&b).map(|(x, y)| x.union(y)).collect(),
    }
}

/// Variable facts visible at a point in the tree.
#[derive(Debug, Default, Clone)]
pub struct Scope {
    vars: Vec<(String, Interval)>,
}

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, name: impl Into<String>, interval: Interval) {
        self.vars.push((name.into(), interval));
    }

    pub fn pop(&mut self, name: &str) {
        if let Some(pos) = self.vars.iter().rposition(|(n, _)| n == name) {
            self.vars.remove(pos);
        }
    }

    pub fn get(&self, name: &str) -> Option<&Interval> {
        self.vars.iter().rev().find(|(n, _)| n == name).map(|(_, i)| i)
    }
}

// Recursion guard for call bounding; the graph is a DAG so this only
// limits pathological depth, not correctness.
const MAX_CALL_DEPTH: u32 = 8;

/// Bound an expression's value in the given scope.
///
/// Variables absent from the scope are symbolic constants here (outer
/// loop variables, parameters) and bound by the point interval of
/// themselves; that is what makes regions functions of outer loop
/// variables.
pub fn bounds_of_expr_in_scope(e: &Expr, scope: &Scope, env: &Environment) -> Interval {
    bounds_inner(e, scope, env, 0)
}

fn bounds_inner(e: &Expr, scope: &Scope, env: &Environment, depth: u32) -> Interval {
    if !e.ty().element_of().is_integral() {
        // Only integer expressions index buffers; nothing else needs a
        // symbolic bound.
        return Interval::everything();
    }
    match e.node() {
        ExprNode::IntImm(_) | ExprNode::UIntImm(_) => Interval::point(e.clone()),
        ExprNode::Var(name) => match scope.get(name) {
            Some(interval) => interval.clone(),
            None => Interval::point(e.clone()),
        },
        ExprNode::Cast { value } => {
            if e.ty().can_represent(&value.ty()) {
                let inner = bounds_inner(value, scope, env, depth);
                Interval {
                    min: inner.min.map(|m| Expr::cast(e.ty(), m)),
                    max: inner.max.map(|m| Expr::cast(e.ty(), m)),
                }
            } else {
                Interval::everything()
            }
        }
        ExprNode::Unary(UnaryOp::Neg, a) => bounds_inner(a, scope, env, depth).negate(),
        ExprNode::Unary(UnaryOp::Not, _) => {
            Interval::bounded(Expr::bool_(false), Expr::bool_(true))
        }
        ExprNode::Binary(op, a, b) => {
            let ia = bounds_inner(a, scope, env, depth);
            let ib = bounds_inner(b, scope, env, depth);
            match op {
                BinaryOp::Add => ia.add(&ib),
                BinaryOp::Sub => ia.sub(&ib),
                BinaryOp::Mul => match (b.as_const_i64(), a.as_const_i64()) {
                    (Some(c), _) => ia.scale(c),
                    (None, Some(c)) => ib.scale(c),
                    // A product of two point intervals is exact even
                    // when symbolic.
                    (None, None) => {
                        if ia.min == ia.max && ib.min == ib.max && ia.is_bounded() && ib.is_bounded() {
                            Interval::point(Expr::mul(a.clone(), b.clone()))
                        } else {
                            tracing::warn!(expr = %e, "widening non-affine product to unbounded");
                            Interval::everything()
                        }
                    }
                },
                BinaryOp::Div => match b.as_const_i64() {
                    Some(c) if c > 0 => ia.div_by(c),
                    _ => Interval::everything(),
                },
                BinaryOp::Mod => match b.as_const_i64() {
                    Some(c) if c > 0 => {
                        // Euclidean remainder with a positive divisor
                        // lands in [0, c).
                        Interval::bounded(Expr::int(0), Expr::int(c - 1))
                    }
                    _ => Interval::everything(),
                },
                BinaryOp::Min => ia.min_(&ib),
                BinaryOp::Max => ia.max_(&ib),
                _ => Interval::bounded(Expr::bool_(false), Expr::bool_(true)),
            }
        }
        ExprNode::Select { true_value, false_value, .. } => {
            let t = bounds_inner(true_value, scope, env, depth);
            let f = bounds_inner(false_value, scope, env, depth);
            t.union(&f)
        }
        ExprNode::Broadcast { value, .. } => bounds_inner(value, scope, env, depth),
        ExprNode::Ramp { base, stride, lanes } => {
            let b = bounds_inner(base, scope, env, depth);
            let last = Expr::add(
                base.clone(),
                Expr::mul(stride.clone(), Expr::int(*lanes as i64 - 1)),
            );
            b.union(&bounds_inner(&last, scope, env, depth))
        }
        ExprNode::Let { name, value, body } => {
            let bound = bounds_inner(value, scope, env, depth);
            let mut inner = scope.clone();
            inner.push(name.clone(), bound);
            bounds_inner(body, &inner, env, depth)
        }
        ExprNode::Call { name, args, call_type: CallType::Function, value_index } => {
            // Bound the callee's value with its arguments bound by the
            // call's argument intervals. This is what lets a predicate
            // like hist(in(r)) resolve: in's value range bounds the
            // write region of hist.
            if depth >= MAX_CALL_DEPTH {
                return Interval::everything();
            }
            let Ok(callee) = env.function(name) else {
                return Interval::everything();
            };
            let Some(value) = callee.values.get(*value_index) else {
                return Interval::everything();
            };
            let mut callee_scope = Scope::new();
            for (arg_name, arg_expr) in callee.args.iter().zip(args) {
                callee_scope.push(arg_name.clone(), bounds_inner(arg_expr, scope, env, depth));
            }
            bounds_inner(value, &callee_scope, env, depth + 1)
        }
        _ => Interval::everything(),
    }
}

/// Walks a subtree collecting access regions of one named function or
/// buffer, maintaining loop/let scope as it goes.
struct BoxWalker<'a> {
    name: &'a str,
    env: &'a Environment,
    scope: Scope,
    reads: Option<Region>,
    writes: Option<Region>,
}

impl BoxWalker<'_> {
    fn record(slot: &mut Option<Region>, args: &[Expr], scope: &Scope, env: &Environment) {
        let region: Region =
            args.iter().map(|a| bounds_of_expr_in_scope(a, scope, env)).collect();
        *slot = Some(union_regions(slot.take(), region));
    }

    /// Refine the scope under a branch whose condition constrains a
    /// variable against a constant (`v < c`, `c <= v`, ...).
    fn refinement(condition: &Expr) -> Option<(String, Interval)> {
        let ExprNode::Binary(op, a, b) = condition.node() else { return None };
        let (var, c, var_on_left) = match (a.as_var(), b.as_const_i64()) {
            (Some(v), Some(c)) => (v, c, true),
            _ => match (a.as_const_i64(), b.as_var()) {
                (Some(c), Some(v)) => (v, c, false),
                _ => return None,
            },
        };
        let interval = match (op, var_on_left) {
            (BinaryOp::Lt, true) => Interval { min: None, max: Some(Expr::int(c - 1)) },
            (BinaryOp::Le, true) => Interval { min: None, max: Some(Expr::int(c)) },
            (BinaryOp::Lt, false) => Interval { min: Some(Expr::int(c + 1)), max: None },
            (BinaryOp::Le, false) => Interval { min: Some(Expr::int(c)), max: None },
            (BinaryOp::Eq, _) => Interval::point(Expr::int(c)),
            _ => return None,
        };
        Some((var.to_string(), interval))
    }

    fn refined_interval(&self, var: &str, refinement: &Interval) -> Interval {
        match self.scope.get(var) {
            Some(existing) => Interval {
                min: match (&existing.min, &refinement.min) {
                    (Some(a), Some(b)) => Some(Expr::max(a.clone(), b.clone())),
                    (a, b) => a.clone().or_else(|| b.clone()),
                },
                max: match (&existing.max, &refinement.max) {
                    (Some(a), Some(b)) => Some(Expr::min(a.clone(), b.clone())),
                    (a, b) => a.clone().or_else(|| b.clone()),
                },
            },
            None => refinement.clone(),
        }
    }
}

impl Visitor for BoxWalker<'_> {
    fn visit_expr(&mut self, e: &Expr) {
        match e.node() {
            ExprNode::Call { name, args, call_type: CallType::Function | CallType::Image, .. }
                if name == self.name =>
            {
                Self::record(&mut self.reads, args, &self.scope, self.env);
                for a in args {
                    self.visit_expr(a);
                }
            }
            ExprNode::Let { name, value, body } => {
                self.visit_expr(value);
                let bound = bounds_of_expr_in_scope(value, &self.scope, self.env);
                self.scope.push(name.clone(), bound);
                self.visit_expr(body);
                self.scope.pop(name);
            }
            _ => walk_expr(self, e),
        }
    }

    fn visit_stmt(&mut self, s: &Stmt) {
        match s.node() {
            StmtNode::For { var, min, extent, body, .. } => {
                self.visit_expr(min);
                self.visit_expr(extent);
                let min_b = bounds_of_expr_in_scope(min, &self.scope, self.env);
                let last = Expr::sub(Expr::add(min.clone(), extent.clone()), Expr::int(1));
                let last_b = bounds_of_expr_in_scope(&last, &self.scope, self.env);
                self.scope.push(var.clone(), Interval { min: min_b.min, max: last_b.max });
                self.visit_stmt(body);
                self.scope.pop(var);
            }
            StmtNode::LetStmt { name, value, body } => {
                self.visit_expr(value);
                let bound = bounds_of_expr_in_scope(value, &self.scope, self.env);
                self.scope.push(name.clone(), bound);
                self.visit_stmt(body);
                self.scope.pop(name);
            }
            StmtNode::IfThenElse { condition, then_case, else_case } => {
                self.visit_expr(condition);
                match Self::refinement(condition) {
                    Some((var, refinement)) => {
                        let refined = self.refined_interval(&var, &refinement);
                        self.scope.push(var.clone(), refined);
                        self.visit_stmt(then_case);
                        self.scope.pop(&var);
                    }
                    None => self.visit_stmt(then_case),
                }
                if let Some(e) = else_case {
                    self.visit_stmt(e);
                }
            }
            StmtNode::Provide { name, args, values, predicate } => {
                if name == self.name {
                    Self::record(&mut self.writes, args, &self.scope, self.env);
                }
                for a in args {
                    self.visit_expr(a);
                }
                for v in values {
                    self.visit_expr(v);
                }
                if let Some(p) = predicate {
                    self.visit_expr(p);
                }
            }
            _ => walk_stmt(self, s),
        }
    }
}

fn boxes(s: &Stmt, name: &str, env: &Environment) -> (Option<Region>, Option<Region>) {
    let mut walker =
        BoxWalker { name, env, scope: Scope::new(), reads: None, writes: None };
    walker.visit_stmt(s);
    (walker.reads, walker.writes)
}

/// The region of `name` read anywhere in `s`, simplified.
pub fn boxes_required(s: &Stmt, name: &str, env: &Environment) -> Option<Region> {
    let (reads, _) = boxes(s, name, env);
    reads.map(simplify_region)
}

/// The region of `name` written anywhere in `s`, simplified.
pub fn boxes_provided(s: &Stmt, name: &str, env: &Environment) -> Option<Region> {
    let (_, writes) = boxes(s, name, env);
    writes.map(simplify_region)
}

/// Reads and writes combined.
pub fn boxes_touched(s: &Stmt, name: &str, env: &Environment) -> Option<Region> {
    let (reads, writes) = boxes(s, name, env);
    let combined = match (reads, writes) {
        (Some(r), Some(w)) => Some(union_regions(Some(r), w)),
        (r, w) => r.or(w),
    };
    combined.map(simplify_region)
}

fn simplify_region(region: Region) -> Region {
    region.into_iter().map(|i| i.simplified()).collect()
}

/// The region of `name` read by a single expression with the given
/// variable facts.
pub fn region_called_in_expr(
    e: &Expr,
    name: &str,
    scope: &Scope,
    env: &Environment,
) -> Option<Region> {
    let mut walker =
        BoxWalker { name, env, scope: scope.clone(), reads: None, writes: None };
    walker.visit_expr(e);
    walker.reads.map(simplify_region)
}

/// Bound the write region of an update definition directly from its
/// argument expressions: pure variables range over `pure_region`,
/// reduction variables over their domains (tightened by per-variable
/// predicates of the form `rv cmp const`).
pub fn update_write_region(
    update: &rill_func::UpdateDefinition,
    pure_args: &[String],
    pure_region: &Region,
    env: &Environment,
) -> Region {
    let mut scope = Scope::new();
    for (arg, interval) in pure_args.iter().zip(pure_region) {
        scope.push(arg.clone(), interval.clone());
    }
    if let Some(domain) = &update.rdom {
        for rv in &domain.vars {
            let mut interval = Interval::bounded(rv.min.clone(), range_max(&rv.min, &rv.extent));
            if let Some(pred) = &rv.predicate
                && let Some((var, refinement)) = BoxWalker::refinement(pred)
                && var == rv.name
            {
                interval = Interval {
                    min: match (&interval.min, &refinement.min) {
                        (Some(a), Some(b)) => Some(Expr::max(a.clone(), b.clone())),
                        (a, b) => a.clone().or_else(|| b.clone()),
                    },
                    max: match (&interval.max, &refinement.max) {
                        (Some(a), Some(b)) => Some(Expr::min(a.clone(), b.clone())),
                        (a, b) => a.clone().or_else(|| b.clone()),
                    },
                };
            }
            scope.push(rv.name.clone(), interval);
        }
    }
    update
        .args
        .iter()
        .map(|a| bounds_of_expr_in_scope(a, &scope, env).simplified())
        .collect()
}

/// The last coordinate of a (min, extent) pair.
pub fn range_max(min: &Expr, extent: &Expr) -> Expr {
    Expr::sub(Expr::add(min.clone(), extent.clone()), Expr::int(1))
}
