//! Vectorization lowering.
//!
//! A loop marked `vectorized` disappears: its variable becomes a ramp of
//! the loop's lane count, and the substitution is pushed through the
//! body, rewriting scalar operations into lane-wise ones. Loads and
//! stores keep their index expressions - a ramp index is a dense vector
//! access, anything else a gather/scatter - and a guard whose condition
//! turns into a vector becomes a per-lane store predicate, so split
//! tails vectorize without out-of-bounds writes.

use std::collections::HashMap;

use rill_ir::mutator::{Mutator, mutate_stmt_children};
use rill_ir::{Expr, ExprNode, ForKind, Stmt, StmtNode};

use crate::error::{self, Error, Result};

/// Push a `var -> ramp` substitution through an expression, widening
/// types as vectors propagate.
struct VectorSubs {
    var: String,
    replacement: Expr,
    /// Lets whose value became a vector, and the lane count their
    /// references must take.
    vector_lets: HashMap<String, u16>,
}

impl VectorSubs {
    fn widen(&mut self, e: &Expr) -> Expr {
        match e.node() {
            ExprNode::Var(name) => {
                if *name == self.var {
                    self.replacement.clone()
                } else if let Some(lanes) = self.vector_lets.get(name) {
                    Expr::var_typed(name.clone(), e.ty().element_of().with_lanes(*lanes))
                } else {
                    e.clone()
                }
            }
            ExprNode::Cast { value } => {
                let value = self.widen(value);
                Expr::cast(e.ty().element_of().with_lanes(value.ty().lanes()), value)
            }
            ExprNode::Unary(op, a) => {
                let a = self.widen(a);
                match op {
                    rill_ir::UnaryOp::Neg => Expr::neg(a),
                    rill_ir::UnaryOp::Not => Expr::not(a),
                }
            }
            ExprNode::Binary(op, a, b) => Expr::binary(*op, self.widen(a), self.widen(b)),
            ExprNode::Select { condition, true_value, false_value } => {
                let condition = self.widen(condition);
                let mut t = self.widen(true_value);
                let mut f = self.widen(false_value);
                // A vector condition needs vector branches.
                let lanes = condition.ty().lanes().max(t.ty().lanes()).max(f.ty().lanes());
                if lanes > 1 {
                    if t.ty().is_scalar() {
                        t = Expr::broadcast(t, lanes);
                    }
                    if f.ty().is_scalar() {
                        f = Expr::broadcast(f, lanes);
                    }
                }
                Expr::select(condition, t, f)
            }
            ExprNode::Load { buffer, index, predicate } => {
                let index = self.widen(index);
                let lanes = index.ty().lanes();
                let predicate = predicate.as_ref().map(|p| {
                    let p = self.widen(p);
                    if p.ty().is_scalar() && lanes > 1 { Expr::broadcast(p, lanes) } else { p }
                });
                Expr::load(e.ty().element_of().with_lanes(lanes), buffer.clone(), index, predicate)
            }
            ExprNode::Let { name, value, body } => {
                let value = self.widen(value);
                let widened = value.ty().lanes() > 1;
                if widened {
                    self.vector_lets.insert(name.clone(), value.ty().lanes());
                }
                let body = self.widen(body);
                if widened {
                    self.vector_lets.remove(name);
                }
                Expr::let_(name.clone(), value, body)
            }
            ExprNode::Call { name, args, call_type, value_index } => {
                let args: Vec<Expr> = args.iter().map(|a| self.widen(a)).collect();
                let lanes = args.iter().map(|a| a.ty().lanes()).max().unwrap_or(1);
                Expr::call_indexed(
                    e.ty().element_of().with_lanes(lanes),
                    name.clone(),
                    args,
                    *call_type,
                    *value_index,
                )
            }
            // Leaves and already-vector constructs pass through; the
            // loop variable cannot occur below them after lowering.
            _ => e.clone(),
        }
    }
}

/// Push a vector condition into the stores of a guarded body.
struct PredicateStores {
    predicate: Expr,
}

impl Mutator for PredicateStores {
    fn mutate_stmt(&mut self, s: &Stmt) -> Stmt {
        if let StmtNode::Store { buffer, index, value, predicate } = s.node() {
            let lanes = self.predicate.ty().lanes().max(index.ty().lanes());
            let mut combined = self.predicate.clone();
            if combined.ty().is_scalar() && lanes > 1 {
                combined = Expr::broadcast(combined, lanes);
            }
            if let Some(p) = predicate {
                let mut p = p.clone();
                if p.ty().is_scalar() && lanes > 1 {
                    p = Expr::broadcast(p, lanes);
                }
                combined = Expr::and(combined, p);
            }
            return Stmt::store(buffer.clone(), index.clone(), value.clone(), Some(combined));
        }
        mutate_stmt_children(self, s)
    }
}

struct VectorizeBody<'a> {
    subs: &'a mut VectorSubs,
    error: Option<Error>,
}

impl Mutator for VectorizeBody<'_> {
    fn mutate_expr(&mut self, e: &Expr) -> Expr {
        self.subs.widen(e)
    }

    fn mutate_stmt(&mut self, s: &Stmt) -> Stmt {
        if self.error.is_some() {
            return s.clone();
        }
        match s.node() {
            StmtNode::IfThenElse { condition, then_case, else_case } => {
                let condition = self.subs.widen(condition);
                if condition.ty().is_vector() {
                    if else_case.is_some() {
                        self.error = Some(Error::VectorizeNonConstant {
                            loop_var: self.subs.var.clone(),
                            extent: "vector guard with an else branch".to_string(),
                        });
                        return s.clone();
                    }
                    let then_case = self.mutate_stmt(then_case);
                    return PredicateStores { predicate: condition }.mutate_stmt(&then_case);
                }
                let then_case = self.mutate_stmt(then_case);
                let else_case = else_case.as_ref().map(|e| self.mutate_stmt(e));
                Stmt::if_then_else(condition, then_case, else_case)
            }
            StmtNode::LetStmt { name, value, body } => {
                let value = self.subs.widen(value);
                let widened = value.ty().lanes() > 1;
                if widened {
                    self.subs.vector_lets.insert(name.clone(), value.ty().lanes());
                }
                let body = self.mutate_stmt(body);
                if widened {
                    self.subs.vector_lets.remove(name);
                }
                Stmt::let_stmt(name.clone(), value, body)
            }
            _ => mutate_stmt_children(self, s),
        }
    }
}

struct VectorizeLoops {
    error: Option<Error>,
}

impl Mutator for VectorizeLoops {
    fn mutate_stmt(&mut self, s: &Stmt) -> Stmt {
        if self.error.is_some() {
            return s.clone();
        }
        // Inner vectorized loops first.
        let s = mutate_stmt_children(self, s);
        let StmtNode::For { var, min, extent, kind: ForKind::Vectorized, body } = s.node() else {
            return s;
        };
        let Some(lanes) = extent.as_const_i64().filter(|l| *l > 0 && *l <= u16::MAX as i64) else {
            self.error = Some(Error::VectorizeNonConstant {
                loop_var: var.clone(),
                extent: extent.to_string(),
            });
            return s;
        };
        if lanes == 1 {
            // One lane is just a serial iteration.
            return Stmt::let_stmt(var.clone(), min.clone(), body.clone());
        }
        tracing::debug!(loop_var = %var, lanes, "vectorizing");
        let mut subs = VectorSubs {
            var: var.clone(),
            replacement: Expr::ramp(min.clone(), Expr::int(1), lanes as u16),
            vector_lets: HashMap::new(),
        };
        let mut body_mutator = VectorizeBody { subs: &mut subs, error: None };
        let out = body_mutator.mutate_stmt(body);
        if let Some(e) = body_mutator.error {
            self.error = Some(e);
            return s;
        }
        out
    }
}

/// Lower every `vectorized` loop into ramp-substituted SIMD form.
pub fn vectorize_loops(stmt: Stmt) -> Result<Stmt> {
    let mut v = VectorizeLoops { error: None };
    let out = v.mutate_stmt(&stmt);
    match v.error {
        Some(e) => Err(e),
        None => Ok(out),
    }
}
