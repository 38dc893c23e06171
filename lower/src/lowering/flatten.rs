//! Storage flattening.
//!
//! Rewrites multi-dimensional accesses into flat ones:
//!
//! - `Realize` becomes one `Allocate` per tuple component, extents taken
//!   from the realize bounds in storage-dimension order (first storage
//!   dim has stride 1);
//! - `Provide` becomes one `Store` per component at the flat index;
//! - function `Call`s become `Load`s from the producer's buffer;
//! - `Image` calls become `Load`s using the input buffer's runtime
//!   min/stride symbols, which the backend binds from descriptors.
//!
//! Output functions have no `Realize` (their storage belongs to the
//! caller); their concrete regions come in through `output_regions`.

use std::collections::HashMap;

use rill_func::Environment;
use rill_ir::mutator::{Mutator, mutate_expr_children, mutate_stmt_children};
use rill_ir::{CallType, Expr, ExprNode, Range, Stmt, StmtNode};

use super::names::component_buffer;
use crate::error::Result;

pub struct Flattener<'a> {
    env: &'a Environment,
    /// Realization bounds in scope, by function name, in argument
    /// order.
    regions: HashMap<String, Vec<Range>>,
}

impl Flattener<'_> {
    /// The flat element offset of a multi-dimensional access, honoring
    /// the function's storage-dimension permutation.
    fn flat_index(&self, name: &str, args: &[Expr]) -> Option<Expr> {
        let func = self.env.functions.get(name)?;
        let bounds = self.regions.get(name)?;
        let order = func.schedule.storage_order(&func.args);

        let mut index: Option<Expr> = None;
        let mut stride: Option<Expr> = None;
        for dim in &order {
            let p = func.args.iter().position(|a| a == dim)?;
            let offset = Expr::sub(args.get(p)?.clone(), bounds.get(p)?.min.clone());
            let term = match &stride {
                None => offset,
                Some(s) => Expr::mul(offset, s.clone()),
            };
            index = Some(match index {
                None => term,
                Some(acc) => Expr::add(acc, term),
            });
            stride = Some(match stride {
                None => bounds[p].extent.clone(),
                Some(s) => Expr::mul(s, bounds[p].extent.clone()),
            });
        }
        index
    }

    fn flatten_image_call(&self, name: &str, args: &[Expr]) -> Expr {
        let mut index: Option<Expr> = None;
        for (d, arg) in args.iter().enumerate() {
            let offset = Expr::sub(arg.clone(), Expr::var(format!("{name}.min.{d}")));
            let term = Expr::mul(offset, Expr::var(format!("{name}.stride.{d}")));
            index = Some(match index {
                None => term,
                Some(acc) => Expr::add(acc, term),
            });
        }
        index.unwrap_or_else(|| Expr::int(0))
    }
}

impl Mutator for Flattener<'_> {
    fn mutate_expr(&mut self, e: &Expr) -> Expr {
        let e = mutate_expr_children(self, e);
        match e.node() {
            ExprNode::Call { name, args, call_type: CallType::Function, value_index } => {
                let Some(func) = self.env.functions.get(name) else { return e };
                let Some(index) = self.flat_index(name, args) else { return e };
                let buffer = component_buffer(name, *value_index, func.return_types.len());
                Expr::load(e.ty(), buffer, index, None)
            }
            ExprNode::Call { name, args, call_type: CallType::Image, .. } => {
                let index = self.flatten_image_call(name, args);
                Expr::load(e.ty(), name.clone(), index, None)
            }
            _ => e,
        }
    }

    fn mutate_stmt(&mut self, s: &Stmt) -> Stmt {
        match s.node() {
            StmtNode::Realize { name, types, bounds, body } => {
                let mutated_bounds: Vec<Range> = bounds
                    .iter()
                    .map(|r| Range::new(self.mutate_expr(&r.min), self.mutate_expr(&r.extent)))
                    .collect();
                self.regions.insert(name.clone(), mutated_bounds.clone());
                let mut inner = self.mutate_stmt(body);
                self.regions.remove(name);

                let Some(func) = self.env.functions.get(name) else { return inner };
                let order = func.schedule.storage_order(&func.args);
                let extents: Vec<Expr> = order
                    .iter()
                    .filter_map(|dim| {
                        let p = func.args.iter().position(|a| a == dim)?;
                        Some(mutated_bounds[p].extent.clone())
                    })
                    .collect();
                // One allocation per tuple component, innermost first.
                for (k, ty) in types.iter().enumerate().rev() {
                    inner = Stmt::allocate(
                        component_buffer(name, k, types.len()),
                        *ty,
                        func.schedule.memory_type,
                        extents.clone(),
                        None,
                        inner,
                    );
                }
                inner
            }
            StmtNode::Provide { name, args, values, predicate } => {
                let args: Vec<Expr> = args.iter().map(|a| self.mutate_expr(a)).collect();
                let values: Vec<Expr> = values.iter().map(|v| self.mutate_expr(v)).collect();
                let predicate = predicate.as_ref().map(|p| self.mutate_expr(p));
                let Some(index) = self.flat_index(name, &args) else { return s.clone() };
                let tuple_len = values.len();
                Stmt::block(
                    values
                        .into_iter()
                        .enumerate()
                        .map(|(k, value)| {
                            Stmt::store(
                                component_buffer(name, k, tuple_len),
                                index.clone(),
                                value,
                                predicate.clone(),
                            )
                        })
                        .collect(),
                )
            }
            _ => mutate_stmt_children(self, s),
        }
    }
}

/// Flatten every realization and multi-dimensional access in the tree.
///
/// `output_regions` supplies the caller-owned regions of output
/// functions, in argument order.
pub fn storage_flattening(
    stmt: Stmt,
    env: &Environment,
    output_regions: &HashMap<String, Vec<Range>>,
) -> Result<Stmt> {
    let mut flattener = Flattener { env, regions: output_regions.clone() };
    Ok(flattener.mutate_stmt(&stmt))
}
