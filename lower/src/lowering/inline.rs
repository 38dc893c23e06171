//! Inlining of `compute_inline` functions.
//!
//! An inline function is substituted at every call site: the call's
//! arguments replace the function's pure variables in its definition.
//! Only pure functions may inline; update definitions need storage.

use std::collections::HashMap;

use rill_func::{Environment, Function};
use rill_ir::mutator::{Mutator, mutate_expr_children};
use rill_ir::substitute::substitute_map;
use rill_ir::{CallType, Expr, ExprNode};

use crate::error::{self, Result};

struct InlineCalls<'a> {
    func: &'a Function,
}

impl Mutator for InlineCalls<'_> {
    fn mutate_expr(&mut self, e: &Expr) -> Expr {
        // Children first, so nested calls to the same function resolve.
        let e = mutate_expr_children(self, e);
        let ExprNode::Call { name, args, call_type: CallType::Function, value_index } = e.node()
        else {
            return e;
        };
        if name != &self.func.name {
            return e;
        }
        let mut map = HashMap::new();
        for (arg_name, arg_expr) in self.func.args.iter().zip(args) {
            map.insert(arg_name.clone(), arg_expr.clone());
        }
        substitute_map(&self.func.values[*value_index], &map)
    }
}

/// Replace every call to `func` in `e` with its substituted definition.
pub fn inline_into_expr(func: &Function, e: &Expr) -> Expr {
    InlineCalls { func }.mutate_expr(e)
}

/// Inline `name` into every other function of the environment and drop
/// it from the graph.
pub fn inline_function(env: &mut Environment, name: &str) -> Result<()> {
    let func = env.function(name)?.clone();
    if !func.is_pure() {
        return error::InlinedUpdatesSnafu { func: name.to_string() }.fail();
    }
    tracing::debug!(func = name, "inlining");

    for other in env.functions.values_mut() {
        if other.name == name {
            continue;
        }
        for value in &mut other.values {
            *value = inline_into_expr(&func, value);
        }
        for update in &mut other.updates {
            for value in &mut update.values {
                *value = inline_into_expr(&func, value);
            }
            for arg in &mut update.args {
                *arg = inline_into_expr(&func, arg);
            }
        }
    }
    env.functions.remove(name);
    env.order.retain(|n| n != name);
    Ok(())
}
