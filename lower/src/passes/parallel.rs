//! Parallel runtime lowering.
//!
//! Loops marked `parallel` become calls into the task-submission
//! runtime: the body is extracted as a closure over the enclosing
//! lexical environment, and the loop is replaced by
//! `~rill_par_for(closure, min, extent)`. The runtime (an external
//! collaborator; the interpreter backend ships one) executes the body
//! for each iteration, in any order, on any thread.
//!
//! Safety was established earlier: loop-nest construction rejects
//! parallel update loops that could collide without `atomic()`.

use rill_codegen::ParallelClosure;
use rill_codegen::module::runtime_names;
use rill_ir::mutator::{Mutator, mutate_stmt_children};
use rill_ir::{CallType, Expr, ForKind, Stmt, StmtNode, Type};

use crate::lowering::names::closure_name;

struct LowerParallel {
    closures: Vec<ParallelClosure>,
}

impl Mutator for LowerParallel {
    fn mutate_stmt(&mut self, s: &Stmt) -> Stmt {
        // Children first, so nested parallel loops extract inner
        // closures before the outer body is captured.
        let s = mutate_stmt_children(self, s);
        let StmtNode::For { var, min, extent, kind: ForKind::Parallel, body } = s.node() else {
            return s;
        };
        let name = closure_name(var);
        tracing::debug!(loop_var = %var, closure = %name, "extracting parallel task");
        self.closures.push(ParallelClosure {
            name: name.clone(),
            var: var.clone(),
            body: body.clone(),
        });
        Stmt::evaluate(Expr::call(
            Type::int32(),
            runtime_names::PAR_FOR,
            vec![Expr::string_imm(name), min.clone(), extent.clone()],
            CallType::Extern,
        ))
    }
}

/// Rewrite parallel loops into runtime task submissions, returning the
/// extracted closures.
pub fn lower_parallel_tasks(stmt: Stmt) -> (Stmt, Vec<ParallelClosure>) {
    let mut pass = LowerParallel { closures: Vec::new() };
    let out = pass.mutate_stmt(&stmt);
    (out, pass.closures)
}
