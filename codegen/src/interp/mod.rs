//! The interpreter backend.
//!
//! Walks the final statement tree directly: scalar and SIMD expression
//! evaluation, loop execution (parallel loops really run on threads),
//! allocation lifetimes, runtime bounds checks, and the
//! parallel-task/device runtime calls emitted by lowering. This is the
//! executable form behind JIT compilation and the end-to-end tests.

mod exec;
mod value;

use crate::backend::{Backend, Callable, RunEnv};
use crate::error::{Result, RuntimeError, runtime_codes};
use crate::module::LoweredModule;

pub use value::Value;

/// The in-tree backend: "compilation" captures the module; calling it
/// interprets the statement tree.
#[derive(Debug, Default, Clone, Copy)]
pub struct InterpreterBackend;

impl Backend for InterpreterBackend {
    fn compile(&self, module: &LoweredModule) -> Result<Box<dyn Callable>> {
        tracing::debug!(
            target = %module.target,
            buffers = module.buffers.len(),
            closures = module.closures.len(),
            "capturing module for interpretation"
        );
        Ok(Box::new(Interpreted { module: module.clone() }))
    }

    fn name(&self) -> &str {
        "interp"
    }
}

struct Interpreted {
    module: LoweredModule,
}

impl Callable for Interpreted {
    fn call(&self, env: &mut RunEnv) -> std::result::Result<(), RuntimeError> {
        for info in &self.module.buffers {
            if !env.buffers.contains_key(&info.name) {
                return Err(RuntimeError::new(
                    runtime_codes::UNDEFINED_SYMBOL,
                    format!("missing buffer {:?}", info.name),
                ));
            }
        }
        let mut machine = exec::Machine::new(&self.module, env)?;
        machine.run(&self.module.stmt)?;
        machine.finish(env);
        Ok(())
    }
}
