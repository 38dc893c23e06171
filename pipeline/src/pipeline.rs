//! The `Pipeline` type and compilation entry points.

use std::collections::HashMap;
use std::str::FromStr;

use rill_codegen::{
    Backend, Buffer, Callable, InterpreterBackend, LoweredModule, RunEnv, Target,
};
use rill_func::{Func, build_environment};
use rill_lower::{CancelToken, LowerOptions, lower};

use crate::error::Result;

/// Compilation knobs. Built with the generated builder:
///
/// ```ignore
/// let options = CompileOptions::builder()
///     .target("x86-64-linux-avx2")
///     .fast_math(true)
///     .build();
/// ```
#[derive(Debug, Clone, bon::Builder)]
pub struct CompileOptions {
    /// Target triple string, `<arch>-<bits>-<os>[-feature]*`.
    #[builder(into, default = "x86-64-linux-avx2".to_string())]
    pub target: String,
    /// Permit float rewrites that are only approximately
    /// value-preserving.
    #[builder(default = false)]
    pub fast_math: bool,
    /// Cooperative cancellation, honored between lowering passes.
    pub cancel: Option<CancelToken>,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// A group of output functions compiled together.
pub struct Pipeline {
    outputs: Vec<Func>,
}

impl Pipeline {
    pub fn new(output: Func) -> Self {
        Self { outputs: vec![output] }
    }

    pub fn from_outputs(outputs: Vec<Func>) -> Self {
        Self { outputs }
    }

    pub fn outputs(&self) -> &[Func] {
        &self.outputs
    }

    fn size_map(&self, extents: &[i64]) -> HashMap<String, Vec<i64>> {
        self.outputs.iter().map(|f| (f.name(), extents.to_vec())).collect()
    }

    /// AOT mode: freeze, lower, and return the artifact bundle for an
    /// external backend. No code is generated here.
    pub fn compile_to_module(&self, extents: &[i64], options: &CompileOptions) -> Result<LoweredModule> {
        let env = build_environment(&self.outputs)?;
        let target = Target::from_str(&options.target)?;
        tracing::debug!(target = %target, functions = env.functions.len(), "compiling pipeline");
        let lower_options =
            LowerOptions { fast_math: options.fast_math, cancel: options.cancel.clone() };
        let module = lower(&env, &target, &self.size_map(extents), &lower_options)?;
        Ok(module)
    }

    /// JIT mode: compile through the interpreter backend and return an
    /// in-memory callable.
    pub fn compile_jit(&self, extents: &[i64], options: &CompileOptions) -> Result<Compiled> {
        let module = self.compile_to_module(extents, options)?;
        let callable = InterpreterBackend.compile(&module)?;
        Ok(Compiled { module, callable })
    }

    /// Compile for `extents` and run once with no inputs, returning the
    /// run environment holding the filled output buffers.
    pub fn realize(&self, extents: &[i64]) -> Result<RunEnv> {
        self.realize_with(extents, RunEnv::new(), &CompileOptions::default())
    }

    /// Compile and run with caller-supplied inputs and scalars.
    pub fn realize_with(
        &self,
        extents: &[i64],
        mut env: RunEnv,
        options: &CompileOptions,
    ) -> Result<RunEnv> {
        let compiled = self.compile_jit(extents, options)?;
        for info in compiled.module.outputs() {
            env.buffers
                .entry(info.name.clone())
                .or_insert_with(|| Buffer::new_dense(info.ty, extents));
        }
        compiled.run(&mut env)?;
        Ok(env)
    }
}

/// A compiled pipeline: the final module plus its executable form.
pub struct Compiled {
    module: LoweredModule,
    callable: Box<dyn Callable>,
}

impl Compiled {
    pub fn module(&self) -> &LoweredModule {
        &self.module
    }

    pub fn run(&self, env: &mut RunEnv) -> Result<()> {
        self.callable.call(env)?;
        Ok(())
    }
}
