//! The lowered-module bundle handed to backends.
//!
//! By the time a module reaches a backend the statement tree is final:
//! fully simplified, every pass applied. A backend may rely on that.

use rill_dtype::Type;
use rill_ir::{Expr, Stmt};

use crate::target::Target;

/// Where a buffer's authoritative copy lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeviceAffinity {
    #[default]
    Host,
    Device,
}

/// One buffer the generated code touches at its boundary.
#[derive(Debug, Clone)]
pub struct BufferInfo {
    pub name: String,
    pub ty: Type,
    /// Dimensionality; concrete extents for outputs, checked at runtime
    /// for inputs.
    pub dimensions: usize,
    pub is_input: bool,
    pub is_output: bool,
    pub affinity: DeviceAffinity,
}

/// A scalar parameter the caller must supply.
#[derive(Debug, Clone)]
pub struct ScalarParam {
    pub name: String,
    pub ty: Type,
}

/// A parallel loop body extracted by parallel-task lowering. The
/// runtime call site names the closure; the body executes once per
/// value of `var` in `[min, min + extent)` over the caller's lexical
/// environment.
#[derive(Debug, Clone)]
pub struct ParallelClosure {
    pub name: String,
    pub var: String,
    pub body: Stmt,
}

/// The compiler core's final product.
#[derive(Debug, Clone)]
pub struct LoweredModule {
    pub stmt: Stmt,
    pub buffers: Vec<BufferInfo>,
    pub params: Vec<ScalarParam>,
    pub closures: Vec<ParallelClosure>,
    pub target: Target,
}

impl LoweredModule {
    pub fn buffer(&self, name: &str) -> Option<&BufferInfo> {
        self.buffers.iter().find(|b| b.name == name)
    }

    pub fn closure(&self, name: &str) -> Option<&ParallelClosure> {
        self.closures.iter().find(|c| c.name == name)
    }

    pub fn outputs(&self) -> impl Iterator<Item = &BufferInfo> {
        self.buffers.iter().filter(|b| b.is_output)
    }

    pub fn inputs(&self) -> impl Iterator<Item = &BufferInfo> {
        self.buffers.iter().filter(|b| b.is_input)
    }
}

/// The runtime symbols device and parallel lowering emit calls to.
pub mod runtime_names {
    /// `~rill_par_for(closure_name, min, extent)`
    pub const PAR_FOR: &str = "rill_par_for";
    /// `~rill_copy_to_device(buffer_name)`
    pub const COPY_TO_DEVICE: &str = "rill_copy_to_device";
    /// `~rill_copy_to_host(buffer_name)`
    pub const COPY_TO_HOST: &str = "rill_copy_to_host";
}

/// Convenience used by tests and the driver: the expression naming a
/// buffer in a runtime call.
pub fn buffer_name_arg(name: &str) -> Expr {
    Expr::string_imm(name)
}
