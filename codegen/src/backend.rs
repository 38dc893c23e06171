//! The backend contract.
//!
//! Given a [`LoweredModule`], a backend produces an executable: called
//! with matching buffers and scalars, it computes the outputs. Backends
//! may assume the IR has been fully simplified and every pass applied.

use std::collections::HashMap;

use rill_ir::ConstValue;

use crate::buffer::Buffer;
use crate::error::{Result, RuntimeError};
use crate::module::LoweredModule;

/// Buffers and scalar arguments for one invocation.
#[derive(Debug, Default)]
pub struct RunEnv {
    pub buffers: HashMap<String, Buffer>,
    pub scalars: HashMap<String, ConstValue>,
}

impl RunEnv {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_buffer(mut self, name: impl Into<String>, buffer: Buffer) -> Self {
        self.buffers.insert(name.into(), buffer);
        self
    }

    pub fn with_scalar(mut self, name: impl Into<String>, value: ConstValue) -> Self {
        self.scalars.insert(name.into(), value);
        self
    }
}

/// An executable produced by a backend.
pub trait Callable {
    /// Run the compiled pipeline. Outputs are written into the
    /// corresponding buffers of `env`.
    fn call(&self, env: &mut RunEnv) -> std::result::Result<(), RuntimeError>;
}

/// Backend-agnostic code generation interface.
pub trait Backend {
    /// Compile a lowered module into something executable.
    fn compile(&self, module: &LoweredModule) -> Result<Box<dyn Callable>>;

    /// The backend's name, for diagnostics and caching.
    fn name(&self) -> &str;
}
